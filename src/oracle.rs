use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceInfo {
    /// USD per one whole native token.
    pub price: Decimal,
    pub confidence: Decimal,
    pub publish_time: DateTime<Utc>,
}

/// CHZ/USD feed, read synchronously at play time.
#[async_trait]
pub trait PriceOracle {
    async fn current_price(&self) -> Result<PriceInfo>;
}

#[derive(Debug, Clone)]
pub struct TestPriceOracle {
    price: Decimal,
}
impl TestPriceOracle {
    pub fn new(price: Decimal) -> Self {
        Self { price }
    }
}
impl Default for TestPriceOracle {
    fn default() -> Self {
        Self::new(dec!(0.10))
    }
}
#[async_trait]
impl PriceOracle for TestPriceOracle {
    async fn current_price(&self) -> Result<PriceInfo> {
        Ok(PriceInfo {
            price: self.price,
            confidence: dec!(0.001),
            publish_time: Utc::now(),
        })
    }
}
