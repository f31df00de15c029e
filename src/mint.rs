use crate::api::{PrizeId, TokenId, UserAddress, WowAmount};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Records prize NFT and WOW token issuance. The sink assigns token ids; the
/// ledger mirrors them for its read surface.
#[async_trait]
pub trait MintSink {
    async fn mint_prize(&self, owner: &UserAddress, prize: PrizeId) -> Result<TokenId>;
    async fn credit_wow_tokens(&self, owner: &UserAddress, amount: WowAmount) -> Result<()>;
}

#[derive(Debug, Default, Clone)]
pub struct TestMintSink {
    last_token: Arc<Mutex<TokenId>>,
    minted: Arc<Mutex<Vec<(UserAddress, PrizeId, TokenId)>>>,
    wow: Arc<Mutex<HashMap<UserAddress, WowAmount>>>,
}
#[async_trait]
impl MintSink for TestMintSink {
    async fn mint_prize(&self, owner: &UserAddress, prize: PrizeId) -> Result<TokenId> {
        let mut last = self.last_token.lock().unwrap();
        *last += 1;
        self.minted.lock().unwrap().push((*owner, prize, *last));
        Ok(*last)
    }
    async fn credit_wow_tokens(&self, owner: &UserAddress, amount: WowAmount) -> Result<()> {
        *self.wow.lock().unwrap().entry(*owner).or_insert(0) += amount;
        Ok(())
    }
}
impl TestMintSink {
    /// Resumes token issuance after a previously assigned id.
    pub fn starting_after(last: TokenId) -> Self {
        Self {
            last_token: Arc::new(Mutex::new(last)),
            ..Default::default()
        }
    }
    pub fn minted(&self) -> Vec<(UserAddress, PrizeId, TokenId)> {
        self.minted.lock().unwrap().clone()
    }
    pub fn wow_credited(&self, owner: &UserAddress) -> WowAmount {
        *self.wow.lock().unwrap().get(owner).unwrap_or(&0)
    }
}
