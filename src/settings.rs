use crate::api::{LoyaltyPoints, UsdCents, WowAmount};
use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;

/// Server settings, layered: built-in defaults, then an optional config
/// file, then MATCHDAY_* environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub port: u16,
    pub db: Option<String>,
    pub play_fee_usd_cents: UsdCents,
    pub wow_token_per_bet_loss: WowAmount,
    pub points_per_loss: LoyaltyPoints,
}

impl Settings {
    pub fn load(file: Option<String>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("port", 8081)?
            .set_default("db", None::<String>)?
            .set_default("play_fee_usd_cents", 100)?
            .set_default("wow_token_per_bet_loss", 5)?
            .set_default("points_per_loss", 1)?;
        if let Some(file) = file {
            builder = builder.add_source(File::with_name(file.as_str()));
        }
        let settings = builder
            .add_source(Environment::with_prefix("MATCHDAY"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.port, 8081);
        assert_eq!(settings.db, None);
        assert_eq!(settings.play_fee_usd_cents, 100);
        assert_eq!(settings.wow_token_per_bet_loss, 5);
        assert_eq!(settings.points_per_loss, 1);
    }
}
