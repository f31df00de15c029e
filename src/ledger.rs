use crate::api::*;
use crate::clock::Clock;
use crate::db::DB;
use crate::entropy::EntropySource;
use crate::mint::MintSink;
use crate::oracle::PriceOracle;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use log::debug;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Chance of winning a second-halftime play, applied to the entropy callback.
pub const WIN_PROBABILITY_PERCENT: u64 = 20;
/// Smallest-unit denomination of the native token.
pub const WEI_PER_CHZ: u64 = 1_000_000_000_000_000_000;

const CONFIG_PLAY_FEE: &str = "play_fee_usd_cents";
const CONFIG_WOW_PER_BET_LOSS: &str = "wow_token_per_bet_loss";
const CONFIG_TRUSTED_RESOLVER: &str = "trusted_data_resolver";
const CONFIG_COLLECTED_FEES: &str = "collected_fees_wei";
const CONFIG_OWNER: &str = "owner";
/// Highest randomness sequence number seen so far. A restarted server seeds
/// its entropy source from this so ids never collide with surviving
/// pending plays.
pub const CONFIG_LAST_SEQUENCE: &str = "last_entropy_sequence";

#[derive(Debug, Clone)]
pub struct CampaignInput {
    pub team1: String,
    pub team2: String,
    pub start_prediction_game: DateTime<Utc>,
    pub end_prediction_game: DateTime<Utc>,
    pub start_second_halftime_game: DateTime<Utc>,
    pub end_second_halftime_game: DateTime<Utc>,
}

/// A second-halftime play waiting for its randomness callback. Stays a
/// liability until the callback resolves it; there is no expiry.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPlay {
    pub request: RequestId,
    pub user: UserAddress,
    pub campaign: CampaignId,
    pub paid_fee: ChzWei,
}

pub struct Ledger {
    db: Arc<Box<dyn DB + Send + Sync>>,
    entropy: Arc<Box<dyn EntropySource + Send + Sync>>,
    oracle: Arc<Box<dyn PriceOracle + Send + Sync>>,
    mint: Arc<Box<dyn MintSink + Send + Sync>>,
    clock: Arc<Box<dyn Clock + Send + Sync>>,
    owner: UserAddress,
    points_per_loss: LoyaltyPoints,
}

impl Ledger {
    #[allow(clippy::too_many_arguments)]
    pub async fn new(
        db: Box<dyn DB + Send + Sync>,
        entropy: Box<dyn EntropySource + Send + Sync>,
        oracle: Box<dyn PriceOracle + Send + Sync>,
        mint: Box<dyn MintSink + Send + Sync>,
        clock: Box<dyn Clock + Send + Sync>,
        owner: UserAddress,
        trusted_data_resolver: UserAddress,
        play_fee_usd_cents: UsdCents,
        wow_token_per_bet_loss: WowAmount,
        points_per_loss: LoyaltyPoints,
    ) -> Result<Self> {
        let mut me = Self {
            db: Arc::new(db),
            entropy: Arc::new(entropy),
            oracle: Arc::new(oracle),
            mint: Arc::new(mint),
            clock: Arc::new(clock),
            owner,
            points_per_loss,
        };
        // Updatable settings live in the db so updates survive restarts;
        // the passed values only seed them on first run. That includes the
        // owner, which can change through transfer_ownership.
        match me.db.get_config(CONFIG_OWNER).await? {
            Some(stored) => me.owner = stored.parse()?,
            None => me.db.set_config(CONFIG_OWNER, owner.to_string()).await?,
        }
        if me.db.get_config(CONFIG_PLAY_FEE).await?.is_none() {
            me.db
                .set_config(CONFIG_PLAY_FEE, play_fee_usd_cents.to_string())
                .await?;
        }
        if me.db.get_config(CONFIG_WOW_PER_BET_LOSS).await?.is_none() {
            me.db
                .set_config(CONFIG_WOW_PER_BET_LOSS, wow_token_per_bet_loss.to_string())
                .await?;
        }
        if me.db.get_config(CONFIG_TRUSTED_RESOLVER).await?.is_none() {
            me.db
                .set_config(CONFIG_TRUSTED_RESOLVER, trusted_data_resolver.to_string())
                .await?;
        }
        Ok(me)
    }

    fn ensure_owner(&self, caller: &UserAddress) -> Result<()> {
        if *caller != self.owner {
            return Err(LedgerError::Unauthorized.into());
        }
        Ok(())
    }
    async fn trusted_data_resolver(&self) -> Result<UserAddress> {
        let resolver = self
            .db
            .get_config(CONFIG_TRUSTED_RESOLVER)
            .await?
            .context("trusted data resolver not configured")?;
        Ok(resolver.parse()?)
    }
    async fn get_existing_campaign(&self, campaign: &CampaignId) -> Result<CampaignResponse> {
        match self.db.get_campaign(campaign).await? {
            Some(campaign) => Ok(campaign),
            None => Err(LedgerError::CampaignDoesNotExist.into()),
        }
    }

    pub async fn create_campaign(
        &mut self,
        caller: &UserAddress,
        input: CampaignInput,
    ) -> Result<CampaignId> {
        self.ensure_owner(caller)?;
        if input.team1.is_empty() || input.team2.is_empty() {
            bail!("team names must not be empty");
        }
        if input.start_prediction_game >= input.end_prediction_game {
            bail!(
                "prediction game window must start before it ends: {} >= {}",
                input.start_prediction_game,
                input.end_prediction_game
            );
        }
        if input.start_second_halftime_game >= input.end_second_halftime_game {
            bail!(
                "second halftime window must start before it ends: {} >= {}",
                input.start_second_halftime_game,
                input.end_second_halftime_game
            );
        }
        let team1 = input.team1.clone();
        let team2 = input.team2.clone();
        // Campaigns start inactive and need an explicit activation.
        let id = self.db.add_campaign(input).await?;
        self.db
            .add_event(&Event::CampaignCreated {
                campaign: id,
                team1,
                team2,
            })
            .await?;
        Ok(id)
    }
    pub async fn set_campaign_active(
        &mut self,
        caller: &UserAddress,
        campaign: &CampaignId,
        active: bool,
    ) -> Result<()> {
        self.ensure_owner(caller)?;
        self.get_existing_campaign(campaign).await?;
        self.db.set_campaign_active(campaign, active).await
    }
    pub async fn create_prediction_game(
        &mut self,
        caller: &UserAddress,
        campaign: &CampaignId,
        question: String,
    ) -> Result<()> {
        self.ensure_owner(caller)?;
        self.get_existing_campaign(campaign).await?;
        if self.db.get_prediction_game(campaign).await?.is_some() {
            bail!("prediction game already exists for campaign {}", campaign);
        }
        self.db.add_prediction_game(campaign, question).await?;
        self.db
            .add_event(&Event::PredictionGameCreated {
                campaign: *campaign,
            })
            .await
    }
    pub async fn submit_predictions(
        &mut self,
        caller: &UserAddress,
        campaign: &CampaignId,
        team1_score: Score,
        team2_score: Score,
    ) -> Result<()> {
        let state = self.get_existing_campaign(campaign).await?;
        if !state.active {
            return Err(LedgerError::CampaignNotActive.into());
        }
        let now = self.clock.now();
        if now < state.start_prediction_game || now > state.end_prediction_game {
            return Err(LedgerError::PredictionGameNotActive.into());
        }
        if self
            .db
            .get_prediction_ticket(caller, campaign)
            .await?
            .is_some()
        {
            return Err(LedgerError::AlreadyHasTicket.into());
        }
        self.db
            .add_prediction_ticket(caller, campaign, team1_score, team2_score)
            .await?;
        self.db
            .add_event(&Event::PredictionsSubmitted {
                user: *caller,
                campaign: *campaign,
                team1_score,
                team2_score,
            })
            .await
    }
    pub async fn resolve_prediction_game(
        &mut self,
        caller: &UserAddress,
        campaign: &CampaignId,
        team1_score: Score,
        team2_score: Score,
    ) -> Result<()> {
        // The trusted data resolver exists to feed in final scores, so it is
        // authorized alongside the owner.
        if *caller != self.owner && *caller != self.trusted_data_resolver().await? {
            return Err(LedgerError::Unauthorized.into());
        }
        self.get_existing_campaign(campaign).await?;
        let game = self
            .db
            .get_prediction_game(campaign)
            .await?
            .with_context(|| format!("no prediction game for campaign {}", campaign))?;
        if game.resolved {
            return Err(LedgerError::MarketAlreadyResolved.into());
        }
        self.db
            .resolve_prediction_game(campaign, team1_score, team2_score)
            .await?;
        self.db
            .add_event(&Event::PredictionGameResolved {
                campaign: *campaign,
                team1_score,
                team2_score,
            })
            .await
    }
    /// Pull-based settlement of a submitted prediction. Idempotent in effect:
    /// the halftime ticket is granted at most once, a second call is rejected.
    pub async fn check_prediction_result(
        &mut self,
        caller: &UserAddress,
        campaign: &CampaignId,
    ) -> Result<bool> {
        self.get_existing_campaign(campaign).await?;
        let game = match self.db.get_prediction_game(campaign).await? {
            Some(game) if game.resolved => game,
            _ => return Err(LedgerError::GameNotResolved.into()),
        };
        let ticket = match self.db.get_prediction_ticket(caller, campaign).await? {
            Some(ticket) => ticket,
            None => return Err(LedgerError::PredictionNotPlayed.into()),
        };
        if ticket.checked {
            return Err(LedgerError::AlreadyChecked.into());
        }
        let won =
            ticket.team1_score == game.team1_score && ticket.team2_score == game.team2_score;
        self.db.set_prediction_ticket_checked(caller, campaign).await?;
        if won {
            self.db.set_halftime_ticket(caller, true).await?;
            self.db
                .add_event(&Event::TicketsAwarded { user: *caller })
                .await?;
        }
        Ok(won)
    }
    /// Promotional path granting a free halftime ticket outside the
    /// prediction flow.
    pub async fn get_second_halftime_free_ticket(
        &mut self,
        caller: &UserAddress,
        campaign: &CampaignId,
    ) -> Result<()> {
        let state = self.get_existing_campaign(campaign).await?;
        if !state.active {
            return Err(LedgerError::CampaignNotActive.into());
        }
        self.db.set_halftime_ticket(caller, true).await?;
        self.db
            .add_event(&Event::TicketsAwarded { user: *caller })
            .await
    }

    async fn check_second_halftime_open(&self, campaign: &CampaignId) -> Result<()> {
        let state = self.get_existing_campaign(campaign).await?;
        if !state.active {
            return Err(LedgerError::CampaignNotActive.into());
        }
        let now = self.clock.now();
        if now < state.start_second_halftime_game || now > state.end_second_halftime_game {
            return Err(LedgerError::SecondHalftimeGameNotActive.into());
        }
        Ok(())
    }
    pub async fn play_second_halftime_with_ticket(
        &mut self,
        caller: &UserAddress,
        campaign: &CampaignId,
    ) -> Result<RequestId> {
        self.check_second_halftime_open(campaign).await?;
        if !self.db.user_has_halftime_ticket(caller).await? {
            return Err(LedgerError::NoFreeTickets.into());
        }
        let request = self.entropy.request_randomness().await?;
        self.note_entropy_sequence(&request).await?;
        // The play is recorded before the ticket is consumed, so a failed
        // insert cannot burn the ticket.
        self.db
            .add_pending_play(PendingPlay {
                request,
                user: *caller,
                campaign: *campaign,
                paid_fee: 0,
            })
            .await?;
        self.db.set_halftime_ticket(caller, false).await?;
        self.db
            .add_event(&Event::HeatmapPlayed {
                user: *caller,
                request,
            })
            .await?;
        Ok(request)
    }
    pub async fn play_second_halftime_with_chz(
        &mut self,
        caller: &UserAddress,
        campaign: &CampaignId,
        sent_value: ChzWei,
    ) -> Result<RequestId> {
        self.check_second_halftime_open(campaign).await?;
        let required = self.required_play_fee().await?;
        if sent_value < required {
            return Err(LedgerError::InsufficientChzSent.into());
        }
        let request = self.entropy.request_randomness().await?;
        self.note_entropy_sequence(&request).await?;
        self.db
            .add_pending_play(PendingPlay {
                request,
                user: *caller,
                campaign: *campaign,
                paid_fee: sent_value,
            })
            .await?;
        // No refund of excess: the payable path keeps whatever was sent.
        let collected = self.collected_fees().await? + sent_value;
        self.db
            .set_config(CONFIG_COLLECTED_FEES, collected.to_string())
            .await?;
        self.db
            .add_event(&Event::HeatmapPlayed {
                user: *caller,
                request,
            })
            .await?;
        Ok(request)
    }
    /// Fee in native wei, converted from the configured USD-cents fee at the
    /// current oracle price, rounded up so the fee can never be underpaid.
    pub async fn required_play_fee(&self) -> Result<ChzWei> {
        let fee_cents = self.play_fee_in_usd_cents().await?;
        let price = self.oracle.current_price().await?.price;
        if price <= Decimal::ZERO {
            bail!("oracle returned non-positive price {}", price);
        }
        let chz = Decimal::from(fee_cents) / Decimal::from(100) / price;
        (chz * Decimal::from(WEI_PER_CHZ))
            .ceil()
            .to_u128()
            .context("fee conversion out of range")
    }

    /// Resolves a pending play with the delivered entropy. Exactly one
    /// resolution per request id.
    pub async fn entropy_callback(
        &mut self,
        caller: &UserAddress,
        sequence: &RequestId,
        random_number: &str,
    ) -> Result<PlayOutcomeResponse> {
        if *caller != self.trusted_data_resolver().await? {
            return Err(LedgerError::Unauthorized.into());
        }
        let play = match self.db.get_pending_play(sequence).await? {
            Some(play) => play,
            None => return Err(LedgerError::RequestNotFound.into()),
        };
        let bytes = hex::decode(random_number.trim_start_matches("0x"))
            .context("random number is not valid hex")?;
        if bytes.len() < 8 {
            bail!("random number too short: {} bytes", bytes.len());
        }
        let value = u64::from_be_bytes(bytes[..8].try_into()?);
        let won = value % 100 < WIN_PROBABILITY_PERCENT;
        debug!(
            "Resolving play {} for user {}: rolled {} -> {}",
            sequence,
            play.user,
            value % 100,
            if won { "win" } else { "lose" }
        );
        let mut outcome = PlayOutcomeResponse {
            user: play.user,
            won,
            prize_token: None,
            wow_awarded: 0,
        };
        // The request stays pending until the mint succeeds; after it is
        // removed, a redelivered callback must not award a second time.
        if won {
            let prize = match self.db.first_available_prize(&play.campaign).await? {
                Some(prize) => prize,
                None => return Err(LedgerError::PrizeExhausted.into()),
            };
            let token = self.mint.mint_prize(&play.user, prize.id).await?;
            self.db.remove_pending_play(sequence).await?;
            self.db.decrement_prize_supply(&prize.id).await?;
            self.db
                .add_prize_token(token, &prize.id, &play.user, prize.uri)
                .await?;
            self.db
                .add_event(&Event::PrizeAwarded {
                    user: play.user,
                    prize: prize.id,
                    token,
                })
                .await?;
            outcome.prize_token = Some(token);
        } else {
            let amount = self.wow_token_per_bet_loss().await?;
            if amount > 0 {
                self.mint.credit_wow_tokens(&play.user, amount).await?;
            }
            self.db.remove_pending_play(sequence).await?;
            if amount > 0 {
                self.db.add_wow_balance(&play.user, amount).await?;
                self.db
                    .add_event(&Event::WOWTokensAwarded {
                        user: play.user,
                        amount,
                    })
                    .await?;
            }
            self.db
                .add_loyalty_points(&play.user, self.points_per_loss)
                .await?;
            outcome.wow_awarded = amount;
        }
        Ok(outcome)
    }

    pub async fn add_prize(
        &mut self,
        caller: &UserAddress,
        campaign: &CampaignId,
        description: String,
        uri: String,
        supply: u32,
    ) -> Result<PrizeId> {
        self.ensure_owner(caller)?;
        self.get_existing_campaign(campaign).await?;
        self.db.add_prize(campaign, description, uri, supply).await
    }
    pub async fn configure_loyalty_prize(
        &mut self,
        caller: &UserAddress,
        description: String,
        uri: String,
        supply: u32,
    ) -> Result<()> {
        self.ensure_owner(caller)?;
        self.db.put_loyalty_prize(description, uri, supply).await
    }
    /// Owner-controlled spend of accumulated loyalty points against the
    /// reserved loyalty prize pool.
    pub async fn award_loyalty_prize(
        &mut self,
        caller: &UserAddress,
        user: &UserAddress,
        points_cost: LoyaltyPoints,
    ) -> Result<TokenId> {
        self.ensure_owner(caller)?;
        let points = self.db.get_loyalty_points(user).await?;
        if points < points_cost {
            bail!(
                "user {} has {} loyalty points but the award costs {}",
                user,
                points,
                points_cost
            );
        }
        let prize = match self.db.get_prize(&LOYALTY_PRIZE_ID).await? {
            Some(prize) if prize.supply > 0 => prize,
            _ => return Err(LedgerError::PrizeExhausted.into()),
        };
        let token = self.mint.mint_prize(user, prize.id).await?;
        self.db.deduct_loyalty_points(user, points_cost).await?;
        self.db.decrement_prize_supply(&prize.id).await?;
        self.db
            .add_prize_token(token, &prize.id, user, prize.uri)
            .await?;
        self.db
            .add_event(&Event::PrizeAwarded {
                user: *user,
                prize: prize.id,
                token,
            })
            .await?;
        Ok(token)
    }

    pub async fn transfer_ownership(
        &mut self,
        caller: &UserAddress,
        new_owner: &UserAddress,
    ) -> Result<()> {
        self.ensure_owner(caller)?;
        self.db
            .set_config(CONFIG_OWNER, new_owner.to_string())
            .await?;
        self.owner = *new_owner;
        Ok(())
    }
    pub async fn update_play_fee(
        &mut self,
        caller: &UserAddress,
        fee_usd_cents: UsdCents,
    ) -> Result<()> {
        self.ensure_owner(caller)?;
        self.db
            .set_config(CONFIG_PLAY_FEE, fee_usd_cents.to_string())
            .await
    }
    pub async fn update_trusted_data_resolver(
        &mut self,
        caller: &UserAddress,
        resolver: &UserAddress,
    ) -> Result<()> {
        self.ensure_owner(caller)?;
        self.db
            .set_config(CONFIG_TRUSTED_RESOLVER, resolver.to_string())
            .await
    }
    pub async fn update_wow_token_per_bet_loss(
        &mut self,
        caller: &UserAddress,
        amount: WowAmount,
    ) -> Result<()> {
        self.ensure_owner(caller)?;
        self.db
            .set_config(CONFIG_WOW_PER_BET_LOSS, amount.to_string())
            .await
    }
    /// Converts the accumulated native fee balance into WOW tokens credited
    /// to the owner, at one WOW per whole native token, truncated.
    pub async fn swap_contract_balance_to_wow_tokens(
        &mut self,
        caller: &UserAddress,
    ) -> Result<WowAmount> {
        self.ensure_owner(caller)?;
        let fees = self.collected_fees().await?;
        let fees = Decimal::from_u128(fees).context("collected fee balance out of range")?;
        let amount = (fees / Decimal::from(WEI_PER_CHZ))
            .floor()
            .to_u32()
            .context("collected fee balance out of range")?;
        if amount > 0 {
            self.mint.credit_wow_tokens(&self.owner, amount).await?;
            self.db.add_wow_balance(&self.owner, amount).await?;
            self.db
                .add_event(&Event::WOWTokensAwarded {
                    user: self.owner,
                    amount,
                })
                .await?;
        }
        self.db
            .set_config(CONFIG_COLLECTED_FEES, 0.to_string())
            .await?;
        Ok(amount)
    }

    // Read surface
    pub async fn next_campaign_id(&self) -> Result<CampaignId> {
        self.db.next_campaign_id().await
    }
    pub async fn get_campaign(&self, campaign: &CampaignId) -> Result<CampaignResponse> {
        self.get_existing_campaign(campaign).await
    }
    pub async fn get_prediction_game(
        &self,
        campaign: &CampaignId,
    ) -> Result<PredictionGameResponse> {
        self.db
            .get_prediction_game(campaign)
            .await?
            .with_context(|| format!("no prediction game for campaign {}", campaign))
    }
    pub async fn get_prediction_ticket(
        &self,
        user: &UserAddress,
        campaign: &CampaignId,
    ) -> Result<PredictionTicketResponse> {
        match self.db.get_prediction_ticket(user, campaign).await? {
            Some(ticket) => Ok(ticket),
            None => Err(LedgerError::PredictionNotPlayed.into()),
        }
    }
    pub async fn user_has_halftime_ticket(&self, user: &UserAddress) -> Result<bool> {
        self.db.user_has_halftime_ticket(user).await
    }
    pub async fn user_loyalty_points(&self, user: &UserAddress) -> Result<LoyaltyPoints> {
        self.db.get_loyalty_points(user).await
    }
    pub async fn user_wow_tokens(&self, user: &UserAddress) -> Result<WowAmount> {
        self.db.get_wow_balance(user).await
    }
    pub async fn play_fee_in_usd_cents(&self) -> Result<UsdCents> {
        let fee = self
            .db
            .get_config(CONFIG_PLAY_FEE)
            .await?
            .context("play fee not configured")?;
        Ok(fee.parse()?)
    }
    pub async fn wow_token_per_bet_loss(&self) -> Result<WowAmount> {
        let amount = self
            .db
            .get_config(CONFIG_WOW_PER_BET_LOSS)
            .await?
            .context("wow token per bet loss not configured")?;
        Ok(amount.parse()?)
    }
    async fn note_entropy_sequence(&self, request: &RequestId) -> Result<()> {
        let last: RequestId = match self.db.get_config(CONFIG_LAST_SEQUENCE).await? {
            Some(last) => last.parse()?,
            None => 0,
        };
        if *request > last {
            self.db
                .set_config(CONFIG_LAST_SEQUENCE, request.to_string())
                .await?;
        }
        Ok(())
    }
    async fn collected_fees(&self) -> Result<ChzWei> {
        match self.db.get_config(CONFIG_COLLECTED_FEES).await? {
            Some(fees) => fees.parse().context("couldn't parse collected fees"),
            None => Ok(0),
        }
    }
    pub async fn get_prize(&self, prize: &PrizeId) -> Result<PrizeResponse> {
        self.db
            .get_prize(prize)
            .await?
            .with_context(|| format!("no prize {}", prize))
    }
    pub async fn next_prize_id(&self) -> Result<PrizeId> {
        self.db.next_prize_id().await
    }
    pub async fn next_token_id(&self) -> Result<TokenId> {
        self.db.next_token_id().await
    }
    pub async fn token_uri(&self, token: &TokenId) -> Result<String> {
        let token = self
            .db
            .get_prize_token(token)
            .await?
            .with_context(|| format!("no token {}", token))?;
        Ok(token.uri)
    }
    pub async fn user_prize_tokens(&self, user: &UserAddress) -> Result<Vec<PrizeTokenResponse>> {
        self.db.get_user_prize_tokens(user).await
    }
    pub async fn get_events(&self) -> Result<Vec<Event>> {
        self.db.get_events().await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::clock::TestClock;
    use crate::db::SQLite;
    use crate::entropy::TestEntropySource;
    use crate::mint::TestMintSink;
    use crate::oracle::TestPriceOracle;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use secp256k1::{generate_keypair, rand};

    // First 8 bytes roll 0 and 50 against WIN_PROBABILITY_PERCENT = 20.
    const WINNING_RANDOM: &str =
        "0000000000000000000000000000000000000000000000000000000000000000";
    const LOSING_RANDOM: &str =
        "0000000000000032000000000000000000000000000000000000000000000000";

    struct Harness {
        ledger: Ledger,
        clock: TestClock,
        entropy: TestEntropySource,
        mint: TestMintSink,
        owner: UserAddress,
        resolver: UserAddress,
    }

    fn new_user() -> UserAddress {
        generate_keypair(&mut rand::thread_rng()).1
    }
    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    async fn harness_with_price(price: Decimal) -> Harness {
        let owner = new_user();
        let resolver = new_user();
        let clock = TestClock::at_timestamp(0);
        let entropy = TestEntropySource::default();
        let mint = TestMintSink::default();
        let ledger = Ledger::new(
            Box::new(SQLite::new(None).await),
            Box::new(entropy.clone()),
            Box::new(TestPriceOracle::new(price)),
            Box::new(mint.clone()),
            Box::new(clock.clone()),
            owner,
            resolver,
            100,
            5,
            1,
        )
        .await
        .unwrap();
        Harness {
            ledger,
            clock,
            entropy,
            mint,
            owner,
            resolver,
        }
    }
    async fn harness() -> Harness {
        harness_with_price(dec!(0.10)).await
    }
    // For restart tests: fixed keys and a caller-chosen db and entropy source.
    async fn harness_on(
        db_conn: Option<String>,
        entropy: TestEntropySource,
        owner: UserAddress,
        resolver: UserAddress,
    ) -> Harness {
        let clock = TestClock::at_timestamp(0);
        let mint = TestMintSink::default();
        let ledger = Ledger::new(
            Box::new(SQLite::new(db_conn).await),
            Box::new(entropy.clone()),
            Box::new(TestPriceOracle::default()),
            Box::new(mint.clone()),
            Box::new(clock.clone()),
            owner,
            resolver,
            100,
            5,
            1,
        )
        .await
        .unwrap();
        Harness {
            ledger,
            clock,
            entropy,
            mint,
            owner,
            resolver,
        }
    }
    fn temp_db(name: &str) -> String {
        let path = std::env::temp_dir().join(format!(
            "matchday-{}-{}.db",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        format!("sqlite://{}?mode=rwc", path.display())
    }

    fn psg_lyon() -> CampaignInput {
        CampaignInput {
            team1: "PSG".to_string(),
            team2: "Lyon".to_string(),
            start_prediction_game: at(1000),
            end_prediction_game: at(2000),
            start_second_halftime_game: at(2000),
            end_second_halftime_game: at(2900),
        }
    }
    async fn active_campaign(h: &mut Harness) -> CampaignId {
        let owner = h.owner;
        let id = h.ledger.create_campaign(&owner, psg_lyon()).await.unwrap();
        h.ledger
            .set_campaign_active(&owner, &id, true)
            .await
            .unwrap();
        id
    }

    fn assert_rejected(result: anyhow::Error, expected: LedgerError) {
        assert_eq!(result.downcast_ref::<LedgerError>(), Some(&expected));
    }

    #[tokio::test]
    async fn campaign_round_trip() {
        let mut h = harness().await;
        let owner = h.owner;
        let id = h.ledger.create_campaign(&owner, psg_lyon()).await.unwrap();
        assert_eq!(id, 1);
        assert_eq!(h.ledger.next_campaign_id().await.unwrap(), 2);
        let campaign = h.ledger.get_campaign(&id).await.unwrap();
        assert_eq!(
            campaign,
            CampaignResponse {
                id,
                team1: "PSG".to_string(),
                team2: "Lyon".to_string(),
                start_prediction_game: at(1000),
                end_prediction_game: at(2000),
                start_second_halftime_game: at(2000),
                end_second_halftime_game: at(2900),
                active: false,
            }
        );
        h.ledger
            .set_campaign_active(&owner, &id, true)
            .await
            .unwrap();
        assert!(h.ledger.get_campaign(&id).await.unwrap().active);
    }

    #[tokio::test]
    async fn campaign_creation_rejections() {
        let mut h = harness().await;
        let owner = h.owner;
        let user = new_user();
        let mut backwards = psg_lyon();
        backwards.start_prediction_game = at(2000);
        backwards.end_prediction_game = at(1000);
        h.ledger.create_campaign(&owner, backwards).await.unwrap_err();
        let mut backwards = psg_lyon();
        backwards.start_second_halftime_game = at(2900);
        backwards.end_second_halftime_game = at(2900);
        h.ledger.create_campaign(&owner, backwards).await.unwrap_err();
        let err = h.ledger.create_campaign(&user, psg_lyon()).await.unwrap_err();
        assert_rejected(err, LedgerError::Unauthorized);
        let err = h
            .ledger
            .set_campaign_active(&owner, &7, true)
            .await
            .unwrap_err();
        assert_rejected(err, LedgerError::CampaignDoesNotExist);
        assert_eq!(h.ledger.next_campaign_id().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn one_prediction_ticket_per_campaign() {
        let mut h = harness().await;
        let id = active_campaign(&mut h).await;
        let user = new_user();
        h.clock.set_timestamp(1500);
        h.ledger
            .submit_predictions(&user, &id, 2, 0)
            .await
            .unwrap();
        let ticket = h.ledger.get_prediction_ticket(&user, &id).await.unwrap();
        assert_eq!(ticket.team1_score, 2);
        assert_eq!(ticket.team2_score, 0);
        assert!(!ticket.checked);
        let err = h
            .ledger
            .submit_predictions(&user, &id, 1, 1)
            .await
            .unwrap_err();
        assert_rejected(err, LedgerError::AlreadyHasTicket);
        // unchanged by the rejected resubmission
        let ticket = h.ledger.get_prediction_ticket(&user, &id).await.unwrap();
        assert_eq!((ticket.team1_score, ticket.team2_score), (2, 0));
    }

    #[tokio::test]
    async fn prediction_window_is_enforced() {
        let mut h = harness().await;
        let owner = h.owner;
        let id = active_campaign(&mut h).await;
        let user = new_user();
        h.clock.set_timestamp(500);
        let err = h
            .ledger
            .submit_predictions(&user, &id, 1, 1)
            .await
            .unwrap_err();
        assert_rejected(err, LedgerError::PredictionGameNotActive);
        h.clock.set_timestamp(2100);
        let err = h
            .ledger
            .submit_predictions(&user, &id, 1, 1)
            .await
            .unwrap_err();
        assert_rejected(err, LedgerError::PredictionGameNotActive);
        h.clock.set_timestamp(1500);
        h.ledger
            .set_campaign_active(&owner, &id, false)
            .await
            .unwrap();
        let err = h
            .ledger
            .submit_predictions(&user, &id, 1, 1)
            .await
            .unwrap_err();
        assert_rejected(err, LedgerError::CampaignNotActive);
        let err = h
            .ledger
            .submit_predictions(&user, &9, 1, 1)
            .await
            .unwrap_err();
        assert_rejected(err, LedgerError::CampaignDoesNotExist);
    }

    #[tokio::test]
    async fn resolve_and_check_flow() {
        let mut h = harness().await;
        let owner = h.owner;
        let id = active_campaign(&mut h).await;
        let winner = new_user();
        let loser = new_user();
        h.ledger
            .create_prediction_game(&owner, &id, "Halftime score?".to_string())
            .await
            .unwrap();
        let err = h
            .ledger
            .create_prediction_game(&owner, &id, "Again?".to_string())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
        h.clock.set_timestamp(1500);
        h.ledger
            .submit_predictions(&winner, &id, 2, 0)
            .await
            .unwrap();
        h.ledger
            .submit_predictions(&loser, &id, 1, 1)
            .await
            .unwrap();
        // can't check before resolution
        let err = h
            .ledger
            .check_prediction_result(&winner, &id)
            .await
            .unwrap_err();
        assert_rejected(err, LedgerError::GameNotResolved);
        h.ledger
            .resolve_prediction_game(&owner, &id, 2, 0)
            .await
            .unwrap();
        let err = h
            .ledger
            .resolve_prediction_game(&owner, &id, 2, 0)
            .await
            .unwrap_err();
        assert_rejected(err, LedgerError::MarketAlreadyResolved);
        let game = h.ledger.get_prediction_game(&id).await.unwrap();
        assert!(game.resolved);
        assert_eq!((game.team1_score, game.team2_score), (2, 0));

        assert!(h.ledger.check_prediction_result(&winner, &id).await.unwrap());
        assert!(h.ledger.user_has_halftime_ticket(&winner).await.unwrap());
        let err = h
            .ledger
            .check_prediction_result(&winner, &id)
            .await
            .unwrap_err();
        assert_rejected(err, LedgerError::AlreadyChecked);
        assert!(h.ledger.user_has_halftime_ticket(&winner).await.unwrap());

        assert!(!h.ledger.check_prediction_result(&loser, &id).await.unwrap());
        assert!(!h.ledger.user_has_halftime_ticket(&loser).await.unwrap());

        let err = h
            .ledger
            .check_prediction_result(&new_user(), &id)
            .await
            .unwrap_err();
        assert_rejected(err, LedgerError::PredictionNotPlayed);
    }

    #[tokio::test]
    async fn trusted_resolver_may_resolve() {
        let mut h = harness().await;
        let owner = h.owner;
        let resolver = h.resolver;
        let id = active_campaign(&mut h).await;
        h.ledger
            .create_prediction_game(&owner, &id, "Score?".to_string())
            .await
            .unwrap();
        let err = h
            .ledger
            .resolve_prediction_game(&new_user(), &id, 1, 0)
            .await
            .unwrap_err();
        assert_rejected(err, LedgerError::Unauthorized);
        h.ledger
            .resolve_prediction_game(&resolver, &id, 1, 0)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn ticket_play_and_winning_callback() {
        let mut h = harness().await;
        let owner = h.owner;
        let resolver = h.resolver;
        let id = active_campaign(&mut h).await;
        let user = new_user();
        h.ledger
            .add_prize(&owner, &id, "Signed jersey".to_string(), "ipfs://jersey".to_string(), 3)
            .await
            .unwrap();
        h.ledger
            .get_second_halftime_free_ticket(&user, &id)
            .await
            .unwrap();
        assert!(h.ledger.user_has_halftime_ticket(&user).await.unwrap());

        h.clock.set_timestamp(3000);
        let err = h
            .ledger
            .play_second_halftime_with_ticket(&user, &id)
            .await
            .unwrap_err();
        assert_rejected(err, LedgerError::SecondHalftimeGameNotActive);

        h.clock.set_timestamp(2500);
        let request = h
            .ledger
            .play_second_halftime_with_ticket(&user, &id)
            .await
            .unwrap();
        assert_eq!(request, 1);
        assert!(!h.ledger.user_has_halftime_ticket(&user).await.unwrap());
        let err = h
            .ledger
            .play_second_halftime_with_ticket(&user, &id)
            .await
            .unwrap_err();
        assert_rejected(err, LedgerError::NoFreeTickets);

        let err = h
            .ledger
            .entropy_callback(&user, &request, WINNING_RANDOM)
            .await
            .unwrap_err();
        assert_rejected(err, LedgerError::Unauthorized);
        let outcome = h
            .ledger
            .entropy_callback(&resolver, &request, WINNING_RANDOM)
            .await
            .unwrap();
        assert!(outcome.won);
        let token = outcome.prize_token.unwrap();
        assert_eq!(h.ledger.get_prize(&1).await.unwrap().supply, 2);
        assert_eq!(
            h.ledger.token_uri(&token).await.unwrap(),
            "ipfs://jersey".to_string()
        );
        assert_eq!(h.mint.minted().len(), 1);
        // one resolution per request id
        let err = h
            .ledger
            .entropy_callback(&resolver, &request, WINNING_RANDOM)
            .await
            .unwrap_err();
        assert_rejected(err, LedgerError::RequestNotFound);
    }

    #[tokio::test]
    async fn paid_play_fee_and_losing_callback() {
        let mut h = harness().await;
        let resolver = h.resolver;
        let id = active_campaign(&mut h).await;
        let user = new_user();
        h.clock.set_timestamp(2500);
        // 100 cents at 0.10 USD/CHZ is 10 CHZ
        let required = h.ledger.required_play_fee().await.unwrap();
        assert_eq!(required, 10 * WEI_PER_CHZ as ChzWei);
        let err = h
            .ledger
            .play_second_halftime_with_chz(&user, &id, required - 1)
            .await
            .unwrap_err();
        assert_rejected(err, LedgerError::InsufficientChzSent);
        // the rejected play must not leak a randomness request
        assert_eq!(h.entropy.issued(), 0);

        let request = h
            .ledger
            .play_second_halftime_with_chz(&user, &id, required)
            .await
            .unwrap();
        let outcome = h
            .ledger
            .entropy_callback(&resolver, &request, LOSING_RANDOM)
            .await
            .unwrap();
        assert!(!outcome.won);
        assert_eq!(outcome.wow_awarded, 5);
        assert_eq!(h.ledger.user_wow_tokens(&user).await.unwrap(), 5);
        assert_eq!(h.mint.wow_credited(&user), 5);
        assert_eq!(h.ledger.user_loyalty_points(&user).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn fee_conversion_rounds_up() {
        let h = harness_with_price(dec!(0.30)).await;
        // 1 USD / 0.30 USD-per-CHZ = 3.333... CHZ, rounded up at wei scale
        let required = h.ledger.required_play_fee().await.unwrap();
        assert_eq!(required, 3_333_333_333_333_333_334);
    }

    #[tokio::test]
    async fn prize_exhaustion_rejects_award() {
        let mut h = harness().await;
        let owner = h.owner;
        let resolver = h.resolver;
        let id = active_campaign(&mut h).await;
        let user = new_user();
        h.ledger
            .add_prize(&owner, &id, "Scarf".to_string(), "ipfs://scarf".to_string(), 1)
            .await
            .unwrap();
        h.clock.set_timestamp(2500);
        let fee = h.ledger.required_play_fee().await.unwrap();
        let first = h
            .ledger
            .play_second_halftime_with_chz(&user, &id, fee)
            .await
            .unwrap();
        let second = h
            .ledger
            .play_second_halftime_with_chz(&user, &id, fee)
            .await
            .unwrap();
        h.ledger
            .entropy_callback(&resolver, &first, WINNING_RANDOM)
            .await
            .unwrap();
        assert_eq!(h.ledger.get_prize(&1).await.unwrap().supply, 0);
        let err = h
            .ledger
            .entropy_callback(&resolver, &second, WINNING_RANDOM)
            .await
            .unwrap_err();
        assert_rejected(err, LedgerError::PrizeExhausted);
        // supply must not wrap below zero
        assert_eq!(h.ledger.get_prize(&1).await.unwrap().supply, 0);
    }

    #[tokio::test]
    async fn loyalty_prize_flows() {
        let mut h = harness().await;
        let owner = h.owner;
        let resolver = h.resolver;
        let id = active_campaign(&mut h).await;
        let user = new_user();
        h.ledger
            .configure_loyalty_prize(&owner, "Loyalty badge".to_string(), "ipfs://badge".to_string(), 10)
            .await
            .unwrap();
        // losing plays accrue points
        h.clock.set_timestamp(2500);
        let fee = h.ledger.required_play_fee().await.unwrap();
        for _ in 0..3 {
            let request = h
                .ledger
                .play_second_halftime_with_chz(&user, &id, fee)
                .await
                .unwrap();
            h.ledger
                .entropy_callback(&resolver, &request, LOSING_RANDOM)
                .await
                .unwrap();
        }
        assert_eq!(h.ledger.user_loyalty_points(&user).await.unwrap(), 3);
        h.ledger
            .award_loyalty_prize(&owner, &user, 5)
            .await
            .unwrap_err();
        let token = h.ledger.award_loyalty_prize(&owner, &user, 2).await.unwrap();
        assert_eq!(h.ledger.user_loyalty_points(&user).await.unwrap(), 1);
        assert_eq!(
            h.ledger.get_prize(&LOYALTY_PRIZE_ID).await.unwrap().supply,
            9
        );
        let tokens = h.ledger.user_prize_tokens(&user).await.unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].token, token);
        assert_eq!(tokens[0].prize, LOYALTY_PRIZE_ID);
    }

    #[tokio::test]
    async fn owner_config_updates() {
        let mut h = harness().await;
        let owner = h.owner;
        let user = new_user();
        h.ledger.update_play_fee(&owner, 250).await.unwrap();
        assert_eq!(h.ledger.play_fee_in_usd_cents().await.unwrap(), 250);
        h.ledger
            .update_wow_token_per_bet_loss(&owner, 7)
            .await
            .unwrap();
        assert_eq!(h.ledger.wow_token_per_bet_loss().await.unwrap(), 7);
        let err = h.ledger.update_play_fee(&user, 1).await.unwrap_err();
        assert_rejected(err, LedgerError::Unauthorized);
        h.ledger
            .update_trusted_data_resolver(&owner, &user)
            .await
            .unwrap();
        // new resolver may now deliver callbacks, old one may not
        let id = active_campaign(&mut h).await;
        let player = new_user();
        h.ledger
            .get_second_halftime_free_ticket(&player, &id)
            .await
            .unwrap();
        h.clock.set_timestamp(2500);
        let request = h
            .ledger
            .play_second_halftime_with_ticket(&player, &id)
            .await
            .unwrap();
        let old_resolver = h.resolver;
        let err = h
            .ledger
            .entropy_callback(&old_resolver, &request, LOSING_RANDOM)
            .await
            .unwrap_err();
        assert_rejected(err, LedgerError::Unauthorized);
        h.ledger
            .entropy_callback(&user, &request, LOSING_RANDOM)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn failed_play_does_not_consume_ticket() {
        let db = temp_db("ticket-atomicity");
        let owner = new_user();
        let resolver = new_user();
        let first = new_user();
        let mut h = harness_on(
            Some(db.clone()),
            TestEntropySource::default(),
            owner,
            resolver,
        )
        .await;
        let id = active_campaign(&mut h).await;
        h.ledger
            .get_second_halftime_free_ticket(&first, &id)
            .await
            .unwrap();
        h.clock.set_timestamp(2500);
        // leaves request 1 pending
        h.ledger
            .play_second_halftime_with_ticket(&first, &id)
            .await
            .unwrap();

        // a ledger brought up on the same store with a reset sequence
        // counter collides with the surviving pending play
        let second = new_user();
        let mut h = harness_on(Some(db), TestEntropySource::default(), owner, resolver).await;
        h.ledger
            .get_second_halftime_free_ticket(&second, &id)
            .await
            .unwrap();
        h.clock.set_timestamp(2500);
        h.ledger
            .play_second_halftime_with_ticket(&second, &id)
            .await
            .unwrap_err();
        // the rejected play must leave the ticket in place
        assert!(h.ledger.user_has_halftime_ticket(&second).await.unwrap());
    }

    #[tokio::test]
    async fn request_ids_continue_after_restart() {
        let db = temp_db("sequence-restart");
        let owner = new_user();
        let resolver = new_user();
        let user = new_user();
        let mut h = harness_on(
            Some(db.clone()),
            TestEntropySource::default(),
            owner,
            resolver,
        )
        .await;
        let id = active_campaign(&mut h).await;
        h.clock.set_timestamp(2500);
        let fee = h.ledger.required_play_fee().await.unwrap();
        let first = h
            .ledger
            .play_second_halftime_with_chz(&user, &id, fee)
            .await
            .unwrap();
        assert_eq!(first, 1);

        // a restart seeds the entropy source from the stored high-water
        // mark instead of starting over at 1
        let store = SQLite::new(Some(db.clone())).await;
        let last: RequestId = store
            .get_config(CONFIG_LAST_SEQUENCE)
            .await
            .unwrap()
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(last, 1);
        let mut h = harness_on(
            Some(db),
            TestEntropySource::starting_after(last),
            owner,
            resolver,
        )
        .await;
        h.clock.set_timestamp(2500);
        let second = h
            .ledger
            .play_second_halftime_with_chz(&user, &id, fee)
            .await
            .unwrap();
        assert_eq!(second, 2);
        // both plays resolve independently
        let outcome = h
            .ledger
            .entropy_callback(&resolver, &first, LOSING_RANDOM)
            .await
            .unwrap();
        assert!(!outcome.won);
        h.ledger
            .entropy_callback(&resolver, &second, LOSING_RANDOM)
            .await
            .unwrap();
        assert_eq!(h.ledger.user_loyalty_points(&user).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn ownership_transfer() {
        let db = temp_db("ownership");
        let owner = new_user();
        let resolver = new_user();
        let new_owner = new_user();
        let mut h = harness_on(
            Some(db.clone()),
            TestEntropySource::default(),
            owner,
            resolver,
        )
        .await;
        let err = h
            .ledger
            .transfer_ownership(&new_owner, &new_owner)
            .await
            .unwrap_err();
        assert_rejected(err, LedgerError::Unauthorized);
        h.ledger
            .transfer_ownership(&owner, &new_owner)
            .await
            .unwrap();
        let err = h.ledger.update_play_fee(&owner, 1).await.unwrap_err();
        assert_rejected(err, LedgerError::Unauthorized);
        h.ledger.update_play_fee(&new_owner, 250).await.unwrap();

        // the stored owner wins over the constructor argument after a restart
        let mut h = harness_on(Some(db), TestEntropySource::default(), owner, resolver).await;
        let err = h.ledger.update_play_fee(&owner, 1).await.unwrap_err();
        assert_rejected(err, LedgerError::Unauthorized);
        h.ledger.update_play_fee(&new_owner, 300).await.unwrap();
    }

    #[tokio::test]
    async fn swap_collected_fees_to_wow() {
        let mut h = harness().await;
        let owner = h.owner;
        let id = active_campaign(&mut h).await;
        let user = new_user();
        h.clock.set_timestamp(2500);
        let fee = h.ledger.required_play_fee().await.unwrap();
        h.ledger
            .play_second_halftime_with_chz(&user, &id, fee)
            .await
            .unwrap();
        // 10 CHZ collected swaps into 10 WOW for the owner
        let swapped = h
            .ledger
            .swap_contract_balance_to_wow_tokens(&owner)
            .await
            .unwrap();
        assert_eq!(swapped, 10);
        assert_eq!(h.ledger.user_wow_tokens(&owner).await.unwrap(), 10);
        let swapped = h
            .ledger
            .swap_contract_balance_to_wow_tokens(&owner)
            .await
            .unwrap();
        assert_eq!(swapped, 0);
    }

    #[tokio::test]
    async fn events_are_recorded_in_order() {
        let mut h = harness().await;
        let owner = h.owner;
        let id = active_campaign(&mut h).await;
        let user = new_user();
        h.clock.set_timestamp(1500);
        h.ledger
            .submit_predictions(&user, &id, 3, 1)
            .await
            .unwrap();
        let events = h.ledger.get_events().await.unwrap();
        assert_eq!(
            events,
            vec![
                Event::CampaignCreated {
                    campaign: id,
                    team1: "PSG".to_string(),
                    team2: "Lyon".to_string(),
                },
                Event::PredictionsSubmitted {
                    user,
                    campaign: id,
                    team1_score: 3,
                    team2_score: 1,
                },
            ]
        );
    }
}
