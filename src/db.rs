use crate::api::*;
use crate::ledger::{CampaignInput, PendingPlay};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::TimeZone;
use chrono::Utc;
use sqlx::{query, Executor, Pool, Row, SqlitePool};
use std::str::FromStr;

#[async_trait]
pub trait DB {
    async fn add_campaign(&self, campaign: CampaignInput) -> Result<CampaignId>;
    async fn get_campaign(&self, campaign: &CampaignId) -> Result<Option<CampaignResponse>>;
    async fn set_campaign_active(&self, campaign: &CampaignId, active: bool) -> Result<()>;
    async fn next_campaign_id(&self) -> Result<CampaignId>;

    async fn add_prediction_game(&self, campaign: &CampaignId, question: String) -> Result<()>;
    async fn get_prediction_game(
        &self,
        campaign: &CampaignId,
    ) -> Result<Option<PredictionGameResponse>>;
    async fn resolve_prediction_game(
        &self,
        campaign: &CampaignId,
        team1_score: Score,
        team2_score: Score,
    ) -> Result<()>;

    async fn add_prediction_ticket(
        &self,
        user: &UserAddress,
        campaign: &CampaignId,
        team1_score: Score,
        team2_score: Score,
    ) -> Result<()>;
    async fn get_prediction_ticket(
        &self,
        user: &UserAddress,
        campaign: &CampaignId,
    ) -> Result<Option<PredictionTicketResponse>>;
    async fn set_prediction_ticket_checked(
        &self,
        user: &UserAddress,
        campaign: &CampaignId,
    ) -> Result<()>;

    async fn user_has_halftime_ticket(&self, user: &UserAddress) -> Result<bool>;
    async fn set_halftime_ticket(&self, user: &UserAddress, has_ticket: bool) -> Result<()>;

    async fn add_prize(
        &self,
        campaign: &CampaignId,
        description: String,
        uri: String,
        supply: u32,
    ) -> Result<PrizeId>;
    async fn put_loyalty_prize(&self, description: String, uri: String, supply: u32)
        -> Result<()>;
    async fn get_prize(&self, prize: &PrizeId) -> Result<Option<PrizeResponse>>;
    async fn first_available_prize(&self, campaign: &CampaignId)
        -> Result<Option<PrizeResponse>>;
    async fn decrement_prize_supply(&self, prize: &PrizeId) -> Result<()>;
    async fn next_prize_id(&self) -> Result<PrizeId>;

    async fn add_prize_token(
        &self,
        token: TokenId,
        prize: &PrizeId,
        owner: &UserAddress,
        uri: String,
    ) -> Result<()>;
    async fn get_prize_token(&self, token: &TokenId) -> Result<Option<PrizeTokenResponse>>;
    async fn get_user_prize_tokens(&self, owner: &UserAddress) -> Result<Vec<PrizeTokenResponse>>;
    async fn next_token_id(&self) -> Result<TokenId>;

    async fn get_loyalty_points(&self, user: &UserAddress) -> Result<LoyaltyPoints>;
    async fn add_loyalty_points(&self, user: &UserAddress, points: LoyaltyPoints) -> Result<()>;
    async fn deduct_loyalty_points(&self, user: &UserAddress, points: LoyaltyPoints)
        -> Result<()>;
    async fn get_wow_balance(&self, user: &UserAddress) -> Result<WowAmount>;
    async fn add_wow_balance(&self, user: &UserAddress, amount: WowAmount) -> Result<()>;

    async fn add_pending_play(&self, play: PendingPlay) -> Result<()>;
    async fn get_pending_play(&self, request: &RequestId) -> Result<Option<PendingPlay>>;
    async fn remove_pending_play(&self, request: &RequestId) -> Result<()>;

    async fn get_config(&self, key: &str) -> Result<Option<String>>;
    async fn set_config(&self, key: &str, value: String) -> Result<()>;

    async fn add_event(&self, event: &Event) -> Result<()>;
    async fn get_events(&self) -> Result<Vec<Event>>;
}

pub struct SQLite {
    connection: SqlitePool,
}
impl SQLite {
    pub async fn new(db_conn: Option<String>) -> Self {
        let connection = Pool::connect(
            db_conn
                .unwrap_or("sqlite::memory:".to_string())
                .as_str(),
        )
        .await
        .unwrap();
        connection
            .execute(
                "CREATE TABLE IF NOT EXISTS campaigns (\
                id INTEGER PRIMARY KEY,\
            team1 NOT NULL,\
            team2 NOT NULL,\
            start_prediction NOT NULL,\
            end_prediction NOT NULL,\
            start_halftime NOT NULL,\
            end_halftime NOT NULL,\
            active NOT NULL DEFAULT FALSE\
            )",
            )
            .await
            .unwrap();
        connection
            .execute(
                "CREATE TABLE IF NOT EXISTS prediction_games (\
            campaign NOT NULL,\
            question NOT NULL,\
            team1_score NOT NULL DEFAULT 0,\
            team2_score NOT NULL DEFAULT 0,\
            resolved NOT NULL DEFAULT FALSE,\
            PRIMARY KEY (campaign)\
            )",
            )
            .await
            .unwrap();
        connection
            .execute(
                "CREATE TABLE IF NOT EXISTS prediction_tickets (\
            user NOT NULL,\
            campaign NOT NULL,\
            team1_score NOT NULL,\
            team2_score NOT NULL,\
            checked NOT NULL DEFAULT FALSE,\
            PRIMARY KEY (user,campaign)\
            )",
            )
            .await
            .unwrap();
        connection
            .execute(
                "CREATE TABLE IF NOT EXISTS halftime_tickets (\
            user,\
            PRIMARY KEY (user)\
            )",
            )
            .await
            .unwrap();
        connection
            .execute(
                "CREATE TABLE IF NOT EXISTS prizes (\
            id INTEGER PRIMARY KEY,\
            campaign NOT NULL,\
            description NOT NULL,\
            uri NOT NULL,\
            supply NOT NULL\
            )",
            )
            .await
            .unwrap();
        connection
            .execute(
                "CREATE TABLE IF NOT EXISTS prize_tokens (\
            token INTEGER PRIMARY KEY,\
            prize NOT NULL,\
            owner NOT NULL,\
            uri NOT NULL\
            )",
            )
            .await
            .unwrap();
        connection
            .execute(
                "CREATE TABLE IF NOT EXISTS loyalty_points (\
            user,\
            points NOT NULL DEFAULT 0,\
            PRIMARY KEY (user)\
            )",
            )
            .await
            .unwrap();
        connection
            .execute(
                "CREATE TABLE IF NOT EXISTS wow_balances (\
            user,\
            amount NOT NULL DEFAULT 0,\
            PRIMARY KEY (user)\
            )",
            )
            .await
            .unwrap();
        connection
            .execute(
                "CREATE TABLE IF NOT EXISTS pending_plays (\
            request,\
            user NOT NULL,\
            campaign NOT NULL,\
            paid_fee NOT NULL,\
            PRIMARY KEY (request)\
            )",
            )
            .await
            .unwrap();
        connection
            .execute(
                "CREATE TABLE IF NOT EXISTS config (\
            key,\
            value NOT NULL,\
            PRIMARY KEY (key)\
            )",
            )
            .await
            .unwrap();
        connection
            .execute(
                "CREATE TABLE IF NOT EXISTS events (\
            created NOT NULL,\
            event NOT NULL\
            )",
            )
            .await
            .unwrap();
        Self { connection }
    }

    fn campaign_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<CampaignResponse> {
        Ok(CampaignResponse {
            id: row.get("id"),
            team1: row.get("team1"),
            team2: row.get("team2"),
            start_prediction_game: Utc
                .timestamp_opt(row.get("start_prediction"), 0)
                .single()
                .context("invalid start_prediction timestamp")?,
            end_prediction_game: Utc
                .timestamp_opt(row.get("end_prediction"), 0)
                .single()
                .context("invalid end_prediction timestamp")?,
            start_second_halftime_game: Utc
                .timestamp_opt(row.get("start_halftime"), 0)
                .single()
                .context("invalid start_halftime timestamp")?,
            end_second_halftime_game: Utc
                .timestamp_opt(row.get("end_halftime"), 0)
                .single()
                .context("invalid end_halftime timestamp")?,
            active: row.get("active"),
        })
    }
    fn prize_from_row(row: &sqlx::sqlite::SqliteRow) -> PrizeResponse {
        PrizeResponse {
            id: row.get("id"),
            campaign: row.get("campaign"),
            description: row.get("description"),
            uri: row.get("uri"),
            supply: row.get("supply"),
        }
    }
}

#[async_trait]
impl DB for SQLite {
    async fn add_campaign(&self, campaign: CampaignInput) -> Result<CampaignId> {
        let id = self
            .connection
            .execute(
                query(
                    "INSERT INTO campaigns (\
            team1,\
            team2,\
            start_prediction,\
            end_prediction,\
            start_halftime,\
            end_halftime,\
            active)\
            VALUES (?,?,?,?,?,?,FALSE)",
                )
                .bind(campaign.team1)
                .bind(campaign.team2)
                .bind(campaign.start_prediction_game.timestamp())
                .bind(campaign.end_prediction_game.timestamp())
                .bind(campaign.start_second_halftime_game.timestamp())
                .bind(campaign.end_second_halftime_game.timestamp()),
            )
            .await?
            .last_insert_rowid();
        Ok(id)
    }
    async fn get_campaign(&self, campaign: &CampaignId) -> Result<Option<CampaignResponse>> {
        let row = self
            .connection
            .fetch_optional(query("SELECT * FROM campaigns WHERE id = ?").bind(campaign))
            .await?;
        match row {
            Some(row) => Ok(Some(Self::campaign_from_row(&row)?)),
            None => Ok(None),
        }
    }
    async fn set_campaign_active(&self, campaign: &CampaignId, active: bool) -> Result<()> {
        self.connection
            .execute(
                query("UPDATE campaigns SET active = ? WHERE id = ?")
                    .bind(active)
                    .bind(campaign),
            )
            .await?;
        Ok(())
    }
    async fn next_campaign_id(&self) -> Result<CampaignId> {
        let row = self
            .connection
            .fetch_one(query("SELECT COALESCE(MAX(id),0) + 1 AS next FROM campaigns"))
            .await?;
        Ok(row.get("next"))
    }

    async fn add_prediction_game(&self, campaign: &CampaignId, question: String) -> Result<()> {
        self.connection
            .execute(
                query("INSERT INTO prediction_games (campaign, question) VALUES (?,?)")
                    .bind(campaign)
                    .bind(question),
            )
            .await?;
        Ok(())
    }
    async fn get_prediction_game(
        &self,
        campaign: &CampaignId,
    ) -> Result<Option<PredictionGameResponse>> {
        let row = self
            .connection
            .fetch_optional(
                query("SELECT * FROM prediction_games WHERE campaign = ?").bind(campaign),
            )
            .await?;
        Ok(row.map(|row| PredictionGameResponse {
            campaign: row.get("campaign"),
            question: row.get("question"),
            team1_score: row.get::<u32, _>("team1_score") as Score,
            team2_score: row.get::<u32, _>("team2_score") as Score,
            resolved: row.get("resolved"),
        }))
    }
    async fn resolve_prediction_game(
        &self,
        campaign: &CampaignId,
        team1_score: Score,
        team2_score: Score,
    ) -> Result<()> {
        self.connection
            .execute(
                query(
                    "UPDATE prediction_games \
                SET team1_score = ?, team2_score = ?, resolved = TRUE \
                WHERE campaign = ?",
                )
                .bind(team1_score as u32)
                .bind(team2_score as u32)
                .bind(campaign),
            )
            .await?;
        Ok(())
    }

    async fn add_prediction_ticket(
        &self,
        user: &UserAddress,
        campaign: &CampaignId,
        team1_score: Score,
        team2_score: Score,
    ) -> Result<()> {
        self.connection
            .execute(
                query(
                    "INSERT INTO prediction_tickets (\
                user,\
                campaign,\
                team1_score,\
                team2_score)\
                VALUES (?,?,?,?)",
                )
                .bind(user.to_string())
                .bind(campaign)
                .bind(team1_score as u32)
                .bind(team2_score as u32),
            )
            .await?;
        Ok(())
    }
    async fn get_prediction_ticket(
        &self,
        user: &UserAddress,
        campaign: &CampaignId,
    ) -> Result<Option<PredictionTicketResponse>> {
        let row = self
            .connection
            .fetch_optional(
                query("SELECT * FROM prediction_tickets WHERE user = ? AND campaign = ?")
                    .bind(user.to_string())
                    .bind(campaign),
            )
            .await?;
        match row {
            Some(row) => Ok(Some(PredictionTicketResponse {
                user: UserAddress::from_str(row.get::<String, _>("user").as_str())?,
                campaign: row.get("campaign"),
                team1_score: row.get::<u32, _>("team1_score") as Score,
                team2_score: row.get::<u32, _>("team2_score") as Score,
                checked: row.get("checked"),
            })),
            None => Ok(None),
        }
    }
    async fn set_prediction_ticket_checked(
        &self,
        user: &UserAddress,
        campaign: &CampaignId,
    ) -> Result<()> {
        self.connection
            .execute(
                query(
                    "UPDATE prediction_tickets SET checked = TRUE \
                WHERE user = ? AND campaign = ?",
                )
                .bind(user.to_string())
                .bind(campaign),
            )
            .await?;
        Ok(())
    }

    async fn user_has_halftime_ticket(&self, user: &UserAddress) -> Result<bool> {
        let row = self
            .connection
            .fetch_optional(
                query("SELECT user FROM halftime_tickets WHERE user = ?").bind(user.to_string()),
            )
            .await?;
        Ok(row.is_some())
    }
    async fn set_halftime_ticket(&self, user: &UserAddress, has_ticket: bool) -> Result<()> {
        if has_ticket {
            self.connection
                .execute(
                    query("INSERT OR IGNORE INTO halftime_tickets (user) VALUES (?)")
                        .bind(user.to_string()),
                )
                .await?;
        } else {
            self.connection
                .execute(
                    query("DELETE FROM halftime_tickets WHERE user = ?").bind(user.to_string()),
                )
                .await?;
        }
        Ok(())
    }

    async fn add_prize(
        &self,
        campaign: &CampaignId,
        description: String,
        uri: String,
        supply: u32,
    ) -> Result<PrizeId> {
        let id = self
            .connection
            .execute(
                query(
                    "INSERT INTO prizes (campaign, description, uri, supply) \
                VALUES (?,?,?,?)",
                )
                .bind(campaign)
                .bind(description)
                .bind(uri)
                .bind(supply),
            )
            .await?
            .last_insert_rowid();
        Ok(id)
    }
    async fn put_loyalty_prize(
        &self,
        description: String,
        uri: String,
        supply: u32,
    ) -> Result<()> {
        self.connection
            .execute(
                query(
                    "INSERT OR REPLACE INTO prizes (id, campaign, description, uri, supply) \
                VALUES (?,0,?,?,?)",
                )
                .bind(LOYALTY_PRIZE_ID)
                .bind(description)
                .bind(uri)
                .bind(supply),
            )
            .await?;
        Ok(())
    }
    async fn get_prize(&self, prize: &PrizeId) -> Result<Option<PrizeResponse>> {
        let row = self
            .connection
            .fetch_optional(query("SELECT * FROM prizes WHERE id = ?").bind(prize))
            .await?;
        Ok(row.map(|row| Self::prize_from_row(&row)))
    }
    async fn first_available_prize(
        &self,
        campaign: &CampaignId,
    ) -> Result<Option<PrizeResponse>> {
        let row = self
            .connection
            .fetch_optional(
                query(
                    "SELECT * FROM prizes \
                WHERE campaign = ? AND supply > 0 AND id != ? \
                ORDER BY id LIMIT 1",
                )
                .bind(campaign)
                .bind(LOYALTY_PRIZE_ID),
            )
            .await?;
        Ok(row.map(|row| Self::prize_from_row(&row)))
    }
    async fn decrement_prize_supply(&self, prize: &PrizeId) -> Result<()> {
        self.connection
            .execute(
                query("UPDATE prizes SET supply = supply - 1 WHERE id = ? AND supply > 0")
                    .bind(prize),
            )
            .await?;
        Ok(())
    }
    async fn next_prize_id(&self) -> Result<PrizeId> {
        let row = self
            .connection
            .fetch_one(query("SELECT COALESCE(MAX(id),0) + 1 AS next FROM prizes"))
            .await?;
        Ok(row.get("next"))
    }

    async fn add_prize_token(
        &self,
        token: TokenId,
        prize: &PrizeId,
        owner: &UserAddress,
        uri: String,
    ) -> Result<()> {
        self.connection
            .execute(
                query("INSERT INTO prize_tokens (token, prize, owner, uri) VALUES (?,?,?,?)")
                    .bind(token)
                    .bind(prize)
                    .bind(owner.to_string())
                    .bind(uri),
            )
            .await?;
        Ok(())
    }
    async fn get_prize_token(&self, token: &TokenId) -> Result<Option<PrizeTokenResponse>> {
        let row = self
            .connection
            .fetch_optional(query("SELECT * FROM prize_tokens WHERE token = ?").bind(token))
            .await?;
        match row {
            Some(row) => Ok(Some(PrizeTokenResponse {
                token: row.get("token"),
                prize: row.get("prize"),
                owner: UserAddress::from_str(row.get::<String, _>("owner").as_str())?,
                uri: row.get("uri"),
            })),
            None => Ok(None),
        }
    }
    async fn get_user_prize_tokens(&self, owner: &UserAddress) -> Result<Vec<PrizeTokenResponse>> {
        let rows = self
            .connection
            .fetch_all(
                query("SELECT * FROM prize_tokens WHERE owner = ? ORDER BY token")
                    .bind(owner.to_string()),
            )
            .await?;
        let mut tokens = vec![];
        for row in rows {
            tokens.push(PrizeTokenResponse {
                token: row.get("token"),
                prize: row.get("prize"),
                owner: UserAddress::from_str(row.get::<String, _>("owner").as_str())?,
                uri: row.get("uri"),
            });
        }
        Ok(tokens)
    }
    async fn next_token_id(&self) -> Result<TokenId> {
        let row = self
            .connection
            .fetch_one(query("SELECT COALESCE(MAX(token),0) + 1 AS next FROM prize_tokens"))
            .await?;
        Ok(row.get("next"))
    }

    async fn get_loyalty_points(&self, user: &UserAddress) -> Result<LoyaltyPoints> {
        let row = self
            .connection
            .fetch_optional(
                query("SELECT points FROM loyalty_points WHERE user = ?").bind(user.to_string()),
            )
            .await?;
        Ok(row.map(|row| row.get("points")).unwrap_or(0))
    }
    async fn add_loyalty_points(&self, user: &UserAddress, points: LoyaltyPoints) -> Result<()> {
        self.connection
            .execute(
                query(
                    "INSERT INTO loyalty_points (user, points) VALUES (?,?) \
                ON CONFLICT (user) DO UPDATE SET points = points + ?",
                )
                .bind(user.to_string())
                .bind(points)
                .bind(points),
            )
            .await?;
        Ok(())
    }
    async fn deduct_loyalty_points(
        &self,
        user: &UserAddress,
        points: LoyaltyPoints,
    ) -> Result<()> {
        self.connection
            .execute(
                query(
                    "UPDATE loyalty_points SET points = points - ? \
                WHERE user = ? AND points >= ?",
                )
                .bind(points)
                .bind(user.to_string())
                .bind(points),
            )
            .await?;
        Ok(())
    }
    async fn get_wow_balance(&self, user: &UserAddress) -> Result<WowAmount> {
        let row = self
            .connection
            .fetch_optional(
                query("SELECT amount FROM wow_balances WHERE user = ?").bind(user.to_string()),
            )
            .await?;
        Ok(row.map(|row| row.get("amount")).unwrap_or(0))
    }
    async fn add_wow_balance(&self, user: &UserAddress, amount: WowAmount) -> Result<()> {
        self.connection
            .execute(
                query(
                    "INSERT INTO wow_balances (user, amount) VALUES (?,?) \
                ON CONFLICT (user) DO UPDATE SET amount = amount + ?",
                )
                .bind(user.to_string())
                .bind(amount)
                .bind(amount),
            )
            .await?;
        Ok(())
    }

    async fn add_pending_play(&self, play: PendingPlay) -> Result<()> {
        self.connection
            .execute(
                query(
                    "INSERT INTO pending_plays (request, user, campaign, paid_fee) \
                VALUES (?,?,?,?)",
                )
                .bind(play.request)
                .bind(play.user.to_string())
                .bind(play.campaign)
                .bind(play.paid_fee.to_string()),
            )
            .await?;
        Ok(())
    }
    async fn get_pending_play(&self, request: &RequestId) -> Result<Option<PendingPlay>> {
        let row = self
            .connection
            .fetch_optional(query("SELECT * FROM pending_plays WHERE request = ?").bind(request))
            .await?;
        match row {
            Some(row) => Ok(Some(PendingPlay {
                request: row.get("request"),
                user: UserAddress::from_str(row.get::<String, _>("user").as_str())?,
                campaign: row.get("campaign"),
                paid_fee: row
                    .get::<String, _>("paid_fee")
                    .parse()
                    .context("couldn't parse paid_fee")?,
            })),
            None => Ok(None),
        }
    }
    async fn remove_pending_play(&self, request: &RequestId) -> Result<()> {
        self.connection
            .execute(query("DELETE FROM pending_plays WHERE request = ?").bind(request))
            .await?;
        Ok(())
    }

    async fn get_config(&self, key: &str) -> Result<Option<String>> {
        let row = self
            .connection
            .fetch_optional(query("SELECT value FROM config WHERE key = ?").bind(key))
            .await?;
        Ok(row.map(|row| row.get("value")))
    }
    async fn set_config(&self, key: &str, value: String) -> Result<()> {
        self.connection
            .execute(
                query("INSERT OR REPLACE INTO config (key, value) VALUES (?,?)")
                    .bind(key)
                    .bind(value),
            )
            .await?;
        Ok(())
    }

    async fn add_event(&self, event: &Event) -> Result<()> {
        self.connection
            .execute(
                query("INSERT INTO events (created, event) VALUES (?,?)")
                    .bind(Utc::now().timestamp())
                    .bind(serde_json::to_string(event)?),
            )
            .await?;
        Ok(())
    }
    async fn get_events(&self) -> Result<Vec<Event>> {
        let rows = self
            .connection
            .fetch_all(query("SELECT event FROM events ORDER BY rowid"))
            .await?;
        let mut events = vec![];
        for row in rows {
            events.push(serde_json::from_str(row.get::<String, _>("event").as_str())?);
        }
        Ok(events)
    }
}
