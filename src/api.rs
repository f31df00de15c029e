use chrono::{DateTime, Utc};
use log::debug;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type UserAddress = secp256k1::PublicKey;
pub type CampaignId = i64;
pub type PrizeId = i64;
pub type TokenId = i64;
pub type RequestId = i64;
pub type Score = u8;
pub type UsdCents = u32;
pub type WowAmount = u32;
pub type LoyaltyPoints = u32;
/// Native chain value in its smallest unit.
pub type ChzWei = u128;

/// Reserved prize pool spent through the owner-controlled loyalty flows.
pub const LOYALTY_PRIZE_ID: PrizeId = 0;

// Errors
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerError {
    #[error("caller is not authorized for this operation")]
    Unauthorized,
    #[error("campaign does not exist")]
    CampaignDoesNotExist,
    #[error("randomness request not found or already resolved")]
    RequestNotFound,
    #[error("campaign is not active")]
    CampaignNotActive,
    #[error("prediction game is not open")]
    PredictionGameNotActive,
    #[error("second halftime game is not open")]
    SecondHalftimeGameNotActive,
    #[error("prediction game was already resolved")]
    MarketAlreadyResolved,
    #[error("user already has a prediction ticket for this campaign")]
    AlreadyHasTicket,
    #[error("prediction game is not resolved yet")]
    GameNotResolved,
    #[error("user has no prediction ticket for this campaign")]
    PredictionNotPlayed,
    #[error("prediction ticket was already checked")]
    AlreadyChecked,
    #[error("prediction was not won")]
    PredictionNotWon,
    #[error("user has no free halftime ticket")]
    NoFreeTickets,
    #[error("sent value does not cover the play fee")]
    InsufficientChzSent,
    #[error("prize supply is exhausted")]
    PrizeExhausted,
}
impl LedgerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::CampaignDoesNotExist | Self::RequestNotFound => StatusCode::NOT_FOUND,
            Self::InsufficientChzSent => StatusCode::PAYMENT_REQUIRED,
            _ => StatusCode::CONFLICT,
        }
    }
}

// helper functions
pub fn map_any_err_and_code(e: anyhow::Error) -> (StatusCode, String) {
    debug!("Error: {:#}", e);
    if let Some(rejection) = e.downcast_ref::<LedgerError>() {
        return (rejection.status_code(), rejection.to_string());
    }
    (StatusCode::INTERNAL_SERVER_ERROR, format!("{:?}", e))
}
pub fn map_any_err(e: anyhow::Error) -> String {
    debug!("Error: {:#}", e);
    format!("{:?}", e)
}

// Events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Event {
    CampaignCreated {
        campaign: CampaignId,
        team1: String,
        team2: String,
    },
    PredictionGameCreated {
        campaign: CampaignId,
    },
    PredictionsSubmitted {
        user: UserAddress,
        campaign: CampaignId,
        team1_score: Score,
        team2_score: Score,
    },
    PredictionGameResolved {
        campaign: CampaignId,
        team1_score: Score,
        team2_score: Score,
    },
    TicketsAwarded {
        user: UserAddress,
    },
    HeatmapPlayed {
        user: UserAddress,
        request: RequestId,
    },
    PrizeAwarded {
        user: UserAddress,
        prize: PrizeId,
        token: TokenId,
    },
    WOWTokensAwarded {
        user: UserAddress,
        amount: WowAmount,
    },
}

// Requests
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CreateCampaignRequest {
    pub caller: UserAddress,
    pub team1: String,
    pub team2: String,
    pub start_prediction_game: DateTime<Utc>,
    pub end_prediction_game: DateTime<Utc>,
    pub start_second_halftime_game: DateTime<Utc>,
    pub end_second_halftime_game: DateTime<Utc>,
}
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SetCampaignActiveRequest {
    pub caller: UserAddress,
    pub campaign: CampaignId,
    pub active: bool,
}
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CreatePredictionGameRequest {
    pub caller: UserAddress,
    pub campaign: CampaignId,
    pub question: String,
}
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SubmitPredictionsRequest {
    pub caller: UserAddress,
    pub campaign: CampaignId,
    pub team1_score: Score,
    pub team2_score: Score,
}
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ResolvePredictionGameRequest {
    pub caller: UserAddress,
    pub campaign: CampaignId,
    pub team1_score: Score,
    pub team2_score: Score,
}
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CampaignActionRequest {
    pub caller: UserAddress,
    pub campaign: CampaignId,
}
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PlayWithChzRequest {
    pub caller: UserAddress,
    pub campaign: CampaignId,
    pub sent_value: ChzWei,
}
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EntropyCallbackRequest {
    pub caller: UserAddress,
    pub sequence: RequestId,
    /// 32 bytes of entropy, hex encoded.
    pub random_number: String,
}
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AddPrizeRequest {
    pub caller: UserAddress,
    pub campaign: CampaignId,
    pub description: String,
    pub uri: String,
    pub supply: u32,
}
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConfigureLoyaltyPrizeRequest {
    pub caller: UserAddress,
    pub description: String,
    pub uri: String,
    pub supply: u32,
}
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AwardLoyaltyPrizeRequest {
    pub caller: UserAddress,
    pub user: UserAddress,
    pub points_cost: LoyaltyPoints,
}
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UpdatePlayFeeRequest {
    pub caller: UserAddress,
    pub fee_usd_cents: UsdCents,
}
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UpdateTrustedDataResolverRequest {
    pub caller: UserAddress,
    pub resolver: UserAddress,
}
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UpdateWowPerBetLossRequest {
    pub caller: UserAddress,
    pub amount: WowAmount,
}
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TransferOwnershipRequest {
    pub caller: UserAddress,
    pub new_owner: UserAddress,
}
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OwnerRequest {
    pub caller: UserAddress,
}

// Responses
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
pub struct CampaignResponse {
    pub id: CampaignId,
    pub team1: String,
    pub team2: String,
    pub start_prediction_game: DateTime<Utc>,
    pub end_prediction_game: DateTime<Utc>,
    pub start_second_halftime_game: DateTime<Utc>,
    pub end_second_halftime_game: DateTime<Utc>,
    pub active: bool,
}
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
pub struct PredictionGameResponse {
    pub campaign: CampaignId,
    pub question: String,
    pub team1_score: Score,
    pub team2_score: Score,
    pub resolved: bool,
}
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
pub struct PredictionTicketResponse {
    pub user: UserAddress,
    pub campaign: CampaignId,
    pub team1_score: Score,
    pub team2_score: Score,
    pub checked: bool,
}
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
pub struct PrizeResponse {
    pub id: PrizeId,
    pub campaign: CampaignId,
    pub description: String,
    pub uri: String,
    pub supply: u32,
}
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
pub struct PrizeTokenResponse {
    pub token: TokenId,
    pub prize: PrizeId,
    pub owner: UserAddress,
    pub uri: String,
}
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
pub struct PlayOutcomeResponse {
    pub user: UserAddress,
    pub won: bool,
    pub prize_token: Option<TokenId>,
    pub wow_awarded: WowAmount,
}
