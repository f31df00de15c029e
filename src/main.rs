#![allow(unused)]
use crate::api::*;
use crate::clock::SystemClock;
use crate::db::{SQLite, DB};
use crate::entropy::TestEntropySource;
use crate::ledger::{Ledger, CONFIG_LAST_SEQUENCE};
use crate::mint::TestMintSink;
use crate::oracle::TestPriceOracle;
use crate::settings::Settings;
use anyhow::Result;
use axum::extract::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use axum_macros::debug_handler;
use chrono::{Duration, TimeZone, Utc};
use clap::Parser;
use env_logger::{Builder, WriteStyle};
use log::{debug, LevelFilter};
use secp256k1::{generate_keypair, rand};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

mod api;
mod client;
mod clock;
mod db;
mod entropy;
mod ledger;
mod mint;
mod oracle;
mod settings;

#[debug_handler]
async fn create_campaign(
    State(state): State<Arc<RwLock<Ledger>>>,
    Json(request): Json<CreateCampaignRequest>,
) -> Result<(StatusCode, Json<CampaignId>), (StatusCode, String)> {
    let mut backend = state.write().await;
    let id = backend
        .create_campaign(
            &request.caller,
            ledger::CampaignInput {
                team1: request.team1.clone(),
                team2: request.team2.clone(),
                start_prediction_game: request.start_prediction_game,
                end_prediction_game: request.end_prediction_game,
                start_second_halftime_game: request.start_second_halftime_game,
                end_second_halftime_game: request.end_second_halftime_game,
            },
        )
        .await
        .map_err(map_any_err_and_code)?;
    debug!(
        "Created campaign {}: {} vs {}",
        id, request.team1, request.team2
    );
    Ok((StatusCode::CREATED, id.into()))
}
async fn set_campaign_active(
    State(state): State<Arc<RwLock<Ledger>>>,
    Json(request): Json<SetCampaignActiveRequest>,
) -> Result<(), (StatusCode, String)> {
    let mut backend = state.write().await;
    backend
        .set_campaign_active(&request.caller, &request.campaign, request.active)
        .await
        .map_err(map_any_err_and_code)?;
    debug!(
        "Campaign {} set {}",
        request.campaign,
        if request.active { "active" } else { "inactive" }
    );
    Ok(())
}
async fn create_prediction_game(
    State(state): State<Arc<RwLock<Ledger>>>,
    Json(request): Json<CreatePredictionGameRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    let mut backend = state.write().await;
    backend
        .create_prediction_game(&request.caller, &request.campaign, request.question.clone())
        .await
        .map_err(map_any_err_and_code)?;
    debug!(
        "Created prediction game on campaign {}: {}",
        request.campaign, request.question
    );
    Ok(StatusCode::CREATED)
}
async fn submit_predictions(
    State(state): State<Arc<RwLock<Ledger>>>,
    Json(request): Json<SubmitPredictionsRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    let mut backend = state.write().await;
    backend
        .submit_predictions(
            &request.caller,
            &request.campaign,
            request.team1_score,
            request.team2_score,
        )
        .await
        .map_err(map_any_err_and_code)?;
    debug!(
        "User {} predicted {}:{} on campaign {}",
        request.caller, request.team1_score, request.team2_score, request.campaign
    );
    Ok(StatusCode::CREATED)
}
async fn resolve_prediction_game(
    State(state): State<Arc<RwLock<Ledger>>>,
    Json(request): Json<ResolvePredictionGameRequest>,
) -> Result<(), (StatusCode, String)> {
    let mut backend = state.write().await;
    backend
        .resolve_prediction_game(
            &request.caller,
            &request.campaign,
            request.team1_score,
            request.team2_score,
        )
        .await
        .map_err(map_any_err_and_code)?;
    debug!(
        "Resolved prediction game on campaign {} with {}:{}",
        request.campaign, request.team1_score, request.team2_score
    );
    Ok(())
}
async fn check_prediction_result(
    State(state): State<Arc<RwLock<Ledger>>>,
    Json(request): Json<CampaignActionRequest>,
) -> Result<Json<bool>, (StatusCode, String)> {
    let mut backend = state.write().await;
    let won = backend
        .check_prediction_result(&request.caller, &request.campaign)
        .await
        .map_err(map_any_err_and_code)?;
    debug!(
        "User {} checked campaign {}: {}",
        request.caller,
        request.campaign,
        if won { "won" } else { "lost" }
    );
    Ok(Json(won))
}
async fn get_free_ticket(
    State(state): State<Arc<RwLock<Ledger>>>,
    Json(request): Json<CampaignActionRequest>,
) -> Result<(), (StatusCode, String)> {
    let mut backend = state.write().await;
    backend
        .get_second_halftime_free_ticket(&request.caller, &request.campaign)
        .await
        .map_err(map_any_err_and_code)?;
    debug!("User {} got a free halftime ticket", request.caller);
    Ok(())
}
async fn play_with_ticket(
    State(state): State<Arc<RwLock<Ledger>>>,
    Json(request): Json<CampaignActionRequest>,
) -> Result<(StatusCode, Json<RequestId>), (StatusCode, String)> {
    let mut backend = state.write().await;
    let sequence = backend
        .play_second_halftime_with_ticket(&request.caller, &request.campaign)
        .await
        .map_err(map_any_err_and_code)?;
    debug!(
        "User {} played with a ticket on campaign {}, request {}",
        request.caller, request.campaign, sequence
    );
    Ok((StatusCode::CREATED, sequence.into()))
}
async fn play_with_chz(
    State(state): State<Arc<RwLock<Ledger>>>,
    Json(request): Json<PlayWithChzRequest>,
) -> Result<(StatusCode, Json<RequestId>), (StatusCode, String)> {
    let mut backend = state.write().await;
    let sequence = backend
        .play_second_halftime_with_chz(&request.caller, &request.campaign, request.sent_value)
        .await
        .map_err(map_any_err_and_code)?;
    debug!(
        "User {} played with {} wei on campaign {}, request {}",
        request.caller, request.sent_value, request.campaign, sequence
    );
    Ok((StatusCode::CREATED, sequence.into()))
}
async fn entropy_callback(
    State(state): State<Arc<RwLock<Ledger>>>,
    Json(request): Json<EntropyCallbackRequest>,
) -> Result<Json<PlayOutcomeResponse>, (StatusCode, String)> {
    let mut backend = state.write().await;
    let outcome = backend
        .entropy_callback(&request.caller, &request.sequence, &request.random_number)
        .await
        .map_err(map_any_err_and_code)?;
    Ok(Json(outcome))
}
async fn add_prize(
    State(state): State<Arc<RwLock<Ledger>>>,
    Json(request): Json<AddPrizeRequest>,
) -> Result<(StatusCode, Json<PrizeId>), (StatusCode, String)> {
    let mut backend = state.write().await;
    let id = backend
        .add_prize(
            &request.caller,
            &request.campaign,
            request.description.clone(),
            request.uri,
            request.supply,
        )
        .await
        .map_err(map_any_err_and_code)?;
    debug!(
        "Added prize {} with supply {}: {}",
        id, request.supply, request.description
    );
    Ok((StatusCode::CREATED, id.into()))
}
async fn configure_loyalty_prize(
    State(state): State<Arc<RwLock<Ledger>>>,
    Json(request): Json<ConfigureLoyaltyPrizeRequest>,
) -> Result<(), (StatusCode, String)> {
    let mut backend = state.write().await;
    backend
        .configure_loyalty_prize(
            &request.caller,
            request.description,
            request.uri,
            request.supply,
        )
        .await
        .map_err(map_any_err_and_code)?;
    Ok(())
}
async fn award_loyalty_prize(
    State(state): State<Arc<RwLock<Ledger>>>,
    Json(request): Json<AwardLoyaltyPrizeRequest>,
) -> Result<Json<TokenId>, (StatusCode, String)> {
    let mut backend = state.write().await;
    let token = backend
        .award_loyalty_prize(&request.caller, &request.user, request.points_cost)
        .await
        .map_err(map_any_err_and_code)?;
    debug!(
        "Awarded loyalty prize token {} to user {} for {} points",
        token, request.user, request.points_cost
    );
    Ok(Json(token))
}
async fn update_play_fee(
    State(state): State<Arc<RwLock<Ledger>>>,
    Json(request): Json<UpdatePlayFeeRequest>,
) -> Result<(), (StatusCode, String)> {
    let mut backend = state.write().await;
    backend
        .update_play_fee(&request.caller, request.fee_usd_cents)
        .await
        .map_err(map_any_err_and_code)?;
    debug!("Play fee updated to {} USD cents", request.fee_usd_cents);
    Ok(())
}
async fn update_trusted_data_resolver(
    State(state): State<Arc<RwLock<Ledger>>>,
    Json(request): Json<UpdateTrustedDataResolverRequest>,
) -> Result<(), (StatusCode, String)> {
    let mut backend = state.write().await;
    backend
        .update_trusted_data_resolver(&request.caller, &request.resolver)
        .await
        .map_err(map_any_err_and_code)?;
    debug!("Trusted data resolver updated to {}", request.resolver);
    Ok(())
}
async fn update_wow_per_bet_loss(
    State(state): State<Arc<RwLock<Ledger>>>,
    Json(request): Json<UpdateWowPerBetLossRequest>,
) -> Result<(), (StatusCode, String)> {
    let mut backend = state.write().await;
    backend
        .update_wow_token_per_bet_loss(&request.caller, request.amount)
        .await
        .map_err(map_any_err_and_code)?;
    Ok(())
}
async fn transfer_ownership(
    State(state): State<Arc<RwLock<Ledger>>>,
    Json(request): Json<TransferOwnershipRequest>,
) -> Result<(), (StatusCode, String)> {
    let mut backend = state.write().await;
    backend
        .transfer_ownership(&request.caller, &request.new_owner)
        .await
        .map_err(map_any_err_and_code)?;
    debug!("Ownership transferred to {}", request.new_owner);
    Ok(())
}
async fn swap_contract_balance(
    State(state): State<Arc<RwLock<Ledger>>>,
    Json(request): Json<OwnerRequest>,
) -> Result<Json<WowAmount>, (StatusCode, String)> {
    let mut backend = state.write().await;
    let amount = backend
        .swap_contract_balance_to_wow_tokens(&request.caller)
        .await
        .map_err(map_any_err_and_code)?;
    debug!("Swapped collected fees into {} WOW tokens", amount);
    Ok(Json(amount))
}

async fn next_campaign_id(
    State(state): State<Arc<RwLock<Ledger>>>,
) -> Result<Json<CampaignId>, (StatusCode, String)> {
    let backend = state.read().await;
    let id = backend.next_campaign_id().await.map_err(map_any_err_and_code)?;
    Ok(Json(id))
}
async fn get_campaign(
    State(state): State<Arc<RwLock<Ledger>>>,
    Json(campaign): Json<CampaignId>,
) -> Result<Json<CampaignResponse>, (StatusCode, String)> {
    let backend = state.read().await;
    let campaign = backend
        .get_campaign(&campaign)
        .await
        .map_err(map_any_err_and_code)?;
    Ok(Json(campaign))
}
async fn get_prediction_game(
    State(state): State<Arc<RwLock<Ledger>>>,
    Json(campaign): Json<CampaignId>,
) -> Result<Json<PredictionGameResponse>, (StatusCode, String)> {
    let backend = state.read().await;
    let game = backend
        .get_prediction_game(&campaign)
        .await
        .map_err(map_any_err_and_code)?;
    Ok(Json(game))
}
async fn get_prediction_ticket(
    State(state): State<Arc<RwLock<Ledger>>>,
    Json(request): Json<CampaignActionRequest>,
) -> Result<Json<PredictionTicketResponse>, (StatusCode, String)> {
    let backend = state.read().await;
    let ticket = backend
        .get_prediction_ticket(&request.caller, &request.campaign)
        .await
        .map_err(map_any_err_and_code)?;
    Ok(Json(ticket))
}
async fn has_halftime_ticket(
    State(state): State<Arc<RwLock<Ledger>>>,
    Json(user): Json<UserAddress>,
) -> Result<Json<bool>, (StatusCode, String)> {
    let backend = state.read().await;
    let has_ticket = backend
        .user_has_halftime_ticket(&user)
        .await
        .map_err(map_any_err_and_code)?;
    Ok(Json(has_ticket))
}
async fn get_loyalty_points(
    State(state): State<Arc<RwLock<Ledger>>>,
    Json(user): Json<UserAddress>,
) -> Result<Json<LoyaltyPoints>, (StatusCode, String)> {
    let backend = state.read().await;
    let points = backend
        .user_loyalty_points(&user)
        .await
        .map_err(map_any_err_and_code)?;
    Ok(Json(points))
}
async fn get_wow_balance(
    State(state): State<Arc<RwLock<Ledger>>>,
    Json(user): Json<UserAddress>,
) -> Result<Json<WowAmount>, (StatusCode, String)> {
    let backend = state.read().await;
    let amount = backend
        .user_wow_tokens(&user)
        .await
        .map_err(map_any_err_and_code)?;
    Ok(Json(amount))
}
async fn get_play_fee(
    State(state): State<Arc<RwLock<Ledger>>>,
) -> Result<Json<UsdCents>, (StatusCode, String)> {
    let backend = state.read().await;
    let fee = backend
        .play_fee_in_usd_cents()
        .await
        .map_err(map_any_err_and_code)?;
    Ok(Json(fee))
}
async fn get_required_play_fee(
    State(state): State<Arc<RwLock<Ledger>>>,
) -> Result<Json<ChzWei>, (StatusCode, String)> {
    let backend = state.read().await;
    let fee = backend
        .required_play_fee()
        .await
        .map_err(map_any_err_and_code)?;
    Ok(Json(fee))
}
async fn get_prize(
    State(state): State<Arc<RwLock<Ledger>>>,
    Json(prize): Json<PrizeId>,
) -> Result<Json<PrizeResponse>, (StatusCode, String)> {
    let backend = state.read().await;
    let prize = backend.get_prize(&prize).await.map_err(map_any_err_and_code)?;
    Ok(Json(prize))
}
async fn next_prize_id(
    State(state): State<Arc<RwLock<Ledger>>>,
) -> Result<Json<PrizeId>, (StatusCode, String)> {
    let backend = state.read().await;
    let id = backend.next_prize_id().await.map_err(map_any_err_and_code)?;
    Ok(Json(id))
}
async fn next_token_id(
    State(state): State<Arc<RwLock<Ledger>>>,
) -> Result<Json<TokenId>, (StatusCode, String)> {
    let backend = state.read().await;
    let id = backend.next_token_id().await.map_err(map_any_err_and_code)?;
    Ok(Json(id))
}
async fn token_uri(
    State(state): State<Arc<RwLock<Ledger>>>,
    Json(token): Json<TokenId>,
) -> Result<String, (StatusCode, String)> {
    let backend = state.read().await;
    let uri = backend.token_uri(&token).await.map_err(map_any_err_and_code)?;
    Ok(uri)
}
async fn get_user_prize_tokens(
    State(state): State<Arc<RwLock<Ledger>>>,
    Json(user): Json<UserAddress>,
) -> Result<Json<Vec<PrizeTokenResponse>>, (StatusCode, String)> {
    let backend = state.read().await;
    let tokens = backend
        .user_prize_tokens(&user)
        .await
        .map_err(map_any_err_and_code)?;
    Ok(Json(tokens))
}
async fn get_events(
    State(state): State<Arc<RwLock<Ledger>>>,
) -> Result<Json<Vec<Event>>, (StatusCode, String)> {
    let backend = state.read().await;
    let events = backend.get_events().await.map_err(map_any_err_and_code)?;
    Ok(Json(events))
}

#[derive(Parser)]
struct Args {
    #[arg(short, long)]
    config: Option<String>,
    #[arg(short, long)]
    port: Option<u16>,
    #[arg(short, long)]
    owner: Option<UserAddress>,
    #[arg(short, long)]
    resolver: Option<UserAddress>,
    #[arg(short, long)]
    db: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    Builder::default()
        .filter_level(LevelFilter::Debug)
        .write_style(WriteStyle::Always)
        .init();
    let cli = Args::parse();
    let settings = Settings::load(cli.config)?;
    let owner = match cli.owner {
        Some(owner) => owner,
        None => {
            let (secret, public) = generate_keypair(&mut rand::thread_rng());
            debug!(
                "No owner key given, generated {} (secret {})",
                public,
                secret.display_secret()
            );
            public
        }
    };
    let resolver = cli.resolver.unwrap_or(owner);
    let (_port, handle) = run_server(
        Some(cli.port.unwrap_or(settings.port)),
        owner,
        resolver,
        settings.play_fee_usd_cents,
        settings.wow_token_per_bet_loss,
        settings.points_per_loss,
        cli.db.or(settings.db),
    )
    .await;
    handle.await?;
    Ok(())
}

async fn run_server(
    port: Option<u16>,
    owner: UserAddress,
    trusted_data_resolver: UserAddress,
    play_fee_usd_cents: UsdCents,
    wow_token_per_bet_loss: WowAmount,
    points_per_loss: LoyaltyPoints,
    db_conn: Option<String>,
) -> (u16, JoinHandle<()>) {
    let db = SQLite::new(db_conn).await;
    // Issuance counters resume past anything already in the store, so a
    // restart cannot hand out sequence or token ids that collide with
    // surviving rows.
    let last_sequence = match db.get_config(CONFIG_LAST_SEQUENCE).await.unwrap() {
        Some(last) => last.parse().unwrap(),
        None => 0,
    };
    let last_token = db.next_token_id().await.unwrap() - 1;
    let state = Arc::new(RwLock::new(
        Ledger::new(
            Box::new(db),
            Box::new(TestEntropySource::starting_after(last_sequence)),
            Box::new(TestPriceOracle::default()),
            Box::new(TestMintSink::starting_after(last_token)),
            Box::new(SystemClock),
            owner,
            trusted_data_resolver,
            play_fee_usd_cents,
            wow_token_per_bet_loss,
            points_per_loss,
        )
        .await
        .unwrap(),
    ));
    let app = Router::new()
        .route("/create_campaign", post(create_campaign))
        .route("/set_campaign_active", post(set_campaign_active))
        .route("/create_prediction_game", post(create_prediction_game))
        .route("/submit_predictions", post(submit_predictions))
        .route("/resolve_prediction_game", post(resolve_prediction_game))
        .route("/check_prediction_result", post(check_prediction_result))
        .route("/get_free_ticket", post(get_free_ticket))
        .route("/play_with_ticket", post(play_with_ticket))
        .route("/play_with_chz", post(play_with_chz))
        .route("/entropy_callback", post(entropy_callback))
        .route("/add_prize", post(add_prize))
        .route("/configure_loyalty_prize", post(configure_loyalty_prize))
        .route("/award_loyalty_prize", post(award_loyalty_prize))
        .route("/update_play_fee", post(update_play_fee))
        .route(
            "/update_trusted_data_resolver",
            post(update_trusted_data_resolver),
        )
        .route("/update_wow_per_bet_loss", post(update_wow_per_bet_loss))
        .route("/transfer_ownership", post(transfer_ownership))
        .route("/swap_contract_balance", post(swap_contract_balance))
        .route("/next_campaign_id", get(next_campaign_id))
        .route("/get_campaign", post(get_campaign))
        .route("/get_prediction_game", post(get_prediction_game))
        .route("/get_prediction_ticket", post(get_prediction_ticket))
        .route("/has_halftime_ticket", post(has_halftime_ticket))
        .route("/get_loyalty_points", post(get_loyalty_points))
        .route("/get_wow_balance", post(get_wow_balance))
        .route("/get_play_fee", get(get_play_fee))
        .route("/get_required_play_fee", get(get_required_play_fee))
        .route("/get_prize", post(get_prize))
        .route("/next_prize_id", get(next_prize_id))
        .route("/next_token_id", get(next_token_id))
        .route("/token_uri", post(token_uri))
        .route("/get_user_prize_tokens", post(get_user_prize_tokens))
        .route("/get_events", get(get_events))
        .with_state(state);

    let addr = "127.0.0.1:".to_string() + port.unwrap_or(0).to_string().as_str();
    let server = axum::Server::bind(&addr.parse().unwrap()).serve(app.into_make_service());
    let port = server.local_addr().port();
    debug!("Listening on {}", server.local_addr());
    let handle = tokio::spawn(async move {
        server.await.unwrap();
    });
    (port, handle)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::client::Client;
    use crate::ledger::WEI_PER_CHZ;

    const LOSING_RANDOM: &str =
        "0000000000000032000000000000000000000000000000000000000000000000";
    const WINNING_RANDOM: &str =
        "0000000000000000000000000000000000000000000000000000000000000000";

    fn new_user() -> UserAddress {
        generate_keypair(&mut rand::thread_rng()).1
    }
    fn open_campaign_request(caller: UserAddress) -> CreateCampaignRequest {
        // Both windows are open around the current time so the prod clock
        // can be used.
        CreateCampaignRequest {
            caller,
            team1: "PSG".to_string(),
            team2: "Lyon".to_string(),
            start_prediction_game: Utc::now() - Duration::hours(1),
            end_prediction_game: Utc::now() + Duration::hours(1),
            start_second_halftime_game: Utc::now() - Duration::hours(1),
            end_second_halftime_game: Utc::now() + Duration::hours(2),
        }
    }

    #[tokio::test]
    async fn create_campaign() {
        let owner = new_user();
        let (port, _) = run_server(None, owner, owner, 100, 5, 1, None).await;
        let client = Client::new("http://127.0.0.1:".to_string() + port.to_string().as_str());

        client.get_campaign(1).await.unwrap_err();

        let request = open_campaign_request(owner);
        let response = client.create_campaign(request.clone()).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let id = response.json::<CampaignId>().await.unwrap();
        assert_eq!(id, 1);

        let campaign = client.get_campaign(id).await.unwrap();
        assert_eq!(campaign.team1, "PSG".to_string());
        assert_eq!(campaign.team2, "Lyon".to_string());
        assert_eq!(
            campaign.start_prediction_game,
            Utc.timestamp_opt(request.start_prediction_game.timestamp(), 0)
                .unwrap()
        );
        assert!(!campaign.active);
        assert_eq!(client.next_campaign_id().await.unwrap(), 2);

        // only the owner can create campaigns
        let response = client.create_campaign(open_campaign_request(new_user())).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn full_campaign_flow() {
        let owner = new_user();
        let resolver = new_user();
        let (port, _) = run_server(None, owner, resolver, 100, 5, 1, None).await;
        let client = Client::new("http://127.0.0.1:".to_string() + port.to_string().as_str());

        let response = client.create_campaign(open_campaign_request(owner)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let id = response.json::<CampaignId>().await.unwrap();
        let response = client
            .set_campaign_active(SetCampaignActiveRequest {
                caller: owner,
                campaign: id,
                active: true,
            })
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = client
            .create_prediction_game(CreatePredictionGameRequest {
                caller: owner,
                campaign: id,
                question: "Halftime score?".to_string(),
            })
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let response = client
            .add_prize(AddPrizeRequest {
                caller: owner,
                campaign: id,
                description: "Signed jersey".to_string(),
                uri: "ipfs://jersey".to_string(),
                supply: 1,
            })
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        // a fan predicts the right score and earns a halftime ticket
        let fan = new_user();
        let response = client
            .submit_predictions(SubmitPredictionsRequest {
                caller: fan,
                campaign: id,
                team1_score: 2,
                team2_score: 1,
            })
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let response = client
            .resolve_prediction_game(ResolvePredictionGameRequest {
                caller: resolver,
                campaign: id,
                team1_score: 2,
                team2_score: 1,
            })
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let won = client
            .check_prediction_result(CampaignActionRequest {
                caller: fan,
                campaign: id,
            })
            .await
            .unwrap();
        assert!(won);
        assert!(client.has_halftime_ticket(fan).await.unwrap());

        // the ticket play loses and pays out consolation rewards
        let sequence = client
            .play_with_ticket(CampaignActionRequest {
                caller: fan,
                campaign: id,
            })
            .await
            .unwrap();
        let outcome = client
            .entropy_callback(EntropyCallbackRequest {
                caller: resolver,
                sequence,
                random_number: LOSING_RANDOM.to_string(),
            })
            .await
            .unwrap();
        assert!(!outcome.won);
        assert_eq!(outcome.wow_awarded, 5);
        assert_eq!(client.get_wow_balance(fan).await.unwrap(), 5);
        assert_eq!(client.get_loyalty_points(fan).await.unwrap(), 1);
        assert!(!client.has_halftime_ticket(fan).await.unwrap());

        // a paid play wins the jersey
        let fee = client.get_required_play_fee().await.unwrap();
        assert_eq!(fee, 10 * WEI_PER_CHZ as ChzWei);
        let sequence = client
            .play_with_chz(PlayWithChzRequest {
                caller: fan,
                campaign: id,
                sent_value: fee,
            })
            .await
            .unwrap();
        let outcome = client
            .entropy_callback(EntropyCallbackRequest {
                caller: resolver,
                sequence,
                random_number: WINNING_RANDOM.to_string(),
            })
            .await
            .unwrap();
        assert!(outcome.won);
        let token = outcome.prize_token.unwrap();
        assert_eq!(
            client.token_uri(token).await.unwrap(),
            "ipfs://jersey".to_string()
        );
        let tokens = client.get_user_prize_tokens(fan).await.unwrap();
        assert_eq!(tokens.len(), 1);

        // collected fees swap into WOW for the owner
        let swapped = client
            .swap_contract_balance(OwnerRequest { caller: owner })
            .await
            .unwrap();
        assert_eq!(swapped, 10);

        let events = client.get_events().await.unwrap();
        assert!(events.contains(&Event::TicketsAwarded { user: fan }));
        assert!(events.contains(&Event::PrizeAwarded {
            user: fan,
            prize: 1,
            token,
        }));
    }

    #[tokio::test]
    async fn owner_updates_settings() {
        let owner = new_user();
        let (port, _) = run_server(None, owner, owner, 100, 5, 1, None).await;
        let client = Client::new("http://127.0.0.1:".to_string() + port.to_string().as_str());

        assert_eq!(client.get_play_fee().await.unwrap(), 100);
        let response = client
            .update_play_fee(UpdatePlayFeeRequest {
                caller: owner,
                fee_usd_cents: 50,
            })
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(client.get_play_fee().await.unwrap(), 50);

        let response = client
            .update_play_fee(UpdatePlayFeeRequest {
                caller: new_user(),
                fee_usd_cents: 1,
            })
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // rotating the owner revokes the old key's admin rights
        let new_owner = new_user();
        let response = client
            .transfer_ownership(TransferOwnershipRequest {
                caller: owner,
                new_owner,
            })
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = client
            .update_play_fee(UpdatePlayFeeRequest {
                caller: owner,
                fee_usd_cents: 1,
            })
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let response = client
            .update_play_fee(UpdatePlayFeeRequest {
                caller: new_owner,
                fee_usd_cents: 75,
            })
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(client.get_play_fee().await.unwrap(), 75);
    }

    #[tokio::test]
    async fn restart_reseeds_issuance_counters() {
        let path = std::env::temp_dir().join(format!(
            "matchday-server-restart-{}.db",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let db = format!("sqlite://{}?mode=rwc", path.display());
        let owner = new_user();
        let fan = new_user();
        let (port, handle) = run_server(None, owner, owner, 100, 5, 1, Some(db.clone())).await;
        let client = Client::new("http://127.0.0.1:".to_string() + port.to_string().as_str());

        let response = client.create_campaign(open_campaign_request(owner)).await;
        let id = response.json::<CampaignId>().await.unwrap();
        let response = client
            .set_campaign_active(SetCampaignActiveRequest {
                caller: owner,
                campaign: id,
                active: true,
            })
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = client
            .get_free_ticket(CampaignActionRequest {
                caller: fan,
                campaign: id,
            })
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let sequence = client
            .play_with_ticket(CampaignActionRequest {
                caller: fan,
                campaign: id,
            })
            .await
            .unwrap();
        assert_eq!(sequence, 1);
        handle.abort();

        // a second server on the same store continues the sequence instead
        // of reissuing id 1 over the surviving pending play
        let (port, _) = run_server(None, owner, owner, 100, 5, 1, Some(db)).await;
        let client = Client::new("http://127.0.0.1:".to_string() + port.to_string().as_str());
        let response = client
            .get_free_ticket(CampaignActionRequest {
                caller: fan,
                campaign: id,
            })
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let sequence = client
            .play_with_ticket(CampaignActionRequest {
                caller: fan,
                campaign: id,
            })
            .await
            .unwrap();
        assert_eq!(sequence, 2);
    }
}
