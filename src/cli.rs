#![allow(unused)]
use std::str::FromStr;

use anyhow::{bail, Result};
use api::*;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use reqwest::StatusCode;
use secp256k1::{generate_keypair, rand};
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncWriteExt},
};

use crate::client::Client;

mod api;
mod client;

#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    command: Commands,
    #[arg(short, long)]
    url: String,
}
#[derive(Subcommand)]
enum Commands {
    GenerateKeys,
    CreateCampaign {
        #[arg(long)]
        team1: String,
        #[arg(long)]
        team2: String,
        #[arg(long)]
        start_prediction: DateTime<Utc>,
        #[arg(long)]
        end_prediction: DateTime<Utc>,
        #[arg(long)]
        start_halftime: DateTime<Utc>,
        #[arg(long)]
        end_halftime: DateTime<Utc>,
    },
    SetCampaignActive {
        #[arg(short, long)]
        campaign: CampaignId,
        #[arg(short, long)]
        active: bool,
    },
    CreatePredictionGame {
        #[arg(short, long)]
        campaign: CampaignId,
        #[arg(short, long)]
        question: String,
    },
    SubmitPredictions {
        #[arg(short, long)]
        campaign: CampaignId,
        #[arg(long)]
        team1_score: Score,
        #[arg(long)]
        team2_score: Score,
    },
    ResolvePredictionGame {
        #[arg(short, long)]
        campaign: CampaignId,
        #[arg(long)]
        team1_score: Score,
        #[arg(long)]
        team2_score: Score,
    },
    CheckPredictionResult {
        #[arg(short, long)]
        campaign: CampaignId,
    },
    GetFreeTicket {
        #[arg(short, long)]
        campaign: CampaignId,
    },
    PlayWithTicket {
        #[arg(short, long)]
        campaign: CampaignId,
    },
    PlayWithChz {
        #[arg(short, long)]
        campaign: CampaignId,
        /// Sent amount in wei.
        #[arg(short, long)]
        value: String,
    },
    EntropyCallback {
        #[arg(short, long)]
        sequence: RequestId,
        #[arg(short, long)]
        random_number: String,
    },
    AddPrize {
        #[arg(short, long)]
        campaign: CampaignId,
        #[arg(short, long)]
        description: String,
        #[arg(short, long)]
        uri: String,
        #[arg(short, long)]
        supply: u32,
    },
    ConfigureLoyaltyPrize {
        #[arg(short, long)]
        description: String,
        #[arg(short, long)]
        uri: String,
        #[arg(short, long)]
        supply: u32,
    },
    AwardLoyaltyPrize {
        #[arg(long)]
        user: UserAddress,
        #[arg(short, long)]
        points_cost: LoyaltyPoints,
    },
    UpdatePlayFee {
        #[arg(short, long)]
        fee_usd_cents: UsdCents,
    },
    UpdateTrustedDataResolver {
        #[arg(short, long)]
        resolver: UserAddress,
    },
    UpdateWowPerBetLoss {
        #[arg(short, long)]
        amount: WowAmount,
    },
    TransferOwnership {
        #[arg(short, long)]
        new_owner: UserAddress,
    },
    SwapContractBalance,
    GetCampaign {
        #[arg(short, long)]
        campaign: CampaignId,
    },
    GetPredictionGame {
        #[arg(short, long)]
        campaign: CampaignId,
    },
    GetTicket {
        #[arg(short, long)]
        campaign: CampaignId,
        #[arg(long)]
        user: Option<UserAddress>,
    },
    GetBalances {
        #[arg(long)]
        user: Option<UserAddress>,
    },
    GetPlayFee,
    GetEvents,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Args::parse();
    let client = Client::new(cli.url);

    match cli.command {
        Commands::GenerateKeys => {
            let keys = generate_keypair(&mut rand::thread_rng());
            println!("Pubkey: {}", keys.1);
            let mut private = File::create("ecdsa.key").await?;
            let mut public = File::create("ecdsa.pub").await?;
            private
                .write_all(format!("{}", keys.0.display_secret()).as_bytes())
                .await?;
            public.write_all(keys.1.to_string().as_bytes()).await?;
        }
        Commands::CreateCampaign {
            team1,
            team2,
            start_prediction,
            end_prediction,
            start_halftime,
            end_halftime,
        } => {
            let request = CreateCampaignRequest {
                caller: read_public().await?,
                team1,
                team2,
                start_prediction_game: start_prediction,
                end_prediction_game: end_prediction,
                start_second_halftime_game: start_halftime,
                end_second_halftime_game: end_halftime,
            };
            let response = client.create_campaign(request).await;
            check_status(&response, StatusCode::CREATED).await?;
            let id = response.json::<CampaignId>().await?;
            println!("Created campaign {}", id);
        }
        Commands::SetCampaignActive { campaign, active } => {
            let request = SetCampaignActiveRequest {
                caller: read_public().await?,
                campaign,
                active,
            };
            let response = client.set_campaign_active(request).await;
            check_status(&response, StatusCode::OK).await?;
        }
        Commands::CreatePredictionGame { campaign, question } => {
            let request = CreatePredictionGameRequest {
                caller: read_public().await?,
                campaign,
                question,
            };
            let response = client.create_prediction_game(request).await;
            check_status(&response, StatusCode::CREATED).await?;
        }
        Commands::SubmitPredictions {
            campaign,
            team1_score,
            team2_score,
        } => {
            let request = SubmitPredictionsRequest {
                caller: read_public().await?,
                campaign,
                team1_score,
                team2_score,
            };
            let response = client.submit_predictions(request).await;
            check_status(&response, StatusCode::CREATED).await?;
            println!("Submitted {}:{} on campaign {}", team1_score, team2_score, campaign);
        }
        Commands::ResolvePredictionGame {
            campaign,
            team1_score,
            team2_score,
        } => {
            let request = ResolvePredictionGameRequest {
                caller: read_public().await?,
                campaign,
                team1_score,
                team2_score,
            };
            let response = client.resolve_prediction_game(request).await;
            check_status(&response, StatusCode::OK).await?;
        }
        Commands::CheckPredictionResult { campaign } => {
            let request = CampaignActionRequest {
                caller: read_public().await?,
                campaign,
            };
            let won = client.check_prediction_result(request).await?;
            if won {
                println!("Prediction won, halftime ticket awarded");
            } else {
                println!("Prediction lost");
            }
        }
        Commands::GetFreeTicket { campaign } => {
            let request = CampaignActionRequest {
                caller: read_public().await?,
                campaign,
            };
            let response = client.get_free_ticket(request).await;
            check_status(&response, StatusCode::OK).await?;
        }
        Commands::PlayWithTicket { campaign } => {
            let request = CampaignActionRequest {
                caller: read_public().await?,
                campaign,
            };
            let sequence = client.play_with_ticket(request).await?;
            println!("Played, awaiting entropy for request {}", sequence);
        }
        Commands::PlayWithChz { campaign, value } => {
            let request = PlayWithChzRequest {
                caller: read_public().await?,
                campaign,
                sent_value: value.parse()?,
            };
            let sequence = client.play_with_chz(request).await?;
            println!("Played, awaiting entropy for request {}", sequence);
        }
        Commands::EntropyCallback {
            sequence,
            random_number,
        } => {
            let request = EntropyCallbackRequest {
                caller: read_public().await?,
                sequence,
                random_number,
            };
            let outcome = client.entropy_callback(request).await?;
            println!("{:#?}", outcome);
        }
        Commands::AddPrize {
            campaign,
            description,
            uri,
            supply,
        } => {
            let request = AddPrizeRequest {
                caller: read_public().await?,
                campaign,
                description,
                uri,
                supply,
            };
            let response = client.add_prize(request).await;
            check_status(&response, StatusCode::CREATED).await?;
            let id = response.json::<PrizeId>().await?;
            println!("Added prize {}", id);
        }
        Commands::ConfigureLoyaltyPrize {
            description,
            uri,
            supply,
        } => {
            let request = ConfigureLoyaltyPrizeRequest {
                caller: read_public().await?,
                description,
                uri,
                supply,
            };
            let response = client.configure_loyalty_prize(request).await;
            check_status(&response, StatusCode::OK).await?;
        }
        Commands::AwardLoyaltyPrize { user, points_cost } => {
            let request = AwardLoyaltyPrizeRequest {
                caller: read_public().await?,
                user,
                points_cost,
            };
            let token = client.award_loyalty_prize(request).await?;
            println!("Awarded loyalty prize token {} to {}", token, user);
        }
        Commands::UpdatePlayFee { fee_usd_cents } => {
            let request = UpdatePlayFeeRequest {
                caller: read_public().await?,
                fee_usd_cents,
            };
            let response = client.update_play_fee(request).await;
            check_status(&response, StatusCode::OK).await?;
        }
        Commands::UpdateTrustedDataResolver { resolver } => {
            let request = UpdateTrustedDataResolverRequest {
                caller: read_public().await?,
                resolver,
            };
            let response = client.update_trusted_data_resolver(request).await;
            check_status(&response, StatusCode::OK).await?;
        }
        Commands::UpdateWowPerBetLoss { amount } => {
            let request = UpdateWowPerBetLossRequest {
                caller: read_public().await?,
                amount,
            };
            let response = client.update_wow_per_bet_loss(request).await;
            check_status(&response, StatusCode::OK).await?;
        }
        Commands::TransferOwnership { new_owner } => {
            let request = TransferOwnershipRequest {
                caller: read_public().await?,
                new_owner,
            };
            let response = client.transfer_ownership(request).await;
            check_status(&response, StatusCode::OK).await?;
            println!("Ownership transferred to {}", new_owner);
        }
        Commands::SwapContractBalance => {
            let request = OwnerRequest {
                caller: read_public().await?,
            };
            let amount = client.swap_contract_balance(request).await?;
            println!("Swapped collected fees into {} WOW tokens", amount);
        }
        Commands::GetCampaign { campaign } => {
            let response = client.get_campaign(campaign).await?;
            println!("{:#?}", response);
        }
        Commands::GetPredictionGame { campaign } => {
            let response = client.get_prediction_game(campaign).await?;
            println!("{:#?}", response);
        }
        Commands::GetTicket { campaign, user } => {
            let user = match user {
                Some(user) => user,
                None => read_public().await?,
            };
            let request = CampaignActionRequest {
                caller: user,
                campaign,
            };
            let ticket = client.get_prediction_ticket(request).await?;
            println!("{:#?}", ticket);
        }
        Commands::GetBalances { user } => {
            let user = match user {
                Some(user) => user,
                None => read_public().await?,
            };
            let wow = client.get_wow_balance(user).await?;
            let points = client.get_loyalty_points(user).await?;
            let ticket = client.has_halftime_ticket(user).await?;
            let tokens = client.get_user_prize_tokens(user).await?;
            println!("WOW tokens: {}", wow);
            println!("Loyalty points: {}", points);
            println!("Halftime ticket: {}", ticket);
            println!("Prize tokens: {:#?}", tokens);
        }
        Commands::GetPlayFee => {
            let cents = client.get_play_fee().await?;
            let wei = client.get_required_play_fee().await?;
            println!("Play fee: {} USD cents ({} wei)", cents, wei);
        }
        Commands::GetEvents => {
            let events = client.get_events().await?;
            println!("{:#?}", events);
        }
    }
    Ok(())
}
async fn check_status(response: &reqwest::Response, expected: StatusCode) -> Result<()> {
    if response.status() != expected {
        bail!("{}", response.status());
    }
    Ok(())
}
async fn read_public() -> Result<UserAddress> {
    let mut file = File::open("ecdsa.pub").await?;
    let mut contents = vec![];
    file.read_to_end(&mut contents).await?;
    Ok(UserAddress::from_str(String::from_utf8(contents)?.as_str())?)
}
