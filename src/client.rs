use anyhow::{bail, Result};
use reqwest::{Response, StatusCode};

use crate::api::*;

pub struct Client {
    url: String,
    client: reqwest::Client,
}
impl Client {
    pub fn new(url: String) -> Self {
        let client = reqwest::Client::new();
        Self { url, client }
    }
    pub async fn create_campaign(&self, request: CreateCampaignRequest) -> Response {
        self.client
            .post(self.url.clone() + "/create_campaign")
            .json(&request)
            .send()
            .await
            .unwrap()
    }
    pub async fn set_campaign_active(&self, request: SetCampaignActiveRequest) -> Response {
        self.client
            .post(self.url.clone() + "/set_campaign_active")
            .json(&request)
            .send()
            .await
            .unwrap()
    }
    pub async fn create_prediction_game(&self, request: CreatePredictionGameRequest) -> Response {
        self.client
            .post(self.url.clone() + "/create_prediction_game")
            .json(&request)
            .send()
            .await
            .unwrap()
    }
    pub async fn submit_predictions(&self, request: SubmitPredictionsRequest) -> Response {
        self.client
            .post(self.url.clone() + "/submit_predictions")
            .json(&request)
            .send()
            .await
            .unwrap()
    }
    pub async fn resolve_prediction_game(&self, request: ResolvePredictionGameRequest) -> Response {
        self.client
            .post(self.url.clone() + "/resolve_prediction_game")
            .json(&request)
            .send()
            .await
            .unwrap()
    }
    pub async fn check_prediction_result(&self, request: CampaignActionRequest) -> Result<bool> {
        let response = self
            .client
            .post(self.url.clone() + "/check_prediction_result")
            .json(&request)
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            bail!("{}: {}", response.status(), response.text().await?)
        }
        Ok(response.json::<bool>().await?)
    }
    pub async fn get_free_ticket(&self, request: CampaignActionRequest) -> Response {
        self.client
            .post(self.url.clone() + "/get_free_ticket")
            .json(&request)
            .send()
            .await
            .unwrap()
    }
    pub async fn play_with_ticket(&self, request: CampaignActionRequest) -> Result<RequestId> {
        let response = self
            .client
            .post(self.url.clone() + "/play_with_ticket")
            .json(&request)
            .send()
            .await?;
        if response.status() != StatusCode::CREATED {
            bail!("{}: {}", response.status(), response.text().await?)
        }
        Ok(response.json::<RequestId>().await?)
    }
    pub async fn play_with_chz(&self, request: PlayWithChzRequest) -> Result<RequestId> {
        let response = self
            .client
            .post(self.url.clone() + "/play_with_chz")
            .json(&request)
            .send()
            .await?;
        if response.status() != StatusCode::CREATED {
            bail!("{}: {}", response.status(), response.text().await?)
        }
        Ok(response.json::<RequestId>().await?)
    }
    pub async fn entropy_callback(
        &self,
        request: EntropyCallbackRequest,
    ) -> Result<PlayOutcomeResponse> {
        let response = self
            .client
            .post(self.url.clone() + "/entropy_callback")
            .json(&request)
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            bail!("{}: {}", response.status(), response.text().await?)
        }
        Ok(response.json::<PlayOutcomeResponse>().await?)
    }
    pub async fn add_prize(&self, request: AddPrizeRequest) -> Response {
        self.client
            .post(self.url.clone() + "/add_prize")
            .json(&request)
            .send()
            .await
            .unwrap()
    }
    pub async fn configure_loyalty_prize(&self, request: ConfigureLoyaltyPrizeRequest) -> Response {
        self.client
            .post(self.url.clone() + "/configure_loyalty_prize")
            .json(&request)
            .send()
            .await
            .unwrap()
    }
    pub async fn award_loyalty_prize(&self, request: AwardLoyaltyPrizeRequest) -> Result<TokenId> {
        let response = self
            .client
            .post(self.url.clone() + "/award_loyalty_prize")
            .json(&request)
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            bail!("{}: {}", response.status(), response.text().await?)
        }
        Ok(response.json::<TokenId>().await?)
    }
    pub async fn update_play_fee(&self, request: UpdatePlayFeeRequest) -> Response {
        self.client
            .post(self.url.clone() + "/update_play_fee")
            .json(&request)
            .send()
            .await
            .unwrap()
    }
    pub async fn transfer_ownership(&self, request: TransferOwnershipRequest) -> Response {
        self.client
            .post(self.url.clone() + "/transfer_ownership")
            .json(&request)
            .send()
            .await
            .unwrap()
    }
    pub async fn update_trusted_data_resolver(
        &self,
        request: UpdateTrustedDataResolverRequest,
    ) -> Response {
        self.client
            .post(self.url.clone() + "/update_trusted_data_resolver")
            .json(&request)
            .send()
            .await
            .unwrap()
    }
    pub async fn update_wow_per_bet_loss(&self, request: UpdateWowPerBetLossRequest) -> Response {
        self.client
            .post(self.url.clone() + "/update_wow_per_bet_loss")
            .json(&request)
            .send()
            .await
            .unwrap()
    }
    pub async fn swap_contract_balance(&self, request: OwnerRequest) -> Result<WowAmount> {
        let response = self
            .client
            .post(self.url.clone() + "/swap_contract_balance")
            .json(&request)
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            bail!("{}: {}", response.status(), response.text().await?)
        }
        Ok(response.json::<WowAmount>().await?)
    }

    pub async fn next_campaign_id(&self) -> Result<CampaignId> {
        let response = self
            .client
            .get(self.url.clone() + "/next_campaign_id")
            .send()
            .await?;
        Ok(response.json::<CampaignId>().await?)
    }
    pub async fn get_campaign(&self, campaign: CampaignId) -> Result<CampaignResponse> {
        let response = self
            .client
            .post(self.url.clone() + "/get_campaign")
            .json(&campaign)
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            bail!("{}: {}", response.status(), response.text().await?)
        }
        Ok(response.json::<CampaignResponse>().await?)
    }
    pub async fn get_prediction_game(&self, campaign: CampaignId) -> Result<PredictionGameResponse> {
        let response = self
            .client
            .post(self.url.clone() + "/get_prediction_game")
            .json(&campaign)
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            bail!("{}: {}", response.status(), response.text().await?)
        }
        Ok(response.json::<PredictionGameResponse>().await?)
    }
    pub async fn get_prediction_ticket(
        &self,
        request: CampaignActionRequest,
    ) -> Result<PredictionTicketResponse> {
        let response = self
            .client
            .post(self.url.clone() + "/get_prediction_ticket")
            .json(&request)
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            bail!("{}: {}", response.status(), response.text().await?)
        }
        Ok(response.json::<PredictionTicketResponse>().await?)
    }
    pub async fn has_halftime_ticket(&self, user: UserAddress) -> Result<bool> {
        let response = self
            .client
            .post(self.url.clone() + "/has_halftime_ticket")
            .json(&user)
            .send()
            .await?;
        Ok(response.json::<bool>().await?)
    }
    pub async fn get_loyalty_points(&self, user: UserAddress) -> Result<LoyaltyPoints> {
        let response = self
            .client
            .post(self.url.clone() + "/get_loyalty_points")
            .json(&user)
            .send()
            .await?;
        Ok(response.json::<LoyaltyPoints>().await?)
    }
    pub async fn get_wow_balance(&self, user: UserAddress) -> Result<WowAmount> {
        let response = self
            .client
            .post(self.url.clone() + "/get_wow_balance")
            .json(&user)
            .send()
            .await?;
        Ok(response.json::<WowAmount>().await?)
    }
    pub async fn get_play_fee(&self) -> Result<UsdCents> {
        let response = self
            .client
            .get(self.url.clone() + "/get_play_fee")
            .send()
            .await?;
        Ok(response.json::<UsdCents>().await?)
    }
    pub async fn get_required_play_fee(&self) -> Result<ChzWei> {
        let response = self
            .client
            .get(self.url.clone() + "/get_required_play_fee")
            .send()
            .await?;
        Ok(response.json::<ChzWei>().await?)
    }
    pub async fn get_prize(&self, prize: PrizeId) -> Result<PrizeResponse> {
        let response = self
            .client
            .post(self.url.clone() + "/get_prize")
            .json(&prize)
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            bail!("{}: {}", response.status(), response.text().await?)
        }
        Ok(response.json::<PrizeResponse>().await?)
    }
    pub async fn next_prize_id(&self) -> Result<PrizeId> {
        let response = self
            .client
            .get(self.url.clone() + "/next_prize_id")
            .send()
            .await?;
        Ok(response.json::<PrizeId>().await?)
    }
    pub async fn next_token_id(&self) -> Result<TokenId> {
        let response = self
            .client
            .get(self.url.clone() + "/next_token_id")
            .send()
            .await?;
        Ok(response.json::<TokenId>().await?)
    }
    pub async fn token_uri(&self, token: TokenId) -> Result<String> {
        let response = self
            .client
            .post(self.url.clone() + "/token_uri")
            .json(&token)
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            bail!("{}: {}", response.status(), response.text().await?)
        }
        Ok(response.text().await?)
    }
    pub async fn get_user_prize_tokens(
        &self,
        user: UserAddress,
    ) -> Result<Vec<PrizeTokenResponse>> {
        let response = self
            .client
            .post(self.url.clone() + "/get_user_prize_tokens")
            .json(&user)
            .send()
            .await?;
        Ok(response.json::<Vec<PrizeTokenResponse>>().await?)
    }
    pub async fn get_events(&self) -> Result<Vec<Event>> {
        let response = self
            .client
            .get(self.url.clone() + "/get_events")
            .send()
            .await?;
        Ok(response.json::<Vec<Event>>().await?)
    }
}
