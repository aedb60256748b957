use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::*;
use mpg_common::helpers::truncated;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION},
    Client,
};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;

use crate::{
    config::MpesaConfig,
    credentials::{derive_password, derive_security_credential, AccessToken, TokenResponse},
    helpers::{provider_message, timestamp},
    requests::{
        BalanceQueryRequest,
        DisbursementRequest,
        Initiator,
        PushPaymentRequest,
        RegisterUrlsRequest,
        ReversalRequest,
        SimulateRequest,
        StkQueryBody,
        TransactionStatusRequest,
    },
    responses::{ConversationResponse, RegisterUrlsResponse, StkPushResponse, StkQueryResponse},
    ConversationResult,
    MpesaApiError,
    PushPaymentResult,
    PushPaymentStatus,
    RegisterUrlsResult,
};

pub const TOKEN_PATH: &str = "/oauth/v1/generate";
pub const STK_PUSH_PATH: &str = "/mpesa/stkpush/v1/processrequest";
pub const STK_QUERY_PATH: &str = "/mpesa/stkpushquery/v1/query";
pub const REGISTER_URLS_PATH: &str = "/mpesa/c2b/v1/registerurl";
pub const SIMULATE_PATH: &str = "/mpesa/c2b/v1/simulate";
pub const B2C_PATH: &str = "/mpesa/b2c/v1/paymentrequest";
pub const BALANCE_PATH: &str = "/mpesa/accountbalance/v1/query";
pub const TRANSACTION_STATUS_PATH: &str = "/mpesa/transactionstatus/v1/query";
pub const REVERSAL_PATH: &str = "/mpesa/reversal/v1/request";

/// Client for the M-Pesa Daraja API.
///
/// Clones share the HTTP connection pool and the cached access token. The token cache is guarded by a mutex that is
/// held for the duration of a refresh, so concurrent operations that find the token expired wait for one refresh
/// instead of each requesting their own.
#[derive(Clone)]
pub struct MpesaApi {
    config: MpesaConfig,
    client: Arc<Client>,
    token: Arc<Mutex<Option<AccessToken>>>,
}

impl MpesaApi {
    pub fn new(config: MpesaConfig) -> Result<Self, MpesaApiError> {
        config.validate()?;
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| MpesaApiError::Initialization(e.to_string()))?;
        info!("🔑️ M-Pesa client configured for {} ({})", config.environment, config.base_url);
        Ok(Self { config, client: Arc::new(client), token: Arc::new(Mutex::new(None)) })
    }

    pub fn config(&self) -> &MpesaConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    //-----------------------------------------   Access tokens   ----------------------------------------------------

    /// Returns a valid access token, fetching a new one if the cached token has expired.
    pub async fn access_token(&self) -> Result<AccessToken, MpesaApiError> {
        self.access_token_at(Utc::now()).await
    }

    /// As [`Self::access_token`], with validity judged at `now`. A fresh token expires at `now + expires_in`.
    pub async fn access_token_at(&self, now: DateTime<Utc>) -> Result<AccessToken, MpesaApiError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_valid_at(now)) {
            trace!("🔑️ Reusing access token, valid until {}", token.expires_at());
            return Ok(token.clone());
        }
        debug!("🔑️ Access token is missing or expired. Requesting a new one.");
        let token = self.fetch_token(now).await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Seeds the cache with a token obtained elsewhere, e.g. one persisted across restarts.
    pub async fn set_access_token(&self, token: AccessToken) {
        *self.token.lock().await = Some(token);
    }

    /// Drops the cached token so that the next operation fetches a new one.
    pub async fn clear_access_token(&self) {
        *self.token.lock().await = None;
    }

    async fn fetch_token(&self, now: DateTime<Utc>) -> Result<AccessToken, MpesaApiError> {
        let url = self.url(TOKEN_PATH);
        trace!("Requesting access token from {url}");
        let response = self
            .client
            .get(url)
            .query(&[("grant_type", "client_credentials")])
            .basic_auth(&self.config.consumer_key, Some(self.config.consumer_secret.reveal()))
            .send()
            .await
            .map_err(MpesaApiError::from_transport)?;
        let status = response.status();
        let body = response.text().await.map_err(MpesaApiError::from_transport)?;
        if !status.is_success() {
            let message = provider_message(&body);
            warn!("🔑️ Token request was rejected. {status}. {message}");
            return Err(MpesaApiError::AuthError { status: status.as_u16(), message });
        }
        let response = serde_json::from_str::<TokenResponse>(&body)
            .map_err(|e| MpesaApiError::JsonError(format!("Invalid token response. {e}")))?;
        let token = AccessToken::from_response(response, now);
        debug!("🔑️ New access token {} issued, valid until {}", truncated(token.token(), 6), token.expires_at());
        Ok(token)
    }

    //-----------------------------------------   Requests   ---------------------------------------------------------

    /// POSTs `body` to `path` with a bearer token and deserializes a successful response.
    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, MpesaApiError> {
        let token = self.access_token().await?;
        let url = self.url(path);
        trace!("Sending REST query: {url}");
        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, token.bearer())
            .json(body)
            .send()
            .await
            .map_err(MpesaApiError::from_transport)?;
        let status = response.status();
        let text = response.text().await.map_err(MpesaApiError::from_transport)?;
        if status.is_success() {
            trace!("REST query successful. {status}. {text}");
            serde_json::from_str::<T>(&text).map_err(|e| MpesaApiError::JsonError(format!("{e}. Response: {text}")))
        } else {
            let message = provider_message(&text);
            debug!("REST query to {path} failed. {status}. {message}");
            Err(MpesaApiError::ProviderError { status: status.as_u16(), message })
        }
    }

    /// The `SecurityCredential` for B2C-class operations: the configured credential if there is one, otherwise the
    /// initiator password encrypted with the certificate of the configured environment.
    pub fn security_credential(&self) -> Result<String, MpesaApiError> {
        if let Some(credential) = self.config.security_credential.as_ref().filter(|c| !c.is_empty()) {
            return Ok(credential.reveal().clone());
        }
        let pem = self.config.certificate().ok_or_else(|| {
            MpesaApiError::CryptoError(format!("No certificate has been configured for {}", self.config.environment))
        })?;
        derive_security_credential(self.config.initiator_password.reveal(), pem)
    }

    fn initiator(&self) -> Result<Initiator, MpesaApiError> {
        self.config.validate_initiator()?;
        let credential = self.security_credential()?;
        Ok(Initiator { name: self.config.initiator_name.clone(), credential })
    }

    //-----------------------------------------   Operations   -------------------------------------------------------

    /// Sends an STK push prompt to the customer's phone. Store the returned `checkout_request_id` to match the
    /// eventual [`crate::StkCallback`].
    pub async fn push_payment(&self, request: &PushPaymentRequest) -> Result<PushPaymentResult, MpesaApiError> {
        request.validate(self.config.strict_validation)?;
        let (shortcode, passkey) = self.config.push_credentials()?;
        let timestamp = timestamp(Utc::now());
        let password = derive_password(shortcode, passkey.reveal(), &timestamp);
        let body = request.to_body(shortcode, password, &timestamp);
        debug!("Requesting STK push of {} for {}", request.amount, request.account_reference);
        let response = self.rest_query::<StkPushResponse, _>(STK_PUSH_PATH, &body).await?;
        info!(
            "STK push accepted. MerchantRequestID: {} CheckoutRequestID: {}",
            response.merchant_request_id, response.checkout_request_id
        );
        Ok(response.into())
    }

    pub async fn push_payment_query(&self, checkout_request_id: &str) -> Result<PushPaymentStatus, MpesaApiError> {
        if checkout_request_id.trim().is_empty() {
            return Err(MpesaApiError::ValidationError("CheckoutRequestID cannot be empty".to_string()));
        }
        let (shortcode, passkey) = self.config.push_credentials()?;
        let timestamp = timestamp(Utc::now());
        let body = StkQueryBody {
            business_short_code: shortcode,
            password: derive_password(shortcode, passkey.reveal(), &timestamp),
            timestamp,
            checkout_request_id: checkout_request_id.to_string(),
        };
        debug!("Querying STK push {checkout_request_id}");
        let response = self.rest_query::<StkQueryResponse, _>(STK_QUERY_PATH, &body).await?;
        info!("STK push {checkout_request_id}: {} ({})", response.result_desc, response.result_code);
        Ok(response.into())
    }

    pub async fn register_urls(&self, request: &RegisterUrlsRequest) -> Result<RegisterUrlsResult, MpesaApiError> {
        request.validate()?;
        let shortcode = self.config.require_shortcode()?;
        let body = request.to_body(shortcode);
        debug!("Registering C2B URLs for {shortcode}: {} / {}", request.validation_url, request.confirmation_url);
        let response = self.rest_query::<RegisterUrlsResponse, _>(REGISTER_URLS_PATH, &body).await?;
        info!("Registered C2B URLs for {shortcode}. {}", response.response_description);
        Ok(response.into())
    }

    /// Simulates a customer paying the business shortcode. Refused locally outside the sandbox.
    pub async fn simulate_transaction(&self, request: &SimulateRequest) -> Result<ConversationResult, MpesaApiError> {
        if self.config.environment.is_production() {
            return Err(MpesaApiError::ValidationError(
                "C2B transactions can only be simulated in the sandbox environment".to_string(),
            ));
        }
        request.validate()?;
        let shortcode = self.config.require_shortcode()?;
        let body = request.to_body(shortcode);
        debug!("Simulating C2B payment of {} to {shortcode} for {}", request.amount, request.bill_ref_number);
        let response = self.rest_query::<ConversationResponse, _>(SIMULATE_PATH, &body).await?;
        info!("C2B simulation accepted. ConversationID: {}", response.conversation_id);
        Ok(response.into())
    }

    /// Pays a customer from the business shortcode (B2C).
    pub async fn disburse(&self, request: &DisbursementRequest) -> Result<ConversationResult, MpesaApiError> {
        request.validate(self.config.strict_validation)?;
        let initiator = self.initiator()?;
        let shortcode = self.config.require_shortcode()?;
        let body = request.to_body(shortcode, &initiator);
        debug!("Requesting {} of {}", request.command_id, request.amount);
        let response = self.rest_query::<ConversationResponse, _>(B2C_PATH, &body).await?;
        info!("B2C payment accepted. ConversationID: {}", response.conversation_id);
        Ok(response.into())
    }

    pub async fn account_balance(&self, request: &BalanceQueryRequest) -> Result<ConversationResult, MpesaApiError> {
        request.validate(self.config.strict_validation)?;
        let initiator = self.initiator()?;
        let shortcode = self.config.require_shortcode()?;
        let body = request.to_body(shortcode, &initiator);
        debug!("Querying account balance for {shortcode}");
        let response = self.rest_query::<ConversationResponse, _>(BALANCE_PATH, &body).await?;
        info!("Balance query accepted. ConversationID: {}", response.conversation_id);
        Ok(response.into())
    }

    pub async fn transaction_status(
        &self,
        request: &TransactionStatusRequest,
    ) -> Result<ConversationResult, MpesaApiError> {
        request.validate(self.config.strict_validation)?;
        let initiator = self.initiator()?;
        let shortcode = self.config.require_shortcode()?;
        let body = request.to_body(shortcode, &initiator);
        debug!("Querying status of transaction {}", request.transaction_id);
        let response = self.rest_query::<ConversationResponse, _>(TRANSACTION_STATUS_PATH, &body).await?;
        info!("Status query for {} accepted. ConversationID: {}", request.transaction_id, response.conversation_id);
        Ok(response.into())
    }

    pub async fn reverse_transaction(&self, request: &ReversalRequest) -> Result<ConversationResult, MpesaApiError> {
        request.validate(self.config.strict_validation)?;
        let initiator = self.initiator()?;
        let shortcode = self.config.require_shortcode()?;
        let body = request.to_body(shortcode, &initiator);
        debug!("Requesting reversal of {} for {}", request.transaction_id, request.amount);
        let response = self.rest_query::<ConversationResponse, _>(REVERSAL_PATH, &body).await?;
        info!("Reversal of {} accepted. ConversationID: {}", request.transaction_id, response.conversation_id);
        Ok(response.into())
    }
}
