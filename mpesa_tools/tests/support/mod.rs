#![allow(dead_code)]

use log::*;
use mpesa_tools::{Environment, MpesaApi, MpesaConfig, TOKEN_PATH};
use serde_json::{json, Value};
use wiremock::{
    matchers::{header, method, path, query_param},
    Mock,
    MockServer,
    ResponseTemplate,
};

pub const CONSUMER_KEY: &str = "test-consumer-key";
pub const CONSUMER_SECRET: &str = "test-consumer-secret";
pub const SHORTCODE: u64 = 174379;
pub const PASSKEY: &str = "bfb279f9aa9bdbcf158e97dd71a467cd2e0c893059b10f78e6b72ada1ed2c919";
pub const INITIATOR: &str = "testapi";
pub const INITIATOR_PASSWORD: &str = "Safaricom999!*!";
pub const CERTIFICATE: &str = include_str!("../../src/test_assets/test_certificate.pem");
pub const PRIVATE_KEY: &str = include_str!("../../src/test_assets/test_private_key.pem");
pub const PRODUCTION_CERTIFICATE: &str = include_str!("../../src/test_assets/production_certificate.pem");
pub const PRODUCTION_PRIVATE_KEY: &str = include_str!("../../src/test_assets/production_private_key.pem");
pub const RESULT_URL: &str = "https://example.com/mpesa/result";
pub const TIMEOUT_URL: &str = "https://example.com/mpesa/timeout";

pub fn prepare_test_env() {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
}

pub fn test_config(server: &MockServer) -> MpesaConfig {
    MpesaConfig::new(Environment::Sandbox, CONSUMER_KEY, CONSUMER_SECRET)
        .with_base_url(&server.uri())
        .with_shortcode(SHORTCODE)
        .with_passkey(PASSKEY)
        .with_initiator(INITIATOR, INITIATOR_PASSWORD)
        .with_certificate(Environment::Sandbox, CERTIFICATE)
}

pub async fn setup() -> (MockServer, MpesaApi) {
    prepare_test_env();
    let server = MockServer::start().await;
    let api = MpesaApi::new(test_config(&server)).expect("Could not create client");
    (server, api)
}

pub fn basic_auth() -> String {
    format!("Basic {}", base64::encode(format!("{CONSUMER_KEY}:{CONSUMER_SECRET}")))
}

/// Mounts the token endpoint, asserting on drop of the server that it was hit exactly `times` times.
pub async fn mount_token(server: &MockServer, token: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path(TOKEN_PATH))
        .and(query_param("grant_type", "client_credentials"))
        .and(header("Authorization", basic_auth().as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": token, "expires_in": "3599"})))
        .expect(times)
        .mount(server)
        .await;
}

pub async fn mount_post(server: &MockServer, endpoint: &str, token: &str, response: Value) {
    Mock::given(method("POST"))
        .and(path(endpoint))
        .and(header("Authorization", format!("Bearer {token}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(response))
        .mount(server)
        .await;
}

pub fn conversation_response() -> Value {
    json!({
        "ConversationID": "AG_20191219_00005797af5d7d75f652",
        "OriginatorConversationID": "16740-34861180-1",
        "ResponseCode": "0",
        "ResponseDescription": "Accept the service request successfully."
    })
}

/// The JSON bodies of every request the server received on `endpoint`.
pub async fn bodies_sent_to(server: &MockServer, endpoint: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == endpoint)
        .map(|r| serde_json::from_slice::<Value>(&r.body).expect("Request body was not JSON"))
        .collect()
}
