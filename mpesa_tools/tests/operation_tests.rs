use std::time::Duration;

use mpesa_tools::{
    derive_password,
    BalanceQueryRequest,
    CommandId,
    DisbursementRequest,
    Environment,
    MpesaApi,
    MpesaApiError,
    MpesaConfig,
    PushPaymentRequest,
    RegisterUrlsRequest,
    ReversalRequest,
    Shillings,
    SimulateRequest,
    TransactionStatusRequest,
    B2C_PATH,
    BALANCE_PATH,
    REGISTER_URLS_PATH,
    REVERSAL_PATH,
    SIMULATE_PATH,
    STK_PUSH_PATH,
    STK_QUERY_PATH,
    TRANSACTION_STATUS_PATH,
};
use rsa::{pkcs8::DecodePrivateKey, Pkcs1v15Encrypt, RsaPrivateKey};
use serde_json::json;
use wiremock::{
    matchers::{method, path},
    Mock,
    MockServer,
    ResponseTemplate,
};

use crate::support::*;

mod support;

fn decrypt_with(private_key: &str, credential: &str) -> Option<String> {
    let key = RsaPrivateKey::from_pkcs8_pem(private_key).unwrap();
    let bytes = base64::decode(credential).unwrap();
    key.decrypt(Pkcs1v15Encrypt, &bytes).ok().and_then(|b| String::from_utf8(b).ok())
}

fn decrypt_credential(credential: &str) -> String {
    decrypt_with(PRIVATE_KEY, credential).expect("Credential was not encrypted with the sandbox certificate")
}

#[tokio::test]
async fn push_payment() {
    let (server, api) = setup().await;
    mount_token(&server, "tok", 1).await;
    mount_post(
        &server,
        STK_PUSH_PATH,
        "tok",
        json!({"MerchantRequestID": "X", "CheckoutRequestID": "Y", "ResponseCode": "0"}),
    )
    .await;
    let request =
        PushPaymentRequest::new(Shillings::from(100u64), 254708374149, RESULT_URL, "INV-001").with_description("Order 1");
    let result = api.push_payment(&request).await.unwrap();
    let v = serde_json::to_value(&result).unwrap();
    assert_eq!(v["merchantRequestId"], "X");
    assert_eq!(v["checkoutRequestId"], "Y");

    let bodies = bodies_sent_to(&server, STK_PUSH_PATH).await;
    assert_eq!(bodies.len(), 1);
    let body = &bodies[0];
    let timestamp = body["Timestamp"].as_str().unwrap();
    assert_eq!(timestamp.len(), 14);
    assert!(timestamp.chars().all(|c| c.is_ascii_digit()));
    assert_eq!(body["Password"], derive_password(SHORTCODE, PASSKEY, timestamp));
    assert_eq!(body["BusinessShortCode"], SHORTCODE);
    assert_eq!(body["Amount"], 100);
    assert_eq!(body["PartyA"], 254708374149u64);
    assert_eq!(body["PhoneNumber"], 254708374149u64);
    assert_eq!(body["AccountReference"], "INV-001");
    assert_eq!(body["TransactionDesc"], "Order 1");
    assert_eq!(body.as_object().unwrap().len(), 11);
}

#[tokio::test]
async fn push_payment_query() {
    let (server, api) = setup().await;
    mount_token(&server, "tok", 1).await;
    mount_post(
        &server,
        STK_QUERY_PATH,
        "tok",
        json!({
            "ResponseCode": "0",
            "ResponseDescription": "The service request has been accepted successsfully",
            "MerchantRequestID": "22205-34066-1",
            "CheckoutRequestID": "ws_CO_13012021093521236557",
            "ResultCode": "0",
            "ResultDesc": "The service request is processed successfully."
        }),
    )
    .await;
    let status = api.push_payment_query("ws_CO_13012021093521236557").await.unwrap();
    assert!(status.is_success());
    assert_eq!(status.result_desc, "The service request is processed successfully.");
    let body = &bodies_sent_to(&server, STK_QUERY_PATH).await[0];
    assert_eq!(body["CheckoutRequestID"], "ws_CO_13012021093521236557");
    let timestamp = body["Timestamp"].as_str().unwrap();
    assert_eq!(body["Password"], derive_password(SHORTCODE, PASSKEY, timestamp));
    assert_eq!(body.as_object().unwrap().len(), 4);
}

#[tokio::test]
async fn register_urls() {
    let (server, api) = setup().await;
    mount_token(&server, "tok", 1).await;
    mount_post(
        &server,
        REGISTER_URLS_PATH,
        "tok",
        json!({"OriginatorCoversationID": "7619-37765134-1", "ResponseCode": "0", "ResponseDescription": "success"}),
    )
    .await;
    let request = RegisterUrlsRequest::new("https://example.com/validate", "https://example.com/confirm");
    let result = api.register_urls(&request).await.unwrap();
    assert_eq!(result.response_description, "success");
    let body = &bodies_sent_to(&server, REGISTER_URLS_PATH).await[0];
    assert_eq!(
        body,
        &json!({
            "ValidationURL": "https://example.com/validate",
            "ConfirmationURL": "https://example.com/confirm",
            "ResponseType": "Completed",
            "ShortCode": SHORTCODE
        })
    );
}

#[tokio::test]
async fn simulate_transaction_in_sandbox() {
    let (server, api) = setup().await;
    mount_token(&server, "tok", 1).await;
    mount_post(&server, SIMULATE_PATH, "tok", conversation_response()).await;
    let request = SimulateRequest::new(Shillings::from(10u64), 254708374149, "invoice008");
    let result = api.simulate_transaction(&request).await.unwrap();
    assert_eq!(result.conversation_id, "AG_20191219_00005797af5d7d75f652");
    let body = &bodies_sent_to(&server, SIMULATE_PATH).await[0];
    assert_eq!(
        body,
        &json!({
            "Amount": 10,
            "BillRefNumber": "invoice008",
            "CommandID": "CustomerPayBillOnline",
            "Msisdn": 254708374149u64,
            "ShortCode": SHORTCODE
        })
    );
}

#[tokio::test]
async fn simulate_transaction_is_refused_in_production() {
    prepare_test_env();
    let server = MockServer::start().await;
    let config = MpesaConfig { environment: Environment::Production, ..test_config(&server) };
    let api = MpesaApi::new(config).unwrap();
    let request = SimulateRequest::new(Shillings::from(10u64), 254708374149, "invoice008");
    let err = api.simulate_transaction(&request).await.unwrap_err();
    assert!(matches!(err, MpesaApiError::ValidationError(_)));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn disbursement_encrypts_the_initiator_password() {
    let (server, api) = setup().await;
    mount_token(&server, "tok", 1).await;
    mount_post(&server, B2C_PATH, "tok", conversation_response()).await;
    let request = DisbursementRequest::new(Shillings::from(500u64), 254708374149, RESULT_URL, TIMEOUT_URL)
        .with_command_id(CommandId::SalaryPayment)
        .with_remarks("June salary");
    let result = api.disburse(&request).await.unwrap();
    assert_eq!(result.originator_conversation_id, "16740-34861180-1");
    let body = &bodies_sent_to(&server, B2C_PATH).await[0];
    assert_eq!(body["InitiatorName"], INITIATOR);
    assert_eq!(body["CommandID"], "SalaryPayment");
    assert_eq!(body["PartyA"], SHORTCODE);
    assert_eq!(body["PartyB"], 254708374149u64);
    assert_eq!(body["QueueTimeOutURL"], TIMEOUT_URL);
    assert_eq!(body["ResultURL"], RESULT_URL);
    assert_eq!(body["Occassion"], "");
    assert_eq!(decrypt_credential(body["SecurityCredential"].as_str().unwrap()), INITIATOR_PASSWORD);
}

#[tokio::test]
async fn precomputed_security_credential_is_sent_as_is() {
    prepare_test_env();
    let server = MockServer::start().await;
    let config = test_config(&server).with_security_credential("UHJlY29tcHV0ZWQ=");
    let api = MpesaApi::new(config).unwrap();
    mount_token(&server, "tok", 1).await;
    mount_post(&server, BALANCE_PATH, "tok", conversation_response()).await;
    api.account_balance(&BalanceQueryRequest::new(RESULT_URL, TIMEOUT_URL)).await.unwrap();
    let body = &bodies_sent_to(&server, BALANCE_PATH).await[0];
    assert_eq!(body["SecurityCredential"], "UHJlY29tcHV0ZWQ=");
    assert_eq!(body["Initiator"], INITIATOR);
    assert_eq!(body["CommandID"], "AccountBalance");
    assert_eq!(body["IdentifierType"], "4");
    assert_eq!(body.as_object().unwrap().len(), 8);
}

#[tokio::test]
async fn security_credential_uses_the_environment_certificate() {
    prepare_test_env();
    let server = MockServer::start().await;
    let sandbox = test_config(&server).with_certificate(Environment::Production, PRODUCTION_CERTIFICATE);
    let production = MpesaConfig { environment: Environment::Production, ..sandbox.clone() };

    let credential = MpesaApi::new(sandbox).unwrap().security_credential().unwrap();
    assert_eq!(decrypt_with(PRIVATE_KEY, &credential).as_deref(), Some(INITIATOR_PASSWORD));
    assert_ne!(decrypt_with(PRODUCTION_PRIVATE_KEY, &credential).as_deref(), Some(INITIATOR_PASSWORD));

    let credential = MpesaApi::new(production).unwrap().security_credential().unwrap();
    assert_eq!(decrypt_with(PRODUCTION_PRIVATE_KEY, &credential).as_deref(), Some(INITIATOR_PASSWORD));
    assert_ne!(decrypt_with(PRIVATE_KEY, &credential).as_deref(), Some(INITIATOR_PASSWORD));
}

#[tokio::test]
async fn sandbox_certificate_is_not_used_in_production() {
    prepare_test_env();
    let server = MockServer::start().await;
    let config = MpesaConfig { environment: Environment::Production, ..test_config(&server) };
    let api = MpesaApi::new(config).unwrap();
    let request = DisbursementRequest::new(Shillings::from(10u64), 254708374149, RESULT_URL, TIMEOUT_URL);
    let err = api.disburse(&request).await.unwrap_err();
    assert!(matches!(err, MpesaApiError::ValidationError(ref m) if m.contains("production certificate")), "{err:?}");
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn transaction_status() {
    let (server, api) = setup().await;
    mount_token(&server, "tok", 1).await;
    mount_post(&server, TRANSACTION_STATUS_PATH, "tok", conversation_response()).await;
    let request = TransactionStatusRequest::new("OEI2AK4Q16", RESULT_URL, TIMEOUT_URL).with_occasion("audit");
    let result = api.transaction_status(&request).await.unwrap();
    assert_eq!(result.response_description, "Accept the service request successfully.");
    let body = &bodies_sent_to(&server, TRANSACTION_STATUS_PATH).await[0];
    assert_eq!(body["TransactionID"], "OEI2AK4Q16");
    assert_eq!(body["Occasion"], "audit");
    assert_eq!(body["CommandID"], "TransactionStatusQuery");
    assert_eq!(body.as_object().unwrap().len(), 10);
}

#[tokio::test]
async fn reversal() {
    let (server, api) = setup().await;
    mount_token(&server, "tok", 1).await;
    mount_post(&server, REVERSAL_PATH, "tok", conversation_response()).await;
    let request = ReversalRequest::new("OEI2AK4Q16", Shillings::from(100u64), RESULT_URL, TIMEOUT_URL);
    api.reverse_transaction(&request).await.unwrap();
    let body = &bodies_sent_to(&server, REVERSAL_PATH).await[0];
    assert_eq!(body["ReceiverParty"], SHORTCODE);
    assert_eq!(body["ReceiverIdentifierType"], "11");
    assert_eq!(body["TransactionID"], "OEI2AK4Q16");
    assert_eq!(body["CommandID"], "TransactionReversal");
    assert_eq!(decrypt_credential(body["SecurityCredential"].as_str().unwrap()), INITIATOR_PASSWORD);
}

#[tokio::test]
async fn provider_errors_carry_the_provider_message() {
    let (server, api) = setup().await;
    mount_token(&server, "tok", 1).await;
    Mock::given(method("POST"))
        .and(path(B2C_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "requestId": "11728-2929992-1",
            "errorCode": "500.002.1001",
            "errorMessage": "Service is currently unreachable. Please try again later."
        })))
        .mount(&server)
        .await;
    let request = DisbursementRequest::new(Shillings::from(10u64), 254708374149, RESULT_URL, TIMEOUT_URL);
    match api.disburse(&request).await {
        Err(MpesaApiError::ProviderError { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "Service is currently unreachable. Please try again later. (500.002.1001)");
        },
        other => panic!("Expected a provider error, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_certificate_is_a_validation_error_before_any_request() {
    prepare_test_env();
    let server = MockServer::start().await;
    let config = MpesaConfig { sandbox_certificate_pem: None, ..test_config(&server) };
    let api = MpesaApi::new(config).unwrap();
    let request = DisbursementRequest::new(Shillings::from(10u64), 254708374149, RESULT_URL, TIMEOUT_URL);
    let err = api.disburse(&request).await.unwrap_err();
    assert!(matches!(err, MpesaApiError::ValidationError(_)));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn invalid_certificate_is_a_crypto_error() {
    prepare_test_env();
    let server = MockServer::start().await;
    let config = test_config(&server)
        .with_certificate(Environment::Sandbox, "-----BEGIN CERTIFICATE-----\nnope\n-----END CERTIFICATE-----");
    let api = MpesaApi::new(config).unwrap();
    let err = api.account_balance(&BalanceQueryRequest::new(RESULT_URL, TIMEOUT_URL)).await.unwrap_err();
    assert!(matches!(err, MpesaApiError::CryptoError(_)));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn slow_responses_time_out() {
    prepare_test_env();
    let server = MockServer::start().await;
    let config = test_config(&server).with_timeout(Duration::from_millis(200));
    let api = MpesaApi::new(config).unwrap();
    mount_token(&server, "tok", 1).await;
    Mock::given(method("POST"))
        .and(path(BALANCE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(conversation_response()).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;
    let err = api.account_balance(&BalanceQueryRequest::new(RESULT_URL, TIMEOUT_URL)).await.unwrap_err();
    assert!(matches!(err, MpesaApiError::Timeout(_)), "Expected a timeout, got {err:?}");
}

#[tokio::test]
async fn unreachable_host_is_a_transport_error() {
    prepare_test_env();
    let config = MpesaConfig::new(Environment::Sandbox, CONSUMER_KEY, CONSUMER_SECRET)
        .with_base_url("http://127.0.0.1:1")
        .with_shortcode(SHORTCODE)
        .with_passkey(PASSKEY);
    let api = MpesaApi::new(config).unwrap();
    let err = api.push_payment_query("ws_CO_1").await.unwrap_err();
    assert!(matches!(err, MpesaApiError::TransportError(_)), "Expected a transport error, got {err:?}");
}

#[tokio::test]
async fn invalid_requests_never_reach_the_network() {
    let (server, api) = setup().await;
    let zero = PushPaymentRequest::new(Shillings::default(), 254708374149, RESULT_URL, "INV-001");
    assert!(matches!(api.push_payment(&zero).await, Err(MpesaApiError::ValidationError(_))));
    let bad_url = RegisterUrlsRequest::new("not a url", "https://example.com/confirm");
    assert!(matches!(api.register_urls(&bad_url).await, Err(MpesaApiError::ValidationError(_))));
    assert!(matches!(api.push_payment_query(" ").await, Err(MpesaApiError::ValidationError(_))));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}
