use chrono::{Duration, TimeZone, Utc};
use futures::future::join_all;
use mpesa_tools::{AccessToken, MpesaApiError, PushPaymentRequest, Shillings, STK_PUSH_PATH, TOKEN_PATH};
use serde_json::json;
use wiremock::{
    matchers::{method, path},
    Mock,
    ResponseTemplate,
};

use crate::support::*;

mod support;

fn stk_response() -> serde_json::Value {
    json!({
        "MerchantRequestID": "29115-34620561-1",
        "CheckoutRequestID": "ws_CO_191220191020363925",
        "ResponseCode": "0",
        "ResponseDescription": "Success. Request accepted for processing",
        "CustomerMessage": "Success. Request accepted for processing"
    })
}

#[tokio::test]
async fn valid_token_is_reused_across_operations() {
    let (server, api) = setup().await;
    mount_token(&server, "token-1", 1).await;
    mount_post(&server, STK_PUSH_PATH, "token-1", stk_response()).await;
    let request = PushPaymentRequest::new(Shillings::from(1u64), 254708374149, RESULT_URL, "INV-001");
    api.push_payment(&request).await.expect("first push failed");
    api.push_payment(&request).await.expect("second push failed");
    assert_eq!(bodies_sent_to(&server, STK_PUSH_PATH).await.len(), 2);
    server.verify().await;
}

#[tokio::test]
async fn token_is_reused_until_expiry() {
    let (server, api) = setup().await;
    mount_token(&server, "token-1", 1).await;
    let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let first = api.access_token_at(t0).await.unwrap();
    let second = api.access_token_at(t0 + Duration::seconds(3598)).await.unwrap();
    assert_eq!(first.token(), "token-1");
    assert_eq!(second.token(), "token-1");
    assert_eq!(second.expires_at(), first.expires_at());
    server.verify().await;
}

#[tokio::test]
async fn expired_token_is_refreshed_once() {
    let (server, api) = setup().await;
    mount_token(&server, "token-2", 2).await;
    let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let first = api.access_token_at(t0).await.unwrap();
    assert_eq!(first.expires_at(), t0 + Duration::seconds(3599));
    let t1 = first.expires_at();
    let refreshed = api.access_token_at(t1).await.unwrap();
    assert_eq!(refreshed.expires_at(), t1 + Duration::seconds(3599));
    let again = api.access_token_at(t1 + Duration::seconds(60)).await.unwrap();
    assert_eq!(again.expires_at(), refreshed.expires_at());
    server.verify().await;
}

#[tokio::test]
async fn seeded_token_skips_the_token_endpoint() {
    let (server, api) = setup().await;
    mount_token(&server, "unused", 0).await;
    mount_post(&server, STK_PUSH_PATH, "seeded", stk_response()).await;
    api.set_access_token(AccessToken::new("seeded".into(), Utc::now() + Duration::minutes(30))).await;
    let request = PushPaymentRequest::new(Shillings::from(5u64), 254708374149, RESULT_URL, "INV-002");
    let result = api.push_payment(&request).await.unwrap();
    assert_eq!(result.checkout_request_id, "ws_CO_191220191020363925");
    server.verify().await;
}

#[tokio::test]
async fn cleared_token_is_fetched_again() {
    let (server, api) = setup().await;
    mount_token(&server, "token-3", 2).await;
    api.access_token().await.unwrap();
    api.clear_access_token().await;
    api.access_token().await.unwrap();
    server.verify().await;
}

#[tokio::test]
async fn concurrent_callers_share_one_refresh() {
    let (server, api) = setup().await;
    Mock::given(method("GET"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "shared", "expires_in": 3599}))
                .set_delay(std::time::Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;
    let calls = (0..10).map(|_| {
        let api = api.clone();
        async move { api.access_token().await }
    });
    let tokens = join_all(calls).await;
    assert!(tokens.iter().all(|t| t.as_ref().map(|t| t.token() == "shared").unwrap_or(false)));
    server.verify().await;
}

#[tokio::test]
async fn rejected_credentials_are_auth_errors() {
    let (server, api) = setup().await;
    Mock::given(method("GET"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "requestId": "4788-81090592-1",
            "errorCode": "400.008.01",
            "errorMessage": "Invalid Authentication passed"
        })))
        .mount(&server)
        .await;
    let request = PushPaymentRequest::new(Shillings::from(1u64), 254708374149, RESULT_URL, "INV-001");
    match api.push_payment(&request).await {
        Err(MpesaApiError::AuthError { status, message }) => {
            assert_eq!(status, 400);
            assert!(message.contains("Invalid Authentication passed"));
        },
        other => panic!("Expected an auth error, got {other:?}"),
    }
    assert!(bodies_sent_to(&server, STK_PUSH_PATH).await.is_empty());
}

#[tokio::test]
async fn malformed_token_response() {
    let (server, api) = setup().await;
    Mock::given(method("GET"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "x"})))
        .mount(&server)
        .await;
    let err = api.access_token().await.unwrap_err();
    assert!(matches!(err, MpesaApiError::JsonError(_)));
}
