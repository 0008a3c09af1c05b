//! Integration tests for BackendClient over a scripted transport.
//!
//! Fixtures follow the backend's `{ success, data, message }` envelope.

use std::time::Duration;

use rstest::rstest;
use serde_json::Value;
use tapterm_core::{Capability, CardUid, ConnectivityError, DeviceId, TerminalId};
use tapterm_network::mock::{ScriptedTransport, ScriptedTransportHandle};
use tapterm_network::{BackendClient, BackendError, RequestGateway};

const AUTH_OK: &str = r#"{
    "success": true,
    "data": {
        "terminal": {
            "supports_payment": true,
            "supports_topup": false,
            "supports_transfer": false,
            "supports_access": true,
            "is_active": true,
            "allowed_user_types": ["student"]
        }
    }
}"#;

const CARD_OK: &str = r#"{
    "success": true,
    "data": {
        "user": { "name": "Budi", "role_type": "student", "status": "active" },
        "card": { "balance": "12000.00", "is_blocked": false }
    }
}"#;

fn client() -> (BackendClient<ScriptedTransport>, ScriptedTransportHandle) {
    let (transport, handle) = ScriptedTransport::new();
    let gateway = RequestGateway::new(
        transport,
        "http://backend.local/api",
        "tok-123",
        DeviceId::new("8812345").unwrap(),
        Duration::from_millis(500),
    );
    let client = BackendClient::new(gateway, TerminalId::new("T-01").unwrap());
    (client, handle)
}

fn uid() -> CardUid {
    CardUid::parse("04A1B2C3").unwrap()
}

fn body_json(handle: &ScriptedTransportHandle, path: &str) -> Value {
    let requests = handle.requests_to(path);
    let body = requests[0].body.as_deref().unwrap();
    serde_json::from_str(body).unwrap()
}

#[tokio::test]
async fn test_authenticate_populates_grant_from_fixture() {
    let (client, handle) = client();
    handle.on_json("/terminal/authenticate", 200, AUTH_OK);

    let grant = client.authenticate(&true).await.unwrap();

    assert!(grant.is_active);
    assert_eq!(
        grant.capabilities.iter().collect::<Vec<_>>(),
        vec![Capability::Payment, Capability::Access]
    );
    assert_eq!(grant.allowed_user_types.as_slice(), ["student".to_string()]);

    let body = body_json(&handle, "/terminal/authenticate");
    assert_eq!(body["terminal_id"], "T-01");
    assert_eq!(body["device_id"], "8812345");
}

#[tokio::test]
async fn test_every_request_carries_credentials() {
    let (client, handle) = client();
    handle.on_json("/terminal/authenticate", 200, AUTH_OK);
    handle.on_json("/terminal/cards/info", 200, CARD_OK);

    client.authenticate(&true).await.unwrap();
    client.card_info(&true, &uid()).await.unwrap();

    for request in handle.requests() {
        assert_eq!(request.header("authorization"), Some("Bearer tok-123"));
        assert_eq!(request.header("x-device-id"), Some("8812345"));
        assert_eq!(request.timeout, Duration::from_millis(500));
    }
}

#[tokio::test]
async fn test_allowed_user_types_truncated_to_three() {
    let (client, handle) = client();
    handle.on_json(
        "/terminal/authenticate",
        200,
        r#"{"success": true, "data": {"terminal": {
            "is_active": 1, "allowed_user_types": ["a", "b", "c", "d"]}}}"#,
    );

    let grant = client.authenticate(&true).await.unwrap();
    assert!(grant.is_active);
    assert!(grant.capabilities.is_empty());
    assert_eq!(grant.allowed_user_types.len(), 3);
    assert!(!grant.allowed_user_types.allows("d"));
}

#[rstest]
#[case(200, r#"{"success": false, "message": "Terminal disabled"}"#, true)]
#[case(200, r#"{"success": true}"#, false)]
#[case(200, r#"{"success": true, "data": {}}"#, false)]
#[case(401, r#"{"success": false}"#, false)]
#[tokio::test]
async fn test_authenticate_failures(
    #[case] status: u16,
    #[case] body: &str,
    #[case] rejected: bool,
) {
    let (client, handle) = client();
    handle.on_json("/terminal/authenticate", status, body);

    let err = client.authenticate(&true).await.unwrap_err();
    assert_eq!(matches!(err, BackendError::Rejected { .. }), rejected);
}

#[tokio::test]
async fn test_card_info_lookup() {
    let (client, handle) = client();
    handle.on_json("/terminal/cards/info", 200, CARD_OK);

    let record = client.card_info(&true, &uid()).await.unwrap();
    assert_eq!(record.user_name, "Budi");
    assert_eq!(record.user_type, "student");
    assert_eq!(record.balance, 12000.0);
    assert!(!record.is_blocked);
    assert!(record.is_user_active);

    let url = &handle.requests()[0].url;
    assert_eq!(
        url,
        "http://backend.local/api/terminal/cards/info?card_uid=04%3AA1%3AB2%3AC3&terminal_id=T-01"
    );
}

#[rstest]
#[case(r#"{"balance": 1, "is_blocked": null}"#, true)]
#[case(r#"{"balance": 1}"#, true)]
#[case(r#"{"balance": 1, "is_blocked": 0}"#, false)]
#[case(r#"{"balance": 1, "is_blocked": true}"#, true)]
#[tokio::test]
async fn test_missing_block_flag_reads_as_blocked(#[case] card: &str, #[case] blocked: bool) {
    let (client, handle) = client();
    let body = format!(
        r#"{{"success": true, "data": {{"user": {{"name": "X", "role_type": "staff", "status": "active"}}, "card": {card}}}}}"#
    );
    handle.on_json("/terminal/cards/info", 200, &body);

    let record = client.card_info(&true, &uid()).await.unwrap();
    assert_eq!(record.is_blocked, blocked);
}

#[rstest]
#[case(Some("\"inactive\""), false)]
#[case(Some("\"Active\""), false)]
#[case(None, false)]
#[case(Some("\"active\""), true)]
#[tokio::test]
async fn test_user_status(#[case] status: Option<&str>, #[case] active: bool) {
    let (client, handle) = client();
    let status_field = status
        .map(|s| format!(r#", "status": {s}"#))
        .unwrap_or_default();
    let body = format!(
        r#"{{"success": true, "data": {{"user": {{"name": "X", "role_type": "staff"{status_field}}}, "card": {{"balance": 0, "is_blocked": false}}}}}}"#
    );
    handle.on_json("/terminal/cards/info", 200, &body);

    let record = client.card_info(&true, &uid()).await.unwrap();
    assert_eq!(record.is_user_active, active);
}

#[tokio::test]
async fn test_card_info_missing_sections_is_malformed() {
    let (client, handle) = client();
    handle.on_json(
        "/terminal/cards/info",
        200,
        r#"{"success": true, "data": {"user": {"name": "X", "role_type": "staff"}}}"#,
    );

    let err = client.card_info(&true, &uid()).await.unwrap_err();
    assert!(matches!(
        err,
        BackendError::Connectivity(ConnectivityError::MalformedBody { .. })
    ));
}

#[tokio::test]
async fn test_process_payment_body() {
    let (client, handle) = client();
    handle.on_json("/terminal/process-payment", 200, r#"{"success": true}"#);

    client.process_payment(&true, &uid(), 5000.0).await.unwrap();

    let body = body_json(&handle, "/terminal/process-payment");
    assert_eq!(body["terminal_id"], "T-01");
    assert_eq!(body["card_uid"], "04:A1:B2:C3");
    assert_eq!(body["amount"], 5000.0);
    assert_eq!(body["notes"], "Payment at terminal T-01");
    assert!(body["transaction_time"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_payment_rejection_carries_message() {
    let (client, handle) = client();
    handle.on_json(
        "/terminal/process-payment",
        200,
        r#"{"success": false, "message": "Insufficient balance"}"#,
    );

    let err = client.process_payment(&true, &uid(), 5000.0).await.unwrap_err();
    assert_eq!(
        err,
        BackendError::Rejected {
            operation: "payment",
            message: Some("Insufficient balance".into()),
        }
    );
}

#[tokio::test]
async fn test_access_bodies() {
    let (client, handle) = client();
    handle.on_json("/terminal/access/verify", 200, r#"{"success": true}"#);
    handle.on_json("/terminal/transactions/record-access", 200, r#"{"success": true}"#);

    client.verify_access(&true, &uid()).await.unwrap();
    client.record_access(&true, &uid()).await.unwrap();

    let verify = body_json(&handle, "/terminal/access/verify");
    assert_eq!(verify["device_id"], "8812345");
    assert_eq!(verify["card_uid"], "04:A1:B2:C3");

    let record = body_json(&handle, "/terminal/transactions/record-access");
    assert_eq!(record["notes"], "Access at terminal T-01");
    assert_eq!(record["device_id"], "8812345");
    assert!(record["timestamp"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_link_down_fails_fast_for_every_operation() {
    let (client, handle) = client();
    handle.set_delay(Some(Duration::from_secs(60)));
    let down = false;

    let link_down = BackendError::Connectivity(ConnectivityError::LinkDown);
    assert_eq!(client.authenticate(&down).await.unwrap_err(), link_down);
    assert_eq!(client.card_info(&down, &uid()).await.unwrap_err(), link_down);
    assert_eq!(
        client.process_payment(&down, &uid(), 1.0).await.unwrap_err(),
        link_down
    );
    assert_eq!(client.verify_access(&down, &uid()).await.unwrap_err(), link_down);
    assert_eq!(client.record_access(&down, &uid()).await.unwrap_err(), link_down);
    assert_eq!(handle.request_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_slow_backend_times_out() {
    let (client, handle) = client();
    handle.on_json("/terminal/access/verify", 200, r#"{"success": true}"#);
    handle.set_delay(Some(Duration::from_secs(30)));

    let err = client.verify_access(&true, &uid()).await.unwrap_err();
    assert_eq!(
        err,
        BackendError::Connectivity(ConnectivityError::Timeout { timeout_ms: 500 })
    );
}
