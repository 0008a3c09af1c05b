//! End-to-end scenarios for the terminal control engine.
//!
//! Every test runs on paused tokio time, so display dwells and reader poll
//! timeouts complete instantly.

mod common;

use common::*;
use tapterm_core::{ConnectivityError, Error, OperationMode};
use tapterm_hardware::FirmwareVersion;
use tapterm_hardware::mock::MockCardReader;
use tapterm_network::LinkState;

#[tokio::test(start_paused = true)]
async fn test_boot_shows_ready_and_idle() {
    let mut rig = rig();
    rig.backend.on_json(AUTH, 200, &auth_json(true, false, true, &["student"]));

    rig.terminal.boot().await.unwrap();

    assert!(rig.shown("Reader OK", "Version 1.6"));
    assert!(rig.shown("Authenticating", "Terminal..."));
    assert!(rig.shown("Terminal active", "Tap card"));
    assert_eq!(
        rig.display.last(),
        Some(("Payment mode".into(), "Amount 5000".into()))
    );

    let status = rig.terminal.status();
    assert!(status.terminal_active);
    assert!(status.supports_payment);
    assert!(!status.supports_access);
    assert_eq!(status.allowed_user_types, vec!["student".to_string()]);
    assert_eq!(status.link_state, LinkState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_missing_reader_is_fatal_after_three_probes() {
    let mut rig = rig_with(config(), MockCardReader::with_firmware(None));
    rig.backend.on_json(AUTH, 200, &auth_json(true, true, true, &[]));

    let started = tokio::time::Instant::now();
    let err = rig.terminal.boot().await.unwrap_err();

    assert!(matches!(err, Error::Hardware { .. }));
    assert!(err.is_fatal());
    assert_eq!(rig.cards.probe_count(), 3);
    assert!(rig.shown("Reader error", "Not detected"));
    assert_eq!(
        rig.display.last(),
        Some(("System reset".into(), "Restarting...".into()))
    );
    // Two probe gaps plus the fatal dwell
    assert!(started.elapsed() >= ms(1000) + ms(5000));
    assert_eq!(rig.backend.request_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_missing_display_is_fatal_before_reader_probe() {
    let mut rig = rig();
    rig.backend.on_json(AUTH, 200, &auth_json(true, true, true, &["student"]));
    rig.display.set_detected(false);

    let started = tokio::time::Instant::now();
    let err = rig.terminal.boot().await.unwrap_err();

    assert!(matches!(err, Error::Hardware { .. }));
    assert!(err.is_fatal());
    assert!(err.to_string().contains("display not detected"));
    assert!(started.elapsed() >= ms(5000));
    assert_eq!(rig.cards.probe_count(), 0);
    assert_eq!(rig.backend.request_count(), 0);
    assert!(!rig.terminal.status().terminal_active);
}

#[tokio::test(start_paused = true)]
async fn test_reader_probe_stops_at_first_answer() {
    let mut rig = rig_with(
        config(),
        MockCardReader::with_firmware(Some(FirmwareVersion::new(0x32, 1, 6))),
    );
    rig.backend.on_json(AUTH, 200, &auth_json(true, true, true, &[]));
    rig.terminal.boot().await.unwrap();
    assert_eq!(rig.cards.probe_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_first_auth_failure_is_fatal() {
    let mut rig = rig();
    rig.backend.on_json(AUTH, 200, r#"{"success": false, "message": "unknown terminal"}"#);

    let err = rig.terminal.boot().await.unwrap_err();

    assert!(matches!(err, Error::Auth { .. }));
    assert!(rig.shown("Auth failed", "Restart system"));
    assert_eq!(
        rig.display.last(),
        Some(("System reset".into(), "Restarting...".into()))
    );
}

#[tokio::test(start_paused = true)]
async fn test_inactive_terminal_does_not_serve_cards() {
    let mut rig = rig();
    rig.backend.on_json(AUTH, 200, &auth_json(true, true, false, &["student"]));

    let err = rig.terminal.boot().await.unwrap_err();
    assert!(matches!(err, Error::Auth { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_payment_shows_amount_and_requeried_balance() {
    let mut rig = booted().await;
    // Validation sees the pre-payment balance; the receipt must not.
    rig.backend.once_json(CARD_INFO, 200, &card_json("student", "active", 17000.0, false));
    rig.backend.on_json(CARD_INFO, 200, &card_json("student", "active", 12000.0, false));
    rig.backend.on_json(PAYMENT, 200, OK);

    rig.tap(CARD, now()).await;

    assert!(rig.shown("Card detected", "04:A1:B2:C..."));
    assert!(rig.shown("Processing", "Payment..."));
    assert!(rig.shown("Payment success", "Amount 5000"));
    assert!(rig.shown("Budi Santoso", "Balance 12000"));
    assert!(!rig.shown("Budi Santoso", "Balance 17000"));
    assert_eq!(rig.backend.requests_to(CARD_INFO).len(), 2);

    let payment = &rig.backend.requests_to(PAYMENT)[0];
    let body: serde_json::Value = serde_json::from_str(payment.body.as_deref().unwrap()).unwrap();
    assert_eq!(body["amount"], 5000.0);
    assert_eq!(body["card_uid"], "04:A1:B2:C3");

    assert!(!rig.terminal.is_processing());
    assert_eq!(
        rig.display.last(),
        Some(("Payment mode".into(), "Amount 5000".into()))
    );
}

#[tokio::test(start_paused = true)]
async fn test_payment_without_capability_never_charges() {
    let mut rig = booted_with(&auth_json(false, true, true, &["student"])).await;
    rig.backend.on_json(CARD_INFO, 200, &card_json("student", "active", 100.0, false));
    rig.backend.on_json(PAYMENT, 200, OK);

    rig.tap(CARD, now()).await;

    assert!(rig.shown("Not supported", "Payment disabled"));
    assert!(rig.backend.requests_to(PAYMENT).is_empty());
    assert!(!rig.terminal.is_processing());
}

#[tokio::test(start_paused = true)]
async fn test_declined_payment_shows_retry() {
    let mut rig = booted().await;
    rig.backend.on_json(CARD_INFO, 200, &card_json("student", "active", 10.0, false));
    rig.backend.on_json(PAYMENT, 200, r#"{"success": false, "message": "Insufficient balance"}"#);

    rig.tap(CARD, now()).await;

    assert!(rig.shown("Payment failed", "Try again"));
    assert!(!rig.shown("Payment success", "Amount 5000"));
    assert!(!rig.terminal.is_processing());
}

#[tokio::test(start_paused = true)]
async fn test_access_granted_even_when_record_fails() {
    let mut rig = booted().await;
    rig.button.set_pressed(true);
    let t0 = now();
    rig.terminal.run_once(t0).await.unwrap();
    rig.terminal.run_once(t0 + ms(250)).await.unwrap();
    rig.button.set_pressed(false);
    assert_eq!(rig.terminal.mode(), OperationMode::Access);

    rig.backend.on_json(CARD_INFO, 200, &card_json("student", "active", 0.0, false));
    rig.backend.on_json(VERIFY, 200, OK);
    rig.backend.on_json(RECORD, 500, "");

    rig.tap(CARD, t0 + ms(1000)).await;

    assert_eq!(rig.backend.requests_to(RECORD).len(), 1);
    assert!(rig.shown("Access granted", "Please enter"));
    assert!(rig.shown("User:", "Budi Santoso"));
    assert!(!rig.shown("Access denied", "Contact admin"));
    assert!(!rig.terminal.is_processing());
}

#[tokio::test(start_paused = true)]
async fn test_access_denied_by_backend() {
    let mut rig = booted().await;
    let t0 = now();
    rig.button.set_pressed(true);
    rig.terminal.run_once(t0).await.unwrap();
    rig.terminal.run_once(t0 + ms(250)).await.unwrap();

    rig.backend.on_json(CARD_INFO, 200, &card_json("student", "active", 0.0, false));
    rig.backend.on_json(VERIFY, 200, r#"{"success": false}"#);

    rig.tap(CARD, t0 + ms(1000)).await;

    assert!(rig.shown("Access denied", "Contact admin"));
    assert!(rig.backend.requests_to(RECORD).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_blocked_card_is_refused_before_payment() {
    let mut rig = booted().await;
    rig.backend.on_json(CARD_INFO, 200, &card_json("student", "active", 999.0, true));
    rig.backend.on_json(PAYMENT, 200, OK);

    rig.tap(CARD, now()).await;

    assert!(rig.shown("Card blocked", "Contact admin"));
    assert!(rig.backend.requests_to(PAYMENT).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_role_outside_allow_list_is_refused() {
    let mut rig = booted_with(&auth_json(true, true, true, &["student"])).await;
    rig.backend.on_json(CARD_INFO, 200, &card_json("staff", "active", 999.0, false));
    rig.backend.on_json(PAYMENT, 200, OK);

    rig.tap(CARD, now()).await;

    assert!(rig.shown("Access rights", "Not allowed"));
    assert!(rig.backend.requests_to(PAYMENT).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_inactive_user_is_refused() {
    let mut rig = booted().await;
    rig.backend.on_json(CARD_INFO, 200, &card_json("student", "suspended", 999.0, false));

    rig.tap(CARD, now()).await;

    assert!(rig.shown("User inactive", "Access denied"));
}

#[tokio::test(start_paused = true)]
async fn test_card_held_on_reader_is_processed_once() {
    let mut rig = booted().await;
    rig.backend.on_json(CARD_INFO, 200, &card_json("student", "active", 100.0, true));
    let t0 = now();

    rig.tap(CARD, t0).await;
    rig.tap(CARD, t0 + ms(500)).await;
    rig.tap(CARD, t0 + ms(1000)).await;
    assert_eq!(rig.backend.requests_to(CARD_INFO).len(), 1);

    rig.tap(OTHER_CARD, t0 + ms(1500)).await;
    assert_eq!(rig.backend.requests_to(CARD_INFO).len(), 2);

    // Another card in between does not reopen the first card's window
    rig.tap(CARD, t0 + ms(2000)).await;
    assert_eq!(rig.backend.requests_to(CARD_INFO).len(), 2);

    rig.tap(CARD, t0 + ms(3000)).await;
    assert_eq!(rig.backend.requests_to(CARD_INFO).len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_link_down_fails_fast_without_backend_calls() {
    let mut rig = booted().await;
    rig.backend.on_json(CARD_INFO, 200, &card_json("student", "active", 100.0, false));
    rig.backend.set_delay(Some(ms(60_000)));
    rig.link.set_connected(false);

    let started = tokio::time::Instant::now();
    rig.tap(CARD, now()).await;

    assert!(rig.shown("No connection", "Try again later"));
    assert_eq!(rig.backend.request_count(), 0);
    // Only the card-detected and denial dwells
    assert!(started.elapsed() < ms(5000));
}

#[tokio::test(start_paused = true)]
async fn test_liveness_tick_reconnects_lost_link() {
    let mut rig = booted().await;
    rig.link.set_connected(false);
    rig.terminal.liveness_flag().raise();

    rig.terminal.run_once(now()).await.unwrap();

    assert_eq!(rig.link.reconnect_attempts(), 1);
    assert!(rig.shown("Link lost", "Reconnecting..."));
    assert!(rig.shown("Link connected", "192.168.4.2"));
    assert!(rig.terminal.status().link_connected);
}

#[tokio::test(start_paused = true)]
async fn test_failed_reconnect_is_reported_and_loop_continues() {
    let mut rig = booted().await;
    rig.link.set_connected(false);
    rig.link.set_reconnect_succeeds(false);
    rig.terminal.liveness_flag().raise();

    rig.terminal.run_once(now()).await.unwrap();

    assert!(rig.shown("Link failed", "Try again later"));
    assert_eq!(rig.terminal.status().link_state, LinkState::Disconnected);

    // No flag, no new attempt
    rig.terminal.run_once(now() + ms(500)).await.unwrap();
    assert_eq!(rig.link.reconnect_attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_refresh_keeps_session_active() {
    let mut rig = booted().await;
    rig.backend.on(AUTH, Err(ConnectivityError::Timeout { timeout_ms: 8000 }));
    let later = now() + ms(600_000);

    rig.terminal.run_once(later).await.unwrap();

    let session = rig.terminal.session();
    assert!(session.is_active());
    assert!(session.next_auth_attempt_at().is_some_and(|at| at > later));
    assert!(rig.terminal.status().supports_payment);

    // Retried once the backoff has passed, not before
    rig.terminal.run_once(later + ms(1000)).await.unwrap();
    assert_eq!(rig.backend.requests_to(AUTH).len(), 1);
    rig.terminal.run_once(later + ms(3000)).await.unwrap();
    assert_eq!(rig.backend.requests_to(AUTH).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_deactivated_terminal_refuses_cards() {
    let mut rig = booted().await;
    rig.backend.on_json(AUTH, 200, &auth_json(true, true, false, &["student"]));
    rig.backend.on_json(CARD_INFO, 200, &card_json("student", "active", 100.0, false));
    let later = now() + ms(600_000);
    rig.terminal.run_once(later).await.unwrap();
    assert!(!rig.terminal.session().is_active());

    rig.tap(CARD, later + ms(500)).await;

    assert!(rig.shown("Terminal", "Inactive"));
    assert!(rig.backend.requests_to(CARD_INFO).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_mode_button_toggles_idle_screen() {
    let mut rig = booted_with(&auth_json(true, false, true, &["student"])).await;
    let t0 = now();

    rig.button.set_pressed(true);
    rig.terminal.run_once(t0).await.unwrap();
    rig.terminal.run_once(t0 + ms(250)).await.unwrap();

    assert_eq!(rig.terminal.mode(), OperationMode::Access);
    assert!(rig.shown("Access mode", "Not supported"));
    assert_eq!(rig.terminal.status().mode, OperationMode::Access);
}

#[tokio::test(start_paused = true)]
async fn test_every_iteration_feeds_watchdog() {
    let mut rig = booted().await;
    let before = rig.watchdog.feed_count();

    rig.terminal.run_once(now()).await.unwrap();

    assert!(rig.watchdog.feed_count() >= before + 2);
}

#[tokio::test(start_paused = true)]
async fn test_lost_reader_stops_the_loop() {
    let rig = booted().await;
    let Rig { mut terminal, cards, .. } = rig;
    drop(cards);

    let err = terminal.run_once(now()).await.unwrap_err();
    assert!(matches!(err, Error::Hardware { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_status_snapshot_serializes() {
    let rig = booted().await;
    let json = rig.terminal.status().to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["link_connected"], true);
    assert_eq!(value["link_state"], "connected");
    assert_eq!(value["mode"], "payment");
    assert_eq!(value["payment_amount"], 5000.0);
    assert_eq!(value["terminal_active"], true);
    assert_eq!(value["allowed_user_types"][0], "student");
}

#[tokio::test(start_paused = true)]
async fn test_status_subscribers_see_mode_changes() {
    let mut rig = booted().await;
    let mut status = rig.terminal.subscribe_status();
    assert!(status.borrow_and_update().terminal_active);

    let t0 = now();
    rig.button.set_pressed(true);
    rig.terminal.run_once(t0).await.unwrap();
    rig.terminal.run_once(t0 + ms(250)).await.unwrap();

    assert!(status.has_changed().unwrap());
    assert_eq!(status.borrow_and_update().mode, OperationMode::Access);
}

#[tokio::test(start_paused = true)]
async fn test_reader_glitch_is_skipped() {
    let mut rig = booted().await;
    rig.backend.on_json(CARD_INFO, 200, &card_json("student", "active", 100.0, true));
    let t0 = now();

    rig.cards.glitch().await.unwrap();
    rig.terminal.run_once(t0).await.unwrap();
    assert_eq!(rig.backend.request_count(), 0);

    rig.tap(CARD, t0 + ms(500)).await;
    assert!(rig.shown("Card blocked", "Contact admin"));
}
