//! Shared rig for terminal integration tests.

#![allow(dead_code)]

use std::time::{Duration, Instant};

use tapterm_core::config::{BackendConfig, IdentityConfig};
use tapterm_core::{DeviceId, TerminalConfig, TerminalId};
use tapterm_hardware::mock::{
    MockButton, MockButtonHandle, MockCardReader, MockCardReaderHandle, MockDisplay,
    MockDisplayHandle, MockLink, MockLinkHandle, MockWatchdog, MockWatchdogHandle,
};
use tapterm_network::mock::{ScriptedTransport, ScriptedTransportHandle};
use tapterm_network::{BackendClient, RequestGateway};
use tapterm_terminal::{DisplayPresenter, Peripherals, Terminal};

pub const AUTH: &str = "/terminal/authenticate";
pub const CARD_INFO: &str = "/terminal/cards/info";
pub const PAYMENT: &str = "/terminal/process-payment";
pub const VERIFY: &str = "/terminal/access/verify";
pub const RECORD: &str = "/terminal/transactions/record-access";

pub const CARD: &[u8] = &[0x04, 0xA1, 0xB2, 0xC3];
pub const OTHER_CARD: &[u8] = &[0x04, 0x11, 0x22, 0x33];

pub const OK: &str = r#"{"success": true}"#;

pub type TestTerminal = Terminal<
    MockCardReader,
    MockButton,
    MockWatchdog,
    MockLink,
    ScriptedTransport,
    DisplayPresenter<MockDisplay>,
>;

pub struct Rig {
    pub terminal: TestTerminal,
    pub cards: MockCardReaderHandle,
    pub button: MockButtonHandle,
    pub watchdog: MockWatchdogHandle,
    pub link: MockLinkHandle,
    pub display: MockDisplayHandle,
    pub backend: ScriptedTransportHandle,
}

impl Rig {
    /// Present a card and run one loop pass at `now`.
    pub async fn tap(&mut self, uid: &[u8], now: Instant) {
        self.cards.present(uid.to_vec()).await.unwrap();
        self.terminal.run_once(now).await.unwrap();
    }

    pub fn shown(&self, line1: &str, line2: &str) -> bool {
        self.display
            .frames()
            .iter()
            .any(|(l1, l2)| l1 == line1 && l2 == line2)
    }
}

pub fn config() -> TerminalConfig {
    TerminalConfig {
        backend: BackendConfig {
            base_url: "http://backend.test/api".into(),
            api_token: "test-token".into(),
            ..BackendConfig::default()
        },
        identity: IdentityConfig {
            terminal_id: "T-01".into(),
            device_id: "8812345".into(),
        },
        ..TerminalConfig::default()
    }
}

pub fn auth_json(payment: bool, access: bool, active: bool, types: &[&str]) -> String {
    serde_json::json!({
        "success": true,
        "data": {
            "terminal": {
                "supports_payment": payment,
                "supports_topup": false,
                "supports_transfer": false,
                "supports_access": access,
                "is_active": active,
                "allowed_user_types": types,
            }
        }
    })
    .to_string()
}

pub fn card_json(role: &str, status: &str, balance: f64, blocked: bool) -> String {
    serde_json::json!({
        "success": true,
        "data": {
            "user": { "name": "Budi Santoso", "role_type": role, "status": status },
            "card": { "balance": balance, "is_blocked": blocked }
        }
    })
    .to_string()
}

/// Rig with a connected link and reader; nothing scripted on the backend.
pub fn rig() -> Rig {
    rig_with(config(), MockCardReader::new())
}

pub fn rig_with(
    config: TerminalConfig,
    (reader, cards): (MockCardReader, MockCardReaderHandle),
) -> Rig {
    let (button, button_handle) = MockButton::new();
    let (watchdog, watchdog_handle) = MockWatchdog::new();
    let (link, link_handle) = MockLink::new(true);
    let (display, display_handle) = MockDisplay::new();
    let (transport, backend_handle) = ScriptedTransport::new();

    let gateway = RequestGateway::new(
        transport,
        &config.backend.base_url,
        config.backend.api_token.clone(),
        DeviceId::new(&config.identity.device_id).unwrap(),
        config.backend.request_timeout(),
    );
    let backend = BackendClient::new(
        gateway,
        TerminalId::new(&config.identity.terminal_id).unwrap(),
    );

    let peripherals = Peripherals {
        reader,
        button,
        watchdog,
        link,
        presenter: DisplayPresenter::new(display),
    };

    Rig {
        terminal: Terminal::new(&config, peripherals, backend),
        cards,
        button: button_handle,
        watchdog: watchdog_handle,
        link: link_handle,
        display: display_handle,
        backend: backend_handle,
    }
}

/// Booted rig whose terminal supports payment and access for students.
pub async fn booted() -> Rig {
    booted_with(&auth_json(true, true, true, &["student"])).await
}

pub async fn booted_with(auth: &str) -> Rig {
    let mut rig = rig();
    rig.backend.on_json(AUTH, 200, auth);
    rig.terminal.boot().await.unwrap();
    rig.display.clear();
    rig.backend.clear_requests();
    rig
}

/// The loop clock, as the engine sees it.
pub fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}
