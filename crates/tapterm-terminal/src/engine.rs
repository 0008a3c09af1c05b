//! The terminal control engine.
//!
//! [`Terminal`] owns every piece of mutable terminal state and runs the
//! single cooperative loop. Nothing here is shared across threads: the only
//! asynchronous input is the liveness [`TickFlag`], and the loop does the
//! actual checking when it sees the flag.
//!
//! # Loop iteration
//!
//! ```text
//! feed watchdog
//! liveness flag?        -> check link, reconnect if needed
//! session refresh due?  -> re-authenticate
//! button                -> debounced mode toggle
//! idle refresh due?     -> redraw idle screen
//! scan due, lock free?  -> poll reader -> gate -> validate -> execute
//! feed watchdog
//! ```

use std::time::{Duration, Instant};

use tapterm_core::constants::{READER_PROBE_ATTEMPTS, READER_PROBE_INTERVAL_MS};
use tapterm_core::{Capability, Error, OperationMode, ProcessingLock, Result, TerminalConfig};
use tapterm_hardware::{
    CardReader, ControlInput, FirmwareVersion, HardwareError, LinkDriver, Watchdog,
};
use tapterm_network::{BackendClient, ConnectivityMonitor, HttpTransport, ReconnectOutcome};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::card_gate::{CardGate, CardReadEvent};
use crate::mode::ModeController;
use crate::presenter::{Intent, Presenter};
use crate::schedule::Schedule;
use crate::session::TerminalSession;
use crate::status::StatusSnapshot;
use crate::ticker::{TickFlag, spawn_ticker};
use crate::transaction::{Transaction, TransactionProcessor};
use crate::validation::CardValidator;

/// Pause between loop iterations.
const LOOP_PERIOD: Duration = Duration::from_millis(10);

/// Devices the engine drives.
#[derive(Debug)]
pub struct Peripherals<R, I, W, L, P> {
    pub reader: R,
    pub button: I,
    pub watchdog: W,
    pub link: L,
    pub presenter: P,
}

/// Timing the engine needs beyond its components.
#[derive(Debug, Clone)]
struct EngineTiming {
    display_dwell: Duration,
    card_detected_dwell: Duration,
    fatal_dwell: Duration,
    reader_poll_timeout: Duration,
    liveness_check_interval: Duration,
}

/// Control engine for one terminal.
pub struct Terminal<R, I, W, L, T, P> {
    reader: R,
    button: I,
    watchdog: W,
    presenter: P,
    monitor: ConnectivityMonitor<L>,
    backend: BackendClient<T>,

    session: TerminalSession,
    gate: CardGate,
    validator: CardValidator,
    processor: TransactionProcessor,
    mode_ctl: ModeController,
    mode: OperationMode,
    lock: ProcessingLock,

    scan: Schedule,
    session_refresh: Schedule,
    idle_refresh: Schedule,
    refresh_pending: bool,
    liveness: TickFlag,
    status_tx: watch::Sender<StatusSnapshot>,
    timing: EngineTiming,
}

impl<R, I, W, L, T, P> Terminal<R, I, W, L, T, P>
where
    R: CardReader,
    I: ControlInput,
    W: Watchdog,
    L: LinkDriver,
    T: HttpTransport,
    P: Presenter,
{
    pub fn new(
        config: &TerminalConfig,
        peripherals: Peripherals<R, I, W, L, P>,
        backend: BackendClient<T>,
    ) -> Self {
        let timing = &config.timing;
        let now = clock();
        let Peripherals {
            reader,
            button,
            watchdog,
            link,
            presenter,
        } = peripherals;

        let terminal = Self {
            reader,
            button,
            watchdog,
            presenter,
            monitor: ConnectivityMonitor::new(link, timing.reconnect_max_wait()),
            backend,
            session: TerminalSession::new(timing.retry_delay()),
            gate: CardGate::new(timing.dedupe_window()),
            validator: CardValidator::new(),
            processor: TransactionProcessor::new(config.payment.amount, timing.display_dwell()),
            mode_ctl: ModeController::new(timing.debounce()),
            mode: OperationMode::default(),
            lock: ProcessingLock::new(),
            scan: Schedule::immediate(timing.scan_delay()),
            session_refresh: Schedule::after(timing.session_refresh_interval(), now),
            idle_refresh: Schedule::after(timing.idle_refresh_interval(), now),
            refresh_pending: false,
            liveness: TickFlag::new(),
            status_tx: watch::Sender::new(StatusSnapshot::default()),
            timing: EngineTiming {
                display_dwell: timing.display_dwell(),
                card_detected_dwell: timing.card_detected_dwell(),
                fatal_dwell: timing.fatal_dwell(),
                reader_poll_timeout: timing.reader_poll_timeout(),
                liveness_check_interval: timing.liveness_check_interval(),
            },
        };
        terminal.publish_status();
        terminal
    }

    pub fn mode(&self) -> OperationMode {
        self.mode
    }

    pub fn session(&self) -> &TerminalSession {
        &self.session
    }

    pub fn monitor(&self) -> &ConnectivityMonitor<L> {
        &self.monitor
    }

    pub fn backend(&self) -> &BackendClient<T> {
        &self.backend
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Flag that schedules a liveness check on the next iteration.
    pub fn liveness_flag(&self) -> TickFlag {
        self.liveness.clone()
    }

    pub fn is_processing(&self) -> bool {
        self.lock.is_held()
    }

    pub fn status(&self) -> StatusSnapshot {
        let capabilities = self.session.capabilities();
        StatusSnapshot {
            link_connected: self.monitor.is_available(),
            link_state: self.monitor.state(),
            mode: self.mode,
            payment_amount: self.processor.amount(),
            terminal_active: self.session.is_active(),
            supports_payment: capabilities.contains(Capability::Payment),
            supports_topup: capabilities.contains(Capability::Topup),
            supports_transfer: capabilities.contains(Capability::Transfer),
            supports_access: capabilities.contains(Capability::Access),
            allowed_user_types: self.session.allowed_user_types().as_slice().to_vec(),
        }
    }

    /// Receiver updated with a fresh [`StatusSnapshot`] whenever one changes.
    ///
    /// Snapshots are published after boot and at the end of every loop
    /// iteration, so a reader never sees a half-finished transaction.
    pub fn subscribe_status(&self) -> watch::Receiver<StatusSnapshot> {
        self.status_tx.subscribe()
    }

    /// Bring the terminal up: probe the reader, authenticate, show ready.
    ///
    /// # Errors
    ///
    /// `Error::Hardware` when the display rejects the first write or the
    /// reader never answers, `Error::Auth` or
    /// `Error::Connectivity` when the first authentication does not leave
    /// the terminal active. Either way the failure has been on screen for
    /// the fatal dwell and the caller is expected to restart.
    pub async fn boot(&mut self) -> Result<()> {
        info!("Terminal starting");
        self.watchdog.feed();
        if let Err(e) = self.presenter.present_checked(&Intent::Boot).await {
            return self
                .fatal(Intent::DisplayMissing, Error::hardware(e.to_string()))
                .await;
        }

        self.presenter.present(&Intent::ReaderProbe).await;
        let Some(version) = self.probe_reader().await else {
            return self
                .fatal(
                    Intent::ReaderMissing,
                    Error::hardware(HardwareError::not_detected("card reader").to_string()),
                )
                .await;
        };
        info!(%version, "Card reader ready");
        self.presenter.present(&Intent::ReaderOk { version }).await;

        if !self.monitor.is_available() {
            self.monitor.check(clock());
            if let ReconnectOutcome::Restored { address } =
                self.monitor.reconnect(&self.lock, &mut self.watchdog).await
            {
                info!(address = ?address, "Link up");
            }
        }

        self.presenter.present(&Intent::Authenticating).await;
        let now = clock();
        match self.session.try_refresh(&self.backend, &self.monitor, now).await {
            Ok(true) => {}
            Ok(false) => {
                return self
                    .fatal(Intent::AuthFailed, Error::auth("terminal is not active"))
                    .await;
            }
            Err(e) => return self.fatal(Intent::AuthFailed, e).await,
        }

        info!(mode = %self.mode, "Terminal active");
        self.presenter.present(&Intent::TerminalActive).await;
        self.dwell(self.timing.display_dwell).await;
        self.show_idle().await;

        let now = clock();
        self.session_refresh.reset(now);
        self.idle_refresh.reset(now);
        self.publish_status();
        Ok(())
    }

    /// One pass of the control loop at time `now`.
    ///
    /// # Errors
    ///
    /// `Error::Hardware` when the card reader has gone away.
    pub async fn run_once(&mut self, now: Instant) -> Result<()> {
        self.watchdog.feed();

        if self.liveness.take() {
            self.service_link(now).await;
        }

        let scheduled = self.session_refresh.due(now);
        let retry_due = self.refresh_pending
            && self.monitor.is_available()
            && self
                .session
                .next_auth_attempt_at()
                .is_none_or(|at| now >= at);
        if scheduled || retry_due {
            self.refresh_session(now).await;
        }

        match self.button.is_pressed() {
            Ok(raw) => {
                if self.mode_ctl.poll(raw, now, &mut self.mode, &self.lock) {
                    self.show_idle().await;
                    self.idle_refresh.reset(now);
                }
            }
            Err(e) => warn!(error = %e, "Mode button read failed"),
        }

        if self.idle_refresh.due(now) {
            self.show_idle().await;
        }

        if !self.lock.is_held() && self.scan.due(now) {
            self.scan_reader(now).await?;
        }

        self.watchdog.feed();
        self.publish_status();
        Ok(())
    }

    /// Boot, then loop until a fatal error.
    ///
    /// # Errors
    ///
    /// Any error from [`boot`](Self::boot) or [`run_once`](Self::run_once).
    pub async fn run(&mut self) -> Result<()> {
        self.boot().await?;

        let ticker = spawn_ticker(self.liveness.clone(), self.timing.liveness_check_interval);
        let result = loop {
            if let Err(e) = self.run_once(clock()).await {
                break Err(e);
            }
            tokio::time::sleep(LOOP_PERIOD).await;
        };
        ticker.abort();
        result
    }

    async fn probe_reader(&mut self) -> Option<FirmwareVersion> {
        for attempt in 1..=READER_PROBE_ATTEMPTS {
            match self.reader.firmware_version().await {
                Ok(Some(version)) => return Some(version),
                Ok(None) => debug!(attempt, "No answer from card reader"),
                Err(e) => warn!(attempt, error = %e, "Card reader probe failed"),
            }
            self.watchdog.feed();
            if attempt < READER_PROBE_ATTEMPTS {
                tokio::time::sleep(Duration::from_millis(READER_PROBE_INTERVAL_MS)).await;
            }
        }
        None
    }

    async fn fatal(&mut self, intent: Intent, error: Error) -> Result<()> {
        error!(error = %error, "Startup failed, restarting");
        self.presenter.present(&intent).await;
        self.dwell(self.timing.fatal_dwell).await;
        self.presenter.present(&Intent::Restarting).await;
        Err(error)
    }

    async fn service_link(&mut self, now: Instant) {
        if !self.monitor.check(now) {
            return;
        }

        self.presenter.present(&Intent::LinkLost).await;
        let outcome = self.monitor.reconnect(&self.lock, &mut self.watchdog).await;
        let intent = match outcome {
            ReconnectOutcome::Restored { address } => Intent::LinkRestored { address },
            ReconnectOutcome::Failed => Intent::LinkFailed,
            ReconnectOutcome::Refused => return,
        };
        self.presenter.present(&intent).await;
        self.dwell(self.timing.display_dwell).await;
        self.show_idle().await;
    }

    async fn refresh_session(&mut self, now: Instant) {
        self.presenter.present(&Intent::Authenticating).await;
        match self.session.try_refresh(&self.backend, &self.monitor, now).await {
            Ok(active) => {
                self.refresh_pending = false;
                debug!(active, "Session refreshed");
            }
            Err(e) => {
                self.refresh_pending = true;
                warn!(error = %e, active = self.session.is_active(), "Session refresh failed");
            }
        }
        self.show_idle().await;
    }

    async fn scan_reader(&mut self, now: Instant) -> Result<()> {
        let raw = match self.reader.poll_card(self.timing.reader_poll_timeout).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(()),
            Err(e) if !e.is_transient() => {
                error!(error = %e, "Card reader lost");
                return Err(Error::hardware(e.to_string()));
            }
            Err(e) => {
                warn!(error = %e, "Card read failed");
                return Ok(());
            }
        };

        if let Some(event) = self.gate.admit(&raw, now) {
            self.handle_card(event).await;
        }
        Ok(())
    }

    async fn handle_card(&mut self, event: CardReadEvent) {
        let uid = event.uid;
        info!(%uid, mode = %self.mode, "Card detected");
        self.presenter
            .present(&Intent::CardDetected { uid: uid.clone() })
            .await;
        self.dwell(self.timing.card_detected_dwell).await;

        if !self.session.is_active() {
            warn!(%uid, "Card refused, terminal inactive");
            self.presenter.present(&Intent::TerminalInactive).await;
            self.dwell(self.timing.display_dwell).await;
            self.show_idle().await;
            return;
        }

        match self
            .validator
            .validate(&self.backend, &self.monitor, &self.session, &uid)
            .await
        {
            Ok(record) => {
                let result = self
                    .processor
                    .execute(
                        &self.backend,
                        &self.monitor,
                        &self.session,
                        &self.lock,
                        &mut self.presenter,
                        Transaction {
                            uid: &uid,
                            record: &record,
                            mode: self.mode,
                        },
                    )
                    .await;
                match &result.error {
                    None => info!(%uid, mode = %self.mode, "Transaction complete"),
                    Some(e) => warn!(%uid, mode = %self.mode, error = %e, "Transaction failed"),
                }
            }
            Err(reason) => {
                self.presenter.present(&Intent::Denied(reason)).await;
                self.dwell(self.timing.display_dwell).await;
            }
        }

        self.show_idle().await;
    }

    fn publish_status(&self) {
        let snapshot = self.status();
        self.status_tx.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });
    }

    async fn show_idle(&mut self) {
        let intent = Intent::Idle {
            mode: self.mode,
            supported: self.session.supports(self.mode.required_capability()),
            amount: self.processor.amount(),
        };
        self.presenter.present(&intent).await;
    }

    async fn dwell(&mut self, duration: Duration) {
        self.watchdog.feed();
        tokio::time::sleep(duration).await;
        self.watchdog.feed();
    }
}

/// Loop clock; follows tokio's clock so paused-time tests stay deterministic.
fn clock() -> Instant {
    tokio::time::Instant::now().into_std()
}
