//! `tapterm`: run the terminal engine against a live backend.
//!
//! The card reader and mode button are simulated from stdin, the display is
//! printed to stdout, and the link is the host's reachability of the backend.
//! A fatal terminal error leads to a controlled restart: every component is
//! rebuilt from scratch and the terminal boots again.

mod console;
mod link;
mod simulator;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tapterm_core::TerminalConfig;
use tapterm_hardware::mock::{MockButton, MockCardReader, MockWatchdog};
use tapterm_network::{BackendClient, RequestGateway, ReqwestTransport};
use tapterm_terminal::{DisplayPresenter, Peripherals, Terminal};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::console::{ConsoleDisplay, spawn_watchdog_monitor};
use crate::link::HostLink;
use crate::simulator::{Simulator, spawn_stdin};

type HostTerminal = Terminal<
    MockCardReader,
    MockButton,
    MockWatchdog,
    HostLink,
    ReqwestTransport,
    DisplayPresenter<ConsoleDisplay>,
>;

/// Unattended card payment/access terminal
#[derive(Parser, Debug)]
#[command(name = "tapterm")]
#[command(about = "Run the tap terminal with a stdin-driven card reader")]
struct Args {
    /// Terminal configuration file (TOML)
    #[arg(short, long, default_value = "tapterm.toml")]
    config: PathBuf,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Give up after this many controlled restarts (0 restarts forever)
    #[arg(long, default_value_t = 0)]
    max_restarts: u32,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let config = TerminalConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    info!(
        backend = %config.backend.base_url,
        terminal_id = %config.identity.terminal_id,
        "Configuration loaded"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building runtime")?;

    runtime.block_on(async {
        tokio::select! {
            result = supervise(&config, args.max_restarts) => result,
            signal = tokio::signal::ctrl_c() => {
                signal.context("waiting for ctrl-c")?;
                info!("Interrupted, shutting down");
                Ok(())
            }
        }
    })
}

fn init_tracing(default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .context("invalid log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// Run the terminal, rebuilding it after every fatal error.
async fn supervise(config: &TerminalConfig, max_restarts: u32) -> Result<()> {
    let (commands_tx, mut commands) = mpsc::channel(16);
    let _stdin = spawn_stdin(commands_tx);
    let mut restarts = 0u32;

    loop {
        let Assembly {
            mut terminal,
            mut simulator,
            tasks,
        } = assemble(config)?;

        let result = {
            let run = terminal.run();
            tokio::pin!(run);
            loop {
                tokio::select! {
                    result = &mut run => break result,
                    Some(command) = commands.recv() => simulator.dispatch(command).await,
                }
            }
        };
        tasks.iter().for_each(JoinHandle::abort);

        let Err(e) = result else {
            return Ok(());
        };
        restarts += 1;
        error!(error = %e, restarts, "Terminal stopped, restarting");
        if max_restarts != 0 && restarts >= max_restarts {
            return Err(e).context("restart limit reached");
        }
    }
}

struct Assembly {
    terminal: HostTerminal,
    simulator: Simulator,
    tasks: Vec<JoinHandle<()>>,
}

/// Build a fresh terminal with its devices and background tasks.
fn assemble(config: &TerminalConfig) -> Result<Assembly> {
    let timing = &config.timing;

    let transport = ReqwestTransport::new(config.backend.request_timeout())
        .context("creating HTTP client")?;
    let gateway = RequestGateway::new(
        transport,
        &config.backend.base_url,
        config.backend.api_token.clone(),
        config.identity.device_id()?,
        config.backend.request_timeout(),
    );
    let backend = BackendClient::new(gateway, config.identity.terminal_id()?);

    let link = HostLink::new(&config.backend.base_url)?;
    let (reader, cards) = MockCardReader::new();
    let (button, buttons) = MockButton::new();
    let (watchdog, feeds) = MockWatchdog::new();

    let tasks = vec![
        link.spawn_probe(timing.liveness_check_interval()),
        spawn_watchdog_monitor(feeds, timing.watchdog_timeout()),
    ];

    let terminal = Terminal::new(
        config,
        Peripherals {
            reader,
            button,
            watchdog,
            link,
            presenter: DisplayPresenter::new(ConsoleDisplay),
        },
        backend,
    );
    let simulator = Simulator::new(
        cards,
        buttons,
        terminal.subscribe_status(),
        timing.debounce() * 2 + timing.scan_delay(),
    );

    Ok(Assembly {
        terminal,
        simulator,
        tasks,
    })
}
