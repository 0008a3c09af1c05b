//! Stdin-driven reader and button.
//!
//! ```text
//! 04A1B2C3        tap a card (hex, ':' '-' or ' ' separators allowed)
//! button | b      press and release the mode button
//! status | s      print the status snapshot as JSON
//! help   | ?      list commands
//! ```

use std::str::FromStr;
use std::time::Duration;

use tapterm_core::{CardUid, Error};
use tapterm_hardware::mock::{MockButtonHandle, MockCardReaderHandle};
use tapterm_terminal::StatusSnapshot;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const HELP: &str = "commands: <hex uid> | button | status | help";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Tap(CardUid),
    Button,
    Status,
    Help,
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self, Error> {
        match line.trim().to_ascii_lowercase().as_str() {
            "button" | "b" => Ok(Command::Button),
            "status" | "s" => Ok(Command::Status),
            "help" | "?" => Ok(Command::Help),
            _ => CardUid::parse(line).map(Command::Tap),
        }
    }
}

/// Read commands from stdin until EOF or until the receiver is gone.
pub fn spawn_stdin(commands: mpsc::Sender<Command>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<Command>() {
                Ok(command) => {
                    if commands.send(command).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!(error = %e, "{HELP}"),
            }
        }
        debug!("Stdin closed");
    })
}

/// Handles for one running terminal.
#[derive(Debug)]
pub struct Simulator {
    cards: MockCardReaderHandle,
    button: MockButtonHandle,
    status: watch::Receiver<StatusSnapshot>,
    press_hold: Duration,
}

impl Simulator {
    /// `press_hold` must outlast the mode debounce for a press to register.
    pub fn new(
        cards: MockCardReaderHandle,
        button: MockButtonHandle,
        status: watch::Receiver<StatusSnapshot>,
        press_hold: Duration,
    ) -> Self {
        Self {
            cards,
            button,
            status,
            press_hold,
        }
    }

    pub async fn dispatch(&mut self, command: Command) {
        match command {
            Command::Tap(uid) => {
                if let Err(e) = self.cards.present(raw_bytes(&uid)).await {
                    warn!(%uid, error = %e, "Card not delivered");
                }
            }
            Command::Button => {
                self.button.set_pressed(true);
                let button = self.button.clone();
                let hold = self.press_hold;
                tokio::spawn(async move {
                    tokio::time::sleep(hold).await;
                    button.set_pressed(false);
                });
            }
            Command::Status => match self.status.borrow().to_json() {
                Ok(json) => println!("{json}"),
                Err(e) => warn!(error = %e, "Status not serializable"),
            },
            Command::Help => println!("{HELP}"),
        }
    }
}

/// Raw reader bytes of a normalized UID.
fn raw_bytes(uid: &CardUid) -> Vec<u8> {
    uid.as_str()
        .split(':')
        .filter_map(|byte| u8::from_str_radix(byte, 16).ok())
        .collect()
}
