//! Mock card reader for testing and development.
//!
//! Cards are presented through a [`MockCardReaderHandle`]; the reader returns
//! them from [`CardReader::poll_card`] in order.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::{HardwareError, Result, traits::CardReader, types::FirmwareVersion};

/// Mock contactless reader.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tapterm_hardware::mock::MockCardReader;
/// use tapterm_hardware::traits::CardReader;
///
/// #[tokio::main]
/// async fn main() -> tapterm_hardware::Result<()> {
///     let (mut reader, handle) = MockCardReader::new();
///
///     handle.present(vec![0x04, 0xAB, 0xCD, 0xEF]).await?;
///
///     let uid = reader.poll_card(Duration::from_millis(10)).await?;
///     assert_eq!(uid, Some(vec![0x04, 0xAB, 0xCD, 0xEF]));
///
///     // Nothing in the field
///     assert_eq!(reader.poll_card(Duration::from_millis(10)).await?, None);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
enum FieldEvent {
    Card(Vec<u8>),
    Glitch,
}

#[derive(Debug)]
pub struct MockCardReader {
    card_rx: mpsc::Receiver<FieldEvent>,
    firmware: Option<FirmwareVersion>,
    probes: Arc<AtomicU32>,
}

impl MockCardReader {
    /// Reader that answers probes with firmware 1.6.
    pub fn new() -> (Self, MockCardReaderHandle) {
        Self::with_firmware(Some(FirmwareVersion::new(0x32, 1, 6)))
    }

    /// Reader with a specific probe answer; `None` simulates a missing reader.
    pub fn with_firmware(firmware: Option<FirmwareVersion>) -> (Self, MockCardReaderHandle) {
        let (card_tx, card_rx) = mpsc::channel(32);
        let probes = Arc::new(AtomicU32::new(0));

        let reader = Self {
            card_rx,
            firmware,
            probes: probes.clone(),
        };
        let handle = MockCardReaderHandle { card_tx, probes };

        (reader, handle)
    }
}

impl CardReader for MockCardReader {
    async fn firmware_version(&mut self) -> Result<Option<FirmwareVersion>> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        Ok(self.firmware)
    }

    async fn poll_card(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        match tokio::time::timeout(timeout, self.card_rx.recv()).await {
            Ok(Some(FieldEvent::Card(uid))) => Ok(Some(uid)),
            Ok(Some(FieldEvent::Glitch)) => Err(HardwareError::bus("card reader", "CRC mismatch")),
            Ok(None) => Err(HardwareError::disconnected("card reader")),
            Err(_) => Ok(None),
        }
    }
}

/// Handle for presenting cards to a [`MockCardReader`].
#[derive(Debug, Clone)]
pub struct MockCardReaderHandle {
    card_tx: mpsc::Sender<FieldEvent>,
    probes: Arc<AtomicU32>,
}

impl MockCardReaderHandle {
    /// Queue a raw UID as if a card entered the field.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader has been dropped.
    pub async fn present(&self, uid: Vec<u8>) -> Result<()> {
        self.send(FieldEvent::Card(uid)).await
    }

    /// Make the next read fail with a transient bus fault.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader has been dropped.
    pub async fn glitch(&self) -> Result<()> {
        self.send(FieldEvent::Glitch).await
    }

    async fn send(&self, event: FieldEvent) -> Result<()> {
        self.card_tx
            .send(event)
            .await
            .map_err(|_| HardwareError::disconnected("card reader"))
    }

    /// Number of firmware probes the reader has answered.
    pub fn probe_count(&self) -> u32 {
        self.probes.load(Ordering::SeqCst)
    }
}
