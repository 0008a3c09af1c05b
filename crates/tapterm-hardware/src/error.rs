//! Peripheral faults.
//!
//! Only [`HardwareError::Disconnected`] is treated as permanent by the control
//! loop; a bus fault on a single read is logged and the next scan retries.

pub type Result<T> = std::result::Result<T, HardwareError>;

#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// No answer to a presence probe.
    #[error("{device} not detected")]
    NotDetected { device: String },

    /// The device went away after it was detected.
    #[error("{device} disconnected")]
    Disconnected { device: String },

    /// A single exchange with the device failed (CRC, NAK, bus stuck).
    #[error("{device} bus fault: {message}")]
    Bus { device: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    pub fn not_detected(device: impl Into<String>) -> Self {
        Self::NotDetected {
            device: device.into(),
        }
    }

    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    pub fn bus(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Bus {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the same device can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Bus { .. } | Self::Io(_))
    }
}
