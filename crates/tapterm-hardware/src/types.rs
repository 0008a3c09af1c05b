//! Common types shared across hardware device implementations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reader firmware identification reported by a presence probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareVersion {
    /// Controller IC code.
    pub ic: u8,
    pub major: u8,
    pub minor: u8,
}

impl FirmwareVersion {
    pub fn new(ic: u8, major: u8, minor: u8) -> Self {
        Self { ic, major, minor }
    }

    /// Decode the packed word returned by PN53x-style readers
    /// (`IC << 24 | major << 16 | minor << 8 | support`).
    ///
    /// Returns `None` for a zero word, which means no reader answered.
    pub fn from_packed(word: u32) -> Option<Self> {
        if word == 0 {
            return None;
        }
        Some(Self {
            ic: (word >> 24) as u8,
            major: (word >> 16) as u8,
            minor: (word >> 8) as u8,
        })
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
