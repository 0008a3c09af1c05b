//! Processing lock shared by transactions and reconnection attempts.
//!
//! The terminal runs a single cooperative loop, so the lock is a logical flag
//! rather than a mutex. Acquiring it yields a [`ProcessingGuard`]; dropping the
//! guard clears the flag, which covers every exit path including early returns
//! and `?` propagation.
//!
//! # Examples
//!
//! ```
//! use tapterm_core::ProcessingLock;
//!
//! let lock = ProcessingLock::new();
//! {
//!     let _guard = lock.try_acquire().unwrap();
//!     assert!(lock.is_held());
//!     assert!(lock.try_acquire().is_none());
//! }
//! assert!(!lock.is_held());
//! ```

use std::cell::Cell;

/// At-most-one in-flight operation flag.
///
/// Not `Sync`: the lock belongs to the control-loop thread.
#[derive(Debug, Default)]
pub struct ProcessingLock {
    held: Cell<bool>,
}

impl ProcessingLock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock, or `None` if it is already held.
    #[must_use]
    pub fn try_acquire(&self) -> Option<ProcessingGuard<'_>> {
        if self.held.replace(true) {
            return None;
        }
        Some(ProcessingGuard { lock: self })
    }

    #[must_use]
    pub fn is_held(&self) -> bool {
        self.held.get()
    }
}

/// Clears the [`ProcessingLock`] when dropped.
#[derive(Debug)]
pub struct ProcessingGuard<'a> {
    lock: &'a ProcessingLock,
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.lock.held.set(false);
    }
}
