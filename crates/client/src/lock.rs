//! App unlock PIN.
//!
//! Only a SHA-256 digest of the PIN is persisted. There is no built-in
//! default: until a PIN has been set, nothing unlocks.

use std::fmt::Write as _;

use sha2::{Digest, Sha256};

use crate::error::{ClientError, Result};
use crate::storage::{LocalStore, PIN_KEY};

const MIN_PIN_LENGTH: usize = 4;

fn digest(pin: &str) -> String {
    Sha256::digest(pin.as_bytes())
        .iter()
        .fold(String::with_capacity(64), |mut hex, byte| {
            let _ = write!(hex, "{byte:02x}");
            hex
        })
}

#[derive(Debug, Clone)]
pub struct PinLock {
    store: LocalStore,
}

impl PinLock {
    pub const fn new(store: LocalStore) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.store.load_string(PIN_KEY).is_some()
    }

    /// Replace the PIN.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] when the PIN is shorter than four
    /// characters, or a storage error.
    pub fn set_pin(&self, pin: &str) -> Result<()> {
        if pin.chars().count() < MIN_PIN_LENGTH {
            return Err(ClientError::Validation(
                "PIN must be at least 4 characters".to_owned(),
            ));
        }
        self.store.save(PIN_KEY, &digest(pin))?;
        Ok(())
    }

    /// Whether `pin` matches the stored PIN. Always false when none is set.
    #[must_use]
    pub fn verify(&self, pin: &str) -> bool {
        self.store
            .load_string(PIN_KEY)
            .is_some_and(|stored| stored == digest(pin))
    }

    /// Remove the PIN.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the key cannot be removed.
    pub fn clear(&self) -> Result<()> {
        self.store.remove(PIN_KEY)?;
        Ok(())
    }
}
