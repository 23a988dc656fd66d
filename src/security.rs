//! Memory protection for secret field elements
//!
//! Running shares and locally computed products are secret material: every
//! one of them is a piece of the tally. They are held in [`SensitiveScalar`],
//! which is wiped on drop and never prints its value.

use ark_ff::Field;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Wrapper for sensitive field elements that ensures zeroization on drop
///
/// # Security
/// - Automatically zeroizes memory when dropped
/// - Prevents accidental leakage through the Debug trait
#[derive(Clone)]
pub struct SensitiveScalar<F: Field> {
    value: F,
}

impl<F: Field> SensitiveScalar<F> {
    /// Create a new sensitive scalar from a field element
    pub fn new(value: F) -> Self {
        Self { value }
    }

    /// Get a reference to the inner value
    ///
    /// # Security Warning
    /// The caller must ensure this reference is not used to leak the value
    pub fn expose_secret(&self) -> &F {
        &self.value
    }

    /// Create a new sensitive scalar with value zero
    pub fn zero() -> Self {
        Self { value: F::zero() }
    }

    /// Replace the protected value, wiping the old one
    pub fn replace(&mut self, value: F) {
        self.value.zeroize();
        self.value = value;
    }
}

impl<F: Field> Zeroize for SensitiveScalar<F> {
    fn zeroize(&mut self) {
        self.value.zeroize();
    }
}

impl<F: Field> ZeroizeOnDrop for SensitiveScalar<F> {}

impl<F: Field> Drop for SensitiveScalar<F> {
    fn drop(&mut self) {
        self.zeroize();
    }
}

// Prevent debug output from leaking sensitive data
impl<F: Field> std::fmt::Debug for SensitiveScalar<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SensitiveScalar([REDACTED])")
    }
}
