//! Content fingerprints for change detection
//!
//! A snapshot is serialized to a `serde_json::Value` first so map keys come out
//! sorted; equal content therefore always hashes the same, whatever map type
//! the status uses. The digest is SHA-256 and is only ever compared for
//! equality.

use crate::BridgeError;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// 32-byte content digest of a status snapshot.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..12])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Digest of `status`.
pub fn fingerprint<S: Serialize>(status: &S) -> Result<Fingerprint, BridgeError> {
    let canonical = serde_json::to_value(status)?;
    let bytes = serde_json::to_vec(&canonical)?;

    let digest = Sha256::digest(&bytes);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Ok(Fingerprint(out))
}

/// Compare `status` against a previous digest.
///
/// `None` means "nothing seen yet", which always counts as a change.
/// Returns the change flag together with the new digest.
pub fn has_changed<S: Serialize>(
    previous: Option<&Fingerprint>,
    status: &S,
) -> Result<(bool, Fingerprint), BridgeError> {
    let current = fingerprint(status)?;
    let changed = previous != Some(&current);
    Ok((changed, current))
}

/// Stateful change detector owning the last digest.
///
/// # Example
///
/// ```
/// use lumen_bridge::ChangeDetector;
///
/// let mut detector = ChangeDetector::new();
/// assert!(detector.observe(&"a").unwrap()); // first observation
/// assert!(!detector.observe(&"a").unwrap());
/// assert!(detector.observe(&"b").unwrap());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ChangeDetector {
    last: Option<Fingerprint>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `status` and report whether it differs from the previous one.
    ///
    /// On a serialization error the stored digest is left untouched.
    pub fn observe<S: Serialize>(&mut self, status: &S) -> Result<bool, BridgeError> {
        let (changed, current) = has_changed(self.last.as_ref(), status)?;
        self.last = Some(current);
        Ok(changed)
    }

    pub fn last(&self) -> Option<&Fingerprint> {
        self.last.as_ref()
    }

    /// Forget the last digest; the next observation counts as a change.
    pub fn reset(&mut self) {
        self.last = None;
    }
}
