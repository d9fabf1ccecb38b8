//! Record signing and verification.
//!
//! Signatures are HMAC-SHA256 over the canonical encoding of a record. The
//! stored tag is `version || key fingerprint || mac`, so a registry can keep
//! verifying rows signed with a rotated-out key while signing every new
//! write with its primary key.

use std::fmt;

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use services_registry_sdk::ServiceRecord;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::canonical::CanonicalRecord;
use super::model::StoredService;

type HmacSha256 = Hmac<Sha256>;

/// Signature format version.
const SIGNATURE_VERSION: u8 = 1;

/// Bytes of the key fingerprint embedded in a signature.
const FINGERPRINT_LENGTH: usize = 8;

/// HMAC-SHA256 output length.
const MAC_LENGTH: usize = 32;

pub const SIGNATURE_LENGTH: usize = 1 + FINGERPRINT_LENGTH + MAC_LENGTH;

/// Shortest accepted signing key.
pub const MIN_KEY_LENGTH: usize = 32;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SigningKeyError {
    #[error("signing key #{index} is not valid hex")]
    InvalidHex { index: usize },

    #[error("signing key #{index} is {len} bytes, at least {MIN_KEY_LENGTH} required")]
    TooShort { index: usize, len: usize },
}

/// Why a stored record was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorruptionReason {
    /// Wrong length or unknown version.
    Malformed,
    /// Signed with a key this registry does not hold.
    UnknownKey,
    /// The MAC does not match the current field values.
    Mismatch,
}

impl fmt::Display for CorruptionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Malformed => "malformed signature",
            Self::UnknownKey => "unknown signing key",
            Self::Mismatch => "signature mismatch",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Corruption {
    pub id: i64,
    pub reason: CorruptionReason,
}

struct SigningKey {
    fingerprint: [u8; FINGERPRINT_LENGTH],
    secret: Zeroizing<Vec<u8>>,
}

impl SigningKey {
    fn new(secret: Zeroizing<Vec<u8>>) -> Self {
        let digest = Sha256::digest(secret.as_slice());
        let mut fingerprint = [0u8; FINGERPRINT_LENGTH];
        fingerprint.copy_from_slice(&digest[..FINGERPRINT_LENGTH]);
        Self {
            fingerprint,
            secret,
        }
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length; this cannot fail for SHA-256.
        <HmacSha256 as Mac>::new_from_slice(&self.secret)
            .unwrap_or_else(|_| unreachable!("HMAC-SHA256 accepts keys of any length"))
    }
}

/// Signs records on write and verifies them on read.
///
/// Verification is a pure function of the record's fields and embedded
/// signature; it never touches storage.
pub struct RecordSigner {
    primary: SigningKey,
    previous: Vec<SigningKey>,
}

impl fmt::Debug for RecordSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordSigner")
            .field("primary", &hex::encode(self.primary.fingerprint))
            .field("previous", &self.previous.len())
            .finish_non_exhaustive()
    }
}

impl RecordSigner {
    /// Build a signer from raw key bytes.
    ///
    /// # Errors
    /// Returns an error if any key is shorter than [`MIN_KEY_LENGTH`].
    pub fn new(primary: &[u8], previous: &[&[u8]]) -> Result<Self, SigningKeyError> {
        let check = |index: usize, key: &[u8]| {
            if key.len() < MIN_KEY_LENGTH {
                return Err(SigningKeyError::TooShort {
                    index,
                    len: key.len(),
                });
            }
            Ok(SigningKey::new(Zeroizing::new(key.to_vec())))
        };

        let primary = check(0, primary)?;
        let previous = previous
            .iter()
            .enumerate()
            .map(|(i, key)| check(i + 1, key))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { primary, previous })
    }

    /// Build a signer from hex-encoded secrets as they appear in config.
    ///
    /// # Errors
    /// Returns an error if a key is not valid hex or is too short.
    pub fn from_hex(
        primary: &SecretString,
        previous: &[SecretString],
    ) -> Result<Self, SigningKeyError> {
        let decode = |index: usize, s: &SecretString| {
            hex::decode(s.expose_secret().trim())
                .map(Zeroizing::new)
                .map_err(|_| SigningKeyError::InvalidHex { index })
        };

        let primary = decode(0, primary)?;
        let previous = previous
            .iter()
            .enumerate()
            .map(|(i, s)| decode(i + 1, s))
            .collect::<Result<Vec<_>, _>>()?;
        let previous_refs: Vec<&[u8]> = previous.iter().map(|k| k.as_slice()).collect();

        Self::new(&primary, &previous_refs)
    }

    /// Compute the signature of a record with the primary key.
    #[must_use]
    pub fn sign(&self, record: CanonicalRecord<'_>) -> Vec<u8> {
        let mut mac = self.primary.mac();
        mac.update(&record.to_bytes());
        let tag = mac.finalize().into_bytes();

        let mut signature = Vec::with_capacity(SIGNATURE_LENGTH);
        signature.push(SIGNATURE_VERSION);
        signature.extend_from_slice(&self.primary.fingerprint);
        signature.extend_from_slice(&tag);
        signature
    }

    /// Check a stored row and promote it to a trusted record.
    ///
    /// # Errors
    /// Returns the corruption details when the signature does not verify.
    pub fn verify(&self, stored: StoredService) -> Result<ServiceRecord, Corruption> {
        let corrupted = |reason| Corruption {
            id: stored.id,
            reason,
        };

        let sig = stored.signature.as_slice();
        if sig.len() != SIGNATURE_LENGTH || sig[0] != SIGNATURE_VERSION {
            return Err(corrupted(CorruptionReason::Malformed));
        }
        let (fingerprint, tag) = sig[1..].split_at(FINGERPRINT_LENGTH);

        let key = std::iter::once(&self.primary)
            .chain(&self.previous)
            .find(|k| k.fingerprint.as_slice() == fingerprint)
            .ok_or_else(|| corrupted(CorruptionReason::UnknownKey))?;

        let mut mac = key.mac();
        mac.update(&CanonicalRecord::from(&stored).to_bytes());
        mac.verify_slice(tag)
            .map_err(|_| corrupted(CorruptionReason::Mismatch))?;

        Ok(promote(stored))
    }

    /// Sign a row with the primary key and promote it to a record.
    #[must_use]
    pub fn seal(&self, mut stored: StoredService) -> ServiceRecord {
        stored.signature = self.sign(CanonicalRecord::from(&stored));
        promote(stored)
    }

    /// Whether the record was signed by a key other than the primary one.
    #[must_use]
    pub fn needs_resign(&self, record: &ServiceRecord) -> bool {
        record.signature.get(1..=FINGERPRINT_LENGTH) != Some(&self.primary.fingerprint[..])
    }
}

fn promote(stored: StoredService) -> ServiceRecord {
    ServiceRecord {
        id: stored.id,
        name: stored.name,
        service_type: stored.service_type,
        consumer_id: stored.consumer_id,
        last_heartbeat: stored.last_heartbeat,
        payload: stored.payload,
        signature: stored.signature,
    }
}
