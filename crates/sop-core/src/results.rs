//! Auxiliary results recovered from side channels

use std::fmt;

use crate::error::{ErrorKind, SopError};
use crate::session_key::SessionKey;
use crate::verification::Verification;

/// Digest mechanism of a signed message, for the `micalg=` parameter of
/// PGP/MIME. Empty when signatures used different digests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MicAlg(String);

impl MicAlg {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_string())
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_hash_algorithm_id(id: u8) -> Result<Self, SopError> {
        let name = match id {
            1 => "pgp-md5",
            2 => "pgp-sha1",
            3 => "pgp-ripemd160",
            8 => "pgp-sha256",
            9 => "pgp-sha384",
            10 => "pgp-sha512",
            11 => "pgp-sha224",
            12 => "pgp-sha3-256",
            14 => "pgp-sha3-512",
            _ => {
                return Err(SopError::new(
                    ErrorKind::UnsupportedOption,
                    format!("Unsupported hash algorithm ID: {}", id),
                ))
            }
        };
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for MicAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SigningResult {
    pub micalg: MicAlg,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncryptionResult {
    pub session_key: Option<SessionKey>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecryptionResult {
    pub session_key: Option<SessionKey>,
    pub verifications: Vec<Verification>,
}
