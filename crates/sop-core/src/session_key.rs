//! Symmetric session keys
//!
//! Text form is `ALGO:HEX`, e.g. `9:FCA4BEAF687F48059CACC14FB019125CD57392BAB7037C707835925CBF9F7BCD`.
//! Key bytes are scrubbed from memory on drop.

use std::fmt;
use std::str::FromStr;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{ErrorKind, SopError};

#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey {
    algorithm: u8,
    key: Vec<u8>,
}

impl SessionKey {
    pub fn new(algorithm: u8, key: Vec<u8>) -> Self {
        Self { algorithm, key }
    }

    /// OpenPGP symmetric algorithm id
    pub fn algorithm(&self) -> u8 {
        self.algorithm
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// The `ALGO:HEX` form, zeroized once the caller drops it.
    pub fn to_text(&self) -> Zeroizing<String> {
        let mut out = String::with_capacity(4 + self.key.len() * 2);
        out.push_str(&self.algorithm.to_string());
        out.push(':');
        for b in &self.key {
            out.push_str(&format!("{:02X}", b));
        }
        Zeroizing::new(out)
    }
}

// Never print key material, even in debug output.
impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKey")
            .field("algorithm", &self.algorithm)
            .field("key", &format_args!("[{} bytes redacted]", self.key.len()))
            .finish()
    }
}

impl FromStr for SessionKey {
    type Err = SopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || SopError::new(ErrorKind::BadData, "Provided session key does not match expected format ALGO:HEX");

        let cleaned: Zeroizing<String> = Zeroizing::new(s.trim().replace('\n', ""));
        let (algo, hex) = cleaned.split_once(':').ok_or_else(malformed)?;

        if algo.is_empty() || algo.len() > 3 || !algo.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let algorithm: u8 = algo.parse().map_err(|_| malformed())?;
        let key = decode_hex(hex).ok_or_else(malformed)?;

        Ok(Self { algorithm, key })
    }
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.is_empty() || hex.len() % 2 != 0 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_render() {
        let sk: SessionKey = "9:fca4beaf687f4805\n".parse().unwrap();
        assert_eq!(sk.algorithm(), 9);
        assert_eq!(sk.key(), &[0xFC, 0xA4, 0xBE, 0xAF, 0x68, 0x7F, 0x48, 0x05]);
        assert_eq!(sk.to_text().as_str(), "9:FCA4BEAF687F4805");
    }

    #[test]
    fn test_two_digit_algorithm() {
        let sk: SessionKey = "12:00FF".parse().unwrap();
        assert_eq!(sk.algorithm(), 12);
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in ["", "9", "9:", ":ABCD", "x:ABCD", "9:ABC", "9:ZZZZ", "1000:AB"] {
            let err = bad.parse::<SessionKey>().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::BadData, "input {bad:?}");
        }
    }

    #[test]
    fn test_debug_is_redacted() {
        let sk = SessionKey::new(9, vec![0xAB; 32]);
        let printed = format!("{:?}", sk);
        assert!(!printed.contains("AB"));
        assert!(!printed.contains("171"));
        assert!(printed.contains("32 bytes redacted"));
    }
}
