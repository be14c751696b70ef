//! Verification records
//!
//! One line per good signature:
//! `UTC-DATE SIGNING-KEY-FPR SIGNING-CERT-FPR [mode:MODE] [DESCRIPTION]`
//! where the description may be a single-line JSON object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::enums::SignatureMode;
use crate::error::{ErrorKind, SopError};
use crate::utc::{format_utc, parse_utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub creation_time: DateTime<Utc>,
    pub signing_key_fingerprint: String,
    pub signing_cert_fingerprint: String,
    pub signature_mode: Option<SignatureMode>,
    pub description: Option<String>,
}

/// Structured extension carried in the description field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationJson {
    /// Names of the supplied CERTS that could have issued the signature
    pub signers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<serde_json::Value>,
}

impl Verification {
    pub fn new(
        creation_time: DateTime<Utc>,
        signing_key_fingerprint: impl Into<String>,
        signing_cert_fingerprint: impl Into<String>,
    ) -> Self {
        Self {
            creation_time,
            signing_key_fingerprint: signing_key_fingerprint.into(),
            signing_cert_fingerprint: signing_cert_fingerprint.into(),
            signature_mode: None,
            description: None,
        }
    }

    pub fn with_mode(mut self, mode: SignatureMode) -> Self {
        self.signature_mode = Some(mode);
        self
    }

    /// Blank descriptions are dropped.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        let trimmed = description.trim();
        self.description = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    pub fn with_json(self, json: &VerificationJson) -> Result<Self, SopError> {
        let line = serde_json::to_string(json)
            .map_err(|e| SopError::with_source(ErrorKind::BadData, "Cannot serialize verification JSON", e))?;
        Ok(self.with_description(line))
    }

    pub fn contains_json(&self) -> bool {
        self.description
            .as_deref()
            .map(str::trim)
            .map_or(false, |d| d.starts_with('{') && d.ends_with('}'))
    }

    /// The description parsed as [`VerificationJson`], if it is one.
    pub fn json(&self) -> Option<VerificationJson> {
        if !self.contains_json() {
            return None;
        }
        self.description.as_deref().and_then(|d| serde_json::from_str(d).ok())
    }
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            format_utc(&self.creation_time),
            self.signing_key_fingerprint,
            self.signing_cert_fingerprint
        )?;
        if let Some(mode) = self.signature_mode {
            write!(f, " mode:{}", mode)?;
        }
        if let Some(description) = &self.description {
            write!(f, " {}", description)?;
        }
        Ok(())
    }
}

fn next_token(s: &str) -> (&str, &str) {
    match s.split_once(' ') {
        Some((token, rest)) => (token, rest.trim_start()),
        None => (s, ""),
    }
}

impl FromStr for Verification {
    type Err = SopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim();
        let (date, rest) = next_token(line);
        let (key_fpr, rest) = next_token(rest);
        let (cert_fpr, rest) = next_token(rest);

        if date.is_empty() || key_fpr.is_empty() || cert_fpr.is_empty() {
            return Err(SopError::new(
                ErrorKind::BadData,
                format!(
                    "Verification must be of the format 'UTC-DATE OpenPGPFingerprint OpenPGPFingerprint [mode] [info]', got '{}'",
                    line
                ),
            ));
        }

        let mut verification = Verification::new(parse_utc(date)?, key_fpr, cert_fpr);

        let (maybe_mode, tail) = next_token(rest);
        let description = match maybe_mode.strip_prefix("mode:") {
            Some(mode) => {
                verification.signature_mode = Some(mode.parse()?);
                tail
            }
            None => rest,
        };

        Ok(verification.with_description(description))
    }
}

/// Parse a newline separated list of verifications, skipping blank lines.
pub fn parse_verifications(text: &str) -> Result<Vec<Verification>, SopError> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::parse)
        .collect()
}
