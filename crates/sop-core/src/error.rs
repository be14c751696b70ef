//! Error taxonomy and the exit-code contract
//!
//! A conformant `sop` binary reports failures through its exit status only.
//! The table in [`ErrorKind`] is therefore part of the wire protocol: the
//! adapter decodes it, and the front end re-encodes it as its own exit status.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Boxed cause attached to an [`SopError::Operation`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, SopError>;

/// Every failure kind a conformant backend can signal through its exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Generic or unspecified failure (exit code 1)
    Generic,
    NoSignature,
    UnsupportedAsymmetricAlgo,
    CertCannotEncrypt,
    MissingArg,
    IncompleteVerification,
    CannotDecrypt,
    PasswordNotHumanReadable,
    UnsupportedOption,
    BadData,
    ExpectedText,
    OutputExists,
    MissingInput,
    KeyIsProtected,
    UnsupportedSubcommand,
    UnsupportedSpecialPrefix,
    AmbiguousInput,
    KeyCannotSign,
    IncompatibleOptions,
    UnsupportedProfile,
    NoHardwareKeyFound,
    HardwareKeyFailure,
    PrimaryKeyBad,
    CertUserIdNoMatch,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 24] = [
        ErrorKind::Generic,
        ErrorKind::NoSignature,
        ErrorKind::UnsupportedAsymmetricAlgo,
        ErrorKind::CertCannotEncrypt,
        ErrorKind::MissingArg,
        ErrorKind::IncompleteVerification,
        ErrorKind::CannotDecrypt,
        ErrorKind::PasswordNotHumanReadable,
        ErrorKind::UnsupportedOption,
        ErrorKind::BadData,
        ErrorKind::ExpectedText,
        ErrorKind::OutputExists,
        ErrorKind::MissingInput,
        ErrorKind::KeyIsProtected,
        ErrorKind::UnsupportedSubcommand,
        ErrorKind::UnsupportedSpecialPrefix,
        ErrorKind::AmbiguousInput,
        ErrorKind::KeyCannotSign,
        ErrorKind::IncompatibleOptions,
        ErrorKind::UnsupportedProfile,
        ErrorKind::NoHardwareKeyFound,
        ErrorKind::HardwareKeyFailure,
        ErrorKind::PrimaryKeyBad,
        ErrorKind::CertUserIdNoMatch,
    ];

    /// Numeric exit status for this kind.
    pub const fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Generic => 1,
            ErrorKind::NoSignature => 3,
            ErrorKind::UnsupportedAsymmetricAlgo => 13,
            ErrorKind::CertCannotEncrypt => 17,
            ErrorKind::MissingArg => 19,
            ErrorKind::IncompleteVerification => 23,
            ErrorKind::CannotDecrypt => 29,
            ErrorKind::PasswordNotHumanReadable => 31,
            ErrorKind::UnsupportedOption => 37,
            ErrorKind::BadData => 41,
            ErrorKind::ExpectedText => 53,
            ErrorKind::OutputExists => 59,
            ErrorKind::MissingInput => 61,
            ErrorKind::KeyIsProtected => 67,
            ErrorKind::UnsupportedSubcommand => 69,
            ErrorKind::UnsupportedSpecialPrefix => 71,
            ErrorKind::AmbiguousInput => 73,
            ErrorKind::KeyCannotSign => 79,
            ErrorKind::IncompatibleOptions => 83,
            ErrorKind::UnsupportedProfile => 89,
            ErrorKind::NoHardwareKeyFound => 97,
            ErrorKind::HardwareKeyFailure => 101,
            ErrorKind::PrimaryKeyBad => 103,
            ErrorKind::CertUserIdNoMatch => 107,
        }
    }

    /// Inverse of [`ErrorKind::exit_code`]. `None` for 0 and unknown codes.
    pub const fn from_exit_code(code: i32) -> Option<Self> {
        let kind = match code {
            1 => ErrorKind::Generic,
            3 => ErrorKind::NoSignature,
            13 => ErrorKind::UnsupportedAsymmetricAlgo,
            17 => ErrorKind::CertCannotEncrypt,
            19 => ErrorKind::MissingArg,
            23 => ErrorKind::IncompleteVerification,
            29 => ErrorKind::CannotDecrypt,
            31 => ErrorKind::PasswordNotHumanReadable,
            37 => ErrorKind::UnsupportedOption,
            41 => ErrorKind::BadData,
            53 => ErrorKind::ExpectedText,
            59 => ErrorKind::OutputExists,
            61 => ErrorKind::MissingInput,
            67 => ErrorKind::KeyIsProtected,
            69 => ErrorKind::UnsupportedSubcommand,
            71 => ErrorKind::UnsupportedSpecialPrefix,
            73 => ErrorKind::AmbiguousInput,
            79 => ErrorKind::KeyCannotSign,
            83 => ErrorKind::IncompatibleOptions,
            89 => ErrorKind::UnsupportedProfile,
            97 => ErrorKind::NoHardwareKeyFound,
            101 => ErrorKind::HardwareKeyFailure,
            103 => ErrorKind::PrimaryKeyBad,
            107 => ErrorKind::CertUserIdNoMatch,
            _ => return None,
        };
        Some(kind)
    }

    fn describe(self) -> &'static str {
        match self {
            ErrorKind::Generic => "Unspecified failure",
            ErrorKind::NoSignature => "No verifiable signature found",
            ErrorKind::UnsupportedAsymmetricAlgo => "Unsupported asymmetric algorithm",
            ErrorKind::CertCannotEncrypt => "Certificate is not encryption capable",
            ErrorKind::MissingArg => "Missing required argument",
            ErrorKind::IncompleteVerification => "Incomplete verification instructions",
            ErrorKind::CannotDecrypt => "Unable to decrypt",
            ErrorKind::PasswordNotHumanReadable => "Password is not human-readable",
            ErrorKind::UnsupportedOption => "Unsupported option",
            ErrorKind::BadData => "Invalid data type",
            ErrorKind::ExpectedText => "Non-text input where text was expected",
            ErrorKind::OutputExists => "Output file already exists",
            ErrorKind::MissingInput => "Input file does not exist",
            ErrorKind::KeyIsProtected => "Key is password protected and could not be unlocked",
            ErrorKind::UnsupportedSubcommand => "Unsupported subcommand",
            ErrorKind::UnsupportedSpecialPrefix => "Unsupported special prefix",
            ErrorKind::AmbiguousInput => "Ambiguous input designator",
            ErrorKind::KeyCannotSign => "Key is not signing capable",
            ErrorKind::IncompatibleOptions => "Incompatible options",
            ErrorKind::UnsupportedProfile => "Unsupported profile",
            ErrorKind::NoHardwareKeyFound => "No matching hardware key found",
            ErrorKind::HardwareKeyFailure => "Hardware key operation failed",
            ErrorKind::PrimaryKeyBad => "Primary key is unusable",
            ErrorKind::CertUserIdNoMatch => "Certificate has no matching user ID",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// The error record of the whole system.
#[derive(Error, Debug)]
pub enum SopError {
    /// Configuration, resolution and protocol failures. `exit_code` is set when
    /// the failure was reported by a backend process.
    #[error("{message}")]
    Operation {
        kind: ErrorKind,
        message: String,
        exit_code: Option<i32>,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Failed to spawn backend `{binary}`: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backend did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Backend reported unknown exit code ({code}){}", stderr_suffix(.stderr))]
    Unspecified { code: i32, stderr: String },

    #[error("Backend was terminated by signal {signal:?}")]
    Terminated { signal: Option<i32> },
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(":\n{}", trimmed)
    }
}

impl SopError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        SopError::Operation {
            kind,
            message: message.into(),
            exit_code: None,
            source: None,
        }
    }

    /// Wrap `cause` under a new message of the same taxonomy kind.
    pub fn with_source(kind: ErrorKind, message: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        SopError::Operation {
            kind,
            message: message.into(),
            exit_code: None,
            source: Some(cause.into()),
        }
    }

    /// Re-message this error, keeping its kind and chaining the original as cause.
    pub fn context(self, message: impl Into<String>) -> Self {
        let kind = self.kind();
        SopError::with_source(kind, message, self)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SopError::Operation { kind, .. } => *kind,
            _ => ErrorKind::Generic,
        }
    }

    /// Exit status a front end must terminate with for this error.
    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }

    /// Raw status reported by the backend process, if this error came from one.
    pub fn backend_exit_code(&self) -> Option<i32> {
        match self {
            SopError::Operation { exit_code, .. } => *exit_code,
            SopError::Unspecified { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Spawn, pump and deadline failures. Never retried.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            SopError::Spawn { .. } | SopError::Io(_) | SopError::Timeout(_) | SopError::Terminated { .. }
        )
    }
}

/// Map a backend's exit code onto the taxonomy.
///
/// Total over all integers: 0 is success, every code in the table yields its
/// kind, anything else yields [`SopError::Unspecified`] carrying the raw code.
pub fn map_exit_code(code: i32, stderr: &str) -> Result<()> {
    if code == 0 {
        return Ok(());
    }

    match ErrorKind::from_exit_code(code) {
        Some(kind) => Err(SopError::Operation {
            kind,
            message: format!("Backend reported error {:?} ({}){}", kind, code, stderr_suffix(stderr)),
            exit_code: Some(code),
            source: None,
        }),
        None => Err(SopError::Unspecified {
            code,
            stderr: stderr.trim().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_bijective() {
        for kind in ErrorKind::ALL {
            assert_eq!(ErrorKind::from_exit_code(kind.exit_code()), Some(kind));
        }
        let mut codes: Vec<i32> = ErrorKind::ALL.iter().map(|k| k.exit_code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), ErrorKind::ALL.len());
    }

    #[test]
    fn test_zero_is_success() {
        assert!(map_exit_code(0, "ignored").is_ok());
        assert_eq!(ErrorKind::from_exit_code(0), None);
    }

    #[test]
    fn test_known_codes() {
        let err = map_exit_code(29, "no key").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CannotDecrypt);
        assert_eq!(err.backend_exit_code(), Some(29));
        assert_eq!(err.exit_code(), 29);
        assert!(err.to_string().contains("no key"));

        assert_eq!(map_exit_code(73, "").unwrap_err().kind(), ErrorKind::AmbiguousInput);
        assert_eq!(map_exit_code(1, "").unwrap_err().kind(), ErrorKind::Generic);
    }

    #[test]
    fn test_unknown_code_keeps_raw_value() {
        let err = map_exit_code(42, "weird").unwrap_err();
        match &err {
            SopError::Unspecified { code, stderr } => {
                assert_eq!(*code, 42);
                assert_eq!(stderr, "weird");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.kind(), ErrorKind::Generic);
        assert_eq!(err.exit_code(), 1);
        assert_eq!(err.backend_exit_code(), Some(42));
    }

    #[test]
    fn test_mapping_is_deterministic() {
        for code in -5..200 {
            let a = map_exit_code(code, "").err().map(|e| (e.kind(), e.backend_exit_code()));
            let b = map_exit_code(code, "").err().map(|e| (e.kind(), e.backend_exit_code()));
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_context_keeps_kind_and_chains_cause() {
        let err = SopError::new(ErrorKind::BadData, "not a certificate").context("cert.asc is unusable");
        assert_eq!(err.kind(), ErrorKind::BadData);
        assert_eq!(err.to_string(), "cert.asc is unusable");
        let cause = std::error::Error::source(&err).map(|e| e.to_string());
        assert_eq!(cause.as_deref(), Some("not a certificate"));
    }

    #[test]
    fn test_transport_errors_exit_generic() {
        let err = SopError::Spawn {
            binary: "/nope".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.is_transport());
        assert_eq!(err.exit_code(), 1);
        assert!(SopError::Timeout(Duration::from_secs(1)).is_transport());
    }
}
