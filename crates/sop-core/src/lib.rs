//! SOP Core - Data model of the Stateless OpenPGP protocol
//!
//! This crate provides:
//! - The error taxonomy and its exit-code table (the wire contract)
//! - Session keys, verification records, profiles and signing results
//! - Mode enums and the UTC timestamp codec used on the command line
//!
//! It performs no I/O and never touches key material beyond carrying it.

pub mod enums;
pub mod error;
pub mod profile;
pub mod results;
pub mod session_key;
pub mod utc;
pub mod verification;

pub use enums::{ArmorLabel, EncryptAs, EncryptFor, InlineSignAs, SignAs, SignatureMode};
pub use error::{map_exit_code, ErrorKind, Result, SopError};
pub use profile::Profile;
pub use results::{DecryptionResult, EncryptionResult, MicAlg, SigningResult};
pub use session_key::SessionKey;
pub use utc::TimeBound;
pub use verification::{Verification, VerificationJson};
