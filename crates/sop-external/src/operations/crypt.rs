//! `sop encrypt` and `sop decrypt`

use std::sync::Arc;
use tokio::io::AsyncRead;

use sop_core::{DecryptionResult, EncryptAs, EncryptFor, EncryptionResult, Result, SessionKey, TimeBound};

use super::{read_session_key, read_verifications};
use crate::config::ExternalConfig;
use crate::descriptor::SecretCategory;
use crate::ready::{payload, Operation, Ready};
use crate::side_channel::SideChannel;

pub struct Encrypt {
    op: Operation,
}

impl Encrypt {
    pub(crate) fn new(config: Arc<ExternalConfig>) -> Self {
        Self {
            op: Operation::new(config, "encrypt"),
        }
    }

    pub fn no_armor(mut self) -> Self {
        self.op.cmd.arg("--no-armor");
        self
    }

    pub fn mode(mut self, mode: EncryptAs) -> Self {
        self.op.cmd.option("--as", mode);
        self
    }

    pub fn encrypt_for(mut self, purpose: EncryptFor) -> Self {
        self.op.cmd.option("--for", purpose);
        self
    }

    /// Also sign the message with this secret key.
    pub fn sign_with(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.op
            .cmd
            .secret_option("--sign-with", SecretCategory::SignWith, key);
        self
    }

    /// Unlocks the signing keys.
    pub fn with_key_password(mut self, password: impl Into<Vec<u8>>) -> Self {
        self.op
            .cmd
            .secret_option("--with-key-password", SecretCategory::KeyPassword, password);
        self
    }

    /// Symmetric encryption to a password, in addition to any certificates.
    pub fn with_password(mut self, password: impl Into<Vec<u8>>) -> Self {
        self.op
            .cmd
            .secret_option("--with-password", SecretCategory::Password, password);
        self
    }

    pub fn with_cert(mut self, cert: impl Into<Vec<u8>>) -> Self {
        self.op.cmd.secret_arg(SecretCategory::Cert, cert);
        self
    }

    pub fn profile(mut self, name: &str) -> Self {
        self.op.cmd.option("--profile", name);
        self
    }

    /// Freeze the command. The session key is recovered if the backend reports it.
    pub fn plaintext<R>(mut self, plaintext: R) -> Result<Ready<EncryptionResult>>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.op
            .side_channel("--session-key-out", SideChannel::SessionKeyOut)?;
        Ok(self.op.ready(Some(payload(plaintext)), |channels| {
            Ok(EncryptionResult {
                session_key: read_session_key(channels)?,
            })
        }))
    }
}

pub struct Decrypt {
    op: Operation,
    verify: bool,
}

impl Decrypt {
    pub(crate) fn new(config: Arc<ExternalConfig>) -> Self {
        Self {
            op: Operation::new(config, "decrypt"),
            verify: false,
        }
    }

    pub fn verify_not_before(mut self, bound: impl Into<TimeBound>) -> Self {
        self.op.cmd.option("--verify-not-before", bound.into());
        self
    }

    pub fn verify_not_after(mut self, bound: impl Into<TimeBound>) -> Self {
        self.op.cmd.option("--verify-not-after", bound.into());
        self
    }

    /// Verify signatures against this certificate. Enables verification output.
    pub fn verify_with_cert(mut self, cert: impl Into<Vec<u8>>) -> Self {
        self.op
            .cmd
            .secret_option("--verify-with", SecretCategory::VerifyWith, cert);
        self.verify = true;
        self
    }

    pub fn with_session_key(mut self, session_key: &SessionKey) -> Self {
        let text = session_key.to_text();
        self.op.cmd.secret_option(
            "--with-session-key",
            SecretCategory::SessionKey,
            text.as_bytes().to_vec(),
        );
        self
    }

    pub fn with_password(mut self, password: impl Into<Vec<u8>>) -> Self {
        self.op
            .cmd
            .secret_option("--with-password", SecretCategory::Password, password);
        self
    }

    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.op.cmd.secret_arg(SecretCategory::Key, key);
        self
    }

    pub fn with_key_password(mut self, password: impl Into<Vec<u8>>) -> Self {
        self.op
            .cmd
            .secret_option("--with-key-password", SecretCategory::KeyPassword, password);
        self
    }

    /// Freeze the command. Verifications are only collected when a
    /// verification certificate was supplied.
    pub fn ciphertext<R>(mut self, ciphertext: R) -> Result<Ready<DecryptionResult>>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.op
            .side_channel("--session-key-out", SideChannel::SessionKeyOut)?;
        if self.verify {
            self.op.side_channel("--verify-out", SideChannel::VerifyOut)?;
        }

        Ok(self.op.ready(Some(payload(ciphertext)), |channels| {
            Ok(DecryptionResult {
                session_key: read_session_key(channels)?,
                verifications: read_verifications(channels)?,
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::io::Cursor;

    fn config() -> Arc<ExternalConfig> {
        Arc::new(ExternalConfig::new("sop"))
    }

    #[test]
    fn test_encrypt_command_line() {
        let ready = Encrypt::new(config())
            .no_armor()
            .mode(EncryptAs::Text)
            .with_password("hunter2")
            .with_password("swordfish")
            .with_cert(b"CERT A".to_vec())
            .plaintext(Cursor::new(Vec::new()))
            .unwrap();

        let args = ready.descriptor().args();
        assert_eq!(&args[..7], &[
            "sop",
            "encrypt",
            "--no-armor",
            "--as=text",
            "--with-password=@ENV:PASSWORD_0",
            "--with-password=@ENV:PASSWORD_1",
            "@ENV:CERT_0",
        ]);
        assert!(args[7].starts_with("--session-key-out="));
        assert!(args[7].ends_with("/session-key-out"));
        assert!(args.iter().all(|a| !a.contains("hunter2") && !a.contains("swordfish")));
    }

    #[test]
    fn test_decrypt_verify_out_only_with_cert() {
        let plain = Decrypt::new(config())
            .with_key(b"KEY".to_vec())
            .ciphertext(Cursor::new(Vec::new()))
            .unwrap();
        assert!(!plain.descriptor().args().iter().any(|a| a.starts_with("--verify-out")));

        let when = Utc.with_ymd_and_hms(2023, 4, 1, 12, 0, 0).unwrap();
        let verifying = Decrypt::new(config())
            .verify_not_before(when)
            .verify_not_after(TimeBound::Now)
            .verify_with_cert(b"CERT".to_vec())
            .ciphertext(Cursor::new(Vec::new()))
            .unwrap();
        let args = verifying.descriptor().args();
        assert_eq!(args[2], "--verify-not-before=2023-04-01T12:00:00Z");
        assert_eq!(args[3], "--verify-not-after=now");
        assert_eq!(args[4], "--verify-with=@ENV:VERIFY_WITH_0");
        assert!(args.iter().any(|a| a.starts_with("--verify-out=")));
    }

    #[test]
    fn test_session_key_is_bound_not_inlined() {
        let key: SessionKey = "9:FCA4BEAF687F48059CACC14FB019125CD57392BAB7037C707835925CBF9F7BCD"
            .parse()
            .unwrap();
        let ready = Decrypt::new(config())
            .with_session_key(&key)
            .ciphertext(Cursor::new(Vec::new()))
            .unwrap();
        let args = ready.descriptor().args();
        assert_eq!(args[2], "--with-session-key=@ENV:SESSION_KEY_0");
        assert!(args.iter().all(|a| !a.contains("FCA4BEAF")));
    }
}
