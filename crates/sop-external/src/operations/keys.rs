//! Key and certificate management subcommands

use std::sync::Arc;
use tokio::io::AsyncRead;

use sop_core::{ErrorKind, Result, SopError, TimeBound};

use crate::config::ExternalConfig;
use crate::descriptor::SecretCategory;
use crate::ready::{payload, Operation, Ready};

/// `sop generate-key`
pub struct GenerateKey {
    op: Operation,
}

impl GenerateKey {
    pub(crate) fn new(config: Arc<ExternalConfig>) -> Self {
        Self {
            op: Operation::new(config, "generate-key"),
        }
    }

    pub fn no_armor(mut self) -> Self {
        self.op.cmd.arg("--no-armor");
        self
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.op.cmd.arg(user_id);
        self
    }

    pub fn with_key_password(mut self, password: impl Into<Vec<u8>>) -> Self {
        self.op
            .cmd
            .secret_option("--with-key-password", SecretCategory::KeyPassword, password);
        self
    }

    pub fn profile(mut self, name: &str) -> Self {
        self.op.cmd.option("--profile", name);
        self
    }

    pub fn signing_only(mut self) -> Self {
        self.op.cmd.arg("--signing-only");
        self
    }

    pub fn generate(self) -> Ready<()> {
        self.op.transform(None)
    }
}

/// `sop extract-cert`
pub struct ExtractCert {
    op: Operation,
}

impl ExtractCert {
    pub(crate) fn new(config: Arc<ExternalConfig>) -> Self {
        Self {
            op: Operation::new(config, "extract-cert"),
        }
    }

    pub fn no_armor(mut self) -> Self {
        self.op.cmd.arg("--no-armor");
        self
    }

    pub fn key<R>(self, key: R) -> Ready<()>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.op.transform(Some(payload(key)))
    }
}

/// `sop revoke-key`
pub struct RevokeKey {
    op: Operation,
}

impl RevokeKey {
    pub(crate) fn new(config: Arc<ExternalConfig>) -> Self {
        Self {
            op: Operation::new(config, "revoke-key"),
        }
    }

    pub fn no_armor(mut self) -> Self {
        self.op.cmd.arg("--no-armor");
        self
    }

    pub fn with_key_password(mut self, password: impl Into<Vec<u8>>) -> Self {
        self.op
            .cmd
            .secret_option("--with-key-password", SecretCategory::KeyPassword, password);
        self
    }

    pub fn keys<R>(self, keys: R) -> Ready<()>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.op.transform(Some(payload(keys)))
    }
}

/// `sop change-key-password`
pub struct ChangeKeyPassword {
    op: Operation,
}

impl ChangeKeyPassword {
    pub(crate) fn new(config: Arc<ExternalConfig>) -> Self {
        Self {
            op: Operation::new(config, "change-key-password"),
        }
    }

    pub fn no_armor(mut self) -> Self {
        self.op.cmd.arg("--no-armor");
        self
    }

    /// May be given several times; the backend tries each.
    pub fn old_key_password(mut self, password: impl Into<Vec<u8>>) -> Self {
        self.op
            .cmd
            .secret_option("--old-key-password", SecretCategory::KeyPassword, password);
        self
    }

    /// Without one the keys come out unprotected.
    pub fn new_key_password(mut self, password: impl Into<Vec<u8>>) -> Self {
        self.op
            .cmd
            .secret_option("--new-key-password", SecretCategory::KeyPassword, password);
        self
    }

    pub fn keys<R>(self, keys: R) -> Ready<()>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.op.transform(Some(payload(keys)))
    }
}

/// `sop update-key`
pub struct UpdateKey {
    op: Operation,
}

impl UpdateKey {
    pub(crate) fn new(config: Arc<ExternalConfig>) -> Self {
        Self {
            op: Operation::new(config, "update-key"),
        }
    }

    pub fn no_armor(mut self) -> Self {
        self.op.cmd.arg("--no-armor");
        self
    }

    pub fn signing_only(mut self) -> Self {
        self.op.cmd.arg("--signing-only");
        self
    }

    pub fn no_new_mechanisms(mut self) -> Self {
        self.op.cmd.arg("--no-new-mechanisms");
        self
    }

    pub fn with_key_password(mut self, password: impl Into<Vec<u8>>) -> Self {
        self.op
            .cmd
            .secret_option("--with-key-password", SecretCategory::KeyPassword, password);
        self
    }

    /// Merge third-party certifications from these certificates.
    pub fn merge_certs(mut self, certs: impl Into<Vec<u8>>) -> Self {
        self.op
            .cmd
            .arg("--merge-certs")
            .secret_arg(SecretCategory::Cert, certs);
        self
    }

    pub fn key<R>(self, key: R) -> Ready<()>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.op.transform(Some(payload(key)))
    }
}

/// `sop merge-certs`
pub struct MergeCerts {
    op: Operation,
}

impl MergeCerts {
    pub(crate) fn new(config: Arc<ExternalConfig>) -> Self {
        Self {
            op: Operation::new(config, "merge-certs"),
        }
    }

    pub fn no_armor(mut self) -> Self {
        self.op.cmd.arg("--no-armor");
        self
    }

    pub fn updates(mut self, certs: impl Into<Vec<u8>>) -> Self {
        self.op.cmd.secret_arg(SecretCategory::Cert, certs);
        self
    }

    pub fn base_certs<R>(self, certs: R) -> Ready<()>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.op.transform(Some(payload(certs)))
    }
}

/// `sop certify-userid`
pub struct CertifyUserId {
    op: Operation,
    keys: Vec<String>,
}

impl CertifyUserId {
    pub(crate) fn new(config: Arc<ExternalConfig>) -> Self {
        Self {
            op: Operation::new(config, "certify-userid"),
            keys: Vec::new(),
        }
    }

    pub fn no_armor(mut self) -> Self {
        self.op.cmd.arg("--no-armor");
        self
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.op.cmd.arg("--userid").arg(user_id);
        self
    }

    pub fn with_key_password(mut self, password: impl Into<Vec<u8>>) -> Self {
        self.op
            .cmd
            .secret_option("--with-key-password", SecretCategory::KeyPassword, password);
        self
    }

    pub fn no_require_self_sig(mut self) -> Self {
        self.op.cmd.arg("--no-require-self-sig");
        self
    }

    /// Certifying keys. They go after `--` at the end of the command line.
    pub fn keys(mut self, keys: impl Into<Vec<u8>>) -> Self {
        let reference = self.op.cmd.bind(SecretCategory::Key, keys);
        self.keys.push(reference);
        self
    }

    pub fn certs<R>(mut self, certs: R) -> Ready<()>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.op.cmd.arg("--");
        for key in self.keys {
            self.op.cmd.arg(key);
        }
        self.op.transform(Some(payload(certs)))
    }
}

/// `sop validate-userid`
pub struct ValidateUserId {
    op: Operation,
    user_id: Option<String>,
    authorities: Vec<String>,
}

impl ValidateUserId {
    pub(crate) fn new(config: Arc<ExternalConfig>) -> Self {
        Self {
            op: Operation::new(config, "validate-userid"),
            user_id: None,
            authorities: Vec::new(),
        }
    }

    /// Match only the e-mail part of each bound user ID.
    pub fn addr_spec_only(mut self) -> Self {
        self.op.cmd.arg("--addr-spec-only");
        self
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Only bindings certified by one of these certificates count.
    pub fn authority(mut self, certs: impl Into<Vec<u8>>) -> Self {
        let reference = self.op.cmd.bind(SecretCategory::Cert, certs);
        self.authorities.push(reference);
        self
    }

    pub fn validate_at(mut self, when: impl Into<TimeBound>) -> Self {
        self.op.cmd.option("--validate-at", when.into());
        self
    }

    /// `true` when every subject binds the user ID, `false` when one does not.
    pub async fn subjects<R>(mut self, certs: R) -> Result<bool>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let user_id = self
            .user_id
            .take()
            .ok_or_else(|| SopError::new(ErrorKind::MissingArg, "Missing argument: user ID to validate"))?;

        self.op.cmd.arg(user_id);
        for authority in self.authorities {
            self.op.cmd.arg(authority);
        }

        match self.op.collect(Some(payload(certs))).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::CertUserIdNoMatch => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn config() -> Arc<ExternalConfig> {
        Arc::new(ExternalConfig::new("sop"))
    }

    #[test]
    fn test_generate_key_args() {
        let ready = GenerateKey::new(config())
            .no_armor()
            .profile("rfc4880")
            .with_key_password("sw0rdf1sh")
            .user_id("Alice <alice@example.org>")
            .signing_only()
            .generate();
        assert_eq!(
            ready.descriptor().args(),
            &[
                "sop",
                "generate-key",
                "--no-armor",
                "--profile=rfc4880",
                "--with-key-password=@ENV:KEY_PASSWORD_0",
                "Alice <alice@example.org>",
                "--signing-only",
            ]
        );
    }

    #[test]
    fn test_change_key_password_shares_counter() {
        let ready = ChangeKeyPassword::new(config())
            .old_key_password("old")
            .new_key_password("new")
            .keys(Cursor::new(Vec::new()));
        assert_eq!(
            &ready.descriptor().args()[2..],
            &[
                "--old-key-password=@ENV:KEY_PASSWORD_0",
                "--new-key-password=@ENV:KEY_PASSWORD_1",
            ]
        );
    }

    #[test]
    fn test_certify_keys_after_separator() {
        let ready = CertifyUserId::new(config())
            .keys(b"KEY 1".to_vec())
            .user_id("Bob")
            .with_key_password("pw")
            .keys(b"KEY 2".to_vec())
            .certs(Cursor::new(Vec::new()));
        assert_eq!(
            &ready.descriptor().args()[2..],
            &[
                "--userid",
                "Bob",
                "--with-key-password=@ENV:KEY_PASSWORD_0",
                "--",
                "@ENV:KEY_0",
                "@ENV:KEY_1",
            ]
        );
    }

    #[test]
    fn test_update_key_merge_certs() {
        let ready = UpdateKey::new(config())
            .merge_certs(b"CERT".to_vec())
            .no_new_mechanisms()
            .key(Cursor::new(Vec::new()));
        assert_eq!(
            &ready.descriptor().args()[2..],
            &["--merge-certs", "@ENV:CERT_0", "--no-new-mechanisms"]
        );
    }

    #[tokio::test]
    async fn test_validate_requires_user_id() {
        let err = ValidateUserId::new(config())
            .subjects(Cursor::new(Vec::new()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingArg);
    }
}
