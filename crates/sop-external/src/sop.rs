//! Entry points handing out one builder per subcommand

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::ExternalConfig;
use crate::operations::*;

/// Stateless OpenPGP backed by an external `sop` executable.
#[derive(Debug, Clone)]
pub struct ExternalSop {
    config: Arc<ExternalConfig>,
}

impl ExternalSop {
    pub fn new(config: ExternalConfig) -> Self {
        Self {
            config: config.shared(),
        }
    }

    /// Default configuration for `binary`.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self::new(ExternalConfig::new(binary))
    }

    pub fn config(&self) -> &ExternalConfig {
        &self.config
    }

    pub fn version(&self) -> Version {
        Version::new(self.config.clone())
    }

    pub fn list_profiles(&self) -> ListProfiles {
        ListProfiles::new(self.config.clone())
    }

    pub fn generate_key(&self) -> GenerateKey {
        GenerateKey::new(self.config.clone())
    }

    pub fn extract_cert(&self) -> ExtractCert {
        ExtractCert::new(self.config.clone())
    }

    pub fn revoke_key(&self) -> RevokeKey {
        RevokeKey::new(self.config.clone())
    }

    pub fn change_key_password(&self) -> ChangeKeyPassword {
        ChangeKeyPassword::new(self.config.clone())
    }

    pub fn update_key(&self) -> UpdateKey {
        UpdateKey::new(self.config.clone())
    }

    pub fn merge_certs(&self) -> MergeCerts {
        MergeCerts::new(self.config.clone())
    }

    pub fn certify_user_id(&self) -> CertifyUserId {
        CertifyUserId::new(self.config.clone())
    }

    pub fn validate_user_id(&self) -> ValidateUserId {
        ValidateUserId::new(self.config.clone())
    }

    pub fn detached_sign(&self) -> DetachedSign {
        DetachedSign::new(self.config.clone())
    }

    pub fn inline_sign(&self) -> InlineSign {
        InlineSign::new(self.config.clone())
    }

    pub fn detached_verify(&self) -> DetachedVerify {
        DetachedVerify::new(self.config.clone())
    }

    pub fn inline_verify(&self) -> InlineVerify {
        InlineVerify::new(self.config.clone())
    }

    pub fn inline_detach(&self) -> InlineDetach {
        InlineDetach::new(self.config.clone())
    }

    pub fn encrypt(&self) -> Encrypt {
        Encrypt::new(self.config.clone())
    }

    pub fn decrypt(&self) -> Decrypt {
        Decrypt::new(self.config.clone())
    }

    pub fn armor(&self) -> Armor {
        Armor::new(self.config.clone())
    }

    pub fn dearmor(&self) -> Dearmor {
        Dearmor::new(self.config.clone())
    }

    /// The verification-only subset over the same configuration.
    pub fn sopv(&self) -> ExternalSopv {
        ExternalSopv {
            config: self.config.clone(),
        }
    }
}

/// Verification-only subset (`sopv`) of an external backend.
#[derive(Debug, Clone)]
pub struct ExternalSopv {
    config: Arc<ExternalConfig>,
}

impl ExternalSopv {
    pub fn new(config: ExternalConfig) -> Self {
        Self {
            config: config.shared(),
        }
    }

    pub fn version(&self) -> Version {
        Version::new(self.config.clone())
    }

    pub fn detached_verify(&self) -> DetachedVerify {
        DetachedVerify::new(self.config.clone())
    }

    pub fn inline_verify(&self) -> InlineVerify {
        InlineVerify::new(self.config.clone())
    }
}
