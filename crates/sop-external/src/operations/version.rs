//! `sop version` and `sop list-profiles`

use std::sync::Arc;

use sop_core::profile::parse_profiles;
use sop_core::{ErrorKind, Profile, Result, SopError};

use crate::config::ExternalConfig;
use crate::ready::Operation;

/// Version information of the backend. Every query runs the binary again.
#[derive(Debug, Clone)]
pub struct Version {
    config: Arc<ExternalConfig>,
}

impl Version {
    pub(crate) fn new(config: Arc<ExternalConfig>) -> Self {
        Self { config }
    }

    async fn query(&self, flag: Option<&str>) -> Result<String> {
        let mut op = Operation::new(self.config.clone(), "version");
        if let Some(flag) = flag {
            op.cmd.arg(flag);
        }
        let out = op.collect(None).await?;
        Ok(String::from_utf8_lossy(&out).trim().to_string())
    }

    async fn first_line(&self) -> Result<String> {
        let info = self.query(None).await?;
        Ok(info.lines().next().unwrap_or_default().trim().to_string())
    }

    /// Implementation name, everything before the last space of `sop version`.
    pub async fn name(&self) -> Result<String> {
        let info = self.first_line().await?;
        Ok(match info.rsplit_once(' ') {
            Some((name, _)) => name.to_string(),
            None => info,
        })
    }

    /// Implementation version, the last word of `sop version`.
    pub async fn version(&self) -> Result<String> {
        let info = self.first_line().await?;
        Ok(match info.rsplit_once(' ') {
            Some((_, version)) => version.to_string(),
            None => info,
        })
    }

    pub async fn backend_version(&self) -> Result<String> {
        self.query(Some("--backend")).await
    }

    pub async fn extended_version(&self) -> Result<String> {
        self.query(Some("--extended")).await
    }

    /// E.g. `draft-dkg-openpgp-stateless-cli-10`, prefixed with `~` when incomplete.
    pub async fn sop_spec_version(&self) -> Result<String> {
        self.query(Some("--sop-spec")).await
    }

    /// Revision number of the implemented draft, `None` when it has none.
    pub async fn sop_spec_revision_number(&self) -> Result<Option<u32>> {
        let spec = self.sop_spec_version().await?;
        parse_revision(&spec)
    }

    pub async fn is_sop_spec_implementation_incomplete(&self) -> Result<bool> {
        Ok(self.sop_spec_version().await?.starts_with('~'))
    }

    /// Free text following the first line of `--sop-spec`, if any.
    pub async fn sop_spec_implementation_remarks(&self) -> Result<Option<String>> {
        let spec = self.sop_spec_version().await?;
        Ok(remarks_of(&spec))
    }

    pub async fn sopv_version(&self) -> Result<String> {
        self.query(Some("--sopv")).await
    }
}

fn parse_revision(spec: &str) -> Result<Option<u32>> {
    let first = spec.lines().next().unwrap_or_default().trim();
    let Some((_, revision)) = first.rsplit_once('-') else {
        return Ok(None);
    };
    revision.parse().map(Some).map_err(|e| {
        SopError::with_source(
            ErrorKind::BadData,
            format!("Malformed SOP spec revision '{}'", first),
            e,
        )
    })
}

fn remarks_of(spec: &str) -> Option<String> {
    let (_, rest) = spec.split_once('\n')?;
    let rest = rest.trim();
    (!rest.is_empty()).then(|| rest.to_string())
}

/// `sop list-profiles SUBCOMMAND`
#[derive(Debug, Clone)]
pub struct ListProfiles {
    config: Arc<ExternalConfig>,
}

impl ListProfiles {
    pub(crate) fn new(config: Arc<ExternalConfig>) -> Self {
        Self { config }
    }

    pub async fn subcommand(&self, name: &str) -> Result<Vec<Profile>> {
        let mut op = Operation::new(self.config.clone(), "list-profiles");
        op.cmd.arg(name);
        let out = op.collect(None).await?;
        parse_profiles(&String::from_utf8_lossy(&out))
    }

    pub async fn generate_key(&self) -> Result<Vec<Profile>> {
        self.subcommand("generate-key").await
    }

    pub async fn encrypt(&self) -> Result<Vec<Profile>> {
        self.subcommand("encrypt").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revision_number() {
        assert_eq!(parse_revision("draft-dkg-openpgp-stateless-cli-10").unwrap(), Some(10));
        assert_eq!(parse_revision("~draft-dkg-openpgp-stateless-cli-08\nmissing foo").unwrap(), Some(8));
        assert_eq!(parse_revision("unversioned").unwrap(), None);
        assert!(parse_revision("draft-x").is_err());
    }

    #[test]
    fn test_remarks() {
        assert_eq!(remarks_of("draft-10"), None);
        assert_eq!(remarks_of("draft-10\n  \n"), None);
        assert_eq!(
            remarks_of("~draft-10\nlacks inline-detach\n").as_deref(),
            Some("lacks inline-detach")
        );
    }
}
