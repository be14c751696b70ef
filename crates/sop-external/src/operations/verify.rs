//! Verification subcommands

use std::sync::Arc;
use tokio::io::AsyncRead;

use sop_core::verification::parse_verifications;
use sop_core::{ErrorKind, Result, SopError, TimeBound, Verification};

use super::read_verifications;
use crate::config::ExternalConfig;
use crate::descriptor::SecretCategory;
use crate::ready::{payload, Operation, Ready};
use crate::side_channel::SideChannel;

/// `sop verify SIGNATURES CERTS... < DATA`
pub struct DetachedVerify {
    op: Operation,
    signatures: Option<String>,
    certs: Vec<String>,
}

impl DetachedVerify {
    pub(crate) fn new(config: Arc<ExternalConfig>) -> Self {
        Self {
            op: Operation::new(config, "verify"),
            signatures: None,
            certs: Vec::new(),
        }
    }

    pub fn not_before(mut self, bound: impl Into<TimeBound>) -> Self {
        self.op.cmd.option("--not-before", bound.into());
        self
    }

    pub fn not_after(mut self, bound: impl Into<TimeBound>) -> Self {
        self.op.cmd.option("--not-after", bound.into());
        self
    }

    pub fn cert(mut self, cert: impl Into<Vec<u8>>) -> Self {
        let reference = self.op.cmd.bind(SecretCategory::Cert, cert);
        self.certs.push(reference);
        self
    }

    /// The detached signatures to check. Supplying them again replaces the
    /// earlier reference.
    pub fn signatures(mut self, signatures: impl Into<Vec<u8>>) -> Self {
        let reference = self.op.cmd.bind(SecretCategory::Signature, signatures);
        self.signatures = Some(reference);
        self
    }

    /// Run the verification and return one record per good signature.
    pub async fn data<R>(self, data: R) -> Result<Vec<Verification>>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let DetachedVerify {
            mut op,
            signatures,
            certs,
        } = self;

        let signatures = signatures
            .ok_or_else(|| SopError::new(ErrorKind::MissingArg, "Missing argument: signatures cannot be null."))?;
        op.cmd.arg(signatures);
        for cert in certs {
            op.cmd.arg(cert);
        }

        let out = op.collect(Some(payload(data))).await?;
        let text = String::from_utf8(out)
            .map_err(|e| SopError::with_source(ErrorKind::BadData, "Backend wrote non UTF-8 verifications", e))?;
        parse_verifications(&text)
    }
}

/// `sop inline-verify`
pub struct InlineVerify {
    op: Operation,
}

impl InlineVerify {
    pub(crate) fn new(config: Arc<ExternalConfig>) -> Self {
        Self {
            op: Operation::new(config, "inline-verify"),
        }
    }

    pub fn not_before(mut self, bound: impl Into<TimeBound>) -> Self {
        self.op.cmd.option("--not-before", bound.into());
        self
    }

    pub fn not_after(mut self, bound: impl Into<TimeBound>) -> Self {
        self.op.cmd.option("--not-after", bound.into());
        self
    }

    pub fn cert(mut self, cert: impl Into<Vec<u8>>) -> Self {
        self.op.cmd.secret_arg(SecretCategory::Cert, cert);
        self
    }

    /// Primary output is the verified message body.
    pub fn data<R>(mut self, data: R) -> Result<Ready<Vec<Verification>>>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.op
            .side_channel("--verifications-out", SideChannel::VerifyOut)?;
        Ok(self.op.ready(Some(payload(data)), read_verifications))
    }
}
