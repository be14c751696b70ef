//! Signing subcommands

use std::sync::Arc;
use tokio::io::AsyncRead;

use sop_core::{ErrorKind, InlineSignAs, MicAlg, Result, SignAs, SigningResult, SopError};

use super::side_channel_text;
use crate::config::ExternalConfig;
use crate::descriptor::SecretCategory;
use crate::ready::{payload, Operation, Ready};
use crate::side_channel::SideChannel;

/// `sop sign`
pub struct DetachedSign {
    op: Operation,
}

impl DetachedSign {
    pub(crate) fn new(config: Arc<ExternalConfig>) -> Self {
        Self {
            op: Operation::new(config, "sign"),
        }
    }

    pub fn no_armor(mut self) -> Self {
        self.op.cmd.arg("--no-armor");
        self
    }

    pub fn mode(mut self, mode: SignAs) -> Self {
        self.op.cmd.option("--as", mode);
        self
    }

    pub fn key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.op.cmd.secret_arg(SecretCategory::Key, key);
        self
    }

    pub fn with_key_password(mut self, password: impl Into<Vec<u8>>) -> Self {
        self.op
            .cmd
            .secret_option("--with-key-password", SecretCategory::KeyPassword, password);
        self
    }

    /// Freeze the command. The digest name is empty if the backend does not report one.
    pub fn data<R>(mut self, data: R) -> Result<Ready<SigningResult>>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.op.side_channel("--micalg-out", SideChannel::MicAlgOut)?;
        Ok(self.op.ready(Some(payload(data)), |channels| {
            let micalg = side_channel_text(channels, SideChannel::MicAlgOut)?
                .map(|text| MicAlg::new(text.as_str()))
                .unwrap_or_default();
            Ok(SigningResult { micalg })
        }))
    }
}

/// `sop inline-sign`
pub struct InlineSign {
    op: Operation,
}

impl InlineSign {
    pub(crate) fn new(config: Arc<ExternalConfig>) -> Self {
        Self {
            op: Operation::new(config, "inline-sign"),
        }
    }

    pub fn no_armor(mut self) -> Self {
        self.op.cmd.arg("--no-armor");
        self
    }

    pub fn mode(mut self, mode: InlineSignAs) -> Self {
        self.op.cmd.option("--as", mode);
        self
    }

    pub fn key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.op.cmd.secret_arg(SecretCategory::Key, key);
        self
    }

    pub fn with_key_password(mut self, password: impl Into<Vec<u8>>) -> Self {
        self.op
            .cmd
            .secret_option("--with-key-password", SecretCategory::KeyPassword, password);
        self
    }

    pub fn data<R>(self, data: R) -> Ready<()>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.op.transform(Some(payload(data)))
    }
}

/// `sop inline-detach`
pub struct InlineDetach {
    op: Operation,
}

impl InlineDetach {
    pub(crate) fn new(config: Arc<ExternalConfig>) -> Self {
        Self {
            op: Operation::new(config, "inline-detach"),
        }
    }

    pub fn no_armor(mut self) -> Self {
        self.op.cmd.arg("--no-armor");
        self
    }

    /// Primary output is the message body; the result holds the signatures.
    pub fn message<R>(mut self, message: R) -> Result<Ready<Vec<u8>>>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.op
            .side_channel("--signatures-out", SideChannel::SignaturesOut)?;
        Ok(self.op.ready(Some(payload(message)), |channels| {
            match channels.consume(SideChannel::SignaturesOut)? {
                Some(signatures) => Ok(signatures.to_vec()),
                None => Err(SopError::new(
                    ErrorKind::Generic,
                    "Backend did not write the detached signatures",
                )),
            }
        }))
    }
}
