//! Frozen invocations waiting for an output sink

use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

use sop_core::Result;

use crate::config::ExternalConfig;
use crate::descriptor::{CommandBuilder, Descriptor};
use crate::process::{self, Payload};
use crate::side_channel::{SideChannel, SideChannels};

type Finish<T> = Box<dyn FnOnce(&mut SideChannels) -> Result<T> + Send>;

/// A fully configured operation. Nothing runs until [`Ready::write_to`] or
/// [`Ready::to_vec`] is awaited; dropping it removes any reserved side channels.
pub struct Ready<T> {
    config: Arc<ExternalConfig>,
    descriptor: Descriptor,
    input: Option<Payload>,
    side_channels: SideChannels,
    finish: Finish<T>,
}

impl<T> Ready<T> {
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Run the backend, streaming its primary output into `output`, and return
    /// the auxiliary result recovered from the side channels.
    pub async fn write_to<W>(self, output: &mut W) -> Result<T>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let Ready {
            config,
            descriptor,
            input,
            mut side_channels,
            finish,
        } = self;

        process::execute(&config, &descriptor, input, output).await?;
        finish(&mut side_channels)
    }

    pub async fn to_vec(self) -> Result<(Vec<u8>, T)> {
        let mut out = Vec::new();
        let result = self.write_to(&mut out).await?;
        Ok((out, result))
    }
}

impl Ready<()> {
    /// Primary output only.
    pub async fn bytes(self) -> Result<Vec<u8>> {
        let (out, ()) = self.to_vec().await?;
        Ok(out)
    }
}

impl<T> fmt::Debug for Ready<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ready")
            .field("descriptor", &self.descriptor)
            .field("has_input", &self.input.is_some())
            .field("side_channels", &self.side_channels)
            .finish()
    }
}

/// An operation under construction: its command line plus the side channels
/// it has reserved so far.
pub(crate) struct Operation {
    config: Arc<ExternalConfig>,
    pub(crate) cmd: CommandBuilder,
    side_channels: SideChannels,
}

impl Operation {
    pub(crate) fn new(config: Arc<ExternalConfig>, subcommand: &str) -> Self {
        let cmd = CommandBuilder::new(config.binary.to_string_lossy(), subcommand);
        let side_channels = SideChannels::new(config.temp_dir.clone());
        Self {
            config,
            cmd,
            side_channels,
        }
    }

    /// Reserve `channel` and pass its path to the backend as `--<option>=<path>`.
    pub(crate) fn side_channel(&mut self, option: &str, channel: SideChannel) -> Result<()> {
        let path = self.side_channels.reserve(channel)?;
        self.cmd.option(option, path.display());
        Ok(())
    }

    pub(crate) fn ready<T, F>(self, input: Option<Payload>, finish: F) -> Ready<T>
    where
        F: FnOnce(&mut SideChannels) -> Result<T> + Send + 'static,
    {
        Ready {
            config: self.config,
            descriptor: self.cmd.freeze(),
            input,
            side_channels: self.side_channels,
            finish: Box::new(finish),
        }
    }

    pub(crate) fn transform(self, input: Option<Payload>) -> Ready<()> {
        self.ready(input, |_| Ok(()))
    }

    /// Run to completion and return the primary output.
    pub(crate) async fn collect(self, input: Option<Payload>) -> Result<Vec<u8>> {
        self.transform(input).bytes().await
    }
}

pub(crate) fn payload<R>(reader: R) -> Payload
where
    R: AsyncRead + Send + Unpin + 'static,
{
    Box::new(reader)
}
