use std::sync::Arc;
use tokio::io::AsyncRead;

use sop_core::ArmorLabel;

use crate::config::ExternalConfig;
use crate::ready::{payload, Operation, Ready};

/// `sop armor`
pub struct Armor {
    op: Operation,
}

impl Armor {
    pub(crate) fn new(config: Arc<ExternalConfig>) -> Self {
        Self {
            op: Operation::new(config, "armor"),
        }
    }

    pub fn label(mut self, label: ArmorLabel) -> Self {
        self.op.cmd.option("--label", label);
        self
    }

    pub fn data<R>(self, data: R) -> Ready<()>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.op.transform(Some(payload(data)))
    }
}

/// `sop dearmor`
pub struct Dearmor {
    op: Operation,
}

impl Dearmor {
    pub(crate) fn new(config: Arc<ExternalConfig>) -> Self {
        Self {
            op: Operation::new(config, "dearmor"),
        }
    }

    pub fn data<R>(self, data: R) -> Ready<()>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.op.transform(Some(payload(data)))
    }
}
