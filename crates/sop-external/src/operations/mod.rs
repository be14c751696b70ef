//! One consuming builder per `sop` subcommand

mod armor;
mod crypt;
mod keys;
mod sign;
mod verify;
mod version;

pub use armor::{Armor, Dearmor};
pub use crypt::{Decrypt, Encrypt};
pub use keys::{
    CertifyUserId, ChangeKeyPassword, ExtractCert, GenerateKey, MergeCerts, RevokeKey, UpdateKey,
    ValidateUserId,
};
pub use sign::{DetachedSign, InlineDetach, InlineSign};
pub use verify::{DetachedVerify, InlineVerify};
pub use version::{ListProfiles, Version};

use sop_core::verification::parse_verifications;
use sop_core::{ErrorKind, Result, SessionKey, SopError, Verification};
use zeroize::Zeroizing;

use crate::side_channel::{SideChannel, SideChannels};

fn side_channel_text(channels: &mut SideChannels, channel: SideChannel) -> Result<Option<Zeroizing<String>>> {
    let Some(data) = channels.consume(channel)? else {
        return Ok(None);
    };
    let text = std::str::from_utf8(&data).map_err(|e| {
        SopError::with_source(
            ErrorKind::BadData,
            format!("Backend wrote non UTF-8 data to {}", channel.file_name()),
            e,
        )
    })?;
    let text = text.trim();
    Ok((!text.is_empty()).then(|| Zeroizing::new(text.to_string())))
}

pub(crate) fn read_session_key(channels: &mut SideChannels) -> Result<Option<SessionKey>> {
    side_channel_text(channels, SideChannel::SessionKeyOut)?
        .map(|text| text.parse::<SessionKey>())
        .transpose()
}

pub(crate) fn read_verifications(channels: &mut SideChannels) -> Result<Vec<Verification>> {
    match side_channel_text(channels, SideChannel::VerifyOut)? {
        Some(text) => parse_verifications(&text),
        None => Ok(Vec::new()),
    }
}
