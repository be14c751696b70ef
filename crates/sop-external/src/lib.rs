//! SOP External - Stateless OpenPGP through an external `sop` binary
//!
//! Each operation is a consuming builder. Configuration calls append to a
//! command line in call order; secrets are passed through the child's
//! environment as `@ENV:` references. The terminal call freezes the command
//! into a [`Ready`] which streams the payload through the backend and recovers
//! session keys, verifications and signatures from side-channel files.
//!
//! ```no_run
//! # async fn demo() -> sop_core::Result<()> {
//! use sop_external::ExternalSop;
//!
//! let sop = ExternalSop::with_binary("sqop");
//! let key = sop.generate_key().user_id("Alice <alice@example.org>").generate().bytes().await?;
//! let (ciphertext, result) = sop
//!     .encrypt()
//!     .with_password("hunter2")
//!     .plaintext(std::io::Cursor::new(b"Hello".to_vec()))?
//!     .to_vec()
//!     .await?;
//! # let _ = (key, ciphertext, result);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod descriptor;
pub mod operations;
pub mod process;
pub mod ready;
pub mod side_channel;
mod sop;

pub use config::{ExternalConfig, TempDirLocation};
pub use descriptor::{CommandBuilder, Descriptor, SecretAllocator, SecretCategory};
pub use ready::Ready;
pub use sop::{ExternalSop, ExternalSopv};
pub use side_channel::{SideChannel, SideChannels};
