//! Operation descriptors - argument vector plus secret environment bindings
//!
//! Secrets never appear on the command line. Each one is stored in the child's
//! environment under a generated name and the argument vector carries an
//! `@ENV:<name>` reference instead.
//!
//! This keeps secrets out of `ps` output and out of anything that logs argument
//! vectors. It is not a boundary against a co-resident process running as the
//! same user: `/proc/<pid>/environ` (or the platform equivalent) still exposes
//! the bindings to anyone allowed to read it.
//!
//! Environment values cannot hold NUL bytes, so neither can secrets. Binary
//! (`--no-armor`) keys and certificates must be armored before they are bound;
//! [`Descriptor::validate`] rejects them before anything is spawned.

use secrecy::{ExposeSecret, Secret};
use std::fmt;

use sop_core::{ErrorKind, Result, SopError};

/// Prefix of an environment reference in an argument vector.
pub const ENV_PREFIX: &str = "@ENV:";

const CATEGORY_COUNT: usize = 8;

/// Kind of secret, each with its own name counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretCategory {
    Password,
    KeyPassword,
    SessionKey,
    Key,
    Cert,
    SignWith,
    VerifyWith,
    Signature,
}

impl SecretCategory {
    pub const ALL: [SecretCategory; CATEGORY_COUNT] = [
        SecretCategory::Password,
        SecretCategory::KeyPassword,
        SecretCategory::SessionKey,
        SecretCategory::Key,
        SecretCategory::Cert,
        SecretCategory::SignWith,
        SecretCategory::VerifyWith,
        SecretCategory::Signature,
    ];

    pub fn env_name(self) -> &'static str {
        match self {
            SecretCategory::Password => "PASSWORD",
            SecretCategory::KeyPassword => "KEY_PASSWORD",
            SecretCategory::SessionKey => "SESSION_KEY",
            SecretCategory::Key => "KEY",
            SecretCategory::Cert => "CERT",
            SecretCategory::SignWith => "SIGN_WITH",
            SecretCategory::VerifyWith => "VERIFY_WITH",
            SecretCategory::Signature => "SIGNATURE",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// One environment variable carrying a secret into the child.
pub struct SecretBinding {
    name: String,
    value: Secret<Vec<u8>>,
}

impl SecretBinding {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The `@ENV:` token that refers to this binding.
    pub fn reference(&self) -> String {
        format!("{}{}", ENV_PREFIX, self.name)
    }

    pub(crate) fn apply(&self, cmd: &mut tokio::process::Command) {
        #[cfg(unix)]
        {
            use std::ffi::OsStr;
            use std::os::unix::ffi::OsStrExt;
            cmd.env(&self.name, OsStr::from_bytes(self.value.expose_secret()));
        }
        #[cfg(not(unix))]
        {
            cmd.env(&self.name, String::from_utf8_lossy(self.value.expose_secret()).as_ref());
        }
    }

    #[cfg(test)]
    pub(crate) fn value(&self) -> &[u8] {
        self.value.expose_secret()
    }
}

impl fmt::Debug for SecretBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretBinding")
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// Hands out collision-free binding names, one counter per category.
#[derive(Debug, Default)]
pub struct SecretAllocator {
    counters: [usize; CATEGORY_COUNT],
    bindings: Vec<SecretBinding>,
}

impl SecretAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under the next free name of `category` and return the
    /// `@ENV:` reference to put on the command line.
    pub fn bind(&mut self, category: SecretCategory, value: impl Into<Vec<u8>>) -> String {
        let counter = &mut self.counters[category.index()];
        let name = format!("{}_{}", category.env_name(), counter);
        *counter += 1;

        let binding = SecretBinding {
            name,
            value: Secret::new(value.into()),
        };
        let reference = binding.reference();
        self.bindings.push(binding);
        reference
    }

    pub fn bindings(&self) -> &[SecretBinding] {
        &self.bindings
    }

    fn into_bindings(self) -> Vec<SecretBinding> {
        self.bindings
    }
}

/// Accumulates one operation's arguments in call order.
#[derive(Debug)]
pub struct CommandBuilder {
    args: Vec<String>,
    secrets: SecretAllocator,
}

impl CommandBuilder {
    pub fn new(program: impl Into<String>, subcommand: &str) -> Self {
        Self {
            args: vec![program.into(), subcommand.to_string()],
            secrets: SecretAllocator::new(),
        }
    }

    /// Append a literal token.
    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    /// Append `--name=value`.
    pub fn option(&mut self, name: &str, value: impl fmt::Display) -> &mut Self {
        self.args.push(format!("{}={}", name, value));
        self
    }

    /// Bind a secret and append its bare reference as a positional argument.
    pub fn secret_arg(&mut self, category: SecretCategory, value: impl Into<Vec<u8>>) -> &mut Self {
        let reference = self.secrets.bind(category, value);
        self.args.push(reference);
        self
    }

    /// Bind a secret and append `--name=@ENV:<binding>`.
    pub fn secret_option(
        &mut self,
        name: &str,
        category: SecretCategory,
        value: impl Into<Vec<u8>>,
    ) -> &mut Self {
        let reference = self.secrets.bind(category, value);
        self.args.push(format!("{}={}", name, reference));
        self
    }

    /// Bind a secret without touching the argument vector, for positionals that
    /// the command grammar wants at a fixed place.
    pub fn bind(&mut self, category: SecretCategory, value: impl Into<Vec<u8>>) -> String {
        self.secrets.bind(category, value)
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn freeze(self) -> Descriptor {
        Descriptor {
            args: self.args,
            secrets: self.secrets.into_bindings(),
        }
    }
}

/// An immutable, ready to execute invocation.
#[derive(Debug)]
pub struct Descriptor {
    args: Vec<String>,
    secrets: Vec<SecretBinding>,
}

impl Descriptor {
    /// Full argument vector, starting with the executable.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn program(&self) -> &str {
        &self.args[0]
    }

    pub fn subcommand(&self) -> &str {
        &self.args[1]
    }

    /// Tokens after the executable.
    pub fn arguments(&self) -> &[String] {
        &self.args[1..]
    }

    pub fn secrets(&self) -> &[SecretBinding] {
        &self.secrets
    }

    pub fn secret_names(&self) -> Vec<&str> {
        self.secrets.iter().map(SecretBinding::name).collect()
    }

    /// Check that every binding can be carried by an environment variable.
    pub fn validate(&self) -> Result<()> {
        for binding in &self.secrets {
            if binding.value.expose_secret().contains(&0) {
                return Err(SopError::new(
                    ErrorKind::BadData,
                    format!(
                        "Secret {} contains a NUL byte and cannot be passed through the environment; \
                         pass armored data instead",
                        binding.name
                    ),
                ));
            }
        }
        Ok(())
    }
}
