//! Indirect I/O - `@ENV:NAME`, `@FD:N` and plain paths
//!
//! A token that looks like a special designator but also names an existing
//! file is rejected as ambiguous, so a crafted file name can never shadow an
//! intended reference.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

use sop_core::{ErrorKind, Result, SopError};

pub const ENV_PREFIX: &str = "@ENV:";
pub const FD_PREFIX: &str = "@FD:";

/// A parsed designator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Env(String),
    Fd(u16),
    Path(PathBuf),
}

impl Locator {
    /// Surrounding whitespace is ignored. `@FD:` must be followed by 1-3
    /// digits; anything else is a literal path.
    pub fn parse(token: &str) -> Result<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Err(SopError::new(ErrorKind::MissingArg, "Indirect data designator cannot be blank."));
        }

        if let Some(name) = token.strip_prefix(ENV_PREFIX) {
            return Ok(Locator::Env(name.to_string()));
        }
        if let Some(digits) = token.strip_prefix(FD_PREFIX) {
            if (1..=3).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(fd) = digits.parse() {
                    return Ok(Locator::Fd(fd));
                }
            }
        }
        Ok(Locator::Path(PathBuf::from(token)))
    }

    fn is_special(&self) -> bool {
        !matches!(self, Locator::Path(_))
    }
}

/// Lookup of environment variables, swappable for tests.
pub trait EnvSource {
    fn var(&self, name: &str) -> Option<OsString>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<OsString> {
        std::env::var_os(name)
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<OsString> {
        self.get(name).map(OsString::from)
    }
}

/// Turns designators into streams.
#[derive(Debug, Clone)]
pub struct Resolver<E = ProcessEnv> {
    base: PathBuf,
    env: E,
    fd_dir: PathBuf,
}

impl Resolver<ProcessEnv> {
    /// Relative paths resolve against the current directory.
    pub fn from_process() -> io::Result<Self> {
        Ok(Self::new(std::env::current_dir()?, ProcessEnv))
    }
}

impl<E: EnvSource> Resolver<E> {
    pub fn new(base: impl Into<PathBuf>, env: E) -> Self {
        Self {
            base: base.into(),
            env,
            fd_dir: PathBuf::from("/dev/fd"),
        }
    }

    /// Directory exposing open descriptors as files.
    #[cfg(test)]
    pub fn with_fd_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fd_dir = dir.into();
        self
    }

    fn literal(&self, token: &str) -> PathBuf {
        self.base.join(token.trim())
    }

    fn reject_ambiguous(&self, token: &str) -> Result<()> {
        let literal = self.literal(token);
        if literal.symlink_metadata().is_ok() {
            return Err(SopError::new(
                ErrorKind::AmbiguousInput,
                format!(
                    "'{}' is both a special designator and an existing file: {}",
                    token.trim(),
                    literal.display()
                ),
            ));
        }
        Ok(())
    }

    fn fd_path(&self, fd: u16) -> Result<PathBuf> {
        if !self.fd_dir.is_dir() {
            return Err(SopError::new(
                ErrorKind::UnsupportedSpecialPrefix,
                format!("File descriptor designators are not supported: {} is unavailable", self.fd_dir.display()),
            ));
        }
        Ok(self.fd_dir.join(fd.to_string()))
    }

    /// Open `token` for reading.
    pub fn resolve_input(&self, token: &str) -> Result<Box<dyn Read + Send>> {
        let locator = Locator::parse(token)?;
        if locator.is_special() {
            self.reject_ambiguous(token)?;
        }

        match locator {
            Locator::Env(name) => {
                let value = self.env.var(&name).ok_or_else(|| {
                    SopError::new(ErrorKind::MissingInput, format!("Environment variable '{}' not set.", name))
                })?;
                let bytes = os_bytes(value);
                if bytes.iter().all(u8::is_ascii_whitespace) {
                    return Err(SopError::new(
                        ErrorKind::MissingInput,
                        format!("Environment variable '{}' is empty.", name),
                    ));
                }
                Ok(Box::new(io::Cursor::new(bytes)))
            }
            Locator::Fd(fd) => {
                let path = self.fd_path(fd)?;
                let file = File::open(&path).map_err(|e| {
                    SopError::with_source(
                        ErrorKind::MissingInput,
                        format!("File descriptor {} is not open for reading", fd),
                        e,
                    )
                })?;
                Ok(Box::new(file))
            }
            Locator::Path(path) => {
                let path = self.base.join(path);
                let meta = path.metadata().map_err(|e| {
                    SopError::with_source(
                        ErrorKind::MissingInput,
                        format!("Input file {} does not exist.", path.display()),
                        e,
                    )
                })?;
                if !meta.is_file() {
                    return Err(SopError::new(
                        ErrorKind::MissingInput,
                        format!("Input {} is not a file.", path.display()),
                    ));
                }
                Ok(Box::new(File::open(&path)?))
            }
        }
    }

    /// Read all of `token` into wiped-on-drop memory.
    pub fn read_input(&self, token: &str) -> Result<Zeroizing<Vec<u8>>> {
        let mut reader = self.resolve_input(token)?;
        let mut data = Zeroizing::new(Vec::new());
        reader.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Fail early if `token` could not be opened as an output later.
    /// Nothing is created.
    pub fn check_output(&self, token: &str) -> Result<()> {
        match Locator::parse(token)? {
            Locator::Env(_) => Err(env_output_error()),
            Locator::Fd(fd) => {
                self.reject_ambiguous(token)?;
                self.fd_path(fd).map(|_| ())
            }
            Locator::Path(path) => {
                let path = self.base.join(path);
                if path.symlink_metadata().is_ok() {
                    return Err(output_exists(&path));
                }
                Ok(())
            }
        }
    }

    /// Open `token` for writing. Plain paths must not exist yet.
    pub fn resolve_output(&self, token: &str) -> Result<File> {
        match Locator::parse(token)? {
            Locator::Env(_) => Err(env_output_error()),
            Locator::Fd(fd) => {
                self.reject_ambiguous(token)?;
                let path = self.fd_path(fd)?;
                OpenOptions::new().write(true).open(&path).map_err(|e| {
                    SopError::with_source(
                        ErrorKind::Generic,
                        format!("File descriptor {} is not open for writing", fd),
                        e,
                    )
                })
            }
            Locator::Path(path) => {
                let path = self.base.join(path);
                if path.symlink_metadata().is_ok() {
                    return Err(output_exists(&path));
                }
                OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(&path)
                    .map_err(|e| match e.kind() {
                        io::ErrorKind::AlreadyExists => output_exists(&path),
                        _ => SopError::with_source(
                            ErrorKind::Generic,
                            format!("Output file {} cannot be created.", path.display()),
                            e,
                        ),
                    })
            }
        }
    }
}

fn env_output_error() -> SopError {
    SopError::new(
        ErrorKind::UnsupportedSpecialPrefix,
        "Special designator @ENV cannot be used for output.",
    )
}

fn output_exists(path: &Path) -> SopError {
    SopError::new(
        ErrorKind::OutputExists,
        format!("Output file {} already exists.", path.display()),
    )
}

#[cfg(unix)]
fn os_bytes(value: OsString) -> Vec<u8> {
    use std::os::unix::ffi::OsStringExt;
    value.into_vec()
}

#[cfg(not(unix))]
fn os_bytes(value: OsString) -> Vec<u8> {
    value.to_string_lossy().into_owned().into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn resolver(vars: &[(&str, &str)]) -> (TempDir, Resolver<HashMap<String, String>>) {
        let dir = tempfile::tempdir().unwrap();
        let env = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        let resolver = Resolver::new(dir.path(), env);
        (dir, resolver)
    }

    fn read_all(mut reader: Box<dyn Read + Send>) -> Vec<u8> {
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_parse_grammar() {
        assert_eq!(Locator::parse(" @ENV:FOO ").unwrap(), Locator::Env("FOO".into()));
        assert_eq!(Locator::parse("@FD:3").unwrap(), Locator::Fd(3));
        assert_eq!(Locator::parse("@FD:999").unwrap(), Locator::Fd(999));
        assert_eq!(Locator::parse("@FD:1000").unwrap(), Locator::Path("@FD:1000".into()));
        assert_eq!(Locator::parse("@FD:x").unwrap(), Locator::Path("@FD:x".into()));
        assert_eq!(Locator::parse("key.pgp").unwrap(), Locator::Path("key.pgp".into()));
        assert_eq!(Locator::parse("   ").unwrap_err().kind(), ErrorKind::MissingArg);
    }

    #[test]
    fn test_input_from_env() {
        let (_dir, resolver) = resolver(&[("FOO", "BAR")]);
        assert_eq!(read_all(resolver.resolve_input("@ENV:FOO").unwrap()), b"BAR");
    }

    #[test]
    fn test_env_unset_or_blank() {
        let (_dir, resolver) = resolver(&[("IS_EMPTY", ""), ("IS_BLANK", " \n\t")]);
        for token in ["@ENV:IS_NOT_SET", "@ENV:IS_EMPTY", "@ENV:IS_BLANK"] {
            let err = resolver.read_input(token).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MissingInput, "{}", token);
        }
    }

    #[test]
    fn test_env_clashes_with_existing_file() {
        let (dir, resolver) = resolver(&[("existing.file", "foo_bar")]);
        File::create(dir.path().join("@ENV:existing.file")).unwrap();

        let err = resolver.read_input("@ENV:existing.file").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AmbiguousInput);
    }

    #[test]
    fn test_fd_clashes_with_existing_file() {
        let (dir, resolver) = resolver(&[]);
        File::create(dir.path().join("@FD:7")).unwrap();

        assert_eq!(resolver.read_input("@FD:7").unwrap_err().kind(), ErrorKind::AmbiguousInput);
        assert_eq!(resolver.resolve_output("@FD:7").unwrap_err().kind(), ErrorKind::AmbiguousInput);
        assert_eq!(resolver.check_output("@FD:7").unwrap_err().kind(), ErrorKind::AmbiguousInput);
    }

    #[test]
    fn test_missing_and_directory_inputs() {
        let (dir, resolver) = resolver(&[]);
        assert_eq!(resolver.read_input("missing.file").unwrap_err().kind(), ErrorKind::MissingInput);

        std::fs::create_dir(dir.path().join("subdir")).unwrap();
        assert_eq!(resolver.read_input("subdir").unwrap_err().kind(), ErrorKind::MissingInput);
    }

    #[test]
    fn test_input_from_file() {
        let (dir, resolver) = resolver(&[]);
        std::fs::write(dir.path().join("cert.asc"), b"CERT").unwrap();
        assert_eq!(resolver.read_input("cert.asc").unwrap().as_slice(), b"CERT");
    }

    #[test]
    fn test_env_output_always_rejected() {
        let (dir, resolver) = resolver(&[("IS_SET", "x")]);
        File::create(dir.path().join("@ENV:IS_SET")).unwrap();

        for token in ["@ENV:IS_ILLEGAL", "@ENV:IS_SET"] {
            assert_eq!(
                resolver.resolve_output(token).unwrap_err().kind(),
                ErrorKind::UnsupportedSpecialPrefix
            );
            assert_eq!(
                resolver.check_output(token).unwrap_err().kind(),
                ErrorKind::UnsupportedSpecialPrefix
            );
        }
    }

    #[test]
    fn test_output_must_not_exist() {
        let (dir, resolver) = resolver(&[]);
        std::fs::write(dir.path().join("taken"), b"old").unwrap();

        assert_eq!(resolver.check_output("taken").unwrap_err().kind(), ErrorKind::OutputExists);
        assert_eq!(resolver.resolve_output("taken").unwrap_err().kind(), ErrorKind::OutputExists);
        assert_eq!(std::fs::read(dir.path().join("taken")).unwrap(), b"old");

        resolver.check_output("fresh").unwrap();
        assert!(!dir.path().join("fresh").exists());
        let mut file = resolver.resolve_output("fresh").unwrap();
        file.write_all(b"new").unwrap();
        assert_eq!(std::fs::read(dir.path().join("fresh")).unwrap(), b"new");
    }

    #[test]
    fn test_fd_without_descriptor_directory() {
        let (dir, resolver) = resolver(&[]);
        let resolver = resolver.with_fd_dir(dir.path().join("no-such-dir"));
        assert_eq!(
            resolver.read_input("@FD:0").unwrap_err().kind(),
            ErrorKind::UnsupportedSpecialPrefix
        );
        assert_eq!(
            resolver.resolve_output("@FD:1").unwrap_err().kind(),
            ErrorKind::UnsupportedSpecialPrefix
        );
    }

    #[test]
    fn test_fd_directory_lookup() {
        let (dir, resolver) = resolver(&[]);
        let fds = dir.path().join("fds");
        std::fs::create_dir(&fds).unwrap();
        std::fs::write(fds.join("5"), b"from fd five").unwrap();
        let resolver = resolver.with_fd_dir(&fds);

        assert_eq!(resolver.read_input("@FD:5").unwrap().as_slice(), b"from fd five");
        assert_eq!(resolver.read_input("@FD:6").unwrap_err().kind(), ErrorKind::MissingInput);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_real_descriptor() {
        use std::os::unix::io::AsRawFd;

        let (dir, resolver) = resolver(&[]);
        let path = dir.path().join("payload");
        std::fs::write(&path, b"through /dev/fd").unwrap();
        let file = File::open(&path).unwrap();
        let fd = file.as_raw_fd();
        if fd > 999 {
            return;
        }

        let data = resolver.read_input(&format!("@FD:{}", fd)).unwrap();
        assert_eq!(data.as_slice(), b"through /dev/fd");
    }
}
