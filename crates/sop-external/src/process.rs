//! Process adapter - spawn the backend and stream through it
//!
//! Input and output are pumped concurrently. Writing all input before reading
//! any output deadlocks as soon as the payload exceeds the pipe buffer.

use std::io;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

use sop_core::{map_exit_code, Result, SopError};

use crate::config::ExternalConfig;
use crate::descriptor::Descriptor;

/// Payload streamed into the backend's stdin.
pub type Payload = Box<dyn AsyncRead + Send + Unpin>;

/// How a backend invocation ended.
#[derive(Debug)]
pub struct Completed {
    pub status: ExitStatus,
    /// Captured stderr, truncated to the configured limit
    pub stderr: String,
    /// Bytes copied to the output
    pub written: u64,
}

impl Completed {
    /// Translate the exit status into the error taxonomy.
    pub fn check(self) -> Result<Completed> {
        let code = match self.status.code() {
            Some(code) => code,
            None => {
                return Err(SopError::Terminated {
                    signal: signal_of(&self.status),
                })
            }
        };
        map_exit_code(code, &self.stderr)?;
        Ok(self)
    }
}

#[cfg(unix)]
fn signal_of(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn signal_of(_status: &ExitStatus) -> Option<i32> {
    None
}

fn command_for(config: &ExternalConfig, descriptor: &Descriptor, with_input: bool) -> Command {
    let mut cmd = Command::new(descriptor.program());
    cmd.args(descriptor.arguments())
        .envs(&config.environment)
        .stdin(if with_input { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    for binding in descriptor.secrets() {
        binding.apply(&mut cmd);
    }
    if let Some(dir) = &config.working_dir {
        cmd.current_dir(dir);
    }
    cmd
}

/// Run `descriptor` to completion, copying `input` to the child's stdin and
/// its stdout into `output`. The exit status is returned uninterpreted.
pub async fn run<W>(
    config: &ExternalConfig,
    descriptor: &Descriptor,
    input: Option<Payload>,
    output: &mut W,
) -> Result<Completed>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    descriptor.validate()?;

    debug!(
        args = ?descriptor.args(),
        secrets = ?descriptor.secret_names(),
        "spawning backend"
    );

    let mut child = command_for(config, descriptor, input.is_some())
        .spawn()
        .map_err(|source| SopError::Spawn {
            binary: descriptor.program().to_string(),
            source,
        })?;

    let outcome = match config.timeout {
        Some(limit) => tokio::time::timeout(limit, drive(&mut child, input, output, config.stderr_limit))
            .await
            .unwrap_or_else(|_| Err(SopError::Timeout(limit))),
        None => drive(&mut child, input, output, config.stderr_limit).await,
    };

    match outcome {
        Ok(completed) => {
            debug!(
                subcommand = descriptor.subcommand(),
                status = ?completed.status,
                written = completed.written,
                "backend finished"
            );
            Ok(completed)
        }
        Err(e) => {
            warn!(subcommand = descriptor.subcommand(), error = %e, "aborting backend");
            if let Err(kill) = child.kill().await {
                debug!(error = %kill, "backend already gone");
            }
            Err(e)
        }
    }
}

/// [`run`] followed by [`Completed::check`].
pub async fn execute<W>(
    config: &ExternalConfig,
    descriptor: &Descriptor,
    input: Option<Payload>,
    output: &mut W,
) -> Result<Completed>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    run(config, descriptor, input, output).await?.check()
}

async fn drive<W>(child: &mut Child, input: Option<Payload>, output: &mut W, stderr_limit: usize) -> Result<Completed>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let stdin = child.stdin.take();
    let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

    let (_, written, stderr) = tokio::try_join!(
        pump_input(input, stdin),
        pump_output(stdout, output),
        collect_stderr(stderr, stderr_limit)
    )?;

    let status = child.wait().await?;
    if !stderr.is_empty() {
        debug!(stderr = %stderr.trim_end(), "backend stderr");
    }
    Ok(Completed { status, stderr, written })
}

fn missing_pipe(which: &str) -> SopError {
    SopError::Io(io::Error::new(
        io::ErrorKind::Other,
        format!("child {} was not captured", which),
    ))
}

/// Copy the payload into stdin, then close it so the child sees end-of-input.
async fn pump_input(input: Option<Payload>, stdin: Option<ChildStdin>) -> io::Result<u64> {
    let (Some(mut input), Some(mut stdin)) = (input, stdin) else {
        return Ok(0);
    };

    let copied = match tokio::io::copy(&mut input, &mut stdin).await {
        Ok(n) => n,
        // The backend may legitimately stop reading early; its exit status decides.
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            debug!("backend closed stdin before the payload was exhausted");
            return Ok(0);
        }
        Err(e) => return Err(e),
    };

    match stdin.shutdown().await {
        Err(e) if e.kind() != io::ErrorKind::BrokenPipe => return Err(e),
        _ => {}
    }
    drop(stdin);
    Ok(copied)
}

async fn pump_output<W>(mut stdout: ChildStdout, output: &mut W) -> io::Result<u64>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let written = tokio::io::copy(&mut stdout, output).await?;
    output.flush().await?;
    Ok(written)
}

/// Keep at most `limit` bytes but always drain to EOF, so a chatty backend
/// cannot block on a full stderr pipe.
async fn collect_stderr(mut stderr: ChildStderr, limit: usize) -> io::Result<String> {
    let mut kept = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stderr.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let room = limit.saturating_sub(kept.len());
        kept.extend_from_slice(&chunk[..n.min(room)]);
    }
    Ok(String::from_utf8_lossy(&kept).into_owned())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::descriptor::CommandBuilder;
    use std::io::Cursor;
    use std::time::Duration;

    fn sh(script: &str) -> Descriptor {
        let mut cmd = CommandBuilder::new("/bin/sh", "-c");
        cmd.arg(script);
        cmd.freeze()
    }

    #[tokio::test]
    async fn test_echo_round_trip() {
        let config = ExternalConfig::new("/bin/sh");
        let payload: Payload = Box::new(Cursor::new(b"hello backend".to_vec()));
        let mut out = Vec::new();

        let completed = execute(&config, &sh("cat"), Some(payload), &mut out).await.unwrap();
        assert_eq!(out, b"hello backend");
        assert_eq!(completed.written, 13);
    }

    #[tokio::test]
    async fn test_exit_code_is_mapped() {
        let config = ExternalConfig::new("/bin/sh");
        let mut out = Vec::new();

        let err = execute(&config, &sh("echo 'no such key' >&2; exit 67"), None, &mut out)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), sop_core::ErrorKind::KeyIsProtected);
        assert_eq!(err.backend_exit_code(), Some(67));
        assert!(err.to_string().contains("no such key"));
    }

    #[tokio::test]
    async fn test_stderr_is_truncated_but_drained() {
        let config = ExternalConfig::new("/bin/sh").with_stderr_limit(16);
        let mut out = Vec::new();

        let completed = run(
            &config,
            &sh("i=0; while [ $i -lt 2000 ]; do echo 'noise noise noise' >&2; i=$((i+1)); done; echo done"),
            None,
            &mut out,
        )
        .await
        .unwrap();
        assert_eq!(completed.stderr.len(), 16);
        assert_eq!(out, b"done\n");
    }

    #[tokio::test]
    async fn test_signal_is_terminated() {
        let config = ExternalConfig::new("/bin/sh");
        let mut out = Vec::new();

        let err = execute(&config, &sh("kill -9 $$"), None, &mut out).await.unwrap_err();
        assert!(matches!(err, SopError::Terminated { signal: Some(9) }));
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let config = ExternalConfig::new("/bin/sh").with_timeout(Duration::from_millis(200));
        let mut out = Vec::new();

        let err = run(&config, &sh("sleep 30"), None, &mut out).await.unwrap_err();
        assert!(matches!(err, SopError::Timeout(_)));
        assert!(err.is_transport());
    }
}
