//! Drives the `sop` binary against a shell-script backend. The binary runs
//! inside the script directory, so relative designators and the backend's
//! "subcommand" scripts both resolve there.

#![cfg(unix)]

use std::fs;
use std::io::Write;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

const SESSION_KEY: &str = "9:FCA4BEAF687F48059CACC14FB019125CD57392BAB7037C707835925CBF9F7BCD";
const KEY_FPR: &str = "F9E6F53F7201C60A87064EAB0B27F2B0760A1209";
const CERT_FPR: &str = "4E2C78519512C2AE9A8BFE7EB3298EB2FBE5F51B";

const WRITE_SIDE_CHANNEL: &str = r#"
side() {
    opt="$1"; shift
    value="$1"; shift
    for arg in "$@"; do
        case "$arg" in
            "$opt"=*) printf '%s\n' "$value" > "${arg#"$opt"=}" ;;
        esac
    done
}
"#;

struct Fixture {
    dir: TempDir,
    scratch: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            scratch: tempfile::tempdir().unwrap(),
        }
    }

    fn script(&self, subcommand: &str, body: &str) -> &Self {
        fs::write(self.dir.path().join(subcommand), format!("{}\n{}", WRITE_SIDE_CHANNEL, body)).unwrap();
        self
    }

    fn file(&self, name: &str, content: &str) -> &Self {
        fs::write(self.dir.path().join(name), content).unwrap();
        self
    }

    fn read(&self, name: &str) -> String {
        fs::read_to_string(self.dir.path().join(name)).unwrap()
    }

    fn exists(&self, name: &str) -> bool {
        self.dir.path().join(name).exists()
    }

    fn sop(&self, args: &[&str], env: &[(&str, &str)], stdin: &[u8]) -> Output {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_sop"));
        cmd.current_dir(self.dir.path())
            .arg("--backend")
            .arg("/bin/sh")
            .arg("--temp-dir")
            .arg(self.scratch.path())
            .args(args)
            .env_remove("RUST_LOG")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().unwrap();
        let mut input = child.stdin.take().unwrap();
        // the backend may exit without reading
        let _ = input.write_all(stdin);
        drop(input);
        child.wait_with_output().unwrap()
    }
}

fn code(output: &Output) -> i32 {
    output.status.code().unwrap()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_encrypt_with_env_password_and_session_key_out() {
    let fx = Fixture::new();
    fx.script(
        "encrypt",
        &format!(
            r#"
[ "$PASSWORD_0" = "hunter2" ] || exit 61
side --session-key-out "{}" "$@"
cat
"#,
            SESSION_KEY
        ),
    );

    let out = fx.sop(
        &["encrypt", "--with-password", "@ENV:SOP_TEST_PASS", "--session-key-out", "sk.txt"],
        &[("SOP_TEST_PASS", "hunter2")],
        b"attack at dawn",
    );

    assert_eq!(code(&out), 0, "{}", stderr(&out));
    assert_eq!(out.stdout, b"attack at dawn");
    assert_eq!(fx.read("sk.txt"), format!("{}\n", SESSION_KEY));
}

#[test]
fn test_existing_side_output_is_rejected_before_spawning() {
    let fx = Fixture::new();
    fx.script("encrypt", "touch spawned\ncat").file("sk.txt", "old");

    let out = fx.sop(
        &["encrypt", "--with-password", "pass.txt", "--session-key-out", "sk.txt"],
        &[],
        b"x",
    );

    assert_eq!(code(&out), 59);
    assert!(!fx.exists("spawned"));
    assert_eq!(fx.read("sk.txt"), "old");
}

#[test]
fn test_missing_password_source() {
    let fx = Fixture::new();
    fx.script("encrypt", "cat");

    let out = fx.sop(&["encrypt", "--with-password", "@ENV:SOP_TEST_UNSET_VAR"], &[], b"x");
    assert_eq!(code(&out), 61);
    assert!(stderr(&out).contains("SOP_TEST_UNSET_VAR"));

    let out = fx.sop(&["encrypt", "--with-password", "no-such-file"], &[], b"x");
    assert_eq!(code(&out), 61);
}

#[test]
fn test_backend_exit_code_is_propagated() {
    let fx = Fixture::new();
    fx.script("sign", "echo 'key is locked' >&2\nexit 67");
    fx.file("key.asc", "SECRET KEY");

    let out = fx.sop(&["sign", "key.asc"], &[], b"data");
    assert_eq!(code(&out), 67);
    assert!(out.stdout.is_empty());
    assert!(stderr(&out).contains("key is locked"));
    assert!(fs::read_dir(fx.scratch.path()).unwrap().next().is_none());
}

#[test]
fn test_unknown_backend_code_exits_one() {
    let fx = Fixture::new();
    fx.script("dearmor", "exit 42");

    let out = fx.sop(&["dearmor"], &[], b"");
    assert_eq!(code(&out), 1);
    assert!(stderr(&out).contains("42"));
}

#[test]
fn test_decrypt_requires_verify_with_for_verifications_out() {
    let fx = Fixture::new();
    fx.script("decrypt", "touch spawned\ncat");
    fx.file("key.asc", "SECRET KEY");

    let out = fx.sop(&["decrypt", "--verifications-out", "ver.txt", "key.asc"], &[], b"x");
    assert_eq!(code(&out), 23);
    assert!(!fx.exists("spawned"));
}

#[test]
fn test_decrypt_writes_side_outputs() {
    let fx = Fixture::new();
    fx.script(
        "decrypt",
        &format!(
            r#"
side --session-key-out "{sk}" "$@"
side --verify-out "2023-04-01T12:00:00Z {k} {c} mode:text" "$@"
cat
"#,
            sk = SESSION_KEY,
            k = KEY_FPR,
            c = CERT_FPR
        ),
    );
    fx.file("key.asc", "SECRET KEY").file("cert.asc", "CERT");

    let out = fx.sop(
        &[
            "decrypt",
            "--session-key-out",
            "sk.txt",
            "--verify-out",
            "ver.txt",
            "--verify-with",
            "cert.asc",
            "key.asc",
        ],
        &[],
        b"plain",
    );

    assert_eq!(code(&out), 0, "{}", stderr(&out));
    assert_eq!(out.stdout, b"plain");
    assert_eq!(fx.read("sk.txt").trim(), SESSION_KEY);
    assert_eq!(
        fx.read("ver.txt"),
        format!("2023-04-01T12:00:00Z {} {} mode:text\n", KEY_FPR, CERT_FPR)
    );
}

#[test]
fn test_env_designator_cannot_be_an_output() {
    let fx = Fixture::new();
    fx.script("inline-detach", "cat");

    let out = fx.sop(&["inline-detach", "--signatures-out", "@ENV:SIGS"], &[], b"x");
    assert_eq!(code(&out), 71);
}

#[test]
fn test_verify_prints_verifications() {
    let fx = Fixture::new();
    fx.script(
        "verify",
        &format!(
            r#"
[ "$1" = "@ENV:SIGNATURE_0" ] || exit 19
[ "$2" = "@ENV:CERT_0" ] || exit 19
[ "$SIGNATURE_0" = "SIG" ] || exit 41
cat > /dev/null
echo "2022-11-07T15:01:24Z {} {} mode:binary"
"#,
            KEY_FPR, CERT_FPR
        ),
    );
    fx.file("sig.asc", "SIG").file("cert.asc", "CERT");

    let out = fx.sop(&["verify", "sig.asc", "cert.asc"], &[], b"data");
    assert_eq!(code(&out), 0, "{}", stderr(&out));
    assert_eq!(
        String::from_utf8(out.stdout).unwrap(),
        format!("2022-11-07T15:01:24Z {} {} mode:binary\n", KEY_FPR, CERT_FPR)
    );
}

#[test]
fn test_validate_userid_mismatch() {
    let fx = Fixture::new();
    fx.script("validate-userid", "cat > /dev/null\nexit 107");
    fx.file("ca.asc", "CERT");

    let out = fx.sop(&["validate-userid", "Alice <alice@example.org>", "ca.asc"], &[], b"certs");
    assert_eq!(code(&out), 107);
}

#[test]
fn test_usage_errors() {
    let fx = Fixture::new();
    assert_eq!(code(&fx.sop(&["frobnicate"], &[], b"")), 69);
    assert_eq!(code(&fx.sop(&["armor", "--bogus"], &[], b"")), 37);
    assert_eq!(code(&fx.sop(&["sign"], &[], b"")), 19);
    assert_eq!(code(&fx.sop(&["encrypt"], &[], b"")), 19);
}

#[test]
fn test_missing_backend() {
    let fx = Fixture::new();
    let out = Command::new(env!("CARGO_BIN_EXE_sop"))
        .current_dir(fx.dir.path())
        .args(["--backend", "/nonexistent/sop-backend", "dearmor"])
        .stdin(Stdio::null())
        .output()
        .unwrap();

    assert_eq!(code(&out), 1);
    assert!(stderr(&out).contains("/nonexistent/sop-backend"));
}
