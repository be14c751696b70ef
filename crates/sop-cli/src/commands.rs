//! Subcommand grammar and the glue between designators, the backend and stdio

use std::io::Write;

use anyhow::{Context, Result};
use clap::Subcommand;
use sop_core::{
    ArmorLabel, EncryptAs, EncryptFor, ErrorKind, InlineSignAs, SessionKey, SignAs, SopError, TimeBound, Verification,
};
use sop_external::ExternalSop;
use tokio::io::{self, AsyncWriteExt};
use zeroize::Zeroizing;

use crate::indirect::{EnvSource, Resolver};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Display version information about the backend
    Version {
        /// Print the name and version of the cryptographic library
        #[arg(long, conflicts_with_all = ["extended", "sop_spec", "sopv"])]
        backend: bool,
        /// Print an extended version string
        #[arg(long, conflicts_with_all = ["sop_spec", "sopv"])]
        extended: bool,
        /// Print the implemented revision of the SOP specification
        #[arg(long = "sop-spec", conflicts_with = "sopv")]
        sop_spec: bool,
        /// Print the implemented version of the sopv subset
        #[arg(long)]
        sopv: bool,
    },

    /// List profiles supported by a subcommand
    ListProfiles {
        /// Subcommand to list profiles of (generate-key, encrypt)
        subcommand: String,
    },

    /// Generate a secret key
    GenerateKey {
        #[arg(long)]
        no_armor: bool,
        /// Password protecting the new key
        #[arg(long, value_name = "PASSWORD")]
        with_key_password: Option<String>,
        #[arg(long, value_name = "PROFILE")]
        profile: Option<String>,
        /// Generate a key that cannot encrypt
        #[arg(long)]
        signing_only: bool,
        #[arg(value_name = "USERID")]
        user_ids: Vec<String>,
    },

    /// Update the password of a key read from stdin
    ChangeKeyPassword {
        #[arg(long)]
        no_armor: bool,
        #[arg(long, value_name = "PASSWORD")]
        new_key_password: Option<String>,
        #[arg(long, value_name = "PASSWORD")]
        old_key_password: Vec<String>,
    },

    /// Generate revocation certificates for keys read from stdin
    RevokeKey {
        #[arg(long)]
        no_armor: bool,
        #[arg(long, value_name = "PASSWORD")]
        with_key_password: Vec<String>,
    },

    /// Extract a certificate from a key read from stdin
    ExtractCert {
        #[arg(long)]
        no_armor: bool,
    },

    /// Keep a key read from stdin up to date
    UpdateKey {
        #[arg(long)]
        no_armor: bool,
        #[arg(long)]
        signing_only: bool,
        #[arg(long)]
        no_added_capabilities: bool,
        #[arg(long, value_name = "PASSWORD")]
        with_key_password: Vec<String>,
        /// Certificates whose updates are merged into the key
        #[arg(long, value_name = "CERTS", num_args = 1..)]
        merge_certs: Vec<String>,
    },

    /// Merge certificate updates into certificates read from stdin
    MergeCerts {
        #[arg(long)]
        no_armor: bool,
        #[arg(value_name = "CERTS", required = true)]
        certs: Vec<String>,
    },

    /// Certify user IDs on certificates read from stdin
    CertifyUserid {
        #[arg(long)]
        no_armor: bool,
        #[arg(long = "userid", value_name = "USERID", required = true)]
        user_ids: Vec<String>,
        #[arg(long, value_name = "PASSWORD")]
        with_key_password: Vec<String>,
        /// Certify user IDs without a self-signature
        #[arg(long)]
        no_require_self_sig: bool,
        #[arg(value_name = "KEYS", required = true)]
        keys: Vec<String>,
    },

    /// Check that certificates read from stdin carry a certified user ID
    ValidateUserid {
        /// Only match the email address part of the user ID
        #[arg(long)]
        addr_spec_only: bool,
        #[arg(long, value_name = "DATE")]
        validate_at: Option<TimeBound>,
        #[arg(value_name = "USERID")]
        user_id: String,
        #[arg(value_name = "CERTS", required = true)]
        authorities: Vec<String>,
    },

    /// Create a detached signature over stdin
    Sign {
        #[arg(long)]
        no_armor: bool,
        #[arg(long = "as", value_name = "MODE")]
        mode: Option<SignAs>,
        #[arg(long, value_name = "PASSWORD")]
        with_key_password: Vec<String>,
        /// Where to write the digest algorithm name
        #[arg(long, value_name = "MICALG")]
        micalg_out: Option<String>,
        #[arg(value_name = "KEYS", required = true)]
        keys: Vec<String>,
    },

    /// Verify a detached signature over stdin
    Verify {
        #[arg(long, value_name = "DATE")]
        not_before: Option<TimeBound>,
        #[arg(long, value_name = "DATE")]
        not_after: Option<TimeBound>,
        #[arg(value_name = "SIGNATURE")]
        signature: String,
        #[arg(value_name = "CERTS", required = true)]
        certs: Vec<String>,
    },

    /// Encrypt a message read from stdin
    Encrypt {
        #[arg(long)]
        no_armor: bool,
        #[arg(long = "as", value_name = "MODE")]
        mode: Option<EncryptAs>,
        #[arg(long = "for", value_name = "PURPOSE")]
        purpose: Option<EncryptFor>,
        #[arg(long, value_name = "PASSWORD")]
        with_password: Vec<String>,
        #[arg(long, value_name = "KEY")]
        sign_with: Vec<String>,
        #[arg(long, value_name = "PASSWORD")]
        with_key_password: Vec<String>,
        #[arg(long, value_name = "SESSIONKEY")]
        session_key_out: Option<String>,
        #[arg(long, value_name = "PROFILE")]
        profile: Option<String>,
        #[arg(value_name = "CERTS")]
        certs: Vec<String>,
    },

    /// Decrypt a message read from stdin
    Decrypt {
        #[arg(long, value_name = "SESSIONKEY")]
        session_key_out: Option<String>,
        #[arg(long, value_name = "SESSIONKEY")]
        with_session_key: Vec<String>,
        #[arg(long, value_name = "PASSWORD")]
        with_password: Vec<String>,
        #[arg(long, alias = "verify-out", value_name = "VERIFICATIONS")]
        verifications_out: Option<String>,
        #[arg(long, value_name = "CERT")]
        verify_with: Vec<String>,
        #[arg(long, value_name = "DATE")]
        verify_not_before: Option<TimeBound>,
        #[arg(long, value_name = "DATE")]
        verify_not_after: Option<TimeBound>,
        #[arg(long, value_name = "PASSWORD")]
        with_key_password: Vec<String>,
        #[arg(value_name = "KEY")]
        keys: Vec<String>,
    },

    /// Split an inline-signed message into message and signatures
    InlineDetach {
        #[arg(long)]
        no_armor: bool,
        #[arg(long, value_name = "SIGNATURES", required = true)]
        signatures_out: String,
    },

    /// Create an inline-signed message from stdin
    InlineSign {
        #[arg(long)]
        no_armor: bool,
        #[arg(long = "as", value_name = "MODE")]
        mode: Option<InlineSignAs>,
        #[arg(long, value_name = "PASSWORD")]
        with_key_password: Vec<String>,
        #[arg(value_name = "KEYS", required = true)]
        keys: Vec<String>,
    },

    /// Verify an inline-signed message and emit its body
    InlineVerify {
        #[arg(long, value_name = "DATE")]
        not_before: Option<TimeBound>,
        #[arg(long, value_name = "DATE")]
        not_after: Option<TimeBound>,
        #[arg(long, value_name = "VERIFICATIONS")]
        verifications_out: Option<String>,
        #[arg(value_name = "CERTS", required = true)]
        certs: Vec<String>,
    },

    /// Add ASCII armor to stdin
    Armor {
        #[arg(long, value_name = "LABEL")]
        label: Option<ArmorLabel>,
    },

    /// Remove ASCII armor from stdin
    Dearmor,
}

/// Read each designator in `tokens` fully.
fn read_all<E: EnvSource>(resolver: &Resolver<E>, tokens: &[String], what: &str) -> Result<Vec<Zeroizing<Vec<u8>>>> {
    tokens
        .iter()
        .map(|token| {
            resolver
                .read_input(token)
                .with_context(|| format!("Cannot read {} '{}'", what, token.trim()))
        })
        .collect()
}

fn read_session_key<E: EnvSource>(resolver: &Resolver<E>, token: &str) -> Result<SessionKey> {
    let raw = resolver
        .read_input(token)
        .with_context(|| format!("Cannot read session key '{}'", token.trim()))?;
    let text = std::str::from_utf8(&raw)
        .map_err(|e| SopError::with_source(ErrorKind::BadData, "Session key is not valid UTF-8.", e))?;
    Ok(text.parse()?)
}

fn write_side_output<E: EnvSource>(resolver: &Resolver<E>, token: &str, data: &[u8]) -> Result<()> {
    let mut file = resolver.resolve_output(token)?;
    file.write_all(data)
        .and_then(|_| file.flush())
        .with_context(|| format!("Cannot write to '{}'", token.trim()))
}

fn verification_lines(verifications: &[Verification]) -> String {
    verifications.iter().map(|v| format!("{}\n", v)).collect()
}

fn print_verifications(verifications: &[Verification]) -> Result<()> {
    if verifications.is_empty() {
        return Err(SopError::new(ErrorKind::NoSignature, "No verifiable signature found.").into());
    }
    print!("{}", verification_lines(verifications));
    Ok(())
}

/// Run `command` against `sop`. Payloads stream from stdin, primary output
/// streams to stdout.
pub async fn execute<E: EnvSource>(command: Command, sop: &ExternalSop, resolver: &Resolver<E>) -> Result<()> {
    let mut stdout = io::stdout();

    match command {
        Command::Version {
            backend,
            extended,
            sop_spec,
            sopv,
        } => {
            let version = sop.version();
            let text = if backend {
                version.backend_version().await?
            } else if extended {
                version.extended_version().await?
            } else if sop_spec {
                version.sop_spec_version().await?
            } else if sopv {
                version.sopv_version().await?
            } else {
                format!("{} {}", version.name().await?, version.version().await?)
            };
            println!("{}", text);
        }

        Command::ListProfiles { subcommand } => {
            for profile in sop.list_profiles().subcommand(&subcommand).await? {
                println!("{}", profile);
            }
        }

        Command::GenerateKey {
            no_armor,
            with_key_password,
            profile,
            signing_only,
            user_ids,
        } => {
            let mut op = sop.generate_key();
            if no_armor {
                op = op.no_armor();
            }
            if let Some(profile) = &profile {
                op = op.profile(profile);
            }
            if signing_only {
                op = op.signing_only();
            }
            if let Some(token) = &with_key_password {
                let password = resolver
                    .read_input(token)
                    .with_context(|| format!("Cannot read key password '{}'", token.trim()))?;
                op = op.with_key_password(password.to_vec());
            }
            for user_id in user_ids {
                op = op.user_id(user_id);
            }
            op.generate().write_to(&mut stdout).await?;
        }

        Command::ChangeKeyPassword {
            no_armor,
            new_key_password,
            old_key_password,
        } => {
            let mut op = sop.change_key_password();
            if no_armor {
                op = op.no_armor();
            }
            for password in read_all(resolver, &old_key_password, "old key password")? {
                op = op.old_key_password(password.to_vec());
            }
            if let Some(token) = &new_key_password {
                let password = resolver
                    .read_input(token)
                    .with_context(|| format!("Cannot read new key password '{}'", token.trim()))?;
                op = op.new_key_password(password.to_vec());
            }
            op.keys(io::stdin()).write_to(&mut stdout).await?;
        }

        Command::RevokeKey {
            no_armor,
            with_key_password,
        } => {
            let mut op = sop.revoke_key();
            if no_armor {
                op = op.no_armor();
            }
            for password in read_all(resolver, &with_key_password, "key password")? {
                op = op.with_key_password(password.to_vec());
            }
            op.keys(io::stdin()).write_to(&mut stdout).await?;
        }

        Command::ExtractCert { no_armor } => {
            let mut op = sop.extract_cert();
            if no_armor {
                op = op.no_armor();
            }
            op.key(io::stdin()).write_to(&mut stdout).await?;
        }

        Command::UpdateKey {
            no_armor,
            signing_only,
            no_added_capabilities,
            with_key_password,
            merge_certs,
        } => {
            let mut op = sop.update_key();
            if no_armor {
                op = op.no_armor();
            }
            if signing_only {
                op = op.signing_only();
            }
            if no_added_capabilities {
                op = op.no_new_mechanisms();
            }
            for password in read_all(resolver, &with_key_password, "key password")? {
                op = op.with_key_password(password.to_vec());
            }
            for certs in read_all(resolver, &merge_certs, "certificates")? {
                op = op.merge_certs(certs.to_vec());
            }
            op.key(io::stdin()).write_to(&mut stdout).await?;
        }

        Command::MergeCerts { no_armor, certs } => {
            let mut op = sop.merge_certs();
            if no_armor {
                op = op.no_armor();
            }
            for update in read_all(resolver, &certs, "certificates")? {
                op = op.updates(update.to_vec());
            }
            op.base_certs(io::stdin()).write_to(&mut stdout).await?;
        }

        Command::CertifyUserid {
            no_armor,
            user_ids,
            with_key_password,
            no_require_self_sig,
            keys,
        } => {
            let mut op = sop.certify_user_id();
            if no_armor {
                op = op.no_armor();
            }
            for user_id in user_ids {
                op = op.user_id(user_id);
            }
            for password in read_all(resolver, &with_key_password, "key password")? {
                op = op.with_key_password(password.to_vec());
            }
            if no_require_self_sig {
                op = op.no_require_self_sig();
            }
            for key in read_all(resolver, &keys, "key")? {
                op = op.keys(key.to_vec());
            }
            op.certs(io::stdin()).write_to(&mut stdout).await?;
        }

        Command::ValidateUserid {
            addr_spec_only,
            validate_at,
            user_id,
            authorities,
        } => {
            let mut op = sop.validate_user_id();
            if addr_spec_only {
                op = op.addr_spec_only();
            }
            if let Some(when) = validate_at {
                op = op.validate_at(when);
            }
            for authority in read_all(resolver, &authorities, "certificate")? {
                op = op.authority(authority.to_vec());
            }
            let matched = op.user_id(user_id.clone()).subjects(io::stdin()).await?;
            if !matched {
                return Err(SopError::new(
                    ErrorKind::CertUserIdNoMatch,
                    format!("No certificate carries a valid user ID '{}'.", user_id),
                )
                .into());
            }
        }

        Command::Sign {
            no_armor,
            mode,
            with_key_password,
            micalg_out,
            keys,
        } => {
            if let Some(token) = &micalg_out {
                resolver.check_output(token)?;
            }
            let mut op = sop.detached_sign();
            if no_armor {
                op = op.no_armor();
            }
            if let Some(mode) = mode {
                op = op.mode(mode);
            }
            for password in read_all(resolver, &with_key_password, "key password")? {
                op = op.with_key_password(password.to_vec());
            }
            for key in read_all(resolver, &keys, "key")? {
                op = op.key(key.to_vec());
            }
            let result = op.data(io::stdin())?.write_to(&mut stdout).await?;
            if let Some(token) = &micalg_out {
                write_side_output(resolver, token, result.micalg.as_str().as_bytes())?;
            }
        }

        Command::Verify {
            not_before,
            not_after,
            signature,
            certs,
        } => {
            let mut op = sop.detached_verify();
            if let Some(bound) = not_before {
                op = op.not_before(bound);
            }
            if let Some(bound) = not_after {
                op = op.not_after(bound);
            }
            let signature = resolver
                .read_input(&signature)
                .with_context(|| format!("Cannot read signature '{}'", signature.trim()))?;
            op = op.signatures(signature.to_vec());
            for cert in read_all(resolver, &certs, "certificate")? {
                op = op.cert(cert.to_vec());
            }
            let verifications = op.data(io::stdin()).await?;
            print_verifications(&verifications)?;
        }

        Command::Encrypt {
            no_armor,
            mode,
            purpose,
            with_password,
            sign_with,
            with_key_password,
            session_key_out,
            profile,
            certs,
        } => {
            if with_password.is_empty() && certs.is_empty() {
                return Err(SopError::new(
                    ErrorKind::MissingArg,
                    "At least one password or certificate is required for encryption.",
                )
                .into());
            }
            if let Some(token) = &session_key_out {
                resolver.check_output(token)?;
            }

            let mut op = sop.encrypt();
            if no_armor {
                op = op.no_armor();
            }
            if let Some(mode) = mode {
                op = op.mode(mode);
            }
            if let Some(purpose) = purpose {
                op = op.encrypt_for(purpose);
            }
            if let Some(profile) = &profile {
                op = op.profile(profile);
            }
            for password in read_all(resolver, &with_key_password, "key password")? {
                op = op.with_key_password(password.to_vec());
            }
            for key in read_all(resolver, &sign_with, "signing key")? {
                op = op.sign_with(key.to_vec());
            }
            for password in read_all(resolver, &with_password, "password")? {
                op = op.with_password(password.to_vec());
            }
            for cert in read_all(resolver, &certs, "certificate")? {
                op = op.with_cert(cert.to_vec());
            }

            let result = op.plaintext(io::stdin())?.write_to(&mut stdout).await?;
            if let Some(token) = &session_key_out {
                let session_key = result.session_key.ok_or_else(|| {
                    SopError::new(ErrorKind::UnsupportedOption, "Backend did not report a session key.")
                })?;
                let mut text = session_key.to_text();
                text.push('\n');
                write_side_output(resolver, token, text.as_bytes())?;
            }
        }

        Command::Decrypt {
            session_key_out,
            with_session_key,
            with_password,
            verifications_out,
            verify_with,
            verify_not_before,
            verify_not_after,
            with_key_password,
            keys,
        } => {
            if verifications_out.is_some() && verify_with.is_empty() {
                return Err(SopError::new(
                    ErrorKind::IncompleteVerification,
                    "--verifications-out requires at least one --verify-with certificate.",
                )
                .into());
            }
            if with_session_key.is_empty() && with_password.is_empty() && keys.is_empty() {
                return Err(SopError::new(
                    ErrorKind::MissingArg,
                    "Decryption needs a KEY, --with-password or --with-session-key.",
                )
                .into());
            }
            for token in session_key_out.iter().chain(verifications_out.iter()) {
                resolver.check_output(token)?;
            }

            let mut op = sop.decrypt();
            if let Some(bound) = verify_not_before {
                op = op.verify_not_before(bound);
            }
            if let Some(bound) = verify_not_after {
                op = op.verify_not_after(bound);
            }
            for cert in read_all(resolver, &verify_with, "certificate")? {
                op = op.verify_with_cert(cert.to_vec());
            }
            for token in &with_session_key {
                op = op.with_session_key(&read_session_key(resolver, token)?);
            }
            for password in read_all(resolver, &with_password, "password")? {
                op = op.with_password(password.to_vec());
            }
            for password in read_all(resolver, &with_key_password, "key password")? {
                op = op.with_key_password(password.to_vec());
            }
            for key in read_all(resolver, &keys, "key")? {
                op = op.with_key(key.to_vec());
            }

            let result = op.ciphertext(io::stdin())?.write_to(&mut stdout).await?;
            if let Some(token) = &session_key_out {
                let session_key = result.session_key.as_ref().ok_or_else(|| {
                    SopError::new(ErrorKind::UnsupportedOption, "Backend did not report a session key.")
                })?;
                let mut text = session_key.to_text();
                text.push('\n');
                write_side_output(resolver, token, text.as_bytes())?;
            }
            if let Some(token) = &verifications_out {
                write_side_output(resolver, token, verification_lines(&result.verifications).as_bytes())?;
            }
        }

        Command::InlineDetach {
            no_armor,
            signatures_out,
        } => {
            resolver.check_output(&signatures_out)?;
            let mut op = sop.inline_detach();
            if no_armor {
                op = op.no_armor();
            }
            let signatures = op.message(io::stdin())?.write_to(&mut stdout).await?;
            write_side_output(resolver, &signatures_out, &signatures)?;
        }

        Command::InlineSign {
            no_armor,
            mode,
            with_key_password,
            keys,
        } => {
            let mut op = sop.inline_sign();
            if no_armor {
                op = op.no_armor();
            }
            if let Some(mode) = mode {
                op = op.mode(mode);
            }
            for password in read_all(resolver, &with_key_password, "key password")? {
                op = op.with_key_password(password.to_vec());
            }
            for key in read_all(resolver, &keys, "key")? {
                op = op.key(key.to_vec());
            }
            op.data(io::stdin()).write_to(&mut stdout).await?;
        }

        Command::InlineVerify {
            not_before,
            not_after,
            verifications_out,
            certs,
        } => {
            if let Some(token) = &verifications_out {
                resolver.check_output(token)?;
            }
            let mut op = sop.inline_verify();
            if let Some(bound) = not_before {
                op = op.not_before(bound);
            }
            if let Some(bound) = not_after {
                op = op.not_after(bound);
            }
            for cert in read_all(resolver, &certs, "certificate")? {
                op = op.cert(cert.to_vec());
            }
            let verifications = op.data(io::stdin())?.write_to(&mut stdout).await?;
            if let Some(token) = &verifications_out {
                write_side_output(resolver, token, verification_lines(&verifications).as_bytes())?;
            }
        }

        Command::Armor { label } => {
            let mut op = sop.armor();
            if let Some(label) = label {
                op = op.label(label);
            }
            op.data(io::stdin()).write_to(&mut stdout).await?;
        }

        Command::Dearmor => {
            sop.dearmor().data(io::stdin()).write_to(&mut stdout).await?;
        }
    }

    stdout.flush().await?;
    Ok(())
}
