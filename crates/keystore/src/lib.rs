//! Aquabridge Keystore
//!
//! The peer's ed25519 identity, stored as a raw 32-byte secret, and the
//! per-service directories where identity and settings live by default.

use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use libp2p::identity::Keypair;
use libp2p::PeerId;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum KeystoreError {
    #[error("Cannot read identity {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },
    #[error("Cannot write identity {path}: {reason}")]
    WriteError { path: PathBuf, reason: String },
    #[error("Identity is not a 32-byte ed25519 secret")]
    InvalidFormat,
}

pub type Result<T> = std::result::Result<T, KeystoreError>;

/// Load the peer identity at `path`, generating and persisting a fresh
/// ed25519 secret the first time.
pub fn load_or_generate_keypair(path: &Path) -> Result<Keypair> {
    if path.exists() {
        debug!("Loading identity from {}", path.display());
        let bytes = fs::read(path).map_err(|e| KeystoreError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        return keypair_from_secret(&bytes);
    }

    let keypair = Keypair::generate_ed25519();
    info!(
        "New identity {} stored at {}",
        PeerId::from(keypair.public()),
        path.display()
    );
    let secret = secret_bytes(&keypair)?;
    let write_err = |e: std::io::Error| KeystoreError::WriteError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    fs::write(path, secret).map_err(write_err)?;
    Ok(keypair)
}

/// Keypair from a raw 32-byte ed25519 secret.
pub fn keypair_from_secret(bytes: &[u8]) -> Result<Keypair> {
    if bytes.len() != 32 {
        return Err(KeystoreError::InvalidFormat);
    }
    Keypair::ed25519_from_bytes(bytes.to_vec()).map_err(|_| KeystoreError::InvalidFormat)
}

/// Keypair from a base64-encoded 32-byte ed25519 secret.
pub fn keypair_from_base64(secret: &str) -> Result<Keypair> {
    let bytes = BASE64
        .decode(secret.trim())
        .map_err(|_| KeystoreError::InvalidFormat)?;
    keypair_from_secret(&bytes)
}

pub fn secret_bytes(keypair: &Keypair) -> Result<[u8; 32]> {
    let ed = keypair
        .clone()
        .try_into_ed25519()
        .map_err(|_| KeystoreError::InvalidFormat)?;
    let mut out = [0u8; 32];
    out.copy_from_slice(ed.secret().as_ref());
    Ok(out)
}

#[derive(Clone, Copy)]
enum DirKind {
    Config,
    Data,
}

/// Per-service directory following platform conventions:
/// XDG on Linux, `Application Support` on macOS, `%APPDATA%` on Windows.
fn service_dir(kind: DirKind, service: &str) -> PathBuf {
    let home = || {
        let var = if cfg!(windows) { "USERPROFILE" } else { "HOME" };
        std::env::var_os(var).map(PathBuf::from).unwrap_or_else(std::env::temp_dir)
    };

    if cfg!(target_os = "macos") {
        return home().join("Library/Application Support").join(title_case(service));
    }
    if cfg!(windows) {
        let appdata = std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| home().join("AppData").join("Roaming"));
        return appdata.join(title_case(service));
    }

    let (var, fallback) = match kind {
        DirKind::Config => ("XDG_CONFIG_HOME", ".config"),
        DirKind::Data => ("XDG_DATA_HOME", ".local/share"),
    };
    std::env::var_os(var)
        .map(PathBuf::from)
        .unwrap_or_else(|| home().join(fallback))
        .join(service.to_lowercase())
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    chars
        .next()
        .map(|c| c.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect())
        .unwrap_or_default()
}

/// Directory holding `settings.json` for `service`.
pub fn default_config_dir_for(service: &str) -> PathBuf {
    service_dir(DirKind::Config, service)
}

/// `<data dir>/keys/peer.key` for `service`.
pub fn default_key_path_for(service: &str) -> PathBuf {
    service_dir(DirKind::Data, service).join("keys").join("peer.key")
}
