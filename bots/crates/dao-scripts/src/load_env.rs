use std::path::PathBuf;

use anyhow::{
    bail,
    Context,
};
use solana_sdk::{
    bs58,
    signature::Keypair,
};

use crate::config::WALLET_ENV_VAR;

/// Loads the wallet from [`WALLET_ENV_VAR`], either a JSON byte array or a base58 string, falling
/// back to the Solana CLI's default keypair file.
pub fn wallet_keypair() -> anyhow::Result<Keypair> {
    match std::env::var(WALLET_ENV_VAR) {
        Ok(kp_str) => keypair_from_str(kp_str.trim())
            .with_context(|| format!("Invalid keypair in {WALLET_ENV_VAR}")),
        Err(_) => {
            let path = default_keypair_path()?;
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Couldn't read keypair file {}", path.display()))?;
            keypair_from_str(contents.trim())
                .with_context(|| format!("Invalid keypair file {}", path.display()))
        }
    }
}

fn keypair_from_str(kp_str: &str) -> anyhow::Result<Keypair> {
    let byte_vec: Vec<u8> = if kp_str.starts_with('[') {
        serde_json::from_str(kp_str).context("Invalid JSON keypair")?
    } else {
        bs58::decode(kp_str)
            .into_vec()
            .context("Invalid base58 keypair")?
    };

    Keypair::try_from(byte_vec.as_slice()).context("Invalid keypair bytes")
}

fn default_keypair_path() -> anyhow::Result<PathBuf> {
    let Ok(home) = std::env::var("HOME") else {
        bail!("Set {WALLET_ENV_VAR} or HOME to locate a wallet");
    };
    Ok(PathBuf::from(home).join(".config/solana/id.json"))
}
