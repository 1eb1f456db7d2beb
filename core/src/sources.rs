/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result, anyhow};
use base64::{Engine, engine::general_purpose};
use ssh_key::PrivateKey;

use super::input::load_secret;
use super::types::*;

pub type CryptKey = [u8; 32];

/// Reads the base64 encoded AES-256 secret used for stored private keys.
pub fn load_crypt_key(crypt_secret_file: Option<&str>) -> Result<CryptKey> {
    let path = crypt_secret_file.context("No crypt secret file configured")?;
    let secret = general_purpose::STANDARD
        .decode(load_secret(path)?)
        .context("Failed to decode crypt secret")?;

    secret
        .as_slice()
        .try_into()
        .map_err(|_| anyhow!("Crypt secret must be exactly 32 bytes (got {})", secret.len()))
}

pub fn encrypt_ssh_private_key(key: &CryptKey, private_key: &str) -> Result<String> {
    let encrypted = crypter::encrypt(key, private_key.trim())
        .context("Failed to encrypt SSH private key")?;

    Ok(general_purpose::STANDARD.encode(&encrypted))
}

/// Returns the plain private key and the public key of a stored key pair.
pub fn decrypt_ssh_private_key(key: &CryptKey, key_pair: &MSshKeyPair) -> Result<(String, String)> {
    let encrypted = general_purpose::STANDARD
        .decode(&key_pair.private_key)
        .context("Failed to decode stored private key")?;
    let decrypted = crypter::decrypt(key, encrypted)
        .with_context(|| format!("Failed to decrypt private key of {}", key_pair.name))?;
    let private_key = String::from_utf8(decrypted).context("Private key is not valid UTF-8")?;

    Ok((private_key, key_pair.public_key.clone()))
}

/// Public key in `<algorithm> <key>` form, without the comment.
pub fn derive_public_key(private_key: &str) -> Result<String> {
    let private_key =
        PrivateKey::from_openssh(private_key.trim()).context("Failed to parse private key")?;

    let public_key = private_key
        .public_key()
        .to_openssh()
        .context("Failed to derive public key")?;

    let key_parts: Vec<&str> = public_key.split_whitespace().collect();
    let cleaned_key = if key_parts.len() >= 2 {
        format!("{} {}", key_parts[0], key_parts[1])
    } else {
        public_key.to_string()
    };

    Ok(cleaned_key)
}
