//! Encrypted wallet keystore
//!
//! Uses AES-256-GCM for encryption and Argon2id for key derivation.
//! The mnemonic (or raw seed) is never written in plaintext.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, bail, Context, Result};
use argon2::{
    password_hash::{rand_core::RngCore, SaltString},
    Argon2, PasswordHasher, PasswordVerifier,
};
use serde::{Deserialize, Serialize};
use tonconnect_responder::{KeyMaterial, KeyedAccount};
use zeroize::{Zeroize, Zeroizing};

/// Argon2 parameters for key derivation
const ARGON2_M_COST: u32 = 65536; // 64 MB memory
const ARGON2_T_COST: u32 = 3;
const ARGON2_P_COST: u32 = 4;

const KEYSTORE_VERSION: u8 = 1;

/// What the stored secret is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretKind {
    /// 24-word TON mnemonic
    Mnemonic,
    /// 32-byte ed25519 seed, hex
    SeedHex,
}

/// Keystore plaintext
#[derive(Serialize, Deserialize)]
pub struct WalletSecret {
    pub kind: SecretKind,
    pub secret: String,
    /// Wallet address, raw or user-friendly
    pub address: String,
    /// Base64 wallet state init
    pub state_init: String,
}

impl WalletSecret {
    fn key_material(&self) -> Result<KeyMaterial> {
        let material = match self.kind {
            SecretKind::Mnemonic => KeyMaterial::mnemonic(&self.secret),
            SecretKind::SeedHex => KeyMaterial::seed_hex(&self.secret),
        };
        material.context("Stored secret is not valid key material")
    }

    /// Check the secret, address and state init without deriving the key
    pub fn validate(&self) -> Result<()> {
        self.to_account().map(|_| ())
    }

    pub fn to_account(&self) -> Result<KeyedAccount> {
        KeyedAccount::new(self.key_material()?, &self.address, &self.state_init)
            .context("Stored wallet is invalid")
    }
}

impl Drop for WalletSecret {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

impl fmt::Debug for WalletSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletSecret")
            .field("kind", &self.kind)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Encrypted keystore file format
#[derive(Serialize, Deserialize)]
pub struct EncryptedKeyFile {
    pub version: u8,
    /// Salt for Argon2
    pub salt: String,
    /// Nonce for AES-GCM (base64)
    pub nonce: String,
    /// Encrypted data (base64)
    pub ciphertext: String,
    /// Argon2 PHC string used to reject a wrong password early
    pub password_hash: Option<String>,
    /// Wallet address, kept in clear so `info` works without a password
    pub address: String,
    pub created_at: String,
}

fn argon2() -> Result<Argon2<'static>> {
    let params = argon2::Params::new(ARGON2_M_COST, ARGON2_T_COST, ARGON2_P_COST, Some(32))
        .map_err(|e| anyhow!("Argon2 params error: {}", e))?;
    Ok(Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        params,
    ))
}

fn derive_key(password: &str, salt: &str) -> Result<Zeroizing<[u8; 32]>> {
    let mut key = Zeroizing::new([0u8; 32]);
    argon2()?
        .hash_password_into(password.as_bytes(), salt.as_bytes(), key.as_mut_slice())
        .map_err(|e| anyhow!("Key derivation failed: {}", e))?;
    Ok(key)
}

impl EncryptedKeyFile {
    /// Encrypt a wallet secret with a password
    pub fn encrypt(data: &WalletSecret, password: &str) -> Result<Self> {
        let salt = SaltString::generate(&mut OsRng);
        let key = derive_key(password, salt.as_str())?;
        let cipher = Aes256Gcm::new_from_slice(key.as_slice())
            .map_err(|e| anyhow!("Cipher creation failed: {}", e))?;

        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from(nonce_bytes);

        let plaintext = Zeroizing::new(serde_json::to_vec(data)?);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_slice())
            .map_err(|e| anyhow!("Encryption failed: {}", e))?;

        let password_hash = argon2()?
            .hash_password(password.as_bytes(), &salt)
            .ok()
            .map(|h| h.to_string());

        Ok(Self {
            version: KEYSTORE_VERSION,
            salt: salt.as_str().to_string(),
            nonce: b64::encode(&nonce_bytes),
            ciphertext: b64::encode(&ciphertext),
            password_hash,
            address: data.address.clone(),
            created_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Decrypt the wallet secret
    pub fn decrypt(&self, password: &str) -> Result<WalletSecret> {
        if self.version != KEYSTORE_VERSION {
            bail!("Unsupported keystore version {}", self.version);
        }
        if let Some(ref hash) = self.password_hash {
            let parsed_hash = argon2::PasswordHash::new(hash)
                .map_err(|e| anyhow!("Invalid password hash: {}", e))?;
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed_hash)
                .map_err(|_| anyhow!("Invalid password"))?;
        }

        let key = derive_key(password, &self.salt)?;
        let cipher = Aes256Gcm::new_from_slice(key.as_slice())
            .map_err(|e| anyhow!("Cipher creation failed: {}", e))?;

        let nonce_bytes: [u8; 12] = b64::decode(&self.nonce)
            .context("Invalid nonce encoding")?
            .try_into()
            .map_err(|_| anyhow!("Invalid nonce length"))?;
        let ciphertext = b64::decode(&self.ciphertext).context("Invalid ciphertext encoding")?;

        let plaintext = Zeroizing::new(
            cipher
                .decrypt(&Nonce::from(nonce_bytes), ciphertext.as_ref())
                .map_err(|_| anyhow!("Decryption failed - wrong password or corrupted data"))?,
        );

        serde_json::from_slice(&plaintext).context("Failed to parse decrypted keystore")
    }
}

/// Keystore file manager
pub struct SecureKeyStorage {
    path: PathBuf,
}

impl SecureKeyStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Encrypt and write, owner-only on unix
    pub fn save(&self, data: &WalletSecret, password: &str) -> Result<()> {
        let encrypted = EncryptedKeyFile::encrypt(data, password)?;
        let json = serde_json::to_string_pretty(&encrypted)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&self.path, &json)
            .with_context(|| format!("Failed to write keystore {}", self.path.display()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    fn read(&self) -> Result<EncryptedKeyFile> {
        let json = fs::read_to_string(&self.path).context("Failed to read keystore file")?;
        serde_json::from_str(&json).context("Failed to parse keystore file")
    }

    /// Load and decrypt
    pub fn load(&self, password: &str) -> Result<WalletSecret> {
        self.read()?.decrypt(password)
    }

    /// Address and creation time, readable without the password
    pub fn summary(&self) -> Result<(String, String)> {
        let file = self.read()?;
        Ok((file.address, file.created_at))
    }
}

/// Password strength validation
pub fn validate_password_strength(password: &str) -> Result<()> {
    if password.len() < 8 {
        bail!("Password must be at least 8 characters");
    }

    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_lower = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_numeric());
    if !has_upper || !has_lower || !has_digit {
        bail!("Password must contain uppercase, lowercase, and numeric characters");
    }
    Ok(())
}

/// Prompt without echo
pub fn prompt_secret(prompt: &str) -> Result<Zeroizing<String>> {
    rpassword::prompt_password(prompt)
        .map(Zeroizing::new)
        .context("Failed to read from terminal")
}

/// Prompt for a new password with confirmation
pub fn prompt_new_password(prompt: &str) -> Result<Zeroizing<String>> {
    let password = prompt_secret(prompt)?;
    let confirm = prompt_secret("Confirm password: ")?;
    if *password != *confirm {
        bail!("Passwords do not match");
    }
    validate_password_strength(&password)?;
    Ok(password)
}

mod b64 {
    use base64::{engine::general_purpose::STANDARD, Engine};

    pub fn encode(data: &[u8]) -> String {
        STANDARD.encode(data)
    }

    pub fn decode(s: &str) -> anyhow::Result<Vec<u8>> {
        STANDARD
            .decode(s)
            .map_err(|e| anyhow::anyhow!("Base64 decode error: {}", e))
    }
}
