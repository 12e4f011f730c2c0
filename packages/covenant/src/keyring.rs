//! Storage of the covenant BTC key.
//!
//! Keys live in `<key_directory>/keyring-<backend>/<key_name>.json`. The `test`
//! backend stores the secret in the clear and ignores the passphrase. The
//! `file` backend seals it with ChaCha20-Poly1305 under a key derived from the
//! passphrase with Argon2id.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use argon2::{Algorithm, Argon2, Params, Version};
use bitcoin::XOnlyPublicKey;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use k256::elliptic_curve::point::AffineCoordinates;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use zeroize::Zeroizing;

use crate::config::BabylonConfig;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const SYMMETRIC_KEY_LEN: usize = 32;
const CIPHER_ALGORITHM: &str = "chacha20poly1305";
const KDF_ALGORITHM: &str = "argon2id";

#[derive(Error, Debug)]
pub enum KeyringError {
    #[error("key {0} not found")]
    KeyNotFound(String),
    #[error("key {0} already exists")]
    KeyAlreadyExists(String),
    #[error("bad passphrase")]
    BadPassphrase,
    #[error("malformed key record: {0}")]
    Malformed(String),
    #[error("key derivation failed: {0}")]
    Kdf(String),
    #[error("keyring io error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyringBackend {
    #[default]
    Test,
    File,
}

impl fmt::Display for KeyringBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyringBackend::Test => write!(f, "test"),
            KeyringBackend::File => write!(f, "file"),
        }
    }
}

/// Keyring hands out the covenant secret key
pub trait Keyring: Send + Sync {
    fn unlock(&self, passphrase: &str) -> Result<k256::SecretKey, KeyringError>;
}

/// CovenantKeyInfo describes a newly created covenant key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CovenantKeyInfo {
    pub name: String,
    pub pk: XOnlyPublicKey,
}

/// KdfParams are the Argon2id costs of a sealed key. They are stored with the
/// key, so unlocking always uses the costs the key was created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// memory cost in KiB
    pub m_cost: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        KdfParams {
            m_cost: 64 * 1024,
            t_cost: 3,
            p_cost: 1,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct SealedSecret {
    kdf: String,
    kdf_params: KdfParams,
    salt: String,
    cipher: String,
    nonce: String,
    ciphertext: String,
}

#[derive(Serialize, Deserialize)]
struct KeyRecord {
    name: String,
    pub_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sealed: Option<SealedSecret>,
}

/// public_key_of returns the BIP-340 public key of a secret key
pub fn public_key_of(sk: &k256::SecretKey) -> Result<XOnlyPublicKey, KeyringError> {
    XOnlyPublicKey::from_slice(&sk.public_key().as_affine().x())
        .map_err(|e| KeyringError::Malformed(e.to_string()))
}

fn malformed(e: impl fmt::Display) -> KeyringError {
    KeyringError::Malformed(e.to_string())
}

fn derive_symmetric_key(
    passphrase: &str,
    salt: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; SYMMETRIC_KEY_LEN]>, KeyringError> {
    let params = Params::new(
        params.m_cost,
        params.t_cost,
        params.p_cost,
        Some(SYMMETRIC_KEY_LEN),
    )
    .map_err(|e| KeyringError::Kdf(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = Zeroizing::new([0u8; SYMMETRIC_KEY_LEN]);
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut key[..])
        .map_err(|e| KeyringError::Kdf(e.to_string()))?;
    Ok(key)
}

/// seal encrypts `secret`, binding the ciphertext to the key's public key
fn seal(
    secret: &[u8],
    pub_key: &str,
    passphrase: &str,
    params: KdfParams,
) -> Result<SealedSecret, KeyringError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let key = derive_symmetric_key(passphrase, &salt, &params)?;
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key[..]));
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: secret,
                aad: pub_key.as_bytes(),
            },
        )
        .map_err(|_| KeyringError::Kdf("failed to seal the covenant key".to_string()))?;

    Ok(SealedSecret {
        kdf: KDF_ALGORITHM.to_string(),
        kdf_params: params,
        salt: hex::encode(salt),
        cipher: CIPHER_ALGORITHM.to_string(),
        nonce: hex::encode(nonce),
        ciphertext: hex::encode(ciphertext),
    })
}

/// open decrypts a sealed secret. An authentication failure means the
/// passphrase is wrong or the record was tampered with.
fn open(
    sealed: &SealedSecret,
    pub_key: &str,
    passphrase: &str,
) -> Result<Zeroizing<Vec<u8>>, KeyringError> {
    if sealed.kdf != KDF_ALGORITHM || sealed.cipher != CIPHER_ALGORITHM {
        return Err(KeyringError::Malformed(format!(
            "unsupported key sealing {}/{}",
            sealed.kdf, sealed.cipher
        )));
    }
    let salt = hex::decode(&sealed.salt).map_err(malformed)?;
    let nonce = hex::decode(&sealed.nonce).map_err(malformed)?;
    if nonce.len() != NONCE_LEN {
        return Err(KeyringError::Malformed(format!(
            "nonce has {} bytes, expected {NONCE_LEN}",
            nonce.len()
        )));
    }
    let ciphertext = hex::decode(&sealed.ciphertext).map_err(malformed)?;

    let key = derive_symmetric_key(passphrase, &salt, &sealed.kdf_params)?;
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key[..]));
    cipher
        .decrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: &ciphertext,
                aad: pub_key.as_bytes(),
            },
        )
        .map(Zeroizing::new)
        .map_err(|_| KeyringError::BadPassphrase)
}

#[derive(Debug, Clone)]
pub struct FileKeyring {
    dir: PathBuf,
    key_name: String,
    backend: KeyringBackend,
    kdf_params: KdfParams,
}

impl FileKeyring {
    pub fn new(key_directory: impl Into<PathBuf>, key_name: impl Into<String>, backend: KeyringBackend) -> Self {
        FileKeyring {
            dir: key_directory.into(),
            key_name: key_name.into(),
            backend,
            kdf_params: KdfParams::default(),
        }
    }

    pub fn from_config(cfg: &BabylonConfig) -> Self {
        Self::new(&cfg.key_directory, &cfg.key, cfg.keyring_backend)
    }

    /// with_kdf_params sets the Argon2id costs used for keys created from now on
    pub fn with_kdf_params(mut self, kdf_params: KdfParams) -> Self {
        self.kdf_params = kdf_params;
        self
    }

    fn key_path(&self) -> PathBuf {
        self.dir
            .join(format!("keyring-{}", self.backend))
            .join(format!("{}.json", self.key_name))
    }

    /// create_key generates a fresh covenant key and stores it. An existing key
    /// with the same name is never overwritten.
    pub fn create_key(&self, passphrase: &str) -> Result<CovenantKeyInfo, KeyringError> {
        let path = self.key_path();
        if path.exists() {
            return Err(KeyringError::KeyAlreadyExists(self.key_name.clone()));
        }

        let sk = k256::SecretKey::random(&mut OsRng);
        let pk = public_key_of(&sk)?;
        let pub_key = babylon_bitcoin::bip340_pk_hex(&pk);
        let sk_bytes = Zeroizing::new(sk.to_bytes().to_vec());

        let record = match self.backend {
            KeyringBackend::Test => KeyRecord {
                name: self.key_name.clone(),
                pub_key,
                secret: Some(hex::encode(&*sk_bytes)),
                sealed: None,
            },
            KeyringBackend::File => KeyRecord {
                name: self.key_name.clone(),
                sealed: Some(seal(&sk_bytes, &pub_key, passphrase, self.kdf_params)?),
                pub_key,
                secret: None,
            },
        };
        let encoded = serde_json::to_vec_pretty(&record).map_err(malformed)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(KeyringError::KeyAlreadyExists(self.key_name.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(&encoded)?;

        info!(key_name = %self.key_name, backend = %self.backend, pk = %record.pub_key, "created covenant key");
        Ok(CovenantKeyInfo {
            name: self.key_name.clone(),
            pk,
        })
    }
}

impl Keyring for FileKeyring {
    fn unlock(&self, passphrase: &str) -> Result<k256::SecretKey, KeyringError> {
        let raw = match fs::read(self.key_path()) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(KeyringError::KeyNotFound(self.key_name.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        let record: KeyRecord = serde_json::from_slice(&raw).map_err(malformed)?;

        let secret = match (self.backend, &record.secret, &record.sealed) {
            (KeyringBackend::Test, Some(secret), _) => {
                Zeroizing::new(hex::decode(secret).map_err(malformed)?)
            }
            (KeyringBackend::File, _, Some(sealed)) => open(sealed, &record.pub_key, passphrase)?,
            _ => {
                return Err(KeyringError::Malformed(format!(
                    "key {} has no secret for the {} backend",
                    record.name, self.backend
                )))
            }
        };

        let sk = k256::SecretKey::from_slice(&secret).map_err(malformed)?;
        if babylon_bitcoin::bip340_pk_hex(&public_key_of(&sk)?) != record.pub_key {
            return Err(KeyringError::Malformed("public key mismatch".to_string()));
        }
        Ok(sk)
    }
}

/// create_covenant_key creates a covenant key named `key_name` in the keyring
/// under `key_directory`
pub fn create_covenant_key(
    key_directory: &Path,
    key_name: &str,
    backend: KeyringBackend,
    passphrase: &str,
) -> Result<CovenantKeyInfo, KeyringError> {
    FileKeyring::new(key_directory, key_name, backend).create_key(passphrase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const FAST_KDF: KdfParams = KdfParams {
        m_cost: 1024,
        t_cost: 1,
        p_cost: 1,
    };

    fn file_keyring(dir: &Path) -> FileKeyring {
        FileKeyring::new(dir, "cov", KeyringBackend::File).with_kdf_params(FAST_KDF)
    }

    fn read_record(dir: &Path, backend: KeyringBackend) -> serde_json::Value {
        let path = dir.join(format!("keyring-{backend}")).join("cov.json");
        serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
    }

    fn write_record(dir: &Path, backend: KeyringBackend, record: &serde_json::Value) {
        let path = dir.join(format!("keyring-{backend}")).join("cov.json");
        fs::write(path, serde_json::to_vec(record).unwrap()).unwrap();
    }

    #[test]
    fn test_create_and_unlock_file_key() {
        let dir = tempfile::tempdir().unwrap();
        let keyring = file_keyring(dir.path());
        let info = keyring.create_key("secret").unwrap();
        assert_eq!(info.name, "cov");

        let sk = keyring.unlock("secret").unwrap();
        assert_eq!(public_key_of(&sk).unwrap(), info.pk);

        assert_matches!(keyring.unlock("wrong"), Err(KeyringError::BadPassphrase));
    }

    #[test]
    fn test_file_key_is_sealed_with_its_kdf_params() {
        let dir = tempfile::tempdir().unwrap();
        let keyring = file_keyring(dir.path());
        keyring.create_key("secret").unwrap();
        let sk = keyring.unlock("secret").unwrap();

        let record = read_record(dir.path(), KeyringBackend::File);
        assert!(record.get("secret").is_none());
        let sealed = &record["sealed"];
        assert_eq!(sealed["kdf"], "argon2id");
        assert_eq!(sealed["cipher"], "chacha20poly1305");
        assert_eq!(sealed["kdf_params"]["m_cost"], 1024);
        assert_eq!(sealed["kdf_params"]["t_cost"], 1);
        assert_ne!(
            sealed["ciphertext"].as_str().unwrap(),
            hex::encode(sk.to_bytes())
        );

        // the stored costs win over the ones of the keyring reading the key
        let reader = FileKeyring::new(dir.path(), "cov", KeyringBackend::File);
        assert_eq!(reader.unlock("secret").unwrap(), sk);
    }

    #[test]
    fn test_tampered_file_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let keyring = file_keyring(dir.path());
        keyring.create_key("secret").unwrap();
        let original = read_record(dir.path(), KeyringBackend::File);

        let mut flipped = original.clone();
        let mut ciphertext = hex::decode(flipped["sealed"]["ciphertext"].as_str().unwrap()).unwrap();
        ciphertext[0] ^= 1;
        flipped["sealed"]["ciphertext"] = hex::encode(ciphertext).into();
        write_record(dir.path(), KeyringBackend::File, &flipped);
        assert_matches!(keyring.unlock("secret"), Err(KeyringError::BadPassphrase));

        // the public key is authenticated along with the secret
        let mut swapped = original.clone();
        let other = k256::SecretKey::from_slice(&[7u8; 32]).unwrap();
        swapped["pub_key"] = babylon_bitcoin::bip340_pk_hex(&public_key_of(&other).unwrap()).into();
        write_record(dir.path(), KeyringBackend::File, &swapped);
        assert_matches!(keyring.unlock("secret"), Err(KeyringError::BadPassphrase));

        let mut unknown = original;
        unknown["sealed"]["kdf"] = "scrypt".into();
        write_record(dir.path(), KeyringBackend::File, &unknown);
        assert_matches!(keyring.unlock("secret"), Err(KeyringError::Malformed(_)));
    }

    #[test]
    fn test_invalid_kdf_params_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let keyring = file_keyring(dir.path()).with_kdf_params(KdfParams {
            m_cost: 1024,
            t_cost: 0,
            p_cost: 1,
        });
        assert_matches!(keyring.create_key("secret"), Err(KeyringError::Kdf(_)));
        assert_matches!(keyring.unlock("secret"), Err(KeyringError::KeyNotFound(_)));
    }

    #[test]
    fn test_default_kdf_params() {
        assert_eq!(
            KdfParams::default(),
            KdfParams {
                m_cost: 65536,
                t_cost: 3,
                p_cost: 1
            }
        );
    }

    #[test]
    fn test_test_backend_ignores_passphrase() {
        let dir = tempfile::tempdir().unwrap();
        let info = create_covenant_key(dir.path(), "cov", KeyringBackend::Test, "").unwrap();

        let keyring = FileKeyring::new(dir.path(), "cov", KeyringBackend::Test);
        let sk = keyring.unlock("anything").unwrap();
        assert_eq!(public_key_of(&sk).unwrap(), info.pk);
        assert!(read_record(dir.path(), KeyringBackend::Test).get("sealed").is_none());
    }

    #[test]
    fn test_key_is_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let first = create_covenant_key(dir.path(), "cov", KeyringBackend::Test, "").unwrap();
        assert_matches!(
            create_covenant_key(dir.path(), "cov", KeyringBackend::Test, ""),
            Err(KeyringError::KeyAlreadyExists(name)) if name == "cov"
        );

        let sk = FileKeyring::new(dir.path(), "cov", KeyringBackend::Test)
            .unlock("")
            .unwrap();
        assert_eq!(public_key_of(&sk).unwrap(), first.pk);
    }

    #[test]
    fn test_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let keyring = FileKeyring::new(dir.path(), "nope", KeyringBackend::File);
        assert_matches!(keyring.unlock(""), Err(KeyringError::KeyNotFound(name)) if name == "nope");
    }
}
