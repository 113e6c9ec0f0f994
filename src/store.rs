use std::collections::BTreeMap;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use scrypt::{scrypt, Params};

use crate::error::{Error, Result};
use crate::table::Table;

/// The engine's whole table set. Ordered by name so serialization is
/// deterministic.
pub type TableMap = BTreeMap<String, Table>;

const SALT_SIZE: usize = 16;
const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32; // AES-256

/// Turns a table set into an opaque byte blob keyed by a caller-supplied
/// secret, and back.
pub trait EncryptedStore {
    fn seal(&self, tables: &TableMap, secret: &str) -> Result<Vec<u8>>;
    fn open(&self, sealed: &[u8], secret: &str) -> Result<TableMap>;
}

/// Default [EncryptedStore]: scrypt key derivation, AES-256-GCM, output
/// laid out as `salt || nonce || ciphertext`.
#[derive(Debug, Default)]
pub struct SealedStore;

impl SealedStore {
    pub fn new() -> Self {
        Self
    }
}

fn derive_key(secret: &str, salt: &[u8]) -> Result<[u8; KEY_SIZE]> {
    // n = 2^15, r = 8, p = 1
    let params =
        Params::new(15, 8, 1, KEY_SIZE).map_err(|e| Error::Store(e.to_string()))?;
    let mut key = [0u8; KEY_SIZE];
    scrypt(secret.as_bytes(), salt, &params, &mut key)
        .map_err(|e| Error::Store(e.to_string()))?;
    Ok(key)
}

impl EncryptedStore for SealedStore {
    fn seal(&self, tables: &TableMap, secret: &str) -> Result<Vec<u8>> {
        let payload = serde_json::to_vec(tables).map_err(|e| Error::Store(e.to_string()))?;

        let mut salt = [0u8; SALT_SIZE];
        OsRng.fill_bytes(&mut salt);
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);

        let key = derive_key(secret, &salt)?;
        let cipher =
            Aes256Gcm::new_from_slice(&key).map_err(|e| Error::Store(e.to_string()))?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), payload.as_slice())
            .map_err(|_| Error::Store("encryption failed".into()))?;

        let mut sealed = Vec::with_capacity(SALT_SIZE + NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&salt);
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn open(&self, sealed: &[u8], secret: &str) -> Result<TableMap> {
        if sealed.len() < SALT_SIZE + NONCE_SIZE {
            return Err(Error::Store("sealed payload too short".into()));
        }
        let (salt, rest) = sealed.split_at(SALT_SIZE);
        let (nonce, ciphertext) = rest.split_at(NONCE_SIZE);

        let key = derive_key(secret, salt)?;
        let cipher =
            Aes256Gcm::new_from_slice(&key).map_err(|e| Error::Store(e.to_string()))?;
        let payload = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| Error::Store("wrong secret or corrupted payload".into()))?;

        serde_json::from_slice(&payload).map_err(|e| Error::Store(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_type::DataType;
    use crate::table::{ColumnDef, Permission, Schema};
    use crate::value::Value;

    fn sample_tables() -> TableMap {
        let schema = Schema {
            columns: vec![
                ColumnDef {
                    name: "id".into(),
                    data_type: DataType::Int,
                },
                ColumnDef {
                    name: "birth".into(),
                    data_type: DataType::Date,
                },
            ],
        };
        let mut table = Table::new("users".into(), schema, Some("alice"));
        table
            .insert(&[
                ("id".into(), Value::Int(1)),
                ("birth".into(), Value::Str("1990-04-10".into())),
            ])
            .unwrap();
        table.grant("bob", Permission::Read);

        let mut tables = TableMap::new();
        tables.insert("users".into(), table);
        tables
    }

    #[test]
    fn test_seal_open_round_trip() {
        let store = SealedStore::new();
        let tables = sample_tables();

        let sealed = store.seal(&tables, "letmein123").unwrap();
        let reopened = store.open(&sealed, "letmein123").unwrap();

        assert_eq!(reopened, tables);
        let restored = &reopened["users"];
        assert!(restored.has_permission("alice", Permission::Admin));
        assert!(restored.has_permission("bob", Permission::Read));
    }

    #[test]
    fn test_wrong_secret_fails() {
        let store = SealedStore::new();
        let sealed = store.seal(&sample_tables(), "letmein123").unwrap();

        assert!(matches!(
            store.open(&sealed, "not-the-secret"),
            Err(Error::Store(_))
        ));
    }

    #[test]
    fn test_truncated_payload_fails() {
        let store = SealedStore::new();
        assert!(matches!(
            store.open(&[0u8; 8], "secret"),
            Err(Error::Store(_))
        ));
    }

    #[test]
    fn test_payload_is_not_plaintext() {
        let store = SealedStore::new();
        let sealed = store.seal(&sample_tables(), "letmein123").unwrap();
        let text = String::from_utf8_lossy(&sealed);
        assert!(!text.contains("users"));
        assert!(!text.contains("alice"));
    }
}
