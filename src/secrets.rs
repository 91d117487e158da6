//! Secrets store: the agent's key material and DID in one JSON file.
//!
//! ```json
//! {
//!   "did": "did:peer:2.Ez6LS….Vz6Mk….S…",
//!   "ed25519": { "public": "z6Mk…", "private": "z3u2…" },
//!   "x25519":  { "public": "z6LS…", "private": "z3we…" }
//! }
//! ```
//!
//! A missing, unreadable or inconsistent file loads as "no identity yet".
//! Writes go through a sibling temp file and a rename, so a failed write
//! leaves the previous record in place.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::PersistenceWarning;
use crate::keygen::{EncodedPair, KeyMaterial, KeyMaterialError};

/// The persisted form of the agent's own identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRecord", into = "RawRecord")]
pub struct SecretRecord {
    /// Absent in records written before the DID was constructed.
    pub did: Option<String>,
    pub keys: KeyMaterial,
}

/// On-disk shape.
#[derive(Serialize, Deserialize)]
struct RawRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    did: Option<String>,
    ed25519: EncodedPair,
    x25519: EncodedPair,
}

impl TryFrom<RawRecord> for SecretRecord {
    type Error = KeyMaterialError;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        let keys = KeyMaterial::from_encoded(raw.ed25519, raw.x25519)?;
        let did = raw.did.filter(|d| !d.trim().is_empty());
        Ok(Self { did, keys })
    }
}

impl From<SecretRecord> for RawRecord {
    fn from(record: SecretRecord) -> Self {
        Self {
            did: record.did,
            ed25519: record.keys.ed25519,
            x25519: record.keys.x25519,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SecretsStore {
    path: PathBuf,
}

impl SecretsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the record, or `None` when there is no usable one.
    pub fn load(&self) -> Option<SecretRecord> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no secrets file");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "secrets file unreadable");
                return None;
            }
        };

        match serde_json::from_str::<SecretRecord>(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "secrets file invalid; ignoring it");
                None
            }
        }
    }

    /// Replace the record on disk.
    pub fn store(&self, record: &SecretRecord) -> Result<(), PersistenceWarning> {
        let json = serde_json::to_vec_pretty(record).map_err(|e| self.warning(io::Error::other(e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.warning(e))?;
        }

        let tmp = self.tmp_path();
        let written = write_private(&tmp, &json).and_then(|()| fs::rename(&tmp, &self.path));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(self.warning(e));
        }

        debug!(path = %self.path.display(), "secrets stored");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "secrets.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn warning(&self, source: io::Error) -> PersistenceWarning {
        PersistenceWarning {
            path: self.path.display().to_string(),
            source,
        }
    }
}

/// Write `bytes` to a new file at `path` readable by the owner only.
///
/// A leftover file or symlink at `path` is removed first; the file is then
/// created exclusively with mode 0600, so the keys are never world-readable.
fn write_private(path: &Path, bytes: &[u8]) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}
