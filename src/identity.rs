//! Agent identity: key material plus the DID built from it.
//!
//! The secrets file is the source of truth:
//!
//! 1. A usable record with a DID that still resolves to its keys is reused.
//! 2. A record without a usable DID keeps its keys; the DID is rebuilt.
//! 3. No usable record: fresh keys are generated and stored.
//!
//! Storing is best effort. When the write fails the identity is still
//! returned and lives for the current process only.

use tracing::{debug, info, warn};

use crate::did::{DidConstructor, DidResolver, Document, KeyPurpose, ServiceDescriptor};
use crate::error::{AppError, InvalidTargetError, ResolutionError};
use crate::keygen::{self, KeyMaterial};
use crate::secrets::{SecretRecord, SecretsStore};

/// The agent's own identity for this session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub did: String,
    pub keys: KeyMaterial,
}

pub struct IdentityService<M> {
    store: SecretsStore,
    method: M,
}

impl<M: DidResolver + DidConstructor> IdentityService<M> {
    pub fn new(store: SecretsStore, method: M) -> Self {
        Self { store, method }
    }

    pub fn store(&self) -> &SecretsStore {
        &self.store
    }

    /// Load the stored identity, or create and store a new one.
    pub fn self_identity(&self) -> Result<Identity, AppError> {
        let Some(record) = self.store.load() else {
            info!(path = %self.store.path().display(), "no stored identity; generating keys");
            let keys = keygen::generate();
            let did = self.construct_did(&keys)?;
            self.persist(&did, &keys);
            return Ok(Identity { did, keys });
        };

        match record.did {
            Some(did) if self.did_matches(&did, &record.keys) => {
                debug!(%did, "loaded stored identity");
                Ok(Identity { did, keys: record.keys })
            }
            stale => {
                if let Some(did) = stale {
                    warn!(%did, "stored DID does not match stored keys; rebuilding it");
                }
                let did = self.construct_did(&record.keys)?;
                self.persist(&did, &record.keys);
                Ok(Identity { did, keys: record.keys })
            }
        }
    }

    /// Resolve a user-supplied target. Surrounding whitespace is ignored.
    pub fn validate_target(&self, candidate: &str) -> Result<Document, InvalidTargetError> {
        let candidate = candidate.trim();
        self.method.resolve(candidate).map_err(|cause| InvalidTargetError {
            candidate: candidate.to_string(),
            cause,
        })
    }

    /// Resolve our own DID into the document peers will see.
    pub fn resolve_self(&self, me: &Identity) -> Result<Document, ResolutionError> {
        self.method.resolve(&me.did)
    }

    fn construct_did(&self, keys: &KeyMaterial) -> Result<String, AppError> {
        self.method
            .construct(
                &[
                    (KeyPurpose::Encryption, keys.x25519.public.clone()),
                    (KeyPurpose::Verification, keys.ed25519.public.clone()),
                ],
                &[ServiceDescriptor::didcomm("")],
            )
            .map_err(|e| AppError::Identity(format!("cannot construct DID: {e}")))
    }

    /// The DID resolves and lists both of our public keys.
    fn did_matches(&self, did: &str, keys: &KeyMaterial) -> bool {
        let Ok(doc) = self.method.resolve(did) else {
            return false;
        };
        let listed = |key: &crate::codec::EncodedKey| {
            doc.verification_method.iter().any(|vm| vm.public_key_multibase == *key)
        };
        listed(&keys.ed25519.public) && listed(&keys.x25519.public)
    }

    fn persist(&self, did: &str, keys: &KeyMaterial) {
        let record = SecretRecord { did: Some(did.to_string()), keys: keys.clone() };
        match self.store.store(&record) {
            Ok(()) => info!(path = %self.store.path().display(), "identity stored"),
            Err(warning) => warn!(error = %warning, "identity not persisted; continuing with in-memory identity"),
        }
    }
}
