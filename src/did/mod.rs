//! Identifier capabilities the agent depends on.
//!
//! The session only needs two things from a DID method: build an identifier
//! from public keys plus service descriptors, and resolve an identifier back
//! into a [`Document`]. Both are narrow traits so a different method (or a
//! test double) can be plugged in without touching the session code.

pub mod peer2;

use serde::{Deserialize, Serialize};

use crate::codec::EncodedKey;
use crate::error::ResolutionError;

pub use peer2::PeerDid2;

/// Service type used for DIDComm v2 endpoints.
pub const DIDCOMM_MESSAGING: &str = "DIDCommMessaging";

/// Media profile accepted by this agent.
pub const DIDCOMM_V2: &str = "didcomm/v2";

/// Maps an identifier string to its document.
pub trait DidResolver {
    fn resolve(&self, did: &str) -> Result<Document, ResolutionError>;
}

/// Builds an identifier from keys and services.
pub trait DidConstructor {
    fn construct(
        &self,
        keys: &[(KeyPurpose, EncodedKey)],
        services: &[ServiceDescriptor],
    ) -> Result<String, ResolutionError>;
}

/// What a key in the identifier is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyPurpose {
    Assertion,
    Encryption,
    Verification,
    CapabilityInvocation,
    CapabilityDelegation,
}

impl KeyPurpose {
    pub const fn code(self) -> char {
        match self {
            KeyPurpose::Assertion => 'A',
            KeyPurpose::Encryption => 'E',
            KeyPurpose::Verification => 'V',
            KeyPurpose::CapabilityInvocation => 'I',
            KeyPurpose::CapabilityDelegation => 'D',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'A' => Some(KeyPurpose::Assertion),
            'E' => Some(KeyPurpose::Encryption),
            'V' => Some(KeyPurpose::Verification),
            'I' => Some(KeyPurpose::CapabilityInvocation),
            'D' => Some(KeyPurpose::CapabilityDelegation),
            _ => None,
        }
    }
}

/// A service endpoint: either a bare URI or an object carrying its own
/// accept list and routing keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServiceEndpoint {
    Uri(String),
    Object {
        uri: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        accept: Vec<String>,
        #[serde(rename = "routingKeys", default, skip_serializing_if = "Vec::is_empty")]
        routing_keys: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub service_type: String,
    pub service_endpoint: ServiceEndpoint,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accept: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routing_keys: Vec<String>,
}

impl ServiceDescriptor {
    /// A DIDComm v2 messaging service at `endpoint` (may be empty).
    pub fn didcomm(endpoint: impl Into<String>) -> Self {
        Self {
            id: None,
            service_type: DIDCOMM_MESSAGING.to_string(),
            service_endpoint: ServiceEndpoint::Uri(endpoint.into()),
            accept: vec![DIDCOMM_V2.to_string()],
            routing_keys: Vec::new(),
        }
    }

    pub fn uri(&self) -> &str {
        match &self.service_endpoint {
            ServiceEndpoint::Uri(uri) | ServiceEndpoint::Object { uri, .. } => uri,
        }
    }

    pub fn accepts(&self) -> impl Iterator<Item = &str> {
        let nested: &[String] = match &self.service_endpoint {
            ServiceEndpoint::Object { accept, .. } => accept.as_slice(),
            ServiceEndpoint::Uri(_) => &[],
        };
        self.accept.iter().chain(nested).map(String::as_str)
    }

    pub fn routing_keys(&self) -> impl Iterator<Item = &str> {
        let nested: &[String] = match &self.service_endpoint {
            ServiceEndpoint::Object { routing_keys, .. } => routing_keys.as_slice(),
            ServiceEndpoint::Uri(_) => &[],
        };
        self.routing_keys.iter().chain(nested).map(String::as_str)
    }

    /// A DIDComm v2 service: typed as such, and not declaring an accept
    /// list that excludes v2.
    pub fn is_didcomm_v2(&self) -> bool {
        if self.service_type != DIDCOMM_MESSAGING {
            return false;
        }
        let mut accepts = self.accepts().peekable();
        accepts.peek().is_none() || accepts.any(|a| a == DIDCOMM_V2)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    pub id: String,
    #[serde(rename = "type")]
    pub method_type: String,
    pub controller: String,
    pub public_key_multibase: EncodedKey,
}

/// A resolved DID document, reduced to what messaging needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(rename = "@context", default)]
    pub context: Vec<String>,
    pub id: String,
    #[serde(default)]
    pub verification_method: Vec<VerificationMethod>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authentication: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertion_method: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_agreement: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capability_invocation: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capability_delegation: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service: Vec<ServiceDescriptor>,
}

impl Document {
    /// First service usable for DIDComm v2.
    pub fn didcomm_service(&self) -> Option<&ServiceDescriptor> {
        self.service.iter().find(|s| s.is_didcomm_v2())
    }

    /// Verification methods referenced from `keyAgreement`.
    pub fn key_agreement_methods(&self) -> impl Iterator<Item = &VerificationMethod> {
        self.verification_method
            .iter()
            .filter(|vm| self.key_agreement.iter().any(|r| *r == vm.id))
    }
}
