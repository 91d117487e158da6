//! `did:peer:2`: identifiers that embed their own keys and services.
//!
//! ```text
//! did:peer:2.E<x25519-pub>.V<ed25519-pub>.S<base64url(abbreviated service json)>
//! ```
//!
//! Resolution is purely local: every element is decoded from the string.
//! Service JSON uses the short keys `t`, `s`, `r`, `a` and the
//! short type `dm` for `DIDCommMessaging`.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::Value;

use super::{
    DIDCOMM_MESSAGING, DidConstructor, DidResolver, Document, KeyPurpose, ServiceDescriptor,
    VerificationMethod,
};
use crate::codec::{self, EncodedKey, KeyKind};
use crate::error::ResolutionError;

pub const METHOD_PREFIX: &str = "did:peer:2";

const KEY_ABBREVIATIONS: [(&str, &str); 4] = [
    ("type", "t"),
    ("serviceEndpoint", "s"),
    ("routingKeys", "r"),
    ("accept", "a"),
];

const DIDCOMM_MESSAGING_ABBREVIATION: &str = "dm";

#[derive(Debug, Clone, Copy, Default)]
pub struct PeerDid2;

impl DidConstructor for PeerDid2 {
    fn construct(
        &self,
        keys: &[(KeyPurpose, EncodedKey)],
        services: &[ServiceDescriptor],
    ) -> Result<String, ResolutionError> {
        if keys.is_empty() {
            return Err(ResolutionError::Malformed("at least one key is required".into()));
        }

        let mut did = String::from(METHOD_PREFIX);
        for (purpose, key) in keys {
            codec::decode_as(key.as_str(), expected_kind(*purpose))?;
            did.push('.');
            did.push(purpose.code());
            did.push_str(key.as_str());
        }

        for service in services {
            // Ids are implied by position and never encoded.
            let mut service = service.clone();
            service.id = None;
            let value = serde_json::to_value(&service)
                .map_err(|e| ResolutionError::InvalidService(e.to_string()))?;
            let json = rewrite(value, Direction::Abbreviate).to_string();
            did.push_str(".S");
            did.push_str(&URL_SAFE_NO_PAD.encode(json));
        }

        Ok(did)
    }
}

impl DidResolver for PeerDid2 {
    fn resolve(&self, did: &str) -> Result<Document, ResolutionError> {
        let Some(rest) = did.strip_prefix("did:") else {
            return Err(ResolutionError::NotADid(did.to_string()));
        };
        let elements = did
            .strip_prefix(METHOD_PREFIX)
            .ok_or_else(|| ResolutionError::UnsupportedMethod(method_name(rest)))?;
        let elements = elements
            .strip_prefix('.')
            .ok_or_else(|| ResolutionError::Malformed("no elements after method prefix".into()))?;

        let mut doc = Document {
            context: vec![
                "https://www.w3.org/ns/did/v1".to_string(),
                "https://w3id.org/security/multikey/v1".to_string(),
            ],
            id: did.to_string(),
            verification_method: Vec::new(),
            authentication: Vec::new(),
            assertion_method: Vec::new(),
            key_agreement: Vec::new(),
            capability_invocation: Vec::new(),
            capability_delegation: Vec::new(),
            service: Vec::new(),
        };

        for element in elements.split('.') {
            let mut chars = element.chars();
            let code = chars
                .next()
                .ok_or_else(|| ResolutionError::Malformed("empty element".into()))?;
            let value = chars.as_str();

            if code == 'S' {
                for mut service in decode_services(value)? {
                    let index = doc.service.len();
                    service.id.get_or_insert_with(|| match index {
                        0 => "#service".to_string(),
                        n => format!("#service-{n}"),
                    });
                    doc.service.push(service);
                }
                continue;
            }

            let purpose = KeyPurpose::from_code(code)
                .ok_or_else(|| ResolutionError::Malformed(format!("unknown element purpose '{code}'")))?;
            codec::decode_as(value, expected_kind(purpose))?;

            let id = format!("#key-{}", doc.verification_method.len() + 1);
            doc.verification_method.push(VerificationMethod {
                id: id.clone(),
                method_type: "Multikey".to_string(),
                controller: did.to_string(),
                public_key_multibase: EncodedKey::from(value),
            });
            match purpose {
                KeyPurpose::Assertion => doc.assertion_method.push(id),
                KeyPurpose::Encryption => doc.key_agreement.push(id),
                KeyPurpose::Verification => doc.authentication.push(id),
                KeyPurpose::CapabilityInvocation => doc.capability_invocation.push(id),
                KeyPurpose::CapabilityDelegation => doc.capability_delegation.push(id),
            }
        }

        if doc.verification_method.is_empty() {
            return Err(ResolutionError::Malformed("no keys in identifier".into()));
        }
        Ok(doc)
    }
}

fn expected_kind(purpose: KeyPurpose) -> KeyKind {
    match purpose {
        KeyPurpose::Encryption => KeyKind::X25519_PUBLIC,
        _ => KeyKind::ED25519_PUBLIC,
    }
}

/// `peer:4…` → `peer:4`, `web:example.com` → `web`.
fn method_name(after_scheme: &str) -> String {
    let mut parts = after_scheme.splitn(2, ':');
    let method = parts.next().unwrap_or_default();
    match (method, parts.next().and_then(|r| r.chars().next())) {
        ("peer", Some(numalgo)) => format!("peer:{numalgo}"),
        _ => method.to_string(),
    }
}

fn decode_services(encoded: &str) -> Result<Vec<ServiceDescriptor>, ResolutionError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded.trim_end_matches('='))
        .map_err(|e| ResolutionError::InvalidService(format!("bad base64url: {e}")))?;
    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|e| ResolutionError::InvalidService(format!("bad json: {e}")))?;

    let items = match rewrite(value, Direction::Expand) {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        other => {
            return Err(ResolutionError::InvalidService(format!("unexpected service value: {other}")));
        }
    };

    items
        .into_iter()
        .map(|item| {
            serde_json::from_value(item).map_err(|e| ResolutionError::InvalidService(e.to_string()))
        })
        .collect()
}

#[derive(Clone, Copy)]
enum Direction {
    Abbreviate,
    Expand,
}

fn rewrite(value: Value, direction: Direction) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| {
                    let key = rewrite_key(key, direction);
                    let value = match value {
                        Value::String(s) if key == "type" || key == "t" => {
                            Value::String(rewrite_type(s, direction))
                        }
                        other => rewrite(other, direction),
                    };
                    (key, value)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(|v| rewrite(v, direction)).collect()),
        other => other,
    }
}

fn rewrite_key(key: String, direction: Direction) -> String {
    KEY_ABBREVIATIONS
        .iter()
        .find_map(|(long, short)| match direction {
            Direction::Abbreviate if key == *long => Some(short.to_string()),
            Direction::Expand if key == *short => Some(long.to_string()),
            _ => None,
        })
        .unwrap_or(key)
}

fn rewrite_type(value: String, direction: Direction) -> String {
    match direction {
        Direction::Abbreviate if value == DIDCOMM_MESSAGING => DIDCOMM_MESSAGING_ABBREVIATION.to_string(),
        Direction::Expand if value == DIDCOMM_MESSAGING_ABBREVIATION => DIDCOMM_MESSAGING.to_string(),
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::did::ServiceEndpoint;
    use crate::keygen;

    /// Published by a hosted agent; routes through a mediator.
    const AGENT_DID: &str = "did:peer:2.Vz6Mkh6Vii9dzFQ9FnUisinCr1prMn9U7CpvsFT6NzujAf9JM.Ez6LSmJNE7mhQpXcVMQR4yRPaxVH18GoMKsri4RmzXJZG71YG.SeyJ0IjoiZG0iLCJzIjp7InVyaSI6ImRpZDpwZWVyOjIuRXo2TFNqdFBDbzFXTDhKSHppYm02aUxhSFU0NkVhaG9hajZCVkRlenVWclpYNlFaMS5WejZNa3RBU0VRSDZMNkY2OEt3UjQ1TWlNSlFNQzF2djlSb3RNcDhpd3pGQ2ZLa3NaLlNXM3NpZENJNkltUnRJaXdpY3lJNkltaDBkSEJ6T2k4dlpHVjJMbU5zYjNWa2JXVmthV0YwYjNJdWFXNWthV05wYjNSbFkyZ3VhVzh2YldWemMyRm5aU0lzSW5JaU9sdGRMQ0poSWpwYkltUnBaR052YlcwdmRqSWlMQ0prYVdSamIyMXRMMkZwY0RJN1pXNTJQWEptWXpFNUlsMTlMSHNpZENJNkltUnRJaXdpY3lJNkluZHpjem92TDNkekxtUmxkaTVqYkc5MVpHMWxaR2xoZEc5eUxtbHVaR2xqYVc5MFpXTm9MbWx2TDNkeklpd2ljaUk2VzEwc0ltRWlPbHNpWkdsa1kyOXRiUzkyTWlJc0ltUnBaR052YlcwdllXbHdNanRsYm5ZOWNtWmpNVGtpWFgxZCIsImFjY2VwdCI6WyJkaWRjb21tL3YyIl19fQ";

    /// The mediator named in AGENT_DID's service endpoint.
    const MEDIATOR_DID: &str = "did:peer:2.Ez6LSjtPCo1WL8JHzibm6iLaHU46Eahoaj6BVDezuVrZX6QZ1.Vz6MktASEQH6L6F68KwR45MiMJQMC1vv9RotMp8iwzFCfKksZ.SW3sidCI6ImRtIiwicyI6Imh0dHBzOi8vZGV2LmNsb3VkbWVkaWF0b3IuaW5kaWNpb3RlY2guaW8vbWVzc2FnZSIsInIiOltdLCJhIjpbImRpZGNvbW0vdjIiLCJkaWRjb21tL2FpcDI7ZW52PXJmYzE5Il19LHsidCI6ImRtIiwicyI6IndzczovL3dzLmRldi5jbG91ZG1lZGlhdG9yLmluZGljaW90ZWNoLmlvL3dzIiwiciI6W10sImEiOlsiZGlkY29tbS92MiIsImRpZGNvbW0vYWlwMjtlbnY9cmZjMTkiXX1d";

    fn own_did() -> (keygen::KeyMaterial, String) {
        let km = keygen::generate();
        let did = PeerDid2
            .construct(
                &[
                    (KeyPurpose::Encryption, km.x25519.public.clone()),
                    (KeyPurpose::Verification, km.ed25519.public.clone()),
                ],
                &[ServiceDescriptor::didcomm("")],
            )
            .unwrap();
        (km, did)
    }

    #[test]
    fn constructed_did_resolves_to_its_keys() {
        let (km, did) = own_did();
        assert!(did.starts_with("did:peer:2.Ez6LS"));

        let doc = PeerDid2.resolve(&did).unwrap();
        assert_eq!(doc.id, did);
        assert_eq!(doc.verification_method.len(), 2);
        assert_eq!(doc.key_agreement, ["#key-1"]);
        assert_eq!(doc.authentication, ["#key-2"]);
        assert_eq!(doc.verification_method[0].public_key_multibase, km.x25519.public);
        assert_eq!(doc.verification_method[1].public_key_multibase, km.ed25519.public);
        assert_eq!(doc.key_agreement_methods().count(), 1);

        let svc = doc.didcomm_service().unwrap();
        assert_eq!(svc.id.as_deref(), Some("#service"));
        assert_eq!(svc.uri(), "");
        assert_eq!(svc.accepts().collect::<Vec<_>>(), ["didcomm/v2"]);
    }

    #[test]
    fn construction_is_deterministic() {
        let km = keygen::generate();
        let keys = [(KeyPurpose::Verification, km.ed25519.public.clone())];
        let services = [ServiceDescriptor::didcomm("https://agent.example/didcomm")];
        assert_eq!(
            PeerDid2.construct(&keys, &services).unwrap(),
            PeerDid2.construct(&keys, &services).unwrap()
        );
    }

    #[test]
    fn service_json_is_abbreviated() {
        let km = keygen::generate();
        let did = PeerDid2
            .construct(
                &[(KeyPurpose::Verification, km.ed25519.public.clone())],
                &[ServiceDescriptor::didcomm("https://agent.example")],
            )
            .unwrap();
        let encoded = did.rsplit(".S").next().unwrap();
        let json: Value = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(encoded).unwrap()).unwrap();
        assert_eq!(json["t"], "dm");
        assert_eq!(json["s"], "https://agent.example");
        assert_eq!(json["a"][0], "didcomm/v2");
    }

    #[test]
    fn resolves_published_agent_did() {
        let doc = PeerDid2.resolve(AGENT_DID).unwrap();
        assert_eq!(doc.authentication, ["#key-1"]);
        assert_eq!(doc.key_agreement, ["#key-2"]);

        let svc = doc.didcomm_service().unwrap();
        assert!(matches!(svc.service_endpoint, ServiceEndpoint::Object { .. }));
        assert_eq!(svc.uri(), MEDIATOR_DID);
    }

    #[test]
    fn resolves_mediator_service_list() {
        let doc = PeerDid2.resolve(MEDIATOR_DID).unwrap();
        assert_eq!(doc.service.len(), 2);
        assert_eq!(doc.service[0].id.as_deref(), Some("#service"));
        assert_eq!(doc.service[0].uri(), "https://dev.cloudmediator.indiciotech.io/message");
        assert_eq!(doc.service[1].id.as_deref(), Some("#service-1"));
        assert!(doc.service[1].uri().starts_with("wss://"));
    }

    #[test]
    fn rejects_non_did() {
        assert!(matches!(PeerDid2.resolve("hello"), Err(ResolutionError::NotADid(_))));
    }

    #[test]
    fn rejects_other_methods() {
        assert_eq!(
            PeerDid2.resolve("did:web:example.com"),
            Err(ResolutionError::UnsupportedMethod("web".into()))
        );
        assert_eq!(
            PeerDid2.resolve("did:peer:4zQmabc"),
            Err(ResolutionError::UnsupportedMethod("peer:4".into()))
        );
    }

    #[test]
    fn rejects_malformed_elements() {
        assert!(matches!(PeerDid2.resolve("did:peer:2"), Err(ResolutionError::Malformed(_))));
        assert!(matches!(PeerDid2.resolve("did:peer:2.Xz6Mk"), Err(ResolutionError::Malformed(_))));
        assert!(matches!(PeerDid2.resolve("did:peer:2.Vz6Mk"), Err(ResolutionError::InvalidKey(_))));
    }

    #[test]
    fn rejects_bad_service_encoding() {
        let (_, did) = own_did();
        let broken = format!("{did}.S!!!");
        assert!(matches!(PeerDid2.resolve(&broken), Err(ResolutionError::InvalidService(_))));
    }

    #[test]
    fn rejects_encryption_key_with_signing_kind() {
        let km = keygen::generate();
        let err = PeerDid2
            .construct(&[(KeyPurpose::Encryption, km.ed25519.public.clone())], &[])
            .unwrap_err();
        assert!(matches!(err, ResolutionError::InvalidKey(_)));
    }
}
