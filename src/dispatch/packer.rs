//! Plaintext envelope packer.
//!
//! Produces DIDComm v2 plaintext envelopes (`application/didcomm-plain+json`)
//! and picks the destination from the recipient's `DIDCommMessaging`
//! service. When that service names a mediator (a DID endpoint or routing
//! keys) the message is wrapped in `routing/2.0/forward` messages, outermost
//! hop first. No encryption is applied: an authcrypt packer implements the
//! same [`EnvelopePacker`] trait.

use serde_json::{Value, json};
use uuid::Uuid;

use super::{EnvelopePacker, PackConfig, PackError, PackedMessage};
use crate::did::DidResolver;
use crate::message::Message;

pub const PLAINTEXT_MEDIA_TYPE: &str = "application/didcomm-plain+json";
pub const FORWARD_TYPE: &str = "https://didcomm.org/routing/2.0/forward";

#[derive(Debug, Clone)]
pub struct PlaintextPacker<R> {
    resolver: R,
}

impl<R: DidResolver> PlaintextPacker<R> {
    pub fn new(resolver: R) -> Self {
        Self { resolver }
    }

    /// First http(s) DIDComm endpoint of a mediator DID.
    fn mediator_endpoint(&self, mediator: &str) -> Result<String, PackError> {
        let doc = self.resolver.resolve(mediator)?;
        doc.service
            .iter()
            .filter(|s| s.is_didcomm_v2())
            .map(|s| s.uri())
            .find(|uri| is_http(uri))
            .map(str::to_string)
            .ok_or_else(|| PackError::NoEndpoint(mediator.to_string()))
    }
}

impl<R: DidResolver> EnvelopePacker for PlaintextPacker<R> {
    async fn pack(
        &self,
        config: &PackConfig<'_>,
        message: &Message,
        from: &str,
        to: &str,
    ) -> Result<PackedMessage, PackError> {
        if message.from != from || config.sender.did != from {
            return Err(PackError::SenderMismatch {
                message_from: message.from.clone(),
                sender: config.sender.did.clone(),
            });
        }
        if !message.is_addressed_to(to) {
            return Err(PackError::RecipientMismatch(to.to_string()));
        }

        let recipient = self.resolver.resolve(to)?;
        let service = recipient
            .didcomm_service()
            .ok_or_else(|| PackError::NoService(to.to_string()))?;

        let uri = service.uri();
        let mut hops: Vec<String> = service.routing_keys().map(str::to_string).collect();
        let endpoint = if uri.starts_with("did:") {
            hops.insert(0, uri.to_string());
            self.mediator_endpoint(uri)?
        } else if is_http(uri) {
            uri.to_string()
        } else {
            return Err(PackError::NoEndpoint(to.to_string()));
        };

        let mut envelope = plaintext(message)?;
        if !hops.is_empty() {
            if !config.forward {
                return Err(PackError::ForwardingDisabled(to.to_string()));
            }
            let mut next = to.to_string();
            for hop in hops.iter().rev() {
                envelope = forward(hop, &next, envelope);
                next = hop.clone();
            }
        }

        Ok(PackedMessage {
            blob: envelope.to_string(),
            service_endpoint: endpoint,
            media_type: PLAINTEXT_MEDIA_TYPE.to_string(),
        })
    }
}

fn is_http(uri: &str) -> bool {
    uri.starts_with("https://") || uri.starts_with("http://")
}

fn plaintext(message: &Message) -> Result<Value, PackError> {
    let mut value = serde_json::to_value(message).map_err(|e| PackError::Serialize(e.to_string()))?;
    if let Value::Object(map) = &mut value {
        map.insert("typ".to_string(), Value::String(PLAINTEXT_MEDIA_TYPE.to_string()));
    }
    Ok(value)
}

fn forward(hop: &str, next: &str, inner: Value) -> Value {
    json!({
        "id": Uuid::new_v4().to_string(),
        "typ": PLAINTEXT_MEDIA_TYPE,
        "type": FORWARD_TYPE,
        "to": [hop],
        "body": { "next": next },
        "attachments": [{ "data": { "json": inner } }],
    })
}
