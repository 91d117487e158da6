//! Message dispatch: pack one message, post it, report the outcome.
//!
//! Packing and delivery are capabilities behind [`EnvelopePacker`] and
//! [`Transport`]. The dispatcher never retries and never propagates a
//! per-message failure: it returns a [`SendOutcome`] and the caller moves on.

pub mod packer;
pub mod transport;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::ResolutionError;
use crate::identity::Identity;
use crate::message::Message;

pub use packer::PlaintextPacker;
pub use transport::HttpTransport;

/// Packing options bound to the sending identity.
#[derive(Debug, Clone, Copy)]
pub struct PackConfig<'a> {
    /// Wrap the message for mediators named in the recipient's service.
    pub forward: bool,
    pub sender: &'a Identity,
}

/// Envelope ready for the wire. Lives for a single send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedMessage {
    pub blob: String,
    pub service_endpoint: String,
    pub media_type: String,
}

#[derive(Debug, Error)]
pub enum PackError {
    #[error("cannot resolve recipient: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("{0} has no DIDComm v2 service")]
    NoService(String),

    #[error("{0} has no reachable service endpoint")]
    NoEndpoint(String),

    #[error("{0} requires forwarding but forwarding is disabled")]
    ForwardingDisabled(String),

    #[error("message from '{message_from}' cannot be packed as '{sender}'")]
    SenderMismatch { message_from: String, sender: String },

    #[error("message is not addressed to '{0}'")]
    RecipientMismatch(String),

    #[error("cannot serialize envelope: {0}")]
    Serialize(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Error)]
#[error("POST {endpoint} failed: {reason}")]
pub struct TransportError {
    pub endpoint: String,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("packing failed: {0}")]
    Pack(#[from] PackError),

    #[error("transport failed: {0}")]
    Transport(#[from] TransportError),
}

#[derive(Debug)]
pub enum SendOutcome {
    /// The endpoint answered. Any status counts; delivery is best effort.
    Delivered { status: u16 },
    Failed(DispatchError),
}

impl SendOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, SendOutcome::Failed(_))
    }
}

/// Turns a plaintext message into a wire envelope plus destination.
#[allow(async_fn_in_trait)]
pub trait EnvelopePacker {
    async fn pack(
        &self,
        config: &PackConfig<'_>,
        message: &Message,
        from: &str,
        to: &str,
    ) -> Result<PackedMessage, PackError>;
}

/// Delivers a packed blob.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn post(
        &self,
        endpoint: &str,
        media_type: &str,
        blob: String,
    ) -> Result<TransportResponse, TransportError>;
}

pub struct MessageDispatcher<P, T> {
    packer: P,
    transport: T,
    forward: bool,
}

impl<P: EnvelopePacker, T: Transport> MessageDispatcher<P, T> {
    pub fn new(packer: P, transport: T) -> Self {
        Self { packer, transport, forward: true }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Assemble a message with a fresh id. No I/O.
    pub fn build_message(&self, message_type: &str, body: Value, from: &str, to: &str) -> Message {
        Message::new(message_type, body, from, to)
    }

    /// Pack and post one message. Completes before returning; never panics
    /// or errors past this boundary.
    pub async fn send(&self, message: &Message, from: &Identity, to: &str) -> SendOutcome {
        let config = PackConfig { forward: self.forward, sender: from };

        let packed = match self.packer.pack(&config, message, &from.did, to).await {
            Ok(packed) => packed,
            Err(e) => {
                warn!(message_id = %message.id, message_type = %message.message_type, error = %e, "packing failed");
                return SendOutcome::Failed(e.into());
            }
        };

        debug!(
            message_id = %message.id,
            endpoint = %packed.service_endpoint,
            blob = %packed.blob,
            "packed message"
        );
        info!(message_type = %message.message_type, "sending message to target DID");

        match self
            .transport
            .post(&packed.service_endpoint, &packed.media_type, packed.blob)
            .await
        {
            Ok(response) => {
                log_response(&message.id, &response);
                SendOutcome::Delivered { status: response.status }
            }
            Err(e) => {
                warn!(message_id = %message.id, error = %e, "transport failed");
                SendOutcome::Failed(e.into())
            }
        }
    }
}

/// Responses are diagnostics only.
fn log_response(message_id: &str, response: &TransportResponse) {
    if !(200..300).contains(&response.status) {
        warn!(message_id, status = response.status, "endpoint answered with non-success status");
    }
    match serde_json::from_str::<Value>(&response.body) {
        Ok(json) => debug!(message_id, status = response.status, response = %json, "endpoint response"),
        Err(_) if response.body.is_empty() => debug!(message_id, status = response.status, "empty response body"),
        Err(_) => debug!(message_id, status = response.status, "response body is not JSON"),
    }
}
