//! A scripted DIDComm agent: load or create a did:peer:2 identity, validate
//! a counterparty DID, then send it an ordered list of messages.

pub mod codec;
pub mod config;
pub mod did;
pub mod dispatch;
pub mod error;
pub mod identity;
pub mod keygen;
pub mod logger;
pub mod message;
pub mod prompt;
pub mod secrets;
pub mod session;
