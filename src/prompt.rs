//! Where the target DID comes from.

use std::io::Write as _;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::error::AppError;

/// Supplies the counterparty DID once per session.
#[allow(async_fn_in_trait)]
pub trait TargetPrompt {
    async fn read_target(&mut self, self_did: &str) -> Result<String, AppError>;
}

/// A target known up front (CLI flag, config, tests).
#[derive(Debug, Clone)]
pub struct FixedTarget(pub String);

impl TargetPrompt for FixedTarget {
    async fn read_target(&mut self, _self_did: &str) -> Result<String, AppError> {
        Ok(self.0.clone())
    }
}

/// Shows our DID on stdout and reads one line from stdin.
#[derive(Debug, Default)]
pub struct StdinPrompt;

impl TargetPrompt for StdinPrompt {
    async fn read_target(&mut self, self_did: &str) -> Result<String, AppError> {
        println!("did: {self_did}");
        print!("Target DID: ");
        let _ = std::io::stdout().flush();

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        match lines.next_line().await? {
            Some(line) => Ok(line.trim().to_string()),
            None => Err(AppError::Prompt("stdin closed before a target DID was entered".into())),
        }
    }
}
