//! Discord slash-command bot.

pub mod client;
pub mod commands;
pub mod interactions;
pub mod signature;

use tracing::warn;

use crate::{config::AppConfig, errors::ServiceError};
use client::DiscordClient;
use signature::SignatureVerifier;

/// Verifier and REST client, each present only when configured
#[derive(Debug, Clone, Default)]
pub struct DiscordIntegration {
    pub verifier: Option<SignatureVerifier>,
    pub client: Option<DiscordClient>,
}

impl DiscordIntegration {
    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        let verifier = match config.discord_public_key.as_deref().filter(|k| !k.trim().is_empty()) {
            Some(key) => Some(SignatureVerifier::from_hex(key)?),
            None => {
                warn!("No Discord public key configured; interactions endpoint is disabled");
                None
            }
        };
        Ok(Self {
            verifier,
            client: DiscordClient::from_config(config)?,
        })
    }
}
