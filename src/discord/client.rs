use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{error, instrument};

use super::commands::CommandDefinition;
use crate::{config::AppConfig, errors::ServiceError};

/// Discord caps message content at 2000 characters.
pub const MAX_MESSAGE_LEN: usize = 2000;

/// Cuts `content` to Discord's message limit on a character boundary.
pub fn clamp_message(content: &str) -> String {
    if content.chars().count() <= MAX_MESSAGE_LEN {
        return content.to_string();
    }
    let mut clipped: String = content.chars().take(MAX_MESSAGE_LEN - 1).collect();
    clipped.push('…');
    clipped
}

/// REST client for the parts of the Discord API this bot touches
#[derive(Debug, Clone)]
pub struct DiscordClient {
    api_base: String,
    application_id: String,
    bot_token: Option<String>,
    client: Client,
}

impl DiscordClient {
    pub fn new(
        api_base: impl Into<String>,
        application_id: impl Into<String>,
        bot_token: Option<String>,
    ) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| ServiceError::InternalError(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            application_id: application_id.into(),
            bot_token,
            client,
        })
    }

    /// `None` when no application id is configured.
    pub fn from_config(config: &AppConfig) -> Result<Option<Self>, ServiceError> {
        match config.discord_application_id.as_deref().filter(|id| !id.trim().is_empty()) {
            Some(app_id) => Ok(Some(Self::new(
                config.discord_api_base.clone(),
                app_id,
                config.discord_bot_token.clone(),
            )?)),
            None => Ok(None),
        }
    }

    fn commands_url(&self, guild_id: Option<&str>) -> String {
        match guild_id {
            Some(guild) => format!(
                "{}/applications/{}/guilds/{}/commands",
                self.api_base, self.application_id, guild
            ),
            None => format!("{}/applications/{}/commands", self.api_base, self.application_id),
        }
    }

    /// Bulk-overwrites slash commands. Requires a bot token.
    #[instrument(skip(self, commands))]
    pub async fn put_commands(
        &self,
        guild_id: Option<&str>,
        commands: &[CommandDefinition],
    ) -> Result<Vec<Value>, ServiceError> {
        let token = self
            .bot_token
            .as_deref()
            .ok_or_else(|| ServiceError::InvalidInput("A Discord bot token is required to register commands".into()))?;

        let response = self
            .client
            .put(self.commands_url(guild_id))
            .header("Authorization", format!("Bot {token}"))
            .json(commands)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Command registration failed");
            return Err(ServiceError::ExternalServiceError(format!(
                "Discord returned {status} while registering commands"
            )));
        }
        Ok(response.json().await?)
    }

    /// Replaces the deferred "thinking" placeholder with the final reply.
    #[instrument(skip(self, interaction_token, content))]
    pub async fn edit_original_response(
        &self,
        interaction_token: &str,
        content: &str,
    ) -> Result<(), ServiceError> {
        let url = format!(
            "{}/webhooks/{}/{}/messages/@original",
            self.api_base, self.application_id, interaction_token
        );
        let response = self
            .client
            .patch(url)
            .json(&json!({ "content": clamp_message(content) }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            error!(status = %status, "Failed to edit interaction response");
            return Err(ServiceError::ExternalServiceError(format!(
                "Discord returned {status} while editing a response"
            )));
        }
        Ok(())
    }
}
