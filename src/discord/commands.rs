//! Slash command definitions and registration.

use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument};

use super::client::DiscordClient;
use crate::{agent::Persona, entities::OrderStatus, errors::ServiceError};

pub const GLADOS: &str = "glados";
pub const ASK: &str = "ask";
pub const INVENTORY: &str = "inventory";
pub const ORDERS: &str = "orders";

const CHAT_INPUT: u8 = 1;
const STRING_OPTION: u8 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandChoice {
    pub name: String,
    pub value: String,
}

impl CommandChoice {
    fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOption {
    #[serde(rename = "type")]
    pub kind: u8,
    pub name: String,
    pub description: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<CommandChoice>,
}

impl CommandOption {
    fn string(name: &str, description: &str, required: bool) -> Self {
        Self {
            kind: STRING_OPTION,
            name: name.to_string(),
            description: description.to_string(),
            required,
            choices: Vec::new(),
        }
    }

    fn with_choices(mut self, choices: Vec<CommandChoice>) -> Self {
        self.choices = choices;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandDefinition {
    #[serde(rename = "type")]
    pub kind: u8,
    pub name: String,
    pub description: String,
    pub options: Vec<CommandOption>,
}

/// The four commands this bot answers.
pub fn definitions() -> Vec<CommandDefinition> {
    let personas = Persona::ALL
        .iter()
        .map(|p| CommandChoice::new(p.display_name(), p.to_string()))
        .collect();
    let statuses = OrderStatus::ALL
        .iter()
        .map(|s| CommandChoice::new(s.to_string(), s.to_string()))
        .collect();

    vec![
        CommandDefinition {
            kind: CHAT_INPUT,
            name: GLADOS.into(),
            description: "Talk to GLaDOS about the team's parts, BOM and orders".into(),
            options: vec![CommandOption::string("message", "What do you want to say?", true)],
        },
        CommandDefinition {
            kind: CHAT_INPUT,
            name: ASK.into(),
            description: "Ask the team assistant a question".into(),
            options: vec![
                CommandOption::string("question", "Your question", true),
                CommandOption::string("persona", "Who should answer", false).with_choices(personas),
            ],
        },
        CommandDefinition {
            kind: CHAT_INPUT,
            name: INVENTORY.into(),
            description: "Show the team's parts inventory".into(),
            options: vec![
                CommandOption::string("filter", "Which parts to show", false).with_choices(vec![
                    CommandChoice::new("All parts", "all"),
                    CommandChoice::new("Low stock", "low_stock"),
                ]),
                CommandOption::string("search", "Name, part number or category", false),
            ],
        },
        CommandDefinition {
            kind: CHAT_INPUT,
            name: ORDERS.into(),
            description: "Show the team's purchase orders".into(),
            options: vec![CommandOption::string("status", "Only orders in this status", false)
                .with_choices(statuses)],
        },
    ]
}

/// Overwrites the application's commands, globally or for one guild.
#[instrument(skip(client))]
pub async fn register(client: &DiscordClient, guild_id: Option<&str>) -> Result<Vec<Value>, ServiceError> {
    let commands = definitions();
    let registered = client.put_commands(guild_id, &commands).await?;
    info!(count = registered.len(), guild = guild_id.unwrap_or("global"), "Registered slash commands");
    Ok(registered)
}
