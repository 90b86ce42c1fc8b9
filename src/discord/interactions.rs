//! Interaction payloads and command dispatch.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Write;
use tracing::{error, info, warn};

use super::commands;
use crate::{
    agent::{AgentRequest, Asker, Persona},
    entities::{team, OrderStatus},
    errors::ServiceError,
    services::{orders::OrderSummary, parts::{PartPage, PartQuery}},
    AppState,
};

pub const PING: u8 = 1;
pub const APPLICATION_COMMAND: u8 = 2;

pub const PONG: u8 = 1;
pub const CHANNEL_MESSAGE: u8 = 4;
pub const DEFERRED_CHANNEL_MESSAGE: u8 = 5;

/// Message only visible to the invoking user.
pub const EPHEMERAL: u64 = 1 << 6;

const INVENTORY_ROWS: u64 = 25;
const ORDER_ROWS: usize = 15;

pub const NO_GUILD_REPLY: &str = "Use this command inside your team's Discord server.";
pub const UNLINKED_GUILD_REPLY: &str =
    "This server isn't linked to a team yet. A team admin can link it by setting the Discord server id in the team settings.";

#[derive(Debug, Clone, Deserialize)]
pub struct Interaction {
    #[serde(rename = "type")]
    pub kind: u8,
    pub id: String,
    pub token: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub member: Option<GuildMember>,
    #[serde(default)]
    pub user: Option<DiscordUser>,
    #[serde(default)]
    pub data: Option<CommandData>,
}

impl Interaction {
    /// Guild interactions carry the user under `member`, DMs at the top level.
    pub fn invoker(&self) -> Option<&DiscordUser> {
        self.member
            .as_ref()
            .and_then(|m| m.user.as_ref())
            .or(self.user.as_ref())
    }

    pub fn display_name(&self) -> String {
        self.member
            .as_ref()
            .and_then(|m| m.nick.clone())
            .or_else(|| self.invoker().and_then(|u| u.global_name.clone()))
            .or_else(|| self.invoker().map(|u| u.username.clone()))
            .unwrap_or_else(|| "Someone".to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuildMember {
    #[serde(default)]
    pub user: Option<DiscordUser>,
    #[serde(default)]
    pub nick: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandData {
    pub name: String,
    #[serde(default)]
    pub options: Vec<CommandDataOption>,
}

impl CommandData {
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.name == name)
            .and_then(|o| o.value.as_ref())
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandDataOption {
    pub name: String,
    #[serde(default)]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseData {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u64>,
}

impl InteractionResponse {
    pub fn pong() -> Self {
        Self { kind: PONG, data: None }
    }

    pub fn message(content: impl Into<String>) -> Self {
        Self {
            kind: CHANNEL_MESSAGE,
            data: Some(ResponseData {
                content: super::client::clamp_message(&content.into()),
                flags: None,
            }),
        }
    }

    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            kind: CHANNEL_MESSAGE,
            data: Some(ResponseData {
                content: content.into(),
                flags: Some(EPHEMERAL),
            }),
        }
    }

    pub fn deferred() -> Self {
        Self {
            kind: DEFERRED_CHANNEL_MESSAGE,
            data: None,
        }
    }
}

/// Dispatches a verified interaction.
pub async fn handle(state: &AppState, interaction: Interaction) -> Result<InteractionResponse, ServiceError> {
    match interaction.kind {
        PING => Ok(InteractionResponse::pong()),
        APPLICATION_COMMAND => handle_command(state, interaction).await,
        other => Err(ServiceError::InvalidInput(format!(
            "Unsupported interaction type {other}"
        ))),
    }
}

async fn handle_command(
    state: &AppState,
    interaction: Interaction,
) -> Result<InteractionResponse, ServiceError> {
    let Some(data) = interaction.data.clone() else {
        return Err(ServiceError::InvalidInput("Command interaction without data".into()));
    };

    let Some(guild_id) = interaction.guild_id.as_deref() else {
        return Ok(InteractionResponse::ephemeral(NO_GUILD_REPLY));
    };
    let Some(team) = state.services.teams.find_by_guild(guild_id).await? else {
        info!(guild_id, command = %data.name, "Command from unlinked guild");
        return Ok(InteractionResponse::ephemeral(UNLINKED_GUILD_REPLY));
    };

    match data.name.as_str() {
        commands::INVENTORY => {
            let low_only = data.option("filter") == Some("low_stock");
            let page = state
                .services
                .parts
                .list_parts(
                    team.id,
                    PartQuery {
                        search: data.option("search").map(str::to_string),
                        low_stock: Some(low_only),
                        page: Some(1),
                        per_page: Some(INVENTORY_ROWS),
                    },
                )
                .await?;
            Ok(InteractionResponse::message(render_inventory(&team, &page, low_only)))
        }
        commands::ORDERS => {
            let status = match data.option("status") {
                Some(raw) => match raw.parse::<OrderStatus>() {
                    Ok(status) => Some(status),
                    Err(_) => {
                        return Ok(InteractionResponse::ephemeral(format!(
                            "Unknown order status `{raw}`."
                        )))
                    }
                },
                None => None,
            };
            let orders = state
                .services
                .orders
                .summaries(team.id, status, ORDER_ROWS)
                .await?;
            Ok(InteractionResponse::message(render_orders(&team, &orders, status)))
        }
        commands::GLADOS | commands::ASK => {
            let (text_option, persona) = if data.name == commands::GLADOS {
                ("message", Some(Persona::Glados))
            } else {
                ("question", data.option("persona").and_then(|p| p.parse().ok()))
            };
            let Some(message) = data.option(text_option).map(str::to_string) else {
                return Ok(InteractionResponse::ephemeral("Say something first."));
            };

            let asker = resolve_asker(state, &team, &interaction).await?;
            let request = AgentRequest {
                channel_id: interaction
                    .channel_id
                    .clone()
                    .unwrap_or_else(|| guild_id.to_string()),
                team,
                asker,
                message,
                persona,
            };
            spawn_agent_turn(state, interaction.token.clone(), request);
            Ok(InteractionResponse::deferred())
        }
        other => {
            warn!(command = other, "Unknown slash command");
            Ok(InteractionResponse::ephemeral(format!("Unknown command /{other}")))
        }
    }
}

/// Maps the Discord user to an account and team role, falling back to a guest.
async fn resolve_asker(
    state: &AppState,
    team: &team::Model,
    interaction: &Interaction,
) -> Result<Asker, ServiceError> {
    let display_name = interaction.display_name();
    let Some(discord_user) = interaction.invoker() else {
        return Ok(Asker::guest(display_name));
    };
    let Some(account) = state.services.auth.find_by_discord_id(&discord_user.id).await? else {
        return Ok(Asker::guest(display_name));
    };

    let role = state
        .services
        .members
        .membership(team.id, account.id)
        .await?
        .map(|m| m.role.to_string());
    Ok(match role {
        Some(role) => Asker {
            user_id: Some(account.id),
            display_name,
            role,
        },
        None => Asker {
            user_id: Some(account.id),
            ..Asker::guest(display_name)
        },
    })
}

fn spawn_agent_turn(state: &AppState, interaction_token: String, request: AgentRequest) {
    let agent = state.agent.clone();
    let client = state.discord.client.clone();
    tokio::spawn(async move {
        let content = match agent.respond(request).await {
            Ok(reply) => reply.content,
            Err(e) => {
                error!(error = %e, "Assistant turn failed");
                "Something went wrong while thinking about that. Please try again.".to_string()
            }
        };
        match client {
            Some(client) => {
                if let Err(e) = client.edit_original_response(&interaction_token, &content).await {
                    error!(error = %e, "Failed to deliver assistant reply");
                }
            }
            None => warn!("Discord application id is not configured; reply dropped"),
        }
    });
}

pub fn render_inventory(team: &team::Model, page: &PartPage, low_only: bool) -> String {
    let mut out = String::new();
    let heading = if low_only { "Low-stock parts" } else { "Inventory" };
    let _ = writeln!(out, "**{heading} for {} #{}** ({} total)", team.name, team.number, page.total);
    if page.items.is_empty() {
        out.push_str(if low_only {
            "Nothing is low on stock."
        } else {
            "No parts found."
        });
        return out;
    }
    for item in &page.items {
        let flag = if item.low_stock { " ⚠️" } else { "" };
        let _ = write!(out, "- {}: {} (reorder at {})", item.part.name, item.part.quantity, item.part.reorder_point);
        if let Some(location) = item.part.location.as_deref() {
            let _ = write!(out, " @ {location}");
        }
        let _ = writeln!(out, "{flag}");
    }
    if page.total > page.items.len() as u64 {
        let _ = writeln!(out, "…and {} more", page.total - page.items.len() as u64);
    }
    out
}

pub fn render_orders(team: &team::Model, orders: &[OrderSummary], status: Option<OrderStatus>) -> String {
    let mut out = String::new();
    let scope = status.map(|s| s.to_string()).unwrap_or_else(|| "open".to_string());
    let _ = writeln!(out, "**{scope} orders for {} #{}**", team.name, team.number);
    if orders.is_empty() {
        out.push_str("No orders.");
        return out;
    }
    for order in orders {
        let _ = write!(out, "- {} [{}] ${}", order.vendor, order.status, order.total_amount.round_dp(2));
        if let Some(number) = order.order_number.as_deref() {
            let _ = write!(out, " #{number}");
        }
        let _ = writeln!(out, " ({} items)", order.item_count);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{part, Program};
    use crate::services::parts::PartResponse;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn team() -> team::Model {
        team::Model {
            id: Uuid::new_v4(),
            program: Program::Ftc,
            number: 5064,
            name: "Aperture Science".into(),
            season: "2024-2025".into(),
            discord_guild_id: Some("1".into()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn part(name: &str, quantity: i32, reorder_point: i32) -> PartResponse {
        PartResponse::from(part::Model {
            id: Uuid::new_v4(),
            team_id: Uuid::nil(),
            name: name.into(),
            part_number: None,
            category: None,
            description: None,
            location: Some("Bin 3".into()),
            quantity,
            reorder_point,
            vendor_id: None,
            unit_price: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }

    #[test]
    fn parses_guild_command() {
        let raw = r#"{
            "type": 2, "id": "1", "token": "tok", "guild_id": "g", "channel_id": "c",
            "member": {"nick": "Chell", "user": {"id": "u1", "username": "chell"}},
            "data": {"name": "ask", "options": [{"name": "question", "type": 3, "value": " how many servos? "}]}
        }"#;
        let interaction: Interaction = serde_json::from_str(raw).unwrap();
        assert_eq!(interaction.display_name(), "Chell");
        assert_eq!(interaction.invoker().unwrap().id, "u1");
        let data = interaction.data.unwrap();
        assert_eq!(data.option("question"), Some("how many servos?"));
        assert_eq!(data.option("persona"), None);
    }

    #[test]
    fn response_shapes() {
        assert_eq!(serde_json::to_value(InteractionResponse::pong()).unwrap(), serde_json::json!({"type": 1}));
        assert_eq!(serde_json::to_value(InteractionResponse::deferred()).unwrap(), serde_json::json!({"type": 5}));
        let ephemeral = serde_json::to_value(InteractionResponse::ephemeral("x")).unwrap();
        assert_eq!(ephemeral["data"]["flags"], 64);
    }

    #[test]
    fn inventory_rendering_flags_low_stock() {
        let page = PartPage {
            items: vec![part("REV Core Hex Motor", 2, 3), part("M4 screws", 400, 50)],
            total: 2,
            page: 1,
            per_page: 25,
        };
        let text = render_inventory(&team(), &page, false);
        assert!(text.contains("Aperture Science #5064"));
        assert!(text.contains("- REV Core Hex Motor: 2 (reorder at 3) @ Bin 3 ⚠️"));
        assert!(text.contains("- M4 screws: 400 (reorder at 50) @ Bin 3\n"));
    }

    #[test]
    fn empty_order_list() {
        let text = render_orders(&team(), &[], Some(OrderStatus::Pending));
        assert!(text.starts_with("**pending orders"));
        assert!(text.ends_with("No orders."));
    }

    #[test]
    fn order_rendering() {
        let orders = vec![OrderSummary {
            id: Uuid::new_v4(),
            vendor: "goBILDA".into(),
            status: OrderStatus::Ordered,
            order_number: Some("GB-1001".into()),
            total_amount: Decimal::new(4500, 2),
            item_count: 3,
        }];
        let text = render_orders(&team(), &orders, None);
        assert!(text.contains("- goBILDA [ordered] $45.00 #GB-1001 (3 items)"));
    }
}
