//! Team assistant behind the Discord `/glados` and `/ask` commands.
//!
//! A turn builds the system prompt from live team data, replays the stored
//! channel history, and lets the model call tools for a bounded number of
//! rounds before its final answer is stored alongside the user's message.

pub mod llm;
pub mod prompt;
pub mod safety;
pub mod tools;
pub mod web_search;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::{Display, EnumString};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    entities::{conversation_message::MessageRole, team},
    errors::ServiceError,
    handlers::AppServices,
    services::{
        conversations::{ConversationService, NewMessage},
        orders::OrderService,
        parts::PartService,
        teams::TeamService,
    },
};
use llm::{ChatMessage, LlmClient, OpenAiCompatibleClient};
use prompt::{InventorySnapshot, LowStockLine, PendingOrderLine, PromptContext, SiblingTeam};
use tools::ToolExecutor;
use web_search::{BraveSearchClient, WebSearch};

pub const NOT_CONFIGURED_REPLY: &str =
    "The assistant is not configured yet. Ask a team admin to set an LLM API key.";
pub const EMPTY_ANSWER_REPLY: &str = "I don't have an answer for that right now.";

/// Role reported to the model for Discord users without a linked account.
pub const GUEST_ROLE: &str = "guest";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Persona {
    #[default]
    Glados,
    Wheatley,
    Neutral,
}

impl Persona {
    pub const ALL: [Persona; 3] = [Persona::Glados, Persona::Wheatley, Persona::Neutral];

    pub fn display_name(&self) -> &'static str {
        match self {
            Persona::Glados => "GLaDOS",
            Persona::Wheatley => "Wheatley",
            Persona::Neutral => "Assistant",
        }
    }
}

/// Who is asking
#[derive(Debug, Clone)]
pub struct Asker {
    pub user_id: Option<Uuid>,
    pub display_name: String,
    pub role: String,
}

impl Asker {
    pub fn guest(display_name: impl Into<String>) -> Self {
        Self {
            user_id: None,
            display_name: display_name.into(),
            role: GUEST_ROLE.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub team: team::Model,
    pub channel_id: String,
    pub asker: Asker,
    pub message: String,
    pub persona: Option<Persona>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentReply {
    pub content: String,
    pub persona: Persona,
    pub serious_mode: bool,
    pub tool_rounds: u32,
}

#[derive(Clone)]
pub struct Agent {
    llm: Option<Arc<dyn LlmClient>>,
    tools: ToolExecutor,
    conversations: Arc<ConversationService>,
    parts: Arc<PartService>,
    orders: Arc<OrderService>,
    teams: Arc<TeamService>,
    max_tool_rounds: u32,
    default_persona: Persona,
}

impl Agent {
    pub fn new(
        services: &AppServices,
        llm: Option<Arc<dyn LlmClient>>,
        web_search: Option<Arc<dyn WebSearch>>,
        max_tool_rounds: u32,
        default_persona: Persona,
    ) -> Self {
        Self {
            llm,
            tools: ToolExecutor::new(
                services.parts.clone(),
                services.bom.clone(),
                services.orders.clone(),
                web_search,
            ),
            conversations: services.conversations.clone(),
            parts: services.parts.clone(),
            orders: services.orders.clone(),
            teams: services.teams.clone(),
            max_tool_rounds,
            default_persona,
        }
    }

    /// Wires the HTTP-backed model and search clients from configuration.
    pub fn from_config(services: &AppServices, config: &AppConfig) -> Result<Self, ServiceError> {
        let llm = match config.llm_api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            Some(key) => Some(Arc::new(OpenAiCompatibleClient::new(
                key.to_string(),
                config.llm_model.clone(),
                config.llm_base_url.clone(),
            )?) as Arc<dyn LlmClient>),
            None => {
                warn!("No LLM API key configured; assistant replies are disabled");
                None
            }
        };
        let web_search = match config.web_search_api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            Some(key) => Some(Arc::new(BraveSearchClient::new(
                key.to_string(),
                config.web_search_endpoint.clone(),
            )?) as Arc<dyn WebSearch>),
            None => None,
        };
        let persona = config.default_persona.parse().unwrap_or_default();

        Ok(Self::new(
            services,
            llm,
            web_search,
            config.agent_max_tool_rounds,
            persona,
        ))
    }

    pub fn is_configured(&self) -> bool {
        self.llm.is_some()
    }

    pub fn default_persona(&self) -> Persona {
        self.default_persona
    }

    /// Runs one conversational turn.
    #[instrument(skip(self, request), fields(team_id = %request.team.id, channel = %request.channel_id))]
    pub async fn respond(&self, request: AgentRequest) -> Result<AgentReply, ServiceError> {
        let persona = request.persona.unwrap_or(self.default_persona);
        let serious_mode = safety::requires_serious_mode(&request.message);

        let Some(llm) = &self.llm else {
            return Ok(AgentReply {
                content: NOT_CONFIGURED_REPLY.to_string(),
                persona,
                serious_mode,
                tool_rounds: 0,
            });
        };

        let context = self.prompt_context(&request, persona, serious_mode).await?;
        let mut messages = vec![ChatMessage::system(prompt::build_system_prompt(&context))];
        for stored in self
            .conversations
            .history(request.team.id, &request.channel_id)
            .await?
        {
            messages.push(match stored.role {
                MessageRole::User => ChatMessage::user(match stored.author {
                    Some(author) => format!("{author}: {}", stored.content),
                    None => stored.content,
                }),
                MessageRole::Assistant => ChatMessage::assistant(stored.content),
            });
        }
        messages.push(ChatMessage::user(format!(
            "{}: {}",
            request.asker.display_name, request.message
        )));

        let definitions = self.tools.definitions();
        let mut tool_rounds = 0;
        let answer = loop {
            let offered: &[serde_json::Value] = if tool_rounds < self.max_tool_rounds {
                &definitions
            } else {
                &[]
            };
            let reply = llm.complete(&messages, offered).await?;
            if reply.requested_tools().is_empty() || tool_rounds >= self.max_tool_rounds {
                break reply.content.unwrap_or_default();
            }

            tool_rounds += 1;
            let calls = reply.requested_tools().to_vec();
            messages.push(reply);
            for call in calls {
                let output = self
                    .tools
                    .execute(request.team.id, &call.function.name, &call.function.arguments)
                    .await;
                messages.push(ChatMessage::tool_result(call.id, output.to_string()));
            }
        };

        let content = if answer.trim().is_empty() {
            EMPTY_ANSWER_REPLY.to_string()
        } else {
            answer
        };

        self.conversations
            .append_messages(
                request.team.id,
                &request.channel_id,
                &persona.to_string(),
                vec![
                    NewMessage::user(request.asker.display_name.clone(), request.message.clone()),
                    NewMessage::assistant(content.clone()),
                ],
            )
            .await?;

        info!(persona = %persona, serious_mode, tool_rounds, "Assistant replied");
        Ok(AgentReply {
            content,
            persona,
            serious_mode,
            tool_rounds,
        })
    }

    async fn prompt_context(
        &self,
        request: &AgentRequest,
        persona: Persona,
        serious_mode: bool,
    ) -> Result<PromptContext, ServiceError> {
        let team = &request.team;
        let inventory = self.parts.summary(team.id, prompt::LIST_LIMIT).await?;
        let orders = self.orders.summaries(team.id, None, prompt::LIST_LIMIT).await?;

        let other_teams = match request.asker.user_id {
            Some(user_id) => self
                .teams
                .list_for_user(user_id)
                .await?
                .into_iter()
                .filter(|t| t.team.id != team.id)
                .map(|t| SiblingTeam {
                    program: t.team.program.to_string(),
                    number: t.team.number,
                    name: t.team.name,
                })
                .collect(),
            None => Vec::new(),
        };

        Ok(PromptContext {
            persona,
            team_name: Some(team.name.clone()),
            team_number: Some(team.number),
            program: Some(team.program.to_string()),
            season: Some(team.season.clone()),
            inventory: InventorySnapshot {
                part_count: inventory.part_count,
                total_units: inventory.total_units,
                low_stock: inventory
                    .low_stock
                    .into_iter()
                    .map(|p| LowStockLine {
                        name: p.name,
                        quantity: p.quantity,
                        reorder_point: p.reorder_point,
                    })
                    .collect(),
            },
            pending_orders: orders
                .into_iter()
                .map(|o| PendingOrderLine {
                    vendor: o.vendor,
                    status: o.status.to_string(),
                    total: o.total_amount,
                })
                .collect(),
            user_name: Some(request.asker.display_name.clone()),
            user_role: request.asker.role.clone(),
            other_teams,
            serious_mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persona_parses_case_insensitively() {
        assert_eq!("GLaDOS".parse::<Persona>().unwrap(), Persona::Glados);
        assert_eq!("wheatley".parse::<Persona>().unwrap(), Persona::Wheatley);
        assert!("cave johnson".parse::<Persona>().is_err());
    }

    #[test]
    fn persona_display_matches_command_choices() {
        let names: Vec<String> = Persona::ALL.iter().map(|p| p.to_string()).collect();
        assert_eq!(names, ["glados", "wheatley", "neutral"]);
    }
}
