mod common;

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use serde_json::{json, Value};
use teamhub_api::{
    agent::{
        llm::{ChatMessage, FunctionCall, LlmClient, OpenAiCompatibleClient, ToolCall},
        Agent, AgentRequest, Asker, Persona, NOT_CONFIGURED_REPLY,
    },
    entities::conversation_message::MessageRole,
    errors::ServiceError,
};
use uuid::Uuid;
use wiremock::{
    matchers::{bearer_token, method, path},
    Mock, MockServer, ResponseTemplate,
};

use common::TestApp;

/// Replays canned replies and records what the agent sent.
#[derive(Default)]
struct ScriptedLlm {
    replies: Mutex<VecDeque<ChatMessage>>,
    calls: Mutex<Vec<(Vec<ChatMessage>, usize)>>,
}

impl ScriptedLlm {
    fn new(replies: Vec<ChatMessage>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::default(),
        })
    }

    fn calls(&self) -> Vec<(Vec<ChatMessage>, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, messages: &[ChatMessage], tools: &[Value]) -> Result<ChatMessage, ServiceError> {
        self.calls
            .lock()
            .unwrap()
            .push((messages.to_vec(), tools.len()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ServiceError::ExternalServiceError("script exhausted".into()))
    }
}

fn tool_request(name: &str, arguments: Value) -> ChatMessage {
    ChatMessage {
        role: "assistant".into(),
        content: None,
        tool_calls: Some(vec![ToolCall {
            id: format!("call_{name}"),
            kind: "function".into(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.to_string(),
            },
        }]),
        tool_call_id: None,
    }
}

async fn seeded_team(app: &TestApp) -> (Uuid, teamhub_api::entities::team::Model) {
    let owner = app.sign_up("owner@example.com", "Owner").await;
    let team_id = app.create_team(&owner, 5064, Some("guild-1")).await;
    app.create_part(&owner, team_id, "Servo", 1, 4).await;
    app.create_part(&owner, team_id, "M3 screw", 500, 50).await;
    let team = app.state.services.teams.get_team(team_id).await.unwrap();
    (owner.user_id, team)
}

fn request(team: teamhub_api::entities::team::Model, message: &str) -> AgentRequest {
    AgentRequest {
        team,
        channel_id: "build-channel".into(),
        asker: Asker::guest("Chell"),
        message: message.into(),
        persona: None,
    }
}

#[tokio::test]
async fn tool_results_feed_the_final_answer_and_history_is_saved() {
    let app = TestApp::new().await;
    let (_, team) = seeded_team(&app).await;
    let team_id = team.id;

    let llm = ScriptedLlm::new(vec![
        tool_request("query_inventory", json!({ "low_stock_only": true })),
        ChatMessage::assistant("You have 1 Servo left. Try not to break it."),
    ]);
    let agent = Agent::new(
        &app.state.services,
        Some(llm.clone() as Arc<dyn LlmClient>),
        None,
        3,
        Persona::Glados,
    );

    let reply = agent
        .respond(request(team, "what are we low on?"))
        .await
        .unwrap();
    assert_eq!(reply.content, "You have 1 Servo left. Try not to break it.");
    assert_eq!(reply.persona, Persona::Glados);
    assert_eq!(reply.tool_rounds, 1);
    assert!(!reply.serious_mode);

    let calls = llm.calls();
    assert_eq!(calls.len(), 2);
    let (first, offered) = &calls[0];
    assert!(*offered >= 3);
    assert_eq!(first[0].role, "system");
    assert!(first[0].content.as_deref().unwrap().contains("5064"));
    assert_eq!(first.last().unwrap().content.as_deref(), Some("Chell: what are we low on?"));

    let (second, _) = &calls[1];
    let tool_output = second
        .iter()
        .find(|m| m.role == "tool")
        .and_then(|m| m.content.clone())
        .expect("tool result passed back");
    let parsed: Value = serde_json::from_str(&tool_output).unwrap();
    assert_eq!(parsed["total_matching"], 1);
    assert_eq!(parsed["parts"][0]["name"], "Servo");

    let history = app
        .state
        .services
        .conversations
        .history(team_id, "build-channel")
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, MessageRole::User);
    assert_eq!(history[0].author.as_deref(), Some("Chell"));
    assert_eq!(history[1].role, MessageRole::Assistant);
}

#[tokio::test]
async fn stored_history_is_replayed_on_the_next_turn() {
    let app = TestApp::new().await;
    let (_, team) = seeded_team(&app).await;

    let llm = ScriptedLlm::new(vec![
        ChatMessage::assistant("Hello, test subject."),
        ChatMessage::assistant("Still here."),
    ]);
    let agent = Agent::new(&app.state.services, Some(llm.clone() as Arc<dyn LlmClient>), None, 3, Persona::Glados);

    agent.respond(request(team.clone(), "hello")).await.unwrap();
    let mut second = request(team, "are you there?");
    second.persona = Some(Persona::Wheatley);
    let reply = agent.respond(second).await.unwrap();
    assert_eq!(reply.persona, Persona::Wheatley);

    let calls = llm.calls();
    let replayed: Vec<Option<&str>> = calls[1]
        .0
        .iter()
        .skip(1)
        .map(|m| m.content.as_deref())
        .collect();
    assert_eq!(
        replayed,
        [
            Some("Chell: hello"),
            Some("Hello, test subject."),
            Some("Chell: are you there?"),
        ]
    );
}

#[tokio::test]
async fn tool_rounds_are_capped_and_the_last_call_offers_no_tools() {
    let app = TestApp::new().await;
    let (_, team) = seeded_team(&app).await;

    let llm = ScriptedLlm::new(vec![
        tool_request("get_bom_status", json!({})),
        tool_request("get_order_summary", json!({})),
        tool_request("query_inventory", json!({})),
    ]);
    let agent = Agent::new(&app.state.services, Some(llm.clone() as Arc<dyn LlmClient>), None, 2, Persona::Neutral);

    let reply = agent.respond(request(team, "status report")).await.unwrap();
    assert_eq!(reply.tool_rounds, 2);
    assert_eq!(reply.content, teamhub_api::agent::EMPTY_ANSWER_REPLY);

    let calls = llm.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls[0].1 > 0);
    assert!(calls[1].1 > 0);
    assert_eq!(calls[2].1, 0);
}

#[tokio::test]
async fn crisis_messages_switch_to_serious_mode() {
    let app = TestApp::new().await;
    let (_, team) = seeded_team(&app).await;

    let llm = ScriptedLlm::new(vec![ChatMessage::assistant("Please talk to a mentor you trust.")]);
    let agent = Agent::new(&app.state.services, Some(llm.clone() as Arc<dyn LlmClient>), None, 3, Persona::Glados);

    let reply = agent
        .respond(request(team, "I'm being bullied at school"))
        .await
        .unwrap();
    assert!(reply.serious_mode);
    let system = llm.calls()[0].0[0].content.clone().unwrap();
    assert!(system.contains("SERIOUS MODE"));
}

#[tokio::test]
async fn unconfigured_agent_answers_without_saving() {
    let app = TestApp::new().await;
    let (_, team) = seeded_team(&app).await;
    let team_id = team.id;
    let agent = Agent::new(&app.state.services, None, None, 3, Persona::Glados);
    assert!(!agent.is_configured());

    let reply = agent.respond(request(team, "hello?")).await.unwrap();
    assert_eq!(reply.content, NOT_CONFIGURED_REPLY);
    assert!(app
        .state
        .services
        .conversations
        .history(team_id, "build-channel")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn openai_compatible_client_parses_tool_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(bearer_token("sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": { "name": "get_bom_status", "arguments": "{}" }
                    }]
                }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAiCompatibleClient::new(
        "sk-test".into(),
        "gpt-4o-mini".into(),
        format!("{}/v1/", server.uri()),
    )
    .unwrap();
    let reply = client
        .complete(&[ChatMessage::user("status?")], &[])
        .await
        .unwrap();
    assert_eq!(reply.requested_tools()[0].function.name, "get_bom_status");
}

#[tokio::test]
async fn provider_errors_surface_as_external_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let client =
        OpenAiCompatibleClient::new("sk-test".into(), "gpt-4o-mini".into(), server.uri()).unwrap();
    let err = client
        .complete(&[ChatMessage::user("hi")], &[])
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ExternalServiceError(_)));
}
