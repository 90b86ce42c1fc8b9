mod common;

use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
};
use chrono::Utc;
use ed25519_dalek::{Signer, SigningKey};
use serde_json::{json, Value};
use teamhub_api::{
    agent::NOT_CONFIGURED_REPLY,
    discord::{
        client::DiscordClient,
        commands,
        interactions::{UNLINKED_GUILD_REPLY, NO_GUILD_REPLY},
    },
};
use wiremock::{
    matchers::{header as header_matcher, method, path},
    Mock, MockServer, ResponseTemplate,
};

use common::{response_json, TestApp};

fn signing_key() -> SigningKey {
    SigningKey::from_bytes(&[42u8; 32])
}

async fn discord_app(api_base: &str) -> TestApp {
    let public_key = hex::encode(signing_key().verifying_key().to_bytes());
    let api_base = api_base.to_string();
    TestApp::with_config(move |cfg| {
        cfg.discord_public_key = Some(public_key);
        cfg.discord_application_id = Some("app-1".into());
        cfg.discord_api_base = api_base;
    })
    .await
}

async fn interact(app: &TestApp, payload: &Value, signer: &SigningKey) -> Response {
    interact_at(app, payload, signer, &Utc::now().timestamp().to_string()).await
}

async fn interact_at(app: &TestApp, payload: &Value, signer: &SigningKey, timestamp: &str) -> Response {
    let body = payload.to_string();
    let signature = signer.sign(&[timestamp.as_bytes(), body.as_bytes()].concat());
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/discord/interactions")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-signature-ed25519", hex::encode(signature.to_bytes()))
        .header("x-signature-timestamp", timestamp)
        .body(Body::from(body))
        .unwrap();
    app.send(request).await
}

fn command(guild_id: Option<&str>, name: &str, options: Value) -> Value {
    json!({
        "type": 2,
        "id": "interaction-1",
        "token": "interaction-token",
        "guild_id": guild_id,
        "channel_id": "channel-9",
        "member": { "nick": "Chell", "user": { "id": "discord-42", "username": "chell" } },
        "data": { "name": name, "options": options }
    })
}

#[tokio::test]
async fn signed_ping_gets_pong() {
    let app = discord_app("http://127.0.0.1:9").await;
    let response = interact(&app, &json!({ "type": 1, "id": "1", "token": "t" }), &signing_key()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await, json!({ "type": 1 }));
}

#[tokio::test]
async fn bad_or_missing_signatures_are_rejected() {
    let app = discord_app("http://127.0.0.1:9").await;
    let impostor = SigningKey::from_bytes(&[7u8; 32]);
    let forged = interact(&app, &json!({ "type": 1, "id": "1", "token": "t" }), &impostor).await;
    assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);

    let unsigned = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/discord/interactions")
                .body(Body::from(r#"{"type":1}"#))
                .unwrap(),
        )
        .await;
    assert_eq!(unsigned.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn replayed_interactions_are_rejected() {
    let app = discord_app("http://127.0.0.1:9").await;
    let ping = json!({ "type": 1, "id": "1", "token": "t" });

    let old = interact_at(&app, &ping, &signing_key(), "1700000000").await;
    assert_eq!(old.status(), StatusCode::UNAUTHORIZED);

    let future = (Utc::now().timestamp() + 3_600).to_string();
    let early = interact_at(&app, &ping, &signing_key(), &future).await;
    assert_eq!(early.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn endpoint_is_hidden_without_a_public_key() {
    let app = TestApp::new().await;
    let response = interact(&app, &json!({ "type": 1, "id": "1", "token": "t" }), &signing_key()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn inventory_command_lists_the_linked_team() {
    let app = discord_app("http://127.0.0.1:9").await;
    let owner = app.sign_up("owner@example.com", "Owner").await;
    let team_id = app.create_team(&owner, 5064, Some("guild-1")).await;
    app.create_part(&owner, team_id, "Servo", 1, 4).await;
    app.create_part(&owner, team_id, "M3 screw", 500, 50).await;

    let everything = interact(&app, &command(Some("guild-1"), commands::INVENTORY, json!([])), &signing_key()).await;
    assert_eq!(everything.status(), StatusCode::OK);
    let body = response_json(everything).await;
    assert_eq!(body["type"], 4);
    let content = body["data"]["content"].as_str().unwrap();
    assert!(content.contains("Inventory for Team 5064 #5064"));
    assert!(content.contains("- Servo: 1 (reorder at 4) ⚠️"));
    assert!(content.contains("M3 screw"));

    let low = interact(
        &app,
        &command(
            Some("guild-1"),
            commands::INVENTORY,
            json!([{ "name": "filter", "type": 3, "value": "low_stock" }]),
        ),
        &signing_key(),
    )
    .await;
    let content = response_json(low).await["data"]["content"].as_str().unwrap().to_string();
    assert!(content.contains("Low-stock parts"));
    assert!(!content.contains("M3 screw"));
}

#[tokio::test]
async fn commands_outside_a_linked_guild_get_a_private_hint() {
    let app = discord_app("http://127.0.0.1:9").await;

    let unlinked = response_json(
        interact(&app, &command(Some("guild-x"), commands::ORDERS, json!([])), &signing_key()).await,
    )
    .await;
    assert_eq!(unlinked["data"]["content"], UNLINKED_GUILD_REPLY);
    assert_eq!(unlinked["data"]["flags"], 64);

    let direct = response_json(
        interact(&app, &command(None, commands::INVENTORY, json!([])), &signing_key()).await,
    )
    .await;
    assert_eq!(direct["data"]["content"], NO_GUILD_REPLY);
}

#[tokio::test]
async fn orders_command_shows_open_orders() {
    let app = discord_app("http://127.0.0.1:9").await;
    let owner = app.sign_up("owner@example.com", "Owner").await;
    let team_id = app.create_team(&owner, 5064, Some("guild-1")).await;
    let vendor_id = app.create_vendor(&owner, team_id, "goBILDA").await;
    let created = app
        .post(
            &format!("/api/v1/teams/{team_id}/orders"),
            json!({
                "vendor_id": vendor_id,
                "order_number": "GB-7",
                "items": [{ "description": "Yellow Jacket motor", "quantity": 2, "unit_price": "39.99" }]
            }),
            &owner,
        )
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);

    let body = response_json(
        interact(&app, &command(Some("guild-1"), commands::ORDERS, json!([])), &signing_key()).await,
    )
    .await;
    let content = body["data"]["content"].as_str().unwrap();
    assert!(content.starts_with("**open orders for Team 5064 #5064**"));
    assert!(content.contains("- goBILDA [draft] $79.98 #GB-7 (1 items)"));
}

#[tokio::test]
async fn unknown_order_status_is_answered_privately() {
    let app = discord_app("http://127.0.0.1:9").await;
    let owner = app.sign_up("owner@example.com", "Owner").await;
    app.create_team(&owner, 5064, Some("guild-1")).await;

    let response = interact(
        &app,
        &command(
            Some("guild-1"),
            commands::ORDERS,
            json!([{ "name": "status", "type": 3, "value": "lost-in-transit" }]),
        ),
        &signing_key(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["type"], 4);
    assert_eq!(body["data"]["flags"], 64);
    assert!(body["data"]["content"].as_str().unwrap().contains("lost-in-transit"));
}

#[tokio::test]
async fn assistant_commands_defer_then_edit_the_reply() {
    let discord = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/webhooks/app-1/interaction-token/messages/@original"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "m1" })))
        .mount(&discord)
        .await;

    let app = discord_app(&discord.uri()).await;
    let owner = app.sign_up("owner@example.com", "Owner").await;
    app.create_team(&owner, 5064, Some("guild-1")).await;

    let response = interact(
        &app,
        &command(
            Some("guild-1"),
            commands::GLADOS,
            json!([{ "name": "message", "type": 3, "value": "hello there" }]),
        ),
        &signing_key(),
    )
    .await;
    assert_eq!(response_json(response).await, json!({ "type": 5 }));

    let mut delivered = None;
    for _ in 0..50 {
        let requests = discord.received_requests().await.unwrap_or_default();
        if let Some(edit) = requests.into_iter().find(|r| r.method.to_string() == "PATCH") {
            delivered = Some(edit);
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    let edit = delivered.expect("reply delivered to Discord");
    let body: Value = serde_json::from_slice(&edit.body).unwrap();
    assert_eq!(body["content"], NOT_CONFIGURED_REPLY);
}

#[tokio::test]
async fn empty_assistant_prompt_is_answered_privately() {
    let app = discord_app("http://127.0.0.1:9").await;
    let owner = app.sign_up("owner@example.com", "Owner").await;
    app.create_team(&owner, 5064, Some("guild-1")).await;

    let body = response_json(
        interact(
            &app,
            &command(
                Some("guild-1"),
                commands::ASK,
                json!([{ "name": "question", "type": 3, "value": "   " }]),
            ),
            &signing_key(),
        )
        .await,
    )
    .await;
    assert_eq!(body["type"], 4);
    assert_eq!(body["data"]["flags"], 64);
}

#[tokio::test]
async fn register_overwrites_guild_commands() {
    let discord = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/applications/app-1/guilds/guild-1/commands"))
        .and(header_matcher("authorization", "Bot bot-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "1", "name": "glados" },
            { "id": "2", "name": "ask" },
            { "id": "3", "name": "inventory" },
            { "id": "4", "name": "orders" }
        ])))
        .expect(1)
        .mount(&discord)
        .await;

    let client = DiscordClient::new(discord.uri(), "app-1", Some("bot-token".into())).unwrap();
    let registered = commands::register(&client, Some("guild-1")).await.unwrap();
    assert_eq!(registered.len(), 4);

    let sent = discord.received_requests().await.unwrap();
    let payload: Value = serde_json::from_slice(&sent[0].body).unwrap();
    let names: Vec<&str> = payload
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|c| c["name"].as_str())
        .collect();
    assert_eq!(names, ["glados", "ask", "inventory", "orders"]);
}

#[tokio::test]
async fn register_needs_a_bot_token() {
    let client = DiscordClient::new("http://127.0.0.1:9", "app-1", None).unwrap();
    assert!(commands::register(&client, None).await.is_err());
}
