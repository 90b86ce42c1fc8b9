mod common;

use assert_matches::assert_matches;
use axum::http::StatusCode;
use serde_json::json;
use teamhub_api::{errors::ServiceError, services::parts::AdjustQuantityRequest};

use common::{response_json, TestApp};

#[tokio::test]
async fn adjustments_move_quantity_and_never_go_negative() {
    let app = TestApp::new().await;
    let owner = app.sign_up("owner@example.com", "Owner").await;
    let team_id = app.create_team(&owner, 5064, None).await;
    let part_id = app.create_part(&owner, team_id, "goBILDA 5203 motor", 10, 2).await;

    let added = app
        .post(
            &format!("/api/v1/parts/{part_id}/adjust"),
            json!({ "delta": 5, "reason": "restock" }),
            &owner,
        )
        .await;
    assert_eq!(added.status(), StatusCode::OK);
    let body = response_json(added).await;
    assert_eq!(body["data"]["previous_quantity"], 10);
    assert_eq!(body["data"]["new_quantity"], 15);
    assert_eq!(body["data"]["low_stock"], false);

    let removed = app
        .post(
            &format!("/api/v1/parts/{part_id}/adjust"),
            json!({ "delta": -13 }),
            &owner,
        )
        .await;
    assert_eq!(removed.status(), StatusCode::OK);
    let body = response_json(removed).await;
    assert_eq!(body["data"]["new_quantity"], 2);
    assert_eq!(body["data"]["low_stock"], true);

    let overdrawn = app
        .post(
            &format!("/api/v1/parts/{part_id}/adjust"),
            json!({ "delta": -3 }),
            &owner,
        )
        .await;
    assert_eq!(overdrawn.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let part = response_json(app.get(&format!("/api/v1/parts/{part_id}"), &owner).await).await;
    assert_eq!(part["data"]["quantity"], 2);
    assert_eq!(part["data"]["low_stock"], true);
}

#[tokio::test]
async fn concurrent_adjustments_are_all_applied() {
    let app = TestApp::new().await;
    let owner = app.sign_up("owner@example.com", "Owner").await;
    let team_id = app.create_team(&owner, 5064, None).await;
    let part_id = app.create_part(&owner, team_id, "REV Core Hex motor", 10, 2).await;
    let parts = app.state.services.parts.clone();

    let adjust_all = |count: usize, delta: i32| {
        let tasks: Vec<_> = (0..count)
            .map(|_| {
                let parts = parts.clone();
                tokio::spawn(async move {
                    parts
                        .adjust_quantity(part_id, AdjustQuantityRequest { delta, reason: None })
                        .await
                })
            })
            .collect();
        async move {
            let mut results = Vec::new();
            for task in tasks {
                results.push(task.await.unwrap());
            }
            results
        }
    };

    let restocks = adjust_all(20, 3).await;
    assert!(restocks.iter().all(|r| r.is_ok()), "{restocks:?}");
    let part = response_json(app.get(&format!("/api/v1/parts/{part_id}"), &owner).await).await;
    assert_eq!(part["data"]["quantity"], 70);

    let pulls = adjust_all(30, -3).await;
    let applied = pulls.iter().filter(|r| r.is_ok()).count();
    assert_eq!(applied, 23);
    for rejected in pulls.iter().filter(|r| r.is_err()) {
        assert_matches!(rejected, Err(ServiceError::InsufficientStock(_)));
    }
    let part = response_json(app.get(&format!("/api/v1/parts/{part_id}"), &owner).await).await;
    assert_eq!(part["data"]["quantity"], 1);
    assert_eq!(part["data"]["low_stock"], true);
}

#[tokio::test]
async fn prices_outside_the_column_range_are_rejected() {
    let app = TestApp::new().await;
    let owner = app.sign_up("owner@example.com", "Owner").await;
    let team_id = app.create_team(&owner, 5064, None).await;

    for price in ["79228162514264337593543950335", "10000000000.00", "4.999"] {
        let response = app
            .post(
                &format!("/api/v1/teams/{team_id}/parts"),
                json!({ "name": "Field element", "unit_price": price }),
                &owner,
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "price {price}");
    }
}

#[tokio::test]
async fn list_searches_filters_and_paginates() {
    let app = TestApp::new().await;
    let owner = app.sign_up("owner@example.com", "Owner").await;
    let team_id = app.create_team(&owner, 5064, None).await;
    app.create_part(&owner, team_id, "M4 screw", 200, 50).await;
    app.create_part(&owner, team_id, "M3 screw", 10, 50).await;
    app.create_part(&owner, team_id, "Servo", 0, 1).await;

    let search = response_json(
        app.get(&format!("/api/v1/teams/{team_id}/parts?search=screw"), &owner)
            .await,
    )
    .await;
    assert_eq!(search["data"]["total"], 2);

    let low = response_json(
        app.get(&format!("/api/v1/teams/{team_id}/parts?low_stock=true"), &owner)
            .await,
    )
    .await;
    assert_eq!(low["data"]["total"], 2);

    let page = response_json(
        app.get(
            &format!("/api/v1/teams/{team_id}/parts?page=2&per_page=2"),
            &owner,
        )
        .await,
    )
    .await;
    assert_eq!(page["data"]["items"].as_array().unwrap().len(), 1);
    assert_eq!(page["data"]["total_pages"], 2);

    let low_stock = response_json(
        app.get(&format!("/api/v1/teams/{team_id}/parts/low-stock"), &owner)
            .await,
    )
    .await;
    let names: Vec<&str> = low_stock["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|p| p["name"].as_str())
        .collect();
    assert_eq!(names, ["Servo", "M3 screw"]);
}

#[tokio::test]
async fn parts_are_private_to_their_team() {
    let app = TestApp::new().await;
    let owner = app.sign_up("owner@example.com", "Owner").await;
    let rival = app.sign_up("rival@example.com", "Rival").await;
    let team_id = app.create_team(&owner, 5064, None).await;
    app.create_team(&rival, 9999, None).await;
    let part_id = app.create_part(&owner, team_id, "Control Hub", 1, 0).await;

    let read = app.get(&format!("/api/v1/parts/{part_id}"), &rival).await;
    assert_eq!(read.status(), StatusCode::FORBIDDEN);

    let adjust = app
        .post(
            &format!("/api/v1/parts/{part_id}/adjust"),
            json!({ "delta": -1 }),
            &rival,
        )
        .await;
    assert_eq!(adjust.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn update_leaves_quantity_alone_and_checks_input() {
    let app = TestApp::new().await;
    let owner = app.sign_up("owner@example.com", "Owner").await;
    let team_id = app.create_team(&owner, 5064, None).await;
    let part_id = app.create_part(&owner, team_id, "Battery", 3, 1).await;

    let updated = app
        .put(
            &format!("/api/v1/parts/{part_id}"),
            json!({ "name": "12V Battery", "location": "Bin A3", "reorder_point": 4 }),
            &owner,
        )
        .await;
    assert_eq!(updated.status(), StatusCode::OK);
    let body = response_json(updated).await;
    assert_eq!(body["data"]["name"], "12V Battery");
    assert_eq!(body["data"]["quantity"], 3);
    assert_eq!(body["data"]["low_stock"], true);

    let negative = app
        .post(
            &format!("/api/v1/teams/{team_id}/parts"),
            json!({ "name": "Broken", "quantity": -1 }),
            &owner,
        )
        .await;
    assert_eq!(negative.status(), StatusCode::BAD_REQUEST);

    let negative_price = app
        .post(
            &format!("/api/v1/teams/{team_id}/parts"),
            json!({ "name": "Freebie", "unit_price": "-2.50" }),
            &owner,
        )
        .await;
    assert_eq!(negative_price.status(), StatusCode::BAD_REQUEST);
}
