mod common;

use common::{names, sample_recipe, TestApp};
use serde_json::json;
use warp::http::StatusCode;

const TAGS: &str = "/api/recipe/tags";
const INGREDIENTS: &str = "/api/recipe/ingredients";

#[tokio::test]
async fn labels_require_authentication() {
    let app = TestApp::new();

    for url in [TAGS, INGREDIENTS] {
        let (status, _) = app.call("GET", url, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{url}");
    }
    let (status, _) = app.call("GET", &format!("{TAGS}/1"), None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn listing_is_per_user_and_ordered_by_name_descending() {
    let app = TestApp::new();
    let token = app.user("user@example.com").await;
    let other = app.user("other@example.com").await;

    for url in [TAGS, INGREDIENTS] {
        app.post(url, &token, json!({ "name": "Kale" })).await;
        app.post(url, &token, json!({ "name": "Salt" })).await;
        app.post(url, &token, json!({ "name": "Apple" })).await;
        app.post(url, &other, json!({ "name": "Vinegar" })).await;

        let (status, body) = app.get(url, &token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(names(&body), ["Salt", "Kale", "Apple"], "{url}");
    }
}

#[tokio::test]
async fn posting_an_existing_name_returns_the_same_label() {
    let app = TestApp::new();
    let token = app.user("user@example.com").await;

    let (status, first) = app.post(TAGS, &token, json!({ "name": "Vegan" })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["name"], "Vegan");

    let (status, second) = app.post(TAGS, &token, json!({ "name": " Vegan " })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second, first);

    let (status, body) = app.post(TAGS, &token, json!({ "name": "" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("name").is_some());

    let (status, body) = app.post(TAGS, &token, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("name").is_some());
}

#[tokio::test]
async fn rename_applies_to_every_recipe_using_the_tag() {
    let app = TestApp::new();
    let token = app.user("user@example.com").await;

    let mut payload = sample_recipe("Breakfast bowl");
    payload["tags"] = json!([{ "name": "Breakfast" }]);
    let recipe = app.recipe(&token, payload).await;
    let tag_id = &recipe["tags"][0]["id"];

    let (status, body) = app
        .patch(&format!("{TAGS}/{tag_id}"), &token, json!({ "name": "Brunch" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Brunch");

    let (_, detail) = app
        .get(&format!("/api/recipe/recipes/{}", recipe["id"]), &token)
        .await;
    assert_eq!(names(&detail["tags"]), ["Brunch"]);
}

#[tokio::test]
async fn renaming_to_a_taken_name_fails() {
    let app = TestApp::new();
    let token = app.user("user@example.com").await;

    app.post(INGREDIENTS, &token, json!({ "name": "Salt" })).await;
    let (_, pepper) = app.post(INGREDIENTS, &token, json!({ "name": "Pepper" })).await;

    let url = format!("{INGREDIENTS}/{}", pepper["id"]);
    let (status, body) = app.put(&url, &token, json!({ "name": "Salt" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("name").is_some());

    let (status, body) = app.put(&url, &token, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("name").is_some());

    let (status, body) = app.patch(&url, &token, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Pepper");
}

#[tokio::test]
async fn foreign_labels_are_not_found() {
    let app = TestApp::new();
    let token = app.user("user@example.com").await;
    let other = app.user("other@example.com").await;

    let (_, tag) = app.post(TAGS, &other, json!({ "name": "Private" })).await;
    let url = format!("{TAGS}/{}", tag["id"]);

    let (status, _) = app.get(&url, &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.patch(&url, &token, json!({ "name": "Mine" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.delete(&url, &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.get(&url, &other).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Private");
}

#[tokio::test]
async fn deleting_a_tag_detaches_it() {
    let app = TestApp::new();
    let token = app.user("user@example.com").await;

    let mut payload = sample_recipe("Soup");
    payload["tags"] = json!([{ "name": "Lunch" }, { "name": "Winter" }]);
    let recipe = app.recipe(&token, payload).await;
    let lunch = &recipe["tags"][0]["id"];
    let url = format!("{TAGS}/{lunch}");

    let (status, _) = app.delete(&url, &token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get(&url, &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, detail) = app
        .get(&format!("/api/recipe/recipes/{}", recipe["id"]), &token)
        .await;
    assert_eq!(names(&detail["tags"]), ["Winter"]);
}

#[tokio::test]
async fn assigned_only_hides_unused_labels() {
    let app = TestApp::new();
    let token = app.user("user@example.com").await;

    app.post(INGREDIENTS, &token, json!({ "name": "Unused" })).await;
    let mut payload = sample_recipe("Eggs");
    payload["ingredients"] = json!([{ "name": "Eggs" }]);
    app.recipe(&token, payload).await;
    let mut payload = sample_recipe("Omelette");
    payload["ingredients"] = json!([{ "name": "Eggs" }]);
    app.recipe(&token, payload).await;

    let (_, all) = app.get(INGREDIENTS, &token).await;
    assert_eq!(names(&all), ["Unused", "Eggs"]);

    let (status, assigned) = app
        .get(&format!("{INGREDIENTS}?assigned_only=1"), &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&assigned), ["Eggs"]);

    let (_, unfiltered) = app
        .get(&format!("{INGREDIENTS}?assigned_only=0"), &token)
        .await;
    assert_eq!(names(&unfiltered), ["Unused", "Eggs"]);

    let (status, _) = app
        .get(&format!("{INGREDIENTS}?assigned_only=yes"), &token)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
