#![allow(dead_code)]

use std::{io::Cursor, sync::Arc};

use image::{ImageFormat, RgbImage};
use recipe_backend::{
    api::routes, jwt::SessionKeys, media::MediaStore, memory::MemoryStore, state::State,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use warp::{http::StatusCode, test::RequestBuilder};

pub const PASSWORD: &str = "testpass123";
const BOUNDARY: &str = "----recipe-test-boundary";

pub struct TestApp {
    pub state: Arc<State>,
    pub store: Arc<MemoryStore>,
    pub media: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let media = tempfile::tempdir().unwrap();
        let state = State::with_store(
            store.clone(),
            SessionKeys::new(b"integration-secret", 1).unwrap(),
            MediaStore::new(media.path()),
        );

        Self {
            state,
            store,
            media,
        }
    }

    pub async fn send(&self, request: RequestBuilder) -> (StatusCode, Value) {
        let response = request.reply(&routes(self.state.clone())).await;
        let status = response.status();
        let body = if response.body().is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(response.body()).unwrap_or(Value::Null)
        };
        (status, body)
    }

    pub async fn call(
        &self,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = warp::test::request().method(method).path(path);
        if let Some(token) = token {
            request = request.header("authorization", format!("Bearer {token}"));
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        self.send(request).await
    }

    pub async fn get(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.call("GET", path, Some(token), None).await
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call("POST", path, Some(token), Some(body)).await
    }

    pub async fn patch(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call("PATCH", path, Some(token), Some(body)).await
    }

    pub async fn put(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call("PUT", path, Some(token), Some(body)).await
    }

    pub async fn delete(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.call("DELETE", path, Some(token), None).await
    }

    pub async fn register(&self, email: &str, password: &str) -> (StatusCode, Value) {
        let body = json!({ "email": email, "password": password, "name": "Test Name" });
        self.call("POST", "/api/user/create", None, Some(body)).await
    }

    pub async fn login(&self, email: &str, password: &str) -> (StatusCode, Value) {
        let body = json!({ "email": email, "password": password });
        self.call("POST", "/api/user/token", None, Some(body)).await
    }

    /// Registers `email` and returns a session token for it.
    pub async fn user(&self, email: &str) -> String {
        let (status, _) = self.register(email, PASSWORD).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = self.login(email, PASSWORD).await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_owned()
    }

    pub async fn recipe(&self, token: &str, body: Value) -> Value {
        let (status, recipe) = self.post("/api/recipe/recipes", token, body).await;
        assert_eq!(status, StatusCode::CREATED, "{recipe}");
        recipe
    }

    pub async fn upload(
        &self,
        token: &str,
        recipe_id: i64,
        field: &str,
        bytes: &[u8],
    ) -> (StatusCode, Value) {
        let request = warp::test::request()
            .method("POST")
            .path(&format!("/api/recipe/recipes/{recipe_id}/upload-image"))
            .header("authorization", format!("Bearer {token}"))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(multipart_body(field, bytes));
        self.send(request).await
    }

    /// Fetches a media path such as `/media/uploads/recipe/x.png`.
    pub async fn media_file(&self, path: &str) -> (StatusCode, Vec<u8>) {
        let response = warp::test::request()
            .method("GET")
            .path(path)
            .reply(&routes(self.state.clone()))
            .await;
        (response.status(), response.body().to_vec())
    }
}

pub fn sample_recipe(title: &str) -> Value {
    json!({
        "title": title,
        "time_minutes": 22,
        "price": "5.25",
        "description": "Sample description",
        "link": "http://example.com/recipe.pdf",
    })
}

pub fn png() -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    RgbImage::new(10, 10)
        .write_to(&mut bytes, ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}

fn multipart_body(field: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"upload.png\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn names(labels: &Value) -> Vec<String> {
    labels
        .as_array()
        .unwrap()
        .iter()
        .map(|label| label["name"].as_str().unwrap().to_owned())
        .collect()
}
