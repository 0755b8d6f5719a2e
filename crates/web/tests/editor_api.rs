//! HTTP-level tests for the editor REST protocol.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use courseware_common::{Database, JsonMap};
use courseware_web::editor::{EditorRequest, FieldRegistry, SchemaField, XSSI_PREFIX};
use courseware_web::{EditorSpec, JsonResponse, WebConfig, WebServer};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

/// Minimal editor with integer versions.
struct NoteEditor;

impl EditorSpec for NoteEditor {
    fn kind(&self) -> &str {
        "note"
    }

    fn uri(&self) -> &str {
        "/rest/note"
    }

    fn xsrf_action(&self) -> &str {
        "note-edit"
    }

    fn schema(&self) -> FieldRegistry {
        let mut schema = FieldRegistry::new("Note");
        schema.add_property(SchemaField::new("version", "", "string").optional().hidden());
        schema.add_property(SchemaField::new("title", "Title", "string"));
        schema
    }

    fn default_content(&self) -> JsonMap {
        json!({"version": 1, "title": ""}).as_object().cloned().unwrap_or_default()
    }

    fn schema_versions(&self) -> Vec<Value> {
        vec![json!(1)]
    }
}

struct Harness {
    db: Database,
    server: WebServer,
    router: Router,
    admin: String,
}

fn harness() -> Harness {
    let mut config = WebConfig::default();
    config.auth.dev_login = true;
    config.auth.xsrf_secret = Some("integration-secret".to_string());

    let db = Database::open_memory().unwrap();
    let server = WebServer::new(config, db.clone())
        .unwrap()
        .with_editor(Arc::new(NoteEditor));
    let identity = server
        .sessions()
        .upsert_identity("admin@example.com", &["course_admin".to_string()])
        .unwrap();
    let admin = server.sessions().create_session(&identity).unwrap().token;
    let router = server.router();
    Harness {
        db,
        server,
        router,
        admin,
    }
}

impl Harness {
    async fn call(&self, request: Request<Body>) -> JsonResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        JsonResponse::parse(std::str::from_utf8(&bytes).unwrap()).unwrap()
    }

    fn get_request(&self, uri: &str, session: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some(token) = session {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn get(&self, uri: &str) -> JsonResponse {
        self.call(self.get_request(uri, Some(&self.admin))).await
    }

    async fn token(&self) -> String {
        self.get("/rest/note").await.xsrf_token.unwrap()
    }

    async fn put(&self, key: Option<&str>, payload: Value, token: &str) -> JsonResponse {
        let payload = payload.as_object().cloned().unwrap();
        let request = serde_json::to_string(&EditorRequest::new(key, &payload, token)).unwrap();
        let body = format!("request={}", urlencoding::encode(&request));
        self.call(
            Request::builder()
                .method(Method::PUT)
                .uri("/rest/note")
                .header(header::AUTHORIZATION, format!("Bearer {}", self.admin))
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    async fn delete(&self, key: &str, token: &str) -> JsonResponse {
        let uri = format!(
            "/rest/note?key={}&xsrf_token={}",
            urlencoding::encode(key),
            urlencoding::encode(token)
        );
        self.call(
            Request::builder()
                .method(Method::DELETE)
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", self.admin))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    fn stored_notes(&self) -> usize {
        self.db.list_entities("note").unwrap().len()
    }
}

#[tokio::test]
async fn save_then_load_returns_saved_mapping_with_id() {
    let h = harness();
    let token = h.token().await;

    let saved = h.put(None, json!({"title": "x", "version": 1}), &token).await;
    assert_eq!((saved.status, saved.message.as_str()), (200, "Saved."));
    let key = saved.payload_map().unwrap()["key"].as_str().unwrap().to_string();

    let loaded = h.get(&format!("/rest/note?key={}", key)).await;
    assert_eq!((loaded.status, loaded.message.as_str()), (200, "Success"));
    assert_eq!(
        Value::Object(loaded.payload_map().unwrap()),
        json!({"title": "x", "id": key, "version": 1})
    );
}

#[tokio::test]
async fn get_without_key_returns_default_content() {
    let h = harness();
    let resp = h.get("/rest/note").await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.payload_map().unwrap(), NoteEditor.default_content());
    assert!(resp.xsrf_token.is_some());
}

#[tokio::test]
async fn responses_carry_guard_and_headers() {
    let h = harness();
    let response = h
        .router
        .clone()
        .oneshot(h.get_request("/rest/note", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(
        headers[header::CONTENT_TYPE],
        "application/javascript; charset=utf-8"
    );
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(headers[header::CONTENT_DISPOSITION], "attachment");

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(body.starts_with(XSSI_PREFIX));
    let envelope = JsonResponse::parse(&body).unwrap();
    assert_eq!((envelope.status, envelope.message.as_str()), (401, "Access denied."));
}

#[tokio::test]
async fn put_with_bad_token_is_refused_without_saving() {
    let h = harness();
    let resp = h.put(None, json!({"title": "x", "version": 1}), "bogus").await;
    assert_eq!(resp.status, 403);
    assert_eq!(
        resp.message,
        "Bad XSRF token. Please reload the page and try again"
    );

    assert_eq!(h.stored_notes(), 0);

    let token = h.token().await;
    let saved = h.put(None, json!({"title": "y", "version": 1}), &token).await;
    assert_eq!(saved.status, 200);
    assert_eq!(h.stored_notes(), 1);
}

#[tokio::test]
async fn put_with_unsupported_version_reports_it() {
    let h = harness();
    let token = h.token().await;
    let resp = h.put(None, json!({"title": "x", "version": 7}), &token).await;
    assert_eq!((resp.status, resp.message.as_str()), (412, "Version 7 not supported."));
    assert_eq!(resp.payload_map().unwrap()["key"], Value::Null);
    assert_eq!(h.stored_notes(), 0);
}

#[tokio::test]
async fn delete_of_missing_key_is_not_found() {
    let h = harness();
    let token = h.token().await;
    let resp = h.delete("no-such-key", &token).await;
    assert_eq!((resp.status, resp.message.as_str()), (404, "Not found."));
}

#[tokio::test]
async fn delete_removes_item() {
    let h = harness();
    let token = h.token().await;
    let saved = h.put(None, json!({"title": "x", "version": 1}), &token).await;
    let key = saved.payload_map().unwrap()["key"].as_str().unwrap().to_string();

    let resp = h.delete(&key, &token).await;
    assert_eq!((resp.status, resp.message.as_str()), (200, "Deleted."));

    let resp = h.get(&format!("/rest/note?key={}", key)).await;
    assert_eq!(resp.status, 404);
}

#[tokio::test]
async fn form_descriptor_route() {
    let h = harness();
    let resp = h.get("/rest/note/form?key=abc&exit_url=%2Fdashboard").await;
    assert_eq!(resp.status, 200);
    let form = resp.payload_map().unwrap();
    assert_eq!(form["rest_url"], "/rest/note");
    assert_eq!(form["exit_url"], "/dashboard");
    assert!(form["delete_url"]
        .as_str()
        .unwrap()
        .starts_with("/rest/note?key=abc&xsrf_token="));
}

#[tokio::test]
async fn dev_login_sets_session_cookie() {
    let h = harness();
    let response = h
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/auth/dev-login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"email": "teacher@example.com", "admin": true}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response.headers()[header::SET_COOKIE]
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("session="));

    let resp = h
        .call(
            Request::builder()
                .uri("/rest/note")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(resp.status, 200);
}

#[tokio::test]
async fn student_is_denied() {
    let h = harness();
    let identity = h
        .server
        .sessions()
        .upsert_identity("student@example.com", &["student".to_string()])
        .unwrap();
    let student = h.server.sessions().create_session(&identity).unwrap().token;

    let resp = h.call(h.get_request("/rest/note", Some(&student))).await;
    assert_eq!(resp.status, 401);
}

#[tokio::test]
async fn course_editors_are_routed() {
    let h = harness();
    for uri in [
        "/rest/announcements",
        "/rest/admin_prefs",
        "/rest/question/mc",
        "/rest/question/sa",
        "/rest/question_group",
    ] {
        let resp = h.get(uri).await;
        assert_eq!(resp.status, 200, "{}", uri);
        assert!(resp.payload_map().unwrap().contains_key("version"), "{}", uri);
    }
}

#[tokio::test]
async fn health_and_unknown_routes() {
    let h = harness();
    let response = h
        .router
        .clone()
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = h
        .router
        .clone()
        .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn gift_import_is_not_served() {
    let h = harness();
    let response = h
        .router
        .clone()
        .oneshot(h.get_request("/rest/question/gift", Some(&h.admin)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
