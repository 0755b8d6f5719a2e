//! Web server implementation

use crate::auth::session::token_from_headers;
use crate::auth::{Caller, DevLoginRequest, PolicyEngine, SessionStore, XsrfTokenManager, SESSION_COOKIE};
use crate::config::WebConfig;
use crate::editor::{EditorHandler, EditorHooks, EditorSpec, JsonResponse};
use crate::editors::{build_handler, course_editors};
use axum::{
    extract::{Form, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use courseware_common::Database;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// The editor web service
pub struct WebServer {
    config: WebConfig,
    db: Database,
    sessions: SessionStore,
    xsrf: Arc<XsrfTokenManager>,
    policy: Arc<PolicyEngine>,
    editors: Vec<EditorHandler>,
}

/// State shared by the non-editor routes
struct WebServerState {
    sessions: SessionStore,
    dev_login: bool,
}

/// State of one editor's routes
struct EditorRoute {
    handler: EditorHandler,
    sessions: SessionStore,
}

impl EditorRoute {
    fn caller(&self, headers: &HeaderMap) -> Caller {
        self.sessions.caller_from_headers(headers)
    }
}

impl WebServer {
    /// Create a server over `db` with every course editor registered.
    pub fn new(config: WebConfig, db: Database) -> anyhow::Result<Self> {
        let sessions = SessionStore::new(db.clone()).with_ttl(config.auth.session_ttl_secs);
        sessions.init_schema()?;

        let xsrf = Arc::new(
            XsrfTokenManager::from_store(config.auth.xsrf_secret.as_deref(), &db)?
                .with_max_age(config.auth.xsrf_max_age_secs),
        );
        let policy = Arc::new(PolicyEngine::new());
        let editors = course_editors(&db, policy.clone(), xsrf.clone());

        Ok(Self {
            config,
            db,
            sessions,
            xsrf,
            policy,
            editors,
        })
    }

    /// Register an additional editor.
    pub fn with_editor(mut self, spec: Arc<dyn EditorSpec>) -> Self {
        let handler = build_handler(spec, &self.db, self.policy.clone(), self.xsrf.clone());
        self.editors.retain(|e| e.uri() != handler.uri());
        self.editors.push(handler);
        self
    }

    /// Attach hooks to the editor served at `uri`.
    pub fn with_editor_hooks(mut self, uri: &str, hooks: EditorHooks) -> Self {
        match self.editors.iter().position(|e| e.uri() == uri) {
            Some(idx) => {
                let handler = self.editors.remove(idx).with_hooks(hooks);
                self.editors.insert(idx, handler);
            }
            None => warn!("No editor at {} to attach hooks to", uri),
        }
        self
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn xsrf(&self) -> &XsrfTokenManager {
        &self.xsrf
    }

    pub fn editors(&self) -> &[EditorHandler] {
        &self.editors
    }

    /// Create router
    pub fn router(&self) -> Router {
        let state = Arc::new(WebServerState {
            sessions: self.sessions.clone(),
            dev_login: self.config.auth.dev_login,
        });

        let mut router = Router::new()
            .route("/api/health", get(health_handler))
            .route("/api/auth/whoami", get(whoami_handler))
            .route("/api/auth/logout", post(logout_handler));
        if self.config.auth.dev_login {
            router = router.route("/api/auth/dev-login", post(dev_login_handler));
        }

        for handler in &self.editors {
            router = router.merge(editor_router(Arc::new(EditorRoute {
                handler: handler.clone(),
                sessions: self.sessions.clone(),
            })));
        }

        router
            .fallback(not_found_handler)
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Start the web server
    pub async fn serve(self, addr: SocketAddr) -> anyhow::Result<()> {
        info!("Editor service starting on http://{}", addr);
        for editor in &self.editors {
            info!("  {} ({})", editor.uri(), editor.kind());
        }
        if self.config.auth.dev_login {
            warn!("Development login is enabled");
        }

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router()).await?;

        Ok(())
    }
}

/// GET/PUT/DELETE on the editor URI, and the form descriptor below it.
fn editor_router<S>(route: Arc<EditorRoute>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let uri = route.handler.uri().to_string();
    Router::new()
        .route(
            &uri,
            get(editor_get_handler)
                .put(editor_put_handler)
                .delete(editor_delete_handler),
        )
        .route(&format!("{}/form", uri), get(editor_form_handler))
        .with_state(route)
}

// ============================================================================
// Editor handlers
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct KeyQuery {
    key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DeleteQuery {
    key: Option<String>,
    xsrf_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FormQuery {
    key: Option<String>,
    #[serde(default)]
    exit_url: String,
    #[serde(default)]
    auto_return: bool,
}

#[derive(Debug, Default, Deserialize)]
struct PutForm {
    #[serde(default)]
    request: String,
}

async fn editor_get_handler(
    State(route): State<Arc<EditorRoute>>,
    headers: HeaderMap,
    Query(query): Query<KeyQuery>,
) -> JsonResponse {
    let caller = route.caller(&headers);
    route.handler.get(&caller, query.key.as_deref())
}

async fn editor_put_handler(
    State(route): State<Arc<EditorRoute>>,
    headers: HeaderMap,
    Form(form): Form<PutForm>,
) -> JsonResponse {
    let caller = route.caller(&headers);
    route.handler.put(&caller, &form.request)
}

async fn editor_delete_handler(
    State(route): State<Arc<EditorRoute>>,
    headers: HeaderMap,
    Query(query): Query<DeleteQuery>,
) -> JsonResponse {
    let caller = route.caller(&headers);
    route
        .handler
        .delete(&caller, query.key.as_deref(), query.xsrf_token.as_deref())
}

async fn editor_form_handler(
    State(route): State<Arc<EditorRoute>>,
    headers: HeaderMap,
    Query(query): Query<FormQuery>,
) -> JsonResponse {
    let caller = route.caller(&headers);
    route
        .handler
        .form(&caller, query.key.as_deref(), &query.exit_url, query.auto_return)
}

// ============================================================================
// Service handlers
// ============================================================================

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "courseware-web",
        "version": courseware_common::VERSION,
    }))
}

async fn whoami_handler(
    State(state): State<Arc<WebServerState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let caller = state.sessions.caller_from_headers(&headers);
    Json(serde_json::json!({
        "authenticated": caller.is_authenticated(),
        "id": caller.id(),
        "roles": caller.roles(),
    }))
}

async fn dev_login_handler(
    State(state): State<Arc<WebServerState>>,
    Json(req): Json<DevLoginRequest>,
) -> Response {
    if !state.dev_login {
        return not_found_handler().await.into_response();
    }
    if req.email.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "email is required"})),
        )
            .into_response();
    }

    let roles = if req.admin {
        vec!["course_admin".to_string()]
    } else {
        vec!["student".to_string()]
    };
    let login = state
        .sessions
        .upsert_identity(&req.email, &roles)
        .and_then(|identity| state.sessions.create_session(&identity));

    match login {
        Ok(login) => {
            info!("Development login for {}", login.identity.email);
            let cookie = format!(
                "{}={}; Path=/; HttpOnly; SameSite=Lax",
                SESSION_COOKIE, login.token
            );
            ([(header::SET_COOKIE, cookie)], Json(login)).into_response()
        }
        Err(e) => {
            error!("Development login failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "login failed"})),
            )
                .into_response()
        }
    }
}

async fn logout_handler(
    State(state): State<Arc<WebServerState>>,
    headers: HeaderMap,
) -> Response {
    let revoked = match token_from_headers(&headers) {
        Some(token) => match state.sessions.revoke(&token) {
            Ok(revoked) => revoked,
            Err(e) => {
                error!("Logout failed: {}", e);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        },
        None => false,
    };
    let cookie = format!("{}=; Path=/; Max-Age=0", SESSION_COOKIE);
    (
        [(header::SET_COOKIE, cookie)],
        Json(serde_json::json!({"revoked": revoked})),
    )
        .into_response()
}

async fn not_found_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": "not found"})),
    )
}
