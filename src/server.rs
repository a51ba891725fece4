use std::net::SocketAddr;

use anyhow::Result;
use askama::Template;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::chat::ChatService;
use crate::config::AppConfig;
use crate::db::Database;
use crate::models::{
    ChatAnswer, ChatRequest, ConversationTurn, SessionRequest, SessionResponse, SessionSummary,
};

const HISTORY_LIMIT: i64 = 10;

pub const QUICK_QUESTIONS: &[&str] = &[
    "What are the main causes of flooding in South Sudan?",
    "How does the government coordinate flood response?",
    "What is South Sudan's national flood risk mapping?",
    "How does climate change impact flooding nationally?",
    "What disaster financing exists for floods?",
    "What is the flood risk in Jonglei State?",
    "What is the flood risk in Unity State?",
    "What is the flood risk in Upper Nile State?",
    "How do rural and urban flood risks compare?",
    "What are the regional early warning gaps?",
    "What are South Sudan's rainfall patterns?",
    "How do CHIRPS satellite observations help?",
    "What causes White Nile river overflow?",
    "How does climate change intensify floods?",
    "How should households prepare for floods?",
    "What are emergency evacuation procedures?",
    "What should be in a flood survival kit?",
    "How to ensure safe water during floods?",
    "How often do roads collapse during floods?",
    "How do floods affect power and communication?",
    "How do floods destroy crops like sorghum?",
    "What happens to livestock during floods?",
    "What waterborne diseases occur after floods?",
    "How do floods affect healthcare access?",
    "How do UN and NGOs coordinate relief?",
    "Where are emergency shelters located?",
];

pub const INFO_TOPICS: &[&str] = &[
    "Regional Assessments",
    "Safety Guidelines",
    "Climate Information",
];

#[derive(Clone)]
struct AppState {
    db: Database,
    chat: ChatService,
}

pub fn build_router(db: Database, chat: ChatService) -> Router {
    let state = AppState { db, chat };

    Router::new()
        .route("/", get(index_page))
        .route("/api/chat", post(chat_handler))
        .route("/api/session", post(create_session))
        .route("/api/sessions", get(list_sessions).delete(clear_history))
        .route(
            "/api/sessions/:session_id",
            get(get_session).delete(delete_session),
        )
        .route("/api/quick-questions", get(quick_questions))
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(config: AppConfig, db: Database, chat_service: ChatService) -> Result<()> {
    let app = build_router(db, chat_service);

    let addr: SocketAddr = config.bind_addr.parse()?;
    tracing::info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index_page(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let session_id = state.db.create_session().await?;

    let template = IndexTemplate {
        session_id,
        quick_questions: QUICK_QUESTIONS,
        info_topics: INFO_TOPICS,
        model_name: state
            .chat
            .router()
            .fallback()
            .model_name()
            .map(str::to_string),
    };
    let body = template.render()?;

    Ok(Html(body))
}

async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatAnswer>, ApiError> {
    if request.session_id.trim().is_empty() {
        return Err(ApiError::bad_request("session_id is required"));
    }
    if request.question.trim().is_empty() {
        return Err(ApiError::bad_request("question must not be empty"));
    }

    let answer = state.chat.answer(request).await?;
    Ok(Json(answer))
}

async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    if request.reset.unwrap_or(false) {
        if let Some(session_id) = request.session_id {
            state.db.ensure_session(&session_id).await?;
            state.db.clear_session(&session_id).await?;
            return Ok(Json(SessionResponse { session_id }));
        }
    }

    let session_id = state.db.create_session().await?;
    Ok(Json(SessionResponse { session_id }))
}

async fn list_sessions(
    State(state): State<AppState>,
) -> Result<Json<Vec<SessionSummary>>, ApiError> {
    let sessions = state.db.recent_sessions(HISTORY_LIMIT).await?;
    Ok(Json(sessions))
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<ConversationTurn>>, ApiError> {
    if !state.db.session_exists(&session_id).await? {
        return Err(ApiError::not_found(format!(
            "session not found: {}",
            session_id
        )));
    }

    let turns = state.db.session_turns(&session_id).await?;
    Ok(Json(turns))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.db.delete_session(&session_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!(
            "session not found: {}",
            session_id
        )))
    }
}

async fn clear_history(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.db.clear_all().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn quick_questions() -> Json<&'static [&'static str]> {
    Json(QUICK_QUESTIONS)
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    session_id: String,
    quick_questions: &'static [&'static str],
    info_topics: &'static [&'static str],
    model_name: Option<String>,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: String) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message,
        }
    }

    fn bad_request(message: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.to_string(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: value.to_string(),
        }
    }
}

impl From<askama::Error> for ApiError {
    fn from(value: askama::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: value.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}
