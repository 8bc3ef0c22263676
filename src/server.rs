//! HTTP API for the chat frontend.
//!
//! Exposes document upload, question answering and index management.

use crate::agent::Agent;
use crate::error::FinragError;
use crate::ingest::DocumentKind;
use crate::orchestrator::Pipeline;
use crate::vector_store::IndexedSource;
use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, QueryRejection},
        DefaultBodyLimit, Multipart, Path, Query, State,
    },
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Origins of the local development frontend.
const LOCAL_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "https://localhost:3000",
    "http://127.0.0.1:3000",
    "https://127.0.0.1:3000",
];

/// Shared application state.
pub struct AppState {
    pub pipeline: Pipeline,
    /// Missing when the agent could not be created at startup.
    pub agent: Option<Agent>,
}

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    let settings = state.pipeline.settings();
    let cors = cors_layer(settings.frontend_host(), settings.server.extra_origins.clone());
    let body_limit = settings.server.max_upload_mb * 1024 * 1024;

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/upload", post(upload))
        .route("/chat", post(chat))
        .route("/documents", get(list_documents))
        .route("/documents/{source}", get(get_document).delete(delete_document))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for the local frontend, the hosted frontend and its preview subdomains.
pub fn cors_layer(frontend_host: String, extra_origins: Vec<String>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            origin
                .to_str()
                .map(|o| origin_allowed(o, &frontend_host, &extra_origins))
                .unwrap_or(false)
        }))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

/// Whether a browser origin may call the API.
pub fn origin_allowed(origin: &str, frontend_host: &str, extra_origins: &[String]) -> bool {
    if LOCAL_ORIGINS.contains(&origin) || extra_origins.iter().any(|o| o == origin) {
        return true;
    }
    if frontend_host.is_empty() {
        return false;
    }

    let Some(host) = origin.strip_prefix("https://") else {
        return false;
    };
    if host == frontend_host {
        return true;
    }
    match host.strip_suffix(frontend_host).and_then(|s| s.strip_suffix('.')) {
        Some(subdomain) => {
            !subdomain.is_empty()
                && subdomain
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        }
        None => false,
    }
}

// === Request/Response Types ===

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

fn error_response(status: StatusCode, detail: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            detail: detail.into(),
        }),
    )
        .into_response()
}

#[derive(Deserialize)]
struct UploadQuery {
    pages_to_process: Option<usize>,
}

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    question: String,
}

#[derive(Serialize)]
struct DocumentsResponse {
    documents: Vec<IndexedSource>,
    total: usize,
}

#[derive(Serialize)]
struct ChunkView {
    page: u32,
    chunk_order: u32,
    summary: String,
    content: String,
}

#[derive(Serialize)]
struct DocumentResponse {
    #[serde(flatten)]
    info: IndexedSource,
    chunks: Vec<ChunkView>,
}

#[derive(Serialize)]
struct DeleteResponse {
    source: String,
    deleted: usize,
}

// === Handlers ===

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({ "message": "Bajaj Finserv RAG Chatbot API is running." }))
}

async fn health(State(state): State<Arc<AppState>>) -> Response {
    match state.pipeline.vector_store().document_count().await {
        Ok(count) => Json(serde_json::json!({
            "status": "ok",
            "documents": count,
            "agent": state.agent.is_some(),
        }))
        .into_response(),
        Err(e) => error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}

async fn upload(
    State(state): State<Arc<AppState>>,
    query: Result<Query<UploadQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return error_response(rejection.status(), rejection.body_text()),
    };
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => return error_response(rejection.status(), rejection.body_text()),
    };

    let mut file: Option<(String, Vec<u8>)> = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                match field.bytes().await {
                    Ok(bytes) => file = Some((filename, bytes.to_vec())),
                    Err(e) => return error_response(StatusCode::BAD_REQUEST, e.body_text()),
                }
                break;
            }
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e.body_text()),
        }
    }

    let Some((filename, bytes)) = file else {
        return error_response(StatusCode::BAD_REQUEST, "No file uploaded.");
    };

    let kind = match DocumentKind::from_filename(&filename) {
        Ok(kind) => kind,
        Err(_) => {
            warn!("Rejected upload with unsupported type: {}", filename);
            return error_response(
                StatusCode::BAD_REQUEST,
                "Unsupported file type. Please upload a PDF or an image file.",
            );
        }
    };

    info!("Received {} upload: {} ({} bytes)", kind, filename, bytes.len());

    match state
        .pipeline
        .process_upload(&filename, &bytes, query.pages_to_process)
        .await
    {
        Ok(result) => Json(result).into_response(),
        Err(FinragError::InvalidInput(msg)) => error_response(StatusCode::BAD_REQUEST, msg),
        Err(e) => {
            error!("Upload of {} failed: {}", filename, e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("An error occurred while processing the {}: {}", kind, e),
            )
        }
    }
}

async fn chat(
    State(state): State<Arc<AppState>>,
    req: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match req {
        Ok(req) => req,
        Err(rejection) => return error_response(rejection.status(), rejection.body_text()),
    };
    let question = req.question.trim();
    if question.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Question cannot be empty.");
    }

    let Some(agent) = state.agent.as_ref() else {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "Agent not initialized.");
    };

    match agent.run(question).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            error!("Chat failed: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("An error occurred: {}", e),
            )
        }
    }
}

async fn list_documents(State(state): State<Arc<AppState>>) -> Response {
    match state.pipeline.vector_store().list_sources().await {
        Ok(documents) => Json(DocumentsResponse {
            total: documents.len(),
            documents,
        })
        .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn get_document(
    State(state): State<Arc<AppState>>,
    Path(source): Path<String>,
) -> Response {
    let store = state.pipeline.vector_store();
    let info = match store.get_source(&source).await {
        Ok(Some(info)) => info,
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                FinragError::SourceNotFound(source).to_string(),
            )
        }
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    match store.get_by_source(&source).await {
        Ok(documents) => Json(DocumentResponse {
            info,
            chunks: documents
                .into_iter()
                .map(|d| ChunkView {
                    page: d.page,
                    chunk_order: d.chunk_order,
                    summary: d.summary,
                    content: d.content,
                })
                .collect(),
        })
        .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn delete_document(
    State(state): State<Arc<AppState>>,
    Path(source): Path<String>,
) -> Response {
    match state.pipeline.vector_store().delete_by_source(&source).await {
        Ok(0) => error_response(
            StatusCode::NOT_FOUND,
            FinragError::SourceNotFound(source).to_string(),
        ),
        Ok(deleted) => Json(DeleteResponse { source, deleted }).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
