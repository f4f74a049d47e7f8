use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use validator::Validate;

use crate::document;
use crate::error::QaError;
use crate::qa::QaEngine;

const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// The most recent upload for this server instance. Questions are
/// answered against its indexed segments.
#[derive(Clone)]
struct DocumentSession {
    doc_id: String,
    words: usize,
    segments: usize,
}

#[derive(Clone)]
pub struct AppState {
    engine: Arc<QaEngine>,
    session: Arc<RwLock<Option<DocumentSession>>>,
}

#[derive(Deserialize, Validate)]
pub struct AskRequest {
    #[validate(length(min = 1, max = 1000))]
    question: String,
}

#[derive(Serialize)]
pub struct AskResponse {
    answer: String,
    context: String,
    context_words: usize,
    elapsed_seconds: f64,
}

#[derive(Serialize)]
pub struct UploadResponse {
    doc_id: String,
    words: usize,
    segments: usize,
}

#[derive(Serialize)]
struct ApiResponse {
    status: String,
}

/// Create and configure the API router.
pub fn create_api(engine: QaEngine) -> Router {
    let state = AppState {
        engine: Arc::new(engine),
        session: Arc::new(RwLock::new(None)),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/upload", post(upload_handler))
        .route("/ask", post(ask_handler))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Every QaError maps to a status and JSON body the same way, whichever
/// layer it came from. No error is ever dressed up as an answer.
fn error_response(err: QaError) -> Response {
    let status = match &err {
        QaError::Extraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
        QaError::Embedding(_) => StatusCode::INTERNAL_SERVER_ERROR,
        QaError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        QaError::Store(_) | QaError::Generation(_) => StatusCode::BAD_GATEWAY,
    };
    log::error!("{}", err);
    (status, Json(ApiResponse { status: err.to_string() })).into_response()
}

async fn upload_handler(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut data = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                // The PDF arrives as the "file" field or as whichever
                // field carries a filename; plain form values are not it.
                if field.name() != Some("file") && field.file_name().is_none() {
                    continue;
                }
                match field.bytes().await {
                    Ok(bytes) => {
                        data = Some(bytes);
                        break;
                    }
                    Err(e) => {
                        return (
                            StatusCode::BAD_REQUEST,
                            Json(ApiResponse {
                                status: format!("Failed to read upload: {}", e),
                            }),
                        )
                            .into_response();
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ApiResponse {
                        status: format!("Invalid multipart body: {}", e),
                    }),
                )
                    .into_response();
            }
        }
    }

    let data = match data {
        Some(data) => data,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse {
                    status: "No file in upload".to_string(),
                }),
            )
                .into_response();
        }
    };

    let text = match document::extract_text_from_bytes(&data) {
        Ok(text) => text,
        Err(e) => return error_response(e),
    };

    let index = match state.engine.index_document(&text).await {
        Ok(index) => index,
        Err(e) => return error_response(e),
    };

    *state.session.write().await = Some(DocumentSession {
        doc_id: index.doc_id.clone(),
        words: index.words,
        segments: index.segments,
    });

    Json(UploadResponse {
        doc_id: index.doc_id,
        words: index.words,
        segments: index.segments,
    })
    .into_response()
}

async fn ask_handler(State(state): State<AppState>, Json(request): Json<AskRequest>) -> Response {
    if let Err(e) = request.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse {
                status: format!("Invalid question: {}", e),
            }),
        )
            .into_response();
    }

    let doc_id = {
        let session = state.session.read().await;
        match session.as_ref() {
            Some(doc) => doc.doc_id.clone(),
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ApiResponse {
                        status: "No document uploaded yet".to_string(),
                    }),
                )
                    .into_response();
            }
        }
    };

    match state.engine.ask(&request.question, &doc_id).await {
        Ok(result) => Json(AskResponse {
            context_words: result.context.split_whitespace().count(),
            elapsed_seconds: result.elapsed.as_secs_f64(),
            answer: result.answer,
            context: result.context,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

async fn health_check(State(state): State<AppState>) -> Response {
    let session = state.session.read().await;
    let status = match session.as_ref() {
        Some(doc) => format!(
            "Serving document {} ({} segments, {} words)",
            doc.doc_id, doc.segments, doc.words
        ),
        None => "Server is running, no document uploaded".to_string(),
    };
    Json(ApiResponse { status }).into_response()
}
