use axum::body::{Body, Bytes, to_bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method, Response, StatusCode, Uri, header};
use axum::response::IntoResponse;
use chrono::Datelike;
use std::sync::Arc;
use std::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::cache::make_cache_key;
use crate::error::{BackendError, PageError};
use crate::llm::{CompletionRequest, smooth_words};
use crate::metrics::{REQUEST_REJECTED, REQUEST_TOTAL};
use crate::models::{ChatMessage, GenerateBody, GenerateQuery, GenerationRequest};
use crate::origin::{allowed_origin, preflight, with_cors};
use crate::prompt::build_system_prompt;
use crate::state::AppState;
use crate::worker::{GenerationJob, spawn_generation};

// Largest body read; anything bigger is treated like an unreadable body
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

// Short id tying together every log line of one request
fn new_request_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

pub async fn generate_handler(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Response<Body> {
    REQUEST_TOTAL.inc();
    let started = Instant::now();
    let request_id = new_request_id();
    let span = info_span!("generate", request_id = %request_id);

    // the body is only read once origin and verb have passed
    let (parts, body) = request.into_parts();
    let (method, headers, uri) = (parts.method, parts.headers, parts.uri);

    async move {
        info!(%method, path = %uri.path(), "request received");

        let Some(origin) = allowed_origin(&headers) else {
            REQUEST_REJECTED.inc();
            warn!(origin = ?headers.get(header::ORIGIN), "origin not allowed");
            return (StatusCode::FORBIDDEN, PageError::Unauthorized.to_string()).into_response();
        };

        if method == Method::OPTIONS {
            return preflight(origin);
        }

        match generate(&state, &method, &uri, body, started).await {
            Ok(response) => with_cors(response, origin),
            Err(e) => {
                REQUEST_REJECTED.inc();
                if e.status().is_server_error() {
                    error!(error = %e, "generation failed");
                } else {
                    warn!(error = %e, status = e.status().as_u16(), "request rejected");
                }
                with_cors((e.status(), e.public_message()).into_response(), origin)
            }
        }
    }
    .instrument(span)
    .await
}

async fn generate(
    state: &AppState,
    method: &Method,
    uri: &Uri,
    body: Body,
    started: Instant,
) -> Result<Response<Body>, PageError> {
    if *method != Method::POST {
        return Err(PageError::MethodNotAllowed);
    }

    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(error = %e, "could not read request body, using empty body");
            Bytes::new()
        }
    };

    let query = GenerateQuery::from_query_string(uri.query());
    let body = GenerateBody::parse_lenient(&bytes);
    let request = GenerationRequest::resolve(query, body, state.default_model)?;

    let cache_key = make_cache_key(request.url.as_deref(), request.year.as_deref());
    info!(
        model = %request.model,
        url = ?request.url,
        year = ?request.year,
        force = request.force,
        cache_key = ?cache_key,
        messages = request.messages.len(),
        "generating page"
    );

    let current_year = chrono::Utc::now().year();
    let system_prompt =
        build_system_prompt(request.year.as_deref(), request.url.as_deref(), current_year);

    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    messages.push(ChatMessage::system(system_prompt));
    messages.extend(request.messages);

    // the execution limit also covers waiting for the upstream to answer
    let budget = state.max_duration.saturating_sub(started.elapsed());
    let tokens = tokio::time::timeout(
        budget,
        state
            .backend
            .stream_completion(CompletionRequest::new(request.model, messages)),
    )
    .await
    .map_err(|_| {
        BackendError::Timeout(format!(
            "{} did not start streaming within {}s",
            request.model,
            state.max_duration.as_secs()
        ))
    })??;

    let rx = spawn_generation(GenerationJob {
        tokens: smooth_words(tokens, state.smoothing_delay),
        cache_key,
        store: state.store.clone(),
        started,
        max_duration: state.max_duration,
    });

    let mut response = Response::new(Body::from_stream(ReceiverStream::new(rx)));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    Ok(response)
}
