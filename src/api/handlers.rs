//! HTTP request handlers

use super::types::{
    CallResult, Destinations, ErrorResponse, GatherForm, MakeCallRequest, RecordingForm,
    StateQuery,
};
use super::AppState;
use crate::gateway::{place_calls, Placement};
use crate::ivr::{DialState, Evaluation, Instruction};
use crate::menu::NodeId;
use crate::twiml::{TwimlCompiler, CONTENT_TYPE, ENTRY_PATH, RECORDING_PATH};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use tower_http::trace::TraceLayer;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        // Call entry; also the target of every redirect
        .route(ENTRY_PATH, get(voice).post(voice))
        .route(RECORDING_PATH, post(handle_recording))
        // Outbound placement
        .route("/make-call", post(make_call))
        // Diagnostics
        .route("/test-languages", get(test_languages))
        .route("/health", get(health))
        .route("/version", get(get_version));

    // One gather callback per menu node
    for node in NodeId::ALL {
        router = router.route(
            node.callback_path(),
            post(
                move |State(state): State<AppState>,
                      headers: HeaderMap,
                      query: Option<Query<StateQuery>>,
                      form: Option<Form<GatherForm>>| async move {
                    handle_gather(node, &state, &headers, query, form)
                },
            ),
        );
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

// ============================================================
// Voice Webhooks
// ============================================================

async fn voice(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Option<Query<StateQuery>>,
) -> Response {
    let dial_state = decode(&state, query);
    let evaluation = state.engine.present(&dial_state);
    respond(&state, &headers, &evaluation)
}

fn handle_gather(
    node: NodeId,
    state: &AppState,
    headers: &HeaderMap,
    query: Option<Query<StateQuery>>,
    form: Option<Form<GatherForm>>,
) -> Response {
    let dial_state = decode(state, query);
    let form = form.map(|Form(f)| f).unwrap_or_default();

    let evaluation = if dial_state.node == node {
        state
            .engine
            .evaluate(&dial_state, form.digits.as_deref().unwrap_or_default())
    } else {
        // Stale or tampered address: the digits answer a prompt we cannot
        // identify, so start the caller over from the decoded position
        tracing::warn!(
            path_node = %node,
            state_node = %dial_state.node,
            call_sid = ?form.call_sid,
            "Gather callback does not match encoded state"
        );
        state.engine.present(&dial_state)
    };

    respond(state, headers, &evaluation)
}

async fn handle_recording(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Option<Query<StateQuery>>,
    form: Option<Form<RecordingForm>>,
) -> Response {
    let dial_state = decode(&state, query);
    let form = form.map(|Form(f)| f).unwrap_or_default();

    let selections: Vec<String> = dial_state
        .selections
        .iter()
        .map(|s| format!("{}={}", s.category, s.label))
        .collect();
    tracing::info!(
        recording_sid = ?form.recording_sid,
        recording_url = ?form.recording_url,
        duration = ?form.recording_duration,
        from = ?form.from,
        call_sid = ?form.call_sid,
        locale = %dial_state.locale,
        department = ?dial_state.label_for("department"),
        selections = ?selections,
        "Received recording"
    );

    let evaluation = state.engine.acknowledge_recording(&dial_state);
    respond(&state, &headers, &evaluation)
}

fn decode(state: &AppState, query: Option<Query<StateQuery>>) -> DialState {
    let suffix = query.and_then(|Query(q)| q.s);
    state.codec.decode(suffix.as_deref())
}

fn respond(state: &AppState, headers: &HeaderMap, evaluation: &Evaluation) -> Response {
    tracing::debug!(
        node = %evaluation.next_state.node,
        locale = %evaluation.next_state.locale,
        instructions = ?evaluation.instructions.iter().map(Instruction::kind).collect::<Vec<_>>(),
        continues = evaluation.instructions.last().is_some_and(Instruction::continues),
        "Responding to webhook"
    );

    let base_url = base_url(state, headers);
    let xml = TwimlCompiler::new(&base_url, &state.codec).render(&evaluation.instructions);
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], xml).into_response()
}

/// Public origin for callback addresses: configured, or taken from the
/// (possibly proxied) request
fn base_url(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(url) = &state.public_base_url {
        return url.clone();
    }

    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let scheme = header_value("x-forwarded-proto").unwrap_or("http");
    let host = header_value("x-forwarded-host")
        .or_else(|| header_value(header::HOST.as_str()))
        .unwrap_or("localhost");
    format!("{scheme}://{host}")
}

// ============================================================
// Outbound Calls
// ============================================================

async fn make_call(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Vec<CallResult>>, AppError> {
    let request = MakeCallRequest::from_slice(&body);

    let destinations = request
        .to
        .and_then(Destinations::into_list)
        .ok_or_else(|| AppError::BadRequest("missing 'to' field".to_string()))?;

    let callback_url = request
        .callback_address
        .filter(|url| !url.trim().is_empty())
        .unwrap_or_else(|| format!("{}{ENTRY_PATH}", base_url(&state, &headers)));

    tracing::info!(
        destinations = destinations.len(),
        callback_url = %callback_url,
        "Placing outbound calls"
    );

    let placements = place_calls(state.gateway.as_ref(), &destinations, &callback_url).await;
    let failed: Vec<&str> = placements
        .iter()
        .filter(|p| matches!(p, Placement::Failed { .. }))
        .map(Placement::to)
        .collect();
    if !failed.is_empty() {
        tracing::warn!(
            failed = ?failed,
            total = placements.len(),
            "Outbound batch finished with failures"
        );
    }

    Ok(Json(placements.into_iter().map(CallResult::from).collect()))
}

// ============================================================
// Diagnostics
// ============================================================

async fn test_languages(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.locales().messages().clone())
}

async fn health() -> &'static str {
    "ok"
}

async fn get_version() -> &'static str {
    concat!("clinic-ivr ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

enum AppError {
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
