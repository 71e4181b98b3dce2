//! HTTP route definitions

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{
    BuildAction, Difficulty, GameConfig, GameMode, GameSession, SessionError, SessionSummary,
    Team, Zone, ZoneKind,
};
use crate::util::time::uptime_secs;
use crate::world::{BlockPos, ParticipantId, SessionId, WorldId};

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);
    let cors = match &state.config.client_origin {
        Some(origins) => {
            let allowed: Vec<header::HeaderValue> = origins
                .split(',')
                .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
                .collect();
            cors.allow_origin(allowed)
        }
        None => cors.allow_origin(Any),
    };

    Router::new()
        .route("/health", get(health_handler))
        .route("/participants", post(connect_handler))
        .route("/participants/:id/session", get(participant_session_handler))
        .route("/sessions", get(list_handler).post(create_handler))
        .route("/sessions/:id", get(session_handler))
        .route("/sessions/:id/players", post(add_player_handler))
        .route(
            "/sessions/:id/players/:participant_id",
            delete(remove_player_handler),
        )
        .route("/sessions/:id/spectators", post(spectator_handler))
        .route("/sessions/:id/spawns", post(spawn_handler))
        .route("/sessions/:id/zones", post(zone_handler))
        .route("/sessions/:id/build-check", post(build_check_handler))
        .route("/sessions/:id/ordnance", post(ordnance_handler))
        .route("/sessions/:id/mode", post(mode_handler))
        .route("/sessions/:id/start", post(start_handler))
        .route("/sessions/:id/stop", post(stop_handler))
        .route("/sessions/:id/hits", post(hits_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn find_session(state: &AppState, id: SessionId) -> Result<Arc<GameSession>, AppError> {
    state
        .registry
        .find_by_id(id)
        .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    sessions: usize,
    active_sessions: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        sessions: state.registry.list().len(),
        active_sessions: state.registry.active_sessions(),
    })
}

// ============================================================================
// Participant endpoints
// ============================================================================

#[derive(Deserialize)]
struct ConnectRequest {
    name: String,
    world: WorldId,
}

#[derive(Serialize)]
struct ConnectResponse {
    participant_id: ParticipantId,
    name: String,
    world: WorldId,
    can_build: bool,
}

async fn connect_handler(
    State(state): State<AppState>,
    Json(req): Json<ConnectRequest>,
) -> Result<Json<ConnectResponse>, AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::BadRequest("name must not be empty".to_string()));
    }
    let participant = state.world.connect(req.name.trim(), req.world);
    state.registry.on_world_joined(&participant);

    Ok(Json(ConnectResponse {
        participant_id: participant.id(),
        name: participant.name().to_string(),
        world: participant.world(),
        can_build: participant.can_build(),
    }))
}

async fn participant_session_handler(
    State(state): State<AppState>,
    Path(id): Path<ParticipantId>,
) -> Result<Json<SessionSummary>, AppError> {
    let participant = state
        .world
        .participant(&id)
        .ok_or_else(|| AppError::NotFound(format!("Participant {id} not connected")))?;
    let session = state
        .registry
        .session_for(&participant)
        .ok_or_else(|| AppError::NotFound(format!("{} is not in a game", participant.name())))?;
    Ok(Json(session.summary()))
}

// ============================================================================
// Session endpoints
// ============================================================================

#[derive(Deserialize)]
struct CreateSessionRequest {
    world: WorldId,
    #[serde(default)]
    mode: GameMode,
    #[serde(default)]
    difficulty: Difficulty,
    config: Option<GameConfig>,
}

async fn list_handler(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    Json(state.registry.list())
}

async fn create_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionSummary>), AppError> {
    let session = state
        .registry
        .create(req.world, req.mode, req.difficulty, req.config)?;
    Ok((StatusCode::CREATED, Json(session.summary())))
}

async fn session_handler(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> Result<Json<SessionSummary>, AppError> {
    Ok(Json(find_session(&state, id)?.summary()))
}

#[derive(Deserialize)]
struct AddPlayerRequest {
    participant_id: Uuid,
    #[serde(default)]
    spectator: bool,
}

#[derive(Serialize)]
struct AddPlayerResponse {
    participant_id: Uuid,
    team: Team,
}

async fn add_player_handler(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
    Json(req): Json<AddPlayerRequest>,
) -> Result<Json<AddPlayerResponse>, AppError> {
    let session = find_session(&state, id)?;
    let participant = state
        .world
        .participant(&req.participant_id)
        .ok_or_else(|| {
            AppError::NotFound(format!("Participant {} not connected", req.participant_id))
        })?;

    let team = session.add_participant(participant, req.spectator)?;
    Ok(Json(AddPlayerResponse {
        participant_id: req.participant_id,
        team,
    }))
}

async fn remove_player_handler(
    State(state): State<AppState>,
    Path((id, participant_id)): Path<(SessionId, ParticipantId)>,
) -> Result<StatusCode, AppError> {
    find_session(&state, id)?.remove_participant(&participant_id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct SpectatorRequest {
    participant_id: ParticipantId,
    spectator: bool,
}

async fn spectator_handler(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
    Json(req): Json<SpectatorRequest>,
) -> Result<StatusCode, AppError> {
    find_session(&state, id)?.set_spectator(&req.participant_id, req.spectator)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct SpawnRequest {
    team: Team,
    pos: BlockPos,
}

async fn spawn_handler(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
    Json(req): Json<SpawnRequest>,
) -> Result<StatusCode, AppError> {
    if req.team == Team::None {
        return Err(AppError::BadRequest("spawns belong to red or blue".to_string()));
    }
    find_session(&state, id)?.set_spawn(req.team, req.pos);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct ZoneRequest {
    kind: ZoneKind,
    from: BlockPos,
    to: BlockPos,
}

async fn zone_handler(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
    Json(req): Json<ZoneRequest>,
) -> Result<StatusCode, AppError> {
    find_session(&state, id)?.add_zone(req.kind, Zone::from_corners(req.from, req.to));
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct BuildCheckRequest {
    participant_id: ParticipantId,
    pos: BlockPos,
    action: BuildAction,
}

#[derive(Serialize)]
struct BuildCheckResponse {
    allowed: bool,
    damage_immune: bool,
}

async fn build_check_handler(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
    Json(req): Json<BuildCheckRequest>,
) -> Result<Json<BuildCheckResponse>, AppError> {
    let session = find_session(&state, id)?;
    Ok(Json(BuildCheckResponse {
        allowed: session.can_build_at(&req.participant_id, req.pos, req.action),
        damage_immune: session.is_block_damage_immune(req.pos),
    }))
}

#[derive(Deserialize)]
struct OrdnanceRequest {
    participant_id: ParticipantId,
    #[serde(default)]
    detonated: bool,
}

#[derive(Serialize)]
struct OrdnanceResponse {
    active: u32,
}

async fn ordnance_handler(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
    Json(req): Json<OrdnanceRequest>,
) -> Result<Json<OrdnanceResponse>, AppError> {
    let session = find_session(&state, id)?;
    let active = if req.detonated {
        session.record_ordnance_detonated(&req.participant_id)?
    } else {
        session.record_ordnance_placed(&req.participant_id)?
    };
    Ok(Json(OrdnanceResponse { active }))
}

#[derive(Deserialize)]
struct ModeRequest {
    mode: GameMode,
}

async fn mode_handler(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
    Json(req): Json<ModeRequest>,
) -> Result<Json<SessionSummary>, AppError> {
    let session = find_session(&state, id)?;
    session.set_mode(req.mode)?;
    Ok(Json(session.summary()))
}

async fn start_handler(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> Result<Json<SessionSummary>, AppError> {
    let session = find_session(&state, id)?;
    state.registry.start(id)?;
    Ok(Json(session.summary()))
}

async fn stop_handler(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> Result<StatusCode, AppError> {
    state.registry.stop(id)?;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Deserialize)]
struct HitsRequest {
    attacker: ParticipantId,
    victims: Vec<ParticipantId>,
}

#[derive(Serialize)]
struct HitsResponse {
    kills: u32,
    team_kills: u32,
    deaths: Vec<ParticipantId>,
    score_delta: i32,
}

async fn hits_handler(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
    Json(req): Json<HitsRequest>,
) -> Result<Json<HitsResponse>, AppError> {
    let report = find_session(&state, id)?.handle_kill(req.attacker, &req.victims)?;
    Ok(Json(HitsResponse {
        kills: report.kills,
        team_kills: report.team_kills,
        deaths: report.deaths,
        score_delta: report.score_delta,
    }))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(_) | SessionError::UnknownParticipant(_) => {
                AppError::NotFound(err.to_string())
            }
            SessionError::WorldAlreadyHosting(_)
            | SessionError::AlreadyStarted(_)
            | SessionError::AlreadyJoined(_)
            | SessionError::ModeLocked
            | SessionError::NotInProgress
            | SessionError::InvalidTransition { .. } => AppError::Conflict(err.to_string()),
            SessionError::NoWorld | SessionError::InvalidConfig(_) => {
                AppError::BadRequest(err.to_string())
            }
            SessionError::SetupFailure(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
