//! Single binary web server: management API via REST plus the background
//! phase-driver sweep.
//! Run with: cargo run --bin web
//! Listens on 0.0.0.0:8080 by default so the app is reachable via DNS on a VPS.
//! Override with env: HOST (e.g. 0.0.0.0), PORT (e.g. 8080).

use actix_web::{
    delete, get, post, put,
    web::{Data, Json, Path},
    App, HttpResponse, HttpServer, Responder,
};
use chrono::Utc;
use court_rotation_web::{
    run_selection, swap_players, tick_all, ClubId, Gender, LogNotifier, MemoryStore, RoundKind,
    SchedulerError, SessionConfig, SessionId, Store, StoreError, TickOutcome,
};
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

/// In-memory state shared by the API handlers and the tick loop.
type AppState = Data<MemoryStore>;

#[derive(serde::Serialize)]
struct HealthResponse {
    ok: bool,
    service: &'static str,
}

#[derive(Deserialize)]
struct CreateClubBody {
    name: String,
}

#[derive(Deserialize)]
struct AddCourtBody {
    name: String,
}

#[derive(Deserialize)]
struct AddPlayerBody {
    name: String,
    #[serde(default)]
    gender: Option<Gender>,
    #[serde(default = "default_level")]
    level: u8,
}

fn default_level() -> u8 {
    3
}

#[derive(Deserialize)]
struct SwapBody {
    player1_id: Uuid,
    player2_id: Uuid,
}

/// Path segment: club id (e.g. /api/clubs/{club_id}/courts)
#[derive(Deserialize)]
struct ClubPath {
    club_id: ClubId,
}

/// Path segments: club id and court id
#[derive(Deserialize)]
struct ClubCourtPath {
    club_id: ClubId,
    court_id: Uuid,
}

/// Path segment: session id (e.g. /api/sessions/{id})
#[derive(Deserialize)]
struct SessionPath {
    id: SessionId,
}

/// Path segments: session id and player id
#[derive(Deserialize)]
struct SessionPlayerPath {
    id: SessionId,
    player_id: Uuid,
}

fn error_body(message: impl std::fmt::Display) -> serde_json::Value {
    serde_json::json!({ "error": message.to_string() })
}

/// Map store failures onto HTTP statuses.
fn store_error(e: StoreError) -> HttpResponse {
    match e {
        StoreError::SessionNotFound(_)
        | StoreError::ClubNotFound(_)
        | StoreError::CourtNotFound(_)
        | StoreError::PlayerNotFound(_)
        | StoreError::AssignmentNotFound(_) => HttpResponse::NotFound().json(error_body(e)),
        StoreError::DuplicatePlayer(_) | StoreError::Lifecycle(_) => {
            HttpResponse::BadRequest().json(error_body(e))
        }
        StoreError::Poisoned | StoreError::Backend(_) => {
            HttpResponse::InternalServerError().json(error_body(e))
        }
    }
}

fn scheduler_error(e: SchedulerError) -> HttpResponse {
    match e {
        SchedulerError::Store(inner) => store_error(inner),
        SchedulerError::SelectionInProgress => HttpResponse::Conflict().json(error_body(e)),
        SchedulerError::SamePlayer
        | SchedulerError::NeitherOnCourt
        | SchedulerError::CrossRoundSwap => HttpResponse::BadRequest().json(error_body(e)),
    }
}

#[get("/api/health")]
async fn api_health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        ok: true,
        service: "court-rotation-web",
    })
}

/// Create a club (returns it with id; client stores id for subsequent requests).
#[post("/api/clubs")]
async fn api_create_club(state: AppState, body: Json<CreateClubBody>) -> HttpResponse {
    match state.create_club(body.name.trim()) {
        Ok(club) => HttpResponse::Ok().json(club),
        Err(e) => store_error(e),
    }
}

/// Add a court to a club.
#[post("/api/clubs/{club_id}/courts")]
async fn api_add_court(state: AppState, path: Path<ClubPath>, body: Json<AddCourtBody>) -> HttpResponse {
    match state.add_court(path.club_id, body.name.trim()) {
        Ok(court) => HttpResponse::Ok().json(court),
        Err(e) => store_error(e),
    }
}

/// Toggle a court's locked flag; locked courts sit out the rotation.
#[post("/api/clubs/{club_id}/courts/{court_id}/toggle-lock")]
async fn api_toggle_court_lock(state: AppState, path: Path<ClubCourtPath>) -> HttpResponse {
    match state.toggle_court_lock(path.club_id, path.court_id) {
        Ok(court) => HttpResponse::Ok().json(court),
        Err(e) => store_error(e),
    }
}

/// Create a session for a club. Body carries the full settings; omit it for
/// defaults.
#[post("/api/clubs/{club_id}/sessions")]
async fn api_create_session(
    state: AppState,
    path: Path<ClubPath>,
    body: Option<Json<SessionConfig>>,
) -> HttpResponse {
    let config = body.map(|b| b.into_inner()).unwrap_or_default();
    if let Err(e) = config.validate() {
        return HttpResponse::BadRequest().json(error_body(e));
    }
    match state.create_session(path.club_id, config) {
        Ok(session) => HttpResponse::Ok().json(session),
        Err(e) => store_error(e),
    }
}

/// Get a session with its players and assignments (404 if not found).
#[get("/api/sessions/{id}")]
async fn api_get_session(state: AppState, path: Path<SessionPath>) -> HttpResponse {
    match state.session_detail(path.id) {
        Ok(detail) => HttpResponse::Ok().json(detail),
        Err(e) => store_error(e),
    }
}

/// Replace the session settings (rejected once ended, or out of range).
#[put("/api/sessions/{id}/settings")]
async fn api_update_settings(
    state: AppState,
    path: Path<SessionPath>,
    body: Json<SessionConfig>,
) -> HttpResponse {
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest().json(error_body(e));
    }
    match state.update_session_config(path.id, body.into_inner()) {
        Ok(session) => HttpResponse::Ok().json(session),
        Err(e) => store_error(e),
    }
}

/// Start the session: the driver picks it up on the next sweep.
#[post("/api/sessions/{id}/start")]
async fn api_start_session(state: AppState, path: Path<SessionPath>) -> HttpResponse {
    match state.start_session(path.id, Utc::now()) {
        Ok(session) => HttpResponse::Ok().json(session),
        Err(e) => store_error(e),
    }
}

#[post("/api/sessions/{id}/pause")]
async fn api_pause_session(state: AppState, path: Path<SessionPath>) -> HttpResponse {
    match state.pause_session(path.id) {
        Ok(session) => HttpResponse::Ok().json(session),
        Err(e) => store_error(e),
    }
}

#[post("/api/sessions/{id}/resume")]
async fn api_resume_session(state: AppState, path: Path<SessionPath>) -> HttpResponse {
    match state.resume_session(path.id) {
        Ok(session) => HttpResponse::Ok().json(session),
        Err(e) => store_error(e),
    }
}

#[post("/api/sessions/{id}/end")]
async fn api_end_session(state: AppState, path: Path<SessionPath>) -> HttpResponse {
    match state.end_session(path.id, Utc::now()) {
        Ok(()) => match state.session_detail(path.id) {
            Ok(detail) => HttpResponse::Ok().json(detail.session),
            Err(e) => store_error(e),
        },
        Err(e) => store_error(e),
    }
}

/// Add a player to the session's pool.
#[post("/api/sessions/{id}/players")]
async fn api_add_player(
    state: AppState,
    path: Path<SessionPath>,
    body: Json<AddPlayerBody>,
) -> HttpResponse {
    match state.add_player(path.id, body.name.trim(), body.gender, body.level) {
        Ok(player) => HttpResponse::Ok().json(player),
        Err(e) => store_error(e),
    }
}

/// Remove a player. Mid-game removals are deferred until the round ends.
#[delete("/api/sessions/{id}/players/{player_id}")]
async fn api_remove_player(state: AppState, path: Path<SessionPlayerPath>) -> HttpResponse {
    match state.remove_player(path.id, path.player_id) {
        Ok(true) => HttpResponse::Ok().json(serde_json::json!({
            "ok": true,
            "note": "Will be removed after current game",
        })),
        Ok(false) => HttpResponse::Ok().json(serde_json::json!({ "ok": true })),
        Err(e) => store_error(e),
    }
}

/// Run selection now (manager action). Uses the same lock discipline as the
/// driver; a run already in flight yields 409.
#[post("/api/sessions/{id}/select")]
async fn api_run_selection(state: AppState, path: Path<SessionPath>) -> HttpResponse {
    match run_selection(
        state.get_ref(),
        &LogNotifier,
        path.id,
        RoundKind::Active,
        Utc::now(),
    ) {
        Ok(outcome) => HttpResponse::Ok().json(serde_json::json!({ "outcome": outcome })),
        Err(e) => scheduler_error(e),
    }
}

/// Swap two players across the current court layout (manager action).
#[post("/api/sessions/{id}/swap")]
async fn api_swap_players(
    state: AppState,
    path: Path<SessionPath>,
    body: Json<SwapBody>,
) -> HttpResponse {
    match swap_players(
        state.get_ref(),
        path.id,
        body.player1_id,
        body.player2_id,
        Utc::now(),
    ) {
        Ok(outcome) => HttpResponse::Ok().json(serde_json::json!({ "outcome": outcome })),
        Err(e) => scheduler_error(e),
    }
}

/// Session event log (selection runs, auto-termination).
#[get("/api/sessions/{id}/events")]
async fn api_session_events(state: AppState, path: Path<SessionPath>) -> HttpResponse {
    match state.events(path.id) {
        Ok(events) => HttpResponse::Ok().json(events),
        Err(e) => store_error(e),
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let host = std::env::var("HOST").unwrap_or_else(|_| default_host());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or_else(default_port);
    let bind = (host.as_str(), port);
    log::info!("Starting server at http://{}:{}", bind.0, bind.1);

    let state = Data::new(MemoryStore::new());

    // Background task: sweep all running sessions every 10 seconds and
    // advance their phases.
    let state_tick = state.clone();
    actix_web::rt::spawn(async move {
        let mut interval = actix_web::rt::time::interval(Duration::from_secs(
            court_rotation_web::scheduler::TICK_INTERVAL_SECS,
        ));
        loop {
            interval.tick().await;
            for (id, result) in tick_all(state_tick.get_ref(), &LogNotifier, Utc::now()) {
                match result {
                    Ok(TickOutcome::NoChange) | Ok(TickOutcome::Skipped) => {}
                    Ok(outcome) => log::info!("Session {}: {}", id, outcome),
                    Err(e) => log::error!("Session {}: tick failed: {}", id, e),
                }
            }
        }
    });

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .service(api_health)
            .service(api_create_club)
            .service(api_add_court)
            .service(api_toggle_court_lock)
            .service(api_create_session)
            .service(api_get_session)
            .service(api_update_settings)
            .service(api_start_session)
            .service(api_pause_session)
            .service(api_resume_session)
            .service(api_end_session)
            .service(api_add_player)
            .service(api_remove_player)
            .service(api_run_selection)
            .service(api_swap_players)
            .service(api_session_events)
    })
    .bind(bind)?
    .run()
    .await
}
