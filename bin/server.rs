// Club Roster - Web Server
// Read-only JSON view of the roster and the ledger

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use club_roster::{
    standings, Config, ContributionLedger, Database, LedgerSummary, Money, PlayerRecord,
    PlayerStore, RosterError,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const ENV_ADDR: &str = "ROSTER_SERVER_ADDR";

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Database>>,
    ledger: ContributionLedger,
}

impl AppState {
    fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            ledger: ContributionLedger::new(),
        }
    }

    fn db(&self) -> Result<MutexGuard<'_, Database>, ApiError> {
        self.db.lock().map_err(|_| ApiError::Poisoned)
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn failure(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

enum ApiError {
    Roster(RosterError),
    Poisoned,
}

impl From<RosterError> for ApiError {
    fn from(err: RosterError) -> Self {
        ApiError::Roster(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Roster(err @ RosterError::PlayerNotFound(_)) => {
                (StatusCode::NOT_FOUND, err.to_string())
            }
            ApiError::Roster(err) => {
                error!(error = %err, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            ApiError::Poisoned => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "database lock poisoned".to_string(),
            ),
        };

        (status, Json(ApiResponse::failure(message))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Serialize)]
struct StandingRow {
    rank: usize,
    #[serde(flatten)]
    player: PlayerRecord,
}

#[derive(Serialize)]
struct BalanceResponse {
    balance: Money,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/standings - Players by points, ties in registration order
async fn get_standings(State(state): State<AppState>) -> ApiResult<Vec<StandingRow>> {
    let db = state.db()?;
    let players = PlayerStore::new(db.connection()).list_all()?;

    let rows = standings(players)
        .into_iter()
        .enumerate()
        .map(|(i, player)| StandingRow { rank: i + 1, player })
        .collect();

    Ok(Json(ApiResponse::ok(rows)))
}

/// GET /api/players/:name - One player's record
async fn get_player(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<PlayerRecord> {
    let db = state.db()?;

    let player = PlayerStore::new(db.connection())
        .get(&name)?
        .ok_or_else(|| RosterError::PlayerNotFound(name.trim().to_string()))?;

    Ok(Json(ApiResponse::ok(player)))
}

/// GET /api/ledger - Every contribution and expense plus totals
async fn get_ledger(State(state): State<AppState>) -> ApiResult<LedgerSummary> {
    let db = state.db()?;
    Ok(Json(ApiResponse::ok(state.ledger.summary(&db)?)))
}

/// GET /api/ledger/balance
async fn get_balance(State(state): State<AppState>) -> ApiResult<BalanceResponse> {
    let db = state.db()?;
    let balance = state.ledger.compute_balance(&db)?;
    Ok(Json(ApiResponse::ok(BalanceResponse { balance })))
}

fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/standings", get(get_standings))
        .route("/players/:name", get(get_player))
        .route("/ledger", get(get_ledger))
        .route("/ledger/balance", get(get_balance))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

// ============================================================================
// Main Server
// ============================================================================

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var(ENV_ADDR).ok()?.parse().ok()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::load(None)?;
    let db = Database::open(&config.database_path)?;
    info!(db = ?config.database_path, "database opened");

    let app = build_router(AppState::new(db));

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 3000)));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "roster server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
