use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use menu_api::{catalog, nav::handle_menu_action, orders, stats, ApiContext, ItemPicker};
use serde::{Deserialize, Serialize};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{CatalogLoadSummary, CatalogRow, RenderPayload},
    token::{NavState, OrderToken, StatsPeriod, StatsToken, Token},
};
use storage::Storage;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};

mod config;
mod render;
mod report;
mod session;

use config::{load_settings, prepare_database_url};
use session::OperatorSessions;

#[derive(Clone)]
struct AppState {
    api: ApiContext,
    sessions: Arc<OperatorSessions>,
    operator_password: String,
}

#[derive(Debug, Deserialize)]
struct SessionRequest {
    external_id: i64,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionResponse {
    user_id: i64,
}

#[derive(Debug, Deserialize)]
struct ActionRequest {
    external_id: i64,
    #[serde(default)]
    display_name: Option<String>,
    token: String,
}

#[derive(Debug, Deserialize)]
struct UserQuery {
    external_id: i64,
}

#[derive(Debug, Deserialize)]
struct ExportQuery {
    external_id: i64,
    period: String,
}

#[derive(Debug, Deserialize)]
struct OperatorLoginRequest {
    external_id: i64,
    password: String,
}

#[derive(Debug, Deserialize)]
struct OperatorLogoutRequest {
    external_id: i64,
}

#[derive(Debug, Deserialize)]
struct CatalogUploadRequest {
    external_id: i64,
    restaurant_name: String,
    #[serde(default)]
    description: Option<String>,
    rows: Vec<CatalogRow>,
}

const MAX_CATALOG_UPLOAD_BYTES: usize = 2 * 1024 * 1024;
const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let picker = match settings.random_seed {
        Some(seed) => ItemPicker::with_seed(seed),
        None => ItemPicker::new(),
    };

    let state = AppState {
        api: ApiContext { storage, picker },
        sessions: Arc::new(OperatorSessions::new(settings.operator_session_minutes)),
        operator_password: settings.operator_password,
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    let operator = Router::new()
        .route("/operator/login", post(operator_login))
        .route("/operator/logout", post(operator_logout))
        .route("/operator/catalog", post(operator_catalog))
        .layer(RequestBodyLimitLayer::new(MAX_CATALOG_UPLOAD_BYTES));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/session", post(open_session))
        .route("/menu", get(menu_entry))
        .route("/actions", post(dispatch_action))
        .route("/orders/today", get(todays_orders))
        .route("/stats", get(stats_menu))
        .route("/stats/export", get(stats_export))
        .merge(operator)
        .with_state(state)
}

async fn healthz(
    State(state): State<Arc<AppState>>,
) -> Result<&'static str, (StatusCode, Json<ApiError>)> {
    state
        .api
        .storage
        .health_check()
        .await
        .map_err(|e| respond(ApiError::new(ErrorCode::StoreUnavailable, e.to_string())))?;
    Ok("ok")
}

async fn open_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SessionRequest>,
) -> Result<Json<SessionResponse>, (StatusCode, Json<ApiError>)> {
    let user_id = state
        .api
        .storage
        .find_or_create_user(req.external_id, req.display_name.as_deref())
        .await
        .map_err(|e| respond(ApiError::new(ErrorCode::StoreUnavailable, e.to_string())))?;
    Ok(Json(SessionResponse { user_id: user_id.0 }))
}

async fn menu_entry(
    State(state): State<Arc<AppState>>,
    Query(q): Query<UserQuery>,
) -> Result<Json<RenderPayload>, (StatusCode, Json<ApiError>)> {
    let outcome = handle_menu_action(&state.api, q.external_id, None, &NavState::root())
        .await
        .map_err(respond)?;
    Ok(Json(render::render_outcome(&outcome)))
}

/// Single dispatch point for every button tap: decode the token, route
/// it to the matching core operation, and hand back what to render.
async fn dispatch_action(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ActionRequest>,
) -> Result<Json<RenderPayload>, (StatusCode, Json<ApiError>)> {
    let token = Token::decode(&req.token)
        .map_err(|e| respond(ApiError::new(ErrorCode::MalformedToken, e.to_string())))?;

    let payload = match token {
        Token::Menu(nav_state) => {
            let result = handle_menu_action(
                &state.api,
                req.external_id,
                req.display_name.as_deref(),
                &nav_state,
            )
            .await;
            match result {
                Ok(outcome) => render::render_outcome(&outcome),
                // An empty random scope is not an error to the user; the
                // current view stays put.
                Err(err) if matches!(err.code, ErrorCode::EmptyScope) => {
                    RenderPayload::notice("Nothing here yet")
                }
                Err(err) => return Err(respond(err)),
            }
        }
        Token::Order(OrderToken::Delete { order_id }) => {
            orders::delete_order(&state.api, order_id)
                .await
                .map_err(respond)?;
            RenderPayload::notice("Order deleted")
        }
        Token::Stats(stats_token) => stats_payload(&state, req.external_id, stats_token)
            .await
            .map_err(respond)?,
    };
    Ok(Json(payload))
}

async fn stats_payload(
    state: &AppState,
    external_id: i64,
    token: StatsToken,
) -> Result<RenderPayload, ApiError> {
    match token {
        StatsToken::Picker => Ok(render::render_stats_picker()),
        StatsToken::View(period) => {
            let summary = stats::aggregate(&state.api, external_id, period.window_days()).await?;
            Ok(match summary {
                Some(summary) => render::render_stats_summary(period, &summary),
                None => RenderPayload::notice("No orders in this period"),
            })
        }
        StatsToken::Export(period) => Ok(render::render_export_pointer(period, external_id)),
    }
}

async fn todays_orders(
    State(state): State<Arc<AppState>>,
    Query(q): Query<UserQuery>,
) -> Result<Json<RenderPayload>, (StatusCode, Json<ApiError>)> {
    let day = chrono::Utc::now().date_naive();
    let listing = orders::list_today(&state.api, q.external_id, day)
        .await
        .map_err(respond)?;
    Ok(Json(render::render_day_orders(&listing)))
}

async fn stats_menu() -> Json<RenderPayload> {
    Json(render::render_stats_picker())
}

async fn stats_export(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ExportQuery>,
) -> Result<impl IntoResponse, (StatusCode, Json<ApiError>)> {
    let period = StatsPeriod::parse(&q.period)
        .ok_or_else(|| respond(ApiError::new(ErrorCode::Validation, "unknown report period")))?;
    let rows = stats::export_rows(&state.api, q.external_id, period.window_days())
        .await
        .map_err(respond)?;
    if rows.is_empty() {
        return Err(respond(ApiError::new(
            ErrorCode::NotFound,
            "no orders in this period",
        )));
    }

    let bytes = report::stats_workbook(&rows).map_err(|e| {
        respond(ApiError::new(
            ErrorCode::StoreUnavailable,
            format!("report generation failed: {e}"),
        ))
    })?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(XLSX_CONTENT_TYPE));
    let filename = format!("stats_{}.xlsx", period.wire());
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\"")) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok((StatusCode::OK, headers, bytes))
}

async fn operator_login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OperatorLoginRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ApiError>)> {
    if req.password != state.operator_password {
        state.sessions.close(req.external_id);
        return Err(respond(ApiError::new(
            ErrorCode::Unauthorized,
            "wrong operator password",
        )));
    }
    state.sessions.open(req.external_id);
    info!(external_id = req.external_id, "operator session opened");
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn operator_logout(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OperatorLogoutRequest>,
) -> Json<serde_json::Value> {
    state.sessions.close(req.external_id);
    Json(serde_json::json!({ "ok": true }))
}

async fn operator_catalog(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CatalogUploadRequest>,
) -> Result<Json<CatalogLoadSummary>, (StatusCode, Json<ApiError>)> {
    if !state.sessions.is_active(req.external_id) {
        return Err(respond(ApiError::new(
            ErrorCode::Unauthorized,
            "operator session required",
        )));
    }
    let summary = catalog::load_catalog(
        &state.api,
        &req.restaurant_name,
        req.description.as_deref(),
        &req.rows,
    )
    .await
    .map_err(respond)?;
    Ok(Json(summary))
}

fn respond(error: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = match error.code {
        ErrorCode::MalformedToken | ErrorCode::InvalidState | ErrorCode::Validation => {
            StatusCode::BAD_REQUEST
        }
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::EmptyScope => StatusCode::OK,
        ErrorCode::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(error))
}
