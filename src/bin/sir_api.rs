use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::json;

use sirsim::calibration::RunSummary;
use sirsim::config::ScenarioConfig;
use sirsim::session::{ParamChange, SessionHandle, SharedLatest, SimulationSession};
use sirsim::{simulate_with, SimError, SirParams, Trajectory};

#[derive(Clone)]
struct AppState {
    cfg: Arc<ScenarioConfig>,
    session: Arc<SessionHandle>,
    latest: SharedLatest,
}

#[derive(Debug, Deserialize)]
struct RunRequest {
    beta: Option<f64>,
    gamma: Option<f64>,
    population: Option<f64>,
    initial_infected: Option<f64>,
    initial_recovered: Option<f64>,
    t_max: Option<f64>,
    n_points: Option<usize>,
}

#[derive(Debug, Serialize)]
struct RunResponse {
    return_code: i32,
    params: SirParams,
    population: f64,
    summary: Option<RunSummary>,
    trajectory: Trajectory,
}

#[derive(Debug, Deserialize)]
struct ParamsRequest {
    beta: Option<f64>,
    gamma: Option<f64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = match std::env::var("SIR_CONFIG") {
        Ok(path) => ScenarioConfig::from_json_file(path)?,
        Err(_) => ScenarioConfig::default(),
    };

    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);

    let session = SimulationSession::from_config(&cfg).context("initial simulation failed")?;
    let latest = SharedLatest::default();
    let handle = SessionHandle::spawn(session, latest.clone(), true);

    let state = AppState {
        cfg: Arc::new(cfg),
        session: Arc::new(handle),
        latest,
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/run_simulation", post(run_simulation))
        .route("/session", get(session_latest))
        .route("/session/params", post(session_params))
        .route("/session/reset", post(session_reset))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse().context("invalid HOST/PORT")?;
    info!("[sir-api] listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.context("bind failed")?;
    axum::serve(listener, app).await.context("server failed")?;
    Ok(())
}

async fn healthz() -> impl IntoResponse {
    Json(json!({"ok": true}))
}

async fn run_simulation(State(st): State<AppState>, Json(req): Json<RunRequest>) -> impl IntoResponse {
    // integration is CPU work; keep it off the async executor
    let cfg = Arc::clone(&st.cfg);
    let join = tokio::task::spawn_blocking(move || run_simulation_sync(&cfg, req));

    match join.await {
        Ok(Ok(resp)) => (StatusCode::OK, Json(resp)).into_response(),
        Ok(Err((code, body))) => (code, Json(body)).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"return_code": 2, "error": format!("join error: {e}")})),
        )
            .into_response(),
    }
}

fn run_simulation_sync(
    base: &ScenarioConfig,
    req: RunRequest,
) -> Result<RunResponse, (StatusCode, serde_json::Value)> {
    let mut cfg = base.clone();
    cfg.beta = req.beta.unwrap_or(cfg.beta);
    cfg.gamma = req.gamma.unwrap_or(cfg.gamma);
    cfg.population = req.population.unwrap_or(cfg.population);
    cfg.initial_infected = req.initial_infected.unwrap_or(cfg.initial_infected);
    cfg.initial_recovered = req.initial_recovered.unwrap_or(cfg.initial_recovered);
    cfg.t_max = req.t_max.unwrap_or(cfg.t_max);
    cfg.n_points = req.n_points.unwrap_or(cfg.n_points);

    cfg.check().map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            json!({"return_code": 1, "error": format!("invalid scenario: {e:#}")}),
        )
    })?;

    let params = cfg.params();
    let trajectory = cfg
        .time_grid()
        .and_then(|grid| simulate_with(cfg.population, cfg.initial(), params, grid.as_slice(), &cfg.solver))
        .map_err(|e| {
            let code = match e {
                SimError::NumericInstability { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::BAD_REQUEST,
            };
            (code, json!({"return_code": 1, "error": e.to_string()}))
        })?;

    Ok(RunResponse {
        return_code: 0,
        params,
        population: cfg.population,
        summary: RunSummary::from_run(cfg.population, &params, &trajectory),
        trajectory,
    })
}

async fn session_latest(State(st): State<AppState>) -> impl IntoResponse {
    match st.latest.latest() {
        Some(update) => (
            StatusCode::OK,
            Json(json!({
                "state": st.session.state(),
                "revision": update.revision,
                "params": update.params,
                "trajectory": update.trajectory,
                "last_error": st.latest.last_error(),
            })),
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"error": "session not ready"}))).into_response(),
    }
}

async fn session_params(State(st): State<AppState>, Json(req): Json<ParamsRequest>) -> impl IntoResponse {
    let change = match (req.beta, req.gamma) {
        (Some(beta), Some(gamma)) => ParamChange::Both(SirParams::new(beta, gamma)),
        (Some(beta), None) => ParamChange::Beta(beta),
        (None, Some(gamma)) => ParamChange::Gamma(gamma),
        (None, None) => {
            return (StatusCode::BAD_REQUEST, Json(json!({"error": "expected beta and/or gamma"}))).into_response();
        }
    };
    submit(&st, change)
}

async fn session_reset(State(st): State<AppState>) -> impl IntoResponse {
    submit(&st, ParamChange::Reset)
}

fn submit(st: &AppState, change: ParamChange) -> axum::response::Response {
    match st.session.submit(change) {
        Ok(()) => (StatusCode::ACCEPTED, Json(json!({"queued": true}))).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": e.to_string()}))).into_response(),
    }
}
