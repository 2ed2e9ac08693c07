use crate::db;
use crate::errors::{EngineError, EngineResult};
use crate::models::black_scholes;
use crate::models::{GreekKind, GreeksResult, OptionContract, OptionSide};
use crate::position::enrichment::enrich_position;
use crate::position::{PositionInput, PositionSnapshot};
use crate::state::{AppState, CounterSnapshot, PerfCounters};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use std::sync::Arc;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct GreeksRequest {
    pub spot: f64,
    pub strike: f64,
    pub time_to_expiry: f64,
    pub rate: f64,
    pub sigma: f64,
    pub side: String,
}

impl GreeksRequest {
    /// Validates before anything is computed.
    fn contract(&self) -> EngineResult<OptionContract> {
        let side: OptionSide = self.side.parse()?;
        OptionContract::new(
            self.spot,
            self.strike,
            self.time_to_expiry,
            self.rate,
            self.sigma,
            side,
        )
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct AllGreeksResponse {
    pub side: OptionSide,
    pub greeks: GreeksResult,
    pub price: f64,
    pub d1: f64,
    pub d2: f64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct GreekResponse {
    pub kind: GreekKind,
    pub side: OptionSide,
    pub value: f64,
}

#[derive(serde::Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

/// Count and log a failed request, then hand the result back unchanged.
fn track<T>(state: &AppState, result: EngineResult<T>) -> EngineResult<T> {
    if let Err(e) = &result {
        match e {
            EngineError::InvalidParameter { .. } | EngineError::Parse(_) => {
                PerfCounters::bump(&state.counters.invalid_requests, 1);
                tracing::warn!(error = %e, "rejected request");
            }
            EngineError::NotFound(_) => tracing::debug!(error = %e, "not found"),
            EngineError::Database(_) | EngineError::Config(_) => {
                PerfCounters::bump(&state.counters.errors_recovered, 1);
                tracing::error!(error = %e, "request failed");
            }
        }
    }
    result
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> EngineResult<T> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| EngineError::Parse(e.body_text()))
}

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /api/greeks -- all five Greeks plus theoretical value
pub async fn post_all_greeks(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GreeksRequest>, JsonRejection>,
) -> EngineResult<Json<AllGreeksResponse>> {
    let result = body(payload).and_then(|req| {
        let contract = req.contract()?;
        let greeks = black_scholes::compute_all_greeks(&contract)?;
        Ok(AllGreeksResponse {
            side: contract.side,
            greeks,
            price: black_scholes::price(&contract)?,
            d1: black_scholes::d1(&contract)?,
            d2: black_scholes::d2(&contract)?,
        })
    });
    let resp = track(&state, result)?;
    PerfCounters::bump(&state.counters.greeks_computed, GreekKind::ALL.len() as u64);
    Ok(Json(resp))
}

/// POST /api/greeks/{kind} -- a single Greek
pub async fn post_greek(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    payload: Result<Json<GreeksRequest>, JsonRejection>,
) -> EngineResult<Json<GreekResponse>> {
    let result = kind.parse::<GreekKind>().and_then(|kind| {
        let contract = body(payload)?.contract()?;
        let value = black_scholes::compute_greek(kind, &contract)?;
        Ok(GreekResponse {
            kind,
            side: contract.side,
            value,
        })
    });
    let resp = track(&state, result)?;
    PerfCounters::bump(&state.counters.greeks_computed, 1);
    Ok(Json(resp))
}

/// GET /api/positions -- stored positions, derived fields refreshed against now
pub async fn list_positions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListQuery>,
) -> EngineResult<Json<Vec<PositionSnapshot>>> {
    let limit = params.limit.unwrap_or(100).min(1000);
    let stored = track(&state, db::list_positions(&state.db, limit))?;

    let now = chrono::Utc::now();
    let positions: Vec<_> = stored
        .into_iter()
        .map(|p| enrich_position(p, now))
        .collect();
    PerfCounters::bump(&state.counters.positions_enriched, positions.len() as u64);
    Ok(Json(positions))
}

/// POST /api/positions -- create, enriched before persisting
pub async fn create_position(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PositionInput>, JsonRejection>,
) -> EngineResult<(StatusCode, Json<PositionSnapshot>)> {
    let result = body(payload)
        .and_then(|input| db::create_position(&state.db, input, chrono::Utc::now()));
    let created = track(&state, result)?;
    PerfCounters::bump(&state.counters.positions_enriched, 1);
    PerfCounters::bump(&state.counters.positions_written, 1);
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/positions/{id}
pub async fn get_position(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> EngineResult<Json<PositionSnapshot>> {
    let position = track(&state, db::get_position(&state.db, &id))?;
    Ok(Json(position))
}

/// PUT /api/positions/{id} -- replace editable fields, re-enrich, persist
pub async fn update_position(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<PositionInput>, JsonRejection>,
) -> EngineResult<Json<PositionSnapshot>> {
    let result = body(payload)
        .and_then(|input| db::update_position(&state.db, &id, input, chrono::Utc::now()));
    let updated = track(&state, result)?;
    PerfCounters::bump(&state.counters.positions_enriched, 1);
    PerfCounters::bump(&state.counters.positions_written, 1);
    Ok(Json(updated))
}

/// DELETE /api/positions/{id}
pub async fn delete_position(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> EngineResult<StatusCode> {
    track(&state, db::delete_position(&state.db, &id))?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/positions/enrich -- enrich a snapshot without storing it
pub async fn enrich_preview(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PositionSnapshot>, JsonRejection>,
) -> EngineResult<Json<PositionSnapshot>> {
    let snapshot = track(&state, body(payload))?;
    PerfCounters::bump(&state.counters.positions_enriched, 1);
    Ok(Json(enrich_position(snapshot, chrono::Utc::now())))
}

/// GET /api/counters -- performance counters (lock-free reads)
pub async fn get_counters(State(state): State<Arc<AppState>>) -> Json<CounterSnapshot> {
    Json(state.counters.snapshot())
}
