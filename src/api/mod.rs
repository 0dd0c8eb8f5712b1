mod store;

use axum::{
    Router,
    extract::{
        Json, Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::core::{
    AllocationSet, RiskRecord, RiskTable, Strategy, compute_rebalance, project_strategy,
};
use crate::error::SimError;

pub use store::{NewUser, PortfolioStore, UserRecord};

pub const DEFAULT_INITIAL_FUND: f64 = 5000.0;

#[derive(Clone)]
pub struct AppState {
    pub store: PortfolioStore,
    pub risk: Arc<dyn RiskTable>,
    pub initial_fund: f64,
}

impl AppState {
    pub fn new(risk: Arc<dyn RiskTable>, initial_fund: f64) -> Self {
        Self {
            store: PortfolioStore::new(),
            risk,
            initial_fund,
        }
    }
}

/// A request body taken as a raw JSON object.
///
/// Fields are read one at a time so that an absent key, an explicit `null` and
/// a value of the wrong type each get their own error, located at the key.
#[derive(Debug, Default, Deserialize)]
#[serde(transparent)]
struct RequestBody(Map<String, Value>);

impl RequestBody {
    /// A JSON number, or a string holding one. Browser forms post allocation
    /// percentages as strings.
    fn number(&self, field: &'static str) -> Result<Option<f64>, SimError> {
        let value = match self.0.get(field) {
            None => return Ok(None),
            Some(Value::Null) => return Err(SimError::validation(field, "must not be null")),
            Some(Value::Number(n)) => n
                .as_f64()
                .ok_or_else(|| SimError::validation(field, "must be a finite number"))?,
            Some(Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| SimError::validation(field, format!("'{s}' is not a number")))?,
            Some(_) => {
                return Err(SimError::validation(
                    field,
                    "Incorrect field type: expected number",
                ));
            }
        };
        if !value.is_finite() {
            return Err(SimError::validation(field, "must be a finite number"));
        }
        Ok(Some(value))
    }

    fn required_number(&self, field: &'static str) -> Result<f64, SimError> {
        self.number(field)?.ok_or(SimError::MissingField(field))
    }

    fn string(&self, field: &'static str) -> Result<Option<String>, SimError> {
        match self.0.get(field) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(SimError::validation(
                field,
                "Incorrect field type: expected string",
            )),
        }
    }
}

#[derive(Debug)]
struct InvestRequest {
    allocations: AllocationSet,
    year: i32,
    current_fund: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RiskQuery {
    year: Option<String>,
    strategy: Option<String>,
}

impl RiskQuery {
    fn year(&self) -> Result<Option<i32>, SimError> {
        let Some(raw) = self.year.as_deref() else {
            return Ok(None);
        };
        let year = raw
            .trim()
            .parse::<i32>()
            .map_err(|_| SimError::validation("year", format!("'{raw}' is not a whole number")))?;
        if year < 0 {
            return Err(SimError::validation("year", "must be >= 0"));
        }
        Ok(Some(year))
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    reason: &'static str,
    message: String,
    location: Option<&'static str>,
}

pub(crate) fn validate_fund(field: &'static str, fund: f64) -> Result<f64, SimError> {
    if !fund.is_finite() {
        return Err(SimError::validation(field, "must be a finite number"));
    }
    Ok(fund)
}

pub(crate) fn validate_year(year: f64) -> Result<i32, SimError> {
    if year.fract() != 0.0 {
        return Err(SimError::validation("year", "must be a whole number"));
    }
    if year < 0.0 || year > i32::MAX as f64 {
        return Err(SimError::validation("year", "must be >= 0"));
    }
    Ok(year as i32)
}

fn invest_request_from_body(body: &RequestBody) -> Result<InvestRequest, SimError> {
    let mut allocations = AllocationSet::new();
    for strategy in Strategy::ALL {
        let field = strategy.request_field();
        allocations.set(strategy, body.required_number(field)?);
    }

    let year = body.required_number("year")?;
    let current_fund = body.required_number("currentFund")?;

    Ok(InvestRequest {
        allocations,
        year: validate_year(year)?,
        current_fund: validate_fund("currentFund", current_fund)?,
    })
}

fn new_user_from_body(body: &RequestBody, default_fund: f64) -> Result<NewUser, SimError> {
    let username = body
        .string("username")?
        .ok_or(SimError::MissingField("username"))?;
    if username.is_empty() {
        return Err(SimError::validation(
            "username",
            "Must be at least 1 characters long",
        ));
    }
    if username.trim() != username {
        return Err(SimError::validation(
            "username",
            "Cannot start or end with whitespace",
        ));
    }

    let initial_fund = body.number("initialFund")?.unwrap_or(default_fund);
    let initial_fund = validate_fund("initialFund", initial_fund)?;
    if initial_fund < 0.0 {
        return Err(SimError::validation("initialFund", "must be >= 0"));
    }

    Ok(NewUser {
        username,
        first_name: body.string("firstName")?.unwrap_or_default(),
        last_name: body.string("lastName")?.unwrap_or_default(),
        email: body.string("email")?.unwrap_or_default(),
        initial_fund,
    })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/users", post(create_user_handler))
        .route("/api/risk", get(risk_handler))
        .route(
            "/api/level2/:id",
            get(get_user_handler).put(invest_handler),
        )
        .route("/api/level2/:id/:strategy", get(projection_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

pub async fn run_http_server(port: u16, state: AppState) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    info!("portfolio simulation API listening on http://{addr}");
    info!("local access: http://127.0.0.1:{port}/health");

    axum::serve(listener, app).await
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn not_found_handler() -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        "NotFound",
        "Not found".to_string(),
        "Not found".to_string(),
        None,
    )
}

async fn create_user_handler(
    State(state): State<AppState>,
    body: Result<Json<RequestBody>, JsonRejection>,
) -> Response {
    let new_user = match body
        .map_err(malformed_body)
        .and_then(|Json(body)| new_user_from_body(&body, state.initial_fund))
    {
        Ok(new_user) => new_user,
        Err(err) => return sim_error_response(err),
    };

    match state.store.create(new_user).await {
        Ok(user) => {
            info!("registered user {} ({})", user.username, user.id);
            json_response(StatusCode::CREATED, user)
        }
        Err(err) => sim_error_response(err),
    }
}

async fn get_user_handler(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.store.get(&id).await {
        Ok(user) => json_response(StatusCode::OK, user),
        Err(err) => sim_error_response(err),
    }
}

async fn invest_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<RequestBody>, JsonRejection>,
) -> Response {
    let request = match body
        .map_err(malformed_body)
        .and_then(|Json(body)| invest_request_from_body(&body))
    {
        Ok(request) => request,
        Err(err) => return sim_error_response(err),
    };

    if !request.allocations.is_normalized() {
        warn!(
            "user {id}: allocations for year {} sum to {}%, not 100%",
            request.year,
            request.allocations.total()
        );
    }

    let records = state.risk.find_by_year(request.year);
    let outcome = compute_rebalance(
        request.current_fund,
        request.year,
        &request.allocations,
        &records,
    );

    let InvestRequest {
        year, current_fund, ..
    } = request;
    match state
        .store
        .update(&id, |user| {
            user.portfolio.apply_rebalance(current_fund, year, outcome)
        })
        .await
    {
        Ok(user) => {
            info!(
                "user {id}: year {year} rebalance {current_fund} -> {} ({}%) over {} records",
                outcome.new_fund,
                outcome.growth,
                records.len()
            );
            json_response(StatusCode::OK, user)
        }
        Err(err) => sim_error_response(err),
    }
}

async fn projection_handler(
    State(state): State<AppState>,
    Path((id, strategy)): Path<(String, String)>,
) -> Response {
    let user = match state.store.get(&id).await {
        Ok(user) => user,
        Err(err) => return sim_error_response(err),
    };
    let strategy = match strategy.parse::<Strategy>() {
        Ok(strategy) => strategy,
        Err(err) => return sim_error_response(err),
    };

    let records = state.risk.find_by_strategy(strategy);
    let start = user.portfolio.year5_amt;
    let points = project_strategy(start, &records);
    info!(
        "user {id}: projected {strategy} from {start} over {} years",
        records.len()
    );
    json_response(StatusCode::OK, points)
}

async fn risk_handler(
    State(state): State<AppState>,
    query: Result<Query<RiskQuery>, QueryRejection>,
) -> Response {
    let (year, strategy) = match query
        .map_err(|rejection| SimError::MalformedRequest(rejection.body_text()))
        .and_then(|Query(query)| Ok((query.year()?, query.strategy)))
    {
        Ok(parsed) => parsed,
        Err(err) => return sim_error_response(err),
    };
    let records: Vec<RiskRecord> = match (year, strategy) {
        (Some(year), None) => state.risk.find_by_year(year),
        (Some(year), Some(name)) => match name.parse::<Strategy>() {
            Ok(strategy) => state
                .risk
                .find_by_year(year)
                .into_iter()
                .filter(|r| r.strategy == strategy)
                .collect(),
            Err(err) => return sim_error_response(err),
        },
        (None, Some(name)) => match name.parse::<Strategy>() {
            Ok(strategy) => state.risk.find_by_strategy(strategy),
            Err(err) => return sim_error_response(err),
        },
        (None, None) => state
            .risk
            .years()
            .into_iter()
            .flat_map(|year| state.risk.find_by_year(year))
            .collect(),
    };
    json_response(StatusCode::OK, records)
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(
    status: StatusCode,
    reason: &'static str,
    error: String,
    message: String,
    location: Option<&'static str>,
) -> Response {
    json_response(
        status,
        ErrorResponse {
            error,
            reason,
            message,
            location,
        },
    )
}

fn malformed_body(rejection: JsonRejection) -> SimError {
    SimError::MalformedRequest(rejection.body_text())
}

fn sim_error_response(err: SimError) -> Response {
    let (status, reason) = match &err {
        SimError::MissingField(_) | SimError::Validation { .. } | SimError::UsernameTaken(_) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "ValidationError")
        }
        SimError::MalformedRequest(_) => (StatusCode::BAD_REQUEST, "MalformedRequest"),
        SimError::UnknownStrategy(_) => (StatusCode::BAD_REQUEST, "UnknownStrategy"),
        SimError::UserNotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
        SimError::RiskTable(_) | SimError::Io(_) | SimError::Json(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "InternalError")
        }
    };
    if status.is_client_error() {
        warn!("rejected request: {err}");
    } else {
        error!("request failed: {err}");
    }
    error_response(status, reason, err.to_string(), err.message(), err.location())
}
