use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{
    DEFAULT_CHILD_TARGET_AGE, Goal, LifeEvent, MarketQuotes, MarketSnapshot, PlanInputs,
    RiskProfile, build_plan_report,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliRiskProfile {
    Conservative,
    Balanced,
    Aggressive,
}

impl From<CliRiskProfile> for RiskProfile {
    fn from(value: CliRiskProfile) -> Self {
        match value {
            CliRiskProfile::Conservative => RiskProfile::Conservative,
            CliRiskProfile::Balanced => RiskProfile::Balanced,
            CliRiskProfile::Aggressive => RiskProfile::Aggressive,
        }
    }
}

impl From<RiskProfile> for CliRiskProfile {
    fn from(value: RiskProfile) -> Self {
        match value {
            RiskProfile::Conservative => CliRiskProfile::Conservative,
            RiskProfile::Balanced => CliRiskProfile::Balanced,
            RiskProfile::Aggressive => CliRiskProfile::Aggressive,
        }
    }
}

/// One goal as entered on the form: a built-in life event or a custom name.
/// Child goals may give ages instead of years.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GoalPayload {
    pub name: String,
    pub amount: f64,
    pub years: Option<f64>,
    pub child_age: Option<u32>,
    pub target_age: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PlanPayload {
    client_name: Option<String>,
    risk_profile: Option<String>,
    lumpsum: Option<f64>,
    sip: Option<f64>,
    step_up: Option<f64>,
    cagr: Option<f64>,
    bearish: Option<bool>,
    market: Option<MarketQuotes>,
    goals: Option<Vec<GoalPayload>>,
}

/// Flat query-string form of `PlanPayload`; `goals` holds `;`-separated
/// `NAME=AMOUNT[@YEARS]` entries.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PlanQuery {
    client_name: Option<String>,
    risk_profile: Option<String>,
    lumpsum: Option<f64>,
    sip: Option<f64>,
    step_up: Option<f64>,
    cagr: Option<f64>,
    bearish: Option<bool>,
    goals: Option<String>,
}

impl TryFrom<PlanQuery> for PlanPayload {
    type Error = String;

    fn try_from(query: PlanQuery) -> Result<Self, Self::Error> {
        let goals = query
            .goals
            .map(|raw| {
                raw.split(';')
                    .map(str::trim)
                    .filter(|entry| !entry.is_empty())
                    .map(parse_goal_arg)
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;
        Ok(PlanPayload {
            client_name: query.client_name,
            risk_profile: query.risk_profile,
            lumpsum: query.lumpsum,
            sip: query.sip,
            step_up: query.step_up,
            cagr: query.cagr,
            bearish: query.bearish,
            market: None,
            goals,
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "wealthmax",
    about = "Goal-based wealth planner (step-up SIP, sequential goals, LTCG, tactical allocation)"
)]
pub struct Cli {
    #[arg(long)]
    client_name: Option<String>,
    #[arg(long, value_enum)]
    risk_profile: Option<CliRiskProfile>,
    #[arg(long, default_value_t = 0.0, help = "Initial lumpsum investment")]
    lumpsum: f64,
    #[arg(long, default_value_t = 0.0, help = "Starting monthly SIP")]
    sip: f64,
    #[arg(
        long,
        default_value_t = 10.0,
        help = "Annual SIP step-up in percent (0 to <100)"
    )]
    step_up: f64,
    #[arg(
        long,
        help = "Projected CAGR in percent; defaults to the risk profile's rate for the market trend"
    )]
    cagr: Option<f64>,
    #[arg(long, help = "Plan for a bearish market trend")]
    bearish: bool,
    #[arg(
        long = "goal",
        value_parser = parse_goal_arg,
        help = "Goal as NAME=AMOUNT[@YEARS] or NAME=AMOUNT@age:CHILD[-TARGET]; repeatable"
    )]
    goals: Vec<GoalPayload>,
    #[arg(skip)]
    quotes: Option<MarketQuotes>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn parse_goal_arg(raw: &str) -> Result<GoalPayload, String> {
    let Some((name, rest)) = raw.rsplit_once('=') else {
        return Err(format!(
            "goal '{raw}' must look like NAME=AMOUNT[@YEARS]"
        ));
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("goal '{raw}' is missing a name"));
    }

    let (amount, timing) = match rest.split_once('@') {
        Some((amount, timing)) => (amount, Some(timing.trim())),
        None => (rest, None),
    };
    let amount = amount
        .trim()
        .replace(['_', ','], "")
        .parse::<f64>()
        .map_err(|e| format!("goal '{name}' has an invalid amount: {e}"))?;

    let mut goal = GoalPayload {
        name: name.to_string(),
        amount,
        ..GoalPayload::default()
    };
    let Some(timing) = timing else {
        return Ok(goal);
    };
    if let Some(ages) = timing.strip_prefix("age:") {
        let (child, target) = match ages.split_once('-') {
            Some((child, target)) => (child, Some(target)),
            None => (ages, None),
        };
        goal.child_age = Some(
            child
                .trim()
                .parse::<u32>()
                .map_err(|e| format!("goal '{name}' has an invalid child age: {e}"))?,
        );
        goal.target_age = target
            .map(|t| t.trim().parse::<u32>())
            .transpose()
            .map_err(|e| format!("goal '{name}' has an invalid target age: {e}"))?;
    } else {
        goal.years = Some(
            timing
                .parse::<f64>()
                .map_err(|e| format!("goal '{name}' has invalid years: {e}"))?,
        );
    }
    Ok(goal)
}

/// Turns a form goal into a core goal. Zero-amount goals are dropped, as the
/// intake form only keeps goals with a positive target.
fn resolve_goal(payload: &GoalPayload) -> Result<Option<Goal>, String> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err("--goal name must not be empty".to_string());
    }
    if !payload.amount.is_finite() || payload.amount < 0.0 {
        return Err(format!("--goal '{name}' amount must be >= 0"));
    }
    if let Some(years) = payload.years {
        if !years.is_finite() || years < 0.0 {
            return Err(format!("--goal '{name}' years must be >= 0"));
        }
    }
    if payload.amount == 0.0 {
        log::debug!("dropping goal '{name}' with no target amount");
        return Ok(None);
    }

    let entered_years = payload.years.unwrap_or(0.0);
    let goal = match LifeEvent::from_label(name) {
        Some(event) if event.is_age_based() && payload.child_age.is_none() => {
            Goal::new(event.label(), payload.amount, entered_years)
        }
        Some(event) => Goal::new(
            event.label(),
            payload.amount,
            event.years_to_goal(
                entered_years,
                payload.child_age.unwrap_or(0),
                payload.target_age.unwrap_or(DEFAULT_CHILD_TARGET_AGE),
            ),
        ),
        None => Goal::new(name, payload.amount, entered_years),
    };
    Ok(Some(goal))
}

fn build_inputs(cli: Cli) -> Result<PlanInputs, String> {
    let client_name = cli
        .client_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| "--client-name is required".to_string())?
        .to_string();

    let Some(risk_profile) = cli.risk_profile else {
        return Err("--risk-profile is required".to_string());
    };
    let risk_profile = RiskProfile::from(risk_profile);

    if !cli.lumpsum.is_finite() || cli.lumpsum < 0.0 {
        return Err("--lumpsum must be >= 0".to_string());
    }

    if !cli.sip.is_finite() || cli.sip < 0.0 {
        return Err("--sip must be >= 0".to_string());
    }

    if !(0.0..100.0).contains(&cli.step_up) {
        return Err("--step-up must be >= 0 and < 100".to_string());
    }

    if let Some(cagr) = cli.cagr {
        if !cagr.is_finite() || cagr < 0.0 {
            return Err("--cagr must be >= 0".to_string());
        }
    }

    let mut goals = Vec::with_capacity(cli.goals.len());
    for payload in &cli.goals {
        if let Some(goal) = resolve_goal(payload)? {
            goals.push(goal);
        }
    }
    if goals.is_empty() {
        return Err("at least one --goal with a positive amount is required".to_string());
    }

    let market = cli
        .quotes
        .as_ref()
        .map(MarketSnapshot::from_quotes)
        .unwrap_or_else(MarketSnapshot::fallback);
    let market = if cli.bearish {
        market.with_trend(false)
    } else {
        market
    };

    Ok(PlanInputs {
        client_name,
        risk_profile,
        cagr: cli
            .cagr
            .map(|cagr| cagr / 100.0)
            .unwrap_or_else(|| risk_profile.cagr(market.is_bullish)),
        lumpsum: cli.lumpsum,
        starting_sip: cli.sip,
        step_up_fraction: cli.step_up / 100.0,
        market,
        goals,
    })
}

/// Builds the report for parsed CLI arguments and renders it as JSON.
pub fn run_cli(cli: Cli) -> Result<String, String> {
    let inputs = build_inputs(cli)?;
    let report = build_plan_report(&inputs).map_err(|e| e.to_string())?;
    serde_json::to_string_pretty(&report).map_err(|e| format!("failed to render report: {e}"))
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/api/plan", get(plan_get_handler).post(plan_post_handler))
        .route("/api/market", get(market_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    log::info!("wealthmax HTTP API listening on http://{addr}");
    log::info!("Local access: http://127.0.0.1:{port}/api/plan");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn market_handler() -> Response {
    json_response(StatusCode::OK, MarketSnapshot::fallback())
}

async fn plan_get_handler(Query(query): Query<PlanQuery>) -> Response {
    match PlanPayload::try_from(query) {
        Ok(payload) => plan_handler_impl(payload).await,
        Err(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
    }
}

async fn plan_post_handler(Json(payload): Json<PlanPayload>) -> Response {
    plan_handler_impl(payload).await
}

async fn plan_handler_impl(payload: PlanPayload) -> Response {
    let inputs = match api_request_from_payload(payload) {
        Ok(inputs) => inputs,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    match build_plan_report(&inputs) {
        Ok(report) => json_response(StatusCode::OK, report),
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<PlanInputs, String> {
    let payload = serde_json::from_str::<PlanPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: PlanPayload) -> Result<PlanInputs, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.client_name {
        cli.client_name = Some(v);
    }
    if let Some(v) = payload.risk_profile {
        cli.risk_profile = Some(RiskProfile::from_label(&v).into());
    }
    if let Some(v) = payload.lumpsum {
        cli.lumpsum = v;
    }
    if let Some(v) = payload.sip {
        cli.sip = v;
    }
    if let Some(v) = payload.step_up {
        cli.step_up = v;
    }
    if let Some(v) = payload.cagr {
        cli.cagr = Some(v);
    }
    if let Some(v) = payload.bearish {
        cli.bearish = v;
    }
    if let Some(v) = payload.market {
        cli.quotes = Some(v);
    }
    if let Some(v) = payload.goals {
        cli.goals = v;
    }

    build_inputs(cli)
}

fn default_cli_for_api() -> Cli {
    Cli {
        client_name: None,
        risk_profile: None,
        lumpsum: 0.0,
        sip: 0.0,
        step_up: 10.0,
        cagr: None,
        bearish: false,
        goals: Vec::new(),
        quotes: None,
    }
}
