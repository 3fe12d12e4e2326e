use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{
    AdviceContext, AgeOutcome, Assumptions, ProjectionError, ProjectionResult, YearBalance,
    advice_context, depletion_age, project, sweep_retirement_ages, trace_balances,
};

/// Ages above this are rejected before they reach the engine.
const MAX_AGE: f64 = 150.0;

#[derive(Parser, Debug)]
#[command(
    name = "nestegg",
    about = "Deterministic retirement projection: funding gap, achievability and required savings"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the JSON API over HTTP
    Serve {
        #[arg(default_value_t = 8080)]
        port: u16,
    },
    /// Print a projection (or a retirement-age sweep) as JSON
    Project(ProjectArgs),
}

#[derive(Args, Debug, Clone, PartialEq)]
struct ProjectArgs {
    #[arg(long, default_value_t = 30.0, help = "Age today, whole years")]
    current_age: f64,
    #[arg(long, default_value_t = 60.0, help = "Planned retirement age, whole years")]
    retirement_age: f64,
    #[arg(long, default_value_t = 1_000_000.0)]
    current_savings: f64,
    #[arg(
        long,
        default_value_t = 10_000.0,
        help = "Monthly contribution until retirement"
    )]
    monthly_savings: f64,
    #[arg(
        long,
        default_value_t = 40_000.0,
        help = "Monthly retirement spending in today's money"
    )]
    monthly_expenses_current: f64,
    #[arg(
        long,
        default_value_t = 2.5,
        help = "Expected annual inflation in percent"
    )]
    inflation_rate: f64,
    #[arg(
        long,
        default_value_t = 6.0,
        help = "Expected annual return before retirement in percent"
    )]
    investment_return_rate: f64,
    #[arg(
        long,
        default_value_t = 4.0,
        help = "Expected annual return after retirement in percent"
    )]
    post_retirement_return_rate: f64,
    #[arg(long, default_value_t = 85.0, help = "Age the money must last until")]
    life_expectancy: f64,
    #[arg(
        long,
        help = "Sweep retirement ages up to this age instead of projecting a single plan"
    )]
    sweep_max_age: Option<f64>,
}

/// Request body shared by the project and sweep endpoints. Missing fields keep the
/// form defaults.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
struct ProjectPayload {
    current_age: Option<f64>,
    retirement_age: Option<f64>,
    current_savings: Option<f64>,
    monthly_savings: Option<f64>,
    monthly_expenses_current: Option<f64>,
    inflation_rate: Option<f64>,
    investment_return_rate: Option<f64>,
    post_retirement_return_rate: Option<f64>,
    life_expectancy: Option<f64>,
    max_retirement_age: Option<f64>,
}

impl ProjectPayload {
    /// Reads raw form fields the way the browser form does: each value is parsed
    /// on its own and anything non-numeric becomes 0.
    fn from_form(fields: &HashMap<String, String>) -> Self {
        let field = |key: &str| fields.get(key).map(|raw| parse_form_number(raw));
        Self {
            current_age: field("currentAge"),
            retirement_age: field("retirementAge"),
            current_savings: field("currentSavings"),
            monthly_savings: field("monthlySavings"),
            monthly_expenses_current: field("monthlyExpensesCurrent"),
            inflation_rate: field("inflationRate"),
            investment_return_rate: field("investmentReturnRate"),
            post_retirement_return_rate: field("postRetirementReturnRate"),
            life_expectancy: field("lifeExpectancy"),
            max_retirement_age: field("maxRetirementAge"),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectResponse {
    assumptions: Assumptions,
    result: ProjectionResult,
    yearly_balances: Vec<YearBalance>,
    depletion_age: Option<u32>,
    advice_context: AdviceContext,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SweepResponse {
    assumptions: Assumptions,
    selected_retirement_age: Option<u32>,
    best_retirement_age: u32,
    age_outcomes: Vec<AgeOutcome>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub async fn run_cli(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Serve { port } => run_http_server(port)
            .await
            .map_err(|e| format!("Server error: {e}")),
        Command::Project(args) => {
            let sweep_max_age = args.sweep_max_age;
            let assumptions = build_assumptions(&args)?;
            let json = match sweep_max_age {
                Some(max_age) => {
                    let max_age = whole_age("--sweep-max-age", max_age)?;
                    let response =
                        build_sweep_response(assumptions, max_age).map_err(|e| e.to_string())?;
                    serde_json::to_string_pretty(&response)
                }
                None => {
                    let response =
                        build_project_response(assumptions).map_err(|e| e.to_string())?;
                    serde_json::to_string_pretty(&response)
                }
            }
            .map_err(|e| format!("Failed to encode response: {e}"))?;
            println!("{json}");
            Ok(())
        }
    }
}

fn build_assumptions(args: &ProjectArgs) -> Result<Assumptions, String> {
    let current_age = whole_age("--current-age", args.current_age)?;
    let retirement_age = whole_age("--retirement-age", args.retirement_age)?;
    let life_expectancy = whole_age("--life-expectancy", args.life_expectancy)?;

    if retirement_age <= current_age {
        return Err("--retirement-age must be > --current-age".to_string());
    }

    if life_expectancy <= retirement_age {
        return Err("--life-expectancy must be > --retirement-age".to_string());
    }

    for (name, amount) in [
        ("--current-savings", args.current_savings),
        ("--monthly-savings", args.monthly_savings),
        ("--monthly-expenses-current", args.monthly_expenses_current),
    ] {
        if !amount.is_finite() || amount < 0.0 {
            return Err(format!("{name} must be >= 0"));
        }
    }

    for (name, rate) in [
        ("--inflation-rate", args.inflation_rate),
        ("--investment-return-rate", args.investment_return_rate),
        (
            "--post-retirement-return-rate",
            args.post_retirement_return_rate,
        ),
    ] {
        if !rate.is_finite() || rate <= -100.0 {
            return Err(format!("{name} must be > -100"));
        }
    }

    Ok(Assumptions {
        current_age,
        retirement_age,
        current_savings: args.current_savings,
        monthly_savings: args.monthly_savings,
        monthly_expenses_current: args.monthly_expenses_current,
        inflation_rate: args.inflation_rate,
        investment_return_rate: args.investment_return_rate,
        post_retirement_return_rate: args.post_retirement_return_rate,
        life_expectancy,
    })
}

fn whole_age(name: &str, value: f64) -> Result<u32, String> {
    if !value.is_finite() || value < 0.0 || value > MAX_AGE || value.fract() != 0.0 {
        return Err(format!("{name} must be a whole number of years between 0 and {MAX_AGE}"));
    }
    Ok(value as u32)
}

/// Leading-prefix number parsing with a 0 fallback, matching what the form layer
/// accepts: `"12abc"` is 12, `"abc"` and `""` are 0.
fn parse_form_number(raw: &str) -> f64 {
    let text = raw.trim_start();
    let bytes = text.as_bytes();

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    if text[end..].starts_with("Infinity") {
        return if text.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut mantissa_digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        mantissa_digits += frac_end - frac_start;
        end = frac_end;
    }
    if mantissa_digits == 0 {
        return 0.0;
    }

    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    match text[..end].parse::<f64>() {
        // -0 collapses to 0 as well
        Ok(value) if value != 0.0 && !value.is_nan() => value,
        _ => 0.0,
    }
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router();

    let listener = TcpListener::bind(addr).await?;
    log::info!("nestegg HTTP API listening on http://{addr}");
    log::info!("Local access: http://127.0.0.1:{port}/api/health");

    axum::serve(listener, app).await
}

fn router() -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route(
            "/api/project",
            get(project_get_handler).post(project_post_handler),
        )
        .route("/api/sweep", post(sweep_post_handler))
        .fallback(not_found_handler)
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn project_get_handler(Query(fields): Query<HashMap<String, String>>) -> Response {
    project_handler_impl(ProjectPayload::from_form(&fields))
}

async fn project_post_handler(Json(payload): Json<ProjectPayload>) -> Response {
    project_handler_impl(payload)
}

async fn sweep_post_handler(Json(payload): Json<ProjectPayload>) -> Response {
    let max_retirement_age = payload.max_retirement_age;
    let assumptions = match assumptions_from_payload(payload) {
        Ok(assumptions) => assumptions,
        Err(msg) => return bad_request(&msg),
    };
    let max_retirement_age = match max_retirement_age {
        Some(age) => match whole_age("maxRetirementAge", age) {
            Ok(age) => age,
            Err(msg) => return bad_request(&msg),
        },
        None => assumptions.life_expectancy - 1,
    };

    match build_sweep_response(assumptions, max_retirement_age) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(err) => bad_request(&err.to_string()),
    }
}

fn project_handler_impl(payload: ProjectPayload) -> Response {
    let assumptions = match assumptions_from_payload(payload) {
        Ok(assumptions) => assumptions,
        Err(msg) => return bad_request(&msg),
    };

    match build_project_response(assumptions) {
        Ok(response) => {
            log::debug!(
                "projected gap {} for ages {}..{}",
                response.result.gap,
                response.assumptions.current_age,
                response.assumptions.retirement_age
            );
            json_response(StatusCode::OK, response)
        }
        Err(err) => bad_request(&err.to_string()),
    }
}

fn assumptions_from_payload(payload: ProjectPayload) -> Result<Assumptions, String> {
    let mut args = default_args();

    if let Some(v) = payload.current_age {
        args.current_age = v;
    }
    if let Some(v) = payload.retirement_age {
        args.retirement_age = v;
    }
    if let Some(v) = payload.current_savings {
        args.current_savings = v;
    }
    if let Some(v) = payload.monthly_savings {
        args.monthly_savings = v;
    }
    if let Some(v) = payload.monthly_expenses_current {
        args.monthly_expenses_current = v;
    }
    if let Some(v) = payload.inflation_rate {
        args.inflation_rate = v;
    }
    if let Some(v) = payload.investment_return_rate {
        args.investment_return_rate = v;
    }
    if let Some(v) = payload.post_retirement_return_rate {
        args.post_retirement_return_rate = v;
    }
    if let Some(v) = payload.life_expectancy {
        args.life_expectancy = v;
    }

    build_assumptions(&args)
}

fn default_args() -> ProjectArgs {
    let defaults = Assumptions::default();
    ProjectArgs {
        current_age: f64::from(defaults.current_age),
        retirement_age: f64::from(defaults.retirement_age),
        current_savings: defaults.current_savings,
        monthly_savings: defaults.monthly_savings,
        monthly_expenses_current: defaults.monthly_expenses_current,
        inflation_rate: defaults.inflation_rate,
        investment_return_rate: defaults.investment_return_rate,
        post_retirement_return_rate: defaults.post_retirement_return_rate,
        life_expectancy: f64::from(defaults.life_expectancy),
        sweep_max_age: None,
    }
}

fn build_project_response(assumptions: Assumptions) -> Result<ProjectResponse, ProjectionError> {
    let result = project(&assumptions)?;
    let yearly_balances = trace_balances(&assumptions)?;
    Ok(ProjectResponse {
        depletion_age: depletion_age(&yearly_balances),
        advice_context: advice_context(&assumptions, &result),
        assumptions,
        result,
        yearly_balances,
    })
}

fn build_sweep_response(
    assumptions: Assumptions,
    max_retirement_age: u32,
) -> Result<SweepResponse, ProjectionError> {
    let sweep = sweep_retirement_ages(&assumptions, max_retirement_age)?;
    Ok(SweepResponse {
        assumptions,
        selected_retirement_age: sweep
            .selected_index
            .map(|idx| sweep.age_outcomes[idx].retirement_age),
        best_retirement_age: sweep.age_outcomes[sweep.best_index].retirement_age,
        age_outcomes: sweep.age_outcomes,
    })
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn bad_request(msg: &str) -> Response {
    log::warn!("rejected request: {msg}");
    error_response(StatusCode::BAD_REQUEST, msg)
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
fn assumptions_from_json(json: &str) -> Result<Assumptions, String> {
    let payload = serde_json::from_str::<ProjectPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    assumptions_from_payload(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn default_args_build_the_form_defaults() {
        let assumptions = build_assumptions(&default_args()).expect("valid defaults");
        assert_eq!(assumptions, Assumptions::default());
    }

    #[test]
    fn cli_parses_project_flags() {
        let cli = Cli::try_parse_from([
            "nestegg",
            "project",
            "--current-age",
            "40",
            "--monthly-savings",
            "2500",
            "--sweep-max-age",
            "70",
        ])
        .expect("flags should parse");
        let Command::Project(args) = cli.command else {
            panic!("expected project command");
        };
        assert_eq!(args.current_age, 40.0);
        assert_eq!(args.monthly_savings, 2_500.0);
        assert_eq!(args.retirement_age, 60.0);
        assert_eq!(args.sweep_max_age, Some(70.0));
    }

    #[test]
    fn cli_serve_defaults_to_port_8080() {
        let cli = Cli::try_parse_from(["nestegg", "serve"]).expect("serve should parse");
        assert!(matches!(cli.command, Command::Serve { port: 8080 }));
    }

    #[test]
    fn build_assumptions_rejects_fractional_age() {
        let mut args = default_args();
        args.current_age = 30.5;
        let err = build_assumptions(&args).expect_err("must reject fractional age");
        assert!(err.contains("--current-age"));
    }

    #[test]
    fn build_assumptions_rejects_out_of_order_ages() {
        let mut args = default_args();
        args.retirement_age = 30.0;
        let err = build_assumptions(&args).expect_err("must reject retirement <= current");
        assert!(err.contains("--retirement-age"));

        let mut args = default_args();
        args.life_expectancy = 60.0;
        let err = build_assumptions(&args).expect_err("must reject life <= retirement");
        assert!(err.contains("--life-expectancy"));
    }

    #[test]
    fn build_assumptions_rejects_negative_amounts_and_rate_floor() {
        let mut args = default_args();
        args.monthly_savings = -1.0;
        let err = build_assumptions(&args).expect_err("must reject negative savings");
        assert!(err.contains("--monthly-savings"));

        let mut args = default_args();
        args.post_retirement_return_rate = -100.0;
        let err = build_assumptions(&args).expect_err("must reject -100% return");
        assert!(err.contains("--post-retirement-return-rate"));
    }

    #[test]
    fn assumptions_from_json_overlays_defaults() {
        let json = r#"{
          "currentAge": 45,
          "retirementAge": 65,
          "monthlySavings": 20000,
          "inflationRate": 3
        }"#;
        let assumptions = assumptions_from_json(json).expect("json should parse");
        assert_eq!(assumptions.current_age, 45);
        assert_eq!(assumptions.retirement_age, 65);
        assert_eq!(assumptions.monthly_savings, 20_000.0);
        assert_eq!(assumptions.inflation_rate, 3.0);
        assert_eq!(assumptions.current_savings, 1_000_000.0);
        assert_eq!(assumptions.life_expectancy, 85);
    }

    #[test]
    fn parse_form_number_follows_leading_prefix() {
        assert_eq!(parse_form_number("12abc"), 12.0);
        assert_eq!(parse_form_number("abc"), 0.0);
        assert_eq!(parse_form_number(""), 0.0);
        assert_eq!(parse_form_number("  6.5"), 6.5);
        assert_eq!(parse_form_number("-3.5e2x"), -350.0);
        assert_eq!(parse_form_number("1e"), 1.0);
        assert_eq!(parse_form_number(".5"), 0.5);
        assert_eq!(parse_form_number("-"), 0.0);
        assert_eq!(parse_form_number("-0").to_bits(), 0.0_f64.to_bits());
        assert_eq!(parse_form_number("Infinity"), f64::INFINITY);
    }

    #[test]
    fn form_fields_default_non_numeric_entries_to_zero() {
        let fields = form(&[
            ("currentAge", "35"),
            ("monthlySavings", "lots"),
            ("inflationRate", "2%"),
        ]);
        let payload = ProjectPayload::from_form(&fields);
        assert_eq!(payload.current_age, Some(35.0));
        assert_eq!(payload.monthly_savings, Some(0.0));
        assert_eq!(payload.inflation_rate, Some(2.0));
        assert_eq!(payload.retirement_age, None);

        let assumptions = assumptions_from_payload(payload).expect("valid form");
        assert_eq!(assumptions.monthly_savings, 0.0);
        assert_eq!(assumptions.retirement_age, 60);
    }

    #[test]
    fn zeroed_age_field_is_rejected_not_projected() {
        let fields = form(&[("retirementAge", "soon")]);
        let err = assumptions_from_payload(ProjectPayload::from_form(&fields))
            .expect_err("retirement age 0 is before current age");
        assert!(err.contains("--retirement-age"));
    }

    #[test]
    fn project_response_serialization_contains_expected_fields() {
        let response =
            build_project_response(Assumptions::default()).expect("valid assumptions");
        assert_eq!(response.yearly_balances.len(), 55);
        assert_eq!(response.advice_context.gap, response.result.gap);

        let json = serde_json::to_string(&response).expect("response should serialize");
        assert!(json.contains("\"assumptions\""));
        assert!(json.contains("\"savingsAtRetirement\""));
        assert!(json.contains("\"totalNeeded\""));
        assert!(json.contains("\"isAchievable\":false"));
        assert!(json.contains("\"additionalMonthlySavingsNeeded\""));
        assert!(json.contains("\"yearlyBalances\""));
        assert!(json.contains("\"phase\":\"accumulation\""));
        assert!(json.contains("\"depletionAge\""));
        assert!(json.contains("\"adviceContext\""));
    }

    #[test]
    fn sweep_response_reports_selected_and_best_ages() {
        let response = build_sweep_response(Assumptions::default(), 75).expect("valid sweep");
        assert_eq!(response.selected_retirement_age, Some(65));
        assert_eq!(response.best_retirement_age, 75);

        let json = serde_json::to_string(&response).expect("response should serialize");
        assert!(json.contains("\"ageOutcomes\""));
        assert!(json.contains("\"selectedRetirementAge\":65"));
    }

    #[test]
    fn error_responses_are_uncached_json() {
        let response = error_response(StatusCode::BAD_REQUEST, "bad input");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response
                .headers()
                .get(header::CACHE_CONTROL)
                .and_then(|v| v.to_str().ok()),
            Some("no-store")
        );
    }

    #[tokio::test]
    async fn project_handler_rejects_invalid_payload() {
        let payload = ProjectPayload {
            life_expectancy: Some(50.0),
            ..ProjectPayload::default()
        };
        let response = project_post_handler(Json(payload)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = project_post_handler(Json(ProjectPayload::default())).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
