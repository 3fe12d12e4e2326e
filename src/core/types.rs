use serde::Serialize;

/// Financial assumptions for a single projection. Rates are annual percentages.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assumptions {
    pub current_age: u32,
    pub retirement_age: u32,
    pub current_savings: f64,
    pub monthly_savings: f64,
    /// Desired monthly retirement spending in today's purchasing power.
    pub monthly_expenses_current: f64,
    pub inflation_rate: f64,
    pub investment_return_rate: f64,
    pub post_retirement_return_rate: f64,
    pub life_expectancy: u32,
}

impl Default for Assumptions {
    fn default() -> Self {
        Self {
            current_age: 30,
            retirement_age: 60,
            current_savings: 1_000_000.0,
            monthly_savings: 10_000.0,
            monthly_expenses_current: 40_000.0,
            inflation_rate: 2.5,
            investment_return_rate: 6.0,
            post_retirement_return_rate: 4.0,
            life_expectancy: 85,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionResult {
    pub years_to_retirement: u32,
    pub years_in_retirement: u32,
    pub savings_at_retirement: f64,
    pub monthly_expense_at_retirement: f64,
    pub total_needed: f64,
    /// Positive means shortfall, zero or negative means surplus.
    pub gap: f64,
    pub is_achievable: bool,
    pub additional_monthly_savings_needed: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Accumulation,
    Decumulation,
}

/// One year of the month-by-month balance path, in money of the day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearBalance {
    pub age: u32,
    pub phase: Phase,
    pub contributions: f64,
    pub withdrawals: f64,
    pub end_balance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeOutcome {
    pub retirement_age: u32,
    pub savings_at_retirement: f64,
    pub total_needed: f64,
    pub gap: f64,
    pub is_achievable: bool,
    pub additional_monthly_savings_needed: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepResult {
    pub age_outcomes: Vec<AgeOutcome>,
    pub selected_index: Option<usize>,
    pub best_index: usize,
}

/// Context forwarded to the narrative generator alongside the assumptions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdviceContext {
    pub current_age: u32,
    pub retirement_age: u32,
    pub inflation_rate: f64,
    pub gap: f64,
    pub is_shortfall: bool,
    pub additional_monthly_savings_needed: f64,
}
