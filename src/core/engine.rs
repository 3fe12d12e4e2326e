use super::error::ProjectionError;
use super::solver::required_additional_savings;
use super::types::{Assumptions, Phase, ProjectionResult, YearBalance};

const MONTHS_PER_YEAR: u32 = 12;

/// Rates closer to zero than this take the degenerate (rate = 0) branch of the
/// annuity formulas.
const RATE_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy)]
struct Horizons {
    years_to_retirement: u32,
    years_in_retirement: u32,
}

impl Horizons {
    fn months_to_retirement(self) -> u64 {
        u64::from(self.years_to_retirement) * u64::from(MONTHS_PER_YEAR)
    }

    fn months_in_retirement(self) -> u64 {
        u64::from(self.years_in_retirement) * u64::from(MONTHS_PER_YEAR)
    }
}

#[derive(Debug, Clone, Copy)]
struct MonthlyRates {
    inflation: f64,
    investment: f64,
    post_retirement: f64,
}

impl MonthlyRates {
    fn from_assumptions(assumptions: &Assumptions) -> Self {
        Self {
            inflation: monthly_rate(assumptions.inflation_rate),
            investment: monthly_rate(assumptions.investment_return_rate),
            post_retirement: monthly_rate(assumptions.post_retirement_return_rate),
        }
    }

    /// Discount rate net of inflation, used for the inflation-indexed withdrawal stream.
    fn real_post_retirement(self) -> f64 {
        (1.0 + self.post_retirement) / (1.0 + self.inflation) - 1.0
    }
}

pub fn project(assumptions: &Assumptions) -> Result<ProjectionResult, ProjectionError> {
    let horizons = validate(assumptions)
        .inspect_err(|err| log::debug!("rejected projection: {err}"))?;
    let rates = MonthlyRates::from_assumptions(assumptions);

    let months_to_retirement = horizons.months_to_retirement() as f64;
    let accumulation_factor = annuity_factor(rates.investment, months_to_retirement);
    let savings_at_retirement = assumptions.current_savings
        * (1.0 + rates.investment).powf(months_to_retirement)
        + assumptions.monthly_savings * accumulation_factor;

    let monthly_expense_at_retirement =
        expense_at_retirement(assumptions, horizons.years_to_retirement);
    let total_needed = monthly_expense_at_retirement
        * present_value_factor(
            rates.real_post_retirement(),
            horizons.months_in_retirement() as f64,
        );

    let gap = total_needed - savings_at_retirement;
    let is_achievable = gap <= 0.0;
    let additional_monthly_savings_needed = if is_achievable {
        0.0
    } else {
        required_additional_savings(gap, accumulation_factor)
    };

    log::trace!(
        "projection {}..{}..{}: savings {savings_at_retirement:.2}, needed {total_needed:.2}, gap {gap:.2}",
        assumptions.current_age,
        assumptions.retirement_age,
        assumptions.life_expectancy
    );

    Ok(ProjectionResult {
        years_to_retirement: horizons.years_to_retirement,
        years_in_retirement: horizons.years_in_retirement,
        savings_at_retirement,
        monthly_expense_at_retirement,
        total_needed,
        gap,
        is_achievable,
        additional_monthly_savings_needed,
    })
}

/// Walks the same model month by month and reports one row per year of age, from
/// `current_age + 1` through `life_expectancy`.
pub fn trace_balances(assumptions: &Assumptions) -> Result<Vec<YearBalance>, ProjectionError> {
    let horizons = validate(assumptions)?;
    let rates = MonthlyRates::from_assumptions(assumptions);

    let total_years = horizons.years_to_retirement as usize + horizons.years_in_retirement as usize;
    let mut years = Vec::with_capacity(total_years);
    let mut balance = assumptions.current_savings;

    for year in 0..horizons.years_to_retirement {
        let mut contributions = 0.0;
        for _ in 0..MONTHS_PER_YEAR {
            balance = balance * (1.0 + rates.investment) + assumptions.monthly_savings;
            contributions += assumptions.monthly_savings;
        }
        years.push(YearBalance {
            age: assumptions.current_age + year + 1,
            phase: Phase::Accumulation,
            contributions,
            withdrawals: 0.0,
            end_balance: balance,
        });
    }

    // The first withdrawal is already one month of inflation past the retirement date.
    let mut withdrawal = expense_at_retirement(assumptions, horizons.years_to_retirement);
    for year in 0..horizons.years_in_retirement {
        let mut withdrawals = 0.0;
        for _ in 0..MONTHS_PER_YEAR {
            withdrawal *= 1.0 + rates.inflation;
            balance = balance * (1.0 + rates.post_retirement) - withdrawal;
            withdrawals += withdrawal;
        }
        years.push(YearBalance {
            age: assumptions.retirement_age + year + 1,
            phase: Phase::Decumulation,
            contributions: 0.0,
            withdrawals,
            end_balance: balance,
        });
    }

    Ok(years)
}

pub fn depletion_age(years: &[YearBalance]) -> Option<u32> {
    years
        .iter()
        .find(|year| year.end_balance < 0.0)
        .map(|year| year.age)
}

/// Converts an annual percentage rate into the equivalent monthly effective rate.
pub fn monthly_rate(annual_percent: f64) -> f64 {
    (1.0 + annual_percent / 100.0).powf(1.0 / f64::from(MONTHS_PER_YEAR)) - 1.0
}

/// Future value of one unit paid at the end of each of `months` periods.
pub fn annuity_factor(rate: f64, months: f64) -> f64 {
    if rate.abs() < RATE_EPSILON {
        return months;
    }
    ((1.0 + rate).powf(months) - 1.0) / rate
}

fn present_value_factor(rate: f64, months: f64) -> f64 {
    if rate.abs() < RATE_EPSILON {
        return months;
    }
    (1.0 - (1.0 + rate).powf(-months)) / rate
}

fn expense_at_retirement(assumptions: &Assumptions, years_to_retirement: u32) -> f64 {
    assumptions.monthly_expenses_current
        * (1.0 + assumptions.inflation_rate / 100.0).powf(f64::from(years_to_retirement))
}

fn validate(assumptions: &Assumptions) -> Result<Horizons, ProjectionError> {
    if assumptions.retirement_age <= assumptions.current_age {
        return Err(ProjectionError::invalid(
            "retirement_age",
            "must be greater than current_age",
        ));
    }
    if assumptions.life_expectancy <= assumptions.retirement_age {
        return Err(ProjectionError::invalid(
            "life_expectancy",
            "must be greater than retirement_age",
        ));
    }

    for (field, amount) in [
        ("current_savings", assumptions.current_savings),
        ("monthly_savings", assumptions.monthly_savings),
        ("monthly_expenses_current", assumptions.monthly_expenses_current),
    ] {
        if !amount.is_finite() || amount < 0.0 {
            return Err(ProjectionError::invalid(
                field,
                format!("must be a finite amount >= 0, got {amount}"),
            ));
        }
    }

    for (field, rate) in [
        ("inflation_rate", assumptions.inflation_rate),
        ("investment_return_rate", assumptions.investment_return_rate),
        (
            "post_retirement_return_rate",
            assumptions.post_retirement_return_rate,
        ),
    ] {
        if !rate.is_finite() || rate <= -100.0 {
            return Err(ProjectionError::invalid(
                field,
                format!("must be a finite percentage > -100, got {rate}"),
            ));
        }
    }

    Ok(Horizons {
        years_to_retirement: assumptions.retirement_age - assumptions.current_age,
        years_in_retirement: assumptions.life_expectancy - assumptions.retirement_age,
    })
}
