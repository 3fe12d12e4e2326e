use super::engine::project;
use super::error::ProjectionError;
use super::types::{AgeOutcome, Assumptions, SweepResult};

/// Extra monthly contribution that closes `gap` by retirement.
///
/// The accumulated balance is linear in the contribution, so the root is
/// `gap / annuity_factor` and no iteration is needed.
pub fn required_additional_savings(gap: f64, annuity_factor: f64) -> f64 {
    if gap <= 0.0 || annuity_factor <= 0.0 || !annuity_factor.is_finite() {
        return 0.0;
    }
    (gap / annuity_factor).max(0.0)
}

/// Projects every retirement age from `current_age + 1` up to `max_retirement_age`
/// (capped one year short of `life_expectancy`).
pub fn sweep_retirement_ages(
    assumptions: &Assumptions,
    max_retirement_age: u32,
) -> Result<SweepResult, ProjectionError> {
    let first_age = assumptions.current_age.saturating_add(1);
    let last_age = max_retirement_age.min(assumptions.life_expectancy.saturating_sub(1));
    if first_age > last_age {
        return Err(ProjectionError::invalid(
            "max_retirement_age",
            format!(
                "leaves no retirement age between current_age {} and life_expectancy {}",
                assumptions.current_age, assumptions.life_expectancy
            ),
        ));
    }

    let mut age_outcomes = Vec::with_capacity((last_age - first_age + 1) as usize);
    for retirement_age in first_age..=last_age {
        let candidate = Assumptions {
            retirement_age,
            ..assumptions.clone()
        };
        let result = project(&candidate)?;
        age_outcomes.push(AgeOutcome {
            retirement_age,
            savings_at_retirement: result.savings_at_retirement,
            total_needed: result.total_needed,
            gap: result.gap,
            is_achievable: result.is_achievable,
            additional_monthly_savings_needed: result.additional_monthly_savings_needed,
        });
    }

    Ok(build_sweep_result(age_outcomes))
}

fn build_sweep_result(age_outcomes: Vec<AgeOutcome>) -> SweepResult {
    let selected_index = age_outcomes.iter().position(|o| o.is_achievable);
    let best_index = age_outcomes
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.gap.total_cmp(&b.gap))
        .map(|(idx, _)| idx)
        .unwrap_or(0);

    SweepResult {
        age_outcomes,
        selected_index,
        best_index,
    }
}
