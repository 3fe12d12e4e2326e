use super::types::{AdviceContext, Assumptions, ProjectionResult};

/// Fields the narrative generator branches on. The gap is passed through unrounded so
/// its sign (positive = shortfall) survives.
pub fn advice_context(assumptions: &Assumptions, result: &ProjectionResult) -> AdviceContext {
    AdviceContext {
        current_age: assumptions.current_age,
        retirement_age: assumptions.retirement_age,
        inflation_rate: assumptions.inflation_rate,
        gap: result.gap,
        is_shortfall: result.gap > 0.0,
        additional_monthly_savings_needed: result.additional_monthly_savings_needed,
    }
}
