mod advice;
mod engine;
mod error;
mod solver;
mod types;

pub use advice::advice_context;
pub use engine::{annuity_factor, depletion_age, monthly_rate, project, trace_balances};
pub use error::ProjectionError;
pub use solver::{required_additional_savings, sweep_retirement_ages};
pub use types::{
    AdviceContext, AgeOutcome, Assumptions, Phase, ProjectionResult, SweepResult, YearBalance,
};
