//! Untyped Plutus-Core term model, flat wire codec and metered CEK
//! evaluator for compiled Helios scripts.

pub mod builtins;
pub mod error;
pub mod flat;
pub mod fuzz;
pub mod machine;

mod term;

pub use term::*;

use machine::cost_model::{CostModel, ExBudget};
use machine::{EvalOutcome, Machine};

/// Evaluates a program under the given cost model and budget.
pub fn eval_program(program: &Program, costs: &CostModel, budget: ExBudget) -> EvalOutcome {
    Machine::new(costs.clone(), budget).run(&program.term)
}

/// Resource profile of one run: consumed budget plus encoded size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Profile {
    pub mem: i64,
    pub cpu: i64,
    pub size: usize,
}

/// Applies literal data arguments, runs to completion and reports the
/// resources used. Failed runs still profile what they consumed.
pub fn profile(
    program: &Program,
    args: &[helios_primitives::Data],
    costs: &CostModel,
    budget: ExBudget,
) -> Profile {
    let mut applied = program.clone();

    for arg in args {
        applied = applied.apply_data(arg.clone());
    }

    let size = applied.to_flat().len();
    let outcome = eval_program(&applied, costs, budget);

    Profile {
        mem: outcome.consumed.mem,
        cpu: outcome.consumed.cpu,
        size,
    }
}
