//! Umbrella crate for the Helios pipeline: compile source text, run the
//! resulting bytecode under a budget, and attribute failures back to
//! source sites.

pub use helios_codec as codec;
pub use helios_lang as lang;
pub use helios_machine as machine;
pub use helios_primitives as primitives;

pub mod tx;

use thiserror::Error;
use tracing::debug;

use helios_lang::CompiledProgram;
use helios_machine::error::MachineError;
use helios_machine::machine::cost_model::{CostModel, ExBudget};
use helios_machine::{Constant, Term};
use helios_primitives::Data;

pub use helios_lang::{compile, compile_with_modules, peek_purpose};

/// A failed run, with the failing site resolved through the program's
/// code map when one is known.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum RunFailure {
    #[error("runtime error: {info}{}", .site.as_deref().map(|s| format!(" at {s}")).unwrap_or_default())]
    Runtime {
        info: String,
        site: Option<String>,
    },

    #[error("budget exhausted (consumed mem {} cpu {})", .consumed.mem, .consumed.cpu)]
    OutOfBudget { consumed: ExBudget },
}

/// Everything one evaluator run produces. Consumed budget and collected
/// trace logs are reported on success and failure alike.
#[derive(Debug)]
pub struct RunReport {
    pub outcome: Result<Term, RunFailure>,
    pub consumed: ExBudget,
    pub logs: Vec<String>,
}

impl RunReport {
    /// The resulting value as runtime data, when the run succeeded and
    /// produced a data constant.
    pub fn data(&self) -> Option<&Data> {
        match &self.outcome {
            Ok(Term::Constant(Constant::Data(d))) => Some(d),
            _ => None,
        }
    }

    pub fn failure_info(&self) -> Option<&str> {
        match &self.outcome {
            Err(RunFailure::Runtime { info, .. }) => Some(info),
            _ => None,
        }
    }
}

/// Applies literal data arguments to a compiled program and runs it to
/// completion under the given budget.
pub fn run(
    compiled: &CompiledProgram,
    args: &[Data],
    costs: &CostModel,
    budget: ExBudget,
) -> RunReport {
    let mut program = compiled.program.clone();

    for arg in args {
        program = program.apply_data(arg.clone());
    }

    let outcome = helios_machine::eval_program(&program, costs, budget);

    debug!(
        script = %compiled.name,
        success = outcome.result.is_ok(),
        mem = outcome.consumed.mem,
        cpu = outcome.consumed.cpu,
        "script run finished"
    );

    let result = outcome.result.map_err(|e| match e {
        MachineError::OutOfBudget { consumed } => RunFailure::OutOfBudget { consumed },
        other => {
            let info = other
                .info()
                .unwrap_or("evaluation failure")
                .to_string();
            let site = compiled
                .site_of_info(&info)
                .map(|site| compiled.render_site(site));

            RunFailure::Runtime { info, site }
        }
    });

    RunReport {
        outcome: result,
        consumed: outcome.consumed,
        logs: outcome.logs,
    }
}

/// Resource profile of a run: consumed budget plus encoded size.
pub fn profile(
    compiled: &CompiledProgram,
    args: &[Data],
    costs: &CostModel,
    budget: ExBudget,
) -> helios_machine::Profile {
    helios_machine::profile(&compiled.program, args, costs, budget)
}
