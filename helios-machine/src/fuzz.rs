//! Randomised property checking of compiled programs.
//!
//! A fixture pairs argument samplers with an oracle predicate; the
//! runner feeds N seeded cases through the machine and reports every
//! input together with its observable outcome.

use helios_primitives::Data;
use num_bigint::BigInt;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tracing::debug;

use crate::error::MachineError;
use crate::machine::cost_model::{CostModel, ExBudget};
use crate::machine::Machine;
use crate::term::{Program, Term};

/// Recipe for one randomised argument.
#[derive(Debug, Clone)]
pub enum ArgSampler {
    Int { min: i64, max: i64 },
    Bytes { max_len: usize },
    Bool,
    ListOf { item: Box<ArgSampler>, max_len: usize },
    MapOf {
        key: Box<ArgSampler>,
        value: Box<ArgSampler>,
        max_len: usize,
    },
    OptionOf(Box<ArgSampler>),
    ConstrOf { tag: u64, fields: Vec<ArgSampler> },
    OneOf(Vec<ArgSampler>),
    Always(Data),
}

impl ArgSampler {
    pub fn sample(&self, rng: &mut ChaCha20Rng) -> Data {
        match self {
            ArgSampler::Int { min, max } => {
                Data::Int(BigInt::from(rng.gen_range(*min..=*max)))
            }
            ArgSampler::Bytes { max_len } => {
                let len = rng.gen_range(0..=*max_len);
                Data::Bytes((0..len).map(|_| rng.gen()).collect())
            }
            ArgSampler::Bool => Data::boolean(rng.gen()),
            ArgSampler::ListOf { item, max_len } => {
                let len = rng.gen_range(0..=*max_len);
                Data::List((0..len).map(|_| item.sample(rng)).collect())
            }
            ArgSampler::MapOf { key, value, max_len } => {
                let len = rng.gen_range(0..=*max_len);
                Data::Map(
                    (0..len)
                        .map(|_| (key.sample(rng), value.sample(rng)))
                        .collect(),
                )
            }
            ArgSampler::OptionOf(item) => {
                if rng.gen() {
                    Data::some(item.sample(rng))
                } else {
                    Data::none()
                }
            }
            ArgSampler::ConstrOf { tag, fields } => {
                Data::Constr(*tag, fields.iter().map(|f| f.sample(rng)).collect())
            }
            ArgSampler::OneOf(options) => {
                let pick = rng.gen_range(0..options.len());
                options[pick].sample(rng)
            }
            ArgSampler::Always(data) => data.clone(),
        }
    }
}

/// What a single run of the machine was observed to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Value(Term),
    Failure(String),
    OutOfBudget,
}

#[derive(Debug, Clone)]
pub struct FuzzCase {
    pub args: Vec<Data>,
    pub outcome: Outcome,
    pub accepted: bool,
}

#[derive(Debug, Clone)]
pub struct FuzzReport {
    pub seed: u64,
    pub cases: Vec<FuzzCase>,
}

impl FuzzReport {
    pub fn counterexamples(&self) -> impl Iterator<Item = &FuzzCase> {
        self.cases.iter().filter(|c| !c.accepted)
    }

    pub fn all_accepted(&self) -> bool {
        self.cases.iter().all(|c| c.accepted)
    }
}

/// Runs `n` seeded cases of `program` applied to sampled arguments and
/// checks each observable outcome against the oracle.
pub fn run_cases(
    program: &Program,
    samplers: &[ArgSampler],
    n: usize,
    seed: u64,
    costs: &CostModel,
    budget: ExBudget,
    oracle: impl Fn(&[Data], &Outcome) -> bool,
) -> FuzzReport {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let mut cases = Vec::with_capacity(n);

    for i in 0..n {
        let args: Vec<Data> = samplers.iter().map(|s| s.sample(&mut rng)).collect();

        let mut applied = program.clone();
        for arg in &args {
            applied = applied.apply_data(arg.clone());
        }

        let run = Machine::new(costs.clone(), budget).run(&applied.term);

        let outcome = match run.result {
            Ok(term) => Outcome::Value(term),
            Err(MachineError::OutOfBudget { .. }) => Outcome::OutOfBudget,
            Err(e) => Outcome::Failure(e.info().unwrap_or("evaluation failure").to_string()),
        };

        let accepted = oracle(&args, &outcome);

        if !accepted {
            debug!(case = i, ?args, ?outcome, "oracle rejected case");
        }

        cases.push(FuzzCase {
            args,
            outcome,
            accepted,
        });
    }

    FuzzReport { seed, cases }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::DefaultFunction;

    fn halve_program() -> Program {
        // \d -> iData (divideInteger (unIData d) 2)
        let body = Term::Builtin(DefaultFunction::IData).apply(
            Term::Builtin(DefaultFunction::DivideInteger)
                .apply(Term::Builtin(DefaultFunction::UnIData).apply(Term::Var(1)))
                .apply(Term::integer(2)),
        );

        Program::new((1, 0, 0), Term::lambda(body))
    }

    #[test]
    fn sampled_runs_are_reproducible() {
        let program = halve_program();
        let samplers = [ArgSampler::Int { min: -100, max: 100 }];

        let a = run_cases(
            &program,
            &samplers,
            20,
            42,
            &CostModel::default(),
            ExBudget::default(),
            |_, _| true,
        );
        let b = run_cases(
            &program,
            &samplers,
            20,
            42,
            &CostModel::default(),
            ExBudget::default(),
            |_, _| true,
        );

        for (x, y) in a.cases.iter().zip(&b.cases) {
            assert_eq!(x.args, y.args);
            assert_eq!(x.outcome, y.outcome);
        }
    }

    #[test]
    fn oracle_sees_halving() {
        let program = halve_program();
        let samplers = [ArgSampler::Int { min: 0, max: 1000 }];

        let report = run_cases(
            &program,
            &samplers,
            50,
            7,
            &CostModel::default(),
            ExBudget::default(),
            |args, outcome| {
                let Data::Int(input) = &args[0] else { return false };
                match outcome {
                    Outcome::Value(Term::Constant(c)) => {
                        *c == crate::term::Constant::Data(Data::Int(input / &BigInt::from(2)))
                    }
                    _ => false,
                }
            },
        );

        assert!(report.all_accepted());
    }
}
