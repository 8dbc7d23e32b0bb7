use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::builtins::DefaultFunction;

/// Paired memory/cpu allowance for one evaluator run, also used to
/// tally what a run has consumed. A component may go negative when a
/// charge overshoots the allowance; that run is then out of budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExBudget {
    pub mem: i64,
    pub cpu: i64,
}

impl ExBudget {
    pub const ZERO: ExBudget = ExBudget { mem: 0, cpu: 0 };

    pub fn new(mem: i64, cpu: i64) -> Self {
        ExBudget { mem, cpu }
    }

    /// Settles a cost against this allowance; false once either
    /// component has been driven below zero.
    pub fn charge(&mut self, cost: ExBudget) -> bool {
        self.mem -= cost.mem;
        self.cpu -= cost.cpu;
        self.mem >= 0 && self.cpu >= 0
    }

    /// Adds a cost to this tally.
    pub fn accrue(&mut self, cost: ExBudget) {
        self.mem += cost.mem;
        self.cpu += cost.cpu;
    }
}

impl Default for ExBudget {
    fn default() -> Self {
        // roomy enough for any reasonable script run
        ExBudget {
            mem: 20_000_000,
            cpu: 8_000_000_000,
        }
    }
}

/// Fixed charge per machine transition, by step kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineCosts {
    pub startup: ExBudget,
    pub var: ExBudget,
    pub constant: ExBudget,
    pub lambda: ExBudget,
    pub delay: ExBudget,
    pub force: ExBudget,
    pub apply: ExBudget,
    pub builtin: ExBudget,
}

impl Default for MachineCosts {
    fn default() -> Self {
        let step = ExBudget::new(100, 23000);
        MachineCosts {
            startup: ExBudget::new(100, 100),
            var: step,
            constant: step,
            lambda: step,
            delay: step,
            force: step,
            apply: step,
            builtin: step,
        }
    }
}

/// Cost of one builtin invocation as a function of argument sizes
/// (in abstract machine words, see `Constant::ex_mem`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostFn {
    Constant(i64),
    /// intercept + slope * size(args[arg])
    Linear { arg: usize, intercept: i64, slope: i64 },
    /// intercept + slope * sum(sizes)
    LinearTotal { intercept: i64, slope: i64 },
    /// intercept + slope * max(sizes)
    LinearMax { intercept: i64, slope: i64 },
    /// intercept + slope * min(sizes)
    LinearMin { intercept: i64, slope: i64 },
}

impl CostFn {
    pub fn cost(&self, sizes: &[i64]) -> i64 {
        match self {
            CostFn::Constant(c) => *c,
            CostFn::Linear { arg, intercept, slope } => {
                intercept + slope * sizes.get(*arg).copied().unwrap_or(0)
            }
            CostFn::LinearTotal { intercept, slope } => {
                intercept + slope * sizes.iter().sum::<i64>()
            }
            CostFn::LinearMax { intercept, slope } => {
                intercept + slope * sizes.iter().copied().max().unwrap_or(0)
            }
            CostFn::LinearMin { intercept, slope } => {
                intercept + slope * sizes.iter().copied().min().unwrap_or(0)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinCost {
    pub mem: CostFn,
    pub cpu: CostFn,
}

impl BuiltinCost {
    fn new(mem: CostFn, cpu: CostFn) -> Self {
        BuiltinCost { mem, cpu }
    }
}

/// The full pricing table for one evaluator run. Deserializable from a
/// network parameter file; unnamed builtins fall back to the default
/// entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostModel {
    #[serde(default)]
    pub machine: MachineCosts,
    #[serde(default)]
    pub builtins: HashMap<String, BuiltinCost>,
}

impl CostModel {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Override individual entries, keyed `<builtinName>-mem` /
    /// `<builtinName>-cpu`, with flat constant costs. This is the shape
    /// parameter-override maps arrive in from test fixtures.
    pub fn apply_overrides(&mut self, overrides: &HashMap<String, i64>) {
        for (key, value) in overrides {
            let Some((name, dim)) = key.rsplit_once('-') else {
                continue;
            };

            let entry = self
                .builtins
                .entry(name.to_string())
                .or_insert_with(|| FALLBACK_COST.clone());

            match dim {
                "mem" => entry.mem = CostFn::Constant(*value),
                "cpu" => entry.cpu = CostFn::Constant(*value),
                _ => {}
            }
        }
    }

    pub fn builtin_cost(&self, fun: DefaultFunction, sizes: &[i64]) -> ExBudget {
        let entry = self.builtins.get(&fun.to_string());

        match entry {
            Some(cost) => ExBudget::new(cost.mem.cost(sizes), cost.cpu.cost(sizes)),
            None => {
                let default = default_cost_for(fun);
                ExBudget::new(default.mem.cost(sizes), default.cpu.cost(sizes))
            }
        }
    }
}

static FALLBACK_COST: Lazy<BuiltinCost> = Lazy::new(|| {
    BuiltinCost::new(
        CostFn::Constant(32),
        CostFn::LinearTotal {
            intercept: 100000,
            slope: 500,
        },
    )
});

fn default_cost_for(fun: DefaultFunction) -> BuiltinCost {
    use DefaultFunction::*;

    match fun {
        AddInteger | SubtractInteger => BuiltinCost::new(
            CostFn::LinearMax {
                intercept: 1,
                slope: 1,
            },
            CostFn::LinearMax {
                intercept: 100000,
                slope: 500,
            },
        ),
        MultiplyInteger => BuiltinCost::new(
            CostFn::LinearTotal {
                intercept: 0,
                slope: 1,
            },
            CostFn::LinearTotal {
                intercept: 90000,
                slope: 11000,
            },
        ),
        DivideInteger | QuotientInteger | RemainderInteger | ModInteger => BuiltinCost::new(
            CostFn::LinearMax {
                intercept: 0,
                slope: 1,
            },
            CostFn::LinearTotal {
                intercept: 200000,
                slope: 12000,
            },
        ),
        Sha2_256 | Sha3_256 | Blake2b_256 => BuiltinCost::new(
            CostFn::Constant(4),
            CostFn::Linear {
                arg: 0,
                intercept: 800000,
                slope: 30000,
            },
        ),
        AppendByteString | AppendString => BuiltinCost::new(
            CostFn::LinearTotal {
                intercept: 0,
                slope: 1,
            },
            CostFn::LinearTotal {
                intercept: 100000,
                slope: 600,
            },
        ),
        EqualsData | SerialiseData => BuiltinCost::new(
            CostFn::Constant(32),
            CostFn::LinearTotal {
                intercept: 400000,
                slope: 1200,
            },
        ),
        _ => FALLBACK_COST.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_patch_named_builtins() {
        let mut model = CostModel::default();
        let mut overrides = HashMap::new();
        overrides.insert("addInteger-cpu".to_string(), 7i64);
        model.apply_overrides(&overrides);

        let cost = model.builtin_cost(DefaultFunction::AddInteger, &[1, 1]);
        assert_eq!(cost.cpu, 7);
    }

    #[test]
    fn model_loads_from_json() {
        let raw = r#"{
            "builtins": {
                "multiplyInteger": {
                    "mem": { "linear_total": { "intercept": 0, "slope": 2 } },
                    "cpu": { "constant": 123 }
                }
            }
        }"#;

        let model = CostModel::from_json(raw).unwrap();
        let cost = model.builtin_cost(DefaultFunction::MultiplyInteger, &[3, 4]);
        assert_eq!(cost.mem, 14);
        assert_eq!(cost.cpu, 123);
    }
}
