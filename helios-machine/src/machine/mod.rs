pub mod cost_model;

use std::rc::Rc;

use tracing::trace;

use crate::builtins::{eval_pure, DefaultFunction};
use crate::error::{MachineError, RuntimeError};
use crate::term::{Constant, Term};

use cost_model::{CostModel, ExBudget};

pub type Env = Rc<Vec<Value>>;

/// Evaluated machine values. Thunks keep their captured environment
/// until a `force` demands them.
#[derive(Debug, Clone)]
pub enum Value {
    Con(Rc<Constant>),
    Delay(Rc<Term>, Env),
    Lambda {
        body: Rc<Term>,
        env: Env,
    },
    Builtin {
        fun: DefaultFunction,
        forces: u32,
        args: Vec<Value>,
    },
}

impl Value {
    fn con(constant: Constant) -> Value {
        Value::Con(Rc::new(constant))
    }

    fn ex_mem(&self) -> i64 {
        match self {
            Value::Con(c) => c.ex_mem(),
            _ => 1,
        }
    }
}

enum Context {
    FrameAwaitFunTerm(Env, Rc<Term>, Box<Context>),
    FrameAwaitArg(Value, Box<Context>),
    FrameForce(Box<Context>),
    NoFrame,
}

enum MachineState {
    Compute(Context, Env, Rc<Term>),
    Return(Context, Value),
    Done(Term),
}

/// Everything a run produces, error or not. The consumed budget is
/// reported on every exit path, including failures and exhaustion.
#[derive(Debug)]
pub struct EvalOutcome {
    pub result: Result<Term, MachineError>,
    pub consumed: ExBudget,
    pub logs: Vec<String>,
}

impl EvalOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Call-by-value CEK reducer over the term tree; laziness is explicit
/// through `delay`/`force` thunks.
pub struct Machine {
    costs: CostModel,
    remaining: ExBudget,
    consumed: ExBudget,
    logs: Vec<String>,
}

impl Machine {
    pub fn new(costs: CostModel, budget: ExBudget) -> Self {
        Machine {
            costs,
            remaining: budget,
            consumed: ExBudget::ZERO,
            logs: vec![],
        }
    }

    pub fn run(mut self, term: &Term) -> EvalOutcome {
        let result = self.run_inner(term);

        EvalOutcome {
            result,
            consumed: self.consumed,
            logs: self.logs,
        }
    }

    fn run_inner(&mut self, term: &Term) -> Result<Term, MachineError> {
        self.spend(self.costs.machine.startup)?;

        let mut state = MachineState::Compute(
            Context::NoFrame,
            Rc::new(vec![]),
            Rc::new(term.clone()),
        );

        loop {
            state = match state {
                MachineState::Compute(context, env, term) => self.compute(context, env, term)?,
                MachineState::Return(context, value) => self.return_compute(context, value)?,
                MachineState::Done(term) => return Ok(term),
            };
        }
    }

    fn compute(
        &mut self,
        context: Context,
        env: Env,
        term: Rc<Term>,
    ) -> Result<MachineState, MachineError> {
        match term.as_ref() {
            Term::Var(index) => {
                self.spend(self.costs.machine.var)?;

                let value = env
                    .len()
                    .checked_sub(*index as usize)
                    .and_then(|at| env.get(at))
                    .ok_or(MachineError::OpenTerm(*index))?
                    .clone();

                Ok(MachineState::Return(context, value))
            }
            Term::Delay(body) => {
                self.spend(self.costs.machine.delay)?;
                Ok(MachineState::Return(context, Value::Delay(body.clone(), env)))
            }
            Term::Lambda { body } => {
                self.spend(self.costs.machine.lambda)?;
                Ok(MachineState::Return(
                    context,
                    Value::Lambda {
                        body: body.clone(),
                        env,
                    },
                ))
            }
            Term::Apply { function, argument } => {
                self.spend(self.costs.machine.apply)?;
                Ok(MachineState::Compute(
                    Context::FrameAwaitFunTerm(env.clone(), argument.clone(), Box::new(context)),
                    env,
                    function.clone(),
                ))
            }
            Term::Constant(constant) => {
                self.spend(self.costs.machine.constant)?;
                Ok(MachineState::Return(context, Value::con(constant.clone())))
            }
            Term::Force(body) => {
                self.spend(self.costs.machine.force)?;
                Ok(MachineState::Compute(
                    Context::FrameForce(Box::new(context)),
                    env,
                    body.clone(),
                ))
            }
            Term::Error => Err(MachineError::ExplicitError {
                info: self.logs.last().cloned(),
            }),
            Term::Builtin(fun) => {
                self.spend(self.costs.machine.builtin)?;
                Ok(MachineState::Return(
                    context,
                    Value::Builtin {
                        fun: *fun,
                        forces: 0,
                        args: vec![],
                    },
                ))
            }
        }
    }

    fn return_compute(
        &mut self,
        context: Context,
        value: Value,
    ) -> Result<MachineState, MachineError> {
        match context {
            Context::NoFrame => {
                let term = discharge(&value);

                if matches!(
                    term,
                    Term::Lambda { .. } | Term::Constant(_) | Term::Delay(_) | Term::Builtin(_)
                ) {
                    Ok(MachineState::Done(term))
                } else {
                    Err(MachineError::NonConstantResult)
                }
            }
            Context::FrameAwaitFunTerm(arg_env, argument, next) => Ok(MachineState::Compute(
                Context::FrameAwaitArg(value, next),
                arg_env,
                argument,
            )),
            Context::FrameAwaitArg(function, next) => self.apply_evaluate(*next, function, value),
            Context::FrameForce(next) => self.force_evaluate(*next, value),
        }
    }

    fn force_evaluate(
        &mut self,
        context: Context,
        value: Value,
    ) -> Result<MachineState, MachineError> {
        match value {
            Value::Delay(body, env) => Ok(MachineState::Compute(context, env, body)),
            Value::Builtin { fun, forces, args } => {
                if forces < fun.force_count() && args.is_empty() {
                    Ok(MachineState::Return(
                        context,
                        Value::Builtin {
                            fun,
                            forces: forces + 1,
                            args,
                        },
                    ))
                } else {
                    Err(MachineError::BuiltinForceOverflow)
                }
            }
            _ => Err(MachineError::NonPolymorphicInstantiation),
        }
    }

    fn apply_evaluate(
        &mut self,
        context: Context,
        function: Value,
        argument: Value,
    ) -> Result<MachineState, MachineError> {
        match function {
            Value::Lambda { body, env } => {
                let mut next_env = env.as_ref().clone();
                next_env.push(argument);

                Ok(MachineState::Compute(context, Rc::new(next_env), body))
            }
            Value::Builtin { fun, forces, mut args } => {
                if forces != fun.force_count() {
                    return Err(MachineError::NonFunctionApplication);
                }

                args.push(argument);

                if args.len() == fun.arity() {
                    let result = self.call_builtin(fun, args)?;
                    Ok(MachineState::Return(context, result))
                } else {
                    Ok(MachineState::Return(context, Value::Builtin { fun, forces, args }))
                }
            }
            _ => Err(MachineError::NonFunctionApplication),
        }
    }

    fn call_builtin(
        &mut self,
        fun: DefaultFunction,
        args: Vec<Value>,
    ) -> Result<Value, MachineError> {
        use DefaultFunction::*;

        let sizes: Vec<i64> = args.iter().map(Value::ex_mem).collect();
        self.spend(self.costs.builtin_cost(fun, &sizes))?;

        trace!(%fun, "calling builtin");

        match fun {
            IfThenElse => match args[0].as_constant() {
                Some(Constant::Bool(true)) => Ok(args[1].clone()),
                Some(Constant::Bool(false)) => Ok(args[2].clone()),
                _ => Err(RuntimeError::info("expected boolean condition").into()),
            },
            ChooseUnit => match args[0].as_constant() {
                Some(Constant::Unit) => Ok(args[1].clone()),
                _ => Err(RuntimeError::info("expected unit").into()),
            },
            Trace => match args[0].as_constant() {
                Some(Constant::String(message)) => {
                    self.logs.push(message.clone());
                    Ok(args[1].clone())
                }
                _ => Err(RuntimeError::info("expected string message").into()),
            },
            ChooseList => match args[0].as_constant() {
                Some(Constant::ProtoList(_, xs)) => {
                    Ok(args[if xs.is_empty() { 1 } else { 2 }].clone())
                }
                _ => Err(RuntimeError::info("expected list").into()),
            },
            ChooseData => match args[0].as_constant() {
                Some(Constant::Data(d)) => {
                    let branch = match d {
                        helios_primitives::Data::Constr(..) => 1,
                        helios_primitives::Data::Map(_) => 2,
                        helios_primitives::Data::List(_) => 3,
                        helios_primitives::Data::Int(_) => 4,
                        helios_primitives::Data::Bytes(_) => 5,
                    };
                    Ok(args[branch].clone())
                }
                _ => Err(RuntimeError::info("expected data").into()),
            },
            _ => {
                let constants = args
                    .iter()
                    .map(|v| {
                        v.as_constant()
                            .cloned()
                            .ok_or(MachineError::NonFunctionApplication)
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                let result = eval_pure(fun, &constants)?;
                Ok(Value::con(result))
            }
        }
    }

    fn spend(&mut self, cost: ExBudget) -> Result<(), MachineError> {
        self.consumed.accrue(cost);

        if self.remaining.charge(cost) {
            Ok(())
        } else {
            Err(MachineError::OutOfBudget {
                consumed: self.consumed,
            })
        }
    }
}

impl Value {
    fn as_constant(&self) -> Option<&Constant> {
        match self {
            Value::Con(c) => Some(c.as_ref()),
            _ => None,
        }
    }
}

/// Reads a final value back into a term. Environments of captured
/// closures are dropped; results that matter to callers are constants.
fn discharge(value: &Value) -> Term {
    match value {
        Value::Con(c) => Term::Constant(c.as_ref().clone()),
        Value::Delay(body, _) => Term::Delay(body.clone()),
        Value::Lambda { body, .. } => Term::Lambda { body: body.clone() },
        Value::Builtin { fun, forces, args } => {
            let mut term = Term::Builtin(*fun);

            for _ in 0..*forces {
                term = term.force();
            }

            for arg in args {
                term = term.apply(discharge(arg));
            }

            term
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    fn eval(term: Term) -> EvalOutcome {
        Machine::new(CostModel::default(), ExBudget::default()).run(&term)
    }

    #[test]
    fn constant_evaluates_to_itself() {
        let out = eval(Term::integer(42));
        assert_eq!(out.result.unwrap(), Term::integer(42));
    }

    #[test]
    fn addition_of_constants() {
        let term = Term::Builtin(DefaultFunction::AddInteger)
            .apply(Term::integer(2))
            .apply(Term::integer(3));

        assert_eq!(eval(term).result.unwrap(), Term::integer(5));
    }

    #[test]
    fn beta_reduction_applies_argument() {
        // (\x -> x + 1) 41
        let body = Term::Builtin(DefaultFunction::AddInteger)
            .apply(Term::Var(1))
            .apply(Term::integer(1));
        let term = Term::lambda(body).apply(Term::integer(41));

        assert_eq!(eval(term).result.unwrap(), Term::integer(42));
    }

    #[test]
    fn if_then_else_keeps_branches_lazy() {
        // force (ifThenElse false (delay error) (delay 7))
        let term = Term::Builtin(DefaultFunction::IfThenElse)
            .force()
            .apply(Term::Constant(Constant::Bool(false)))
            .apply(Term::Error.delay())
            .apply(Term::integer(7).delay())
            .force();

        assert_eq!(eval(term).result.unwrap(), Term::integer(7));
    }

    #[test]
    fn explicit_error_carries_last_trace() {
        // force (trace "boom" (delay error))
        let term = Term::Builtin(DefaultFunction::Trace)
            .force()
            .apply(Term::Constant(Constant::String("boom".into())))
            .apply(Term::Error.delay())
            .force();

        let out = eval(term);
        match out.result {
            Err(MachineError::ExplicitError { info }) => assert_eq!(info.as_deref(), Some("boom")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(out.logs, vec!["boom".to_string()]);
    }

    #[test]
    fn division_by_zero_surfaces_info() {
        let term = Term::Builtin(DefaultFunction::DivideInteger)
            .apply(Term::integer(1))
            .apply(Term::integer(0));

        let out = eval(term);
        assert_eq!(out.result.unwrap_err().info(), Some("division by zero"));
    }

    #[test]
    fn tiny_budget_exhausts() {
        let term = Term::Builtin(DefaultFunction::MultiplyInteger)
            .apply(Term::integer(BigInt::from(u64::MAX)))
            .apply(Term::integer(BigInt::from(u64::MAX)));

        let out = Machine::new(CostModel::default(), ExBudget::new(50, 50)).run(&term);

        match out.result {
            Err(MachineError::OutOfBudget { consumed }) => {
                assert!(consumed.cpu > 50 || consumed.mem > 50);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn consumed_budget_reported_on_success() {
        let out = eval(Term::integer(1));
        assert!(out.consumed.cpu > 0);
        assert!(out.consumed.mem > 0);
    }
}
