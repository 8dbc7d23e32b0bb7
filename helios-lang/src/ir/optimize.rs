//! Fixed-point IR simplification.
//!
//! Each pass applies local, semantics-preserving rewrites bottom-up
//! until a full pass changes nothing. Every rewrite keeps observational
//! equivalence under the machine, including error behavior: a deferred
//! (`Delay`-wrapped) expression that can fail is never evaluated
//! earlier than the unoptimized program would.

use helios_machine::builtins::{eval_pure, DefaultFunction as Bi};
use helios_machine::Constant;
use tracing::trace;

use super::{IrExpr, IrNode};

pub fn optimize(node: IrNode) -> IrNode {
    let mut current = node;

    // the rewrites strictly reduce node count, so this terminates; the
    // cap is a backstop against a rule regression
    for round in 0..1000 {
        let (next, changed) = pass(current);
        current = next;

        if !changed {
            trace!(rounds = round + 1, nodes = current.count(), "optimizer fixed point");
            break;
        }
    }

    current
}

fn pass(node: IrNode) -> (IrNode, bool) {
    let site = node.site;

    let (expr, mut changed) = match node.expr {
        IrExpr::Var { .. } | IrExpr::Literal(_) | IrExpr::Error { .. } => (node.expr, false),
        IrExpr::Lambda { params, body } => {
            let (body, c) = pass(*body);
            (
                IrExpr::Lambda {
                    params,
                    body: Box::new(body),
                },
                c,
            )
        }
        IrExpr::Delay(inner) => {
            let (inner, c) = pass(*inner);
            (IrExpr::Delay(Box::new(inner)), c)
        }
        IrExpr::Force(inner) => {
            let (inner, c) = pass(*inner);
            (IrExpr::Force(Box::new(inner)), c)
        }
        IrExpr::Call { head, args } => {
            let (head, mut c) = pass(*head);
            let args: Vec<IrNode> = args
                .into_iter()
                .map(|a| {
                    let (a, ac) = pass(a);
                    c |= ac;
                    a
                })
                .collect();
            (
                IrExpr::Call {
                    head: Box::new(head),
                    args,
                },
                c,
            )
        }
        IrExpr::Builtin { fun, args } => {
            let mut c = false;
            let args: Vec<IrNode> = args
                .into_iter()
                .map(|a| {
                    let (a, ac) = pass(a);
                    c |= ac;
                    a
                })
                .collect();
            (IrExpr::Builtin { fun, args }, c)
        }
    };

    let mut node = IrNode::new(expr, site);

    while let Some(rewritten) = rewrite(&node) {
        node = rewritten;
        changed = true;
    }

    (node, changed)
}

/// One local rewrite, if any applies at this node.
fn rewrite(node: &IrNode) -> Option<IrNode> {
    match &node.expr {
        // force (delay x) -> x
        IrExpr::Force(inner) => {
            if let IrExpr::Delay(x) = &inner.expr {
                return Some((**x).clone());
            }

            // dead-branch elimination once the condition is a constant
            if let IrExpr::Builtin {
                fun: Bi::IfThenElse,
                args,
            } = &inner.expr
            {
                if let [cond, then_branch, else_branch] = args.as_slice() {
                    if let IrExpr::Literal(Constant::Bool(b)) = &cond.expr {
                        let taken = if *b { then_branch } else { else_branch };

                        return Some(match &taken.expr {
                            IrExpr::Delay(x) => (**x).clone(),
                            _ => IrNode::new(
                                IrExpr::Force(Box::new(taken.clone())),
                                node.site,
                            ),
                        });
                    }
                }
            }

            None
        }

        IrExpr::Builtin { fun, args } => {
            if let Some(simpler) = unwrap_inverse(*fun, args) {
                return Some(simpler);
            }

            if let Some(simpler) = algebraic(*fun, args, node.site) {
                return Some(simpler);
            }

            // constant folding of pure builtins over literals; a
            // compile-time failure folds to the same runtime error
            if fun.is_foldable() {
                let literals: Option<Vec<Constant>> = args
                    .iter()
                    .map(|a| match &a.expr {
                        IrExpr::Literal(c) => Some(c.clone()),
                        _ => None,
                    })
                    .collect();

                if let Some(literals) = literals {
                    if literals.len() == fun.arity() {
                        return Some(match eval_pure(*fun, &literals) {
                            Ok(c) => IrNode::new(IrExpr::Literal(c), node.site),
                            Err(e) => IrNode::new(
                                IrExpr::Error { message: e.info },
                                node.site,
                            ),
                        });
                    }
                }
            }

            None
        }

        // beta-reduction of non-recursive bindings
        IrExpr::Call { head, args } => {
            let IrExpr::Lambda { params, body } = &head.expr else {
                return None;
            };

            if params.len() != args.len() {
                return None;
            }

            // every argument must be safe to move to its use sites
            for ((unique, _), arg) in params.iter().zip(args) {
                let uses = body.uses(*unique);

                let ok = matches!(arg.expr, IrExpr::Literal(_) | IrExpr::Var { .. })
                    || (uses <= 1 && is_pure(arg));

                if !ok {
                    return None;
                }
            }

            let mut result = (**body).clone();
            for ((unique, _), arg) in params.iter().zip(args) {
                result = substitute(result, *unique, arg);
            }

            Some(result)
        }

        _ => None,
    }
}

/// Paired data wrap/unwrap calls cancel. The checker guarantees the
/// payload shape, so either composition is the identity here.
fn unwrap_inverse(fun: Bi, args: &[IrNode]) -> Option<IrNode> {
    let inverse = match fun {
        Bi::UnIData => Bi::IData,
        Bi::IData => Bi::UnIData,
        Bi::UnBData => Bi::BData,
        Bi::BData => Bi::UnBData,
        Bi::UnListData => Bi::ListData,
        Bi::ListData => Bi::UnListData,
        Bi::UnMapData => Bi::MapData,
        Bi::MapData => Bi::UnMapData,
        _ => return None,
    };

    match args {
        [only] => match &only.expr {
            IrExpr::Builtin {
                fun: inner,
                args: inner_args,
            } if *inner == inverse => Some(inner_args[0].clone()),
            _ => None,
        },
        _ => None,
    }
}

fn algebraic(fun: Bi, args: &[IrNode], site: helios_primitives::Site) -> Option<IrNode> {
    let [a, b] = args else { return None };

    let int_lit = |n: &IrNode| -> Option<i64> {
        match &n.expr {
            IrExpr::Literal(Constant::Integer(i)) => i.try_into().ok(),
            _ => None,
        }
    };

    match fun {
        Bi::AddInteger => {
            if int_lit(a) == Some(0) {
                return Some(b.clone());
            }
            if int_lit(b) == Some(0) {
                return Some(a.clone());
            }
            None
        }
        Bi::SubtractInteger if int_lit(b) == Some(0) => Some(a.clone()),
        Bi::MultiplyInteger => {
            if int_lit(a) == Some(1) {
                return Some(b.clone());
            }
            if int_lit(b) == Some(1) {
                return Some(a.clone());
            }
            if (int_lit(a) == Some(0) && is_effect_free(b))
                || (int_lit(b) == Some(0) && is_effect_free(a))
            {
                return Some(IrNode::new(
                    IrExpr::Literal(Constant::Integer(0.into())),
                    site,
                ));
            }
            None
        }
        Bi::DivideInteger | Bi::QuotientInteger if int_lit(b) == Some(1) => Some(a.clone()),
        Bi::EqualsInteger | Bi::EqualsData | Bi::EqualsByteString
            if a == b && is_effect_free(a) =>
        {
            Some(IrNode::new(IrExpr::Literal(Constant::Bool(true)), site))
        }
        Bi::LessThanInteger if a == b && is_effect_free(a) => {
            Some(IrNode::new(IrExpr::Literal(Constant::Bool(false)), site))
        }
        Bi::LessThanEqualsInteger if a == b && is_effect_free(a) => {
            Some(IrNode::new(IrExpr::Literal(Constant::Bool(true)), site))
        }
        _ => None,
    }
}

/// Whether evaluating this node can fail, log, or run forever. Values
/// (literals, variables, closures, thunks) cannot; builtin calls can
/// unless every part is pure and the builtin itself never fails.
fn is_pure(node: &IrNode) -> bool {
    match &node.expr {
        IrExpr::Var { .. }
        | IrExpr::Literal(_)
        | IrExpr::Lambda { .. }
        | IrExpr::Delay(_) => true,
        IrExpr::Error { .. } | IrExpr::Force(_) | IrExpr::Call { .. } => false,
        IrExpr::Builtin { fun, args } => !can_fail(*fun) && args.iter().all(is_pure),
    }
}

fn can_fail(fun: Bi) -> bool {
    matches!(
        fun,
        Bi::DivideInteger
            | Bi::QuotientInteger
            | Bi::RemainderInteger
            | Bi::ModInteger
            | Bi::HeadList
            | Bi::TailList
            | Bi::IndexByteString
            | Bi::DecodeUtf8
            | Bi::UnConstrData
            | Bi::UnIData
            | Bi::UnBData
            | Bi::UnListData
            | Bi::UnMapData
            | Bi::FstPair
            | Bi::SndPair
            | Bi::Trace
            | Bi::IfThenElse
            | Bi::ChooseList
            | Bi::ChooseData
            | Bi::ChooseUnit
            | Bi::ConstrData
    )
}

/// Trivial value positions whose duplication or elision is unobservable.
fn is_effect_free(node: &IrNode) -> bool {
    matches!(
        node.expr,
        IrExpr::Var { .. } | IrExpr::Literal(_) | IrExpr::Lambda { .. }
    )
}

fn substitute(node: IrNode, unique: usize, replacement: &IrNode) -> IrNode {
    let site = node.site;

    let expr = match node.expr {
        IrExpr::Var { unique: u, .. } if u == unique => return replacement.clone(),
        expr @ (IrExpr::Var { .. } | IrExpr::Literal(_) | IrExpr::Error { .. }) => expr,
        IrExpr::Lambda { params, body } => {
            // uniques are globally unique, shadowing cannot occur
            IrExpr::Lambda {
                params,
                body: Box::new(substitute(*body, unique, replacement)),
            }
        }
        IrExpr::Delay(inner) => {
            IrExpr::Delay(Box::new(substitute(*inner, unique, replacement)))
        }
        IrExpr::Force(inner) => {
            IrExpr::Force(Box::new(substitute(*inner, unique, replacement)))
        }
        IrExpr::Call { head, args } => IrExpr::Call {
            head: Box::new(substitute(*head, unique, replacement)),
            args: args
                .into_iter()
                .map(|a| substitute(a, unique, replacement))
                .collect(),
        },
        IrExpr::Builtin { fun, args } => IrExpr::Builtin {
            fun,
            args: args
                .into_iter()
                .map(|a| substitute(a, unique, replacement))
                .collect(),
        },
    };

    IrNode::new(expr, site)
}
