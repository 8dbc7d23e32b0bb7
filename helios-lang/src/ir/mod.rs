//! The intermediate representation: a lambda calculus over `Data`
//! values plus the fixed builtin set of the bytecode machine.

pub mod build;
pub mod optimize;

use helios_machine::builtins::DefaultFunction;
use helios_machine::Constant;
use helios_primitives::{Site, Sources};

#[derive(Debug, Clone, PartialEq)]
pub struct IrNode {
    pub expr: IrExpr,
    pub site: Site,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IrExpr {
    /// A reference to a binding, by globally unique index. The name is
    /// carried for diagnostics only.
    Var {
        unique: usize,
        name: String,
    },
    Lambda {
        params: Vec<(usize, String)>,
        body: Box<IrNode>,
    },
    Call {
        head: Box<IrNode>,
        args: Vec<IrNode>,
    },
    Builtin {
        fun: DefaultFunction,
        args: Vec<IrNode>,
    },
    Literal(Constant),
    Delay(Box<IrNode>),
    Force(Box<IrNode>),
    Error {
        message: String,
    },
}

impl IrNode {
    pub fn new(expr: IrExpr, site: Site) -> Self {
        IrNode { expr, site }
    }

    /// Total node count, the optimizer's termination metric.
    pub fn count(&self) -> usize {
        1 + match &self.expr {
            IrExpr::Var { .. } | IrExpr::Literal(_) | IrExpr::Error { .. } => 0,
            IrExpr::Lambda { body, .. } => body.count(),
            IrExpr::Delay(inner) | IrExpr::Force(inner) => inner.count(),
            IrExpr::Call { head, args } => {
                head.count() + args.iter().map(IrNode::count).sum::<usize>()
            }
            IrExpr::Builtin { args, .. } => args.iter().map(IrNode::count).sum::<usize>(),
        }
    }

    /// Occurrences of a variable, by unique index.
    pub fn uses(&self, unique: usize) -> usize {
        match &self.expr {
            IrExpr::Var { unique: u, .. } => usize::from(*u == unique),
            IrExpr::Literal(_) | IrExpr::Error { .. } => 0,
            IrExpr::Lambda { body, .. } => body.uses(unique),
            IrExpr::Delay(inner) | IrExpr::Force(inner) => inner.uses(unique),
            IrExpr::Call { head, args } => {
                head.uses(unique) + args.iter().map(|a| a.uses(unique)).sum::<usize>()
            }
            IrExpr::Builtin { args, .. } => args.iter().map(|a| a.uses(unique)).sum::<usize>(),
        }
    }

    /// Indented rendering annotated with original source sites.
    pub fn pretty(&self, sources: &Sources) -> String {
        let mut out = String::new();
        self.pretty_into(sources, 0, &mut out);
        out
    }

    fn pretty_into(&self, sources: &Sources, depth: usize, out: &mut String) {
        let pad = "  ".repeat(depth);
        let at = sources.render(self.site);

        match &self.expr {
            IrExpr::Var { name, unique } => {
                out.push_str(&format!("{pad}{name}#{unique}  [{at}]\n"));
            }
            IrExpr::Literal(c) => {
                out.push_str(&format!("{pad}(con {c})  [{at}]\n"));
            }
            IrExpr::Error { message } => {
                out.push_str(&format!("{pad}(error {message:?})  [{at}]\n"));
            }
            IrExpr::Lambda { params, body } => {
                let params: Vec<String> = params
                    .iter()
                    .map(|(u, n)| format!("{n}#{u}"))
                    .collect();
                out.push_str(&format!("{pad}(lam [{}]  [{at}]\n", params.join(" ")));
                body.pretty_into(sources, depth + 1, out);
                out.push_str(&format!("{pad})\n"));
            }
            IrExpr::Delay(inner) => {
                out.push_str(&format!("{pad}(delay  [{at}]\n"));
                inner.pretty_into(sources, depth + 1, out);
                out.push_str(&format!("{pad})\n"));
            }
            IrExpr::Force(inner) => {
                out.push_str(&format!("{pad}(force  [{at}]\n"));
                inner.pretty_into(sources, depth + 1, out);
                out.push_str(&format!("{pad})\n"));
            }
            IrExpr::Call { head, args } => {
                out.push_str(&format!("{pad}(call  [{at}]\n"));
                head.pretty_into(sources, depth + 1, out);
                for arg in args {
                    arg.pretty_into(sources, depth + 1, out);
                }
                out.push_str(&format!("{pad})\n"));
            }
            IrExpr::Builtin { fun, args } => {
                out.push_str(&format!("{pad}({fun}  [{at}]\n"));
                for arg in args {
                    arg.pretty_into(sources, depth + 1, out);
                }
                out.push_str(&format!("{pad})\n"));
            }
        }
    }
}
