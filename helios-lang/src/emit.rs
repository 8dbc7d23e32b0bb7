//! Bytecode emission: De Bruijn assignment and term construction.
//!
//! The walk is a deterministic pre-order traversal; each IR node gets a
//! sequential offset recorded in the code map so runtime failures can
//! be attributed back to source sites.

use helios_machine::builtins::DefaultFunction as Bi;
use helios_machine::{Constant, Term};
use helios_primitives::CodeMap;

use crate::ir::{IrExpr, IrNode};

pub struct Emitted {
    pub term: Term,
    pub code_map: CodeMap,
    /// (info string, ir offset) of every node that can raise it, in
    /// traversal order. First entry wins on lookup.
    pub info_offsets: Vec<(String, usize)>,
}

pub fn emit(ir: &IrNode) -> Emitted {
    let mut emitter = Emitter {
        env: vec![],
        code_map: CodeMap::new(),
        info_offsets: vec![],
        offset: 0,
    };

    let term = emitter.term(ir);

    Emitted {
        term,
        code_map: emitter.code_map,
        info_offsets: emitter.info_offsets,
    }
}

struct Emitter {
    /// Lambda-bound uniques, innermost last.
    env: Vec<usize>,
    code_map: CodeMap,
    info_offsets: Vec<(String, usize)>,
    offset: usize,
}

impl Emitter {
    fn term(&mut self, node: &IrNode) -> Term {
        let offset = self.offset;
        self.offset += 1;
        self.code_map.insert(offset, node.site);

        match &node.expr {
            IrExpr::Var { unique, name } => {
                let position = self
                    .env
                    .iter()
                    .rposition(|u| u == unique)
                    .unwrap_or_else(|| panic!("unbound IR variable '{name}' survived lowering"));

                Term::Var((self.env.len() - position) as u64)
            }
            // a parameterless function is a thunk
            IrExpr::Lambda { params, body } if params.is_empty() => {
                self.term(body).delay()
            }
            IrExpr::Lambda { params, body } => {
                for (unique, _) in params {
                    self.env.push(*unique);
                }

                let mut term = self.term(body);

                for _ in params {
                    self.env.pop();
                    term = Term::lambda(term);
                }

                term
            }
            IrExpr::Call { head, args } if args.is_empty() => self.term(head).force(),
            IrExpr::Call { head, args } => {
                let mut term = self.term(head);

                for arg in args {
                    term = term.apply(self.term(arg));
                }

                term
            }
            IrExpr::Builtin { fun, args } => {
                if let Some(info) = failure_info(*fun) {
                    self.info_offsets.push((info.to_string(), offset));
                }

                let mut term = Term::Builtin(*fun);

                for _ in 0..fun.force_count() {
                    term = term.force();
                }

                for arg in args {
                    term = term.apply(self.term(arg));
                }

                term
            }
            IrExpr::Literal(c) => Term::Constant(c.clone()),
            IrExpr::Delay(inner) => self.term(inner).delay(),
            IrExpr::Force(inner) => self.term(inner).force(),
            IrExpr::Error { message } => {
                self.info_offsets.push((message.clone(), offset));

                // the message travels through the trace log so the
                // machine can surface it as the failure info
                Term::Builtin(Bi::Trace)
                    .force()
                    .apply(Term::Constant(Constant::String(message.clone())))
                    .apply(Term::Error.delay())
                    .force()
            }
        }
    }
}

fn failure_info(fun: Bi) -> Option<&'static str> {
    match fun {
        Bi::HeadList | Bi::TailList => Some("empty list"),
        Bi::IndexByteString => Some("index out of range"),
        Bi::DecodeUtf8 => Some("invalid utf-8"),
        Bi::DivideInteger | Bi::QuotientInteger | Bi::RemainderInteger | Bi::ModInteger => {
            Some("division by zero")
        }
        _ => None,
    }
}
