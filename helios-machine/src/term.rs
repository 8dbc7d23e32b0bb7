use helios_primitives::Data;
use num_bigint::BigInt;
use std::{fmt, rc::Rc};

use crate::builtins::DefaultFunction;

/// A complete script: a language version header plus the root term.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub version: (u64, u64, u64),
    pub term: Term,
}

impl Program {
    pub fn new(version: (u64, u64, u64), term: Term) -> Self {
        Program { version, term }
    }

    /// Binds one more argument onto the program body, outermost first.
    pub fn apply_term(&self, argument: Term) -> Program {
        Program {
            version: self.version,
            term: Term::Apply {
                function: Rc::new(self.term.clone()),
                argument: Rc::new(argument),
            },
        }
    }

    /// Binds a literal data argument.
    pub fn apply_data(&self, argument: Data) -> Program {
        self.apply_term(Term::Constant(Constant::Data(argument)))
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (major, minor, patch) = self.version;
        write!(f, "(program {major}.{minor}.{patch} {})", self.term)
    }
}

/// Untyped Plutus-Core term tree. Variables are 1-based De Bruijn
/// indices counting outward from the innermost binder.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Var(u64),
    Delay(Rc<Term>),
    Lambda {
        body: Rc<Term>,
    },
    Apply {
        function: Rc<Term>,
        argument: Rc<Term>,
    },
    Constant(Constant),
    Force(Rc<Term>),
    Error,
    Builtin(DefaultFunction),
}

impl Term {
    pub fn apply(self, argument: Term) -> Term {
        Term::Apply {
            function: Rc::new(self),
            argument: Rc::new(argument),
        }
    }

    pub fn force(self) -> Term {
        Term::Force(Rc::new(self))
    }

    pub fn delay(self) -> Term {
        Term::Delay(Rc::new(self))
    }

    pub fn lambda(body: Term) -> Term {
        Term::Lambda {
            body: Rc::new(body),
        }
    }

    pub fn integer(i: impl Into<BigInt>) -> Term {
        Term::Constant(Constant::Integer(i.into()))
    }

    pub fn data(d: Data) -> Term {
        Term::Constant(Constant::Data(d))
    }

    pub fn unwrap_constant(&self) -> Option<&Constant> {
        match self {
            Term::Constant(c) => Some(c),
            _ => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Var(i) => write!(f, "i{i}"),
            Term::Delay(t) => write!(f, "(delay {t})"),
            Term::Lambda { body } => write!(f, "(lam {body})"),
            Term::Apply { function, argument } => write!(f, "[{function} {argument}]"),
            Term::Constant(c) => write!(f, "(con {c})"),
            Term::Force(t) => write!(f, "(force {t})"),
            Term::Error => write!(f, "(error)"),
            Term::Builtin(b) => write!(f, "(builtin {b})"),
        }
    }
}

/// Typed constants carried by `Term::Constant`.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Unit,
    Bool(bool),
    Integer(BigInt),
    ByteString(Vec<u8>),
    String(String),
    Data(Data),
    ProtoList(ConstType, Vec<Constant>),
    ProtoPair(ConstType, ConstType, Box<Constant>, Box<Constant>),
}

impl Constant {
    pub fn const_type(&self) -> ConstType {
        match self {
            Constant::Unit => ConstType::Unit,
            Constant::Bool(_) => ConstType::Bool,
            Constant::Integer(_) => ConstType::Integer,
            Constant::ByteString(_) => ConstType::ByteString,
            Constant::String(_) => ConstType::String,
            Constant::Data(_) => ConstType::Data,
            Constant::ProtoList(t, _) => ConstType::List(Box::new(t.clone())),
            Constant::ProtoPair(a, b, _, _) => {
                ConstType::Pair(Box::new(a.clone()), Box::new(b.clone()))
            }
        }
    }

    /// Abstract memory weight in machine words, used by the cost model.
    pub fn ex_mem(&self) -> i64 {
        match self {
            Constant::Unit => 1,
            Constant::Bool(_) => 1,
            Constant::Integer(i) => {
                if i.bits() == 0 {
                    1
                } else {
                    (i.bits() as i64 - 1) / 64 + 1
                }
            }
            Constant::ByteString(bs) => {
                if bs.is_empty() {
                    1
                } else {
                    (bs.len() as i64 - 1) / 8 + 1
                }
            }
            Constant::String(s) => s.chars().count() as i64,
            Constant::Data(d) => data_ex_mem(d),
            Constant::ProtoList(_, xs) => xs.iter().map(Constant::ex_mem).sum::<i64>() + 1,
            Constant::ProtoPair(_, _, a, b) => a.ex_mem() + b.ex_mem() + 1,
        }
    }
}

fn data_ex_mem(d: &Data) -> i64 {
    match d {
        Data::Int(i) => Constant::Integer(i.clone()).ex_mem() + 4,
        Data::Bytes(bs) => Constant::ByteString(bs.clone()).ex_mem() + 4,
        Data::List(xs) => xs.iter().map(data_ex_mem).sum::<i64>() + 4,
        Data::Map(kvs) => kvs.iter().map(|(k, v)| data_ex_mem(k) + data_ex_mem(v)).sum::<i64>() + 4,
        Data::Constr(_, fields) => fields.iter().map(data_ex_mem).sum::<i64>() + 4,
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Unit => write!(f, "unit ()"),
            Constant::Bool(b) => write!(f, "bool {b}"),
            Constant::Integer(i) => write!(f, "integer {i}"),
            Constant::ByteString(bs) => write!(f, "bytestring #{}", hex::encode(bs)),
            Constant::String(s) => write!(f, "string {s:?}"),
            Constant::Data(d) => write!(f, "data {d}"),
            Constant::ProtoList(t, xs) => {
                write!(f, "(list {t}) [")?;
                for (i, x) in xs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{x}")?;
                }
                write!(f, "]")
            }
            Constant::ProtoPair(_, _, a, b) => write!(f, "pair ({a}, {b})"),
        }
    }
}

/// Constant type tags as they appear in the wire type list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstType {
    Integer,
    ByteString,
    String,
    Unit,
    Bool,
    Data,
    List(Box<ConstType>),
    Pair(Box<ConstType>, Box<ConstType>),
}

impl fmt::Display for ConstType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstType::Integer => write!(f, "integer"),
            ConstType::ByteString => write!(f, "bytestring"),
            ConstType::String => write!(f, "string"),
            ConstType::Unit => write!(f, "unit"),
            ConstType::Bool => write!(f, "bool"),
            ConstType::Data => write!(f, "data"),
            ConstType::List(t) => write!(f, "(list {t})"),
            ConstType::Pair(a, b) => write!(f, "(pair {a} {b})"),
        }
    }
}
