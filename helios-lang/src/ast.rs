//! Abstract syntax produced by the parser and consumed by the checker.

use helios_primitives::Site;
use num_bigint::BigInt;
use std::fmt;

/// The declared role of a script, read from the header. Determines the
/// checked signature of `main`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Testing,
    Spending,
    Minting,
    Staking,
    Module,
}

impl Purpose {
    pub fn from_keyword(word: &str) -> Option<Purpose> {
        match word {
            "testing" => Some(Purpose::Testing),
            "spending" => Some(Purpose::Spending),
            "minting" => Some(Purpose::Minting),
            "staking" => Some(Purpose::Staking),
            "module" => Some(Purpose::Module),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Purpose::Testing => "testing",
            Purpose::Spending => "spending",
            Purpose::Minting => "minting",
            Purpose::Staking => "staking",
            Purpose::Module => "module",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name {
    pub text: String,
    pub site: Site,
}

impl Name {
    pub fn new(text: impl Into<String>, site: Site) -> Self {
        Name {
            text: text.into(),
            site,
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Type syntax as written: resolution happens in the checker.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    /// `Int`, `Option[T]`, a type parameter, a user type
    Named {
        name: Name,
        args: Vec<TypeExpr>,
        site: Site,
    },
    /// `[]T`
    List { item: Box<TypeExpr>, site: Site },
    /// `Map[K]V`
    Map {
        key: Box<TypeExpr>,
        value: Box<TypeExpr>,
        site: Site,
    },
    /// `(A, B) -> C`
    Func {
        params: Vec<TypeExpr>,
        ret: Box<TypeExpr>,
        site: Site,
    },
}

impl TypeExpr {
    pub fn site(&self) -> Site {
        match self {
            TypeExpr::Named { site, .. }
            | TypeExpr::List { site, .. }
            | TypeExpr::Map { site, .. }
            | TypeExpr::Func { site, .. } => *site,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub site: Site,
}

impl Expr {
    pub fn new(kind: ExprKind, site: Site) -> Self {
        Expr { kind, site }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Int(BigInt),
    Bool(bool),
    Str(String),
    Bytes(Vec<u8>),
    /// `[]Int{1, 2, 3}`
    ListLit {
        item: TypeExpr,
        items: Vec<Expr>,
    },
    /// `Map[K]V{k: v, ...}`
    MapLit {
        key: TypeExpr,
        value: TypeExpr,
        entries: Vec<(Expr, Expr)>,
    },
    Name(Name),
    /// `Type::member` (variant constructor, static method, assoc const)
    Path {
        ty: Name,
        member: Name,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        head: Box<Expr>,
        args: Vec<Expr>,
    },
    /// Explicit type arguments on a generic function: `id[Int]`
    TypeApply {
        head: Box<Expr>,
        args: Vec<TypeExpr>,
    },
    Member {
        object: Box<Expr>,
        name: Name,
    },
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    /// `scrutinee.switch { n: Some => ..., None => ..., else => ... }`
    Switch {
        scrutinee: Box<Expr>,
        arms: Vec<SwitchArm>,
        default: Option<Box<Expr>>,
    },
    /// `Point{x: 1, y: 2}`
    StructLit {
        ty: Name,
        fields: Vec<(Option<Name>, Expr)>,
    },
    /// `(x: Int) -> Int { x + 1 }`
    Lambda {
        params: Vec<(Name, TypeExpr)>,
        ret: Box<TypeExpr>,
        body: Box<Expr>,
    },
    /// `{ x = e1; ...; result }`
    Block {
        stmts: Vec<BlockStmt>,
        result: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockStmt {
    Bind {
        name: Name,
        ty: Option<TypeExpr>,
        value: Expr,
    },
    Assert {
        cond: Expr,
        msg: Option<Expr>,
        site: Site,
    },
    Print {
        value: Expr,
        site: Site,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchArm {
    pub binder: Option<Name>,
    pub variant: Name,
    pub body: Expr,
    pub site: Site,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstStatement {
    pub name: Name,
    pub ty: Option<TypeExpr>,
    pub value: Expr,
    pub site: Site,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncStatement {
    pub name: Name,
    pub type_params: Vec<Name>,
    pub params: Vec<(Name, TypeExpr)>,
    pub ret: TypeExpr,
    pub body: Expr,
    pub site: Site,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructStatement {
    pub name: Name,
    pub fields: Vec<(Name, TypeExpr)>,
    pub site: Site,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumVariant {
    pub name: Name,
    pub fields: Vec<(Name, TypeExpr)>,
    pub site: Site,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumStatement {
    pub name: Name,
    pub variants: Vec<EnumVariant>,
    pub site: Site,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImplStatement {
    pub ty: Name,
    pub methods: Vec<FuncStatement>,
    pub consts: Vec<ConstStatement>,
    pub site: Site,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportStatement {
    pub module: Name,
    pub site: Site,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Const(ConstStatement),
    Func(FuncStatement),
    Struct(StructStatement),
    Enum(EnumStatement),
    Impl(ImplStatement),
    Import(ImportStatement),
}

impl Statement {
    pub fn site(&self) -> Site {
        match self {
            Statement::Const(s) => s.site,
            Statement::Func(s) => s.site,
            Statement::Struct(s) => s.site,
            Statement::Enum(s) => s.site,
            Statement::Impl(s) => s.site,
            Statement::Import(s) => s.site,
        }
    }
}

/// One parsed source file: header plus declarations in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub purpose: Purpose,
    pub name: Name,
    pub statements: Vec<Statement>,
    pub site: Site,
}
