//! Scope resolution, type checking and monomorphisation.
//!
//! The checker turns the parsed script (plus imported modules) into a
//! typed program: every expression annotated with a resolved concrete
//! type, every generic reference specialised through the
//! monomorphisation cache, and every global ordered so that
//! dependencies precede their users.

use std::collections::{HashMap, HashSet};

use helios_primitives::Site;
use itertools::Itertools;
use num_bigint::BigInt;
use tracing::debug;

use crate::ast::{
    BinaryOp, BlockStmt, Expr, ExprKind, FuncStatement, Name, Purpose, Script, Statement,
    TypeExpr, UnaryOp,
};
use crate::error::{LangError, LangResult};

use super::registry::{
    self, builtin_higher_order, builtin_member, is_property, BuiltinMember, DeclKind, TypeDecl,
    TypeRegistry, VariantDecl,
};
use super::{DeclId, Type};

pub type MonoId = usize;
pub type FuncId = usize;

#[derive(Debug, Clone)]
pub struct TypedExpr {
    pub kind: TypedKind,
    pub ty: Type,
    pub site: Site,
}

impl TypedExpr {
    fn new(kind: TypedKind, ty: Type, site: Site) -> Self {
        TypedExpr { kind, ty, site }
    }
}

/// Static builtins reachable through `Type::member` paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticBuiltin {
    ValueLovelace,
    ValueZero,
}

#[derive(Debug, Clone)]
pub enum TypedKind {
    LitInt(BigInt),
    LitBool(bool),
    LitStr(String),
    LitBytes(Vec<u8>),
    LitList(Vec<TypedExpr>),
    LitMap(Vec<(TypedExpr, TypedExpr)>),
    /// A local binding or parameter.
    Var {
        unique: usize,
        name: String,
    },
    /// A global function specialisation or constant.
    Global {
        unique: usize,
        name: String,
    },
    Field {
        object: Box<TypedExpr>,
        index: usize,
    },
    /// Struct or enum-variant construction.
    ConstructData {
        tag: u64,
        fields: Vec<TypedExpr>,
    },
    Builtin {
        member: BuiltinMember,
        receiver: Box<TypedExpr>,
        args: Vec<TypedExpr>,
    },
    Static {
        builtin: StaticBuiltin,
        args: Vec<TypedExpr>,
    },
    /// `T::from_data(d)`: the runtime representation already is data.
    Cast(Box<TypedExpr>),
    Call {
        head: Box<TypedExpr>,
        args: Vec<TypedExpr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<TypedExpr>,
        right: Box<TypedExpr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<TypedExpr>,
    },
    If {
        cond: Box<TypedExpr>,
        then_branch: Box<TypedExpr>,
        else_branch: Box<TypedExpr>,
    },
    Switch {
        scrutinee: Box<TypedExpr>,
        arms: Vec<TypedArm>,
        default: Option<Box<TypedExpr>>,
    },
    Let {
        unique: usize,
        name: String,
        value: Box<TypedExpr>,
        body: Box<TypedExpr>,
    },
    Lambda {
        params: Vec<(usize, String, Type)>,
        body: Box<TypedExpr>,
    },
    Assert {
        cond: Box<TypedExpr>,
        msg: Option<Box<TypedExpr>>,
        body: Box<TypedExpr>,
    },
    Print {
        message: Box<TypedExpr>,
        body: Box<TypedExpr>,
    },
}

#[derive(Debug, Clone)]
pub struct TypedArm {
    pub tag: u64,
    pub binder: Option<(usize, String)>,
    pub body: TypedExpr,
}

/// One specialisation of a (possibly generic) function.
#[derive(Debug, Clone)]
pub struct Mono {
    pub unique: usize,
    pub name: String,
    pub params: Vec<(usize, String, Type)>,
    pub ret: Type,
    pub body: Option<TypedExpr>,
    pub recursive: bool,
}

#[derive(Debug, Clone)]
pub enum Global {
    Func(MonoId),
    Const {
        unique: usize,
        name: String,
        body: TypedExpr,
    },
}

#[derive(Debug)]
pub struct CheckedProgram {
    pub purpose: Purpose,
    pub name: String,
    pub registry: TypeRegistry,
    pub monos: Vec<Mono>,
    /// Globals in dependency order: every entry only references earlier
    /// entries (or itself when recursive).
    pub order: Vec<Global>,
    pub main: MonoId,
    pub next_unique: usize,
}

struct FuncDef {
    name: String,
    type_params: Vec<String>,
    params: Vec<(Name, TypeExpr)>,
    ret: TypeExpr,
    body: Expr,
    method_of: Option<DeclId>,
    site: Site,
}

struct ConstDef {
    ty: Option<TypeExpr>,
    value: Expr,
    site: Site,
}

/// Checks a parsed script against its imported modules.
pub fn check(script: &Script, modules: &[Script]) -> LangResult<CheckedProgram> {
    Checker::new().run(script, modules)
}

struct Checker {
    registry: TypeRegistry,

    funcs: Vec<FuncDef>,
    func_by_name: HashMap<String, FuncId>,
    methods: HashMap<(DeclId, String), FuncId>,
    statics: HashMap<(DeclId, String), FuncId>,

    consts: Vec<ConstDef>,
    const_by_name: HashMap<String, usize>,
    const_done: HashMap<usize, (usize, Type)>,
    const_in_progress: HashSet<usize>,

    monos: Vec<Mono>,
    mono_cache: HashMap<(FuncId, Vec<Type>), MonoId>,
    mono_stack: Vec<(FuncId, Vec<Type>)>,

    order: Vec<Global>,
    scopes: Vec<HashMap<String, (usize, Type)>>,

    /// Type parameter names of the function currently being checked,
    /// and the concrete arguments of the active specialisation.
    type_param_names: Vec<String>,
    type_args: Vec<Type>,
    /// Receiver type for `Self` inside impl blocks.
    self_type: Option<Type>,

    next_unique: usize,
}

impl Checker {
    fn new() -> Self {
        Checker {
            registry: TypeRegistry::new(),
            funcs: vec![],
            func_by_name: HashMap::new(),
            methods: HashMap::new(),
            statics: HashMap::new(),
            consts: vec![],
            const_by_name: HashMap::new(),
            const_done: HashMap::new(),
            const_in_progress: HashSet::new(),
            monos: vec![],
            mono_cache: HashMap::new(),
            mono_stack: vec![],
            order: vec![],
            scopes: vec![],
            type_param_names: vec![],
            type_args: vec![],
            self_type: None,
            next_unique: 0,
        }
    }

    fn fresh(&mut self) -> usize {
        let u = self.next_unique;
        self.next_unique += 1;
        u
    }

    fn run(mut self, script: &Script, modules: &[Script]) -> LangResult<CheckedProgram> {
        if script.purpose == Purpose::Module {
            return Err(LangError::type_error(
                script.site,
                "a module cannot be compiled on its own",
            ));
        }

        let statements = flatten_imports(script, modules)?;

        self.register_types(&statements)?;
        self.collect_globals(&statements)?;

        let main_id = *self
            .func_by_name
            .get("main")
            .ok_or_else(|| LangError::reference(script.site, "script has no 'main' function"))?;

        if !self.funcs[main_id].type_params.is_empty() {
            return Err(LangError::type_error(
                self.funcs[main_id].site,
                "'main' cannot be generic",
            ));
        }

        let main = self.mono_of(main_id, vec![], script.site)?;
        self.check_purpose(script.purpose, main, script.site)?;

        debug!(
            monos = self.monos.len(),
            globals = self.order.len(),
            "type check finished"
        );

        Ok(CheckedProgram {
            purpose: script.purpose,
            name: script.name.text.clone(),
            registry: self.registry,
            monos: self.monos,
            order: self.order,
            main,
            next_unique: self.next_unique,
        })
    }

    // ----- declaration collection

    fn register_types(&mut self, statements: &[Statement]) -> LangResult<()> {
        // names first so that fields may reference each other
        for statement in statements {
            let name = match statement {
                Statement::Struct(s) => Some(&s.name),
                Statement::Enum(e) => Some(&e.name),
                _ => None,
            };

            if let Some(name) = name {
                let decl = TypeDecl {
                    name: name.text.clone(),
                    arity: 0,
                    kind: DeclKind::Struct { fields: vec![] },
                };

                if self.registry.register(decl).is_none() {
                    return Err(LangError::type_error(
                        name.site,
                        format!("type '{}' is already defined", name.text),
                    ));
                }
            }
        }

        for statement in statements {
            match statement {
                Statement::Struct(s) => {
                    let id = self.registry.lookup(&s.name.text).expect("registered above");

                    let fields = s
                        .fields
                        .iter()
                        .map(|(name, ty)| Ok((name.text.clone(), self.resolve_type(ty)?)))
                        .collect::<LangResult<Vec<_>>>()?;

                    self.registry.fill(id, DeclKind::Struct { fields });
                }
                Statement::Enum(e) => {
                    let id = self.registry.lookup(&e.name.text).expect("registered above");

                    if e.variants.is_empty() {
                        return Err(LangError::type_error(
                            e.site,
                            format!("enum '{}' needs at least one variant", e.name.text),
                        ));
                    }

                    let variants = e
                        .variants
                        .iter()
                        .map(|v| {
                            let fields = v
                                .fields
                                .iter()
                                .map(|(name, ty)| Ok((name.text.clone(), self.resolve_type(ty)?)))
                                .collect::<LangResult<Vec<_>>>()?;

                            Ok(VariantDecl {
                                name: v.name.text.clone(),
                                fields,
                            })
                        })
                        .collect::<LangResult<Vec<_>>>()?;

                    self.registry.fill(id, DeclKind::Enum { variants });
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn collect_globals(&mut self, statements: &[Statement]) -> LangResult<()> {
        for statement in statements {
            match statement {
                Statement::Func(f) => {
                    self.add_func(f, None)?;
                }
                Statement::Const(c) => {
                    let id = self.consts.len();
                    self.consts.push(ConstDef {
                        ty: c.ty.clone(),
                        value: c.value.clone(),
                        site: c.site,
                    });

                    if self.const_by_name.insert(c.name.text.clone(), id).is_some() {
                        return Err(LangError::type_error(
                            c.name.site,
                            format!("constant '{}' is already defined", c.name.text),
                        ));
                    }
                }
                Statement::Impl(i) => {
                    let decl = self.registry.lookup(&i.ty.text).ok_or_else(|| {
                        LangError::reference(
                            i.ty.site,
                            format!("unknown type '{}' in impl", i.ty.text),
                        )
                    })?;

                    for method in &i.methods {
                        self.add_func(method, Some(decl))?;
                    }

                    for c in &i.consts {
                        let id = self.consts.len();
                        self.consts.push(ConstDef {
                            ty: c.ty.clone(),
                            value: c.value.clone(),
                            site: c.site,
                        });

                        let qualified = format!("{}::{}", i.ty.text, c.name.text);
                        if self.const_by_name.insert(qualified, id).is_some() {
                            return Err(LangError::type_error(
                                c.name.site,
                                format!("constant '{}' is already defined", c.name.text),
                            ));
                        }
                    }
                }
                Statement::Struct(_) | Statement::Enum(_) | Statement::Import(_) => {}
            }
        }

        Ok(())
    }

    fn add_func(&mut self, f: &FuncStatement, impl_of: Option<DeclId>) -> LangResult<()> {
        let is_method = impl_of.is_some()
            && matches!(f.params.first(), Some((name, _)) if name.text == "self");

        if impl_of.is_some() && !f.type_params.is_empty() {
            return Err(LangError::type_error(
                f.site,
                "impl functions cannot be generic",
            ));
        }

        let id = self.funcs.len();
        self.funcs.push(FuncDef {
            name: match impl_of {
                Some(decl) => format!("{}::{}", self.registry.name(decl), f.name.text),
                None => f.name.text.clone(),
            },
            type_params: f.type_params.iter().map(|n| n.text.clone()).collect(),
            params: f.params.clone(),
            ret: f.ret.clone(),
            body: f.body.clone(),
            method_of: if is_method { impl_of } else { None },
            site: f.site,
        });

        match impl_of {
            Some(decl) if is_method => {
                if self.methods.insert((decl, f.name.text.clone()), id).is_some() {
                    return Err(LangError::type_error(
                        f.name.site,
                        format!("method '{}' is already defined", f.name.text),
                    ));
                }
            }
            Some(decl) => {
                if self.statics.insert((decl, f.name.text.clone()), id).is_some() {
                    return Err(LangError::type_error(
                        f.name.site,
                        format!("function '{}' is already defined", f.name.text),
                    ));
                }
            }
            None => {
                if self.func_by_name.insert(f.name.text.clone(), id).is_some() {
                    return Err(LangError::type_error(
                        f.name.site,
                        format!("function '{}' is already defined", f.name.text),
                    ));
                }
            }
        }

        Ok(())
    }

    // ----- type resolution

    /// Resolves written type syntax; type-parameter mentions become
    /// `Type::Param` positions.
    fn resolve_type(&self, expr: &TypeExpr) -> LangResult<Type> {
        match expr {
            TypeExpr::List { item, .. } => Ok(Type::nominal(
                registry::LIST,
                vec![self.resolve_type(item)?],
            )),
            TypeExpr::Map { key, value, .. } => Ok(Type::nominal(
                registry::MAP,
                vec![self.resolve_type(key)?, self.resolve_type(value)?],
            )),
            TypeExpr::Func { params, ret, .. } => Ok(Type::func(
                params
                    .iter()
                    .map(|t| self.resolve_type(t))
                    .collect::<LangResult<Vec<_>>>()?,
                self.resolve_type(ret)?,
            )),
            TypeExpr::Named { name, args, site } => {
                if name.text == "Self" {
                    return self.self_type.clone().ok_or_else(|| {
                        LangError::type_error(*site, "'Self' outside of an impl block")
                    });
                }

                if args.is_empty() {
                    if let Some(i) = self.type_param_names.iter().position(|p| *p == name.text) {
                        return Ok(Type::Param(i));
                    }
                }

                let decl = self.registry.lookup(&name.text).ok_or_else(|| {
                    LangError::reference(*site, format!("unknown type '{}'", name.text))
                })?;

                if args.len() != self.registry.arity(decl) {
                    return Err(LangError::type_error(
                        *site,
                        format!(
                            "type '{}' expects {} type argument(s), got {}",
                            name.text,
                            self.registry.arity(decl),
                            args.len()
                        ),
                    ));
                }

                Ok(Type::nominal(
                    decl,
                    args.iter()
                        .map(|t| self.resolve_type(t))
                        .collect::<LangResult<Vec<_>>>()?,
                ))
            }
        }
    }

    /// A written type in an expression position, with the active
    /// specialisation's concrete arguments substituted in.
    fn resolve_concrete(&self, expr: &TypeExpr) -> LangResult<Type> {
        Ok(self.resolve_type(expr)?.substitute(&self.type_args))
    }

    // ----- constants

    fn const_global(&mut self, id: usize, _site: Site) -> LangResult<(usize, Type)> {
        if let Some(done) = self.const_done.get(&id) {
            return Ok(done.clone());
        }

        if !self.const_in_progress.insert(id) {
            return Err(LangError::reference(
                self.consts[id].site,
                "constant definition depends on itself",
            ));
        }

        let def_value = self.consts[id].value.clone();
        let def_ty = self.consts[id].ty.clone();
        let def_site = self.consts[id].site;

        // constants are checked outside any generic context
        let outer_params = std::mem::take(&mut self.type_param_names);
        let outer_args = std::mem::take(&mut self.type_args);
        let outer_scopes = std::mem::take(&mut self.scopes);

        let body = self.check_expr(&def_value);

        self.scopes = outer_scopes;
        self.type_args = outer_args;
        self.type_param_names = outer_params;

        let body = body?;

        if let Some(ty) = &def_ty {
            let declared = self.resolve_type(ty)?;
            if !declared.equals(&body.ty) {
                return Err(LangError::type_error(
                    def_site,
                    format!(
                        "constant declared as {} but its value is {}",
                        declared.show(&self.registry),
                        body.ty.show(&self.registry)
                    ),
                ));
            }
        }

        let unique = self.fresh();
        let name = self
            .const_by_name
            .iter()
            .find(|(_, v)| **v == id)
            .map(|(k, _)| k.clone())
            .unwrap_or_default();
        let ty = body.ty.clone();

        self.order.push(Global::Const { unique, name, body });

        self.const_in_progress.remove(&id);
        self.const_done.insert(id, (unique, ty.clone()));

        Ok((unique, ty))
    }

    // ----- monomorphisation

    fn mono_of(&mut self, func: FuncId, type_args: Vec<Type>, site: Site) -> LangResult<MonoId> {
        let key = (func, type_args.clone());

        if let Some(id) = self.mono_cache.get(&key) {
            let id = *id;

            if self.mono_stack.last() == Some(&key) {
                // direct self-recursion of the specialisation being checked
                self.monos[id].recursive = true;
                return Ok(id);
            }

            if self.mono_stack.contains(&key) {
                return Err(LangError::type_error(
                    site,
                    format!(
                        "recursive cycle while specialising '{}'",
                        self.monos[id].name
                    ),
                ));
            }

            return Ok(id);
        }

        if self.funcs[func].type_params.len() != type_args.len() {
            return Err(LangError::type_error(
                site,
                format!(
                    "function '{}' expects {} type argument(s), got {}",
                    self.funcs[func].name,
                    self.funcs[func].type_params.len(),
                    type_args.len()
                ),
            ));
        }

        let mono_name = if type_args.is_empty() {
            self.funcs[func].name.clone()
        } else {
            let shown = type_args.iter().map(|t| t.show(&self.registry)).join(", ");
            format!("{}[{}]", self.funcs[func].name, shown)
        };

        let outer_params = std::mem::replace(
            &mut self.type_param_names,
            self.funcs[func].type_params.clone(),
        );
        let outer_args = std::mem::replace(&mut self.type_args, type_args.clone());
        let outer_self = std::mem::replace(
            &mut self.self_type,
            self.funcs[func].method_of.map(Type::plain),
        );
        let outer_scopes = std::mem::take(&mut self.scopes);

        let def_params = self.funcs[func].params.clone();
        let def_ret = self.funcs[func].ret.clone();
        let def_body = self.funcs[func].body.clone();

        let result = (|| {
            let mut params = Vec::with_capacity(def_params.len());

            for (name, ty) in &def_params {
                let resolved = self.resolve_concrete(ty)?;
                params.push((self.fresh(), name.text.clone(), resolved));
            }

            let ret = self.resolve_concrete(&def_ret)?;

            let id = self.monos.len();
            let mono_unique = self.fresh();
            self.monos.push(Mono {
                unique: mono_unique,
                name: mono_name,
                params: params.clone(),
                ret: ret.clone(),
                body: None,
                recursive: false,
            });

            self.mono_cache.insert(key.clone(), id);
            self.mono_stack.push(key.clone());

            let mut frame = HashMap::new();
            for (unique, name, ty) in &params {
                frame.insert(name.clone(), (*unique, ty.clone()));
            }

            self.scopes.push(frame);
            let body = self.check_expr(&def_body);
            self.scopes.pop();
            self.mono_stack.pop();

            let body = body?;

            if !body.ty.equals(&ret) {
                return Err(LangError::type_error(
                    body.site,
                    format!(
                        "function '{}' declares return type {} but its body is {}",
                        self.monos[id].name,
                        ret.show(&self.registry),
                        body.ty.show(&self.registry)
                    ),
                ));
            }

            self.monos[id].body = Some(body);
            self.order.push(Global::Func(id));

            Ok(id)
        })();

        self.scopes = outer_scopes;
        self.self_type = outer_self;
        self.type_args = outer_args;
        self.type_param_names = outer_params;

        result
    }

    fn mono_type(&self, id: MonoId) -> Type {
        let mono = &self.monos[id];
        Type::func(
            mono.params.iter().map(|(_, _, t)| t.clone()).collect(),
            mono.ret.clone(),
        )
    }

    fn mono_ref(&self, id: MonoId, site: Site) -> TypedExpr {
        TypedExpr::new(
            TypedKind::Global {
                unique: self.monos[id].unique,
                name: self.monos[id].name.clone(),
            },
            self.mono_type(id),
            site,
        )
    }

    /// The raw (unsubstituted) signature of a function, with its own
    /// type parameters as `Param` positions. Used for inference.
    fn raw_signature(&mut self, func: FuncId) -> LangResult<(Vec<Type>, Type)> {
        let outer_params = std::mem::replace(
            &mut self.type_param_names,
            self.funcs[func].type_params.clone(),
        );
        let outer_self = std::mem::replace(
            &mut self.self_type,
            self.funcs[func].method_of.map(Type::plain),
        );

        let result = (|| {
            let params = self.funcs[func]
                .params
                .clone()
                .iter()
                .map(|(_, ty)| self.resolve_type(ty))
                .collect::<LangResult<Vec<_>>>()?;
            let ret = self.resolve_type(&self.funcs[func].ret.clone())?;
            Ok((params, ret))
        })();

        self.self_type = outer_self;
        self.type_param_names = outer_params;

        result
    }

    // ----- scope

    fn lookup_local(&self, name: &str) -> Option<(usize, Type)> {
        self.scopes
            .iter()
            .rev()
            .find_map(|frame| frame.get(name).cloned())
    }

    fn bind_local(&mut self, name: &str, unique: usize, ty: Type) {
        self.scopes
            .last_mut()
            .expect("scope frame present")
            .insert(name.to_string(), (unique, ty));
    }

    // ----- expression checking

    fn check_expr(&mut self, expr: &Expr) -> LangResult<TypedExpr> {
        let site = expr.site;

        match &expr.kind {
            ExprKind::Int(i) => Ok(TypedExpr::new(
                TypedKind::LitInt(i.clone()),
                Type::plain(registry::INT),
                site,
            )),
            ExprKind::Bool(b) => Ok(TypedExpr::new(
                TypedKind::LitBool(*b),
                Type::plain(registry::BOOL),
                site,
            )),
            ExprKind::Str(s) => Ok(TypedExpr::new(
                TypedKind::LitStr(s.clone()),
                Type::plain(registry::STRING),
                site,
            )),
            ExprKind::Bytes(bs) => Ok(TypedExpr::new(
                TypedKind::LitBytes(bs.clone()),
                Type::plain(registry::BYTE_ARRAY),
                site,
            )),
            ExprKind::ListLit { item, items } => {
                let item_ty = self.resolve_concrete(item)?;

                let items = items
                    .iter()
                    .map(|e| {
                        let typed = self.check_expr(e)?;
                        self.expect_type(&typed, &item_ty, "list item")?;
                        Ok(typed)
                    })
                    .collect::<LangResult<Vec<_>>>()?;

                Ok(TypedExpr::new(
                    TypedKind::LitList(items),
                    Type::nominal(registry::LIST, vec![item_ty]),
                    site,
                ))
            }
            ExprKind::MapLit {
                key,
                value,
                entries,
            } => {
                let key_ty = self.resolve_concrete(key)?;
                let value_ty = self.resolve_concrete(value)?;

                let entries = entries
                    .iter()
                    .map(|(k, v)| {
                        let k = self.check_expr(k)?;
                        self.expect_type(&k, &key_ty, "map key")?;
                        let v = self.check_expr(v)?;
                        self.expect_type(&v, &value_ty, "map value")?;
                        Ok((k, v))
                    })
                    .collect::<LangResult<Vec<_>>>()?;

                Ok(TypedExpr::new(
                    TypedKind::LitMap(entries),
                    Type::nominal(registry::MAP, vec![key_ty, value_ty]),
                    site,
                ))
            }
            ExprKind::Name(name) => self.check_name(name, site),
            ExprKind::Path { ty, member } => self.check_path(ty, member, &[], site),
            ExprKind::TypeApply { head, args } => {
                let type_args = args
                    .iter()
                    .map(|t| self.resolve_concrete(t))
                    .collect::<LangResult<Vec<_>>>()?;

                match &head.kind {
                    ExprKind::Path { ty, member } => {
                        self.check_path(ty, member, &type_args, site)
                    }
                    ExprKind::Name(name) => {
                        let func = self.func_by_name.get(&name.text).copied().ok_or_else(|| {
                            LangError::reference(
                                name.site,
                                format!("undefined function '{}'", name.text),
                            )
                        })?;

                        let mono = self.mono_of(func, type_args, site)?;
                        Ok(self.mono_ref(mono, site))
                    }
                    _ => Err(LangError::type_error(
                        site,
                        "type arguments are only valid on functions and enum paths",
                    )),
                }
            }
            ExprKind::Unary { op, operand } => {
                let operand = self.check_expr(operand)?;

                let expected = match op {
                    UnaryOp::Not => Type::plain(registry::BOOL),
                    UnaryOp::Neg => Type::plain(registry::INT),
                };
                self.expect_type(&operand, &expected, "operand")?;

                Ok(TypedExpr::new(
                    TypedKind::Unary {
                        op: *op,
                        operand: Box::new(operand),
                    },
                    expected,
                    site,
                ))
            }
            ExprKind::Binary { op, left, right } => self.check_binary(*op, left, right, site),
            ExprKind::Call { head, args } => self.check_call(head, args, site),
            ExprKind::Member { object, name } => {
                let object = self.check_expr(object)?;
                self.check_member(object, name, site)
            }
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = self.check_expr(cond)?;
                self.expect_type(&cond, &Type::plain(registry::BOOL), "condition")?;

                let then_branch = self.check_expr(then_branch)?;
                let else_branch = self.check_expr(else_branch)?;

                if !then_branch.ty.equals(&else_branch.ty) {
                    return Err(LangError::type_error(
                        site,
                        format!(
                            "if branches disagree: {} vs {}",
                            then_branch.ty.show(&self.registry),
                            else_branch.ty.show(&self.registry)
                        ),
                    ));
                }

                let ty = then_branch.ty.normalized();

                Ok(TypedExpr::new(
                    TypedKind::If {
                        cond: Box::new(cond),
                        then_branch: Box::new(then_branch),
                        else_branch: Box::new(else_branch),
                    },
                    ty,
                    site,
                ))
            }
            ExprKind::Switch {
                scrutinee,
                arms,
                default,
            } => self.check_switch(scrutinee, arms, default.as_deref(), site),
            ExprKind::StructLit { ty, fields } => self.check_struct_lit(ty, fields, site),
            ExprKind::Lambda { params, ret, body } => {
                let mut frame = HashMap::new();
                let mut typed_params = Vec::with_capacity(params.len());

                for (name, ty) in params {
                    let ty = self.resolve_concrete(ty)?;
                    let unique = self.fresh();
                    frame.insert(name.text.clone(), (unique, ty.clone()));
                    typed_params.push((unique, name.text.clone(), ty));
                }

                let declared_ret = self.resolve_concrete(ret)?;

                self.scopes.push(frame);
                let body = self.check_expr(body);
                self.scopes.pop();
                let body = body?;

                self.expect_type(&body, &declared_ret, "lambda body")?;

                let ty = Type::func(
                    typed_params.iter().map(|(_, _, t)| t.clone()).collect(),
                    declared_ret,
                );

                Ok(TypedExpr::new(
                    TypedKind::Lambda {
                        params: typed_params,
                        body: Box::new(body),
                    },
                    ty,
                    site,
                ))
            }
            ExprKind::Block { stmts, result } => {
                self.scopes.push(HashMap::new());
                let out = self.check_block(stmts, result, site);
                self.scopes.pop();
                out
            }
        }
    }

    fn check_block(
        &mut self,
        stmts: &[BlockStmt],
        result: &Expr,
        site: Site,
    ) -> LangResult<TypedExpr> {
        let Some((first, rest)) = stmts.split_first() else {
            return self.check_expr(result);
        };

        match first {
            BlockStmt::Bind { name, ty, value } => {
                let value = self.check_expr(value)?;

                if let Some(ty) = ty {
                    let declared = self.resolve_concrete(ty)?;
                    self.expect_type(&value, &declared, "binding")?;
                }

                let unique = self.fresh();
                self.bind_local(&name.text, unique, value.ty.normalized());

                let body = self.check_block(rest, result, site)?;
                let ty = body.ty.clone();

                Ok(TypedExpr::new(
                    TypedKind::Let {
                        unique,
                        name: name.text.clone(),
                        value: Box::new(value),
                        body: Box::new(body),
                    },
                    ty,
                    site,
                ))
            }
            BlockStmt::Assert {
                cond,
                msg,
                site: stmt_site,
            } => {
                let cond = self.check_expr(cond)?;
                self.expect_type(&cond, &Type::plain(registry::BOOL), "assert condition")?;

                let msg = match msg {
                    Some(m) => {
                        let m = self.check_expr(m)?;
                        self.expect_type(&m, &Type::plain(registry::STRING), "assert message")?;
                        Some(Box::new(m))
                    }
                    None => None,
                };

                let body = self.check_block(rest, result, site)?;
                let ty = body.ty.clone();

                Ok(TypedExpr::new(
                    TypedKind::Assert {
                        cond: Box::new(cond),
                        msg,
                        body: Box::new(body),
                    },
                    ty,
                    *stmt_site,
                ))
            }
            BlockStmt::Print { value, site: stmt_site } => {
                let message = self.check_expr(value)?;
                self.expect_type(&message, &Type::plain(registry::STRING), "print argument")?;

                let body = self.check_block(rest, result, site)?;
                let ty = body.ty.clone();

                Ok(TypedExpr::new(
                    TypedKind::Print {
                        message: Box::new(message),
                        body: Box::new(body),
                    },
                    ty,
                    *stmt_site,
                ))
            }
        }
    }

    fn check_name(&mut self, name: &Name, site: Site) -> LangResult<TypedExpr> {
        if let Some((unique, ty)) = self.lookup_local(&name.text) {
            return Ok(TypedExpr::new(
                TypedKind::Var {
                    unique,
                    name: name.text.clone(),
                },
                ty,
                site,
            ));
        }

        if let Some(id) = self.const_by_name.get(&name.text).copied() {
            let (unique, ty) = self.const_global(id, site)?;
            return Ok(TypedExpr::new(
                TypedKind::Global {
                    unique,
                    name: name.text.clone(),
                },
                ty,
                site,
            ));
        }

        if let Some(func) = self.func_by_name.get(&name.text).copied() {
            if !self.funcs[func].type_params.is_empty() {
                return Err(LangError::type_error(
                    site,
                    format!(
                        "generic function '{}' needs explicit type arguments here",
                        name.text
                    ),
                ));
            }

            let mono = self.mono_of(func, vec![], site)?;
            return Ok(self.mono_ref(mono, site));
        }

        Err(LangError::reference(
            site,
            format!("undefined name '{}'", name.text),
        ))
    }

    /// `Type::member` in value position.
    fn check_path(
        &mut self,
        ty: &Name,
        member: &Name,
        type_args: &[Type],
        site: Site,
    ) -> LangResult<TypedExpr> {
        let decl = self.registry.lookup(&ty.text).ok_or_else(|| {
            LangError::reference(ty.site, format!("unknown type '{}'", ty.text))
        })?;

        if type_args.len() != self.registry.arity(decl) && !type_args.is_empty() {
            return Err(LangError::type_error(
                site,
                format!(
                    "type '{}' expects {} type argument(s), got {}",
                    ty.text,
                    self.registry.arity(decl),
                    type_args.len()
                ),
            ));
        }

        // statics on Value
        if decl == registry::VALUE {
            match member.text.as_str() {
                "ZERO" => {
                    return Ok(TypedExpr::new(
                        TypedKind::Static {
                            builtin: StaticBuiltin::ValueZero,
                            args: vec![],
                        },
                        Type::plain(registry::VALUE),
                        site,
                    ));
                }
                "lovelace" => {
                    return Err(LangError::type_error(
                        site,
                        "'Value::lovelace' must be called with an amount",
                    ));
                }
                _ => {}
            }
        }

        // a field-less enum variant is a complete value
        if let Some((index, variant)) = self.registry.variant_by_name(decl, &member.text) {
            if self.registry.arity(decl) != type_args.len() {
                return Err(LangError::type_error(
                    site,
                    format!(
                        "variant '{}::{}' needs type arguments",
                        ty.text, member.text
                    ),
                ));
            }

            if !variant.fields.is_empty() {
                return Err(LangError::type_error(
                    site,
                    format!(
                        "variant '{}::{}' has fields and must be constructed with arguments",
                        ty.text, member.text
                    ),
                ));
            }

            return Ok(TypedExpr::new(
                TypedKind::ConstructData {
                    tag: index as u64,
                    fields: vec![],
                },
                Type::nominal(decl, type_args.to_vec()),
                site,
            ));
        }

        if let Some(func) = self.statics.get(&(decl, member.text.clone())).copied() {
            let mono = self.mono_of(func, vec![], site)?;
            return Ok(self.mono_ref(mono, site));
        }

        let qualified = format!("{}::{}", ty.text, member.text);
        if let Some(id) = self.const_by_name.get(&qualified).copied() {
            let (unique, const_ty) = self.const_global(id, site)?;
            return Ok(TypedExpr::new(
                TypedKind::Global {
                    unique,
                    name: qualified,
                },
                const_ty,
                site,
            ));
        }

        if member.text == "from_data" {
            return Err(LangError::type_error(
                site,
                "'from_data' must be called with a Data argument",
            ));
        }

        Err(LangError::reference(
            site,
            format!("'{}' has no member '{}'", ty.text, member.text),
        ))
    }

    fn check_member(
        &mut self,
        object: TypedExpr,
        name: &Name,
        site: Site,
    ) -> LangResult<TypedExpr> {
        // narrowed enum value: the active variant's fields are visible
        if let Type::Narrowed {
            decl,
            args,
            variant,
        } = &object.ty
        {
            let variant_decl = self
                .registry
                .variant(*decl, *variant)
                .expect("narrowed to an existing variant");

            if let Some(index) = variant_decl
                .fields
                .iter()
                .position(|(n, _)| *n == name.text)
            {
                let field_ty = variant_decl.fields[index].1.substitute(args);

                return Ok(TypedExpr::new(
                    TypedKind::Field {
                        object: Box::new(object),
                        index,
                    },
                    field_ty,
                    site,
                ));
            }
        }

        // struct fields
        if let Type::Nominal { decl, args } = &object.ty.normalized() {
            if let Some(fields) = self.registry.fields(*decl, args) {
                if let Some(index) = fields.iter().position(|(n, _)| *n == name.text) {
                    let field_ty = fields[index].1.clone();

                    return Ok(TypedExpr::new(
                        TypedKind::Field {
                            object: Box::new(object),
                            index,
                        },
                        field_ty,
                        site,
                    ));
                }
            }
        }

        // builtin properties accessed without parentheses
        if let Some((member, params, ret)) =
            builtin_member(&self.registry, &object.ty, &name.text)
        {
            if is_property(member) && params.is_empty() {
                return Ok(TypedExpr::new(
                    TypedKind::Builtin {
                        member,
                        receiver: Box::new(object),
                        args: vec![],
                    },
                    ret,
                    site,
                ));
            }

            return Err(LangError::type_error(
                site,
                format!("member '{}' must be called", name.text),
            ));
        }

        Err(LangError::reference(
            site,
            format!(
                "{} has no member '{}'",
                object.ty.show(&self.registry),
                name.text
            ),
        ))
    }

    fn check_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        site: Site,
    ) -> LangResult<TypedExpr> {
        let left = self.check_expr(left)?;
        let right = self.check_expr(right)?;

        let int = Type::plain(registry::INT);
        let boolean = Type::plain(registry::BOOL);

        let ty = match op {
            BinaryOp::And | BinaryOp::Or => {
                self.expect_type(&left, &boolean, "operand")?;
                self.expect_type(&right, &boolean, "operand")?;
                boolean
            }
            BinaryOp::Eq | BinaryOp::Neq => {
                if !left.ty.equals(&right.ty) {
                    return Err(LangError::type_error(
                        site,
                        format!(
                            "cannot compare {} with {}",
                            left.ty.show(&self.registry),
                            right.ty.show(&self.registry)
                        ),
                    ));
                }
                if !left.ty.is_data() {
                    return Err(LangError::type_error(
                        site,
                        "only data values can be compared",
                    ));
                }
                boolean
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                self.expect_type(&left, &int, "operand")?;
                self.expect_type(&right, &int, "operand")?;
                boolean
            }
            BinaryOp::Add => {
                if !left.ty.equals(&right.ty) {
                    return Err(LangError::type_error(
                        site,
                        format!(
                            "cannot add {} and {}",
                            left.ty.show(&self.registry),
                            right.ty.show(&self.registry)
                        ),
                    ));
                }

                let ok = matches!(
                    left.ty.normalized(),
                    Type::Nominal { decl, .. } if matches!(
                        decl,
                        registry::INT
                            | registry::STRING
                            | registry::BYTE_ARRAY
                            | registry::LIST
                            | registry::VALUE
                    )
                );

                if !ok {
                    return Err(LangError::type_error(
                        site,
                        format!("'+' is not defined on {}", left.ty.show(&self.registry)),
                    ));
                }

                left.ty.normalized()
            }
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
                self.expect_type(&left, &int, "operand")?;
                self.expect_type(&right, &int, "operand")?;
                int
            }
        };

        Ok(TypedExpr::new(
            TypedKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            ty,
            site,
        ))
    }

    fn check_call(&mut self, head: &Expr, args: &[Expr], site: Site) -> LangResult<TypedExpr> {
        match &head.kind {
            // receiver.method(...) and builtin member calls
            ExprKind::Member { object, name } => {
                let object = self.check_expr(object)?;
                self.check_member_call(object, name, args, site)
            }
            // Type::member(...)
            ExprKind::Path { ty, member } => self.check_path_call(ty, member, &[], args, site),
            ExprKind::TypeApply { head: inner, args: ty_args } => {
                let type_args = ty_args
                    .iter()
                    .map(|t| self.resolve_concrete(t))
                    .collect::<LangResult<Vec<_>>>()?;

                match &inner.kind {
                    ExprKind::Path { ty, member } => {
                        self.check_path_call(ty, member, &type_args, args, site)
                    }
                    ExprKind::Name(name) => {
                        let func = self.func_by_name.get(&name.text).copied().ok_or_else(|| {
                            LangError::reference(
                                name.site,
                                format!("undefined function '{}'", name.text),
                            )
                        })?;

                        let mono = self.mono_of(func, type_args, site)?;
                        let head = self.mono_ref(mono, site);
                        self.check_plain_call(head, args, site)
                    }
                    _ => Err(LangError::type_error(
                        site,
                        "type arguments are only valid on functions and enum paths",
                    )),
                }
            }
            // a generic function called with inferred type arguments
            ExprKind::Name(name)
                if self.lookup_local(&name.text).is_none()
                    && self
                        .func_by_name
                        .get(&name.text)
                        .map(|f| !self.funcs[*f].type_params.is_empty())
                        .unwrap_or(false) =>
            {
                let func = self.func_by_name[&name.text];

                let typed_args = args
                    .iter()
                    .map(|a| self.check_expr(a))
                    .collect::<LangResult<Vec<_>>>()?;

                let (raw_params, _) = self.raw_signature(func)?;

                if raw_params.len() != typed_args.len() {
                    return Err(LangError::type_error(
                        site,
                        format!(
                            "function '{}' expects {} argument(s), got {}",
                            name.text,
                            raw_params.len(),
                            typed_args.len()
                        ),
                    ));
                }

                let n_params = self.funcs[func].type_params.len();
                let mut inferred: Vec<Option<Type>> = vec![None; n_params];

                for (pattern, arg) in raw_params.iter().zip(&typed_args) {
                    unify(pattern, &arg.ty.normalized(), &mut inferred);
                }

                let inferred = inferred
                    .into_iter()
                    .enumerate()
                    .map(|(i, t)| {
                        t.ok_or_else(|| {
                            LangError::type_error(
                                site,
                                format!(
                                    "cannot infer type parameter '{}' of '{}'",
                                    self.funcs[func].type_params[i], name.text
                                ),
                            )
                        })
                    })
                    .collect::<LangResult<Vec<_>>>()?;

                let mono = self.mono_of(func, inferred, site)?;
                let head = self.mono_ref(mono, site);
                self.finish_call(head, typed_args, site)
            }
            _ => {
                let head = self.check_expr(head)?;
                self.check_plain_call(head, args, site)
            }
        }
    }

    fn check_plain_call(
        &mut self,
        head: TypedExpr,
        args: &[Expr],
        site: Site,
    ) -> LangResult<TypedExpr> {
        let typed_args = args
            .iter()
            .map(|a| self.check_expr(a))
            .collect::<LangResult<Vec<_>>>()?;

        self.finish_call(head, typed_args, site)
    }

    fn finish_call(
        &mut self,
        head: TypedExpr,
        args: Vec<TypedExpr>,
        site: Site,
    ) -> LangResult<TypedExpr> {
        let Type::Func { params, ret } = head.ty.clone() else {
            return Err(LangError::type_error(
                site,
                format!("{} is not callable", head.ty.show(&self.registry)),
            ));
        };

        if params.len() != args.len() {
            return Err(LangError::type_error(
                site,
                format!("expected {} argument(s), got {}", params.len(), args.len()),
            ));
        }

        for (param, arg) in params.iter().zip(&args) {
            self.expect_type(arg, param, "argument")?;
        }

        Ok(TypedExpr::new(
            TypedKind::Call {
                head: Box::new(head),
                args,
            },
            *ret,
            site,
        ))
    }

    fn check_member_call(
        &mut self,
        object: TypedExpr,
        name: &Name,
        args: &[Expr],
        site: Site,
    ) -> LangResult<TypedExpr> {
        // user methods
        if let Type::Nominal { decl, .. } = object.ty.normalized() {
            if let Some(func) = self.methods.get(&(decl, name.text.clone())).copied() {
                let mono = self.mono_of(func, vec![], site)?;
                let head = self.mono_ref(mono, site);

                let mut typed_args = vec![object];
                for arg in args {
                    typed_args.push(self.check_expr(arg)?);
                }

                return self.finish_call(head, typed_args, site);
            }
        }

        // higher-order builtins infer their result from the callback
        if let Some(member) = builtin_higher_order(&object.ty, &name.text) {
            return self.check_higher_order(object, member, args, site);
        }

        // fixed-signature builtins
        if let Some((member, params, ret)) = builtin_member(&self.registry, &object.ty, &name.text)
        {
            if params.len() != args.len() {
                return Err(LangError::type_error(
                    site,
                    format!(
                        "member '{}' expects {} argument(s), got {}",
                        name.text,
                        params.len(),
                        args.len()
                    ),
                ));
            }

            let typed_args = args
                .iter()
                .zip(&params)
                .map(|(arg, param)| {
                    let typed = self.check_expr(arg)?;
                    self.expect_type(&typed, param, "argument")?;
                    Ok(typed)
                })
                .collect::<LangResult<Vec<_>>>()?;

            return Ok(TypedExpr::new(
                TypedKind::Builtin {
                    member,
                    receiver: Box::new(object),
                    args: typed_args,
                },
                ret,
                site,
            ));
        }

        // a struct field holding a function value
        let fallback = self.check_member(object, name, site)?;
        if matches!(fallback.ty, Type::Func { .. }) {
            return self.check_plain_call(fallback, args, site);
        }

        Err(LangError::type_error(
            site,
            format!("member '{}' is not callable", name.text),
        ))
    }

    fn check_higher_order(
        &mut self,
        object: TypedExpr,
        member: BuiltinMember,
        args: &[Expr],
        site: Site,
    ) -> LangResult<TypedExpr> {
        use BuiltinMember::*;

        let boolean = Type::plain(registry::BOOL);

        let (decl, type_args) = match object.ty.normalized() {
            Type::Nominal { decl, args } => (decl, args),
            _ => unreachable!("higher-order members only resolve on nominal receivers"),
        };
        let _ = decl;

        let expect_args = |n: usize| -> LangResult<()> {
            if args.len() != n {
                Err(LangError::type_error(
                    site,
                    format!("expected {} argument(s), got {}", n, args.len()),
                ))
            } else {
                Ok(())
            }
        };

        match member {
            ListMap => {
                expect_args(1)?;
                let item = type_args[0].clone();
                let f = self.check_expr(&args[0])?;

                let Type::Func { params, ret } = f.ty.clone() else {
                    return Err(LangError::type_error(f.site, "expected a function"));
                };

                if params.len() != 1 || !params[0].equals(&item) {
                    return Err(LangError::type_error(
                        f.site,
                        "map callback must take one list item",
                    ));
                }

                let result = Type::nominal(registry::LIST, vec![(*ret).clone()]);
                Ok(TypedExpr::new(
                    TypedKind::Builtin {
                        member,
                        receiver: Box::new(object),
                        args: vec![f],
                    },
                    result,
                    site,
                ))
            }
            ListFilter => {
                expect_args(1)?;
                let item = type_args[0].clone();
                let f = self.check_expr(&args[0])?;

                self.expect_type_raw(
                    &f.ty,
                    &Type::func(vec![item], boolean),
                    f.site,
                    "filter callback",
                )?;

                let result = object.ty.normalized();
                Ok(TypedExpr::new(
                    TypedKind::Builtin {
                        member,
                        receiver: Box::new(object),
                        args: vec![f],
                    },
                    result,
                    site,
                ))
            }
            ListFold => {
                expect_args(2)?;
                let item = type_args[0].clone();

                let zero = self.check_expr(&args[1])?;
                let acc = zero.ty.normalized();

                let f = self.check_expr(&args[0])?;
                self.expect_type_raw(
                    &f.ty,
                    &Type::func(vec![acc.clone(), item], acc.clone()),
                    f.site,
                    "fold callback",
                )?;

                Ok(TypedExpr::new(
                    TypedKind::Builtin {
                        member,
                        receiver: Box::new(object),
                        args: vec![f, zero],
                    },
                    acc,
                    site,
                ))
            }
            MapMap => {
                expect_args(1)?;
                let key = type_args[0].clone();
                let value = type_args[1].clone();
                let f = self.check_expr(&args[0])?;

                let Type::Func { params, ret } = f.ty.clone() else {
                    return Err(LangError::type_error(f.site, "expected a function"));
                };

                if params.len() != 1 || !params[0].equals(&value) {
                    return Err(LangError::type_error(
                        f.site,
                        "map callback must take one map value",
                    ));
                }

                let result = Type::nominal(registry::MAP, vec![key, (*ret).clone()]);
                Ok(TypedExpr::new(
                    TypedKind::Builtin {
                        member,
                        receiver: Box::new(object),
                        args: vec![f],
                    },
                    result,
                    site,
                ))
            }
            MapFilter => {
                expect_args(1)?;
                let key = type_args[0].clone();
                let value = type_args[1].clone();
                let f = self.check_expr(&args[0])?;

                self.expect_type_raw(
                    &f.ty,
                    &Type::func(vec![key, value], boolean),
                    f.site,
                    "filter callback",
                )?;

                let result = object.ty.normalized();
                Ok(TypedExpr::new(
                    TypedKind::Builtin {
                        member,
                        receiver: Box::new(object),
                        args: vec![f],
                    },
                    result,
                    site,
                ))
            }
            MapFold => {
                expect_args(2)?;
                let key = type_args[0].clone();
                let value = type_args[1].clone();

                let zero = self.check_expr(&args[1])?;
                let acc = zero.ty.normalized();

                let f = self.check_expr(&args[0])?;
                self.expect_type_raw(
                    &f.ty,
                    &Type::func(vec![acc.clone(), key, value], acc.clone()),
                    f.site,
                    "fold callback",
                )?;

                Ok(TypedExpr::new(
                    TypedKind::Builtin {
                        member,
                        receiver: Box::new(object),
                        args: vec![f, zero],
                    },
                    acc,
                    site,
                ))
            }
            _ => unreachable!("not a higher-order member"),
        }
    }

    fn check_path_call(
        &mut self,
        ty: &Name,
        member: &Name,
        type_args: &[Type],
        args: &[Expr],
        site: Site,
    ) -> LangResult<TypedExpr> {
        let decl = self.registry.lookup(&ty.text).ok_or_else(|| {
            LangError::reference(ty.site, format!("unknown type '{}'", ty.text))
        })?;

        // Value::lovelace(n)
        if decl == registry::VALUE && member.text == "lovelace" {
            if args.len() != 1 {
                return Err(LangError::type_error(
                    site,
                    "'Value::lovelace' takes one Int amount",
                ));
            }

            let amount = self.check_expr(&args[0])?;
            self.expect_type(&amount, &Type::plain(registry::INT), "amount")?;

            return Ok(TypedExpr::new(
                TypedKind::Static {
                    builtin: StaticBuiltin::ValueLovelace,
                    args: vec![amount],
                },
                Type::plain(registry::VALUE),
                site,
            ));
        }

        // T::from_data(d)
        if member.text == "from_data" {
            if args.len() != 1 {
                return Err(LangError::type_error(
                    site,
                    "'from_data' takes one Data argument",
                ));
            }

            let target = if type_args.is_empty() {
                Type::plain(decl)
            } else {
                Type::nominal(decl, type_args.to_vec())
            };

            if self.registry.arity(decl) != type_args.len() {
                return Err(LangError::type_error(
                    site,
                    format!("'{}::from_data' needs type arguments", ty.text),
                ));
            }

            let arg = self.check_expr(&args[0])?;
            self.expect_type(&arg, &Type::plain(registry::DATA), "argument")?;

            return Ok(TypedExpr::new(TypedKind::Cast(Box::new(arg)), target, site));
        }

        // enum variant constructor with fields
        if let Some((index, variant)) = self.registry.variant_by_name(decl, &member.text) {
            if self.registry.arity(decl) != type_args.len() {
                return Err(LangError::type_error(
                    site,
                    format!(
                        "variant '{}::{}' needs type arguments",
                        ty.text, member.text
                    ),
                ));
            }

            let field_types: Vec<Type> = variant
                .fields
                .iter()
                .map(|(_, t)| t.substitute(type_args))
                .collect();

            if field_types.len() != args.len() {
                return Err(LangError::type_error(
                    site,
                    format!(
                        "variant '{}::{}' has {} field(s), got {}",
                        ty.text,
                        member.text,
                        field_types.len(),
                        args.len()
                    ),
                ));
            }

            let fields = args
                .iter()
                .zip(&field_types)
                .map(|(arg, expected)| {
                    let typed = self.check_expr(arg)?;
                    self.expect_type(&typed, expected, "variant field")?;
                    Ok(typed)
                })
                .collect::<LangResult<Vec<_>>>()?;

            return Ok(TypedExpr::new(
                TypedKind::ConstructData {
                    tag: index as u64,
                    fields,
                },
                Type::nominal(decl, type_args.to_vec()),
                site,
            ));
        }

        // static impl functions and associated constants
        let head = self.check_path(ty, member, type_args, site)?;
        self.check_plain_call(head, args, site)
    }

    fn check_switch(
        &mut self,
        scrutinee: &Expr,
        arms: &[crate::ast::SwitchArm],
        default: Option<&Expr>,
        site: Site,
    ) -> LangResult<TypedExpr> {
        let scrutinee = self.check_expr(scrutinee)?;

        let (decl, type_args) = match scrutinee.ty.normalized() {
            Type::Nominal { decl, args } if self.registry.variants(decl).is_some() => (decl, args),
            other => {
                return Err(LangError::type_error(
                    site,
                    format!("cannot switch over {}", other.show(&self.registry)),
                ));
            }
        };

        let variant_count = self.registry.variants(decl).expect("checked above").len();
        let mut covered = HashSet::new();
        let mut typed_arms = Vec::with_capacity(arms.len());
        let mut result_ty: Option<Type> = None;

        let mut unify_result = |this: &Self, body: &TypedExpr| -> LangResult<()> {
            match &result_ty {
                None => {
                    result_ty = Some(body.ty.normalized());
                    Ok(())
                }
                Some(expected) if body.ty.equals(expected) => Ok(()),
                Some(expected) => Err(LangError::type_error(
                    body.site,
                    format!(
                        "switch arms disagree: {} vs {}",
                        expected.show(&this.registry),
                        body.ty.show(&this.registry)
                    ),
                )),
            }
        };

        for arm in arms {
            let (index, _) = self
                .registry
                .variant_by_name(decl, &arm.variant.text)
                .ok_or_else(|| {
                    LangError::type_error(
                        arm.variant.site,
                        format!(
                            "{} has no variant '{}'",
                            self.registry.name(decl),
                            arm.variant.text
                        ),
                    )
                })?;

            if !covered.insert(index) {
                return Err(LangError::type_error(
                    arm.variant.site,
                    format!("duplicate arm for variant '{}'", arm.variant.text),
                ));
            }

            let binder = match &arm.binder {
                Some(name) => {
                    let unique = self.fresh();
                    let narrowed = Type::Narrowed {
                        decl,
                        args: type_args.clone(),
                        variant: index,
                    };

                    let mut frame = HashMap::new();
                    frame.insert(name.text.clone(), (unique, narrowed));
                    self.scopes.push(frame);

                    Some((unique, name.text.clone()))
                }
                None => None,
            };

            let body = self.check_expr(&arm.body);

            if binder.is_some() {
                self.scopes.pop();
            }

            let body = body?;
            unify_result(self, &body)?;

            typed_arms.push(TypedArm {
                tag: index as u64,
                binder,
                body,
            });
        }

        let default = match default {
            Some(expr) => {
                let body = self.check_expr(expr)?;
                unify_result(self, &body)?;
                Some(Box::new(body))
            }
            None => None,
        };

        if default.is_none() && covered.len() != variant_count {
            return Err(LangError::type_error(
                site,
                format!(
                    "switch covers {} of {} variants and has no else arm",
                    covered.len(),
                    variant_count
                ),
            ));
        }

        let ty = result_ty.expect("at least one arm or default");

        Ok(TypedExpr::new(
            TypedKind::Switch {
                scrutinee: Box::new(scrutinee),
                arms: typed_arms,
                default,
            },
            ty,
            site,
        ))
    }

    fn check_struct_lit(
        &mut self,
        ty: &Name,
        fields: &[(Option<Name>, Expr)],
        site: Site,
    ) -> LangResult<TypedExpr> {
        let decl = self.registry.lookup(&ty.text).ok_or_else(|| {
            LangError::reference(ty.site, format!("unknown type '{}'", ty.text))
        })?;

        let declared = self.registry.fields(decl, &[]).ok_or_else(|| {
            LangError::type_error(
                ty.site,
                format!("'{}' is not a struct", ty.text),
            )
        })?;

        if fields.len() != declared.len() {
            return Err(LangError::type_error(
                site,
                format!(
                    "'{}' has {} field(s), got {}",
                    ty.text,
                    declared.len(),
                    fields.len()
                ),
            ));
        }

        let named = fields.iter().all(|(n, _)| n.is_some());
        let positional = fields.iter().all(|(n, _)| n.is_none());

        if !named && !positional {
            return Err(LangError::type_error(
                site,
                "struct fields must be all named or all positional",
            ));
        }

        let mut ordered: Vec<Option<TypedExpr>> = (0..declared.len()).map(|_| None).collect();

        for (i, (name, value)) in fields.iter().enumerate() {
            let index = match name {
                Some(name) => declared
                    .iter()
                    .position(|(n, _)| *n == name.text)
                    .ok_or_else(|| {
                        LangError::type_error(
                            name.site,
                            format!("'{}' has no field '{}'", ty.text, name.text),
                        )
                    })?,
                None => i,
            };

            if ordered[index].is_some() {
                return Err(LangError::type_error(
                    site,
                    format!("field '{}' given twice", declared[index].0),
                ));
            }

            let typed = self.check_expr(value)?;
            self.expect_type(&typed, &declared[index].1, "struct field")?;
            ordered[index] = Some(typed);
        }

        Ok(TypedExpr::new(
            TypedKind::ConstructData {
                tag: 0,
                fields: ordered.into_iter().map(|f| f.expect("all filled")).collect(),
            },
            Type::plain(decl),
            site,
        ))
    }

    // ----- helpers

    fn expect_type(&self, expr: &TypedExpr, expected: &Type, what: &str) -> LangResult<()> {
        self.expect_type_raw(&expr.ty, expected, expr.site, what)
    }

    fn expect_type_raw(
        &self,
        actual: &Type,
        expected: &Type,
        site: Site,
        what: &str,
    ) -> LangResult<()> {
        if actual.equals(expected) {
            Ok(())
        } else {
            Err(LangError::type_error(
                site,
                format!(
                    "{what} has type {}, expected {}",
                    actual.show(&self.registry),
                    expected.show(&self.registry)
                ),
            ))
        }
    }

    // ----- purpose

    fn check_purpose(&self, purpose: Purpose, main: MonoId, site: Site) -> LangResult<()> {
        let mono = &self.monos[main];
        let boolean = Type::plain(registry::BOOL);
        let ctx = Type::plain(registry::SCRIPT_CONTEXT);

        let expect = |cond: bool, message: &str| -> LangResult<()> {
            if cond {
                Ok(())
            } else {
                Err(LangError::type_error(site, message.to_string()))
            }
        };

        match purpose {
            Purpose::Testing => {
                for (_, name, ty) in &mono.params {
                    if !ty.is_data() {
                        return Err(LangError::type_error(
                            site,
                            format!("testing parameter '{name}' must be a data type"),
                        ));
                    }
                }
                expect(mono.ret.is_data(), "testing 'main' must return a data type")
            }
            Purpose::Spending => {
                expect(
                    mono.params.len() == 3,
                    "spending 'main' takes (datum, redeemer, ctx)",
                )?;
                expect(
                    mono.params[2].2.equals(&ctx),
                    "third spending parameter must be ScriptContext",
                )?;
                expect(mono.ret.equals(&boolean), "spending 'main' must return Bool")
            }
            Purpose::Minting => {
                expect(
                    mono.params.len() == 2,
                    "minting 'main' takes (redeemer, ctx)",
                )?;
                expect(
                    mono.params[1].2.equals(&ctx),
                    "second minting parameter must be ScriptContext",
                )?;
                expect(mono.ret.equals(&boolean), "minting 'main' must return Bool")
            }
            Purpose::Staking => {
                expect(mono.params.len() == 1, "staking 'main' takes (ctx)")?;
                expect(
                    mono.params[0].2.equals(&ctx),
                    "staking parameter must be ScriptContext",
                )?;
                expect(mono.ret.equals(&boolean), "staking 'main' must return Bool")
            }
            Purpose::Module => Ok(()),
        }
    }
}

/// First-occurrence structural unification of a parameter pattern
/// against a concrete argument type.
fn unify(pattern: &Type, concrete: &Type, out: &mut Vec<Option<Type>>) {
    match (pattern, concrete) {
        (Type::Param(i), _) => {
            if out.get(*i).map(|t| t.is_none()).unwrap_or(false) {
                out[*i] = Some(concrete.clone());
            }
        }
        (
            Type::Nominal { decl: a, args: xs },
            Type::Nominal { decl: b, args: ys },
        ) if a == b && xs.len() == ys.len() => {
            for (x, y) in xs.iter().zip(ys) {
                unify(x, y, out);
            }
        }
        (
            Type::Func {
                params: xs,
                ret: xr,
            },
            Type::Func {
                params: ys,
                ret: yr,
            },
        ) if xs.len() == ys.len() => {
            for (x, y) in xs.iter().zip(ys) {
                unify(x, y, out);
            }
            unify(xr, yr, out);
        }
        _ => {}
    }
}

fn flatten_imports(script: &Script, modules: &[Script]) -> LangResult<Vec<Statement>> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();

    collect_statements(script, modules, &mut out, &mut seen)?;

    Ok(out)
}

fn collect_statements(
    script: &Script,
    modules: &[Script],
    out: &mut Vec<Statement>,
    seen: &mut HashSet<String>,
) -> LangResult<()> {
    for statement in &script.statements {
        if let Statement::Import(import) = statement {
            if !seen.insert(import.module.text.clone()) {
                continue;
            }

            let module = modules
                .iter()
                .find(|m| m.name.text == import.module.text)
                .ok_or_else(|| {
                    LangError::reference(
                        import.site,
                        format!("unknown module '{}'", import.module.text),
                    )
                })?;

            if module.purpose != Purpose::Module {
                return Err(LangError::type_error(
                    import.site,
                    format!("'{}' is not a module", import.module.text),
                ));
            }

            collect_statements(module, modules, out, seen)?;
        }
    }

    for statement in &script.statements {
        if !matches!(statement, Statement::Import(_)) {
            out.push(statement.clone());
        }
    }

    Ok(())
}
