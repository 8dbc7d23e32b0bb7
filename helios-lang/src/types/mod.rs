//! Nominal types with parametric type arguments, the declaration
//! registry, and the member surface of builtin types.

pub mod check;
pub(crate) mod registry;

pub use registry::*;

/// Index into the type registry.
pub type DeclId = usize;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// Reference to a declaration plus concrete type arguments.
    Nominal { decl: DeclId, args: Vec<Type> },
    /// First-class function values.
    Func { params: Vec<Type>, ret: Box<Type> },
    /// A type parameter of the enclosing generic declaration, by index.
    Param(usize),
    /// An enum value narrowed to one variant inside a switch arm.
    Narrowed {
        decl: DeclId,
        args: Vec<Type>,
        variant: usize,
    },
}

impl Type {
    pub fn nominal(decl: DeclId, args: Vec<Type>) -> Type {
        Type::Nominal { decl, args }
    }

    pub fn plain(decl: DeclId) -> Type {
        Type::Nominal { decl, args: vec![] }
    }

    pub fn func(params: Vec<Type>, ret: Type) -> Type {
        Type::Func {
            params,
            ret: Box::new(ret),
        }
    }

    /// Narrowing is forgotten when types are compared.
    pub fn normalized(&self) -> Type {
        match self {
            Type::Narrowed { decl, args, .. } => Type::Nominal {
                decl: *decl,
                args: args.clone(),
            },
            other => other.clone(),
        }
    }

    pub fn equals(&self, other: &Type) -> bool {
        self.normalized() == other.normalized()
    }

    /// Substitutes `Param(i)` with `args[i]`, recursively.
    pub fn substitute(&self, args: &[Type]) -> Type {
        match self {
            Type::Param(i) => args.get(*i).cloned().unwrap_or_else(|| self.clone()),
            Type::Nominal { decl, args: inner } => Type::Nominal {
                decl: *decl,
                args: inner.iter().map(|t| t.substitute(args)).collect(),
            },
            Type::Narrowed {
                decl,
                args: inner,
                variant,
            } => Type::Narrowed {
                decl: *decl,
                args: inner.iter().map(|t| t.substitute(args)).collect(),
                variant: *variant,
            },
            Type::Func { params, ret } => Type::Func {
                params: params.iter().map(|t| t.substitute(args)).collect(),
                ret: Box::new(ret.substitute(args)),
            },
        }
    }

    /// Whether values of this type have a `Data` runtime encoding.
    /// Function values do not cross the data boundary.
    pub fn is_data(&self) -> bool {
        match self {
            Type::Func { .. } => false,
            Type::Param(_) => true,
            Type::Nominal { args, .. } | Type::Narrowed { args, .. } => {
                args.iter().all(Type::is_data)
            }
        }
    }

    pub fn show(&self, registry: &TypeRegistry) -> String {
        match self {
            Type::Param(i) => format!("?{i}"),
            Type::Func { params, ret } => {
                let params: Vec<String> = params.iter().map(|t| t.show(registry)).collect();
                format!("({}) -> {}", params.join(", "), ret.show(registry))
            }
            Type::Narrowed { decl, args, variant } => {
                let base = Type::Nominal {
                    decl: *decl,
                    args: args.clone(),
                }
                .show(registry);
                let variant = registry
                    .variant(*decl, *variant)
                    .map(|v| v.name.clone())
                    .unwrap_or_default();
                format!("{base}::{variant}")
            }
            Type::Nominal { decl, args } => {
                let name = registry.name(*decl);

                match (*decl, args.as_slice()) {
                    (registry::LIST, [item]) => format!("[]{}", item.show(registry)),
                    (registry::MAP, [k, v]) => {
                        format!("Map[{}]{}", k.show(registry), v.show(registry))
                    }
                    (_, []) => name.to_string(),
                    (_, args) => {
                        let args: Vec<String> = args.iter().map(|t| t.show(registry)).collect();
                        format!("{name}[{}]", args.join(", "))
                    }
                }
            }
        }
    }
}
