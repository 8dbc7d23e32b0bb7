use std::collections::HashMap;

use super::{DeclId, Type};

// Builtin declarations occupy fixed registry slots.
pub const INT: DeclId = 0;
pub const BOOL: DeclId = 1;
pub const STRING: DeclId = 2;
pub const BYTE_ARRAY: DeclId = 3;
pub const DATA: DeclId = 4;
pub const LIST: DeclId = 5;
pub const MAP: DeclId = 6;
pub const OPTION: DeclId = 7;
pub const VALUE: DeclId = 8;
pub const CREDENTIAL: DeclId = 9;
pub const ADDRESS: DeclId = 10;
pub const TX_ID: DeclId = 11;
pub const DATUM_HASH: DeclId = 12;
pub const TX_OUTPUT_ID: DeclId = 13;
pub const TX_OUTPUT: DeclId = 14;
pub const TX_INPUT: DeclId = 15;
pub const TX: DeclId = 16;
pub const SCRIPT_PURPOSE: DeclId = 17;
pub const SCRIPT_CONTEXT: DeclId = 18;

#[derive(Debug, Clone)]
pub struct VariantDecl {
    pub name: String,
    pub fields: Vec<(String, Type)>,
}

#[derive(Debug, Clone)]
pub enum DeclKind {
    /// Int, Bool, String, ByteArray, Data and the opaque Value
    Opaque,
    /// Struct-shaped: a single constructor with named fields. Field
    /// types may reference `Type::Param`.
    Struct { fields: Vec<(String, Type)> },
    /// Tagged union; variant order fixes the constructor tags.
    Enum { variants: Vec<VariantDecl> },
}

#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub name: String,
    pub arity: usize,
    pub kind: DeclKind,
}

/// All type declarations known to one compile: the closed builtin set
/// plus user structs and enums, appended in declaration order.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    decls: Vec<TypeDecl>,
    by_name: HashMap<String, DeclId>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        let mut registry = TypeRegistry {
            decls: vec![],
            by_name: HashMap::new(),
        };

        let opaque = |name: &str| TypeDecl {
            name: name.to_string(),
            arity: 0,
            kind: DeclKind::Opaque,
        };

        let strukt = |name: &str, arity: usize, fields: Vec<(&str, Type)>| TypeDecl {
            name: name.to_string(),
            arity,
            kind: DeclKind::Struct {
                fields: fields
                    .into_iter()
                    .map(|(n, t)| (n.to_string(), t))
                    .collect(),
            },
        };

        // order must match the DeclId constants above
        registry.push(opaque("Int"));
        registry.push(opaque("Bool"));
        registry.push(opaque("String"));
        registry.push(opaque("ByteArray"));
        registry.push(opaque("Data"));

        registry.push(TypeDecl {
            name: "List".to_string(),
            arity: 1,
            kind: DeclKind::Opaque,
        });
        registry.push(TypeDecl {
            name: "Map".to_string(),
            arity: 2,
            kind: DeclKind::Opaque,
        });

        registry.push(TypeDecl {
            name: "Option".to_string(),
            arity: 1,
            kind: DeclKind::Enum {
                variants: vec![
                    VariantDecl {
                        name: "Some".to_string(),
                        fields: vec![("some".to_string(), Type::Param(0))],
                    },
                    VariantDecl {
                        name: "None".to_string(),
                        fields: vec![],
                    },
                ],
            },
        });

        registry.push(opaque("Value"));

        registry.push(TypeDecl {
            name: "Credential".to_string(),
            arity: 0,
            kind: DeclKind::Enum {
                variants: vec![
                    VariantDecl {
                        name: "PubKey".to_string(),
                        fields: vec![("hash".to_string(), Type::plain(BYTE_ARRAY))],
                    },
                    VariantDecl {
                        name: "Validator".to_string(),
                        fields: vec![("hash".to_string(), Type::plain(BYTE_ARRAY))],
                    },
                ],
            },
        });

        registry.push(strukt(
            "Address",
            0,
            vec![("credential", Type::plain(CREDENTIAL))],
        ));
        registry.push(strukt("TxId", 0, vec![("bytes", Type::plain(BYTE_ARRAY))]));
        registry.push(strukt(
            "DatumHash",
            0,
            vec![("bytes", Type::plain(BYTE_ARRAY))],
        ));
        registry.push(strukt(
            "TxOutputId",
            0,
            vec![("tx_id", Type::plain(TX_ID)), ("index", Type::plain(INT))],
        ));
        registry.push(strukt(
            "TxOutput",
            0,
            vec![
                ("address", Type::plain(ADDRESS)),
                ("value", Type::plain(VALUE)),
                (
                    "datum_hash",
                    Type::nominal(OPTION, vec![Type::plain(DATUM_HASH)]),
                ),
            ],
        ));
        registry.push(strukt(
            "TxInput",
            0,
            vec![
                ("output_id", Type::plain(TX_OUTPUT_ID)),
                ("output", Type::plain(TX_OUTPUT)),
            ],
        ));
        registry.push(strukt(
            "Tx",
            0,
            vec![
                ("inputs", Type::nominal(LIST, vec![Type::plain(TX_INPUT)])),
                ("outputs", Type::nominal(LIST, vec![Type::plain(TX_OUTPUT)])),
                ("fee", Type::plain(VALUE)),
                ("minted", Type::plain(VALUE)),
            ],
        ));

        // variant order fixes constructor tags on chain
        registry.push(TypeDecl {
            name: "ScriptPurpose".to_string(),
            arity: 0,
            kind: DeclKind::Enum {
                variants: vec![
                    VariantDecl {
                        name: "Minting".to_string(),
                        fields: vec![("policy_hash".to_string(), Type::plain(BYTE_ARRAY))],
                    },
                    VariantDecl {
                        name: "Spending".to_string(),
                        fields: vec![("output_id".to_string(), Type::plain(TX_OUTPUT_ID))],
                    },
                    VariantDecl {
                        name: "Rewarding".to_string(),
                        fields: vec![],
                    },
                    VariantDecl {
                        name: "Certifying".to_string(),
                        fields: vec![],
                    },
                ],
            },
        });

        registry.push(strukt(
            "ScriptContext",
            0,
            vec![
                ("tx", Type::plain(TX)),
                ("purpose", Type::plain(SCRIPT_PURPOSE)),
            ],
        ));

        registry
    }

    fn push(&mut self, decl: TypeDecl) -> DeclId {
        let id = self.decls.len();
        self.by_name.insert(decl.name.clone(), id);
        self.decls.push(decl);
        id
    }

    /// Registers a user struct or enum. Redefinition of an existing
    /// name is reported by the caller.
    pub fn register(&mut self, decl: TypeDecl) -> Option<DeclId> {
        if self.by_name.contains_key(&decl.name) {
            return None;
        }

        Some(self.push(decl))
    }

    /// Replaces a placeholder declaration once its fields are resolved.
    pub fn fill(&mut self, id: DeclId, kind: DeclKind) {
        self.decls[id].kind = kind;
    }

    pub fn lookup(&self, name: &str) -> Option<DeclId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: DeclId) -> &TypeDecl {
        &self.decls[id]
    }

    pub fn name(&self, id: DeclId) -> &str {
        &self.decls[id].name
    }

    pub fn arity(&self, id: DeclId) -> usize {
        self.decls[id].arity
    }

    /// Struct fields (or variant-less field list) with type arguments
    /// substituted in.
    pub fn fields(&self, id: DeclId, args: &[Type]) -> Option<Vec<(String, Type)>> {
        match &self.decls[id].kind {
            DeclKind::Struct { fields } => Some(
                fields
                    .iter()
                    .map(|(n, t)| (n.clone(), t.substitute(args)))
                    .collect(),
            ),
            _ => None,
        }
    }

    pub fn variants(&self, id: DeclId) -> Option<&[VariantDecl]> {
        match &self.decls[id].kind {
            DeclKind::Enum { variants } => Some(variants),
            _ => None,
        }
    }

    pub fn variant(&self, id: DeclId, index: usize) -> Option<&VariantDecl> {
        self.variants(id).and_then(|vs| vs.get(index))
    }

    pub fn variant_by_name(&self, id: DeclId, name: &str) -> Option<(usize, &VariantDecl)> {
        self.variants(id)?
            .iter()
            .enumerate()
            .find(|(_, v)| v.name == name)
    }
}

/// Structural members synthesised by the compiler on builtin types.
/// Each lowers to a fixed IR shape in the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinMember {
    // any data value
    Serialize,
    // List
    ListLength,
    ListIsEmpty,
    ListHead,
    ListTail,
    ListGet,
    ListPrepend,
    ListMap,
    ListFilter,
    ListFold,
    ListAny,
    ListAll,
    // Map
    MapLength,
    MapIsEmpty,
    MapGet,
    MapGetSafe,
    MapSet,
    MapDelete,
    MapMap,
    MapFilter,
    MapFold,
    // Option
    OptionUnwrap,
    OptionIsSome,
    OptionIsNone,
    // Int
    IntShow,
    IntToHex,
    // Bool
    BoolShow,
    BoolToInt,
    // String
    StringEncodeUtf8,
    // ByteArray
    ByteArrayLength,
    ByteArrayShow,
    ByteArraySlice,
    ByteArrayDecodeUtf8,
    // crypto (narrow external interface)
    ByteArraySha2,
    ByteArraySha3,
    ByteArrayBlake2b,
    // Value
    ValueIsZero,
    ValueGet,
    // ScriptContext
    GetCurrentInput,
}

/// Members accessed without call parentheses.
pub fn is_property(member: BuiltinMember) -> bool {
    matches!(
        member,
        BuiltinMember::ListLength
            | BuiltinMember::ListHead
            | BuiltinMember::ListTail
            | BuiltinMember::MapLength
            | BuiltinMember::ByteArrayLength
    )
}

/// Resolves a builtin instance member on a receiver type, yielding the
/// member tag, its parameter types and its result type.
pub fn builtin_member(
    registry: &TypeRegistry,
    receiver: &Type,
    name: &str,
) -> Option<(BuiltinMember, Vec<Type>, Type)> {
    use BuiltinMember::*;

    let (decl, args) = match receiver.normalized() {
        Type::Nominal { decl, args } => (decl, args),
        _ => return None,
    };

    let int = || Type::plain(INT);
    let boolean = || Type::plain(BOOL);
    let string = || Type::plain(STRING);
    let bytes = || Type::plain(BYTE_ARRAY);

    if name == "serialize" {
        return Some((Serialize, vec![], bytes()));
    }

    match decl {
        LIST => {
            let item = args.first()?.clone();
            let this = receiver.normalized();

            match name {
                "length" => Some((ListLength, vec![], int())),
                "is_empty" => Some((ListIsEmpty, vec![], boolean())),
                "head" => Some((ListHead, vec![], item)),
                "tail" => Some((ListTail, vec![], this)),
                "get" => Some((ListGet, vec![int()], item)),
                "prepend" => Some((ListPrepend, vec![item], this)),
                "any" => Some((
                    ListAny,
                    vec![Type::func(vec![item], boolean())],
                    boolean(),
                )),
                "all" => Some((
                    ListAll,
                    vec![Type::func(vec![item], boolean())],
                    boolean(),
                )),
                _ => None,
            }
        }
        MAP => {
            let key = args.first()?.clone();
            let value = args.get(1)?.clone();
            let this = receiver.normalized();

            match name {
                "length" => Some((MapLength, vec![], int())),
                "is_empty" => Some((MapIsEmpty, vec![], boolean())),
                "get" => Some((MapGet, vec![key], value)),
                "get_safe" => Some((
                    MapGetSafe,
                    vec![key],
                    Type::nominal(OPTION, vec![value]),
                )),
                "set" => Some((MapSet, vec![key, value], this)),
                "delete" => Some((MapDelete, vec![key], this)),
                _ => None,
            }
        }
        OPTION => {
            let item = args.first()?.clone();

            match name {
                "unwrap" => Some((OptionUnwrap, vec![], item)),
                "is_some" => Some((OptionIsSome, vec![], boolean())),
                "is_none" => Some((OptionIsNone, vec![], boolean())),
                _ => None,
            }
        }
        INT => match name {
            "show" => Some((IntShow, vec![], string())),
            "to_hex" => Some((IntToHex, vec![], string())),
            _ => None,
        },
        BOOL => match name {
            "show" => Some((BoolShow, vec![], string())),
            "to_int" => Some((BoolToInt, vec![], int())),
            _ => None,
        },
        STRING => match name {
            "encode_utf8" => Some((StringEncodeUtf8, vec![], bytes())),
            _ => None,
        },
        BYTE_ARRAY => match name {
            "length" => Some((ByteArrayLength, vec![], int())),
            "show" => Some((ByteArrayShow, vec![], string())),
            "slice" => Some((ByteArraySlice, vec![int(), int()], bytes())),
            "decode_utf8" => Some((ByteArrayDecodeUtf8, vec![], string())),
            "sha2" => Some((ByteArraySha2, vec![], bytes())),
            "sha3" => Some((ByteArraySha3, vec![], bytes())),
            "blake2b" => Some((ByteArrayBlake2b, vec![], bytes())),
            _ => None,
        },
        VALUE => match name {
            "is_zero" => Some((ValueIsZero, vec![], boolean())),
            "get" => Some((ValueGet, vec![bytes(), bytes()], int())),
            _ => None,
        },
        SCRIPT_CONTEXT => match name {
            "get_current_input" => Some((GetCurrentInput, vec![], Type::plain(TX_INPUT))),
            _ => None,
        },
        _ => None,
    }
}

/// Higher-order list and map members need their callback's types to fix
/// the result type; they are resolved from the call site.
pub fn builtin_higher_order(
    receiver: &Type,
    name: &str,
) -> Option<BuiltinMember> {
    let decl = match receiver.normalized() {
        Type::Nominal { decl, .. } => decl,
        _ => return None,
    };

    match (decl, name) {
        (LIST, "map") => Some(BuiltinMember::ListMap),
        (LIST, "filter") => Some(BuiltinMember::ListFilter),
        (LIST, "fold") => Some(BuiltinMember::ListFold),
        (MAP, "map") => Some(BuiltinMember::MapMap),
        (MAP, "filter") => Some(BuiltinMember::MapFilter),
        (MAP, "fold") => Some(BuiltinMember::MapFold),
        _ => None,
    }
}
