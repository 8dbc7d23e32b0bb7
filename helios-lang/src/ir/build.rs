//! Lowering of the type-checked program to IR.
//!
//! Every language value is represented at runtime as a `Data` term:
//! integers as `I`, text as UTF-8 `B`, structs and enum variants as
//! `Constr`, lists and maps structurally. Operators unwrap to machine
//! primitives and wrap their results back. Structural members that need
//! recursion lower to calls into a small runtime library of fixpoint
//! combinators bound at the top of the program.

use std::collections::HashMap;

use helios_machine::builtins::DefaultFunction as Bi;
use helios_machine::Constant;
use helios_primitives::{Data, Site};
use num_bigint::BigInt;

use crate::ast::{BinaryOp, Purpose, UnaryOp};
use crate::types::check::{
    CheckedProgram, Global, StaticBuiltin, TypedExpr, TypedKind,
};
use crate::types::{registry, BuiltinMember, Type};

use super::{IrExpr, IrNode};

/// Lowers a checked program to a single IR term: runtime library
/// bindings, then globals in dependency order, then the entry lambda.
pub fn build(program: &CheckedProgram, header_site: Site) -> IrNode {
    IrBuilder::new(program, header_site).build()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RuntimeFn {
    Fix,
    RawLength,
    RawGetSafe,
    ListGet,
    ListConcat,
    ListMap,
    ListFilter,
    ListFold,
    ListAny,
    ListAll,
    MapDelete,
    MapFilter,
    MapFold,
    MapMapValues,
    HexDigit,
    IntShow,
    IntToHex,
    ByteArrayShow,
    ValueInnerAdd,
    ValueAdd,
    ValueGet,
    ValueContains,
    GetCurrentInput,
}

impl RuntimeFn {
    fn name(&self) -> &'static str {
        match self {
            RuntimeFn::Fix => "__fix",
            RuntimeFn::RawLength => "__raw_length",
            RuntimeFn::RawGetSafe => "__raw_get_safe",
            RuntimeFn::ListGet => "__list_get",
            RuntimeFn::ListConcat => "__list_concat",
            RuntimeFn::ListMap => "__list_map",
            RuntimeFn::ListFilter => "__list_filter",
            RuntimeFn::ListFold => "__list_fold",
            RuntimeFn::ListAny => "__list_any",
            RuntimeFn::ListAll => "__list_all",
            RuntimeFn::MapDelete => "__map_delete",
            RuntimeFn::MapFilter => "__map_filter",
            RuntimeFn::MapFold => "__map_fold",
            RuntimeFn::MapMapValues => "__map_map",
            RuntimeFn::HexDigit => "__hex_digit",
            RuntimeFn::IntShow => "__int_show",
            RuntimeFn::IntToHex => "__int_to_hex",
            RuntimeFn::ByteArrayShow => "__bytearray_show",
            RuntimeFn::ValueInnerAdd => "__value_inner_add",
            RuntimeFn::ValueAdd => "__value_add",
            RuntimeFn::ValueGet => "__value_get",
            RuntimeFn::ValueContains => "__value_contains",
            RuntimeFn::GetCurrentInput => "__get_current_input",
        }
    }
}

struct IrBuilder<'a> {
    program: &'a CheckedProgram,
    next: usize,
    site: Site,
    rt_uniques: HashMap<RuntimeFn, usize>,
    /// Definitions in completion order: dependencies first.
    rt_defs: Vec<(usize, String, IrNode)>,
}

impl<'a> IrBuilder<'a> {
    fn new(program: &'a CheckedProgram, header_site: Site) -> Self {
        IrBuilder {
            program,
            next: program.next_unique,
            site: header_site,
            rt_uniques: HashMap::new(),
            rt_defs: vec![],
        }
    }

    fn fresh(&mut self) -> usize {
        let u = self.next;
        self.next += 1;
        u
    }

    // ----- node DSL (synthesized nodes carry the current site)

    fn n(&self, expr: IrExpr) -> IrNode {
        IrNode::new(expr, self.site)
    }

    fn var(&self, unique: usize, name: &str) -> IrNode {
        self.n(IrExpr::Var {
            unique,
            name: name.to_string(),
        })
    }

    fn lam(&self, params: Vec<(usize, String)>, body: IrNode) -> IrNode {
        self.n(IrExpr::Lambda {
            params,
            body: Box::new(body),
        })
    }

    fn call(&self, head: IrNode, args: Vec<IrNode>) -> IrNode {
        self.n(IrExpr::Call {
            head: Box::new(head),
            args,
        })
    }

    fn bi(&self, fun: Bi, args: Vec<IrNode>) -> IrNode {
        self.n(IrExpr::Builtin { fun, args })
    }

    fn delay(&self, inner: IrNode) -> IrNode {
        self.n(IrExpr::Delay(Box::new(inner)))
    }

    fn force(&self, inner: IrNode) -> IrNode {
        self.n(IrExpr::Force(Box::new(inner)))
    }

    fn err(&self, message: &str) -> IrNode {
        self.n(IrExpr::Error {
            message: message.to_string(),
        })
    }

    fn lit(&self, c: Constant) -> IrNode {
        self.n(IrExpr::Literal(c))
    }

    fn lit_data(&self, d: Data) -> IrNode {
        self.lit(Constant::Data(d))
    }

    fn int(&self, i: impl Into<BigInt>) -> IrNode {
        self.lit(Constant::Integer(i.into()))
    }

    fn bstr(&self, bytes: Vec<u8>) -> IrNode {
        self.lit(Constant::ByteString(bytes))
    }

    fn unit(&self) -> IrNode {
        self.lit(Constant::Unit)
    }

    fn true_data(&self) -> IrNode {
        self.lit_data(Data::boolean(true))
    }

    fn false_data(&self) -> IrNode {
        self.lit_data(Data::boolean(false))
    }

    fn bind(&self, unique: usize, name: &str, value: IrNode, body: IrNode) -> IrNode {
        self.call(self.lam(vec![(unique, name.to_string())], body), vec![value])
    }

    // data <-> machine bridges
    fn un_i(&self, x: IrNode) -> IrNode {
        self.bi(Bi::UnIData, vec![x])
    }

    fn i_d(&self, x: IrNode) -> IrNode {
        self.bi(Bi::IData, vec![x])
    }

    fn un_b(&self, x: IrNode) -> IrNode {
        self.bi(Bi::UnBData, vec![x])
    }

    fn b_d(&self, x: IrNode) -> IrNode {
        self.bi(Bi::BData, vec![x])
    }

    fn un_l(&self, x: IrNode) -> IrNode {
        self.bi(Bi::UnListData, vec![x])
    }

    fn l_d(&self, x: IrNode) -> IrNode {
        self.bi(Bi::ListData, vec![x])
    }

    fn un_m(&self, x: IrNode) -> IrNode {
        self.bi(Bi::UnMapData, vec![x])
    }

    fn m_d(&self, x: IrNode) -> IrNode {
        self.bi(Bi::MapData, vec![x])
    }

    fn un_c(&self, x: IrNode) -> IrNode {
        self.bi(Bi::UnConstrData, vec![x])
    }

    fn fst(&self, x: IrNode) -> IrNode {
        self.bi(Bi::FstPair, vec![x])
    }

    fn snd(&self, x: IrNode) -> IrNode {
        self.bi(Bi::SndPair, vec![x])
    }

    fn head(&self, x: IrNode) -> IrNode {
        self.bi(Bi::HeadList, vec![x])
    }

    fn tail(&self, x: IrNode) -> IrNode {
        self.bi(Bi::TailList, vec![x])
    }

    fn nil_data(&self) -> IrNode {
        self.bi(Bi::MkNilData, vec![self.unit()])
    }

    fn nil_pairs(&self) -> IrNode {
        self.bi(Bi::MkNilPairData, vec![self.unit()])
    }

    fn eq_int(&self, a: IrNode, b: IrNode) -> IrNode {
        self.bi(Bi::EqualsInteger, vec![a, b])
    }

    /// Machine boolean of a data-encoded Bool: its constructor tag is 1.
    fn to_bool(&self, x: IrNode) -> IrNode {
        self.eq_int(self.fst(self.un_c(x)), self.int(1))
    }

    /// `force (ifThenElse c (delay t) (delay f))` over a machine boolean.
    /// Both branches stay deferred until the condition picks one.
    fn mite(&self, cond: IrNode, then_branch: IrNode, else_branch: IrNode) -> IrNode {
        self.force(self.bi(
            Bi::IfThenElse,
            vec![cond, self.delay(then_branch), self.delay(else_branch)],
        ))
    }

    /// Data-encoded Bool from a machine boolean.
    fn from_bool(&self, machine_bool: IrNode) -> IrNode {
        self.mite(machine_bool, self.true_data(), self.false_data())
    }

    /// Selection over the constructor tag of an unwrapped Option value.
    fn if_some(
        &mut self,
        option: IrNode,
        some_unique: usize,
        some_branch: IrNode,
        none_branch: IrNode,
    ) -> IrNode {
        let o = self.fresh();
        let inner = self.mite(
            self.eq_int(self.fst(self.un_c(self.var(o, "opt"))), self.int(0)),
            self.bind(
                some_unique,
                "some_value",
                self.head(self.snd(self.un_c(self.var(o, "opt")))),
                some_branch,
            ),
            none_branch,
        );
        self.bind(o, "opt", option, inner)
    }

    // ----- runtime library

    fn rt(&mut self, f: RuntimeFn) -> IrNode {
        if let Some(unique) = self.rt_uniques.get(&f) {
            return self.var(*unique, f.name());
        }

        let unique = self.fresh();
        self.rt_uniques.insert(f, unique);

        let definition = self.rt_def(f);
        self.rt_defs.push((unique, f.name().to_string(), definition));

        self.var(unique, f.name())
    }

    /// `fix g` for a recursive body `\self params... -> ...`.
    fn fixed(&mut self, g: IrNode) -> IrNode {
        let fix = self.rt(RuntimeFn::Fix);
        self.call(fix, vec![g])
    }

    fn rt_def(&mut self, f: RuntimeFn) -> IrNode {
        match f {
            RuntimeFn::Fix => {
                // \f -> (\x -> f (\v -> x x v)) (\x -> f (\v -> x x v))
                let fp = self.fresh();
                let mut half = |builder: &mut Self| {
                    let x = builder.fresh();
                    let v = builder.fresh();
                    builder.lam(
                        vec![(x, "x".into())],
                        builder.call(
                            builder.var(fp, "f"),
                            vec![builder.lam(
                                vec![(v, "v".into())],
                                builder.call(
                                    builder.call(
                                        builder.var(x, "x"),
                                        vec![builder.var(x, "x")],
                                    ),
                                    vec![builder.var(v, "v")],
                                ),
                            )],
                        ),
                    )
                };

                let left = half(self);
                let right = half(self);

                self.lam(vec![(fp, "f".into())], self.call(left, vec![right]))
            }
            RuntimeFn::RawLength => {
                // machine list -> machine integer
                let (go, xs) = (self.fresh(), self.fresh());
                let body = self.force(self.bi(
                    Bi::ChooseList,
                    vec![
                        self.var(xs, "xs"),
                        self.delay(self.int(0)),
                        self.delay(self.bi(
                            Bi::AddInteger,
                            vec![
                                self.int(1),
                                self.call(
                                    self.var(go, "go"),
                                    vec![self.tail(self.var(xs, "xs"))],
                                ),
                            ],
                        )),
                    ],
                ));

                let g = self.lam(vec![(go, "go".into()), (xs, "xs".into())], body);
                self.fixed(g)
            }
            RuntimeFn::RawGetSafe => {
                // first-match lookup over a machine list of data pairs,
                // yielding an Option-encoded result
                let (go, ps, k, h) = (self.fresh(), self.fresh(), self.fresh(), self.fresh());

                let some_of = self.bi(
                    Bi::ConstrData,
                    vec![
                        self.int(0),
                        self.bi(
                            Bi::MkCons,
                            vec![self.snd(self.var(h, "h")), self.nil_data()],
                        ),
                    ],
                );

                let found = self.bi(
                    Bi::EqualsData,
                    vec![self.fst(self.var(h, "h")), self.var(k, "k")],
                );

                let step = self.bind(
                    h,
                    "h",
                    self.head(self.var(ps, "ps")),
                    self.mite(
                        found,
                        some_of,
                        self.call(
                            self.var(go, "go"),
                            vec![self.tail(self.var(ps, "ps")), self.var(k, "k")],
                        ),
                    ),
                );

                let body = self.force(self.bi(
                    Bi::ChooseList,
                    vec![
                        self.var(ps, "ps"),
                        self.delay(self.lit_data(Data::none())),
                        self.delay(step),
                    ],
                ));

                let g = self.lam(
                    vec![(go, "go".into()), (ps, "ps".into()), (k, "k".into())],
                    body,
                );
                self.fixed(g)
            }
            RuntimeFn::ListGet => {
                let (l, i, go, xs, k) = (
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                );

                let step = self.mite(
                    self.eq_int(self.var(k, "n"), self.int(0)),
                    self.head(self.var(xs, "xs")),
                    self.call(
                        self.var(go, "go"),
                        vec![
                            self.tail(self.var(xs, "xs")),
                            self.bi(
                                Bi::SubtractInteger,
                                vec![self.var(k, "n"), self.int(1)],
                            ),
                        ],
                    ),
                );

                let walk = self.force(self.bi(
                    Bi::ChooseList,
                    vec![
                        self.var(xs, "xs"),
                        self.delay(self.err("index out of range")),
                        self.delay(step),
                    ],
                ));

                let g = self.lam(
                    vec![(go, "go".into()), (xs, "xs".into()), (k, "n".into())],
                    walk,
                );
                let go_fixed = self.fixed(g);

                let n = self.fresh();
                let guarded = self.mite(
                    self.bi(
                        Bi::LessThanInteger,
                        vec![self.var(n, "n"), self.int(0)],
                    ),
                    self.err("index out of range"),
                    self.call(
                        go_fixed,
                        vec![self.un_l(self.var(l, "l")), self.var(n, "n")],
                    ),
                );

                self.lam(
                    vec![(l, "l".into()), (i, "i".into())],
                    self.bind(n, "n", self.un_i(self.var(i, "i")), guarded),
                )
            }
            RuntimeFn::ListConcat => {
                let (a, b, go, xs, ys) = (
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                );

                let step = self.bi(
                    Bi::MkCons,
                    vec![
                        self.head(self.var(xs, "xs")),
                        self.call(
                            self.var(go, "go"),
                            vec![self.tail(self.var(xs, "xs")), self.var(ys, "ys")],
                        ),
                    ],
                );

                let body = self.force(self.bi(
                    Bi::ChooseList,
                    vec![
                        self.var(xs, "xs"),
                        self.delay(self.var(ys, "ys")),
                        self.delay(step),
                    ],
                ));

                let g = self.lam(
                    vec![(go, "go".into()), (xs, "xs".into()), (ys, "ys".into())],
                    body,
                );
                let go_fixed = self.fixed(g);

                self.lam(
                    vec![(a, "a".into()), (b, "b".into())],
                    self.l_d(self.call(
                        go_fixed,
                        vec![self.un_l(self.var(a, "a")), self.un_l(self.var(b, "b"))],
                    )),
                )
            }
            RuntimeFn::ListMap => {
                let (f, l, go, xs) = (self.fresh(), self.fresh(), self.fresh(), self.fresh());

                let step = self.bi(
                    Bi::MkCons,
                    vec![
                        self.call(self.var(f, "f"), vec![self.head(self.var(xs, "xs"))]),
                        self.call(self.var(go, "go"), vec![self.tail(self.var(xs, "xs"))]),
                    ],
                );

                let body = self.force(self.bi(
                    Bi::ChooseList,
                    vec![
                        self.var(xs, "xs"),
                        self.delay(self.nil_data()),
                        self.delay(step),
                    ],
                ));

                let g = self.lam(vec![(go, "go".into()), (xs, "xs".into())], body);
                let go_fixed = self.fixed(g);

                self.lam(
                    vec![(f, "f".into()), (l, "l".into())],
                    self.l_d(self.call(go_fixed, vec![self.un_l(self.var(l, "l"))])),
                )
            }
            RuntimeFn::ListFilter => {
                let (f, l, go, xs, h, rest) = (
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                );

                let keep = self.to_bool(self.call(self.var(f, "f"), vec![self.var(h, "h")]));

                let step = self.bind(
                    h,
                    "h",
                    self.head(self.var(xs, "xs")),
                    self.bind(
                        rest,
                        "rest",
                        self.call(self.var(go, "go"), vec![self.tail(self.var(xs, "xs"))]),
                        self.mite(
                            keep,
                            self.bi(
                                Bi::MkCons,
                                vec![self.var(h, "h"), self.var(rest, "rest")],
                            ),
                            self.var(rest, "rest"),
                        ),
                    ),
                );

                let body = self.force(self.bi(
                    Bi::ChooseList,
                    vec![
                        self.var(xs, "xs"),
                        self.delay(self.nil_data()),
                        self.delay(step),
                    ],
                ));

                let g = self.lam(vec![(go, "go".into()), (xs, "xs".into())], body);
                let go_fixed = self.fixed(g);

                self.lam(
                    vec![(f, "f".into()), (l, "l".into())],
                    self.l_d(self.call(go_fixed, vec![self.un_l(self.var(l, "l"))])),
                )
            }
            RuntimeFn::ListFold => {
                let (f, z, l, go, acc, xs) = (
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                );

                let step = self.call(
                    self.var(go, "go"),
                    vec![
                        self.call(
                            self.var(f, "f"),
                            vec![self.var(acc, "acc"), self.head(self.var(xs, "xs"))],
                        ),
                        self.tail(self.var(xs, "xs")),
                    ],
                );

                let body = self.force(self.bi(
                    Bi::ChooseList,
                    vec![
                        self.var(xs, "xs"),
                        self.delay(self.var(acc, "acc")),
                        self.delay(step),
                    ],
                ));

                let g = self.lam(
                    vec![(go, "go".into()), (acc, "acc".into()), (xs, "xs".into())],
                    body,
                );
                let go_fixed = self.fixed(g);

                self.lam(
                    vec![(f, "f".into()), (z, "z".into()), (l, "l".into())],
                    self.call(
                        go_fixed,
                        vec![self.var(z, "z"), self.un_l(self.var(l, "l"))],
                    ),
                )
            }
            RuntimeFn::ListAny | RuntimeFn::ListAll => {
                let on_hit = if f == RuntimeFn::ListAny {
                    self.true_data()
                } else {
                    self.false_data()
                };
                let on_end = if f == RuntimeFn::ListAny {
                    self.false_data()
                } else {
                    self.true_data()
                };

                let (fp, l, go, xs) = (self.fresh(), self.fresh(), self.fresh(), self.fresh());

                let hit = self.to_bool(
                    self.call(self.var(fp, "f"), vec![self.head(self.var(xs, "xs"))]),
                );

                let recurse =
                    self.call(self.var(go, "go"), vec![self.tail(self.var(xs, "xs"))]);

                // any: a passing item short-circuits to true;
                // all: a failing item short-circuits to false
                let step = if f == RuntimeFn::ListAny {
                    self.mite(hit, on_hit, recurse)
                } else {
                    self.mite(hit, recurse, on_hit)
                };

                let body = self.force(self.bi(
                    Bi::ChooseList,
                    vec![self.var(xs, "xs"), self.delay(on_end), self.delay(step)],
                ));

                let g = self.lam(vec![(go, "go".into()), (xs, "xs".into())], body);
                let go_fixed = self.fixed(g);

                self.lam(
                    vec![(fp, "f".into()), (l, "l".into())],
                    self.call(go_fixed, vec![self.un_l(self.var(l, "l"))]),
                )
            }
            RuntimeFn::MapDelete => {
                let (m, k, go, ps, h, rest) = (
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                );

                let matches = self.bi(
                    Bi::EqualsData,
                    vec![self.fst(self.var(h, "h")), self.var(k, "k")],
                );

                let step = self.bind(
                    h,
                    "h",
                    self.head(self.var(ps, "ps")),
                    self.bind(
                        rest,
                        "rest",
                        self.call(self.var(go, "go"), vec![self.tail(self.var(ps, "ps"))]),
                        self.mite(
                            matches,
                            self.var(rest, "rest"),
                            self.bi(
                                Bi::MkCons,
                                vec![self.var(h, "h"), self.var(rest, "rest")],
                            ),
                        ),
                    ),
                );

                let body = self.force(self.bi(
                    Bi::ChooseList,
                    vec![
                        self.var(ps, "ps"),
                        self.delay(self.nil_pairs()),
                        self.delay(step),
                    ],
                ));

                let g = self.lam(vec![(go, "go".into()), (ps, "ps".into())], body);
                let go_fixed = self.fixed(g);

                self.lam(
                    vec![(m, "m".into()), (k, "k".into())],
                    self.m_d(self.call(go_fixed, vec![self.un_m(self.var(m, "m"))])),
                )
            }
            RuntimeFn::MapFilter => {
                let (fp, m, go, ps, h, rest) = (
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                );

                let keep = self.to_bool(self.call(
                    self.var(fp, "f"),
                    vec![self.fst(self.var(h, "h")), self.snd(self.var(h, "h"))],
                ));

                let step = self.bind(
                    h,
                    "h",
                    self.head(self.var(ps, "ps")),
                    self.bind(
                        rest,
                        "rest",
                        self.call(self.var(go, "go"), vec![self.tail(self.var(ps, "ps"))]),
                        self.mite(
                            keep,
                            self.bi(
                                Bi::MkCons,
                                vec![self.var(h, "h"), self.var(rest, "rest")],
                            ),
                            self.var(rest, "rest"),
                        ),
                    ),
                );

                let body = self.force(self.bi(
                    Bi::ChooseList,
                    vec![
                        self.var(ps, "ps"),
                        self.delay(self.nil_pairs()),
                        self.delay(step),
                    ],
                ));

                let g = self.lam(vec![(go, "go".into()), (ps, "ps".into())], body);
                let go_fixed = self.fixed(g);

                self.lam(
                    vec![(fp, "f".into()), (m, "m".into())],
                    self.m_d(self.call(go_fixed, vec![self.un_m(self.var(m, "m"))])),
                )
            }
            RuntimeFn::MapFold => {
                let (fp, z, m, go, acc, ps) = (
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                );

                let step = self.call(
                    self.var(go, "go"),
                    vec![
                        self.call(
                            self.var(fp, "f"),
                            vec![
                                self.var(acc, "acc"),
                                self.fst(self.head(self.var(ps, "ps"))),
                                self.snd(self.head(self.var(ps, "ps"))),
                            ],
                        ),
                        self.tail(self.var(ps, "ps")),
                    ],
                );

                let body = self.force(self.bi(
                    Bi::ChooseList,
                    vec![
                        self.var(ps, "ps"),
                        self.delay(self.var(acc, "acc")),
                        self.delay(step),
                    ],
                ));

                let g = self.lam(
                    vec![(go, "go".into()), (acc, "acc".into()), (ps, "ps".into())],
                    body,
                );
                let go_fixed = self.fixed(g);

                self.lam(
                    vec![(fp, "f".into()), (z, "z".into()), (m, "m".into())],
                    self.call(
                        go_fixed,
                        vec![self.var(z, "z"), self.un_m(self.var(m, "m"))],
                    ),
                )
            }
            RuntimeFn::MapMapValues => {
                let (fp, m, go, ps) = (self.fresh(), self.fresh(), self.fresh(), self.fresh());

                let mapped = self.bi(
                    Bi::MkPairData,
                    vec![
                        self.fst(self.head(self.var(ps, "ps"))),
                        self.call(
                            self.var(fp, "f"),
                            vec![self.snd(self.head(self.var(ps, "ps")))],
                        ),
                    ],
                );

                let step = self.bi(
                    Bi::MkCons,
                    vec![
                        mapped,
                        self.call(self.var(go, "go"), vec![self.tail(self.var(ps, "ps"))]),
                    ],
                );

                let body = self.force(self.bi(
                    Bi::ChooseList,
                    vec![
                        self.var(ps, "ps"),
                        self.delay(self.nil_pairs()),
                        self.delay(step),
                    ],
                ));

                let g = self.lam(vec![(go, "go".into()), (ps, "ps".into())], body);
                let go_fixed = self.fixed(g);

                self.lam(
                    vec![(fp, "f".into()), (m, "m".into())],
                    self.m_d(self.call(go_fixed, vec![self.un_m(self.var(m, "m"))])),
                )
            }
            RuntimeFn::HexDigit => {
                // machine int 0..15 -> ascii code, lowercase letters
                let d = self.fresh();
                self.lam(
                    vec![(d, "d".into())],
                    self.mite(
                        self.bi(
                            Bi::LessThanInteger,
                            vec![self.var(d, "d"), self.int(10)],
                        ),
                        self.bi(Bi::AddInteger, vec![self.int(48), self.var(d, "d")]),
                        self.bi(Bi::AddInteger, vec![self.int(87), self.var(d, "d")]),
                    ),
                )
            }
            RuntimeFn::IntShow => self.digits_fn(10),
            RuntimeFn::IntToHex => self.digits_fn(16),
            RuntimeFn::ByteArrayShow => {
                let hex_digit = self.rt(RuntimeFn::HexDigit);

                let (b, go, bs, len) = (
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                );

                let single = |builder: &Self, code: IrNode| {
                    builder.bi(Bi::ConsByteString, vec![code, builder.bstr(vec![])])
                };

                let byte0 = self.bi(
                    Bi::IndexByteString,
                    vec![self.var(bs, "bs"), self.int(0)],
                );
                let hi = self.call(
                    hex_digit.clone(),
                    vec![self.bi(
                        Bi::QuotientInteger,
                        vec![byte0.clone(), self.int(16)],
                    )],
                );
                let lo = self.call(
                    hex_digit,
                    vec![self.bi(Bi::ModInteger, vec![byte0, self.int(16)])],
                );

                let pair = self.bi(
                    Bi::AppendByteString,
                    vec![single(self, hi), single(self, lo)],
                );

                let recurse = self.call(
                    self.var(go, "go"),
                    vec![self.bi(
                        Bi::SliceByteString,
                        vec![
                            self.int(1),
                            self.bi(
                                Bi::SubtractInteger,
                                vec![self.var(len, "len"), self.int(1)],
                            ),
                            self.var(bs, "bs"),
                        ],
                    )],
                );

                let step = self.bi(Bi::AppendByteString, vec![pair, recurse]);

                let body = self.bind(
                    len,
                    "len",
                    self.bi(Bi::LengthOfByteString, vec![self.var(bs, "bs")]),
                    self.mite(
                        self.eq_int(self.var(len, "len"), self.int(0)),
                        self.bstr(vec![]),
                        step,
                    ),
                );

                let g = self.lam(vec![(go, "go".into()), (bs, "bs".into())], body);
                let go_fixed = self.fixed(g);

                self.lam(
                    vec![(b, "b".into())],
                    self.b_d(self.call(go_fixed, vec![self.un_b(self.var(b, "b"))])),
                )
            }
            RuntimeFn::ValueInnerAdd => {
                // (inner map data, machine pairs to merge) -> map data
                let raw_get = self.rt(RuntimeFn::RawGetSafe);
                let map_delete = self.rt(RuntimeFn::MapDelete);

                let (go, acc, ps, k, q, existing) = (
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                );

                let set = |builder: &Self, m: IrNode, key: IrNode, v: IrNode| {
                    builder.m_d(builder.bi(
                        Bi::MkCons,
                        vec![
                            builder.bi(Bi::MkPairData, vec![key, v]),
                            builder.un_m(m),
                        ],
                    ))
                };

                let summed = self.i_d(self.bi(
                    Bi::AddInteger,
                    vec![
                        self.un_i(self.var(existing, "existing")),
                        self.un_i(self.var(q, "q")),
                    ],
                ));

                let merged_some = set(
                    self,
                    self.call(
                        map_delete,
                        vec![self.var(acc, "acc"), self.var(k, "k")],
                    ),
                    self.var(k, "k"),
                    summed,
                );

                let merged_none = set(
                    self,
                    self.var(acc, "acc"),
                    self.var(k, "k"),
                    self.var(q, "q"),
                );

                let lookup = self.call(
                    raw_get,
                    vec![self.un_m(self.var(acc, "acc")), self.var(k, "k")],
                );
                let merged = self.if_some(lookup, existing, merged_some, merged_none);

                let step = self.bind(
                    k,
                    "k",
                    self.fst(self.head(self.var(ps, "ps"))),
                    self.bind(
                        q,
                        "q",
                        self.snd(self.head(self.var(ps, "ps"))),
                        self.call(
                            self.var(go, "go"),
                            vec![merged, self.tail(self.var(ps, "ps"))],
                        ),
                    ),
                );

                let body = self.force(self.bi(
                    Bi::ChooseList,
                    vec![
                        self.var(ps, "ps"),
                        self.delay(self.var(acc, "acc")),
                        self.delay(step),
                    ],
                ));

                let g = self.lam(
                    vec![(go, "go".into()), (acc, "acc".into()), (ps, "ps".into())],
                    body,
                );
                self.fixed(g)
            }
            RuntimeFn::ValueAdd => {
                let raw_get = self.rt(RuntimeFn::RawGetSafe);
                let map_delete = self.rt(RuntimeFn::MapDelete);
                let inner_add = self.rt(RuntimeFn::ValueInnerAdd);

                let (a, b, go, acc, ps, mph, inner, existing) = (
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                );

                let set = |builder: &Self, m: IrNode, key: IrNode, v: IrNode| {
                    builder.m_d(builder.bi(
                        Bi::MkCons,
                        vec![
                            builder.bi(Bi::MkPairData, vec![key, v]),
                            builder.un_m(m),
                        ],
                    ))
                };

                let merged_inner = self.call(
                    inner_add,
                    vec![
                        self.var(existing, "existing"),
                        self.un_m(self.var(inner, "inner")),
                    ],
                );

                let merged_some = set(
                    self,
                    self.call(
                        map_delete,
                        vec![self.var(acc, "acc"), self.var(mph, "mph")],
                    ),
                    self.var(mph, "mph"),
                    merged_inner,
                );

                let merged_none = set(
                    self,
                    self.var(acc, "acc"),
                    self.var(mph, "mph"),
                    self.var(inner, "inner"),
                );

                let lookup = self.call(
                    raw_get,
                    vec![self.un_m(self.var(acc, "acc")), self.var(mph, "mph")],
                );
                let merged = self.if_some(lookup, existing, merged_some, merged_none);

                let step = self.bind(
                    mph,
                    "mph",
                    self.fst(self.head(self.var(ps, "ps"))),
                    self.bind(
                        inner,
                        "inner",
                        self.snd(self.head(self.var(ps, "ps"))),
                        self.call(
                            self.var(go, "go"),
                            vec![merged, self.tail(self.var(ps, "ps"))],
                        ),
                    ),
                );

                let body = self.force(self.bi(
                    Bi::ChooseList,
                    vec![
                        self.var(ps, "ps"),
                        self.delay(self.var(acc, "acc")),
                        self.delay(step),
                    ],
                ));

                let g = self.lam(
                    vec![(go, "go".into()), (acc, "acc".into()), (ps, "ps".into())],
                    body,
                );
                let go_fixed = self.fixed(g);

                self.lam(
                    vec![(a, "a".into()), (b, "b".into())],
                    self.call(
                        go_fixed,
                        vec![self.var(a, "a"), self.un_m(self.var(b, "b"))],
                    ),
                )
            }
            RuntimeFn::ValueGet => {
                let raw_get = self.rt(RuntimeFn::RawGetSafe);

                let (v, mph, name, outer, inner_map, q) = (
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                );

                let inner_lookup = self.call(
                    raw_get.clone(),
                    vec![
                        self.un_m(self.var(inner_map, "inner")),
                        self.var(name, "name"),
                    ],
                );

                let inner_result = self.if_some(
                    inner_lookup,
                    q,
                    self.var(q, "q"),
                    self.lit_data(Data::integer(0)),
                );

                let outer_lookup = self.call(
                    raw_get,
                    vec![self.un_m(self.var(v, "v")), self.var(mph, "mph")],
                );

                let body = self.if_some(
                    outer_lookup,
                    inner_map,
                    inner_result,
                    self.lit_data(Data::integer(0)),
                );

                self.lam(
                    vec![(v, "v".into()), (mph, "mph".into()), (name, "name".into())],
                    body,
                )
            }
            RuntimeFn::ValueContains => {
                // every quantity of `b` equals the matching quantity in `a`
                let value_get = self.rt(RuntimeFn::ValueGet);

                let (a, b, outer, ps, mph, inner, names) = (
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                );
                let inner_go = self.fresh();

                let quantity_matches = self.bi(
                    Bi::EqualsData,
                    vec![
                        self.call(
                            value_get,
                            vec![
                                self.var(a, "a"),
                                self.var(mph, "mph"),
                                self.fst(self.head(self.var(names, "names"))),
                            ],
                        ),
                        self.snd(self.head(self.var(names, "names"))),
                    ],
                );

                let inner_step = self.mite(
                    quantity_matches,
                    self.call(
                        self.var(inner_go, "go"),
                        vec![self.tail(self.var(names, "names"))],
                    ),
                    self.false_data(),
                );

                let inner_body = self.force(self.bi(
                    Bi::ChooseList,
                    vec![
                        self.var(names, "names"),
                        self.delay(self.true_data()),
                        self.delay(inner_step),
                    ],
                ));

                let inner_g = self.lam(
                    vec![(inner_go, "go".into()), (names, "names".into())],
                    inner_body,
                );
                let inner_fixed = self.fixed(inner_g);

                let inner_holds = self.bind(
                    mph,
                    "mph",
                    self.fst(self.head(self.var(ps, "ps"))),
                    self.bind(
                        inner,
                        "inner",
                        self.snd(self.head(self.var(ps, "ps"))),
                        self.call(
                            inner_fixed,
                            vec![self.un_m(self.var(inner, "inner"))],
                        ),
                    ),
                );

                let outer_step = self.mite(
                    self.to_bool(inner_holds),
                    self.call(
                        self.var(outer, "go"),
                        vec![self.tail(self.var(ps, "ps"))],
                    ),
                    self.false_data(),
                );

                let outer_body = self.force(self.bi(
                    Bi::ChooseList,
                    vec![
                        self.var(ps, "ps"),
                        self.delay(self.true_data()),
                        self.delay(outer_step),
                    ],
                ));

                let outer_g = self.lam(
                    vec![(outer, "go".into()), (ps, "ps".into())],
                    outer_body,
                );
                let outer_fixed = self.fixed(outer_g);

                self.lam(
                    vec![(a, "a".into()), (b, "b".into())],
                    self.call(outer_fixed, vec![self.un_m(self.var(b, "b"))]),
                )
            }
            RuntimeFn::GetCurrentInput => {
                let (ctx, oid, go, xs, h) = (
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                    self.fresh(),
                );

                let ctx_fields = self.snd(self.un_c(self.var(ctx, "ctx")));
                let tx = self.head(ctx_fields.clone());
                let purpose = self.head(self.tail(ctx_fields));
                let inputs = self.head(self.snd(self.un_c(tx)));

                let input_oid = self.head(self.snd(self.un_c(self.var(h, "h"))));

                let step = self.bind(
                    h,
                    "h",
                    self.head(self.var(xs, "xs")),
                    self.mite(
                        self.bi(
                            Bi::EqualsData,
                            vec![input_oid, self.var(oid, "oid")],
                        ),
                        self.var(h, "h"),
                        self.call(
                            self.var(go, "go"),
                            vec![self.tail(self.var(xs, "xs"))],
                        ),
                    ),
                );

                let find_body = self.force(self.bi(
                    Bi::ChooseList,
                    vec![
                        self.var(xs, "xs"),
                        self.delay(self.err("not found")),
                        self.delay(step),
                    ],
                ));

                let find_g = self.lam(vec![(go, "go".into()), (xs, "xs".into())], find_body);
                let find_fixed = self.fixed(find_g);

                let purpose_u = self.fresh();
                let spending_oid = self.head(self.snd(self.un_c(self.var(purpose_u, "purpose"))));

                let body = self.bind(
                    purpose_u,
                    "purpose",
                    purpose,
                    self.mite(
                        self.eq_int(
                            self.fst(self.un_c(self.var(purpose_u, "purpose"))),
                            self.int(1),
                        ),
                        self.bind(
                            oid,
                            "oid",
                            spending_oid,
                            self.call(find_fixed, vec![self.un_l(inputs)]),
                        ),
                        self.err("not found"),
                    ),
                );

                self.lam(vec![(ctx, "ctx".into())], body)
            }
        }
    }

    /// Decimal / hexadecimal rendering of a data integer as a data
    /// string (UTF-8 bytes).
    fn digits_fn(&mut self, base: u32) -> IrNode {
        let digit_code = |builder: &mut Self, d: IrNode| -> IrNode {
            if base == 16 {
                let hex_digit = builder.rt(RuntimeFn::HexDigit);
                builder.call(hex_digit, vec![d])
            } else {
                builder.bi(Bi::AddInteger, vec![builder.int(48), d])
            }
        };

        let (i, go, n) = (self.fresh(), self.fresh(), self.fresh());

        let last_digit = {
            let d = self.bi(
                Bi::ModInteger,
                vec![self.var(n, "n"), self.int(base as i64)],
            );
            let code = digit_code(self, d);
            self.bi(Bi::ConsByteString, vec![code, self.bstr(vec![])])
        };

        let step = self.bi(
            Bi::AppendByteString,
            vec![
                self.call(
                    self.var(go, "go"),
                    vec![self.bi(
                        Bi::QuotientInteger,
                        vec![self.var(n, "n"), self.int(base as i64)],
                    )],
                ),
                last_digit.clone(),
            ],
        );

        let body = self.mite(
            self.bi(
                Bi::LessThanInteger,
                vec![self.var(n, "n"), self.int(base as i64)],
            ),
            last_digit,
            step,
        );

        let g = self.lam(vec![(go, "go".into()), (n, "n".into())], body);
        let go_fixed = self.fixed(g);

        let raw = self.fresh();
        let rendered = self.mite(
            self.bi(
                Bi::LessThanInteger,
                vec![self.var(raw, "n"), self.int(0)],
            ),
            self.bi(
                Bi::AppendByteString,
                vec![
                    self.bstr(vec![b'-']),
                    self.call(
                        go_fixed.clone(),
                        vec![self.bi(
                            Bi::SubtractInteger,
                            vec![self.int(0), self.var(raw, "n")],
                        )],
                    ),
                ],
            ),
            self.call(go_fixed, vec![self.var(raw, "n")]),
        );

        self.lam(
            vec![(i, "i".into())],
            self.bind(
                raw,
                "n",
                self.un_i(self.var(i, "i")),
                self.b_d(rendered),
            ),
        )
    }

    // ----- program assembly

    fn build(mut self) -> IrNode {
        let program = self.program;

        let mut globals: Vec<(usize, String, IrNode, bool)> = vec![];

        for global in &program.order {
            match global {
                Global::Const { unique, name, body } => {
                    let value = self.lower(body);
                    globals.push((*unique, name.clone(), value, false));
                }
                Global::Func(id) => {
                    let mono = &program.monos[*id];
                    let body = mono.body.as_ref().expect("mono body filled by checker");
                    let lowered = self.lower(body);

                    self.site = body.site;
                    let value = self.lam(
                        mono.params
                            .iter()
                            .map(|(u, n, _)| (*u, n.clone()))
                            .collect(),
                        lowered,
                    );

                    globals.push((mono.unique, mono.name.clone(), value, mono.recursive));
                }
            }
        }

        let mut body = self.entry();

        for (unique, name, value, recursive) in globals.into_iter().rev() {
            let value = if recursive {
                let fix = self.rt(RuntimeFn::Fix);
                self.call(fix, vec![self.lam(vec![(unique, name.clone())], value)])
            } else {
                value
            };

            body = self.bind(unique, &name, value, body);
        }

        // the runtime library closes over nothing, so it binds outermost
        for (unique, name, value) in std::mem::take(&mut self.rt_defs).into_iter().rev() {
            body = self.bind(unique, &name, value, body);
        }

        body
    }

    /// The outermost lambda receiving the script's data arguments.
    fn entry(&mut self) -> IrNode {
        let program = self.program;
        let main = &program.monos[program.main];

        let params: Vec<(usize, String)> = main
            .params
            .iter()
            .map(|(_, n, _)| (self.fresh(), n.clone()))
            .collect();

        let main_var = self.var(main.unique, &main.name);
        let applied = self.call(
            main_var,
            params.iter().map(|(u, n)| self.var(*u, n)).collect(),
        );

        let result = match program.purpose {
            Purpose::Testing | Purpose::Module => applied,
            // a validator that returns false fails the script
            Purpose::Spending | Purpose::Minting | Purpose::Staking => {
                let r = self.fresh();
                self.bind(
                    r,
                    "result",
                    applied,
                    self.mite(
                        self.to_bool(self.var(r, "result")),
                        self.var(r, "result"),
                        self.err("validation returned false"),
                    ),
                )
            }
        };

        if params.is_empty() {
            result
        } else {
            self.lam(params, result)
        }
    }

    // ----- expression lowering

    fn lower(&mut self, e: &TypedExpr) -> IrNode {
        let site = e.site;
        self.site = site;

        let node = match &e.kind {
            TypedKind::LitInt(i) => {
                let d = Data::Int(i.clone());
                self.lit_data(d)
            }
            TypedKind::LitBool(b) => self.lit_data(Data::boolean(*b)),
            TypedKind::LitStr(s) => self.lit_data(Data::Bytes(s.as_bytes().to_vec())),
            TypedKind::LitBytes(bs) => self.lit_data(Data::Bytes(bs.clone())),
            TypedKind::LitList(items) => {
                let lowered: Vec<IrNode> = items.iter().map(|i| self.lower(i)).collect();
                self.site = site;
                self.data_list(lowered)
            }
            TypedKind::LitMap(entries) => {
                let lowered: Vec<(IrNode, IrNode)> = entries
                    .iter()
                    .map(|(k, v)| (self.lower(k), self.lower(v)))
                    .collect();
                self.site = site;
                self.data_map(lowered)
            }
            TypedKind::Var { unique, name } | TypedKind::Global { unique, name } => {
                self.var(*unique, name)
            }
            TypedKind::Field { object, index } => {
                let object = self.lower(object);
                self.site = site;

                let mut fields = self.snd(self.un_c(object));
                for _ in 0..*index {
                    fields = self.tail(fields);
                }
                self.head(fields)
            }
            TypedKind::ConstructData { tag, fields } => {
                let lowered: Vec<IrNode> = fields.iter().map(|f| self.lower(f)).collect();
                self.site = site;

                if let Some(literals) = all_literal_data(&lowered) {
                    self.lit_data(Data::Constr(*tag, literals))
                } else {
                    let mut list = self.nil_data();
                    for field in lowered.into_iter().rev() {
                        list = self.bi(Bi::MkCons, vec![field, list]);
                    }
                    self.bi(Bi::ConstrData, vec![self.int(*tag as i64), list])
                }
            }
            TypedKind::Builtin {
                member,
                receiver,
                args,
            } => {
                let recv = self.lower(receiver);
                let lowered: Vec<IrNode> = args.iter().map(|a| self.lower(a)).collect();
                self.site = site;
                self.member_ir(*member, recv, lowered)
            }
            TypedKind::Static { builtin, args } => {
                let lowered: Vec<IrNode> = args.iter().map(|a| self.lower(a)).collect();
                self.site = site;

                match builtin {
                    StaticBuiltin::ValueZero => self.lit_data(Data::Map(vec![])),
                    StaticBuiltin::ValueLovelace => {
                        let amount = lowered.into_iter().next().expect("checked arity");

                        if let IrExpr::Literal(Constant::Data(d)) = &amount.expr {
                            self.lit_data(Data::Map(vec![(
                                Data::Bytes(vec![]),
                                Data::Map(vec![(Data::Bytes(vec![]), d.clone())]),
                            )]))
                        } else {
                            let empty = self.lit_data(Data::Bytes(vec![]));
                            let inner = self.m_d(self.bi(
                                Bi::MkCons,
                                vec![
                                    self.bi(
                                        Bi::MkPairData,
                                        vec![empty.clone(), amount],
                                    ),
                                    self.nil_pairs(),
                                ],
                            ));
                            self.m_d(self.bi(
                                Bi::MkCons,
                                vec![
                                    self.bi(Bi::MkPairData, vec![empty, inner]),
                                    self.nil_pairs(),
                                ],
                            ))
                        }
                    }
                }
            }
            TypedKind::Cast(inner) => self.lower(inner),
            TypedKind::Call { head, args } => {
                let head = self.lower(head);
                let args: Vec<IrNode> = args.iter().map(|a| self.lower(a)).collect();
                self.site = site;
                self.call(head, args)
            }
            TypedKind::Binary { op, left, right } => {
                let lty = left.ty.clone();
                let left = self.lower(left);
                let right = self.lower(right);
                self.site = site;
                self.binary_ir(*op, &lty, left, right)
            }
            TypedKind::Unary { op, operand } => {
                let operand = self.lower(operand);
                self.site = site;

                match op {
                    UnaryOp::Not => self.mite(
                        self.to_bool(operand),
                        self.false_data(),
                        self.true_data(),
                    ),
                    UnaryOp::Neg => self.i_d(self.bi(
                        Bi::SubtractInteger,
                        vec![self.int(0), self.un_i(operand)],
                    )),
                }
            }
            TypedKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = self.lower(cond);
                let then_branch = self.lower(then_branch);
                let else_branch = self.lower(else_branch);
                self.site = site;
                self.mite(self.to_bool(cond), then_branch, else_branch)
            }
            TypedKind::Switch {
                scrutinee,
                arms,
                default,
            } => {
                let scrutinee = self.lower(scrutinee);
                self.site = site;

                let s = self.fresh();
                let t = self.fresh();

                let mut lowered: Vec<(u64, Option<(usize, String)>, IrNode)> = arms
                    .iter()
                    .map(|arm| {
                        let body = self.lower(&arm.body);
                        (arm.tag, arm.binder.clone(), body)
                    })
                    .collect();
                self.site = site;

                let mut chain = match default {
                    Some(d) => {
                        let d = self.lower(d);
                        self.site = site;
                        d
                    }
                    None => {
                        let (_, binder, body) = lowered.pop().expect("exhaustive switch");
                        self.arm_body(binder, s, body)
                    }
                };

                for (tag, binder, body) in lowered.into_iter().rev() {
                    let armed = self.arm_body(binder, s, body);
                    chain = self.mite(
                        self.eq_int(self.var(t, "tag"), self.int(tag as i64)),
                        armed,
                        chain,
                    );
                }

                self.bind(
                    s,
                    "subject",
                    scrutinee,
                    self.bind(
                        t,
                        "tag",
                        self.fst(self.un_c(self.var(s, "subject"))),
                        chain,
                    ),
                )
            }
            TypedKind::Let {
                unique,
                name,
                value,
                body,
            } => {
                let value = self.lower(value);
                let body = self.lower(body);
                self.site = site;
                self.bind(*unique, name, value, body)
            }
            TypedKind::Lambda { params, body } => {
                let body = self.lower(body);
                self.site = site;
                self.lam(
                    params.iter().map(|(u, n, _)| (*u, n.clone())).collect(),
                    body,
                )
            }
            TypedKind::Assert { cond, msg, body } => {
                let cond = self.lower(cond);
                let msg = msg.as_ref().map(|m| self.lower(m));
                let body = self.lower(body);
                self.site = site;

                // the message, when given, is traced on the failure
                // path only; the failure info stays "assert failed"
                let failure = match msg {
                    Some(msg) => {
                        let text = self.bi(Bi::DecodeUtf8, vec![self.un_b(msg)]);
                        self.force(self.bi(
                            Bi::Trace,
                            vec![text, self.delay(self.err("assert failed"))],
                        ))
                    }
                    None => self.err("assert failed"),
                };

                self.mite(self.to_bool(cond), body, failure)
            }
            TypedKind::Print { message, body } => {
                let message = self.lower(message);
                let body = self.lower(body);
                self.site = site;

                let text = self.bi(Bi::DecodeUtf8, vec![self.un_b(message)]);
                self.force(self.bi(Bi::Trace, vec![text, self.delay(body)]))
            }
        };

        node
    }

    fn arm_body(
        &mut self,
        binder: Option<(usize, String)>,
        scrutinee_unique: usize,
        body: IrNode,
    ) -> IrNode {
        match binder {
            Some((unique, name)) => self.bind(
                unique,
                &name,
                self.var(scrutinee_unique, "subject"),
                body,
            ),
            None => body,
        }
    }

    fn data_list(&mut self, items: Vec<IrNode>) -> IrNode {
        if let Some(literals) = all_literal_data(&items) {
            return self.lit_data(Data::List(literals));
        }

        let mut list = self.nil_data();
        for item in items.into_iter().rev() {
            list = self.bi(Bi::MkCons, vec![item, list]);
        }
        self.l_d(list)
    }

    fn data_map(&mut self, entries: Vec<(IrNode, IrNode)>) -> IrNode {
        let all_literal = entries.iter().all(|(k, v)| {
            matches!(&k.expr, IrExpr::Literal(Constant::Data(_)))
                && matches!(&v.expr, IrExpr::Literal(Constant::Data(_)))
        });

        if all_literal {
            let pairs = entries
                .into_iter()
                .map(|(k, v)| match (k.expr, v.expr) {
                    (
                        IrExpr::Literal(Constant::Data(k)),
                        IrExpr::Literal(Constant::Data(v)),
                    ) => (k, v),
                    _ => unreachable!("checked literal"),
                })
                .collect();
            return self.lit_data(Data::Map(pairs));
        }

        let mut list = self.nil_pairs();
        for (k, v) in entries.into_iter().rev() {
            list = self.bi(
                Bi::MkCons,
                vec![self.bi(Bi::MkPairData, vec![k, v]), list],
            );
        }
        self.m_d(list)
    }

    fn binary_ir(&mut self, op: BinaryOp, left_ty: &Type, left: IrNode, right: IrNode) -> IrNode {
        let decl = match left_ty.normalized() {
            Type::Nominal { decl, .. } => Some(decl),
            _ => None,
        };

        match op {
            BinaryOp::And => self.mite(self.to_bool(left), right, self.false_data()),
            BinaryOp::Or => self.mite(self.to_bool(left), self.true_data(), right),
            BinaryOp::Eq if decl == Some(registry::VALUE) => {
                let eq = self.value_eq(left, right);
                eq
            }
            BinaryOp::Neq if decl == Some(registry::VALUE) => {
                let eq = self.value_eq(left, right);
                self.mite(self.to_bool(eq), self.false_data(), self.true_data())
            }
            BinaryOp::Eq => {
                self.from_bool(self.bi(Bi::EqualsData, vec![left, right]))
            }
            BinaryOp::Neq => self.mite(
                self.bi(Bi::EqualsData, vec![left, right]),
                self.false_data(),
                self.true_data(),
            ),
            BinaryOp::Lt => self.from_bool(self.bi(
                Bi::LessThanInteger,
                vec![self.un_i(left), self.un_i(right)],
            )),
            BinaryOp::Le => self.from_bool(self.bi(
                Bi::LessThanEqualsInteger,
                vec![self.un_i(left), self.un_i(right)],
            )),
            BinaryOp::Gt => self.from_bool(self.bi(
                Bi::LessThanInteger,
                vec![self.un_i(right), self.un_i(left)],
            )),
            BinaryOp::Ge => self.from_bool(self.bi(
                Bi::LessThanEqualsInteger,
                vec![self.un_i(right), self.un_i(left)],
            )),
            BinaryOp::Add => match decl {
                Some(registry::STRING) | Some(registry::BYTE_ARRAY) => self.b_d(self.bi(
                    Bi::AppendByteString,
                    vec![self.un_b(left), self.un_b(right)],
                )),
                Some(registry::LIST) => {
                    let concat = self.rt(RuntimeFn::ListConcat);
                    self.call(concat, vec![left, right])
                }
                Some(registry::VALUE) => {
                    let add = self.rt(RuntimeFn::ValueAdd);
                    self.call(add, vec![left, right])
                }
                _ => self.i_d(self.bi(
                    Bi::AddInteger,
                    vec![self.un_i(left), self.un_i(right)],
                )),
            },
            BinaryOp::Sub => self.i_d(self.bi(
                Bi::SubtractInteger,
                vec![self.un_i(left), self.un_i(right)],
            )),
            BinaryOp::Mul => self.i_d(self.bi(
                Bi::MultiplyInteger,
                vec![self.un_i(left), self.un_i(right)],
            )),
            BinaryOp::Div => self.div_like(Bi::DivideInteger, left, right),
            BinaryOp::Rem => self.div_like(Bi::ModInteger, left, right),
        }
    }

    /// Division and modulus guard their divisor so that a zero divisor
    /// reports through the language's own error path.
    fn div_like(&mut self, fun: Bi, left: IrNode, right: IrNode) -> IrNode {
        let d = self.fresh();

        self.bind(
            d,
            "divisor",
            right,
            self.mite(
                self.eq_int(self.un_i(self.var(d, "divisor")), self.int(0)),
                self.err("division by zero"),
                self.i_d(self.bi(
                    fun,
                    vec![self.un_i(left), self.un_i(self.var(d, "divisor"))],
                )),
            ),
        )
    }

    fn value_eq(&mut self, left: IrNode, right: IrNode) -> IrNode {
        let contains = self.rt(RuntimeFn::ValueContains);
        let (a, b) = (self.fresh(), self.fresh());

        self.bind(
            a,
            "a",
            left,
            self.bind(
                b,
                "b",
                right,
                self.mite(
                    self.to_bool(self.call(
                        contains.clone(),
                        vec![self.var(a, "a"), self.var(b, "b")],
                    )),
                    self.call(contains, vec![self.var(b, "b"), self.var(a, "a")]),
                    self.false_data(),
                ),
            ),
        )
    }

    fn member_ir(&mut self, member: BuiltinMember, recv: IrNode, mut args: Vec<IrNode>) -> IrNode {
        use BuiltinMember::*;

        match member {
            Serialize => self.b_d(self.bi(Bi::SerialiseData, vec![recv])),

            ListLength => {
                let raw = self.rt(RuntimeFn::RawLength);
                self.i_d(self.call(raw, vec![self.un_l(recv)]))
            }
            ListIsEmpty => self.from_bool(self.bi(Bi::NullList, vec![self.un_l(recv)])),
            ListHead => self.head(self.un_l(recv)),
            ListTail => self.l_d(self.tail(self.un_l(recv))),
            ListGet => {
                let get = self.rt(RuntimeFn::ListGet);
                self.call(get, vec![recv, args.remove(0)])
            }
            ListPrepend => self.l_d(self.bi(
                Bi::MkCons,
                vec![args.remove(0), self.un_l(recv)],
            )),
            ListMap => {
                let map = self.rt(RuntimeFn::ListMap);
                self.call(map, vec![args.remove(0), recv])
            }
            ListFilter => {
                let filter = self.rt(RuntimeFn::ListFilter);
                self.call(filter, vec![args.remove(0), recv])
            }
            ListFold => {
                let fold = self.rt(RuntimeFn::ListFold);
                let f = args.remove(0);
                let z = args.remove(0);
                self.call(fold, vec![f, z, recv])
            }
            ListAny => {
                let any = self.rt(RuntimeFn::ListAny);
                self.call(any, vec![args.remove(0), recv])
            }
            ListAll => {
                let all = self.rt(RuntimeFn::ListAll);
                self.call(all, vec![args.remove(0), recv])
            }

            MapLength => {
                let raw = self.rt(RuntimeFn::RawLength);
                self.i_d(self.call(raw, vec![self.un_m(recv)]))
            }
            MapIsEmpty => self.from_bool(self.bi(Bi::NullList, vec![self.un_m(recv)])),
            MapGet => {
                let raw_get = self.rt(RuntimeFn::RawGetSafe);
                let r = self.fresh();

                self.bind(
                    r,
                    "found",
                    self.call(raw_get, vec![self.un_m(recv), args.remove(0)]),
                    self.mite(
                        self.eq_int(
                            self.fst(self.un_c(self.var(r, "found"))),
                            self.int(0),
                        ),
                        self.head(self.snd(self.un_c(self.var(r, "found")))),
                        self.err("not found"),
                    ),
                )
            }
            MapGetSafe => {
                let raw_get = self.rt(RuntimeFn::RawGetSafe);
                self.call(raw_get, vec![self.un_m(recv), args.remove(0)])
            }
            MapSet => {
                let k = args.remove(0);
                let v = args.remove(0);
                self.m_d(self.bi(
                    Bi::MkCons,
                    vec![self.bi(Bi::MkPairData, vec![k, v]), self.un_m(recv)],
                ))
            }
            MapDelete => {
                let delete = self.rt(RuntimeFn::MapDelete);
                self.call(delete, vec![recv, args.remove(0)])
            }
            MapMap => {
                let map = self.rt(RuntimeFn::MapMapValues);
                self.call(map, vec![args.remove(0), recv])
            }
            MapFilter => {
                let filter = self.rt(RuntimeFn::MapFilter);
                self.call(filter, vec![args.remove(0), recv])
            }
            MapFold => {
                let fold = self.rt(RuntimeFn::MapFold);
                let f = args.remove(0);
                let z = args.remove(0);
                self.call(fold, vec![f, z, recv])
            }

            OptionUnwrap => self.head(self.snd(self.un_c(recv))),
            OptionIsSome => {
                self.from_bool(self.eq_int(self.fst(self.un_c(recv)), self.int(0)))
            }
            OptionIsNone => {
                self.from_bool(self.eq_int(self.fst(self.un_c(recv)), self.int(1)))
            }

            IntShow => {
                let show = self.rt(RuntimeFn::IntShow);
                self.call(show, vec![recv])
            }
            IntToHex => {
                let to_hex = self.rt(RuntimeFn::IntToHex);
                self.call(to_hex, vec![recv])
            }
            BoolShow => self.mite(
                self.to_bool(recv),
                self.lit_data(Data::Bytes(b"true".to_vec())),
                self.lit_data(Data::Bytes(b"false".to_vec())),
            ),
            BoolToInt => {
                let b = self.fresh();
                self.bind(
                    b,
                    "b",
                    recv,
                    self.i_d(self.fst(self.un_c(self.var(b, "b")))),
                )
            }
            StringEncodeUtf8 => recv,

            ByteArrayLength => {
                self.i_d(self.bi(Bi::LengthOfByteString, vec![self.un_b(recv)]))
            }
            ByteArrayShow => {
                let show = self.rt(RuntimeFn::ByteArrayShow);
                self.call(show, vec![recv])
            }
            ByteArraySlice => {
                let from = args.remove(0);
                let to = args.remove(0);
                let f = self.fresh();

                self.bind(
                    f,
                    "from",
                    self.un_i(from),
                    self.b_d(self.bi(
                        Bi::SliceByteString,
                        vec![
                            self.var(f, "from"),
                            self.bi(
                                Bi::SubtractInteger,
                                vec![self.un_i(to), self.var(f, "from")],
                            ),
                            self.un_b(recv),
                        ],
                    )),
                )
            }
            ByteArrayDecodeUtf8 => self.b_d(self.bi(
                Bi::EncodeUtf8,
                vec![self.bi(Bi::DecodeUtf8, vec![self.un_b(recv)])],
            )),
            ByteArraySha2 => self.b_d(self.bi(Bi::Sha2_256, vec![self.un_b(recv)])),
            ByteArraySha3 => self.b_d(self.bi(Bi::Sha3_256, vec![self.un_b(recv)])),
            ByteArrayBlake2b => self.b_d(self.bi(Bi::Blake2b_256, vec![self.un_b(recv)])),

            ValueIsZero => {
                let contains = self.rt(RuntimeFn::ValueContains);
                self.call(contains, vec![self.lit_data(Data::Map(vec![])), recv])
            }
            ValueGet => {
                let get = self.rt(RuntimeFn::ValueGet);
                let mph = args.remove(0);
                let name = args.remove(0);
                self.call(get, vec![recv, mph, name])
            }

            GetCurrentInput => {
                let get = self.rt(RuntimeFn::GetCurrentInput);
                self.call(get, vec![recv])
            }
        }
    }
}

fn all_literal_data(nodes: &[IrNode]) -> Option<Vec<Data>> {
    nodes
        .iter()
        .map(|n| match &n.expr {
            IrExpr::Literal(Constant::Data(d)) => Some(d.clone()),
            _ => None,
        })
        .collect()
}
