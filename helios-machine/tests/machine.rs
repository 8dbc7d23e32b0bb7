use helios_machine::builtins::DefaultFunction;
use helios_machine::machine::cost_model::{CostModel, ExBudget};
use helios_machine::{eval_program, Constant, ConstType, Program, Term};
use helios_primitives::Data;
use indoc::indoc;
use num_bigint::BigInt;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn arb_constant() -> impl Strategy<Value = Constant> {
    let leaf = prop_oneof![
        Just(Constant::Unit),
        any::<bool>().prop_map(Constant::Bool),
        any::<i128>().prop_map(|i| Constant::Integer(BigInt::from(i))),
        proptest::collection::vec(any::<u8>(), 0..40).prop_map(Constant::ByteString),
        "[a-z]{0,12}".prop_map(Constant::String),
        any::<i64>().prop_map(|i| Constant::Data(Data::integer(i))),
    ];

    leaf.prop_recursive(2, 12, 4, |inner| {
        prop_oneof![
            proptest::collection::vec(
                any::<i64>().prop_map(|i| Constant::Integer(BigInt::from(i))),
                0..4
            )
            .prop_map(|xs| Constant::ProtoList(ConstType::Integer, xs)),
            (inner.clone(), inner).prop_map(|(a, b)| {
                Constant::ProtoPair(
                    a.const_type(),
                    b.const_type(),
                    Box::new(a),
                    Box::new(b),
                )
            }),
        ]
    })
}

fn arb_term() -> impl Strategy<Value = Term> {
    let leaf = prop_oneof![
        (1u64..5).prop_map(Term::Var),
        arb_constant().prop_map(Term::Constant),
        Just(Term::Error),
        Just(Term::Builtin(DefaultFunction::AddInteger)),
        Just(Term::Builtin(DefaultFunction::HeadList)),
    ];

    leaf.prop_recursive(4, 24, 3, |inner| {
        prop_oneof![
            inner.clone().prop_map(|t| t.delay()),
            inner.clone().prop_map(|t| t.force()),
            inner.clone().prop_map(Term::lambda),
            (inner.clone(), inner).prop_map(|(f, a)| f.apply(a)),
        ]
    })
}

proptest! {
    #[test]
    fn flat_round_trip(term in arb_term()) {
        let program = Program::new((1, 0, 0), term);
        let bytes = program.to_flat();
        let decoded = Program::from_flat(&bytes).unwrap();

        prop_assert_eq!(&decoded, &program);
        prop_assert_eq!(decoded.to_flat(), bytes);
    }
}

#[test]
fn applied_arguments_reach_the_body() {
    // \x -> \y -> x - y, applied to 10 and 4
    let body = Term::Builtin(DefaultFunction::SubtractInteger)
        .apply(Term::Var(2))
        .apply(Term::Var(1));
    let program = Program::new((1, 0, 0), Term::lambda(Term::lambda(body)))
        .apply_term(Term::integer(10))
        .apply_term(Term::integer(4));

    let out = eval_program(&program, &CostModel::default(), ExBudget::default());
    assert_eq!(out.result.unwrap(), Term::integer(6));
}

#[test]
fn data_arguments_wrap_as_constants() {
    let program = Program::new(
        (1, 0, 0),
        Term::lambda(Term::Builtin(DefaultFunction::UnIData).apply(Term::Var(1))),
    )
    .apply_data(Data::integer(99));

    let out = eval_program(&program, &CostModel::default(), ExBudget::default());
    assert_eq!(
        out.result.unwrap(),
        Term::Constant(Constant::Integer(99.into()))
    );
}

#[test]
fn cost_model_json_drives_the_meter() {
    let raw = indoc! {r#"
        {
            "machine": {
                "startup": { "mem": 1, "cpu": 1 },
                "var": { "mem": 1, "cpu": 1 },
                "constant": { "mem": 1, "cpu": 1 },
                "lambda": { "mem": 1, "cpu": 1 },
                "delay": { "mem": 1, "cpu": 1 },
                "force": { "mem": 1, "cpu": 1 },
                "apply": { "mem": 1, "cpu": 1 },
                "builtin": { "mem": 1, "cpu": 1 }
            },
            "builtins": {
                "addInteger": {
                    "mem": { "constant": 1 },
                    "cpu": { "constant": 10 }
                }
            }
        }
    "#};

    let costs = CostModel::from_json(raw).unwrap();

    let term = Term::Builtin(DefaultFunction::AddInteger)
        .apply(Term::integer(1))
        .apply(Term::integer(2));

    let out = eval_program(
        &Program::new((1, 0, 0), term),
        &costs,
        ExBudget::new(1000, 1000),
    );

    assert_eq!(out.result.unwrap(), Term::integer(3));
    // startup, five compute steps (two applies, the builtin, two
    // constants), one priced builtin call
    assert_eq!(out.consumed.cpu, 1 + 5 + 10);
}

#[test]
fn trace_logs_survive_budget_failures() {
    let term = Term::Builtin(DefaultFunction::Trace)
        .force()
        .apply(Term::Constant(Constant::String("step one".into())))
        .apply(Term::Error.delay())
        .force();

    let out = eval_program(
        &Program::new((1, 0, 0), term),
        &CostModel::default(),
        ExBudget::default(),
    );

    assert!(out.result.is_err());
    assert_eq!(out.logs, vec!["step one".to_string()]);
}
