mod common;

use common::*;

use helios::machine::fuzz::{run_cases, ArgSampler, Outcome};
use helios::machine::machine::cost_model::{CostModel, ExBudget};
use helios::machine::Term;
use indoc::indoc;

fn is_true(outcome: &Outcome) -> bool {
    matches!(
        outcome,
        Outcome::Value(Term::Constant(c))
            if *c == helios::machine::Constant::Data(boolean(true))
    )
}

#[test]
fn addition_commutes() {
    let src = "testing comm func main(a: Int, b: Int) -> Bool { a + b == b + a }";
    let compiled = compile(src);

    let report = run_cases(
        &compiled.program,
        &[
            ArgSampler::Int { min: -1000, max: 1000 },
            ArgSampler::Int { min: -1000, max: 1000 },
        ],
        100,
        1,
        &CostModel::default(),
        ExBudget::default(),
        |_, outcome| is_true(outcome),
    );

    assert!(report.all_accepted(), "{:?}", report.counterexamples().next());
}

#[test]
fn multiplication_by_zero_annihilates() {
    let src = "testing zero func main(a: Int) -> Bool { a * 0 == 0 }";
    let compiled = compile(src);

    let report = run_cases(
        &compiled.program,
        &[ArgSampler::Int { min: -100000, max: 100000 }],
        100,
        2,
        &CostModel::default(),
        ExBudget::default(),
        |_, outcome| is_true(outcome),
    );

    assert!(report.all_accepted());
}

#[test]
fn self_division_is_one_unless_zero() {
    let src = "testing selfdiv func main(a: Int) -> Int { a / a }";
    let compiled = compile(src);

    let report = run_cases(
        &compiled.program,
        &[ArgSampler::Int { min: -50, max: 50 }],
        200,
        3,
        &CostModel::default(),
        ExBudget::default(),
        |args, outcome| {
            let zero = args[0] == int(0);
            match outcome {
                Outcome::Value(Term::Constant(c)) => {
                    !zero && *c == helios::machine::Constant::Data(int(1))
                }
                Outcome::Failure(info) => zero && info == "division by zero",
                _ => false,
            }
        },
    );

    assert!(report.all_accepted());
}

#[test]
fn on_chain_serialization_agrees_with_the_host_codec() {
    let src = indoc! {"
        testing ser
        func main(v: Data) -> ByteArray { v.serialize() }
    "};
    let compiled = compile(src);

    let sampler = ArgSampler::OneOf(vec![
        ArgSampler::Int { min: -1000000, max: 1000000 },
        ArgSampler::Bytes { max_len: 80 },
        ArgSampler::ListOf {
            item: Box::new(ArgSampler::Int { min: 0, max: 100 }),
            max_len: 5,
        },
        ArgSampler::MapOf {
            key: Box::new(ArgSampler::Bytes { max_len: 4 }),
            value: Box::new(ArgSampler::Int { min: 0, max: 100 }),
            max_len: 4,
        },
        ArgSampler::ConstrOf {
            tag: 3,
            fields: vec![ArgSampler::Int { min: 0, max: 10 }],
        },
    ]);

    let report = run_cases(
        &compiled.program,
        &[sampler],
        100,
        4,
        &CostModel::default(),
        ExBudget::default(),
        |args, outcome| match outcome {
            Outcome::Value(Term::Constant(c)) => {
                *c == helios::machine::Constant::Data(bytes(&args[0].to_cbor()))
            }
            _ => false,
        },
    );

    assert!(report.all_accepted());
}

#[test]
fn fuzz_reports_list_failing_inputs() {
    let src = "testing sometimes func main(a: Int) -> Int { 10 / a }";
    let compiled = compile(src);

    let report = run_cases(
        &compiled.program,
        &[ArgSampler::Int { min: 0, max: 1 }],
        50,
        5,
        &CostModel::default(),
        ExBudget::default(),
        |_, outcome| matches!(outcome, Outcome::Value(_)),
    );

    // zero divisors must appear among the counterexamples
    let failures: Vec<_> = report.counterexamples().collect();
    assert!(!failures.is_empty());

    for case in failures {
        assert_eq!(case.args[0], int(0));
        assert_eq!(case.outcome, Outcome::Failure("division by zero".to_string()));
    }
}

#[test]
fn cost_overrides_change_profiles() {
    let src = "testing cost func main(a: Int, b: Int) -> Int { a + b }";
    let compiled = compile(src);

    let cheap = helios::profile(
        &compiled,
        &[int(1), int(2)],
        &CostModel::default(),
        ExBudget::default(),
    );

    let mut pricey_model = CostModel::default();
    pricey_model.apply_overrides(
        &[("addInteger-cpu".to_string(), 5000000i64)]
            .into_iter()
            .collect(),
    );

    let pricey = helios::profile(
        &compiled,
        &[int(1), int(2)],
        &pricey_model,
        ExBudget::default(),
    );

    assert!(pricey.cpu > cheap.cpu);
    assert_eq!(pricey.size, cheap.size);
}
