mod common;

use common::*;

use helios::machine::machine::cost_model::{CostModel, ExBudget};
use helios::primitives::Data;
use helios::RunFailure;
use indoc::indoc;
use pretty_assertions::assert_eq;

#[test]
fn integer_division() {
    let src = "testing int_div func main(a: Int, b: Int) -> Int { a / b }";
    let compiled = compile(src);

    let report = run(&compiled, &[int(10), int(3)]);
    assert_eq!(report.data(), Some(&int(3)));

    let report = run(&compiled, &[int(10), int(0)]);
    assert_eq!(report.failure_info(), Some("division by zero"));
}

#[test]
fn division_failure_carries_a_source_site() {
    let src = "testing int_div\nfunc main(a: Int, b: Int) -> Int { a / b }";
    let report = eval(src, &[int(1), int(0)]);

    let Err(RunFailure::Runtime { info, site }) = &report.outcome else {
        panic!("expected runtime failure, got {:?}", report.outcome);
    };
    assert_eq!(info, "division by zero");
    assert!(site.as_deref().unwrap_or_default().starts_with("test.hl:2:"));
}

#[test]
fn bytearray_show_renders_hex() {
    let src = "testing bytearray_show func main(b: ByteArray) -> String { b.show() }";
    let report = eval(src, &[bytes(&[0xde, 0xad, 0xbe, 0xef])]);

    assert_eq!(report.data(), Some(&string("deadbeef")));
}

#[test]
fn boolean_and_short_circuits_a_failing_right_side() {
    let src = "testing bool_and func main(a: Bool, b: Int) -> Bool { a && (10 / b == 0) }";
    let compiled = compile(src);

    // the right side divides by zero but is never demanded
    let report = run(&compiled, &[boolean(false), int(0)]);
    assert_eq!(report.data(), Some(&boolean(false)));

    let report = run(&compiled, &[boolean(true), int(0)]);
    assert_eq!(report.failure_info(), Some("division by zero"));
}

#[test]
fn boolean_or_short_circuits() {
    let src = "testing bool_or func main() -> Bool { true || (1 / 0 == 0) }";
    let report = eval(src, &[]);

    assert_eq!(report.data(), Some(&boolean(true)));
}

#[test]
fn map_get_finds_first_match() {
    let src = "testing map_get func main(m: Map[Int]Int, key: Int) -> Int { m.get(key) }";
    let compiled = compile(src);

    let m = Data::Map(vec![(int(1), int(10)), (int(2), int(20))]);

    let report = run(&compiled, &[m.clone(), int(2)]);
    assert_eq!(report.data(), Some(&int(20)));

    let report = run(&compiled, &[m, int(3)]);
    assert_eq!(report.failure_info(), Some("not found"));
}

#[test]
fn option_unwrap() {
    let src = "testing option_unwrap func main(o: Option[Int]) -> Int { o.unwrap() }";
    let compiled = compile(src);

    let report = run(&compiled, &[Data::some(int(7))]);
    assert_eq!(report.data(), Some(&int(7)));

    let report = run(&compiled, &[Data::none()]);
    assert_eq!(report.failure_info(), Some("empty list"));
}

#[test]
fn empty_list_head_fails_with_info() {
    let src = "testing list_head func main() -> Int { []Int{}.head }";
    let report = eval(src, &[]);

    assert_eq!(report.failure_info(), Some("empty list"));
}

#[test]
fn list_concat_length_distributes() {
    let src = indoc! {"
        testing list_len
        func main(xs: []Int, ys: []Int) -> Bool {
            (xs + ys).length == xs.length + ys.length
        }
    "};
    let compiled = compile(src);

    for (xs, ys) in [
        (vec![], vec![]),
        (vec![int(1)], vec![]),
        (vec![int(1), int(2)], vec![int(3), int(4), int(5)]),
    ] {
        let report = run(&compiled, &[Data::List(xs), Data::List(ys)]);
        assert_eq!(report.data(), Some(&boolean(true)));
    }
}

#[test]
fn list_fold_sums() {
    let src = indoc! {"
        testing list_sum
        func add(acc: Int, x: Int) -> Int { acc + x }
        func main(xs: []Int) -> Int { xs.fold(add, 0) }
    "};
    let compiled = compile(src);

    let report = run(
        &compiled,
        &[Data::List(vec![int(1), int(2), int(3), int(4)])],
    );
    assert_eq!(report.data(), Some(&int(10)));
}

#[test]
fn list_map_and_filter_preserve_order() {
    let src = indoc! {"
        testing list_ops
        func double(x: Int) -> Int { x * 2 }
        func positive(x: Int) -> Bool { x > 0 }
        func main(xs: []Int) -> []Int { xs.filter(positive).map(double) }
    "};

    let report = eval(
        src,
        &[Data::List(vec![int(3), int(-1), int(2), int(0), int(5)])],
    );
    assert_eq!(
        report.data(),
        Some(&Data::List(vec![int(6), int(4), int(10)]))
    );
}

#[test]
fn map_delete_then_get_safe_is_none() {
    let src = indoc! {"
        testing map_del
        func main(m: Map[Int]Int, k: Int) -> Option[Int] {
            m.delete(k).get_safe(k)
        }
    "};

    let m = Data::Map(vec![(int(1), int(10)), (int(2), int(20)), (int(1), int(30))]);
    let report = eval(src, &[m, int(1)]);

    assert_eq!(report.data(), Some(&Data::none()));
}

#[test]
fn map_set_after_delete_wins_on_get() {
    let src = indoc! {"
        testing map_set
        func main(m: Map[Int]Int, k: Int, v: Int) -> Int {
            m.delete(k).set(k, v).get(k)
        }
    "};

    let m = Data::Map(vec![(int(1), int(10))]);
    let report = eval(src, &[m, int(1), int(99)]);

    assert_eq!(report.data(), Some(&int(99)));
}

#[test]
fn map_fold_sees_insertion_order() {
    let src = indoc! {"
        testing map_fold
        func keep_first(acc: Int, k: Int, v: Int) -> Int {
            if (acc == 0 - 1) { v } else { acc }
        }
        func main(m: Map[Int]Int) -> Int { m.fold(keep_first, 0 - 1) }
    "};

    let m = Data::Map(vec![(int(5), int(50)), (int(6), int(60))]);
    let report = eval(src, &[m]);

    assert_eq!(report.data(), Some(&int(50)));
}

#[test]
fn switch_over_user_enum() {
    let src = indoc! {"
        testing shapes

        struct Point { x: Int, y: Int }

        enum Shape {
            Circle { r: Int },
            Square { side: Int }
        }

        impl Point {
            func manhattan(self) -> Int { self.x + self.y }
        }

        func area2(s: Shape) -> Int {
            s.switch {
                c: Circle => c.r * c.r * 3,
                sq: Square => sq.side * sq.side
            }
        }

        func main(a: Int) -> Int {
            p = Point{x: a, y: 2};
            s = Shape::Circle(4);
            p.manhattan() + area2(s)
        }
    "};

    let report = eval(src, &[int(1)]);
    assert_eq!(report.data(), Some(&int(51)));
}

#[test]
fn generic_function_specialises_and_runs() {
    let src = indoc! {"
        testing generics
        func id[T](x: T) -> T { x }
        func main(a: Int) -> Int { id(a) + id[Int](7) }
    "};

    let report = eval(src, &[int(35)]);
    assert_eq!(report.data(), Some(&int(42)));
}

#[test]
fn recursion_through_the_fixpoint() {
    let src = indoc! {"
        testing fact
        func fact(n: Int) -> Int { if (n <= 1) { 1 } else { n * fact(n - 1) } }
        func main(n: Int) -> Int { fact(n) }
    "};

    let report = eval(src, &[int(5)]);
    assert_eq!(report.data(), Some(&int(120)));
}

#[test]
fn constants_are_bound_once() {
    let src = indoc! {"
        testing consts
        const TEN: Int = 10
        func main(a: Int) -> Int { TEN + a }
    "};

    let report = eval(src, &[int(2)]);
    assert_eq!(report.data(), Some(&int(12)));
}

#[test]
fn assert_failure_surfaces_info() {
    let src = "testing asrt func main(x: Int) -> Int { assert(x > 0); x }";
    let compiled = compile(src);

    let report = run(&compiled, &[int(5)]);
    assert_eq!(report.data(), Some(&int(5)));

    let report = run(&compiled, &[int(-1)]);
    assert_eq!(report.failure_info(), Some("assert failed"));
}

#[test]
fn assert_message_is_traced_on_the_failure_path() {
    let src =
        "testing asrt2 func main(x: Int) -> Int { assert(x > 0, \"x must be positive\"); x }";
    let compiled = compile(src);

    let report = run(&compiled, &[int(3)]);
    assert_eq!(report.data(), Some(&int(3)));
    assert!(report.logs.is_empty());

    let report = run(&compiled, &[int(0)]);
    assert_eq!(report.failure_info(), Some("assert failed"));
    assert!(report.logs.contains(&"x must be positive".to_string()));
}

#[test]
fn non_ascii_strings_survive_the_pipeline() {
    let src = "testing unicode func main() -> String { print(\"čau ✓\"); \"héllo\" }";
    let report = eval(src, &[]);

    assert_eq!(report.data(), Some(&string("héllo")));
    assert_eq!(report.logs, vec!["čau ✓".to_string()]);
}

#[test]
fn print_collects_trace_logs() {
    let src = "testing prn func main(x: Int) -> Int { print(\"checking\"); x }";
    let report = eval(src, &[int(1)]);

    assert_eq!(report.data(), Some(&int(1)));
    assert_eq!(report.logs, vec!["checking".to_string()]);
}

#[test]
fn serialization_matches_canonical_cbor() {
    let src = "testing ser func main(x: Int) -> ByteArray { x.serialize() }";
    let report = eval(src, &[int(1000)]);

    assert_eq!(report.data(), Some(&bytes(&int(1000).to_cbor())));
}

#[test]
fn string_show_of_integers() {
    let src = "testing show func main(x: Int) -> String { x.show() }";
    let compiled = compile(src);

    for (input, expected) in [(0, "0"), (7, "7"), (120, "120"), (-45, "-45")] {
        let report = run(&compiled, &[int(input)]);
        assert_eq!(report.data(), Some(&string(expected)), "showing {input}");
    }
}

#[test]
fn optimized_and_raw_programs_agree() {
    let sources = [
        "testing a func main(a: Int, b: Int) -> Int { (a + 0) * 1 + b * 2 }",
        "testing b func main(o: Option[Int]) -> Int { o.switch { x: Some => x.some, None => 0 - 1 } }",
        "testing c func main(a: Int) -> Bool { a == a || 1 / 0 == 0 }",
    ];

    let cases = [
        vec![int(3), int(4)],
        vec![Data::some(int(9))],
        vec![int(5)],
    ];

    for (src, args) in sources.iter().zip(&cases) {
        let optimized = run(&compile(src), args);
        let raw = run(&compile_raw(src), args);

        match (&optimized.outcome, &raw.outcome) {
            (Ok(a), Ok(b)) => assert_eq!(a, b, "{src}"),
            (Err(RunFailure::Runtime { info: a, .. }), Err(RunFailure::Runtime { info: b, .. })) => {
                assert_eq!(a, b, "{src}")
            }
            other => panic!("optimized and raw disagree for {src}: {other:?}"),
        }
    }
}

#[test]
fn budget_exhaustion_reports_consumption() {
    let src = indoc! {"
        testing spin
        func count(n: Int) -> Int { if (n <= 0) { 0 } else { count(n - 1) } }
        func main(n: Int) -> Int { count(n) }
    "};
    let compiled = compile(src);

    let report = helios::run(
        &compiled,
        &[int(1000000)],
        &CostModel::default(),
        ExBudget::new(100000, 1000000),
    );

    let Err(RunFailure::OutOfBudget { consumed }) = report.outcome else {
        panic!("expected budget exhaustion, got {:?}", report.outcome);
    };
    assert!(consumed.cpu >= 1000000 || consumed.mem >= 100000);
    assert_eq!(report.consumed, consumed);
}

#[test]
fn profile_reports_mem_cpu_and_size() {
    let src = "testing prof func main(a: Int) -> Int { a * a }";
    let compiled = compile(src);

    let profile = helios::profile(
        &compiled,
        &[int(12)],
        &CostModel::default(),
        ExBudget::default(),
    );

    assert!(profile.mem > 0);
    assert!(profile.cpu > 0);
    assert!(profile.size > 0);
}

#[test]
fn flat_encoding_round_trips_compiled_programs() {
    let src = "testing codec func main(a: Int) -> Int { a + 1 }";
    let compiled = compile(src);

    let bytes = compiled.program.to_flat();
    let decoded = helios::machine::Program::from_flat(&bytes).unwrap();

    assert_eq!(decoded, compiled.program);
    assert_eq!(decoded.to_flat(), bytes);
}
