use helios_lang::error::LangError;
use helios_lang::{compile, compile_with_modules, peek_purpose};
use indoc::indoc;
use pretty_assertions::assert_eq;

#[test]
fn compiles_a_minimal_testing_script() {
    let compiled = compile("test.hl", "testing t func main(a: Int) -> Int { a + 1 }", true)
        .unwrap();

    assert_eq!(compiled.name, "t");
    assert_eq!(compiled.program.version, helios_lang::LANGUAGE_VERSION);
}

#[test]
fn purpose_peek_does_not_compile() {
    let (purpose, name) =
        peek_purpose("test.hl", "minting gadget func main( broken").unwrap();
    assert_eq!(purpose, "minting");
    assert_eq!(name, "gadget");
}

#[test]
fn type_mismatch_is_fatal() {
    let err = compile("test.hl", "testing t func main() -> Int { 1 + true }", true)
        .unwrap_err();
    assert!(matches!(err, LangError::Type { .. }));
}

#[test]
fn undefined_name_is_a_reference_error() {
    let err = compile("test.hl", "testing t func main() -> Int { missing }", true)
        .unwrap_err();
    assert!(matches!(err, LangError::Reference { .. }));
}

#[test]
fn return_type_is_checked() {
    let err = compile("test.hl", "testing t func main() -> Bool { 42 }", true)
        .unwrap_err();
    assert!(matches!(err, LangError::Type { .. }));
}

#[test]
fn non_exhaustive_switch_is_rejected() {
    let src = indoc! {"
        testing t
        func main(o: Option[Int]) -> Int {
            o.switch { x: Some => x.some }
        }
    "};

    let err = compile("test.hl", src, true).unwrap_err();
    assert!(matches!(err, LangError::Type { .. }));
}

#[test]
fn switch_with_else_covers_the_rest() {
    let src = indoc! {"
        testing t
        func main(o: Option[Int]) -> Int {
            o.switch { x: Some => x.some, else => 0 }
        }
    "};

    compile("test.hl", src, true).unwrap();
}

#[test]
fn generic_functions_are_monomorphised_per_instantiation() {
    let src = indoc! {"
        testing t
        func id[T](x: T) -> T { x }
        func main(a: Int, b: ByteArray) -> Int {
            c = id(a);
            d = id(b);
            c + d.length
        }
    "};

    let compiled = compile("test.hl", src, false).unwrap();
    let ir = compiled.pretty_ir();

    assert!(ir.contains("id[Int]"));
    assert!(ir.contains("id[ByteArray]"));
}

#[test]
fn mutual_recursion_is_reported_as_a_cycle() {
    let src = indoc! {"
        testing t
        func even(n: Int) -> Bool { if (n == 0) { true } else { odd(n - 1) } }
        func odd(n: Int) -> Bool { if (n == 0) { false } else { even(n - 1) } }
        func main(n: Int) -> Bool { even(n) }
    "};

    let err = compile("test.hl", src, true).unwrap_err();
    assert!(matches!(err, LangError::Type { .. }));
}

#[test]
fn self_recursion_is_allowed() {
    let src = indoc! {"
        testing t
        func fact(n: Int) -> Int { if (n <= 1) { 1 } else { n * fact(n - 1) } }
        func main(n: Int) -> Int { fact(n) }
    "};

    compile("test.hl", src, true).unwrap();
}

#[test]
fn spending_signature_is_enforced() {
    let err = compile(
        "test.hl",
        "spending v func main(ctx: ScriptContext) -> Bool { true }",
        true,
    )
    .unwrap_err();
    assert!(matches!(err, LangError::Type { .. }));

    compile(
        "test.hl",
        "spending v func main(d: Int, r: Int, ctx: ScriptContext) -> Bool { true }",
        true,
    )
    .unwrap();
}

#[test]
fn modules_resolve_through_imports() {
    let module = "module utils func double(x: Int) -> Int { x * 2 }";
    let main = "testing t import utils func main(a: Int) -> Int { double(a) }";

    compile_with_modules("main.hl", main, &[("utils.hl", module)], true).unwrap();

    let missing = compile_with_modules("main.hl", main, &[], true).unwrap_err();
    assert!(matches!(missing, LangError::Reference { .. }));
}

#[test]
fn module_purpose_cannot_be_compiled_directly() {
    let err = compile("m.hl", "module m func main() -> Int { 1 }", true).unwrap_err();
    assert!(matches!(err, LangError::Type { .. }));
}

#[test]
fn optimizer_folds_constant_arithmetic() {
    let folded = compile("test.hl", "testing t func main() -> Int { 2 + 3 * 4 }", true)
        .unwrap();
    let raw = compile("test.hl", "testing t func main() -> Int { 2 + 3 * 4 }", false)
        .unwrap();

    assert!(folded.ir.count() < raw.ir.count());
    assert!(folded.pretty_ir().contains("14"));
}

#[test]
fn errors_carry_sites_that_render() {
    let err = compile("widget.hl", "testing t\nfunc main() -> Int { nope }", true)
        .unwrap_err();

    let LangError::Reference { site, .. } = err else {
        panic!("expected reference error");
    };
    assert_eq!(site.source, 0);
    assert!(site.start > 0);
}

#[test]
fn pretty_ir_is_annotated_with_sites() {
    let compiled = compile("annot.hl", "testing t func main(a: Int) -> Int { a }", false)
        .unwrap();
    assert!(compiled.pretty_ir().contains("annot.hl:"));
}

#[test]
fn emitted_bytecode_is_deterministic() {
    let src = "testing t func main(a: Int, b: Int) -> Int { a * b + 1 }";

    let first = compile("test.hl", src, true).unwrap().program.to_flat();
    let second = compile("test.hl", src, true).unwrap().program.to_flat();

    assert_eq!(first, second);
}
