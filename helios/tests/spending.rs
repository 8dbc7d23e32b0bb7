mod common;

use common::*;

use helios::primitives::Data;
use helios::tx::{Address, TxFixture, TxInput, TxOutput, TxOutputId, Value};
use indoc::indoc;
use pretty_assertions::assert_eq;

fn balanced_fixture() -> (TxFixture, TxOutputId) {
    let script_utxo = TxOutputId::new(vec![0xaa; 32], 0);

    let tx = TxFixture::new()
        .input(TxInput::new(
            script_utxo.clone(),
            TxOutput::new(Address::validator(vec![0x01; 28]), Value::lovelace(100)),
        ))
        .input(TxInput::new(
            TxOutputId::new(vec![0xbb; 32], 1),
            TxOutput::new(Address::pub_key(vec![0x02; 28]), Value::lovelace(40)),
        ))
        .output(TxOutput::new(
            Address::pub_key(vec![0x03; 28]),
            Value::lovelace(130),
        ))
        .fee(Value::lovelace(10));

    (tx, script_utxo)
}

#[test]
fn spending_script_sees_a_balanced_transaction() {
    let src = indoc! {"
        spending balance

        func add_input(acc: Value, i: TxInput) -> Value { acc + i.output.value }
        func add_output(acc: Value, o: TxOutput) -> Value { acc + o.value }

        func main(datum: Int, redeemer: Int, ctx: ScriptContext) -> Bool {
            tx = ctx.tx;
            in_total = tx.inputs.fold(add_input, Value::ZERO);
            out_total = tx.outputs.fold(add_output, Value::ZERO);
            in_total + tx.minted == tx.fee + out_total
        }
    "};
    let compiled = compile(src);

    let (tx, script_utxo) = balanced_fixture();
    let ctx = tx.spending_context(&script_utxo);

    let report = run(&compiled, &[int(0), int(0), ctx]);
    assert_eq!(report.outcome.as_ref().err(), None);
    assert_eq!(report.data(), Some(&boolean(true)));
}

#[test]
fn current_input_matches_the_script_purpose() {
    let src = indoc! {"
        spending current

        func main(datum: Int, redeemer: Int, ctx: ScriptContext) -> Bool {
            input = ctx.get_current_input();
            input.output.value.get(#, #) == 100
        }
    "};
    let compiled = compile(src);

    let (tx, script_utxo) = balanced_fixture();

    let report = run(&compiled, &[int(0), int(0), tx.spending_context(&script_utxo)]);
    assert_eq!(report.data(), Some(&boolean(true)));

    // an output id that is not among the inputs cannot be resolved
    let elsewhere = TxOutputId::new(vec![0xcc; 32], 7);
    let report = run(&compiled, &[int(0), int(0), tx.spending_context(&elsewhere)]);
    assert_eq!(report.failure_info(), Some("not found"));
}

#[test]
fn validator_returning_false_fails_the_script() {
    let src = indoc! {"
        spending deny
        func main(datum: Int, redeemer: Int, ctx: ScriptContext) -> Bool { datum == 1 }
    "};
    let compiled = compile(src);

    let (tx, script_utxo) = balanced_fixture();
    let ctx = tx.spending_context(&script_utxo);

    let report = run(&compiled, &[int(1), int(0), ctx.clone()]);
    assert_eq!(report.data(), Some(&boolean(true)));

    let report = run(&compiled, &[int(0), int(0), ctx]);
    assert_eq!(report.failure_info(), Some("validation returned false"));
}

#[test]
fn tx_queries_are_pure() {
    // reading the same field twice observes the same value
    let src = indoc! {"
        spending pure_query
        func main(datum: Int, redeemer: Int, ctx: ScriptContext) -> Bool {
            ctx.tx.fee == ctx.tx.fee && ctx.tx.inputs.length == ctx.tx.inputs.length
        }
    "};
    let compiled = compile(src);

    let (tx, script_utxo) = balanced_fixture();
    let report = run(&compiled, &[int(0), int(0), tx.spending_context(&script_utxo)]);

    assert_eq!(report.data(), Some(&boolean(true)));
}

#[test]
fn minted_assets_participate_in_the_balance() {
    let src = indoc! {"
        spending mint_balance

        func add_input(acc: Value, i: TxInput) -> Value { acc + i.output.value }
        func add_output(acc: Value, o: TxOutput) -> Value { acc + o.value }

        func main(datum: Int, redeemer: Int, ctx: ScriptContext) -> Bool {
            tx = ctx.tx;
            in_total = tx.inputs.fold(add_input, Value::ZERO);
            out_total = tx.outputs.fold(add_output, Value::ZERO);
            in_total + tx.minted == tx.fee + out_total
        }
    "};
    let compiled = compile(src);

    let script_utxo = TxOutputId::new(vec![0xaa; 32], 0);
    let minted = Value::asset(b"policy".to_vec(), b"token".to_vec(), 5);

    let tx = TxFixture::new()
        .input(TxInput::new(
            script_utxo.clone(),
            TxOutput::new(Address::validator(vec![0x01; 28]), Value::lovelace(50)),
        ))
        .output(TxOutput::new(
            Address::pub_key(vec![0x03; 28]),
            Value::lovelace(45).add(minted.clone()),
        ))
        .fee(Value::lovelace(5))
        .minted(minted);

    let report = run(&compiled, &[int(0), int(0), tx.spending_context(&script_utxo)]);
    assert_eq!(report.data(), Some(&boolean(true)));
}

#[test]
fn context_round_trips_through_cbor() {
    let (tx, script_utxo) = balanced_fixture();
    let ctx = tx.spending_context(&script_utxo);

    let decoded = Data::from_cbor(&ctx.to_cbor()).unwrap();
    assert_eq!(decoded, ctx);
}
