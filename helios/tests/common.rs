use helios::lang::CompiledProgram;
use helios::machine::machine::cost_model::{CostModel, ExBudget};
use helios::primitives::Data;
use helios::RunReport;

pub fn compile(src: &str) -> CompiledProgram {
    helios::compile("test.hl", src, true).unwrap()
}

pub fn compile_raw(src: &str) -> CompiledProgram {
    helios::compile("test.hl", src, false).unwrap()
}

pub fn run(compiled: &CompiledProgram, args: &[Data]) -> RunReport {
    helios::run(compiled, args, &CostModel::default(), ExBudget::default())
}

pub fn eval(src: &str, args: &[Data]) -> RunReport {
    run(&compile(src), args)
}

pub fn int(i: i64) -> Data {
    Data::integer(i)
}

pub fn boolean(b: bool) -> Data {
    Data::boolean(b)
}

pub fn bytes(bs: &[u8]) -> Data {
    Data::Bytes(bs.to_vec())
}

pub fn string(s: &str) -> Data {
    Data::Bytes(s.as_bytes().to_vec())
}
