//! Script-context fixtures: typed builders that assemble the data
//! value a validator receives as its `ScriptContext` argument.
//!
//! The encoding mirrors the language's own layout: struct-shaped types
//! are `Constr(0, fields)`, enum variants use their declaration-order
//! tag, and `Value` is a nested map keyed by policy then asset name.

use helios_primitives::Data;
use num_bigint::BigInt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    PubKey(Vec<u8>),
    Validator(Vec<u8>),
}

impl Credential {
    pub fn to_data(&self) -> Data {
        match self {
            Credential::PubKey(hash) => Data::constr(0, vec![Data::Bytes(hash.clone())]),
            Credential::Validator(hash) => Data::constr(1, vec![Data::Bytes(hash.clone())]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub credential: Credential,
}

impl Address {
    pub fn pub_key(hash: impl Into<Vec<u8>>) -> Self {
        Address {
            credential: Credential::PubKey(hash.into()),
        }
    }

    pub fn validator(hash: impl Into<Vec<u8>>) -> Self {
        Address {
            credential: Credential::Validator(hash.into()),
        }
    }

    pub fn to_data(&self) -> Data {
        Data::constr(0, vec![self.credential.to_data()])
    }
}

/// Multi-asset value: policy id -> asset name -> quantity. The empty
/// policy and asset name hold the ada amount.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Value {
    assets: Vec<(Vec<u8>, Vec<(Vec<u8>, BigInt)>)>,
}

impl Value {
    pub fn zero() -> Self {
        Value::default()
    }

    pub fn lovelace(amount: impl Into<BigInt>) -> Self {
        Value {
            assets: vec![(vec![], vec![(vec![], amount.into())])],
        }
    }

    pub fn asset(
        policy: impl Into<Vec<u8>>,
        name: impl Into<Vec<u8>>,
        quantity: impl Into<BigInt>,
    ) -> Self {
        Value {
            assets: vec![(policy.into(), vec![(name.into(), quantity.into())])],
        }
    }

    /// Merges another value into this one, summing quantities of
    /// matching assets and keeping first-insertion order.
    pub fn add(mut self, other: Value) -> Value {
        for (policy, names) in other.assets {
            match self.assets.iter_mut().find(|(p, _)| *p == policy) {
                Some((_, existing)) => {
                    for (name, quantity) in names {
                        match existing.iter_mut().find(|(n, _)| *n == name) {
                            Some((_, q)) => *q += quantity,
                            None => existing.push((name, quantity)),
                        }
                    }
                }
                None => self.assets.push((policy, names)),
            }
        }

        self
    }

    pub fn to_data(&self) -> Data {
        Data::Map(
            self.assets
                .iter()
                .map(|(policy, names)| {
                    (
                        Data::Bytes(policy.clone()),
                        Data::Map(
                            names
                                .iter()
                                .map(|(name, quantity)| {
                                    (Data::Bytes(name.clone()), Data::Int(quantity.clone()))
                                })
                                .collect(),
                        ),
                    )
                })
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutputId {
    pub tx_id: Vec<u8>,
    pub index: u64,
}

impl TxOutputId {
    pub fn new(tx_id: impl Into<Vec<u8>>, index: u64) -> Self {
        TxOutputId {
            tx_id: tx_id.into(),
            index,
        }
    }

    pub fn to_data(&self) -> Data {
        Data::constr(
            0,
            vec![
                Data::constr(0, vec![Data::Bytes(self.tx_id.clone())]),
                Data::integer(self.index),
            ],
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    pub address: Address,
    pub value: Value,
    pub datum_hash: Option<Vec<u8>>,
}

impl TxOutput {
    pub fn new(address: Address, value: Value) -> Self {
        TxOutput {
            address,
            value,
            datum_hash: None,
        }
    }

    pub fn with_datum_hash(mut self, hash: impl Into<Vec<u8>>) -> Self {
        self.datum_hash = Some(hash.into());
        self
    }

    pub fn to_data(&self) -> Data {
        let datum = match &self.datum_hash {
            Some(hash) => Data::some(Data::constr(0, vec![Data::Bytes(hash.clone())])),
            None => Data::none(),
        };

        Data::constr(
            0,
            vec![self.address.to_data(), self.value.to_data(), datum],
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInput {
    pub output_id: TxOutputId,
    pub output: TxOutput,
}

impl TxInput {
    pub fn new(output_id: TxOutputId, output: TxOutput) -> Self {
        TxInput { output_id, output }
    }

    pub fn to_data(&self) -> Data {
        Data::constr(0, vec![self.output_id.to_data(), self.output.to_data()])
    }
}

/// A transaction fixture limited to the surface validators observe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxFixture {
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub fee: Value,
    pub minted: Value,
}

impl TxFixture {
    pub fn new() -> Self {
        TxFixture::default()
    }

    pub fn input(mut self, input: TxInput) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn output(mut self, output: TxOutput) -> Self {
        self.outputs.push(output);
        self
    }

    pub fn fee(mut self, fee: Value) -> Self {
        self.fee = fee;
        self
    }

    pub fn minted(mut self, minted: Value) -> Self {
        self.minted = minted;
        self
    }

    pub fn to_data(&self) -> Data {
        Data::constr(
            0,
            vec![
                Data::List(self.inputs.iter().map(TxInput::to_data).collect()),
                Data::List(self.outputs.iter().map(TxOutput::to_data).collect()),
                self.fee.to_data(),
                self.minted.to_data(),
            ],
        )
    }

    /// The context seen by a spending validator of the given UTXO.
    pub fn spending_context(&self, current: &TxOutputId) -> Data {
        Data::constr(
            0,
            vec![
                self.to_data(),
                Data::constr(1, vec![current.to_data()]),
            ],
        )
    }

    /// The context seen by a minting policy.
    pub fn minting_context(&self, policy: impl Into<Vec<u8>>) -> Data {
        Data::constr(
            0,
            vec![
                self.to_data(),
                Data::constr(0, vec![Data::Bytes(policy.into())]),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_add_merges_matching_assets() {
        let a = Value::lovelace(5).add(Value::asset(b"p".to_vec(), b"t".to_vec(), 2));
        let b = Value::lovelace(7).add(Value::asset(b"p".to_vec(), b"t".to_vec(), 1));

        let merged = a.add(b);
        let expected = Value::lovelace(12).add(Value::asset(b"p".to_vec(), b"t".to_vec(), 3));

        assert_eq!(merged.to_data(), expected.to_data());
    }

    #[test]
    fn spending_context_shape() {
        let oid = TxOutputId::new(vec![0xaa; 32], 0);
        let tx = TxFixture::new().fee(Value::lovelace(2));
        let ctx = tx.spending_context(&oid);

        let Data::Constr(0, fields) = &ctx else {
            panic!("context must be a constr");
        };
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[1], Data::constr(1, vec![oid.to_data()]));
    }
}
