use cryptoxide::{blake2b::Blake2b, digest::Digest, sha2::Sha256, sha3::Sha3_256 as CryptoSha3_256};
use helios_primitives::Data;
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{ToPrimitive, Zero};

use crate::error::RuntimeError;
use crate::term::{ConstType, Constant};

/// The primitive functions of the bytecode. Discriminants are the wire
/// ids (7-bit ULEB128 on the flat encoding).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::FromRepr,
)]
#[strum(serialize_all = "camelCase")]
#[repr(u8)]
pub enum DefaultFunction {
    AddInteger = 0,
    SubtractInteger = 1,
    MultiplyInteger = 2,
    DivideInteger = 3,
    QuotientInteger = 4,
    RemainderInteger = 5,
    ModInteger = 6,
    EqualsInteger = 7,
    LessThanInteger = 8,
    LessThanEqualsInteger = 9,
    AppendByteString = 10,
    ConsByteString = 11,
    SliceByteString = 12,
    LengthOfByteString = 13,
    IndexByteString = 14,
    EqualsByteString = 15,
    LessThanByteString = 16,
    LessThanEqualsByteString = 17,
    #[strum(serialize = "sha2_256")]
    Sha2_256 = 18,
    #[strum(serialize = "sha3_256")]
    Sha3_256 = 19,
    #[strum(serialize = "blake2b_256")]
    Blake2b_256 = 20,
    AppendString = 22,
    EqualsString = 23,
    EncodeUtf8 = 24,
    DecodeUtf8 = 25,
    IfThenElse = 26,
    ChooseUnit = 27,
    Trace = 28,
    FstPair = 29,
    SndPair = 30,
    ChooseList = 31,
    MkCons = 32,
    HeadList = 33,
    TailList = 34,
    NullList = 35,
    ChooseData = 36,
    ConstrData = 37,
    MapData = 38,
    ListData = 39,
    IData = 40,
    BData = 41,
    UnConstrData = 42,
    UnMapData = 43,
    UnListData = 44,
    UnIData = 45,
    UnBData = 46,
    EqualsData = 47,
    MkPairData = 48,
    MkNilData = 49,
    MkNilPairData = 50,
    SerialiseData = 51,
}

impl DefaultFunction {
    pub fn arity(&self) -> usize {
        use DefaultFunction::*;

        match self {
            AddInteger | SubtractInteger | MultiplyInteger | DivideInteger | QuotientInteger
            | RemainderInteger | ModInteger | EqualsInteger | LessThanInteger
            | LessThanEqualsInteger | AppendByteString | ConsByteString | EqualsByteString
            | LessThanByteString | LessThanEqualsByteString | AppendString | EqualsString
            | IndexByteString | MkCons | MkPairData | EqualsData | Trace | ChooseUnit => 2,
            SliceByteString | IfThenElse => 3,
            ChooseList => 3,
            ChooseData => 6,
            LengthOfByteString | Sha2_256 | Sha3_256 | Blake2b_256 | EncodeUtf8 | DecodeUtf8
            | FstPair | SndPair | HeadList | TailList | NullList | MapData | ListData | IData
            | BData | UnConstrData | UnMapData | UnListData | UnIData | UnBData | MkNilData
            | MkNilPairData | SerialiseData => 1,
            ConstrData => 2,
        }
    }

    /// How many type instantiations (`force`) the builtin expects before
    /// receiving its arguments.
    pub fn force_count(&self) -> u32 {
        use DefaultFunction::*;

        match self {
            IfThenElse | ChooseUnit | Trace | MkCons | HeadList | TailList | NullList
            | ChooseData => 1,
            FstPair | SndPair | ChooseList => 2,
            _ => 0,
        }
    }

    /// Whether the builtin maps constants to constants without touching
    /// arbitrary machine values, so a compiler may fold it.
    pub fn is_foldable(&self) -> bool {
        use DefaultFunction::*;

        !matches!(
            self,
            IfThenElse | ChooseUnit | Trace | ChooseList | ChooseData
        )
    }
}

fn int(args: &[Constant], i: usize) -> Result<&BigInt, RuntimeError> {
    match &args[i] {
        Constant::Integer(x) => Ok(x),
        other => Err(RuntimeError::type_mismatch("integer", other)),
    }
}

fn bytes(args: &[Constant], i: usize) -> Result<&Vec<u8>, RuntimeError> {
    match &args[i] {
        Constant::ByteString(x) => Ok(x),
        other => Err(RuntimeError::type_mismatch("bytestring", other)),
    }
}

fn string(args: &[Constant], i: usize) -> Result<&String, RuntimeError> {
    match &args[i] {
        Constant::String(x) => Ok(x),
        other => Err(RuntimeError::type_mismatch("string", other)),
    }
}

fn data(args: &[Constant], i: usize) -> Result<&Data, RuntimeError> {
    match &args[i] {
        Constant::Data(x) => Ok(x),
        other => Err(RuntimeError::type_mismatch("data", other)),
    }
}

fn data_list(args: &[Constant], i: usize) -> Result<&Vec<Constant>, RuntimeError> {
    match &args[i] {
        Constant::ProtoList(ConstType::Data, xs) => Ok(xs),
        other => Err(RuntimeError::type_mismatch("list of data", other)),
    }
}

fn constant_to_data(c: &Constant) -> Result<Data, RuntimeError> {
    match c {
        Constant::Data(d) => Ok(d.clone()),
        other => Err(RuntimeError::type_mismatch("data", other)),
    }
}

/// Applies a constant-to-constant builtin. The machine funnels every
/// saturated builtin through here except the `choose`-style selectors,
/// which inspect non-constant values; the optimizer reuses it verbatim
/// for compile-time folding.
pub fn eval_pure(fun: DefaultFunction, args: &[Constant]) -> Result<Constant, RuntimeError> {
    use DefaultFunction::*;

    match fun {
        AddInteger => Ok(Constant::Integer(int(args, 0)? + int(args, 1)?)),
        SubtractInteger => Ok(Constant::Integer(int(args, 0)? - int(args, 1)?)),
        MultiplyInteger => Ok(Constant::Integer(int(args, 0)? * int(args, 1)?)),
        DivideInteger => {
            let (a, b) = (int(args, 0)?, int(args, 1)?);
            if b.is_zero() {
                Err(RuntimeError::info("division by zero"))
            } else {
                Ok(Constant::Integer(a.div_floor(b)))
            }
        }
        QuotientInteger => {
            let (a, b) = (int(args, 0)?, int(args, 1)?);
            if b.is_zero() {
                Err(RuntimeError::info("division by zero"))
            } else {
                Ok(Constant::Integer(a / b))
            }
        }
        RemainderInteger => {
            let (a, b) = (int(args, 0)?, int(args, 1)?);
            if b.is_zero() {
                Err(RuntimeError::info("division by zero"))
            } else {
                Ok(Constant::Integer(a % b))
            }
        }
        ModInteger => {
            let (a, b) = (int(args, 0)?, int(args, 1)?);
            if b.is_zero() {
                Err(RuntimeError::info("division by zero"))
            } else {
                Ok(Constant::Integer(a.mod_floor(b)))
            }
        }
        EqualsInteger => Ok(Constant::Bool(int(args, 0)? == int(args, 1)?)),
        LessThanInteger => Ok(Constant::Bool(int(args, 0)? < int(args, 1)?)),
        LessThanEqualsInteger => Ok(Constant::Bool(int(args, 0)? <= int(args, 1)?)),

        AppendByteString => {
            let mut out = bytes(args, 0)?.clone();
            out.extend_from_slice(bytes(args, 1)?);
            Ok(Constant::ByteString(out))
        }
        ConsByteString => {
            let head = int(args, 0)?;
            let byte = head
                .mod_floor(&BigInt::from(256))
                .to_u8()
                .expect("reduced mod 256");
            let mut out = vec![byte];
            out.extend_from_slice(bytes(args, 1)?);
            Ok(Constant::ByteString(out))
        }
        SliceByteString => {
            let from = int(args, 0)?.to_i64().unwrap_or(0).max(0) as usize;
            let len = int(args, 1)?.to_i64().unwrap_or(0).max(0) as usize;
            let bs = bytes(args, 2)?;
            let from = from.min(bs.len());
            let until = (from + len).min(bs.len());
            Ok(Constant::ByteString(bs[from..until].to_vec()))
        }
        LengthOfByteString => Ok(Constant::Integer(BigInt::from(bytes(args, 0)?.len()))),
        IndexByteString => {
            let bs = bytes(args, 0)?;
            let i = int(args, 1)?;
            match i.to_usize().filter(|i| *i < bs.len()) {
                Some(i) => Ok(Constant::Integer(BigInt::from(bs[i]))),
                None => Err(RuntimeError::info("index out of range")),
            }
        }
        EqualsByteString => Ok(Constant::Bool(bytes(args, 0)? == bytes(args, 1)?)),
        LessThanByteString => Ok(Constant::Bool(bytes(args, 0)? < bytes(args, 1)?)),
        LessThanEqualsByteString => Ok(Constant::Bool(bytes(args, 0)? <= bytes(args, 1)?)),

        Sha2_256 => {
            let mut hasher = Sha256::new();
            hasher.input(bytes(args, 0)?);
            let mut out = vec![0; hasher.output_bytes()];
            hasher.result(&mut out);
            Ok(Constant::ByteString(out))
        }
        Sha3_256 => {
            let mut hasher = CryptoSha3_256::new();
            hasher.input(bytes(args, 0)?);
            let mut out = vec![0; hasher.output_bytes()];
            hasher.result(&mut out);
            Ok(Constant::ByteString(out))
        }
        Blake2b_256 => {
            let mut hasher = Blake2b::new(32);
            hasher.input(bytes(args, 0)?);
            let mut out = vec![0; 32];
            hasher.result(&mut out);
            Ok(Constant::ByteString(out))
        }

        AppendString => Ok(Constant::String(format!(
            "{}{}",
            string(args, 0)?,
            string(args, 1)?
        ))),
        EqualsString => Ok(Constant::Bool(string(args, 0)? == string(args, 1)?)),
        EncodeUtf8 => Ok(Constant::ByteString(string(args, 0)?.as_bytes().to_vec())),
        DecodeUtf8 => match String::from_utf8(bytes(args, 0)?.clone()) {
            Ok(s) => Ok(Constant::String(s)),
            Err(_) => Err(RuntimeError::info("invalid utf-8")),
        },

        FstPair => match &args[0] {
            Constant::ProtoPair(_, _, a, _) => Ok(*a.clone()),
            other => Err(RuntimeError::type_mismatch("pair", other)),
        },
        SndPair => match &args[0] {
            Constant::ProtoPair(_, _, _, b) => Ok(*b.clone()),
            other => Err(RuntimeError::type_mismatch("pair", other)),
        },
        MkCons => match &args[1] {
            Constant::ProtoList(t, xs) => {
                let mut out = Vec::with_capacity(xs.len() + 1);
                out.push(args[0].clone());
                out.extend(xs.iter().cloned());
                Ok(Constant::ProtoList(t.clone(), out))
            }
            other => Err(RuntimeError::type_mismatch("list", other)),
        },
        HeadList => match &args[0] {
            Constant::ProtoList(_, xs) => xs
                .first()
                .cloned()
                .ok_or_else(|| RuntimeError::info("empty list")),
            other => Err(RuntimeError::type_mismatch("list", other)),
        },
        TailList => match &args[0] {
            Constant::ProtoList(t, xs) => {
                if xs.is_empty() {
                    Err(RuntimeError::info("empty list"))
                } else {
                    Ok(Constant::ProtoList(t.clone(), xs[1..].to_vec()))
                }
            }
            other => Err(RuntimeError::type_mismatch("list", other)),
        },
        NullList => match &args[0] {
            Constant::ProtoList(_, xs) => Ok(Constant::Bool(xs.is_empty())),
            other => Err(RuntimeError::type_mismatch("list", other)),
        },

        ConstrData => {
            let tag = int(args, 0)?
                .to_u64()
                .ok_or_else(|| RuntimeError::info("constructor tag out of range"))?;
            let fields = data_list(args, 1)?
                .iter()
                .map(constant_to_data)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Constant::Data(Data::Constr(tag, fields)))
        }
        MapData => match &args[0] {
            Constant::ProtoList(_, xs) => {
                let kvs = xs
                    .iter()
                    .map(|x| match x {
                        Constant::ProtoPair(_, _, k, v) => {
                            Ok((constant_to_data(k)?, constant_to_data(v)?))
                        }
                        other => Err(RuntimeError::type_mismatch("pair of data", other)),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Constant::Data(Data::Map(kvs)))
            }
            other => Err(RuntimeError::type_mismatch("list of pairs", other)),
        },
        ListData => {
            let xs = data_list(args, 0)?
                .iter()
                .map(constant_to_data)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Constant::Data(Data::List(xs)))
        }
        IData => Ok(Constant::Data(Data::Int(int(args, 0)?.clone()))),
        BData => Ok(Constant::Data(Data::Bytes(bytes(args, 0)?.clone()))),
        UnConstrData => match data(args, 0)? {
            Data::Constr(tag, fields) => Ok(Constant::ProtoPair(
                ConstType::Integer,
                ConstType::List(Box::new(ConstType::Data)),
                Box::new(Constant::Integer(BigInt::from(*tag))),
                Box::new(Constant::ProtoList(
                    ConstType::Data,
                    fields.iter().cloned().map(Constant::Data).collect(),
                )),
            )),
            _ => Err(RuntimeError::info("expected constructor data")),
        },
        UnMapData => match data(args, 0)? {
            Data::Map(kvs) => Ok(Constant::ProtoList(
                ConstType::Pair(Box::new(ConstType::Data), Box::new(ConstType::Data)),
                kvs.iter()
                    .map(|(k, v)| {
                        Constant::ProtoPair(
                            ConstType::Data,
                            ConstType::Data,
                            Box::new(Constant::Data(k.clone())),
                            Box::new(Constant::Data(v.clone())),
                        )
                    })
                    .collect(),
            )),
            _ => Err(RuntimeError::info("expected map data")),
        },
        UnListData => match data(args, 0)? {
            Data::List(xs) => Ok(Constant::ProtoList(
                ConstType::Data,
                xs.iter().cloned().map(Constant::Data).collect(),
            )),
            _ => Err(RuntimeError::info("expected list data")),
        },
        UnIData => match data(args, 0)? {
            Data::Int(i) => Ok(Constant::Integer(i.clone())),
            _ => Err(RuntimeError::info("expected integer data")),
        },
        UnBData => match data(args, 0)? {
            Data::Bytes(bs) => Ok(Constant::ByteString(bs.clone())),
            _ => Err(RuntimeError::info("expected bytes data")),
        },
        EqualsData => Ok(Constant::Bool(data(args, 0)? == data(args, 1)?)),
        MkPairData => Ok(Constant::ProtoPair(
            ConstType::Data,
            ConstType::Data,
            Box::new(Constant::Data(data(args, 0)?.clone())),
            Box::new(Constant::Data(data(args, 1)?.clone())),
        )),
        MkNilData => {
            let Constant::Unit = &args[0] else {
                return Err(RuntimeError::type_mismatch("unit", &args[0]));
            };
            Ok(Constant::ProtoList(ConstType::Data, vec![]))
        }
        MkNilPairData => {
            let Constant::Unit = &args[0] else {
                return Err(RuntimeError::type_mismatch("unit", &args[0]));
            };
            Ok(Constant::ProtoList(
                ConstType::Pair(Box::new(ConstType::Data), Box::new(ConstType::Data)),
                vec![],
            ))
        }
        SerialiseData => Ok(Constant::ByteString(data(args, 0)?.to_cbor())),

        IfThenElse | ChooseUnit | Trace | ChooseList | ChooseData => {
            Err(RuntimeError::info("builtin is not constant-foldable"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn wire_names_round_trip() {
        use strum::IntoEnumIterator;

        for fun in DefaultFunction::iter() {
            let name = fun.to_string();
            assert_eq!(DefaultFunction::from_str(&name).unwrap(), fun);
        }
    }

    #[test]
    fn division_is_floored() {
        let r = eval_pure(
            DefaultFunction::DivideInteger,
            &[
                Constant::Integer(BigInt::from(-7)),
                Constant::Integer(BigInt::from(2)),
            ],
        )
        .unwrap();
        assert_eq!(r, Constant::Integer(BigInt::from(-4)));
    }

    #[test]
    fn division_by_zero_reports_info() {
        let err = eval_pure(
            DefaultFunction::DivideInteger,
            &[
                Constant::Integer(BigInt::from(1)),
                Constant::Integer(BigInt::from(0)),
            ],
        )
        .unwrap_err();
        assert_eq!(err.info, "division by zero");
    }

    #[test]
    fn head_of_empty_list_reports_info() {
        let err = eval_pure(
            DefaultFunction::HeadList,
            &[Constant::ProtoList(ConstType::Data, vec![])],
        )
        .unwrap_err();
        assert_eq!(err.info, "empty list");
    }

    #[test]
    fn un_constr_data_splits_tag_and_fields() {
        let r = eval_pure(
            DefaultFunction::UnConstrData,
            &[Constant::Data(Data::constr(2, vec![Data::integer(9)]))],
        )
        .unwrap();

        match r {
            Constant::ProtoPair(_, _, tag, fields) => {
                assert_eq!(*tag, Constant::Integer(BigInt::from(2)));
                assert_eq!(
                    *fields,
                    Constant::ProtoList(
                        ConstType::Data,
                        vec![Constant::Data(Data::integer(9))]
                    )
                );
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
