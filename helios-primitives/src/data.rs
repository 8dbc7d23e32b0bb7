use helios_codec::minicbor::{
    self,
    data::{IanaTag, Tag},
};
use num_bigint::{BigInt, Sign};
use num_traits::ToPrimitive;
use std::fmt;

/// The universal runtime value of compiled scripts.
///
/// Every Helios value lowers to one of these five shapes. Equality is
/// structural and recursive. `Map` keeps insertion order and may hold
/// duplicate keys; lookups resolve to the first match.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub enum Data {
    Int(BigInt),
    Bytes(Vec<u8>),
    List(Vec<Data>),
    Map(Vec<(Data, Data)>),
    Constr(u64, Vec<Data>),
}

impl Data {
    pub fn integer(i: impl Into<BigInt>) -> Self {
        Data::Int(i.into())
    }

    pub fn bytestring(bytes: Vec<u8>) -> Self {
        Data::Bytes(bytes)
    }

    pub fn list(xs: Vec<Data>) -> Self {
        Data::List(xs)
    }

    pub fn map(kvs: Vec<(Data, Data)>) -> Self {
        Data::Map(kvs)
    }

    pub fn constr(tag: u64, fields: Vec<Data>) -> Self {
        Data::Constr(tag, fields)
    }

    /// `false` is `Constr(0, [])`, `true` is `Constr(1, [])`.
    pub fn boolean(b: bool) -> Self {
        Data::Constr(b as u64, vec![])
    }

    pub fn some(x: Data) -> Self {
        Data::Constr(0, vec![x])
    }

    pub fn none() -> Self {
        Data::Constr(1, vec![])
    }

    pub fn unit() -> Self {
        Data::Constr(0, vec![])
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Data::Constr(0, fields) if fields.is_empty() => Some(false),
            Data::Constr(1, fields) if fields.is_empty() => Some(true),
            _ => None,
        }
    }

    pub fn to_cbor(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        minicbor::Encoder::new(&mut bytes)
            .encode(self)
            .expect("failed to encode Data as cbor?");
        bytes
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self, minicbor::decode::Error> {
        minicbor::decode(bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_cbor())
    }
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Data::Int(i) => write!(f, "{i}"),
            Data::Bytes(bs) => write!(f, "#{}", hex::encode(bs)),
            Data::List(xs) => {
                write!(f, "[")?;
                for (i, x) in xs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{x}")?;
                }
                write!(f, "]")
            }
            Data::Map(kvs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in kvs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Data::Constr(tag, fields) => {
                write!(f, "{tag}{{")?;
                for (i, x) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{x}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

// Wire tag scheme for constructors, matching the canonical plutus
// implementation: 121..=127 for the first seven, 1280..=1400 for the
// next 121, tag 102 with an explicit [tag, fields] pair beyond that.
fn constr_wire_tag(ix: u64) -> Option<u64> {
    if ix < 7 {
        Some(121 + ix)
    } else if ix < 128 {
        Some(1280 + ix - 7)
    } else {
        None
    }
}

fn constr_logical_tag(wire: u64) -> Option<u64> {
    match wire {
        121..=127 => Some(wire - 121),
        1280..=1400 => Some(wire - 1280 + 7),
        _ => None,
    }
}

impl<C> minicbor::encode::Encode<C> for Data {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self {
            Data::Int(i) => encode_integer(i, e)?,
            Data::Bytes(bs) => encode_bytes(bs, e)?,
            Data::List(xs) => encode_array(xs, e, ctx)?,
            Data::Map(kvs) => {
                // indefinite map when non-empty, definite zero-length map
                // otherwise, mirroring the list convention
                if kvs.is_empty() {
                    e.map(0)?;
                } else {
                    e.begin_map()?;
                    for (k, v) in kvs {
                        k.encode(e, ctx)?;
                        v.encode(e, ctx)?;
                    }
                    e.end()?;
                }
            }
            Data::Constr(ix, fields) => match constr_wire_tag(*ix) {
                Some(wire) => {
                    e.tag(Tag::new(wire))?;
                    encode_array(fields, e, ctx)?;
                }
                None => {
                    e.tag(Tag::new(102))?;
                    e.array(2)?;
                    e.u64(*ix)?;
                    encode_array(fields, e, ctx)?;
                }
            },
        };

        Ok(())
    }
}

impl<'b, C> minicbor::decode::Decode<'b, C> for Data {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let type_ = d.datatype()?;

        match type_ {
            minicbor::data::Type::Tag => {
                let mut probe = d.probe();
                let tag = probe.tag()?;

                if tag == IanaTag::PosBignum.tag() {
                    d.tag()?;
                    let bytes: Vec<u8> = decode_byte_chunks(d)?;
                    Ok(Data::Int(BigInt::from_bytes_be(Sign::Plus, &bytes)))
                } else if tag == IanaTag::NegBignum.tag() {
                    d.tag()?;
                    let bytes: Vec<u8> = decode_byte_chunks(d)?;
                    Ok(Data::Int(-BigInt::from_bytes_be(Sign::Plus, &bytes) - 1))
                } else {
                    let wire = tag.as_u64();

                    match constr_logical_tag(wire) {
                        Some(ix) => {
                            d.tag()?;
                            Ok(Data::Constr(ix, d.decode_with(ctx)?))
                        }
                        None if wire == 102 => {
                            d.tag()?;
                            d.array()?;
                            let ix = d.u64()?;
                            Ok(Data::Constr(ix, d.decode_with(ctx)?))
                        }
                        None => Err(minicbor::decode::Error::message(
                            "unknown tag for data constructor",
                        )),
                    }
                }
            }
            minicbor::data::Type::U8
            | minicbor::data::Type::U16
            | minicbor::data::Type::U32
            | minicbor::data::Type::U64
            | minicbor::data::Type::I8
            | minicbor::data::Type::I16
            | minicbor::data::Type::I32
            | minicbor::data::Type::I64
            | minicbor::data::Type::Int => {
                let i: minicbor::data::Int = d.int()?;
                Ok(Data::Int(BigInt::from(i128::from(i))))
            }
            minicbor::data::Type::Map | minicbor::data::Type::MapIndef => {
                let items: Result<Vec<(Data, Data)>, _> =
                    d.map_iter_with::<C, Data, Data>(ctx)?.collect();
                Ok(Data::Map(items?))
            }
            minicbor::data::Type::Bytes | minicbor::data::Type::BytesIndef => {
                Ok(Data::Bytes(decode_byte_chunks(d)?))
            }
            minicbor::data::Type::Array | minicbor::data::Type::ArrayIndef => {
                Ok(Data::List(d.decode_with(ctx)?))
            }
            any => Err(minicbor::decode::Error::message(format!(
                "bad cbor data type ({any:?}) for data value"
            ))),
        }
    }
}

fn encode_integer<W: minicbor::encode::Write>(
    i: &BigInt,
    e: &mut minicbor::Encoder<W>,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    // direct major type 0/1 while it fits, tagged bignum beyond
    if let Some(v) = i.to_u64() {
        e.u64(v)?;
    } else if let Some(v) = i.to_i64() {
        e.i64(v)?;
    } else if i.sign() == Sign::Minus && (-i - 1u8).to_u64().is_some() {
        let direct = i.to_i128().expect("fits the extended negative range");
        e.int(minicbor::data::Int::try_from(direct).expect("checked range"))?;
    } else if i.sign() != Sign::Minus {
        e.tag(IanaTag::PosBignum)?;
        encode_bytes(&i.to_bytes_be().1, e)?;
    } else {
        e.tag(IanaTag::NegBignum)?;
        encode_bytes(&(-i - 1u8).to_bytes_be().1, e)?;
    }

    Ok(())
}

fn encode_bytes<W: minicbor::encode::Write>(
    bs: &[u8],
    e: &mut minicbor::Encoder<W>,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    // byte strings longer than 64 bytes go out as indefinite chunked
    // sequences, matching the canonical plutus encoder
    const CHUNK_SIZE: usize = 64;

    if bs.len() <= CHUNK_SIZE {
        e.bytes(bs)?;
    } else {
        e.begin_bytes()?;
        for b in bs.chunks(CHUNK_SIZE) {
            e.bytes(b)?;
        }
        e.end()?;
    }

    Ok(())
}

fn encode_array<C, W: minicbor::encode::Write>(
    xs: &[Data],
    e: &mut minicbor::Encoder<W>,
    ctx: &mut C,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    // indefinite array when non-empty, definite 0-length array otherwise
    if xs.is_empty() {
        e.array(0)?;
    } else {
        e.begin_array()?;
        for x in xs {
            e.encode_with(x, ctx)?;
        }
        e.end()?;
    }

    Ok(())
}

fn decode_byte_chunks(d: &mut minicbor::Decoder<'_>) -> Result<Vec<u8>, minicbor::decode::Error> {
    let mut full = Vec::new();

    for chunk in d.bytes_iter()? {
        full.extend_from_slice(chunk?);
    }

    Ok(full)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_constr_uses_direct_tag() {
        let v = Data::constr(0, vec![]);
        assert_eq!(v.to_hex(), "d87980");
    }

    #[test]
    fn seventh_constr_jumps_to_second_range() {
        let v = Data::constr(7, vec![]);
        assert_eq!(v.to_hex(), "d9050080");
    }

    #[test]
    fn huge_constr_falls_back_to_tag_102() {
        let v = Data::constr(500, vec![Data::integer(1)]);
        let decoded = Data::from_cbor(&v.to_cbor()).unwrap();
        assert_eq!(decoded, v);
    }

    #[test]
    fn non_empty_list_is_indefinite() {
        let v = Data::list(vec![Data::integer(1)]);
        assert_eq!(v.to_hex(), "9f01ff");
    }

    #[test]
    fn empty_list_is_definite() {
        let v = Data::list(vec![]);
        assert_eq!(v.to_hex(), "80");
    }

    #[test]
    fn long_bytes_are_chunked() {
        let v = Data::bytestring(vec![0xab; 100]);
        let hex = v.to_hex();
        assert!(hex.starts_with("5f5840"));
        assert_eq!(Data::from_cbor(&v.to_cbor()).unwrap(), v);
    }

    #[test]
    fn bignum_round_trip() {
        let big = BigInt::parse_bytes(b"123456789012345678901234567890", 10).unwrap();
        for v in [Data::Int(big.clone()), Data::Int(-big)] {
            assert_eq!(Data::from_cbor(&v.to_cbor()).unwrap(), v);
        }
    }

    #[test]
    fn booleans_are_bare_constrs() {
        assert_eq!(Data::boolean(false), Data::constr(0, vec![]));
        assert_eq!(Data::boolean(true), Data::constr(1, vec![]));
        assert_eq!(Data::boolean(true).as_bool(), Some(true));
    }
}
