use helios_codec::flat::{zigzag::ZigZag, FlatDecoder, FlatEncoder};
use helios_primitives::Data;
use thiserror::Error;

use crate::builtins::DefaultFunction;
use crate::term::{ConstType, Constant, Program, Term};

// 4-bit term tags
const TAG_VAR: u8 = 0;
const TAG_DELAY: u8 = 1;
const TAG_LAMBDA: u8 = 2;
const TAG_APPLY: u8 = 3;
const TAG_CONSTANT: u8 = 4;
const TAG_FORCE: u8 = 5;
const TAG_ERROR: u8 = 6;
const TAG_BUILTIN: u8 = 7;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum FlatError {
    #[error(transparent)]
    Bits(#[from] helios_codec::flat::Error),

    #[error("unknown term tag {0}")]
    InvalidTermTag(u8),

    #[error("unknown constant type tag {0}")]
    InvalidTypeTag(u8),

    #[error("unknown builtin id {0}")]
    InvalidBuiltin(u8),

    #[error("de bruijn index zero")]
    IndexZero,

    #[error("invalid cbor payload for data constant: {0}")]
    DataPayload(String),
}

impl Program {
    /// Deterministic binary encoding: same program, same bytes.
    pub fn to_flat(&self) -> Vec<u8> {
        let mut e = FlatEncoder::new();

        let (major, minor, patch) = self.version;
        e.word(major);
        e.word(minor);
        e.word(patch);

        encode_term(&mut e, &self.term);

        e.finish()
    }

    pub fn from_flat(bytes: &[u8]) -> Result<Program, FlatError> {
        let mut d = FlatDecoder::new(bytes);

        let version = (d.word()?, d.word()?, d.word()?);
        let term = decode_term(&mut d)?;

        Ok(Program { version, term })
    }
}

fn encode_term(e: &mut FlatEncoder, term: &Term) {
    match term {
        Term::Var(index) => {
            e.bits(4, TAG_VAR);
            e.word(*index);
        }
        Term::Delay(body) => {
            e.bits(4, TAG_DELAY);
            encode_term(e, body);
        }
        Term::Lambda { body } => {
            e.bits(4, TAG_LAMBDA);
            encode_term(e, body);
        }
        Term::Apply { function, argument } => {
            e.bits(4, TAG_APPLY);
            encode_term(e, function);
            encode_term(e, argument);
        }
        Term::Constant(constant) => {
            e.bits(4, TAG_CONSTANT);
            encode_const_type(e, &constant.const_type());
            e.bit(false);
            encode_const_payload(e, constant);
        }
        Term::Force(body) => {
            e.bits(4, TAG_FORCE);
            encode_term(e, body);
        }
        Term::Error => {
            e.bits(4, TAG_ERROR);
        }
        Term::Builtin(fun) => {
            e.bits(4, TAG_BUILTIN);
            e.bits(7, *fun as u8);
        }
    }
}

fn decode_term(d: &mut FlatDecoder) -> Result<Term, FlatError> {
    match d.bits(4)? {
        TAG_VAR => {
            let index = d.word()?;
            if index == 0 {
                return Err(FlatError::IndexZero);
            }
            Ok(Term::Var(index))
        }
        TAG_DELAY => Ok(decode_term(d)?.delay()),
        TAG_LAMBDA => Ok(Term::lambda(decode_term(d)?)),
        TAG_APPLY => {
            let function = decode_term(d)?;
            let argument = decode_term(d)?;
            Ok(function.apply(argument))
        }
        TAG_CONSTANT => {
            let ty = decode_const_type(d)?;
            if d.bit()? {
                return Err(FlatError::InvalidTypeTag(0xff));
            }
            Ok(Term::Constant(decode_const_payload(d, &ty)?))
        }
        TAG_FORCE => Ok(decode_term(d)?.force()),
        TAG_ERROR => Ok(Term::Error),
        TAG_BUILTIN => {
            let id = d.bits(7)?;
            DefaultFunction::from_repr(id)
                .map(Term::Builtin)
                .ok_or(FlatError::InvalidBuiltin(id))
        }
        tag => Err(FlatError::InvalidTermTag(tag)),
    }
}

// Constant types go out as a pre-order list of 4-bit tags, each item
// prefixed by a set cons bit, with a cleared bit closing the list.
fn type_tag(ty: &ConstType) -> u8 {
    match ty {
        ConstType::Integer => 0,
        ConstType::ByteString => 1,
        ConstType::String => 2,
        ConstType::Unit => 3,
        ConstType::Bool => 4,
        ConstType::Data => 5,
        ConstType::List(_) => 6,
        ConstType::Pair(_, _) => 7,
    }
}

fn encode_const_type(e: &mut FlatEncoder, ty: &ConstType) {
    e.bit(true);
    e.bits(4, type_tag(ty));

    match ty {
        ConstType::List(t) => encode_const_type(e, t),
        ConstType::Pair(a, b) => {
            encode_const_type(e, a);
            encode_const_type(e, b);
        }
        _ => {}
    }
}

fn decode_const_type(d: &mut FlatDecoder) -> Result<ConstType, FlatError> {
    if !d.bit()? {
        return Err(FlatError::InvalidTypeTag(0xfe));
    }

    match d.bits(4)? {
        0 => Ok(ConstType::Integer),
        1 => Ok(ConstType::ByteString),
        2 => Ok(ConstType::String),
        3 => Ok(ConstType::Unit),
        4 => Ok(ConstType::Bool),
        5 => Ok(ConstType::Data),
        6 => Ok(ConstType::List(Box::new(decode_const_type(d)?))),
        7 => {
            let a = decode_const_type(d)?;
            let b = decode_const_type(d)?;
            Ok(ConstType::Pair(Box::new(a), Box::new(b)))
        }
        tag => Err(FlatError::InvalidTypeTag(tag)),
    }
}

fn encode_const_payload(e: &mut FlatEncoder, constant: &Constant) {
    match constant {
        Constant::Unit => {}
        Constant::Bool(b) => e.bit(*b),
        Constant::Integer(i) => e.big_word(&i.clone().zigzag()),
        Constant::ByteString(bs) => e.bytes(bs),
        Constant::String(s) => e.bytes(s.as_bytes()),
        Constant::Data(d) => e.bytes(&d.to_cbor()),
        Constant::ProtoList(_, xs) => {
            for x in xs {
                e.bit(true);
                encode_const_payload(e, x);
            }
            e.bit(false);
        }
        Constant::ProtoPair(_, _, a, b) => {
            encode_const_payload(e, a);
            encode_const_payload(e, b);
        }
    }
}

fn decode_const_payload(d: &mut FlatDecoder, ty: &ConstType) -> Result<Constant, FlatError> {
    match ty {
        ConstType::Unit => Ok(Constant::Unit),
        ConstType::Bool => Ok(Constant::Bool(d.bit()?)),
        ConstType::Integer => {
            let raw = d.big_word()?;
            Ok(Constant::Integer(raw.zigzag()))
        }
        ConstType::ByteString => Ok(Constant::ByteString(d.bytes()?)),
        ConstType::String => {
            let bytes = d.bytes()?;
            String::from_utf8(bytes)
                .map(Constant::String)
                .map_err(|e| FlatError::DataPayload(e.to_string()))
        }
        ConstType::Data => {
            let bytes = d.bytes()?;
            Data::from_cbor(&bytes)
                .map(Constant::Data)
                .map_err(|e| FlatError::DataPayload(e.to_string()))
        }
        ConstType::List(t) => {
            let mut xs = vec![];
            while d.bit()? {
                xs.push(decode_const_payload(d, t)?);
            }
            Ok(Constant::ProtoList(t.as_ref().clone(), xs))
        }
        ConstType::Pair(a, b) => {
            let left = decode_const_payload(d, a)?;
            let right = decode_const_payload(d, b)?;
            Ok(Constant::ProtoPair(
                a.as_ref().clone(),
                b.as_ref().clone(),
                Box::new(left),
                Box::new(right),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    fn round_trip(program: Program) {
        let bytes = program.to_flat();
        let back = Program::from_flat(&bytes).unwrap();
        assert_eq!(back, program);
        // determinism
        assert_eq!(back.to_flat(), bytes);
    }

    #[test]
    fn terms_round_trip() {
        let term = Term::lambda(
            Term::Builtin(DefaultFunction::AddInteger)
                .apply(Term::Var(1))
                .apply(Term::integer(BigInt::from(-42))),
        )
        .apply(Term::integer(7));

        round_trip(Program::new((1, 0, 0), term));
    }

    #[test]
    fn constants_round_trip() {
        for constant in [
            Constant::Unit,
            Constant::Bool(true),
            Constant::Integer(BigInt::parse_bytes(b"-98765432109876543210", 10).unwrap()),
            Constant::ByteString(vec![0xde, 0xad, 0xbe, 0xef]),
            Constant::String("héllo".to_string()),
            Constant::Data(Data::constr(3, vec![Data::integer(1), Data::bytestring(vec![2])])),
            Constant::ProtoList(
                ConstType::Integer,
                vec![Constant::Integer(1.into()), Constant::Integer(2.into())],
            ),
            Constant::ProtoPair(
                ConstType::Integer,
                ConstType::Data,
                Box::new(Constant::Integer(9.into())),
                Box::new(Constant::Data(Data::none())),
            ),
        ] {
            round_trip(Program::new((1, 0, 0), Term::Constant(constant)));
        }
    }

    #[test]
    fn forces_delays_and_errors_round_trip() {
        let term = Term::Builtin(DefaultFunction::IfThenElse)
            .force()
            .apply(Term::Constant(Constant::Bool(true)))
            .apply(Term::Error.delay())
            .apply(Term::integer(0).delay())
            .force();

        round_trip(Program::new((1, 1, 0), term));
    }
}
