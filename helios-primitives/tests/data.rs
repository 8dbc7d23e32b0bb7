use helios_primitives::Data;
use num_bigint::BigInt;
use proptest::prelude::*;
use test_case::test_case;

#[test_case(0, "d87980" ; "first compact tag")]
#[test_case(6, "d87f80" ; "last compact tag")]
#[test_case(7, "d9050080" ; "first extended tag")]
#[test_case(127, "d9057880" ; "last extended tag")]
fn constr_wire_tags(tag: u64, expected_hex: &str) {
    assert_eq!(Data::constr(tag, vec![]).to_hex(), expected_hex);
}

fn arb_data() -> impl Strategy<Value = Data> {
    let leaf = prop_oneof![
        any::<i128>().prop_map(|i| Data::Int(BigInt::from(i))),
        proptest::collection::vec(any::<u8>(), 0..80).prop_map(Data::Bytes),
    ];

    leaf.prop_recursive(3, 24, 6, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..4).prop_map(Data::List),
            proptest::collection::vec((inner.clone(), inner.clone()), 0..4).prop_map(Data::Map),
            (0u64..200, proptest::collection::vec(inner, 0..4))
                .prop_map(|(tag, fields)| Data::Constr(tag, fields)),
        ]
    })
}

proptest! {
    #[test]
    fn cbor_round_trip(v in arb_data()) {
        let bytes = v.to_cbor();
        let back = Data::from_cbor(&bytes).unwrap();
        prop_assert_eq!(back, v);
    }

    #[test]
    fn encoding_is_deterministic(v in arb_data()) {
        prop_assert_eq!(v.to_cbor(), v.clone().to_cbor());
    }
}
