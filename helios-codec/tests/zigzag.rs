use helios_codec::flat::zigzag::ZigZag;
use num_bigint::BigInt;
use proptest::prelude::*;

proptest! {
    #[test]
    fn zigzag(i: i64) {
        let u = i.zigzag();
        let converted_i = u.zigzag();
        assert_eq!(converted_i, i);
    }

    #[test]
    fn zagzig(u: u64) {
        let i = u.zigzag();
        let converted_u = i.zigzag();
        assert_eq!(converted_u, u);
    }

    #[test]
    fn zigzag_big(raw: i128) {
        let i = BigInt::from(raw);
        let u = i.clone().zigzag();
        let converted_i = u.zigzag();
        assert_eq!(converted_i, i);
    }
}
