use num_bigint::{BigInt, BigUint};

/// Fold signed values onto the naturals (and back) so small magnitudes
/// of either sign stay small on the wire: n >= 0 maps to 2n, n < 0
/// maps to 2|n| - 1.
pub trait ZigZag {
    type Zag;
    fn zigzag(self) -> Self::Zag;
}

impl ZigZag for BigInt {
    type Zag = BigUint;

    fn zigzag(self) -> Self::Zag {
        match self.to_biguint() {
            Some(non_negative) => non_negative << 1,
            None => {
                let magnitude = (-self).to_biguint().expect("negated value is positive");
                (magnitude << 1) - 1u8
            }
        }
    }
}

impl ZigZag for BigUint {
    type Zag = BigInt;

    fn zigzag(self) -> Self::Zag {
        let half = BigInt::from(self.clone() >> 1);

        if self.bit(0) {
            -half - 1
        } else {
            half
        }
    }
}

impl ZigZag for i64 {
    type Zag = u64;

    fn zigzag(self) -> Self::Zag {
        ((self << 1) ^ (self >> 63)) as u64
    }
}

impl ZigZag for u64 {
    type Zag = i64;

    fn zigzag(self) -> Self::Zag {
        let half = (self >> 1) as i64;

        if self & 1 == 1 {
            -half - 1
        } else {
            half
        }
    }
}
