//! Prime fields and the few integer bridges the tally needs.
//!
//! Share arithmetic is the operator arithmetic of any [`PrimeField`]: `+`,
//! `-` and `*` are already reduced modulo `p`. This module declares the two
//! concrete fields shipped with the crate and the helpers that cross between
//! field elements and arbitrary-precision integers.

use ark_ff::fields::{Fp, Fp64, MontBackend, MontConfig};
use ark_ff::{Field, PrimeField};
use num_bigint::BigUint;

use crate::error::TallyError;

/// Montgomery parameters for `p = 2^2203 - 1`.
///
/// 3 is a quadratic non-residue modulo every Mersenne prime `2^k - 1` with
/// odd `k > 2`.
#[derive(MontConfig)]
#[modulus = "1475979915214180235084898622737381736312066145333169775147771216478570297878078949377407337049389289382748507531496480477281264838760259191814463365330269540496961201113430156902396093989090226259326935025281409614983499388222831448598601834318536230923772641390209490231836446899608210795482963763094236630945410832793769905399982457186322944729636418890623372171723742105636440368218459649632948538696905872650486914434637457507280441823676813517852099348660847172579408422316678097670224011990280170474894487426924742108823536808485072502240519452587542875349976558572670229633962575212637477897785501552646522609988869914013540483809865681250419497686697771007"]
#[generator = "3"]
pub struct Mersenne2203Config;

/// The reference tally field, `p = 2^2203 - 1` over 35 limbs.
pub type Fp2203 = Fp<MontBackend<Mersenne2203Config, 35>, 35>;

/// Montgomery parameters for `p = 2089`.
#[derive(MontConfig)]
#[modulus = "2089"]
#[generator = "7"]
pub struct Small2089Config;

/// A small field for readable tests and examples.
pub type Fp2089 = Fp64<MontBackend<Small2089Config, 1>>;

/// Modular inverse of `a`.
///
/// # Errors
/// Returns [`TallyError::NotInvertible`] when `a` has no inverse, which for a
/// prime modulus only happens for `a == 0`.
pub fn inverse<F: Field>(a: F) -> Result<F, TallyError> {
    a.inverse().ok_or(TallyError::NotInvertible)
}

/// The field modulus as an unbounded integer.
pub fn modulus<F: PrimeField>() -> BigUint {
    F::MODULUS.into()
}

/// Canonical integer representative of `a`, in `[0, p)`.
pub fn to_biguint<F: PrimeField>(a: F) -> BigUint {
    a.into_bigint().into()
}

/// Returns `true` if `value < p`.
pub fn fits<F: PrimeField>(value: u64) -> bool {
    BigUint::from(value) < modulus::<F>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_std::{One, UniformRand, Zero};

    #[test]
    fn test_reference_modulus_is_mersenne() {
        let expected = (BigUint::one() << 2203usize) - BigUint::one();
        assert_eq!(modulus::<Fp2203>(), expected);
        assert_eq!(Fp2203::MODULUS_BIT_SIZE, 2203);
        assert_eq!(modulus::<Fp2089>(), BigUint::from(2089u32));
    }

    #[test]
    fn test_small_field_wraps() {
        let a = Fp2089::from(2000u64);
        let b = Fp2089::from(100u64);
        assert_eq!(to_biguint(a + b), BigUint::from(11u32));
        assert_eq!(to_biguint(b - a), BigUint::from(189u32));
        assert_eq!(to_biguint(a * b), BigUint::from(2000u64 * 100 % 2089));
    }

    #[test]
    fn test_inverse() {
        let a = Fp2089::from(42u64);
        let inv = inverse(a).unwrap();
        assert!((a * inv).is_one());

        let mut rng = crate::test_rng();
        let b = Fp2203::rand(&mut rng);
        assert!((b * inverse(b).unwrap()).is_one());
    }

    #[test]
    fn test_inverse_of_zero_fails() {
        assert_eq!(inverse(Fp2089::zero()), Err(TallyError::NotInvertible));
        assert_eq!(inverse(Fp2203::zero()), Err(TallyError::NotInvertible));
    }

    #[test]
    fn test_fits() {
        assert!(fits::<Fp2089>(2088));
        assert!(!fits::<Fp2089>(2089));
        assert!(fits::<Fp2203>(u64::MAX));
    }
}
