//! Shamir secret sharing over a prime field.
//!
//! A secret `s` is hidden as the constant term of a random polynomial with
//! `t` coefficients; participant `x` receives `f(x)`. Any `t` shares recover
//! `s` by interpolation at zero, fewer reveal nothing about it.

use std::collections::{BTreeMap, BTreeSet};

use ark_ff::PrimeField;
use ark_poly::{univariate::DensePolynomial, Polynomial};
use ark_std::rand::{CryptoRng, RngCore};
use ark_std::UniformRand;
use zeroize::Zeroize;

use crate::error::TallyError;
use crate::field::fits;
use crate::lagrange::interpolate_at_zero;

/// Shares keyed by participant point, one entry per participant.
pub type ShareMap<F> = BTreeMap<u64, F>;

/// The evaluation points of a poll's authorities, fixed for the poll's lifetime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParticipantSet {
    points: Vec<u64>,
}

impl ParticipantSet {
    /// Points `1..=n`.
    ///
    /// # Errors
    /// Returns [`TallyError::AuthorityCountTooLarge`] if `n` is not below the
    /// field modulus, since distinct points would then collide.
    pub fn sequential<F: PrimeField>(n: usize) -> Result<Self, TallyError> {
        if !fits::<F>(n as u64) {
            return Err(TallyError::AuthorityCountTooLarge(n));
        }
        Ok(Self {
            points: (1..=n as u64).collect(),
        })
    }

    /// An arbitrary set of distinct nonzero points below the field modulus.
    pub fn from_points<F: PrimeField>(points: Vec<u64>) -> Result<Self, TallyError> {
        let mut seen = BTreeSet::new();
        for &point in &points {
            if point == 0 {
                return Err(TallyError::InvalidParameter(
                    "participant point must be nonzero".to_string(),
                ));
            }
            if !fits::<F>(point) {
                return Err(TallyError::InvalidParameter(format!(
                    "participant point {} is not below the field modulus",
                    point
                )));
            }
            if !seen.insert(point) {
                return Err(TallyError::InvalidParameter(format!(
                    "participant point {} appears twice",
                    point
                )));
            }
        }
        Ok(Self { points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn contains(&self, point: u64) -> bool {
        self.points.contains(&point)
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.points.iter().copied()
    }
}

/// A sharing polynomial with exactly `t` coefficients; the constant term is the secret.
///
/// Coefficients are wiped when the polynomial is dropped.
pub struct SharingPolynomial<F: PrimeField> {
    inner: DensePolynomial<F>,
}

impl<F: PrimeField> SharingPolynomial<F> {
    /// Fresh polynomial hiding `secret`, with `threshold - 1` uniformly random coefficients.
    pub fn random<R: RngCore + CryptoRng>(
        secret: F,
        threshold: usize,
        rng: &mut R,
    ) -> Result<Self, TallyError> {
        if threshold == 0 {
            return Err(TallyError::InvalidParameter(
                "threshold must be at least 1".to_string(),
            ));
        }
        let mut coeffs = Vec::with_capacity(threshold);
        coeffs.push(secret);
        coeffs.extend((1..threshold).map(|_| F::rand(rng)));
        Ok(Self {
            inner: DensePolynomial { coeffs },
        })
    }

    /// Polynomial with caller-chosen coefficients, constant term first.
    ///
    /// # Errors
    /// Returns [`TallyError::InvalidParameter`] unless `coeffs.len() == threshold`.
    pub fn from_coefficients(coeffs: Vec<F>, threshold: usize) -> Result<Self, TallyError> {
        if threshold == 0 || coeffs.len() != threshold {
            return Err(TallyError::InvalidParameter(format!(
                "expected {} coefficients, got {}",
                threshold,
                coeffs.len()
            )));
        }
        // Built directly: `from_coefficients_vec` would trim trailing zeros.
        Ok(Self {
            inner: DensePolynomial { coeffs },
        })
    }

    /// Number of coefficients, i.e. the threshold this polynomial shares at.
    pub fn len(&self) -> usize {
        self.inner.coeffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.coeffs.is_empty()
    }

    /// Horner evaluation at `x`.
    pub fn evaluate(&self, x: u64) -> F {
        self.inner.evaluate(&F::from(x))
    }
}

impl<F: PrimeField> Drop for SharingPolynomial<F> {
    fn drop(&mut self) {
        self.inner.coeffs.zeroize();
    }
}

/// Threshold sharing scheme with `threshold` coefficients per polynomial.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShamirScheme<F: PrimeField> {
    threshold: usize,
    _field: std::marker::PhantomData<F>,
}

impl<F: PrimeField> ShamirScheme<F> {
    pub fn new(threshold: usize) -> Result<Self, TallyError> {
        if threshold == 0 {
            return Err(TallyError::InvalidParameter(
                "threshold must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            threshold,
            _field: std::marker::PhantomData,
        })
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Shares `secret` among `participants` with a freshly drawn polynomial.
    pub fn share<R: RngCore + CryptoRng>(
        &self,
        secret: F,
        participants: &ParticipantSet,
        rng: &mut R,
    ) -> Result<ShareMap<F>, TallyError> {
        let polynomial = SharingPolynomial::random(secret, self.threshold, rng)?;
        self.share_with(&polynomial, participants)
    }

    /// Shares with an explicitly supplied polynomial.
    pub fn share_with(
        &self,
        polynomial: &SharingPolynomial<F>,
        participants: &ParticipantSet,
    ) -> Result<ShareMap<F>, TallyError> {
        if polynomial.len() != self.threshold {
            return Err(TallyError::InvalidParameter(format!(
                "polynomial has {} coefficients, scheme threshold is {}",
                polynomial.len(),
                self.threshold
            )));
        }
        Ok(participants
            .iter()
            .map(|x| (x, polynomial.evaluate(x)))
            .collect())
    }

    /// Recovers the secret from at least `threshold` shares.
    ///
    /// Any subset of the dealt shares of size `>= threshold` gives the same result.
    pub fn reconstruct(&self, shares: &ShareMap<F>) -> Result<F, TallyError> {
        if shares.is_empty() || shares.len() < self.threshold {
            return Err(TallyError::InsufficientShares {
                available: shares.len(),
                threshold: self.threshold,
            });
        }
        interpolate_at_zero(shares)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Fp2089, Fp2203};
    use ark_bls12_381::Fr;
    use ark_std::Zero;

    fn subset<F: PrimeField>(shares: &ShareMap<F>, points: &[u64]) -> ShareMap<F> {
        points.iter().map(|x| (*x, shares[x])).collect()
    }

    #[test]
    fn test_share_and_reconstruct_small_field() {
        let mut rng = crate::test_rng();
        let participants = ParticipantSet::sequential::<Fp2089>(5).unwrap();
        let scheme = ShamirScheme::<Fp2089>::new(3).unwrap();
        let secret = Fp2089::from(42u64);

        let shares = scheme.share(secret, &participants, &mut rng).unwrap();
        assert_eq!(shares.len(), 5);

        let recovered = scheme.reconstruct(&subset(&shares, &[2, 4, 5])).unwrap();
        assert_eq!(recovered, secret);

        assert_eq!(
            scheme.reconstruct(&subset(&shares, &[2, 4])),
            Err(TallyError::InsufficientShares {
                available: 2,
                threshold: 3
            })
        );
    }

    #[test]
    fn test_threshold_two_needs_two_shares() {
        let mut rng = crate::test_rng();
        let participants = ParticipantSet::sequential::<Fp2089>(5).unwrap();
        let scheme = ShamirScheme::<Fp2089>::new(2).unwrap();
        let secret = Fp2089::from(42u64);

        let shares = scheme.share(secret, &participants, &mut rng).unwrap();
        assert_eq!(scheme.reconstruct(&subset(&shares, &[2, 4])).unwrap(), secret);
        assert_eq!(scheme.reconstruct(&subset(&shares, &[2, 4, 5])).unwrap(), secret);
        assert!(matches!(
            scheme.reconstruct(&subset(&shares, &[3])),
            Err(TallyError::InsufficientShares { .. })
        ));
    }

    #[test]
    fn test_any_subset_reconstructs() {
        let mut rng = crate::test_rng();
        let n = 7;
        let t = 3;
        let participants = ParticipantSet::sequential::<Fr>(n).unwrap();
        let scheme = ShamirScheme::<Fr>::new(t).unwrap();
        let secret = Fr::rand(&mut rng);
        let shares = scheme.share(secret, &participants, &mut rng).unwrap();

        // Every contiguous window of size t..=n, starting anywhere
        for size in t..=n {
            for start in 1..=(n - size + 1) as u64 {
                let points: Vec<u64> = (start..start + size as u64).collect();
                let recovered = scheme.reconstruct(&subset(&shares, &points)).unwrap();
                assert_eq!(recovered, secret, "points {:?}", points);
            }
        }

        // A non-contiguous subset
        let recovered = scheme.reconstruct(&subset(&shares, &[1, 4, 7])).unwrap();
        assert_eq!(recovered, secret);
    }

    #[test]
    fn test_reference_field_round_trip() {
        let mut rng = crate::test_rng();
        let participants = ParticipantSet::sequential::<Fp2203>(9).unwrap();
        let scheme = ShamirScheme::<Fp2203>::new(4).unwrap();
        let secret = Fp2203::rand(&mut rng);

        let shares = scheme.share(secret, &participants, &mut rng).unwrap();
        assert_eq!(scheme.reconstruct(&shares).unwrap(), secret);
        assert_eq!(scheme.reconstruct(&subset(&shares, &[3, 6, 8, 9])).unwrap(), secret);
    }

    #[test]
    fn test_threshold_one_is_replication() {
        let mut rng = crate::test_rng();
        let participants = ParticipantSet::sequential::<Fp2089>(3).unwrap();
        let scheme = ShamirScheme::<Fp2089>::new(1).unwrap();
        let shares = scheme
            .share(Fp2089::from(9u64), &participants, &mut rng)
            .unwrap();
        assert!(shares.values().all(|y| *y == Fp2089::from(9u64)));
    }

    #[test]
    fn test_share_with_explicit_polynomial() {
        // f(x) = 1 + 2x
        let participants = ParticipantSet::sequential::<Fp2089>(3).unwrap();
        let scheme = ShamirScheme::<Fp2089>::new(2).unwrap();
        let polynomial =
            SharingPolynomial::from_coefficients(vec![Fp2089::from(1u64), Fp2089::from(2u64)], 2)
                .unwrap();

        let shares = scheme.share_with(&polynomial, &participants).unwrap();
        assert_eq!(shares[&1], Fp2089::from(3u64));
        assert_eq!(shares[&2], Fp2089::from(5u64));
        assert_eq!(shares[&3], Fp2089::from(7u64));
        assert_eq!(scheme.reconstruct(&shares).unwrap(), Fp2089::from(1u64));
    }

    #[test]
    fn test_trailing_zero_coefficients_are_kept() {
        let polynomial =
            SharingPolynomial::from_coefficients(vec![Fp2089::from(5u64), Fp2089::zero()], 2)
                .unwrap();
        assert_eq!(polynomial.len(), 2);
        assert_eq!(polynomial.evaluate(10), Fp2089::from(5u64));
    }

    #[test]
    fn test_wrong_coefficient_count_is_rejected() {
        let coeffs = vec![Fp2089::from(1u64); 3];
        assert!(matches!(
            SharingPolynomial::from_coefficients(coeffs, 2),
            Err(TallyError::InvalidParameter(_))
        ));

        let scheme = ShamirScheme::<Fp2089>::new(3).unwrap();
        let participants = ParticipantSet::sequential::<Fp2089>(5).unwrap();
        let polynomial =
            SharingPolynomial::from_coefficients(vec![Fp2089::from(1u64); 2], 2).unwrap();
        assert!(matches!(
            scheme.share_with(&polynomial, &participants),
            Err(TallyError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(ShamirScheme::<Fp2089>::new(0).is_err());
        assert_eq!(
            ParticipantSet::sequential::<Fp2089>(2089),
            Err(TallyError::AuthorityCountTooLarge(2089))
        );
        assert!(ParticipantSet::sequential::<Fp2089>(2088).is_ok());
        assert!(ParticipantSet::from_points::<Fp2089>(vec![1, 0]).is_err());
        assert!(ParticipantSet::from_points::<Fp2089>(vec![3, 3]).is_err());
        assert!(ParticipantSet::from_points::<Fp2089>(vec![2089]).is_err());
    }

    #[test]
    fn test_empty_share_map_is_insufficient() {
        let scheme = ShamirScheme::<Fp2089>::new(1).unwrap();
        assert_eq!(
            scheme.reconstruct(&ShareMap::new()),
            Err(TallyError::InsufficientShares {
                available: 0,
                threshold: 1
            })
        );
    }
}
