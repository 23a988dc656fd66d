//! Lagrange interpolation at zero.
//!
//! For a fixed set of sample points `x_0, ..., x_{k-1}` the Lagrange basis
//! polynomial of `x_j` evaluated at zero is
//!
//! ```text
//! beta_j = prod_{m != j} x_m / (x_m - x_j)
//! ```
//!
//! `sum_j beta_j * f(x_j) = f(0)` for every polynomial `f` of degree below `k`.

use std::collections::BTreeMap;

use ark_ff::PrimeField;

use crate::error::TallyError;
use crate::field::inverse;
use crate::shamir::{ParticipantSet, ShareMap};

/// Computes the Lagrange basis value at zero for `points[j]` within `points`.
///
/// # Errors
/// Returns [`TallyError::NotInvertible`] if `points` contains `points[j]` twice.
pub fn coefficient_at_zero<F: PrimeField>(points: &[F], j: usize) -> Result<F, TallyError> {
    let xj = points
        .get(j)
        .ok_or_else(|| TallyError::InvalidParameter(format!("no sample point at index {}", j)))?;

    let mut product = F::one();
    for (m, xm) in points.iter().enumerate() {
        if m == j {
            continue;
        }
        product *= *xm * inverse(*xm - xj)?;
    }
    Ok(product)
}

/// Recovers `f(0)` from samples `(x, f(x))`.
///
/// The caller is responsible for supplying enough samples for the degree of `f`.
pub fn interpolate_at_zero<F: PrimeField>(samples: &ShareMap<F>) -> Result<F, TallyError> {
    let points: Vec<F> = samples.keys().map(|x| F::from(*x)).collect();

    let mut result = F::zero();
    for (j, y) in samples.values().enumerate() {
        result += *y * coefficient_at_zero(&points, j)?;
    }
    Ok(result)
}

/// Lagrange weights at zero for every point of a participant set.
///
/// Computed once per poll and reused by every multiplication round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BetaTable<F: PrimeField> {
    betas: BTreeMap<u64, F>,
}

impl<F: PrimeField> BetaTable<F> {
    /// Precomputes `beta(x)` for each point of `participants`.
    pub fn new(participants: &ParticipantSet) -> Result<Self, TallyError> {
        let points: Vec<F> = participants.iter().map(F::from).collect();

        let mut betas = BTreeMap::new();
        for (j, point) in participants.iter().enumerate() {
            betas.insert(point, coefficient_at_zero(&points, j)?);
        }
        Ok(Self { betas })
    }

    /// The weight of `point`, if it belongs to the set.
    pub fn get(&self, point: u64) -> Option<F> {
        self.betas.get(&point).copied()
    }

    pub fn len(&self) -> usize {
        self.betas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.betas.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, F)> + '_ {
        self.betas.iter().map(|(x, beta)| (*x, *beta))
    }
}
