//! Ballot encodings and tally decoding.
//!
//! Two strategies share one interface:
//!
//! - [`OptionEncoding::PrimeFactorization`] gives every option a distinct
//!   small prime. The tally is the product of all ballots, folded with the
//!   multiplication round, and decodes by dividing out each prime.
//! - [`OptionEncoding::Binary`] maps two options to `0` and `1`. The tally
//!   is the sum of all ballots; shares are simply added.

use std::collections::BTreeMap;

use ark_ff::PrimeField;
use ark_std::rand::{CryptoRng, RngCore};
use num_bigint::BigUint;

use crate::authority::Authority;
use crate::error::TallyError;
use crate::field::{modulus, to_biguint};
use crate::lagrange::BetaTable;
use crate::multiplication::multiply;
use crate::shamir::{ParticipantSet, ShamirScheme, ShareMap};

/// Option weights for prime-factorization polls, in assignment order.
pub const PRIME_CATALOG: [u64; 32] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
    101, 103, 107, 109, 113, 127, 131,
];

pub const MAX_OPTIONS: usize = PRIME_CATALOG.len();

/// Upper bound on ballots in a prime-factorization poll.
pub const MAX_NARY_VOTES: u64 = 181;

/// Bijection between option labels and their weights, in declaration order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptionTable {
    entries: Vec<(String, u64)>,
    by_label: BTreeMap<String, usize>,
}

impl OptionTable {
    fn new(labels: &[String], weights: &[u64]) -> Result<Self, TallyError> {
        let mut by_label = BTreeMap::new();
        for (index, label) in labels.iter().enumerate() {
            if by_label.insert(label.clone(), index).is_some() {
                return Err(TallyError::DuplicateOption(label.clone()));
            }
        }
        let entries = labels.iter().cloned().zip(weights.iter().copied()).collect();
        Ok(Self { entries, by_label })
    }

    pub fn weight_of(&self, label: &str) -> Option<u64> {
        self.by_label.get(label).map(|index| self.entries[*index].1)
    }

    pub fn label_of(&self, weight: u64) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, w)| *w == weight)
            .map(|(label, _)| label.as_str())
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(label, _)| label.as_str())
    }

    pub fn weights(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.iter().map(|(_, weight)| *weight)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.entries.iter().map(|(label, weight)| (label.as_str(), *weight))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Largest assigned weight, `Z` in the capacity bound.
    pub fn max_weight(&self) -> u64 {
        self.weights().max().unwrap_or(0)
    }
}

/// How ballots are turned into field elements and folded into the tally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptionEncoding {
    PrimeFactorization,
    Binary,
}

impl OptionEncoding {
    /// Binary for exactly two options, prime factorization otherwise.
    pub fn for_option_count(count: usize) -> Result<Self, TallyError> {
        match count {
            0 => Err(TallyError::EmptyOptions),
            2 => Ok(Self::Binary),
            n if n > MAX_OPTIONS => Err(TallyError::TooManyOptions {
                given: n,
                max: MAX_OPTIONS,
            }),
            _ => Ok(Self::PrimeFactorization),
        }
    }

    pub fn assign_weights(&self, labels: &[String]) -> Result<OptionTable, TallyError> {
        match self {
            Self::PrimeFactorization => {
                if labels.len() > MAX_OPTIONS {
                    return Err(TallyError::TooManyOptions {
                        given: labels.len(),
                        max: MAX_OPTIONS,
                    });
                }
                OptionTable::new(labels, &PRIME_CATALOG[..labels.len()])
            }
            Self::Binary => {
                if labels.len() != 2 {
                    return Err(TallyError::InvalidParameter(format!(
                        "binary encoding needs exactly 2 options, got {}",
                        labels.len()
                    )));
                }
                OptionTable::new(labels, &[0, 1])
            }
        }
    }

    /// One authority per participant point.
    ///
    /// Prime-factorization authorities carry their Lagrange weight and start
    /// empty; binary authorities start from a share of zero.
    pub fn derive_authorities<F, R>(
        &self,
        participants: &ParticipantSet,
        rng: &mut R,
    ) -> Result<Vec<Authority<F>>, TallyError>
    where
        F: PrimeField,
        R: RngCore + CryptoRng,
    {
        match self {
            Self::PrimeFactorization => {
                let betas = BetaTable::<F>::new(participants)?;
                participants
                    .iter()
                    .map(|point| Authority::seeded(point, betas.get(point), rng))
                    .collect()
            }
            Self::Binary => participants
                .iter()
                .map(|point| {
                    let mut authority = Authority::seeded(point, None, rng)?;
                    authority.initialize(F::zero());
                    Ok(authority)
                })
                .collect(),
        }
    }

    /// Folds one shared ballot into every authority's running share.
    ///
    /// Either every authority is updated or none is.
    pub fn fold_vote<F: PrimeField>(
        &self,
        authorities: &mut [Authority<F>],
        vote_shares: &ShareMap<F>,
        scheme: &ShamirScheme<F>,
        participants: &ParticipantSet,
        first_vote: bool,
    ) -> Result<(), TallyError> {
        match self {
            Self::PrimeFactorization if !first_vote => {
                multiply(authorities, vote_shares, scheme, participants)
            }
            Self::PrimeFactorization => {
                let shares = shares_in_order(authorities, vote_shares)?;
                for (authority, share) in authorities.iter_mut().zip(shares) {
                    authority.initialize(share);
                }
                Ok(())
            }
            Self::Binary => {
                let shares = shares_in_order(authorities, vote_shares)?;
                if authorities.iter().any(|a| a.running_share().is_none()) {
                    return Err(TallyError::ProtocolViolation(
                        "binary authority holds no running share".to_string(),
                    ));
                }
                for (authority, share) in authorities.iter_mut().zip(shares) {
                    authority.accumulate(share)?;
                }
                Ok(())
            }
        }
    }

    /// The tally before any ballot: the empty product or the empty sum.
    pub fn empty_tally<F: PrimeField>(&self) -> F {
        match self {
            Self::PrimeFactorization => F::one(),
            Self::Binary => F::zero(),
        }
    }

    /// Per-option counts, in option order, from a reconstructed tally.
    ///
    /// # Errors
    /// Returns [`TallyError::InconsistentTally`] if `tally` cannot be the
    /// result of `votes` ballots over `table`.
    pub fn decode<F: PrimeField>(
        &self,
        tally: F,
        table: &OptionTable,
        votes: u64,
    ) -> Result<Vec<u64>, TallyError> {
        let value = to_biguint(tally);
        match self {
            Self::PrimeFactorization => {
                let primes: Vec<u64> = table.weights().collect();
                let (counts, residual) = factorize(value, &primes);
                if residual != BigUint::from(1u32) {
                    return Err(TallyError::InconsistentTally(format!(
                        "tally has a factor {} outside the option weights",
                        residual
                    )));
                }
                let total: u64 = counts.iter().sum();
                if total != votes {
                    return Err(TallyError::InconsistentTally(format!(
                        "decoded {} ballots, {} were cast",
                        total, votes
                    )));
                }
                Ok(counts)
            }
            Self::Binary => {
                let ones = u64::try_from(&value)
                    .ok()
                    .filter(|ones| *ones <= votes)
                    .ok_or_else(|| {
                        TallyError::InconsistentTally(format!(
                            "sum {} exceeds the {} ballots cast",
                            value, votes
                        ))
                    })?;
                Ok(vec![votes - ones, ones])
            }
        }
    }

    /// Most ballots the tally can hold without wrapping modulo `p`.
    pub fn capacity<F: PrimeField>(&self, table: &OptionTable) -> u64 {
        let p = modulus::<F>();
        match self {
            Self::PrimeFactorization => {
                let base = BigUint::from(table.max_weight().max(2));
                let mut power = BigUint::from(1u32);
                let mut votes = 0;
                while votes < MAX_NARY_VOTES {
                    power *= &base;
                    if power >= p {
                        break;
                    }
                    votes += 1;
                }
                votes
            }
            Self::Binary => u64::try_from(&(p - 1u32)).unwrap_or(u64::MAX),
        }
    }
}

/// Exponent of each of `primes` in `value`, and what is left after dividing them out.
pub fn factorize(mut value: BigUint, primes: &[u64]) -> (Vec<u64>, BigUint) {
    let zero = BigUint::from(0u32);
    let mut counts = Vec::with_capacity(primes.len());
    for &prime in primes {
        let mut count = 0;
        if value != zero && prime > 1 {
            let divisor = BigUint::from(prime);
            while (&value % &divisor) == zero {
                value /= &divisor;
                count += 1;
            }
        }
        counts.push(count);
    }
    (counts, value)
}

/// Vote shares lined up with `authorities`, failing if any is missing.
fn shares_in_order<F: PrimeField>(
    authorities: &[Authority<F>],
    vote_shares: &ShareMap<F>,
) -> Result<Vec<F>, TallyError> {
    authorities
        .iter()
        .map(|authority| {
            vote_shares.get(&authority.point()).copied().ok_or_else(|| {
                TallyError::ProtocolViolation(format!(
                    "no vote share for authority {}",
                    authority.point()
                ))
            })
        })
        .collect()
}
