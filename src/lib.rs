//! Secret-Shared Polls
//!
//! This library tallies categorical polls among a set of authorities that
//! never see an individual ballot or a partial tally. Every ballot is
//! Shamir-shared at threshold `t = n / 2`; any `t` authorities can open the
//! final tally, fewer learn nothing.
//!
//! ## Overview
//!
//! - **Binary polls** (two options) encode ballots as `0` or `1`. The tally
//!   is a sum, and each authority simply adds its shares.
//! - **N-ary polls** (up to 32 options) give each option a distinct small
//!   prime. The tally is the product of all ballots, kept shared by a
//!   resharing multiplication round, and is decoded by factorization.
//!
//! ## Key Components
//!
//! - **Field**: the reference field `p = 2^2203 - 1` and a small test field
//! - **Sharing**: polynomials, shares and Lagrange reconstruction at zero
//! - **Multiplication**: the PRECOMPUTE / RESHARE / CONSOLIDATE round
//! - **Encoding**: option weights, capacity and decoding
//! - **Poll**: the session that drives all of the above
//!
//! ## Example
//!
//! ```rust,no_run
//! use shamir_poll::{create_poll, Fp2203};
//!
//! let mut poll = create_poll::<Fp2203>(5, &["A", "B", "C", "D"], "Where to?").unwrap();
//! for ballot in ["A", "B", "A", "A", "C"] {
//!     poll.vote(ballot).unwrap();
//! }
//!
//! let results = poll.results().unwrap();
//! assert_eq!(results.count("A"), Some(3));
//! println!("{results}");
//! ```

pub mod authority;
#[cfg(feature = "distributed")]
pub mod channels;
pub mod encoding;
pub mod error;
pub mod field;
pub mod lagrange;
pub mod multiplication;
pub mod poll;
pub mod security;
pub mod shamir;

pub use encoding::{OptionEncoding, MAX_NARY_VOTES, MAX_OPTIONS, PRIME_CATALOG};
pub use error::TallyError;
pub use field::{Fp2089, Fp2203};
pub use poll::{create_poll, PollConfig, PollResults, PollSession};

/// Seeded CSPRNG for deterministic tests.
#[cfg(test)]
pub(crate) fn test_rng() -> ark_std::rand::rngs::StdRng {
    use ark_std::rand::SeedableRng;
    ark_std::rand::rngs::StdRng::seed_from_u64(7)
}
