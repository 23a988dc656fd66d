//! Secure multiplication of two shared values by resharing.
//!
//! Every authority holds a share `a(x)` of `A` and `b(x)` of `B`, both at
//! threshold `t`. Their pointwise product lies on a polynomial of degree
//! `2t - 2` whose value at zero is `A * B`, so with `n >= 2t - 1` points
//!
//! ```text
//! A * B = sum_x beta(x) * a(x) * b(x)
//! ```
//!
//! One round brings that sum back to a threshold-`t` sharing:
//!
//! 1. **Precompute**: authority `x` computes `z(x) = a(x) * b(x) * beta(x)`.
//! 2. **Reshare**: it shares `z(x)` with a fresh polynomial of threshold `t`
//!    and sends sub-share `z_x(y)` to every authority `y`.
//! 3. **Consolidate**: once every sender has delivered, authority `y` sets
//!    its running share to `sum_x z_x(y)`.
//!
//! The sum of threshold-`t` sharings is a threshold-`t` sharing of the sum,
//! which is `A * B`. No intermediate value is ever reconstructed. The round
//! needs all `n` authorities; a missing sender is a protocol violation.

use std::collections::{BTreeMap, BTreeSet};

use ark_ff::PrimeField;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use rayon::prelude::*;
use tracing::debug;

use crate::authority::Authority;
use crate::error::TallyError;
use crate::shamir::{ParticipantSet, ShamirScheme, ShareMap};

/// Sub-shares of one authority's local product, keyed by receiver.
#[derive(CanonicalSerialize, CanonicalDeserialize, Clone, PartialEq)]
pub struct ReshareMessage<F: PrimeField> {
    /// Participant point of the sending authority
    pub sender: u64,
    /// One sub-share per receiving participant point
    pub sub_shares: ShareMap<F>,
}

impl<F: PrimeField> ReshareMessage<F> {
    pub fn new(sender: u64, sub_shares: ShareMap<F>) -> Self {
        Self { sender, sub_shares }
    }
}

impl<F: PrimeField> Drop for ReshareMessage<F> {
    fn drop(&mut self) {
        self.sub_shares.values_mut().for_each(|share| share.zeroize());
    }
}

impl<F: PrimeField> std::fmt::Debug for ReshareMessage<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReshareMessage")
            .field("sender", &self.sender)
            .field("receivers", &self.sub_shares.keys().collect::<Vec<_>>())
            .field("sub_shares", &"[REDACTED]")
            .finish()
    }
}

/// Mailbox of a single resharing round.
///
/// Filled by every sender before any receiver reads its inbox, then dropped.
/// Buffered sub-shares are wiped on drop.
pub struct ReshareRound<F: PrimeField> {
    participants: ParticipantSet,
    inbox: BTreeMap<u64, ShareMap<F>>,
}

impl<F: PrimeField> ReshareRound<F> {
    pub fn new(participants: &ParticipantSet) -> Self {
        Self {
            participants: participants.clone(),
            inbox: BTreeMap::new(),
        }
    }

    /// Accepts one sender's message.
    ///
    /// # Errors
    /// Returns [`TallyError::ProtocolViolation`] for unknown or repeated
    /// senders and for messages that do not address exactly the participant set.
    pub fn deliver(&mut self, mut message: ReshareMessage<F>) -> Result<(), TallyError> {
        let sender = message.sender;
        if !self.participants.contains(sender) {
            return Err(TallyError::ProtocolViolation(format!(
                "message from unknown sender {}",
                sender
            )));
        }
        if self.inbox.contains_key(&sender) {
            return Err(TallyError::ProtocolViolation(format!(
                "sender {} delivered twice in one round",
                sender
            )));
        }
        let addresses_everyone = message.sub_shares.len() == self.participants.len()
            && self
                .participants
                .iter()
                .all(|receiver| message.sub_shares.contains_key(&receiver));
        if !addresses_everyone {
            return Err(TallyError::ProtocolViolation(format!(
                "message from {} does not address every participant",
                sender
            )));
        }

        self.inbox
            .insert(sender, std::mem::take(&mut message.sub_shares));
        Ok(())
    }

    /// Barrier predicate: every participant has delivered.
    pub fn is_complete(&self) -> bool {
        self.inbox.len() == self.participants.len()
    }

    pub fn senders(&self) -> usize {
        self.inbox.len()
    }

    /// Sum of the sub-shares addressed to `receiver`.
    ///
    /// # Errors
    /// Returns [`TallyError::ProtocolViolation`] before the round is complete
    /// or for a receiver outside the participant set.
    pub fn consolidate_for(&self, receiver: u64) -> Result<F, TallyError> {
        if !self.is_complete() {
            return Err(TallyError::ProtocolViolation(format!(
                "round incomplete: {} of {} senders delivered",
                self.inbox.len(),
                self.participants.len()
            )));
        }
        if !self.participants.contains(receiver) {
            return Err(TallyError::ProtocolViolation(format!(
                "receiver {} is not a participant",
                receiver
            )));
        }
        // `deliver` guarantees every message addresses `receiver`
        Ok(self
            .inbox
            .values()
            .filter_map(|sub_shares| sub_shares.get(&receiver))
            .sum())
    }
}

impl<F: PrimeField> Drop for ReshareRound<F> {
    fn drop(&mut self) {
        for sub_shares in self.inbox.values_mut() {
            sub_shares.values_mut().for_each(|share| share.zeroize());
        }
    }
}

/// Checks that `authorities` are exactly the participants, each present once.
pub(crate) fn ensure_full_participation<F: PrimeField>(
    authorities: &[Authority<F>],
    participants: &ParticipantSet,
) -> Result<(), TallyError> {
    let present: BTreeSet<u64> = authorities.iter().map(Authority::point).collect();
    let expected: BTreeSet<u64> = participants.iter().collect();
    if present.len() != authorities.len() || present != expected {
        return Err(TallyError::ProtocolViolation(format!(
            "multiplication needs all {} authorities, {} took part",
            participants.len(),
            present.intersection(&expected).count()
        )));
    }
    Ok(())
}

/// Checks `n >= 2t - 1`, the condition for degree reduction.
pub(crate) fn ensure_degree_reducible<F: PrimeField>(
    scheme: &ShamirScheme<F>,
    participants: &ParticipantSet,
) -> Result<(), TallyError> {
    let t = scheme.threshold();
    if participants.len() + 1 < 2 * t {
        return Err(TallyError::InvalidParameter(format!(
            "degree reduction needs n >= 2t - 1, got n = {} and t = {}",
            participants.len(),
            t
        )));
    }
    Ok(())
}

/// Folds `vote_shares` into every authority's running share by multiplication.
///
/// On success each authority holds a threshold-`t` share of
/// `running * vote`. On error no running share has changed.
pub fn multiply<F: PrimeField>(
    authorities: &mut [Authority<F>],
    vote_shares: &ShareMap<F>,
    scheme: &ShamirScheme<F>,
    participants: &ParticipantSet,
) -> Result<(), TallyError> {
    ensure_full_participation(authorities, participants)?;
    ensure_degree_reducible(scheme, participants)?;

    // Precompute and reshare
    let messages = authorities
        .par_iter_mut()
        .map(|authority| {
            let vote_share = vote_shares.get(&authority.point()).copied().ok_or_else(|| {
                TallyError::ProtocolViolation(format!(
                    "no vote share for authority {}",
                    authority.point()
                ))
            })?;
            authority.reshare(vote_share, scheme, participants)
        })
        .collect::<Result<Vec<_>, TallyError>>()?;

    let mut round = ReshareRound::new(participants);
    for message in messages {
        round.deliver(message)?;
    }
    debug!(
        senders = round.senders(),
        threshold = scheme.threshold(),
        "reshare round complete"
    );

    // Consolidate; commit only once every authority has its new share
    let consolidated = authorities
        .par_iter()
        .map(|authority| round.consolidate_for(authority.point()))
        .collect::<Result<Vec<F>, TallyError>>()?;

    for (authority, share) in authorities.iter_mut().zip(consolidated) {
        authority.consolidate(share);
    }
    Ok(())
}
