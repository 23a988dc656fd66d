//! The multiplication round with one task per authority.
//!
//! Each authority runs as its own tokio task. Sub-shares travel as
//! `ark-serialize`-encoded [`ReshareMessage`]s over one mpsc channel per
//! receiver, and a [`Barrier`] separates RESHARE from CONSOLIDATE: no task
//! reads its inbox until every task has finished sending.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use ark_ff::PrimeField;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use tokio::sync::{mpsc, Barrier};
use tracing::debug;
use zeroize::Zeroize;

use crate::authority::Authority;
use crate::error::TallyError;
use crate::multiplication::{ensure_degree_reducible, ensure_full_participation, ReshareMessage};
use crate::shamir::{ParticipantSet, ShamirScheme, ShareMap};

/// Longest a task waits for its peers to finish sending.
pub const BARRIER_TIMEOUT: Duration = Duration::from_secs(30);

/// Serialized single-receiver [`ReshareMessage`].
struct Envelope {
    payload: Vec<u8>,
}

impl Drop for Envelope {
    fn drop(&mut self) {
        self.payload.zeroize();
    }
}

/// Same contract as [`crate::multiplication::multiply`], with every authority
/// on its own task.
///
/// The tasks work on clones; `authorities` is only overwritten once every
/// task has consolidated.
pub async fn multiply_over_channels<F: PrimeField>(
    authorities: &mut [Authority<F>],
    vote_shares: &ShareMap<F>,
    scheme: &ShamirScheme<F>,
    participants: &ParticipantSet,
) -> Result<(), TallyError> {
    ensure_full_participation(authorities, participants)?;
    ensure_degree_reducible(scheme, participants)?;

    let n = participants.len();
    let barrier = Arc::new(Barrier::new(n));
    let mut outboxes = BTreeMap::new();
    let mut inboxes = BTreeMap::new();
    for point in participants.iter() {
        let (tx, rx) = mpsc::channel::<Envelope>(n);
        outboxes.insert(point, tx);
        inboxes.insert(point, rx);
    }

    let mut handles = Vec::with_capacity(n);
    for authority in authorities.iter() {
        let point = authority.point();
        let inbox = inboxes.remove(&point).ok_or_else(|| {
            TallyError::Channel(format!("no inbox for authority {}", point))
        })?;
        let task = AuthorityTask {
            authority: authority.clone(),
            vote_share: vote_shares.get(&point).copied(),
            scheme: scheme.clone(),
            participants: participants.clone(),
            outboxes: outboxes.clone(),
            inbox,
            barrier: barrier.clone(),
        };
        handles.push(tokio::spawn(task.run()));
    }
    drop(outboxes);

    let mut finished = Vec::with_capacity(n);
    for handle in handles {
        let (authority, consolidated) = handle
            .await
            .map_err(|e| TallyError::Channel(format!("authority task failed: {e}")))?;
        finished.push((authority, consolidated?));
    }

    for (slot, (mut authority, share)) in authorities.iter_mut().zip(finished) {
        authority.consolidate(share);
        *slot = authority;
    }
    debug!(authorities = n, "channel round complete");
    Ok(())
}

struct AuthorityTask<F: PrimeField> {
    authority: Authority<F>,
    vote_share: Option<F>,
    scheme: ShamirScheme<F>,
    participants: ParticipantSet,
    outboxes: BTreeMap<u64, mpsc::Sender<Envelope>>,
    inbox: mpsc::Receiver<Envelope>,
    barrier: Arc<Barrier>,
}

impl<F: PrimeField> AuthorityTask<F> {
    async fn run(mut self) -> (Authority<F>, Result<F, TallyError>) {
        let point = self.authority.point();
        let sent = self.send_sub_shares().await;
        // Reached even on failure, so no peer waits on this task
        let synced = wait_at_barrier(&self.barrier, BARRIER_TIMEOUT).await;
        drop(self.outboxes);

        let consolidated = sent
            .and(synced)
            .and_then(|()| receive_and_sum(point, &mut self.inbox, &self.participants));
        (self.authority, consolidated)
    }

    async fn send_sub_shares(&mut self) -> Result<(), TallyError> {
        let point = self.authority.point();
        let vote_share = self.vote_share.ok_or_else(|| {
            TallyError::ProtocolViolation(format!("no vote share for authority {}", point))
        })?;
        let message = self
            .authority
            .reshare(vote_share, &self.scheme, &self.participants)?;

        for (receiver, sub_share) in message.sub_shares.iter() {
            let single = ReshareMessage::new(point, [(*receiver, *sub_share)].into());
            let mut payload = Vec::new();
            single.serialize_compressed(&mut payload)?;
            let outbox = self.outboxes.get(receiver).ok_or_else(|| {
                TallyError::Channel(format!("no channel to authority {}", receiver))
            })?;
            outbox
                .send(Envelope { payload })
                .await
                .map_err(|_| TallyError::Channel(format!("authority {} hung up", receiver)))?;
        }
        Ok(())
    }
}

/// Waits for every peer, giving up after `limit`.
///
/// A peer task that died before the barrier would otherwise block the round.
async fn wait_at_barrier(barrier: &Barrier, limit: Duration) -> Result<(), TallyError> {
    tokio::time::timeout(limit, barrier.wait())
        .await
        .map(|_| ())
        .map_err(|_| TallyError::Channel(format!("peers did not reach the barrier within {limit:?}")))
}

/// Drains everything delivered before the barrier and sums it.
fn receive_and_sum<F: PrimeField>(
    receiver: u64,
    inbox: &mut mpsc::Receiver<Envelope>,
    participants: &ParticipantSet,
) -> Result<F, TallyError> {
    let mut received = BTreeMap::new();
    while let Ok(envelope) = inbox.try_recv() {
        let message = ReshareMessage::<F>::deserialize_compressed(&envelope.payload[..])?;
        let sub_share = match message.sub_shares.get(&receiver) {
            Some(share) if message.sub_shares.len() == 1 => *share,
            _ => {
                return Err(TallyError::ProtocolViolation(format!(
                    "misaddressed sub-share from {} to {}",
                    message.sender, receiver
                )))
            }
        };
        if !participants.contains(message.sender)
            || received.insert(message.sender, sub_share).is_some()
        {
            return Err(TallyError::ProtocolViolation(format!(
                "unexpected sub-share from {}",
                message.sender
            )));
        }
    }

    if received.len() != participants.len() {
        return Err(TallyError::ProtocolViolation(format!(
            "authority {} received {} of {} sub-shares",
            receiver,
            received.len(),
            participants.len()
        )));
    }
    let sum = received.values().sum();
    received.values_mut().for_each(|share: &mut F| share.zeroize());
    Ok(sum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::OptionEncoding;
    use crate::field::{Fp2089, Fp2203};
    use crate::poll::{PollConfig, PollSession};

    #[tokio::test]
    async fn test_product_over_channels() {
        let mut rng = crate::test_rng();
        let participants = ParticipantSet::sequential::<Fp2203>(5).unwrap();
        let scheme = ShamirScheme::<Fp2203>::new(2).unwrap();
        let mut authorities: Vec<Authority<Fp2203>> = OptionEncoding::PrimeFactorization
            .derive_authorities(&participants, &mut rng)
            .unwrap();

        let a_shares = scheme
            .share(Fp2203::from(6u64), &participants, &mut rng)
            .unwrap();
        for authority in authorities.iter_mut() {
            authority.initialize(a_shares[&authority.point()]);
        }
        let b_shares = scheme
            .share(Fp2203::from(7u64), &participants, &mut rng)
            .unwrap();

        multiply_over_channels(&mut authorities, &b_shares, &scheme, &participants)
            .await
            .unwrap();

        let product: ShareMap<Fp2203> = authorities
            .iter()
            .map(|a| (a.point(), a.running_share().unwrap()))
            .collect();
        assert_eq!(scheme.reconstruct(&product).unwrap(), Fp2203::from(42u64));
    }

    #[tokio::test]
    async fn test_missing_vote_share_aborts_round() {
        let mut rng = crate::test_rng();
        let participants = ParticipantSet::sequential::<Fp2089>(4).unwrap();
        let scheme = ShamirScheme::<Fp2089>::new(2).unwrap();
        let mut authorities: Vec<Authority<Fp2089>> = OptionEncoding::PrimeFactorization
            .derive_authorities(&participants, &mut rng)
            .unwrap();
        let a_shares = scheme
            .share(Fp2089::from(3u64), &participants, &mut rng)
            .unwrap();
        for authority in authorities.iter_mut() {
            authority.initialize(a_shares[&authority.point()]);
        }
        let before: Vec<_> = authorities.iter().map(|a| a.running_share()).collect();

        let mut b_shares = scheme
            .share(Fp2089::from(5u64), &participants, &mut rng)
            .unwrap();
        b_shares.remove(&4);

        let result =
            multiply_over_channels(&mut authorities, &b_shares, &scheme, &participants).await;
        assert!(matches!(result, Err(TallyError::ProtocolViolation(_))));
        let after: Vec<_> = authorities.iter().map(|a| a.running_share()).collect();
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn test_distributed_poll_matches_local_poll() {
        let mut rng = crate::test_rng();
        let config = PollConfig::new(5, ["A", "B", "C", "D"], "Which day?");
        let mut session = PollSession::<Fp2203>::with_rng(config, &mut rng).unwrap();

        for ballot in ["A", "B", "A", "A", "C"] {
            session.vote_distributed(ballot).await.unwrap();
        }
        assert_eq!(session.reconstructed_tally().unwrap(), Fp2203::from(120u64));

        let results = session.results().unwrap();
        assert_eq!(
            results.iter().collect::<Vec<_>>(),
            vec![("A", 3), ("B", 1), ("C", 1), ("D", 0)]
        );
    }

    #[tokio::test]
    async fn test_distributed_binary_poll() {
        let mut rng = crate::test_rng();
        let config = PollConfig::new(7, ["No", "Yes"], "Proceed?");
        let mut session = PollSession::<Fp2089>::with_rng(config, &mut rng).unwrap();
        for ballot in ["Yes", "No", "Yes", "Yes"] {
            session.vote_distributed(ballot).await.unwrap();
        }
        assert_eq!(session.results().unwrap().count("Yes"), Some(3));
        assert!(session.vote_distributed("Maybe").await.is_err());
        assert_eq!(session.votes_cast(), 4);
    }

    #[tokio::test]
    async fn test_barrier_wait_gives_up_on_missing_peer() {
        // Two parties expected, only one arrives
        let barrier = Barrier::new(2);
        let result = wait_at_barrier(&barrier, Duration::from_millis(20)).await;
        assert!(matches!(result, Err(TallyError::Channel(_))));

        let alone = Barrier::new(1);
        assert!(wait_at_barrier(&alone, Duration::from_millis(20)).await.is_ok());
    }

    #[tokio::test]
    async fn test_vote_paths_agree() {
        let ballots = ["C", "A", "A", "B", "C", "C", "A"];
        let config = PollConfig::new(6, ["A", "B", "C"], "Which room?");

        let mut local =
            PollSession::<Fp2203>::with_rng(config.clone(), &mut crate::test_rng()).unwrap();
        let mut distributed =
            PollSession::<Fp2203>::with_rng(config, &mut crate::test_rng()).unwrap();
        for (i, ballot) in ballots.iter().enumerate() {
            // Alternate paths within one session too
            if i % 2 == 0 {
                local.vote(ballot).unwrap();
            } else {
                local.vote_distributed(ballot).await.unwrap();
            }
            distributed.vote_distributed(ballot).await.unwrap();
        }

        assert_eq!(local.votes_cast(), distributed.votes_cast());
        assert_eq!(
            local.reconstructed_tally().unwrap(),
            distributed.reconstructed_tally().unwrap()
        );
        assert_eq!(local.results().unwrap(), distributed.results().unwrap());
        assert_eq!(distributed.results().unwrap().count("C"), Some(3));
    }
}
