//! Tallying authorities.
//!
//! An authority is identified by its participant point and owns exactly one
//! secret: its running share of the cumulative tally. It never sees the
//! poll's other state; the orchestrator hands it the data each phase needs.

use ark_ff::PrimeField;
use ark_std::rand::{rngs::StdRng, CryptoRng, RngCore, SeedableRng};

use crate::error::TallyError;
use crate::multiplication::ReshareMessage;
use crate::security::SensitiveScalar;
use crate::shamir::{ParticipantSet, ShamirScheme};

/// One party of the poll.
#[derive(Clone)]
pub struct Authority<F: PrimeField> {
    point: u64,
    /// Lagrange weight of `point`, present only when votes are multiplied
    beta: Option<F>,
    running: Option<SensitiveScalar<F>>,
    rng: StdRng,
}

impl<F: PrimeField> Authority<F> {
    /// Creates an authority with no running share yet.
    pub fn new(point: u64, beta: Option<F>, rng: StdRng) -> Self {
        Self {
            point,
            beta,
            running: None,
            rng,
        }
    }

    /// Creates an authority whose private randomness is seeded from `rng`.
    pub fn seeded<R: RngCore + CryptoRng>(
        point: u64,
        beta: Option<F>,
        rng: &mut R,
    ) -> Result<Self, TallyError> {
        let own = StdRng::from_rng(rng).map_err(|e| TallyError::Randomness(e.to_string()))?;
        Ok(Self::new(point, beta, own))
    }

    pub fn point(&self) -> u64 {
        self.point
    }

    pub fn beta(&self) -> Option<F> {
        self.beta
    }

    /// The authority's current piece of the tally.
    ///
    /// # Security Warning
    /// Revealing `threshold` of these reveals the tally.
    pub fn running_share(&self) -> Option<F> {
        self.running.as_ref().map(|share| *share.expose_secret())
    }

    /// Sets the running share outright (first vote, or the additive zero).
    pub fn initialize(&mut self, share: F) {
        match &mut self.running {
            Some(running) => running.replace(share),
            slot @ None => *slot = Some(SensitiveScalar::new(share)),
        }
    }

    /// Adds `share` to the running share.
    pub fn accumulate(&mut self, share: F) -> Result<(), TallyError> {
        let point = self.point;
        let running = self.running.as_mut().ok_or_else(|| uninitialized(point))?;
        let sum = *running.expose_secret() + share;
        running.replace(sum);
        Ok(())
    }

    /// PRECOMPUTE: `running(x) * vote(x) * beta(x)`.
    pub fn local_product(&self, vote_share: F) -> Result<SensitiveScalar<F>, TallyError> {
        let running = self
            .running
            .as_ref()
            .ok_or_else(|| uninitialized(self.point))?;
        let beta = self.beta.ok_or_else(|| {
            TallyError::ProtocolViolation(format!(
                "authority {} has no Lagrange weight for multiplication",
                self.point
            ))
        })?;
        Ok(SensitiveScalar::new(
            *running.expose_secret() * vote_share * beta,
        ))
    }

    /// PRECOMPUTE followed by RESHARE: shares the local product with a fresh
    /// polynomial of the scheme's threshold, addressed to every participant.
    pub fn reshare(
        &mut self,
        vote_share: F,
        scheme: &ShamirScheme<F>,
        participants: &ParticipantSet,
    ) -> Result<ReshareMessage<F>, TallyError> {
        let product = self.local_product(vote_share)?;
        let sub_shares = scheme.share(*product.expose_secret(), participants, &mut self.rng)?;
        Ok(ReshareMessage::new(self.point, sub_shares))
    }

    /// CONSOLIDATE: the sum of the sub-shares addressed to this authority
    /// becomes its new running share.
    pub fn consolidate(&mut self, sum: F) {
        self.initialize(sum);
    }
}

fn uninitialized(point: u64) -> TallyError {
    TallyError::ProtocolViolation(format!("authority {} holds no running share", point))
}

impl<F: PrimeField> std::fmt::Debug for Authority<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authority")
            .field("point", &self.point)
            .field("weighted", &self.beta.is_some())
            .field("running", &self.running)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Fp2089;

    fn authority(beta: Option<Fp2089>) -> Authority<Fp2089> {
        let mut rng = crate::test_rng();
        Authority::seeded(3, beta, &mut rng).unwrap()
    }

    #[test]
    fn test_accumulate() {
        let mut a = authority(None);
        assert_eq!(a.running_share(), None);
        assert!(matches!(
            a.accumulate(Fp2089::from(1u64)),
            Err(TallyError::ProtocolViolation(_))
        ));

        a.initialize(Fp2089::from(2080u64));
        a.accumulate(Fp2089::from(10u64)).unwrap();
        assert_eq!(a.running_share(), Some(Fp2089::from(1u64)));
    }

    #[test]
    fn test_local_product() {
        let mut a = authority(Some(Fp2089::from(5u64)));
        a.initialize(Fp2089::from(3u64));
        let product = a.local_product(Fp2089::from(7u64)).unwrap();
        assert_eq!(product.expose_secret(), &Fp2089::from(105u64));
    }

    #[test]
    fn test_local_product_needs_beta() {
        let mut a = authority(None);
        a.initialize(Fp2089::from(3u64));
        assert!(matches!(
            a.local_product(Fp2089::from(7u64)),
            Err(TallyError::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_debug_redacts_running_share() {
        let mut a = authority(None);
        a.initialize(Fp2089::from(1999u64));
        let debug_str = format!("{:?}", a);
        assert!(debug_str.contains("point: 3"));
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("1999"));
    }
}
