//! Poll orchestration.
//!
//! A [`PollSession`] owns every authority and drives each vote through
//! sharing, folding and, at the end, reconstruction and decoding. Authorities
//! never see the session; they are handed the shares each phase needs.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use ark_ff::PrimeField;
use ark_std::rand::{rngs::StdRng, CryptoRng, RngCore, SeedableRng};
use blake2::{Blake2b512, Digest};
use tracing::{debug, info, warn};

use crate::authority::Authority;
use crate::encoding::{OptionEncoding, OptionTable};
use crate::error::TallyError;
use crate::shamir::{ParticipantSet, ShamirScheme, ShareMap};

/// Everything needed to open a poll.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollConfig {
    pub authority_count: usize,
    pub options: Vec<String>,
    pub question: String,
}

impl PollConfig {
    pub fn new<I, S>(authority_count: usize, options: I, question: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            authority_count,
            options: options.into_iter().map(Into::into).collect(),
            question: question.into(),
        }
    }
}

/// Opens a poll over `F` with fresh OS randomness.
pub fn create_poll<F: PrimeField>(
    authority_count: usize,
    options: &[&str],
    question: &str,
) -> Result<PollSession<F>, TallyError> {
    PollSession::new(PollConfig::new(
        authority_count,
        options.iter().copied(),
        question,
    ))
}

/// A running poll: the authorities, their shares, and the vote counter.
pub struct PollSession<F: PrimeField> {
    fingerprint: String,
    question: String,
    encoding: OptionEncoding,
    options: OptionTable,
    participants: ParticipantSet,
    scheme: ShamirScheme<F>,
    authorities: Vec<Authority<F>>,
    votes: u64,
    capacity: u64,
    rng: StdRng,
}

impl<F: PrimeField> PollSession<F> {
    pub fn new(config: PollConfig) -> Result<Self, TallyError> {
        let mut rng = StdRng::from_entropy();
        Self::with_rng(config, &mut rng)
    }

    /// Builds a poll whose randomness is drawn from `rng`.
    ///
    /// # Errors
    /// Fails before anything is allocated per authority if the configuration
    /// is invalid: too few or too many authorities, no options, too many
    /// options, or a repeated option label.
    pub fn with_rng<R: RngCore + CryptoRng>(
        config: PollConfig,
        rng: &mut R,
    ) -> Result<Self, TallyError> {
        let PollConfig {
            authority_count,
            options,
            question,
        } = config;

        if authority_count < 2 {
            return Err(TallyError::TooFewAuthorities(authority_count));
        }
        let encoding = OptionEncoding::for_option_count(options.len())?;
        let table = encoding.assign_weights(&options)?;
        let participants = ParticipantSet::sequential::<F>(authority_count)?;
        let scheme = ShamirScheme::<F>::new(authority_count / 2)?;
        let authorities: Vec<Authority<F>> = encoding.derive_authorities(&participants, rng)?;
        let capacity = encoding.capacity::<F>(&table);
        let session_rng =
            StdRng::from_rng(rng).map_err(|e| TallyError::Randomness(e.to_string()))?;
        let fingerprint = fingerprint(&question, &options, authority_count);

        info!(
            poll = %fingerprint,
            authorities = authority_count,
            threshold = scheme.threshold(),
            options = table.len(),
            ?encoding,
            capacity,
            "poll created"
        );

        Ok(Self {
            fingerprint,
            question,
            encoding,
            options: table,
            participants,
            scheme,
            authorities,
            votes: 0,
            capacity,
            rng: session_rng,
        })
    }

    /// Casts one ballot for `label`.
    ///
    /// A rejected ballot leaves every running share and the counter unchanged.
    pub fn vote(&mut self, label: &str) -> Result<(), TallyError> {
        let weight = self.weight_of(label)?;
        self.ensure_capacity(1)?;
        self.cast(weight)
    }

    /// Casts `count` identical ballots for `label`.
    ///
    /// The label and the capacity for the whole batch are checked before the
    /// first ballot is cast.
    pub fn vote_many(&mut self, label: &str, count: u64) -> Result<(), TallyError> {
        let weight = self.weight_of(label)?;
        self.ensure_capacity(count)?;
        for _ in 0..count {
            self.cast(weight)?;
        }
        Ok(())
    }

    /// Like [`PollSession::vote`], but every multiplication round runs one
    /// tokio task per authority.
    #[cfg(feature = "distributed")]
    pub async fn vote_distributed(&mut self, label: &str) -> Result<(), TallyError> {
        let weight = self.weight_of(label)?;
        self.ensure_capacity(1)?;
        // Only a multiplication round has anything to distribute
        if self.encoding != OptionEncoding::PrimeFactorization || self.votes == 0 {
            return self.cast(weight);
        }

        let mut shares = self.share_ballot(weight)?;
        let folded = crate::channels::multiply_over_channels(
            &mut self.authorities,
            &shares,
            &self.scheme,
            &self.participants,
        )
        .await;
        self.finish_ballot(&mut shares, folded)
    }

    /// Reconstructs from every authority and decodes the counts.
    pub fn results(&self) -> Result<PollResults, TallyError> {
        let points: Vec<u64> = self.participants.iter().collect();
        self.results_from(&points)
    }

    /// Reconstructs using only the authorities at `points`.
    pub fn results_from(&self, points: &[u64]) -> Result<PollResults, TallyError> {
        let tally = self.tally_from(points)?;
        let counts = self.encoding.decode(tally, &self.options, self.votes)?;
        let results = PollResults {
            question: self.question.clone(),
            total_votes: self.votes,
            counts: self
                .options
                .labels()
                .map(str::to_string)
                .zip(counts)
                .collect(),
        };
        info!(poll = %self.fingerprint, votes = self.votes, "results decoded");
        Ok(results)
    }

    /// The tally as a field element: a product of weights or a sum of bits.
    pub fn reconstructed_tally(&self) -> Result<F, TallyError> {
        let points: Vec<u64> = self.participants.iter().collect();
        self.tally_from(&points)
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn options(&self) -> &OptionTable {
        &self.options
    }

    pub fn encoding(&self) -> OptionEncoding {
        self.encoding
    }

    pub fn participants(&self) -> &ParticipantSet {
        &self.participants
    }

    pub fn authorities(&self) -> &[Authority<F>] {
        &self.authorities
    }

    pub fn authority_count(&self) -> usize {
        self.authorities.len()
    }

    pub fn threshold(&self) -> usize {
        self.scheme.threshold()
    }

    pub fn votes_cast(&self) -> u64 {
        self.votes
    }

    /// Ballots this poll accepts in total.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Short hex digest identifying the poll in logs.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    fn weight_of(&self, label: &str) -> Result<u64, TallyError> {
        self.options.weight_of(label).ok_or_else(|| {
            warn!(poll = %self.fingerprint, "rejected ballot for unknown option {label:?}");
            TallyError::InvalidBallot(label.to_string())
        })
    }

    fn ensure_capacity(&self, additional: u64) -> Result<(), TallyError> {
        match self.votes.checked_add(additional) {
            Some(total) if total <= self.capacity => Ok(()),
            _ => {
                warn!(
                    poll = %self.fingerprint,
                    votes = self.votes,
                    capacity = self.capacity,
                    "vote capacity exhausted"
                );
                Err(TallyError::VoteCapacityExceeded { max: self.capacity })
            }
        }
    }

    fn cast(&mut self, weight: u64) -> Result<(), TallyError> {
        let mut shares = self.share_ballot(weight)?;
        let folded = self.encoding.fold_vote(
            &mut self.authorities,
            &shares,
            &self.scheme,
            &self.participants,
            self.votes == 0,
        );
        self.finish_ballot(&mut shares, folded)
    }

    fn share_ballot(&mut self, weight: u64) -> Result<ShareMap<F>, TallyError> {
        self.scheme
            .share(F::from(weight), &self.participants, &mut self.rng)
    }

    /// Wipes the ballot's shares and counts it if folding succeeded.
    fn finish_ballot(
        &mut self,
        shares: &mut ShareMap<F>,
        folded: Result<(), TallyError>,
    ) -> Result<(), TallyError> {
        wipe(shares);
        folded?;

        self.votes += 1;
        debug!(poll = %self.fingerprint, votes = self.votes, "ballot folded");
        Ok(())
    }

    fn tally_from(&self, points: &[u64]) -> Result<F, TallyError> {
        let selected: BTreeSet<u64> = points.iter().copied().collect();
        if let Some(unknown) = selected.iter().find(|p| !self.participants.contains(**p)) {
            return Err(TallyError::InvalidParameter(format!(
                "{} is not an authority of this poll",
                unknown
            )));
        }
        if selected.len() < self.scheme.threshold() {
            return Err(TallyError::InsufficientShares {
                available: selected.len(),
                threshold: self.scheme.threshold(),
            });
        }
        if self.votes == 0 {
            return Ok(self.encoding.empty_tally());
        }

        let mut shares = self
            .authorities
            .iter()
            .filter(|authority| selected.contains(&authority.point()))
            .map(|authority| {
                authority
                    .running_share()
                    .map(|share| (authority.point(), share))
                    .ok_or_else(|| {
                        TallyError::ProtocolViolation(format!(
                            "authority {} holds no running share",
                            authority.point()
                        ))
                    })
            })
            .collect::<Result<ShareMap<F>, TallyError>>()?;
        let tally = self.scheme.reconstruct(&shares);
        wipe(&mut shares);
        tally
    }
}

impl<F: PrimeField> fmt::Debug for PollSession<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollSession")
            .field("fingerprint", &self.fingerprint)
            .field("question", &self.question)
            .field("encoding", &self.encoding)
            .field("authorities", &self.authorities.len())
            .field("threshold", &self.scheme.threshold())
            .field("votes", &self.votes)
            .field("capacity", &self.capacity)
            .finish()
    }
}

fn wipe<F: PrimeField>(shares: &mut ShareMap<F>) {
    shares.values_mut().for_each(|share| share.zeroize());
}

fn fingerprint(question: &str, options: &[String], authority_count: usize) -> String {
    let mut hasher = Blake2b512::new();
    for field in std::iter::once(question).chain(options.iter().map(String::as_str)) {
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }
    hasher.update((authority_count as u64).to_le_bytes());
    hex::encode(&hasher.finalize()[..16])
}

/// Decoded counts, in the order the options were declared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollResults {
    pub question: String,
    pub total_votes: u64,
    pub counts: Vec<(String, u64)>,
}

impl PollResults {
    pub fn count(&self, label: &str) -> Option<u64> {
        self.counts
            .iter()
            .find(|(option, _)| option == label)
            .map(|(_, count)| *count)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.counts
            .iter()
            .map(|(label, count)| (label.as_str(), *count))
    }

    pub fn to_map(&self) -> BTreeMap<String, u64> {
        self.counts.iter().cloned().collect()
    }
}

impl fmt::Display for PollResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.question)?;
        writeln!(f, "Number of voters: {}", self.total_votes)?;
        for (label, count) in self.iter() {
            writeln!(f, "{}: {}", label, count)?;
        }
        Ok(())
    }
}
