//! Error types for the secret-shared poll library

/// Errors surfaced by sharing, the multiplication round and poll orchestration.
///
/// Construction-time variants (`TooManyOptions`, `AuthorityCountTooLarge`,
/// `TooFewAuthorities`, `EmptyOptions`, `DuplicateOption`) mean no poll was
/// created. Per-vote variants leave the poll exactly as it was before the call.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TallyError {
    /// The ballot label is not one of the poll's options
    #[error("invalid ballot: {0:?} is not an option of this poll")]
    InvalidBallot(String),
    /// The poll reached the largest vote count it can decode unambiguously
    #[error("vote capacity exceeded: this poll accepts at most {max} votes")]
    VoteCapacityExceeded { max: u64 },
    /// More options than the encoding can represent
    #[error("too many options: {given} given, at most {max} supported")]
    TooManyOptions { given: usize, max: usize },
    /// The number of authorities is not smaller than the field modulus
    #[error("authority count {0} must be smaller than the field modulus")]
    AuthorityCountTooLarge(usize),
    /// The threshold `n / 2` would be zero
    #[error("at least 2 authorities are required, got {0}")]
    TooFewAuthorities(usize),
    /// A poll needs at least one option
    #[error("a poll needs at least one option")]
    EmptyOptions,
    /// The same label was given twice
    #[error("duplicate option {0:?}")]
    DuplicateOption(String),
    /// Reconstruction was attempted with fewer shares than the threshold
    #[error("insufficient shares: {available} available, {threshold} required")]
    InsufficientShares { available: usize, threshold: usize },
    /// Modular inverse of an element that shares a factor with the modulus
    #[error("element is not invertible modulo the field prime")]
    NotInvertible,
    /// Invalid parameter provided (threshold, polynomial length, points)
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// A multiplication round was driven out of order or with missing parties
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    /// The reconstructed element does not decode to a valid tally
    #[error("inconsistent tally: {0}")]
    InconsistentTally(String),
    /// The random number generator could not be seeded
    #[error("randomness error: {0}")]
    Randomness(String),
    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),
    /// A task or channel of the distributed round failed
    #[error("channel error: {0}")]
    Channel(String),
}

impl From<ark_serialize::SerializationError> for TallyError {
    fn from(err: ark_serialize::SerializationError) -> Self {
        TallyError::Serialization(err.to_string())
    }
}
