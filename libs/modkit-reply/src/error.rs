use thiserror::Error;

/// Errors produced while building or emitting a reply.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ReplyError {
    /// The builder was already finalized; a reply can only be emitted once.
    #[error("reply has already been finalized")]
    AlreadyFinalized,

    /// An error entry created against another builder was handed to this one.
    #[error("error entry is owned by a different response builder")]
    ForeignEntry,

    /// Reply data must be a JSON array or object.
    #[error("reply data must be an array or an object, got {kind}")]
    ScalarData { kind: &'static str },

    /// Envelope encoding failed
    #[error("failed to serialize reply envelope: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Reply configuration could not be extracted
    #[error("invalid reply configuration: {0}")]
    Config(#[source] Box<figment::Error>),
}

impl From<figment::Error> for ReplyError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}
