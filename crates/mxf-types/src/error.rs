use thiserror::Error;

/// Failures from the type/traits registry.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown type name: {0}")]
    UnknownType(String),

    #[error("unknown traits mapping for type: {0}")]
    UnknownTraitsMapping(String),

    #[error("type {0} is not a compound type")]
    NotCompound(String),

    #[error("compound type {compound} has no member named {member}")]
    NoSuchMember { compound: String, member: String },

    #[error("traits mismatch calling {0}")]
    TraitMismatch(&'static str),

    #[error("interpretation chain for {0} is circular")]
    CircularInterpretation(String),

    #[error(transparent)]
    Core(#[from] mxf_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
