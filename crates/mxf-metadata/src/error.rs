use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("object is a leaf and owns no children")]
    NotCompound,

    #[error("object has no child named {0}")]
    NoSuchChild(String),

    #[error("no object is registered for UL {0}")]
    UnknownUl(String),

    #[error("reference value has the wrong byte size: expected 16, got {0}")]
    BadReferenceSize(usize),

    #[error(transparent)]
    Types(#[from] mxf_types::Error),

    #[error(transparent)]
    Core(#[from] mxf_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
