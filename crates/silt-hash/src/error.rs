/// Errors from canonical encoding primitives.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EncodingError {
    /// The input bytes are not a valid encoding.
    #[error("corrupt encoding: {0}")]
    Corrupt(String),
}
