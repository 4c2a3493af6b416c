use thiserror::Error;

/// Failures surfaced by the address codec and transaction construction.
///
/// Codec entry points return only the first three variants; transaction
/// construction aborts with any of the rest and never leaves a partially
/// signed result behind.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The secret could not be parsed as a WIF key for the wallet's network.
    #[error("invalid secret: {0}")]
    InvalidSecret(String),

    /// The secret decodes to an uncompressed public key, which cannot back a
    /// witness program.
    #[error("unsupported key format: segwit requires a compressed public key")]
    UnsupportedKeyFormat,

    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("no destination provided")]
    NoTargets,

    #[error("insufficient funds: have {available_sat} sat, need {required_sat} sat")]
    InsufficientFunds {
        available_sat: u64,
        required_sat: u64,
    },

    #[error("key resolution failed: {0}")]
    KeyResolution(String),

    #[error("signing error: {0}")]
    Signing(String),
}
