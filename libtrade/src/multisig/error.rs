use musig2::errors::{InvalidSecretKeysError, KeyAggError, SigningError, VerifyError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("missing key share")]
    MissingKeyShare,
    #[error("missing nonce share")]
    MissingNonceShare,
    #[error("missing partial signature")]
    MissingPartialSig,
    #[error("missing aggregated pubkey")]
    MissingAggPubKey,
    #[error("missing aggregated nonce")]
    MissingAggNonce,
    #[error("missing message to sign")]
    MissingMessage,
    #[error("missing adaptor signature")]
    MissingAdaptorSig,
    #[error("{0} is signed in adaptor form and must be adapted")]
    AdaptorInput(&'static str),
    #[error("nonce has already been used")]
    NonceReuse,
    #[error("the peer supplied our own key share")]
    DuplicateKeyShare,
    #[error("key share mismatch: {0}")]
    KeyShareMismatch(String),
    #[error("the adaptor secret does not complete the adaptor signature")]
    AdaptorSecret,
    #[error(transparent)]
    KeyAgg(#[from] KeyAggError),
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error(transparent)]
    Verify(#[from] VerifyError),
    #[error(transparent)]
    SecretKeys(#[from] InvalidSecretKeysError),
}

impl ProtocolError {
    pub fn mismatch(what: impl Into<String>) -> Self {
        ProtocolError::KeyShareMismatch(what.into())
    }
}
