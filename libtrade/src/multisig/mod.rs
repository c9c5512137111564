//! Two-party MuSig2 plumbing: one key context per aggregated output key and one signing context per transaction
//! input.
//!
//! Ordering of the two contributions never matters. Public key shares are sorted by their serialized bytes before
//! aggregation, and nonce and partial-signature aggregation are sums.
mod encoding;
mod error;
mod keys;
mod nonce;
mod sig_ctx;

pub use encoding::{read_partial_sig, read_point, read_pub_nonce, read_scalar, read_signature};
pub use error::ProtocolError;
pub use keys::{aggregate_key_shares, random_scalar, KeyCtx, KeyShare};
pub use nonce::SingleUseNonce;
pub use sig_ctx::SigCtx;

pub use musig2::secp::{MaybeScalar, Point, Scalar};
pub use musig2::{AdaptorSignature, AggNonce, LiftedSignature, PartialSignature, PubNonce};

pub type Result<T> = std::result::Result<T, ProtocolError>;
