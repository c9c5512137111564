use crate::helpers::random_seed;
use crate::multisig::{KeyShare, ProtocolError, Result};
use musig2::secp::Point;
use musig2::{PubNonce, SecNonce, SecNonceBuilder};
use std::fmt::{Debug, Formatter};

/// A MuSig2 nonce pair whose secret half can be taken exactly once.
///
/// Signing consumes the secret nonce, so a second signature with the same nonce is a `NonceReuse` error rather
/// than a leaked key.
pub struct SingleUseNonce {
    pub_nonce: PubNonce,
    sec_nonce: Option<SecNonce>,
}

impl SingleUseNonce {
    /// Generate a fresh nonce from a CSPRNG seed, bound to the signer's key share, the aggregated key and the label
    /// of the input it will sign.
    pub fn generate(key_share: &KeyShare, aggregated_pub_key: Point, label: &str) -> Self {
        let seed = random_seed();
        let sec_nonce = SecNonceBuilder::new(*seed)
            .with_seckey(key_share.prv_key())
            .with_aggregated_pubkey(aggregated_pub_key)
            .with_extra_input(&label)
            .build();
        SingleUseNonce { pub_nonce: sec_nonce.public_nonce(), sec_nonce: Some(sec_nonce) }
    }

    pub fn pub_nonce(&self) -> &PubNonce {
        &self.pub_nonce
    }

    pub fn is_spent(&self) -> bool {
        self.sec_nonce.is_none()
    }

    pub(crate) fn take_secret(&mut self) -> Result<SecNonce> {
        self.sec_nonce.take().ok_or(ProtocolError::NonceReuse)
    }
}

impl Debug for SingleUseNonce {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = if self.is_spent() { "spent" } else { "unspent" };
        write!(f, "SingleUseNonce({}, {state})", hex::encode(self.pub_nonce.serialize()))
    }
}
