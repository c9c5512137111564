use crate::helpers::random_seed;
use crate::multisig::{ProtocolError, Result};
use log::*;
use musig2::secp::{Point, Scalar};
use musig2::KeyAggContext;
use std::fmt::{Debug, Formatter};

/// Draw a uniformly random non-zero scalar from the thread-local CSPRNG.
pub fn random_scalar() -> Scalar {
    loop {
        let seed = random_seed();
        if let Ok(scalar) = Scalar::try_from(&seed[..]) {
            return scalar;
        }
    }
}

/// Aggregate two public key shares. The shares are sorted first, so both peers arrive at the same context whatever
/// order they list the shares in.
pub fn aggregate_key_shares(a: Point, b: Point) -> Result<KeyAggContext> {
    let mut shares = [a, b];
    shares.sort_by_key(|p| p.serialize());
    Ok(KeyAggContext::new(shares)?)
}

/// One party's private/public key share for a single 2-of-2 output.
#[derive(Clone)]
pub struct KeyShare {
    pub pub_key: Point,
    prv_key: Scalar,
}

impl KeyShare {
    pub fn random() -> Self {
        let prv_key = random_scalar();
        KeyShare { pub_key: prv_key.base_point_mul(), prv_key }
    }

    pub(crate) fn prv_key(&self) -> Scalar {
        self.prv_key
    }
}

impl Debug for KeyShare {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyShare({}, ****)", hex::encode(self.pub_key.serialize()))
    }
}

/// Key aggregation state for one of the two deposit outputs.
pub struct KeyCtx {
    my_key_share: KeyShare,
    peers_key_share: Option<Point>,
    key_agg_ctx: Option<KeyAggContext>,
}

impl KeyCtx {
    pub fn new(my_key_share: KeyShare) -> Self {
        KeyCtx { my_key_share, peers_key_share: None, key_agg_ctx: None }
    }

    pub fn random() -> Self {
        Self::new(KeyShare::random())
    }

    pub fn my_key_share(&self) -> &KeyShare {
        &self.my_key_share
    }

    pub fn my_pub_key_share(&self) -> Point {
        self.my_key_share.pub_key
    }

    pub fn peers_pub_key_share(&self) -> Result<Point> {
        self.peers_key_share.ok_or(ProtocolError::MissingKeyShare)
    }

    /// Record the peer's public key share and aggregate it with ours.
    pub fn set_peers_key_share(&mut self, peers_key_share: Point) -> Result<()> {
        if peers_key_share == self.my_key_share.pub_key {
            return Err(ProtocolError::DuplicateKeyShare);
        }
        let ctx = aggregate_key_shares(self.my_key_share.pub_key, peers_key_share)?;
        self.peers_key_share = Some(peers_key_share);
        self.key_agg_ctx = Some(ctx);
        Ok(())
    }

    pub fn key_agg_ctx(&self) -> Result<&KeyAggContext> {
        self.key_agg_ctx.as_ref().ok_or(ProtocolError::MissingAggPubKey)
    }

    pub fn aggregated_pub_key(&self) -> Result<Point> {
        Ok(self.key_agg_ctx()?.aggregated_pubkey())
    }

    /// Combine the peer's private key share with ours to recover the full spending key for the aggregated output.
    ///
    /// The peer's share must match the public share it committed to during key exchange, and the recovered key
    /// must match the aggregated public key.
    pub fn reconstruct_prv_key(&self, peers_prv_key_share: Scalar) -> Result<Scalar> {
        let peers_pub = self.peers_pub_key_share()?;
        if peers_prv_key_share.base_point_mul() != peers_pub {
            return Err(ProtocolError::mismatch("private key share does not match the peer's public key share"));
        }
        let ctx = self.key_agg_ctx()?;
        let mut pairs = [(self.my_key_share.pub_key, self.my_key_share.prv_key), (peers_pub, peers_prv_key_share)];
        pairs.sort_by_key(|(p, _)| p.serialize());
        let prv_key: Scalar = ctx.aggregated_seckey(pairs.map(|(_, s)| s))?;
        if prv_key.base_point_mul() != ctx.aggregated_pubkey::<Point>() {
            return Err(ProtocolError::mismatch("reconstructed key does not match the aggregated public key"));
        }
        trace!("Reconstructed spending key for {}", hex::encode(ctx.aggregated_pubkey::<Point>().serialize()));
        Ok(prv_key)
    }
}
