use crate::multisig::{KeyCtx, ProtocolError, Result, SingleUseNonce};
use log::*;
use musig2::secp::{MaybeScalar, Point, Scalar};
use musig2::{adaptor, AdaptorSignature, AggNonce, LiftedSignature, PartialSignature, PubNonce};

/// Signing state for a single transaction input.
///
/// When an adaptor point is set, every partial signature, aggregate and verification for this input is performed
/// in adaptor form, and a usable signature only exists after [`SigCtx::adapt`] with the matching secret.
pub struct SigCtx {
    label: &'static str,
    my_nonce_share: Option<SingleUseNonce>,
    peers_nonce_share: Option<PubNonce>,
    aggregated_nonce: Option<AggNonce>,
    message: Option<[u8; 32]>,
    adaptor_point: Option<Point>,
    my_partial_sig: Option<PartialSignature>,
    peers_partial_sig: Option<PartialSignature>,
    adaptor_sig: Option<AdaptorSignature>,
    aggregated_sig: Option<LiftedSignature>,
}

impl SigCtx {
    pub fn new(label: &'static str) -> Self {
        SigCtx {
            label,
            my_nonce_share: None,
            peers_nonce_share: None,
            aggregated_nonce: None,
            message: None,
            adaptor_point: None,
            my_partial_sig: None,
            peers_partial_sig: None,
            adaptor_sig: None,
            aggregated_sig: None,
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Generate our nonce share for this input. Any previous, unused nonce is discarded.
    pub fn init_my_nonce_share(&mut self, key_ctx: &KeyCtx) -> Result<&PubNonce> {
        let aggregated_pub_key = key_ctx.aggregated_pub_key()?;
        let nonce = SingleUseNonce::generate(key_ctx.my_key_share(), aggregated_pub_key, self.label);
        Ok(self.my_nonce_share.insert(nonce).pub_nonce())
    }

    pub fn my_pub_nonce(&self) -> Result<&PubNonce> {
        self.my_nonce_share.as_ref().map(SingleUseNonce::pub_nonce).ok_or(ProtocolError::MissingNonceShare)
    }

    pub fn set_peers_nonce_share(&mut self, nonce: PubNonce) -> Result<()> {
        let mine = self.my_pub_nonce()?;
        let aggregated = AggNonce::sum([mine, &nonce]);
        self.aggregated_nonce = Some(aggregated);
        self.peers_nonce_share = Some(nonce);
        Ok(())
    }

    pub fn set_message(&mut self, message: [u8; 32]) {
        self.message = Some(message);
    }

    pub fn set_adaptor_point(&mut self, adaptor_point: Point) {
        self.adaptor_point = Some(adaptor_point);
    }

    pub fn adaptor_point(&self) -> Option<Point> {
        self.adaptor_point
    }

    fn aggregated_nonce(&self) -> Result<&AggNonce> {
        self.aggregated_nonce.as_ref().ok_or(ProtocolError::MissingAggNonce)
    }

    fn message(&self) -> Result<&[u8; 32]> {
        self.message.as_ref().ok_or(ProtocolError::MissingMessage)
    }

    /// Produce our partial signature. Once the nonce and message are in place, the secret nonce is consumed
    /// whether or not signing succeeds.
    pub fn sign_partial(&mut self, key_ctx: &KeyCtx) -> Result<PartialSignature> {
        let key_agg_ctx = key_ctx.key_agg_ctx()?;
        let seckey = key_ctx.my_key_share().prv_key();
        let aggregated_nonce = self.aggregated_nonce.as_ref().ok_or(ProtocolError::MissingAggNonce)?;
        let message = self.message.as_ref().ok_or(ProtocolError::MissingMessage)?;
        let secnonce = self.my_nonce_share.as_mut().ok_or(ProtocolError::MissingNonceShare)?.take_secret()?;
        let sig: PartialSignature = match self.adaptor_point {
            Some(adaptor_point) => {
                adaptor::sign_partial(key_agg_ctx, seckey, secnonce, aggregated_nonce, adaptor_point, message)?
            }
            None => musig2::sign_partial(key_agg_ctx, seckey, secnonce, aggregated_nonce, message)?,
        };
        trace!("Signed {}", self.label);
        Ok(*self.my_partial_sig.insert(sig))
    }

    pub fn my_partial_sig(&self) -> Result<PartialSignature> {
        self.my_partial_sig.ok_or(ProtocolError::MissingPartialSig)
    }

    /// Verify the peer's partial signature against its public key share and nonce share, and keep it if valid.
    pub fn set_peers_partial_sig(&mut self, key_ctx: &KeyCtx, sig: PartialSignature) -> Result<()> {
        let key_agg_ctx = key_ctx.key_agg_ctx()?;
        let peers_pub_key = key_ctx.peers_pub_key_share()?;
        let peers_nonce = self.peers_nonce_share.as_ref().ok_or(ProtocolError::MissingNonceShare)?;
        let aggregated_nonce = self.aggregated_nonce()?;
        let message = self.message()?;
        match self.adaptor_point {
            Some(adaptor_point) => adaptor::verify_partial(
                key_agg_ctx,
                sig,
                aggregated_nonce,
                adaptor_point,
                peers_pub_key,
                peers_nonce,
                message,
            )?,
            None => musig2::verify_partial(key_agg_ctx, sig, aggregated_nonce, peers_pub_key, peers_nonce, message)?,
        }
        self.peers_partial_sig = Some(sig);
        Ok(())
    }

    pub fn has_peers_partial_sig(&self) -> bool {
        self.peers_partial_sig.is_some()
    }

    fn partial_sigs(&self) -> Result<[PartialSignature; 2]> {
        let mine = self.my_partial_sig()?;
        let peers = self.peers_partial_sig.ok_or(ProtocolError::MissingPartialSig)?;
        Ok([mine, peers])
    }

    /// Aggregate both partial signatures into a final Schnorr signature, checked against the aggregated key.
    pub fn aggregate_partial_signatures(&mut self, key_ctx: &KeyCtx) -> Result<LiftedSignature> {
        if self.adaptor_point.is_some() {
            return Err(ProtocolError::AdaptorInput(self.label));
        }
        let key_agg_ctx = key_ctx.key_agg_ctx()?;
        let aggregated_nonce = self.aggregated_nonce()?;
        let message = self.message()?;
        let sig: LiftedSignature =
            musig2::aggregate_partial_signatures(key_agg_ctx, aggregated_nonce, self.partial_sigs()?, message)?;
        musig2::verify_single(key_ctx.aggregated_pub_key()?, sig, message)?;
        Ok(*self.aggregated_sig.insert(sig))
    }

    /// Aggregate both adaptor partial signatures into an adaptor signature, which verifies against the aggregated
    /// key and the adaptor point but is not yet a valid Schnorr signature.
    pub fn aggregate_adaptor_signature(&mut self, key_ctx: &KeyCtx) -> Result<&AdaptorSignature> {
        let adaptor_point = self.adaptor_point.ok_or(ProtocolError::MissingAdaptorSig)?;
        let key_agg_ctx = key_ctx.key_agg_ctx()?;
        let aggregated_nonce = self.aggregated_nonce()?;
        let message = self.message()?;
        let adaptor_sig = adaptor::aggregate_partial_signatures(
            key_agg_ctx,
            aggregated_nonce,
            adaptor_point,
            self.partial_sigs()?,
            message,
        )?;
        adaptor::verify_single(key_ctx.aggregated_pub_key()?, &adaptor_sig, message, adaptor_point)?;
        Ok(self.adaptor_sig.insert(adaptor_sig))
    }

    pub fn adaptor_sig(&self) -> Option<&AdaptorSignature> {
        self.adaptor_sig.as_ref()
    }

    /// Complete the adaptor signature with the adaptor secret.
    pub fn adapt(&mut self, key_ctx: &KeyCtx, adaptor_secret: Scalar) -> Result<LiftedSignature> {
        let message = *self.message()?;
        let adaptor_sig = self.adaptor_sig.as_ref().ok_or(ProtocolError::MissingAdaptorSig)?;
        let sig: LiftedSignature = adaptor_sig.adapt(adaptor_secret).ok_or(ProtocolError::AdaptorSecret)?;
        musig2::verify_single(key_ctx.aggregated_pub_key()?, sig, message)?;
        Ok(*self.aggregated_sig.insert(sig))
    }

    /// Extract the adaptor secret from a completed signature seen on chain.
    pub fn reveal_secret(&self, key_ctx: &KeyCtx, final_sig: LiftedSignature) -> Result<Scalar> {
        let message = self.message()?;
        musig2::verify_single(key_ctx.aggregated_pub_key()?, final_sig, message)?;
        let adaptor_sig = self.adaptor_sig.as_ref().ok_or(ProtocolError::MissingAdaptorSig)?;
        let secret: MaybeScalar = adaptor_sig.reveal_secret(&final_sig).ok_or(ProtocolError::AdaptorSecret)?;
        let secret = secret.not_zero().map_err(|_| ProtocolError::AdaptorSecret)?;
        match self.adaptor_point {
            Some(point) if point == secret.base_point_mul() => Ok(secret),
            _ => Err(ProtocolError::AdaptorSecret),
        }
    }

    pub fn aggregated_sig(&self) -> Result<LiftedSignature> {
        self.aggregated_sig.ok_or(ProtocolError::MissingPartialSig)
    }
}
