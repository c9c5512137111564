use crate::error::ReadError;
use musig2::secp::{Point, Scalar};
use musig2::{BinaryEncoding, LiftedSignature, PartialSignature, PubNonce};

pub fn read_point(field: &str, bytes: &[u8]) -> Result<Point, ReadError> {
    Point::try_from(bytes)
        .map_err(|_| ReadError::new(field, format!("{} bytes do not encode a compressed curve point", bytes.len())))
}

pub fn read_scalar(field: &str, bytes: &[u8]) -> Result<Scalar, ReadError> {
    Scalar::try_from(bytes)
        .map_err(|_| ReadError::new(field, format!("{} bytes do not encode a non-zero scalar", bytes.len())))
}

pub fn read_pub_nonce(field: &str, bytes: &[u8]) -> Result<PubNonce, ReadError> {
    PubNonce::try_from(bytes)
        .map_err(|_| ReadError::new(field, format!("{} bytes do not encode a public nonce", bytes.len())))
}

pub fn read_partial_sig(field: &str, bytes: &[u8]) -> Result<PartialSignature, ReadError> {
    PartialSignature::try_from(bytes)
        .map_err(|_| ReadError::new(field, format!("{} bytes do not encode a partial signature", bytes.len())))
}

pub fn read_signature(field: &str, bytes: &[u8]) -> Result<LiftedSignature, ReadError> {
    LiftedSignature::from_bytes(bytes)
        .map_err(|_| ReadError::new(field, format!("{} bytes do not encode a Schnorr signature", bytes.len())))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::multisig::random_scalar;

    #[test]
    fn malformed_inputs_are_rejected() {
        assert!(read_point("buyerOutputPeersPubKeyShare", &[2u8; 12]).is_err());
        assert!(read_point("buyerOutputPeersPubKeyShare", &[5u8; 33]).is_err());
        assert!(read_scalar("peerOutputPrvKeyShare", &[0u8; 32]).is_err());
        assert!(read_pub_nonce("swapTxInputNonceShare", &[1u8; 65]).is_err());
        assert!(read_partial_sig("swapTxInputPartialSignature", &[]).is_err());
        let err = read_signature("swapTx", &[0u8; 10]).unwrap_err();
        assert_eq!(err.field(), "swapTx");
    }

    #[test]
    fn keys_survive_the_wire() {
        let s = random_scalar();
        let p = s.base_point_mul();
        assert_eq!(read_point("p", &p.serialize()).unwrap(), p);
        assert_eq!(read_scalar("s", &s.serialize()).unwrap(), s);
    }
}
