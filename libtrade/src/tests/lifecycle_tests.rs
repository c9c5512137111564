use super::*;
use crate::multisig::random_scalar;
use crate::state_machine::TradeStage;
use crate::StatusCode;

#[test]
fn nonce_shares_only_once() {
    let pair = published_trade();
    let mut buyer = pair.buyer;
    let p = random_scalar().base_point_mul();
    let q = random_scalar().base_point_mul();
    let mut wallet = InMemoryWallet::new("again", &[100_000]);
    let tx_data = party_tx_data(&mut wallet, &terms(), buyer.role()).unwrap();
    let err = buyer.get_nonce_shares(p, q, terms(), tx_data).unwrap_err();
    assert_eq!(err.code(), StatusCode::FailedPrecondition);
    assert_eq!(buyer.stage(), TradeStage::DepositPublished);
}

#[test]
fn operations_out_of_order_fail() {
    env_logger::try_init().ok();
    let mut seller = TradeSession::new("seller-trade-1", TradeRole::SellerAsTaker, policy());
    assert_eq!(seller.stage(), TradeStage::Created);
    let err = seller.mark_deposit_published().unwrap_err();
    assert_eq!(err.code(), StatusCode::FailedPrecondition);
    let err = seller.sign_swap_tx(random_scalar().into()).unwrap_err();
    assert_eq!(err.code(), StatusCode::FailedPrecondition);
    assert!(seller.record_confirmations(3).is_err());
    assert_eq!(seller.stage(), TradeStage::Created);
}

#[test]
fn own_key_share_is_rejected() {
    let mut seller = TradeSession::new("seller-trade-2", TradeRole::SellerAsTaker, policy());
    let (p, q) = seller.my_pub_key_shares();
    let mut wallet = InMemoryWallet::new("seller", &[300_000]);
    let tx_data = party_tx_data(&mut wallet, &terms(), seller.role()).unwrap();
    let err = seller.get_nonce_shares(p, q, terms(), tx_data).unwrap_err();
    assert_eq!(err.code(), StatusCode::InvalidArgument);
    assert_eq!(seller.stage(), TradeStage::Created);
}

#[test]
fn underfunded_wallet_cannot_join() {
    let mut wallet = InMemoryWallet::new("seller", &[100_000]);
    let err = party_tx_data(&mut wallet, &terms(), TradeRole::SellerAsMaker).unwrap_err();
    assert_eq!(err.code(), StatusCode::FailedPrecondition);
}

#[test]
fn nonce_shares_are_fresh() {
    let mut a = TradeSession::new("a", TradeRole::BuyerAsMaker, policy());
    let mut b = TradeSession::new("b", TradeRole::BuyerAsMaker, policy());
    let peer = TradeSession::new("peer", TradeRole::SellerAsTaker, policy());
    let (sp, sq) = peer.my_pub_key_shares();
    let mut wallet = InMemoryWallet::new("buyer", &[50_000, 50_000]);
    let data_a = party_tx_data(&mut wallet, &terms(), a.role()).unwrap();
    let data_b = party_tx_data(&mut wallet, &terms(), b.role()).unwrap();
    let nonces_a = a.get_nonce_shares(sp, sq, terms(), data_a).unwrap();
    let nonces_b = b.get_nonce_shares(sp, sq, terms(), data_b).unwrap();
    assert_ne!(nonces_a.nonce_shares.swap_tx_input, nonces_b.nonce_shares.swap_tx_input);
    assert_ne!(nonces_a.nonce_shares.swap_tx_input, nonces_a.nonce_shares.buyers_redirect_tx_input);
}

#[test]
fn deposit_signing_tolerates_redacted_swap_signature() {
    let pair = published_trade();
    assert_eq!(pair.buyer.stage(), TradeStage::DepositPublished);
    assert_eq!(pair.seller.stage(), TradeStage::DepositPublished);
    assert_eq!(pair.buyers_deposit.deposit_tx, pair.sellers_deposit.deposit_tx);
    // Each peer ends up with its own fallback transactions
    assert_ne!(pair.buyers_deposit.fallback.warning_tx.txid(), pair.sellers_deposit.fallback.warning_tx.txid());
    assert_eq!(pair.sellers_deposit.fallback.redirect_tx.tx.inputs[0].sequence, 144);
}

#[test]
fn swap_requires_confirmations_and_seller() {
    let mut pair = published_trade();
    let swap_partial = pair.buyers_sigs.swap_tx_input.unwrap();
    let err = pair.buyer.sign_swap_tx(swap_partial).unwrap_err();
    assert_eq!(err.code(), StatusCode::FailedPrecondition);
    assert!(err.to_string().contains("seller"));

    pair.seller.record_confirmations(1).unwrap();
    let err = pair.seller.sign_swap_tx(swap_partial).unwrap_err();
    assert_eq!(err.code(), StatusCode::FailedPrecondition);
    assert!(err.to_string().contains("1 confirmations"), "{err}");

    pair.seller.record_confirmations(3).unwrap();
    pair.seller.record_confirmations(2).unwrap();
    assert_eq!(pair.seller.confirmations(), 3);
    let signed = pair.seller.sign_swap_tx(swap_partial).unwrap();
    assert_eq!(pair.seller.stage(), TradeStage::SwapSigned);
    let (_, q) = pair.seller.model().keys().aggregated_keys().unwrap();
    signed.swap_tx.verify(&[q]).unwrap();
    let sellers_p_share = pair.seller.model().keys().buyer_output.my_pub_key_share();
    assert_eq!(signed.peer_output_prv_key_share.base_point_mul(), sellers_p_share);

    // A second attempt is out of order
    let err = pair.seller.sign_swap_tx(swap_partial).unwrap_err();
    assert_eq!(err.code(), StatusCode::FailedPrecondition);
}

#[test]
fn forged_buyer_swap_partial_is_unauthenticated() {
    let mut pair = published_trade();
    pair.seller.record_confirmations(2).unwrap();
    let forged = pair.buyers_sigs.peers_redirect_tx_input;
    let err = pair.seller.sign_swap_tx(forged).unwrap_err();
    assert_eq!(err.code(), StatusCode::Unauthenticated);
    assert_eq!(pair.seller.stage(), TradeStage::DepositPublished);
}
