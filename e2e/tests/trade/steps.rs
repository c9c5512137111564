use crate::trade::TradeWorld;
use cucumber::{given, then, when};
use libtrade::transaction::SignedTx;
use log::*;
use trade_coordinator::message_types::{CloseTradeRequest, SwapTxSignatureRequest};
use trade_coordinator::RpcStatus;

fn close_request(trade_id: &str, swap_tx: Option<Vec<u8>>) -> CloseTradeRequest {
    CloseTradeRequest { trade_id: trade_id.to_string(), my_output_peers_prv_key_share: None, swap_tx }
}

fn assert_status(result: Result<impl std::fmt::Debug, RpcStatus>, code: &str) {
    match result {
        Ok(v) => panic!("Expected {code} but the call succeeded: {v:?}"),
        Err(e) => assert_eq!(e.code.to_string(), code, "Unexpected error: {e}"),
    }
}

#[given(regex = r"^a buyer and a seller agree on a trade of (\d+) sats with (\d+) sat deposits$")]
async fn agree_on_terms(world: &mut TradeWorld, amount: u64, deposit: u64) {
    let terms = &mut world.harness.terms;
    terms.trade_amount = amount;
    terms.buyers_security_deposit = deposit;
    terms.sellers_security_deposit = deposit;
    info!("Trade terms: {terms:?}");
}

#[when("both peers initialise the trade")]
async fn init_trade(world: &mut TradeWorld) {
    world.harness.init_trade().await.expect("Failed to initialise the trade");
}

#[when("they exchange nonce shares")]
async fn exchange_nonce_shares(world: &mut TradeWorld) {
    world.harness.exchange_nonce_shares().await.expect("Failed to exchange nonce shares");
}

#[when("they exchange partial signatures")]
async fn exchange_partial_signatures(world: &mut TradeWorld) {
    world.harness.exchange_partial_signatures().await.expect("Failed to exchange partial signatures");
}

#[when("they sign and publish the deposit tx")]
async fn sign_and_publish_deposit(world: &mut TradeWorld) {
    world.harness.sign_deposit().await.expect("Failed to sign the deposit tx");
    let confirmations = world.harness.publish_deposit().await.expect("Failed to publish the deposit tx");
    info!("Deposit tx confirmed with {confirmations} confirmations");
    assert!(confirmations >= world.harness.seller.coordinator.config().required_confirmations);
}

#[then("the deposit tx is on chain")]
async fn deposit_on_chain(world: &mut TradeWorld) {
    let txid = world.harness.deposit_txid().expect("No deposit tx").to_string();
    assert_eq!(Some(txid.as_str()), world.harness.seller.deposit.as_ref().map(|d| d.deposit_txid.as_str()));
    assert!(world.harness.is_on_chain(&txid).await, "Deposit tx {txid} was never broadcast");
}

#[when("the seller signs the swap tx")]
async fn sign_swap(world: &mut TradeWorld) {
    world.harness.sign_swap().await.expect("Failed to sign the swap tx");
}

#[when("both peers close the trade cooperatively")]
async fn close_cooperatively(world: &mut TradeWorld) {
    world.harness.close_cooperatively().await.expect("Cooperative close failed");
}

#[when(regex = r"^the (buyer|seller) waits in vain for the (?:buyer|seller)'s (.+)$")]
async fn peer_goes_quiet(world: &mut TradeWorld, who: String, what: String) {
    let peer = world.peer(&who);
    let result = peer.coordinator.await_peer(&peer.trade_id, &what, futures::future::pending::<()>()).await;
    assert_status(result, "DEADLINE_EXCEEDED");
}

#[when(regex = r"^the (buyer|seller) force-closes the trade$")]
async fn force_close(world: &mut TradeWorld, who: String) {
    let peer = world.peer_mut(&who);
    let req = close_request(&peer.trade_id, None);
    let closure = peer.close(req).await.expect("Forced close failed");
    assert!(closure.peer_output_prv_key_share.is_none(), "A forced close must not give away our key share");
}

#[then("the swap tx is on chain")]
async fn swap_on_chain(world: &mut TradeWorld) {
    assert!(world.harness.swap_tx_on_chain().await.is_some(), "The swap tx was not broadcast");
}

#[when("the buyer closes the trade with the swap tx it saw on chain")]
async fn close_with_swap_tx(world: &mut TradeWorld) {
    let swap_tx = world.harness.swap_tx_on_chain().await.expect("The swap tx is not on chain");
    let buyer = &mut world.harness.buyer;
    let req = close_request(&buyer.trade_id, Some(swap_tx));
    buyer.close(req).await.expect("Closing with the swap tx failed");
}

#[then(regex = r"^the (buyer|seller)'s warning tx and redirect tx are on chain$")]
async fn fallback_on_chain(world: &mut TradeWorld, who: String) {
    let peer = world.peer(&who);
    let deposit = peer.deposit.as_ref().expect("The deposit tx was never signed");
    let closure = peer.closure.as_ref().expect("The trade was not closed");
    let warning = SignedTx::from_bytes(&deposit.warning_tx).expect("Bad warning tx").txid().to_string();
    let redirect = SignedTx::from_bytes(&deposit.redirect_tx).expect("Bad redirect tx").txid().to_string();
    assert_eq!(closure.published_txids, vec![warning, redirect]);
    for txid in &closure.published_txids {
        assert!(world.harness.is_on_chain(txid).await, "{txid} was never broadcast");
    }
}

#[then(regex = r"^the (buyer|seller)'s trade is (.+)$")]
async fn trade_stage(world: &mut TradeWorld, who: String, stage: String) {
    let actual = world.peer(&who).stage().await.expect("Trade not found");
    assert_eq!(actual.to_string(), stage, "The {who}'s trade is {actual}");
}

#[then(regex = r"^the (buyer|seller) holds the private key of its output$")]
async fn holds_output_key(world: &mut TradeWorld, who: String) {
    let matches = world.peer(&who).my_output_key_matches().await.expect("Trade not found");
    assert!(matches, "The {who} does not hold the key of its output");
}

#[then(regex = r"^the buyer cannot get nonce shares before initialising, with (\w+)$")]
async fn nonce_shares_before_init(world: &mut TradeWorld, code: String) {
    let mut seller = e2e::TradePeer::new(
        "other-seller",
        libtrade::TradeRole::SellerAsMaker,
        &[300_000],
        world.harness.seller.coordinator.config().clone(),
        world.harness.chain.clone(),
    );
    seller.init_trade().await.expect("Could not initialise the other seller");
    let init = seller.init.as_ref().expect("No init response");
    let req = world.harness.buyer.nonce_request(init, &world.harness.terms);
    assert_status(world.harness.buyer.coordinator.get_nonce_shares(req).await, &code);
}

#[then(regex = r"^the buyer cannot initialise the trade again, with (\w+)$")]
async fn init_twice(world: &mut TradeWorld, code: String) {
    let result = world.harness.buyer.init_trade().await;
    assert_status(result, &code);
}

#[then(regex = r"^the seller cannot force-close the trade yet, with (\w+)$")]
async fn early_forced_close(world: &mut TradeWorld, code: String) {
    let seller = &mut world.harness.seller;
    let req = close_request(&seller.trade_id, None);
    let result = seller.coordinator.close_trade(req).await;
    assert_status(result, &code);
}

#[then(regex = r"^the buyer cannot sign the swap tx, with (\w+)$")]
async fn buyer_cannot_sign_swap(world: &mut TradeWorld, code: String) {
    let buyer = &world.harness.buyer;
    let req = SwapTxSignatureRequest {
        trade_id: buyer.trade_id.clone(),
        swap_tx_input_peers_partial_signature: vec![1; 32],
    };
    assert_status(buyer.coordinator.sign_swap_tx(req).await, &code);
}
