mod common;

use alloy_primitives::{address, Address, U256};
use common::*;
use safe_account_abstraction::{
    execute_direct_transaction, AccountError, AccountSetup, DirectTransaction, EventSink,
    FlowError, FlowEvent, SafeAccount,
};
use safe_types::SubTransaction;
use tokio::sync::mpsc::UnboundedReceiver;

fn drain(mut rx: UnboundedReceiver<FlowEvent>) -> Vec<FlowEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn kinds(events: &[FlowEvent]) -> Vec<&'static str> {
    events.iter().map(FlowEvent::kind).collect()
}

fn self_transfer(account: Address) -> DirectTransaction {
    DirectTransaction::new(account, vec![SubTransaction::transfer(account, U256::ZERO)])
}

#[tokio::test]
async fn test_direct_flow_happy_path() {
    let harness = Harness::new();
    let account = address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    harness.deployed_account(account, 4);

    let (events, rx) = EventSink::channel();
    let request = DirectTransaction::new(
        account,
        vec![SubTransaction::transfer(
            address!("00000000000000000000000000000000000000b0"),
            U256::from(1_000u64),
        )],
    );

    let receipt = execute_direct_transaction(&harness.ctx, &request, &events)
        .await
        .unwrap();

    assert!(receipt.success);
    assert_eq!(
        kinds(&drain(rx)),
        vec!["preparing", "signing", "signing_complete", "success"]
    );

    let sent = harness.bundler.sent_by(account);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].nonce, U256::from(4u64));
    assert!(!sent[0].is_init());
    assert_eq!(sent[0].paymaster, Some(PAYMASTER));
    assert_eq!(sent[0].verification_gas_limit, U256::from(450_000u64));
    assert!(!sent[0].signature.is_empty());
}

#[tokio::test]
async fn test_undeployed_account_gets_init_operation() {
    let harness = Harness::new();
    let setup = AccountSetup::single_passkey(public_key(1));
    let safe = SafeAccount::compute(setup.clone(), harness.ctx.contracts(), harness.ctx.webauthn())
        .unwrap();

    let request = DirectTransaction::new(
        safe.address,
        vec![SubTransaction::transfer(safe.address, U256::ZERO)],
    )
    .with_setup(setup);

    execute_direct_transaction(&harness.ctx, &request, &EventSink::disabled())
        .await
        .unwrap();

    let sent = harness.bundler.sent_by(safe.address);
    assert_eq!(sent.len(), 1);
    let op = &sent[0];
    assert!(op.is_init());
    assert_eq!(op.nonce, U256::ZERO);
    assert_eq!(op.factory, Some(harness.ctx.contracts().proxy_factory));
    assert_eq!(op.factory_data.as_ref(), Some(&safe.factory_data));

    // Init signatures are checked by the shared WebAuthn signer.
    assert_eq!(
        &op.signature[12 + 12..12 + 32],
        harness.ctx.contracts().webauthn_shared_signer.as_slice()
    );
}

#[tokio::test]
async fn test_first_operation_of_deployed_account_signs_as_shared_signer() {
    let harness = Harness::new();
    let account = address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    harness.deployed_account(account, 0);

    let request = self_transfer(account);
    execute_direct_transaction(&harness.ctx, &request, &EventSink::disabled())
        .await
        .unwrap();

    let op = &harness.bundler.sent_by(account)[0];
    assert!(!op.is_init());
    assert_eq!(op.nonce, U256::ZERO);
    assert_eq!(
        &op.signature[12 + 12..12 + 32],
        harness.ctx.contracts().webauthn_shared_signer.as_slice()
    );
}

#[tokio::test]
async fn test_later_operations_sign_as_verifier() {
    let harness = Harness::new();
    let account = address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    harness.deployed_account(account, 1);

    let request = self_transfer(account);
    execute_direct_transaction(&harness.ctx, &request, &EventSink::disabled())
        .await
        .unwrap();

    let op = &harness.bundler.sent_by(account)[0];
    assert_ne!(
        &op.signature[12 + 12..12 + 32],
        harness.ctx.contracts().webauthn_shared_signer.as_slice()
    );
}

#[tokio::test(start_paused = true)]
async fn test_inclusion_timeout_is_reported_as_submitted() {
    let harness = Harness::new();
    let account = address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    harness.deployed_account(account, 2);
    harness.bundler.stall_for(account);

    let (events, rx) = EventSink::channel();
    let request = self_transfer(account);
    let err = execute_direct_transaction(&harness.ctx, &request, &events)
        .await
        .unwrap_err();

    assert!(matches!(err, FlowError::InclusionTimeout { .. }));
    assert!(err.landed_on_chain());
    assert_eq!(harness.bundler.sent_by(account).len(), 1);
    assert_eq!(kinds(&drain(rx)).last(), Some(&"error"));
}

#[tokio::test]
async fn test_receipt_lookup_error_is_not_retried() {
    let harness = Harness::new();
    let account = address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    harness.deployed_account(account, 2);
    harness.bundler.fail_receipts_for(account);

    let request = self_transfer(account);
    let err = execute_direct_transaction(&harness.ctx, &request, &EventSink::disabled())
        .await
        .unwrap_err();

    assert!(matches!(err, FlowError::Chain(AccountError::Rpc(_))));
    assert!(!err.landed_on_chain());
}

#[tokio::test]
async fn test_address_mismatch_aborts_before_signing() {
    let harness = Harness::new();
    let wrong = address!("00000000000000000000000000000000000000c1");

    let (events, rx) = EventSink::channel();
    let request = DirectTransaction::new(wrong, vec![SubTransaction::transfer(wrong, U256::ZERO)])
        .with_setup(AccountSetup::single_passkey(public_key(1)));

    let err = execute_direct_transaction(&harness.ctx, &request, &events)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FlowError::Preparation(AccountError::AddressMismatch { expected, .. }) if expected == wrong
    ));
    assert!(!log_contains(&harness.log, "sign"));
    assert!(harness.bundler.sent.lock().unwrap().is_empty());
    assert_eq!(kinds(&drain(rx)), vec!["preparing", "error"]);
}

#[tokio::test]
async fn test_undeployed_without_setup_is_preparation_error() {
    let harness = Harness::new();
    let account = address!("00000000000000000000000000000000000000c2");
    let request = self_transfer(account);

    let err = execute_direct_transaction(&harness.ctx, &request, &EventSink::disabled())
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Preparation(AccountError::MissingSetup(a)) if a == account));
}

#[tokio::test]
async fn test_cancelled_signing_is_distinct() {
    let harness = Harness::with_signer(|log| FakeSigner::cancelling(log, public_key(1)));
    let account = address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    harness.deployed_account(account, 0);

    let (events, rx) = EventSink::channel();
    let request = self_transfer(account);
    let err = execute_direct_transaction(&harness.ctx, &request, &events)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(!err.landed_on_chain());
    assert!(harness.bundler.sent.lock().unwrap().is_empty());

    let events = drain(rx);
    assert_eq!(kinds(&events), vec!["preparing", "signing", "error"]);
    assert!(matches!(
        events.last(),
        Some(FlowEvent::Error { error: FlowError::Cancelled })
    ));
}

#[tokio::test]
async fn test_reverted_operation_is_execution_failure() {
    let harness = Harness::new();
    let account = address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    harness.deployed_account(account, 1);
    harness.bundler.revert_for(account);

    let request = self_transfer(account);
    let err = execute_direct_transaction(&harness.ctx, &request, &EventSink::disabled())
        .await
        .unwrap_err();

    match err {
        FlowError::ExecutionFailed { receipt, .. } => assert!(!receipt.success),
        other => panic!("expected execution failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_bundler_rejection_is_submission_error() {
    let harness = Harness::new();
    let account = address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    harness.deployed_account(account, 1);
    harness.bundler.reject_for(account);

    let request = self_transfer(account);
    let err = execute_direct_transaction(&harness.ctx, &request, &EventSink::disabled())
        .await
        .unwrap_err();

    assert!(matches!(err, FlowError::Submission(_)));
    assert!(!err.landed_on_chain());
}

#[tokio::test]
async fn test_operation_hash_signed_after_sponsorship() {
    let harness = Harness::new();
    let account = address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    harness.deployed_account(account, 2);

    let request = self_transfer(account);
    execute_direct_transaction(&harness.ctx, &request, &EventSink::disabled())
        .await
        .unwrap();

    let sent = harness.bundler.sent_by(account);
    let expected =
        safe_account_abstraction::user_op_hash(&sent[0], CHAIN_ID, harness.ctx.contracts());
    assert_eq!(harness.signer.signed.lock().unwrap().as_slice(), &[expected]);
    assert_eq!(*harness.paymaster.calls.lock().unwrap(), 1);
}
