//! Integration test: proof relay worker moves provable transfers from pending to awaiting.

mod common;

use common::{harness, make_tx_param, ECCD, SIDE_CHAIN_ID};
use hubrelay::proof::mapping_key;
use hubrelay::relay::relay_one;
use hubrelay::{relay_pending, CrossTransfer, PendingKey, RelayOutcome, RelayStore};

fn record(height: u64, index: &str) -> CrossTransfer {
    CrossTransfer {
        tx_index: index.into(),
        tx_id: vec![0xab; 32],
        value: make_tx_param(b"ccid-1"),
        to_chain: 2,
        height,
    }
}

#[tokio::test]
async fn test_no_proof_fetch_before_finality() {
    let h = harness(10);
    h.ctx.cursor.advance_to(1000);
    h.store.enqueue_pending(&record(990, "0a").encode()).unwrap();

    let report = relay_pending(&h.ctx).await.unwrap();
    assert_eq!(report.not_provable, 1);
    assert!(h.source.proof_calls.lock().is_empty());
    assert!(h.hub.transfer_submissions.lock().is_empty());
    assert_eq!(h.store.list_pending().unwrap().len(), 1);
}

#[tokio::test]
async fn test_provable_transfer_is_submitted_and_moved_to_awaiting() {
    let h = harness(10);
    h.ctx.cursor.advance_to(1001);
    let bytes = record(990, "0a").encode();
    h.store.enqueue_pending(&bytes).unwrap();

    let report = relay_pending(&h.ctx).await.unwrap();
    assert_eq!(report.submitted, 1);

    let calls = h.source.proof_calls.lock().clone();
    assert_eq!(calls, vec![(ECCD, mapping_key("0a").unwrap(), 991)]);

    let subs = h.hub.transfer_submissions.lock().clone();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].side_chain_id, SIDE_CHAIN_ID);
    assert_eq!(subs[0].proof_height, 992);
    assert_eq!(subs[0].raw_proof, common::MockSource::proof_response());

    let payload: ciborium::value::Value = ciborium::de::from_reader(subs[0].payload.as_slice()).unwrap();
    let map = payload.as_map().unwrap();
    assert_eq!(map[0].1.as_bytes().unwrap().as_slice(), b"/evm/storage");
    assert_eq!(map[1].1.as_bytes().unwrap(), &make_tx_param(b"ccid-1"));

    assert!(h.store.list_pending().unwrap().is_empty());
    let awaiting = h.store.list_awaiting().unwrap();
    assert_eq!(awaiting.get("0xhub0001"), Some(&bytes));
}

#[tokio::test]
async fn test_header_bundle_is_taken_after_proof_height() {
    let h = harness(10);
    h.ctx.cursor.advance_to(1001);
    h.store.enqueue_pending(&record(990, "0a").encode()).unwrap();
    relay_pending(&h.ctx).await.unwrap();
    assert_eq!(*h.source.commit_calls.lock(), vec![992]);
}

#[tokio::test]
async fn test_already_done_deletes_pending_without_awaiting_entry() {
    let h = harness(10);
    h.ctx.cursor.advance_to(1001);
    h.store.enqueue_pending(&record(990, "0a").encode()).unwrap();
    *h.hub.transfer_error.lock() = Some("ImportOuterTransfer: tx already done".into());

    let report = relay_pending(&h.ctx).await.unwrap();
    assert_eq!(report.already_done, 1);
    assert!(h.store.list_pending().unwrap().is_empty());
    assert!(h.store.list_awaiting().unwrap().is_empty());
}

#[tokio::test]
async fn test_other_rejection_leaves_record_pending() {
    let h = harness(10);
    h.ctx.cursor.advance_to(1001);
    let key = h.store.enqueue_pending(&record(990, "0a").encode()).unwrap();
    *h.hub.transfer_error.lock() = Some("ImportOuterTransfer: verify proof failed".into());

    let report = relay_pending(&h.ctx).await.unwrap();
    assert_eq!(report.failed, 1);
    let pending = h.store.list_pending().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].0, key);
    assert!(h.store.list_awaiting().unwrap().is_empty());
}

#[tokio::test]
async fn test_proof_fetch_failure_does_not_abort_the_pass() {
    let h = harness(10);
    h.ctx.cursor.advance_to(1001);
    h.store.enqueue_pending(&record(990, "0a").encode()).unwrap();
    h.store.enqueue_pending(&record(980, "0b").encode()).unwrap();
    *h.source.fail_proofs.lock() = true;

    let report = relay_pending(&h.ctx).await.unwrap();
    assert_eq!(report.failed, 2);
    assert_eq!(h.source.proof_calls.lock().len(), 2);
    assert_eq!(h.store.list_pending().unwrap().len(), 2);
}

#[tokio::test]
async fn test_corrupt_record_is_quarantined_and_others_proceed() {
    let h = harness(10);
    h.ctx.cursor.advance_to(1001);
    let good = record(990, "0a").encode();
    let mut bad = good.clone();
    bad.truncate(bad.len() - 4);
    h.store.enqueue_pending(&good).unwrap();
    let bad_key = h.store.enqueue_pending(&bad).unwrap();

    let report = relay_pending(&h.ctx).await.unwrap();
    assert_eq!(report.quarantined, 1);
    assert_eq!(report.submitted, 1);
    assert!(h.store.list_pending().unwrap().is_empty());

    let quarantined = h.store.list_quarantined().unwrap();
    assert_eq!(quarantined.len(), 1);
    assert_eq!(quarantined[0].key, bad_key);
    assert_eq!(quarantined[0].record, bad);
    assert!(quarantined[0].reason.contains("height"));

    // Quarantined records are not retried on the next pass.
    let report = relay_pending(&h.ctx).await.unwrap();
    assert_eq!(report, Default::default());
}

#[tokio::test]
async fn test_relay_one_reports_not_provable_at_boundary() {
    let h = harness(10);
    let r = record(990, "0a");
    assert_eq!(relay_one(&h.ctx, 1000, &r).await.unwrap(), RelayOutcome::NotProvable);
    assert!(matches!(relay_one(&h.ctx, 1001, &r).await.unwrap(), RelayOutcome::Submitted(_)));
}

#[tokio::test]
async fn test_bad_tx_index_fails_record_only() {
    let h = harness(1);
    h.ctx.cursor.advance_to(100);
    let key = PendingKey::of(&record(10, "zz").encode());
    h.store.enqueue_pending(&record(10, "zz").encode()).unwrap();
    let report = relay_pending(&h.ctx).await.unwrap();
    assert_eq!(report.failed, 1);
    assert!(h.source.proof_calls.lock().is_empty());
    assert_eq!(h.store.list_pending().unwrap()[0].0, key);
}
