mod common;

use assert_matches::assert_matches;
use common::{movement, TestEngine};
use rust_decimal_macros::dec;
use stockledger::{
    entities::movement_type::MovementCode,
    errors::ServiceError,
    queries::stock_queries::{GetInventoryTransactionsQuery, Query},
    services::positions,
};
use uuid::Uuid;

#[tokio::test]
async fn voiding_hides_the_row_but_never_moves_stock() {
    let engine = TestEngine::new().await;
    let product = Uuid::new_v4();
    let warehouse = Uuid::new_v4();
    let batch = engine.upsert_batch(product, "LOT-A", None).await;

    let receipt = engine
        .receive(product, warehouse, batch, dec!(10), dec!(5))
        .await;

    engine
        .services
        .inventory
        .void_transaction(receipt.transaction_id)
        .await
        .expect("void");

    // Quantity is untouched; only the audit flag flipped.
    let pos = positions::get_position(&*engine.db, product, warehouse, batch)
        .await
        .expect("position");
    assert_eq!(pos.qty_on_hand, dec!(10));

    let visible = GetInventoryTransactionsQuery {
        product_id: Some(product),
        ..Default::default()
    }
    .execute(&engine.db)
    .await
    .expect("visible rows");
    assert!(visible.iter().all(|t| t.id != receipt.transaction_id));

    let with_voided = GetInventoryTransactionsQuery {
        product_id: Some(product),
        include_voided: true,
        ..Default::default()
    }
    .execute(&engine.db)
    .await
    .expect("all rows");
    let voided = with_voided
        .iter()
        .find(|t| t.id == receipt.transaction_id)
        .expect("voided row still stored");
    assert!(voided.is_deleted);
}

#[tokio::test]
async fn voiding_twice_is_a_no_op() {
    let engine = TestEngine::new().await;
    let product = Uuid::new_v4();
    let warehouse = Uuid::new_v4();
    let batch = engine.upsert_batch(product, "LOT-A", None).await;

    let receipt = engine
        .receive(product, warehouse, batch, dec!(10), dec!(5))
        .await;
    engine
        .services
        .inventory
        .void_transaction(receipt.transaction_id)
        .await
        .expect("first void");
    engine
        .services
        .inventory
        .void_transaction(receipt.transaction_id)
        .await
        .expect("second void is harmless");
}

#[tokio::test]
async fn voiding_an_unknown_transaction_is_not_found() {
    let engine = TestEngine::new().await;
    let err = engine
        .services
        .inventory
        .void_transaction(Uuid::new_v4())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn reversal_voids_the_original_and_restores_stock() {
    let engine = TestEngine::new().await;
    let product = Uuid::new_v4();
    let warehouse = Uuid::new_v4();
    let batch = engine.upsert_batch(product, "LOT-A", None).await;

    engine
        .receive(product, warehouse, batch, dec!(100), dec!(10))
        .await;
    let issue = engine
        .services
        .inventory
        .post_movement(movement(
            MovementCode::RegularOut,
            product,
            warehouse,
            batch,
            dec!(30),
            None,
        ))
        .await
        .expect("issue");

    let reversal = engine
        .services
        .inventory
        .reverse_transaction(issue.transaction_id)
        .await
        .expect("reversal");

    let pos = reversal.position.expect("position updated");
    assert_eq!(pos.qty_on_hand, dec!(100));

    // Original is voided, the compensating row references it, and the
    // conservation invariant holds over the surviving rows.
    let rows = GetInventoryTransactionsQuery {
        product_id: Some(product),
        include_voided: true,
        ..Default::default()
    }
    .execute(&engine.db)
    .await
    .expect("rows");
    let original = rows
        .iter()
        .find(|t| t.id == issue.transaction_id)
        .expect("original");
    assert!(original.is_deleted);
    let compensating = rows
        .iter()
        .find(|t| t.id == reversal.transaction_id)
        .expect("compensating row");
    assert_eq!(compensating.source_type, "REVERSAL");
    assert_eq!(compensating.source_id, issue.transaction_id);
    assert_eq!(compensating.qty, dec!(30));

    assert_eq!(
        engine.signed_ledger_sum(product, warehouse, batch).await,
        pos.qty_on_hand
    );
}

#[tokio::test]
async fn reversing_a_receipt_can_hit_insufficient_stock() {
    let engine = TestEngine::new().await;
    let product = Uuid::new_v4();
    let warehouse = Uuid::new_v4();
    let batch = engine.upsert_batch(product, "LOT-A", None).await;

    let receipt = engine
        .receive(product, warehouse, batch, dec!(10), dec!(5))
        .await;
    engine
        .services
        .inventory
        .post_movement(movement(
            MovementCode::RegularOut,
            product,
            warehouse,
            batch,
            dec!(8),
            None,
        ))
        .await
        .expect("issue");

    // Only 2 left; unwinding the 10-unit receipt must fail atomically and
    // leave the original row un-voided.
    let err = engine
        .services
        .inventory
        .reverse_transaction(receipt.transaction_id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));

    let rows = GetInventoryTransactionsQuery {
        product_id: Some(product),
        ..Default::default()
    }
    .execute(&engine.db)
    .await
    .expect("rows");
    assert!(rows.iter().any(|t| t.id == receipt.transaction_id));

    let pos = positions::get_position(&*engine.db, product, warehouse, batch)
        .await
        .expect("position");
    assert_eq!(pos.qty_on_hand, dec!(2));
}

#[tokio::test]
async fn reversing_an_already_voided_transaction_is_rejected() {
    let engine = TestEngine::new().await;
    let product = Uuid::new_v4();
    let warehouse = Uuid::new_v4();
    let batch = engine.upsert_batch(product, "LOT-A", None).await;

    let receipt = engine
        .receive(product, warehouse, batch, dec!(10), dec!(5))
        .await;
    engine
        .services
        .inventory
        .void_transaction(receipt.transaction_id)
        .await
        .expect("void");

    let err = engine
        .services
        .inventory
        .reverse_transaction(receipt.transaction_id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}
