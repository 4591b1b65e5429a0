mod common;

use assert_matches::assert_matches;
use chrono::NaiveDate;
use common::TestEngine;
use rust_decimal_macros::dec;
use stockledger::{
    entities::movement_type::MovementCode,
    errors::ServiceError,
    services::{allocation::BatchAllocation, inventory::PostAllocation},
};
use uuid::Uuid;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn allocation_ctx(product: Uuid, warehouse: Uuid) -> PostAllocation {
    PostAllocation {
        movement_code: MovementCode::RegularOut,
        txn_type: "DISPATCH".to_string(),
        txn_date: None,
        source_type: "SHIPMENT".to_string(),
        source_id: Uuid::new_v4(),
        source_line_id: None,
        product_id: product,
        warehouse_id: warehouse,
        currency_id: None,
        exchange_rate: None,
        uom_id: None,
    }
}

#[tokio::test]
async fn fifo_consumes_batches_in_creation_order() {
    let engine = TestEngine::new().await;
    let product = Uuid::new_v4();
    let warehouse = Uuid::new_v4();

    let b1 = engine.upsert_batch(product, "LOT-1", None).await;
    let b2 = engine.upsert_batch(product, "LOT-2", None).await;
    engine.receive(product, warehouse, b1, dec!(30), dec!(10)).await;
    engine.receive(product, warehouse, b2, dec!(40), dec!(12)).await;

    let plan = engine
        .services
        .allocation
        .allocate_fifo(product, warehouse, dec!(50))
        .await
        .expect("plan");

    assert_eq!(plan.len(), 2);
    assert_eq!(plan[0].batch_id, b1);
    assert_eq!(plan[0].quantity, dec!(30));
    assert_eq!(plan[0].unit_cost, dec!(10));
    assert_eq!(plan[1].batch_id, b2);
    assert_eq!(plan[1].quantity, dec!(20));
    assert_eq!(plan[1].unit_cost, dec!(12));
}

#[tokio::test]
async fn fefo_prefers_the_soonest_expiry() {
    let engine = TestEngine::new().await;
    let product = Uuid::new_v4();
    let warehouse = Uuid::new_v4();

    let b1 = engine
        .upsert_batch(product, "LOT-1", Some(date(2025, 1, 1)))
        .await;
    let b2 = engine
        .upsert_batch(product, "LOT-2", Some(date(2024, 6, 1)))
        .await;
    engine.receive(product, warehouse, b1, dec!(20), dec!(10)).await;
    engine.receive(product, warehouse, b2, dec!(20), dec!(10)).await;

    let plan = engine
        .services
        .allocation
        .allocate_fefo(product, warehouse, dec!(20))
        .await
        .expect("plan");

    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].batch_id, b2);
    assert_eq!(plan[0].quantity, dec!(20));
    assert_eq!(plan[0].exp_date, Some(date(2024, 6, 1)));
}

#[tokio::test]
async fn fefo_sorts_undated_batches_last() {
    let engine = TestEngine::new().await;
    let product = Uuid::new_v4();
    let warehouse = Uuid::new_v4();

    let undated = engine.upsert_batch(product, "LOT-UNDATED", None).await;
    let dated = engine
        .upsert_batch(product, "LOT-DATED", Some(date(2030, 1, 1)))
        .await;
    engine
        .receive(product, warehouse, undated, dec!(50), dec!(10))
        .await;
    engine
        .receive(product, warehouse, dated, dec!(10), dec!(10))
        .await;

    let plan = engine
        .services
        .allocation
        .allocate_fefo(product, warehouse, dec!(30))
        .await
        .expect("plan");

    assert_eq!(plan[0].batch_id, dated);
    assert_eq!(plan[0].quantity, dec!(10));
    assert_eq!(plan[1].batch_id, undated);
    assert_eq!(plan[1].quantity, dec!(20));
}

#[tokio::test]
async fn shortfall_fails_without_a_partial_plan() {
    let engine = TestEngine::new().await;
    let product = Uuid::new_v4();
    let warehouse = Uuid::new_v4();

    let b1 = engine.upsert_batch(product, "LOT-1", None).await;
    engine.receive(product, warehouse, b1, dec!(30), dec!(10)).await;

    let err = engine
        .services
        .allocation
        .allocate_fifo(product, warehouse, dec!(31))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));
}

#[tokio::test]
async fn validate_batch_stock_names_the_short_batch() {
    let engine = TestEngine::new().await;
    let product = Uuid::new_v4();
    let warehouse = Uuid::new_v4();

    let b1 = engine.upsert_batch(product, "LOT-1", None).await;
    engine.receive(product, warehouse, b1, dec!(10), dec!(10)).await;

    let err = engine
        .services
        .allocation
        .validate_batch_stock(
            &[BatchAllocation {
                batch_id: b1,
                product_id: product,
                quantity: dec!(12),
            }],
            warehouse,
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(ref msg) if msg.contains(&b1.to_string()));

    let missing = engine
        .services
        .allocation
        .validate_batch_stock(
            &[BatchAllocation {
                batch_id: 9999,
                product_id: product,
                quantity: dec!(1),
            }],
            warehouse,
        )
        .await
        .unwrap_err();
    assert_matches!(missing, ServiceError::NotFound(_));
}

#[tokio::test]
async fn applying_a_plan_depletes_each_batch() {
    let engine = TestEngine::new().await;
    let product = Uuid::new_v4();
    let warehouse = Uuid::new_v4();

    let b1 = engine.upsert_batch(product, "LOT-1", None).await;
    let b2 = engine.upsert_batch(product, "LOT-2", None).await;
    engine.receive(product, warehouse, b1, dec!(30), dec!(10)).await;
    engine.receive(product, warehouse, b2, dec!(40), dec!(12)).await;

    let plan = engine
        .services
        .allocation
        .allocate_fifo(product, warehouse, dec!(50))
        .await
        .expect("plan");
    let outcomes = engine
        .services
        .inventory
        .post_allocation(&plan, &allocation_ctx(product, warehouse))
        .await
        .expect("apply");

    assert_eq!(outcomes.len(), 2);
    let p1 = outcomes[0].position.as_ref().expect("position");
    let p2 = outcomes[1].position.as_ref().expect("position");
    assert_eq!(p1.qty_on_hand, dec!(0));
    assert_eq!(p2.qty_on_hand, dec!(20));
}

#[tokio::test]
async fn stale_plan_rolls_back_every_line() {
    let engine = TestEngine::new().await;
    let product = Uuid::new_v4();
    let warehouse = Uuid::new_v4();

    let b1 = engine.upsert_batch(product, "LOT-1", None).await;
    let b2 = engine.upsert_batch(product, "LOT-2", None).await;
    engine.receive(product, warehouse, b1, dec!(30), dec!(10)).await;
    engine.receive(product, warehouse, b2, dec!(40), dec!(12)).await;

    let plan = engine
        .services
        .allocation
        .allocate_fifo(product, warehouse, dec!(60))
        .await
        .expect("plan");

    // A concurrent dispatch drains the second batch between planning and
    // apply; the whole plan must fail and leave the first batch untouched.
    engine
        .services
        .inventory
        .post_movement(common::movement(
            MovementCode::RegularOut,
            product,
            warehouse,
            b2,
            dec!(25),
            None,
        ))
        .await
        .expect("concurrent dispatch");

    let err = engine
        .services
        .inventory
        .post_allocation(&plan, &allocation_ctx(product, warehouse))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));

    let available = engine
        .services
        .allocation
        .allocate_fifo(product, warehouse, dec!(45))
        .await
        .expect("stock unchanged by failed apply");
    assert_eq!(available[0].batch_id, b1);
    assert_eq!(available[0].quantity, dec!(30));
    assert_eq!(available[1].quantity, dec!(15));
}
