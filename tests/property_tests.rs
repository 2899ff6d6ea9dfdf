mod common;

use std::collections::HashMap;

use assert_matches::assert_matches;
use cardstock_api::{
    entities::MovementType,
    errors::ServiceError,
    services::movements::{CorrectMovementRequest, MovementItem, RecordMovementRequest},
};
use common::{TestApp, World};
use proptest::prelude::*;
use uuid::Uuid;

#[derive(Debug, Clone)]
enum Op {
    Entree { at_b: bool, card_y: bool, quantity: i64 },
    Sortie { at_b: bool, card_y: bool, quantity: i64 },
    Transfer { from_b: bool, card_y: bool, quantity: i64 },
    Correct { pick: usize, quantity: i64 },
    Reverse { pick: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (any::<bool>(), any::<bool>(), 1i64..60)
            .prop_map(|(at_b, card_y, quantity)| Op::Entree { at_b, card_y, quantity }),
        3 => (any::<bool>(), any::<bool>(), 1i64..60)
            .prop_map(|(at_b, card_y, quantity)| Op::Sortie { at_b, card_y, quantity }),
        2 => (any::<bool>(), any::<bool>(), 1i64..60)
            .prop_map(|(from_b, card_y, quantity)| Op::Transfer { from_b, card_y, quantity }),
        1 => (any::<usize>(), 1i64..60).prop_map(|(pick, quantity)| Op::Correct { pick, quantity }),
        1 => any::<usize>().prop_map(|pick| Op::Reverse { pick }),
    ]
}

fn request(
    w: &World,
    movement_type: MovementType,
    source: Option<Uuid>,
    destination: Option<Uuid>,
    card_type_id: Uuid,
    quantity: i64,
) -> RecordMovementRequest {
    RecordMovementRequest {
        movement_type,
        user_id: w.user.id,
        items: vec![MovementItem {
            card_type_id,
            quantity,
        }],
        source_location_id: source,
        destination_location_id: destination,
        reference_number: None,
        notes: None,
        attachments: None,
    }
}

async fn snapshot(app: &TestApp, w: &World) -> HashMap<(Uuid, Uuid), i64> {
    let mut out = HashMap::new();
    for loc in [w.loc_a.id, w.loc_b.id] {
        for card in [w.card_x.id, w.card_y.id] {
            out.insert((loc, card), app.stock_quantity(loc, card).await);
        }
    }
    out
}

async fn run_sequence(ops: Vec<Op>) {
    let app = TestApp::new().await;
    let w = app.seed_world().await;
    let movements = app.state.services.movements.clone();
    let mut committed: Vec<Uuid> = Vec::new();

    for op in ops {
        let before = snapshot(&app, &w).await;
        let loc = |b: bool| if b { w.loc_b.id } else { w.loc_a.id };
        let card = |y: bool| if y { w.card_y.id } else { w.card_x.id };

        let result: Result<(), ServiceError> = match op {
            Op::Entree { at_b, card_y, quantity } => movements
                .record(request(&w, MovementType::Entree, None, Some(loc(at_b)), card(card_y), quantity))
                .await
                .map(|r| committed.extend(r.movements.iter().map(|m| m.id))),
            Op::Sortie { at_b, card_y, quantity } => movements
                .record(request(&w, MovementType::Sortie, Some(loc(at_b)), None, card(card_y), quantity))
                .await
                .map(|r| committed.extend(r.movements.iter().map(|m| m.id))),
            Op::Transfer { from_b, card_y, quantity } => movements
                .record(request(
                    &w,
                    MovementType::Transfert,
                    Some(loc(from_b)),
                    Some(loc(!from_b)),
                    card(card_y),
                    quantity,
                ))
                .await
                .map(|r| committed.extend(r.movements.iter().map(|m| m.id))),
            Op::Correct { pick, quantity } if !committed.is_empty() => {
                let id = committed[pick % committed.len()];
                movements
                    .correct(CorrectMovementRequest {
                        id,
                        quantity: Some(quantity),
                        ..Default::default()
                    })
                    .await
                    .map(|_| ())
            }
            Op::Reverse { pick } if !committed.is_empty() => {
                let id = committed.remove(pick % committed.len());
                let result = movements.reverse(id).await;
                if result.is_err() {
                    committed.push(id);
                }
                result
            }
            _ => Ok(()),
        };

        let after = snapshot(&app, &w).await;
        match result {
            Ok(()) => {}
            Err(e) => {
                assert_matches!(e, ServiceError::InsufficientStock { .. });
                assert_eq!(before, after, "failed operation changed stock");
            }
        }

        for ((loc, card), quantity) in &after {
            assert!(*quantity >= 0, "negative stock {quantity} at {loc}/{card}");
            app.assert_consistent(*loc, *card).await;
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn stock_stays_non_negative_and_reconciled(ops in prop::collection::vec(op_strategy(), 1..25)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(run_sequence(ops));
    }
}
