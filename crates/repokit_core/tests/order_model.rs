use repokit_core::{Entity, Order, OrderStatus};
use rusqlite::types::Value;

#[test]
fn order_new_sets_defaults() {
    let order = Order::new("coffee beans");

    assert_eq!(order.id, None);
    assert_eq!(order.name, "coffee beans");
    assert_eq!(order.quantity, 1);
    assert_eq!(order.unit_price_cents, 0);
    assert_eq!(order.status, OrderStatus::Pending);
    assert!(order.validate().is_ok());
}

#[test]
fn validate_rejects_blank_name_zero_quantity_and_negative_price() {
    let blank = Order::new(" \t").validate().unwrap_err();
    assert_eq!(blank.field, "name");

    let empty = Order::new("box").with_quantity(0).validate().unwrap_err();
    assert_eq!(empty.field, "quantity");

    let negative = Order::new("box")
        .with_unit_price_cents(-20)
        .validate()
        .unwrap_err();
    assert_eq!(negative.field, "unit_price_cents");
    assert_eq!(
        negative.to_string(),
        "invalid orders.unit_price_cents: must not be negative, got -20"
    );
}

#[test]
fn total_cents_saturates() {
    assert_eq!(
        Order::new("tea").with_quantity(3).with_unit_price_cents(450).total_cents(),
        1350
    );
    assert_eq!(
        Order::new("gold")
            .with_quantity(u32::MAX)
            .with_unit_price_cents(i64::MAX)
            .total_cents(),
        i64::MAX
    );
}

#[test]
fn terminal_statuses() {
    assert!(!OrderStatus::Pending.is_terminal());
    assert!(!OrderStatus::Paid.is_terminal());
    assert!(OrderStatus::Shipped.is_terminal());
    assert!(OrderStatus::Cancelled.is_terminal());
    assert_eq!(OrderStatus::parse("shipped"), Some(OrderStatus::Shipped));
    assert_eq!(OrderStatus::parse("Shipped"), None);
}

#[test]
fn column_values_align_with_columns() {
    let order = Order::new("lamp")
        .with_id(9)
        .with_quantity(2)
        .with_unit_price_cents(1999)
        .with_status(OrderStatus::Paid);

    let values = order.column_values();
    assert_eq!(values.len(), Order::COLUMNS.len());
    assert_eq!(
        values,
        vec![
            Value::Text("lamp".to_string()),
            Value::Integer(2),
            Value::Integer(1999),
            Value::Text("paid".to_string()),
        ]
    );
    assert_eq!(order.property_value("id"), Some(Value::Integer(9)));
    assert_eq!(order.property_value("quantity"), Some(Value::Integer(2)));
    assert_eq!(order.property_value("colour"), None);
    assert_eq!(Order::new("x").property_value("id"), Some(Value::Null));
}

#[test]
fn order_serialization_uses_expected_wire_fields() {
    let order = Order::new("lamp")
        .with_id(4)
        .with_status(OrderStatus::Cancelled);

    let json = serde_json::to_value(&order).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "id": 4,
            "name": "lamp",
            "quantity": 1,
            "unit_price_cents": 0,
            "status": "cancelled"
        })
    );

    let decoded: Order = serde_json::from_value(json).unwrap();
    assert_eq!(decoded, order);

    let unsaved = serde_json::to_value(Order::new("draft")).unwrap();
    assert!(unsaved["id"].is_null());
}
