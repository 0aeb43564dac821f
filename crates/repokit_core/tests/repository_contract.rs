//! Behaviour every `CrudRepository` binding must share, run against both
//! the SQLite and the in-memory store.

use repokit_core::{
    open_db_in_memory, CrudRepository, Direction, InMemoryRepository, Order, OrderStatus,
    PageRequest, RepoError, Sort, SqliteRepository,
};

macro_rules! contract_tests {
    ($($name:ident),* $(,)?) => {
        mod sqlite {
            $(
                #[test]
                fn $name() {
                    let conn = repokit_core::open_db_in_memory().unwrap();
                    let repo = repokit_core::SqliteRepository::<repokit_core::Order>::try_new(&conn)
                        .unwrap();
                    super::$name(&repo);
                }
            )*
        }

        mod memory {
            $(
                #[test]
                fn $name() {
                    let repo = repokit_core::InMemoryRepository::<repokit_core::Order>::new();
                    super::$name(&repo);
                }
            )*
        }
    };
}

contract_tests!(
    first_saves_get_sequential_ids_and_delete_leaves_the_rest,
    save_assigns_unused_id_and_find_returns_equal_fields,
    unknown_ids_are_absent_not_errors,
    delete_by_id_is_idempotent,
    repeated_save_load_cycles_do_not_drift,
    save_with_existing_id_updates_in_place,
    save_with_unknown_explicit_id_inserts_and_advances_sequence,
    save_all_keeps_order_and_assigns_ids,
    save_all_is_all_or_nothing_on_validation_failure,
    validation_failure_blocks_save,
    find_all_rereads_current_state,
    find_all_sorted_orders_by_requested_columns_then_id,
    find_all_sorted_rejects_unknown_property,
    find_all_by_id_skips_missing_and_collapses_duplicates,
    pagination_sizes_match_store_size,
    pagination_rejects_invalid_requests,
    pagination_with_sort_is_stable,
    delete_requires_identifier_and_existence,
    delete_all_by_id_ignores_unknown_ids,
    delete_all_empties_store_but_keeps_sequence,
    exhausted_id_sequence_is_a_storage_error,
);

fn first_saves_get_sequential_ids_and_delete_leaves_the_rest<R: CrudRepository<Order>>(repo: &R) {
    let a = repo.save(&Order::new("A")).unwrap();
    assert_eq!(a.id, Some(1));
    let b = repo.save(&Order::new("B")).unwrap();
    assert_eq!(b.id, Some(2));
    assert_eq!(repo.count().unwrap(), 2);

    repo.delete_by_id(1).unwrap();
    assert!(repo.find_by_id(1).unwrap().is_none());

    let all = repo.find_all().unwrap();
    assert_eq!(all, vec![b]);
}

fn save_assigns_unused_id_and_find_returns_equal_fields<R: CrudRepository<Order>>(repo: &R) {
    let existing = repo.save(&Order::new("existing")).unwrap();

    let draft = Order::new("widget")
        .with_quantity(3)
        .with_unit_price_cents(250)
        .with_status(OrderStatus::Paid);
    let saved = repo.save(&draft).unwrap();

    let id = saved.id.unwrap();
    assert_ne!(Some(id), existing.id);
    assert_eq!(draft.id, None, "input entity must not be mutated");

    let loaded = repo.find_by_id(id).unwrap().unwrap();
    assert_eq!(loaded.name, draft.name);
    assert_eq!(loaded.quantity, draft.quantity);
    assert_eq!(loaded.unit_price_cents, draft.unit_price_cents);
    assert_eq!(loaded.status, draft.status);
    assert_eq!(loaded, saved);
}

fn unknown_ids_are_absent_not_errors<R: CrudRepository<Order>>(repo: &R) {
    repo.save(&Order::new("A")).unwrap();

    for id in [0, 2, -1, i64::MAX] {
        assert!(repo.find_by_id(id).unwrap().is_none());
        assert!(!repo.exists_by_id(id).unwrap());
    }
    assert!(repo.exists_by_id(1).unwrap());
}

fn delete_by_id_is_idempotent<R: CrudRepository<Order>>(repo: &R) {
    let saved = repo.save(&Order::new("A")).unwrap();
    let id = saved.id.unwrap();

    repo.delete_by_id(id).unwrap();
    repo.delete_by_id(id).unwrap();
    repo.delete_by_id(404).unwrap();

    assert_eq!(repo.count().unwrap(), 0);
}

fn repeated_save_load_cycles_do_not_drift<R: CrudRepository<Order>>(repo: &R) {
    let saved = repo
        .save(&Order::new("cycle").with_quantity(2).with_unit_price_cents(999))
        .unwrap();
    let id = saved.id.unwrap();

    let first = repo.find_by_id(id).unwrap().unwrap();
    repo.save(&first).unwrap();
    let second = repo.find_by_id(id).unwrap().unwrap();

    assert_eq!(first, second);
    assert_eq!(repo.count().unwrap(), 1);
}

fn save_with_existing_id_updates_in_place<R: CrudRepository<Order>>(repo: &R) {
    let mut order = repo.save(&Order::new("draft")).unwrap();
    order.name = "final".to_string();
    order.status = OrderStatus::Shipped;

    let updated = repo.save(&order).unwrap();
    assert_eq!(updated, order);
    assert_eq!(repo.count().unwrap(), 1);
    assert_eq!(repo.find_by_id(order.id.unwrap()).unwrap().unwrap().name, "final");
}

fn save_with_unknown_explicit_id_inserts_and_advances_sequence<R: CrudRepository<Order>>(
    repo: &R,
) {
    let imported = repo.save(&Order::new("imported").with_id(10)).unwrap();
    assert_eq!(imported.id, Some(10));
    assert!(repo.exists_by_id(10).unwrap());

    let next = repo.save(&Order::new("next")).unwrap();
    assert_eq!(next.id, Some(11));
}

fn save_all_keeps_order_and_assigns_ids<R: CrudRepository<Order>>(repo: &R) {
    let saved = repo
        .save_all(&[Order::new("c"), Order::new("a"), Order::new("b")])
        .unwrap();

    let names = saved.iter().map(|o| o.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["c", "a", "b"]);
    let ids = saved.iter().map(|o| o.id.unwrap()).collect::<Vec<_>>();
    assert_eq!(ids, vec![1, 2, 3]);
    assert!(repo.save_all(&[]).unwrap().is_empty());
}

fn save_all_is_all_or_nothing_on_validation_failure<R: CrudRepository<Order>>(repo: &R) {
    let err = repo
        .save_all(&[Order::new("ok"), Order::new("bad").with_quantity(0)])
        .unwrap_err();

    assert!(matches!(err, RepoError::Validation(ref v) if v.field == "quantity"));
    assert_eq!(repo.count().unwrap(), 0);
}

fn validation_failure_blocks_save<R: CrudRepository<Order>>(repo: &R) {
    let blank = repo.save(&Order::new("   ")).unwrap_err();
    assert_eq!(blank.code(), "validation_failed");

    let negative = repo
        .save(&Order::new("refund").with_unit_price_cents(-1))
        .unwrap_err();
    assert!(matches!(negative, RepoError::Validation(ref v) if v.field == "unit_price_cents"));

    assert_eq!(repo.count().unwrap(), 0);
}

fn find_all_rereads_current_state<R: CrudRepository<Order>>(repo: &R) {
    assert!(repo.find_all().unwrap().is_empty());

    repo.save(&Order::new("A")).unwrap();
    assert_eq!(repo.find_all().unwrap().len(), 1);

    repo.save(&Order::new("B")).unwrap();
    assert_eq!(repo.find_all().unwrap().len(), 2);
}

fn find_all_sorted_orders_by_requested_columns_then_id<R: CrudRepository<Order>>(repo: &R) {
    repo.save_all(&[
        Order::new("pear").with_quantity(2),
        Order::new("apple").with_quantity(5),
        Order::new("fig").with_quantity(2),
        Order::new("apple").with_quantity(1),
    ])
    .unwrap();

    let by_name = repo.find_all_sorted(&Sort::asc("name")).unwrap();
    let ids = by_name.iter().map(|o| o.id.unwrap()).collect::<Vec<_>>();
    assert_eq!(ids, vec![2, 4, 3, 1]);

    let sort = Sort::desc("quantity").and("name", Direction::Asc);
    let by_quantity = repo.find_all_sorted(&sort).unwrap();
    let names = by_quantity
        .iter()
        .map(|o| o.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["apple", "fig", "pear", "apple"]);

    let by_id_desc = repo.find_all_sorted(&Sort::desc("id")).unwrap();
    assert_eq!(by_id_desc.first().unwrap().id, Some(4));
}

fn find_all_sorted_rejects_unknown_property<R: CrudRepository<Order>>(repo: &R) {
    let err = repo.find_all_sorted(&Sort::asc("colour")).unwrap_err();
    assert!(matches!(err, RepoError::InvalidArgument(ref message) if message.contains("colour")));
}

fn find_all_by_id_skips_missing_and_collapses_duplicates<R: CrudRepository<Order>>(repo: &R) {
    repo.save_all(&[Order::new("A"), Order::new("B"), Order::new("C")])
        .unwrap();

    let found = repo.find_all_by_id(&[3, 99, 1, 3]).unwrap();
    let ids = found.iter().map(|o| o.id.unwrap()).collect::<Vec<_>>();
    assert_eq!(ids, vec![1, 3]);
    assert!(repo.find_all_by_id(&[]).unwrap().is_empty());
}

fn pagination_sizes_match_store_size<R: CrudRepository<Order>>(repo: &R) {
    for n in 0..=7_i64 {
        repo.delete_all().unwrap();
        let orders = (0..n)
            .map(|i| Order::new(format!("order-{i}")))
            .collect::<Vec<_>>();
        repo.save_all(&orders).unwrap();

        for size in 1..=3_i64 {
            for page in 0..=(n / size + 1) {
                let result = repo.find_all_paged(&PageRequest::of(page, size)).unwrap();
                let expected = size.min((n - page * size).max(0));
                assert_eq!(
                    result.content.len() as i64,
                    expected,
                    "n={n} size={size} page={page}"
                );
                assert_eq!(result.total_elements, n as u64);
                assert_eq!(result.page_number, page as u64);
            }
        }
    }
}

fn pagination_rejects_invalid_requests<R: CrudRepository<Order>>(repo: &R) {
    for request in [
        PageRequest::of(-1, 10),
        PageRequest::of(0, 0),
        PageRequest::of(0, -3),
        PageRequest::of(0, 10).with_sort(Sort::asc("missing")),
    ] {
        let err = repo.find_all_paged(&request).unwrap_err();
        assert_eq!(err.code(), "invalid_argument", "{request:?}");
    }
}

fn pagination_with_sort_is_stable<R: CrudRepository<Order>>(repo: &R) {
    repo.save_all(&[
        Order::new("same"),
        Order::new("same"),
        Order::new("same"),
        Order::new("other"),
    ])
    .unwrap();

    let sort = Sort::asc("name");
    let first = repo
        .find_all_paged(&PageRequest::of(0, 2).with_sort(sort.clone()))
        .unwrap();
    let second = repo
        .find_all_paged(&PageRequest::of(1, 2).with_sort(sort))
        .unwrap();

    let ids = first
        .content
        .iter()
        .chain(second.content.iter())
        .map(|o| o.id.unwrap())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec![4, 1, 2, 3]);
    assert!(first.has_next());
    assert!(second.is_last());
    assert_eq!(second.total_pages(), 2);
}

fn delete_requires_identifier_and_existence<R: CrudRepository<Order>>(repo: &R) {
    let unsaved = Order::new("never saved");
    assert!(matches!(
        repo.delete(&unsaved).unwrap_err(),
        RepoError::InvalidArgument(_)
    ));

    let saved = repo.save(&Order::new("A")).unwrap();
    repo.delete(&saved).unwrap();
    assert!(!repo.exists_by_id(saved.id.unwrap()).unwrap());

    let err = repo.delete(&saved).unwrap_err();
    assert!(matches!(err, RepoError::NotFound { entity: "orders", ref id } if id == "1"));
}

fn delete_all_by_id_ignores_unknown_ids<R: CrudRepository<Order>>(repo: &R) {
    repo.save_all(&[Order::new("A"), Order::new("B"), Order::new("C")])
        .unwrap();

    repo.delete_all_by_id(&[1, 3, 42]).unwrap();

    let remaining = repo.find_all().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].name, "B");
}

fn delete_all_empties_store_but_keeps_sequence<R: CrudRepository<Order>>(repo: &R) {
    repo.save_all(&[Order::new("A"), Order::new("B")]).unwrap();

    repo.delete_all().unwrap();
    assert_eq!(repo.count().unwrap(), 0);
    assert!(repo.find_all().unwrap().is_empty());

    let next = repo.save(&Order::new("C")).unwrap();
    assert_eq!(next.id, Some(3));
}

fn exhausted_id_sequence_is_a_storage_error<R: CrudRepository<Order>>(repo: &R) {
    repo.save(&Order::new("last").with_id(i64::MAX)).unwrap();

    let err = repo.save(&Order::new("overflow")).unwrap_err();
    assert!(matches!(err, RepoError::Storage(_)), "unexpected error: {err:?}");
    assert_eq!(err.code(), "storage_error");

    let batch_err = repo
        .save_all(&[Order::new("a").with_id(7), Order::new("b")])
        .unwrap_err();
    assert_eq!(batch_err.code(), "storage_error");
    assert_eq!(repo.count().unwrap(), 1);
    assert!(!repo.exists_by_id(7).unwrap());
}

#[test]
fn both_bindings_agree_on_a_mixed_workload() {
    let conn = open_db_in_memory().unwrap();
    let sqlite = SqliteRepository::<Order>::try_new(&conn).unwrap();
    let memory = InMemoryRepository::<Order>::new();

    for repo in [&sqlite as &dyn CrudRepository<Order>, &memory] {
        repo.save_all(&[
            Order::new("b").with_quantity(4),
            Order::new("a").with_quantity(4),
            Order::new("c").with_quantity(1),
        ])
        .unwrap();
        repo.delete_by_id(2).unwrap();
        repo.save(&Order::new("d").with_quantity(9)).unwrap();
    }

    let request = PageRequest::of(0, 10).with_sort(Sort::desc("quantity"));
    let from_sqlite = sqlite.find_all_paged(&request).unwrap();
    let from_memory = memory.find_all_paged(&request).unwrap();
    assert_eq!(from_sqlite, from_memory);
}
