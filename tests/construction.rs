mod common;

use std::error::Error as _;

use common::{MockConnection, MockError, MockSpec};
use esox_connpool::{ConnectionPool, HookKind, PoolConfiguration, PoolError};

#[test]
fn test_construction_opens_capacity_distinct_connections() {
    for capacity in 1..=8 {
        let spec = MockSpec::new();
        let config = PoolConfiguration::new().with_capacity(capacity);
        let pool = ConnectionPool::<MockConnection>::new(&spec, config).unwrap();

        assert_eq!(pool.available_count(), capacity);
        assert_eq!(pool.checked_out_count(), 0);
        assert_eq!(spec.journal.opened(), (0..capacity).collect::<Vec<_>>());

        let held: Vec<_> = (0..capacity).map(|_| pool.acquire()).collect();
        let mut serials: Vec<_> = held.iter().map(|conn| conn.serial).collect();
        serials.sort_unstable();
        serials.dedup();
        assert_eq!(serials.len(), capacity);
    }
}

#[test]
fn test_open_failure_rolls_back_opened_connections() {
    // Third of five connections fails to open
    let spec = MockSpec::failing_at(2);
    let config = PoolConfiguration::new().with_capacity(5);
    let result = ConnectionPool::<MockConnection>::new(&spec, config);

    let err = result.err().expect("construction should fail");
    assert!(matches!(err, PoolError::Open { index: 2, .. }));
    assert_eq!(err.source().unwrap().to_string(), MockError(2).to_string());

    assert_eq!(spec.journal.opened(), vec![0, 1]);
    assert_eq!(spec.journal.closed_serials(), vec![0, 1]);
}

#[test]
fn test_hook_order_per_connection() {
    let spec = MockSpec::new();
    let calls = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
    let first_calls = std::sync::Arc::clone(&calls);
    let every_calls = std::sync::Arc::clone(&calls);

    let config = PoolConfiguration::<MockConnection>::new()
        .with_capacity(3)
        .with_on_first_connection(move |conn| {
            first_calls.lock().push(format!("first:{}", conn.serial));
            Ok(())
        })
        .with_on_connection(move |conn| {
            every_calls.lock().push(format!("every:{}", conn.serial));
            Ok(())
        });

    let _pool = ConnectionPool::new(&spec, config).unwrap();

    assert_eq!(
        *calls.lock(),
        vec!["first:0", "every:0", "every:1", "every:2"]
    );
}

#[test]
fn test_every_connection_hook_failure_closes_failing_connection_too() {
    let spec = MockSpec::new();
    let config = PoolConfiguration::<MockConnection>::new()
        .with_capacity(4)
        .with_on_connection(|conn| {
            if conn.serial == 1 {
                Err(MockError(conn.serial))
            } else {
                Ok(())
            }
        });

    let err = ConnectionPool::new(&spec, config).err().expect("construction should fail");

    assert!(matches!(
        err,
        PoolError::Hook { index: 1, hook: HookKind::EveryConnection, .. }
    ));
    assert_eq!(spec.journal.opened(), vec![0, 1]);
    assert_eq!(spec.journal.closed_serials(), vec![0, 1]);
}

#[test]
fn test_first_connection_hook_failure_opens_nothing_else() {
    let spec = MockSpec::new();
    let config = PoolConfiguration::<MockConnection>::new()
        .with_capacity(3)
        .with_on_first_connection(|conn| Err(MockError(conn.serial)));

    let err = ConnectionPool::new(&spec, config).err().expect("construction should fail");

    assert_eq!(err.connection_index(), Some(0));
    assert!(err.to_string().starts_with("on_first_connection"));
    assert_eq!(spec.journal.opened(), vec![0]);
    assert_eq!(spec.journal.closed_serials(), vec![0]);
}

#[test]
fn test_close_closes_all_connections_once() {
    let spec = MockSpec::new();
    let config = PoolConfiguration::<MockConnection>::new().with_capacity(6);
    let pool = ConnectionPool::new(&spec, config).unwrap();

    {
        let mut conn = pool.acquire();
        conn.uses += 1;
    }
    pool.close();

    assert_eq!(spec.journal.closed_serials(), (0..6).collect::<Vec<_>>());
    assert_eq!(spec.journal.total_uses(), 1);
}
