//! Concurrency tests for the connection registry.
//!
//! These verify:
//! - Concurrent add/update/close on distinct IDs never corrupt each other
//! - `list()` size equals the number of open records
//! - Snapshots taken mid-flight contain only complete records

use std::{
    collections::HashSet,
    net::SocketAddr,
    sync::{Arc, Barrier},
    thread,
};

use cryptoserver_server::{ConnectionRegistry, SystemEnv};
use proptest::prelude::*;

const THREADS: usize = 16;
const ROUNDS: usize = 200;

fn registry() -> Arc<ConnectionRegistry<SystemEnv>> {
    Arc::new(ConnectionRegistry::new(SystemEnv::new()))
}

fn source(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

/// INVARIANT: concurrent handlers on distinct IDs leave the registry empty
/// once every one of them has closed its record.
#[test]
fn concurrent_lifecycles_do_not_interfere() {
    let registry = registry();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for round in 0..ROUNDS {
                    let id = registry.next_request_id();
                    let path = format!("/t{t}/r{round}");

                    assert!(registry.add(id, source(t as u16), "POST", &path));
                    assert!(registry.update(id, "localhost", &format!("host-{t}"), "node"));

                    let record = registry.close(id).unwrap();
                    assert_eq!(record.raw_url, path);
                    assert_eq!(record.http_host_name, Some(format!("host-{t}")));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert!(registry.is_empty());
}

/// INVARIANT: records held open by live guards are all visible, each exactly
/// once, and vanish when the guards drop.
#[test]
fn list_matches_open_guards() {
    let registry = registry();
    let barrier = Arc::new(Barrier::new(THREADS + 1));
    let release = Arc::new(Barrier::new(THREADS + 1));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            let release = Arc::clone(&release);
            thread::spawn(move || {
                let guard = registry.open(source(t as u16), "POST", "/encrypt");
                barrier.wait();
                release.wait();
                drop(guard);
            })
        })
        .collect();

    barrier.wait();
    let snapshot = registry.list();
    assert_eq!(snapshot.len(), THREADS);

    let ids: HashSet<_> = snapshot.iter().map(|r| r.request_id).collect();
    assert_eq!(ids.len(), THREADS);
    assert!(!ids.contains(&0));

    release.wait();
    for handle in handles {
        handle.join().unwrap();
    }

    assert!(registry.is_empty());
}

/// INVARIANT: a reader listing while writers churn only ever sees whole
/// records from the set that was opened.
#[test]
fn snapshots_during_churn_are_consistent() {
    let registry = registry();

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    let guard = registry.open(source(9000 + t), "POST", "/decrypt");
                    guard.update("localhost", "host", "node");
                }
            })
        })
        .collect();

    for _ in 0..ROUNDS {
        for record in registry.list() {
            assert_ne!(record.request_id, 0);
            assert_eq!(record.raw_url, "/decrypt");
            assert!(record.end_time >= record.start_time);
        }
    }

    for writer in writers {
        writer.join().unwrap();
    }

    assert!(registry.is_empty());
}

#[derive(Debug, Clone)]
enum Op {
    Add(u64),
    Update(u64),
    Close(u64),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u64..16).prop_map(Op::Add),
        (0u64..16).prop_map(Op::Update),
        (0u64..16).prop_map(Op::Close),
    ]
}

proptest! {
    /// Property: after any sequence of operations, `list()` holds exactly the
    /// non-zero IDs that were added and not yet closed
    #[test]
    fn prop_list_tracks_open_ids(ops in prop::collection::vec(arb_op(), 0..64)) {
        let registry = registry();
        let mut open = HashSet::new();

        for op in ops {
            match op {
                Op::Add(id) => {
                    registry.add(id, source(1), "GET", "/");
                    if id != 0 {
                        open.insert(id);
                    }
                },
                Op::Update(id) => {
                    let updated = registry.update(id, "localhost", "host", "node");
                    prop_assert_eq!(updated, open.contains(&id));
                },
                Op::Close(id) => {
                    let closed = registry.close(id);
                    prop_assert_eq!(closed.is_some(), open.remove(&id));
                },
            }
        }

        let listed: HashSet<_> = registry.list().into_iter().map(|r| r.request_id).collect();
        prop_assert_eq!(listed, open);
    }
}
