//! Integration tests for per-key operation serialization.
//!
//! Validates strict FIFO order per key, concurrency across keys, release on
//! failure, panic and cancellation, and cleanup of idle keys.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::{oneshot, Barrier};

use agent_relay::serializer::ResourceSerializer;
use agent_relay::AppError;

type Log = Arc<Mutex<Vec<String>>>;

fn push(log: &Log, entry: impl Into<String>) {
    log.lock().unwrap().push(entry.into());
}

#[tokio::test]
async fn same_key_operations_never_overlap() {
    let serializer = ResourceSerializer::new();
    let log = Log::default();

    let op = |name: &'static str| {
        let serializer = serializer.clone();
        let log = Arc::clone(&log);
        async move {
            serializer
                .run_exclusive("session.jsonl", || async {
                    push(&log, format!("{name}-start"));
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    push(&log, format!("{name}-end"));
                })
                .await;
        }
    };

    tokio::join!(op("a"), op("b"));

    assert_eq!(
        *log.lock().unwrap(),
        vec!["a-start", "a-end", "b-start", "b-end"]
    );
    assert_eq!(serializer.active_keys(), 0);
}

#[tokio::test]
async fn operations_start_in_arrival_order() {
    let serializer = ResourceSerializer::new();
    let log = Log::default();

    let ops = (0..6).map(|i| {
        let log = Arc::clone(&log);
        let serializer = &serializer;
        async move {
            serializer
                .run_exclusive("key", || async move {
                    // Later arrivals finish faster; order must still hold.
                    tokio::time::sleep(Duration::from_millis(30 - i * 5)).await;
                    push(&log, i.to_string());
                })
                .await;
        }
    });
    join_all(ops).await;

    assert_eq!(*log.lock().unwrap(), vec!["0", "1", "2", "3", "4", "5"]);
}

#[tokio::test]
async fn distinct_keys_run_concurrently() {
    let serializer = ResourceSerializer::new();
    let barrier = Arc::new(Barrier::new(2));

    let op = |key: &'static str| {
        let barrier = Arc::clone(&barrier);
        let serializer = serializer.clone();
        async move {
            serializer
                .run_exclusive(key, || async move {
                    // Deadlocks unless both operations are in flight at once.
                    barrier.wait().await;
                })
                .await;
        }
    };

    tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(op("left"), op("right"));
    })
    .await
    .expect("operations on distinct keys must not wait for each other");
}

#[tokio::test]
async fn failure_goes_to_its_caller_and_releases_the_key() {
    let serializer = ResourceSerializer::new();

    let failing = serializer.run_exclusive("key", || async {
        Err::<(), _>(AppError::Io("disk full".into()))
    });
    let next = serializer.run_exclusive("key", || async { Ok::<_, AppError>(7) });
    let (first, second) = tokio::join!(failing, next);

    assert!(matches!(first, Err(AppError::Io(_))));
    assert_eq!(second.expect("second operation still runs"), 7);
    assert_eq!(serializer.active_keys(), 0);
}

#[tokio::test]
async fn panicking_operation_releases_the_key() {
    let serializer = ResourceSerializer::new();

    let panicking = tokio::spawn({
        let serializer = serializer.clone();
        async move {
            serializer
                .run_exclusive("key", || async {
                    panic!("operation blew up");
                })
                .await;
        }
    });
    assert!(panicking.await.is_err());

    let value = tokio::time::timeout(
        Duration::from_secs(5),
        serializer.run_exclusive("key", || async { "ran" }),
    )
    .await
    .expect("key must be released after a panic");
    assert_eq!(value, "ran");
}

#[tokio::test]
async fn cancelled_waiter_does_not_break_the_order() {
    let serializer = ResourceSerializer::new();
    let log = Log::default();
    let (release_tx, release_rx) = oneshot::channel::<()>();

    let holder = tokio::spawn({
        let serializer = serializer.clone();
        let log = Arc::clone(&log);
        async move {
            serializer
                .run_exclusive("key", || async move {
                    push(&log, "holder-start");
                    let _ = release_rx.await;
                    push(&log, "holder-end");
                })
                .await;
        }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let abandoned = tokio::spawn({
        let serializer = serializer.clone();
        let log = Arc::clone(&log);
        async move {
            serializer
                .run_exclusive("key", || async move { push(&log, "abandoned") })
                .await;
        }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let last = tokio::spawn({
        let serializer = serializer.clone();
        let log = Arc::clone(&log);
        async move {
            serializer
                .run_exclusive("key", || async move { push(&log, "last") })
                .await;
        }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    abandoned.abort();
    assert!(abandoned.await.is_err());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(
        *log.lock().unwrap(),
        vec!["holder-start"],
        "the last operation must still wait for the holder"
    );

    release_tx.send(()).expect("holder is waiting");
    holder.await.expect("holder completes");
    tokio::time::timeout(Duration::from_secs(5), last)
        .await
        .expect("last operation must run")
        .expect("last operation completes");

    assert_eq!(
        *log.lock().unwrap(),
        vec!["holder-start", "holder-end", "last"]
    );
    assert_eq!(serializer.active_keys(), 0);
}

#[tokio::test]
async fn active_keys_tracks_in_flight_work() {
    let serializer = ResourceSerializer::new();
    assert_eq!(serializer.active_keys(), 0);

    let observed = serializer
        .run_exclusive("a", || async { serializer.active_keys() })
        .await;

    assert_eq!(observed, 1);
    assert_eq!(serializer.active_keys(), 0);
}
