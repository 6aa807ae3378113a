//! Property-based checks: wire round-tripping, composite-key isolation,
//! concurrency-lock release, and `Repeated` termination.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::*;
use dispatch_core::testing::{InMemoryConcurrencyStore, InMemoryQueueProvider};
use dispatch_core::{composite_key, DispatchContext, DispatchOutcome, DispatchRequest, Dispatcher, Metadata, NoopHooks, Registry};
use proptest::prelude::*;

fn tag_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_.]{1,20}"
}

proptest! {
    /// Encoding then decoding an `Echo` callable recovers the same label:
    /// the wire frame round-trips through the registry.
    #[test]
    fn echo_round_trips_through_the_wire(label in "\\PC{0,40}") {
        let invocations = Arc::new(AtomicUsize::new(0));
        let registry = Registry::new();
        register_echo(&registry, invocations.clone());

        let original = Echo { label: label.clone(), invocations };
        let bytes = registry.encode(&original).expect("encode");
        let decoded = registry.decode(&bytes).expect("decode");

        prop_assert_eq!(decoded.type_tag(), ECHO_TAG);
        let payload = decoded.to_payload().expect("payload");
        prop_assert_eq!(payload.get("label").and_then(|v| v.as_str()), Some(label.as_str()));
    }

    /// Two distinct `(type_tag, type_key)` pairs, neither containing the
    /// `+` delimiter, never collide in the composite key: the one `+` in
    /// the formatted string unambiguously marks the boundary.
    #[test]
    fn composite_key_isolates_distinct_pairs(
        a_tag in tag_strategy(), a_key in tag_strategy(),
        b_tag in tag_strategy(), b_key in tag_strategy(),
    ) {
        let same_pair = a_tag == b_tag && a_key == b_key;
        let collides = composite_key(&a_tag, &a_key) == composite_key(&b_tag, &b_key);
        prop_assert_eq!(collides, same_pair);
    }
}

/// Releasing a concurrency lock fully restores capacity: a `limit = 1`
/// key can be locked again immediately after release, for any number of
/// prior acquire/release cycles.
#[tokio::test]
async fn concurrency_lock_release_restores_capacity() {
    common::init_tracing();
    let store = InMemoryConcurrencyStore::new();
    for _ in 0..25 {
        let lock = store.try_set_lock("svc+job", 1).await.unwrap();
        assert!(lock.got_lock);
        let second = store.try_set_lock("svc+job", 1).await.unwrap();
        assert!(!second.got_lock, "limit of 1 must reject a concurrent acquire");
        store.release_lock("svc+job", &lock.instance_key.unwrap()).await;
    }
}

/// A `Repeated` callable always terminates at exactly `maxCalls`
/// invocations, for every `maxCalls` in a reasonable range, and never
/// invokes more than that.
#[tokio::test]
async fn repeated_callable_terminates_at_max_calls() {
    common::init_tracing();
    for max_calls in 1..=6u32 {
        let invocations = Arc::new(AtomicUsize::new(0));
        let registry = Registry::new();
        register_repeated(&registry, invocations.clone());
        let registry = Arc::new(registry);
        let queue = Arc::new(InMemoryQueueProvider::new());
        let dispatcher = Dispatcher::new(registry.clone(), queue.clone());

        let mut bytes = registry
            .encode(&RepeatedJob {
                max_calls,
                interval: Duration::from_millis(1),
                state: dispatch_core::RepeatedState::new(0, true),
                invocations: invocations.clone(),
            })
            .unwrap();

        for _ in 0..max_calls {
            let outcome = dispatcher
                .dispatch(DispatchRequest::new(bytes.clone(), "jobs", Metadata::new()), &NoopHooks, &DispatchContext::new())
                .await
                .unwrap();
            match outcome {
                DispatchOutcome::Republished { .. } => {
                    let delayed = queue.drain_delayed();
                    assert_eq!(delayed.len(), 1);
                    bytes = delayed[0].1.clone();
                }
                DispatchOutcome::Completed => break,
                other => panic!("unexpected outcome for Repeated callable: {other:?}"),
            }
        }

        assert_eq!(invocations.load(Ordering::SeqCst), max_calls as usize);
        assert!(queue.drain_delayed().is_empty(), "must not republish past maxCalls");
    }
}
