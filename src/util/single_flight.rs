//! Coalescing of concurrent async requests.
//!
//! [`SingleFlight`] maps a key to the one request currently running for it.
//! Callers that arrive while a request for their key is in flight share its
//! result instead of issuing a second one. Once the request completes its
//! entry is dropped, so the owner is expected to have absorbed the result
//! somewhere durable (the listing cache, for page fetches) before a later
//! caller for the same key comes along.
//!
//! If the task driving a request is cancelled, the next waiter for that key
//! takes over and runs its own initializer.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::OnceCell;

type Slot<V, E> = Arc<OnceCell<Result<V, E>>>;

/// Per-key request coalescing.
pub struct SingleFlight<K, V, E> {
    in_flight: Mutex<HashMap<K, Slot<V, E>>>,
}

impl<K, V, E> SingleFlight<K, V, E>
where
    K: Hash + Eq + Clone,
    V: Clone,
    E: Clone,
{
    pub fn new() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<K, Slot<V, E>>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` for `key`, or join the request already running for it.
    ///
    /// Every caller that joined the same request receives a clone of its
    /// result, errors included.
    pub async fn run<F, Fut>(&self, key: K, f: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let slot = Arc::clone(
            self.slots()
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceCell::new())),
        );

        let result = slot.get_or_init(f).await.clone();

        let mut slots = self.slots();
        if slots.get(&key).is_some_and(|current| Arc::ptr_eq(current, &slot)) {
            slots.remove(&key);
        }

        result
    }

    /// Whether a request for `key` is currently running.
    #[cfg(test)]
    fn is_in_flight(&self, key: &K) -> bool {
        self.slots().contains_key(key)
    }

    /// Number of keys with a request currently running.
    #[cfg(test)]
    fn in_flight_count(&self) -> usize {
        self.slots().len()
    }
}

impl<K, V, E> Default for SingleFlight<K, V, E>
where
    K: Hash + Eq + Clone,
    V: Clone,
    E: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_lone_request_runs_and_clears() {
        let flights: SingleFlight<usize, &str, ()> = SingleFlight::new();

        let result = flights.run(0, || async { Ok("page") }).await;

        assert_eq!(result, Ok("page"));
        assert_eq!(flights.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_requests_for_one_key_share_a_call() {
        let flights: Arc<SingleFlight<usize, u32, String>> = Arc::new(SingleFlight::new());
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = vec![];
        for _ in 0..4 {
            let flights = Arc::clone(&flights);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                flights
                    .run(7, || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        sleep(Duration::from_millis(40)).await;
                        Ok(11)
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(11));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(flights.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_distinct_keys_run_independently() {
        let flights: Arc<SingleFlight<usize, usize, ()>> = Arc::new(SingleFlight::new());
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = vec![];
        for idx in 0..3 {
            let flights = Arc::clone(&flights);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                flights
                    .run(idx, || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        sleep(Duration::from_millis(20)).await;
                        Ok(idx * 10)
                    })
                    .await
            }));
        }

        for (idx, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap(), Ok(idx * 10));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_error_reaches_every_waiter() {
        let flights: Arc<SingleFlight<usize, u32, String>> = Arc::new(SingleFlight::new());

        let mut handles = vec![];
        for _ in 0..3 {
            let flights = Arc::clone(&flights);
            handles.push(tokio::spawn(async move {
                flights
                    .run(1, || async {
                        sleep(Duration::from_millis(30)).await;
                        Err("denied".to_string())
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Err("denied".to_string()));
        }
    }

    #[tokio::test]
    async fn test_completed_key_runs_again() {
        let flights: SingleFlight<usize, u32, ()> = SingleFlight::new();

        assert_eq!(flights.run(0, || async { Ok(1) }).await, Ok(1));
        assert_eq!(flights.run(0, || async { Ok(2) }).await, Ok(2));
    }

    #[tokio::test]
    async fn test_in_flight_visibility() {
        let flights: Arc<SingleFlight<usize, u32, ()>> = Arc::new(SingleFlight::new());

        let runner = Arc::clone(&flights);
        let handle = tokio::spawn(async move {
            runner
                .run(3, || async {
                    sleep(Duration::from_millis(80)).await;
                    Ok(3)
                })
                .await
        });

        sleep(Duration::from_millis(10)).await;
        assert!(flights.is_in_flight(&3));
        assert!(!flights.is_in_flight(&4));

        handle.await.unwrap().unwrap();
        assert!(!flights.is_in_flight(&3));
    }
}
