// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Coalescing of concurrent work for the same identifier.

use std::collections::HashMap;
use std::fmt::Debug;

use futures_util::future::{BoxFuture, FutureExt, Shared, WeakShared};
use parking_lot::Mutex;

type Work<T> = Shared<BoxFuture<'static, T>>;

/// Runs at most one unit of work per key at a time.
///
/// The first caller for a key starts the work; callers that arrive while it is running await the
/// same future and receive a clone of its output. The key is released once the work completes,
/// so the next call starts fresh. Work for different keys never waits on each other.
///
/// The map only holds weak handles. Once every caller awaiting a key is dropped, the work is
/// dropped with them and the key is released.
pub(crate) struct Flights<T> {
    in_flight: Mutex<InFlight<T>>,
}

struct InFlight<T> {
    next_id: u64,
    entries: HashMap<String, Flight<T>>,
}

struct Flight<T> {
    id: u64,
    work: WeakShared<BoxFuture<'static, T>>,
}

impl<T> Default for Flights<T> {
    fn default() -> Self {
        Self {
            in_flight: Mutex::new(InFlight {
                next_id: 0,
                entries: HashMap::new(),
            }),
        }
    }
}

impl<T> Debug for Flights<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flights")
            .field("in_flight", &self.in_flight.lock().entries.len())
            .finish()
    }
}

impl<T> Flights<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Awaits the work running for `key`, starting it with `make` if none is running.
    pub(crate) async fn run<F, Fut>(&self, key: &str, make: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        // Declared before `work` so it drops after it, when this caller holds no strong handle.
        let mut departure = Departure {
            flights: self,
            key,
            id: None,
            completed: false,
        };

        let work = self.join_or_start(key, make, &mut departure.id);
        let output = work.await;

        departure.completed = true;
        output
    }

    fn join_or_start<F, Fut>(&self, key: &str, make: F, id: &mut Option<u64>) -> Work<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let mut in_flight = self.in_flight.lock();

        if let Some(flight) = in_flight.entries.get(key)
            && let Some(work) = flight.work.upgrade()
        {
            *id = Some(flight.id);
            return work;
        }

        let work = make().boxed().shared();
        if let Some(weak) = work.downgrade() {
            let flight_id = in_flight.next_id;
            in_flight.next_id = in_flight.next_id.wrapping_add(1);
            in_flight.entries.insert(key.to_owned(), Flight { id: flight_id, work: weak });
            *id = Some(flight_id);
        }

        work
    }

    /// Number of keys with work in progress.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.in_flight.lock().entries.len()
    }
}

/// Releases a caller's key when it completes or is dropped.
///
/// A completed caller removes its flight so the next call starts fresh. A dropped caller removes
/// it only when no other caller still holds the work.
struct Departure<'a, T> {
    flights: &'a Flights<T>,
    key: &'a str,
    id: Option<u64>,
    completed: bool,
}

impl<T> Drop for Departure<'_, T> {
    fn drop(&mut self) {
        let Some(id) = self.id else {
            return;
        };

        let mut in_flight = self.flights.in_flight.lock();
        let release = in_flight
            .entries
            .get(self.key)
            .is_some_and(|flight| flight.id == id && (self.completed || flight.work.upgrade().is_none()));

        if release {
            in_flight.entries.remove(self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::time::Instant;

    use super::*;

    fn counted(calls: &Arc<AtomicUsize>, value: u32) -> impl Future<Output = u32> + Send + 'static {
        let calls = Arc::clone(calls);

        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            value
        }
    }

    #[tokio::test(start_paused = true)]
    async fn same_key_runs_once() {
        let flights = Flights::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let (first, second) = tokio::join!(
            flights.run("a", || counted(&calls, 1)),
            flights.run("a", || counted(&calls, 2)),
        );

        assert_eq!((first, second), (1, 1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(flights.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn different_keys_run_in_parallel() {
        let flights = Flights::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let started = Instant::now();

        let (first, second) = tokio::join!(
            flights.run("a", || counted(&calls, 1)),
            flights.run("b", || counted(&calls, 2)),
        );

        assert_eq!((first, second), (1, 2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn key_released_after_completion() {
        let flights = Flights::new();
        let calls = Arc::new(AtomicUsize::new(0));

        assert_eq!(flights.run("a", || counted(&calls, 1)).await, 1);
        assert_eq!(flights.run("a", || counted(&calls, 2)).await, 2);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(flights.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_work_releases_key() {
        let flights = Flights::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let abandoned = tokio::time::timeout(Duration::from_millis(10), flights.run("a", || counted(&calls, 1))).await;
        assert!(abandoned.is_err());
        assert_eq!(flights.len(), 0);

        assert_eq!(flights.run("a", || counted(&calls, 2)).await, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(flights.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_follower_leaves_leader_running() {
        let flights = Flights::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let (leader, follower) = tokio::join!(
            flights.run("a", || counted(&calls, 1)),
            tokio::time::timeout(Duration::from_millis(10), flights.run("a", || counted(&calls, 2))),
        );

        assert_eq!(leader, 1);
        assert!(follower.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(flights.len(), 0);
    }
}
