// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A sliding one-hour window of failure instants.

use std::collections::BTreeSet;
use std::ops::Bound;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::{Error, Result};

/// How long a recorded error keeps counting towards the window.
pub const MAX_AGE: Duration = Duration::from_secs(60 * 60);

const COMPONENT: &str = "error window";

/// Tracks the instants at which errors occurred and counts those within the last hour.
///
/// Entries are kept ordered from oldest to newest. A single expiry task is armed for the oldest
/// entry; when it fires it removes every entry that has aged out and re-arms itself for the next
/// oldest one, so the window never polls and never holds on to long-dead entries.
///
/// Counting does not depend on the expiry task: entries older than [`MAX_AGE`] are never counted,
/// even if the task has not caught up yet. An entry exactly [`MAX_AGE`] old no longer counts.
///
/// Two errors recorded at the exact same instant are tracked as one.
///
/// The expiry task runs on the tokio runtime active when an error is recorded. Without a
/// runtime, stale entries are dropped the next time an error is recorded.
///
/// # Examples
///
/// ```
/// use advert_lookup::ErrorWindow;
/// use tokio::time::Instant;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> advert_lookup::Result<()> {
/// let window = ErrorWindow::new();
/// let now = Instant::now();
///
/// window.record(now)?;
/// window.record(now)?;
///
/// assert_eq!(window.count_in_last_hour(now)?, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ErrorWindow {
    state: Arc<Mutex<WindowState>>,
}

#[derive(Debug, Default)]
struct WindowState {
    errors: BTreeSet<Instant>,
    expiry: Option<JoinHandle<()>>,
    generation: u64,
    closed: bool,
}

impl Default for ErrorWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorWindow {
    /// Creates an empty window.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::default(),
        }
    }

    /// Records an error that occurred at `at`.
    ///
    /// Errors that are already older than [`MAX_AGE`] are ignored, as are errors recorded at an
    /// instant that is already tracked.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] once the window has been closed.
    pub fn record(&self, at: Instant) -> Result<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;

        let now = Instant::now();
        if is_expired(at, now) {
            return Ok(());
        }

        let pruned = state.prune(now) > 0;
        let becomes_oldest = state.errors.first().is_none_or(|oldest| at < *oldest);
        let inserted = state.errors.insert(at);

        if pruned || (inserted && becomes_oldest) {
            arm_expiry(&self.state, &mut state);
        }

        Ok(())
    }

    /// Counts the errors that occurred less than [`MAX_AGE`] before `now`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] once the window has been closed.
    pub fn count_in_last_hour(&self, now: Instant) -> Result<usize> {
        let state = self.state.lock();
        state.ensure_open()?;

        let count = match now.checked_sub(MAX_AGE) {
            Some(window_start) => state.errors.range((Bound::Excluded(window_start), Bound::Unbounded)).count(),
            None => state.errors.len(),
        };

        Ok(count)
    }

    /// Counts the errors that occurred within the last hour.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] once the window has been closed.
    pub fn count_recent(&self) -> Result<usize> {
        self.count_in_last_hour(Instant::now())
    }

    /// Number of entries currently held, including any the expiry task has not removed yet.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.state.lock().errors.len()
    }

    /// Closes the window, dropping every entry and the pending expiry task.
    ///
    /// Later calls to [`record`][Self::record] and [`count_in_last_hour`][Self::count_in_last_hour]
    /// fail with [`Error::Disposed`]. Closing twice is a no-op.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.errors.clear();

        if let Some(expiry) = state.expiry.take() {
            expiry.abort();
        }
    }

    /// Returns `true` once [`close`][Self::close] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl Drop for ErrorWindow {
    fn drop(&mut self) {
        if let Some(expiry) = self.state.lock().expiry.take() {
            expiry.abort();
        }
    }
}

impl WindowState {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::disposed(COMPONENT));
        }

        Ok(())
    }

    /// Removes aged-out entries from the old end and returns how many were removed.
    fn prune(&mut self, now: Instant) -> usize {
        let mut removed = 0;

        while let Some(&oldest) = self.errors.first() {
            if !is_expired(oldest, now) {
                break;
            }

            self.errors.pop_first();
            removed += 1;
        }

        removed
    }
}

fn is_expired(at: Instant, now: Instant) -> bool {
    now.saturating_duration_since(at) >= MAX_AGE
}

/// Replaces the pending expiry task with one that fires when the oldest entry ages out.
fn arm_expiry(shared: &Arc<Mutex<WindowState>>, state: &mut WindowState) {
    if let Some(previous) = state.expiry.take() {
        previous.abort();
    }

    state.generation = state.generation.wrapping_add(1);

    let Some(&oldest) = state.errors.first() else {
        return;
    };

    let Ok(runtime) = Handle::try_current() else {
        return;
    };

    let deadline = oldest + MAX_AGE;
    let generation = state.generation;
    let weak = Arc::downgrade(shared);

    state.expiry = Some(runtime.spawn(async move {
        tokio::time::sleep_until(deadline).await;

        if let Some(shared) = weak.upgrade() {
            expire(&shared, generation);
        }
    }));
}

fn expire(shared: &Arc<Mutex<WindowState>>, generation: u64) {
    let mut state = shared.lock();

    // A newer task was armed while this one waited for the lock.
    if state.closed || state.generation != generation {
        return;
    }

    // This task is finishing, so its handle is dropped rather than aborted.
    state.expiry = None;
    state.prune(Instant::now());
    arm_expiry(shared, &mut state);
}
