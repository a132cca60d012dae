// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Scripted providers and sources for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::{AdvertProvider, AdvertSource, Advertisement, Error, ProviderError, Result};

/// The advertisement every fake answers with for `id`.
pub(crate) fn advert(id: &str) -> Advertisement {
    Advertisement::new(id, format!("Advertisement #{id}"))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    Found,
    Empty,
    Fail,
}

/// A provider that plays back a script of outcomes and then repeats a fallback.
///
/// Clones share the script and the call counter, so a factory can hand out clones.
#[derive(Clone, Debug)]
pub(crate) struct FakeProvider {
    script: Arc<Mutex<VecDeque<Outcome>>>,
    fallback: Outcome,
    calls: Arc<AtomicUsize>,
}

impl FakeProvider {
    pub(crate) fn always(outcome: Outcome) -> Self {
        Self::scripted([], outcome)
    }

    pub(crate) fn scripted(script: impl IntoIterator<Item = Outcome>, fallback: Outcome) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            fallback,
            calls: Arc::default(),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AdvertProvider for FakeProvider {
    fn get_advert(&self, id: &str) -> std::result::Result<Option<Advertisement>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let outcome = self.script.lock().pop_front().unwrap_or(self.fallback);

        match outcome {
            Outcome::Found => Ok(Some(advert(id))),
            Outcome::Empty => Ok(None),
            Outcome::Fail => Err(ProviderError::new("provider unavailable")),
        }
    }
}

/// A source with a fixed set of answers that counts its calls.
#[derive(Clone, Debug, Default)]
pub(crate) struct FakeSource {
    adverts: Arc<HashMap<String, Advertisement>>,
    failure: Option<&'static str>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl FakeSource {
    pub(crate) fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn returning<'a>(adverts: impl IntoIterator<Item = (&'a str, Advertisement)>) -> Self {
        Self {
            adverts: Arc::new(adverts.into_iter().map(|(id, advert)| (id.to_owned(), advert)).collect()),
            ..Self::default()
        }
    }

    pub(crate) fn failing(message: &'static str) -> Self {
        Self {
            failure: Some(message),
            ..Self::default()
        }
    }

    pub(crate) fn with_delay(self, delay: Duration) -> Self {
        Self { delay, ..self }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl AdvertSource for FakeSource {
    async fn try_get(&self, id: &str) -> Result<Option<Advertisement>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let Some(message) = self.failure {
            return Err(Error::from_source(ProviderError::new(message)));
        }

        Ok(self.adverts.get(id).cloned())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
