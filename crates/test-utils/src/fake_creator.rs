//! Fake `CreateResource` implementations.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kubedag::errors::CreationError;
use kubedag::exec::{CreateFuture, CreateResource};
use kubedag::source::ResourceDefinition;

/// A fake creator that:
/// - records every key it was asked to create (once per attempt)
/// - fails for chosen keys, or only for their first N attempts
/// - panics for chosen keys
/// - optionally sleeps before answering
#[derive(Debug, Default, Clone)]
pub struct FakeCreator {
    fail: HashSet<String>,
    fail_first: HashMap<String, u32>,
    panic_on: HashSet<String>,
    delay: Duration,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeCreator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every attempt to create `key` fails.
    pub fn failing(mut self, key: &str) -> Self {
        self.fail.insert(key.to_string());
        self
    }

    /// The first `times` attempts to create `key` fail, later ones succeed.
    pub fn failing_first(mut self, key: &str, times: u32) -> Self {
        self.fail_first.insert(key.to_string(), times);
        self
    }

    pub fn panicking(mut self, key: &str) -> Self {
        self.panic_on.insert(key.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Keys in the order their creation was called.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn attempts_for(&self, key: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|k| *k == key).count()
    }
}

impl CreateResource for FakeCreator {
    fn create<'a>(&'a self, resource: &'a ResourceDefinition) -> CreateFuture<'a> {
        Box::pin(async move {
            let key = resource.key();
            let attempt = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(key.clone());
                calls.iter().filter(|k| **k == key).count() as u32
            };

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            if self.panic_on.contains(&key) {
                panic!("fake creator panicked for {key}");
            }
            if self.fail.contains(&key) {
                return Err(CreationError::new(key, "fake failure"));
            }
            if let Some(&times) = self.fail_first.get(&key) {
                if attempt <= times {
                    return Err(CreationError::new(key, format!("fake failure on attempt {attempt}")));
                }
            }
            Ok(())
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreationEvent {
    Started(String),
    Finished(String),
}

/// Succeeds for every resource after a per-key (or default) delay, while
/// recording start/finish events and the peak number of concurrent creations.
#[derive(Debug, Clone)]
pub struct RecordingCreator {
    default_delay: Duration,
    delays: HashMap<String, Duration>,
    events: Arc<Mutex<Vec<CreationEvent>>>,
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl RecordingCreator {
    pub fn new(default_delay: Duration) -> Self {
        Self {
            default_delay,
            delays: HashMap::new(),
            events: Arc::new(Mutex::new(Vec::new())),
            current: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay_for(mut self, key: &str, delay: Duration) -> Self {
        self.delays.insert(key.to_string(), delay);
        self
    }

    pub fn events(&self) -> Vec<CreationEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Position of the `Started` event for `key`.
    pub fn started_at(&self, key: &str) -> Option<usize> {
        self.position(&CreationEvent::Started(key.to_string()))
    }

    /// Position of the `Finished` event for `key`.
    pub fn finished_at(&self, key: &str) -> Option<usize> {
        self.position(&CreationEvent::Finished(key.to_string()))
    }

    pub fn started_keys(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                CreationEvent::Started(k) => Some(k),
                CreationEvent::Finished(_) => None,
            })
            .collect()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn position(&self, event: &CreationEvent) -> Option<usize> {
        self.events.lock().unwrap().iter().position(|e| e == event)
    }
}

impl CreateResource for RecordingCreator {
    fn create<'a>(&'a self, resource: &'a ResourceDefinition) -> CreateFuture<'a> {
        Box::pin(async move {
            let key = resource.key();
            let delay = self.delays.get(&key).copied().unwrap_or(self.default_delay);

            self.events
                .lock()
                .unwrap()
                .push(CreationEvent::Started(key.clone()));
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(delay).await;

            self.current.fetch_sub(1, Ordering::SeqCst);
            self.events.lock().unwrap().push(CreationEvent::Finished(key));
            Ok(())
        })
    }
}
