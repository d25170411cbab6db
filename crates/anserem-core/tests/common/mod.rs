//! Test doubles and common utilities for scheduler contract tests

#![allow(dead_code)]

use anserem_core::config::SchedulerConfig;
use anserem_core::error::{PublishError, ResolveError};
use anserem_core::traits::{AddressResolver, DnsProvider, PublishResponse};
use anserem_core::{Address, RefreshScheduler, SchedulerEvent};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// A resolver that replays a script of results, then repeats the last one
#[derive(Clone)]
pub struct ScriptedResolver {
    script: Arc<Mutex<VecDeque<Result<Address, ResolveError>>>>,
    last: Arc<Mutex<Option<Result<Address, ResolveError>>>>,
    discover_call_count: Arc<AtomicUsize>,
}

impl ScriptedResolver {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            last: Arc::new(Mutex::new(None)),
            discover_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Always discover `address`
    pub fn fixed(address: &str) -> Self {
        let resolver = Self::new();
        resolver.push_ok(address);
        resolver
    }

    pub fn push_ok(&self, address: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Ok(address.parse().expect("valid test address")));
    }

    pub fn push_err(&self, error: ResolveError) {
        self.script.lock().unwrap().push_back(Err(error));
    }

    /// Get the number of times discover() was called
    pub fn discover_call_count(&self) -> usize {
        self.discover_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AddressResolver for ScriptedResolver {
    async fn discover(&self) -> Result<Address, ResolveError> {
        self.discover_call_count.fetch_add(1, Ordering::SeqCst);

        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            *last = Some(next);
        }
        last.clone()
            .unwrap_or_else(|| Err(ResolveError::network("script is empty")))
    }

    fn strategy_name(&self) -> &'static str {
        "scripted"
    }
}

/// A resolver whose discover() never completes
pub struct HangingResolver;

#[async_trait::async_trait]
impl AddressResolver for HangingResolver {
    async fn discover(&self) -> Result<Address, ResolveError> {
        std::future::pending().await
    }

    fn strategy_name(&self) -> &'static str {
        "hanging"
    }
}

/// A provider that records every publish and can be told to fail
#[derive(Clone)]
pub struct RecordingProvider {
    name: &'static str,
    published: Arc<Mutex<Vec<Address>>>,
    publish_call_count: Arc<AtomicUsize>,
    fail_with: Arc<Mutex<Option<PublishError>>>,
    journal: Option<Arc<Mutex<Vec<&'static str>>>>,
}

impl RecordingProvider {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            published: Arc::new(Mutex::new(Vec::new())),
            publish_call_count: Arc::new(AtomicUsize::new(0)),
            fail_with: Arc::new(Mutex::new(None)),
            journal: None,
        }
    }

    /// A provider that always fails with `error`
    pub fn failing(name: &'static str, error: PublishError) -> Self {
        let provider = Self::new(name);
        *provider.fail_with.lock().unwrap() = Some(error);
        provider
    }

    /// Append this provider's name to `journal` on every call
    pub fn with_journal(mut self, journal: Arc<Mutex<Vec<&'static str>>>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Get the number of times publish() was called
    pub fn publish_call_count(&self) -> usize {
        self.publish_call_count.load(Ordering::SeqCst)
    }

    /// Addresses passed to publish(), in order
    pub fn published(&self) -> Vec<Address> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl DnsProvider for RecordingProvider {
    async fn publish(&self, address: &Address) -> Result<PublishResponse, PublishError> {
        self.publish_call_count.fetch_add(1, Ordering::SeqCst);
        self.published.lock().unwrap().push(*address);
        if let Some(journal) = &self.journal {
            journal.lock().unwrap().push(self.name);
        }

        match self.fail_with.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(PublishResponse::new(200, "addresses updated")),
        }
    }

    fn provider_name(&self) -> &'static str {
        self.name
    }
}

/// Scheduler config with the given intervals (in seconds)
pub fn scheduler_config(refresh_secs: u64, forced_secs: u64) -> SchedulerConfig {
    SchedulerConfig {
        refresh_interval_secs: refresh_secs,
        forced_refresh_interval_secs: forced_secs,
        request_timeout_secs: 5,
        event_channel_capacity: 100,
    }
}

/// Build a scheduler over test doubles
pub fn scheduler(
    resolver: impl AddressResolver + 'static,
    providers: Vec<RecordingProvider>,
    refresh_secs: u64,
    forced_secs: u64,
) -> (RefreshScheduler, mpsc::Receiver<SchedulerEvent>) {
    let providers: Vec<Box<dyn DnsProvider>> = providers
        .into_iter()
        .map(|p| Box::new(p) as Box<dyn DnsProvider>)
        .collect();

    RefreshScheduler::new(
        Box::new(resolver),
        providers,
        &scheduler_config(refresh_secs, forced_secs),
    )
    .expect("scheduler construction succeeds")
}

/// A fixed point in time, `secs` after the test origin
pub fn at(secs: i64) -> DateTime<Utc> {
    let origin = DateTime::<Utc>::UNIX_EPOCH + TimeDelta::days(20_000);
    origin + TimeDelta::seconds(secs)
}

pub fn addr(s: &str) -> Address {
    s.parse().expect("valid test address")
}

/// Drain every event currently buffered in the receiver
pub fn drain(rx: &mut mpsc::Receiver<SchedulerEvent>) -> Vec<SchedulerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
