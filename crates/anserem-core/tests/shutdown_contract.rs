//! Contract Test: Run Loop & Shutdown
//!
//! Verifies the run loop's lifecycle.
//!
//! Constraints verified:
//! - The first tick fires immediately at startup
//! - The loop stops cleanly on the shutdown signal, or when its sender is dropped
//! - Shutdown is prompt even while a tick is stuck on the network
//! - A scheduler cannot be built without providers

mod common;

use anserem_core::traits::DnsProvider;
use anserem_core::{Error, RefreshScheduler, SchedulerEvent};
use common::*;
use std::time::Duration;

/// Wait for the first event matching `pred`, failing after one second
async fn wait_for(
    events: &mut tokio::sync::mpsc::Receiver<SchedulerEvent>,
    pred: impl Fn(&SchedulerEvent) -> bool,
) -> SchedulerEvent {
    tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            let event = events.recv().await.expect("event channel open");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event arrives in time")
}

#[tokio::test]
async fn first_tick_fires_immediately() {
    let provider = RecordingProvider::new("dynv6");
    // An hour between ticks: only the startup tick can run within the test
    let (scheduler, mut events) = scheduler(
        ScriptedResolver::fixed("2001:db8::1"),
        vec![provider.clone()],
        3600,
        3600,
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let handle = tokio::spawn(async move { scheduler.run_with_shutdown(Some(shutdown_rx)).await });

    let started = wait_for(&mut events, |e| matches!(e, SchedulerEvent::Started { .. })).await;
    assert_eq!(
        started,
        SchedulerEvent::Started {
            resolver: "scripted",
            providers_count: 1,
        }
    );
    wait_for(&mut events, |e| matches!(e, SchedulerEvent::StateAdvanced { .. })).await;

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();

    assert_eq!(provider.published(), vec![addr("2001:db8::1")]);
}

#[tokio::test]
async fn shutdown_emits_stopped_event() {
    let resolver = ScriptedResolver::fixed("2001:db8::1");
    let (scheduler, mut events) = scheduler(
        resolver.clone(),
        vec![RecordingProvider::new("dynv6")],
        3600,
        3600,
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let handle = tokio::spawn(async move { scheduler.run_with_shutdown(Some(shutdown_rx)).await });

    wait_for(&mut events, |e| matches!(e, SchedulerEvent::StateAdvanced { .. })).await;
    shutdown_tx.send(()).unwrap();

    let stopped = wait_for(&mut events, |e| matches!(e, SchedulerEvent::Stopped { .. })).await;
    assert_eq!(
        stopped,
        SchedulerEvent::Stopped {
            reason: "Shutdown signal".to_string(),
        }
    );
    assert!(handle.await.unwrap().is_ok());
    assert_eq!(resolver.discover_call_count(), 1);
}

#[tokio::test]
async fn dropped_shutdown_sender_stops_the_loop() {
    let (scheduler, _events) = scheduler(
        ScriptedResolver::fixed("2001:db8::1"),
        vec![RecordingProvider::new("dynv6")],
        3600,
        3600,
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    drop(shutdown_tx);

    let result = tokio::time::timeout(
        Duration::from_secs(1),
        scheduler.run_with_shutdown(Some(shutdown_rx)),
    )
    .await
    .expect("loop exits promptly");
    assert!(result.is_ok());
}

#[tokio::test]
async fn shutdown_is_prompt_during_a_stuck_tick() {
    let provider = RecordingProvider::new("dynv6");
    let (scheduler, mut events) = scheduler(HangingResolver, vec![provider.clone()], 3600, 3600);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let handle = tokio::spawn(async move { scheduler.run_with_shutdown(Some(shutdown_rx)).await });

    wait_for(&mut events, |e| matches!(e, SchedulerEvent::Started { .. })).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown_tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("loop exits promptly")
        .expect("scheduler task completes");
    assert!(result.is_ok());
    assert_eq!(provider.publish_call_count(), 0);
}

#[test]
fn scheduler_requires_a_provider() {
    let providers: Vec<Box<dyn DnsProvider>> = Vec::new();
    let result = RefreshScheduler::new(
        Box::new(ScriptedResolver::fixed("2001:db8::1")),
        providers,
        &scheduler_config(60, 3600),
    );
    assert!(matches!(result, Err(Error::Config(_))));
}
