//! Refresh scheduler
//!
//! The scheduler decides when to publish and what to publish:
//! - Discovering the current address via an [`AddressResolver`]
//! - Comparing it against the [`RefreshState`]
//! - Publishing to every [`DnsProvider`] when the address changed or the
//!   forced refresh interval elapsed
//! - Advancing the state after every publish attempt
//!
//! ## Architecture
//!
//! ```text
//!   interval tick
//!        │
//!        ▼
//! ┌──────────────────┐   discover()   ┌──────────────────┐
//! │ RefreshScheduler │──────────────▶│ AddressResolver  │
//! └──────────────────┘                └──────────────────┘
//!        │ decide(state, address, now)
//!        ▼
//! ┌──────────────────┐   publish()    ┌──────────────────┐
//! │  RefreshState    │   (each)      │  DnsProvider(s)  │
//! │  (&mut, owned by │──────────────▶│                  │
//! │   the run loop)  │                └──────────────────┘
//! └──────────────────┘
//! ```
//!
//! ## Tick Flow
//!
//! 1. Discover; on failure log and return, state untouched
//! 2. `forced = now - last_refresh_time >= forced_refresh_interval`
//! 3. `changed = discovered != last_address`
//! 4. Neither: return, no provider call
//! 5. Publish to each provider in order; failures are logged, never propagated
//! 6. Record `discovered` and `now` in the state, whatever the publish results

use crate::address::Address;
use crate::config::SchedulerConfig;
use crate::error::{Error, Result};
use crate::state::RefreshState;
use crate::traits::{AddressResolver, DnsProvider};
use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace, warn};

/// Events emitted by the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// Run loop started
    Started {
        resolver: &'static str,
        providers_count: usize,
    },

    /// Discovery succeeded
    AddressDiscovered { address: Address },

    /// Discovery failed; the tick was skipped
    DiscoveryFailed { error: String },

    /// Address unchanged and not stale; nothing published
    RefreshSkipped { address: Address },

    /// A refresh is about to be published
    RefreshTriggered {
        address: Address,
        forced: bool,
        changed: bool,
    },

    /// One provider accepted the address
    PublishSucceeded {
        provider: &'static str,
        address: Address,
        response: String,
    },

    /// One provider failed
    PublishFailed {
        provider: &'static str,
        address: Address,
        error: String,
    },

    /// State now records this address and time
    StateAdvanced {
        address: Address,
        refreshed_at: DateTime<Utc>,
    },

    /// Run loop stopped
    Stopped { reason: String },
}

/// Outcome of comparing a discovered address with the refresh state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshDecision {
    /// Whether providers should be called this tick
    pub should_publish: bool,
    /// The forced refresh interval has elapsed
    pub forced: bool,
    /// The address differs from the last published one
    pub changed: bool,
}

impl RefreshDecision {
    /// Compare `address` against `state` at time `now`
    ///
    /// `forced` is inclusive: a tick landing exactly on the interval forces.
    pub fn evaluate(
        state: &RefreshState,
        address: &Address,
        now: DateTime<Utc>,
        forced_refresh_interval: TimeDelta,
    ) -> Self {
        let forced = state.elapsed_since_refresh(now) >= forced_refresh_interval;
        let changed = state.last_address() != Some(address);

        Self {
            should_publish: forced || changed,
            forced,
            changed,
        }
    }
}

/// Periodic refresh scheduler
///
/// ## Lifecycle
///
/// 1. Create with [`RefreshScheduler::new()`]
/// 2. Start with [`RefreshScheduler::run()`]; the first tick fires immediately
/// 3. Runs until a shutdown signal is received
///
/// ## Threading
///
/// Ticks are processed serially on the calling task. The run loop owns the
/// [`RefreshState`] and lends it to each tick, so no locking is involved.
pub struct RefreshScheduler {
    /// Address discovery strategy
    resolver: Box<dyn AddressResolver>,

    /// Providers to publish to, in order
    providers: Vec<Box<dyn DnsProvider>>,

    /// Tick period
    refresh_interval: Duration,

    /// Maximum time between publishes
    forced_refresh_interval: TimeDelta,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<SchedulerEvent>,
}

impl RefreshScheduler {
    /// Create a new scheduler
    ///
    /// # Returns
    ///
    /// A tuple of (scheduler, event_receiver) where event_receiver yields scheduler events
    pub fn new(
        resolver: Box<dyn AddressResolver>,
        providers: Vec<Box<dyn DnsProvider>>,
        config: &SchedulerConfig,
    ) -> Result<(Self, mpsc::Receiver<SchedulerEvent>)> {
        if providers.is_empty() {
            return Err(Error::config(
                "at least one dyn dns provider has to be configured",
            ));
        }
        config.validate()?;

        let forced_refresh_interval = TimeDelta::from_std(config.forced_refresh_interval())
            .map_err(|_| Error::config("forced refresh interval is out of range"))?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let scheduler = Self {
            resolver,
            providers,
            refresh_interval: config.refresh_interval(),
            forced_refresh_interval,
            event_tx: tx,
        };

        Ok((scheduler, rx))
    }

    /// Run the scheduler until SIGINT
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: The shutdown signal handler could not be installed
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the scheduler until `shutdown_rx` fires (or its sender is dropped)
    ///
    /// Used by the daemon, which listens for SIGTERM as well as SIGINT, and by
    /// embedders and tests that need a controlled stop. `None` falls back to
    /// SIGINT, like [`RefreshScheduler::run()`].
    pub async fn run_with_shutdown(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.emit_event(SchedulerEvent::Started {
            resolver: self.resolver.strategy_name(),
            providers_count: self.providers.len(),
        });
        info!(
            "Refreshing every {:?} (forced every {}s) via {} resolver to {} provider(s)",
            self.refresh_interval,
            self.forced_refresh_interval.num_seconds(),
            self.resolver.strategy_name(),
            self.providers.len()
        );

        let shutdown = async {
            match shutdown_rx {
                Some(rx) => {
                    // A dropped sender counts as a shutdown request
                    let _ = rx.await;
                    Ok(())
                }
                None => tokio::signal::ctrl_c().await,
            }
        };
        tokio::pin!(shutdown);

        let mut state = RefreshState::new();

        // The first tick completes immediately
        let mut ticker = tokio::time::interval(self.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                signal = &mut shutdown => {
                    if let Err(e) = signal {
                        error!("Failed to listen for shutdown signal: {}", e);
                        self.emit_event(SchedulerEvent::Stopped {
                            reason: format!("Signal handler error: {}", e),
                        });
                        return Err(Error::Io(e));
                    }
                    info!("Shutdown signal received");
                    self.emit_event(SchedulerEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }

                // An in-flight tick is dropped at its next await point on shutdown
                _ = async {
                    ticker.tick().await;
                    self.on_tick(&mut state).await;
                } => {}
            }
        }

        info!("Scheduler stopped");
        Ok(())
    }

    /// Process one tick at the current wall-clock time
    pub async fn on_tick(&self, state: &mut RefreshState) {
        self.on_tick_at(state, Utc::now()).await
    }

    /// Process one tick as if it happened at `now`
    ///
    /// Never fails: discovery and publish errors end at this boundary as log
    /// lines and events.
    pub async fn on_tick_at(&self, state: &mut RefreshState, now: DateTime<Utc>) {
        let address = match self.resolver.discover().await {
            Ok(address) => address,
            Err(e) => {
                let e = Error::from(e);
                warn!("Error while getting public address: {}", e);
                self.emit_event(SchedulerEvent::DiscoveryFailed {
                    error: e.to_string(),
                });
                return;
            }
        };
        debug!("Discovered address {} via {}", address, self.resolver.strategy_name());
        self.emit_event(SchedulerEvent::AddressDiscovered { address });

        let decision = self.decide(state, &address, now);
        if !decision.should_publish {
            debug!("Address unchanged: {}", address);
            self.emit_event(SchedulerEvent::RefreshSkipped { address });
            return;
        }

        info!(
            "Refreshing {} (changed: {}, forced: {}, previous: {})",
            address,
            decision.changed,
            decision.forced,
            state
                .last_address()
                .map(|a| a.to_string())
                .unwrap_or_else(|| "none".to_string())
        );
        self.emit_event(SchedulerEvent::RefreshTriggered {
            address,
            forced: decision.forced,
            changed: decision.changed,
        });

        let succeeded = self.publish_all(&address).await;
        if succeeded < self.providers.len() {
            warn!(
                "{} of {} provider(s) failed to publish {}",
                self.providers.len() - succeeded,
                self.providers.len(),
                address
            );
        }

        // Advance even if every provider failed; the forced interval bounds
        // how long a failed publish goes unretried.
        state.record_publish(address, now);
        self.emit_event(SchedulerEvent::StateAdvanced {
            address,
            refreshed_at: state.last_refresh_time(),
        });
    }

    /// Decide whether `address` must be published at `now`
    pub fn decide(&self, state: &RefreshState, address: &Address, now: DateTime<Utc>) -> RefreshDecision {
        RefreshDecision::evaluate(state, address, now, self.forced_refresh_interval)
    }

    /// Publish to every provider in order
    ///
    /// Returns how many providers accepted the address.
    async fn publish_all(&self, address: &Address) -> usize {
        let mut succeeded = 0;

        for provider in &self.providers {
            let name = provider.provider_name();
            match provider.publish(address).await {
                Ok(response) => {
                    info!("Refreshed {}: {} {}", name, response.body, address);
                    self.emit_event(SchedulerEvent::PublishSucceeded {
                        provider: name,
                        address: *address,
                        response: response.body,
                    });
                    succeeded += 1;
                }
                Err(e) => {
                    let e = Error::publish(name, e);
                    error!("Error while updating {}: {}", address, e);
                    self.emit_event(SchedulerEvent::PublishFailed {
                        provider: name,
                        address: *address,
                        error: e.to_string(),
                    });
                }
            }
        }

        succeeded
    }

    /// Emit a scheduler event
    fn emit_event(&self, event: SchedulerEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                trace!("Event receiver dropped, discarding event");
            }
        }
    }
}
