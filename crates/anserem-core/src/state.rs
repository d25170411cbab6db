// # Refresh State
//
// What the agent last told its providers, and when.
//
// ## Ownership
//
// One instance per process, owned by the scheduler's run loop and handed to
// each tick by `&mut`. Nothing else reads or writes it, so it carries no
// lock. It is never persisted: a restart begins with an empty state and
// therefore publishes on its first successful discovery.

use chrono::{DateTime, TimeDelta, Utc};

use crate::address::Address;

/// Last published address and refresh time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshState {
    last_address: Option<Address>,
    last_refresh_time: DateTime<Utc>,
}

impl RefreshState {
    /// Empty state: no address, refreshed at the Unix epoch
    pub fn new() -> Self {
        Self {
            last_address: None,
            last_refresh_time: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    /// The most recently published address
    pub fn last_address(&self) -> Option<&Address> {
        self.last_address.as_ref()
    }

    /// When the last publish attempt happened
    pub fn last_refresh_time(&self) -> DateTime<Utc> {
        self.last_refresh_time
    }

    /// Time elapsed since the last publish attempt
    ///
    /// Negative if `now` lies before the recorded refresh time.
    pub fn elapsed_since_refresh(&self, now: DateTime<Utc>) -> TimeDelta {
        now.signed_duration_since(self.last_refresh_time)
    }

    /// Record a publish attempt
    ///
    /// The refresh time never moves backwards: an earlier `now` (clock step)
    /// keeps the previous timestamp.
    pub(crate) fn record_publish(&mut self, address: Address, now: DateTime<Utc>) {
        self.last_address = Some(address);
        if now > self.last_refresh_time {
            self.last_refresh_time = now;
        }
    }
}

impl Default for RefreshState {
    fn default() -> Self {
        Self::new()
    }
}
