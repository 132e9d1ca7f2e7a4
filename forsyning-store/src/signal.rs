//! Payload-less update signals.
//!
//! Every entry has one named signal (`forsyning_update_{entry_id}`).
//! Notifying it bumps a version counter; subscribers wake up and re-read the
//! dataset themselves. Missed intermediate versions are coalesced.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::trace;

/// Signal name template; `{}` is the entry id.
pub const UPDATE_SIGNAL: &str = "forsyning_update_{}";

/// Returns the signal name for an entry.
pub fn signal_name(entry_id: &str) -> String {
    UPDATE_SIGNAL.replace("{}", entry_id)
}

// ============================================================================
// Update Signal
// ============================================================================

/// Handle to one named signal.
#[derive(Debug, Clone)]
pub struct UpdateSignal {
    name: Arc<str>,
    sender: watch::Sender<u64>,
}

impl UpdateSignal {
    /// Returns the signal name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wakes every subscriber. Returns the new version.
    pub fn notify(&self) -> u64 {
        let mut version = 0;
        self.sender.send_modify(|v| {
            *v += 1;
            version = *v;
        });
        trace!(signal = %self.name, version, "Update signal sent");
        version
    }

    /// Subscribes to the signal.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.sender.subscribe()
    }

    /// Current version (number of notifications so far).
    pub fn version(&self) -> u64 {
        *self.sender.borrow()
    }
}

// ============================================================================
// Signal Hub
// ============================================================================

/// Registry of named update signals.
///
/// Cloning the hub shares the registry.
#[derive(Debug, Clone, Default)]
pub struct SignalHub {
    signals: Arc<Mutex<HashMap<String, UpdateSignal>>>,
}

impl SignalHub {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the signal for `entry_id`, creating it on first use.
    pub fn signal(&self, entry_id: &str) -> UpdateSignal {
        let name = signal_name(entry_id);
        let mut signals = self.signals.lock().unwrap_or_else(PoisonError::into_inner);
        signals
            .entry(name)
            .or_insert_with_key(|name| {
                let (sender, _) = watch::channel(0);
                UpdateSignal {
                    name: Arc::from(name.as_str()),
                    sender,
                }
            })
            .clone()
    }

    /// Subscribes to the signal for `entry_id`.
    pub fn subscribe(&self, entry_id: &str) -> watch::Receiver<u64> {
        self.signal(entry_id).subscribe()
    }

    /// Drops the signal for `entry_id`; existing receivers see the channel close
    /// once every handle is gone.
    pub fn remove(&self, entry_id: &str) -> bool {
        let mut signals = self.signals.lock().unwrap_or_else(PoisonError::into_inner);
        signals.remove(&signal_name(entry_id)).is_some()
    }

    /// Names of all registered signals.
    pub fn names(&self) -> Vec<String> {
        let signals = self.signals.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<_> = signals.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_name() {
        assert_eq!(signal_name("abc"), "forsyning_update_abc");
    }

    #[tokio::test]
    async fn test_subscriber_wakes_on_notify() {
        let hub = SignalHub::new();
        let mut rx = hub.subscribe("home");

        let signal = hub.signal("home");
        assert_eq!(signal.notify(), 1);

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 1);
    }

    #[test]
    fn test_same_entry_shares_channel() {
        let hub = SignalHub::new();
        let a = hub.signal("home");
        let b = hub.signal("home");
        a.notify();
        b.notify();
        assert_eq!(a.version(), 2);
        assert_eq!(hub.names(), vec!["forsyning_update_home".to_string()]);
    }

    #[test]
    fn test_entries_are_isolated() {
        let hub = SignalHub::new();
        let rx_other = hub.subscribe("cabin");
        hub.signal("home").notify();
        assert!(!rx_other.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_remove_closes_channel() {
        let hub = SignalHub::new();
        let mut rx = hub.subscribe("home");
        assert!(hub.remove("home"));
        assert!(!hub.remove("home"));
        assert!(rx.changed().await.is_err());
    }
}
