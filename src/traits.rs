//! Abstractions for time and side effects to enable testing.
//!
//! This module provides traits for:
//! - `Clock`: Abstracting time access for deterministic testing
//! - `Notifier`: Forwarding user-facing notifications outside the view state

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::store::Severity;

// ==================== Clock Trait ====================

/// Trait for abstracting time access.
pub trait Clock: Send + Sync {
    /// Get the current time in UTC.
    fn now_utc(&self) -> DateTime<Utc>;
}

/// System clock implementation using real time.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock clock for testing with controllable time.
#[derive(Debug, Clone)]
pub struct MockClock {
    utc_time: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    /// Create a new mock clock set to the given UTC time.
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            utc_time: Arc::new(Mutex::new(time)),
        }
    }

    /// Set the mock clock to a new time.
    pub fn set_time(&self, time: DateTime<Utc>) {
        *lock(&self.utc_time) = time;
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: chrono::Duration) {
        let mut time = lock(&self.utc_time);
        *time += duration;
    }
}

impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *lock(&self.utc_time)
    }
}

// ==================== Notifier Trait ====================

/// Receives every notification the monitor raises.
pub trait Notifier: Send + Sync {
    fn notify(&self, severity: Severity, message: &str) -> Result<()>;
}

/// Notifier that only logs.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, severity: Severity, message: &str) -> Result<()> {
        match severity {
            Severity::Error => tracing::error!("{}", message),
            Severity::Warning => tracing::warn!("{}", message),
            Severity::Info | Severity::Success => tracing::info!("{}", message),
        }
        Ok(())
    }
}

/// Desktop notifications via notify-rust, on top of logging.
#[cfg(feature = "desktop")]
#[derive(Debug, Clone, Default)]
pub struct SystemNotifier;

#[cfg(feature = "desktop")]
impl Notifier for SystemNotifier {
    fn notify(&self, severity: Severity, message: &str) -> Result<()> {
        LogNotifier.notify(severity, message)?;
        notify_rust::Notification::new()
            .summary(&format!("IDM Monitor ({severity})"))
            .body(message)
            .appname("IDM Monitor")
            .show()?;
        Ok(())
    }
}

/// Mock notifier for testing that records all notifications.
#[derive(Debug, Clone, Default)]
pub struct MockNotifier {
    notifications: Arc<Mutex<Vec<(Severity, String)>>>,
}

impl MockNotifier {
    /// Create a new mock notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all notifications that have been sent.
    pub fn get_notifications(&self) -> Vec<(Severity, String)> {
        lock(&self.notifications).clone()
    }

    /// Get the count of notifications sent.
    pub fn notification_count(&self) -> usize {
        lock(&self.notifications).len()
    }

    /// Clear all recorded notifications.
    pub fn clear(&self) {
        lock(&self.notifications).clear();
    }

    /// Check if any notification was sent.
    pub fn was_called(&self) -> bool {
        !lock(&self.notifications).is_empty()
    }
}

impl Notifier for MockNotifier {
    fn notify(&self, severity: Severity, message: &str) -> Result<()> {
        lock(&self.notifications).push((severity, message.to_string()));
        Ok(())
    }
}
