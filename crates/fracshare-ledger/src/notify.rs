//! Outbound user alerts.
//!
//! Alerts are fire-and-forget: they are emitted after the transaction that
//! caused them has committed, and a sink failure never reaches the caller.

use fracshare_types::Alert;

pub trait NotificationSink: Send + Sync {
    fn notify(&self, alert: Alert);
}

/// Writes alerts to the log. Default sink of the node binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, alert: Alert) {
        tracing::info!(
            user = %alert.user_id,
            alert_type = %alert.alert_type,
            property = %alert.property_id,
            title = %alert.title,
            "Alert"
        );
    }
}

/// Keeps every alert for later inspection.
#[cfg(any(test, feature = "test-helpers"))]
#[derive(Debug, Default)]
pub struct RecordingSink {
    alerts: std::sync::Mutex<Vec<Alert>>,
}

#[cfg(any(test, feature = "test-helpers"))]
impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Alerts of one type sent to one user.
    pub fn count(&self, user: fracshare_types::UserId, alert_type: fracshare_types::AlertType) -> usize {
        self.alerts()
            .iter()
            .filter(|a| a.user_id == user && a.alert_type == alert_type)
            .count()
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl NotificationSink for RecordingSink {
    fn notify(&self, alert: Alert) {
        self.alerts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(alert);
    }
}
