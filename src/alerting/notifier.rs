//! Notification sender
//!
//! Wraps the external transport. The alert manager only advances its
//! dedup timestamps when `send` reports `SendOutcome::Delivered`.

use super::alert::Alert;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Delivers a formatted message to the configured destination
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertTransport: Send + Sync {
    async fn send_message(&self, text: &str) -> Result<()>;
}

/// Result of a send attempt that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    /// Notifications are switched off; nothing was sent
    Disabled,
}

#[derive(Clone)]
pub struct Notifier {
    transport: Option<Arc<dyn AlertTransport>>,
}

impl Notifier {
    pub fn new(transport: Arc<dyn AlertTransport>) -> Self {
        Self {
            transport: Some(transport),
        }
    }

    /// A notifier that logs alerts but never delivers them
    pub fn disabled() -> Self {
        Self { transport: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    /// Render and deliver an alert
    pub async fn send(&self, alert: &Alert) -> Result<SendOutcome> {
        let Some(transport) = &self.transport else {
            debug!("Notifications disabled, dropping {} alert", alert.kind());
            return Ok(SendOutcome::Disabled);
        };

        let message = alert.render();
        transport.send_message(&message).await?;

        info!("Alerted {} via notification channel", alert.kind());
        Ok(SendOutcome::Delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ForkwatchError;
    use mockall::predicate::*;

    #[tokio::test]
    async fn test_send_renders_message() {
        let mut transport = MockAlertTransport::new();
        transport
            .expect_send_message()
            .with(function(|text: &str| text.contains("Offline nodes")))
            .times(1)
            .returning(|_| Ok(()));

        let notifier = Notifier::new(Arc::new(transport));
        let outcome = notifier
            .send(&Alert::Offline {
                not_connected: vec![],
            })
            .await
            .unwrap();
        assert_eq!(outcome, SendOutcome::Delivered);
    }

    #[tokio::test]
    async fn test_send_propagates_transport_error() {
        let mut transport = MockAlertTransport::new();
        transport
            .expect_send_message()
            .returning(|_| Err(ForkwatchError::Notification("HTTP 502".to_string())));

        let notifier = Notifier::new(Arc::new(transport));
        let result = notifier
            .send(&Alert::Offline {
                not_connected: vec![],
            })
            .await;
        assert!(matches!(result, Err(ForkwatchError::Notification(_))));
    }

    #[tokio::test]
    async fn test_disabled_notifier_skips_delivery() {
        let notifier = Notifier::disabled();
        assert!(!notifier.is_enabled());
        let outcome = notifier
            .send(&Alert::Offline {
                not_connected: vec![],
            })
            .await
            .unwrap();
        assert_eq!(outcome, SendOutcome::Disabled);
    }
}
