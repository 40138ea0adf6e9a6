// libs/notification-cell/src/services/sender.rs
use reqwest::Client;
use tracing::{debug, warn};

use shared_config::AppConfig;

use crate::models::NotificationEvent;

pub struct NotificationService {
    client: Client,
    webhook_url: String,
}

impl NotificationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            webhook_url: config.notification_webhook_url.clone(),
        }
    }

    /// Forward an event to the notification collaborator. Failures are
    /// logged and swallowed; callers must never gate state changes on
    /// delivery.
    pub async fn notify(&self, event: NotificationEvent) {
        if self.webhook_url.is_empty() {
            debug!("Notification webhook not configured, dropping event: {:?}", event);
            return;
        }

        let result = self
            .client
            .post(&self.webhook_url)
            .json(&event)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!("Notification delivered: {:?}", event);
            }
            Ok(response) => {
                warn!(
                    "Notification endpoint returned {} for event {:?}",
                    response.status(),
                    event
                );
            }
            Err(e) => {
                warn!("Failed to deliver notification {:?}: {}", event, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_with_webhook(url: &str) -> AppConfig {
        AppConfig {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            payment_gateway_url: String::new(),
            payment_key_id: String::new(),
            payment_key_secret: String::new(),
            payment_currency: "INR".to_string(),
            notification_webhook_url: url.to_string(),
        }
    }

    #[tokio::test]
    async fn delivery_failure_is_swallowed() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let service = NotificationService::new(&config_with_webhook(&mock_server.uri()));
        // Must not panic or error out.
        service
            .notify(NotificationEvent::AppointmentBooked {
                appointment_id: Uuid::new_v4(),
                recipient: Uuid::new_v4(),
            })
            .await;
    }

    #[tokio::test]
    async fn unconfigured_webhook_is_a_no_op() {
        let service = NotificationService::new(&config_with_webhook(""));
        service
            .notify(NotificationEvent::PaymentNeedsReconciliation {
                appointment_id: Uuid::new_v4(),
                order_id: "order_1".to_string(),
            })
            .await;
    }
}
