// libs/payment-cell/src/services/gateway.rs
use reqwest::Client;
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::models::{GatewayOrder, GatewayOrderRequest, PaymentError};

/// Client for the payment gateway's order API. Only order creation is
/// outbound; callback verification never calls the gateway.
pub struct GatewayClient {
    client: Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl GatewayClient {
    pub fn new(config: &AppConfig) -> Result<Self, PaymentError> {
        if !config.is_payment_configured() {
            return Err(PaymentError::NotConfigured);
        }

        Ok(Self {
            client: Client::new(),
            base_url: config.payment_gateway_url.clone(),
            key_id: config.payment_key_id.clone(),
            key_secret: config.payment_key_secret.clone(),
        })
    }

    /// Create a gateway order for the given amount. The gateway issues
    /// the order id that keys the settlement record.
    pub async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, PaymentError> {
        info!("Creating gateway order for receipt {}", receipt);

        let url = format!("{}/v1/orders", self.base_url);
        let request_body = GatewayOrderRequest {
            amount: amount_minor,
            currency: currency.to_string(),
            receipt: receipt.to_string(),
        };

        debug!("Sending order creation request to: {}", url);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| PaymentError::GatewayError(e.to_string()))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| PaymentError::GatewayError(e.to_string()))?;

        if !status.is_success() {
            error!("Gateway order creation failed: {} - {}", status, response_text);
            return Err(PaymentError::GatewayError(format!(
                "HTTP {}: {}",
                status, response_text
            )));
        }

        let order: GatewayOrder = serde_json::from_str(&response_text).map_err(|e| {
            PaymentError::GatewayError(format!("Failed to parse order response: {}", e))
        })?;

        info!("Gateway order created: {}", order.id);
        Ok(order)
    }
}
