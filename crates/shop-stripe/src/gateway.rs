//! # Stripe Gateway
//!
//! [`PaymentGateway`] over the Stripe REST API: customers, payment method
//! attach/detach, and create-and-confirm payment intents. All requests are
//! form-encoded POSTs authenticated with the secret key.

use crate::config::StripeConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use shop_core::{
    PaymentGateway, PaymentIntent, PaymentIntentRequest, PaymentIntentStatus, PaymentMethodCard,
    ShopError, ShopResult,
};
use tracing::{debug, error, info, instrument};

const PROVIDER: &str = "stripe";

/// Stripe-backed payment gateway
pub struct StripeGateway {
    config: StripeConfig,
    client: Client,
}

impl StripeGateway {
    /// Create a gateway with its own HTTP client.
    pub fn new(config: StripeConfig) -> ShopResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                ShopError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> ShopResult<Self> {
        Self::new(StripeConfig::from_env()?)
    }

    /// POST form parameters to `path` and decode the JSON answer.
    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form_params: &[(&str, String)],
    ) -> ShopResult<T> {
        let url = format!("{}{}", self.config.api_base_url, path);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .form(form_params)
            .send()
            .await
            .map_err(|e| ShopError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ShopError::Network(e.to_string()))?;

        if !status.is_success() {
            error!("Stripe API error: path={}, status={}, body={}", path, status, body);

            let message = serde_json::from_str::<StripeErrorResponse>(&body)
                .map(|r| r.error.message)
                .unwrap_or_else(|_| format!("HTTP {}: {}", status, body));

            return Err(if status.is_client_error() {
                ShopError::ProviderRejected {
                    provider: PROVIDER.to_string(),
                    message,
                }
            } else {
                ShopError::ProviderError {
                    provider: PROVIDER.to_string(),
                    message,
                }
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            ShopError::Serialization(format!("Failed to parse Stripe response: {}", e))
        })
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self, email))]
    async fn create_customer(&self, email: &str) -> ShopResult<String> {
        let customer: StripeCustomer = self
            .post_form("/v1/customers", &[("email", email.to_string())])
            .await?;

        info!("Created Stripe customer: id={}", customer.id);
        Ok(customer.id)
    }

    #[instrument(skip(self))]
    async fn attach_payment_method(
        &self,
        payment_method_id: &str,
        customer_id: &str,
    ) -> ShopResult<PaymentMethodCard> {
        let path = format!("/v1/payment_methods/{}/attach", payment_method_id);
        let method: StripePaymentMethod = self
            .post_form(&path, &[("customer", customer_id.to_string())])
            .await?;

        let card = method.card.ok_or_else(|| ShopError::ProviderRejected {
            provider: PROVIDER.to_string(),
            message: format!("Payment method {} is not a card", method.id),
        })?;

        debug!(
            "Attached payment method: id={}, brand={}, last4={}",
            method.id, card.brand, card.last4
        );

        Ok(PaymentMethodCard {
            id: method.id,
            brand: card.brand,
            last4: card.last4,
            exp_month: card.exp_month,
            exp_year: card.exp_year,
        })
    }

    #[instrument(skip(self))]
    async fn detach_payment_method(&self, payment_method_id: &str) -> ShopResult<()> {
        let path = format!("/v1/payment_methods/{}/detach", payment_method_id);
        let method: StripePaymentMethod = self.post_form(&path, &[]).await?;

        debug!("Detached payment method: id={}", method.id);
        Ok(())
    }

    #[instrument(skip(self, request), fields(amount = request.amount_cents, currency = %request.currency))]
    async fn create_payment_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> ShopResult<PaymentIntent> {
        let type_keys: Vec<String> = (0..request.payment_method_types.len())
            .map(|i| format!("payment_method_types[{}]", i))
            .collect();

        let mut form_params: Vec<(&str, String)> = vec![
            ("amount", request.amount_cents.to_string()),
            ("currency", request.currency.as_str().to_string()),
            ("customer", request.customer_id.clone()),
            ("payment_method", request.payment_method_id.clone()),
            ("confirm", request.confirm.to_string()),
        ];
        for (key, kind) in type_keys.iter().zip(&request.payment_method_types) {
            form_params.push((key.as_str(), kind.clone()));
        }

        let intent: StripePaymentIntent = self.post_form("/v1/payment_intents", &form_params).await?;

        info!(
            "Created Stripe payment intent: id={}, status={}",
            intent.id,
            intent.status.as_str()
        );

        Ok(PaymentIntent {
            id: intent.id,
            status: intent.status,
            amount_cents: intent.amount,
        })
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripeCustomer {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripePaymentMethod {
    id: String,
    #[serde(default)]
    card: Option<StripeCard>,
}

#[derive(Debug, Deserialize)]
struct StripeCard {
    brand: String,
    last4: String,
    exp_month: i32,
    exp_year: i32,
}

#[derive(Debug, Deserialize)]
struct StripePaymentIntent {
    id: String,
    status: PaymentIntentStatus,
    amount: i64,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shop_core::Currency;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn gateway(server: &MockServer) -> StripeGateway {
        let config = StripeConfig::new("sk_test_abc123").with_api_base_url(server.uri());
        StripeGateway::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_create_customer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/customers"))
            .and(header("Authorization", "Bearer sk_test_abc123"))
            .and(header("Stripe-Version", "2024-12-18.acacia"))
            .and(body_string_contains("email=ana%40example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cus_123",
                "object": "customer",
                "email": "ana@example.com"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let customer_id = gateway(&server)
            .await
            .create_customer("ana@example.com")
            .await
            .unwrap();
        assert_eq!(customer_id, "cus_123");
    }

    #[tokio::test]
    async fn test_attach_returns_card_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_methods/pm_card_visa/attach"))
            .and(body_string_contains("customer=cus_123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "pm_1Q0",
                "object": "payment_method",
                "type": "card",
                "card": {
                    "brand": "visa",
                    "last4": "4242",
                    "exp_month": 12,
                    "exp_year": 2030,
                    "funding": "credit"
                },
                "customer": "cus_123"
            })))
            .mount(&server)
            .await;

        let card = gateway(&server)
            .await
            .attach_payment_method("pm_card_visa", "cus_123")
            .await
            .unwrap();

        assert_eq!(card.id, "pm_1Q0");
        assert_eq!(card.brand, "visa");
        assert_eq!(card.last4, "4242");
        assert_eq!((card.exp_month, card.exp_year), (12, 2030));
    }

    #[tokio::test]
    async fn test_rejected_token_maps_to_provider_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_methods/pm_bogus/attach"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "type": "invalid_request_error",
                    "code": "resource_missing",
                    "message": "No such PaymentMethod: 'pm_bogus'"
                }
            })))
            .mount(&server)
            .await;

        let err = gateway(&server)
            .await
            .attach_payment_method("pm_bogus", "cus_123")
            .await
            .unwrap_err();

        match err {
            ShopError::ProviderRejected { provider, message } => {
                assert_eq!(provider, "stripe");
                assert!(message.contains("pm_bogus"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_detach() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_methods/pm_1Q0/detach"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "pm_1Q0",
                "object": "payment_method",
                "customer": null
            })))
            .expect(1)
            .mount(&server)
            .await;

        gateway(&server)
            .await
            .detach_payment_method("pm_1Q0")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_payment_intent_form_and_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .and(body_string_contains("amount=2200"))
            .and(body_string_contains("currency=cad"))
            .and(body_string_contains("customer=cus_123"))
            .and(body_string_contains("payment_method=pm_1Q0"))
            .and(body_string_contains("confirm=true"))
            .and(body_string_contains("payment_method_types%5B0%5D=card"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "pi_3Q0",
                "object": "payment_intent",
                "amount": 2200,
                "currency": "cad",
                "status": "succeeded"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request = PaymentIntentRequest::card(2200, Currency::CAD, "cus_123", "pm_1Q0");
        let intent = gateway(&server)
            .await
            .create_payment_intent(&request)
            .await
            .unwrap();

        assert_eq!(intent.id, "pi_3Q0");
        assert_eq!(intent.amount_cents, 2200);
        assert!(intent.status.is_confirmed());
    }

    #[tokio::test]
    async fn test_decline_and_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .and(body_string_contains("amount=100"))
            .respond_with(ResponseTemplate::new(402).set_body_json(json!({
                "error": {
                    "type": "card_error",
                    "code": "card_declined",
                    "message": "Your card was declined."
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .and(body_string_contains("amount=200"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&server)
            .await;

        let stripe = gateway(&server).await;

        let declined = PaymentIntentRequest::card(100, Currency::CAD, "cus_123", "pm_1Q0");
        let err = stripe.create_payment_intent(&declined).await.unwrap_err();
        assert!(matches!(
            err,
            ShopError::ProviderRejected { ref message, .. } if message == "Your card was declined."
        ));

        let broken = PaymentIntentRequest::card(200, Currency::CAD, "cus_123", "pm_1Q0");
        let err = stripe.create_payment_intent(&broken).await.unwrap_err();
        assert!(matches!(
            err,
            ShopError::ProviderError { ref message, .. } if message.contains("HTTP 500")
        ));
    }

    #[tokio::test]
    async fn test_unreachable_processor_is_network_error() {
        let config = StripeConfig::new("sk_test_abc123").with_api_base_url("http://127.0.0.1:1");
        let stripe = StripeGateway::new(config).unwrap();

        let err = stripe.create_customer("ana@example.com").await.unwrap_err();
        assert!(matches!(err, ShopError::Network(_)));
    }
}
