//! PayPal REST adapter.
//!
//! Talks to the Orders v2 and Payments v2 APIs with an OAuth 2.0
//! client-credentials token. The token is cached until shortly before it
//! expires.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{BookingReference, Money};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::payment::{
    CaptureStatus, CapturedOrder, CreatedOrder, GatewayError, PaymentGateway, RefundResult,
};

const SANDBOX_BASE_URL: &str = "https://api-m.sandbox.paypal.com";
const LIVE_BASE_URL: &str = "https://api-m.paypal.com";

/// Refresh the token this long before PayPal says it expires.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

/// PayPal environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayPalMode {
    #[default]
    Sandbox,
    Live,
}

impl PayPalMode {
    pub fn base_url(&self) -> &'static str {
        match self {
            PayPalMode::Sandbox => SANDBOX_BASE_URL,
            PayPalMode::Live => LIVE_BASE_URL,
        }
    }
}

impl std::str::FromStr for PayPalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sandbox" => Ok(PayPalMode::Sandbox),
            "live" => Ok(PayPalMode::Live),
            other => Err(format!("unknown PayPal mode: {other}")),
        }
    }
}

/// Credentials and URLs for [`PayPalGateway`].
#[derive(Clone)]
pub struct PayPalConfig {
    pub client_id: String,
    pub secret: String,
    /// API root; normally [`PayPalMode::base_url`].
    pub base_url: String,
    /// Where PayPal sends the payer after approving an order.
    pub return_url: String,
    pub cancel_url: String,
}

impl std::fmt::Debug for PayPalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayPalConfig")
            .field("client_id", &self.client_id)
            .field("secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("return_url", &self.return_url)
            .field("cancel_url", &self.cancel_url)
            .finish()
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// [`PaymentGateway`] backed by the PayPal REST API.
#[derive(Clone)]
pub struct PayPalGateway {
    config: Arc<PayPalConfig>,
    http_client: Client,
    token: Arc<Mutex<Option<CachedToken>>>,
}

impl PayPalGateway {
    pub fn new(config: PayPalConfig) -> Self {
        Self::with_client(config, Client::new())
    }

    pub fn with_client(config: PayPalConfig, http_client: Client) -> Self {
        Self {
            config: Arc::new(config),
            http_client,
            token: Arc::new(Mutex::new(None)),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Returns a valid access token, fetching a new one when needed.
    async fn access_token(&self) -> Result<String, GatewayError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Utc::now() {
                return Ok(token.access_token.clone());
            }
        }

        let response = self
            .http_client
            .post(self.url("/v1/oauth2/token"))
            .basic_auth(&self.config.client_id, Some(&self.config.secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            tracing::error!(%status, "PayPal token request failed: {}", error_body);
            return Err(GatewayError::Unavailable(format!(
                "token request failed with {status}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::UnexpectedResponse(e.to_string()))?;

        let lifetime = (token.expires_in - TOKEN_EXPIRY_MARGIN_SECS).max(0);
        *cached = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at: Utc::now() + chrono::Duration::seconds(lifetime),
        });
        Ok(token.access_token)
    }

    async fn post_json<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Response, GatewayError> {
        let token = self.access_token().await?;
        self.http_client
            .post(self.url(path))
            .bearer_auth(token)
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for PayPalGateway {
    #[tracing::instrument(skip(self), fields(gateway = "paypal"))]
    async fn create_order(
        &self,
        amount: Money,
        currency: &str,
        reference: &BookingReference,
    ) -> Result<CreatedOrder, GatewayError> {
        if !amount.is_positive() {
            return Err(GatewayError::InvalidAmount(amount));
        }

        let body = OrderRequest {
            intent: "CAPTURE",
            purchase_units: vec![PurchaseUnit {
                reference_id: reference.as_str(),
                amount: AmountBody {
                    currency_code: currency,
                    value: amount.to_decimal_string(),
                },
            }],
            application_context: ApplicationContext {
                return_url: &self.config.return_url,
                cancel_url: &self.config.cancel_url,
            },
        };

        let response = self.post_json("/v2/checkout/orders", &body).await?;
        if !response.status().is_success() {
            return Err(failure(response, GatewayError::Unavailable).await);
        }

        let order: OrderResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::UnexpectedResponse(e.to_string()))?;
        let approval_url = order
            .links
            .into_iter()
            .find(|link| link.rel == "approve" || link.rel == "payer-action")
            .map(|link| link.href);
        if approval_url.is_none() {
            tracing::warn!(order_id = %order.id, "PayPal order has no approval link");
        }

        Ok(CreatedOrder {
            order_id: order.id,
            approval_url,
        })
    }

    #[tracing::instrument(skip(self), fields(gateway = "paypal"))]
    async fn capture_order(&self, order_id: &str) -> Result<CapturedOrder, GatewayError> {
        let path = format!("/v2/checkout/orders/{order_id}/capture");
        let response = self.post_json(&path, &serde_json::json!({})).await?;
        if !response.status().is_success() {
            return Err(failure(response, GatewayError::CaptureFailed).await);
        }

        let order: CaptureResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::UnexpectedResponse(e.to_string()))?;
        let capture = order
            .purchase_units
            .into_iter()
            .flat_map(|unit| unit.payments.map(|p| p.captures).unwrap_or_default())
            .next()
            .ok_or_else(|| {
                GatewayError::UnexpectedResponse(format!("order {order_id} has no capture"))
            })?;

        Ok(CapturedOrder {
            capture_id: capture.id,
            status: CaptureStatus::from_provider(&capture.status),
            amount: capture
                .amount
                .and_then(|amount| Money::parse_decimal(&amount.value)),
        })
    }

    #[tracing::instrument(skip(self), fields(gateway = "paypal"))]
    async fn refund(
        &self,
        capture_id: &str,
        amount: Money,
        currency: &str,
    ) -> Result<RefundResult, GatewayError> {
        if !amount.is_positive() {
            return Err(GatewayError::InvalidAmount(amount));
        }

        let path = format!("/v2/payments/captures/{capture_id}/refund");
        let body = RefundRequest {
            amount: AmountBody {
                currency_code: currency,
                value: amount.to_decimal_string(),
            },
        };
        let response = self.post_json(&path, &body).await?;
        if !response.status().is_success() {
            return Err(failure(response, GatewayError::RefundFailed).await);
        }

        let refund: RefundResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::UnexpectedResponse(e.to_string()))?;
        Ok(RefundResult {
            refund_id: refund.id,
            status: refund.status,
        })
    }
}

/// Maps an unsuccessful PayPal response to a gateway error.
///
/// Server errors mean the gateway is unavailable; well-known `issue` codes get
/// their own variant; anything else is reported through `otherwise`.
async fn failure(response: Response, otherwise: fn(String) -> GatewayError) -> GatewayError {
    let status = response.status();
    let error_body = response.text().await.unwrap_or_default();
    tracing::error!(%status, "PayPal request failed: {}", error_body);

    if status.is_server_error() || status == StatusCode::UNAUTHORIZED {
        return GatewayError::Unavailable(format!("PayPal returned {status}"));
    }

    let issue = serde_json::from_str::<ErrorResponse>(&error_body)
        .ok()
        .and_then(|err| err.details.into_iter().next().map(|d| d.issue));
    match issue.as_deref() {
        Some("ORDER_NOT_APPROVED" | "PAYER_ACTION_REQUIRED") => {
            GatewayError::NotApproved(error_body)
        }
        Some("CAPTURE_FULLY_REFUNDED") => GatewayError::AlreadyRefunded(error_body),
        Some(issue) => otherwise(issue.to_string()),
        None => otherwise(format!("PayPal returned {status}")),
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Serialize)]
struct OrderRequest<'a> {
    intent: &'static str,
    purchase_units: Vec<PurchaseUnit<'a>>,
    application_context: ApplicationContext<'a>,
}

#[derive(Debug, Serialize)]
struct PurchaseUnit<'a> {
    reference_id: &'a str,
    amount: AmountBody<'a>,
}

#[derive(Debug, Serialize)]
struct AmountBody<'a> {
    currency_code: &'a str,
    value: String,
}

#[derive(Debug, Serialize)]
struct ApplicationContext<'a> {
    return_url: &'a str,
    cancel_url: &'a str,
}

#[derive(Debug, Serialize)]
struct RefundRequest<'a> {
    amount: AmountBody<'a>,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
    rel: String,
}

#[derive(Debug, Deserialize)]
struct CaptureResponse {
    #[serde(default)]
    purchase_units: Vec<CapturedUnit>,
}

#[derive(Debug, Deserialize)]
struct CapturedUnit {
    payments: Option<CapturePayments>,
}

#[derive(Debug, Deserialize)]
struct CapturePayments {
    #[serde(default)]
    captures: Vec<Capture>,
}

#[derive(Debug, Deserialize)]
struct Capture {
    id: String,
    status: String,
    amount: Option<AmountValue>,
}

#[derive(Debug, Deserialize)]
struct AmountValue {
    value: String,
}

#[derive(Debug, Deserialize)]
struct RefundResponse {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    issue: String,
}
