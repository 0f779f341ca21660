//! Typed HTTP client for the storefront API.
//!
//! Requests are sent one at a time and never retried. JSON calls use
//! [`DEFAULT_TIMEOUT`]; multipart uploads use [`UPLOAD_TIMEOUT`].

use async_trait::async_trait;
use reqwest::{multipart, Method, RequestBuilder};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::{
    models::{
        Coupon, Order, OrderStatus, PaymentMethod, ViewerRole, Wallet, USER_ID_HEADER,
        USER_ROLE_HEADER,
    },
    services::{
        orders::CheckoutRequest,
        payments::{GatewayOrder, PaymentFailureReport, VerifyPaymentRequest},
    },
    storefront::{OrderView, StorefrontApi},
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// No response arrived, including timeouts.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("{message}")]
    Server { status: u16, message: String },

    /// Rejected before anything was sent.
    #[error("{0}")]
    Validation(String),

    #[error("Unexpected response: {0}")]
    Decode(String),

    /// The hosted gateway checkout did not complete.
    #[error("Payment was not completed: {0}")]
    Checkout(String),
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Network(e) if e.is_timeout())
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Json,
    Upload,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub user_id: String,
    pub role: ViewerRole,
    pub json_timeout: Duration,
    pub upload_timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, user_id: impl Into<String>, role: ViewerRole) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_id: user_id.into(),
            role,
            json_timeout: DEFAULT_TIMEOUT,
            upload_timeout: UPLOAD_TIMEOUT,
        }
    }

    pub fn timeout_for(&self, kind: RequestKind) -> Duration {
        match kind {
            RequestKind::Json => self.json_timeout,
            RequestKind::Upload => self.upload_timeout,
        }
    }
}

/// A file attached to a return request.
#[derive(Debug, Clone)]
pub struct ReturnAttachment {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RetryPaymentBody {
    payment_method: PaymentMethod,
}

#[derive(Clone)]
pub struct StorefrontClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl StorefrontClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().gzip(true).build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str, kind: RequestKind) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.config.base_url, path))
            .timeout(self.config.timeout_for(kind))
            .header(USER_ID_HEADER, &self.config.user_id)
            .header(USER_ROLE_HEADER, self.config.role.to_string())
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("Request failed")
                        .to_string()
                });
            warn!(status = status.as_u16(), %message, "Request rejected");
            return Err(ClientError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: Envelope<T> =
            serde_json::from_slice(&body).map_err(|e| ClientError::Decode(e.to_string()))?;
        if let Some(message) = envelope.message.as_deref() {
            debug!(%message, "Request succeeded");
        }
        envelope.data.ok_or_else(|| {
            ClientError::Decode(
                envelope
                    .message
                    .unwrap_or_else(|| "response carried no data".to_string()),
            )
        })
    }

    async fn send_json<T, B>(&self, method: Method, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(self.request(method, path, RequestKind::Json).json(body))
            .await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send(self.request(Method::GET, path, RequestKind::Json))
            .await
    }

    #[instrument(skip(self))]
    pub async fn list_orders(&self) -> Result<Vec<OrderView>, ClientError> {
        self.get("/api/user/orders").await
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderView, ClientError> {
        self.get(&format!("/api/user/orders/{}", order_id)).await
    }

    #[instrument(skip(self, request))]
    pub async fn place_order(&self, request: &CheckoutRequest) -> Result<OrderView, ClientError> {
        self.send_json(Method::POST, "/api/user/orders", request)
            .await
    }

    #[instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        reason: Option<&str>,
    ) -> Result<OrderView, ClientError> {
        self.send_json(
            Method::POST,
            &format!("/api/user/orders/{}/cancel", order_id),
            &json!({ "reason": reason }),
        )
        .await
    }

    /// Sends the return reason with any photos as a multipart upload.
    #[instrument(skip(self, reason, attachments), fields(attachments = attachments.len()))]
    pub async fn request_return(
        &self,
        order_id: Uuid,
        reason: &str,
        attachments: Vec<ReturnAttachment>,
    ) -> Result<OrderView, ClientError> {
        if reason.trim().is_empty() {
            return Err(ClientError::Validation(
                "Please tell us why you are returning this order".to_string(),
            ));
        }

        let mut form = multipart::Form::new().text("reason", reason.to_string());
        for attachment in attachments {
            let mut part = multipart::Part::bytes(attachment.bytes).file_name(attachment.file_name);
            if let Some(content_type) = attachment.content_type {
                part = part
                    .mime_str(&content_type)
                    .map_err(|e| ClientError::Validation(e.to_string()))?;
            }
            form = form.part("images", part);
        }

        self.send(
            self.request(
                Method::POST,
                &format!("/api/user/orders/{}/return", order_id),
                RequestKind::Upload,
            )
            .multipart(form),
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn wallet(&self) -> Result<Wallet, ClientError> {
        self.get("/api/user/wallet").await
    }

    #[instrument(skip(self))]
    pub async fn coupons(&self) -> Result<Vec<Coupon>, ClientError> {
        self.get("/api/user/coupons").await
    }

    #[instrument(skip(self))]
    pub async fn admin_list_orders(&self) -> Result<Vec<OrderView>, ClientError> {
        self.get("/api/admin/orders").await
    }

    #[instrument(skip(self, reason))]
    pub async fn credit_wallet(
        &self,
        user_id: &str,
        amount: Decimal,
        reason: &str,
    ) -> Result<Wallet, ClientError> {
        self.send_json(
            Method::POST,
            &format!("/api/admin/wallets/{}/credit", user_id),
            &json!({ "amount": amount, "reason": reason }),
        )
        .await
    }
}

#[async_trait]
impl StorefrontApi for StorefrontClient {
    #[instrument(skip(self))]
    async fn retry_payment(
        &self,
        order_id: Uuid,
        method: PaymentMethod,
    ) -> Result<Order, ClientError> {
        self.send_json(
            Method::POST,
            &format!("/api/user/orders/{}/retry-payment", order_id),
            &RetryPaymentBody {
                payment_method: method,
            },
        )
        .await
    }

    #[instrument(skip(self))]
    async fn create_gateway_order(&self, order_id: Uuid) -> Result<GatewayOrder, ClientError> {
        self.send_json(
            Method::POST,
            "/api/user/payments/razorpay/order",
            &json!({ "orderId": order_id }),
        )
        .await
    }

    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    async fn verify_payment(&self, request: VerifyPaymentRequest) -> Result<Order, ClientError> {
        self.send_json(Method::POST, "/api/user/payments/razorpay/verify", &request)
            .await
    }

    #[instrument(skip(self))]
    async fn report_payment_failure(
        &self,
        order_id: Uuid,
        reason: Option<String>,
    ) -> Result<Order, ClientError> {
        self.send_json(
            Method::POST,
            "/api/user/payments/razorpay/failure",
            &PaymentFailureReport { order_id, reason },
        )
        .await
    }

    #[instrument(skip(self))]
    async fn update_order_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<Order, ClientError> {
        self.send_json(
            Method::PATCH,
            &format!("/api/admin/orders/{}/status", order_id),
            &json!({ "status": status }),
        )
        .await
    }
}
