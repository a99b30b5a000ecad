//! Carrier self-care API client.
//!
//! [`CarrierApi`] is the seam the flows call through; [`CarrierClient`] is
//! the reqwest implementation. Token-bearing calls perform one automatic
//! refresh-and-retry when the carrier reports an expired session, so
//! callers only ever see the final response plus the rotated token (which
//! they are expected to persist).

/// Response-code classification into deterministic outcomes
pub mod classify;

use crate::actions::PlanKind;
use crate::config::{Settings, CARRIER_TIMEOUT_SECS};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Opaque, refreshable credential issued by the carrier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// Wrap a raw token string.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw credential for the `Authorization` header.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A raw carrier response: code, prose, HTTP status and body payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CarrierResponse {
    /// Carrier response code, e.g. `OTP1000` (may be empty)
    pub response_code: String,
    /// Human-readable description, verbatim
    pub description: String,
    /// HTTP status of the call
    pub status_code: u16,
    /// Operation payload
    pub payload: Value,
}

/// A token-bearing call result.
///
/// `refreshed` is set when the client rotated the session token mid-call;
/// the caller persists it so the next call uses the fresh credential.
#[derive(Debug, Clone)]
pub struct CarrierReply {
    /// Final response after any refresh-and-retry
    pub response: CarrierResponse,
    /// Rotated token, if a refresh happened
    pub refreshed: Option<SessionToken>,
}

/// OTP exchange result: the response plus the granted token on success.
#[derive(Debug, Clone)]
pub struct OtpExchange {
    /// Raw exchange response
    pub response: CarrierResponse,
    /// Session token granted when the exchange succeeded
    pub token: Option<SessionToken>,
}

/// Transport-level failure reaching the carrier.
///
/// Deliberately distinct from any [`classify::Outcome`]: a network error
/// must never be mistaken for a business rejection.
#[derive(Debug, Error)]
pub enum CarrierError {
    /// HTTP transport failure
    #[error("carrier unreachable: {0}")]
    Http(#[from] reqwest::Error),
    /// Response body was not the expected JSON envelope
    #[error("carrier payload error: {0}")]
    Payload(String),
}

/// Operations the flows consume.
#[async_trait]
pub trait CarrierApi: Send + Sync {
    /// Request an OTP for `msisdn`.
    async fn send_otp(&self, msisdn: &str) -> Result<CarrierResponse, CarrierError>;
    /// Exchange an OTP code for a session token.
    async fn exchange_otp(&self, msisdn: &str, code: &str) -> Result<OtpExchange, CarrierError>;
    /// Query the balance of the token's account.
    async fn view_balance(&self, token: &SessionToken) -> Result<CarrierReply, CarrierError>;
    /// Query the subscriber profile.
    async fn view_profile(&self, token: &SessionToken) -> Result<CarrierReply, CarrierError>;
    /// Recharge with a scratch-card pin; `target` recharges another number.
    async fn recharge_pin(
        &self,
        token: &SessionToken,
        pin: &str,
        target: Option<&str>,
    ) -> Result<CarrierReply, CarrierError>;
    /// Start an online recharge; `target` recharges another number.
    async fn recharge_online(
        &self,
        token: &SessionToken,
        amount: &str,
        target: Option<&str>,
    ) -> Result<CarrierReply, CarrierError>;
    /// Send an SMS from the token's account.
    async fn send_sms(
        &self,
        token: &SessionToken,
        destination: &str,
        text: &str,
        free: bool,
    ) -> Result<CarrierReply, CarrierError>;
    /// List products the account is subscribed to.
    async fn subscribed_products(&self, token: &SessionToken) -> Result<CarrierReply, CarrierError>;
    /// List available products for a catalogue category.
    async fn list_products(
        &self,
        token: &SessionToken,
        kind: PlanKind,
        category: &str,
    ) -> Result<CarrierReply, CarrierError>;
    /// Subscribe to a product.
    async fn subscribe(&self, token: &SessionToken, code: &str)
        -> Result<CarrierReply, CarrierError>;
    /// Unsubscribe from a product.
    async fn unsubscribe(
        &self,
        token: &SessionToken,
        code: &str,
    ) -> Result<CarrierReply, CarrierError>;
    /// Take a credit loan.
    async fn take_loan(&self, token: &SessionToken) -> Result<CarrierReply, CarrierError>;
}

/// HTTP implementation of [`CarrierApi`].
pub struct CarrierClient {
    http: reqwest::Client,
    base_url: String,
}

impl CarrierClient {
    /// Build a client from settings.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying HTTP client cannot be built.
    pub fn new(settings: &Settings) -> Result<Self, CarrierError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(CARRIER_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            base_url: settings.carrier_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn call(
        &self,
        path: &str,
        token: Option<&SessionToken>,
        body: Value,
    ) -> Result<CarrierResponse, CarrierError> {
        let url = format!("{}/{path}", self.base_url);
        let mut request = self.http.post(&url).json(&body);
        if let Some(token) = token {
            request = request.bearer_auth(token.as_str());
        }

        let response = request.send().await?;
        let status_code = response.status().as_u16();
        let envelope: Value = response
            .json()
            .await
            .map_err(|e| CarrierError::Payload(e.to_string()))?;

        let response_code = envelope
            .get("responseDescCode")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let description = envelope
            .get("responseDesc")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let payload = envelope.get("content").cloned().unwrap_or(Value::Null);

        debug!("carrier {path} -> {response_code} (http {status_code})");
        Ok(CarrierResponse {
            response_code,
            description,
            status_code,
            payload,
        })
    }

    /// Issue a token-bearing call with one refresh-and-retry on expiry.
    async fn authorized(
        &self,
        path: &str,
        token: &SessionToken,
        body: Value,
    ) -> Result<CarrierReply, CarrierError> {
        let first = self.call(path, Some(token), body.clone()).await?;
        if classify::expiry_reason(&first.response_code).is_none() {
            return Ok(CarrierReply {
                response: first,
                refreshed: None,
            });
        }

        info!("carrier session expired on {path}, attempting refresh");
        let refresh = self.call("auth/refresh", Some(token), json!({})).await?;
        let Some(new_token) = refresh.payload.get("token").and_then(Value::as_str) else {
            // Refresh denied: surface whichever response names the expiry
            let response = if classify::expiry_reason(&refresh.response_code).is_some() {
                refresh
            } else {
                first
            };
            return Ok(CarrierReply {
                response,
                refreshed: None,
            });
        };

        let new_token = SessionToken::new(new_token);
        let second = self.call(path, Some(&new_token), body).await?;
        Ok(CarrierReply {
            response: second,
            refreshed: Some(new_token),
        })
    }
}

#[async_trait]
impl CarrierApi for CarrierClient {
    async fn send_otp(&self, msisdn: &str) -> Result<CarrierResponse, CarrierError> {
        self.call("auth/otp/send", None, json!({ "msisdn": msisdn }))
            .await
    }

    async fn exchange_otp(&self, msisdn: &str, code: &str) -> Result<OtpExchange, CarrierError> {
        let response = self
            .call(
                "auth/otp/token",
                None,
                json!({ "msisdn": msisdn, "otp": code }),
            )
            .await?;
        let token = response
            .payload
            .get("token")
            .and_then(Value::as_str)
            .map(SessionToken::new);
        Ok(OtpExchange { response, token })
    }

    async fn view_balance(&self, token: &SessionToken) -> Result<CarrierReply, CarrierError> {
        self.authorized("account/balance", token, json!({})).await
    }

    async fn view_profile(&self, token: &SessionToken) -> Result<CarrierReply, CarrierError> {
        self.authorized("account/profile", token, json!({})).await
    }

    async fn recharge_pin(
        &self,
        token: &SessionToken,
        pin: &str,
        target: Option<&str>,
    ) -> Result<CarrierReply, CarrierError> {
        let mut body = json!({ "pin": pin });
        if let Some(target) = target {
            body["msisdn"] = Value::String(target.to_string());
        }
        self.authorized("recharge/pin", token, body).await
    }

    async fn recharge_online(
        &self,
        token: &SessionToken,
        amount: &str,
        target: Option<&str>,
    ) -> Result<CarrierReply, CarrierError> {
        let mut body = json!({ "amount": amount });
        if let Some(target) = target {
            body["msisdn"] = Value::String(target.to_string());
        }
        self.authorized("recharge/online", token, body).await
    }

    async fn send_sms(
        &self,
        token: &SessionToken,
        destination: &str,
        text: &str,
        free: bool,
    ) -> Result<CarrierReply, CarrierError> {
        let path = if free { "sms/free" } else { "sms/paid" };
        self.authorized(path, token, json!({ "to": destination, "text": text }))
            .await
    }

    async fn subscribed_products(&self, token: &SessionToken) -> Result<CarrierReply, CarrierError> {
        self.authorized("products/subscribed", token, json!({})).await
    }

    async fn list_products(
        &self,
        token: &SessionToken,
        kind: PlanKind,
        category: &str,
    ) -> Result<CarrierReply, CarrierError> {
        let family = match kind {
            PlanKind::Data => "data",
            PlanKind::Voice => "voice-sms",
            PlanKind::Vas => "vas",
        };
        self.authorized(
            "products/catalogue",
            token,
            json!({ "family": family, "category": category }),
        )
        .await
    }

    async fn subscribe(
        &self,
        token: &SessionToken,
        code: &str,
    ) -> Result<CarrierReply, CarrierError> {
        self.authorized("products/subscribe", token, json!({ "subscriptionCode": code }))
            .await
    }

    async fn unsubscribe(
        &self,
        token: &SessionToken,
        code: &str,
    ) -> Result<CarrierReply, CarrierError> {
        self.authorized(
            "products/unsubscribe",
            token,
            json!({ "subscriptionCode": code }),
        )
        .await
    }

    async fn take_loan(&self, token: &SessionToken) -> Result<CarrierReply, CarrierError> {
        self.authorized("loan/take", token, json!({})).await
    }
}
