// src/api/razorpay.rs
//
// Minimal Razorpay Orders API client (https://api.razorpay.com).
// Auth: HTTP basic with key id/secret.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;

const RAZORPAY_API_BASE: &str = "https://api.razorpay.com";

#[derive(Debug)]
pub enum RazorpayError {
    Http(reqwest::Error),
    Api { status: u16, body: String },
    InvalidResponse(String),
}

impl fmt::Display for RazorpayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RazorpayError::Http(e) => write!(f, "http error: {e}"),
            RazorpayError::Api { status, body } => {
                write!(f, "razorpay api error status={status} body={body}")
            }
            RazorpayError::InvalidResponse(e) => write!(f, "invalid response: {e}"),
        }
    }
}

impl From<reqwest::Error> for RazorpayError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

#[derive(Debug, Serialize)]
pub struct CreateOrderRequest {
    /// Amount in the smallest currency unit (paise for INR).
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
    pub notes: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct OrderResponse {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
}

pub async fn create_order(
    key_id: &str,
    key_secret: &str,
    req: CreateOrderRequest,
) -> Result<OrderResponse, RazorpayError> {
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{RAZORPAY_API_BASE}/v1/orders"))
        .basic_auth(key_id, Some(key_secret))
        .json(&req)
        .send()
        .await?;

    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        return Err(RazorpayError::Api {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str::<OrderResponse>(&body)
        .map_err(|e| RazorpayError::InvalidResponse(format!("{e}; body={body}")))
}

/// HMAC-SHA256 over "order_id|payment_id" with the key secret, hex-encoded.
/// This is the signature Razorpay checkout hands back to the client.
pub fn payment_signature(key_secret: &str, order_id: &str, payment_id: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(key_secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

pub fn verify_payment_signature(
    key_secret: &str,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> bool {
    payment_signature(key_secret, order_id, payment_id) == signature
}

/// Price string (e.g. "99.00") to paise.
pub fn amount_to_paise(price: &str) -> Option<i64> {
    let value: f64 = price.trim().parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some((value * 100.0).round() as i64)
}
