//! Payment gateway client.
//!
//! The gateway is consumed as two narrow capabilities: create a hosted
//! checkout order, and verify the signed callback that claims it was paid.
//! Payment state is never queried back from the gateway.

use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;

use crate::config::GatewayConfig;
use crate::error::ApiError;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct Gateway {
    http: reqwest::Client,
    config: GatewayConfig,
}

/// Remotely-created checkout order: an opaque id plus the raw response,
/// which is persisted for audit.
#[derive(Debug, Clone)]
pub struct CheckoutOrder {
    pub id: String,
    pub raw: Value,
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn key_id(&self) -> &str {
        &self.config.key_id
    }

    /// Create a hosted checkout order. `amount` is in minor currency units
    /// (paise).
    pub async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
        notes: Value,
    ) -> Result<CheckoutOrder, ApiError> {
        let raw: Value = self
            .http
            .post(format!("{}/orders", self.config.base_url))
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&json!({
                "amount": amount,
                "currency": currency,
                "receipt": receipt,
                "notes": notes,
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let id = raw
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ApiError::ServiceUnavailable("gateway returned an unexpected response".into())
            })?
            .to_string();

        Ok(CheckoutOrder { id, raw })
    }

    /// Check the callback signature against our copy of the shared secret.
    pub fn verify_signature(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        signature: &str,
    ) -> bool {
        verify_signature(
            &self.config.key_secret,
            gateway_order_id,
            gateway_payment_id,
            signature,
        )
    }
}

/// HMAC-SHA256 over `"{order_id}|{payment_id}"`, compared in constant time
/// against the hex signature the caller presented. This is the only thing
/// that turns an untrusted "I paid" claim into a trusted fact.
pub fn verify_signature(
    secret: &str,
    gateway_order_id: &str,
    gateway_payment_id: &str,
    signature: &str,
) -> bool {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(format!("{gateway_order_id}|{gateway_payment_id}").as_bytes());
    match hex::decode(signature.trim()) {
        // verify_slice is constant-time.
        Ok(bytes) => mac.verify_slice(&bytes).is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_key_secret";

    fn sign(order_id: &str, payment_id: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{order_id}|{payment_id}").as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn accepts_genuine_signature() {
        let sig = sign("order_abc", "pay_xyz");
        assert!(verify_signature(SECRET, "order_abc", "pay_xyz", &sig));
    }

    #[test]
    fn rejects_forged_signature() {
        let sig = sign("order_abc", "pay_xyz");
        assert!(!verify_signature(SECRET, "order_abc", "pay_other", &sig));
        assert!(!verify_signature("wrong_secret", "order_abc", "pay_xyz", &sig));
        assert!(!verify_signature(SECRET, "order_abc", "pay_xyz", "deadbeef"));
    }

    #[test]
    fn rejects_malformed_hex() {
        assert!(!verify_signature(SECRET, "order_abc", "pay_xyz", "not-hex!"));
        assert!(!verify_signature(SECRET, "order_abc", "pay_xyz", ""));
    }
}
