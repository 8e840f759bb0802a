use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha512;
use tracing::error;

use crate::{
    application::interfaces::gateway::{GatewayError, PaymentGateway},
    config::config_model::Gateway,
    domain::{
        entities::payment_methods::PaymentMethodEntity,
        value_objects::payments::{ChargeOutcome, PaymentUrlRequest},
    },
    infrastructure::gateway::response_codes::{describe_response_code, RESPONSE_CODE_SUCCESS},
};

type HmacSha512 = Hmac<Sha512>;

pub const PARAM_VERSION: &str = "version";
pub const PARAM_COMMAND: &str = "command";
pub const PARAM_MERCHANT_ID: &str = "merchantId";
pub const PARAM_LOCALE: &str = "locale";
pub const PARAM_CURRENCY_CODE: &str = "currencyCode";
pub const PARAM_TXN_REF: &str = "txnRef";
pub const PARAM_ORDER_INFO: &str = "orderInfo";
pub const PARAM_ORDER_TYPE: &str = "orderType";
pub const PARAM_AMOUNT: &str = "amount";
pub const PARAM_RETURN_URL: &str = "returnUrl";
pub const PARAM_IP_ADDRESS: &str = "ipAddress";
pub const PARAM_CREATE_DATE: &str = "createDate";
pub const PARAM_BANK_CODE: &str = "bankCode";
pub const PARAM_EXPIRE_DATE: &str = "expireDate";
pub const PARAM_TOKEN: &str = "token";
pub const PARAM_SECURE_HASH: &str = "secureHash";
pub const PARAM_SECURE_HASH_TYPE: &str = "secureHashType";
pub const PARAM_RESPONSE_CODE: &str = "responseCode";
pub const PARAM_GATEWAY_TXN_NO: &str = "transactionNo";

const PROTOCOL_VERSION: &str = "2.1.0";
const COMMAND_PAY: &str = "pay";
const COMMAND_TOKEN_PAY: &str = "token_pay";
const DATE_FORMAT: &str = "%Y%m%d%H%M%S";

/// Client for the hosted-redirect gateway. Both protocol legs — outbound
/// payment URLs and inbound return callbacks — are symmetric around one
/// HMAC-SHA512 canonicalization, so the encoding here must never diverge
/// from what `verify_callback` recomputes.
pub struct RedirectGatewayClient {
    http: reqwest::Client,
    merchant_id: String,
    secret_key: String,
    payment_base_url: String,
    token_charge_url: String,
    return_url: String,
    locale: String,
}

#[derive(Debug, Deserialize)]
struct TokenChargeResponse {
    #[serde(rename = "responseCode")]
    response_code: String,
    #[serde(rename = "transactionNo")]
    transaction_no: Option<String>,
    message: Option<String>,
}

impl RedirectGatewayClient {
    /// Fails when merchant id, signing secret, or base URL is absent; a
    /// misconfigured adapter must never be able to sign anything.
    pub fn new(config: Gateway) -> Result<Self, GatewayError> {
        if config.merchant_id.trim().is_empty() {
            return Err(GatewayError::MissingConfig("merchant_id"));
        }
        if config.secret_key.trim().is_empty() {
            return Err(GatewayError::MissingConfig("secret_key"));
        }
        if config.payment_base_url.trim().is_empty() {
            return Err(GatewayError::MissingConfig("payment_base_url"));
        }

        Ok(Self {
            http: reqwest::Client::new(),
            merchant_id: config.merchant_id,
            secret_key: config.secret_key,
            payment_base_url: config.payment_base_url,
            token_charge_url: config.token_charge_url,
            return_url: config.return_url,
            locale: config.locale,
        })
    }

    /// Form-urlencodes each key and value (`%20` becomes `+`), sorts pairs
    /// lexicographically by encoded key, and joins them as a query string.
    /// The signature is computed over exactly these bytes.
    fn canonical_query(params: &[(String, String)]) -> String {
        let mut encoded: Vec<(String, String)> = params
            .iter()
            .map(|(key, value)| (form_encode(key), form_encode(value)))
            .collect();
        encoded.sort_by(|a, b| a.0.cmp(&b.0));

        encoded
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join("&")
    }

    fn sign(&self, canonical: &str) -> String {
        let mut mac = HmacSha512::new_from_slice(self.secret_key.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(canonical.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn base_params(&self, command: &str) -> Vec<(String, String)> {
        vec![
            (PARAM_VERSION.to_string(), PROTOCOL_VERSION.to_string()),
            (PARAM_COMMAND.to_string(), command.to_string()),
            (PARAM_MERCHANT_ID.to_string(), self.merchant_id.clone()),
            (PARAM_LOCALE.to_string(), self.locale.clone()),
        ]
    }
}

#[async_trait]
impl PaymentGateway for RedirectGatewayClient {
    fn build_payment_url(&self, request: &PaymentUrlRequest) -> Result<String, GatewayError> {
        // Gateway convention: amount is sent in minor-style integer form,
        // multiplied by 100.
        let wire_amount = request
            .amount
            .checked_mul(100)
            .filter(|v| *v > 0)
            .ok_or(GatewayError::AmountOutOfRange(request.amount))?;

        let mut params = self.base_params(COMMAND_PAY);
        params.push((PARAM_CURRENCY_CODE.to_string(), request.currency.clone()));
        params.push((PARAM_TXN_REF.to_string(), request.txn_ref.clone()));
        params.push((PARAM_ORDER_INFO.to_string(), request.order_info.clone()));
        params.push((PARAM_ORDER_TYPE.to_string(), request.order_type.clone()));
        params.push((PARAM_AMOUNT.to_string(), wire_amount.to_string()));
        params.push((PARAM_RETURN_URL.to_string(), self.return_url.clone()));
        params.push((PARAM_IP_ADDRESS.to_string(), request.client_ip.clone()));
        params.push((
            PARAM_CREATE_DATE.to_string(),
            request.created_at.format(DATE_FORMAT).to_string(),
        ));
        if let Some(bank_code) = request.bank_code.as_ref() {
            params.push((PARAM_BANK_CODE.to_string(), bank_code.clone()));
        }
        if let Some(expires_at) = request.expires_at.as_ref() {
            params.push((
                PARAM_EXPIRE_DATE.to_string(),
                expires_at.format(DATE_FORMAT).to_string(),
            ));
        }

        let canonical = Self::canonical_query(&params);
        let secure_hash = self.sign(&canonical);

        Ok(format!(
            "{}?{}&{}={}",
            self.payment_base_url, canonical, PARAM_SECURE_HASH, secure_hash
        ))
    }

    fn verify_callback(&self, params: &HashMap<String, String>) -> bool {
        let Some(received_hash) = params.get(PARAM_SECURE_HASH) else {
            return false;
        };
        let Ok(received_digest) = hex::decode(received_hash) else {
            return false;
        };

        let signable: Vec<(String, String)> = params
            .iter()
            .filter(|(key, _)| {
                key.as_str() != PARAM_SECURE_HASH && key.as_str() != PARAM_SECURE_HASH_TYPE
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let canonical = Self::canonical_query(&signable);

        let mut mac = HmacSha512::new_from_slice(self.secret_key.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(canonical.as_bytes());
        mac.verify_slice(&received_digest).is_ok()
    }

    async fn charge_stored_token(
        &self,
        payment_method: &PaymentMethodEntity,
        amount: i64,
        currency: &str,
    ) -> Result<ChargeOutcome> {
        if self.token_charge_url.trim().is_empty() {
            return Err(GatewayError::MissingConfig("token_charge_url").into());
        }

        let wire_amount = amount
            .checked_mul(100)
            .filter(|v| *v > 0)
            .ok_or(GatewayError::AmountOutOfRange(amount))?;

        let txn_ref = uuid::Uuid::new_v4().simple().to_string();
        let mut params = self.base_params(COMMAND_TOKEN_PAY);
        params.push((PARAM_CURRENCY_CODE.to_string(), currency.to_string()));
        params.push((PARAM_TXN_REF.to_string(), txn_ref.clone()));
        params.push((PARAM_AMOUNT.to_string(), wire_amount.to_string()));
        params.push((PARAM_TOKEN.to_string(), payment_method.gateway_token.clone()));
        params.push((
            PARAM_CREATE_DATE.to_string(),
            chrono::Utc::now().format(DATE_FORMAT).to_string(),
        ));

        let canonical = Self::canonical_query(&params);
        let secure_hash = self.sign(&canonical);

        let mut form: Vec<(String, String)> = params;
        form.push((PARAM_SECURE_HASH.to_string(), secure_hash));

        let resp = self
            .http
            .post(&self.token_charge_url)
            .form(&form)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            error!(
                status = %status,
                response_body = %body,
                txn_ref = %txn_ref,
                "gateway: token charge request failed"
            );
            return Ok(ChargeOutcome::failed(format!(
                "gateway returned HTTP {}",
                status
            )));
        }

        let parsed: TokenChargeResponse = resp.json().await?;
        if parsed.response_code == RESPONSE_CODE_SUCCESS {
            let transaction_no = parsed.transaction_no.unwrap_or(txn_ref);
            Ok(ChargeOutcome::succeeded(transaction_no))
        } else {
            let reason = parsed
                .message
                .unwrap_or_else(|| describe_response_code(&parsed.response_code).to_string());
            Ok(ChargeOutcome::failed(format!(
                "{} ({})",
                reason, parsed.response_code
            )))
        }
    }
}

/// `application/x-www-form-urlencoded` byte encoding: spaces become `+`,
/// everything non-alphanumeric outside `*-._` is percent-encoded.
fn form_encode(input: &str) -> String {
    url::form_urlencoded::byte_serialize(input.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_config() -> Gateway {
        Gateway {
            merchant_id: "MER001".to_string(),
            secret_key: "topsecretsigningkey".to_string(),
            payment_base_url: "https://pay.example.com/v2/checkout".to_string(),
            token_charge_url: "https://pay.example.com/v2/token-charge".to_string(),
            return_url: "https://app.example.com/payments/gateway-return".to_string(),
            locale: "en".to_string(),
        }
    }

    fn test_client() -> RedirectGatewayClient {
        RedirectGatewayClient::new(test_config()).unwrap()
    }

    fn test_request() -> PaymentUrlRequest {
        PaymentUrlRequest {
            txn_ref: "abc123".to_string(),
            amount: 150,
            currency: "USD".to_string(),
            order_info: "premium membership renewal".to_string(),
            order_type: "membership".to_string(),
            client_ip: "203.0.113.7".to_string(),
            created_at: chrono::Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap(),
            bank_code: None,
            expires_at: None,
        }
    }

    fn params_from_url(url: &str) -> HashMap<String, String> {
        let query = url.split_once('?').unwrap().1;
        query
            .split('&')
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap();
                (
                    key.to_string(),
                    url::form_urlencoded::parse(value.as_bytes())
                        .map(|(decoded, _)| decoded.into_owned())
                        .next()
                        .unwrap_or_default(),
                )
            })
            .collect()
    }

    #[test]
    fn test_new_rejects_missing_merchant_id() {
        let mut config = test_config();
        config.merchant_id = "".to_string();
        assert!(matches!(
            RedirectGatewayClient::new(config),
            Err(GatewayError::MissingConfig("merchant_id"))
        ));
    }

    #[test]
    fn test_new_rejects_missing_secret() {
        let mut config = test_config();
        config.secret_key = "  ".to_string();
        assert!(matches!(
            RedirectGatewayClient::new(config),
            Err(GatewayError::MissingConfig("secret_key"))
        ));
    }

    #[test]
    fn test_build_payment_url_sorts_and_signs() {
        let client = test_client();
        let url = client.build_payment_url(&test_request()).unwrap();

        assert!(url.starts_with("https://pay.example.com/v2/checkout?"));
        // amount is wired x100
        assert!(url.contains("amount=15000"));
        // spaces encode as '+'
        assert!(url.contains("orderInfo=premium+membership+renewal"));
        assert!(url.contains("createDate=20250301093000"));

        let query = url.split_once('?').unwrap().1;
        let keys: Vec<&str> = query
            .split('&')
            .map(|pair| pair.split_once('=').unwrap().0)
            .collect();
        let mut sorted = keys.clone();
        // secureHash is appended after the signed, sorted prefix
        assert_eq!(*keys.last().unwrap(), "secureHash");
        sorted.truncate(sorted.len() - 1);
        let mut expected = sorted.clone();
        expected.sort();
        assert_eq!(sorted, expected);
    }

    #[test]
    fn test_signature_round_trip() {
        let client = test_client();
        let url = client.build_payment_url(&test_request()).unwrap();
        let params = params_from_url(&url);

        assert!(client.verify_callback(&params));
    }

    #[test]
    fn test_verify_rejects_tampered_value() {
        let client = test_client();
        let url = client.build_payment_url(&test_request()).unwrap();
        let mut params = params_from_url(&url);
        params.insert("amount".to_string(), "1".to_string());

        assert!(!client.verify_callback(&params));
    }

    #[test]
    fn test_verify_rejects_missing_hash() {
        let client = test_client();
        let url = client.build_payment_url(&test_request()).unwrap();
        let mut params = params_from_url(&url);
        params.remove("secureHash");

        assert!(!client.verify_callback(&params));
    }

    #[test]
    fn test_verify_ignores_hash_type_field() {
        let client = test_client();
        let url = client.build_payment_url(&test_request()).unwrap();
        let mut params = params_from_url(&url);
        params.insert("secureHashType".to_string(), "HMACSHA512".to_string());

        assert!(client.verify_callback(&params));
    }

    #[test]
    fn test_build_payment_url_rejects_overflowing_amount() {
        let client = test_client();
        let mut request = test_request();
        request.amount = i64::MAX;
        assert!(matches!(
            client.build_payment_url(&request),
            Err(GatewayError::AmountOutOfRange(_))
        ));
    }
}
