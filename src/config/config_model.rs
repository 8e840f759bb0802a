use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub server: Server,
    pub database: Database,
    pub gateway: Gateway,
    pub jobs: JobsConfig,
}

#[derive(Debug, Clone)]
pub struct Server {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

/// Credentials and endpoints for the hosted-redirect payment gateway.
/// Validated at adapter construction, not here: an empty merchant id or
/// secret must prevent any payment URL from being built.
#[derive(Debug, Clone)]
pub struct Gateway {
    pub merchant_id: String,
    pub secret_key: String,
    pub payment_base_url: String,
    pub token_charge_url: String,
    pub return_url: String,
    pub locale: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    pub enable_renewal_job: bool,
    pub renewal_job: RenewalJobConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewalJobConfig {
    pub check_interval_ms: u64,
    pub days_before_expiry: i64,
    pub max_retry_attempts: i32,
    pub retry_delay_ms: u64,
}

impl Default for RenewalJobConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: 3_600_000,
            days_before_expiry: 3,
            max_retry_attempts: 3,
            retry_delay_ms: 86_400_000,
        }
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            enable_renewal_job: true,
            renewal_job: RenewalJobConfig::default(),
        }
    }
}
