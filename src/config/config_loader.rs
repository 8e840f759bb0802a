use anyhow::{Ok, Result};

use super::config_model::{Database, DotEnvyConfig, Gateway, JobsConfig, RenewalJobConfig, Server};
use crate::config::stage::Stage;

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let server = Server {
        port: std::env::var("SERVER_PORT")
            .expect("SERVER_PORT is invalid")
            .parse()?,
        body_limit: std::env::var("SERVER_BODY_LIMIT")
            .expect("SERVER_BODY_LIMIT is invalid")
            .parse()?,
        timeout: std::env::var("SERVER_TIMEOUT")
            .expect("SERVER_TIMEOUT is invalid")
            .parse()?,
    };

    let database = Database {
        url: std::env::var("DATABASE_URL").expect("DATABASE_URL is invalid"),
    };

    // Left possibly-empty on purpose; RedirectGatewayClient::new rejects a
    // blank merchant id / secret / base URL before any URL can be signed.
    let gateway = Gateway {
        merchant_id: std::env::var("GATEWAY_MERCHANT_ID").unwrap_or_default(),
        secret_key: std::env::var("GATEWAY_SECRET_KEY").unwrap_or_default(),
        payment_base_url: std::env::var("GATEWAY_PAYMENT_URL").unwrap_or_default(),
        token_charge_url: std::env::var("GATEWAY_TOKEN_CHARGE_URL").unwrap_or_default(),
        return_url: std::env::var("GATEWAY_RETURN_URL").unwrap_or_default(),
        locale: std::env::var("GATEWAY_LOCALE").unwrap_or_else(|_| "en".to_string()),
    };

    let renewal_defaults = RenewalJobConfig::default();
    let jobs = JobsConfig {
        enable_renewal_job: std::env::var("RENEWAL_JOB_ENABLED")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(true),
        renewal_job: RenewalJobConfig {
            check_interval_ms: env_parsed(
                "RENEWAL_JOB_CHECK_INTERVAL_MS",
                renewal_defaults.check_interval_ms,
            ),
            days_before_expiry: env_parsed(
                "RENEWAL_JOB_DAYS_BEFORE_EXPIRY",
                renewal_defaults.days_before_expiry,
            ),
            max_retry_attempts: env_parsed(
                "RENEWAL_JOB_MAX_RETRY_ATTEMPTS",
                renewal_defaults.max_retry_attempts,
            ),
            retry_delay_ms: env_parsed(
                "RENEWAL_JOB_RETRY_DELAY_MS",
                renewal_defaults.retry_delay_ms,
            ),
        },
    };

    Ok(DotEnvyConfig {
        server,
        database,
        gateway,
        jobs,
    })
}

pub fn get_stage() -> Stage {
    dotenvy::dotenv().ok();

    let stage_str = std::env::var("STAGE").unwrap_or("".to_string());
    Stage::try_from(&stage_str).unwrap_or_default()
}

/// Explicit opt-in that lets a non-production stage arm the scheduler.
pub fn get_force_schedule() -> bool {
    dotenvy::dotenv().ok();

    std::env::var("RENEWAL_JOB_FORCE_SCHEDULE")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
