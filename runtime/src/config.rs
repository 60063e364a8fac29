use std::env;
use std::time::Duration;

use crate::RuntimeError;

/// Process-wide configuration, loaded once from the environment at binary
/// start. All three binaries (`accrual-inbox`, the combined daemons binary,
/// `accrual-outbox`) share this shape; a binary that doesn't need a field
/// (e.g. `accrual-outbox` never dials the orders gRPC service) simply
/// doesn't read it.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub accruals_queue_name: String,
    pub kafka_brokers: String,
    pub kafka_order_created_topic: String,
    pub kafka_order_created_group_id: String,
    pub kafka_accruals_topic: String,
    pub accrual_http_address: String,
    pub gophermart_grpc_address: String,
    pub daemon_poll_interval: Duration,
    pub daemon_workers_count: usize,
    pub accruals_outbox_poll_interval: Duration,
    pub accruals_outbox_workers_count: usize,
    pub log_level: String,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Config {
    /// Load configuration from the process environment, reading a local
    /// `.env` file first if present.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Config` if a required variable
    /// (`DATABASE_URL`, `KAFKA_BROKERS`) is unset.
    pub fn from_env() -> Result<Self, RuntimeError> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| RuntimeError::Config("DATABASE_URL missing".into()))?;
        let kafka_brokers = env::var("KAFKA_BROKERS")
            .map_err(|_| RuntimeError::Config("KAFKA_BROKERS missing".into()))?;

        Ok(Self {
            database_url,
            redis_url: env_or("REDIS_URL", "redis://127.0.0.1:6379/0"),
            accruals_queue_name: env_or("ACCRUALS_QUEUE_NAME", "accruals_in_progress"),
            kafka_brokers,
            kafka_order_created_topic: env_or("KAFKA_ORDER_CREATED_TOPIC", "order_created"),
            kafka_order_created_group_id: env_or(
                "KAFKA_ORDER_CREATED_GROUP_ID",
                "accrual_adapter_order_created_consumer_group",
            ),
            kafka_accruals_topic: env_or("KAFKA_ACCRUALS_TOPIC", "accruals"),
            accrual_http_address: env_or("ACCRUAL_HTTP_ADDRESS", "http://127.0.0.1:8080"),
            gophermart_grpc_address: env_or("GOPHERMART_GRPC_ADDRESS", "http://127.0.0.1:8050"),
            daemon_poll_interval: Duration::from_millis(env_parse_or("DAEMON_POLL_INTERVAL_MS", 5000)),
            daemon_workers_count: env_parse_or("DAEMON_WORKERS_COUNT", 1),
            accruals_outbox_poll_interval: Duration::from_millis(env_parse_or(
                "ACCRUALS_OUTBOX_POLL_INTERVAL_MS",
                10,
            )),
            accruals_outbox_workers_count: env_parse_or("ACCRUALS_OUTBOX_WORKERS_COUNT", 5),
            log_level: env::var("LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_to_default() {
        assert_eq!(env_or("ACCRUAL_RUNTIME_TEST_UNSET_KEY", "fallback"), "fallback");
    }

    #[test]
    fn env_parse_or_falls_back_on_missing_or_bad_value() {
        assert_eq!(env_parse_or::<u64>("ACCRUAL_RUNTIME_TEST_UNSET_KEY", 42), 42);
    }
}
