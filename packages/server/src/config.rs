use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Listen address for the HTTP API, e.g. "0.0.0.0:8080".
    pub bind: String,
    /// Unique id of this process instance, used for cross-server tunnel
    /// routing. Must differ between instances sharing one Redis.
    pub id: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Process-wide signing secret, used when a subscriber has no
    /// per-subscriber webhook secret configured.
    pub hmac_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    /// Requests per minute for free-tier keys.
    pub free: u32,
    pub pro: u32,
    pub enterprise: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    /// Number of concurrent delivery worker tasks.
    pub concurrency: usize,
    /// Wall-clock budget for a single job, seconds.
    pub job_timeout_secs: u64,
    /// Sleep between polls when both lanes are idle, milliseconds.
    pub poll_interval_ms: u64,
    /// Consecutive high-lane jobs served before draining one normal-lane
    /// job, the starvation guard.
    pub high_lane_burst: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TunnelConfig {
    /// Heartbeat ping interval, seconds. The grace period equals one
    /// interval.
    pub heartbeat_secs: u64,
    /// Per-connection outbound message channel capacity.
    pub queue_capacity: usize,
    /// Deadline for the auth handshake after the socket upgrade, seconds.
    pub handshake_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DeliveryConfig {
    /// Total deadline for one webhook POST including connect, seconds.
    pub timeout_secs: u64,
    /// Maximum serialized signal body size, bytes.
    pub max_body_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub worker: WorkerConfig,
    pub tunnel: TunnelConfig,
    pub delivery: DeliveryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.bind", "0.0.0.0:8080")?
            .set_default("server.id", common::ids::generate("srv"))?
            .set_default("database.url", "postgres://localhost:5432/herald")?
            .set_default("redis.url", "redis://localhost:6379")?
            .set_default("auth.hmac_secret", "")?
            .set_default("rate_limit.free", 60_i64)?
            .set_default("rate_limit.pro", 600_i64)?
            .set_default("rate_limit.enterprise", 6000_i64)?
            .set_default("worker.concurrency", 8_i64)?
            .set_default("worker.job_timeout_secs", 60_i64)?
            .set_default("worker.poll_interval_ms", 500_i64)?
            .set_default("worker.high_lane_burst", 32_i64)?
            .set_default("tunnel.heartbeat_secs", 30_i64)?
            .set_default("tunnel.queue_capacity", 64_i64)?
            .set_default("tunnel.handshake_timeout_secs", 10_i64)?
            .set_default("delivery.timeout_secs", 30_i64)?
            .set_default("delivery.max_body_bytes", 1_048_576_i64)?
            // Load from config/herald.toml when present
            .add_source(File::with_name("config/herald").required(false))
            // Override from environment (e.g., HERALD__DATABASE__URL)
            .add_source(Environment::with_prefix("HERALD").separator("__"));

        // Flat environment names used by deployments.
        for (var, key) in [
            ("DATABASE_URL", "database.url"),
            ("REDIS_URL", "redis.url"),
            ("SERVER_ID", "server.id"),
            ("HERALD_API_BIND", "server.bind"),
            ("HERALD_WORKER_CONCURRENCY", "worker.concurrency"),
            ("HERALD_HMAC_SECRET", "auth.hmac_secret"),
            ("HERALD_RATE_LIMIT_FREE", "rate_limit.free"),
            ("HERALD_RATE_LIMIT_PRO", "rate_limit.pro"),
            ("HERALD_RATE_LIMIT_ENT", "rate_limit.enterprise"),
        ] {
            builder = builder.set_override_option(key, std::env::var(var).ok())?;
        }

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_load() {
        let config = AppConfig::load().expect("defaults should produce a valid config");
        assert_eq!(config.worker.high_lane_burst, 32);
        assert_eq!(config.tunnel.queue_capacity, 64);
        assert_eq!(config.tunnel.heartbeat_secs, 30);
        assert_eq!(config.delivery.timeout_secs, 30);
        assert!(config.server.id.starts_with("srv_") || !config.server.id.is_empty());
    }
}
