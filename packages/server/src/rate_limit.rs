//! Token-bucket rate limiting against the shared Redis store.
//!
//! One bucket per API key, capacity = refill-per-minute = tier limit. The
//! read-refill-decrement step runs as a server-side Lua script so concurrent
//! callers cannot double-spend a token.

use std::time::{SystemTime, UNIX_EPOCH};

use common::types::AccountTier;
use redis::Script;

use crate::config::RateLimitConfig;

const BUCKET_TTL_SECS: usize = 120;

/// Outcome of one limiter check, also the source of the
/// `X-RateLimit-{Limit,Remaining,Reset}` headers.
#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Epoch seconds when the bucket is refilled.
    pub reset: i64,
}

#[derive(Clone)]
pub struct RateLimiter {
    client: redis::Client,
}

impl RateLimiter {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    /// Spend one token from the key's bucket, refilling first.
    pub async fn check(&self, key_id: &str, capacity: u32) -> redis::RedisResult<RateDecision> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        let script = Script::new(
            r#"
local bucket = KEYS[1]
local now = tonumber(ARGV[1])
local capacity = tonumber(ARGV[2])
local refill = tonumber(ARGV[3])
local ttl = tonumber(ARGV[4])

local data = redis.call('HMGET', bucket, 'tokens', 'ts')
local tokens = tonumber(data[1]) or capacity
local ts = tonumber(data[2]) or now

local delta = math.max(0, now - ts)
local new_tokens = math.min(capacity, tokens + (delta * refill / 60))

local allowed = 0
if new_tokens >= 1 then
  new_tokens = new_tokens - 1
  allowed = 1
end

redis.call('HMSET', bucket, 'tokens', new_tokens, 'ts', now)
redis.call('EXPIRE', bucket, ttl)
return {allowed, math.floor(new_tokens)}
"#,
        );

        let (allowed, remaining): (i64, i64) = script
            .key(format!("rl:{}", key_id))
            .arg(now)
            .arg(capacity)
            .arg(capacity)
            .arg(BUCKET_TTL_SECS)
            .invoke_async(&mut conn)
            .await?;

        let remaining = remaining.max(0) as u32;
        Ok(RateDecision {
            allowed: allowed == 1,
            limit: capacity,
            remaining,
            reset: now + refill_eta_secs(capacity, remaining),
        })
    }
}

/// Seconds until a bucket with `remaining` tokens is back at capacity.
fn refill_eta_secs(capacity: u32, remaining: u32) -> i64 {
    if capacity == 0 || remaining >= capacity {
        return 0;
    }
    let missing = (capacity - remaining) as u64;
    // refill rate is capacity per 60 s
    (missing * 60).div_ceil(capacity as u64) as i64
}

/// Bucket capacity for a tier under the configured limits.
pub fn tier_capacity(config: &RateLimitConfig, tier: AccountTier) -> u32 {
    match tier {
        AccountTier::Free => config.free,
        AccountTier::Pro => config.pro,
        AccountTier::Enterprise => config.enterprise,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> RateLimitConfig {
        RateLimitConfig {
            free: 60,
            pro: 600,
            enterprise: 6000,
        }
    }

    #[test]
    fn test_tier_capacities() {
        let config = limits();
        assert_eq!(tier_capacity(&config, AccountTier::Free), 60);
        assert_eq!(tier_capacity(&config, AccountTier::Pro), 600);
        assert_eq!(tier_capacity(&config, AccountTier::Enterprise), 6000);
    }

    #[test]
    fn test_refill_eta() {
        // Full bucket refills in zero seconds.
        assert_eq!(refill_eta_secs(60, 60), 0);
        // Empty free-tier bucket takes a full minute.
        assert_eq!(refill_eta_secs(60, 0), 60);
        // One token missing refills within a second.
        assert_eq!(refill_eta_secs(60, 59), 1);
        assert_eq!(refill_eta_secs(0, 0), 0);
    }
}
