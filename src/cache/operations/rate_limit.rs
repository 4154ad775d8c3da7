use async_trait::async_trait;
use redis::{Client as RedisClient, Script, aio::MultiplexedConnection};

use super::{StoreBackend, WindowStore};
use crate::cache::models::Admission;
use crate::error::StoreError;

/// Prune, count, conditional insert and expiry refresh, run by the server as one unit.
///
/// KEYS[1] window key; ARGV: now_ms, window_ms, max_count, unique member.
const ADMIT_SCRIPT: &str = r"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local max = tonumber(ARGV[3])
redis.call('ZREMRANGEBYSCORE', key, '-inf', '(' .. (now - window))
local count = redis.call('ZCARD', key)
if count < max then
  redis.call('ZADD', key, now, ARGV[4])
  redis.call('PEXPIRE', key, window)
  return {1, count}
end
if count > 0 then
  redis.call('PEXPIRE', key, window)
end
return {0, count}
";

/// Sorted-set window store shared by every relay process pointing at the same Redis.
pub struct RedisWindowStore {
    conn: MultiplexedConnection,
    script: Script,
}

impl RedisWindowStore {
    /// Opens a connection and checks it answers before the store is used.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = RedisClient::open(url)?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        Ok(Self {
            conn,
            script: Script::new(ADMIT_SCRIPT),
        })
    }
}

#[async_trait]
impl WindowStore for RedisWindowStore {
    async fn admit(
        &self,
        key: &str,
        now_ms: i64,
        window_ms: u64,
        max_count: u32,
    ) -> Result<Admission, StoreError> {
        let mut conn = self.conn.clone();
        let member = format!("{}-{}", now_ms, uuid::Uuid::new_v4());

        let reply: Vec<i64> = self
            .script
            .key(key)
            .arg(now_ms)
            .arg(window_ms)
            .arg(max_count)
            .arg(member)
            .invoke_async(&mut conn)
            .await?;

        parse_admission(&reply)
    }

    fn backend(&self) -> StoreBackend {
        StoreBackend::Shared
    }
}

fn parse_admission(reply: &[i64]) -> Result<Admission, StoreError> {
    match reply {
        [flag, count] if *count >= 0 => Ok(Admission {
            admitted: *flag == 1,
            count_before: *count as u64,
        }),
        other => Err(StoreError::Reply(format!("{:?}", other))),
    }
}
