//! Mutual exclusion of scheduler ticks across processes

use async_trait::async_trait;
use redis::{Client, Script};
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;

/// Proof of holding the tick lock, handed back on release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken(String);

impl LockToken {
    fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[async_trait]
pub trait TickLock: Send + Sync {
    /// Try to take the lock. `None` means another holder has it, which is not an error.
    async fn acquire(&self) -> Result<Option<LockToken>>;

    async fn release(&self, token: LockToken) -> Result<()>;
}

/// Lock for single-process deployments: always granted.
#[derive(Debug, Default)]
pub struct LocalTickLock;

#[async_trait]
impl TickLock for LocalTickLock {
    async fn acquire(&self) -> Result<Option<LockToken>> {
        Ok(Some(LockToken::random()))
    }

    async fn release(&self, _token: LockToken) -> Result<()> {
        Ok(())
    }
}

// Delete the key only if it still holds our token.
const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Redis lock: `SET key token NX PX ttl`, released by compare-and-delete.
///
/// The TTL bounds how long a crashed holder can block other instances.
pub struct RedisTickLock {
    client: Client,
    key: String,
    ttl_ms: u64,
}

impl RedisTickLock {
    pub fn new(client: Client, key: impl Into<String>, ttl_ms: u64) -> Self {
        Self {
            client,
            key: key.into(),
            ttl_ms,
        }
    }
}

#[async_trait]
impl TickLock for RedisTickLock {
    async fn acquire(&self) -> Result<Option<LockToken>> {
        let token = LockToken::random();
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(&self.key)
            .arg(token.as_str())
            .arg("NX")
            .arg("PX")
            .arg(self.ttl_ms)
            .query_async(&mut conn)
            .await?;
        match reply {
            Some(_) => Ok(Some(token)),
            None => {
                debug!("Tick lock {} held elsewhere", self.key);
                Ok(None)
            }
        }
    }

    async fn release(&self, token: LockToken) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let script = Script::new(RELEASE_SCRIPT);
        let deleted: i64 = script
            .key(&self.key)
            .arg(token.as_str())
            .invoke_async(&mut conn)
            .await?;
        if deleted == 0 {
            debug!("Tick lock {} expired before release", self.key);
        }
        Ok(())
    }
}
