use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
    time::timeout,
};

#[async_trait]
pub trait CacheClient: Send + Sync {
    /// Liveness round trip, failing if it does not complete within `limit`
    async fn ping(&self, limit: Duration) -> Result<()>;
}

/// Speaks just enough RESP to issue `PING` against a redis-compatible cache.
///
/// A fresh connection is opened for every ping so a wedged socket never
/// outlives one probe iteration.
pub struct RespCache {
    endpoint: String,
}

impl RespCache {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into() }
    }

    async fn round_trip(&self) -> Result<()> {
        let mut stream = TcpStream::connect(&self.endpoint)
            .await
            .map_err(|e| anyhow!("dial tcp {}: {}", self.endpoint, e))?;
        stream.write_all(b"*1\r\n$4\r\nPING\r\n").await?;

        let mut reply = String::new();
        BufReader::new(&mut stream).read_line(&mut reply).await?;

        match reply.trim_end() {
            "+PONG" => Ok(()),
            "" => bail!("connection closed by {}", self.endpoint),
            other => match other.strip_prefix('-') {
                Some(message) => bail!("{message}"),
                None => bail!("unexpected reply to PING: {other}"),
            },
        }
    }
}

#[async_trait]
impl CacheClient for RespCache {
    async fn ping(&self, limit: Duration) -> Result<()> {
        timeout(limit, self.round_trip())
            .await
            .map_err(|_| anyhow!("ping {} timed out after {}", self.endpoint, humantime::format_duration(limit)))?
    }
}
