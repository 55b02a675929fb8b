use std::time::Duration;

use async_trait::async_trait;
use draft_store_core::ReachabilityProbe;
use futures::stream::BoxStream;
use tokio::net::TcpStream;
use tracing::{debug, instrument};

/// Reachability probe that attempts a TCP connection.
///
/// There is no portable push mechanism for this, so the probe only answers
/// point-in-time checks and the monitor polls it.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    addr: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ReachabilityProbe for TcpProbe {
    fn probe_name(&self) -> &'static str {
        "tcp"
    }

    #[instrument(skip(self), level = "trace", fields(addr = %self.addr))]
    async fn is_reachable(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                debug!("TCP probe to {} failed: {}", self.addr, e);
                false
            }
            Err(_) => {
                debug!("TCP probe to {} timed out after {:?}", self.addr, self.timeout);
                false
            }
        }
    }

    fn subscribe(&self) -> Option<BoxStream<'static, bool>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_reachable_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let probe = TcpProbe::new(addr.to_string(), Duration::from_secs(1));
        assert!(probe.is_reachable().await);
        assert!(probe.subscribe().is_none());
    }

    #[tokio::test]
    async fn test_closed_port_is_unreachable() {
        // Bind then drop to get a port nobody listens on
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let probe = TcpProbe::new(addr.to_string(), Duration::from_secs(1));
        assert!(!probe.is_reachable().await);
    }
}
