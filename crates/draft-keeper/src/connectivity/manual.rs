use std::sync::Arc;

use async_trait::async_trait;
use draft_store_core::ReachabilityProbe;
use futures::stream::{BoxStream, StreamExt};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::debug;

/// Reachability probe driven by the host.
///
/// The host reports reachability with `set_online`, typically from a platform callback
/// or a console command. Clones share state.
///
/// A probe built with `without_push` only answers point-in-time checks, modelling
/// platforms whose change notifications are missing.
#[derive(Debug, Clone)]
pub struct ManualProbe {
    state: Arc<watch::Sender<bool>>,
    push: bool,
}

impl ManualProbe {
    /// Create a push-capable probe with the given initial reachability.
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self {
            state: Arc::new(tx),
            push: true,
        }
    }

    /// Create a probe that offers no change notifications.
    pub fn without_push(online: bool) -> Self {
        Self {
            push: false,
            ..Self::new(online)
        }
    }

    /// Report a reachability observation.
    pub fn set_online(&self, online: bool) {
        debug!("Manual probe reports online={}", online);
        self.state.send_replace(online);
    }

    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }
}

#[async_trait]
impl ReachabilityProbe for ManualProbe {
    fn probe_name(&self) -> &'static str {
        "manual"
    }

    async fn is_reachable(&self) -> bool {
        self.is_online()
    }

    fn subscribe(&self) -> Option<BoxStream<'static, bool>> {
        if !self.push {
            return None;
        }
        Some(WatchStream::new(self.state.subscribe()).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_push_stream_follows_updates() {
        let probe = ManualProbe::new(true);
        let mut stream = probe.subscribe().unwrap();

        assert_eq!(stream.next().await, Some(true));
        probe.set_online(false);
        assert_eq!(stream.next().await, Some(false));
        assert!(!probe.is_reachable().await);
    }

    #[tokio::test]
    async fn test_without_push() {
        let probe = ManualProbe::without_push(false);
        assert!(probe.subscribe().is_none());

        probe.clone().set_online(true);
        assert!(probe.is_reachable().await);
    }
}
