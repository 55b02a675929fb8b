use async_trait::async_trait;
use futures::stream::BoxStream;

/// Platform reachability signal.
///
/// Different platforms support different mechanisms:
/// - Native change notifications, exposed through `subscribe`
/// - Point-in-time checks only, which the connectivity monitor polls
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// Returns the probe identifier (e.g., "manual", "tcp").
    fn probe_name(&self) -> &'static str;

    /// Report whether the network is currently reachable.
    async fn is_reachable(&self) -> bool;

    /// Subscribe to native reachability notifications.
    ///
    /// Returns `None` when the platform has no push mechanism; the monitor then
    /// falls back to polling `is_reachable`.
    fn subscribe(&self) -> Option<BoxStream<'static, bool>>;
}
