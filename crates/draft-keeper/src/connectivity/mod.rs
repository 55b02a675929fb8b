//! Connectivity monitoring.
//!
//! The monitor keeps one process-wide reachability boolean and notifies subscribers only
//! when it actually flips. Native push notifications are consumed as they arrive; polling
//! is used where push is absent, and alongside push where push is unreliable.

mod manual;
mod monitor;
mod tcp;

pub use manual::ManualProbe;
pub use monitor::{Connectivity, ConnectivityMonitor, MonitorConfig, WatchMode};
pub use tcp::TcpProbe;
