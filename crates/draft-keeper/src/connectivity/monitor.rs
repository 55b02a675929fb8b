use std::sync::Arc;
use std::time::Duration;

use draft_store_core::ReachabilityProbe;
use futures::stream::{BoxStream, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// How reachability changes are detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum WatchMode {
    /// Push when the probe offers it, otherwise poll.
    #[default]
    Auto,
    /// Push only. Falls back to polling if the probe cannot push.
    Push,
    /// Poll only, ignoring any push mechanism.
    Poll,
    /// Push and poll together, for platforms where push is unreliable.
    Hybrid,
}

impl std::fmt::Display for WatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchMode::Auto => write!(f, "auto"),
            WatchMode::Push => write!(f, "push"),
            WatchMode::Poll => write!(f, "poll"),
            WatchMode::Hybrid => write!(f, "hybrid"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    pub mode: WatchMode,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            mode: WatchMode::Auto,
        }
    }
}

/// Last known reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connectivity {
    pub online: bool,
    /// When the freshest reading was taken, flip or not. Never persisted.
    ///
    /// With both sources active, a poll tick is skipped while this is younger than
    /// half a poll interval.
    pub observed_at: Instant,
}

/// Watches a reachability probe and publishes flips on a single channel.
///
/// Push notifications and poll results feed the same `watch` channel; an observation
/// that matches the current value refreshes `observed_at` without waking subscribers.
pub struct ConnectivityMonitor {
    state: watch::Receiver<Connectivity>,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl ConnectivityMonitor {
    /// Take an initial reading from `probe` and start watching it.
    pub async fn start(probe: Arc<dyn ReachabilityProbe>, config: MonitorConfig) -> Self {
        let online = probe.is_reachable().await;
        let (tx, rx) = watch::channel(Connectivity {
            online,
            observed_at: Instant::now(),
        });

        let push = match config.mode {
            WatchMode::Poll => None,
            WatchMode::Auto | WatchMode::Push | WatchMode::Hybrid => probe.subscribe(),
        };
        let poll = match config.mode {
            WatchMode::Poll | WatchMode::Hybrid => true,
            WatchMode::Auto => push.is_none(),
            WatchMode::Push => {
                if push.is_none() {
                    warn!(
                        "Probe {} offers no push notifications, polling instead",
                        probe.probe_name()
                    );
                }
                push.is_none()
            }
        };

        info!(
            "Connectivity monitor started (probe {}, mode {}, push {}, poll {}, online {})",
            probe.probe_name(),
            config.mode,
            push.is_some(),
            poll,
            online
        );

        let task = tokio::spawn(watch_loop(probe, tx, push, poll, config.poll_interval));

        Self { state: rx, task }
    }

    pub fn is_online(&self) -> bool {
        self.state.borrow().online
    }

    pub fn current(&self) -> Connectivity {
        *self.state.borrow()
    }

    /// Subscribe to reachability flips.
    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.state.clone()
    }

    /// Stop watching: drops the push subscription and cancels polling.
    pub fn shutdown(&self) {
        if !self.task.is_finished() {
            self.task.abort();
            debug!("Connectivity monitor stopped");
        }
    }
}

impl Drop for ConnectivityMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Record one reading taken at `taken_at`. Returns whether it was a flip.
fn observe(
    state: &watch::Sender<Connectivity>,
    online: bool,
    taken_at: Instant,
    source: &str,
) -> bool {
    let flipped = state.send_if_modified(|current| {
        current.observed_at = current.observed_at.max(taken_at);
        if current.online == online {
            return false;
        }
        current.online = online;
        true
    });
    if flipped {
        info!(
            "Connectivity changed to {} (via {})",
            if online { "online" } else { "offline" },
            source
        );
    }
    flipped
}

async fn watch_loop(
    probe: Arc<dyn ReachabilityProbe>,
    state: watch::Sender<Connectivity>,
    mut push: Option<BoxStream<'static, bool>>,
    mut poll: bool,
    poll_interval: Duration,
) {
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the initial reading was taken in `start`
    ticker.tick().await;

    loop {
        let push_enabled = push.is_some();

        tokio::select! {
            item = next_push(&mut push), if push_enabled => match item {
                Some(online) => {
                    observe(&state, online, Instant::now(), "push");
                }
                None => {
                    warn!(
                        "Push notifications from probe {} ended, polling instead",
                        probe.probe_name()
                    );
                    push = None;
                    poll = true;
                    ticker.reset();
                }
            },
            _ = ticker.tick(), if poll => {
                let started = Instant::now();
                if push_enabled && started.duration_since(state.borrow().observed_at) < poll_interval / 2 {
                    debug!("Skipping poll of {}: push reading is fresh", probe.probe_name());
                    continue;
                }
                let online = probe.is_reachable().await;
                observe(&state, online, started, "poll");
            }
        }
    }
}

async fn next_push(push: &mut Option<BoxStream<'static, bool>>) -> Option<bool> {
    match push.as_mut() {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}
