use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use draft_store_core::DEFAULT_DRAFT_ID;
use draft_store_local::DEFAULT_MIRROR_PREFIX;

use crate::connectivity::{MonitorConfig, WatchMode};
use crate::session::SessionConfig;

/// Configuration for the draft-keeper console host.
#[derive(Parser, Debug, Clone)]
#[command(name = "draft-keeper")]
#[command(about = "Offline-first draft editor that hands drafts off once the network is back")]
pub struct Config {
    /// Draft identifier
    #[arg(long, default_value = DEFAULT_DRAFT_ID, env = "DRAFT_ID")]
    pub draft_id: String,

    /// Base directory for the durable store and the mirror
    #[arg(long, env = "DRAFT_STORAGE_DIR")]
    pub storage_dir: Option<PathBuf>,

    /// Namespace prefix for mirror keys
    #[arg(long, default_value = DEFAULT_MIRROR_PREFIX, env = "DRAFT_MIRROR_PREFIX")]
    pub mirror_prefix: String,

    /// Endpoint that receives submitted drafts (HTTP POST, JSON body)
    #[arg(long, env = "DRAFT_UPLOAD_URL")]
    pub upload_url: String,

    /// Upload request timeout (milliseconds)
    #[arg(long, default_value = "30000", env = "DRAFT_UPLOAD_TIMEOUT_MS")]
    pub upload_timeout_ms: u64,

    /// Reachability probe: manual (console `online`/`offline`) or tcp
    #[arg(long, default_value = "manual", env = "DRAFT_PROBE")]
    pub probe: ProbeKind,

    /// Address the tcp probe connects to
    #[arg(long, default_value = "1.1.1.1:443", env = "DRAFT_PROBE_ADDR")]
    pub probe_addr: String,

    /// Connectivity poll interval (milliseconds)
    #[arg(long, default_value = "1000", env = "DRAFT_POLL_INTERVAL_MS")]
    pub poll_interval_ms: u64,

    /// How reachability changes are detected
    #[arg(long, default_value = "auto", env = "DRAFT_WATCH_MODE")]
    pub watch_mode: WatchMode,

    /// How long transient statuses stay visible (milliseconds)
    #[arg(long, default_value = "2000", env = "DRAFT_STATUS_DISPLAY_MS")]
    pub status_display_ms: u64,

    /// Placeholder shown while the draft is empty
    #[arg(long, default_value = "Start typing...", env = "DRAFT_PLACEHOLDER")]
    pub placeholder: String,
}

impl Config {
    /// Get the effective storage directory.
    pub fn effective_storage_dir(&self) -> PathBuf {
        self.storage_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("draft-keeper")
        })
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            draft_id: self.draft_id.clone(),
            status_display: Duration::from_millis(self.status_display_ms),
            placeholder: self.placeholder.clone(),
        }
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_millis(self.upload_timeout_ms.max(1))
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            mode: self.watch_mode,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ProbeKind {
    Manual,
    Tcp,
}

impl std::fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeKind::Manual => write!(f, "manual"),
            ProbeKind::Tcp => write!(f, "tcp"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::parse_from(["draft-keeper", "--upload-url", "http://localhost/drafts"]);
        assert_eq!(config.draft_id, "default");
        assert_eq!(config.mirror_prefix, "draft_");
        assert_eq!(config.probe, ProbeKind::Manual);
        assert_eq!(config.watch_mode, WatchMode::Auto);

        let session = config.session_config();
        assert_eq!(session.status_display, Duration::from_millis(2000));

        let monitor = config.monitor_config();
        assert_eq!(monitor.poll_interval, Duration::from_millis(1000));
        assert_eq!(config.upload_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_upload_url_required() {
        assert!(Config::try_parse_from(["draft-keeper"]).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = Config::parse_from([
            "draft-keeper",
            "--upload-url",
            "http://localhost/drafts",
            "--draft-id",
            "post-7",
            "--probe",
            "tcp",
            "--watch-mode",
            "hybrid",
            "--poll-interval-ms",
            "250",
            "--storage-dir",
            "/tmp/drafts",
        ]);
        assert_eq!(config.draft_id, "post-7");
        assert_eq!(config.probe, ProbeKind::Tcp);
        assert_eq!(config.monitor_config().mode, WatchMode::Hybrid);
        assert_eq!(
            config.monitor_config().poll_interval,
            Duration::from_millis(250)
        );
        assert_eq!(config.effective_storage_dir(), PathBuf::from("/tmp/drafts"));
    }
}
