#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use draft_keeper::{
    ConnectivityMonitor, DraftHandle, DraftSession, DraftStatus, DraftView, ManualProbe,
    MonitorConfig, SessionConfig, UploadError,
};
use draft_store_core::{DurableStore, MirrorStore, UploadHandler};
use draft_store_local::{MemoryDraftStore, MemoryMirrorStore};
use tokio::sync::{broadcast, watch};

/// Upload handler that records every call, fails on demand, and can be held open.
pub struct ScriptedUpload {
    calls: Mutex<Vec<String>>,
    fail: AtomicBool,
    open: watch::Sender<bool>,
}

impl Default for ScriptedUpload {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
            open: watch::channel(true).0,
        }
    }
}

impl ScriptedUpload {
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Uploads started from now on wait until `release`.
    pub fn hold(&self) {
        self.open.send_replace(false);
    }

    pub fn release(&self) {
        self.open.send_replace(true);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl UploadHandler for ScriptedUpload {
    async fn upload(&self, content: &str) -> Result<(), UploadError> {
        self.calls.lock().unwrap().push(content.to_string());
        let mut open = self.open.subscribe();
        let _ = open.wait_for(|open| *open).await;
        if self.fail.load(Ordering::SeqCst) {
            Err(UploadError::Rejected("503 Service Unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

pub struct Harness {
    pub handle: DraftHandle,
    pub durable: Arc<MemoryDraftStore>,
    pub mirror: Arc<MemoryMirrorStore>,
    pub probe: ManualProbe,
    pub uploads: Arc<ScriptedUpload>,
}

impl Harness {
    pub async fn start(durable: MemoryDraftStore, mirror: MemoryMirrorStore, online: bool) -> Self {
        Self::start_with_probe(durable, mirror, ManualProbe::new(online)).await
    }

    pub async fn start_with_probe(
        durable: MemoryDraftStore,
        mirror: MemoryMirrorStore,
        probe: ManualProbe,
    ) -> Self {
        let durable = Arc::new(durable);
        let mirror = Arc::new(mirror);
        let uploads = Arc::new(ScriptedUpload::default());
        let handle = spawn_session(
            durable.clone(),
            mirror.clone(),
            uploads.clone(),
            probe.clone(),
        )
        .await;

        Self {
            handle,
            durable,
            mirror,
            probe,
            uploads,
        }
    }

    pub fn view(&self) -> DraftView {
        self.handle.view()
    }

    /// Wait until the published state satisfies `pred`.
    pub async fn wait_for(&self, pred: impl FnMut(&DraftView) -> bool) -> DraftView {
        wait_for(&self.handle, pred).await
    }
}

pub async fn spawn_session(
    durable: Arc<dyn DurableStore>,
    mirror: Arc<dyn MirrorStore>,
    uploads: Arc<dyn UploadHandler>,
    probe: ManualProbe,
) -> DraftHandle {
    let monitor = ConnectivityMonitor::start(Arc::new(probe), MonitorConfig::default()).await;
    DraftSession::spawn(SessionConfig::default(), durable, mirror, uploads, monitor)
}

pub async fn wait_for(handle: &DraftHandle, pred: impl FnMut(&DraftView) -> bool) -> DraftView {
    let mut rx = handle.subscribe();
    let view = tokio::time::timeout(Duration::from_secs(60), rx.wait_for(pred))
        .await
        .expect("timed out waiting for draft state")
        .expect("draft session stopped");
    view.clone()
}

/// Every status transition received so far.
pub fn drain(rx: &mut broadcast::Receiver<DraftStatus>) -> Vec<DraftStatus> {
    let mut seen = Vec::new();
    while let Ok(status) = rx.try_recv() {
        seen.push(status);
    }
    seen
}
