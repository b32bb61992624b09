use super::ScanState;
use crate::camera::{CaptureSession, FrameSource};
use crate::config::ScannerConfig;
use crate::devices::{CaptureDevice, DeviceCatalog};
use crate::engine::{Attachment, DecodeEngine, StillImageEngine};
use crate::error::{CameraError, ScanError};
use crate::events::{EventBus, ScanEvent};
use crate::mode::ScanMode;
use crate::platform::MediaPlatform;
use crate::reporter::ResultReporter;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::SystemTime;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One scanning attempt: from `start` (or a still decode) to its outcome
pub(super) struct Attempt {
    pub(super) id: Uuid,
    pub(super) attachment: Option<Attachment>,
}

/// Drives one camera scanning session for the UI
pub struct ScanSessionController {
    pub(super) me: Weak<ScanSessionController>,
    pub(super) config: ScannerConfig,
    pub(super) catalog: DeviceCatalog,
    pub(super) session: tokio::sync::Mutex<CaptureSession>,
    pub(super) engine: DecodeEngine,
    pub(super) fallback_still: StillImageEngine,
    pub(super) reporter: Arc<dyn ResultReporter>,
    pub(super) event_bus: Arc<EventBus>,
    pub(super) transition: tokio::sync::Mutex<()>,
    pub(super) state_tx: watch::Sender<ScanState>,
    pub(super) generation: AtomicU64,
    pub(super) cancel: Mutex<CancellationToken>,
    pub(super) attempt: Mutex<Option<Attempt>>,
    pub(super) devices: Mutex<Vec<CaptureDevice>>,
    pub(super) current_index: Mutex<usize>,
}

impl ScanSessionController {
    pub fn new(
        platform: Arc<dyn MediaPlatform>,
        config: ScannerConfig,
        reporter: Arc<dyn ResultReporter>,
        event_bus: Arc<EventBus>,
    ) -> Arc<Self> {
        let engine = DecodeEngine::from_config(&config.engine, Some(Arc::clone(&event_bus)));
        info!(
            "Creating scan controller on {} with {} engine",
            platform.name(),
            engine.kind()
        );

        let (state_tx, _) = watch::channel(ScanState::Idle);

        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            catalog: DeviceCatalog::new(Arc::clone(&platform)),
            session: tokio::sync::Mutex::new(CaptureSession::new(
                platform,
                config.camera.clone(),
            )),
            engine,
            fallback_still: StillImageEngine::new(config.engine.clone()),
            reporter,
            event_bus,
            transition: tokio::sync::Mutex::new(()),
            state_tx,
            generation: AtomicU64::new(0),
            cancel: Mutex::new(CancellationToken::new()),
            attempt: Mutex::new(None),
            devices: Mutex::new(Vec::new()),
            current_index: Mutex::new(0),
            config,
        })
    }

    /// Snapshot of the current state
    pub fn state(&self) -> ScanState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ScanState> {
        self.state_tx.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<ScanEvent> {
        self.event_bus.subscribe()
    }

    /// Devices from the most recent enumeration
    pub fn devices(&self) -> Vec<CaptureDevice> {
        self.devices.lock().clone()
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub(super) async fn set_state(&self, state: ScanState) {
        let name = state.name();
        let previous = self.state_tx.send_replace(state);
        debug!("State {} -> {}", previous.name(), name);
        self.publish(ScanEvent::StateChanged {
            state: name.to_string(),
            timestamp: SystemTime::now(),
        })
        .await;
    }

    pub(super) async fn publish(&self, event: ScanEvent) {
        if let Err(e) = self.event_bus.publish(event).await {
            debug!("Event not delivered: {}", e);
        }
    }

    pub(super) fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(super) fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Fresh cancellation token for a new attempt; the previous one is cancelled
    pub(super) fn renew_cancel(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let previous = std::mem::replace(&mut *self.cancel.lock(), token.clone());
        previous.cancel();
        token
    }

    pub(super) fn cancel_attempt(&self) {
        self.cancel.lock().cancel();
    }

    /// Stop the engine of the current attempt. Nothing is delivered after
    /// this returns.
    pub(super) fn detach_engine(&self) {
        if let Some(attempt) = self.attempt.lock().as_mut() {
            if let Some(mut attachment) = attempt.attachment.take() {
                attachment.detach();
            }
        }
    }

    pub(super) fn end_attempt(&self) {
        self.detach_engine();
        if let Some(attempt) = self.attempt.lock().take() {
            debug!("Attempt {} ended", attempt.id);
        }
    }

    pub(super) fn attempt_id(&self) -> Option<Uuid> {
        self.attempt.lock().as_ref().map(|a| a.id)
    }

    pub(super) fn still_engine(&self) -> &StillImageEngine {
        match &self.engine {
            DecodeEngine::Still(engine) => engine,
            DecodeEngine::Continuous(_) => &self.fallback_still,
        }
    }

    /// Attach the continuous engine, if configured, to a freshly opened stream
    pub(super) fn attach_engine(&self, source: FrameSource, mode: ScanMode, generation: u64) {
        let DecodeEngine::Continuous(engine) = &self.engine else {
            debug!("Still engine configured; waiting for capture()");
            return;
        };

        let mut guard = self.attempt.lock();
        let Some(attempt) = guard.as_mut() else {
            warn!("No attempt to attach the engine to");
            return;
        };

        let mut attachment = engine.attach(source, mode, attempt.id);
        if let Some(receiver) = attachment.take_receiver() {
            let me = self.me.clone();
            tokio::spawn(async move {
                // Errors once the attachment is detached without a hit
                if let Ok(result) = receiver.await {
                    if let Some(controller) = me.upgrade() {
                        controller.on_detected(result, generation).await;
                    }
                }
            });
        }
        attempt.attachment = Some(attachment);
    }

    /// Enter Error with the fixed message of the camera error's kind
    pub(super) async fn fail(&self, error: CameraError) -> Result<(), ScanError> {
        let kind = error.kind();
        warn!("Scan attempt failed: {}", error);
        let message = kind.user_message().to_string();
        self.publish(ScanEvent::ScanFailed {
            kind,
            message: message.clone(),
        })
        .await;
        self.set_state(ScanState::Error { kind, message }).await;
        Err(error.into())
    }
}

impl Drop for ScanSessionController {
    fn drop(&mut self) {
        self.cancel_attempt();
        self.end_attempt();
        if let Ok(mut session) = self.session.try_lock() {
            session.close();
        }
    }
}
