use super::{hints, DecodedResult, ResultSource};
use crate::camera::FrameSource;
use crate::config::EngineConfig;
use crate::decoder::DecoderSet;
use crate::events::{EventBus, ScanEvent};
use crate::frame::Region;
use crate::mode::ScanMode;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Highest sampling rate the poller will run at
pub const MAX_POLL_FPS: u32 = 240;

type Delivery = Arc<Mutex<Option<oneshot::Sender<DecodedResult>>>>;

/// Polls a live frame source and delivers the first hit
pub struct ContinuousEngine {
    config: EngineConfig,
    decoders: DecoderSet,
    event_bus: Option<Arc<EventBus>>,
}

impl ContinuousEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_decoders(config, DecoderSet::standard())
    }

    pub fn with_decoders(config: EngineConfig, decoders: DecoderSet) -> Self {
        Self {
            config,
            decoders,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Sampling interval for `mode`, honouring the configured override
    pub fn poll_interval(&self, mode: ScanMode) -> Duration {
        let fps = self
            .config
            .poll_fps
            .unwrap_or(mode.profile().target_fps)
            .clamp(1, MAX_POLL_FPS);
        Duration::from_micros(1_000_000 / fps as u64)
    }

    /// Start polling `source`. The returned attachment yields at most one
    /// result and stops the poller when detached or dropped.
    pub fn attach(&self, source: FrameSource, mode: ScanMode, attempt_id: Uuid) -> Attachment {
        let (sender, receiver) = oneshot::channel();
        let delivery: Delivery = Arc::new(Mutex::new(Some(sender)));
        let cancel = CancellationToken::new();

        let poller = Poller {
            source,
            mode,
            attempt_id,
            interval: self.poll_interval(mode),
            decoders: self.decoders.clone(),
            hints: hints(&self.config),
            degraded_after: self.config.degraded_after_errors,
            event_bus: self.event_bus.clone(),
            delivery: Arc::clone(&delivery),
            cancel: cancel.clone(),
        };

        info!(
            "Attaching continuous engine to {} for {} every {:?} (attempt {})",
            poller.source.device_id(),
            mode,
            poller.interval,
            attempt_id
        );

        let task = tokio::spawn(poller.run());

        Attachment {
            attempt_id,
            cancel,
            delivery,
            receiver: Some(receiver),
            task: Some(task),
        }
    }
}

struct Poller {
    source: FrameSource,
    mode: ScanMode,
    attempt_id: Uuid,
    interval: Duration,
    decoders: DecoderSet,
    hints: crate::decoder::DecodeHints,
    degraded_after: u32,
    event_bus: Option<Arc<EventBus>>,
    delivery: Delivery,
    cancel: CancellationToken,
}

impl Poller {
    async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut consecutive_errors = 0u32;
        let mut degraded_reported = false;
        let mut frames = 0u64;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("Continuous engine cancelled after {} frames", frames);
                    break;
                }
                _ = ticker.tick() => {}
            }

            if !self.source.is_live() {
                debug!("Frame source {} is no longer live", self.source.device_id());
                break;
            }

            let frame = match self.source.grab().await {
                Ok(Some(frame)) => {
                    consecutive_errors = 0;
                    frame
                }
                Ok(None) => {
                    trace!("No frame ready");
                    continue;
                }
                Err(e) => {
                    consecutive_errors += 1;
                    trace!("Frame grab failed ({} in a row): {}", consecutive_errors, e);
                    if consecutive_errors >= self.degraded_after && !degraded_reported {
                        degraded_reported = true;
                        self.report_degraded(consecutive_errors).await;
                    }
                    continue;
                }
            };
            frames += 1;

            let decoders = self.decoders.clone();
            let hints = self.hints;
            let mode = self.mode;
            let hit = tokio::task::spawn_blocking(move || {
                let luma = frame.to_luma()?;
                let roi = Region::centered(mode.profile().roi, luma.width, luma.height);
                decoders.scan(&luma, Some(roi), mode.allow_list(), &hints)
            })
            .await;

            let hit = match hit {
                Ok(Some(hit)) => hit,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Decode task failed: {}", e);
                    continue;
                }
            };

            if self.cancel.is_cancelled() {
                break;
            }

            let result = DecodedResult::new(
                hit.text,
                hit.symbology,
                ResultSource::Live,
                self.attempt_id,
            );
            if let Some(sender) = self.delivery.lock().take() {
                debug!("Delivering {} result for attempt {}", result.format, self.attempt_id);
                let _ = sender.send(result);
            }
            break;
        }
    }

    async fn report_degraded(&self, consecutive_errors: u32) {
        warn!(
            "Frame source {} failed {} times in a row",
            self.source.device_id(),
            consecutive_errors
        );
        if let Some(bus) = &self.event_bus {
            let _ = bus
                .publish(ScanEvent::EngineDegraded {
                    device_id: self.source.device_id().to_string(),
                    consecutive_errors,
                })
                .await;
        }
    }
}

/// Link between one attempt and its poller
pub struct Attachment {
    attempt_id: Uuid,
    cancel: CancellationToken,
    delivery: Delivery,
    receiver: Option<oneshot::Receiver<DecodedResult>>,
    task: Option<JoinHandle<()>>,
}

impl Attachment {
    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    /// Take the result receiver. Resolves with the first hit, or errors once
    /// the attachment is detached without one.
    pub fn take_receiver(&mut self) -> Option<oneshot::Receiver<DecodedResult>> {
        self.receiver.take()
    }

    /// Stop polling. No result is delivered after this returns.
    pub fn detach(&mut self) {
        self.cancel.cancel();
        // Dropping the sender under the lock excludes a racing delivery
        drop(self.delivery.lock().take());
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Detached continuous engine (attempt {})", self.attempt_id);
        }
    }

    pub fn is_detached(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for Attachment {
    fn drop(&mut self) {
        self.detach();
    }
}
