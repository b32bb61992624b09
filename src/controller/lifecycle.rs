use super::machine::Attempt;
use super::{ScanSessionController, ScanState};
use crate::devices::default_index;
use crate::engine::DecodedResult;
use crate::error::{Result, ScanError};
use crate::events::ScanEvent;
use crate::mode::ScanMode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

impl ScanSessionController {
    /// Begin a scanning attempt in `mode`.
    ///
    /// Camera failures leave the controller in Error and are returned. A
    /// `stop()` issued while the stream is still opening wins: the fresh
    /// stream is closed and the controller returns to Idle.
    pub async fn start(&self, mode: ScanMode) -> Result<()> {
        let _transition = self.transition.lock().await;

        let state = self.state();
        if !state.is_idle() {
            return Err(ScanError::invalid_transition("start", state.name()));
        }

        let token = self.renew_cancel();
        let generation = self.next_generation();
        let attempt_id = Uuid::new_v4();
        *self.attempt.lock() = Some(Attempt {
            id: attempt_id,
            attachment: None,
        });
        info!("Starting {} scan (attempt {})", mode, attempt_id);
        self.set_state(ScanState::RequestingPermission { mode }).await;

        let devices = match self.catalog.list().await {
            Ok(devices) => devices,
            Err(e) => {
                self.end_attempt();
                return self.fail(e).await;
            }
        };
        self.publish(ScanEvent::DevicesEnumerated {
            count: devices.len(),
            generation: self.catalog.generation(),
        })
        .await;

        if token.is_cancelled() {
            return self.abandon_start().await;
        }

        let index = default_index(&devices, self.config.camera.preferred_index);
        *self.devices.lock() = devices;
        *self.current_index.lock() = index;

        self.open_current(mode, generation, &token).await
    }

    /// Open the device at the current index and attach the engine
    async fn open_current(
        &self,
        mode: ScanMode,
        generation: u64,
        token: &CancellationToken,
    ) -> Result<()> {
        let device = {
            let devices = self.devices.lock();
            let index = *self.current_index.lock();
            match devices.get(index) {
                Some(device) => device.clone(),
                None => return Err(ScanError::system("selected device index out of range")),
            }
        };

        let mut session = self.session.lock().await;
        let opened = session.open(&device, mode).await;

        if token.is_cancelled() {
            debug!("Attempt cancelled while opening {}", device.id);
            session.close();
            drop(session);
            return self.abandon_start().await;
        }

        let capabilities = match opened {
            Ok(capabilities) => capabilities,
            Err(e) => {
                session.close();
                drop(session);
                self.end_attempt();
                return self.fail(e).await;
            }
        };

        let settings = session.settings();
        let torch_on = session.torch_enabled();
        let zoom = session.zoom_level();
        let source = session.frame_source();
        drop(session);

        if let Some(settings) = settings {
            self.publish(ScanEvent::CameraOpened {
                device_id: device.id.clone(),
                label: device.label.clone(),
                width: settings.width,
                height: settings.height,
            })
            .await;
        }

        if let Some(source) = source {
            self.attach_engine(source, mode, generation);
        }

        self.set_state(ScanState::Scanning {
            mode,
            device,
            capabilities,
            torch_on,
            zoom,
        })
        .await;
        Ok(())
    }

    async fn abandon_start(&self) -> Result<()> {
        self.end_attempt();
        self.session.lock().await.close();
        self.set_state(ScanState::Idle).await;
        Ok(())
    }

    /// Close any session and return a live attempt to Idle. Never fails and
    /// may be called in any state.
    pub async fn stop(&self) {
        // cancel before queueing so an in-flight start sees it
        self.cancel_attempt();
        let _transition = self.transition.lock().await;

        self.detach_engine();
        self.session.lock().await.close();

        let state = self.state();
        if matches!(
            state,
            ScanState::Scanning { .. } | ScanState::RequestingPermission { .. }
        ) {
            self.next_generation();
            self.end_attempt();
            info!("Scan stopped");
            self.set_state(ScanState::Idle).await;
        } else {
            debug!("Stop requested while {}", state.name());
        }
    }

    /// Discard the result, outcome or error and return to Idle
    pub async fn reset(&self) -> Result<()> {
        let _transition = self.transition.lock().await;

        let state = self.state();
        match state {
            ScanState::Idle => Ok(()),
            ScanState::Detected { .. } | ScanState::Reporting { .. } | ScanState::Error { .. } => {
                self.next_generation();
                self.end_attempt();
                self.session.lock().await.close();
                self.set_state(ScanState::Idle).await;
                Ok(())
            }
            _ => Err(ScanError::invalid_transition("reset", state.name())),
        }
    }

    /// Move to the next device (wrapping) in the same mode
    pub async fn switch_camera(&self) -> Result<()> {
        let _transition = self.transition.lock().await;

        let state = self.state();
        let ScanState::Scanning { mode, .. } = &state else {
            return Err(ScanError::invalid_transition("switch camera", state.name()));
        };
        let mode = *mode;

        let count = self.devices.lock().len();
        if count <= 1 {
            debug!("Only {} device(s); switch ignored", count);
            return Ok(());
        }

        self.detach_engine();
        self.session.lock().await.close();

        let index = {
            let mut current = self.current_index.lock();
            *current = (*current + 1) % count;
            *current
        };
        let generation = self.next_generation();
        let token = self.cancel.lock().clone();

        self.open_current(mode, generation, &token).await?;

        if let ScanState::Scanning { device, .. } = self.state() {
            info!("Switched to {} ({})", device.label, index);
            self.publish(ScanEvent::CameraSwitched {
                device_id: device.id,
                label: device.label,
            })
            .await;
        }
        Ok(())
    }

    /// Cancel, detach and close. Leaves the controller Idle.
    pub async fn shutdown(&self) {
        self.cancel_attempt();
        let _transition = self.transition.lock().await;

        self.next_generation();
        self.end_attempt();
        self.session.lock().await.close();
        if !self.state().is_idle() {
            self.set_state(ScanState::Idle).await;
        }
        info!("Scan controller shut down");
    }

    /// First live hit of an attempt
    pub(super) async fn on_detected(&self, result: DecodedResult, generation: u64) {
        let transition = self.transition.lock().await;

        if !self.is_current(generation) || !self.state().is_scanning() {
            debug!(
                "Discarding stale {} result from attempt {}",
                result.format, result.attempt_id
            );
            return;
        }

        self.enter_detected(result.clone()).await;
        drop(transition);

        self.report(result, generation).await;
    }

    /// Release the camera, then Detected -> Reporting. Caller holds the
    /// transition lock.
    pub(super) async fn enter_detected(&self, result: DecodedResult) {
        self.detach_engine();
        self.session.lock().await.close();

        info!(
            "Detected {} code from {} source",
            result.format, result.source
        );
        self.publish(ScanEvent::CodeDetected {
            result: result.clone(),
        })
        .await;
        self.set_state(ScanState::Detected {
            result: result.clone(),
            outcome: None,
        })
        .await;
        self.set_state(ScanState::Reporting { result }).await;
    }

    /// Forward the code to the backend and record the outcome if the attempt
    /// is still current. Called without the transition lock.
    pub(super) async fn report(&self, result: DecodedResult, generation: u64) {
        let outcome = self.reporter.report(&result.text).await;

        let _transition = self.transition.lock().await;
        if !self.is_current(generation) || !matches!(self.state(), ScanState::Reporting { .. }) {
            debug!("Attempt {} moved on; outcome discarded", result.attempt_id);
            return;
        }

        if !outcome.success {
            warn!("Backend report failed: {}", outcome.message);
        }
        self.publish(ScanEvent::ReportCompleted {
            code: result.text.clone(),
            outcome: outcome.clone(),
        })
        .await;
        self.end_attempt();
        self.set_state(ScanState::Detected {
            result,
            outcome: Some(outcome),
        })
        .await;
    }
}
