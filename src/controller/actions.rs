use super::machine::Attempt;
use super::{ScanSessionController, ScanState};
use crate::engine::DecodedResult;
use crate::error::{CapabilityError, DecodeError, Result, ScanError};
use crate::events::ScanEvent;
use crate::mode::ScanMode;
use tracing::{debug, info};
use uuid::Uuid;

impl ScanSessionController {
    /// Flip the torch of the live camera. Returns the new torch state.
    ///
    /// Outside Scanning, or while a transition holds the session, this is a
    /// no-op reported as [`CapabilityError::SessionNotOpen`].
    pub async fn toggle_torch(&self) -> std::result::Result<bool, CapabilityError> {
        let ScanState::Scanning { torch_on, .. } = self.state() else {
            debug!("Torch toggle ignored outside scanning");
            return Err(CapabilityError::SessionNotOpen);
        };

        let applied = match self.session.try_lock() {
            Ok(mut session) => session.set_torch(!torch_on).await,
            Err(_) => Err(CapabilityError::SessionNotOpen),
        };

        match applied {
            Ok(enabled) => {
                self.state_tx.send_if_modified(|state| match state {
                    ScanState::Scanning { torch_on, .. } => {
                        *torch_on = enabled;
                        true
                    }
                    _ => false,
                });
                Ok(enabled)
            }
            Err(e) => {
                self.capability_failed("toggle_torch", &e).await;
                Err(e)
            }
        }
    }

    /// Zoom the live camera, clamped and snapped to the hardware step.
    /// Returns the applied level.
    pub async fn set_zoom(&self, level: f64) -> std::result::Result<f64, CapabilityError> {
        if !self.state().is_scanning() {
            debug!("Zoom ignored outside scanning");
            return Err(CapabilityError::SessionNotOpen);
        }

        let applied = match self.session.try_lock() {
            Ok(mut session) => session.apply_zoom(level).await,
            Err(_) => Err(CapabilityError::SessionNotOpen),
        };

        match applied {
            Ok(level) => {
                self.state_tx.send_if_modified(|state| match state {
                    ScanState::Scanning { zoom, .. } => {
                        *zoom = Some(level);
                        true
                    }
                    _ => false,
                });
                Ok(level)
            }
            Err(e) => {
                self.capability_failed("set_zoom", &e).await;
                Err(e)
            }
        }
    }

    async fn capability_failed(&self, action: &str, error: &CapabilityError) {
        match error {
            CapabilityError::SessionNotOpen => {
                debug!("{} discarded: {}", action, error);
                self.publish(ScanEvent::SessionNotOpen {
                    action: action.to_string(),
                })
                .await;
            }
            _ => {
                info!("{} unavailable: {}", action, error);
                self.publish(ScanEvent::CapabilityUnavailable { kind: error.kind() })
                    .await;
            }
        }
    }

    /// Grab one frame from the live camera and run a still decode on it.
    ///
    /// A hit follows the detection path and is returned once the backend
    /// has answered. `NoCodeFound` leaves the controller Scanning.
    pub async fn capture(&self) -> Result<DecodedResult> {
        let transition = self.transition.lock().await;

        let state = self.state();
        let ScanState::Scanning { mode, .. } = &state else {
            return Err(ScanError::invalid_transition("capture", state.name()));
        };
        let mode = *mode;

        let frame = self.session.lock().await.grab_frame().await;
        let Some(frame) = frame else {
            debug!("No frame available for capture");
            return Err(DecodeError::NoCodeFound.into());
        };

        let attempt_id = self.attempt_id().unwrap_or_else(Uuid::new_v4);
        let result = self
            .still_engine()
            .decode_frame(frame, mode, attempt_id)
            .await?;

        let generation = self.next_generation();
        self.enter_detected(result.clone()).await;
        drop(transition);

        self.report(result.clone(), generation).await;
        Ok(result)
    }

    /// Decode an image file without a camera. Idle only; `NoCodeFound`
    /// leaves the controller Idle.
    pub async fn decode_image(&self, mode: ScanMode, bytes: Vec<u8>) -> Result<DecodedResult> {
        let transition = self.transition.lock().await;

        let state = self.state();
        if !state.is_idle() {
            return Err(ScanError::invalid_transition("decode image", state.name()));
        }

        let attempt_id = Uuid::new_v4();
        let result = self
            .still_engine()
            .decode_image(bytes, mode, attempt_id)
            .await?;

        let generation = self.next_generation();
        *self.attempt.lock() = Some(Attempt {
            id: attempt_id,
            attachment: None,
        });
        self.enter_detected(result.clone()).await;
        drop(transition);

        self.report(result.clone(), generation).await;
        Ok(result)
    }
}
