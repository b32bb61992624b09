use super::{
    AdvancedConstraint, DeviceDescriptor, MediaPlatform, PlatformError, StreamConstraints,
    TrackCapabilities, TrackSettings, VideoTrack, ZoomDescriptor,
};
use crate::frame::FrameData;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};
use tracing::debug;

/// Simulated capture device
#[derive(Debug, Clone)]
pub struct MockDevice {
    pub id: String,
    pub label: String,
    pub max_resolution: (u32, u32),
    pub fps: u32,
    pub capabilities: TrackCapabilities,
    pub busy: bool,
}

impl MockDevice {
    pub fn new<I: Into<String>, L: Into<String>>(id: I, label: L) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            max_resolution: (1920, 1080),
            fps: 30,
            capabilities: TrackCapabilities::default(),
            busy: false,
        }
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.max_resolution = (width, height);
        self
    }

    pub fn with_zoom(mut self, min: f64, max: f64, step: f64) -> Self {
        self.capabilities.zoom = Some(ZoomDescriptor { min, max, step });
        self
    }

    pub fn with_torch(mut self) -> Self {
        self.capabilities.torch = Some(true);
        self
    }

    pub fn with_focus_modes(mut self, modes: &[&str]) -> Self {
        self.capabilities.focus_mode = modes.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn busy(mut self) -> Self {
        self.busy = true;
        self
    }
}

#[derive(Default)]
struct MockState {
    opens: AtomicUsize,
    live: AtomicUsize,
    frames: Mutex<HashMap<String, VecDeque<FrameData>>>,
    frame_failures: Mutex<HashMap<String, u32>>,
    applied: Mutex<Vec<(String, AdvancedConstraint)>>,
}

/// In-memory media platform used by tests and the CLI demo paths.
///
/// Tracks every opened stream so tests can assert that nothing is left
/// live after stop, switch or failure.
pub struct MockPlatform {
    devices: Mutex<Vec<MockDevice>>,
    permission_denied: AtomicBool,
    enumerate_error: Mutex<Option<PlatformError>>,
    open_gate: Mutex<Option<Arc<Semaphore>>>,
    pending_open: Notify,
    state: Arc<MockState>,
}

impl MockPlatform {
    pub fn new(devices: Vec<MockDevice>) -> Self {
        Self {
            devices: Mutex::new(devices),
            permission_denied: AtomicBool::new(false),
            enumerate_error: Mutex::new(None),
            open_gate: Mutex::new(None),
            pending_open: Notify::new(),
            state: Arc::new(MockState::default()),
        }
    }

    pub fn set_devices(&self, devices: Vec<MockDevice>) {
        *self.devices.lock() = devices;
    }

    pub fn set_permission_denied(&self, denied: bool) {
        self.permission_denied.store(denied, Ordering::SeqCst);
    }

    pub fn set_enumerate_error(&self, error: Option<PlatformError>) {
        *self.enumerate_error.lock() = error;
    }

    pub fn set_busy(&self, device_id: &str, busy: bool) {
        if let Some(device) = self.devices.lock().iter_mut().find(|d| d.id == device_id) {
            device.busy = busy;
        }
    }

    /// Park every subsequent `open_stream` call until `release_opens`
    pub fn hold_opens(&self) {
        *self.open_gate.lock() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_opens(&self) {
        if let Some(gate) = self.open_gate.lock().take() {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    /// Resolves once an `open_stream` call is parked by `hold_opens`
    pub async fn wait_for_pending_open(&self) {
        self.pending_open.notified().await;
    }

    /// Queue a frame for the given device
    pub fn push_frame(&self, device_id: &str, frame: FrameData) {
        self.state
            .frames
            .lock()
            .entry(device_id.to_string())
            .or_default()
            .push_back(frame);
    }

    /// Make the next `count` frame grabs on a device fail
    pub fn fail_frames(&self, device_id: &str, count: u32) {
        self.state
            .frame_failures
            .lock()
            .insert(device_id.to_string(), count);
    }

    pub fn open_count(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    pub fn live_streams(&self) -> usize {
        self.state.live.load(Ordering::SeqCst)
    }

    pub fn applied_constraints(&self) -> Vec<(String, AdvancedConstraint)> {
        self.state.applied.lock().clone()
    }
}

#[async_trait]
impl MediaPlatform for MockPlatform {
    fn name(&self) -> &str {
        "mock"
    }

    async fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>, PlatformError> {
        if self.permission_denied.load(Ordering::SeqCst) {
            return Err(PlatformError::not_allowed("Permission denied"));
        }
        if let Some(error) = self.enumerate_error.lock().clone() {
            return Err(error);
        }

        Ok(self
            .devices
            .lock()
            .iter()
            .map(|d| DeviceDescriptor {
                id: d.id.clone(),
                label: d.label.clone(),
            })
            .collect())
    }

    async fn open_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Arc<dyn VideoTrack>, PlatformError> {
        let gate = self.open_gate.lock().clone();
        if let Some(gate) = gate {
            self.pending_open.notify_one();
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        if self.permission_denied.load(Ordering::SeqCst) {
            return Err(PlatformError::not_allowed("Permission denied"));
        }

        let device = self
            .devices
            .lock()
            .iter()
            .find(|d| d.id == constraints.device_id)
            .cloned()
            .ok_or_else(|| PlatformError::not_found("Requested device not found"))?;

        if device.busy {
            return Err(PlatformError::not_readable("Could not start video source"));
        }

        let (max_w, max_h) = device.max_resolution;
        if constraints.min_width.is_some_and(|w| w > max_w)
            || constraints.min_height.is_some_and(|h| h > max_h)
        {
            return Err(PlatformError::overconstrained(format!(
                "{} cannot reach the requested minimum resolution",
                device.label
            )));
        }

        let settings = TrackSettings {
            width: constraints.ideal_width.min(max_w),
            height: constraints.ideal_height.min(max_h),
            fps: constraints.ideal_fps.min(device.fps).max(1),
        };

        self.state.opens.fetch_add(1, Ordering::SeqCst);
        self.state.live.fetch_add(1, Ordering::SeqCst);
        debug!(
            "Mock stream opened on {} at {}x{}@{}",
            device.id, settings.width, settings.height, settings.fps
        );

        Ok(Arc::new(MockTrack {
            device_id: device.id,
            settings,
            capabilities: device.capabilities,
            live: AtomicBool::new(true),
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockTrack {
    device_id: String,
    settings: TrackSettings,
    capabilities: TrackCapabilities,
    live: AtomicBool,
    state: Arc<MockState>,
}

#[async_trait]
impl VideoTrack for MockTrack {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn settings(&self) -> TrackSettings {
        self.settings
    }

    fn capabilities(&self) -> TrackCapabilities {
        self.capabilities.clone()
    }

    async fn apply_constraints(
        &self,
        constraints: &[AdvancedConstraint],
    ) -> Result<(), PlatformError> {
        if !self.is_live() {
            return Err(PlatformError::invalid_state("Track has ended"));
        }

        for constraint in constraints {
            match constraint {
                AdvancedConstraint::Zoom(level) => {
                    let range = self
                        .capabilities
                        .zoom
                        .ok_or_else(|| PlatformError::overconstrained("zoom unsupported"))?;
                    if *level < range.min || *level > range.max {
                        return Err(PlatformError::overconstrained("zoom out of range"));
                    }
                }
                AdvancedConstraint::Torch(_) => {
                    if self.capabilities.torch != Some(true) {
                        return Err(PlatformError::overconstrained("torch unsupported"));
                    }
                }
                AdvancedConstraint::FocusMode(mode) => {
                    if !self.capabilities.focus_mode.contains(mode) {
                        return Err(PlatformError::overconstrained("focus mode unsupported"));
                    }
                }
            }
        }

        let mut applied = self.state.applied.lock();
        for constraint in constraints {
            applied.push((self.device_id.clone(), constraint.clone()));
        }
        Ok(())
    }

    async fn grab_frame(&self) -> Result<Option<FrameData>, PlatformError> {
        if !self.is_live() {
            return Err(PlatformError::invalid_state("Track has ended"));
        }

        {
            let mut failures = self.state.frame_failures.lock();
            if let Some(remaining) = failures.get_mut(&self.device_id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(PlatformError::new("AbortError", "Frame grab failed"));
                }
            }
        }

        Ok(self
            .state
            .frames
            .lock()
            .get_mut(&self.device_id)
            .and_then(|queue| queue.pop_front()))
    }

    fn stop(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            self.state.live.fetch_sub(1, Ordering::SeqCst);
            debug!("Mock stream on {} stopped", self.device_id);
        }
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}
