use super::{
    AdvancedConstraint, DeviceDescriptor, MediaPlatform, PlatformError, StreamConstraints,
    TrackCapabilities, TrackSettings, VideoTrack,
};
use crate::frame::{FrameData, FrameFormat};
use async_trait::async_trait;
use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, trace, warn};

const PULL_TIMEOUT_MS: u64 = 100;
const STATE_CHANGE_TIMEOUT: Duration = Duration::from_secs(5);

/// V4L2 capture through GStreamer
pub struct GstPlatform;

impl GstPlatform {
    pub fn new() -> Result<Self, PlatformError> {
        gstreamer::init().map_err(|e| {
            PlatformError::new("NotSupportedError", format!("Failed to initialize GStreamer: {}", e))
        })?;
        Ok(Self)
    }

    fn build_pipeline_string(constraints: &StreamConstraints) -> String {
        format!(
            "v4l2src device={} do-timestamp=true ! \
             videoconvert ! videoscale ! videorate ! \
             video/x-raw,format=GRAY8,width={},height={},framerate={}/1 ! \
             appsink name=sink sync=false max-buffers=2 drop=true emit-signals=false",
            constraints.device_id,
            constraints.ideal_width,
            constraints.ideal_height,
            constraints.ideal_fps.max(1)
        )
    }

    /// First error posted on the pipeline bus, if any
    fn bus_error(pipeline: &Pipeline) -> Option<String> {
        let bus = pipeline.bus()?;
        let message =
            bus.timed_pop_filtered(gstreamer::ClockTime::ZERO, &[gstreamer::MessageType::Error])?;
        match message.view() {
            gstreamer::MessageView::Error(err) => Some(err.error().to_string()),
            _ => None,
        }
    }
}

#[async_trait]
impl MediaPlatform for GstPlatform {
    fn name(&self) -> &str {
        "gstreamer"
    }

    async fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>, PlatformError> {
        tokio::task::spawn_blocking(|| {
            let monitor = gstreamer::DeviceMonitor::new();
            monitor.add_filter(Some("Video/Source"), None);
            monitor.start().map_err(|e| {
                PlatformError::new("NotReadableError", format!("Device monitor failed: {}", e))
            })?;

            let devices = monitor
                .devices()
                .into_iter()
                .filter_map(|device| {
                    let label = device.display_name().to_string();
                    let path = device.properties().and_then(|props| {
                        props
                            .get::<String>("api.v4l2.path")
                            .or_else(|_| props.get::<String>("device.path"))
                            .ok()
                    });
                    match path {
                        Some(id) => Some(DeviceDescriptor { id, label }),
                        None => {
                            debug!("Skipping video source without a device path: {}", label);
                            None
                        }
                    }
                })
                .collect();

            monitor.stop();
            Ok(devices)
        })
        .await
        .map_err(|e| PlatformError::new("AbortError", format!("Enumeration task failed: {}", e)))?
    }

    async fn open_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Arc<dyn VideoTrack>, PlatformError> {
        let pipeline_desc = Self::build_pipeline_string(constraints);
        info!("Creating GStreamer pipeline: {}", pipeline_desc);

        let pipeline = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| PlatformError::new("NotSupportedError", e.to_string()))?
            .downcast::<Pipeline>()
            .map_err(|_| PlatformError::new("NotSupportedError", "Failed to downcast to Pipeline"))?;

        let appsink = pipeline
            .by_name("sink")
            .and_then(|element| element.downcast::<AppSink>().ok())
            .ok_or_else(|| PlatformError::new("NotSupportedError", "Pipeline has no appsink"))?;

        let started = {
            let pipeline = pipeline.clone();
            tokio::task::spawn_blocking(move || {
                pipeline.set_state(gstreamer::State::Playing).is_ok()
                    && pipeline
                        .state(gstreamer::ClockTime::from_mseconds(
                            STATE_CHANGE_TIMEOUT.as_millis() as u64,
                        ))
                        .0
                        .is_ok()
            })
            .await
            .unwrap_or(false)
        };

        if !started {
            let details = Self::bus_error(&pipeline)
                .unwrap_or_else(|| "Could not start video source".to_string());
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(PlatformError::not_readable(details));
        }

        let settings = TrackSettings {
            width: constraints.ideal_width,
            height: constraints.ideal_height,
            fps: constraints.ideal_fps.max(1),
        };

        Ok(Arc::new(GstTrack {
            device_id: constraints.device_id.clone(),
            settings,
            pipeline,
            appsink,
            live: AtomicBool::new(true),
            frame_counter: AtomicU64::new(0),
        }))
    }
}

struct GstTrack {
    device_id: String,
    settings: TrackSettings,
    pipeline: Pipeline,
    appsink: AppSink,
    live: AtomicBool,
    frame_counter: AtomicU64,
}

#[async_trait]
impl VideoTrack for GstTrack {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn settings(&self) -> TrackSettings {
        self.settings
    }

    fn capabilities(&self) -> TrackCapabilities {
        TrackCapabilities::default()
    }

    async fn apply_constraints(
        &self,
        constraints: &[AdvancedConstraint],
    ) -> Result<(), PlatformError> {
        if constraints.is_empty() {
            return Ok(());
        }
        Err(PlatformError::overconstrained(
            "V4L2 controls are not exposed by this backend",
        ))
    }

    async fn grab_frame(&self) -> Result<Option<FrameData>, PlatformError> {
        if !self.is_live() {
            return Err(PlatformError::invalid_state("Track has ended"));
        }

        let appsink = self.appsink.clone();
        let sample = tokio::task::spawn_blocking(move || {
            appsink.try_pull_sample(gstreamer::ClockTime::from_mseconds(PULL_TIMEOUT_MS))
        })
        .await
        .map_err(|e| PlatformError::new("AbortError", e.to_string()))?;

        let Some(sample) = sample else {
            if self.appsink.is_eos() {
                return Err(PlatformError::new("AbortError", "Stream reached end"));
            }
            return Ok(None);
        };

        let buffer = sample
            .buffer()
            .ok_or_else(|| PlatformError::new("AbortError", "No buffer in sample"))?;
        let caps = sample
            .caps()
            .ok_or_else(|| PlatformError::new("AbortError", "No caps in sample"))?;
        let video_info = VideoInfo::from_caps(caps)
            .map_err(|e| PlatformError::new("AbortError", format!("Bad video info: {}", e)))?;
        let map = buffer
            .map_readable()
            .map_err(|e| PlatformError::new("AbortError", format!("Failed to map buffer: {}", e)))?;

        let width = video_info.width();
        let height = video_info.height();
        let stride = video_info.stride()[0] as usize;

        // GRAY8 rows may be padded to the stride
        let data = if stride == width as usize {
            map.as_slice().to_vec()
        } else {
            map.as_slice()
                .chunks(stride)
                .take(height as usize)
                .flat_map(|row| row[..(width as usize).min(row.len())].iter().copied())
                .collect()
        };

        let frame_id = self.frame_counter.fetch_add(1, Ordering::Relaxed);
        trace!("Pulled frame {} ({}x{})", frame_id, width, height);

        Ok(Some(FrameData::new(
            frame_id,
            SystemTime::now(),
            data,
            width,
            height,
            FrameFormat::Gray8,
        )))
    }

    fn stop(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
                warn!("Failed to stop pipeline for {}: {}", self.device_id, e);
            }
            debug!("GStreamer track on {} stopped", self.device_id);
        }
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

impl Drop for GstTrack {
    fn drop(&mut self) {
        self.stop();
    }
}
