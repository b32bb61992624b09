use crate::engine::DecodedResult;
use crate::error::{EventBusError, ErrorKind};
use crate::reporter::ScanOutcome;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Events emitted by a scanning session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    /// The controller entered a new state
    StateChanged {
        state: String,
        timestamp: SystemTime,
    },
    /// Video inputs were enumerated
    DevicesEnumerated { count: usize, generation: u64 },
    /// A camera stream became active
    CameraOpened {
        device_id: String,
        label: String,
        width: u32,
        height: u32,
    },
    /// The active camera changed without leaving Scanning
    CameraSwitched { device_id: String, label: String },
    /// A code of an allowed symbology was decoded
    CodeDetected { result: DecodedResult },
    /// The backend answered (or failed to) for a detected code
    ReportCompleted { code: String, outcome: ScanOutcome },
    /// A zoom or torch request hit an unsupported capability
    CapabilityUnavailable { kind: ErrorKind },
    /// A capability action arrived with no usable session
    SessionNotOpen { action: String },
    /// Frame grabbing keeps failing while attached
    EngineDegraded {
        device_id: String,
        consecutive_errors: u32,
    },
    /// An attempt ended in the Error state
    ScanFailed { kind: ErrorKind, message: String },
}

impl ScanEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            ScanEvent::StateChanged { state, .. } => format!("State changed to {}", state),
            ScanEvent::DevicesEnumerated { count, generation } => {
                format!("{} device(s) enumerated (generation {})", count, generation)
            }
            ScanEvent::CameraOpened {
                label,
                width,
                height,
                ..
            } => format!("Camera {} opened at {}x{}", label, width, height),
            ScanEvent::CameraSwitched { label, .. } => format!("Switched to camera {}", label),
            ScanEvent::CodeDetected { result } => {
                format!("Detected {} code: {}", result.format, result.text)
            }
            ScanEvent::ReportCompleted { code, outcome } => format!(
                "Report for {} {}: {}",
                code,
                if outcome.success { "accepted" } else { "failed" },
                outcome.message
            ),
            ScanEvent::CapabilityUnavailable { kind } => {
                format!("Capability unavailable: {:?}", kind)
            }
            ScanEvent::SessionNotOpen { action } => {
                format!("Ignored {}: no open session", action)
            }
            ScanEvent::EngineDegraded {
                device_id,
                consecutive_errors,
            } => format!(
                "Engine degraded on {} after {} consecutive frame errors",
                device_id, consecutive_errors
            ),
            ScanEvent::ScanFailed { kind, message } => {
                format!("Scan failed ({:?}): {}", kind, message)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            ScanEvent::StateChanged { .. } => "state_changed",
            ScanEvent::DevicesEnumerated { .. } => "devices_enumerated",
            ScanEvent::CameraOpened { .. } => "camera_opened",
            ScanEvent::CameraSwitched { .. } => "camera_switched",
            ScanEvent::CodeDetected { .. } => "code_detected",
            ScanEvent::ReportCompleted { .. } => "report_completed",
            ScanEvent::CapabilityUnavailable { .. } => "capability_unavailable",
            ScanEvent::SessionNotOpen { .. } => "session_not_open",
            ScanEvent::EngineDegraded { .. } => "engine_degraded",
            ScanEvent::ScanFailed { .. } => "scan_failed",
        }
    }
}

/// Async event bus over a broadcast channel
pub struct EventBus {
    sender: broadcast::Sender<ScanEvent>,
    debug_logging: bool,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: false,
        }
    }

    /// Create a new event bus with debug logging enabled
    pub fn with_debug_logging(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: true,
        }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers.
    ///
    /// Fails when nobody is subscribed; callers that only notify treat
    /// that as benign.
    pub async fn publish(&self, event: ScanEvent) -> Result<usize, EventBusError> {
        match &event {
            ScanEvent::CodeDetected { result } => {
                info!("Detected {} code ({} chars)", result.format, result.text.len());
            }
            ScanEvent::EngineDegraded { .. } | ScanEvent::ScanFailed { .. } => {
                warn!("{}", event.description());
            }
            _ => {
                if self.debug_logging {
                    debug!("Event: {}", event.description());
                }
            }
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            debug_logging: self.debug_logging,
        }
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    All,
    EventTypes(Vec<&'static str>),
    Custom(fn(&ScanEvent) -> bool),
}

impl EventFilter {
    pub fn matches(&self, event: &ScanEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Custom(filter_fn) => filter_fn(event),
        }
    }
}

/// Filtered view over a bus subscription
pub struct EventReceiver {
    receiver: broadcast::Receiver<ScanEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    pub fn new(
        receiver: broadcast::Receiver<ScanEvent>,
        filter: EventFilter,
        name: impl Into<String>,
    ) -> Self {
        Self {
            receiver,
            filter,
            name: name.into(),
        }
    }

    /// Receive the next event that passes the filter. Lagging skips ahead
    /// instead of failing.
    pub async fn recv(&mut self) -> Result<ScanEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<ScanEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_creation() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(!bus.has_subscribers());
    }

    #[tokio::test]
    async fn test_debug_logging_survives_clone() {
        let bus = EventBus::with_debug_logging(10);
        let clone = bus.clone();
        assert!(clone.debug_logging);

        let mut receiver = bus.subscribe();
        clone
            .publish(ScanEvent::DevicesEnumerated {
                count: 2,
                generation: 1,
            })
            .await
            .unwrap();
        let event = timeout(Duration::from_secs(1), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.event_type(), "devices_enumerated");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_fails() {
        let bus = EventBus::new(10);
        let result = bus
            .publish(ScanEvent::DevicesEnumerated {
                count: 1,
                generation: 1,
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_event_publishing_and_receiving() {
        let bus = EventBus::new(10);
        let mut receiver = bus.subscribe();

        let delivered = bus
            .publish(ScanEvent::CapabilityUnavailable {
                kind: ErrorKind::TorchUnsupported,
            })
            .await
            .unwrap();
        assert_eq!(delivered, 1);

        let event = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.event_type(), "capability_unavailable");
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let bus = EventBus::new(10);
        let mut receiver = EventReceiver::new(
            bus.subscribe(),
            EventFilter::EventTypes(vec!["session_not_open"]),
            "test",
        );

        bus.publish(ScanEvent::DevicesEnumerated {
            count: 2,
            generation: 1,
        })
        .await
        .unwrap();
        bus.publish(ScanEvent::SessionNotOpen {
            action: "toggle_torch".to_string(),
        })
        .await
        .unwrap();

        let event = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, ScanEvent::SessionNotOpen { .. }));
        assert!(receiver.try_recv().unwrap().is_none());
    }

    #[test]
    fn test_event_descriptions() {
        let event = ScanEvent::EngineDegraded {
            device_id: "cam0".to_string(),
            consecutive_errors: 30,
        };
        assert!(event.description().contains("30"));
        assert!(EventFilter::Custom(|e| e.event_type().starts_with("engine")).matches(&event));
        assert!(EventFilter::All.matches(&event));
    }
}
