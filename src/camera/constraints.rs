use crate::devices::{CaptureDevice, Facing};
use crate::mode::ScanMode;
use crate::platform::StreamConstraints;

/// Stream request for a device in a given mode.
///
/// Resolution and frame rate come from the mode profile. Facing is taken
/// from the device label when known and otherwise asks for the rear camera.
pub fn constraints_for(device: &CaptureDevice, mode: ScanMode) -> StreamConstraints {
    let profile = mode.profile();
    let facing = match device.facing {
        Facing::Unknown => Facing::Back,
        known => known,
    };

    StreamConstraints {
        device_id: device.id.clone(),
        ideal_width: profile.ideal_resolution.0,
        ideal_height: profile.ideal_resolution.1,
        min_width: Some(profile.min_resolution.0),
        min_height: Some(profile.min_resolution.1),
        ideal_fps: profile.target_fps,
        facing,
        continuous_focus: true,
        continuous_exposure: true,
        continuous_white_balance: true,
    }
}
