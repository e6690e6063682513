//! Compiled-in service constants.
//!
//! This runs on a fixed board with one camera and one button; there is no
//! runtime configuration.

use std::time::Duration;

/// Camera device node.
pub const CAMERA_DEVICE: &str = "/dev/video2";

/// Sysfs GPIO number the button is wired to.
pub const BUTTON_GPIO: u32 = 20;

/// Directory that receives the numbered captures.
pub const PICTURE_DIR: &str = "/var/lib/buttoncam/pictures";

/// Requested capture resolution. The camera delivers MJPG at this size.
pub const FRAME_WIDTH: u32 = 1280;
pub const FRAME_HEIGHT: u32 = 720;

/// Requested frame rate. The driver clamps this to the fastest interval the
/// camera supports, which is accepted.
pub const FRAME_RATE_FPS: u32 = 60;

/// Minimum gap between two emitted press events; anything closer is switch
/// bounce.
pub const DEBOUNCE_INTERVAL: Duration = Duration::from_millis(50);

/// Upper bound on one blocking wait for a button edge. Timing out is the
/// idle state, not an error, and is when the shutdown flag gets checked.
pub const EDGE_POLL_TIMEOUT: Duration = Duration::from_secs(10);
