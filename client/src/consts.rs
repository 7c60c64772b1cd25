//! Engine-wide constants.

use std::time::Duration;

/// Minimum on-canvas size per object kind. Mutations never shrink an object
/// below these; resize input is floored at mutation time.
pub const MIN_TEXT_WIDTH: f64 = 120.0;
pub const MIN_TEXT_HEIGHT: f64 = 48.0;
pub const MIN_IMAGE_WIDTH: f64 = 64.0;
pub const MIN_IMAGE_HEIGHT: f64 = 64.0;
pub const MIN_VOTE_WIDTH: f64 = 200.0;
pub const MIN_VOTE_HEIGHT: f64 = 140.0;

/// Default size of a freshly created text box.
pub const DEFAULT_TEXT_WIDTH: f64 = 240.0;
pub const DEFAULT_TEXT_HEIGHT: f64 = 120.0;
/// Default size of a freshly created vote box.
pub const DEFAULT_VOTE_WIDTH: f64 = 260.0;
pub const DEFAULT_VOTE_HEIGHT: f64 = 180.0;

/// Canvas viewport used before the rendering layer reports a real one.
pub const DEFAULT_VIEWPORT: (f64, f64) = (1920.0, 1080.0);

/// Pointer distance from the bottom-right corner that counts as grabbing
/// the resize handle.
pub const HANDLE_RADIUS: f64 = 12.0;

/// A negotiation that has not reached `Connected` within this window is
/// failed out by `PeerMesh::tick`. The underlying connection layer has no
/// such timeout of its own and can take very long to report `failed`.
pub const NEGOTIATION_TIMEOUT: Duration = Duration::from_secs(20);

/// Transport reconnect backoff: doubled per attempt, capped.
pub const RECONNECT_BASE_DELAY: Duration = Duration::from_millis(500);
pub const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(30);
