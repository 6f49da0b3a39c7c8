//! Shared constants for end-to-end tests
//!
//! When the test model or media change, update only this file.

// ============================================================================
// Test Model
// ============================================================================

/// Label predicted for clips with audible content
pub const LABEL_BARK: &str = "bark";

/// Label predicted for silent clips
pub const LABEL_QUIET: &str = "no_bark";

/// Features the test selector keeps: MFCC 0, chroma C and the first
/// contrast band
pub const SELECTED_FEATURES: [usize; 3] = [0, 10, 22];

/// Split point on the mean first MFCC. Digital silence sits near -1131.
pub const MFCC0_THRESHOLD: f64 = -1000.0;

// ============================================================================
// Test Media
// ============================================================================

/// Duration of generated clips (seconds)
pub const CLIP_DURATION_SECS: u32 = 1;

/// Frequency of the tone in generated clips (Hz)
pub const TONE_FREQUENCY_HZ: u32 = 440;

// ============================================================================
// Test Timeouts and Configuration
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Timeout for individual HTTP requests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Polling interval when waiting for server ready (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;

/// Upload limit used by test servers (bytes)
pub const TEST_MAX_UPLOAD_SIZE_BYTES: usize = 4 * 1024 * 1024;
