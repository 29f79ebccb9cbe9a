//! Shared constants for end-to-end tests
//!
//! When test data changes (user credentials, category slugs, etc.),
//! update only this file.
#![allow(dead_code)]

// ============================================================================
// Test User Credentials
// ============================================================================

/// Regular test user
pub const TEST_EMAIL: &str = "tester@vibey.dev";
pub const TEST_USERNAME: &str = "tester";
pub const TEST_PASS: &str = "testpass123";

/// A second user, for anything that needs two voters
pub const OTHER_EMAIL: &str = "other@vibey.dev";
pub const OTHER_USERNAME: &str = "other";
pub const OTHER_PASS: &str = "otherpass123";

// ============================================================================
// Seeded Categories
// ============================================================================

pub const CATEGORY_GENERAL: &str = "general";
pub const CATEGORY_GENERAL_NAME: &str = "General";

pub const CATEGORY_SHOWCASE: &str = "showcase";
pub const CATEGORY_SHOWCASE_NAME: &str = "Showcase";
pub const CATEGORY_SHOWCASE_COLOR: &str = "#F59E0B";

// ============================================================================
// Media
// ============================================================================

/// Smallest header `infer` recognizes as image/png
pub const PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52,
];

/// Avatar size limit of the test server
pub const AVATAR_MAX_SIZE_BYTES: usize = 4 * 1024;

// ============================================================================
// Timeouts
// ============================================================================

/// Maximum time to wait for the server to answer on `/`
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Per-request timeout for the test client
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Delay between readiness probes
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;
