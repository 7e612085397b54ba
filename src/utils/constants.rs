//! Shared configuration constants
//!
//! Default values for the scrape pipeline. Every one of them is surfaced
//! through [`crate::Config`] and can be overridden.

/// Chrome user agent presented by the scrape session
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Fixed viewport
pub const DEFAULT_WINDOW_WIDTH: u32 = 1280;
pub const DEFAULT_WINDOW_HEIGHT: u32 = 720;

/// Hard network timeout for a single navigation
pub const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 30_000;

/// Wait after navigation for client-side rendering
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 3_000;

/// Attempts per activation locator before moving to the next one
pub const DEFAULT_ACTIVATION_ATTEMPTS: u32 = 2;

/// Wait between two attempts on the same activation locator
pub const DEFAULT_ACTIVATION_RETRY_DELAY_MS: u64 = 1_000;

/// Wait after activation for the dialog to render
pub const DEFAULT_ACTIVATION_SETTLE_MS: u64 = 5_000;

/// Wait between targets to stay under upstream rate limits
pub const DEFAULT_PACING_DELAY_MS: u64 = 2_000;

/// Extra wait after navigation when inspection is requested
pub const DEFAULT_INSPECTION_PAUSE_MS: u64 = 5_000;

/// Placeholder replaced with the encoded target identifier
pub const TARGET_ID_PLACEHOLDER: &str = "{id}";

/// Placeholder replaced with the group index in grouped field locators
pub const GROUP_INDEX_PLACEHOLDER: &str = "{index}";

pub const DEFAULT_TARGET_URL_TEMPLATE: &str = "https://open.spotify.com/artist/{id}";
