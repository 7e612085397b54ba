pub mod constants;
mod errors;
pub(crate) mod js_scripts;
mod timeout;

pub use errors::{ScrapeError, ScrapeResult};
pub use timeout::{validate_fixed_delay, validate_navigation_timeout};
