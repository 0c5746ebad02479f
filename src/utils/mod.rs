// Shared helpers used across the scrape pipeline
pub mod constants;
mod errors;
mod text;
pub mod timeout;
mod wait_for_element;

pub use errors::ScrapeError;
pub use text::{bounded_error, truncate_chars};
pub use timeout::{validate_interaction_timeout, validate_navigation_timeout};
pub use wait_for_element::wait_for_element;
