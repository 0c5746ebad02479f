//! Scripted page interactions
//!
//! The vocabulary is closed: a request carries a list of [`Action`]s that is
//! validated when parsed and executed once, in order, by
//! [`ActionInterpreter`].

mod interpreter;

pub use interpreter::ActionInterpreter;
pub(crate) use interpreter::write_artifact;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::utils::ScrapeError;
use crate::utils::timeout::MAX_NAVIGATION_TIMEOUT_MS;

fn default_wait_ms() -> u64 {
    1000
}

fn default_key() -> String {
    "Enter".to_string()
}

fn default_scroll_amount() -> u32 {
    500
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    #[default]
    Down,
}

/// One step of an interaction script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    /// Sleep for a fixed time
    Wait {
        #[serde(default = "default_wait_ms")]
        milliseconds: u64,
    },
    /// Click the first element matching `selector`; a miss is not an error
    Click { selector: String },
    /// Fill `selector`, or type into the focused element when no selector is given
    Write {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
        #[serde(default)]
        text: String,
    },
    Press {
        #[serde(default = "default_key")]
        key: String,
    },
    Scroll {
        #[serde(default)]
        direction: ScrollDirection,
        #[serde(default = "default_scroll_amount")]
        amount: u32,
    },
    Screenshot {
        #[serde(rename = "fullPage", default)]
        full_page: bool,
    },
    /// Capture the current URL and HTML
    #[serde(rename = "scrape", alias = "scrapeSnapshot")]
    ScrapeSnapshot,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Wait { .. } => "wait",
            Action::Click { .. } => "click",
            Action::Write { .. } => "write",
            Action::Press { .. } => "press",
            Action::Scroll { .. } => "scroll",
            Action::Screenshot { .. } => "screenshot",
            Action::ScrapeSnapshot => "scrape",
        }
    }

    /// Reject actions that deserialize but cannot run
    pub fn validate(&self) -> Result<(), ScrapeError> {
        let invalid = |reason: &str| {
            Err(ScrapeError::InvalidRequest(format!(
                "{} action: {}",
                self.name(),
                reason
            )))
        };

        match self {
            Action::Wait { milliseconds } if *milliseconds > MAX_NAVIGATION_TIMEOUT_MS => {
                invalid(&format!("wait cannot exceed {MAX_NAVIGATION_TIMEOUT_MS}ms"))
            }
            Action::Click { selector } if selector.trim().is_empty() => {
                invalid("selector must not be empty")
            }
            Action::Write {
                selector: Some(selector),
                ..
            } if selector.trim().is_empty() => invalid("selector must not be empty"),
            Action::Press { key } if key.trim().is_empty() => invalid("key must not be empty"),
            _ => Ok(()),
        }
    }
}

/// Parse and validate an action list from JSON
pub fn parse_actions(json: &str) -> Result<Vec<Action>, ScrapeError> {
    let actions: Vec<Action> = serde_json::from_str(json)
        .map_err(|e| ScrapeError::InvalidRequest(format!("malformed actions: {e}")))?;
    validate_actions(&actions)?;
    Ok(actions)
}

pub fn validate_actions(actions: &[Action]) -> Result<(), ScrapeError> {
    actions.iter().try_for_each(Action::validate)
}

/// The page as seen by a snapshot action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    pub html: String,
}

/// Artifacts produced while running an action script
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcomes {
    #[serde(default)]
    pub screenshot_paths: Vec<String>,
    #[serde(default)]
    pub snapshots: Vec<PageSnapshot>,
}
