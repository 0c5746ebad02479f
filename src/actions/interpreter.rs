//! Sequential executor for action scripts
//!
//! | action     | on failure                         |
//! |------------|------------------------------------|
//! | wait       | never fails                        |
//! | click      | logged and skipped                 |
//! | write      | aborts the script                  |
//! | press      | aborts the script                  |
//! | scroll     | aborts only on evaluation error    |
//! | screenshot | aborts the script                  |
//! | scrape     | aborts the script                  |

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use super::{Action, ActionOutcomes, PageSnapshot, ScrollDirection};
use crate::browser::BrowserSession;
use crate::page_extractor::{SYNC_FORM_STATE_SCRIPT, clear_field_script};
use crate::utils::constants::MAX_SNAPSHOT_HTML_CHARS;
use crate::utils::{ScrapeError, truncate_chars};

pub struct ActionInterpreter<'a> {
    session: &'a dyn BrowserSession,
    artifacts_dir: &'a Path,
    click_timeout: Duration,
}

impl<'a> ActionInterpreter<'a> {
    pub fn new(session: &'a dyn BrowserSession, artifacts_dir: &'a Path, click_timeout: Duration) -> Self {
        Self {
            session,
            artifacts_dir,
            click_timeout,
        }
    }

    /// Run every action in order, stopping at the first propagating failure
    pub async fn run(&self, actions: &[Action]) -> Result<ActionOutcomes, ScrapeError> {
        let mut outcomes = ActionOutcomes::default();

        for (index, action) in actions.iter().enumerate() {
            debug!("Running action {} ({})", index, action.name());
            self.execute(action, &mut outcomes).await?;
        }

        Ok(outcomes)
    }

    async fn execute(&self, action: &Action, outcomes: &mut ActionOutcomes) -> Result<(), ScrapeError> {
        let name = action.name();

        match action {
            Action::Wait { milliseconds } => {
                tokio::time::sleep(Duration::from_millis(*milliseconds)).await;
            }
            Action::Click { selector } => {
                if let Err(e) = self.session.click(selector, self.click_timeout).await {
                    warn!("Click on '{}' skipped: {}", selector, e);
                }
            }
            Action::Write { selector, text } => {
                let typed = match selector {
                    Some(selector) => {
                        // Typing appends, so empty the field first
                        self.session
                            .evaluate(&clear_field_script(selector))
                            .await
                            .map_err(|e| ScrapeError::action(name, e))?;
                        self.session.fill(selector, text).await
                    }
                    None => self.session.type_text(text).await,
                };
                typed.map_err(|e| ScrapeError::action(name, e))?;
            }
            Action::Press { key } => {
                self.session
                    .press(key)
                    .await
                    .map_err(|e| ScrapeError::action(name, e))?;
            }
            Action::Scroll { direction, amount } => {
                let delta = match direction {
                    ScrollDirection::Down => i64::from(*amount),
                    ScrollDirection::Up => -i64::from(*amount),
                };
                self.session
                    .evaluate(&format!("window.scrollBy(0, {delta})"))
                    .await
                    .map_err(|e| ScrapeError::action(name, e))?;
            }
            Action::Screenshot { full_page } => {
                let bytes = self
                    .session
                    .screenshot(*full_page)
                    .await
                    .map_err(|e| ScrapeError::action(name, e))?;
                let path = self.screenshot_path();
                write_artifact(&path, &bytes)
                    .await
                    .map_err(|e| ScrapeError::action(name, e))?;
                outcomes.screenshot_paths.push(path.display().to_string());
            }
            Action::ScrapeSnapshot => {
                self.session
                    .evaluate(SYNC_FORM_STATE_SCRIPT)
                    .await
                    .map_err(|e| ScrapeError::action(name, e))?;
                let url = self
                    .session
                    .current_url()
                    .await
                    .map_err(|e| ScrapeError::action(name, e))?;
                let html = self
                    .session
                    .content()
                    .await
                    .map_err(|e| ScrapeError::action(name, e))?;
                outcomes.snapshots.push(PageSnapshot {
                    url,
                    html: truncate_chars(&html, MAX_SNAPSHOT_HTML_CHARS).to_string(),
                });
            }
        }

        Ok(())
    }

    fn screenshot_path(&self) -> PathBuf {
        self.artifacts_dir
            .join(format!("action_{}.png", Uuid::new_v4().simple()))
    }
}

pub(crate) async fn write_artifact(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await
}
