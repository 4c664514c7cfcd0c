//! Carries out one [`Action`] against the page and describes what happened.
//!
//! Bad arguments and unknown labels never escape as errors: they become the
//! observation the model sees next cycle. Only browser failures propagate.

use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::debug;

use crate::hands::{KeyCombo, Page};
use crate::types::{Action, ActionError, BoundingBox, Direction, Observation, ScrollTarget};

/// Viewport scroll distance for `Scroll WINDOW`.
pub const WINDOW_SCROLL: f64 = 500.0;
/// Wheel distance when scrolling inside an element.
pub const ELEMENT_SCROLL: f64 = 200.0;
/// How often the URL is re-read while waiting for a back navigation.
const NAVIGATION_POLL: Duration = Duration::from_millis(100);

/// Timing knobs for the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// How long `Wait` pauses.
    pub wait: Duration,
    /// Whether select-all uses the Command key.
    pub mac_keys: bool,
    /// Upper bound on waiting for the URL to change after `GoBack`.
    pub navigation_timeout: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            wait: Duration::from_secs(5),
            mac_keys: std::env::consts::OS == "macos",
            navigation_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum StepError {
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error(transparent)]
    Browser(#[from] anyhow::Error),
}

type StepResult = std::result::Result<String, StepError>;

pub fn execute(
    action: &Action,
    boxes: &[BoundingBox],
    page: &dyn Page,
    pacing: &Pacing,
) -> Result<Observation> {
    let outcome = match action {
        Action::Click { label } => click(*label, boxes, page),
        Action::Type { label, text } => type_text(*label, text, boxes, page, pacing),
        Action::Scroll { target, direction } => scroll(*target, *direction, boxes, page),
        Action::Wait => wait(pacing),
        Action::GoBack => go_back(page, pacing),
        Action::Terminate(reason) => Ok(format!("Terminated: {}", reason)),
        Action::Rejected(err) => Err(StepError::Action(err.clone())),
    };

    match outcome {
        Ok(text) => Ok(Observation(text)),
        Err(StepError::Action(err)) => {
            debug!(%action, "action rejected: {}", err);
            Ok(Observation::from(err))
        }
        Err(StepError::Browser(err)) => Err(err),
    }
}

fn lookup(label: usize, boxes: &[BoundingBox]) -> std::result::Result<&BoundingBox, ActionError> {
    boxes
        .get(label)
        .ok_or_else(|| ActionError::NoBox(label.to_string()))
}

fn click(label: usize, boxes: &[BoundingBox], page: &dyn Page) -> StepResult {
    let bbox = lookup(label, boxes)?;
    page.click_at(bbox.x, bbox.y)?;
    Ok(format!("Clicked {}", label))
}

fn type_text(
    label: usize,
    text: &str,
    boxes: &[BoundingBox],
    page: &dyn Page,
    pacing: &Pacing,
) -> StepResult {
    let bbox = lookup(label, boxes)?;
    page.click_at(bbox.x, bbox.y)?;
    page.key_press(&KeyCombo::select_all(pacing.mac_keys))?;
    page.key_press(&KeyCombo::key("Backspace"))?;
    page.type_text(text)?;
    page.key_press(&KeyCombo::key("Enter"))?;
    Ok(format!("Typed {} and submitted", text))
}

fn scroll(
    target: ScrollTarget,
    direction: Direction,
    boxes: &[BoundingBox],
    page: &dyn Page,
) -> StepResult {
    match target {
        ScrollTarget::Window => {
            page.scroll_window(direction.signed(WINDOW_SCROLL))?;
            Ok(format!("Scrolled {} in window", direction))
        }
        ScrollTarget::Label(label) => {
            let bbox = lookup(label, boxes)?;
            page.move_to(bbox.x, bbox.y)?;
            page.wheel_scroll(0.0, direction.signed(ELEMENT_SCROLL))?;
            Ok(format!("Scrolled {} in element", direction))
        }
    }
}

fn wait(pacing: &Pacing) -> StepResult {
    std::thread::sleep(pacing.wait);
    Ok(format!("Waited for {:?}.", pacing.wait))
}

fn go_back(page: &dyn Page, pacing: &Pacing) -> StepResult {
    let before = page.current_url()?;
    page.go_back()?;
    let url = wait_for_url_change(page, &before, pacing.navigation_timeout)?;
    Ok(format!("Navigated back a page to {}.", url))
}

/// Re-read the URL until it differs from `before` or `timeout` passes.
///
/// A back navigation with no history never changes the URL; the unchanged
/// URL is returned once the timeout is spent.
fn wait_for_url_change(page: &dyn Page, before: &str, timeout: Duration) -> Result<String> {
    let deadline = Instant::now() + timeout;
    loop {
        let url = page.current_url()?;
        if url != before {
            return Ok(url);
        }
        let now = Instant::now();
        if now >= deadline {
            debug!(url = %url, "URL unchanged after going back");
            return Ok(url);
        }
        std::thread::sleep(NAVIGATION_POLL.min(deadline - now));
    }
}
