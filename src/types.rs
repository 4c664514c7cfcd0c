use std::fmt;

use base64::Engine;
use serde::{Deserialize, Serialize};

/// One interactive element found by the in-page scan.
///
/// `x`/`y` are the centre of the element in page pixels. Boxes are only
/// meaningful for the cycle that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub aria_label: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl BoundingBox {
    /// Accessibility label if it has any content, otherwise the raw text.
    pub fn label(&self) -> &str {
        match self.aria_label.as_deref() {
            Some(aria) if !aria.trim().is_empty() => aria,
            _ => self.text.as_deref().unwrap_or_default(),
        }
    }
}

/// Raw image bytes of the current page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Screenshot(pub Vec<u8>);

impl Screenshot {
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Numbered text description of the current boxes, sent alongside the screenshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Legend(pub String);

impl Legend {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Legend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// `up` scrolls towards the top of the page.
    pub fn signed(self, magnitude: f64) -> f64 {
        match self {
            Direction::Up => -magnitude,
            Direction::Down => magnitude,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => f.write_str("up"),
            Direction::Down => f.write_str("down"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollTarget {
    Window,
    Label(usize),
}

/// Why a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminateReason {
    /// The model chose `TERMINATE`.
    Requested(String),
    /// The model reply had no `Action: ` line; carries the whole reply.
    Unparseable(String),
}

impl fmt::Display for TerminateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminateReason::Requested(reason) => write!(f, "{}", reason),
            TerminateReason::Unparseable(raw) => write!(f, "Could not parse LLM Output: {}", raw),
        }
    }
}

/// The single decision the model makes per cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Click { label: usize },
    Type { label: usize, text: String },
    Scroll { target: ScrollTarget, direction: Direction },
    Wait,
    GoBack,
    Terminate(TerminateReason),
    /// The action line was readable but its arguments were not.
    Rejected(ActionError),
}

impl Action {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Action::Terminate(_))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Click { label } => write!(f, "Click {}", label),
            Action::Type { label, text } => write!(f, "Type {}; {}", label, text),
            Action::Scroll { target, direction } => match target {
                ScrollTarget::Window => write!(f, "Scroll WINDOW; {}", direction),
                ScrollTarget::Label(label) => write!(f, "Scroll {}; {}", label, direction),
            },
            Action::Wait => f.write_str("Wait"),
            Action::GoBack => f.write_str("GoBack"),
            Action::Terminate(reason) => write!(f, "TERMINATE {}", reason),
            Action::Rejected(err) => write!(f, "Rejected ({})", err),
        }
    }
}

/// Expected failures of an action. The `Display` text is what the model reads
/// as the next observation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("Failed to click bounding box labeled as number {}", .0.join(","))]
    ClickArguments(Vec<String>),
    #[error("Failed to type in element from bounding box labeled as number {}", .0.join(","))]
    TypeArguments(Vec<String>),
    #[error("Failed to scroll due to incorrect arguments.")]
    ScrollArguments,
    #[error("Error: no bbox for : {0}")]
    NoBox(String),
    #[error("Unknown action: {0}")]
    UnknownVerb(String),
}

/// Human-readable outcome of the most recent action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation(pub String);

impl Observation {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<ActionError> for Observation {
    fn from(err: ActionError) -> Self {
        Observation(err.to_string())
    }
}
