//! Page perception: labelled boxes, the screenshot, and the legend built from them.

use std::time::Duration;

use anyhow::Result;
use tracing::{debug, warn};

use crate::hands::Page;
use crate::types::{BoundingBox, Legend, Screenshot};

const LEGEND_HEADER: &str = "Valid Bounding Boxes:";

/// Bounded retry for the in-page scan, which fails while the page is still loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_millis(3000),
        }
    }
}

/// Output of one annotation pass.
#[derive(Debug, Clone, Default)]
pub struct Annotation {
    pub screenshot: Screenshot,
    pub boxes: Vec<BoundingBox>,
}

/// Label the page, capture it, then clear the labels.
///
/// Scan failures are retried per `policy`; if every attempt fails the box
/// list is empty and the cycle carries on. Screenshot failures are hard errors.
pub fn annotate(page: &dyn Page, policy: &RetryPolicy) -> Result<Annotation> {
    let mut boxes = Vec::new();
    for attempt in 1..=policy.max_attempts {
        match page.mark_page() {
            Ok(found) => {
                debug!(attempt, boxes = found.len(), "page marked");
                boxes = found;
                break;
            }
            Err(e) => {
                warn!(attempt, "markPage failed, page may still be loading: {:#}", e);
                if attempt < policy.max_attempts {
                    std::thread::sleep(policy.delay);
                }
            }
        }
    }

    let screenshot = Screenshot(page.screenshot()?);

    if let Err(e) = page.unmark_page() {
        warn!("unmarkPage failed: {:#}", e);
    }

    Ok(Annotation { screenshot, boxes })
}

/// One line per box, `<index> (<type/>): "<label>"`, under a fixed header.
pub fn format_legend(boxes: &[BoundingBox]) -> Legend {
    let mut legend = String::from(LEGEND_HEADER);
    for (i, bbox) in boxes.iter().enumerate() {
        legend.push_str(&format!("\n{} (<{}/>): \"{}\"", i, bbox.kind, bbox.label()));
    }
    Legend(legend)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(text: &str, aria: &str, kind: &str) -> BoundingBox {
        BoundingBox {
            x: 0.0,
            y: 0.0,
            text: Some(text.to_string()),
            aria_label: Some(aria.to_string()),
            kind: kind.to_string(),
        }
    }

    #[test]
    fn empty_legend_has_only_header() {
        let legend = format_legend(&[]);
        assert_eq!(legend.as_str(), "Valid Bounding Boxes:");
        assert_eq!(legend.as_str().lines().count(), 1);
    }

    #[test]
    fn legend_falls_back_to_text_content() {
        let boxes = vec![
            bbox("Home", "Go home", "a"),
            bbox("", "Search box", "input"),
            bbox("Submit", "", "button"),
        ];
        let legend = format_legend(&boxes);
        let lines: Vec<&str> = legend.as_str().lines().collect();
        assert_eq!(
            lines,
            vec![
                "Valid Bounding Boxes:",
                "0 (<a/>): \"Go home\"",
                "1 (<input/>): \"Search box\"",
                "2 (<button/>): \"Submit\"",
            ]
        );
    }

    #[test]
    fn legend_tolerates_missing_text() {
        let boxes = vec![BoundingBox {
            x: 1.0,
            y: 1.0,
            text: None,
            aria_label: None,
            kind: "img".into(),
        }];
        assert_eq!(
            format_legend(&boxes).as_str(),
            "Valid Bounding Boxes:\n0 (<img/>): \"\""
        );
    }

    #[test]
    fn default_retry_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 10);
        assert_eq!(policy.delay, Duration::from_secs(3));
    }
}
