//! Test doubles for the browser and the model.

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use crate::brain::Model;
use crate::hands::{KeyCombo, Page};
use crate::types::BoundingBox;

/// Every browser command a [`FakePage`] received, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Mark,
    Unmark,
    Screenshot,
    CurrentUrl,
    ClickAt(f64, f64),
    KeyPress(KeyCombo),
    TypeText(String),
    MoveTo(f64, f64),
    WheelScroll(f64, f64),
    ScrollWindow(f64),
    GoBack,
}

impl Command {
    /// Commands that act on the page rather than just reading it.
    pub fn is_input(&self) -> bool {
        matches!(
            self,
            Command::ClickAt(..)
                | Command::KeyPress(_)
                | Command::TypeText(_)
                | Command::MoveTo(..)
                | Command::WheelScroll(..)
                | Command::ScrollWindow(_)
                | Command::GoBack
        )
    }
}

/// A page whose scans are scripted and whose commands are recorded.
///
/// Each `mark_page` call pops the next scripted scan; once the script runs
/// out, the last successful box list is returned again.
pub struct FakePage {
    scans: Mutex<VecDeque<Result<Vec<BoundingBox>, String>>>,
    last_boxes: Mutex<Vec<BoundingBox>>,
    url: Mutex<String>,
    back_url: String,
    /// URL reads after `go_back` that still see the old page.
    back_lag: usize,
    pending_back: Mutex<Option<usize>>,
    fail_clicks: bool,
    log: Mutex<Vec<Command>>,
}

impl FakePage {
    pub fn new(boxes: Vec<BoundingBox>) -> Self {
        Self {
            scans: Mutex::new(VecDeque::new()),
            last_boxes: Mutex::new(boxes),
            url: Mutex::new("https://example.com/current".to_string()),
            back_url: "https://example.com/previous".to_string(),
            back_lag: 0,
            pending_back: Mutex::new(None),
            fail_clicks: false,
            log: Mutex::new(Vec::new()),
        }
    }

    /// After `go_back`, the next `reads` URL reads still return the old URL.
    pub fn with_back_lag(mut self, reads: usize) -> Self {
        self.back_lag = reads;
        self
    }

    /// Make every `click_at` fail like a dead browser connection.
    pub fn failing_clicks(mut self) -> Self {
        self.fail_clicks = true;
        self
    }

    /// Queue scan results; `Err` entries make `mark_page` fail once.
    pub fn with_scans(self, scans: Vec<Result<Vec<BoundingBox>, String>>) -> Self {
        *self.scans.lock().unwrap() = scans.into();
        self
    }

    pub fn commands(&self) -> Vec<Command> {
        self.log.lock().unwrap().clone()
    }

    pub fn input_commands(&self) -> Vec<Command> {
        self.commands().into_iter().filter(Command::is_input).collect()
    }

    pub fn url(&self) -> String {
        self.url.lock().unwrap().clone()
    }

    fn record(&self, command: Command) {
        self.log.lock().unwrap().push(command);
    }
}

impl Page for FakePage {
    fn mark_page(&self) -> Result<Vec<BoundingBox>> {
        self.record(Command::Mark);
        match self.scans.lock().unwrap().pop_front() {
            Some(Ok(boxes)) => {
                *self.last_boxes.lock().unwrap() = boxes.clone();
                Ok(boxes)
            }
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(self.last_boxes.lock().unwrap().clone()),
        }
    }

    fn unmark_page(&self) -> Result<()> {
        self.record(Command::Unmark);
        Ok(())
    }

    fn screenshot(&self) -> Result<Vec<u8>> {
        self.record(Command::Screenshot);
        Ok(b"fake-png".to_vec())
    }

    fn current_url(&self) -> Result<String> {
        self.record(Command::CurrentUrl);
        let mut pending = self.pending_back.lock().unwrap();
        match *pending {
            Some(0) => {
                *self.url.lock().unwrap() = self.back_url.clone();
                *pending = None;
            }
            Some(left) => *pending = Some(left - 1),
            None => {}
        }
        Ok(self.url())
    }

    fn click_at(&self, x: f64, y: f64) -> Result<()> {
        self.record(Command::ClickAt(x, y));
        if self.fail_clicks {
            return Err(anyhow!("browser connection closed"));
        }
        Ok(())
    }

    fn key_press(&self, combo: &KeyCombo) -> Result<()> {
        self.record(Command::KeyPress(combo.clone()));
        Ok(())
    }

    fn type_text(&self, text: &str) -> Result<()> {
        self.record(Command::TypeText(text.to_string()));
        Ok(())
    }

    fn move_to(&self, x: f64, y: f64) -> Result<()> {
        self.record(Command::MoveTo(x, y));
        Ok(())
    }

    fn wheel_scroll(&self, dx: f64, dy: f64) -> Result<()> {
        self.record(Command::WheelScroll(dx, dy));
        Ok(())
    }

    fn scroll_window(&self, dy: f64) -> Result<()> {
        self.record(Command::ScrollWindow(dy));
        Ok(())
    }

    fn go_back(&self) -> Result<()> {
        self.record(Command::GoBack);
        *self.pending_back.lock().unwrap() = Some(self.back_lag);
        Ok(())
    }
}

/// One request the [`ScriptedModel`] received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRequest {
    pub system_prompt: String,
    pub user_text: String,
    pub image_base64: String,
}

/// A model that answers from a fixed list of replies.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| Ok(r.to_string())).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A model whose next call fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from([Err(message.to_string())])),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Model for ScriptedModel {
    async fn complete(
        &self,
        system_prompt: &str,
        user_text: &str,
        image_base64: &str,
    ) -> Result<String> {
        self.requests.lock().unwrap().push(ModelRequest {
            system_prompt: system_prompt.to_string(),
            user_text: user_text.to_string(),
            image_base64: image_base64.to_string(),
        });
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("scripted model has no replies left")),
        }
    }
}

/// A box at `(x, y)` with plain text content and no accessibility label.
pub fn bbox(x: f64, y: f64, text: &str, kind: &str) -> BoundingBox {
    BoundingBox {
        x,
        y,
        text: Some(text.to_string()),
        aria_label: Some(String::new()),
        kind: kind.to_string(),
    }
}
