//! Browser side of the agent: the [`Page`] seam and its headless Chrome implementation.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow};
use headless_chrome::browser::tab::ModifierKey;
use headless_chrome::browser::tab::point::Point;
use headless_chrome::protocol::cdp::Input;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use tracing::info;

use crate::types::BoundingBox;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Control,
    Meta,
}

/// A key press, optionally held together with one modifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCombo {
    pub key: String,
    pub modifier: Option<Modifier>,
}

impl KeyCombo {
    pub fn key(key: &str) -> Self {
        Self {
            key: key.to_string(),
            modifier: None,
        }
    }

    /// Select-all uses Command on macOS and Control everywhere else.
    pub fn select_all(mac: bool) -> Self {
        Self {
            key: "a".to_string(),
            modifier: Some(if mac { Modifier::Meta } else { Modifier::Control }),
        }
    }

    /// Chrome on macOS ignores Command+A sent as a raw key event; the
    /// selection has to be made through an editing command instead.
    pub fn needs_editing_command(&self) -> bool {
        self.modifier == Some(Modifier::Meta) && self.key.eq_ignore_ascii_case("a")
    }
}

/// Select the contents of the focused field, or the document if nothing editable has focus.
const SELECT_ALL_SCRIPT: &str = r#"
(() => {
  const el = document.activeElement;
  if (el && typeof el.select === 'function') {
    el.select();
  } else {
    document.execCommand('selectAll');
  }
})()
"#;

/// Everything the agent needs from a live browser page.
///
/// All calls block until the browser has answered. Errors are hard failures.
pub trait Page: Send + Sync {
    /// Draw labels on interactive elements and return them in label order.
    fn mark_page(&self) -> Result<Vec<BoundingBox>>;
    /// Remove whatever `mark_page` drew.
    fn unmark_page(&self) -> Result<()>;
    fn screenshot(&self) -> Result<Vec<u8>>;
    fn current_url(&self) -> Result<String>;
    fn click_at(&self, x: f64, y: f64) -> Result<()>;
    fn key_press(&self, combo: &KeyCombo) -> Result<()>;
    fn type_text(&self, text: &str) -> Result<()>;
    fn move_to(&self, x: f64, y: f64) -> Result<()>;
    fn wheel_scroll(&self, dx: f64, dy: f64) -> Result<()>;
    fn scroll_window(&self, dy: f64) -> Result<()>;
    fn go_back(&self) -> Result<()>;
}

/// Launch and connection settings for Chrome.
#[derive(Debug, Clone, Default)]
pub struct BrowserOptions {
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    /// Debugger URL of an already running Chrome, e.g. `http://127.0.0.1:9222`.
    pub connect: Option<String>,
}

const LAUNCH_ARGS: &[&str] = &[
    "--disable-gpu",
    "--disable-dev-shm-usage",
    "--disable-setuid-sandbox",
    "--no-first-run",
    "--no-sandbox",
    "--no-zygote",
    "--ignore-certificate-errors",
    "--disable-extensions",
    "--disable-infobars",
    "--disable-notifications",
    "--disable-popup-blocking",
    "--disable-blink-features=AutomationControlled",
];

/// Browser process plus the tab the agent drives. Created once per run.
pub struct BrowserSession {
    _browser: Browser,
    pub tab: Arc<Tab>,
}

impl BrowserSession {
    pub fn launch(options: &BrowserOptions) -> Result<Self> {
        if let Some(url) = &options.connect {
            info!(url = %url, "attaching to existing Chrome");
            let browser = Browser::connect(url.clone())
                .map_err(|e| anyhow!("could not attach to Chrome at {}: {}", url, e))?;
            let existing = {
                let tabs = browser.get_tabs();
                let tabs = tabs.lock().map_err(|_| anyhow!("tab list lock poisoned"))?;
                tabs.first().cloned()
            };
            let tab = match existing {
                Some(tab) => tab,
                None => browser.new_tab()?,
            };
            return Ok(Self {
                _browser: browser,
                tab,
            });
        }

        let launch = LaunchOptions {
            headless: options.headless,
            path: options.chrome_path.clone(),
            args: LAUNCH_ARGS.iter().map(OsStr::new).collect(),
            idle_browser_timeout: std::time::Duration::from_secs(300),
            ..Default::default()
        };

        info!(headless = options.headless, "launching Chrome");
        let browser =
            Browser::new(launch).map_err(|e| anyhow!("Browser launch failed: {}", e))?;
        let tab = browser.new_tab()?;
        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    pub fn navigate(&self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .with_context(|| format!("failed to open {}", url))?;
        self.tab
            .wait_until_navigated()
            .context("navigation did not complete")?;
        Ok(())
    }
}

/// [`Page`] backed by a headless_chrome tab and an in-page marking script.
///
/// The script must define `markPage()`, returning
/// `[{x, y, text, ariaLabel, type}]`, and `unmarkPage()`.
pub struct ChromePage {
    tab: Arc<Tab>,
    mark_script: String,
    pointer: Mutex<(f64, f64)>,
}

impl ChromePage {
    pub fn new(tab: Arc<Tab>, mark_script: String) -> Self {
        Self {
            tab,
            mark_script,
            pointer: Mutex::new((0.0, 0.0)),
        }
    }

    pub fn from_script_file(tab: Arc<Tab>, path: &Path) -> Result<Self> {
        let mark_script = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read mark script {}", path.display()))?;
        Ok(Self::new(tab, mark_script))
    }

    fn pointer(&self) -> (f64, f64) {
        self.pointer.lock().map(|p| *p).unwrap_or((0.0, 0.0))
    }

    fn set_pointer(&self, x: f64, y: f64) {
        if let Ok(mut pointer) = self.pointer.lock() {
            *pointer = (x, y);
        }
    }

    fn evaluate_string(&self, expression: &str) -> Result<String> {
        let result = self.tab.evaluate(expression, false)?;
        result
            .value
            .and_then(|v| v.as_str().map(String::from))
            .ok_or_else(|| anyhow!("`{}` did not return a string", expression))
    }

    fn ensure_mark_script(&self) -> Result<()> {
        let loaded = self
            .tab
            .evaluate("typeof markPage === 'function'", false)?
            .value
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if !loaded {
            self.tab.evaluate(&self.mark_script, false)?;
        }
        Ok(())
    }
}

impl Page for ChromePage {
    fn mark_page(&self) -> Result<Vec<BoundingBox>> {
        self.ensure_mark_script()?;
        let json = self.evaluate_string("JSON.stringify(markPage())")?;
        serde_json::from_str(&json).context("markPage() returned malformed boxes")
    }

    fn unmark_page(&self) -> Result<()> {
        self.tab.evaluate("unmarkPage()", false)?;
        Ok(())
    }

    fn screenshot(&self) -> Result<Vec<u8>> {
        self.tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .context("screenshot failed")
    }

    fn current_url(&self) -> Result<String> {
        // `Tab::get_url` is cached target info and lags script-driven navigation.
        self.evaluate_string("window.location.href")
    }

    fn click_at(&self, x: f64, y: f64) -> Result<()> {
        self.tab.click_point(Point { x, y })?;
        self.set_pointer(x, y);
        Ok(())
    }

    fn key_press(&self, combo: &KeyCombo) -> Result<()> {
        match combo.modifier {
            Some(modifier) => {
                let held: &[ModifierKey] = match modifier {
                    Modifier::Control => &[ModifierKey::Ctrl],
                    Modifier::Meta => &[ModifierKey::Meta],
                };
                self.tab.press_key_with_modifiers(&combo.key, Some(held))?;
                if combo.needs_editing_command() {
                    self.tab.evaluate(SELECT_ALL_SCRIPT, false)?;
                }
            }
            None => {
                self.tab.press_key(&combo.key)?;
            }
        }
        Ok(())
    }

    fn type_text(&self, text: &str) -> Result<()> {
        self.tab.type_str(text)?;
        Ok(())
    }

    fn move_to(&self, x: f64, y: f64) -> Result<()> {
        self.tab.move_mouse_to_point(Point { x, y })?;
        self.set_pointer(x, y);
        Ok(())
    }

    fn wheel_scroll(&self, dx: f64, dy: f64) -> Result<()> {
        // CDP delivers wheel events at explicit coordinates, not at the cursor.
        let (x, y) = self.pointer();
        self.tab.call_method(Input::DispatchMouseEvent {
            Type: Input::DispatchMouseEventTypeOption::MouseWheel,
            x,
            y,
            modifiers: None,
            timestamp: None,
            button: None,
            buttons: None,
            click_count: None,
            force: None,
            tangential_pressure: None,
            tilt_x: None,
            tilt_y: None,
            twist: None,
            delta_x: Some(dx),
            delta_y: Some(dy),
            pointer_Type: None,
        })?;
        Ok(())
    }

    fn scroll_window(&self, dy: f64) -> Result<()> {
        self.tab
            .evaluate(&format!("window.scrollBy(0, {})", dy), false)?;
        Ok(())
    }

    fn go_back(&self) -> Result<()> {
        self.tab.evaluate("window.history.back()", false)?;
        Ok(())
    }
}
