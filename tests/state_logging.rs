//! What the debug state dump and the decision log carry.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::Level;
use webpilot::dom::RetryPolicy;
use webpilot::execute::Pacing;
use webpilot::prompt::PROMPT_VERSION;
use webpilot::test_support::{Command, FakePage, ScriptedModel, bbox};
use webpilot::{Agent, AgentSettings};

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn settings() -> AgentSettings {
    AgentSettings {
        retry: RetryPolicy {
            max_attempts: 1,
            delay: Duration::ZERO,
        },
        pacing: Pacing {
            wait: Duration::ZERO,
            mac_keys: false,
            navigation_timeout: Duration::from_secs(2),
        },
    }
}

#[tokio::test]
async fn debug_dump_includes_page_url_and_prompt_version() {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let page = Arc::new(FakePage::new(vec![bbox(1.0, 1.0, "Search", "button")]));
    let model = Arc::new(ScriptedModel::new(&["Action: Wait"]));
    let mut agent = Agent::new("anything", page.clone(), model, settings());

    agent.next_action().await.unwrap();

    let commands = page.commands();
    assert_eq!(commands.first(), Some(&Command::CurrentUrl));
    assert_eq!(commands.last(), Some(&Command::CurrentUrl));

    let logs = captured.text();
    assert!(logs.contains("url=https://example.com/current"), "{}", logs);
    assert!(
        logs.contains(&format!("prompt_version={}", PROMPT_VERSION)),
        "{}",
        logs
    );
}
