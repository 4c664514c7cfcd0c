use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Parser;

use crate::agent::AgentSettings;
use crate::brain::ModelConfig;
use crate::dom::RetryPolicy;
use crate::execute::Pacing;
use crate::hands::BrowserOptions;

/// Drive a browser towards a goal using a vision model.
#[derive(Debug, Parser)]
#[command(name = "agent", version)]
pub struct Cli {
    /// What the agent should accomplish, in plain language.
    pub task: String,

    /// Page to open before the first cycle.
    #[arg(long, default_value = "https://www.google.com")]
    pub start_url: String,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: String,

    #[arg(long, env = "OPENAI_API_BASE", default_value = "https://api.openai.com/v1")]
    pub api_base: String,

    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4o-mini")]
    pub model: String,

    #[arg(long, default_value_t = 4096)]
    pub max_tokens: u32,

    /// Script defining `markPage()` and `unmarkPage()`.
    #[arg(long, default_value = "mark-page.js")]
    pub mark_script: PathBuf,

    #[arg(long)]
    pub headless: bool,

    #[arg(long)]
    pub chrome_path: Option<PathBuf>,

    /// Attach to a running Chrome instead of launching one.
    #[arg(long)]
    pub connect: Option<String>,

    /// Stop after this many cycles even if the model never terminates.
    #[arg(long, default_value_t = 25)]
    pub max_steps: usize,

    #[arg(long, default_value_t = 10)]
    pub annotate_retries: u32,

    #[arg(long, default_value_t = 3000)]
    pub annotate_delay_ms: u64,

    #[arg(long, default_value_t = 5)]
    pub wait_secs: u64,
}

/// Validated run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub task: String,
    pub start_url: String,
    pub mark_script: PathBuf,
    pub max_steps: usize,
    pub model: ModelConfig,
    pub browser: BrowserOptions,
    pub agent: AgentSettings,
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self> {
        if cli.task.trim().is_empty() {
            bail!("task must not be empty");
        }
        if cli.api_key.trim().is_empty() {
            bail!("OPENAI_API_KEY must not be empty");
        }
        if cli.max_steps == 0 {
            bail!("--max-steps must be at least 1");
        }
        if cli.annotate_retries == 0 {
            bail!("--annotate-retries must be at least 1");
        }

        Ok(Self {
            task: cli.task,
            start_url: cli.start_url,
            mark_script: cli.mark_script,
            max_steps: cli.max_steps,
            model: ModelConfig {
                api_key: cli.api_key,
                api_base: cli.api_base,
                model: cli.model,
                max_tokens: cli.max_tokens,
            },
            browser: BrowserOptions {
                headless: cli.headless,
                chrome_path: cli.chrome_path,
                connect: cli.connect,
            },
            agent: AgentSettings {
                retry: RetryPolicy {
                    max_attempts: cli.annotate_retries,
                    delay: Duration::from_millis(cli.annotate_delay_ms),
                },
                pacing: Pacing {
                    wait: Duration::from_secs(cli.wait_secs),
                    ..Pacing::default()
                },
            },
        })
    }
}
