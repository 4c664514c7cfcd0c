use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use tracing::{error, info, warn};

use webpilot::Agent;
use webpilot::brain::OpenAiModel;
use webpilot::config::{Cli, Config};
use webpilot::hands::{BrowserSession, ChromePage};
use webpilot::logging;
use webpilot::prompt::PROMPT_VERSION;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    logging::init();

    let config = Config::from_cli(Cli::parse())?;
    info!(
        prompt_version = PROMPT_VERSION,
        model = %config.model.model,
        "starting agent"
    );

    // Launching Chrome blocks for a while; keep it off the runtime threads.
    let browser = config.browser.clone();
    let start_url = config.start_url.clone();
    let mark_script = config.mark_script.clone();
    let (_session, page) = tokio::task::spawn_blocking(move || -> Result<_> {
        let session = BrowserSession::launch(&browser)?;
        session.navigate(&start_url)?;
        let page = ChromePage::from_script_file(session.tab.clone(), &mark_script)?;
        Ok((session, page))
    })
    .await
    .context("browser launch panicked")??;
    info!(url = %config.start_url, "Chrome ready");

    let model = OpenAiModel::new(config.model.clone());
    let mut agent = Agent::new(&config.task, Arc::new(page), Arc::new(model), config.agent);

    run_task(&mut agent, config.max_steps).await
}

async fn run_task(agent: &mut Agent, max_steps: usize) -> Result<()> {
    info!(task = %agent.state().task, "starting task");

    for step in 1..=max_steps {
        let cycle = match agent.next_action().await {
            Ok(cycle) => cycle,
            Err(e) => {
                error!(step, "cycle failed: {:#}", e);
                return Err(e);
            }
        };
        info!(step, action = %cycle.action, observation = %cycle.observation, "step done");

        if agent.is_terminated() {
            info!(step, "task finished");
            return Ok(());
        }
    }

    warn!("Reached maximum step limit ({})", max_steps);
    Ok(())
}
