//! The perceive, decide, act loop.
//!
//! [`Agent::next_action`] runs exactly one cycle: annotate the page, build
//! the legend, ask the model, parse its reply, execute the action. The caller
//! decides whether to run another one.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{Level, debug, info};

use crate::brain::{Model, request_decision};
use crate::dom::{RetryPolicy, annotate, format_legend};
use crate::execute::{Pacing, execute};
use crate::hands::Page;
use crate::parse::parse_action;
use crate::types::{Action, BoundingBox, Legend, Observation, Screenshot};

/// Where the agent is within its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Annotating,
    Legending,
    Deciding,
    Parsing,
    Executing,
    Terminated,
}

/// Everything the loop knows about the current run.
#[derive(Debug, Clone)]
pub struct AgentState {
    pub task: String,
    pub boxes: Vec<BoundingBox>,
    pub legend: Legend,
    pub screenshot: Screenshot,
    pub action: Option<Action>,
    pub observation: Option<Observation>,
    /// One note per completed cycle. Not sent to the model.
    pub scratchpad: Vec<String>,
    pub phase: Phase,
}

impl AgentState {
    pub fn new(task: &str) -> Self {
        Self {
            task: task.to_string(),
            boxes: Vec::new(),
            legend: Legend::default(),
            screenshot: Screenshot::default(),
            action: None,
            observation: None,
            scratchpad: Vec::new(),
            phase: Phase::Idle,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AgentSettings {
    pub retry: RetryPolicy,
    pub pacing: Pacing,
}

/// Result of one completed cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Cycle {
    pub action: Action,
    pub observation: Observation,
}

#[derive(Debug, thiserror::Error)]
#[error("agent has already terminated")]
pub struct AgentTerminated;

pub struct Agent {
    page: Arc<dyn Page>,
    model: Arc<dyn Model>,
    settings: AgentSettings,
    state: AgentState,
}

impl Agent {
    pub fn new(
        task: &str,
        page: Arc<dyn Page>,
        model: Arc<dyn Model>,
        settings: AgentSettings,
    ) -> Self {
        Self {
            page,
            model,
            settings,
            state: AgentState::new(task),
        }
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.state.phase == Phase::Terminated
    }

    /// Run one full cycle.
    ///
    /// Model and browser failures are returned as errors and leave the agent
    /// in the phase where they happened; the caller may try again or give up.
    pub async fn next_action(&mut self) -> Result<Cycle> {
        if self.is_terminated() {
            return Err(AgentTerminated.into());
        }
        self.log_state("before action");

        self.state.phase = Phase::Annotating;
        let page = Arc::clone(&self.page);
        let retry = self.settings.retry;
        let annotation = tokio::task::spawn_blocking(move || annotate(page.as_ref(), &retry))
            .await
            .context("annotation task panicked")??;
        self.state.screenshot = annotation.screenshot;
        self.state.boxes = annotation.boxes;

        self.state.phase = Phase::Legending;
        self.state.legend = format_legend(&self.state.boxes);

        self.state.phase = Phase::Deciding;
        let output = request_decision(
            self.model.as_ref(),
            &self.state.legend,
            &self.state.task,
            &self.state.screenshot,
        )
        .await?;

        self.state.phase = Phase::Parsing;
        let action = parse_action(&output);
        self.state.action = Some(action.clone());
        // The previous observation belongs to the previous action.
        self.state.observation = None;
        info!(%action, "model chose action");

        self.state.phase = Phase::Executing;
        let observation = if action.is_terminal() {
            // Nothing to hand off: termination has no page effect.
            execute(&action, &self.state.boxes, self.page.as_ref(), &self.settings.pacing)?
        } else {
            let page = Arc::clone(&self.page);
            let boxes = self.state.boxes.clone();
            let pacing = self.settings.pacing;
            let to_run = action.clone();
            tokio::task::spawn_blocking(move || execute(&to_run, &boxes, page.as_ref(), &pacing))
                .await
                .context("action task panicked")??
        };
        info!(%observation, "observation");

        self.state
            .scratchpad
            .push(format!("{} -> {}", action, observation));
        self.state.observation = Some(observation.clone());
        self.state.phase = if action.is_terminal() {
            Phase::Terminated
        } else {
            Phase::Annotating
        };

        self.log_state("after action");
        Ok(Cycle {
            action,
            observation,
        })
    }

    fn log_state(&self, when: &str) {
        if !tracing::enabled!(Level::DEBUG) {
            return;
        }
        let state = &self.state;
        let url = self
            .page
            .current_url()
            .unwrap_or_else(|_| "unknown".to_string());
        debug!(
            when,
            url = %url,
            task = %state.task,
            phase = ?state.phase,
            boxes = state.boxes.len(),
            legend = %state.legend,
            scratchpad = %state.scratchpad.join(", "),
            observation = state.observation.as_ref().map(|o| o.as_str()).unwrap_or("No observation available"),
            action = ?state.action,
            "agent state"
        );
    }
}

