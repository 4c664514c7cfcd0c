//! Full cycles through the agent with a fake page and a scripted model.

use std::sync::Arc;
use std::time::Duration;

use webpilot::agent::AgentTerminated;
use webpilot::dom::RetryPolicy;
use webpilot::execute::Pacing;
use webpilot::prompt::SYSTEM_PROMPT;
use webpilot::test_support::{Command, FakePage, ScriptedModel, bbox};
use webpilot::types::TerminateReason;
use webpilot::{Action, Agent, AgentSettings, Phase};

fn settings() -> AgentSettings {
    AgentSettings {
        retry: RetryPolicy {
            max_attempts: 3,
            delay: Duration::ZERO,
        },
        pacing: Pacing {
            wait: Duration::ZERO,
            mac_keys: false,
            navigation_timeout: Duration::from_secs(2),
        },
    }
}

fn agent(task: &str, page: &Arc<FakePage>, model: &Arc<ScriptedModel>) -> Agent {
    Agent::new(task, page.clone(), model.clone(), settings())
}

#[tokio::test]
async fn clicks_the_search_button() {
    let page = Arc::new(FakePage::new(vec![bbox(100.0, 50.0, "Search", "button")]));
    let model = Arc::new(ScriptedModel::new(&[
        "Thought: the search button is labelled 0\nAction: Click 0",
    ]));
    let mut agent = agent("click the search button", &page, &model);
    assert_eq!(agent.state().phase, Phase::Idle);

    let cycle = agent.next_action().await.unwrap();

    assert_eq!(cycle.action, Action::Click { label: 0 });
    assert_eq!(cycle.observation.as_str(), "Clicked 0");
    assert_eq!(page.input_commands(), vec![Command::ClickAt(100.0, 50.0)]);
    assert!(!agent.is_terminated());
    assert_eq!(agent.state().phase, Phase::Annotating);
    assert_eq!(agent.state().scratchpad, vec!["Click 0 -> Clicked 0"]);
}

#[tokio::test]
async fn model_sees_legend_task_and_screenshot() {
    let page = Arc::new(FakePage::new(vec![bbox(100.0, 50.0, "Search", "button")]));
    let model = Arc::new(ScriptedModel::new(&["Action: Wait"]));
    let mut agent = agent("click the search button", &page, &model);

    agent.next_action().await.unwrap();

    let requests = model.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].system_prompt, SYSTEM_PROMPT);
    assert_eq!(
        requests[0].user_text,
        "Valid Bounding Boxes:\n0 (<button/>): \"Search\"\nclick the search button"
    );
    assert_eq!(requests[0].image_base64, "ZmFrZS1wbmc=");
}

#[tokio::test]
async fn malformed_reply_terminates_without_input() {
    let page = Arc::new(FakePage::new(vec![bbox(1.0, 1.0, "x", "a")]));
    let raw = "I think I should click something.";
    let model = Arc::new(ScriptedModel::new(&[raw]));
    let mut agent = agent("anything", &page, &model);

    let cycle = agent.next_action().await.unwrap();

    assert_eq!(
        cycle.action,
        Action::Terminate(TerminateReason::Unparseable(raw.to_string()))
    );
    assert!(agent.is_terminated());
    assert_eq!(agent.state().phase, Phase::Terminated);
    assert!(page.input_commands().is_empty());
}

#[tokio::test]
async fn requested_termination_is_distinct_from_unparseable() {
    let page = Arc::new(FakePage::new(vec![]));
    let model = Arc::new(ScriptedModel::new(&[
        "Thought: done\nAction: TERMINATE found it",
    ]));
    let mut agent = agent("anything", &page, &model);

    let cycle = agent.next_action().await.unwrap();

    assert_eq!(
        cycle.action,
        Action::Terminate(TerminateReason::Requested("found it".into()))
    );
    assert_eq!(cycle.observation.as_str(), "Terminated: found it");
    assert!(agent.is_terminated());
}

#[tokio::test]
async fn no_cycles_after_termination() {
    let page = Arc::new(FakePage::new(vec![]));
    let model = Arc::new(ScriptedModel::new(&["Action: TERMINATE", "Action: Wait"]));
    let mut agent = agent("anything", &page, &model);

    agent.next_action().await.unwrap();
    let err = agent.next_action().await.unwrap_err();

    assert!(err.downcast_ref::<AgentTerminated>().is_some());
    assert_eq!(model.requests().len(), 1);
}

#[tokio::test]
async fn bad_label_lets_the_model_recover() {
    let page = Arc::new(FakePage::new(vec![
        bbox(10.0, 10.0, "first", "a"),
        bbox(20.0, 20.0, "second", "a"),
    ]));
    let model = Arc::new(ScriptedModel::new(&[
        "Thought: try 7\nAction: Click 7",
        "Thought: oops, 1 then\nAction: Click 1",
    ]));
    let mut agent = agent("open the second link", &page, &model);

    let first = agent.next_action().await.unwrap();
    assert_eq!(first.observation.as_str(), "Error: no bbox for : 7");
    assert!(page.input_commands().is_empty());

    let second = agent.next_action().await.unwrap();
    assert_eq!(second.observation.as_str(), "Clicked 1");
    assert_eq!(page.input_commands(), vec![Command::ClickAt(20.0, 20.0)]);
    assert_eq!(agent.state().scratchpad.len(), 2);
}

#[tokio::test]
async fn labels_refer_to_the_current_scan_only() {
    let page = Arc::new(FakePage::new(vec![]).with_scans(vec![
        Ok(vec![bbox(1.0, 1.0, "old", "a"), bbox(2.0, 2.0, "old", "a")]),
        Ok(vec![bbox(9.0, 9.0, "new", "button")]),
    ]));
    let model = Arc::new(ScriptedModel::new(&["Action: Wait", "Action: Click 1"]));
    let mut agent = agent("anything", &page, &model);

    agent.next_action().await.unwrap();
    assert_eq!(agent.state().boxes.len(), 2);

    let cycle = agent.next_action().await.unwrap();
    assert_eq!(cycle.observation.as_str(), "Error: no bbox for : 1");
    assert_eq!(agent.state().boxes.len(), 1);
    assert_eq!(
        agent.state().legend.as_str(),
        "Valid Bounding Boxes:\n0 (<button/>): \"new\""
    );
    assert!(page.input_commands().is_empty());
}

#[tokio::test]
async fn model_failure_propagates() {
    let page = Arc::new(FakePage::new(vec![]));
    let model = Arc::new(ScriptedModel::failing("quota exceeded"));
    let mut agent = agent("anything", &page, &model);

    let err = agent.next_action().await.unwrap_err();

    assert!(err.to_string().contains("quota exceeded"));
    assert_eq!(agent.state().phase, Phase::Deciding);
    assert!(agent.state().observation.is_none());
    assert!(page.input_commands().is_empty());
}

#[tokio::test]
async fn type_then_go_back() {
    let page = Arc::new(FakePage::new(vec![bbox(3.0, 4.0, "", "input")]));
    let model = Arc::new(ScriptedModel::new(&[
        "Thought: search\nAction: Type 0; weather in Oslo",
        "Thought: wrong page\nAction: GoBack",
    ]));
    let mut agent = agent("find the weather", &page, &model);

    let typed = agent.next_action().await.unwrap();
    assert_eq!(typed.observation.as_str(), "Typed weather in Oslo and submitted");

    let back = agent.next_action().await.unwrap();
    assert_eq!(
        back.observation.as_str(),
        "Navigated back a page to https://example.com/previous."
    );
    assert_eq!(
        agent.state().observation.as_ref().map(|o| o.as_str()),
        Some("Navigated back a page to https://example.com/previous.")
    );
}

#[tokio::test]
async fn browser_failure_leaves_no_stale_observation() {
    let page = Arc::new(FakePage::new(vec![bbox(5.0, 5.0, "x", "button")]).failing_clicks());
    let model = Arc::new(ScriptedModel::new(&["Action: Wait", "Action: Click 0"]));
    let mut agent = agent("anything", &page, &model);

    let waited = agent.next_action().await.unwrap();
    assert_eq!(waited.observation.as_str(), "Waited for 0ns.");

    let err = agent.next_action().await.unwrap_err();

    assert!(err.to_string().contains("browser connection closed"));
    let state = agent.state();
    assert_eq!(state.phase, Phase::Executing);
    assert_eq!(state.action, Some(Action::Click { label: 0 }));
    assert!(state.observation.is_none());
    assert_eq!(state.scratchpad, vec!["Wait -> Waited for 0ns."]);
}
