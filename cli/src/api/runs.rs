//! Runs of a mission and everything hanging off a run: plan, event log and
//! linked agents.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{json, Value};

use super::{identifier, print_json, DATA_LIST, DATA_OBJECT, RUN};
use crate::http_client::Client;
use crate::types::{LinkedAgent, MissionEvent, Run, RunStatus, StepStatus};

pub const DEFAULT_EVENT_AGENT: &str = "claude-code";

fn run_path(mission_id: &str, run_id: &str) -> String {
    format!("/missions/{}/runs/{}", mission_id, run_id)
}

pub async fn create_run(client: &Client, mission_id: &str, input: &Value) -> Result<String> {
    let resp = client
        .post(
            &format!("/missions/{}/runs", mission_id),
            &json!({ "input": input }),
        )
        .await?;
    let id = identifier(&RUN.unwrap(&resp), &["run_id", "id"])
        .context("create run response missing run_id")?;
    println!("Created run: {}", id);
    Ok(id)
}

pub async fn get_run(client: &Client, mission_id: &str, run_id: &str) -> Result<Value> {
    let resp = client.get(&run_path(mission_id, run_id)).await?;
    let run = RUN.unwrap(&resp);
    print_json(&run)?;
    Ok(run)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_payload: Option<Value>,
}

impl RunUpdate {
    pub fn status(status: RunStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

pub async fn update_run(
    client: &Client,
    mission_id: &str,
    run_id: &str,
    update: &RunUpdate,
) -> Result<Value> {
    let body = serde_json::to_value(update)?;
    let resp = client.patch(&run_path(mission_id, run_id), &body).await?;
    println!(
        "Updated run {}: {}",
        run_id,
        update
            .status
            .as_ref()
            .map(RunStatus::as_str)
            .unwrap_or("updated")
    );
    Ok(DATA_OBJECT.unwrap(&resp))
}

pub async fn list_runs(client: &Client, mission_id: &str) -> Result<Vec<Run>> {
    let resp = client
        .get(&format!("/missions/{}/runs", mission_id))
        .await?;
    let runs: Vec<Run> = DATA_LIST.unwrap_list(&resp)?;
    for r in &runs {
        println!(
            "{}: {}",
            r.identifier().unwrap_or("-"),
            r.status.as_ref().map(RunStatus::as_str).unwrap_or("-")
        );
    }
    Ok(runs)
}

pub async fn create_plan(
    client: &Client,
    mission_id: &str,
    run_id: &str,
    steps: &[Value],
) -> Result<Value> {
    let resp = client
        .post(
            &format!("{}/plan", run_path(mission_id, run_id)),
            &json!({ "steps": steps }),
        )
        .await?;
    println!("Created plan with {} steps", steps.len());
    Ok(DATA_OBJECT.unwrap(&resp))
}

pub async fn get_plan(client: &Client, mission_id: &str, run_id: &str) -> Result<Value> {
    let resp = client
        .get(&format!("{}/plan", run_path(mission_id, run_id)))
        .await?;
    let plan = DATA_OBJECT.unwrap(&resp);
    print_json(&plan)?;
    Ok(plan)
}

pub async fn update_plan_step(
    client: &Client,
    mission_id: &str,
    run_id: &str,
    step_id: &str,
    status: StepStatus,
) -> Result<Value> {
    let resp = client
        .patch(
            &format!("{}/plan/steps/{}", run_path(mission_id, run_id), step_id),
            &json!({ "status": status.as_str() }),
        )
        .await?;
    println!("Updated step '{}': {}", step_id, status.as_str());
    Ok(DATA_OBJECT.unwrap(&resp))
}

#[derive(Debug, Clone, Serialize)]
pub struct NewEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl NewEvent {
    pub fn new(event_type: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            summary: summary.into(),
            agent_id: Some(DEFAULT_EVENT_AGENT.to_string()),
            step_id: None,
            payload: None,
        }
    }
}

pub async fn log_event(
    client: &Client,
    mission_id: &str,
    run_id: &str,
    event: &NewEvent,
) -> Result<Value> {
    let body = serde_json::to_value(event)?;
    let resp = client
        .post(&format!("{}/events", run_path(mission_id, run_id)), &body)
        .await?;
    println!("Logged event: {}", event.summary);
    Ok(DATA_OBJECT.unwrap(&resp))
}

pub async fn list_events(
    client: &Client,
    mission_id: &str,
    run_id: &str,
) -> Result<Vec<MissionEvent>> {
    let resp = client
        .get(&format!("{}/events", run_path(mission_id, run_id)))
        .await?;
    let events: Vec<MissionEvent> = DATA_LIST.unwrap_list(&resp)?;
    for e in &events {
        println!(
            "[{}] {}",
            e.event_type.as_deref().unwrap_or("-"),
            e.summary.as_deref().unwrap_or("")
        );
    }
    Ok(events)
}

pub async fn link_agent(
    client: &Client,
    mission_id: &str,
    run_id: &str,
    agent_id: &str,
) -> Result<Value> {
    let resp = client
        .post(
            &format!("{}/agents", run_path(mission_id, run_id)),
            &json!({ "telnyx_agent_id": agent_id }),
        )
        .await?;
    println!("Linked agent {} to run {}", agent_id, run_id);
    Ok(DATA_OBJECT.unwrap(&resp))
}

pub async fn list_linked_agents(
    client: &Client,
    mission_id: &str,
    run_id: &str,
) -> Result<Vec<LinkedAgent>> {
    let resp = client
        .get(&format!("{}/agents", run_path(mission_id, run_id)))
        .await?;
    let agents: Vec<LinkedAgent> = DATA_LIST.unwrap_list(&resp)?;
    for a in &agents {
        println!("Agent: {}", a.telnyx_agent_id.as_deref().unwrap_or("-"));
    }
    Ok(agents)
}

pub async fn unlink_agent(
    client: &Client,
    mission_id: &str,
    run_id: &str,
    agent_id: &str,
) -> Result<()> {
    client
        .delete(&format!("{}/agents/{}", run_path(mission_id, run_id), agent_id))
        .await?;
    println!("Unlinked agent {} from run {}", agent_id, run_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use httpmock::Method::PATCH;
    use std::time::Duration;

    fn client(server: &MockServer) -> Client {
        Client::new(&server.base_url(), Some("k".into()), Duration::from_secs(5))
            .expect("client")
    }

    #[tokio::test]
    async fn update_run_sends_only_set_fields() {
        let server = MockServer::start_async().await;
        let m = server
            .mock_async(|when, then| {
                when.method(PATCH)
                    .path("/missions/m1/runs/r1")
                    .json_body(json!({"status": "succeeded", "result_summary": "done"}));
                then.status(200)
                    .json_body(json!({"data": {"run_id": "r1", "status": "succeeded"}}));
            })
            .await;

        let update = RunUpdate {
            status: Some(RunStatus::Succeeded),
            result_summary: Some("done".into()),
            result_payload: None,
        };
        let data = update_run(&client(&server), "m1", "r1", &update)
            .await
            .expect("update");
        assert_eq!(data["status"], "succeeded");
        m.assert_async().await;
    }

    #[tokio::test]
    async fn log_event_omits_absent_step() {
        let server = MockServer::start_async().await;
        let m = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/missions/m1/runs/r1/events")
                    .json_body(json!({
                        "type": "custom",
                        "summary": "called acme",
                        "agent_id": "claude-code"
                    }));
                then.status(201).json_body(json!({"data": {"id": "ev1"}}));
            })
            .await;

        let event = NewEvent::new("custom", "called acme");
        log_event(&client(&server), "m1", "r1", &event)
            .await
            .expect("log");
        m.assert_async().await;
    }

    #[tokio::test]
    async fn plan_step_update_uses_snake_case_status() {
        let server = MockServer::start_async().await;
        let m = server
            .mock_async(|when, then| {
                when.method(PATCH)
                    .path("/missions/m1/runs/r1/plan/steps/s1")
                    .json_body(json!({"status": "in_progress"}));
                then.status(200).json_body(json!({"data": {}}));
            })
            .await;

        update_plan_step(&client(&server), "m1", "r1", "s1", StepStatus::InProgress)
            .await
            .expect("update");
        m.assert_async().await;
    }

    #[tokio::test]
    async fn create_run_ignores_unexpected_status_type() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/missions/m1/runs");
                then.status(201)
                    .json_body(json!({"data": {"run_id": "r9", "status": 3}}));
            })
            .await;

        let id = create_run(&client(&server), "m1", &json!({}))
            .await
            .expect("create");
        assert_eq!(id, "r9");
    }

    #[tokio::test]
    async fn list_runs_reads_data_list() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/missions/m1/runs");
                then.status(200).json_body(json!({
                    "data": [{"run_id": "r1", "status": "running"}, {"run_id": "r2", "status": "failed"}]
                }));
            })
            .await;

        let runs = list_runs(&client(&server), "m1").await.expect("list");
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[1].status, Some(RunStatus::Failed));
    }
}
