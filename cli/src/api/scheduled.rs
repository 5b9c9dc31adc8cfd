use anyhow::{Context, Result};
use serde::Serialize;

use super::{identifier, EVENT, EVENT_LIST};
use crate::http_client::Client;
use crate::types::{Channel, ScheduledEvent};

/// A call or SMS to be placed by an assistant at `scheduled_at`. When the
/// mission/run/step linkage is present the server marks the plan step
/// completed once the event finishes.
#[derive(Debug, Clone, Serialize)]
pub struct NewScheduledEvent {
    pub channel: Channel,
    pub to: String,
    pub from: String,
    pub scheduled_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mission_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
}

impl NewScheduledEvent {
    pub fn call(
        to: impl Into<String>,
        from: impl Into<String>,
        scheduled_at: impl Into<String>,
        mission_id: impl Into<String>,
        run_id: impl Into<String>,
        step_id: Option<String>,
    ) -> Self {
        Self {
            channel: Channel::Call,
            to: to.into(),
            from: from.into(),
            scheduled_at: scheduled_at.into(),
            text_body: None,
            mission_id: Some(mission_id.into()),
            run_id: Some(run_id.into()),
            step_id,
        }
    }

    pub fn sms(
        to: impl Into<String>,
        from: impl Into<String>,
        scheduled_at: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            channel: Channel::Sms,
            to: to.into(),
            from: from.into(),
            scheduled_at: scheduled_at.into(),
            text_body: Some(text.into()),
            mission_id: None,
            run_id: None,
            step_id: None,
        }
    }

    pub fn linked(
        mut self,
        mission_id: Option<String>,
        run_id: Option<String>,
        step_id: Option<String>,
    ) -> Self {
        self.mission_id = mission_id.or(self.mission_id);
        self.run_id = run_id.or(self.run_id);
        self.step_id = step_id.or(self.step_id);
        self
    }
}

pub async fn schedule_event(
    client: &Client,
    assistant_id: &str,
    event: &NewScheduledEvent,
) -> Result<String> {
    let body = serde_json::to_value(event)?;
    let resp = client
        .post(&format!("/assistants/{}/events", assistant_id), &body)
        .await?;
    let id = identifier(&EVENT.unwrap(&resp), &["id"])
        .context("schedule response missing event id")?;
    match event.channel {
        Channel::Call => println!("Scheduled call: {}", id),
        Channel::Sms => println!("Scheduled SMS: {}", id),
    }
    Ok(id)
}

pub async fn get_scheduled_event(
    client: &Client,
    assistant_id: &str,
    event_id: &str,
) -> Result<ScheduledEvent> {
    let resp = client
        .get(&format!("/assistants/{}/events/{}", assistant_id, event_id))
        .await?;
    let event: ScheduledEvent = EVENT.unwrap_as(&resp)?;
    println!("{}", event.status_line());
    Ok(event)
}

pub async fn delete_scheduled_event(
    client: &Client,
    assistant_id: &str,
    event_id: &str,
) -> Result<()> {
    client
        .delete(&format!("/assistants/{}/events/{}", assistant_id, event_id))
        .await?;
    println!("Deleted scheduled event: {}", event_id);
    Ok(())
}

pub async fn list_scheduled_events(
    client: &Client,
    assistant_id: &str,
) -> Result<Vec<ScheduledEvent>> {
    let resp = client
        .get(&format!("/assistants/{}/events", assistant_id))
        .await?;
    let events: Vec<ScheduledEvent> = EVENT_LIST.unwrap_list(&resp)?;
    for e in &events {
        println!("{}", e.list_line());
    }
    Ok(events)
}
