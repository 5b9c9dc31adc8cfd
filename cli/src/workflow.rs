//! Multi-step operations that combine API calls with local state so an
//! operator can re-invoke them and pick up where a previous run stopped.
//!
//! Nothing is rolled back. A step that fails leaves whatever was already
//! persisted; the resume checks at the top of each workflow are the only
//! recovery path.

use anyhow::Result;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::api::assistants::{self, AssistantOptions, NewAssistant, DEFAULT_FEATURES};
use crate::api::{missions, numbers, runs};
use crate::http_client::Client;
use crate::state::{slugify, utc_timestamp, MissionEntry, StateBackend, StateStore};
use crate::types::{ConnectionType, Feature, RunStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissionHandle {
    pub slug: String,
    pub mission_id: String,
    pub run_id: String,
    pub resumed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceAgent {
    pub assistant_id: String,
    /// `None` when the account had no free number.
    pub phone_number: Option<String>,
    pub resumed: bool,
}

fn entry_str<'a>(entry: &'a MissionEntry, key: &str) -> Option<&'a str> {
    entry.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn fields(pairs: impl IntoIterator<Item = (&'static str, Value)>) -> MissionEntry {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect::<Map<_, _>>()
}

/// Creates mission, run and optional plan, then marks the run running.
/// Returns the cached ids unchanged if the slug already has both.
pub async fn init_mission<B: StateBackend>(
    client: &Client,
    store: &StateStore<B>,
    name: &str,
    instructions: &str,
    user_request: &str,
    plan_steps: Option<&[Value]>,
) -> Result<MissionHandle> {
    let slug = slugify(name);
    let existing = store.mission(&slug)?;
    if let (Some(mission_id), Some(run_id)) = (
        entry_str(&existing, "mission_id"),
        entry_str(&existing, "run_id"),
    ) {
        println!("Resuming existing mission: {}", slug);
        return Ok(MissionHandle {
            mission_id: mission_id.to_string(),
            run_id: run_id.to_string(),
            slug,
            resumed: true,
        });
    }

    let mission_id = missions::create_mission(client, name, instructions).await?;
    store.update_mission(
        &slug,
        fields([
            ("mission_name", json!(name)),
            ("mission_id", json!(mission_id)),
            ("created_at", json!(utc_timestamp())),
        ]),
    )?;

    let run_id = runs::create_run(
        client,
        &mission_id,
        &json!({ "original_request": user_request }),
    )
    .await?;
    store.update_mission(&slug, fields([("run_id", json!(run_id))]))?;

    if let Some(steps) = plan_steps.filter(|s| !s.is_empty()) {
        runs::create_plan(client, &mission_id, &run_id, steps).await?;
    }

    runs::update_run(
        client,
        &mission_id,
        &run_id,
        &runs::RunUpdate::status(RunStatus::Running),
    )
    .await?;
    info!(%slug, %mission_id, %run_id, "mission initialized");

    Ok(MissionHandle {
        slug,
        mission_id,
        run_id,
        resumed: false,
    })
}

/// Options accepted by `setup-agent`.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct AgentSetupOptions {
    pub tools: Option<Vec<Value>>,
    pub model: Option<String>,
}

/// Creates a telephony+messaging assistant, links it to the mission run,
/// and assigns it the first available number. Returns the cached pair if
/// the slug already has both an assistant and a phone.
pub async fn setup_voice_agent<B: StateBackend>(
    client: &Client,
    store: &StateStore<B>,
    slug: &str,
    name: &str,
    instructions: &str,
    greeting: &str,
    options: AgentSetupOptions,
) -> Result<VoiceAgent> {
    let existing = store.mission(slug)?;
    if let (Some(assistant_id), Some(phone)) = (
        entry_str(&existing, "assistant_id"),
        entry_str(&existing, "agent_phone"),
    ) {
        println!("Using existing assistant: {}", assistant_id);
        return Ok(VoiceAgent {
            assistant_id: assistant_id.to_string(),
            phone_number: Some(phone.to_string()),
            resumed: true,
        });
    }

    let assistant = NewAssistant::new(
        name,
        instructions,
        greeting,
        AssistantOptions {
            features: Some(DEFAULT_FEATURES.iter().map(|f| f.to_string()).collect()),
            model: options.model,
            tools: options.tools,
            description: None,
        },
    );
    let assistant_id = assistants::create_assistant(client, &assistant).await?;
    store.update_mission(slug, fields([("assistant_id", json!(assistant_id))]))?;

    if let (Some(mission_id), Some(run_id)) = (
        entry_str(&existing, "mission_id"),
        entry_str(&existing, "run_id"),
    ) {
        runs::link_agent(client, mission_id, run_id, &assistant_id).await?;
    }

    let Some(phone) = numbers::available_phone_number(client).await? else {
        warn!(%slug, %assistant_id, "assistant created without a phone number");
        return Ok(VoiceAgent {
            assistant_id,
            phone_number: None,
            resumed: false,
        });
    };
    // available_phone_number guarantees both fields.
    let phone_id = phone.id.unwrap_or_default();
    let phone_number = phone.phone_number.unwrap_or_default();

    match assistants::connection_id(client, &assistant_id, Feature::Telephony).await? {
        Some(connection_id) => {
            numbers::assign_phone_number(client, &phone_id, &connection_id, ConnectionType::Voice)
                .await?;
            store.update_mission(
                slug,
                fields([
                    ("agent_phone", json!(phone_number)),
                    ("phone_number_id", json!(phone_id)),
                ]),
            )?;
            info!(%slug, %assistant_id, %phone_number, "voice agent provisioned");
        }
        None => warn!(%slug, %assistant_id, "no telephony connection; phone left unassigned"),
    }

    Ok(VoiceAgent {
        assistant_id,
        phone_number: Some(phone_number),
        resumed: false,
    })
}

/// Marks the run succeeded and drops the slug's local state entirely.
pub async fn complete_mission<B: StateBackend>(
    client: &Client,
    store: &StateStore<B>,
    slug: &str,
    mission_id: &str,
    run_id: &str,
    summary: &str,
    payload: Option<Value>,
) -> Result<()> {
    let update = runs::RunUpdate {
        status: Some(RunStatus::Succeeded),
        result_summary: Some(summary.to_string()).filter(|s| !s.is_empty()),
        result_payload: payload,
    };
    runs::update_run(client, mission_id, run_id, &update).await?;
    store.remove_mission(slug)?;
    println!("Mission '{}' completed successfully", slug);
    Ok(())
}
