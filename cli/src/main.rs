mod api;
mod config;
mod error;
mod http_client;
mod state;
mod types;
mod workflow;

use anyhow::{bail, Context, Result};
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::api::assistants::{AssistantOptions, ListAssistants, NewAssistant};
use crate::api::runs::{NewEvent, RunUpdate};
use crate::api::scheduled::NewScheduledEvent;
use crate::api::{assistants, insights, missions, numbers, print_json, runs, scheduled};
use crate::config::{default_config_path, Config, Settings};
use crate::http_client::Client;
use crate::state::{FileBackend, StateStore};
use crate::types::{ConnectionType, Feature, RunStatus, StepStatus};
use crate::workflow::AgentSetupOptions;

const EXIT_FAILURE: i32 = 1;

#[derive(Parser, Debug)]
#[command(name = "missionsctl")]
#[command(about = "ClawdTalk missions API client", long_about = None)]
struct Args {
    /// API key (Authorization: Bearer ...)
    #[arg(long, env = "CLAWDTALK_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL for the missions API
    #[arg(long, env = "CLAWDTALK_API_URL")]
    base_url: Option<String>,

    /// Local mission state file
    #[arg(long, env = "CLAWDTALK_STATE_FILE")]
    state_file: Option<PathBuf>,

    /// Load config from this path
    #[arg(long, env = "CLAWDTALK_CONFIG")]
    config: Option<PathBuf>,

    /// Save the effective api key and base url into config
    #[arg(long, default_value_t = false)]
    save_auth: bool,

    /// HTTP timeout seconds
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify an API key is configured
    CheckKey,

    /// Create a mission
    CreateMission { name: String, instructions: String },
    /// Show a mission as JSON
    GetMission { mission_id: String },
    /// List missions
    ListMissions,

    /// Start a run; input is a JSON object (inline or @file)
    CreateRun { mission_id: String, input_json: String },
    /// Show a run as JSON
    GetRun { mission_id: String, run_id: String },
    /// Set a run's status and, optionally, its result
    UpdateRun {
        mission_id: String,
        run_id: String,
        /// pending|running|succeeded|failed|cancelled
        status: String,
        #[arg(long)]
        summary: Option<String>,
        /// Result payload JSON (inline or @file)
        #[arg(long)]
        payload: Option<String>,
    },
    /// List runs of a mission
    ListRuns { mission_id: String },

    /// Attach a plan; steps is a JSON array (inline or @file)
    CreatePlan {
        mission_id: String,
        run_id: String,
        steps_json: String,
    },
    /// Show a run's plan as JSON
    GetPlan { mission_id: String, run_id: String },
    /// Set a plan step's status
    UpdateStep {
        mission_id: String,
        run_id: String,
        step_id: String,
        #[arg(value_enum)]
        status: StepStatus,
    },

    /// Append to a run's event log; use "-" when no step applies
    LogEvent {
        mission_id: String,
        run_id: String,
        #[arg(value_name = "TYPE")]
        event_type: String,
        summary: String,
        step_id: String,
        payload_json: Option<String>,
    },
    /// List a run's events
    ListEvents { mission_id: String, run_id: String },

    /// Create a voice/messaging assistant
    CreateAssistant {
        name: String,
        instructions: String,
        greeting: String,
        /// {"features"|"enabled_features", "model", "tools", "description"},
        /// or a bare JSON array of features
        options_json: Option<String>,
    },
    /// List assistants, one page at a time
    ListAssistants {
        /// Filter by name
        #[arg(long)]
        name: Option<String>,
        /// 1-indexed page number
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = assistants::DEFAULT_PAGE_SIZE)]
        size: u32,
    },
    /// Show an assistant as JSON
    GetAssistant { assistant_id: String },
    /// Patch an assistant with a JSON object (inline or @file)
    UpdateAssistant {
        assistant_id: String,
        updates_json: String,
    },
    /// Resolve the connection backing an assistant feature
    GetConnectionId {
        assistant_id: String,
        #[arg(value_enum, default_value_t = Feature::Telephony)]
        feature: Feature,
    },

    /// List account phone numbers
    ListPhones,
    /// Find a phone number that is free to assign
    GetAvailablePhone,
    /// Attach a phone number to a connection
    AssignPhone {
        phone_id: String,
        connection_id: String,
        #[arg(value_enum, default_value_t = ConnectionType::Voice)]
        connection_type: ConnectionType,
    },

    /// Schedule an outbound call linked to a mission run
    ScheduleCall {
        assistant_id: String,
        to: String,
        from: String,
        /// ISO 8601, e.g. 2024-12-01T15:00:00Z
        datetime: String,
        mission_id: String,
        run_id: String,
        step_id: Option<String>,
    },
    /// Schedule an SMS, optionally linked to a mission run
    ScheduleSms {
        assistant_id: String,
        to: String,
        from: String,
        datetime: String,
        text: String,
        mission_id: Option<String>,
        run_id: Option<String>,
        step_id: Option<String>,
    },
    /// Show a scheduled event's status
    GetEvent {
        assistant_id: String,
        event_id: String,
    },
    /// Cancel a scheduled event
    CancelScheduledEvent {
        assistant_id: String,
        event_id: String,
    },
    /// List an assistant's scheduled events
    ListEventsAssistant { assistant_id: String },

    /// Show completed insights of a conversation
    GetInsights { conversation_id: String },

    /// Link an assistant to a mission run
    LinkAgent {
        mission_id: String,
        run_id: String,
        agent_id: String,
    },
    /// List assistants linked to a mission run
    ListLinkedAgents { mission_id: String, run_id: String },
    /// Unlink an assistant from a mission run
    UnlinkAgent {
        mission_id: String,
        run_id: String,
        agent_id: String,
    },

    /// List every mission in the state file
    ListState,
    /// Show one mission's state as JSON
    GetState { slug: String },
    /// Drop one mission from the state file
    RemoveState { slug: String },

    /// Store a value under memory[key]; JSON when it starts with { or [
    SaveMemory {
        slug: String,
        key: String,
        value: String,
    },
    /// Show all memory, or one key
    GetMemory { slug: String, key: Option<String> },
    /// Append an item to the list at memory[key]
    AppendMemory {
        slug: String,
        key: String,
        item: String,
    },

    /// Create (or resume) mission + run + optional plan, and mark it running
    Init {
        name: String,
        instructions: String,
        request: String,
        steps_json: Option<String>,
    },
    /// Create (or reuse) a voice assistant with a phone number for a mission
    SetupAgent {
        slug: String,
        name: String,
        instructions: String,
        greeting: String,
        /// {"tools": [...], "model": "..."}
        options_json: Option<String>,
    },
    /// Mark the run succeeded and clear local state
    Complete {
        slug: String,
        mission_id: String,
        run_id: String,
        summary: String,
        payload_json: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => EXIT_FAILURE,
            };
            std::process::exit(code);
        }
    };

    if let Err(err) = run(args).await {
        eprintln!("{:#}", err);
        std::process::exit(EXIT_FAILURE);
    }
}

async fn run(args: Args) -> Result<()> {
    // Logging
    let lvl = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(lvl)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cfg_path = args.config.unwrap_or_else(default_config_path);
    let mut cfg = Config::load(&cfg_path)?;
    let settings = Settings::resolve(&cfg, args.base_url, args.api_key, args.state_file);

    if args.save_auth {
        cfg.base_url = Some(settings.base_url.clone());
        if let Some(k) = &settings.api_key {
            cfg.api_key = Some(k.clone());
        }
        cfg.save(&cfg_path)?;
        debug!(path = %cfg_path.display(), "saved auth to config");
    }

    let client = Client::new(
        &settings.base_url,
        settings.api_key.clone(),
        Duration::from_secs(args.timeout_secs),
    )?;
    let store = StateStore::new(FileBackend::new(&settings.state_file));
    debug!(
        base_url = client.base_url(),
        state_file = %settings.state_file.display(),
        "resolved settings"
    );

    match args.cmd {
        Command::CheckKey => {
            let key = client.api_key()?;
            println!("API key configured: {}", mask_key(key));
            Ok(())
        }

        // Missions
        Command::CreateMission { name, instructions } => {
            missions::create_mission(&client, &name, &instructions).await?;
            Ok(())
        }
        Command::GetMission { mission_id } => {
            missions::get_mission(&client, &mission_id).await?;
            Ok(())
        }
        Command::ListMissions => {
            missions::list_missions(&client, missions::DEFAULT_PAGE_SIZE).await?;
            Ok(())
        }

        // Runs
        Command::CreateRun {
            mission_id,
            input_json,
        } => {
            let input = parse_json_arg(&input_json)?;
            runs::create_run(&client, &mission_id, &input).await?;
            Ok(())
        }
        Command::GetRun { mission_id, run_id } => {
            runs::get_run(&client, &mission_id, &run_id).await?;
            Ok(())
        }
        Command::UpdateRun {
            mission_id,
            run_id,
            status,
            summary,
            payload,
        } => {
            let update = RunUpdate {
                status: Some(RunStatus::from(status.as_str())),
                result_summary: summary,
                result_payload: payload.as_deref().map(parse_json_arg).transpose()?,
            };
            runs::update_run(&client, &mission_id, &run_id, &update).await?;
            Ok(())
        }
        Command::ListRuns { mission_id } => {
            runs::list_runs(&client, &mission_id).await?;
            Ok(())
        }

        // Plan
        Command::CreatePlan {
            mission_id,
            run_id,
            steps_json,
        } => {
            let steps = parse_steps(&steps_json)?;
            runs::create_plan(&client, &mission_id, &run_id, &steps).await?;
            Ok(())
        }
        Command::GetPlan { mission_id, run_id } => {
            runs::get_plan(&client, &mission_id, &run_id).await?;
            Ok(())
        }
        Command::UpdateStep {
            mission_id,
            run_id,
            step_id,
            status,
        } => {
            runs::update_plan_step(&client, &mission_id, &run_id, &step_id, status).await?;
            Ok(())
        }

        // Events
        Command::LogEvent {
            mission_id,
            run_id,
            event_type,
            summary,
            step_id,
            payload_json,
        } => {
            if looks_like_json(&step_id) {
                bail!(
                    "step_id appears to be JSON. You likely forgot the step_id argument.\n\
                     Expected: log-event <mission_id> <run_id> <type> <summary> <step_id> [payload_json]\n\
                     Use \"-\" for step_id if the event doesn't belong to a specific step"
                );
            }
            let mut event = NewEvent::new(event_type, summary);
            event.step_id = Some(step_id).filter(|s| s != "-");
            event.payload = payload_json.as_deref().map(parse_json_arg).transpose()?;
            runs::log_event(&client, &mission_id, &run_id, &event).await?;
            Ok(())
        }
        Command::ListEvents { mission_id, run_id } => {
            runs::list_events(&client, &mission_id, &run_id).await?;
            Ok(())
        }

        // Assistants
        Command::CreateAssistant {
            name,
            instructions,
            greeting,
            options_json,
        } => {
            let options = parse_assistant_options(options_json.as_deref())?;
            let assistant = NewAssistant::new(name, instructions, greeting, options);
            assistants::create_assistant(&client, &assistant).await?;
            Ok(())
        }
        Command::ListAssistants { name, page, size } => {
            let query = ListAssistants {
                page_size: size,
                page,
                name,
            };
            assistants::list_assistants(&client, &query).await?;
            Ok(())
        }
        Command::GetAssistant { assistant_id } => {
            assistants::get_assistant(&client, &assistant_id).await?;
            Ok(())
        }
        Command::UpdateAssistant {
            assistant_id,
            updates_json,
        } => {
            let updates = parse_json_arg(&updates_json)?;
            assistants::update_assistant(&client, &assistant_id, &updates).await?;
            Ok(())
        }
        Command::GetConnectionId {
            assistant_id,
            feature,
        } => {
            assistants::connection_id(&client, &assistant_id, feature).await?;
            Ok(())
        }

        // Phone numbers
        Command::ListPhones => {
            numbers::list_phone_numbers(&client).await?;
            Ok(())
        }
        Command::GetAvailablePhone => {
            numbers::available_phone_number(&client).await?;
            Ok(())
        }
        Command::AssignPhone {
            phone_id,
            connection_id,
            connection_type,
        } => {
            numbers::assign_phone_number(&client, &phone_id, &connection_id, connection_type)
                .await?;
            Ok(())
        }

        // Scheduled events
        Command::ScheduleCall {
            assistant_id,
            to,
            from,
            datetime,
            mission_id,
            run_id,
            step_id,
        } => {
            let event = NewScheduledEvent::call(to, from, datetime, mission_id, run_id, step_id);
            scheduled::schedule_event(&client, &assistant_id, &event).await?;
            Ok(())
        }
        Command::ScheduleSms {
            assistant_id,
            to,
            from,
            datetime,
            text,
            mission_id,
            run_id,
            step_id,
        } => {
            let event =
                NewScheduledEvent::sms(to, from, datetime, text).linked(mission_id, run_id, step_id);
            scheduled::schedule_event(&client, &assistant_id, &event).await?;
            Ok(())
        }
        Command::GetEvent {
            assistant_id,
            event_id,
        } => {
            scheduled::get_scheduled_event(&client, &assistant_id, &event_id).await?;
            Ok(())
        }
        Command::CancelScheduledEvent {
            assistant_id,
            event_id,
        } => scheduled::delete_scheduled_event(&client, &assistant_id, &event_id).await,
        Command::ListEventsAssistant { assistant_id } => {
            scheduled::list_scheduled_events(&client, &assistant_id).await?;
            Ok(())
        }

        Command::GetInsights { conversation_id } => {
            insights::conversation_insights(&client, &conversation_id).await?;
            Ok(())
        }

        // Linked agents
        Command::LinkAgent {
            mission_id,
            run_id,
            agent_id,
        } => {
            runs::link_agent(&client, &mission_id, &run_id, &agent_id).await?;
            Ok(())
        }
        Command::ListLinkedAgents { mission_id, run_id } => {
            runs::list_linked_agents(&client, &mission_id, &run_id).await?;
            Ok(())
        }
        Command::UnlinkAgent {
            mission_id,
            run_id,
            agent_id,
        } => runs::unlink_agent(&client, &mission_id, &run_id, &agent_id).await,

        // Local state
        Command::ListState => {
            for (slug, entry) in store.list()? {
                println!(
                    "{}: {} [{}]",
                    slug,
                    entry
                        .get("mission_name")
                        .and_then(Value::as_str)
                        .unwrap_or("unnamed"),
                    entry
                        .get("status")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown")
                );
            }
            Ok(())
        }
        Command::GetState { slug } => print_json(&Value::Object(store.mission(&slug)?)),
        Command::RemoveState { slug } => {
            store.remove_mission(&slug)?;
            println!("Removed {} from state", slug);
            Ok(())
        }

        // Memory
        Command::SaveMemory { slug, key, value } => {
            store.save_memory(&slug, &key, parse_memory_value(&value)?)?;
            println!("Saved memory '{}' for mission '{}'", key, slug);
            Ok(())
        }
        Command::GetMemory { slug, key } => {
            let key = key.filter(|k| !k.is_empty());
            match store.memory(&slug, key.as_deref())? {
                Some(v @ (Value::Object(_) | Value::Array(_))) => print_json(&v)?,
                Some(Value::String(s)) => println!("{}", s),
                Some(Value::Null) | None => {
                    println!("{}", if key.is_some() { "No memory found" } else { "{}" })
                }
                Some(other) => println!("{}", other),
            }
            Ok(())
        }
        Command::AppendMemory { slug, key, item } => {
            let len = store.append_memory(&slug, &key, parse_memory_value(&item)?)?;
            println!(
                "Appended to memory '{}' for mission '{}' (now {} items)",
                key, slug, len
            );
            Ok(())
        }

        // Workflows
        Command::Init {
            name,
            instructions,
            request,
            steps_json,
        } => {
            let steps = steps_json.as_deref().map(parse_steps).transpose()?;
            let handle = workflow::init_mission(
                &client,
                &store,
                &name,
                &instructions,
                &request,
                steps.as_deref(),
            )
            .await?;
            info!(
                slug = %handle.slug,
                mission_id = %handle.mission_id,
                run_id = %handle.run_id,
                resumed = handle.resumed,
                "mission ready"
            );
            Ok(())
        }
        Command::SetupAgent {
            slug,
            name,
            instructions,
            greeting,
            options_json,
        } => {
            let options: AgentSetupOptions = match options_json.as_deref() {
                Some(raw) => serde_json::from_value(parse_json_arg(raw)?)
                    .context("Invalid setup-agent options")?,
                None => AgentSetupOptions::default(),
            };
            let agent = workflow::setup_voice_agent(
                &client,
                &store,
                &slug,
                &name,
                &instructions,
                &greeting,
                options,
            )
            .await?;
            info!(
                %slug,
                assistant_id = %agent.assistant_id,
                phone = agent.phone_number.as_deref().unwrap_or("none"),
                resumed = agent.resumed,
                "voice agent ready"
            );
            Ok(())
        }
        Command::Complete {
            slug,
            mission_id,
            run_id,
            summary,
            payload_json,
        } => {
            let payload = payload_json.as_deref().map(parse_json_arg).transpose()?;
            workflow::complete_mission(
                &client,
                &store,
                &slug,
                &mission_id,
                &run_id,
                &summary,
                payload,
            )
            .await
        }
    }
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let head: String = chars.iter().take(8).collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("{}...{}", head, tail)
}

fn looks_like_json(s: &str) -> bool {
    s.starts_with('{') || s.starts_with('[')
}

fn parse_json_arg(s: &str) -> Result<Value> {
    if let Some(path) = s.strip_prefix('@') {
        let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path))?;
        let v =
            serde_json::from_slice(&bytes).with_context(|| format!("Invalid JSON in {}", path))?;
        return Ok(v);
    }
    let v = serde_json::from_str(s).context("Invalid JSON")?;
    Ok(v)
}

fn parse_steps(s: &str) -> Result<Vec<Value>> {
    match parse_json_arg(s)? {
        Value::Array(steps) => Ok(steps),
        _ => bail!("Plan steps must be a JSON array"),
    }
}

/// Memory values are JSON only when they look like an object or array;
/// anything else is kept as a plain string.
fn parse_memory_value(s: &str) -> Result<Value> {
    if looks_like_json(s) {
        return serde_json::from_str(s).context("Invalid JSON");
    }
    Ok(Value::String(s.to_string()))
}

fn parse_assistant_options(raw: Option<&str>) -> Result<AssistantOptions> {
    let Some(raw) = raw else {
        return Ok(AssistantOptions::default());
    };
    match parse_json_arg(raw)? {
        opts @ Value::Object(_) => {
            serde_json::from_value(opts).context("Invalid create-assistant options")
        }
        Value::Array(features) => Ok(AssistantOptions {
            features: Some(
                features
                    .iter()
                    .filter_map(|f| f.as_str().map(str::to_string))
                    .collect(),
            ),
            ..Default::default()
        }),
        _ => Ok(AssistantOptions::default()),
    }
}
