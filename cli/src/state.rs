//! Local mission state: one JSON document keyed by mission slug.
//!
//! Every operation is a whole-document read-modify-write. There is no file
//! lock; two concurrent invocations race and the later `save` wins in full.

use anyhow::{bail, Context, Result};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

pub type StateDocument = Map<String, Value>;
pub type MissionEntry = Map<String, Value>;

const MEMORY_KEY: &str = "memory";
const LAST_UPDATED_KEY: &str = "last_updated";

/// Where the state document lives.
pub trait StateBackend {
    fn load(&self) -> Result<StateDocument>;
    fn save(&self, doc: &StateDocument) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StateBackend for FileBackend {
    fn load(&self) -> Result<StateDocument> {
        if !self.path.exists() {
            return Ok(StateDocument::new());
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read state file {}", self.path.display()))?;
        let value: Value = serde_json::from_str(&raw)
            .with_context(|| format!("Malformed state file {}", self.path.display()))?;
        match value {
            Value::Object(doc) => Ok(doc),
            _ => bail!(
                "Malformed state file {}: root must be a JSON object",
                self.path.display()
            ),
        }
    }

    fn save(&self, doc: &StateDocument) -> Result<()> {
        let payload = serde_json::to_string_pretty(doc)?;
        fs::write(&self.path, payload)
            .with_context(|| format!("Failed to write state file {}", self.path.display()))?;
        debug!(path = %self.path.display(), missions = doc.len(), "state saved");
        Ok(())
    }
}

/// A memory slot as seen by `append_memory`: either already a list or a
/// single value that gets promoted to a one-element list on first append.
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryValue {
    List(Vec<Value>),
    Scalar(Value),
}

impl From<Value> for MemoryValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Array(items) => Self::List(items),
            other => Self::Scalar(other),
        }
    }
}

impl From<MemoryValue> for Value {
    fn from(v: MemoryValue) -> Self {
        match v {
            MemoryValue::List(items) => Value::Array(items),
            MemoryValue::Scalar(v) => v,
        }
    }
}

impl MemoryValue {
    /// Appends `item`, promoting a scalar `v` to `[v]` first. Returns the
    /// resulting list.
    pub fn push(self, item: Value) -> Vec<Value> {
        let mut items = match self {
            Self::List(items) => items,
            Self::Scalar(v) => vec![v],
        };
        items.push(item);
        items
    }
}

pub struct StateStore<B> {
    backend: B,
}

impl<B: StateBackend> StateStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn load(&self) -> Result<StateDocument> {
        self.backend.load()
    }

    pub fn save(&self, doc: &StateDocument) -> Result<()> {
        self.backend.save(doc)
    }

    /// Every slug with its raw entry, in document order.
    pub fn list(&self) -> Result<Vec<(String, Value)>> {
        Ok(self.load()?.into_iter().collect())
    }

    pub fn mission(&self, slug: &str) -> Result<MissionEntry> {
        let doc = self.load()?;
        match doc.get(slug) {
            None => Ok(MissionEntry::new()),
            Some(Value::Object(entry)) => Ok(entry.clone()),
            Some(_) => bail!("State entry for '{}' is not a JSON object", slug),
        }
    }

    /// Shallow-merges `updates` into the slug's entry, creating it if needed.
    pub fn update_mission(&self, slug: &str, updates: MissionEntry) -> Result<()> {
        let mut doc = self.load()?;
        let entry = entry_mut(&mut doc, slug)?;
        for (k, v) in updates {
            entry.insert(k, v);
        }
        self.save(&doc)?;
        info!(slug, "mission state updated");
        Ok(())
    }

    /// Returns whether an entry existed. Nothing is written when it did not.
    pub fn remove_mission(&self, slug: &str) -> Result<bool> {
        let mut doc = self.load()?;
        if !doc.contains_key(slug) {
            return Ok(false);
        }
        doc.retain(|k, _| k != slug);
        self.save(&doc)?;
        info!(slug, "mission state removed");
        Ok(true)
    }

    pub fn save_memory(&self, slug: &str, key: &str, value: Value) -> Result<()> {
        let mut doc = self.load()?;
        let entry = entry_mut(&mut doc, slug)?;
        memory_mut(entry, slug)?.insert(key.to_string(), value);
        entry.insert(LAST_UPDATED_KEY.to_string(), Value::String(utc_timestamp()));
        self.save(&doc)
    }

    /// Appends to the list at `memory[key]` and returns its new length. A
    /// missing key starts an empty list; a non-list value is wrapped into a
    /// one-element list before the append.
    pub fn append_memory(&self, slug: &str, key: &str, item: Value) -> Result<usize> {
        let mut doc = self.load()?;
        let entry = entry_mut(&mut doc, slug)?;
        let slot = memory_mut(entry, slug)?
            .entry(key.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        let items = MemoryValue::from(slot.take()).push(item);
        let len = items.len();
        *slot = Value::Array(items);
        entry.insert(LAST_UPDATED_KEY.to_string(), Value::String(utc_timestamp()));
        self.save(&doc)?;
        Ok(len)
    }

    /// `memory[key]` when a key is given, otherwise the whole memory object
    /// (empty when the mission has none).
    pub fn memory(&self, slug: &str, key: Option<&str>) -> Result<Option<Value>> {
        let entry = self.mission(slug)?;
        let memory = entry
            .get(MEMORY_KEY)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        match key {
            Some(k) => Ok(memory.get(k).cloned()),
            None => Ok(Some(memory)),
        }
    }
}

fn entry_mut<'a>(doc: &'a mut StateDocument, slug: &str) -> Result<&'a mut MissionEntry> {
    let entry = doc
        .entry(slug.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    match entry {
        Value::Object(map) => Ok(map),
        _ => bail!("State entry for '{}' is not a JSON object", slug),
    }
}

fn memory_mut<'a>(entry: &'a mut MissionEntry, slug: &str) -> Result<&'a mut Map<String, Value>> {
    let memory = entry
        .entry(MEMORY_KEY.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    match memory {
        Value::Object(map) => Ok(map),
        _ => bail!("Memory for '{}' is not a JSON object", slug),
    }
}

/// Lower-cases, collapses every run of characters outside `[a-z0-9]` into a
/// single hyphen and trims hyphens from both ends.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.to_lowercase().chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            slug.push(ch);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

/// Current UTC time, RFC3339 with a `Z` suffix.
pub fn utc_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}


#[cfg(test)]
mod tests {
    use super::testing::MemoryBackend;
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn fields(v: Value) -> MissionEntry {
        match v {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn slugify_examples() {
        assert_eq!(slugify("Find Contractors!"), "find-contractors");
        assert_eq!(slugify("  --Window   Washers__2024--"), "window-washers-2024");
        assert_eq!(slugify("Café run"), "caf-run");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn slugify_is_idempotent() {
        for name in ["Find Contractors!", "a--b", "Plumber #3 (urgent)", "x"] {
            let once = slugify(name);
            assert_eq!(slugify(&once), once);
        }
    }

    #[test]
    fn timestamp_uses_z_suffix() {
        let ts = utc_timestamp();
        assert!(ts.ends_with('Z'), "{}", ts);
        assert!(!ts.contains("+00:00"));
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }

    #[test]
    fn missing_slug_reads_as_empty_entry() {
        let store = StateStore::new(MemoryBackend::default());
        assert!(store.mission("nope").expect("mission").is_empty());
    }

    #[test]
    fn update_is_a_partial_merge() {
        let store = StateStore::new(MemoryBackend::default());
        store
            .update_mission("m", fields(json!({"b": 1})))
            .expect("update");
        store
            .update_mission("m", fields(json!({"a": "x"})))
            .expect("update");
        let entry = store.mission("m").expect("mission");
        assert_eq!(entry.get("a"), Some(&json!("x")));
        assert_eq!(entry.get("b"), Some(&json!(1)));
    }

    #[test]
    fn remove_missing_slug_is_a_noop() {
        let backend = MemoryBackend::with(json!({"keep": {"mission_id": "m1"}}));
        let store = StateStore::new(&backend);
        assert!(!store.remove_mission("absent").expect("remove"));
        assert_eq!(backend.saves(), 0);
        assert_eq!(backend.snapshot(), json!({"keep": {"mission_id": "m1"}}));
    }

    #[test]
    fn remove_drops_the_whole_entry() {
        let backend = MemoryBackend::with(json!({
            "a": {"mission_id": "1"},
            "b": {"mission_id": "2"},
            "c": {"mission_id": "3"}
        }));
        let store = StateStore::new(&backend);
        assert!(store.remove_mission("b").expect("remove"));
        let slugs: Vec<String> = store
            .list()
            .expect("list")
            .into_iter()
            .map(|(slug, _)| slug)
            .collect();
        assert_eq!(slugs, vec!["a", "c"]);
    }

    #[test]
    fn append_to_absent_key_creates_list() {
        let store = StateStore::new(MemoryBackend::default());
        assert_eq!(store.append_memory("m", "calls", json!("c1")).expect("append"), 1);
        assert_eq!(
            store.memory("m", Some("calls")).expect("memory"),
            Some(json!(["c1"]))
        );
        assert_eq!(store.append_memory("m", "calls", json!({"n": 2})).expect("append"), 2);
        assert_eq!(
            store.memory("m", Some("calls")).expect("memory"),
            Some(json!(["c1", {"n": 2}]))
        );
    }

    #[test]
    fn append_to_scalar_promotes_to_list() {
        let store = StateStore::new(MemoryBackend::default());
        store
            .save_memory("m", "contact", json!("alice"))
            .expect("save");
        assert_eq!(store.append_memory("m", "contact", json!("bob")).expect("append"), 2);
        assert_eq!(
            store.memory("m", Some("contact")).expect("memory"),
            Some(json!(["alice", "bob"]))
        );
    }

    #[test]
    fn memory_value_promotion_rule() {
        assert_eq!(
            MemoryValue::from(json!(7)).push(json!(8)),
            vec![json!(7), json!(8)]
        );
        assert_eq!(
            MemoryValue::from(json!([1])).push(json!(2)),
            vec![json!(1), json!(2)]
        );
        assert_eq!(Value::from(MemoryValue::Scalar(json!("s"))), json!("s"));
    }

    #[test]
    fn save_memory_stamps_last_updated_and_keeps_fields() {
        let store = StateStore::new(MemoryBackend::with(json!({"m": {"run_id": "r1"}})));
        store
            .save_memory("m", "quotes", json!({"acme": 120}))
            .expect("save");
        let entry = store.mission("m").expect("mission");
        assert_eq!(entry.get("run_id"), Some(&json!("r1")));
        assert_eq!(entry["memory"]["quotes"]["acme"], json!(120));
        assert!(entry["last_updated"].as_str().expect("ts").ends_with('Z'));
    }

    #[test]
    fn whole_memory_defaults_to_empty_object() {
        let store = StateStore::new(MemoryBackend::default());
        assert_eq!(store.memory("m", None).expect("memory"), Some(json!({})));
        assert_eq!(store.memory("m", Some("k")).expect("memory"), None);
    }

    #[test]
    fn non_object_entry_is_rejected() {
        let store = StateStore::new(MemoryBackend::with(json!({"m": [1, 2]})));
        assert!(store.mission("m").is_err());
        assert!(store.update_mission("m", MissionEntry::new()).is_err());
    }

    #[test]
    fn file_round_trip_is_stable() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join(".missions_state.json");
        let store = StateStore::new(FileBackend::new(&path));
        assert!(store.load().expect("load").is_empty());

        store
            .update_mission(
                "find-contractors",
                fields(json!({"mission_name": "Find Contractors", "mission_id": "m1"})),
            )
            .expect("update");
        store
            .append_memory("find-contractors", "quotes", json!(1))
            .expect("append");

        let first = fs::read_to_string(&path).expect("read");
        let doc = store.load().expect("load");
        store.save(&doc).expect("save");
        let second = fs::read_to_string(&path).expect("read");
        assert_eq!(first, second);
        assert!(first.contains("\n  \"find-contractors\": {"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("state.json");
        fs::write(&path, "{oops").expect("write");
        let err = StateStore::new(FileBackend::new(&path))
            .load()
            .expect_err("should fail");
        assert!(format!("{:#}", err).contains("Malformed state file"));

        fs::write(&path, "[]").expect("write");
        let err = StateStore::new(FileBackend::new(&path))
            .load()
            .expect_err("should fail");
        assert!(err.to_string().contains("root must be a JSON object"));
    }
}
