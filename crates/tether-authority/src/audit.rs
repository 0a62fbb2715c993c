//! Audit log - JSON export of committed authority events

use serde::{Deserialize, Serialize};
use tether_core::{Address, EventRecord, TetherError, TetherResult};

/// One event record tagged with the instance that emitted it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub instance: Address,
    #[serde(flatten)]
    pub record: EventRecord,
}

/// Append-only collection of events across instances
#[derive(Clone, Debug, Default)]
pub struct AuditLog {
    entries: Vec<AuditEntry>,
}

impl AuditLog {
    pub fn new() -> Self {
        AuditLog::default()
    }

    pub fn extend(&mut self, instance: Address, records: impl IntoIterator<Item = EventRecord>) {
        self.entries
            .extend(records.into_iter().map(|record| AuditEntry { instance, record }));
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    /// Entries emitted by one instance
    pub fn for_instance(&self, instance: Address) -> impl Iterator<Item = &AuditEntry> {
        self.entries.iter().filter(move |e| e.instance == instance)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One JSON object per line
    pub fn to_json_lines(&self) -> TetherResult<String> {
        let mut out = String::new();
        for entry in &self.entries {
            let line = serde_json::to_string(entry)
                .map_err(|e| TetherError::Serialization(e.to_string()))?;
            out.push_str(&line);
            out.push('\n');
        }
        Ok(out)
    }

    pub fn from_json_lines(input: &str) -> TetherResult<Self> {
        let entries = input
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(|e| TetherError::Serialization(e.to_string())))
            .collect::<TetherResult<Vec<AuditEntry>>>()?;
        Ok(AuditLog { entries })
    }
}
