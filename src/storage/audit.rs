//! Audit log entries and the sink they are submitted to.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::command::Actor;
use crate::error::StorageError;
use crate::types::SubjectKind;

/// Type tag for entries about a track.
pub const TRACK_TYPE: char = 'T';

/// One audited mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub actor: Actor,
    /// `G`, `U` or `T`.
    pub entry_type: char,
    pub acted_name: String,
    pub action: String,
}

impl LogEntry {
    pub fn build() -> LogEntryBuilder {
        LogEntryBuilder::default()
    }
}

#[derive(Debug, Default)]
pub struct LogEntryBuilder {
    actor: Option<Actor>,
    entry_type: Option<char>,
    acted_name: String,
    action: String,
}

impl LogEntryBuilder {
    pub fn actor(mut self, actor: &Actor) -> Self {
        self.actor = Some(actor.clone());
        self
    }

    pub fn kind(mut self, kind: SubjectKind) -> Self {
        self.entry_type = Some(kind.type_tag());
        self
    }

    pub fn entry_type(mut self, tag: char) -> Self {
        self.entry_type = Some(tag);
        self
    }

    pub fn acted_name(mut self, name: &str) -> Self {
        self.acted_name = name.to_owned();
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    /// Stamps the entry with the current time. Missing actor defaults to the
    /// console, missing type to `G`.
    pub fn build(self) -> LogEntry {
        LogEntry {
            timestamp: Utc::now(),
            actor: self.actor.unwrap_or_else(Actor::console),
            entry_type: self.entry_type.unwrap_or_else(|| SubjectKind::Group.type_tag()),
            acted_name: self.acted_name,
            action: self.action,
        }
    }
}

/// Destination of audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn submit(&self, entry: LogEntry) -> Result<(), StorageError>;
}

pub type SharedAuditSink = Arc<dyn AuditSink>;

/// Writes every entry to the `tracing` pipeline as JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn submit(&self, entry: LogEntry) -> Result<(), StorageError> {
        let json = serde_json::to_string(&entry).map_err(|e| StorageError::Backend(e.to_string()))?;
        info!(target: "warden_core::audit", entry = %json, "audit");
        Ok(())
    }
}
