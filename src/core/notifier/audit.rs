use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Who triggered a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Actor {
    /// A guild member (command author or message sender).
    Member(u64),
    /// The bot itself reacting to a platform signal (track end, empty channel).
    System,
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Member(id) => write!(f, "<@{}>", id),
            Actor::System => f.write_str("system"),
        }
    }
}

/// Every state-mutating call maps to exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    XpAwarded,
    LevelUp,
    RoleGranted,
    RoleGrantFailed,
    SetCooldown,
    SetLevel,
    SetRoleForLevel,
    ResetMember,
    VoiceConnected,
    VoiceMoved,
    TrackStarted,
    TrackQueued,
    TrackSkipped,
    VoiceDisconnected,
    Ban,
    Unban,
    Timeout,
    LockChannel,
    UnlockChannel,
}

/// One structured line of the audit log.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub actor: Actor,
    pub action: AuditAction,
    pub target: String,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        actor: Actor,
        action: AuditAction,
        target: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            actor,
            action,
            target: target.into(),
            detail: detail.into(),
            timestamp: Utc::now(),
        }
    }

    /// Same as `new` but with an explicit timestamp (activity handlers pass
    /// the message time so the log lines up with the cooldown clock).
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Destination for audit entries.
///
/// Recording is fire-and-forget: a sink that cannot write must not fail the
/// operation that produced the entry.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry);
}

#[cfg(test)]
pub use memory::MemoryAuditSink;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_displays_as_mention() {
        assert_eq!(Actor::Member(42).to_string(), "<@42>");
        assert_eq!(Actor::System.to_string(), "system");
    }

    #[test]
    fn entry_serializes_with_snake_case_action() {
        let entry = AuditEntry::new(Actor::Member(7), AuditAction::SetCooldown, "guild 1", "30s");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["action"], "set_cooldown");
        assert_eq!(json["actor"]["type"], "member");
        assert_eq!(json["actor"]["id"], 7);
        assert_eq!(json["target"], "guild 1");
    }

    #[test]
    fn memory_sink_keeps_order() {
        let sink = MemoryAuditSink::new();
        sink.record(AuditEntry::new(Actor::System, AuditAction::TrackStarted, "g", ""));
        sink.record(AuditEntry::new(Actor::System, AuditAction::VoiceDisconnected, "g", ""));
        assert_eq!(
            sink.actions(),
            vec![AuditAction::TrackStarted, AuditAction::VoiceDisconnected]
        );
    }
}
