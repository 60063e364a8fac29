use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The event kinds this system persists. `OrderCreated` is the inbox kind;
/// the other three are the outbox kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventName {
    /// Born from consuming the upstream broker topic.
    OrderCreated,
    /// Born when an `order_created` row transitions to `finished`.
    AccrualStarted,
    /// Born when the poll daemon observes a `PROCESSED` accrual.
    AccrualFinished,
    /// Born when the poll daemon observes an `INVALID` accrual, or any stage fails.
    AccrualFailed,
}

impl EventName {
    /// The three kinds the outbox publisher daemon is responsible for.
    pub const OUTBOX_KINDS: [EventName; 3] = [
        EventName::AccrualFailed,
        EventName::AccrualFinished,
        EventName::AccrualStarted,
    ];

    /// Stable string form, used as the `name` column value.
    pub const fn as_str(self) -> &'static str {
        match self {
            EventName::OrderCreated => "order_created",
            EventName::AccrualStarted => "accrual_started",
            EventName::AccrualFinished => "accrual_finished",
            EventName::AccrualFailed => "accrual_failed",
        }
    }

    /// Parse the `name` column value back into an `EventName`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "order_created" => Some(EventName::OrderCreated),
            "accrual_started" => Some(EventName::AccrualStarted),
            "accrual_finished" => Some(EventName::AccrualFinished),
            "accrual_failed" => Some(EventName::AccrualFailed),
            _ => None,
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The lifecycle states an event row can be in.
///
/// `New -> Processing -> Finished` and `New -> Processing -> Failed` are the
/// only legal transitions; `Finished` and `Failed` are terminal and no
/// daemon rewrites them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventState {
    /// Freshly born, not yet claimed by any worker.
    New,
    /// Claimed by a worker under a row lock; in flight.
    Processing,
    /// Terminal success.
    Finished,
    /// Terminal failure.
    Failed,
}

impl EventState {
    /// Stable string form, used as the `state` column value.
    pub const fn as_str(self) -> &'static str {
        match self {
            EventState::New => "new",
            EventState::Processing => "processing",
            EventState::Finished => "finished",
            EventState::Failed => "failed",
        }
    }

    /// Parse the `state` column value back into an `EventState`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(EventState::New),
            "processing" => Some(EventState::Processing),
            "finished" => Some(EventState::Finished),
            "failed" => Some(EventState::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for EventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured payload carried by every event row.
///
/// Mirrors `message` (jsonb) in the `events` table: `order_uuid`,
/// `order_number`, an optional upstream `state` string, an `amount` in
/// integer minor units, and an optional `error` string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    pub order_uuid: String,
    pub order_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default)]
    pub amount: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Meta {
    /// A `Meta` carrying only order identity, no amount or error yet.
    pub fn for_order(order_uuid: impl Into<String>, order_number: impl Into<String>) -> Self {
        Self {
            order_uuid: order_uuid.into(),
            order_number: order_number.into(),
            state: None,
            amount: 0,
            error: None,
        }
    }

    /// Same identity, carrying an error message (used for `*_failed` rows).
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Same identity, carrying a settled amount in minor units (used for `accrual_finished`).
    #[must_use]
    pub fn with_amount(mut self, amount: i64) -> Self {
        self.amount = amount;
        self
    }
}

/// A persisted row in the `events` table — the sole entity this system stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub uuid: String,
    pub name: EventName,
    pub state: EventState,
    pub meta: Meta,
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Construct a freshly-born row in state `new`.
    pub fn new(uuid: impl Into<String>, name: EventName, meta: Meta, created_at: DateTime<Utc>) -> Self {
        Self {
            uuid: uuid.into(),
            name,
            state: EventState::New,
            meta,
            created_at,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn event_name_round_trips_through_its_string_form() {
        for name in [
            EventName::OrderCreated,
            EventName::AccrualStarted,
            EventName::AccrualFinished,
            EventName::AccrualFailed,
        ] {
            assert_eq!(EventName::parse(name.as_str()), Some(name));
        }
    }

    #[test]
    fn event_state_round_trips_through_its_string_form() {
        for state in [
            EventState::New,
            EventState::Processing,
            EventState::Finished,
            EventState::Failed,
        ] {
            assert_eq!(EventState::parse(state.as_str()), Some(state));
        }
    }

    #[test]
    fn unknown_name_and_state_strings_fail_to_parse() {
        assert_eq!(EventName::parse("send"), None);
        assert_eq!(EventState::parse("send"), None);
    }

    #[test]
    fn meta_json_round_trips_optional_fields() {
        let meta = Meta::for_order("O1", "42").with_amount(1234);
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["amount"], 1234);
        assert!(json.get("error").is_none());

        let decoded: Meta = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, meta);
    }
}
