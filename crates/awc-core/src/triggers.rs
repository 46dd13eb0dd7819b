//! Interpretation of the `on:` block.
//!
//! Besides plain Actions events, `on:` carries options the compiler consumes
//! itself (`command`, `stop-after`, `skip-if-match`, ...). Those are removed
//! from the trigger map and returned as typed values.

use crate::error::{Error, Result};
use crate::frontmatter::kind;
use awc_expr::ConditionNode;
use awc_expr::builder::{and, event_type_equals, function, or, property, string_literal};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use indexmap::IndexMap;
use regex::Regex;
use serde_json::{Map, Value, json};
use std::sync::LazyLock;

/// Events whose payload cannot be influenced by outside contributors.
pub const SAFE_EVENTS: &[&str] = &["schedule", "workflow_dispatch", "workflow_run", "merge_group"];

/// Events a command trigger listens on, with the body each one carries.
pub const COMMAND_EVENTS: &[(&str, &str)] = &[
    ("issues", "github.event.issue.body"),
    ("issue_comment", "github.event.comment.body"),
    ("pull_request", "github.event.pull_request.body"),
    ("pull_request_review_comment", "github.event.comment.body"),
];

/// Reactions accepted by the reactions API.
pub const REACTIONS: &[&str] = &[
    "+1", "-1", "laugh", "confused", "heart", "hooray", "rocket", "eyes",
];

const INTERPRETED_KEYS: &[&str] = &[
    "command",
    "stop-after",
    "skip-if-match",
    "skip-if-no-match",
    "reaction",
    "status-comment",
    "lock-for-agent",
];

#[allow(clippy::expect_used)]
static RELATIVE_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+(?:(\d+)w)?(?:(\d+)d)?(?:(\d+)h)?$").expect("relative time pattern is valid")
});

#[allow(clippy::expect_used)]
static COMMAND_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("command name pattern is valid")
});

/// Actions events in declaration order, with their raw configuration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Triggers {
    events: IndexMap<String, Value>,
}

impl Triggers {
    /// Event names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.events.keys().map(String::as_str)
    }

    /// Whether `event` is declared.
    #[must_use]
    pub fn contains(&self, event: &str) -> bool {
        self.events.contains_key(event)
    }

    /// Whether every declared event is in [`SAFE_EVENTS`].
    #[must_use]
    pub fn all_safe(&self) -> bool {
        !self.events.is_empty() && self.names().all(|name| SAFE_EVENTS.contains(&name))
    }

    /// Raw configuration of every event.
    #[must_use]
    pub fn as_map(&self) -> &IndexMap<String, Value> {
        &self.events
    }

    /// Input names declared under `workflow_dispatch.inputs`.
    #[must_use]
    pub fn dispatch_inputs(&self) -> Vec<String> {
        self.events
            .get("workflow_dispatch")
            .and_then(|dispatch| dispatch.get("inputs"))
            .and_then(Value::as_object)
            .map(|inputs| inputs.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// A `/command` trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTrigger {
    /// Command name without the leading slash
    pub name: String,
    /// Events the command listens on
    pub events: Vec<String>,
}

impl CommandTrigger {
    /// Condition that is true when the triggering text mentions the command.
    ///
    /// # Errors
    ///
    /// Propagates builder errors; `events` is never empty after parsing.
    pub fn condition(&self) -> awc_expr::Result<ConditionNode> {
        let mention = format!("/{}", self.name);
        or(self.events.iter().filter_map(|event| {
            let (_, body) = COMMAND_EVENTS.iter().find(|(name, _)| name == event)?;
            and([
                event_type_equals(event.as_str()),
                function("contains", vec![property(*body), string_literal(mention.as_str())]),
            ])
            .ok()
        }))
    }
}

/// A search query gating activation on the number of matching results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// GitHub search query
    pub query: String,
    /// `max` for skip-if-match, `min` for skip-if-no-match
    pub threshold: u32,
}

/// Everything `on:` declares, interpreted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OnConfig {
    /// Plain Actions events
    pub triggers: Triggers,
    /// `/command` trigger
    pub command: Option<CommandTrigger>,
    /// Absolute deadline after which the workflow stops activating
    pub stop_time: Option<DateTime<Utc>>,
    /// Skip when the query matches at least `threshold` results
    pub skip_if_match: Option<SearchQuery>,
    /// Skip when the query matches fewer than `threshold` results
    pub skip_if_no_match: Option<SearchQuery>,
    /// Reaction added to the triggering item
    pub reaction: Option<String>,
    /// Post and update a status comment
    pub status_comment: bool,
    /// Lock the triggering issue while the agent runs
    pub lock_for_agent: bool,
}

impl OnConfig {
    /// Interpret an `on:` value. Relative `stop-after` values resolve against `now`.
    ///
    /// # Errors
    ///
    /// Returns configuration errors naming the offending `on.*` field, and
    /// [`Error::ConflictingTriggers`] when a command trigger overlaps a
    /// declared event.
    pub fn parse(value: Option<&Value>, now: DateTime<Utc>) -> Result<Self> {
        let mut events = match value {
            None | Some(Value::Null) => {
                return Err(Error::configuration("on", "a workflow needs at least one trigger"));
            }
            Some(Value::String(event)) => IndexMap::from([(event.clone(), Value::Null)]),
            Some(Value::Array(list)) => list
                .iter()
                .map(|event| {
                    event
                        .as_str()
                        .map(|name| (name.to_string(), Value::Null))
                        .ok_or_else(|| Error::configuration("on", format!("expected event names, found {}", kind(event))))
                })
                .collect::<Result<IndexMap<_, _>>>()?,
            Some(Value::Object(map)) => map.clone().into_iter().collect(),
            Some(other) => {
                return Err(Error::configuration(
                    "on",
                    format!("expected an event name, list or mapping, found {}", kind(other)),
                ));
            }
        };

        let mut options = Map::new();
        for key in INTERPRETED_KEYS {
            if let Some(value) = events.shift_remove(*key) {
                options.insert((*key).to_string(), value);
            }
        }

        let command = options.get("command").map(parse_command).transpose()?;
        if let Some(command) = &command {
            expand_command(&mut events, command)?;
        }

        if events.is_empty() {
            return Err(Error::configuration("on", "a workflow needs at least one trigger"));
        }

        let stop_time = options
            .get("stop-after")
            .map(|v| parse_stop_after(v, now))
            .transpose()?;
        let skip_if_match = options
            .get("skip-if-match")
            .map(|v| parse_query("on.skip-if-match", v, "max"))
            .transpose()?;
        let skip_if_no_match = options
            .get("skip-if-no-match")
            .map(|v| parse_query("on.skip-if-no-match", v, "min"))
            .transpose()?;

        let reaction = match options.get("reaction") {
            Some(value) => parse_reaction(value)?,
            None if command.is_some() => Some("eyes".to_string()),
            None => None,
        };
        let status_comment =
            parse_flag("on.status-comment", options.get("status-comment"))?.unwrap_or(command.is_some());
        let lock_for_agent = parse_flag("on.lock-for-agent", options.get("lock-for-agent"))?.unwrap_or(false);

        Ok(Self {
            triggers: Triggers { events },
            command,
            stop_time,
            skip_if_match,
            skip_if_no_match,
            reaction,
            status_comment,
            lock_for_agent,
        })
    }
}

fn parse_command(value: &Value) -> Result<CommandTrigger> {
    let (name, events) = match value {
        Value::String(name) => (name.as_str(), None),
        Value::Object(map) => {
            let name = map
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::configuration("on.command.name", "a command needs a name"))?;
            (name, map.get("events"))
        }
        other => {
            return Err(Error::configuration(
                "on.command",
                format!("expected a name or a mapping, found {}", kind(other)),
            ));
        }
    };

    let name = name.trim_start_matches('/');
    if !COMMAND_NAME.is_match(name) {
        return Err(Error::configuration(
            "on.command.name",
            format!("'{name}' is not a valid command name"),
        ));
    }

    let events = match events {
        None => COMMAND_EVENTS.iter().map(|(e, _)| (*e).to_string()).collect(),
        Some(Value::Array(list)) => {
            let mut events = Vec::new();
            for entry in list {
                let event = entry.as_str().unwrap_or_default();
                if !COMMAND_EVENTS.iter().any(|(e, _)| *e == event) {
                    return Err(Error::configuration(
                        "on.command.events",
                        format!("commands cannot listen on {entry}"),
                    ));
                }
                events.push(event.to_string());
            }
            if events.is_empty() {
                return Err(Error::configuration("on.command.events", "at least one event is required"));
            }
            events
        }
        Some(other) => {
            return Err(Error::configuration(
                "on.command.events",
                format!("expected a list, found {}", kind(other)),
            ));
        }
    };

    Ok(CommandTrigger {
        name: name.to_string(),
        events,
    })
}

fn expand_command(events: &mut IndexMap<String, Value>, command: &CommandTrigger) -> Result<()> {
    if let Some((event, _)) = COMMAND_EVENTS.iter().find(|(e, _)| events.contains_key(*e)) {
        return Err(Error::ConflictingTriggers {
            command: command.name.clone(),
            event: (*event).to_string(),
        });
    }

    for event in &command.events {
        let types = match event.as_str() {
            "issues" | "pull_request" => json!(["opened", "edited", "reopened"]),
            _ => json!(["created", "edited"]),
        };
        events.insert(event.clone(), json!({ "types": types }));
    }
    Ok(())
}

/// Resolve a `stop-after` value to an absolute instant.
///
/// Relative values (`+25h`, `+7d`, `+1w2d`) are added to `now`. Absolute
/// values accept RFC 3339, `YYYY-MM-DD HH:MM[:SS]` and `YYYY-MM-DD`, all in UTC.
///
/// # Errors
///
/// Returns a configuration error for unrecognized formats, minute-granular
/// relative values and zero-length relative values.
pub fn parse_stop_after(value: &Value, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    const FIELD: &str = "on.stop-after";

    let Some(text) = value.as_str().map(str::trim) else {
        return Err(Error::configuration(FIELD, format!("expected a string, found {}", kind(value))));
    };

    if text.starts_with('+') {
        let Some(caps) = RELATIVE_TIME.captures(text) else {
            let hint = if text.ends_with('m') {
                "minute granularity is not supported, use hours (h), days (d) or weeks (w)"
            } else {
                "expected a relative time such as +25h, +7d or +1w"
            };
            return Err(Error::configuration(FIELD, format!("'{text}': {hint}")));
        };

        let amount = |i: usize| -> Result<i64> {
            caps.get(i).map_or(Ok(0), |m| {
                m.as_str()
                    .parse::<i64>()
                    .map_err(|e| Error::configuration(FIELD, format!("'{text}': {e}")))
            })
        };
        let hours = amount(1)?
            .saturating_mul(7 * 24)
            .saturating_add(amount(2)?.saturating_mul(24))
            .saturating_add(amount(3)?);
        if hours == 0 {
            return Err(Error::configuration(FIELD, format!("'{text}' does not move the deadline")));
        }
        let delta = TimeDelta::try_hours(hours)
            .ok_or_else(|| Error::configuration(FIELD, format!("'{text}' is out of range")))?;
        return now
            .checked_add_signed(delta)
            .ok_or_else(|| Error::configuration(FIELD, format!("'{text}' is out of range")));
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Ok(instant.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Some(midnight) = NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(midnight.and_utc());
    }

    Err(Error::configuration(
        FIELD,
        format!("'{text}' is neither an absolute date nor a relative time"),
    ))
}

fn parse_query(field: &str, value: &Value, threshold_key: &str) -> Result<SearchQuery> {
    match value {
        Value::String(query) => Ok(SearchQuery {
            query: query.clone(),
            threshold: 1,
        }),
        Value::Object(map) => {
            let query = map
                .get("query")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::configuration(field, "a 'query' string is required"))?;
            let threshold = match map.get(threshold_key) {
                None => 1,
                Some(v) => v
                    .as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .filter(|&n| n >= 1)
                    .ok_or_else(|| {
                        Error::configuration(field, format!("'{threshold_key}' must be a positive integer"))
                    })?,
            };
            if let Some(key) = map.keys().find(|k| *k != "query" && *k != threshold_key) {
                return Err(Error::configuration(field, format!("unknown key '{key}'")));
            }
            Ok(SearchQuery {
                query: query.to_string(),
                threshold,
            })
        }
        other => Err(Error::configuration(
            field,
            format!("expected a query string or mapping, found {}", kind(other)),
        )),
    }
}

fn parse_reaction(value: &Value) -> Result<Option<String>> {
    // YAML reads +1 and -1 as integers
    let reaction = match value {
        Value::Number(n) if n.as_i64() == Some(1) => "+1".to_string(),
        Value::Number(n) if n.as_i64() == Some(-1) => "-1".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    if reaction == "none" {
        return Ok(None);
    }
    if REACTIONS.contains(&reaction.as_str()) {
        Ok(Some(reaction))
    } else {
        Err(Error::configuration(
            "on.reaction",
            format!("'{reaction}' is not one of {}, none", REACTIONS.join(", ")),
        ))
    }
}

fn parse_flag(field: &str, value: Option<&Value>) -> Result<Option<bool>> {
    match value {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(Error::configuration(
            field,
            format!("expected true or false, found {}", kind(other)),
        )),
    }
}
