//! Tracker state stored in one fenced block.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::clock::Clock;
use crate::entry::{EntryForest, EntryId, TrackerError};

/// How a tracker block is rendered. Unknown values decode as `Default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    Compact,
    Legacy,
    Status,
    Today,
    #[default]
    #[serde(other)]
    Default,
}

/// Decoded content of one tracker block.
///
/// `current_task`, `project` and `client` are defaults for the next entry to
/// be started; they say nothing authoritative about past entries. Keys written
/// by other tools are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tracker {
    #[serde(rename = "dispType", default)]
    pub display_mode: DisplayMode,
    #[serde(rename = "currTask", default, skip_serializing_if = "Option::is_none")]
    pub current_task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    #[serde(default)]
    pub entries: EntryForest,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Tracker {
    /// Records the hints and appends a running root entry.
    ///
    /// Does not check for an already running entry; callers guard with
    /// [`Tracker::is_running`].
    pub fn start_new_entry(
        &mut self,
        name: &str,
        project: Option<&str>,
        client: Option<&str>,
        clock: &dyn Clock,
    ) -> EntryId {
        self.current_task = Some(name.to_string());
        self.project = project.map(str::to_string);
        self.client = client.map(str::to_string);

        let name = if name.is_empty() {
            format!("task {}", self.entries.len() + 1)
        } else {
            name.to_string()
        };
        self.entries.push_root(name, Some(clock.now()), None)
    }

    /// Stops the running leaf at the clock's current time.
    pub fn end_running_entry(&mut self, clock: &dyn Clock) -> Result<EntryId, TrackerError> {
        self.entries.end_running(clock.now())
    }

    pub fn is_running(&self) -> bool {
        self.entries.running_entry().is_some()
    }

    pub fn running_entry(&self) -> Option<EntryId> {
        self.entries.running_entry()
    }

    /// Total tracked seconds, including the live part of a running entry.
    pub fn total_duration(&self, clock: &dyn Clock) -> i64 {
        self.entries.total_duration(clock.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::entry::EntryRecord;

    #[test]
    fn test_start_new_entry_sets_hints_and_default_name() {
        let clock = FixedClock::new(1_000);
        let mut tracker = Tracker::default();

        let first = tracker.start_new_entry("", Some("site"), Some("acme"), &clock);
        tracker.end_running_entry(&clock).unwrap();
        let second = tracker.start_new_entry("deploy", None, None, &clock);

        assert_eq!(tracker.entries.get(first).unwrap().name, "task 1");
        assert_eq!(tracker.entries.get(second).unwrap().name, "deploy");
        assert_eq!(tracker.current_task.as_deref(), Some("deploy"));
        assert_eq!(tracker.project, None);
        assert_eq!(tracker.client, None);
        assert_eq!(tracker.running_entry(), Some(second));
    }

    #[test]
    fn test_end_running_entry_at_clock_time() {
        let clock = FixedClock::new(160);
        let mut tracker = Tracker {
            entries: EntryForest::from(vec![EntryRecord::leaf("A", 100, None)]),
            ..Tracker::default()
        };

        let id = tracker.end_running_entry(&clock).unwrap();

        assert_eq!(tracker.entries.get(id).unwrap().end_time, Some(160));
        assert_eq!(tracker.entries.duration(id, clock.now()), 60);
        assert!(!tracker.is_running());
    }

    #[test]
    fn test_end_running_entry_requires_runner() {
        let clock = FixedClock::new(10);
        let mut tracker = Tracker::default();
        assert_eq!(
            tracker.end_running_entry(&clock),
            Err(TrackerError::NoRunningEntry)
        );
    }

    #[test]
    fn test_total_duration_is_live() {
        let clock = FixedClock::new(100);
        let mut tracker = Tracker::default();
        tracker.start_new_entry("a", None, None, &clock);
        clock.advance(30);
        assert_eq!(tracker.total_duration(&clock), 30);
        clock.advance(30);
        assert_eq!(tracker.total_duration(&clock), 60);
    }

    #[test]
    fn test_decode_plugin_payload() {
        let json = r#"{"dispType":"compact","currTask":"write","project":"book","entries":[{"name":"write","startTime":10,"endTime":null,"subEntries":null}]}"#;
        let tracker: Tracker = serde_json::from_str(json).unwrap();

        assert_eq!(tracker.display_mode, DisplayMode::Compact);
        assert_eq!(tracker.project.as_deref(), Some("book"));
        assert_eq!(tracker.client, None);
        assert!(tracker.is_running());
    }

    #[test]
    fn test_missing_fields_default() {
        let tracker: Tracker = serde_json::from_str("{}").unwrap();
        assert_eq!(tracker, Tracker::default());
        assert!(!tracker.is_running());
    }

    #[test]
    fn test_unknown_display_mode_is_default() {
        let tracker: Tracker = serde_json::from_str(r#"{"dispType":"fancy"}"#).unwrap();
        assert_eq!(tracker.display_mode, DisplayMode::Default);
    }

    #[test]
    fn test_known_display_mode_round_trips() {
        let tracker: Tracker = serde_json::from_str(r#"{"dispType":"today"}"#).unwrap();
        assert_eq!(tracker.display_mode, DisplayMode::Today);
        assert_eq!(
            serde_json::to_string(&tracker).unwrap(),
            r#"{"dispType":"today","entries":[]}"#
        );
    }

    #[test]
    fn test_unknown_keys_are_written_back() {
        let json = r#"{"dispType":"default","color":"red","entries":[]}"#;
        let tracker: Tracker = serde_json::from_str(json).unwrap();
        assert_eq!(tracker.extra["color"], "red");
        assert_eq!(
            serde_json::to_string(&tracker).unwrap(),
            r#"{"dispType":"default","entries":[],"color":"red"}"#
        );
    }

    #[test]
    fn test_encode_omits_absent_hints() {
        let tracker = Tracker {
            display_mode: DisplayMode::Today,
            project: Some("p".to_string()),
            ..Tracker::default()
        };
        let json = serde_json::to_string(&tracker).unwrap();
        assert_eq!(json, r#"{"dispType":"today","project":"p","entries":[]}"#);
    }
}
