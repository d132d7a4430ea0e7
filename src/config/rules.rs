//! Declarative mirroring rules.
//!
//! The rule file references folders and lists by their web URLs:
//!
//! ```text
//! https://app.clickup.com/{team}/v/f/{folder}/{list}
//! https://app.clickup.com/{team}/v/li/{list}
//! ```
//!
//! [`SyncPreferences`] is the file as written. [`SyncRules`] is the compiled
//! form the engine evaluates: ids parsed once, team scope computed once. A
//! URL that cannot be read is dropped with a warning, which leaves its
//! constraint open.

use crate::error::UrlRefError;
use crate::logging::Logger;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use url::Url;

/// Rule file root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncPreferences {
    pub mirror_task_rules: Vec<MirrorTaskSpecification>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorTaskSpecification {
    pub name: String,
    /// Which tasks get a mirror created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cond_add: Option<RuleCondition>,
    /// Which source tasks have their changes propagated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cond_track_changes: Option<RuleCondition>,
    /// Where and how mirrors are created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec_add: Option<AddSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleCondition {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub if_in_folders: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub if_in_lists: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub eq_any_task_status_names: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub if_assigned_to_member_email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddSpec {
    pub add_to_list: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub set_status_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub assign_to_member_email: String,
}

impl SyncPreferences {
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("failed to decode mirroring rules")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read rules file {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("in rules file {}", path.display()))
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Template shown by `example-rules`.
    pub fn example() -> Self {
        let list_url = "https://app.clickup.com/<TeamID>/v/li/<ListID>".to_string();
        Self {
            mirror_task_rules: vec![MirrorTaskSpecification {
                name: "<NameRule>".to_string(),
                cond_add: Some(RuleCondition {
                    if_in_lists: vec![list_url.clone()],
                    ..Default::default()
                }),
                cond_track_changes: Some(RuleCondition {
                    if_in_lists: vec![list_url.clone()],
                    ..Default::default()
                }),
                spec_add: Some(AddSpec {
                    add_to_list: list_url,
                    ..Default::default()
                }),
            }],
        }
    }

    pub fn compile(&self, log: &Logger) -> SyncRules {
        let log = log.named("rules");
        SyncRules {
            rules: self
                .mirror_task_rules
                .iter()
                .map(|spec| MirrorRule::compile(spec, &log))
                .collect(),
        }
    }
}

fn path_segments(raw: &str) -> Result<Vec<String>, UrlRefError> {
    let url = Url::parse(raw).map_err(|err| UrlRefError::Malformed {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;
    Ok(url.path().split('/').map(str::to_string).collect())
}

fn numeric(raw: &str, segment: &'static str, value: &str) -> Result<String, UrlRefError> {
    if value.is_empty() {
        return Err(UrlRefError::MissingSegment {
            url: raw.to_string(),
            segment,
        });
    }
    value
        .parse::<i64>()
        .map(|_| value.to_string())
        .map_err(|_| UrlRefError::NotNumeric {
            url: raw.to_string(),
            segment,
            value: value.to_string(),
        })
}

/// Resource id at `/{team}/v/{kind}/{id}`.
fn view_id(raw: &str, kind: &str, expected: &'static str) -> Result<String, UrlRefError> {
    let segments = path_segments(raw)?;
    if segments.len() < 5 {
        return Err(UrlRefError::MissingSegment {
            url: raw.to_string(),
            segment: expected,
        });
    }
    if segments[2] != "v" || segments[3] != kind {
        return Err(UrlRefError::WrongKind {
            url: raw.to_string(),
            expected,
        });
    }
    numeric(raw, expected, &segments[4])
}

/// Team id: first path segment.
pub fn team_id_from_url(raw: &str) -> Result<String, UrlRefError> {
    let segments = path_segments(raw)?;
    let team = segments.get(1).map(String::as_str).unwrap_or_default();
    numeric(raw, "team", team)
}

pub fn folder_id_from_url(raw: &str) -> Result<String, UrlRefError> {
    view_id(raw, "f", "folder")
}

pub fn list_id_from_url(raw: &str) -> Result<String, UrlRefError> {
    view_id(raw, "li", "list")
}

/// Compiled [`RuleCondition`]. Empty sets are open.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Condition {
    pub folder_ids: Vec<String>,
    pub list_ids: Vec<String>,
    pub status_names: Vec<String>,
    pub assignee_email: Option<String>,
}

/// Compiled [`AddSpec`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddTarget {
    /// `None` when the URL could not be read; such a rule never creates.
    pub list_id: Option<String>,
    pub status_name: Option<String>,
    pub assignee_email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MirrorRule {
    pub name: String,
    /// Teams referenced by any URL of the rule.
    pub team_ids: Vec<String>,
    pub add: Option<Condition>,
    pub track_changes: Option<Condition>,
    pub target: Option<AddTarget>,
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn push_unique(ids: &mut Vec<String>, id: String) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}

struct RuleCompiler<'a> {
    rule: &'a str,
    log: &'a Logger,
    team_ids: Vec<String>,
}

impl RuleCompiler<'_> {
    fn warn(&self, field: &str, err: &UrlRefError) {
        self.log.warning_with(
            "Ignoring unreadable url in mirroring rule",
            json!({"rule": self.rule, "field": field, "error": err.to_string()}),
        );
    }

    fn note_team(&mut self, raw: &str) {
        if let Ok(team) = team_id_from_url(raw) {
            push_unique(&mut self.team_ids, team);
        }
    }

    fn ids(
        &mut self,
        field: &str,
        urls: &[String],
        parse: fn(&str) -> Result<String, UrlRefError>,
    ) -> Vec<String> {
        let mut ids = Vec::new();
        for raw in urls {
            self.note_team(raw);
            match parse(raw) {
                Ok(id) => push_unique(&mut ids, id),
                Err(err) => self.warn(field, &err),
            }
        }
        ids
    }

    fn condition(&mut self, field: &str, cond: &RuleCondition) -> Condition {
        Condition {
            folder_ids: self.ids(
                &format!("{field}.if_in_folders"),
                &cond.if_in_folders,
                folder_id_from_url,
            ),
            list_ids: self.ids(
                &format!("{field}.if_in_lists"),
                &cond.if_in_lists,
                list_id_from_url,
            ),
            status_names: cond
                .eq_any_task_status_names
                .iter()
                .filter_map(|s| non_empty(s))
                .collect(),
            assignee_email: non_empty(&cond.if_assigned_to_member_email)
                .map(|e| e.to_lowercase()),
        }
    }

    fn target(&mut self, spec: &AddSpec) -> AddTarget {
        self.note_team(&spec.add_to_list);
        let list_id = match list_id_from_url(&spec.add_to_list) {
            Ok(id) => Some(id),
            Err(err) => {
                self.warn("spec_add.add_to_list", &err);
                None
            }
        };
        AddTarget {
            list_id,
            status_name: non_empty(&spec.set_status_name),
            assignee_email: non_empty(&spec.assign_to_member_email).map(|e| e.to_lowercase()),
        }
    }
}

impl MirrorRule {
    pub fn compile(spec: &MirrorTaskSpecification, log: &Logger) -> Self {
        let mut compiler = RuleCompiler {
            rule: &spec.name,
            log,
            team_ids: Vec::new(),
        };
        let add = spec.cond_add.as_ref().map(|c| compiler.condition("cond_add", c));
        let track_changes = spec
            .cond_track_changes
            .as_ref()
            .map(|c| compiler.condition("cond_track_changes", c));
        let target = spec.spec_add.as_ref().map(|s| compiler.target(s));

        Self {
            name: spec.name.clone(),
            team_ids: compiler.team_ids,
            add,
            track_changes,
            target,
        }
    }

    pub fn applies_to_team(&self, team_id: &str) -> bool {
        self.team_ids.iter().any(|t| t == team_id)
    }

    pub fn target_list_id(&self) -> Option<&str> {
        self.target.as_ref().and_then(|t| t.list_id.as_deref())
    }

    /// Member notified on unlink comments.
    pub fn unlink_assignee(&self) -> Option<&str> {
        self.add.as_ref().and_then(|c| c.assignee_email.as_deref())
    }

    /// Member notified on divergence comments.
    pub fn diff_assignee(&self) -> Option<&str> {
        self.target.as_ref().and_then(|t| t.assignee_email.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncRules {
    pub rules: Vec<MirrorRule>,
}

impl SyncRules {
    /// Every team any rule refers to, in first-seen order.
    pub fn all_team_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        for rule in &self.rules {
            for team in &rule.team_ids {
                push_unique(&mut ids, team.clone());
            }
        }
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOLDER_URL: &str = "https://app.clickup.com/2431928/v/f/96471870/42552884";
    const LIST_URL: &str = "https://app.clickup.com/2431928/v/li/174318787";

    #[test]
    fn test_team_id_from_url() {
        assert_eq!(team_id_from_url(FOLDER_URL).unwrap(), "2431928");
        assert_eq!(
            team_id_from_url("https://app.clickup.com/2431928/v/li/174386179").unwrap(),
            "2431928"
        );
        assert_eq!(team_id_from_url("https://app.clickup.com/2431928").unwrap(), "2431928");
        assert!(matches!(
            team_id_from_url("https://app.clickup.com/"),
            Err(UrlRefError::MissingSegment { segment: "team", .. })
        ));
        assert!(team_id_from_url("https://app.clickup.com").is_err());
        assert!(matches!(
            team_id_from_url("https://app.clickup.com/acme/v/li/1"),
            Err(UrlRefError::NotNumeric { .. })
        ));
    }

    #[test]
    fn test_list_id_from_url() {
        assert_eq!(list_id_from_url(LIST_URL).unwrap(), "174318787");
        assert!(matches!(
            list_id_from_url(FOLDER_URL),
            Err(UrlRefError::WrongKind { expected: "list", .. })
        ));
    }

    #[test]
    fn test_folder_id_from_url() {
        assert_eq!(folder_id_from_url(FOLDER_URL).unwrap(), "96471870");
        assert!(matches!(
            folder_id_from_url(LIST_URL),
            Err(UrlRefError::WrongKind { expected: "folder", .. })
        ));
        assert!(matches!(
            folder_id_from_url("not a url"),
            Err(UrlRefError::Malformed { .. })
        ));
        assert!(matches!(
            folder_id_from_url("https://app.clickup.com/2431928/v"),
            Err(UrlRefError::MissingSegment { .. })
        ));
    }

    #[test]
    fn test_compile_degrades_bad_urls() {
        let spec = MirrorTaskSpecification {
            name: "r".into(),
            cond_add: Some(RuleCondition {
                if_in_folders: vec!["https://app.clickup.com/2431928/v/f/not-a-number".into()],
                if_in_lists: vec![LIST_URL.into(), LIST_URL.into()],
                eq_any_task_status_names: vec!["Open".into(), " ".into()],
                if_assigned_to_member_email: "Ann@Example.com".into(),
            }),
            cond_track_changes: None,
            spec_add: Some(AddSpec {
                add_to_list: "https://app.clickup.com/777/v/li/5".into(),
                ..Default::default()
            }),
        };
        let rule = MirrorRule::compile(&spec, &Logger::new());

        let add = rule.add.as_ref().unwrap();
        assert!(add.folder_ids.is_empty());
        assert_eq!(add.list_ids, vec!["174318787"]);
        assert_eq!(add.status_names, vec!["Open"]);
        assert_eq!(add.assignee_email.as_deref(), Some("ann@example.com"));
        assert_eq!(rule.team_ids, vec!["2431928", "777"]);
        assert_eq!(rule.target_list_id(), Some("5"));
        assert_eq!(rule.unlink_assignee(), Some("ann@example.com"));
        assert_eq!(rule.diff_assignee(), None);
    }

    #[test]
    fn test_parse_rule_file() {
        let yaml = r#"
mirror_task_rules:
  - name: team board
    cond_add:
      if_in_lists:
        - https://app.clickup.com/2431928/v/li/174318787
      eq_any_task_status_names: [ready]
    cond_track_changes:
      if_in_folders:
        - https://app.clickup.com/2431928/v/f/96471870/42552884
    spec_add:
      add_to_list: https://app.clickup.com/2431928/v/li/900
      set_status_name: to do
      assign_to_member_email: lead@example.com
"#;
        let prefs = SyncPreferences::from_yaml(yaml).unwrap();
        let rules = prefs.compile(&Logger::new());
        assert_eq!(rules.rules.len(), 1);
        assert_eq!(rules.all_team_ids(), vec!["2431928"]);

        let rule = &rules.rules[0];
        assert_eq!(rule.track_changes.as_ref().unwrap().folder_ids, vec!["96471870"]);
        let target = rule.target.as_ref().unwrap();
        assert_eq!(target.list_id.as_deref(), Some("900"));
        assert_eq!(target.status_name.as_deref(), Some("to do"));
    }

    #[test]
    fn test_example_round_trips_through_yaml() {
        let yaml = SyncPreferences::example().to_yaml().unwrap();
        assert!(yaml.contains("mirror_task_rules"));
        assert_eq!(SyncPreferences::from_yaml(&yaml).unwrap(), SyncPreferences::example());
    }
}
