//! Study-level configuration: the page list plus arm definitions and the
//! abandonment policy, with the questionnaire derivations that need both.

use time::Duration;

use crate::condition::Condition;
use crate::error::ConfigError;
use crate::page::PageList;

/// Prefix marking a page as a data-collection questionnaire step.
pub const QUESTIONNAIRE_PREFIX: &str = "questionnaire/";

/// How long a participant may go without a request before counting as
/// abandoned, unless overridden in configuration.
pub const DEFAULT_ABANDONED_AFTER: Duration = Duration::minutes(15);

/// One experimental arm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmConfig {
    pub label: String,
    /// Disabled arms keep their ordinal (so existing data stays valid)
    /// but are skipped by assignment.
    pub enabled: bool,
}

/// The full study configuration consumed at startup. Read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudyConfig {
    pub pages: PageList,
    /// Arm definitions; the list index + 1 is the arm ordinal. Empty
    /// means the study does not use conditions.
    pub arms: Vec<ArmConfig>,
    /// Idle time after which an unfinished participant counts as abandoned.
    pub abandoned_after: Duration,
    /// When true, abandoned participants still count toward arm balance.
    pub count_abandoned: bool,
}

impl StudyConfig {
    pub fn new(pages: PageList, arms: Vec<ArmConfig>) -> StudyConfig {
        StudyConfig {
            pages,
            arms,
            abandoned_after: DEFAULT_ABANDONED_AFTER,
            count_abandoned: false,
        }
    }

    /// Deserialize a study configuration from its JSON form:
    ///
    /// ```json
    /// {
    ///   "page_list": [ ... ],
    ///   "conditions": [ { "label": "Control", "enabled": true }, ... ],
    ///   "abandoned_minutes": 15,
    ///   "count_abandoned": false
    /// }
    /// ```
    ///
    /// `conditions`, `abandoned_minutes`, and `count_abandoned` are
    /// optional; `page_list` is not.
    pub fn from_json(value: &serde_json::Value) -> Result<StudyConfig, ConfigError> {
        let pages_value = value.get("page_list").ok_or_else(|| ConfigError::Malformed {
            context: "config".to_string(),
            message: "missing 'page_list'".to_string(),
        })?;
        let pages = PageList::from_json(pages_value)?;

        let mut arms = Vec::new();
        if let Some(raw_arms) = value.get("conditions") {
            let raw_arms = raw_arms.as_array().ok_or_else(|| ConfigError::Malformed {
                context: "conditions".to_string(),
                message: "expected an array of arm objects".to_string(),
            })?;
            for (index, raw) in raw_arms.iter().enumerate() {
                arms.push(parse_arm(index, raw)?);
            }
        }

        let abandoned_after = match value.get("abandoned_minutes") {
            Some(v) => {
                let minutes = v.as_i64().filter(|&m| m > 0).ok_or_else(|| {
                    ConfigError::Malformed {
                        context: "abandoned_minutes".to_string(),
                        message: "expected a positive integer".to_string(),
                    }
                })?;
                Duration::minutes(minutes)
            }
            None => DEFAULT_ABANDONED_AFTER,
        };

        let count_abandoned = value
            .get("count_abandoned")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);

        Ok(StudyConfig {
            pages,
            arms,
            abandoned_after,
            count_abandoned,
        })
    }

    /// Number of configured arms. Zero means conditions are disabled.
    pub fn arm_count(&self) -> usize {
        self.arms.len()
    }

    /// Every questionnaire path reachable in any arm, deduplicated, first
    /// occurrence first.
    ///
    /// Paths are reported with the `questionnaire/` prefix stripped. With
    /// `include_tags` the disambiguating tag suffix is kept
    /// (`"demographics/pre"`); without it everything past the first `/` is
    /// dropped, so repeated administrations of one instrument collapse to
    /// a single entry.
    pub fn questionnaire_paths(&self, include_tags: bool) -> Vec<String> {
        let mut questionnaires: Vec<String> = Vec::new();

        // The unconditioned flattening enumerates the whole universe; the
        // per-arm passes are kept so that first-occurrence order follows
        // arm ordinals if a later configuration change ever reorders
        // branch declarations.
        for scope in 0..=self.arm_count() as u16 {
            for page in self.pages.flatten(Condition::arm(scope)) {
                let Some(name) = questionnaire_name(&page.path, include_tags) else {
                    continue;
                };
                if !questionnaires.iter().any(|q| *q == name) {
                    questionnaires.push(name);
                }
            }
        }

        questionnaires
    }

    /// True when some arm's resolved sequence administers the same tagged
    /// questionnaire identifier twice.
    ///
    /// The check is per-arm: the same tagged path reachable from two
    /// *different* arms is a legitimately shared step and deduplicates
    /// cleanly, but twice within one arm's sequence means two distinct
    /// steps writing to the same storage rows.
    pub fn has_duplicate_questionnaires(&self) -> bool {
        self.duplicate_questionnaire().is_some()
    }

    /// The first offending `(tagged path, condition)` pair, if any.
    pub(crate) fn duplicate_questionnaire(&self) -> Option<(String, u16)> {
        let arms = self.arm_count().max(1) as u16;
        for arm in 1..=arms {
            let mut seen: Vec<&str> = Vec::new();
            for page in self.pages.flatten(Condition::arm(arm)) {
                let Some(name) = page.path.strip_prefix(QUESTIONNAIRE_PREFIX) else {
                    continue;
                };
                if seen.contains(&name) {
                    return Some((name.to_string(), arm));
                }
                seen.push(name);
            }
        }
        None
    }
}

/// Strip the questionnaire prefix (and optionally the tag) from a path,
/// or `None` if the path is not a questionnaire step.
fn questionnaire_name(path: &str, include_tags: bool) -> Option<String> {
    let name = path.strip_prefix(QUESTIONNAIRE_PREFIX)?;
    if include_tags {
        Some(name.to_string())
    } else {
        Some(name.split('/').next().unwrap_or(name).to_string())
    }
}

fn parse_arm(index: usize, raw: &serde_json::Value) -> Result<ArmConfig, ConfigError> {
    let obj = raw.as_object().ok_or_else(|| ConfigError::Malformed {
        context: format!("conditions[{}]", index),
        message: "expected an object".to_string(),
    })?;

    let label = obj
        .get("label")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| ConfigError::Malformed {
            context: format!("conditions[{}]", index),
            message: "arm is missing a 'label' string".to_string(),
        })?;

    let enabled = obj
        .get("enabled")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(true);

    Ok(ArmConfig {
        label: label.to_string(),
        enabled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{ConditionBranch, PageEntry, PageSpec};

    fn spec(path: &str) -> PageSpec {
        PageSpec {
            name: path.to_string(),
            path: path.to_string(),
        }
    }

    fn arms(n: usize) -> Vec<ArmConfig> {
        (0..n)
            .map(|i| ArmConfig {
                label: format!("Arm {}", i + 1),
                enabled: true,
            })
            .collect()
    }

    #[test]
    fn questionnaire_paths_unions_across_arms() {
        let pages = PageList::new(vec![
            PageEntry::Page(spec("questionnaire/demographics")),
            PageEntry::Branch(vec![
                ConditionBranch {
                    condition: 1,
                    pages: vec![spec("questionnaire/mood/pre"), spec("task_a")],
                },
                ConditionBranch {
                    condition: 2,
                    pages: vec![spec("questionnaire/mood/post")],
                },
            ]),
            PageEntry::Page(spec("end")),
        ]);
        let config = StudyConfig::new(pages, arms(2));

        assert_eq!(
            config.questionnaire_paths(true),
            vec!["demographics", "mood/pre", "mood/post"]
        );
        // Without tags the two mood administrations collapse.
        assert_eq!(
            config.questionnaire_paths(false),
            vec!["demographics", "mood"]
        );
    }

    #[test]
    fn shared_tag_across_arms_is_not_a_duplicate() {
        let pages = PageList::new(vec![PageEntry::Branch(vec![
            ConditionBranch {
                condition: 1,
                pages: vec![spec("questionnaire/demo/post")],
            },
            ConditionBranch {
                condition: 2,
                pages: vec![spec("questionnaire/demo/post")],
            },
        ])]);
        let config = StudyConfig::new(pages, arms(2));
        assert!(!config.has_duplicate_questionnaires());
    }

    #[test]
    fn repeated_tag_within_one_arm_is_a_duplicate() {
        let pages = PageList::new(vec![PageEntry::Branch(vec![ConditionBranch {
            condition: 1,
            pages: vec![spec("questionnaire/demo"), spec("questionnaire/demo")],
        }])]);
        let config = StudyConfig::new(pages, arms(1));
        assert!(config.has_duplicate_questionnaires());
    }

    #[test]
    fn unconditional_page_colliding_with_branch_page_is_a_duplicate() {
        let pages = PageList::new(vec![
            PageEntry::Page(spec("questionnaire/demo")),
            PageEntry::Branch(vec![
                ConditionBranch {
                    condition: 1,
                    pages: vec![spec("questionnaire/demo")],
                },
                ConditionBranch {
                    condition: 2,
                    pages: vec![spec("questionnaire/demo/alt")],
                },
            ]),
        ]);
        let config = StudyConfig::new(pages, arms(2));
        assert!(config.has_duplicate_questionnaires());
    }

    #[test]
    fn from_json_defaults() {
        let value = serde_json::json!({
            "page_list": [ { "name": "Consent", "path": "consent" } ]
        });
        let config = StudyConfig::from_json(&value).unwrap();
        assert_eq!(config.arm_count(), 0);
        assert_eq!(config.abandoned_after, DEFAULT_ABANDONED_AFTER);
        assert!(!config.count_abandoned);
    }

    #[test]
    fn from_json_reads_arms_and_policy() {
        let value = serde_json::json!({
            "page_list": [ { "name": "Consent", "path": "consent" } ],
            "conditions": [
                { "label": "Control" },
                { "label": "Treatment", "enabled": false }
            ],
            "abandoned_minutes": 30,
            "count_abandoned": true
        });
        let config = StudyConfig::from_json(&value).unwrap();
        assert_eq!(config.arm_count(), 2);
        assert!(config.arms[0].enabled);
        assert!(!config.arms[1].enabled);
        assert_eq!(config.abandoned_after, Duration::minutes(30));
        assert!(config.count_abandoned);
    }
}
