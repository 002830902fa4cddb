//! Startup validation of the study configuration.
//!
//! Called once, before any participant is routed. Every failure here is
//! fatal: the caller must abort startup and surface the error on the
//! console rather than run a study whose sequences would silently differ
//! from what the experimenter configured.

use crate::config::StudyConfig;
use crate::error::ConfigError;
use crate::page::PageEntry;

/// Validate a study configuration, returning the first error found.
pub fn validate(config: &StudyConfig) -> Result<(), ConfigError> {
    if config.pages.entries.is_empty() {
        return Err(ConfigError::EmptyPageList);
    }

    let arm_count = config.arm_count();

    for (index, entry) in config.pages.entries.iter().enumerate() {
        let PageEntry::Branch(branches) = entry else {
            continue;
        };

        if branches.is_empty() {
            return Err(ConfigError::EmptyRouting { index });
        }

        let mut seen_conditions: Vec<u16> = Vec::with_capacity(branches.len());
        for branch in branches {
            if branch.condition == 0 {
                return Err(ConfigError::ReservedCondition { index });
            }
            if seen_conditions.contains(&branch.condition) {
                return Err(ConfigError::DuplicateBranchCondition {
                    index,
                    condition: branch.condition,
                });
            }
            seen_conditions.push(branch.condition);

            if branch.pages.is_empty() {
                return Err(ConfigError::EmptyBranch {
                    index,
                    condition: branch.condition,
                });
            }
            if usize::from(branch.condition) > arm_count {
                return Err(ConfigError::ConditionOutOfRange {
                    index,
                    condition: branch.condition,
                    arms: arm_count,
                });
            }
        }
    }

    if arm_count > 0 && !config.arms.iter().any(|arm| arm.enabled) {
        return Err(ConfigError::NoEnabledArms { arms: arm_count });
    }

    if let Some((path, condition)) = config.duplicate_questionnaire() {
        return Err(ConfigError::DuplicateQuestionnaire { path, condition });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArmConfig;
    use crate::page::{ConditionBranch, PageList, PageSpec};

    fn spec(path: &str) -> PageSpec {
        PageSpec {
            name: path.to_string(),
            path: path.to_string(),
        }
    }

    fn arm(enabled: bool) -> ArmConfig {
        ArmConfig {
            label: "arm".to_string(),
            enabled,
        }
    }

    #[test]
    fn empty_page_list_is_fatal() {
        let config = StudyConfig::new(PageList::default(), vec![]);
        assert_eq!(validate(&config), Err(ConfigError::EmptyPageList));
    }

    #[test]
    fn reserved_condition_zero_is_fatal() {
        let pages = PageList::new(vec![PageEntry::Branch(vec![ConditionBranch {
            condition: 0,
            pages: vec![spec("x")],
        }])]);
        let config = StudyConfig::new(pages, vec![arm(true)]);
        assert_eq!(
            validate(&config),
            Err(ConfigError::ReservedCondition { index: 0 })
        );
    }

    #[test]
    fn colliding_branch_conditions_are_fatal() {
        let pages = PageList::new(vec![PageEntry::Branch(vec![
            ConditionBranch {
                condition: 1,
                pages: vec![spec("a")],
            },
            ConditionBranch {
                condition: 1,
                pages: vec![spec("b")],
            },
        ])]);
        let config = StudyConfig::new(pages, vec![arm(true)]);
        assert_eq!(
            validate(&config),
            Err(ConfigError::DuplicateBranchCondition {
                index: 0,
                condition: 1
            })
        );
    }

    #[test]
    fn branch_beyond_arm_count_is_fatal() {
        let pages = PageList::new(vec![PageEntry::Branch(vec![ConditionBranch {
            condition: 3,
            pages: vec![spec("a")],
        }])]);
        let config = StudyConfig::new(pages, vec![arm(true)]);
        assert_eq!(
            validate(&config),
            Err(ConfigError::ConditionOutOfRange {
                index: 0,
                condition: 3,
                arms: 1
            })
        );
    }

    #[test]
    fn all_arms_disabled_is_fatal() {
        let pages = PageList::new(vec![PageEntry::Page(spec("consent"))]);
        let config = StudyConfig::new(pages, vec![arm(false), arm(false)]);
        assert_eq!(validate(&config), Err(ConfigError::NoEnabledArms { arms: 2 }));
    }

    #[test]
    fn no_arms_at_all_is_fine() {
        let pages = PageList::new(vec![PageEntry::Page(spec("consent"))]);
        let config = StudyConfig::new(pages, vec![]);
        assert_eq!(validate(&config), Ok(()));
    }

    #[test]
    fn duplicate_questionnaire_is_fatal() {
        let pages = PageList::new(vec![
            PageEntry::Page(spec("questionnaire/demo")),
            PageEntry::Branch(vec![ConditionBranch {
                condition: 1,
                pages: vec![spec("questionnaire/demo")],
            }]),
        ]);
        let config = StudyConfig::new(pages, vec![arm(true)]);
        assert_eq!(
            validate(&config),
            Err(ConfigError::DuplicateQuestionnaire {
                path: "demo".to_string(),
                condition: 1
            })
        );
    }

    #[test]
    fn well_formed_config_passes() {
        let pages = PageList::new(vec![
            PageEntry::Page(spec("consent")),
            PageEntry::Branch(vec![
                ConditionBranch {
                    condition: 1,
                    pages: vec![spec("questionnaire/mood/pre")],
                },
                ConditionBranch {
                    condition: 2,
                    pages: vec![spec("questionnaire/mood/post")],
                },
            ]),
            PageEntry::Page(spec("end")),
        ]);
        let config = StudyConfig::new(pages, vec![arm(true), arm(true)]);
        assert_eq!(validate(&config), Ok(()));
    }
}
