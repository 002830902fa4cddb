//! The declarative page list: the possibly-branching description of the
//! experiment's step sequence, and its condition-specific flattening.

use crate::condition::Condition;
use crate::error::ConfigError;

/// One concrete step of the experiment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSpec {
    /// Display label. May repeat across consecutive specs (repeated names
    /// are collapsed into one breadcrumb group); an empty name hides the
    /// page from breadcrumbs entirely.
    pub name: String,
    /// Step identifier within a resolved sequence, without a leading
    /// slash, e.g. `"consent"` or `"questionnaire/demographics/pre"`.
    pub path: String,
}

/// One arm's sub-sequence inside a branching entry.
///
/// Branch pages are concrete `PageSpec`s by construction -- a branch can
/// never contain further branching, so the one-level nesting rule is
/// enforced by the type rather than checked at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionBranch {
    /// 1-based arm ordinal this branch applies to.
    pub condition: u16,
    pub pages: Vec<PageSpec>,
}

/// One entry of the configured page list: either a concrete page or a
/// branching point, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEntry {
    Page(PageSpec),
    Branch(Vec<ConditionBranch>),
}

/// The ordered, possibly-branching page list. Read-only after startup and
/// shared across all requests.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageList {
    pub entries: Vec<PageEntry>,
}

impl PageList {
    pub fn new(entries: Vec<PageEntry>) -> PageList {
        PageList { entries }
    }

    /// Deserialize a page list from its JSON form: an array of objects,
    /// each either `{"name": ..., "path": ...}` or
    /// `{"conditional_routing": [{"condition": ..., "page_list": [...]}]}`.
    ///
    /// Shape errors are fatal configuration errors; a page list that
    /// parses here still has to pass [`crate::validate::validate`] before
    /// routing any participant.
    pub fn from_json(value: &serde_json::Value) -> Result<PageList, ConfigError> {
        let raw_entries = value.as_array().ok_or_else(|| ConfigError::Malformed {
            context: "page_list".to_string(),
            message: "expected an array of page entries".to_string(),
        })?;

        let mut entries = Vec::with_capacity(raw_entries.len());
        for (index, raw) in raw_entries.iter().enumerate() {
            entries.push(parse_entry(index, raw)?);
        }
        Ok(PageList { entries })
    }

    /// Flatten the page list into the linear sequence for `condition`.
    ///
    /// Plain entries always contribute. A branching entry contributes the
    /// pages of the first branch matching a live (positive) arm
    /// assignment; a condition with no matching branch contributes
    /// nothing, since arms may legitimately differ in step count. An
    /// unconditioned or released condition selects the union of every
    /// branch, in declaration order -- the enumerate-everything scope used
    /// to discover the universe of questionnaire paths.
    ///
    /// Pure: the same `(page list, condition)` pair always produces the
    /// same sequence.
    pub fn flatten(&self, condition: Condition) -> Vec<&PageSpec> {
        let arm = condition.arm_index();
        let mut flat = Vec::new();

        for entry in &self.entries {
            match entry {
                PageEntry::Page(page) => flat.push(page),
                PageEntry::Branch(branches) => match arm {
                    Some(n) => {
                        if let Some(branch) = branches.iter().find(|b| b.condition == n) {
                            flat.extend(branch.pages.iter());
                        }
                    }
                    None => {
                        for branch in branches {
                            flat.extend(branch.pages.iter());
                        }
                    }
                },
            }
        }

        flat
    }
}

fn parse_entry(index: usize, raw: &serde_json::Value) -> Result<PageEntry, ConfigError> {
    let obj = raw.as_object().ok_or_else(|| ConfigError::Malformed {
        context: format!("page_list[{}]", index),
        message: "expected an object".to_string(),
    })?;

    let has_routing = obj.contains_key("conditional_routing");
    let has_page = obj.contains_key("path") || obj.contains_key("name");

    if has_routing && has_page {
        return Err(ConfigError::Malformed {
            context: format!("page_list[{}]", index),
            message: "an entry is either a page or a conditional_routing block, not both"
                .to_string(),
        });
    }

    if has_routing {
        let raw_branches = obj["conditional_routing"]
            .as_array()
            .ok_or_else(|| ConfigError::Malformed {
                context: format!("page_list[{}].conditional_routing", index),
                message: "expected an array of branches".to_string(),
            })?;

        let mut branches = Vec::with_capacity(raw_branches.len());
        for (branch_index, raw_branch) in raw_branches.iter().enumerate() {
            let context = format!("page_list[{}].conditional_routing[{}]", index, branch_index);
            branches.push(parse_branch(&context, raw_branch)?);
        }
        return Ok(PageEntry::Branch(branches));
    }

    let context = format!("page_list[{}]", index);
    Ok(PageEntry::Page(parse_page(&context, raw)?))
}

fn parse_branch(context: &str, raw: &serde_json::Value) -> Result<ConditionBranch, ConfigError> {
    let obj = raw.as_object().ok_or_else(|| ConfigError::Malformed {
        context: context.to_string(),
        message: "expected an object".to_string(),
    })?;

    let condition = obj
        .get("condition")
        .and_then(serde_json::Value::as_u64)
        .and_then(|n| u16::try_from(n).ok())
        .ok_or_else(|| ConfigError::Malformed {
            context: context.to_string(),
            message: "branch is missing a valid 'condition'".to_string(),
        })?;

    let raw_pages = obj
        .get("page_list")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| ConfigError::Malformed {
            context: context.to_string(),
            message: "branch is missing a 'page_list' array".to_string(),
        })?;

    let mut pages = Vec::with_capacity(raw_pages.len());
    for (page_index, raw_page) in raw_pages.iter().enumerate() {
        let page_context = format!("{}.page_list[{}]", context, page_index);
        if raw_page
            .as_object()
            .is_some_and(|o| o.contains_key("conditional_routing"))
        {
            return Err(ConfigError::Malformed {
                context: page_context,
                message: "branches may not contain further conditional_routing".to_string(),
            });
        }
        pages.push(parse_page(&page_context, raw_page)?);
    }

    Ok(ConditionBranch { condition, pages })
}

fn parse_page(context: &str, raw: &serde_json::Value) -> Result<PageSpec, ConfigError> {
    let obj = raw.as_object().ok_or_else(|| ConfigError::Malformed {
        context: context.to_string(),
        message: "expected an object".to_string(),
    })?;

    let name = obj
        .get("name")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| ConfigError::Malformed {
            context: context.to_string(),
            message: "page is missing a 'name' string".to_string(),
        })?;

    let path = obj
        .get("path")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| ConfigError::Malformed {
            context: context.to_string(),
            message: "page is missing a 'path' string".to_string(),
        })?;

    Ok(PageSpec {
        name: name.to_string(),
        path: path.trim_start_matches('/').to_string(),
    })
}
