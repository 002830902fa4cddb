//! Breadcrumb progress grouping for the participant-facing template.
//!
//! Operates on the already-flattened, condition-resolved sequence -- never
//! on the raw configuration -- so groupings always match what the
//! participant actually experiences in their arm.

use proband_core::Condition;

use crate::resolver::FlowResolver;

/// One rendered breadcrumb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crumb {
    pub label: String,
    /// The participant's current page is inside this crumb's group.
    pub active: bool,
}

/// Build the breadcrumb trail for a participant at `current_path`.
///
/// Pages with empty names are hidden. Consecutive pages sharing a name
/// collapse into one crumb labelled `"Name (n)"`, or `"Name (k of n)"`
/// when the active page is the group's k-th entry.
pub fn breadcrumb_trail(
    resolver: &FlowResolver,
    condition: Condition,
    current_path: &str,
) -> Vec<Crumb> {
    let sequence = resolver.sequence(condition);
    let current = resolver.index_of(current_path, condition);

    // Visible pages, keeping their sequence index so the active page can
    // be located after hidden pages are dropped.
    let visible: Vec<(usize, &str)> = sequence
        .iter()
        .enumerate()
        .filter(|(_, page)| !page.name.is_empty())
        .map(|(index, page)| (index, page.name.as_str()))
        .collect();

    let mut crumbs = Vec::new();
    let mut start = 0;
    while start < visible.len() {
        let name = visible[start].1;
        let mut end = start + 1;
        while end < visible.len() && visible[end].1 == name {
            end += 1;
        }

        let group = &visible[start..end];
        let position_in_group = group
            .iter()
            .position(|&(index, _)| Some(index) == current);

        let label = match (group.len(), position_in_group) {
            (1, _) => name.to_string(),
            (n, Some(k)) => format!("{} ({} of {})", name, k + 1, n),
            (n, None) => format!("{} ({})", name, n),
        };

        crumbs.push(Crumb {
            label,
            active: position_in_group.is_some(),
        });
        start = end;
    }

    crumbs
}
