//! Frontmatter Change Classifier
//!
//! Pure comparison of two parsed frontmatter blocks. The result decides how
//! invasive a reload has to be.

use std::collections::BTreeSet;

use serde::Serialize;
use smallvec::SmallVec;

use super::Frontmatter;
use crate::reactive::Framework;
use crate::reload::FileType;

/// Which part of the frontmatter changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Target,
    Channels,
    Imports,
    Route,
}

/// Old or new side of a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ChangeValue {
    Text(Option<String>),
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrontmatterChange {
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    pub old_value: ChangeValue,
    pub new_value: ChangeValue,
    pub requires_subscription_update: bool,
    pub requires_dependency_resolution: bool,
}

impl FrontmatterChange {
    fn text(change_type: ChangeType, old: &Option<String>, new: &Option<String>) -> Self {
        Self {
            change_type,
            old_value: ChangeValue::Text(old.clone()),
            new_value: ChangeValue::Text(new.clone()),
            requires_subscription_update: false,
            requires_dependency_resolution: false,
        }
    }

    fn list(change_type: ChangeType, old: &[String], new: &[String]) -> Self {
        Self {
            change_type,
            old_value: ChangeValue::List(old.to_vec()),
            new_value: ChangeValue::List(new.to_vec()),
            requires_subscription_update: change_type == ChangeType::Channels,
            requires_dependency_resolution: change_type == ChangeType::Imports,
        }
    }

    /// Entries present in the new list but not the old one.
    pub fn added(&self) -> Vec<String> {
        match (&self.old_value, &self.new_value) {
            (ChangeValue::List(old), ChangeValue::List(new)) => difference(new, old),
            _ => Vec::new(),
        }
    }

    /// Entries present in the old list but not the new one.
    pub fn removed(&self) -> Vec<String> {
        match (&self.old_value, &self.new_value) {
            (ChangeValue::List(old), ChangeValue::List(new)) => difference(old, new),
            _ => Vec::new(),
        }
    }
}

/// How invasive a reload is, least to most.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReloadStrategy {
    /// Stylesheet swap, no component state involved.
    StylesOnly,
    /// Swap the module, keep every island mounted.
    HotUpdate,
    /// Hot update plus channel re-subscription.
    Resubscribe,
    /// Re-resolve the import graph before updating.
    DependencyRefresh,
    /// Tear down and remount the file's islands.
    Remount,
    /// Route table changed; the page has to reload.
    FullReload,
}

/// Classifier output for one file change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrontmatterDiff {
    pub has_changes: bool,
    pub changes: SmallVec<[FrontmatterChange; 4]>,
}

impl FrontmatterDiff {
    /// Nothing to diff.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn get(&self, change_type: ChangeType) -> Option<&FrontmatterChange> {
        self.changes.iter().find(|c| c.change_type == change_type)
    }

    pub fn requires_subscription_update(&self) -> bool {
        self.changes.iter().any(|c| c.requires_subscription_update)
    }

    pub fn requires_dependency_resolution(&self) -> bool {
        self.changes.iter().any(|c| c.requires_dependency_resolution)
    }

    /// The old and new target frameworks, when they resolve to different
    /// frameworks. A spelling change such as `reactjs` → `react` is not one.
    pub fn framework_change(&self) -> Option<(Option<Framework>, Option<Framework>)> {
        let change = self.get(ChangeType::Target)?;
        let resolve = |v: &ChangeValue| match v {
            ChangeValue::Text(Some(t)) => t.parse::<Framework>().ok(),
            _ => None,
        };
        let (from, to) = (resolve(&change.old_value), resolve(&change.new_value));
        (from != to).then_some((from, to))
    }

    pub fn requires_target_framework_change(&self) -> bool {
        self.framework_change().is_some()
    }

    /// Pick the reload strategy for this change set.
    pub fn strategy(&self, file_type: FileType) -> ReloadStrategy {
        match file_type {
            FileType::Css => return ReloadStrategy::StylesOnly,
            FileType::Dependency => return ReloadStrategy::DependencyRefresh,
            FileType::Native | FileType::Mtm => {}
        }

        self.changes
            .iter()
            .map(|change| match change.change_type {
                ChangeType::Route => ReloadStrategy::FullReload,
                ChangeType::Target if self.requires_target_framework_change() => {
                    ReloadStrategy::Remount
                }
                ChangeType::Target => ReloadStrategy::HotUpdate,
                ChangeType::Imports => ReloadStrategy::DependencyRefresh,
                ChangeType::Channels => ReloadStrategy::Resubscribe,
            })
            .max()
            .unwrap_or(ReloadStrategy::HotUpdate)
    }
}

/// Compare two frontmatter blocks.
///
/// A missing previous block (first observation) or a missing current block
/// (unparsable source) yields no changes.
pub fn classify(previous: Option<&Frontmatter>, current: Option<&Frontmatter>) -> FrontmatterDiff {
    let (Some(prev), Some(curr)) = (previous, current) else {
        return FrontmatterDiff::none();
    };

    let mut changes = SmallVec::new();

    if normalized(&prev.target) != normalized(&curr.target) {
        changes.push(FrontmatterChange::text(ChangeType::Target, &prev.target, &curr.target));
    }
    if !same_set(&prev.channels, &curr.channels) {
        changes.push(FrontmatterChange::list(ChangeType::Channels, &prev.channels, &curr.channels));
    }
    if !same_set(&prev.imports, &curr.imports) {
        changes.push(FrontmatterChange::list(ChangeType::Imports, &prev.imports, &curr.imports));
    }
    if normalized(&prev.route) != normalized(&curr.route) {
        changes.push(FrontmatterChange::text(ChangeType::Route, &prev.route, &curr.route));
    }

    FrontmatterDiff {
        has_changes: !changes.is_empty(),
        changes,
    }
}

fn normalized(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn same_set(a: &[String], b: &[String]) -> bool {
    let a: BTreeSet<&str> = a.iter().map(|s| s.trim()).collect();
    let b: BTreeSet<&str> = b.iter().map(|s| s.trim()).collect();
    a == b
}

fn difference(a: &[String], b: &[String]) -> Vec<String> {
    let b: BTreeSet<&str> = b.iter().map(|s| s.trim()).collect();
    a.iter()
        .filter(|s| !b.contains(s.trim()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fm(target: &str, channels: &[&str], imports: &[&str], route: Option<&str>) -> Frontmatter {
        Frontmatter {
            target: Some(target.to_string()),
            channels: channels.iter().map(|s| s.to_string()).collect(),
            imports: imports.iter().map(|s| s.to_string()).collect(),
            route: route.map(str::to_string),
        }
    }

    #[test]
    fn target_change_only() {
        let prev = fm("reactjs", &["message-sent"], &[], None);
        let curr = fm("vue", &["message-sent"], &[], None);

        let diff = classify(Some(&prev), Some(&curr));
        assert!(diff.has_changes);
        assert_eq!(diff.changes.len(), 1);
        assert_eq!(diff.changes[0].change_type, ChangeType::Target);
        assert!(diff.get(ChangeType::Channels).is_none());
        assert_eq!(
            diff.framework_change(),
            Some((Some(Framework::React), Some(Framework::Vue)))
        );
        assert_eq!(diff.strategy(FileType::Mtm), ReloadStrategy::Remount);
    }

    #[test]
    fn channel_order_is_ignored() {
        let prev = fm("vue", &["a", "b"], &[], None);
        let curr = fm("vue", &["b", "a"], &[], None);
        assert!(!classify(Some(&prev), Some(&curr)).has_changes);
    }

    #[test]
    fn channel_add_and_remove_is_one_change() {
        let prev = fm("vue", &["a", "b"], &[], None);
        let curr = fm("vue", &["b", "c"], &[], None);

        let diff = classify(Some(&prev), Some(&curr));
        assert_eq!(diff.changes.len(), 1);
        let change = diff.get(ChangeType::Channels).unwrap();
        assert!(change.requires_subscription_update);
        assert!(!change.requires_dependency_resolution);
        assert_eq!(change.added(), vec!["c"]);
        assert_eq!(change.removed(), vec!["a"]);
        assert_eq!(diff.strategy(FileType::Mtm), ReloadStrategy::Resubscribe);
    }

    #[test]
    fn import_change_requires_resolution() {
        let prev = fm("solid", &[], &["./a.mtm"], None);
        let curr = fm("solid", &[], &["./a.mtm", "./b.mtm"], None);

        let diff = classify(Some(&prev), Some(&curr));
        let change = diff.get(ChangeType::Imports).unwrap();
        assert!(change.requires_dependency_resolution);
        assert!(diff.requires_dependency_resolution());
        assert!(!diff.requires_subscription_update());
    }

    #[test]
    fn route_change_forces_full_reload() {
        let prev = fm("svelte", &["x"], &[], Some("/a"));
        let curr = fm("svelte", &["y"], &[], Some("/b"));

        let diff = classify(Some(&prev), Some(&curr));
        assert_eq!(diff.changes.len(), 2);
        assert_eq!(diff.strategy(FileType::Mtm), ReloadStrategy::FullReload);
    }

    #[test]
    fn first_observation_has_no_changes() {
        let curr = fm("react", &["a"], &[], None);
        let diff = classify(None, Some(&curr));
        assert!(!diff.has_changes);
        assert!(diff.changes.is_empty());
        assert!(!classify(Some(&curr), None).has_changes);
    }

    #[test]
    fn spelling_change_is_not_a_framework_change() {
        let prev = fm("reactjs", &[], &[], None);
        let curr = fm("react", &[], &[], None);

        let diff = classify(Some(&prev), Some(&curr));
        assert!(diff.get(ChangeType::Target).is_some());
        assert!(!diff.requires_target_framework_change());
        assert_eq!(diff.strategy(FileType::Mtm), ReloadStrategy::HotUpdate);
    }

    #[test]
    fn file_type_overrides_strategy() {
        let diff = FrontmatterDiff::none();
        assert_eq!(diff.strategy(FileType::Css), ReloadStrategy::StylesOnly);
        assert_eq!(diff.strategy(FileType::Dependency), ReloadStrategy::DependencyRefresh);
        assert_eq!(diff.strategy(FileType::Native), ReloadStrategy::HotUpdate);
    }

    #[test]
    fn serializes_change_type_as_type() {
        let prev = fm("reactjs", &[], &[], None);
        let curr = fm("vue", &[], &[], None);
        let diff = classify(Some(&prev), Some(&curr));

        let json = serde_json::to_value(&diff).unwrap();
        assert_eq!(json["hasChanges"], true);
        assert_eq!(json["changes"][0]["type"], "target");
        assert_eq!(json["changes"][0]["oldValue"], "reactjs");
    }
}
