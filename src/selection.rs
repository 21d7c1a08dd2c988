use std::collections::HashSet;

/// Checked record ids, in the order they were checked.
#[derive(Debug, Default, Clone)]
pub struct Selection {
    order: Vec<String>,
    members: HashSet<String>,
}

impl Selection {
    pub fn select_item(&mut self, id: &str, checked: bool) {
        if checked {
            if self.members.insert(id.to_string()) {
                self.order.push(id.to_string());
            }
        } else if self.members.remove(id) {
            self.order.retain(|i| i != id);
        }
    }

    pub fn toggle(&mut self, id: &str) {
        let checked = !self.is_selected(id);
        self.select_item(id, checked);
    }

    /// Select every visible id, or nothing.
    pub fn select_all<'a>(&mut self, visible: impl IntoIterator<Item = &'a str>, checked: bool) {
        self.clear();
        if checked {
            for id in visible {
                self.select_item(id, true);
            }
        }
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }

    /// Drop ids that are no longer visible.
    pub fn prune<'a>(&mut self, visible: impl IntoIterator<Item = &'a str>) {
        let visible: HashSet<&str> = visible.into_iter().collect();
        self.order.retain(|id| visible.contains(id.as_str()));
        self.members.retain(|id| visible.contains(id.as_str()));
    }

    pub fn ids(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_item_is_idempotent() {
        let mut selection = Selection::default();
        selection.select_item("a", true);
        selection.select_item("a", true);
        assert_eq!(selection.ids(), ["a"]);

        selection.select_item("a", false);
        selection.select_item("a", false);
        assert!(selection.is_empty());
    }

    #[test]
    fn select_all_then_none_is_empty() {
        let mut selection = Selection::default();
        selection.select_item("z", true);
        selection.select_all(["a", "b", "c"], true);
        assert_eq!(selection.ids(), ["a", "b", "c"]);
        assert!(!selection.is_selected("z"));

        selection.select_all(["a", "b", "c"], false);
        assert!(selection.is_empty());
    }

    #[test]
    fn select_all_ignores_duplicate_visible_ids() {
        let mut selection = Selection::default();
        selection.select_all(["a", "a", "b"], true);
        assert_eq!(selection.len(), 2);
    }

    #[test]
    fn prune_keeps_only_visible() {
        let mut selection = Selection::default();
        selection.select_item("a", true);
        selection.select_item("b", true);
        selection.select_item("c", true);
        selection.prune(["c", "a"]);
        assert_eq!(selection.ids(), ["a", "c"]);
        assert!(!selection.is_selected("b"));
    }

    #[test]
    fn toggle_flips_membership() {
        let mut selection = Selection::default();
        selection.toggle("a");
        assert!(selection.is_selected("a"));
        selection.toggle("a");
        assert!(!selection.is_selected("a"));
    }
}
