//! Reconciliation.
//!
//! Patching walks the previous and the new expansion side by side. A
//! children list is patched one of three ways:
//!
//! - **Keyed**: when any new item has a key, existing elements are matched
//!   by their stored key attribute and moved into order.
//! - **Positional**: when every item of both lists maps to exactly one
//!   document node, items are paired by position and patched in place.
//! - **Rebuild**: otherwise the list is built again.
//!
//! Every node leaving the document has its unmount hooks run first.

use std::collections::HashMap;

use crate::directive::{self, group_nodes, segment, Segment, EACH, ONCE};
use crate::dom::unmount::{release_bindings, run_unmount_hooks};
use crate::dom::DomNode;
use crate::error::RenderError;
use crate::view::{Child, Expanded, NodeType, PropValue, VNode};

use super::build::has_keys;
use super::ClientRenderer;

impl ClientRenderer {
    /// Bring the content of `container`, built from `old`, in line with
    /// `new`.
    pub fn patch_root(&self, container: &DomNode, old: &Expanded, new: &Expanded) -> Result<(), RenderError> {
        tracing::debug!(container = ?container.id(), "patching root");
        self.patch_children(container, &old.items(), &new.items())
    }

    pub(crate) fn patch_children(
        &self,
        parent: &DomNode,
        old: &[Child],
        new: &[Child],
    ) -> Result<(), RenderError> {
        if has_keys(new) {
            return self.reconcile_keyed(parent, new);
        }

        let old_segments = segment(old);
        let new_segments = segment(new);
        let positional = parent.child_count() == old_segments.len()
            && old_segments.iter().all(|s| spans_one(old, s))
            && new_segments.iter().all(|s| spans_one(new, s));

        if positional {
            self.patch_positional(parent, old, &old_segments, new, &new_segments)
        } else {
            tracing::debug!(parent = ?parent.id(), "rebuilding children");
            self.replace_children(parent, new)
        }
    }

    fn patch_positional(
        &self,
        parent: &DomNode,
        old: &[Child],
        old_segments: &[Segment],
        new: &[Child],
        new_segments: &[Segment],
    ) -> Result<(), RenderError> {
        let current = parent.children();
        for index in 0..old_segments.len().max(new_segments.len()) {
            match (old_segments.get(index), new_segments.get(index)) {
                (Some(before), Some(after)) => {
                    self.patch_segment(&current[index], old, before, new, after)?;
                }
                (None, Some(after)) => {
                    for node in self.build_segment(new, after)? {
                        parent.append_child(&node)?;
                    }
                }
                (Some(_), None) => {
                    run_unmount_hooks(&current[index]);
                    parent.remove_child(&current[index])?;
                }
                (None, None) => break,
            }
        }
        Ok(())
    }

    fn patch_segment(
        &self,
        current: &DomNode,
        old: &[Child],
        before: &Segment,
        new: &[Child],
        after: &Segment,
    ) -> Result<(), RenderError> {
        if let (Segment::Item(i), Segment::Item(j)) = (before, after) {
            match (&old[*i], &new[*j]) {
                (Child::Node(a), Child::Node(b)) => return self.patch_node(current, a, b),
                (Child::Dynamic(_), Child::Dynamic(dynamic)) => {
                    run_unmount_hooks(current);
                    return self.install_dynamic(current, dynamic.clone());
                }
                _ => {}
            }
        }
        let fresh = DomNode::fragment();
        for node in self.build_segment(new, after)? {
            fresh.append_child(&node)?;
        }
        replace(current, &fresh)
    }

    /// Patch `current`, built from `old`, to match `new`.
    pub(crate) fn patch_node(&self, current: &DomNode, old: &VNode, new: &VNode) -> Result<(), RenderError> {
        if let (Some(_), Some(text)) = (old.text_content(), new.text_content()) {
            if current.is_text() {
                current.set_data(text);
                return Ok(());
            }
        }

        let same = new.tag().is_some()
            && old.tag() == new.tag()
            && current.tag() == new.tag()
            && old.key == new.key
            && !directive::is_structural(old)
            && !directive::is_structural(new);
        if !same {
            let fresh = DomNode::fragment();
            for node in self.build_vnode(new)? {
                fresh.append_child(&node)?;
            }
            return replace(current, &fresh);
        }

        // Computations driving the old properties belong to the previous
        // render; the new properties install their own. Directives stay
        // mounted.
        release_bindings(current);
        if !directive::controls_content(new) {
            if directive::controls_content(old) {
                self.replace_children(current, new.child_list())?;
            } else {
                self.patch_children(current, old.child_list(), new.child_list())?;
            }
        }
        self.apply_props(current, new, Some(old))
    }

    /// Reconcile the children of `parent` against a keyed list.
    pub(crate) fn reconcile_keyed(&self, parent: &DomNode, new: &[Child]) -> Result<(), RenderError> {
        let key_attribute = &self.options.key_attribute;
        let mut existing: HashMap<String, DomNode> = parent
            .children()
            .into_iter()
            .filter_map(|node| Some((node.get_attribute(key_attribute)?, node)))
            .collect();
        tracing::debug!(parent = ?parent.id(), items = new.len(), keyed = existing.len(), "keyed reconcile");

        let mut next = Vec::with_capacity(new.len());
        for segment in segment(new) {
            if let Segment::Item(index) = segment {
                if let Some(node) = new[index].as_node() {
                    if let Some(element) = self.take_reusable(&mut existing, node) {
                        self.reuse_keyed(&element, node)?;
                        next.push(element);
                        continue;
                    }
                }
            }
            next.extend(self.build_segment(new, &segment)?);
        }

        for (index, node) in next.iter().enumerate() {
            match parent.child(index) {
                Some(current) if current.ptr_eq(node) => {}
                current => parent.insert_before(node, current.as_ref())?,
            }
        }
        while let Some(leftover) = parent.child(next.len()) {
            run_unmount_hooks(&leftover);
            parent.remove_child(&leftover)?;
        }
        Ok(())
    }

    fn take_reusable(&self, existing: &mut HashMap<String, DomNode>, node: &VNode) -> Option<DomNode> {
        let key = node.key.as_deref()?;
        let tag = node.tag()?;
        if directive::is_structural(node) {
            return None;
        }
        existing.remove(key).filter(|element| element.tag() == Some(tag))
    }

    /// Keep the element, rebuild everything inside it.
    fn reuse_keyed(&self, element: &DomNode, node: &VNode) -> Result<(), RenderError> {
        tracing::trace!(key = ?node.key, "reusing keyed element");
        run_unmount_hooks(element);
        element.clear_children();
        element.clear_event_listeners();
        let key_attribute = &self.options.key_attribute;
        for name in element.attribute_names().into_iter().chain(["style".to_string()]) {
            if name != *key_attribute && !node.props.contains_key(&name) {
                element.remove_attribute(&name);
            }
        }
        if !directive::controls_content(node) {
            self.append_children(element, node.child_list())?;
        }
        self.apply_props(element, node, None)
    }
}

/// Swap `current` for the content of `fresh`, running unmount hooks first.
fn replace(current: &DomNode, fresh: &DomNode) -> Result<(), RenderError> {
    run_unmount_hooks(current);
    current.replace_with(fresh)
}

/// Whether a segment is rendered as exactly one document node.
fn spans_one(children: &[Child], segment: &Segment) -> bool {
    match segment {
        Segment::Item(index) => match &children[*index] {
            Child::Dynamic(_) => true,
            Child::Node(node) => is_single(node),
        },
        Segment::Branch(range) => {
            let group = group_nodes(children, range.clone());
            if directive::is_reactive_group(group.iter().copied()) {
                return true;
            }
            group.iter().all(|node| is_single(node))
        }
        Segment::Orphan(_) => false,
    }
}

fn is_single(node: &VNode) -> bool {
    match &node.kind {
        NodeType::Tag(_) | NodeType::Text(_) => true,
        NodeType::Fragment => {
            !node.has_prop(ONCE)
                && matches!(node.props.get(EACH), Some(PropValue::Each(each)) if each.source.is_reactive())
        }
        NodeType::Component(_) => false,
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::unmount::register_unmount;
    use crate::view::{el, expand, fragment};
    use std::cell::Cell;
    use std::rc::Rc;

    fn mount(renderer: &ClientRenderer, node: &VNode) -> (DomNode, Expanded) {
        let container = DomNode::element("main");
        let expanded = expand(node).unwrap();
        container
            .append_child(&renderer.materialize(&expanded).unwrap())
            .unwrap();
        (container, expanded)
    }

    fn update(renderer: &ClientRenderer, container: &DomNode, old: &Expanded, node: &VNode) -> Expanded {
        let new = expand(node).unwrap();
        renderer.patch_root(container, old, &new).unwrap();
        new
    }

    fn keyed_list(keys: &[&str]) -> VNode {
        el("ul").children(keys.iter().map(|key| el("li").key(*key).child(*key)))
    }

    #[test]
    fn keyed_reorder_reuses_elements() {
        let renderer = ClientRenderer::default();
        let (container, old) = mount(&renderer, &keyed_list(&["a", "b", "c"]));
        let list = container.child(0).unwrap();
        let before = list.children();

        update(&renderer, &container, &old, &keyed_list(&["c", "a", "b"]));

        let after = list.children();
        assert_eq!(list.text_content(), "cab");
        assert!(after[0].ptr_eq(&before[2]));
        assert!(after[1].ptr_eq(&before[0]));
        assert!(after[2].ptr_eq(&before[1]));
    }

    #[test]
    fn keyed_removal_runs_unmount_hooks() {
        let renderer = ClientRenderer::default();
        let (container, old) = mount(&renderer, &keyed_list(&["a", "b"]));
        let list = container.child(0).unwrap();
        let removed = Rc::new(Cell::new(false));
        let r = removed.clone();
        register_unmount(&list.child(1).unwrap(), move || r.set(true));

        update(&renderer, &container, &old, &keyed_list(&["a"]));

        assert!(removed.get());
        assert_eq!(list.text_content(), "a");
    }

    #[test]
    fn keyed_tag_change_builds_fresh() {
        let renderer = ClientRenderer::default();
        let (container, old) = mount(&renderer, &el("ul").child(el("li").key("a")));
        let list = container.child(0).unwrap();
        let before = list.child(0).unwrap();

        update(&renderer, &container, &old, &el("ul").child(el("p").key("a")));
        assert!(!list.child(0).unwrap().ptr_eq(&before));
        assert_eq!(list.child(0).unwrap().tag(), Some("p"));
    }

    #[test]
    fn positional_patch_keeps_elements_and_updates_text() {
        let renderer = ClientRenderer::default();
        let (container, old) = mount(
            &renderer,
            &el("div").attr("class", "a").children([el("span").child("one")]),
        );
        let div = container.child(0).unwrap();
        let span = div.child(0).unwrap();

        update(
            &renderer,
            &container,
            &old,
            &el("div").attr("class", "b").children([el("span").child("two"), el("i")]),
        );

        assert!(container.child(0).unwrap().ptr_eq(&div));
        assert!(div.child(0).unwrap().ptr_eq(&span));
        assert_eq!(div.outer_html(), "<div class=\"b\"><span>two</span><i></i></div>");
    }

    #[test]
    fn tag_change_replaces_node() {
        let renderer = ClientRenderer::default();
        let (container, old) = mount(&renderer, &fragment([el("p"), el("p")]));
        let first = container.child(0).unwrap();

        update(&renderer, &container, &old, &fragment([el("h1"), el("p")]));
        assert!(!container.child(0).unwrap().ptr_eq(&first));
        assert_eq!(container.inner_html(), "<h1></h1><p></p>");
    }

    #[test]
    fn shrinking_list_removes_trailing_nodes() {
        let renderer = ClientRenderer::default();
        let (container, old) = mount(&renderer, &fragment(["a", "b", "c"]));
        update(&renderer, &container, &old, &fragment(["a"]));
        assert_eq!(container.inner_html(), "a");
    }

    #[test]
    fn branch_switch_replaces_only_the_group() {
        let renderer = ClientRenderer::default();
        let tree = |flag: bool| {
            el("div").children([
                el("header"),
                el("a").when(flag),
                el("b").otherwise(),
            ])
        };
        let (container, old) = mount(&renderer, &tree(true));
        let div = container.child(0).unwrap();
        let header = div.child(0).unwrap();

        update(&renderer, &container, &old, &tree(false));
        assert!(div.child(0).unwrap().ptr_eq(&header));
        assert_eq!(div.inner_html(), "<header></header><b></b>");
    }

    #[test]
    fn static_list_change_rebuilds() {
        let renderer = ClientRenderer::default();
        let list = |items: Vec<&'static str>| {
            el("ul").child(VNode::each(items, |item, _| el("li").child(item.to_text())))
        };
        let (container, old) = mount(&renderer, &list(vec!["a"]));
        update(&renderer, &container, &old, &list(vec!["a", "b", "c"]));
        assert_eq!(container.child(0).unwrap().text_content(), "abc");
    }
}
