//! Building document nodes from view nodes.

use std::borrow::Cow;

use crate::directive::{
    self, branch_body, freeze, group_nodes, is_reactive_group, resolve_list, segment,
    select_branch, Segment, EACH, ONCE,
};
use crate::dom::unmount::{register_unmount, run_unmount_hooks};
use crate::dom::DomNode;
use crate::error::RenderError;
use crate::reactive::{try_create_effect, untrack};
use crate::view::{
    expand, flatten_children, Child, Dynamic, Each, Expanded, Fallback, NodeType, PropValue, VNode,
};

use super::ClientRenderer;

/// Marks placeholders and wrappers with what drives them.
pub(crate) const ROLE_ATTRIBUTE: &str = "data-weave";

impl ClientRenderer {
    /// Build the document for an expanded root: the node itself for a
    /// single element, or a fragment holding every item.
    pub fn materialize(&self, expanded: &Expanded) -> Result<DomNode, RenderError> {
        let fragment = DomNode::fragment();
        self.append_children(&fragment, &expanded.items())?;
        if let (Expanded::Single(_), 1) = (expanded, fragment.child_count()) {
            if let Some(only) = fragment.child(0) {
                only.remove();
                return Ok(only);
            }
        }
        Ok(fragment)
    }

    /// Build every child of a list and append it to `parent`.
    pub(crate) fn append_children(&self, parent: &DomNode, children: &[Child]) -> Result<(), RenderError> {
        let children = flat(children)?;
        for segment in segment(&children) {
            for node in self.build_segment(&children, &segment)? {
                parent.append_child(&node)?;
            }
        }
        Ok(())
    }

    /// Replace the whole content of `parent` with `children`.
    pub(crate) fn replace_children(&self, parent: &DomNode, children: &[Child]) -> Result<(), RenderError> {
        let fresh = DomNode::fragment();
        self.append_children(&fresh, children)?;
        for old in parent.children() {
            run_unmount_hooks(&old);
        }
        parent.clear_children();
        parent.append_child(&fresh)
    }

    pub(crate) fn build_segment(
        &self,
        children: &[Child],
        segment: &Segment,
    ) -> Result<Vec<DomNode>, RenderError> {
        match segment {
            Segment::Item(index) => match &children[*index] {
                Child::Node(node) => self.build_vnode(node),
                Child::Dynamic(dynamic) => Ok(vec![self.build_dynamic(dynamic)?]),
            },
            Segment::Branch(range) => self.build_branch(&group_nodes(children, range.clone())),
            Segment::Orphan(_) => Ok(Vec::new()),
        }
    }

    /// Build the document nodes for one view node. Lists and fragments may
    /// produce several.
    pub(crate) fn build_vnode(&self, node: &VNode) -> Result<Vec<DomNode>, RenderError> {
        if node.has_prop(ONCE) {
            let frozen = freeze(node)?;
            return self.build_vnode(&frozen);
        }
        match &node.kind {
            NodeType::Text(text) => Ok(vec![DomNode::text(text)]),
            NodeType::Fragment => match node.props.get(EACH) {
                Some(PropValue::Each(each)) => self.build_each(each),
                _ => match directive::catch_fallback(node) {
                    Some(fallback) => self.build_guarded(node.child_list(), fallback),
                    None => self.build_expanded(node),
                },
            },
            NodeType::Component(_) => self.build_expanded(node),
            NodeType::Tag(_) => Ok(vec![self.build_element(node)?]),
        }
    }

    fn build_expanded(&self, node: &VNode) -> Result<Vec<DomNode>, RenderError> {
        let items = expand(node)?.into_items();
        let mut out = Vec::with_capacity(items.len());
        for segment in segment(&items) {
            out.extend(self.build_segment(&items, &segment)?);
        }
        Ok(out)
    }

    /// Build deferred boundary content, or the fallback if it fails.
    fn build_guarded(&self, children: &[Child], fallback: &Fallback) -> Result<Vec<DomNode>, RenderError> {
        let fragment = DomNode::fragment();
        match self.append_children(&fragment, children) {
            Ok(()) => Ok(fragment.children()),
            Err(err) => {
                for partial in fragment.children() {
                    run_unmount_hooks(&partial);
                }
                tracing::warn!(error = %err, "rendering fallback");
                self.build_vnode(&fallback(&err))
            }
        }
    }

    pub(crate) fn build_element(&self, node: &VNode) -> Result<DomNode, RenderError> {
        let tag = node.tag().unwrap_or_default();
        let element = DomNode::element(tag);
        if let Some(key) = &node.key {
            element.set_attribute(&self.options.key_attribute, key);
        }
        if !directive::controls_content(node) {
            self.append_children(&element, node.child_list())?;
        }
        self.apply_props(&element, node, None)?;
        Ok(element)
    }

    /// An element standing in for content driven by its own computation.
    pub(crate) fn placeholder(&self, role: &str) -> DomNode {
        let element = DomNode::element(&self.options.placeholder_tag);
        element.set_attribute(ROLE_ATTRIBUTE, role);
        element
    }

    fn build_dynamic(&self, dynamic: &Dynamic) -> Result<DomNode, RenderError> {
        let wrapper = self.placeholder("dynamic");
        self.install_dynamic(&wrapper, dynamic.clone())?;
        Ok(wrapper)
    }

    /// Drive the content of `wrapper` from a dynamic leaf.
    pub(crate) fn install_dynamic(&self, wrapper: &DomNode, dynamic: Dynamic) -> Result<(), RenderError> {
        let renderer = self.clone();
        let target = wrapper.clone();
        let computation = try_create_effect(move || {
            let expanded = expand(&dynamic.call())?;
            renderer.fill(&target, &expanded.items())
        })?;
        register_unmount(wrapper, move || computation.dispose());
        Ok(())
    }

    /// Replace the content of a wrapper, by key when the items are keyed.
    fn fill(&self, wrapper: &DomNode, items: &[Child]) -> Result<(), RenderError> {
        if has_keys(items) {
            self.reconcile_keyed(wrapper, items)
        } else {
            self.replace_children(wrapper, items)
        }
    }

    fn build_branch(&self, group: &[&VNode]) -> Result<Vec<DomNode>, RenderError> {
        if !is_reactive_group(group.iter().copied()) {
            return match select_branch(group.iter().copied()) {
                Some(winner) => self.build_vnode(&branch_body(group[winner])),
                None => Ok(vec![DomNode::text("")]),
            };
        }

        let placeholder = self.placeholder("if");
        let nodes: Vec<VNode> = group.iter().map(|node| (*node).clone()).collect();
        let renderer = self.clone();
        let target = placeholder.clone();
        let computation = try_create_effect(move || {
            let body: Vec<Child> = select_branch(&nodes)
                .map(|winner| vec![Child::Node(branch_body(&nodes[winner]))])
                .unwrap_or_default();
            untrack(|| renderer.replace_children(&target, &body))
        })?;
        register_unmount(&placeholder, move || computation.dispose());
        Ok(vec![placeholder])
    }

    fn build_each(&self, each: &Each) -> Result<Vec<DomNode>, RenderError> {
        if !each.source.is_reactive() {
            let mut out = Vec::new();
            for (index, item) in resolve_list(&each.source).iter().enumerate() {
                out.extend(self.build_vnode(&(each.render)(item, index))?);
            }
            return Ok(out);
        }

        let placeholder = self.placeholder("each");
        let each = each.clone();
        let renderer = self.clone();
        let target = placeholder.clone();
        let computation = try_create_effect(move || {
            let items = resolve_list(&each.source);
            untrack(|| {
                let children: Vec<Child> = items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| Child::Node((each.render)(item, index)))
                    .collect();
                renderer.replace_children(&target, &children)
            })
        })?;
        register_unmount(&placeholder, move || computation.dispose());
        Ok(vec![placeholder])
    }
}

/// Whether any item of the list carries a key.
pub(crate) fn has_keys(children: &[Child]) -> bool {
    children
        .iter()
        .any(|child| child.as_node().is_some_and(|node| node.key.is_some()))
}

/// The list with fragments and components spliced in, borrowing when there
/// is nothing to splice.
fn flat(children: &[Child]) -> Result<Cow<'_, [Child]>, RenderError> {
    let needs_expansion = children.iter().any(|child| {
        child.as_node().is_some_and(|node| {
            matches!(node.kind, NodeType::Component(_) | NodeType::Fragment) && !directive::is_structural(node)
        })
    });
    if needs_expansion {
        Ok(Cow::Owned(flatten_children(children)?))
    } else {
        Ok(Cow::Borrowed(children))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
