//! Directives
//!
//! Directive properties start with `x-` and change how a node is rendered
//! rather than becoming attributes:
//!
//! | Property    | Effect                                                     |
//! |-------------|------------------------------------------------------------|
//! | `x-if`      | opens a branch group; renders if its condition is truthy  |
//! | `x-else-if` | continues the group; renders if no earlier branch won     |
//! | `x-else`    | closes the group; renders if no earlier branch won        |
//! | `x-each`    | renders an item factory for every element of a list       |
//! | `x-show`    | hides the node with `display: none` when falsy            |
//! | `x-text`    | replaces the content with text                            |
//! | `x-html`    | replaces the content with raw markup                      |
//! | `x-once`    | renders a snapshot with every reactive value read once    |
//!
//! Any other `x-` property is looked up in a [`DirectiveRegistry`]. Expansion
//! also sets the internal `x-catch` on fragments guarded by an error boundary.
//!
//! Both renderers share the helpers here, so the client and the server agree
//! on which branch of a group is rendered and on how values are read.

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::rc::Rc;

use crate::dom::DomNode;
use crate::error::RenderError;
use crate::reactive::untrack;
use crate::view::{expand, Child, Expanded, Fallback, NodeType, PropValue, VNode, Value, CHILDREN_PROP};

/// Prefix shared by every directive property.
pub const PREFIX: &str = "x-";

pub const IF: &str = "x-if";
pub const ELSE_IF: &str = "x-else-if";
pub const ELSE: &str = "x-else";
pub const EACH: &str = "x-each";
pub const SHOW: &str = "x-show";
pub const TEXT: &str = "x-text";
pub const HTML: &str = "x-html";
pub const ONCE: &str = "x-once";
/// Marks a fragment whose content renders later than the error boundary
/// that produced it. Carries the boundary's fallback.
pub const CATCH: &str = "x-catch";

/// Properties that place a node in a branch group.
pub const BRANCH: [&str; 3] = [IF, ELSE_IF, ELSE];

const STRUCTURAL: [&str; 4] = [IF, ELSE_IF, ELSE, ONCE];

/// Whether a property name is a directive.
pub fn is_directive(name: &str) -> bool {
    name.starts_with(PREFIX)
}

/// Whether the node carries a directive that decides if or how often it is
/// rendered. Such nodes are not expanded ahead of time, components
/// included.
pub fn is_structural(node: &VNode) -> bool {
    STRUCTURAL.iter().any(|name| node.has_prop(name))
        || (matches!(node.kind, NodeType::Fragment)
            && (matches!(node.props.get(EACH), Some(PropValue::Each(_))) || catch_fallback(node).is_some()))
}

/// The fallback guarding a deferred boundary fragment.
pub fn catch_fallback(node: &VNode) -> Option<&Fallback> {
    match node.props.get(CATCH) {
        Some(PropValue::Fallback(fallback)) if matches!(node.kind, NodeType::Fragment) => Some(fallback),
        _ => None,
    }
}

/// Whether any part of an expanded list renders later than the list
/// itself: a structural node or a dynamic leaf, at any depth.
pub fn has_deferred(children: &[Child]) -> bool {
    children.iter().any(|child| match child {
        Child::Dynamic(_) => true,
        Child::Node(node) => {
            is_structural(node)
                || matches!(node.kind, NodeType::Component(_))
                || (matches!(node.kind, NodeType::Tag(_)) && has_deferred(node.child_list()))
        }
    })
}

/// Whether the node replaces its content through `x-text` or `x-html`.
pub fn controls_content(node: &VNode) -> bool {
    node.has_prop(TEXT) || node.has_prop(HTML)
}

// ----------------------------------------------------------------------------
// Custom directives
// ----------------------------------------------------------------------------

type MountHook = Rc<dyn Fn(&DomNode, &Value)>;
type UnmountHook = Rc<dyn Fn(&DomNode)>;

/// Lifecycle hooks of a custom directive.
#[derive(Clone, Default)]
pub struct DirectiveHooks {
    /// Called once the element exists, with the directive's value.
    pub mount: Option<MountHook>,
    /// Called with the new value whenever a reactive value changes.
    pub update: Option<MountHook>,
    /// Called when the element leaves the document.
    pub unmount: Option<UnmountHook>,
}

impl DirectiveHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_mount<F>(mut self, f: F) -> Self
    where
        F: Fn(&DomNode, &Value) + 'static,
    {
        self.mount = Some(Rc::new(f));
        self
    }

    pub fn on_update<F>(mut self, f: F) -> Self
    where
        F: Fn(&DomNode, &Value) + 'static,
    {
        self.update = Some(Rc::new(f));
        self
    }

    pub fn on_unmount<F>(mut self, f: F) -> Self
    where
        F: Fn(&DomNode) + 'static,
    {
        self.unmount = Some(Rc::new(f));
        self
    }
}

impl fmt::Debug for DirectiveHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectiveHooks")
            .field("mount", &self.mount.is_some())
            .field("update", &self.update.is_some())
            .field("unmount", &self.unmount.is_some())
            .finish()
    }
}

/// Lookup of custom directives by property name.
pub trait DirectiveRegistry {
    /// Hooks registered under `name` (including the `x-` prefix).
    fn lookup(&self, name: &str) -> Option<DirectiveHooks>;
}

/// A table of custom directives.
#[derive(Debug, Clone, Default)]
pub struct Directives {
    table: HashMap<String, DirectiveHooks>,
}

impl Directives {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register hooks under `name`. The `x-` prefix is added when missing.
    pub fn register(&mut self, name: &str, hooks: DirectiveHooks) -> &mut Self {
        let name = if is_directive(name) {
            name.to_string()
        } else {
            format!("{PREFIX}{name}")
        };
        self.table.insert(name, hooks);
        self
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl DirectiveRegistry for Directives {
    fn lookup(&self, name: &str) -> Option<DirectiveHooks> {
        self.table.get(name).cloned()
    }
}

// ----------------------------------------------------------------------------
// Value getters
// ----------------------------------------------------------------------------

/// Truthiness of a branch condition.
pub fn resolve_condition(value: &PropValue) -> bool {
    value.read().is_truthy()
}

/// Whether an `x-show` node is visible.
pub fn resolve_visibility(value: &PropValue) -> bool {
    value.read().is_truthy()
}

/// Text of an `x-text` node.
pub fn resolve_text(value: &PropValue) -> String {
    value.read().to_text()
}

/// Markup of an `x-html` node.
pub fn resolve_markup(value: &PropValue) -> String {
    value.read().to_text()
}

/// Items of an `x-each` source. Anything but a list yields no items.
pub fn resolve_list(source: &PropValue) -> Rc<[Value]> {
    match source.read() {
        Value::List(items) => items,
        Value::Null => Rc::from(Vec::new()),
        other => {
            tracing::warn!(value = ?other, "list source is not a list");
            Rc::from(Vec::new())
        }
    }
}

// ----------------------------------------------------------------------------
// Branch groups
// ----------------------------------------------------------------------------

/// A unit of a children list, as both renderers walk it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A single child at this index.
    Item(usize),
    /// A branch group: an `x-if` and the `x-else-if`/`x-else` siblings that
    /// directly follow it.
    Branch(Range<usize>),
    /// An `x-else` without a preceding `x-if`. Renders nothing.
    Orphan(usize),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Role {
    If,
    ElseIf,
    Else,
}

fn role(child: &Child) -> Option<Role> {
    let node = child.as_node()?;
    if node.has_prop(IF) {
        Some(Role::If)
    } else if node.has_prop(ELSE_IF) {
        Some(Role::ElseIf)
    } else if node.has_prop(ELSE) {
        Some(Role::Else)
    } else {
        None
    }
}

/// The branch group currently open while walking a children list.
#[derive(Debug, Default)]
pub struct IfContext {
    open: Option<Range<usize>>,
}

impl IfContext {
    fn open(&mut self, index: usize, out: &mut Vec<Segment>) {
        self.close(out);
        self.open = Some(index..index + 1);
    }

    fn extend(&mut self, index: usize) -> bool {
        match &mut self.open {
            Some(range) => {
                range.end = index + 1;
                true
            }
            None => false,
        }
    }

    fn close(&mut self, out: &mut Vec<Segment>) {
        if let Some(range) = self.open.take() {
            out.push(Segment::Branch(range));
        }
    }
}

/// Split a children list into items and branch groups.
pub fn segment(children: &[Child]) -> Vec<Segment> {
    let mut out = Vec::with_capacity(children.len());
    let mut ctx = IfContext::default();

    for (index, child) in children.iter().enumerate() {
        match role(child) {
            Some(Role::If) => ctx.open(index, &mut out),
            Some(Role::ElseIf) => {
                if !ctx.extend(index) {
                    tracing::warn!(index, "x-else-if without a preceding x-if starts a new group");
                    ctx.open(index, &mut out);
                }
            }
            Some(Role::Else) => {
                if ctx.extend(index) {
                    ctx.close(&mut out);
                } else {
                    tracing::warn!(index, "x-else without a preceding x-if renders nothing");
                    out.push(Segment::Orphan(index));
                }
            }
            None => {
                ctx.close(&mut out);
                out.push(Segment::Item(index));
            }
        }
    }
    ctx.close(&mut out);
    out
}

/// Index of the winning branch of a group: the first whose condition holds,
/// or the `x-else` if none does.
pub fn select_branch<'a, I>(group: I) -> Option<usize>
where
    I: IntoIterator<Item = &'a VNode>,
{
    for (index, node) in group.into_iter().enumerate() {
        if let Some(condition) = node.props.get(IF).or_else(|| node.props.get(ELSE_IF)) {
            if resolve_condition(condition) {
                return Some(index);
            }
        } else if node.has_prop(ELSE) {
            return Some(index);
        }
    }
    None
}

/// Whether any condition of the group is reactive.
pub fn is_reactive_group<'a, I>(group: I) -> bool
where
    I: IntoIterator<Item = &'a VNode>,
{
    group.into_iter().any(|node| {
        BRANCH
            .iter()
            .filter_map(|name| node.props.get(*name))
            .any(PropValue::is_reactive)
    })
}

/// The node a winning branch renders: itself without its branch property.
pub fn branch_body(node: &VNode) -> VNode {
    node.without_props(&BRANCH)
}

/// The nodes of a branch group.
pub fn group_nodes(children: &[Child], range: Range<usize>) -> Vec<&VNode> {
    children[range].iter().filter_map(Child::as_node).collect()
}

// ----------------------------------------------------------------------------
// Snapshots
// ----------------------------------------------------------------------------

/// A copy of `node` with every reactive value read once.
///
/// Reactive properties become static, dynamic leaves are replaced by their
/// current node, list directives are unrolled, branch groups are resolved to
/// their winner and components are expanded. Nothing read while freezing
/// subscribes the running computation.
pub fn freeze(node: &VNode) -> Result<VNode, RenderError> {
    untrack(|| freeze_node(node))
}

fn freeze_node(node: &VNode) -> Result<VNode, RenderError> {
    if node.has_prop(ONCE) {
        return freeze_node(&node.without_props(&[ONCE]));
    }
    match &node.kind {
        NodeType::Text(_) => Ok(node.clone()),
        NodeType::Component(_) => match expand(node)? {
            Expanded::Single(single) if !is_structural(&single) => freeze_node(&single),
            expanded => Ok(VNode::fragment(freeze_children(&expanded.into_items())?)),
        },
        NodeType::Fragment => match node.props.get(EACH) {
            Some(PropValue::Each(each)) => {
                let items = resolve_list(&each.source);
                let mut children = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    children.push(Child::Node(freeze_node(&(each.render)(item, index))?));
                }
                Ok(VNode::fragment(children))
            }
            _ => match (catch_fallback(node), freeze_children(node.child_list())) {
                (_, Ok(children)) => Ok(VNode::fragment(children)),
                (Some(fallback), Err(err)) => {
                    tracing::warn!(error = %err, "rendering fallback");
                    freeze_node(&fallback(&err))
                }
                (None, Err(err)) => Err(err),
            },
        },
        NodeType::Tag(_) => {
            let mut frozen = node.without_props(&[CHILDREN_PROP]);
            for value in frozen.props.values_mut() {
                if let PropValue::Reactive(getter) = value {
                    *value = PropValue::Value(getter.get());
                }
            }
            let children = node.child_list();
            frozen.children = if children.is_empty() {
                None
            } else {
                Some(freeze_children(children)?)
            };
            Ok(frozen)
        }
    }
}

fn freeze_children(children: &[Child]) -> Result<Vec<Child>, RenderError> {
    let mut out = Vec::with_capacity(children.len());
    for segment in segment(children) {
        let node = match segment {
            Segment::Item(index) => match &children[index] {
                Child::Node(node) => freeze_node(node)?,
                Child::Dynamic(dynamic) => freeze_node(&dynamic.call())?,
            },
            Segment::Branch(range) => {
                let group = group_nodes(children, range);
                match select_branch(group.iter().copied()) {
                    Some(winner) => freeze_node(&branch_body(group[winner]))?,
                    None => VNode::text(""),
                }
            }
            Segment::Orphan(_) => continue,
        };
        out.push(Child::Node(node));
    }
    Ok(out)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{create_effect, create_signal, Signal};
    use crate::view::{dynamic, el, Component, Getter, Props};
    use rstest::rstest;

    fn kids(nodes: Vec<VNode>) -> Vec<Child> {
        nodes.into_iter().map(Child::Node).collect()
    }

    #[test]
    fn segments_group_if_chain() {
        let children = kids(vec![
            el("a"),
            el("b").when(true),
            el("c").else_when(false),
            el("d").otherwise(),
            el("e"),
        ]);

        assert_eq!(
            segment(&children),
            vec![Segment::Item(0), Segment::Branch(1..4), Segment::Item(4)]
        );
    }

    #[test]
    fn else_closes_the_group() {
        let children = kids(vec![el("a").when(false), el("b").otherwise(), el("c").otherwise()]);
        assert_eq!(
            segment(&children),
            vec![Segment::Branch(0..2), Segment::Orphan(2)]
        );
    }

    #[test]
    fn orphan_else_if_acts_as_if() {
        let children = kids(vec![el("a"), el("b").else_when(true)]);
        assert_eq!(
            segment(&children),
            vec![Segment::Item(0), Segment::Branch(1..2)]
        );
    }

    #[test]
    fn consecutive_ifs_are_separate_groups() {
        let children = kids(vec![el("a").when(true), el("b").when(true)]);
        assert_eq!(
            segment(&children),
            vec![Segment::Branch(0..1), Segment::Branch(1..2)]
        );
    }

    #[rstest]
    #[case(true, false, Some(0))]
    #[case(false, true, Some(1))]
    #[case(true, true, Some(0))]
    #[case(false, false, Some(2))]
    fn first_true_branch_wins(#[case] first: bool, #[case] second: bool, #[case] winner: Option<usize>) {
        let group = [
            el("a").when(first),
            el("b").else_when(second),
            el("c").otherwise(),
        ];
        assert_eq!(select_branch(&group), winner);
    }

    #[test]
    fn no_branch_wins_without_else() {
        let group = [el("a").when(false), el("b").else_when(0)];
        assert_eq!(select_branch(&group), None);
    }

    #[test]
    fn reactive_condition_marks_the_group() {
        let signal = Signal::new(true);
        let group = [el("a").when(false), el("b").else_when(Getter::from(signal))];
        assert!(is_reactive_group(&group));
        assert!(!is_reactive_group(&[el("a").when(true)]));
    }

    #[rstest]
    #[case(Value::from(vec![1, 2]), 2)]
    #[case(Value::Null, 0)]
    #[case(Value::from("nope"), 0)]
    fn list_source_items(#[case] source: Value, #[case] expected: usize) {
        assert_eq!(resolve_list(&PropValue::Value(source)).len(), expected);
    }

    #[test]
    fn registry_adds_prefix() {
        let mut directives = Directives::new();
        directives.register("focus", DirectiveHooks::new());
        assert!(directives.lookup("x-focus").is_some());
        assert!(directives.lookup("focus").is_none());
    }

    #[test]
    fn freeze_resolves_reactive_values_without_subscribing() {
        let (label, set_label) = create_signal("first".to_string());
        let frozen = Rc::new(std::cell::RefCell::new(None));

        let l = label.clone();
        let f = frozen.clone();
        let effect = create_effect(move || {
            let l2 = l.clone();
            let tree = el("p")
                .attr("title", Getter::from(l.clone()))
                .child(dynamic(move || VNode::text(l2.get())))
                .once();
            *f.borrow_mut() = Some(freeze(&tree).unwrap());
        });

        assert_eq!(effect.dependency_count(), 0);
        set_label.set("second".into());

        let frozen = frozen.borrow();
        let node = frozen.as_ref().unwrap();
        assert!(!node.has_prop(ONCE));
        assert_eq!(node.props["title"].read(), Value::from("first"));
        assert!(matches!(
            node.child_list()[0].as_node().and_then(VNode::text_content),
            Some("first")
        ));
    }

    #[test]
    fn freeze_unrolls_lists() {
        let list = VNode::each(vec!["x", "y"], |item, index| {
            VNode::text(format!("{index}:{}", item.to_text()))
        });
        let frozen = freeze(&list).unwrap();

        assert!(!frozen.has_prop(EACH));
        let texts: Vec<_> = frozen
            .child_list()
            .iter()
            .filter_map(|child| child.as_node()?.text_content().map(str::to_string))
            .collect();
        assert_eq!(texts, ["0:x", "1:y"]);
    }

    #[test]
    fn branch_props_make_components_structural() {
        let banner = Component::new("Banner", |_: &Props| Ok(el("b")));
        assert!(is_structural(&VNode::component(banner.clone()).when(false)));
        assert!(is_structural(&VNode::component(banner.clone()).once()));
        assert!(!is_structural(&VNode::component(banner)));
    }

    #[test]
    fn freeze_keeps_only_the_winning_branch() {
        let calls = Rc::new(std::cell::Cell::new(0));
        let c = calls.clone();
        let banner = Component::new("Banner", move |_: &Props| {
            c.set(c.get() + 1);
            Ok(el("b"))
        });
        let tree = el("div")
            .children([VNode::component(banner).when(false), el("p").otherwise()])
            .once();

        let frozen = freeze(&tree).unwrap();
        let children = frozen.child_list();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].as_node().and_then(VNode::tag), Some("p"));
        assert!(!children[0].as_node().unwrap().has_prop(ELSE));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn deferred_content_is_found_at_any_depth() {
        let eager = kids(vec![el("div").child(el("p").child("x"))]);
        let nested_branch = kids(vec![el("div").child(el("p").when(true))]);
        let leaf = kids(vec![el("div").child(dynamic(|| VNode::text("x")))]);

        assert!(!has_deferred(&eager));
        assert!(has_deferred(&nested_branch));
        assert!(has_deferred(&leaf));
    }
}
