//! Unmount Registry
//!
//! Teardown procedures associated with document nodes: disposers of the
//! computations driving a node, custom directive `unmount` hooks and the
//! like. The association lives beside the document, keyed by node identity,
//! and is forgotten when a node is freed.
//!
//! Every path that removes a node from the live document runs
//! [`run_unmount_hooks`] on it first.
//!
//! Custom directives are tracked separately, by name, so that patching an
//! element can release the computations of the previous render while its
//! directives stay mounted.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::reactive::Cleanup;

use super::{DomNode, NodeId};

type DirectiveUnmount = Rc<dyn Fn(&DomNode)>;

thread_local! {
    static HOOKS: RefCell<HashMap<NodeId, Vec<Cleanup>>> = RefCell::new(HashMap::new());
    static DIRECTIVES: RefCell<HashMap<NodeId, HashMap<String, Option<DirectiveUnmount>>>> =
        RefCell::new(HashMap::new());
}

/// Register a procedure to run when `node` leaves the document.
pub fn register_unmount<F>(node: &DomNode, f: F)
where
    F: FnOnce() + 'static,
{
    HOOKS.with(|hooks| {
        hooks
            .borrow_mut()
            .entry(node.id())
            .or_default()
            .push(Cleanup::new(f));
    });
}

/// Run the hooks of every node in the subtree, children before parents.
/// Each hook runs at most once.
pub fn run_unmount_hooks(node: &DomNode) {
    for child in node.children() {
        run_unmount_hooks(&child);
    }
    run_own_unmount_hooks(node);
}

/// Run only the hooks registered directly on `node`, directives included.
pub fn run_own_unmount_hooks(node: &DomNode) {
    release_bindings(node);
    let directives = DIRECTIVES.with(|table| table.borrow_mut().remove(&node.id()));
    for hook in directives.into_iter().flat_map(HashMap::into_values).flatten() {
        hook(node);
    }
}

/// Run the procedures registered on `node` with [`register_unmount`],
/// leaving its mounted directives alone.
pub(crate) fn release_bindings(node: &DomNode) {
    let hooks = HOOKS.with(|hooks| hooks.borrow_mut().remove(&node.id()));
    for hook in hooks.into_iter().flatten() {
        hook.run();
    }
}

/// Record that the directive `name` is mounted on `node`, with the hook to
/// run when the node leaves the document. Returns whether it was already
/// mounted.
pub(crate) fn mount_directive(node: &DomNode, name: &str, unmount: Option<DirectiveUnmount>) -> bool {
    DIRECTIVES.with(|table| {
        table
            .borrow_mut()
            .entry(node.id())
            .or_default()
            .insert(name.to_string(), unmount)
            .is_some()
    })
}

/// Unmount a single directive that `node` no longer carries.
pub(crate) fn unmount_directive(node: &DomNode, name: &str) {
    let hook = DIRECTIVES.with(|table| {
        let mut table = table.borrow_mut();
        let entry = table.get_mut(&node.id())?;
        let hook = entry.remove(name);
        if entry.is_empty() {
            table.remove(&node.id());
        }
        hook
    });
    if let Some(Some(hook)) = hook {
        hook(node);
    }
}

/// Number of hooks waiting on `node`.
pub fn unmount_hook_count(node: &DomNode) -> usize {
    HOOKS.with(|hooks| hooks.borrow().get(&node.id()).map_or(0, Vec::len))
}

pub(crate) fn forget(id: NodeId) {
    // The removed hooks may own other nodes, so drop them outside the borrow.
    let removed = HOOKS
        .try_with(|hooks| hooks.try_borrow_mut().ok().and_then(|mut hooks| hooks.remove(&id)))
        .ok()
        .flatten();
    drop(removed);
    let directives = DIRECTIVES
        .try_with(|table| table.try_borrow_mut().ok().and_then(|mut table| table.remove(&id)))
        .ok()
        .flatten();
    drop(directives);
}
