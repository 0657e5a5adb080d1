//! Property application.
//!
//! Plain properties become attributes, `on:` properties become listeners,
//! `ref` receives the element, and directive properties are handled by
//! their directive. A reactive value gets its own computation that
//! re-applies just that property.

use std::cell::Cell;
use std::rc::Rc;

use crate::directive::{
    self, resolve_markup, resolve_text, resolve_visibility, DirectiveHooks, HTML, SHOW, TEXT,
};
use crate::dom::unmount::{mount_directive, register_unmount, run_unmount_hooks, unmount_directive};
use crate::dom::DomNode;
use crate::error::RenderError;
use crate::reactive::try_create_effect;
use crate::view::{PropValue, VNode, Value, CHILDREN_PROP, EVENT_PREFIX};

use super::ClientRenderer;

/// Properties that are never applied to the element.
const RESERVED: [&str; 3] = [CHILDREN_PROP, "key", "ref"];

impl ClientRenderer {
    /// Apply the properties of `node` to `element`. When patching, `old` is
    /// the node the element was built from; anything it set that `node` no
    /// longer does is removed.
    pub(crate) fn apply_props(
        &self,
        element: &DomNode,
        node: &VNode,
        old: Option<&VNode>,
    ) -> Result<(), RenderError> {
        if let Some(old) = old {
            remove_stale(element, old, node);
        }

        for (name, value) in &node.props {
            let name = name.as_str();
            match value {
                PropValue::Ref(node_ref) => {
                    node_ref.set(element);
                    continue;
                }
                PropValue::Children(_)
                | PropValue::Each(_)
                | PropValue::Fallback(_)
                | PropValue::Data(_) => continue,
                _ => {}
            }
            if RESERVED.contains(&name) {
                continue;
            }
            if let Some(event) = name.strip_prefix(EVENT_PREFIX) {
                if let PropValue::Handler(handler) = value {
                    element.add_event_listener(event, handler.clone());
                }
                continue;
            }
            if directive::is_directive(name) {
                self.apply_directive(element, name, value)?;
                continue;
            }
            let attribute = name.to_string();
            bind(element, value, move |element, value| {
                set_attribute_value(element, &attribute, &value.read());
                Ok(())
            })?;
        }
        Ok(())
    }

    fn apply_directive(
        &self,
        element: &DomNode,
        name: &str,
        value: &PropValue,
    ) -> Result<(), RenderError> {
        match name {
            SHOW => bind(element, value, |element, value| {
                if resolve_visibility(value) {
                    element.remove_style("display");
                } else {
                    element.set_style("display", "none");
                }
                Ok(())
            }),
            TEXT => bind(element, value, |element, value| {
                unmount_children(element);
                element.set_text_content(&resolve_text(value))
            }),
            HTML => bind(element, value, |element, value| {
                unmount_children(element);
                element.set_inner_html(&resolve_markup(value))
            }),
            _ if directive::BRANCH.contains(&name)
                || name == directive::EACH
                || name == directive::ONCE =>
            {
                Ok(())
            }
            _ => match self.directives.lookup(name) {
                Some(hooks) => apply_custom(element, name, value, hooks),
                None => {
                    tracing::warn!(directive = name, "unknown directive ignored");
                    Ok(())
                }
            },
        }
    }
}

/// Apply `value` now, or inside a computation when it is reactive.
fn bind<F>(element: &DomNode, value: &PropValue, apply: F) -> Result<(), RenderError>
where
    F: Fn(&DomNode, &PropValue) -> Result<(), RenderError> + 'static,
{
    if !value.is_reactive() {
        return apply(element, value);
    }
    let target = element.clone();
    let value = value.clone();
    let computation = try_create_effect(move || apply(&target, &value))?;
    register_unmount(element, move || computation.dispose());
    Ok(())
}

/// Mount a custom directive, or update it when the element already carries
/// it from a previous render.
fn apply_custom(
    element: &DomNode,
    name: &str,
    value: &PropValue,
    hooks: DirectiveHooks,
) -> Result<(), RenderError> {
    let DirectiveHooks {
        mount,
        update,
        unmount,
    } = hooks;
    let mounted = Rc::new(Cell::new(mount_directive(element, name, unmount)));

    bind(element, value, move |element, value| {
        let current = value.read();
        let hook = if mounted.replace(true) { &update } else { &mount };
        if let Some(hook) = hook {
            hook(element, &current);
        }
        Ok(())
    })
}

/// Set an attribute from a value: `null` and `false` remove it, `true`
/// sets it empty.
pub(crate) fn set_attribute_value(element: &DomNode, name: &str, value: &Value) {
    match value {
        Value::Null | Value::Bool(false) => element.remove_attribute(name),
        Value::Bool(true) => element.set_attribute(name, ""),
        other => element.set_attribute(name, &other.to_text()),
    }
}

fn unmount_children(element: &DomNode) {
    for child in element.children() {
        run_unmount_hooks(&child);
    }
}

/// Undo what `old` applied and `new` no longer mentions, unmounting custom
/// directives that were dropped.
fn remove_stale(element: &DomNode, old: &VNode, new: &VNode) {
    for (name, value) in &old.props {
        if new.props.contains_key(name) || RESERVED.contains(&name.as_str()) {
            continue;
        }
        if let Some(event) = name.strip_prefix(EVENT_PREFIX) {
            element.remove_event_listener(event);
        } else if name == SHOW {
            element.remove_style("display");
        } else if directive::is_directive(name) {
            unmount_directive(element, name);
        } else if matches!(value, PropValue::Value(_) | PropValue::Reactive(_)) {
            element.remove_attribute(name);
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::Directives;
    use crate::dom::NodeRef;
    use crate::reactive::{create_signal, microtask, Signal};
    use crate::view::{el, Getter};
    use std::cell::RefCell;

    fn apply(node: &VNode) -> DomNode {
        let element = DomNode::element(node.tag().unwrap());
        ClientRenderer::default()
            .apply_props(&element, node, None)
            .unwrap();
        element
    }

    #[test]
    fn plain_values_become_attributes() {
        let element = apply(
            &el("input")
                .attr("type", "checkbox")
                .attr("checked", true)
                .attr("disabled", false)
                .attr("size", 3),
        );
        assert_eq!(element.outer_html(), "<input type=\"checkbox\" checked=\"\" size=\"3\">");
    }

    #[test]
    fn reserved_props_are_skipped() {
        let node_ref = NodeRef::new();
        let element = apply(&el("div").attr("key", "k").prop("ref", node_ref.clone()));
        assert!(element.attribute_names().is_empty());
        assert!(node_ref.get().unwrap().ptr_eq(&element));
    }

    #[test]
    fn reactive_attribute_updates_in_place() {
        let (class, set_class) = create_signal("a".to_string());
        let element = apply(&el("div").attr("class", Getter::from(class)));
        assert_eq!(element.get_attribute("class").as_deref(), Some("a"));

        set_class.set("b".into());
        microtask::turn();
        assert_eq!(element.get_attribute("class").as_deref(), Some("b"));
    }

    #[test]
    fn handlers_are_attached() {
        let clicked = Rc::new(Cell::new(false));
        let c = clicked.clone();
        let element = apply(&el("button").on("click", move |_| c.set(true)));

        element.dispatch("click", None);
        assert!(clicked.get());
    }

    #[test]
    fn show_false_hides_without_removing() {
        let element = apply(&el("p").show(false));
        assert_eq!(element.style("display").as_deref(), Some("none"));

        let visible = Signal::new(false);
        let element = apply(&el("p").show(Getter::from(visible.clone())));
        visible.set(true);
        microtask::turn();
        assert_eq!(element.style("display"), None);
    }

    #[test]
    fn text_and_html_replace_content() {
        let element = apply(&el("p").text_binding("<b>"));
        assert_eq!(element.inner_html(), "&lt;b&gt;");

        let element = apply(&el("p").html("<b>x</b>"));
        assert_eq!(element.inner_html(), "<b>x</b>");
    }

    #[test]
    fn custom_directive_lifecycle() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut directives = Directives::new();
        let (m, u, x) = (log.clone(), log.clone(), log.clone());
        directives.register(
            "tooltip",
            DirectiveHooks::new()
                .on_mount(move |_, value| m.borrow_mut().push(format!("mount {}", value.to_text())))
                .on_update(move |_, value| u.borrow_mut().push(format!("update {}", value.to_text())))
                .on_unmount(move |_| x.borrow_mut().push("unmount".to_string())),
        );
        let renderer = ClientRenderer::default().with_directives(directives);

        let (tip, set_tip) = create_signal("one".to_string());
        let element = DomNode::element("div");
        renderer
            .apply_props(&element, &el("div").prop("x-tooltip", Getter::from(tip)), None)
            .unwrap();

        set_tip.set("two".into());
        microtask::turn();
        run_unmount_hooks(&element);

        assert_eq!(*log.borrow(), ["mount one", "update two", "unmount"]);
    }

    #[test]
    fn custom_directive_updates_across_patches() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut directives = Directives::new();
        let (m, u, x) = (log.clone(), log.clone(), log.clone());
        directives.register(
            "tooltip",
            DirectiveHooks::new()
                .on_mount(move |_, value| m.borrow_mut().push(format!("mount {}", value.to_text())))
                .on_update(move |_, value| u.borrow_mut().push(format!("update {}", value.to_text())))
                .on_unmount(move |_| x.borrow_mut().push("unmount".to_string())),
        );
        let renderer = ClientRenderer::default().with_directives(directives);

        let first = el("div").prop("x-tooltip", "one");
        let second = el("div").prop("x-tooltip", "two");
        let third = el("div");
        let element = DomNode::element("div");
        renderer.apply_props(&element, &first, None).unwrap();
        renderer.patch_node(&element, &first, &second).unwrap();
        renderer.patch_node(&element, &second, &third).unwrap();

        assert_eq!(*log.borrow(), ["mount one", "update two", "unmount"]);
    }

    #[test]
    fn stale_attributes_and_listeners_are_removed() {
        let old = el("a").attr("href", "/x").attr("title", "t").on("click", |_| {});
        let new = el("a").attr("href", "/y");
        let element = apply(&old);

        ClientRenderer::default()
            .apply_props(&element, &new, Some(&old))
            .unwrap();

        assert_eq!(element.get_attribute("href").as_deref(), Some("/y"));
        assert!(!element.has_attribute("title"));
        assert!(!element.has_listener("click"));
    }
}
