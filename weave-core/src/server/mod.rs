//! Server Stringifier
//!
//! Renders a view to an HTML string in one pass. Nothing is reactive here:
//! every reactive value and dynamic leaf is read exactly once, and no
//! computation is created.
//!
//! The stringifier shares expansion, branch selection and value reading
//! with the client renderer, so a tree renders the same content on both
//! sides: the same branch wins, lists produce the same items, and reserved
//! or directive properties never leak into attributes.

use crate::config::RenderOptions;
use crate::directive::{
    self, branch_body, group_nodes, resolve_list, resolve_markup, resolve_text,
    resolve_visibility, segment, select_branch, Segment, EACH, HTML, ONCE, SHOW, TEXT,
};
use crate::error::RenderError;
use crate::html::{escape_attr, escape_text, is_void_element, parse_style, serialize_style};
use crate::reactive::untrack;
use crate::view::{
    expand, Child, Fallback, NodeType, PropValue, VNode, Value, CHILDREN_PROP, EVENT_PREFIX,
};

/// Properties that never become attributes.
const RESERVED: [&str; 3] = [CHILDREN_PROP, "key", "ref"];

/// Renders views to HTML.
#[derive(Debug, Clone, Default)]
pub struct Stringifier {
    options: RenderOptions,
}

impl Stringifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: RenderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Render `node` to a string.
    pub fn stringify(&self, node: &VNode) -> Result<String, RenderError> {
        tracing::debug!("stringifying view");
        untrack(|| {
            let mut out = String::new();
            self.write_vnode(node, &mut out)?;
            Ok(out)
        })
    }

    /// Render `node` lazily, one top-level item per chunk.
    ///
    /// The tree is expanded up front; each item is stringified only when
    /// its chunk is requested.
    pub fn chunks(&self, node: &VNode) -> Result<Chunks<'_>, RenderError> {
        let items = untrack(|| expand(node))?.into_items();
        let segments = segment(&items).into_iter();
        Ok(Chunks {
            stringifier: self,
            items,
            segments,
        })
    }

    /// Expand, then write.
    fn write_vnode(&self, node: &VNode, out: &mut String) -> Result<(), RenderError> {
        let items = expand(node)?.into_items();
        self.write_list(&items, out)
    }

    /// Write an expanded children list.
    fn write_list(&self, items: &[Child], out: &mut String) -> Result<(), RenderError> {
        for segment in segment(items) {
            self.write_segment(items, &segment, out)?;
        }
        Ok(())
    }

    fn write_segment(&self, items: &[Child], segment: &Segment, out: &mut String) -> Result<(), RenderError> {
        match segment {
            Segment::Item(index) => match &items[*index] {
                Child::Node(node) => self.write_node(node, out),
                Child::Dynamic(dynamic) => self.write_vnode(&dynamic.call(), out),
            },
            Segment::Branch(range) => {
                let group = group_nodes(items, range.clone());
                match select_branch(group.iter().copied()) {
                    Some(winner) => self.write_vnode(&branch_body(group[winner]), out),
                    None => Ok(()),
                }
            }
            Segment::Orphan(_) => Ok(()),
        }
    }

    /// Write an expanded node.
    fn write_node(&self, node: &VNode, out: &mut String) -> Result<(), RenderError> {
        if node.has_prop(ONCE) {
            return self.write_vnode(&node.without_props(&[ONCE]), out);
        }
        match &node.kind {
            NodeType::Text(text) => {
                out.push_str(&escape_text(text));
                Ok(())
            }
            NodeType::Fragment => match node.props.get(EACH) {
                Some(PropValue::Each(each)) => {
                    for (index, item) in resolve_list(&each.source).iter().enumerate() {
                        self.write_vnode(&(each.render)(item, index), out)?;
                    }
                    Ok(())
                }
                _ => match directive::catch_fallback(node) {
                    Some(fallback) => self.write_guarded(node.child_list(), fallback, out),
                    None => self.write_vnode(node, out),
                },
            },
            NodeType::Component(_) => self.write_vnode(node, out),
            NodeType::Tag(tag) => self.write_element(tag, node, out),
        }
    }

    /// Write deferred boundary content, or the fallback if it fails.
    fn write_guarded(&self, items: &[Child], fallback: &Fallback, out: &mut String) -> Result<(), RenderError> {
        let mut buffer = String::new();
        match self.write_list(items, &mut buffer) {
            Ok(()) => {
                out.push_str(&buffer);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "rendering fallback");
                self.write_vnode(&fallback(&err), out)
            }
        }
    }

    fn write_element(&self, tag: &str, node: &VNode, out: &mut String) -> Result<(), RenderError> {
        out.push('<');
        out.push_str(tag);
        if let Some(key) = &node.key {
            write_attribute(out, &self.options.key_attribute, key);
        }

        let mut style = None;
        let mut hidden = false;
        for (name, value) in &node.props {
            let name = name.as_str();
            if !matches!(value, PropValue::Value(_) | PropValue::Reactive(_))
                || RESERVED.contains(&name)
                || name.starts_with(EVENT_PREFIX)
            {
                continue;
            }
            if directive::is_directive(name) {
                if name == SHOW {
                    hidden = !resolve_visibility(value);
                }
                continue;
            }
            if name == "style" {
                style = Some(value.read().to_text());
                continue;
            }
            match value.read() {
                Value::Null | Value::Bool(false) => {}
                Value::Bool(true) => write_attribute(out, name, ""),
                other => write_attribute(out, name, &other.to_text()),
            }
        }

        let mut declarations = style.as_deref().map(parse_style).unwrap_or_default();
        if hidden {
            declarations.insert("display".to_string(), "none".to_string());
        }
        if !declarations.is_empty() {
            write_attribute(out, "style", &serialize_style(&declarations));
        }
        out.push('>');

        if is_void_element(tag) {
            return Ok(());
        }
        if let Some(text) = node.props.get(TEXT) {
            out.push_str(&escape_text(&resolve_text(text)));
        } else if let Some(markup) = node.props.get(HTML) {
            let markup = resolve_markup(markup);
            if self.options.escape_raw_html {
                out.push_str(&escape_text(&markup));
            } else {
                out.push_str(&markup);
            }
        } else {
            self.write_list(node.child_list(), out)?;
        }

        out.push_str("</");
        out.push_str(tag);
        out.push('>');
        Ok(())
    }
}

fn write_attribute(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&escape_attr(value));
    out.push('"');
}

/// Lazily stringified top-level items. See [`Stringifier::chunks`].
pub struct Chunks<'a> {
    stringifier: &'a Stringifier,
    items: Vec<Child>,
    segments: std::vec::IntoIter<Segment>,
}

impl Iterator for Chunks<'_> {
    type Item = Result<String, RenderError>;

    fn next(&mut self) -> Option<Self::Item> {
        let segment = self.segments.next()?;
        let mut out = String::new();
        let result = untrack(|| self.stringifier.write_segment(&self.items, &segment, &mut out));
        Some(result.map(|()| out))
    }
}

/// Render `node` to a string with the default options.
pub fn stringify(node: &VNode) -> Result<String, RenderError> {
    Stringifier::default().stringify(node)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;
    use crate::view::{dynamic, el, error_boundary, fragment, Component, Getter, Props};
    use rstest::rstest;

    #[test]
    fn element_with_attributes_and_text() {
        let html = stringify(
            &el("a")
                .attr("href", "/x?a=1&b=\"2\"")
                .attr("hidden", true)
                .attr("title", Value::Null)
                .child("1 < 2"),
        )
        .unwrap();
        assert_eq!(
            html,
            "<a href=\"/x?a=1&amp;b=&quot;2&quot;\" hidden=\"\">1 &lt; 2</a>"
        );
    }

    #[rstest]
    #[case(el("br"), "<br>")]
    #[case(el("img").attr("src", "a.png"), "<img src=\"a.png\">")]
    #[case(el("div"), "<div></div>")]
    fn void_elements(#[case] node: VNode, #[case] expected: &str) {
        assert_eq!(stringify(&node).unwrap(), expected);
    }

    #[test]
    fn reserved_and_directive_props_are_not_attributes() {
        let html = stringify(
            &el("div")
                .key("k")
                .attr("x-custom", "v")
                .on("click", |_| {})
                .prop(CHILDREN_PROP, PropValue::Children(vec!["c".into()])),
        )
        .unwrap();
        assert_eq!(html, "<div data-key=\"k\">c</div>");
    }

    #[test]
    fn show_merges_into_style() {
        let html = stringify(&el("p").attr("style", "color: red").show(false)).unwrap();
        assert_eq!(html, "<p style=\"color: red; display: none\"></p>");
    }

    #[test]
    fn reactive_values_are_read_once() {
        let count = Signal::new(3);
        let c = count.clone();
        let html = stringify(
            &el("p")
                .attr("data-n", Getter::from(count.clone()))
                .child(dynamic(move || VNode::text(c.get().to_string()))),
        )
        .unwrap();
        assert_eq!(html, "<p data-n=\"3\">3</p>");
        assert_eq!(count.subscriber_count(), 0);
    }

    #[rstest]
    #[case(false, "<div><b>x</b></div>")]
    #[case(true, "<div>&lt;b&gt;x&lt;/b&gt;</div>")]
    fn raw_markup_escaping_follows_options(#[case] escape: bool, #[case] expected: &str) {
        let stringifier = Stringifier::with_options(RenderOptions::new().escape_raw_html(escape));
        let html = stringifier.stringify(&el("div").html("<b>x</b>")).unwrap();
        assert_eq!(html, expected);
    }

    #[test]
    fn text_directive_is_escaped() {
        let html = stringify(&el("p").text_binding("<i>").child("ignored")).unwrap();
        assert_eq!(html, "<p>&lt;i&gt;</p>");
    }

    #[test]
    fn boundary_fallback_replaces_failing_subtree() {
        let broken = Component::new("Broken", |_: &Props| {
            Err::<VNode, _>(RenderError::component("Broken", "down"))
        });
        let html = stringify(&el("main").child(error_boundary(
            |err| el("p").child(format!("error: {}", err.message())),
            vec![VNode::component(broken).into()],
        )))
        .unwrap();
        assert_eq!(html, "<main><p>error: down</p></main>");
    }

    #[test]
    fn chunks_yield_top_level_items() {
        let tree = fragment([el("h1").child("title"), el("p").when(false), el("p").otherwise()]);
        let chunks: Vec<String> = Stringifier::new()
            .chunks(&tree)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(chunks, ["<h1>title</h1>", "<p></p>"]);
    }
}
