//! Server stringifier tests.

use rstest::rstest;
use weave_core::config::RenderOptions;
use weave_core::reactive::{create_signal, Signal};
use weave_core::server::{stringify, Stringifier};
use weave_core::view::{
    dynamic, el, error_boundary, fragment, Child, Component, Getter, Props, VNode, Value,
};
use weave_core::RenderError;

fn indexed_list(source: Value) -> VNode {
    el("ul").child(VNode::each(source, |item, index| {
        VNode::text(format!("{index}:{}", item.to_text()))
    }))
}

#[test]
fn each_renders_index_and_item() {
    let html = stringify(&indexed_list(Value::from(vec!["x", "y"]))).unwrap();
    assert!(html.contains("0:x"));
    assert!(html.contains("1:y"));
    assert_eq!(html, "<ul>0:x1:y</ul>");
}

#[rstest]
#[case(Value::from(Vec::<&str>::new()))]
#[case(Value::Null)]
#[case(Value::from("not a list"))]
fn empty_or_invalid_source_renders_no_items(#[case] source: Value) {
    let html = stringify(&indexed_list(source)).unwrap();
    assert_eq!(html, "<ul></ul>");
    assert!(!html.contains("undefined"));
    assert!(!html.contains(':'));
}

#[test]
fn reactive_list_source_is_read_once() {
    let (items, _set_items) = create_signal(Value::from(vec!["a", "b"]));
    let html = stringify(&el("ol").child(VNode::each(items, |item, _| {
        el("li").child(item.to_text())
    })))
    .unwrap();
    assert_eq!(html, "<ol><li>a</li><li>b</li></ol>");
}

#[rstest]
#[case(true, false, "<i>a</i>")]
#[case(false, true, "<i>b</i>")]
#[case(false, false, "<i>c</i>")]
fn branch_group_renders_one_winner(#[case] first: bool, #[case] second: bool, #[case] expected: &str) {
    let html = stringify(&el("div").children([
        el("i").when(first).child("a"),
        el("i").else_when(second).child("b"),
        el("i").otherwise().child("c"),
    ]))
    .unwrap();
    assert_eq!(html, format!("<div>{expected}</div>"));
}

#[test]
fn branch_without_else_may_render_nothing() {
    let html = stringify(&el("div").child(el("i").when(false))).unwrap();
    assert_eq!(html, "<div></div>");
}

#[test]
fn losing_branch_components_are_never_invoked() {
    let broken = Component::new("Broken", |_: &Props| {
        Err::<VNode, _>(RenderError::component("Broken", "must not run"))
    });
    let html = stringify(&el("div").children([
        el("p").when(false).child(VNode::component(broken)),
        el("p").otherwise().child("ok"),
    ]))
    .unwrap();
    assert_eq!(html, "<div><p>ok</p></div>");
}

#[test]
fn show_false_hides_content_without_removing_it() {
    let html = stringify(&el("section").show(false).child(el("p").child("kept"))).unwrap();
    assert_eq!(html, "<section style=\"display: none\"><p>kept</p></section>");
}

#[test]
fn text_is_escaped() {
    let html = stringify(&el("p").attr("title", "a\"b").child("<script>&")).unwrap();
    assert_eq!(html, "<p title=\"a&quot;b\">&lt;script&gt;&amp;</p>");
}

#[test]
fn components_render_and_failures_propagate() {
    let greeting = Component::new("Greeting", |props: &Props| {
        let name = props.get("name").map(|p| p.read().to_text()).unwrap_or_default();
        Ok(el("h1").child(format!("Hello, {name}")))
    });
    let html = stringify(&VNode::component(greeting).prop("name", "Ada")).unwrap();
    assert_eq!(html, "<h1>Hello, Ada</h1>");

    let broken = Component::new("Broken", |_: &Props| {
        Err::<VNode, _>(RenderError::component("Broken", "down"))
    });
    let err = stringify(&el("div").child(VNode::component(broken))).unwrap_err();
    assert_eq!(err, RenderError::component("Broken", "down"));
}

#[test]
fn boundary_isolates_failure() {
    let broken = Component::new("Broken", |_: &Props| {
        Err::<VNode, _>(RenderError::component("Broken", "down"))
    });
    let html = stringify(&fragment([
        el("header"),
        error_boundary(
            |_| el("p").child("fallback"),
            vec![VNode::component(broken).into()],
        ),
        el("footer"),
    ]))
    .unwrap();
    assert_eq!(html, "<header></header><p>fallback</p><footer></footer>");
}

fn broken() -> Component {
    Component::new("Broken", |_: &Props| {
        Err::<VNode, _>(RenderError::component("Broken", "down"))
    })
}

/// Content that renders after the boundary around it has been expanded.
fn deferred(kind: &str) -> Child {
    let component = broken();
    match kind {
        "branch" => el("div").when(true).child(VNode::component(component)).into(),
        "dynamic" => dynamic(move || VNode::component(component.clone())),
        "once" => el("div").child(VNode::component(component)).once().into(),
        "each" => VNode::each(vec!["x"], move |_, _| VNode::component(component.clone())).into(),
        other => panic!("unknown content kind {other}"),
    }
}

#[rstest]
#[case("branch")]
#[case("dynamic")]
#[case("once")]
#[case("each")]
fn boundary_covers_deferred_content(#[case] kind: &str) {
    let html = stringify(&fragment([
        el("header"),
        error_boundary(|err| el("p").child(err.message()), vec![deferred(kind)]),
    ]))
    .unwrap();
    assert_eq!(html, "<header></header><p>down</p>");
}

#[test]
fn deferred_content_renders_when_it_succeeds() {
    let html = stringify(&error_boundary(
        |_| el("p").child("fallback"),
        vec![el("div").when(true).child("fine").into()],
    ))
    .unwrap();
    assert_eq!(html, "<div>fine</div>");
}

#[rstest]
#[case(true, "<div><b>banner</b></div>")]
#[case(false, "<div><p>else</p></div>")]
fn component_branch_joins_its_group(#[case] shown: bool, #[case] expected: &str) {
    let banner = Component::new("Banner", |_: &Props| Ok(el("b").child("banner")));
    let html = stringify(&el("div").children([
        VNode::component(banner).when(shown),
        el("p").child("else").otherwise(),
    ]))
    .unwrap();
    assert_eq!(html, expected);
}

#[test]
fn losing_component_branch_is_never_invoked() {
    let html = stringify(&el("div").children([
        VNode::component(broken()).when(false),
        VNode::component(broken()).else_when(false),
        el("p").otherwise(),
    ]))
    .unwrap();
    assert_eq!(html, "<div><p></p></div>");
}

#[test]
fn frozen_subtree_matches_live_rendering() {
    let count = Signal::new(4);
    let c = count.clone();
    let node = el("p")
        .child(dynamic(move || VNode::text(c.get().to_string())))
        .once();
    assert_eq!(stringify(&node).unwrap(), "<p>4</p>");
}

#[test]
fn reactive_attribute_reads_current_value() {
    let flag = Signal::new(true);
    let node = el("input").attr("disabled", Getter::from(flag.clone()));
    assert_eq!(stringify(&node).unwrap(), "<input disabled=\"\">");

    flag.set(false);
    assert_eq!(stringify(&node).unwrap(), "<input>");
}

#[test]
fn custom_key_attribute() {
    let stringifier = Stringifier::with_options(RenderOptions::new().key_attribute("data-id"));
    let html = stringifier.stringify(&el("li").key(7)).unwrap();
    assert_eq!(html, "<li data-id=\"7\"></li>");
}

#[test]
fn chunks_concatenate_to_the_full_document() {
    let tree = fragment([
        el("h1").child("title"),
        el("p").when(true).child("shown"),
        el("p").otherwise().child("hidden"),
        el("footer"),
    ]);
    let stringifier = Stringifier::new();
    let chunks: Vec<String> = stringifier
        .chunks(&tree)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks.concat(), stringifier.stringify(&tree).unwrap());
}
