//! Property values and reactive leaves.
//!
//! A property is either plain data ([`Value`]), a reactive reader
//! ([`Getter`]), an event [`Handler`], or one of the structural payloads the
//! renderer understands (children, list factories, fallbacks, refs).

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::dom::{Event, NodeRef};
use crate::error::RenderError;
use crate::reactive::{Memo, ReadSignal, Signal};

use super::{Child, VNode};

/// Plain data carried by properties and list sources.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absence of a value. Attributes with this value are omitted.
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    List(Rc<[Value]>),
}

impl Value {
    /// Truthiness used by conditions and visibility.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::List(_) => true,
        }
    }

    /// Text form used for attributes and text content.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.to_string(),
            Value::List(items) => items
                .iter()
                .map(Value::to_text)
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    /// The items of a list value, if this is one.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// The string slice of a string value, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s.into())
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

macro_rules! value_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(n as f64)
                }
            }
        )*
    };
}

value_from_int!(i32, i64, u32, u64, usize);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// A reactive reader producing a [`Value`].
///
/// Calling it inside a computation subscribes the computation to whatever
/// cells the reader touches.
#[derive(Clone)]
pub struct Getter(Rc<dyn Fn() -> Value>);

impl Getter {
    /// Wrap a reader closure.
    pub fn new<F, V>(f: F) -> Self
    where
        F: Fn() -> V + 'static,
        V: Into<Value>,
    {
        Self(Rc::new(move || f().into()))
    }

    /// Read the current value.
    pub fn get(&self) -> Value {
        (self.0)()
    }
}

impl fmt::Debug for Getter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Getter")
    }
}

impl<T> From<Memo<T>> for Getter
where
    T: Clone + PartialEq + Into<Value> + 'static,
{
    fn from(memo: Memo<T>) -> Self {
        Getter::new(move || memo.get())
    }
}

impl<T> From<ReadSignal<T>> for Getter
where
    T: Clone + PartialEq + Into<Value> + 'static,
{
    fn from(signal: ReadSignal<T>) -> Self {
        Getter::new(move || signal.get())
    }
}

impl<T> From<Signal<T>> for Getter
where
    T: Clone + PartialEq + Into<Value> + 'static,
{
    fn from(signal: Signal<T>) -> Self {
        Getter::new(move || signal.get())
    }
}

/// A reactive leaf in the tree: a closure producing a node.
///
/// The client gives each dynamic leaf its own wrapper element and
/// computation; the server evaluates it exactly once.
#[derive(Clone)]
pub struct Dynamic(Rc<dyn Fn() -> VNode>);

impl Dynamic {
    /// Wrap a node-producing closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> VNode + 'static,
    {
        Self(Rc::new(f))
    }

    /// Produce the current node.
    pub fn call(&self) -> VNode {
        (self.0)()
    }
}

impl fmt::Debug for Dynamic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Dynamic")
    }
}

impl From<Getter> for Dynamic {
    fn from(getter: Getter) -> Self {
        Dynamic::new(move || VNode::text(getter.get().to_text()))
    }
}

/// An event listener.
#[derive(Clone)]
pub struct Handler(Rc<dyn Fn(&Event)>);

impl Handler {
    /// Wrap a listener closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Event) + 'static,
    {
        Self(Rc::new(f))
    }

    /// Invoke the listener.
    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handler")
    }
}

/// Item factory of a list directive.
pub type ItemFactory = Rc<dyn Fn(&Value, usize) -> VNode>;

/// Payload of the list directive: a source list and an item factory.
#[derive(Clone)]
pub struct Each {
    /// The list to iterate, static or reactive.
    pub source: Box<PropValue>,
    /// Builds the node for one item.
    pub render: ItemFactory,
}

impl fmt::Debug for Each {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Each").field("source", &self.source).finish()
    }
}

/// Fallback producer of an error boundary.
pub type Fallback = Rc<dyn Fn(&RenderError) -> VNode>;

/// One entry of a property map.
#[derive(Clone)]
pub enum PropValue {
    /// Static data.
    Value(Value),
    /// Reactive data, re-read by a computation on the client.
    Reactive(Getter),
    /// Event listener (`on:<event>` keys).
    Handler(Handler),
    /// Children passed through the property map.
    Children(Vec<Child>),
    /// List directive payload.
    Each(Each),
    /// Receives the DOM node once mounted.
    Ref(NodeRef),
    /// Error boundary fallback.
    Fallback(Fallback),
    /// Opaque data for components, such as an injected context value.
    Data(Rc<dyn Any>),
}

impl PropValue {
    /// Whether reading this value can subscribe a computation.
    pub fn is_reactive(&self) -> bool {
        match self {
            PropValue::Reactive(_) => true,
            PropValue::Each(each) => each.source.is_reactive(),
            _ => false,
        }
    }

    /// Read the value: static data as-is, reactive data by calling the reader.
    pub fn read(&self) -> Value {
        match self {
            PropValue::Value(value) => value.clone(),
            PropValue::Reactive(getter) => getter.get(),
            _ => Value::Null,
        }
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Value(value) => f.debug_tuple("Value").field(value).finish(),
            PropValue::Reactive(_) => f.write_str("Reactive"),
            PropValue::Handler(_) => f.write_str("Handler"),
            PropValue::Children(children) => f.debug_tuple("Children").field(children).finish(),
            PropValue::Each(each) => each.fmt(f),
            PropValue::Ref(_) => f.write_str("Ref"),
            PropValue::Fallback(_) => f.write_str("Fallback"),
            PropValue::Data(_) => f.write_str("Data"),
        }
    }
}

/// Conversion into a property value.
pub trait IntoProp {
    /// Perform the conversion.
    fn into_prop(self) -> PropValue;
}

impl IntoProp for PropValue {
    fn into_prop(self) -> PropValue {
        self
    }
}

impl IntoProp for Value {
    fn into_prop(self) -> PropValue {
        PropValue::Value(self)
    }
}

impl IntoProp for Getter {
    fn into_prop(self) -> PropValue {
        PropValue::Reactive(self)
    }
}

impl IntoProp for Handler {
    fn into_prop(self) -> PropValue {
        PropValue::Handler(self)
    }
}

impl IntoProp for NodeRef {
    fn into_prop(self) -> PropValue {
        PropValue::Ref(self)
    }
}

impl<T> IntoProp for Memo<T>
where
    T: Clone + PartialEq + Into<Value> + 'static,
{
    fn into_prop(self) -> PropValue {
        PropValue::Reactive(self.into())
    }
}

impl<T> IntoProp for ReadSignal<T>
where
    T: Clone + PartialEq + Into<Value> + 'static,
{
    fn into_prop(self) -> PropValue {
        PropValue::Reactive(self.into())
    }
}

macro_rules! static_prop {
    ($($ty:ty),*) => {
        $(
            impl IntoProp for $ty {
                fn into_prop(self) -> PropValue {
                    PropValue::Value(self.into())
                }
            }
        )*
    };
}

static_prop!(&str, String, bool, f64, i32, i64, u32, u64, usize);

impl<T: Into<Value>> IntoProp for Vec<T> {
    fn into_prop(self) -> PropValue {
        PropValue::Value(self.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Value::Null, false)]
    #[case(Value::Bool(true), true)]
    #[case(Value::Number(0.0), false)]
    #[case(Value::Number(f64::NAN), false)]
    #[case(Value::Number(2.0), true)]
    #[case(Value::from(""), false)]
    #[case(Value::from("x"), true)]
    #[case(Value::from(Vec::<i32>::new()), true)]
    fn truthiness(#[case] value: Value, #[case] expected: bool) {
        assert_eq!(value.is_truthy(), expected);
    }

    #[rstest]
    #[case(Value::Null, "")]
    #[case(Value::from(3), "3")]
    #[case(Value::from(1.5), "1.5")]
    #[case(Value::from(vec!["a", "b"]), "a b")]
    #[case(Value::from(Some("on")), "on")]
    fn text_form(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(value.to_text(), expected);
    }

    #[test]
    fn getter_reads_signal() {
        let signal = Signal::new(4);
        let getter = Getter::from(signal.clone());
        signal.set(5);
        assert_eq!(getter.get(), Value::Number(5.0));
    }

    #[test]
    fn static_prop_is_not_reactive() {
        assert!(!"x".into_prop().is_reactive());
        assert!(Getter::new(|| 1).into_prop().is_reactive());
    }
}
