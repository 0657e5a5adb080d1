//! Value Injection
//!
//! A provider component binds a value to a [`ContextKey`] for the duration
//! of its subtree's rendering; descendants read the innermost binding with
//! [`use_context`].
//!
//! Bindings live on a per-thread stack for each key. [`provide`] pushes and
//! returns a guard that pops on drop, so a failing subtree cannot leave a
//! stale binding behind.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::view::{Component, PropValue, Props, VALUE_PROP};

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Identity of an injected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextKey(u64);

impl ContextKey {
    /// Allocate a fresh key.
    pub fn new() -> Self {
        Self(NEXT_KEY.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ContextKey {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static BINDINGS: RefCell<HashMap<ContextKey, Vec<Rc<dyn Any>>>> = RefCell::new(HashMap::new());
}

/// A value bound to a key.
#[derive(Clone)]
pub struct Binding {
    pub key: ContextKey,
    pub value: Rc<dyn Any>,
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding").field("key", &self.key).finish()
    }
}

/// Pops its binding when dropped.
#[must_use = "the binding is popped as soon as the guard is dropped"]
pub struct ProvideGuard {
    key: ContextKey,
}

impl Drop for ProvideGuard {
    fn drop(&mut self) {
        let _ = BINDINGS.try_with(|bindings| {
            let mut bindings = bindings.borrow_mut();
            if let Some(stack) = bindings.get_mut(&self.key) {
                stack.pop();
                if stack.is_empty() {
                    bindings.remove(&self.key);
                }
            }
        });
    }
}

/// Push a binding until the returned guard is dropped.
pub fn provide(binding: Binding) -> ProvideGuard {
    BINDINGS.with(|bindings| {
        bindings
            .borrow_mut()
            .entry(binding.key)
            .or_default()
            .push(binding.value);
    });
    ProvideGuard { key: binding.key }
}

/// The innermost value bound to `key`, if it has type `T`.
pub fn use_context<T: 'static>(key: ContextKey) -> Option<Rc<T>> {
    let value = BINDINGS.with(|bindings| bindings.borrow().get(&key)?.last().cloned())?;
    value.downcast::<T>().ok()
}

/// The binding a component establishes for its subtree, if it is a
/// provider.
///
/// Static values are bound as [`crate::view::Value`]; opaque data is bound
/// as-is.
pub fn binding_for(component: &Component, props: &Props) -> Option<Binding> {
    let key = component.provided_key()?;
    let value: Rc<dyn Any> = match props.get(VALUE_PROP) {
        Some(PropValue::Data(data)) => data.clone(),
        Some(PropValue::Value(value)) => Rc::new(value.clone()),
        Some(other) => Rc::new(other.read()),
        None => Rc::new(crate::view::Value::Null),
    };
    Some(Binding { key, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::Value;

    #[test]
    fn keys_are_unique() {
        assert_ne!(ContextKey::new(), ContextKey::new());
    }

    #[test]
    fn innermost_binding_wins_and_pops_on_drop() {
        let key = ContextKey::new();
        assert!(use_context::<u32>(key).is_none());

        let outer = provide(Binding {
            key,
            value: Rc::new(1u32),
        });
        {
            let _inner = provide(Binding {
                key,
                value: Rc::new(2u32),
            });
            assert_eq!(*use_context::<u32>(key).unwrap(), 2);
        }
        assert_eq!(*use_context::<u32>(key).unwrap(), 1);

        drop(outer);
        assert!(use_context::<u32>(key).is_none());
    }

    #[test]
    fn wrong_type_reads_nothing() {
        let key = ContextKey::new();
        let _guard = provide(Binding {
            key,
            value: Rc::new("text"),
        });
        assert!(use_context::<u32>(key).is_none());
    }

    #[test]
    fn only_providers_bind() {
        let key = ContextKey::new();
        let mut props = Props::new();
        props.insert(VALUE_PROP.into(), PropValue::Value(Value::from(3)));

        let binding = binding_for(&Component::provider(key), &props).unwrap();
        assert_eq!(binding.key, key);
        assert_eq!(binding.value.downcast_ref::<Value>(), Some(&Value::from(3)));

        let plain = Component::new("Plain", |_: &Props| Ok(()));
        assert!(binding_for(&plain, &props).is_none());
    }
}
