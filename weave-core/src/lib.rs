//! Weave Core
//!
//! This crate provides the core runtime for the Weave reactive renderer.
//! It implements:
//!
//! - Reactive primitives (signals, memos, effects) with batched scheduling
//! - Immutable view trees and component expansion
//! - Directives for branches, lists, visibility and content
//! - A client renderer that mounts into an in-memory document and patches it
//! - A server stringifier that renders the same trees to HTML
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `view`: View nodes, components and expansion
//! - `directive`: Directive resolution and branch grouping
//! - `inject`: Context values provided to component subtrees
//! - `dom`: The in-memory document and its unmount registry
//! - `client`: Mounting, materialization and reconciliation
//! - `server`: HTML stringification
//!
//! # Example
//!
//! ```rust
//! use weave_core::client::render;
//! use weave_core::dom::DomNode;
//! use weave_core::reactive::{create_signal, microtask};
//! use weave_core::view::{dynamic, el, VNode};
//!
//! let (count, set_count) = create_signal(0);
//! let container = DomNode::element("main");
//! let _root = render(&container, move || {
//!     let count = count.clone();
//!     Ok(el("p").child(dynamic(move || VNode::text(count.get().to_string()))))
//! })
//! .unwrap();
//!
//! set_count.set(5);
//! microtask::turn();
//! assert_eq!(container.text_content(), "5");
//! ```

pub mod client;
pub mod config;
pub mod directive;
pub mod dom;
pub mod error;
pub mod html;
pub mod inject;
pub mod reactive;
pub mod server;
pub mod view;

pub use client::{render, ClientRenderer, Root};
pub use config::RenderOptions;
pub use error::{ReactiveError, RenderError};
pub use server::{stringify, Stringifier};
pub use view::{el, fragment, VNode};
