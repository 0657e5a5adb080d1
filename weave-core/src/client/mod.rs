//! Client Renderer
//!
//! Mounts a view into an in-memory [`DomNode`] and keeps it in sync.
//!
//! # Mounting
//!
//! [`ClientRenderer::mount`] wraps the whole render in one root computation.
//! The first run expands the view and materializes it into the container.
//! Every later run (triggered by any cell read during render) expands again
//! and patches the container against the previous expansion, reusing
//! elements wherever the old and new trees line up.
//!
//! # Fine-grained updates
//!
//! Inside a mounted tree, reactive properties, dynamic leaves, reactive
//! branch groups and reactive lists each get their own computation, owned
//! by the computation that built them. They update just their node and are
//! torn down with their owner. Their disposers are also registered in the
//! [unmount registry](crate::dom::unmount) so removing a node stops them.
//!
//! # Keyed lists
//!
//! When any item of a children list carries a key, the list is reconciled
//! by key: an existing element with the same key and tag is moved into
//! place and keeps its identity; everything else is built fresh, and
//! leftovers are removed.

mod build;
mod props;
mod reconcile;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::config::RenderOptions;
use crate::directive::{DirectiveRegistry, Directives};
use crate::dom::unmount::run_unmount_hooks;
use crate::dom::DomNode;
use crate::error::RenderError;
use crate::reactive::{create_root, try_create_effect, Dispose, Scope};
use crate::view::{expand_output, Expanded, Output};

/// Builds and patches documents from views.
///
/// Cloning is cheap; clones share options and directives.
#[derive(Clone)]
pub struct ClientRenderer {
    options: Rc<RenderOptions>,
    directives: Rc<dyn DirectiveRegistry>,
}

impl Default for ClientRenderer {
    fn default() -> Self {
        Self {
            options: Rc::new(RenderOptions::default()),
            directives: Rc::new(Directives::new()),
        }
    }
}

impl fmt::Debug for ClientRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRenderer")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ClientRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = Rc::new(options);
        self
    }

    /// Use `directives` to resolve custom `x-` properties.
    pub fn with_directives(mut self, directives: impl DirectiveRegistry + 'static) -> Self {
        self.directives = Rc::new(directives);
        self
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Mount `view` into `container`.
    ///
    /// The container is assumed to be owned by the mounted root: disposing
    /// the root empties it. A failure during the first render is returned
    /// and nothing stays mounted; failures during later renders go to the
    /// reactive error sink and leave the previous document in place.
    pub fn mount<F, O>(&self, container: &DomNode, view: F) -> Result<Root, RenderError>
    where
        F: Fn() -> Result<O, RenderError> + 'static,
        O: Into<Output>,
    {
        tracing::debug!(container = ?container.id(), "mounting root");
        let renderer = self.clone();
        let target = container.clone();
        let previous: Rc<RefCell<Option<Expanded>>> = Rc::new(RefCell::new(None));

        let (result, scope) = create_root(move || {
            try_create_effect(move || {
                let output: Output = view()?.into();
                let expanded = expand_output(output)?;

                let old = previous.borrow_mut().take();
                let outcome = match &old {
                    None => renderer
                        .materialize(&expanded)
                        .and_then(|dom| target.append_child(&dom)),
                    Some(old) => renderer.patch_root(&target, old, &expanded),
                };
                match outcome {
                    Ok(()) => {
                        *previous.borrow_mut() = Some(expanded);
                        Ok(())
                    }
                    Err(err) => {
                        *previous.borrow_mut() = old;
                        Err(err)
                    }
                }
            })
        });

        match result {
            Ok(computation) => Ok(Root {
                container: container.clone(),
                scope,
                computation,
            }),
            Err(err) => {
                scope.dispose();
                Err(err)
            }
        }
    }
}

/// A mounted view.
pub struct Root {
    container: DomNode,
    scope: Scope,
    computation: Dispose,
}

impl Root {
    pub fn container(&self) -> &DomNode {
        &self.container
    }

    /// Handle of the root computation.
    pub fn computation(&self) -> &Dispose {
        &self.computation
    }

    /// Dispose every computation of the tree, run every unmount hook, then
    /// detach the document. Idempotent.
    pub fn dispose(&self) {
        if self.scope.is_disposed() {
            return;
        }
        tracing::debug!(container = ?self.container.id(), "disposing root");
        self.scope.dispose();
        for child in self.container.children() {
            run_unmount_hooks(&child);
        }
        self.container.clear_children();
    }
}

impl fmt::Debug for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Root")
            .field("container", &self.container)
            .field("computation", &self.computation)
            .finish()
    }
}

/// Mount `view` into `container` with the default renderer.
pub fn render<F, O>(container: &DomNode, view: F) -> Result<Root, RenderError>
where
    F: Fn() -> Result<O, RenderError> + 'static,
    O: Into<Output>,
{
    ClientRenderer::default().mount(container, view)
}

/// Build the document for an expanded root with the default renderer.
pub fn materialize(expanded: &Expanded) -> Result<DomNode, RenderError> {
    ClientRenderer::default().materialize(expanded)
}

/// Patch `container` from `old` to `new` with the default renderer.
pub fn patch_root(container: &DomNode, old: &Expanded, new: &Expanded) -> Result<(), RenderError> {
    ClientRenderer::default().patch_root(container, old, new)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
