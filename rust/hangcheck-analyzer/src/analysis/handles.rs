//! Completion handles: bindings whose invocation settles a promise or deferred.

use crate::analysis::ast::Ident;
use crate::analysis::bindings::{BindingId, BindingTable};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handle {
    pub binding: BindingId,
    /// Declared name, for shadow checks and messages
    pub name: String,
}

/// Ordered, immutable set of live handles. Filtering produces a new set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandleSet {
    handles: Vec<Handle>,
}

impl HandleSet {
    pub fn new(handles: Vec<Handle>) -> Self {
        Self { handles }
    }

    /// Build a set from declaring occurrences; unresolved occurrences are dropped.
    pub fn from_idents<'a>(idents: impl IntoIterator<Item = &'a Ident>, bindings: &BindingTable) -> Self {
        let handles = idents
            .into_iter()
            .filter_map(|ident| {
                bindings.binding_of(ident).map(|binding| Handle { binding, name: ident.name.clone() })
            })
            .collect();
        Self { handles }
    }

    pub fn contains(&self, binding: BindingId) -> bool {
        self.handles.iter().any(|h| h.binding == binding)
    }

    /// Whether `ident` refers to one of the live handles.
    pub fn refers_to(&self, ident: &Ident, bindings: &BindingTable) -> bool {
        bindings.binding_of(ident).is_some_and(|b| self.contains(b))
    }

    /// Copy of this set without the handles redeclared by `decls`.
    pub fn without_shadowed(&self, decls: &[&Ident], bindings: &BindingTable) -> HandleSet {
        let handles = self
            .handles
            .iter()
            .filter(|h| !decls.iter().any(|d| bindings.is_shadowed_by(h.binding, d)))
            .cloned()
            .collect();
        HandleSet { handles }
    }

    /// Whether any handle is redeclared by `decls`.
    pub fn is_shadowed_by(&self, decls: &[&Ident], bindings: &BindingTable) -> bool {
        self.handles.iter().any(|h| decls.iter().any(|d| bindings.is_shadowed_by(h.binding, d)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Handle> {
        self.handles.iter()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
