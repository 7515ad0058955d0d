//! Contexts bound to document paths.
use crate::{context::Context, keyword::PathKey};
use std::collections::HashMap;
use std::sync::Arc;

/// Trie over document paths holding the contexts declared at each node.
///
/// A context bound at a path applies to the node at that path and, if it
/// propagates, to every node below it.
#[derive(Debug, Default)]
pub struct ContextTree {
	root: Node,
}

#[derive(Debug, Default)]
struct Node {
	context: Option<Arc<Context>>,
	children: HashMap<PathKey, Node>,
}

impl ContextTree {
	pub fn new() -> Self {
		Self::default()
	}

	/// Binds `context` at exactly `path`, or unbinds it when `None`.
	pub fn set_context(&mut self, path: &[PathKey], context: Option<Arc<Context>>) {
		let mut node = &mut self.root;
		for key in path {
			node = node.children.entry(key.clone()).or_default();
		}
		node.context = context;
	}

	/// Returns the context bound at the longest prefix of `path`, with the
	/// length of that prefix.
	pub fn get_context(&self, path: &[PathKey]) -> Option<(Arc<Context>, usize)> {
		let mut node = &self.root;
		let mut found = node.context.clone().map(|c| (c, 0));
		for (i, key) in path.iter().enumerate() {
			match node.children.get(key) {
				Some(child) => {
					node = child;
					if let Some(context) = &node.context {
						found = Some((context.clone(), i + 1))
					}
				}
				None => break,
			}
		}
		found
	}

	/// Drops every context bound at `path` or below.
	pub fn remove(&mut self, path: &[PathKey]) {
		let Some((last, parent_path)) = path.split_last() else {
			self.root = Node::default();
			return;
		};

		let mut node = &mut self.root;
		for key in parent_path {
			match node.children.get_mut(key) {
				Some(child) => node = child,
				None => return,
			}
		}
		node.children.remove(last);
	}
}

/// Kind of scoped context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
	/// Context of a term definition, applied to the values of the term.
	Property,

	/// Context of a term definition, applied to nodes having the term as
	/// type.
	Type,
}

/// Memoized property-scoped and type-scoped contexts.
///
/// Entries are keyed by the identity of the context the scoped context is
/// processed against, and the term that carries it. Each entry remembers the
/// length of the path its parent context was bound at, and is dropped with
/// that path.
#[derive(Debug, Default)]
pub struct ScopedContexts {
	entries: HashMap<(usize, String, ScopeKind), Scoped>,
}

#[derive(Debug)]
struct Scoped {
	/// Kept alive so that its address is not reused.
	_parent: Arc<Context>,
	context: Arc<Context>,
	bound: usize,
}

impl ScopedContexts {
	pub fn get(&self, parent: &Arc<Context>, term: &str, kind: ScopeKind) -> Option<Arc<Context>> {
		self.entries
			.get(&(Arc::as_ptr(parent) as usize, term.to_owned(), kind))
			.map(|entry| entry.context.clone())
	}

	pub fn insert(
		&mut self,
		parent: &Arc<Context>,
		term: &str,
		kind: ScopeKind,
		scoped: Arc<Context>,
		bound: usize,
	) {
		self.entries.insert(
			(Arc::as_ptr(parent) as usize, term.to_owned(), kind),
			Scoped {
				_parent: parent.clone(),
				context: scoped,
				bound,
			},
		);
	}

	/// Drops the entries derived from contexts bound at paths of at least
	/// `len` keys.
	pub fn forget(&mut self, len: usize) {
		if !self.entries.is_empty() {
			self.entries.retain(|_, entry| entry.bound < len)
		}
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn nearest_ancestor() {
		let mut tree = ContextTree::new();
		let root = Arc::new(Context::new(None));
		let inner = Arc::new(Context::new(None));
		tree.set_context(&[PathKey::Root], Some(root.clone()));
		tree.set_context(&[PathKey::Root, "a".into()], Some(inner.clone()));

		let (found, len) = tree
			.get_context(&[PathKey::Root, "a".into(), 0.into(), "b".into()])
			.unwrap();
		assert!(Arc::ptr_eq(&found, &inner));
		assert_eq!(len, 2);

		let (found, len) = tree.get_context(&[PathKey::Root, "c".into()]).unwrap();
		assert!(Arc::ptr_eq(&found, &root));
		assert_eq!(len, 1)
	}

	#[test]
	fn same_path_same_context() {
		let mut tree = ContextTree::new();
		tree.set_context(&[PathKey::Root], Some(Arc::new(Context::new(None))));
		let p = [PathKey::Root, "x".into(), "y".into()];
		let (a, _) = tree.get_context(&p).unwrap();
		let (b, _) = tree.get_context(&p).unwrap();
		assert!(Arc::ptr_eq(&a, &b))
	}

	#[test]
	fn removal_drops_subtree() {
		let mut tree = ContextTree::new();
		let root = Arc::new(Context::new(None));
		tree.set_context(&[PathKey::Root], Some(root.clone()));
		tree.set_context(&[PathKey::Root, "a".into()], Some(Arc::new(Context::new(None))));
		tree.remove(&[PathKey::Root, "a".into()]);

		let (found, len) = tree.get_context(&[PathKey::Root, "a".into()]).unwrap();
		assert!(Arc::ptr_eq(&found, &root));
		assert_eq!(len, 1)
	}

	#[test]
	fn scoped_contexts_by_identity() {
		let mut cache = ScopedContexts::default();
		let a = Arc::new(Context::new(None));
		let b = Arc::new(Context::new(None));
		let scoped = Arc::new(Context::new(None));
		cache.insert(&a, "p", ScopeKind::Property, scoped.clone(), 1);
		assert!(Arc::ptr_eq(&cache.get(&a, "p", ScopeKind::Property).unwrap(), &scoped));
		assert!(cache.get(&a, "p", ScopeKind::Type).is_none());
		assert!(cache.get(&b, "p", ScopeKind::Property).is_none());
		assert!(cache.get(&a, "q", ScopeKind::Property).is_none());
		assert_eq!(cache.len(), 1)
	}

	#[test]
	fn scoped_contexts_forgotten_with_their_path() {
		let mut cache = ScopedContexts::default();
		let root = Arc::new(Context::new(None));
		let inner = Arc::new(Context::new(None));
		let scoped = Arc::new(Context::new(None));
		cache.insert(&root, "p", ScopeKind::Property, scoped.clone(), 1);
		cache.insert(&inner, "p", ScopeKind::Property, scoped, 3);

		cache.forget(4);
		assert_eq!(cache.len(), 2);

		cache.forget(3);
		assert_eq!(cache.len(), 1);
		assert!(cache.get(&inner, "p", ScopeKind::Property).is_none());
		assert!(cache.get(&root, "p", ScopeKind::Property).is_some())
	}
}
