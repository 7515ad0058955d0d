//! Remote context loading.
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub type LoadError = Box<dyn std::error::Error + Send + Sync>;

/// Remote JSON-LD document loader.
///
/// Loaders are queried for string values of `@context` and `@import`.
pub trait Loader {
	/// Loads the JSON document found at `url`.
	fn load(&mut self, url: &str) -> Result<Value, LoadError>;
}

impl<L: Loader + ?Sized> Loader for Box<L> {
	fn load(&mut self, url: &str) -> Result<Value, LoadError> {
		(**self).load(url)
	}
}

/// Loader that refuses every URL.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLoader;

#[derive(Debug, thiserror::Error)]
#[error("cannot load <{0}>: remote documents are disabled")]
pub struct CannotLoad(String);

impl Loader for NoLoader {
	fn load(&mut self, url: &str) -> Result<Value, LoadError> {
		Err(Box::new(CannotLoad(url.to_owned())))
	}
}

/// In-memory loader, mapping URLs to preloaded documents.
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
	documents: HashMap<String, Value>,
}

#[derive(Debug, thiserror::Error)]
#[error("document <{0}> not found")]
pub struct NotFound(String);

impl MemoryLoader {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, url: impl Into<String>, document: Value) {
		self.documents.insert(url.into(), document);
	}

	pub fn with(mut self, url: impl Into<String>, document: Value) -> Self {
		self.insert(url, document);
		self
	}
}

impl Loader for MemoryLoader {
	fn load(&mut self, url: &str) -> Result<Value, LoadError> {
		self.documents
			.get(url)
			.cloned()
			.ok_or_else(|| Box::new(NotFound(url.to_owned())) as LoadError)
	}
}

/// Memoizing loader.
///
/// Each URL is fetched at most once from the inner loader; later requests
/// share the first result. Failures are not cached.
pub struct CachedLoader<L> {
	inner: L,
	cache: HashMap<String, Arc<Value>>,
	fetches: usize,
}

impl<L: Loader> CachedLoader<L> {
	pub fn new(inner: L) -> Self {
		Self {
			inner,
			cache: HashMap::new(),
			fetches: 0,
		}
	}

	/// Loads `url`, going through the cache.
	pub fn load_shared(&mut self, url: &str) -> Result<Arc<Value>, LoadError> {
		if let Some(document) = self.cache.get(url) {
			return Ok(document.clone());
		}

		log::debug!("loading remote context <{url}>");
		self.fetches += 1;
		let document = Arc::new(self.inner.load(url)?);
		self.cache.insert(url.to_owned(), document.clone());
		Ok(document)
	}

	/// Number of requests that reached the inner loader.
	pub fn fetch_count(&self) -> usize {
		self.fetches
	}
}

impl<L: Loader> Loader for CachedLoader<L> {
	fn load(&mut self, url: &str) -> Result<Value, LoadError> {
		self.load_shared(url).map(|d| (*d).clone())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn cached_loader_fetches_once() {
		let inner = MemoryLoader::new().with("http://ex/ctx", json!({"@context": {}}));
		let mut loader = CachedLoader::new(inner);
		let a = loader.load_shared("http://ex/ctx").unwrap();
		let b = loader.load_shared("http://ex/ctx").unwrap();
		assert!(Arc::ptr_eq(&a, &b));
		assert_eq!(loader.fetch_count(), 1)
	}

	#[test]
	fn failures_are_not_cached() {
		let mut loader = CachedLoader::new(MemoryLoader::new());
		assert!(loader.load_shared("http://ex/missing").is_err());
		assert!(loader.load_shared("http://ex/missing").is_err());
		assert_eq!(loader.fetch_count(), 2)
	}

	#[test]
	fn no_loader_refuses() {
		assert!(NoLoader.load("http://ex/ctx").is_err())
	}
}
