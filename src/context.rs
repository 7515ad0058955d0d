//! Active contexts.
//!
//! A [`Context`] is immutable once processed. Processing a local context
//! against an active one produces a new `Arc<Context>`; the active context is
//! never mutated.
use crate::{
	error::{Error, ErrorCode, Result},
	keyword::{is_keyword, is_keyword_like},
	loader::{CachedLoader, Loader},
	options::{Options, ProcessingMode},
};
use iref::{Iri, IriBuf, IriRef};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Maximum number of nested remote contexts.
const MAX_CONTEXT_RECURSION: usize = 8;

/// Base direction of a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
	Ltr,
	Rtl,
}

impl Direction {
	pub fn parse(s: &str) -> Option<Self> {
		match s {
			"ltr" => Some(Self::Ltr),
			"rtl" => Some(Self::Rtl),
			_ => None,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Ltr => "ltr",
			Self::Rtl => "rtl",
		}
	}
}

/// Type mapping of a term definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeMapping {
	Id,
	Vocab,
	Json,
	None,
	Iri(String),
}

/// Container mapping of a term definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Containers {
	pub list: bool,
	pub set: bool,
	pub index: bool,
	pub language: bool,
	pub id: bool,
	pub type_: bool,
	pub graph: bool,
}

impl Containers {
	fn parse(value: &Value, mode: ProcessingMode) -> Result<Self> {
		let invalid = || {
			Error::coded(
				ErrorCode::InvalidContainerMapping,
				format!("invalid @container value {value}"),
			)
		};

		let items: Vec<&str> = match value {
			Value::String(s) => vec![s.as_str()],
			Value::Array(items) if mode == ProcessingMode::V1_1 => items
				.iter()
				.map(|item| item.as_str().ok_or_else(invalid))
				.collect::<Result<_>>()?,
			_ => return Err(invalid()),
		};

		let mut result = Self::default();
		for item in items {
			match item {
				"@list" => result.list = true,
				"@set" => result.set = true,
				"@index" => result.index = true,
				"@language" => result.language = true,
				"@id" if mode == ProcessingMode::V1_1 => result.id = true,
				"@type" if mode == ProcessingMode::V1_1 => result.type_ = true,
				"@graph" if mode == ProcessingMode::V1_1 => result.graph = true,
				_ => return Err(invalid()),
			}
		}

		let kinds = [
			result.list,
			result.index,
			result.language,
			result.id,
			result.type_,
		]
		.into_iter()
		.filter(|b| *b)
		.count();

		let valid = if result.list {
			kinds == 1 && !result.set && !result.graph
		} else if result.graph {
			!result.language && !result.type_ && !(result.index && result.id)
		} else {
			kinds <= 1
		};

		if valid {
			Ok(result)
		} else {
			Err(invalid())
		}
	}

	/// A `@graph` container, possibly with `@set`, without index or id map.
	pub fn is_simple_graph(&self) -> bool {
		self.graph && !self.index && !self.id
	}

	/// A `@graph` container combined with `@index` or `@id`.
	pub fn is_complex_graph(&self) -> bool {
		self.graph && (self.index || self.id)
	}
}

/// Term definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TermDefinition {
	/// IRI mapping. `None` when the term is explicitly disabled.
	pub id: Option<String>,
	pub reverse: bool,
	pub type_mapping: Option<TypeMapping>,
	pub container: Containers,

	/// `Some(None)` when the default language is explicitly cleared.
	pub language: Option<Option<String>>,
	pub direction: Option<Option<Direction>>,
	pub index: Option<String>,
	pub nest: Option<String>,
	pub prefix: bool,

	/// Scoped context, processed where the term is used.
	pub context: Option<Value>,
	pub protected: bool,
}

impl TermDefinition {
	fn same_as(&self, other: &Self) -> bool {
		let mut a = self.clone();
		let mut b = other.clone();
		a.protected = false;
		b.protected = false;
		a == b
	}
}

/// Processed JSON-LD context.
#[derive(Debug, Clone, Default)]
pub struct Context {
	base: Option<IriBuf>,
	original_base: Option<IriBuf>,
	vocab: Option<String>,
	language: Option<String>,
	direction: Option<Direction>,
	version: Option<ProcessingMode>,
	propagate: bool,
	previous: Option<Arc<Context>>,
	terms: HashMap<String, TermDefinition>,
}

impl Context {
	/// Creates an empty context with the given document base IRI.
	pub fn new(base: Option<IriBuf>) -> Self {
		Self {
			original_base: base.clone(),
			base,
			propagate: true,
			..Default::default()
		}
	}

	pub fn base(&self) -> Option<&IriBuf> {
		self.base.as_ref()
	}

	pub fn vocab(&self) -> Option<&str> {
		self.vocab.as_deref()
	}

	pub fn default_language(&self) -> Option<&str> {
		self.language.as_deref()
	}

	pub fn default_direction(&self) -> Option<Direction> {
		self.direction
	}

	pub fn version(&self) -> Option<ProcessingMode> {
		self.version
	}

	/// Whether this context applies to descendant nodes.
	pub fn propagate(&self) -> bool {
		self.propagate
	}

	/// Context active before a non-propagated context was applied.
	pub fn previous(&self) -> Option<&Arc<Context>> {
		self.previous.as_ref()
	}

	pub fn term(&self, term: &str) -> Option<&TermDefinition> {
		self.terms.get(term)
	}

	pub fn has_protected_terms(&self) -> bool {
		self.terms.values().any(|d| d.protected)
	}

	pub fn container(&self, term: &str) -> Containers {
		self.term(term).map(|d| d.container).unwrap_or_default()
	}

	pub fn type_mapping(&self, term: &str) -> Option<&TypeMapping> {
		self.term(term).and_then(|d| d.type_mapping.as_ref())
	}

	/// Language of values of `term`, falling back to the default language.
	pub fn language(&self, term: &str) -> Option<&str> {
		match self.term(term).and_then(|d| d.language.as_ref()) {
			Some(language) => language.as_deref(),
			None => self.language.as_deref(),
		}
	}

	/// Direction of values of `term`, falling back to the default direction.
	pub fn direction(&self, term: &str) -> Option<Direction> {
		match self.term(term).and_then(|d| d.direction) {
			Some(direction) => direction,
			None => self.direction,
		}
	}

	pub fn index(&self, term: &str) -> Option<&str> {
		self.term(term).and_then(|d| d.index.as_deref())
	}

	pub fn is_reverse(&self, term: &str) -> bool {
		self.term(term).map(|d| d.reverse).unwrap_or(false)
	}

	pub fn scoped_context(&self, term: &str) -> Option<&Value> {
		self.term(term).and_then(|d| d.context.as_ref())
	}

	/// Returns a non-propagating copy of this context, falling back to
	/// `previous` below the node it applies to.
	pub(crate) fn non_propagated(&self, previous: Arc<Context>) -> Self {
		let mut result = self.clone();
		result.propagate = false;
		result.previous = Some(previous);
		result
	}

	/// IRI expansion.
	///
	/// Returns `None` if the value is mapped to `null`. When `vocab` is set,
	/// term definitions and `@vocab` apply, otherwise the value is resolved
	/// against `@base`. The result may be a keyword, a blank node identifier
	/// or a string that is not an IRI: callers validate it.
	pub fn expand_iri(&self, value: &str, vocab: bool) -> Option<String> {
		if is_keyword(value) {
			return Some(value.to_owned());
		}

		if let Some(definition) = self.terms.get(value) {
			match &definition.id {
				None => return None,
				Some(id) if vocab => return Some(id.clone()),
				Some(_) => (),
			}
		}

		if is_keyword_like(value) {
			return Some(value.to_owned());
		}

		if let Some((prefix, suffix)) = split_compact_iri(value) {
			if prefix == "_" {
				return Some(value.to_owned());
			}

			if let Some(definition) = self.terms.get(prefix) {
				if let Some(id) = &definition.id {
					if definition.prefix {
						return Some(format!("{id}{suffix}"));
					}
				}
			}
		}

		if has_scheme(value) {
			return Some(value.to_owned());
		}

		if vocab {
			if let Some(v) = &self.vocab {
				return Some(format!("{v}{value}"));
			}
		} else if let Some(base) = &self.base {
			return Some(resolve(value, base));
		}

		Some(value.to_owned())
	}

	/// Processes a local context against this active context.
	pub fn parse<L: Loader>(
		self: &Arc<Self>,
		local: &Value,
		options: &Options,
		loader: &mut CachedLoader<L>,
		property_scoped: bool,
	) -> Result<Arc<Context>> {
		log::debug!("processing local context");
		let mut env = Env {
			options,
			loader,
			remote_stack: Vec::new(),
		};

		process(self, local, &mut env, false, property_scoped).map(Arc::new)
	}
}

struct Env<'a, L> {
	options: &'a Options,
	loader: &'a mut CachedLoader<L>,
	remote_stack: Vec<String>,
}

impl<'a, L> Env<'a, L> {
	fn mode(&self) -> ProcessingMode {
		self.options.processing_mode
	}

	fn require_1_1(&self, what: &str) -> Result<()> {
		if self.mode() == ProcessingMode::V1_0 {
			Err(Error::coded(
				ErrorCode::ProcessingModeConflict,
				format!("{what} is not supported in {}", self.mode()),
			))
		} else {
			Ok(())
		}
	}
}

fn process<L: Loader>(
	active: &Arc<Context>,
	local: &Value,
	env: &mut Env<L>,
	remote: bool,
	override_protected: bool,
) -> Result<Context> {
	let mut result = (**active).clone();

	let propagate = match local.get("@propagate") {
		Some(Value::Bool(b)) => *b,
		Some(v) => {
			return Err(Error::coded(
				ErrorCode::InvalidPropagateValue,
				format!("@propagate must be a boolean, got {v}"),
			))
		}
		None => true,
	};

	if !propagate && result.previous.is_none() {
		result.previous = Some(active.clone());
	}

	let items = match local {
		Value::Array(items) => items.iter().collect(),
		item => vec![item],
	};

	for item in items {
		match item {
			Value::Null => {
				if !override_protected && result.has_protected_terms() {
					return Err(Error::coded(
						ErrorCode::InvalidContextNullification,
						"cannot nullify a context with protected terms",
					));
				}

				let previous = result.previous.take();
				result = Context::new(active.original_base.clone());
				if !propagate {
					result.previous = previous;
				}
			}
			Value::String(reference) => {
				let url = match &result.base {
					Some(base) => resolve(reference, base),
					None => reference.clone(),
				};

				if env.remote_stack.len() >= MAX_CONTEXT_RECURSION {
					return Err(Error::coded(
						ErrorCode::ContextOverflow,
						format!("too many nested remote contexts at <{url}>"),
					));
				}

				let document = env.loader.load_shared(&url).map_err(|e| {
					Error::coded(
						ErrorCode::LoadingRemoteContextFailed,
						format!("cannot load <{url}>: {e}"),
					)
				})?;

				let remote_context = document.get("@context").ok_or_else(|| {
					Error::coded(
						ErrorCode::InvalidRemoteContext,
						format!("<{url}> has no @context entry"),
					)
				})?;

				env.remote_stack.push(url);
				let current = Arc::new(result);
				result = process(&current, remote_context, env, true, override_protected)?;
				env.remote_stack.pop();
			}
			Value::Object(map) => {
				process_map(&mut result, map, env, remote, override_protected)?;
			}
			other => {
				return Err(Error::coded(
					ErrorCode::InvalidLocalContext,
					format!("invalid local context {other}"),
				))
			}
		}
	}

	if !propagate {
		result.propagate = false;
	}

	Ok(result)
}

const CONTEXT_KEYWORDS: [&str; 8] = [
	"@base",
	"@direction",
	"@import",
	"@language",
	"@propagate",
	"@protected",
	"@version",
	"@vocab",
];

fn process_map<L: Loader>(
	result: &mut Context,
	map: &Map<String, Value>,
	env: &mut Env<L>,
	remote: bool,
	override_protected: bool,
) -> Result<()> {
	if let Some(version) = map.get("@version") {
		match version.as_f64().and_then(ProcessingMode::from_version) {
			Some(ProcessingMode::V1_1) => {
				env.require_1_1("@version 1.1")?;
				result.version = Some(ProcessingMode::V1_1)
			}
			_ => {
				return Err(Error::coded(
					ErrorCode::InvalidVersionValue,
					format!("invalid @version {version}"),
				))
			}
		}
	}

	let imported;
	let map = match map.get("@import") {
		Some(Value::String(reference)) => {
			env.require_1_1("@import")?;
			let url = match &result.base {
				Some(base) => resolve(reference, base),
				None => reference.clone(),
			};

			let document = env.loader.load_shared(&url).map_err(|e| {
				Error::coded(
					ErrorCode::LoadingRemoteContextFailed,
					format!("cannot import <{url}>: {e}"),
				)
			})?;

			match document.get("@context") {
				Some(Value::Object(import)) if !import.contains_key("@import") => {
					let mut merged = import.clone();
					for (key, value) in map {
						merged.insert(key.clone(), value.clone());
					}
					imported = merged;
					&imported
				}
				_ => {
					return Err(Error::coded(
						ErrorCode::InvalidRemoteContext,
						format!("<{url}> cannot be imported"),
					))
				}
			}
		}
		Some(other) => {
			return Err(Error::coded(
				ErrorCode::InvalidContextEntry,
				format!("invalid @import value {other}"),
			))
		}
		None => map,
	};

	if !remote {
		match map.get("@base") {
			Some(Value::Null) => result.base = None,
			Some(Value::String(base)) => {
				let resolved = match IriBuf::new(base.as_str()) {
					Ok(iri) => Some(iri),
					Err(_) => match (&result.base, IriRef::new(base.as_str())) {
						(Some(current), Ok(iri_ref)) => Some(iri_ref.resolved(current.as_iri())),
						_ => None,
					},
				};

				match resolved {
					Some(iri) => result.base = Some(iri),
					None => {
						return Err(Error::coded(
							ErrorCode::InvalidBaseIri,
							format!("invalid @base <{base}>"),
						))
					}
				}
			}
			Some(other) => {
				return Err(Error::coded(
					ErrorCode::InvalidBaseIri,
					format!("invalid @base {other}"),
				))
			}
			None => (),
		}
	}

	match map.get("@vocab") {
		Some(Value::Null) => result.vocab = None,
		Some(Value::String(vocab)) => result.vocab = Some(expand_vocab_mapping(result, vocab)?),
		Some(other) => {
			return Err(Error::coded(
				ErrorCode::InvalidVocabMapping,
				format!("invalid @vocab {other}"),
			))
		}
		None => (),
	}

	match map.get("@language") {
		Some(Value::Null) => result.language = None,
		Some(Value::String(language)) => {
			result.language = Some(language_tag(language, env.options));
		}
		Some(other) => {
			return Err(Error::coded(
				ErrorCode::InvalidDefaultLanguage,
				format!("invalid @language {other}"),
			))
		}
		None => (),
	}

	if let Some(direction) = map.get("@direction") {
		env.require_1_1("@direction")?;
		result.direction = match direction {
			Value::Null => None,
			Value::String(s) => Some(Direction::parse(s).ok_or_else(|| {
				Error::coded(
					ErrorCode::InvalidBaseDirection,
					format!("invalid @direction `{s}`"),
				)
			})?),
			other => {
				return Err(Error::coded(
					ErrorCode::InvalidBaseDirection,
					format!("invalid @direction {other}"),
				))
			}
		}
	}

	if map.contains_key("@propagate") {
		env.require_1_1("@propagate")?;
	}

	let protected = match map.get("@protected") {
		Some(Value::Bool(b)) => *b,
		Some(other) => {
			return Err(Error::coded(
				ErrorCode::InvalidContextEntry,
				format!("invalid @protected {other}"),
			))
		}
		None => false,
	};

	let mut builder = TermBuilder {
		local: map,
		defined: HashMap::new(),
		protected,
		override_protected,
		mode: env.mode(),
		options: env.options,
	};

	for term in map.keys() {
		if !CONTEXT_KEYWORDS.contains(&term.as_str()) {
			builder.define(result, term)?;
		}
	}

	Ok(())
}

fn expand_vocab_mapping(context: &Context, vocab: &str) -> Result<String> {
	if vocab.starts_with("_:") || has_scheme(vocab) {
		return Ok(context.expand_iri(vocab, true).unwrap_or_else(|| vocab.to_owned()));
	}

	match &context.base {
		Some(base) => Ok(resolve(vocab, base)),
		None => Err(Error::coded(
			ErrorCode::InvalidVocabMapping,
			format!("relative @vocab `{vocab}` without base IRI"),
		)),
	}
}

/// Term definition creation, within one local context.
struct TermBuilder<'a> {
	local: &'a Map<String, Value>,

	/// `false` while the term is being defined, `true` once done.
	defined: HashMap<String, bool>,
	protected: bool,
	override_protected: bool,
	mode: ProcessingMode,
	options: &'a Options,
}

const TERM_DEFINITION_KEYS: [&str; 11] = [
	"@id",
	"@reverse",
	"@type",
	"@container",
	"@language",
	"@direction",
	"@index",
	"@nest",
	"@prefix",
	"@context",
	"@protected",
];

impl<'a> TermBuilder<'a> {
	fn define(&mut self, result: &mut Context, term: &str) -> Result<()> {
		match self.defined.get(term) {
			Some(true) => return Ok(()),
			Some(false) => {
				return Err(Error::coded(
					ErrorCode::InvalidIriMapping,
					format!("cyclic IRI mapping for term `{term}`"),
				))
			}
			None => (),
		}

		if term.is_empty() {
			return Err(Error::coded(
				ErrorCode::InvalidTermDefinition,
				"empty term",
			));
		}

		let Some(value) = self.local.get(term) else {
			return Ok(());
		};

		self.defined.insert(term.to_owned(), false);

		if term == "@type" {
			let valid = self.mode == ProcessingMode::V1_1
				&& value.as_object().is_some_and(|m| {
					!m.is_empty()
						&& m.iter().all(|(k, v)| match k.as_str() {
							"@container" => v == "@set",
							"@protected" => v.is_boolean(),
							_ => false,
						})
				});

			if !valid {
				return Err(Error::coded(
					ErrorCode::KeywordRedefinition,
					"invalid redefinition of @type",
				));
			}

			self.defined.insert(term.to_owned(), true);
			return Ok(());
		}

		if is_keyword(term) {
			return Err(Error::coded(
				ErrorCode::KeywordRedefinition,
				format!("cannot redefine keyword {term}"),
			));
		}

		if is_keyword_like(term) {
			log::warn!("ignoring keyword-like term `{term}`");
			self.defined.insert(term.to_owned(), true);
			return Ok(());
		}

		let previous = result.terms.remove(term);

		let (simple, map) = match value {
			Value::Null => {
				let mut map = Map::new();
				map.insert("@id".to_owned(), Value::Null);
				(false, map)
			}
			Value::String(id) => {
				let mut map = Map::new();
				map.insert("@id".to_owned(), Value::String(id.clone()));
				(true, map)
			}
			Value::Object(map) => (false, map.clone()),
			other => {
				return Err(Error::coded(
					ErrorCode::InvalidTermDefinition,
					format!("invalid definition for term `{term}`: {other}"),
				))
			}
		};

		if let Some(key) = map
			.keys()
			.find(|k| !TERM_DEFINITION_KEYS.contains(&k.as_str()))
		{
			return Err(Error::coded(
				ErrorCode::InvalidTermDefinition,
				format!("invalid entry `{key}` in definition of `{term}`"),
			));
		}

		let mut definition = TermDefinition {
			protected: match map.get("@protected") {
				Some(Value::Bool(b)) => *b,
				Some(_) => {
					return Err(Error::coded(
						ErrorCode::InvalidTermDefinition,
						format!("invalid @protected in definition of `{term}`"),
					))
				}
				None => self.protected,
			},
			..Default::default()
		};

		if let Some(ty) = map.get("@type") {
			let ty = ty.as_str().ok_or_else(|| {
				Error::coded(
					ErrorCode::InvalidTypeMapping,
					format!("invalid @type mapping for `{term}`"),
				)
			})?;

			definition.type_mapping = Some(match self.expand(result, ty, true)?.as_deref() {
				Some("@id") => TypeMapping::Id,
				Some("@vocab") => TypeMapping::Vocab,
				Some("@json") if self.mode == ProcessingMode::V1_1 => TypeMapping::Json,
				Some("@none") if self.mode == ProcessingMode::V1_1 => TypeMapping::None,
				Some(iri) if Iri::new(iri).is_ok() => TypeMapping::Iri(iri.to_owned()),
				_ => {
					return Err(Error::coded(
						ErrorCode::InvalidTypeMapping,
						format!("invalid @type mapping `{ty}` for `{term}`"),
					))
				}
			});
		}

		if let Some(reverse) = map.get("@reverse") {
			if map.contains_key("@id") || map.contains_key("@nest") {
				return Err(Error::coded(
					ErrorCode::InvalidReverseProperty,
					format!("reverse term `{term}` cannot have @id or @nest"),
				));
			}

			let reverse = reverse.as_str().ok_or_else(|| {
				Error::coded(
					ErrorCode::InvalidIriMapping,
					format!("invalid @reverse mapping for `{term}`"),
				)
			})?;

			if is_keyword_like(reverse) {
				log::warn!("ignoring keyword-like @reverse of `{term}`");
				self.defined.insert(term.to_owned(), true);
				return Ok(());
			}

			match self.expand(result, reverse, true)? {
				Some(id) if id.starts_with("_:") || Iri::new(id.as_str()).is_ok() => {
					definition.id = Some(id);
					definition.reverse = true;
				}
				_ => {
					return Err(Error::coded(
						ErrorCode::InvalidIriMapping,
						format!("invalid @reverse mapping `{reverse}` for `{term}`"),
					))
				}
			}
		} else if let Some(id) = map.get("@id").filter(|id| id.as_str() != Some(term)) {
			match id {
				Value::Null => definition.id = None,
				Value::String(id) => {
					if !is_keyword(id) && is_keyword_like(id) {
						log::warn!("ignoring keyword-like @id of `{term}`");
						self.defined.insert(term.to_owned(), true);
						return Ok(());
					}

					let expanded = self.expand(result, id, true)?;
					match expanded {
						Some(expanded)
							if is_keyword(&expanded)
								|| expanded.starts_with("_:")
								|| Iri::new(expanded.as_str()).is_ok() =>
						{
							if expanded == "@context" {
								return Err(Error::coded(
									ErrorCode::InvalidKeywordAlias,
									format!("`{term}` cannot alias @context"),
								));
							}

							definition.prefix = simple
								&& !term.contains(':') && !term.contains('/')
								&& (expanded.starts_with("_:") || ends_with_gen_delim(&expanded));
							definition.id = Some(expanded);
						}
						_ => {
							return Err(Error::coded(
								ErrorCode::InvalidIriMapping,
								format!("invalid @id mapping `{id}` for `{term}`"),
							))
						}
					}
				}
				other => {
					return Err(Error::coded(
						ErrorCode::InvalidIriMapping,
						format!("invalid @id mapping {other} for `{term}`"),
					))
				}
			}
		} else if let Some((prefix, suffix)) = split_compact_iri(term) {
			if self.local.contains_key(prefix) {
				self.define(result, prefix)?;
			}

			definition.id = match result.terms.get(prefix).and_then(|d| d.id.as_ref()) {
				Some(prefix_iri) => Some(format!("{prefix_iri}{suffix}")),
				None => Some(term.to_owned()),
			};
		} else if has_scheme(term) {
			definition.id = Some(term.to_owned())
		} else if let Some(vocab) = &result.vocab {
			definition.id = Some(format!("{vocab}{term}"))
		} else {
			return Err(Error::coded(
				ErrorCode::InvalidIriMapping,
				format!("no IRI mapping for term `{term}`"),
			));
		}

		if let Some(container) = map.get("@container") {
			definition.container = Containers::parse(container, self.mode)?;
			if definition.reverse {
				let c = definition.container;
				if c.list || c.language || c.id || c.type_ || c.graph {
					return Err(Error::coded(
						ErrorCode::InvalidReverseProperty,
						format!("invalid container for reverse term `{term}`"),
					));
				}
			}
		}

		if let Some(index) = map.get("@index") {
			match index.as_str() {
				Some(index)
					if self.mode == ProcessingMode::V1_1
						&& definition.container.index
						&& !is_keyword(index) =>
				{
					definition.index = Some(index.to_owned())
				}
				_ => {
					return Err(Error::coded(
						ErrorCode::InvalidTermDefinition,
						format!("invalid @index in definition of `{term}`"),
					))
				}
			}
		}

		if let Some(context) = map.get("@context") {
			if self.mode == ProcessingMode::V1_0 {
				return Err(Error::coded(
					ErrorCode::InvalidTermDefinition,
					"scoped contexts require JSON-LD 1.1",
				));
			}
			definition.context = Some(context.clone());
		}

		if !map.contains_key("@type") {
			match map.get("@language") {
				Some(Value::Null) => definition.language = Some(None),
				Some(Value::String(language)) => {
					definition.language = Some(Some(language_tag(language, self.options)))
				}
				Some(other) => {
					return Err(Error::coded(
						ErrorCode::InvalidDefaultLanguage,
						format!("invalid @language {other} for `{term}`"),
					))
				}
				None => (),
			}

			match map.get("@direction") {
				Some(Value::Null) => definition.direction = Some(None),
				Some(Value::String(s)) if Direction::parse(s).is_some() => {
					definition.direction = Some(Direction::parse(s))
				}
				Some(other) => {
					return Err(Error::coded(
						ErrorCode::InvalidBaseDirection,
						format!("invalid @direction {other} for `{term}`"),
					))
				}
				None => (),
			}
		}

		if let Some(nest) = map.get("@nest") {
			match nest.as_str() {
				Some(nest) if nest == "@nest" || !is_keyword(nest) => {
					definition.nest = Some(nest.to_owned())
				}
				_ => {
					return Err(Error::coded(
						ErrorCode::InvalidNestValue,
						format!("invalid @nest in definition of `{term}`"),
					))
				}
			}
		}

		if let Some(prefix) = map.get("@prefix") {
			match prefix {
				Value::Bool(b) if !term.contains(':') && !term.contains('/') => {
					if *b && definition.id.as_deref().is_some_and(is_keyword) {
						return Err(Error::coded(
							ErrorCode::InvalidTermDefinition,
							format!("keyword alias `{term}` cannot be a prefix"),
						));
					}
					definition.prefix = *b
				}
				_ => {
					return Err(Error::coded(
						ErrorCode::InvalidTermDefinition,
						format!("invalid @prefix in definition of `{term}`"),
					))
				}
			}
		}

		if let Some(previous) = previous {
			if previous.protected && !self.override_protected {
				if !previous.same_as(&definition) {
					return Err(Error::coded(
						ErrorCode::ProtectedTermRedefinition,
						format!("cannot redefine protected term `{term}`"),
					));
				}
				definition = previous;
			}
		}

		result.terms.insert(term.to_owned(), definition);
		self.defined.insert(term.to_owned(), true);
		Ok(())
	}

	/// IRI expansion inside a local context, defining dependencies first.
	fn expand(&mut self, result: &mut Context, value: &str, vocab: bool) -> Result<Option<String>> {
		if !is_keyword(value) && self.local.contains_key(value) {
			self.define(result, value)?;
		}

		if let Some((prefix, _)) = split_compact_iri(value) {
			if self.local.contains_key(prefix) {
				self.define(result, prefix)?;
			}

			if let Some(Some(prefix_iri)) = result.terms.get(prefix).map(|d| d.id.as_ref()) {
				if !result.terms.contains_key(value) {
					return Ok(Some(format!("{prefix_iri}{}", &value[prefix.len() + 1..])));
				}
			}
		}

		Ok(result.expand_iri(value, vocab))
	}
}

/// Validates and optionally normalizes a language tag.
///
/// Malformed tags are kept as they are, since they can only be rejected
/// once they are used.
fn language_tag(tag: &str, options: &Options) -> String {
	if langtag::LanguageTagBuf::new(tag.as_bytes().to_vec()).is_err() {
		log::warn!("malformed language tag `{tag}`");
	}

	if options.normalize_language_tags || options.processing_mode == ProcessingMode::V1_0 {
		tag.to_lowercase()
	} else {
		tag.to_owned()
	}
}

/// Splits a compact IRI into prefix and suffix.
pub fn split_compact_iri(value: &str) -> Option<(&str, &str)> {
	let i = value.find(':')?;
	let (prefix, suffix) = (&value[..i], &value[i + 1..]);
	if prefix.is_empty() || suffix.starts_with("//") {
		None
	} else {
		Some((prefix, suffix))
	}
}

/// Checks that the value starts with an IRI scheme.
pub fn has_scheme(value: &str) -> bool {
	match value.find(':') {
		Some(i) => {
			let scheme = value[..i].as_bytes();
			!scheme.is_empty()
				&& scheme[0].is_ascii_alphabetic()
				&& scheme
					.iter()
					.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.'))
		}
		None => false,
	}
}

fn ends_with_gen_delim(iri: &str) -> bool {
	iri.ends_with([':', '/', '?', '#', '[', ']', '@'])
}

/// Resolves a reference against a base IRI.
///
/// Invalid references are returned unchanged.
pub fn resolve(reference: &str, base: &IriBuf) -> String {
	match IriRef::new(reference) {
		Ok(iri_ref) => iri_ref.resolved(base.as_iri()).as_str().to_owned(),
		Err(_) => reference.to_owned(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::loader::{MemoryLoader, NoLoader};
	use serde_json::json;

	fn parse(local: Value) -> Result<Arc<Context>> {
		let options = Options::default();
		let mut loader = CachedLoader::new(NoLoader);
		Arc::new(Context::new(None)).parse(&local, &options, &mut loader, false)
	}

	#[test]
	fn vocab_and_terms() {
		let ctx = parse(json!({
			"@vocab": "http://schema.org/",
			"ex": "http://example.org/",
			"knows": {"@id": "ex:knows", "@type": "@id"}
		}))
		.unwrap();

		assert_eq!(ctx.expand_iri("name", true).unwrap(), "http://schema.org/name");
		assert_eq!(ctx.expand_iri("knows", true).unwrap(), "http://example.org/knows");
		assert_eq!(ctx.expand_iri("ex:Person", true).unwrap(), "http://example.org/Person");
		assert_eq!(ctx.type_mapping("knows"), Some(&TypeMapping::Id));
	}

	#[test]
	fn disabled_term() {
		let ctx = parse(json!({"@vocab": "http://ex/", "skip": null})).unwrap();
		assert_eq!(ctx.expand_iri("skip", true), None);
		assert_eq!(ctx.expand_iri("keep", true).unwrap(), "http://ex/keep")
	}

	#[test]
	fn keyword_alias() {
		let ctx = parse(json!({"id": "@id", "type": "@type"})).unwrap();
		assert_eq!(ctx.expand_iri("id", true).unwrap(), "@id");
		assert_eq!(ctx.expand_iri("type", true).unwrap(), "@type")
	}

	#[test]
	fn base_resolution() {
		let ctx = parse(json!({"@base": "http://ex/dir/"})).unwrap();
		assert_eq!(ctx.expand_iri("a", false).unwrap(), "http://ex/dir/a");
		assert_eq!(ctx.expand_iri("a", true).unwrap(), "a")
	}

	#[test]
	fn cyclic_definition() {
		let err = parse(json!({"a": "b", "b": "a"})).unwrap_err();
		assert_eq!(err.code(), Some(ErrorCode::InvalidIriMapping))
	}

	#[test]
	fn containers() {
		let ctx = parse(json!({
			"list": {"@id": "http://ex/list", "@container": "@list"},
			"graph": {"@id": "http://ex/graph", "@container": ["@graph", "@index"]}
		}))
		.unwrap();
		assert!(ctx.container("list").list);
		assert!(ctx.container("graph").is_complex_graph());
		assert!(parse(json!({"x": {"@id": "http://ex/x", "@container": "@foo"}})).is_err())
	}

	#[test]
	fn protected_redefinition() {
		let options = Options::default();
		let mut loader = CachedLoader::new(NoLoader);
		let ctx = Arc::new(Context::new(None))
			.parse(&json!({"@protected": true, "p": "http://ex/p"}), &options, &mut loader, false)
			.unwrap();
		let err = ctx
			.parse(&json!({"p": "http://ex/other"}), &options, &mut loader, false)
			.unwrap_err();
		assert_eq!(err.code(), Some(ErrorCode::ProtectedTermRedefinition));
		assert!(ctx.parse(&json!({"p": "http://ex/p"}), &options, &mut loader, false).is_ok())
	}

	#[test]
	fn remote_context() {
		let options = Options::default();
		let mut loader = CachedLoader::new(
			MemoryLoader::new().with(
				"http://ex/ctx",
				json!({"@context": {"@vocab": "http://ex/v#"}}),
			),
		);
		let root = Arc::new(Context::new(None));
		let ctx = root
			.parse(&json!("http://ex/ctx"), &options, &mut loader, false)
			.unwrap();
		assert_eq!(ctx.vocab(), Some("http://ex/v#"));
		root.parse(&json!("http://ex/ctx"), &options, &mut loader, false)
			.unwrap();
		assert_eq!(loader.fetch_count(), 1)
	}

	#[test]
	fn version_conflict() {
		let options = Options::default().with_processing_mode(ProcessingMode::V1_0);
		let mut loader = CachedLoader::new(NoLoader);
		let err = Arc::new(Context::new(None))
			.parse(&json!({"@version": 1.1}), &options, &mut loader, false)
			.unwrap_err();
		assert_eq!(err.code(), Some(ErrorCode::ProcessingModeConflict))
	}

	#[test]
	fn compact_iri_split() {
		assert_eq!(split_compact_iri("ex:a"), Some(("ex", "a")));
		assert_eq!(split_compact_iri("http://ex/a"), None);
		assert_eq!(split_compact_iri(":a"), None)
	}
}
