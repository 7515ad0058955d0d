//! Parsing state.
//!
//! Every per-depth structure lives in a [`Level`]. Levels are created lazily
//! and reset when the node at their depth closes.
use crate::{
	context::{Containers, Context},
	context_tree::{ContextTree, ScopeKind, ScopedContexts},
	error::{Error, ErrorCode, Result},
	keyword::{is_keyword_like, Key, Keyword, PathKey},
	loader::{CachedLoader, Loader},
	options::Options,
	term::{self, format_term, Quad, Term},
	vocab,
};
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

/// Value waiting for the subject of its node.
#[derive(Debug, Clone)]
pub(crate) struct BufferedValue {
	pub predicate: Term,
	pub object: Term,
	pub reverse: bool,
}

/// Triple waiting for the name of its graph.
#[derive(Debug, Clone)]
pub(crate) struct BufferedTriple {
	pub subject: Term,
	pub predicate: Term,
	pub object: Term,
}

/// Open list.
#[derive(Debug, Clone)]
pub(crate) struct ListPointer {
	/// Last link of the list, if any element was added.
	pub value: Option<Term>,

	/// Depth of the node owning the list property.
	pub root_depth: usize,

	/// Head of the list.
	pub list_id: Term,
}

/// Result of validating a key.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Validation {
	pub valid: bool,
	pub property: bool,
}

/// State attached to one depth.
#[derive(Debug, Default)]
pub(crate) struct Level {
	pub ids: Option<Vec<Term>>,
	pub emitted: bool,
	pub literal: bool,
	pub processed: bool,
	pub index: Option<String>,
	pub validated: Option<(PathKey, Validation)>,
	pub unaliased: Option<(PathKey, Key)>,
	pub values: Vec<BufferedValue>,
	pub graphs: Vec<BufferedTriple>,
	pub list_pointer: Option<ListPointer>,
	pub graph_container_terms: HashMap<String, Term>,
}

/// Where the quads of a node go.
#[derive(Debug, Clone)]
pub(crate) enum GraphTarget {
	/// Known graphs, `None` being the default graph.
	Graphs(Vec<Option<Term>>),

	/// Graph named by the node at the given depth, not yet identified.
	Pending(usize),
}

/// Work item of the dispatcher.
#[derive(Debug)]
pub(crate) enum Work {
	Value {
		keys: Vec<PathKey>,
		value: Value,
		depth: usize,
	},

	/// Resets the node state moved to this depth by a reschedule.
	Release(usize),
}

pub(crate) struct State {
	pub options: Options,
	loader: CachedLoader<Box<dyn Loader>>,
	contexts: ContextTree,
	scoped: ScopedContexts,
	root_context: Option<Arc<Context>>,
	levels: Vec<Level>,
	output: Vec<Quad>,
	blank_count: usize,
	top_level_properties: bool,
	work: Vec<Work>,
	node_indexes: HashMap<String, String>,
}

impl State {
	pub fn new(options: Options, loader: Box<dyn Loader>) -> Self {
		Self {
			options,
			loader: CachedLoader::new(loader),
			contexts: ContextTree::new(),
			scoped: ScopedContexts::default(),
			root_context: None,
			levels: Vec::new(),
			output: Vec::new(),
			blank_count: 0,
			top_level_properties: false,
			work: Vec::new(),
			node_indexes: HashMap::new(),
		}
	}

	pub fn loader(&self) -> &CachedLoader<Box<dyn Loader>> {
		&self.loader
	}

	pub fn scoped_contexts(&self) -> &ScopedContexts {
		&self.scoped
	}

	pub fn level(&self, depth: usize) -> Option<&Level> {
		self.levels.get(depth)
	}

	pub fn level_mut(&mut self, depth: usize) -> &mut Level {
		if self.levels.len() <= depth {
			self.levels.resize_with(depth + 1, Level::default)
		}
		&mut self.levels[depth]
	}

	pub fn ids(&self, depth: usize) -> Option<&[Term]> {
		self.level(depth).and_then(|l| l.ids.as_deref())
	}

	pub fn emitted(&self, depth: usize) -> bool {
		self.level(depth).map(|l| l.emitted).unwrap_or(false)
	}

	pub fn take_output(&mut self) -> Vec<Quad> {
		std::mem::take(&mut self.output)
	}

	pub fn mint_blank(&mut self) -> Result<Term> {
		let label = format!("_:{}{}", self.options.blank_node_prefix, self.blank_count);
		self.blank_count += 1;
		term::blank(&label).ok_or_else(|| {
			Error::coded(
				ErrorCode::InvalidId,
				format!("invalid blank node label `{label}`"),
			)
		})
	}

	/// Appends a quad to the output.
	pub fn emit_quad(&mut self, depth: usize, quad: Quad) {
		if depth == 1 {
			self.top_level_properties = true
		}
		log::trace!("quad {}", term::format_quad(&quad));
		self.output.push(quad)
	}

	pub fn schedule(&mut self, work: Work) {
		self.work.push(work)
	}

	pub fn next_work(&mut self) -> Option<Work> {
		self.work.pop()
	}

	/// Schedules a value job at a shallower depth.
	///
	/// The node state found one level below `depth` moves one level below
	/// `new_depth`, and is released once the job is done.
	pub fn reschedule(&mut self, keys: Vec<PathKey>, value: Value, depth: usize, new_depth: usize) {
		self.shift(depth + 1, new_depth + 1);
		self.schedule(Work::Release(new_depth + 1));
		self.schedule(Work::Value {
			keys,
			value,
			depth: new_depth,
		})
	}

	fn shift(&mut self, from: usize, to: usize) {
		let (ids, emitted, values) = {
			let level = self.level_mut(from);
			(
				level.ids.take(),
				std::mem::take(&mut level.emitted),
				std::mem::take(&mut level.values),
			)
		};

		let target = self.level_mut(to);
		target.ids = ids;
		target.emitted |= emitted;
		target.values.extend(values)
	}

	pub fn release(&mut self, depth: usize) {
		let level = self.level_mut(depth);
		level.ids = None;
		level.emitted = false;
		level.values.clear();
		level.graphs.clear()
	}

	/// Context in effect at the document root.
	pub fn root_context(&mut self) -> Result<Arc<Context>> {
		if let Some(context) = &self.root_context {
			return Ok(context.clone());
		}

		let mut context = Arc::new(Context::new(self.options.base_iri.clone()));
		if let Some(local) = self.options.context.clone() {
			context = context.parse(&local, &self.options, &mut self.loader, false)?;
		}

		self.root_context = Some(context.clone());
		Ok(context)
	}

	/// Processes a local context against `parent`.
	pub fn parse_context(
		&mut self,
		parent: &Arc<Context>,
		local: &Value,
		property_scoped: bool,
	) -> Result<Arc<Context>> {
		parent.parse(local, &self.options, &mut self.loader, property_scoped)
	}

	/// Binds a context to the node at `path`.
	pub fn bind_context(&mut self, path: &[PathKey], context: Arc<Context>) {
		self.contexts.set_context(path, Some(context));
		for level in self.levels.iter_mut().skip(path.len()) {
			level.unaliased = None;
			level.validated = None;
		}
	}

	/// Context applying to the entries at the end of `keys`.
	///
	/// Trailing array indices are ignored, then `offset` keys are dropped.
	/// With an offset of 1 the result is the context of the node holding the
	/// last key; with an offset of 0 it is the context of its value.
	pub fn get_context(&mut self, keys: &[PathKey], offset: usize) -> Result<Arc<Context>> {
		Ok(self.bound_context(keys, offset)?.0)
	}

	/// Same as [`Self::get_context`], along with the length of the path the
	/// context was found at.
	pub fn bound_context(
		&mut self,
		keys: &[PathKey],
		offset: usize,
	) -> Result<(Arc<Context>, usize)> {
		let mut end = keys.len();
		while end > 1 && keys[end - 1].is_index() {
			end -= 1
		}
		let end = end.saturating_sub(offset).max(1);
		let path = &keys[..end];

		let (mut context, bound) = match self.contexts.get_context(path) {
			Some(found) => found,
			None => (self.root_context()?, 1),
		};

		while !context.propagate() && bound < path.len() {
			match context.previous() {
				Some(previous) => context = previous.clone(),
				None => break,
			}
		}

		for key in &path[bound.max(1)..] {
			if let PathKey::Name(name) = key {
				if context.scoped_context(name).is_some() {
					context = self.scoped_context(&context, name, ScopeKind::Property, bound)?;
				}
			}
		}

		Ok((context, bound))
	}

	/// Processes (or reuses) the scoped context of `term`.
	///
	/// `parent` must be derived from the context bound at a path of length
	/// `bound`. The result is forgotten once that path is cleared.
	pub fn scoped_context(
		&mut self,
		parent: &Arc<Context>,
		term: &str,
		kind: ScopeKind,
		bound: usize,
	) -> Result<Arc<Context>> {
		if let Some(scoped) = self.scoped.get(parent, term, kind) {
			return Ok(scoped);
		}

		let Some(local) = parent.scoped_context(term).cloned() else {
			return Ok(parent.clone());
		};

		log::debug!("processing scoped context of `{term}`");
		let mut scoped = self.parse_context(parent, &local, kind == ScopeKind::Property)?;
		if kind == ScopeKind::Type && local.get("@propagate") != Some(&Value::Bool(true)) {
			scoped = Arc::new(scoped.non_propagated(parent.clone()));
		}

		self.scoped.insert(parent, term, kind, scoped.clone(), bound);
		Ok(scoped)
	}

	/// Resolves keyword aliases of the key at `depth`.
	pub fn unalias(&mut self, keys: &[PathKey], depth: usize) -> Result<Key> {
		let raw = &keys[depth];
		if let Some((cached, key)) = self.level(depth).and_then(|l| l.unaliased.as_ref()) {
			if cached == raw {
				return Ok(key.clone());
			}
		}

		let key = match raw {
			PathKey::Root => Key::Root,
			PathKey::Index(i) => Key::Index(*i),
			PathKey::Name(name) => match Keyword::from_str(name) {
				Ok(keyword) => Key::Keyword(keyword),
				Err(_) => {
					let context = self.get_context(&keys[..=depth], 1)?;
					match context
						.expand_iri(name, true)
						.and_then(|e| Keyword::from_str(&e).ok())
					{
						Some(keyword) => Key::Keyword(keyword),
						None if is_keyword_like(name) => Key::Reserved(name.clone()),
						None => Key::Term(name.clone()),
					}
				}
			},
		};

		self.level_mut(depth).unaliased = Some((raw.clone(), key.clone()));
		Ok(key)
	}

	/// Container mapping of the term at `depth`.
	pub fn containers(&mut self, keys: &[PathKey], depth: usize) -> Result<Containers> {
		match &keys[depth] {
			PathKey::Name(name) => {
				let context = self.get_context(&keys[..=depth], 1)?;
				Ok(context.container(name))
			}
			_ => Ok(Containers::default()),
		}
	}

	/// Depth of the node owning the properties found at `depth`.
	///
	/// `@nest` levels and array indices are transparent. Entries of a
	/// `@reverse` map belong to the node holding the map.
	pub fn properties_depth(&mut self, keys: &[PathKey], depth: usize) -> Result<usize> {
		let mut last_valid = depth;
		let mut i = depth;
		while i > 1 {
			i -= 1;
			match self.unalias(keys, i)? {
				Key::Index(_) => (),
				Key::Keyword(Keyword::Reverse) => return Ok(i),
				Key::Keyword(Keyword::Nest) => last_valid = i,
				_ => return Ok(last_valid),
			}
		}
		Ok(last_valid)
	}

	/// Checks that the entry at `depth` sits in a `@reverse` map.
	pub fn in_reverse_map(&mut self, keys: &[PathKey], depth: usize) -> Result<bool> {
		let mut i = depth;
		while i > 1 {
			i -= 1;
			match self.unalias(keys, i)? {
				Key::Index(_) => (),
				key => return Ok(key.is_keyword(Keyword::Reverse)),
			}
		}
		Ok(false)
	}

	/// Checks that the entry at `depth` is part of a literal.
	pub fn is_literal(&mut self, keys: &[PathKey], depth: usize) -> Result<bool> {
		if self.level(depth).is_some_and(|l| l.literal) {
			return Ok(true);
		}

		for i in 1..depth {
			let literal = match self.unalias(keys, i)? {
				Key::Keyword(Keyword::Value) => true,
				Key::Term(term) => self.is_json_term(keys, i, &term)?,
				_ => false,
			};

			if literal {
				for d in i + 1..=depth {
					self.level_mut(d).literal = true
				}
				return Ok(true);
			}
		}

		Ok(false)
	}

	fn is_json_term(&mut self, keys: &[PathKey], depth: usize, term: &str) -> Result<bool> {
		let context = self.get_context(&keys[..=depth], 1)?;
		Ok(matches!(
			context.type_mapping(term),
			Some(crate::context::TypeMapping::Json)
		))
	}

	/// Checks if the value of the key at `depth` is read as a whole: local
	/// contexts, `@value` contents and JSON literals.
	pub fn is_opaque(&mut self, keys: &[PathKey], depth: usize) -> Result<bool> {
		match self.unalias(keys, depth)? {
			Key::Keyword(Keyword::Context | Keyword::Value) => Ok(true),
			Key::Term(term) => self.is_json_term(keys, depth, &term),
			_ => Ok(false),
		}
	}

	/// Graph of the quads whose subject is the node at `depth`.
	pub fn graph_for_node(&mut self, keys: &[PathKey], depth: usize) -> Result<GraphTarget> {
		for i in (1..depth.min(keys.len())).rev() {
			match self.unalias(keys, i)? {
				Key::Keyword(Keyword::Graph) => {
					return Ok(match self.ids(i) {
						Some(ids) => GraphTarget::Graphs(ids.iter().cloned().map(Some).collect()),
						None => GraphTarget::Pending(i),
					})
				}
				Key::Term(_) => {
					if self.containers(keys, i)?.graph {
						let graph = self.graph_container_term(&keys[..depth.min(keys.len())], i)?;
						return Ok(GraphTarget::Graphs(graph.into_iter().map(Some).collect()));
					}
				}
				_ => (),
			}
		}

		Ok(GraphTarget::Graphs(vec![None]))
	}

	/// Name of the graph introduced by the graph container at
	/// `container_depth`, for the node at the end of `keys`.
	///
	/// Graph names are shared by every node reached through the same map key
	/// and array indices.
	pub fn graph_container_term(
		&mut self,
		keys: &[PathKey],
		container_depth: usize,
	) -> Result<Option<Term>> {
		let containers = self.containers(keys, container_depth)?;
		let mut j = container_depth + 1;
		if containers.id || containers.index {
			if let (true, Some(PathKey::Name(name))) = (containers.id, keys.get(j)) {
				let key = self.unalias(keys, j)?;
				if !key.is_keyword(Keyword::None) {
					let context = self.get_context(&keys[..=j], 1)?;
					if let Some(id) = term::resource_term(&context, name, &self.options)? {
						return Ok(Some(id));
					}
				}
			}
			j += 1
		}

		while j < keys.len() && keys[j].is_index() {
			j += 1
		}

		let composed: String = keys[(container_depth + 1).min(keys.len())..j.min(keys.len())]
			.iter()
			.map(|k| format!(":{k}"))
			.collect();

		if let Some(graph) = self
			.level(container_depth)
			.and_then(|l| l.graph_container_terms.get(&composed))
		{
			return Ok(Some(graph.clone()));
		}

		let graph = self.mint_blank()?;
		self.level_mut(container_depth)
			.graph_container_terms
			.insert(composed, graph.clone());
		Ok(Some(graph))
	}

	fn emit_to(&mut self, target: &GraphTarget, depth: usize, s: Term, p: Term, o: Term) {
		match target {
			GraphTarget::Graphs(graphs) => {
				for g in graphs {
					let quad = rdf_types::Quad(s.clone(), p.clone(), o.clone(), g.clone());
					self.emit_quad(depth, quad)
				}
			}
			GraphTarget::Pending(graph_depth) => {
				let level = self.level_mut(*graph_depth);
				level.graphs.push(BufferedTriple {
					subject: s,
					predicate: p,
					object: o,
				});
				level.emitted = true
			}
		}
	}

	/// Emits a triple whose subject is the node at `depth`.
	pub fn emit_triple(
		&mut self,
		keys: &[PathKey],
		depth: usize,
		s: Term,
		p: Term,
		o: Term,
	) -> Result<()> {
		let target = self.graph_for_node(keys, depth)?;
		self.emit_to(&target, depth, s, p, o);
		Ok(())
	}

	/// Adds property values to the node owning the entry at `depth`.
	///
	/// Values are emitted right away when the node subject is known and
	/// buffered otherwise.
	pub fn handle_predicate_terms(
		&mut self,
		keys: &[PathKey],
		depth: usize,
		predicates: &[Term],
		objects: &[Term],
		reverse: bool,
	) -> Result<()> {
		if predicates.is_empty() || objects.is_empty() {
			return Ok(());
		}

		if reverse && objects.iter().any(term::is_literal) {
			return Err(Error::coded(
				ErrorCode::InvalidReversePropertyValue,
				"reverse property values must be nodes",
			));
		}

		let depth = self.properties_depth(keys, depth)?;
		match self.ids(depth).map(<[Term]>::to_vec) {
			Some(subjects) => {
				let target = self.graph_for_node(keys, depth)?;
				for s in &subjects {
					for p in predicates {
						for o in objects {
							let (s, o) = if reverse {
								(o.clone(), s.clone())
							} else {
								(s.clone(), o.clone())
							};
							self.emit_to(&target, depth, s, p.clone(), o)
						}
					}
				}
			}
			None => {
				let level = self.level_mut(depth);
				for p in predicates {
					for o in objects {
						level.values.push(BufferedValue {
							predicate: p.clone(),
							object: o.clone(),
							reverse,
						})
					}
				}
			}
		}

		self.level_mut(depth).emitted = true;
		Ok(())
	}

	/// Adds an element to the list open at `depth`.
	pub fn handle_list_element(
		&mut self,
		keys: &[PathKey],
		item: Option<Term>,
		depth: usize,
		root_depth: usize,
	) -> Result<()> {
		let nil = term::iri(vocab::RDF_NIL);
		let Some(item) = item else {
			let level = self.level_mut(depth);
			if level.list_pointer.is_none() {
				level.list_pointer = Some(ListPointer {
					value: None,
					root_depth,
					list_id: nil,
				})
			}
			return Ok(());
		};

		let link = self.mint_blank()?;
		let pointer = match self.level_mut(depth).list_pointer.take() {
			Some(ListPointer {
				value: Some(previous),
				root_depth,
				list_id,
			}) => {
				self.emit_triple(
					keys,
					root_depth,
					previous,
					term::iri(vocab::RDF_REST),
					link.clone(),
				)?;
				ListPointer {
					value: Some(link.clone()),
					root_depth,
					list_id,
				}
			}
			_ => ListPointer {
				value: Some(link.clone()),
				root_depth,
				list_id: link.clone(),
			},
		};

		self.level_mut(depth).list_pointer = Some(pointer);
		self.emit_triple(keys, root_depth, link, term::iri(vocab::RDF_FIRST), item)
	}

	/// Closes the list open at `depth`, making its head the id of the node
	/// holding the list.
	pub fn terminate_list(&mut self, keys: &[PathKey], depth: usize) -> Result<()> {
		let Some(pointer) = self.level_mut(depth).list_pointer.take() else {
			return Ok(());
		};

		if let Some(last) = pointer.value {
			self.emit_triple(
				keys,
				pointer.root_depth,
				last,
				term::iri(vocab::RDF_REST),
				term::iri(vocab::RDF_NIL),
			)?;
		}

		self.level_mut(pointer.root_depth + 1).ids = Some(vec![pointer.list_id]);
		Ok(())
	}

	/// Makes sure the node at `depth` has a subject.
	pub fn node_id(&mut self, depth: usize) -> Result<Vec<Term>> {
		if let Some(ids) = self.ids(depth) {
			return Ok(ids.to_vec());
		}

		let id = self.mint_blank()?;
		let level = self.level_mut(depth);
		level.ids = Some(vec![id.clone()]);
		level.emitted = true;
		Ok(vec![id])
	}

	/// Drains the buffers of the node at `depth`.
	pub fn flush(&mut self, keys: &[PathKey], depth: usize) -> Result<()> {
		let (values, graphs) = {
			let level = self.level_mut(depth);
			(
				std::mem::take(&mut level.values),
				std::mem::take(&mut level.graphs),
			)
		};

		if values.is_empty() && graphs.is_empty() {
			return Ok(());
		}

		let known = self.ids(depth).is_some();
		if depth == 1 && !known && values.is_empty() && !self.top_level_properties {
			for t in graphs {
				self.output
					.push(rdf_types::Quad(t.subject, t.predicate, t.object, None))
			}
			return Ok(());
		}

		let subjects = self.node_id(depth)?;

		if !values.is_empty() {
			let target = self.graph_for_node(keys, depth)?;
			for v in values {
				for s in &subjects {
					let (s, o) = if v.reverse {
						(v.object.clone(), s.clone())
					} else {
						(s.clone(), v.object.clone())
					};
					self.emit_to(&target, depth, s, v.predicate.clone(), o)
				}
			}
		}

		for t in graphs {
			for g in &subjects {
				self.output.push(rdf_types::Quad(
					t.subject.clone(),
					t.predicate.clone(),
					t.object.clone(),
					Some(g.clone()),
				))
			}
		}

		Ok(())
	}

	/// Checks `@index` consistency of nodes sharing an identifier.
	pub fn check_index(&mut self, depth: usize) -> Result<()> {
		if !self.options.validate_value_indexes {
			return Ok(());
		}

		let Some(level) = self.levels.get(depth) else {
			return Ok(());
		};

		if let (Some(index), Some(ids)) = (&level.index, &level.ids) {
			for id in ids {
				let id = format_term(id);
				match self.node_indexes.get(&id) {
					Some(other) if other != index => {
						return Err(Error::coded(
							ErrorCode::ConflictingIndexes,
							format!("node {id} has indexes `{other}` and `{index}`"),
						))
					}
					Some(_) => (),
					None => {
						self.node_indexes.insert(id, index.clone());
					}
				}
			}
		}

		Ok(())
	}

	/// Resets the level at `depth` and drops the contexts of its node.
	pub fn clear(&mut self, keys: &[PathKey], depth: usize) {
		if let Some(level) = self.levels.get_mut(depth) {
			*level = Level::default()
		}
		self.contexts.remove(&keys[..depth.min(keys.len())]);
		self.scoped.forget(depth)
	}
}
