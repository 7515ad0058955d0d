//! Entry handlers.
//!
//! Every completed value is routed to exactly one handler. Handlers are
//! tried in a fixed order, and the first one whose [`EntryHandler::test`]
//! succeeds handles the value.
use crate::{
	container::{
		IdContainerHandler, IndexContainerHandler, LanguageContainerHandler, TypeContainerHandler,
	},
	context_tree::ScopeKind,
	error::{Error, ErrorCode, Result},
	keyword::{Key, Keyword, PathKey},
	state::{State, Validation, Work},
	term::{self, node_entries, predicate_term, vocab_or_base_term, Term},
	vocab,
};
use serde_json::Value;
use std::sync::Arc;

pub(crate) trait EntryHandler: Sync {
	fn name(&self) -> &'static str;

	/// Entries accepted by this handler make their value a property value.
	fn is_property_handler(&self) -> bool {
		false
	}

	/// Handling an entry marks the node as having processed entries.
	fn is_stack_processor(&self) -> bool {
		true
	}

	/// Checks that the key at `depth` is an acceptable ancestor for the
	/// entries below it.
	fn validate(
		&self,
		state: &mut State,
		keys: &[PathKey],
		depth: usize,
		_in_property: bool,
	) -> Result<bool> {
		self.test(state, keys, depth)
	}

	fn test(&self, state: &mut State, keys: &[PathKey], depth: usize) -> Result<bool>;

	fn handle(
		&self,
		state: &mut State,
		keys: &[PathKey],
		value: &Value,
		depth: usize,
	) -> Result<()>;
}

static HANDLERS: &[&dyn EntryHandler] = &[
	&ContextHandler,
	&IdHandler,
	&GraphHandler,
	&TypeHandler,
	&ValueHandler,
	&NestHandler,
	&IncludedHandler,
	&AnnotationHandler,
	&UnknownKeywordHandler,
	&ArrayHandler,
	&IndexContainerHandler,
	&LanguageContainerHandler,
	&IdContainerHandler,
	&TypeContainerHandler,
	&PredicateHandler,
	&InvalidPredicateHandler,
];

/// Handles a completed value, along with every job it schedules.
pub(crate) fn run(state: &mut State, keys: Vec<PathKey>, value: Value, depth: usize) -> Result<()> {
	state.schedule(Work::Value { keys, value, depth });
	while let Some(work) = state.next_work() {
		match work {
			Work::Value { keys, value, depth } => dispatch(state, &keys, &value, depth)?,
			Work::Release(depth) => state.release(depth),
		}
	}

	Ok(())
}

fn dispatch(state: &mut State, keys: &[PathKey], value: &Value, depth: usize) -> Result<()> {
	let mut in_property = false;
	for i in 1..depth {
		let validation = validate_key(state, keys, i, in_property)?;
		if !validation.valid {
			log::trace!("skipping {}: invalid key `{}`", path(keys, depth), keys[i]);
			return Ok(());
		}
		in_property = validation.property
	}

	if state.is_literal(keys, depth)? {
		return Ok(());
	}

	for handler in HANDLERS {
		if handler.test(state, keys, depth)? {
			log::trace!("{} at depth {depth} handled by {}", path(keys, depth), handler.name());
			handler.handle(state, keys, value, depth)?;
			if handler.is_stack_processor() {
				state.level_mut(depth).processed = true
			}
			break;
		}
	}

	Ok(())
}

fn validate_key(
	state: &mut State,
	keys: &[PathKey],
	depth: usize,
	in_property: bool,
) -> Result<Validation> {
	let raw = &keys[depth];
	if let Some((cached, validation)) = state.level(depth).and_then(|l| l.validated.as_ref()) {
		if cached == raw {
			return Ok(*validation);
		}
	}

	let mut validation = Validation {
		valid: false,
		property: in_property,
	};

	for handler in HANDLERS {
		if handler.validate(state, keys, depth, in_property)? {
			validation = Validation {
				valid: true,
				property: in_property || handler.is_property_handler(),
			};
			break;
		}
	}

	state.level_mut(depth).validated = Some((raw.clone(), validation));
	Ok(validation)
}

/// Readable path of the key at `depth`.
fn path(keys: &[PathKey], depth: usize) -> String {
	if depth == 0 {
		return "the document root".to_owned();
	}

	keys[1..=depth.min(keys.len() - 1)]
		.iter()
		.map(|k| format!("/{k}"))
		.collect()
}

fn is_keyword(state: &mut State, keys: &[PathKey], depth: usize, keyword: Keyword) -> Result<bool> {
	Ok(state.unalias(keys, depth)?.is_keyword(keyword))
}

/// Links the node found one level below `depth` to the node holding the
/// property at `depth - 1`.
pub(crate) fn link_to_parent(
	state: &mut State,
	keys: &[PathKey],
	depth: usize,
	objects: &[Term],
) -> Result<()> {
	let Some(term) = keys[depth - 1].as_name() else {
		return Ok(());
	};

	let context = state.get_context(&keys[..depth], 1)?;
	let Some(predicate) = predicate_term(&context, term, &state.options) else {
		return Ok(());
	};

	let reverse = context.is_reverse(term) ^ state.in_reverse_map(keys, depth - 1)?;
	state.handle_predicate_terms(&keys[..depth], depth - 1, &[predicate], objects, reverse)
}

/// `@context` entries.
struct ContextHandler;

impl EntryHandler for ContextHandler {
	fn name(&self) -> &'static str {
		"@context"
	}

	fn is_stack_processor(&self) -> bool {
		false
	}

	fn test(&self, state: &mut State, keys: &[PathKey], depth: usize) -> Result<bool> {
		is_keyword(state, keys, depth, Keyword::Context)
	}

	fn handle(
		&self,
		state: &mut State,
		keys: &[PathKey],
		value: &Value,
		depth: usize,
	) -> Result<()> {
		let out_of_order = state
			.level(depth)
			.is_some_and(|l| l.processed || l.ids.is_some());

		if out_of_order {
			if state.options.allow_out_of_order_context {
				log::warn!(
					"@context found after other entries at {}",
					path(keys, depth)
				);
			} else {
				return Err(Error::coded(
					ErrorCode::InvalidStreamingKeyOrder,
					format!("@context must come first in {}", path(keys, depth - 1)),
				));
			}
		}

		let parent = state.get_context(keys, 1)?;
		let context = state.parse_context(&parent, value, false)?;
		state.bind_context(&keys[..depth], context);
		Ok(())
	}
}

/// `@id` entries.
struct IdHandler;

impl EntryHandler for IdHandler {
	fn name(&self) -> &'static str {
		"@id"
	}

	fn test(&self, state: &mut State, keys: &[PathKey], depth: usize) -> Result<bool> {
		is_keyword(state, keys, depth, Keyword::Id)
	}

	fn handle(
		&self,
		state: &mut State,
		keys: &[PathKey],
		value: &Value,
		depth: usize,
	) -> Result<()> {
		let Value::String(id) = value else {
			return Err(Error::coded(
				ErrorCode::InvalidId,
				format!("@id must be a string, found {value}"),
			));
		};

		let node_depth = state.properties_depth(keys, depth)?;
		if state.ids(node_depth).is_some() {
			return Err(Error::coded(
				ErrorCode::CollidingKeywords,
				format!("node {} has more than one @id", path(keys, depth - 1)),
			));
		}

		let context = state.get_context(keys, 1)?;
		let ids = term::resource_term(&context, id, &state.options)?;
		state.level_mut(node_depth).ids = Some(ids.into_iter().collect());
		Ok(())
	}
}

/// `@graph` entries.
///
/// Graph membership is read from the key path when nodes emit, so there is
/// nothing to record here.
struct GraphHandler;

impl EntryHandler for GraphHandler {
	fn name(&self) -> &'static str {
		"@graph"
	}

	fn test(&self, state: &mut State, keys: &[PathKey], depth: usize) -> Result<bool> {
		is_keyword(state, keys, depth, Keyword::Graph)
	}

	fn handle(
		&self,
		_state: &mut State,
		keys: &[PathKey],
		value: &Value,
		depth: usize,
	) -> Result<()> {
		if !value.is_object() && !value.is_array() && !value.is_null() {
			log::warn!("ignoring free-floating value in {}", path(keys, depth));
		}
		Ok(())
	}
}

/// `@type` entries of nodes.
struct TypeHandler;

impl EntryHandler for TypeHandler {
	fn name(&self) -> &'static str {
		"@type"
	}

	fn test(&self, state: &mut State, keys: &[PathKey], depth: usize) -> Result<bool> {
		is_keyword(state, keys, depth, Keyword::Type)
	}

	fn handle(
		&self,
		state: &mut State,
		keys: &[PathKey],
		value: &Value,
		depth: usize,
	) -> Result<()> {
		let types: Vec<&str> = match value {
			Value::String(ty) => vec![ty.as_str()],
			Value::Array(items) => items
				.iter()
				.map(|item| {
					item.as_str().ok_or_else(|| {
						Error::coded(
							ErrorCode::InvalidTypeValue,
							format!("@type values must be strings, found {item}"),
						)
					})
				})
				.collect::<Result<_>>()?,
			other => {
				return Err(Error::coded(
					ErrorCode::InvalidTypeValue,
					format!("@type must be a string or an array of strings, found {other}"),
				))
			}
		};

		let node_depth = state.properties_depth(keys, depth)?;
		let (context, bound) = state.bound_context(keys, 1)?;

		let mut objects = Vec::new();
		for ty in &types {
			if let Some(term) = vocab_or_base_term(&context, ty, &state.options)? {
				objects.push(term)
			}
		}

		let mut sorted = types.clone();
		sorted.sort_unstable();
		let mut scoped = context.clone();
		for ty in sorted {
			if context.scoped_context(ty).is_some() {
				scoped = state.scoped_context(&scoped, ty, ScopeKind::Type, bound)?;
			}
		}

		if !Arc::ptr_eq(&scoped, &context) {
			state.bind_context(&keys[..node_depth], scoped);
		}

		state.handle_predicate_terms(keys, depth, &[term::iri(vocab::RDF_TYPE)], &objects, false)
	}
}

/// `@value` entries.
///
/// The literal is built from the whole value object by the property holding
/// it. Here the node is only marked as a literal.
struct ValueHandler;

impl EntryHandler for ValueHandler {
	fn name(&self) -> &'static str {
		"@value"
	}

	fn test(&self, state: &mut State, keys: &[PathKey], depth: usize) -> Result<bool> {
		is_keyword(state, keys, depth, Keyword::Value)
	}

	fn handle(
		&self,
		state: &mut State,
		_keys: &[PathKey],
		_value: &Value,
		depth: usize,
	) -> Result<()> {
		let level = state.level_mut(depth);
		level.literal = true;
		level.values.clear();
		level.graphs.clear();
		Ok(())
	}
}

/// `@nest` entries.
struct NestHandler;

impl EntryHandler for NestHandler {
	fn name(&self) -> &'static str {
		"@nest"
	}

	fn test(&self, state: &mut State, keys: &[PathKey], depth: usize) -> Result<bool> {
		is_keyword(state, keys, depth, Keyword::Nest)
	}

	fn handle(
		&self,
		_state: &mut State,
		keys: &[PathKey],
		value: &Value,
		depth: usize,
	) -> Result<()> {
		let valid = match value {
			Value::Object(_) => true,
			Value::Array(items) => items.iter().all(Value::is_object),
			_ => false,
		};

		if valid {
			Ok(())
		} else {
			Err(Error::coded(
				ErrorCode::InvalidNestValue,
				format!("@nest in {} must hold objects", path(keys, depth - 1)),
			))
		}
	}
}

/// `@included` entries.
struct IncludedHandler;

impl EntryHandler for IncludedHandler {
	fn name(&self) -> &'static str {
		"@included"
	}

	fn test(&self, state: &mut State, keys: &[PathKey], depth: usize) -> Result<bool> {
		is_keyword(state, keys, depth, Keyword::Included)
	}

	fn handle(
		&self,
		state: &mut State,
		keys: &[PathKey],
		value: &Value,
		depth: usize,
	) -> Result<()> {
		let items = match value {
			Value::Array(items) => items.iter().collect(),
			item => vec![item],
		};

		let context = state.get_context(keys, 0)?;
		for item in items {
			let valid = match item {
				Value::Object(map) => !node_entries(&context, map).iter().any(|(k, _, _)| {
					matches!(k, Some(Keyword::Value | Keyword::List | Keyword::Set))
				}),
				_ => false,
			};

			if !valid {
				return Err(Error::coded(
					ErrorCode::InvalidIncludedValue,
					format!("@included in {} must hold node objects", path(keys, depth - 1)),
				));
			}
		}

		Ok(())
	}
}

/// `@annotation` entries.
///
/// Annotations only exist in RDF-star, so their content is checked and
/// dropped.
struct AnnotationHandler;

impl EntryHandler for AnnotationHandler {
	fn name(&self) -> &'static str {
		"@annotation"
	}

	fn validate(&self, _: &mut State, _: &[PathKey], _: usize, _: bool) -> Result<bool> {
		Ok(false)
	}

	fn test(&self, state: &mut State, keys: &[PathKey], depth: usize) -> Result<bool> {
		is_keyword(state, keys, depth, Keyword::Annotation)
	}

	fn handle(
		&self,
		state: &mut State,
		keys: &[PathKey],
		value: &Value,
		depth: usize,
	) -> Result<()> {
		let context = state.get_context(keys, 0)?;
		let items = match value {
			Value::Array(items) => items.iter().collect(),
			item => vec![item],
		};

		for item in items {
			let valid = match item {
				Value::Object(map) => !node_entries(&context, map)
					.iter()
					.any(|(k, _, _)| *k == Some(Keyword::Value)),
				_ => false,
			};

			if !valid {
				return Err(Error::coded(
					ErrorCode::InvalidAnnotation,
					format!("invalid annotation {item}"),
				));
			}
		}

		log::debug!("dropping annotation in {}", path(keys, depth));
		Ok(())
	}
}

/// Remaining keywords, and keyword-like keys.
struct UnknownKeywordHandler;

impl EntryHandler for UnknownKeywordHandler {
	fn name(&self) -> &'static str {
		"keyword"
	}

	fn validate(
		&self,
		state: &mut State,
		keys: &[PathKey],
		depth: usize,
		in_property: bool,
	) -> Result<bool> {
		match state.unalias(keys, depth)? {
			Key::Keyword(Keyword::List) => Ok(in_property),
			Key::Keyword(_) => Ok(true),
			_ => Ok(false),
		}
	}

	fn test(&self, state: &mut State, keys: &[PathKey], depth: usize) -> Result<bool> {
		Ok(matches!(
			state.unalias(keys, depth)?,
			Key::Keyword(_) | Key::Reserved(_)
		))
	}

	fn handle(
		&self,
		state: &mut State,
		keys: &[PathKey],
		value: &Value,
		depth: usize,
	) -> Result<()> {
		match state.unalias(keys, depth)? {
			Key::Keyword(Keyword::Index) => match value {
				Value::String(index) => {
					let node_depth = state.properties_depth(keys, depth)?;
					state.level_mut(node_depth).index = Some(index.clone());
					Ok(())
				}
				other => state.invalid_index(other),
			},
			Key::Keyword(Keyword::Reverse) if !value.is_object() => Err(Error::coded(
				ErrorCode::InvalidReverseValue,
				format!("@reverse must be an object, found {value}"),
			)),
			Key::Reserved(name) => {
				if state.options.strict_values {
					Err(Error::coded(
						ErrorCode::UnknownKeyword,
						format!("unknown keyword `{name}`"),
					))
				} else {
					log::debug!("ignoring reserved key `{name}`");
					Ok(())
				}
			}
			_ => Ok(()),
		}
	}
}

/// Array items.
///
/// Items are interpreted against the key holding the array: list members
/// are chained, other items are handled again as direct values of that key.
struct ArrayHandler;

impl EntryHandler for ArrayHandler {
	fn name(&self) -> &'static str {
		"array"
	}

	fn test(&self, _state: &mut State, keys: &[PathKey], depth: usize) -> Result<bool> {
		Ok(keys[depth].is_index())
	}

	fn handle(
		&self,
		state: &mut State,
		keys: &[PathKey],
		value: &Value,
		depth: usize,
	) -> Result<()> {
		match state.unalias(keys, depth - 1)? {
			Key::Keyword(Keyword::List) => {
				if depth < 3 {
					return Ok(());
				}

				let item = list_item(state, &keys[..depth - 1], value, depth)?;
				state.handle_list_element(keys, item, depth, depth - 2)
			}
			Key::Keyword(Keyword::Set) => {
				if depth >= 3 {
					state.reschedule(keys[..depth - 1].to_vec(), value.clone(), depth, depth - 2)
				}
				Ok(())
			}
			Key::Keyword(Keyword::Type) | Key::Root => Ok(()),
			parent => {
				let mut i = depth - 1;
				while i > 0 && keys[i].is_index() {
					i -= 1
				}

				let term_keys = match state.unalias(keys, i)? {
					Key::Keyword(Keyword::List) => Some(&keys[..i]),
					Key::Term(_) if state.containers(keys, i)?.list => Some(&keys[..=i]),
					_ => None,
				};

				if let Some(term_keys) = term_keys {
					let item = list_item(state, term_keys, value, depth)?;
					return state.handle_list_element(keys, item, depth, depth - 1);
				}

				if let (Key::Term(_), true) = (&parent, value.is_object()) {
					if state.containers(keys, depth - 1)?.graph {
						let graph = state.graph_container_term(keys, depth - 1)?;
						let graph: Vec<_> = graph.into_iter().collect();
						return link_to_parent(state, keys, depth, &graph);
					}

					if depth >= 3 && matches!(keys[depth - 1], PathKey::Name(_)) {
						let containers = state.containers(keys, depth - 2)?;
						if containers.is_complex_graph() {
							let graph = state.graph_container_term(keys, depth - 2)?;
							return link_to_parent(
								state,
								keys,
								depth - 1,
								&graph.into_iter().collect::<Vec<_>>(),
							);
						}
					}
				}

				state.reschedule(keys[..depth].to_vec(), value.clone(), depth, depth - 1);
				Ok(())
			}
		}
	}
}

/// Term of a list member at `depth`. Arrays are nested lists, assembled one
/// level below.
fn list_item(
	state: &mut State,
	term_keys: &[PathKey],
	value: &Value,
	depth: usize,
) -> Result<Option<Term>> {
	if value.is_array() {
		Ok(state.list_value(depth).into_iter().next())
	} else {
		Ok(state.value_to_term(term_keys, value, depth)?.into_iter().next())
	}
}

/// Properties.
struct PredicateHandler;

impl PredicateHandler {
	fn predicate(state: &mut State, keys: &[PathKey], depth: usize) -> Result<Option<Term>> {
		let Key::Term(term) = state.unalias(keys, depth)? else {
			return Ok(None);
		};

		let context = state.get_context(&keys[..=depth], 1)?;
		Ok(predicate_term(&context, &term, &state.options))
	}
}

impl EntryHandler for PredicateHandler {
	fn name(&self) -> &'static str {
		"predicate"
	}

	fn is_property_handler(&self) -> bool {
		true
	}

	fn test(&self, state: &mut State, keys: &[PathKey], depth: usize) -> Result<bool> {
		Ok(Self::predicate(state, keys, depth)?.is_some())
	}

	fn handle(
		&self,
		state: &mut State,
		keys: &[PathKey],
		value: &Value,
		depth: usize,
	) -> Result<()> {
		let Some(predicate) = Self::predicate(state, keys, depth)? else {
			return Ok(());
		};

		if value.is_null() {
			return Ok(());
		}

		let keys = &keys[..=depth];
		let Some(term) = keys[depth].as_name() else {
			return Ok(());
		};

		let context = state.get_context(keys, 1)?;
		let containers = context.container(term);
		let reverse = context.is_reverse(term) ^ state.in_reverse_map(keys, depth)?;

		let objects = match value {
			Value::Array(_) => state.value_to_term(keys, value, depth)?,
			_ if containers.list && !is_list_object(state, keys, value)? => {
				state.single_element_list(keys, value, depth)?
			}
			_ => state.value_to_term(keys, value, depth)?,
		};

		state.handle_predicate_terms(keys, depth, &[predicate], &objects, reverse)
	}
}

fn is_list_object(state: &mut State, keys: &[PathKey], value: &Value) -> Result<bool> {
	let Value::Object(map) = value else {
		return Ok(false);
	};

	let context = state.get_context(keys, 0)?;
	Ok(node_entries(&context, map)
		.iter()
		.any(|(k, _, _)| *k == Some(Keyword::List)))
}

/// Terms that do not expand to a predicate.
struct InvalidPredicateHandler;

impl EntryHandler for InvalidPredicateHandler {
	fn name(&self) -> &'static str {
		"invalid predicate"
	}

	fn validate(&self, _: &mut State, _: &[PathKey], _: usize, _: bool) -> Result<bool> {
		Ok(false)
	}

	fn test(&self, state: &mut State, keys: &[PathKey], depth: usize) -> Result<bool> {
		Ok(matches!(state.unalias(keys, depth)?, Key::Term(_)))
	}

	fn handle(
		&self,
		state: &mut State,
		keys: &[PathKey],
		_value: &Value,
		depth: usize,
	) -> Result<()> {
		let Key::Term(term) = state.unalias(keys, depth)? else {
			return Ok(());
		};

		let context = state.get_context(&keys[..=depth], 1)?;
		if context.term(&term).is_some_and(|d| d.id.is_none()) {
			log::debug!("ignoring null-mapped term `{term}`");
			return Ok(());
		}

		let message = format!("`{term}` does not expand to an IRI");
		if state.options.strict_values {
			Err(Error::coded(ErrorCode::InvalidPredicate, message))
		} else {
			log::warn!("{message}, dropping {}", path(keys, depth));
			Ok(())
		}
	}
}
