//! Container handlers.
//!
//! Entries of index, language, id and type maps. Map values are handled
//! again as direct values of the term holding the map, after the map key
//! was folded into them.
use crate::{
	context::Containers,
	error::{Error, ErrorCode, Result},
	handler::{link_to_parent, EntryHandler},
	keyword::{Key, Keyword, PathKey},
	state::State,
	term::{self, predicate_term, resource_term, vocab_or_base_term, Term},
	vocab,
};
use serde_json::{Map, Value};

/// Containers of the term holding the map whose entry is at `depth`.
fn map_containers(state: &mut State, keys: &[PathKey], depth: usize) -> Result<Option<Containers>> {
	if depth < 2 {
		return Ok(None);
	}

	match state.unalias(keys, depth)? {
		Key::Term(_) | Key::Keyword(Keyword::None) => (),
		_ => return Ok(None),
	}

	match state.unalias(keys, depth - 1)? {
		Key::Term(_) => Ok(Some(state.containers(keys, depth - 1)?)),
		_ => Ok(None),
	}
}

/// Map key at `depth`, or `None` for `@none`.
fn map_key(state: &mut State, keys: &[PathKey], depth: usize) -> Result<Option<String>> {
	match state.unalias(keys, depth)? {
		Key::Keyword(Keyword::None) => Ok(None),
		_ => Ok(keys[depth].as_name().map(str::to_owned)),
	}
}

fn link_graph(state: &mut State, keys: &[PathKey], depth: usize) -> Result<()> {
	let graph: Vec<Term> = state.graph_container_term(keys, depth - 1)?.into_iter().collect();
	link_to_parent(state, keys, depth, &graph)
}

/// `@index` maps.
pub(crate) struct IndexContainerHandler;

impl EntryHandler for IndexContainerHandler {
	fn name(&self) -> &'static str {
		"index container"
	}

	fn test(&self, state: &mut State, keys: &[PathKey], depth: usize) -> Result<bool> {
		Ok(map_containers(state, keys, depth)?.is_some_and(|c| c.index))
	}

	fn handle(
		&self,
		state: &mut State,
		keys: &[PathKey],
		value: &Value,
		depth: usize,
	) -> Result<()> {
		let containers = map_containers(state, keys, depth)?.unwrap_or_default();
		if containers.graph {
			return if value.is_object() {
				link_graph(state, keys, depth)
			} else {
				Ok(())
			};
		}

		if value.is_array() || value.is_null() {
			return Ok(());
		}

		let index = map_key(state, keys, depth)?;
		if let (Some(index), Some(term)) = (index, keys[depth - 1].as_name()) {
			let context = state.get_context(&keys[..depth], 1)?;
			if let Some(property) = context.index(term).map(str::to_owned) {
				if !value.is_object() {
					return Err(Error::coded(
						ErrorCode::InvalidValueObject,
						format!("values of property-valued index `{term}` must be nodes"),
					));
				}

				if let Some(predicate) = predicate_term(&context, &property, &state.options) {
					let mut index_keys = keys[..depth - 1].to_vec();
					index_keys.push(PathKey::Name(property));
					let objects = state.value_to_term(&index_keys, &Value::String(index), depth)?;
					let subjects = state.node_id(depth + 1)?;
					for s in subjects {
						for o in &objects {
							state.emit_triple(
								keys,
								depth + 1,
								s.clone(),
								predicate.clone(),
								o.clone(),
							)?
						}
					}
				}
			}
		}

		state.reschedule(keys[..depth].to_vec(), value.clone(), depth, depth - 1);
		Ok(())
	}
}

/// `@language` maps.
pub(crate) struct LanguageContainerHandler;

impl EntryHandler for LanguageContainerHandler {
	fn name(&self) -> &'static str {
		"language container"
	}

	fn test(&self, state: &mut State, keys: &[PathKey], depth: usize) -> Result<bool> {
		Ok(map_containers(state, keys, depth)?.is_some_and(|c| c.language))
	}

	fn handle(
		&self,
		state: &mut State,
		keys: &[PathKey],
		value: &Value,
		depth: usize,
	) -> Result<()> {
		let s = match value {
			Value::Array(_) | Value::Null => return Ok(()),
			Value::String(s) => s,
			other => {
				return Err(Error::coded(
					ErrorCode::InvalidLanguageMapValue,
					format!("language map values must be strings, found {other}"),
				))
			}
		};

		let mut object = Map::new();
		object.insert("@value".to_owned(), Value::String(s.clone()));
		if let Some(language) = map_key(state, keys, depth)? {
			object.insert("@language".to_owned(), Value::String(language));
		}

		if let Some(term) = keys[depth - 1].as_name() {
			let context = state.get_context(&keys[..depth], 1)?;
			if let Some(direction) = context.direction(term) {
				object.insert(
					"@direction".to_owned(),
					Value::String(direction.as_str().to_owned()),
				);
			}
		}

		state.reschedule(keys[..depth].to_vec(), Value::Object(object), depth, depth - 1);
		Ok(())
	}
}

/// `@id` maps.
pub(crate) struct IdContainerHandler;

impl EntryHandler for IdContainerHandler {
	fn name(&self) -> &'static str {
		"id container"
	}

	fn test(&self, state: &mut State, keys: &[PathKey], depth: usize) -> Result<bool> {
		Ok(map_containers(state, keys, depth)?.is_some_and(|c| c.id))
	}

	fn handle(
		&self,
		state: &mut State,
		keys: &[PathKey],
		value: &Value,
		depth: usize,
	) -> Result<()> {
		let containers = map_containers(state, keys, depth)?.unwrap_or_default();
		if !value.is_object() {
			if !value.is_array() && !value.is_null() {
				log::warn!("ignoring id map value {value}");
			}
			return Ok(());
		}

		if containers.graph {
			return link_graph(state, keys, depth);
		}

		if state.ids(depth + 1).is_none() {
			if let Some(key) = map_key(state, keys, depth)? {
				let context = state.get_context(&keys[..=depth], 1)?;
				let id = resource_term(&context, &key, &state.options)?;
				state.level_mut(depth + 1).ids = Some(id.into_iter().collect())
			}
		}

		state.flush(keys, depth + 1)?;
		let ids = state.node_id(depth + 1)?;
		link_to_parent(state, keys, depth, &ids)
	}
}

/// `@type` maps.
pub(crate) struct TypeContainerHandler;

impl EntryHandler for TypeContainerHandler {
	fn name(&self) -> &'static str {
		"type container"
	}

	fn test(&self, state: &mut State, keys: &[PathKey], depth: usize) -> Result<bool> {
		Ok(map_containers(state, keys, depth)?.is_some_and(|c| c.type_))
	}

	fn handle(
		&self,
		state: &mut State,
		keys: &[PathKey],
		value: &Value,
		depth: usize,
	) -> Result<()> {
		let context = state.get_context(&keys[..=depth], 1)?;

		let ids = match value {
			Value::Array(_) | Value::Null => return Ok(()),
			Value::Object(_) => state.node_id(depth + 1)?,
			Value::String(id) => {
				let ids: Vec<Term> = resource_term(&context, id, &state.options)?
					.into_iter()
					.collect();
				state.level_mut(depth + 1).ids = Some(ids.clone());
				ids
			}
			other => {
				return Err(Error::coded(
					ErrorCode::InvalidTypeValue,
					format!("type map values must be nodes, found {other}"),
				))
			}
		};

		if let Some(key) = map_key(state, keys, depth)? {
			if let Some(ty) = vocab_or_base_term(&context, &key, &state.options)? {
				for s in &ids {
					state.emit_triple(
						keys,
						depth + 1,
						s.clone(),
						term::iri(vocab::RDF_TYPE),
						ty.clone(),
					)?
				}
			}
		}

		state.flush(keys, depth + 1)?;
		link_to_parent(state, keys, depth, &ids)
	}
}
