//! Term conversion.
use crate::{
	context::{has_scheme, Context, Direction, TypeMapping},
	context_tree::ScopeKind,
	error::{Error, ErrorCode, Result},
	keyword::{Keyword, PathKey},
	options::{Options, RdfDirection},
	state::State,
	vocab,
};
use iref::{Iri, IriBuf};
use langtag::LanguageTagBuf;
use rdf_types::{literal::Type as LiteralType, BlankIdBuf, Id, RdfDisplay};
use serde_json::{Map, Number, Value};
use std::str::FromStr;
use std::sync::Arc;

pub type Term = rdf_types::Term;
pub type Literal = rdf_types::Literal;

/// Generalized quad. A `None` graph is the default graph.
pub type Quad = rdf_types::Quad<Term, Term, Term, Term>;

pub fn iri(iri: Iri) -> Term {
	Term::Id(Id::Iri(iri.to_owned()))
}

fn iri_buf(iri: IriBuf) -> Term {
	Term::Id(Id::Iri(iri))
}

/// Blank node term, if `label` is a valid `_:` label.
pub fn blank(label: &str) -> Option<Term> {
	BlankIdBuf::new(label.to_owned())
		.ok()
		.map(|b| Term::Id(Id::Blank(b)))
}

pub fn is_literal(term: &Term) -> bool {
	matches!(term, Term::Literal(_))
}

pub fn typed_literal(lexical: String, datatype: IriBuf) -> Term {
	Term::Literal(Literal::new(lexical, LiteralType::Any(datatype)))
}

/// Simple literal, typed `xsd:string`.
pub fn string_literal(lexical: String) -> Term {
	typed_literal(lexical, vocab::XSD_STRING.to_owned())
}

fn lang_literal(lexical: String, tag: LanguageTagBuf) -> Term {
	Term::Literal(Literal::new(lexical, LiteralType::LangString(tag)))
}

/// Formats a term the way N-Quads does.
pub fn format_term(term: &Term) -> String {
	term.rdf_display().to_string()
}

/// Formats a quad as an N-Quads statement.
pub fn format_quad(quad: &Quad) -> String {
	format!("{} .", quad.rdf_display())
}

fn drop_invalid(options: &Options, code: ErrorCode, message: String) -> Result<Option<Term>> {
	if options.strict_values {
		Err(Error::coded(code, message))
	} else {
		log::warn!("{code}: {message}");
		Ok(None)
	}
}

fn checked_term(options: &Options, expanded: String, code: ErrorCode) -> Result<Option<Term>> {
	if expanded.starts_with("_:") {
		return match blank(&expanded) {
			Some(term) => Ok(Some(term)),
			None => drop_invalid(options, code, format!("invalid blank node `{expanded}`")),
		};
	}

	match IriBuf::new(&expanded) {
		Ok(iri) => Ok(Some(iri_buf(iri))),
		Err(_) => drop_invalid(options, code, format!("invalid IRI `{expanded}`")),
	}
}

/// Node term for an `@id` value, resolved against the base IRI.
pub fn resource_term(context: &Context, value: &str, options: &Options) -> Result<Option<Term>> {
	match context.expand_iri(value, false) {
		Some(expanded) => checked_term(options, expanded, ErrorCode::InvalidId),
		None => Ok(None),
	}
}

/// Node term for a type, resolved against `@vocab`, then the base IRI.
pub fn vocab_or_base_term(
	context: &Context,
	value: &str,
	options: &Options,
) -> Result<Option<Term>> {
	let expanded = match context.expand_iri(value, true) {
		Some(e) if e == value && !has_scheme(value) => context.expand_iri(value, false),
		other => other,
	};

	match expanded {
		Some(expanded) => checked_term(options, expanded, ErrorCode::InvalidTypeValue),
		None => Ok(None),
	}
}

/// Predicate term of a property key.
///
/// Returns `None` when the key does not expand to an IRI, or to a blank
/// node identifier while generalized RDF is disabled.
pub fn predicate_term(context: &Context, key: &str, options: &Options) -> Option<Term> {
	let expanded = context.expand_iri(key, true)?;
	if expanded.starts_with("_:") {
		if options.produce_generalized_rdf {
			blank(&expanded)
		} else {
			log::warn!("dropping blank node predicate `{expanded}`");
			None
		}
	} else {
		IriBuf::new(&expanded).ok().map(iri_buf)
	}
}

/// Canonical lexical form of an `xsd:double`.
pub fn double_lexical(x: f64) -> String {
	if x.is_infinite() {
		return if x > 0.0 { "INF" } else { "-INF" }.to_owned();
	}

	if x.is_nan() {
		return "NaN".to_owned();
	}

	let s = format!("{x:e}");
	let (mantissa, exponent) = s.split_once('e').unwrap_or((&s, "0"));
	let mut mantissa = mantissa.to_owned();
	if !mantissa.contains('.') {
		mantissa.push_str(".0")
	}

	format!("{mantissa}E{exponent}")
}

/// Lexical form of a JSON number, and whether it is a double.
///
/// Numbers without fractional part below 10^21 are integers unless a double
/// is requested.
pub fn number_lexical(n: &Number, as_double: bool) -> (String, bool) {
	if !as_double {
		if let Some(i) = n.as_i64() {
			return (i.to_string(), false);
		}

		if let Some(u) = n.as_u64() {
			return (u.to_string(), false);
		}
	}

	// Out of range numbers keep their lexical form and parse to an infinity.
	let x = match n.as_f64() {
		Some(x) => x,
		None => match n.to_string().parse::<f64>() {
			Ok(x) => x,
			Err(_) => return (n.to_string(), false),
		},
	};

	if !as_double && x.is_finite() && x.fract() == 0.0 && x.abs() < 1e21 {
		(format!("{}", x as i128), false)
	} else {
		(double_lexical(x), true)
	}
}

/// Literal of a JSON boolean or number.
fn native_literal(value: &Value, datatype: Option<IriBuf>) -> Option<Term> {
	match value {
		Value::Bool(b) => Some(typed_literal(
			b.to_string(),
			datatype.unwrap_or_else(|| vocab::XSD_BOOLEAN.to_owned()),
		)),
		Value::Number(n) => {
			let as_double = datatype
				.as_ref()
				.is_some_and(|d| d.as_str() == vocab::XSD_DOUBLE.as_str());
			let (lexical, is_double) = number_lexical(n, as_double);
			let default = if is_double {
				vocab::XSD_DOUBLE
			} else {
				vocab::XSD_INTEGER
			};
			let datatype = datatype.unwrap_or_else(|| default.to_owned());
			Some(typed_literal(lexical, datatype))
		}
		_ => None,
	}
}

fn json_string(s: &str) -> String {
	Value::String(s.to_owned()).to_string()
}

/// Canonical JSON serialization (RFC 8785).
pub fn canonical_json(value: &Value) -> String {
	match value {
		Value::Null => "null".to_owned(),
		Value::Bool(b) => b.to_string(),
		Value::Number(n) => canonical_number(n),
		Value::String(s) => json_string(s),
		Value::Array(items) => {
			let items: Vec<_> = items.iter().map(canonical_json).collect();
			format!("[{}]", items.join(","))
		}
		Value::Object(map) => {
			let mut entries: Vec<_> = map.iter().collect();
			entries.sort_by(|(a, _), (b, _)| a.encode_utf16().cmp(b.encode_utf16()));
			let entries: Vec<_> = entries
				.into_iter()
				.map(|(k, v)| format!("{}:{}", json_string(k), canonical_json(v)))
				.collect();
			format!("{{{}}}", entries.join(","))
		}
	}
}

fn canonical_number(n: &Number) -> String {
	if let Some(i) = n.as_i64() {
		return i.to_string();
	}

	if let Some(u) = n.as_u64() {
		return u.to_string();
	}

	let Some(x) = n.as_f64() else {
		return n.to_string();
	};

	if x.fract() == 0.0 && x.abs() < 1e21 {
		return format!("{}", x as i128);
	}

	let abs = x.abs();
	if abs >= 1e21 || abs < 1e-6 {
		let s = format!("{x:e}");
		match s.split_once('e') {
			Some((mantissa, exponent)) if !exponent.starts_with('-') => {
				format!("{mantissa}e+{exponent}")
			}
			_ => s,
		}
	} else {
		format!("{x}")
	}
}

pub fn json_literal(value: &Value) -> Term {
	typed_literal(canonical_json(value), vocab::RDF_JSON.to_owned())
}

/// Object entries with their keys resolved to keywords, if they are one.
pub fn node_entries<'v>(
	context: &Context,
	map: &'v Map<String, Value>,
) -> Vec<(Option<Keyword>, &'v str, &'v Value)> {
	map.iter()
		.map(|(key, value)| {
			let keyword = Keyword::from_str(key).ok().or_else(|| {
				context
					.expand_iri(key, true)
					.and_then(|e| Keyword::from_str(&e).ok())
			});
			(keyword, key.as_str(), value)
		})
		.collect()
}

fn entry<'v>(
	entries: &[(Option<Keyword>, &'v str, &'v Value)],
	keyword: Keyword,
) -> Option<&'v Value> {
	entries
		.iter()
		.find(|(k, _, _)| *k == Some(keyword))
		.map(|(_, _, v)| *v)
}

/// Checks the entries allowed next to `@value`.
pub fn validate_value_object(entries: &[(Option<Keyword>, &str, &Value)]) -> Result<()> {
	for (keyword, key, _) in entries {
		match keyword {
			Some(
				Keyword::Value
				| Keyword::Language
				| Keyword::Direction
				| Keyword::Type
				| Keyword::Index
				| Keyword::Annotation
				| Keyword::Context,
			) => (),
			_ => {
				return Err(Error::coded(
					ErrorCode::InvalidValueObject,
					format!("invalid entry `{key}` in value object"),
				))
			}
		}
	}

	if entry(entries, Keyword::Type).is_some()
		&& (entry(entries, Keyword::Language).is_some()
			|| entry(entries, Keyword::Direction).is_some())
	{
		return Err(Error::coded(
			ErrorCode::InvalidValueObject,
			"value object with both @type and @language or @direction",
		));
	}

	Ok(())
}

impl State {
	/// Converts the value of the key ending `keys` into terms.
	///
	/// The node of an object value lives one level below `depth`.
	pub(crate) fn value_to_term(
		&mut self,
		keys: &[PathKey],
		value: &Value,
		depth: usize,
	) -> Result<Vec<Term>> {
		let term = keys.last().and_then(PathKey::as_name);
		let context = self.term_context(keys, term)?;

		if let Some(term) = term {
			if context.type_mapping(term) == Some(&TypeMapping::Json) {
				return Ok(vec![json_literal(value)]);
			}
		}

		match value {
			Value::Null => Ok(Vec::new()),
			Value::Array(_) => {
				if term.is_some_and(|t| context.container(t).list) {
					Ok(self.list_value(depth))
				} else {
					Ok(Vec::new())
				}
			}
			Value::Object(map) => {
				let node_context = self.get_context(keys, 0)?;
				self.object_to_terms(keys, &node_context, &context, term, map, depth)
			}
			Value::String(s) => Ok(self
				.string_to_term(keys, &context, term, s)?
				.into_iter()
				.collect()),
			native => {
				let datatype = match term.and_then(|t| context.type_mapping(t)) {
					Some(TypeMapping::Iri(dt)) => IriBuf::new(dt).ok(),
					_ => None,
				};
				Ok(native_literal(native, datatype).into_iter().collect())
			}
		}
	}

	/// Context defining the term at the end of `keys`, with the term's own
	/// scoped context applied.
	fn term_context(&mut self, keys: &[PathKey], term: Option<&str>) -> Result<Arc<Context>> {
		let (context, bound) = self.bound_context(keys, 1)?;
		match term {
			Some(term) if context.scoped_context(term).is_some() => {
				self.scoped_context(&context, term, ScopeKind::Property, bound)
			}
			_ => Ok(context),
		}
	}

	/// Head of the list assembled one level below `depth`.
	pub(crate) fn list_value(&self, depth: usize) -> Vec<Term> {
		match self.ids(depth + 1) {
			Some(ids) => ids.to_vec(),
			None => vec![iri(vocab::RDF_NIL)],
		}
	}

	fn object_to_terms(
		&mut self,
		keys: &[PathKey],
		context: &Context,
		term_context: &Context,
		term: Option<&str>,
		map: &Map<String, Value>,
		depth: usize,
	) -> Result<Vec<Term>> {
		let entries = node_entries(context, map);

		if entry(&entries, Keyword::Value).is_some() {
			return Ok(self
				.value_object_to_term(keys, context, &entries)?
				.into_iter()
				.collect());
		}

		for (keyword, inner) in [(Keyword::List, true), (Keyword::Set, false)] {
			if let Some(items) = entry(&entries, keyword) {
				let allowed = [keyword, Keyword::Index, Keyword::Context];
				if let Some((_, key, _)) = entries
					.iter()
					.find(|(k, _, _)| !k.is_some_and(|k| allowed.contains(&k)))
				{
					return Err(Error::coded(
						ErrorCode::InvalidSetOrListObject,
						format!("invalid entry `{key}` next to {keyword}"),
					));
				}

				return match items {
					Value::Array(_) if inner => Ok(self.list_value(depth)),
					Value::Array(_) => Ok(Vec::new()),
					Value::Null if inner => Ok(vec![iri(vocab::RDF_NIL)]),
					item if inner => self.single_element_list(keys, item, depth + 1),
					item => self.value_to_term(keys, item, depth + 1),
				};
			}
		}

		if let Some(term) = term {
			if term_context.container(term).is_simple_graph() {
				return Ok(self
					.graph_container_term(keys, keys.len() - 1)?
					.into_iter()
					.collect());
			}
		}

		if let Some(ids) = self.ids(depth + 1) {
			return Ok(ids.to_vec());
		}

		if let Some(Value::String(id)) = entry(&entries, Keyword::Id) {
			return Ok(resource_term(context, id, &self.options)?.into_iter().collect());
		}

		let empty = entries
			.iter()
			.all(|(k, _, _)| *k == Some(Keyword::Context));
		if self.emitted(depth + 1) || empty {
			self.node_id(depth + 1)
		} else {
			Ok(Vec::new())
		}
	}

	/// List holding the single non-array value of `@list`.
	pub(crate) fn single_element_list(
		&mut self,
		keys: &[PathKey],
		item: &Value,
		depth: usize,
	) -> Result<Vec<Term>> {
		let Some(item) = self.value_to_term(keys, item, depth)?.into_iter().next() else {
			return Ok(vec![iri(vocab::RDF_NIL)]);
		};

		let owner = self.properties_depth(keys, keys.len() - 1)?;
		let link = self.mint_blank()?;
		self.emit_triple(keys, owner, link.clone(), iri(vocab::RDF_FIRST), item)?;
		self.emit_triple(
			keys,
			owner,
			link.clone(),
			iri(vocab::RDF_REST),
			iri(vocab::RDF_NIL),
		)?;
		Ok(vec![link])
	}

	fn value_object_to_term(
		&mut self,
		keys: &[PathKey],
		context: &Context,
		entries: &[(Option<Keyword>, &str, &Value)],
	) -> Result<Option<Term>> {
		validate_value_object(entries)?;

		let value = entry(entries, Keyword::Value).unwrap_or(&Value::Null);
		let ty = entry(entries, Keyword::Type);
		let language = entry(entries, Keyword::Language);
		let direction = entry(entries, Keyword::Direction);

		if let Some(index) = entry(entries, Keyword::Index) {
			if !index.is_string() {
				self.invalid_index(index)?;
			}
		}

		let datatype = match ty {
			None => None,
			Some(Value::String(ty)) => match context.expand_iri(ty, true) {
				Some(e) if e == "@json" => return Ok(Some(json_literal(value))),
				Some(e) if !e.starts_with("_:") => match IriBuf::new(&e) {
					Ok(iri) => Some(iri),
					Err(_) => {
						return Err(Error::coded(
							ErrorCode::InvalidTypedValue,
							format!("invalid datatype `{ty}`"),
						))
					}
				},
				_ => {
					return Err(Error::coded(
						ErrorCode::InvalidTypedValue,
						format!("invalid datatype `{ty}`"),
					))
				}
			},
			Some(other) => {
				return Err(Error::coded(
					ErrorCode::InvalidTypedValue,
					format!("invalid datatype {other}"),
				))
			}
		};

		match value {
			Value::Null => Ok(None),
			Value::Object(_) | Value::Array(_) => Err(Error::coded(
				ErrorCode::InvalidValueObjectValue,
				format!("invalid @value {value}"),
			)),
			Value::String(s) => {
				if let Some(datatype) = datatype {
					return Ok(Some(typed_literal(s.clone(), datatype)));
				}

				let language = match language {
					None | Some(Value::Null) => None,
					Some(Value::String(l)) => Some(l.as_str()),
					Some(other) => {
						return Err(Error::coded(
							ErrorCode::InvalidLanguageTaggedString,
							format!("invalid @language {other}"),
						))
					}
				};

				let direction = match direction {
					None | Some(Value::Null) => None,
					Some(Value::String(d)) if Direction::parse(d).is_some() => Direction::parse(d),
					Some(other) => {
						return Err(Error::coded(
							ErrorCode::InvalidBaseDirection,
							format!("invalid @direction {other}"),
						))
					}
				};

				self.language_literal(keys, s, language, direction)
			}
			native => {
				if language.is_some() {
					return Err(Error::coded(
						ErrorCode::InvalidLanguageTaggedValue,
						format!("language-tagged value {native} is not a string"),
					));
				}
				Ok(native_literal(native, datatype))
			}
		}
	}

	fn string_to_term(
		&mut self,
		keys: &[PathKey],
		context: &Context,
		term: Option<&str>,
		s: &str,
	) -> Result<Option<Term>> {
		match term.and_then(|t| context.type_mapping(t)) {
			Some(TypeMapping::Id) => resource_term(context, s, &self.options),
			Some(TypeMapping::Vocab) => vocab_or_base_term(context, s, &self.options),
			Some(TypeMapping::Iri(datatype)) => match IriBuf::new(datatype) {
				Ok(datatype) => Ok(Some(typed_literal(s.to_owned(), datatype))),
				Err(_) => Ok(None),
			},
			_ => {
				let (language, direction) = match term {
					Some(term) => (context.language(term), context.direction(term)),
					None => (context.default_language(), context.default_direction()),
				};
				let language = language.map(str::to_owned);
				self.language_literal(keys, s, language.as_deref(), direction)
			}
		}
	}

	/// String literal with optional language and direction.
	fn language_literal(
		&mut self,
		keys: &[PathKey],
		s: &str,
		language: Option<&str>,
		direction: Option<Direction>,
	) -> Result<Option<Term>> {
		let language = language.map(|l| {
			if self.options.normalize_language_tags {
				l.to_lowercase()
			} else {
				l.to_owned()
			}
		});

		match (direction, self.options.rdf_direction) {
			(Some(direction), Some(RdfDirection::I18nDatatype)) => {
				let datatype = format!(
					"{}{}_{}",
					vocab::I18N,
					language.as_deref().unwrap_or_default().to_lowercase(),
					direction.as_str()
				);
				match IriBuf::new(&datatype) {
					Ok(datatype) => Ok(Some(typed_literal(s.to_owned(), datatype))),
					Err(_) => drop_invalid(
						&self.options,
						ErrorCode::InvalidLanguageTaggedString,
						format!("invalid language `{}`", language.unwrap_or_default()),
					),
				}
			}
			(Some(direction), Some(RdfDirection::CompoundLiteral)) => {
				let owner = self.properties_depth(keys, keys.len() - 1)?;
				let node = self.mint_blank()?;
				self.emit_triple(
					keys,
					owner,
					node.clone(),
					iri(vocab::RDF_VALUE),
					string_literal(s.to_owned()),
				)?;

				if let Some(language) = language {
					self.emit_triple(
						keys,
						owner,
						node.clone(),
						iri(vocab::RDF_LANGUAGE),
						string_literal(language),
					)?;
				}

				self.emit_triple(
					keys,
					owner,
					node.clone(),
					iri(vocab::RDF_DIRECTION),
					string_literal(direction.as_str().to_owned()),
				)?;
				Ok(Some(node))
			}
			_ => match language {
				Some(language) => match LanguageTagBuf::new(language.clone().into_bytes()) {
					Ok(tag) => Ok(Some(lang_literal(s.to_owned(), tag))),
					Err(_) => drop_invalid(
						&self.options,
						ErrorCode::InvalidLanguageTaggedString,
						format!("invalid language tag `{language}`"),
					),
				},
				None => Ok(Some(string_literal(s.to_owned()))),
			},
		}
	}

	/// Reports an `@index` value that is not a string.
	pub(crate) fn invalid_index(&self, index: &Value) -> Result<()> {
		let message = format!("@index must be a string, found {index}");
		if self.options.strict_values || self.options.validate_value_indexes {
			Err(Error::coded(ErrorCode::InvalidIndexValue, message))
		} else {
			log::warn!("{message}");
			Ok(())
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn number(value: Value) -> (String, bool) {
		match value {
			Value::Number(n) => number_lexical(&n, false),
			_ => panic!("not a number"),
		}
	}

	#[test]
	fn integers() {
		assert_eq!(number(json!(42)), ("42".to_owned(), false));
		assert_eq!(number(json!(-7)), ("-7".to_owned(), false));
		assert_eq!(number(json!(5.0)), ("5".to_owned(), false));
		assert_eq!(number(json!(1e20)), ("100000000000000000000".to_owned(), false))
	}

	#[test]
	fn doubles() {
		assert_eq!(number(json!(1.1)), ("1.1E0".to_owned(), true));
		assert_eq!(number(json!(1e21)), ("1.0E21".to_owned(), true));
		assert_eq!(number(json!(-0.0025)), ("-2.5E-3".to_owned(), true));
		assert_eq!(number(json!(0.1 + 0.2)), ("3.0000000000000004E-1".to_owned(), true));
		assert_eq!(number(json!(1.2345678901234567)), ("1.2345678901234567E0".to_owned(), true));
		assert_eq!(double_lexical(f64::INFINITY), "INF");
		assert_eq!(double_lexical(f64::NEG_INFINITY), "-INF")
	}

	#[test]
	fn out_of_range_numbers() {
		let big = Number::from_str("1e400").unwrap();
		assert_eq!(number_lexical(&big, false), ("INF".to_owned(), true));

		let small = Number::from_str("-1e400").unwrap();
		assert_eq!(number_lexical(&small, true), ("-INF".to_owned(), true))
	}

	#[test]
	fn forced_double() {
		match json!(3) {
			Value::Number(n) => assert_eq!(number_lexical(&n, true), ("3.0E0".to_owned(), true)),
			_ => unreachable!(),
		}
	}

	#[test]
	fn canonical_json_sorts_keys() {
		let value = json!({"b": [1, 2.5, true], "a": {"d": null, "c": "x\ny"}});
		assert_eq!(
			canonical_json(&value),
			r#"{"a":{"c":"x\ny","d":null},"b":[1,2.5,true]}"#
		)
	}

	#[test]
	fn canonical_json_numbers() {
		assert_eq!(canonical_json(&json!(1e21)), "1e+21");
		assert_eq!(canonical_json(&json!(1e-7)), "1e-7");
		assert_eq!(canonical_json(&json!(10.0)), "10")
	}

	#[test]
	fn value_object_entries() {
		let context = Context::new(None);
		let map = json!({"@value": "x", "@id": "http://ex/s"});
		let entries = node_entries(&context, map.as_object().unwrap());
		let err = validate_value_object(&entries).unwrap_err();
		assert_eq!(err.code(), Some(ErrorCode::InvalidValueObject));

		let map = json!({"@value": "x", "@type": "http://ex/t", "@language": "en"});
		let entries = node_entries(&context, map.as_object().unwrap());
		assert!(validate_value_object(&entries).is_err())
	}

	#[test]
	fn resource_terms() {
		let options = Options::default();
		let context = Context::new(Some(IriBuf::new("http://ex/dir/").unwrap()));
		assert_eq!(
			resource_term(&context, "a", &options).unwrap().map(|t| format_term(&t)),
			Some("<http://ex/dir/a>".to_owned())
		);
		assert_eq!(
			resource_term(&context, "_:x", &options).unwrap().map(|t| format_term(&t)),
			Some("_:x".to_owned())
		);

		let context = Context::new(None);
		assert!(resource_term(&context, "relative", &options).unwrap().is_none());
		let strict = Options::default().with_strict_values(true);
		assert!(resource_term(&context, "relative", &strict).is_err())
	}
}
