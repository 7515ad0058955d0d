//! Streaming driver.
use crate::{
	error::{Error, ErrorCode, Result},
	handler,
	keyword::{Key, Keyword, PathKey},
	loader::{Loader, NoLoader},
	options::Options,
	state::State,
	term::{node_entries, validate_value_object, Quad},
};
use serde_json::{Map, Number, Value};
use std::io::Read;
use std::str::FromStr;
use struson::reader::{JsonReader, JsonStreamReader, ReaderSettings, ValueType};

/// Parser input.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
	/// Completed JSON value, with its path from the document root.
	///
	/// Values are completed in the order a streaming JSON parser reads them:
	/// objects and arrays right after their last item.
	Value { path: Vec<PathKey>, value: Value },
}

/// Quad consumer.
pub trait QuadSink {
	fn push(&mut self, quad: Quad);
}

impl<F: FnMut(Quad)> QuadSink for F {
	fn push(&mut self, quad: Quad) {
		self(quad)
	}
}

/// Streaming JSON-LD to RDF parser.
///
/// ```
/// use jsonld_stream::{format_term, Options, Parser, Quad};
/// use serde_json::json;
///
/// let mut parser = Parser::new(Options::default());
/// let mut quads = Vec::new();
/// parser.push_value(
///   &json!({"@id": "http://ex.org/s", "http://ex.org/p": "o"}),
///   &mut |q: Quad| quads.push(q)
/// ).unwrap();
///
/// assert_eq!(quads.len(), 1);
/// assert_eq!(format_term(&quads[0].0), "<http://ex.org/s>");
/// ```
pub struct Parser {
	state: State,
	last_depth: usize,
	last_keys: Vec<PathKey>,
	halted: bool,
}

impl Parser {
	/// Creates a parser that cannot load remote contexts.
	pub fn new(options: Options) -> Self {
		Self::with_loader(options, NoLoader)
	}

	pub fn with_loader(options: Options, loader: impl Loader + 'static) -> Self {
		Self {
			state: State::new(options, Box::new(loader)),
			last_depth: 0,
			last_keys: vec![PathKey::Root],
			halted: false,
		}
	}

	pub fn options(&self) -> &Options {
		&self.state.options
	}

	/// Number of remote documents actually fetched.
	pub fn fetch_count(&self) -> usize {
		self.state.loader().fetch_count()
	}

	/// Number of distinct scoped contexts processed.
	pub fn scoped_context_count(&self) -> usize {
		self.state.scoped_contexts().len()
	}

	/// Handles one event, passing the quads it completes to `sink`.
	///
	/// After an error, every later call fails with [`Error::Halted`]. Quads
	/// emitted before the error are still delivered.
	pub fn push(&mut self, event: Event, sink: &mut impl QuadSink) -> Result<()> {
		if self.halted {
			return Err(Error::Halted);
		}

		let result = self.process(event);
		for quad in self.state.take_output() {
			sink.push(quad)
		}

		if result.is_err() {
			self.halted = true
		}

		result
	}

	/// Flushes the nodes still open.
	///
	/// Only needed when the event stream stops before the document root is
	/// completed.
	pub fn finish(&mut self, sink: &mut impl QuadSink) -> Result<()> {
		if self.halted {
			return Err(Error::Halted);
		}

		let keys = std::mem::replace(&mut self.last_keys, vec![PathKey::Root]);
		let result = self.close(&keys, 0);
		self.last_depth = 0;
		for quad in self.state.take_output() {
			sink.push(quad)
		}

		if result.is_err() {
			self.halted = true
		}

		result
	}

	/// Pushes the events of a whole document.
	pub fn push_value(&mut self, value: &Value, sink: &mut impl QuadSink) -> Result<()> {
		for event in events_from_value(value) {
			self.push(event, sink)?
		}

		Ok(())
	}

	/// Reads a JSON document, pushing its values as they complete.
	///
	/// Completed values are dropped once handled. Containers being read
	/// only keep what their own handlers inspect: keyword entries, a marker
	/// for other entries, `@type` items, and whole `@context`, `@value` and
	/// JSON literal values.
	pub fn read<R: Read>(&mut self, input: R, sink: &mut impl QuadSink) -> Result<()> {
		let result = self.read_events(input, sink);
		if result.is_err() {
			self.halted = true
		}

		result
	}

	fn read_events<R: Read>(&mut self, input: R, sink: &mut impl QuadSink) -> Result<()> {
		let settings = ReaderSettings {
			restrict_number_values: false,
			..Default::default()
		};
		let mut reader = JsonStreamReader::new_custom(input, settings);
		let mut path: Vec<PathKey> = Vec::new();
		let mut frames: Vec<Frame> = Vec::new();

		loop {
			let mut completed = match reader.peek()? {
				ValueType::Object => {
					reader.begin_object()?;
					let retention = self.retention(frames.last(), &path)?;
					frames.push(Frame::new(Value::Object(Map::new()), retention));
					None
				}
				ValueType::Array => {
					reader.begin_array()?;
					let retention = self.retention(frames.last(), &path)?;
					frames.push(Frame::new(Value::Array(Vec::new()), retention));
					None
				}
				ValueType::String => Some(Value::String(reader.next_string()?)),
				ValueType::Number => Some(Value::Number(number(&reader.next_number_as_string()?)?)),
				ValueType::Boolean => Some(Value::Bool(reader.next_bool()?)),
				ValueType::Null => {
					reader.next_null()?;
					Some(Value::Null)
				}
			};

			loop {
				if let Some(value) = completed.take() {
					let kept = match frames.last_mut() {
						Some(frame) => self.kept(frame, &path, &value)?,
						None => None,
					};

					self.push(
						Event::Value {
							path: path.clone(),
							value,
						},
						sink,
					)?;

					let key = path.pop();
					match frames.last_mut() {
						Some(frame) => {
							if let Some(value) = kept {
								frame.attach(key, value)
							}
						}
						None => {
							reader.consume_trailing_whitespace()?;
							return Ok(());
						}
					}
				}

				let Some(frame) = frames.last_mut() else {
					return Ok(());
				};

				if reader.has_next()? {
					let key = match &frame.container {
						Value::Object(_) => PathKey::Name(reader.next_name_owned()?),
						_ => PathKey::Index(frame.len),
					};
					frame.len += 1;
					path.push(key);
					break;
				}

				match &frame.container {
					Value::Object(_) => reader.end_object()?,
					_ => reader.end_array()?,
				}

				completed = frames.pop().map(|f| f.container);
			}
		}
	}

	/// What a container opened at `path` keeps of its items.
	fn retention(&mut self, parent: Option<&Frame>, path: &[PathKey]) -> Result<Retention> {
		let Some(parent) = parent else {
			return Ok(Retention::Keywords);
		};

		if parent.retention == Retention::All {
			return Ok(Retention::All);
		}

		let keys = rooted(path);
		let depth = path.len();
		if !matches!(keys[depth], PathKey::Name(_)) {
			return Ok(Retention::Keywords);
		}

		if self.state.is_opaque(&keys, depth)? {
			Ok(Retention::All)
		} else if self.state.unalias(&keys, depth)?.is_keyword(Keyword::Type) {
			Ok(Retention::Items)
		} else {
			Ok(Retention::Keywords)
		}
	}

	/// Part of the value completed at `path` its container keeps.
	fn kept(
		&mut self,
		frame: &mut Frame,
		path: &[PathKey],
		value: &Value,
	) -> Result<Option<Value>> {
		if frame.retention != Retention::Keywords {
			return Ok(Some(value.clone()));
		}

		if !frame.container.is_object() {
			return Ok(None);
		}

		let keys = rooted(path);
		if let Key::Keyword(_) = self.state.unalias(&keys, path.len())? {
			Ok(Some(value.clone()))
		} else if frame.marked {
			Ok(None)
		} else {
			frame.marked = true;
			Ok(Some(Value::Null))
		}
	}

	fn process(&mut self, event: Event) -> Result<()> {
		let Event::Value { path, value } = event;

		if let Some((_, ancestors)) = path.split_last() {
			if ancestors
				.iter()
				.any(|k| k.as_name() == Some(Keyword::Context.as_str()))
			{
				return Ok(());
			}
		}

		let mut keys = Vec::with_capacity(path.len() + 1);
		keys.push(PathKey::Root);
		keys.extend(path);
		let depth = keys.len() - 1;

		let closing = std::mem::take(&mut self.last_keys);
		let closed: Vec<usize> = (depth + 1..=self.last_depth).rev().collect();
		let deferred = !closed.is_empty() && self.defers_flush(&keys, depth)?;

		for &d in &closed {
			self.state.terminate_list(&closing, d)?;
			if !(deferred && d == depth + 1) {
				self.state.flush(&closing, d)?
			}
		}

		if depth == 0 {
			self.check_root(&value)?
		} else {
			handler::run(&mut self.state, keys.clone(), value, depth)?
		}

		if deferred {
			self.state.flush(&closing, depth + 1)?
		}

		for &d in &closed {
			self.state.check_index(d)?;
			self.state.clear(&closing, d)
		}

		if closed.is_empty() {
			// The value had no entries, its node level may still hold an id.
			self.state.clear(&keys, depth + 1)
		}

		self.last_depth = depth;
		self.last_keys = keys;
		Ok(())
	}

	/// Closes every depth below `depth`.
	fn close(&mut self, keys: &[PathKey], depth: usize) -> Result<()> {
		for d in (depth + 1..=self.last_depth).rev() {
			self.state.terminate_list(keys, d)?;
			self.state.flush(keys, d)?;
			self.state.check_index(d)?;
			self.state.clear(keys, d)
		}

		Ok(())
	}

	/// Checks if the node closed by an event at `depth` is an entry of an
	/// id or type map. Such nodes are flushed by the map handler, once
	/// their identifier is known.
	fn defers_flush(&mut self, keys: &[PathKey], depth: usize) -> Result<bool> {
		let mut j = depth;
		while j > 0 && keys[j].is_index() {
			j -= 1
		}

		if j < 2 {
			return Ok(false);
		}

		let containers = self.state.containers(keys, j - 1)?;
		Ok(containers.id || containers.type_)
	}

	fn check_root(&mut self, value: &Value) -> Result<()> {
		if let Value::Object(map) = value {
			let context = self.state.get_context(&[PathKey::Root], 0)?;
			let entries = node_entries(&context, map);
			if entries.iter().any(|(k, _, _)| *k == Some(Keyword::Value)) {
				validate_value_object(&entries)?
			}
		}

		Ok(())
	}
}

fn rooted(path: &[PathKey]) -> Vec<PathKey> {
	let mut keys = Vec::with_capacity(path.len() + 1);
	keys.push(PathKey::Root);
	keys.extend_from_slice(path);
	keys
}

/// Items a container being read keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retention {
	/// Every item.
	All,

	/// Every item, but nested containers only keep keyword entries.
	Items,

	/// Keyword entries, and a `null` marker for the first other entry of an
	/// object. Arrays keep nothing.
	Keywords,
}

/// Container being read.
struct Frame {
	container: Value,
	len: usize,
	retention: Retention,

	/// A non-keyword entry was kept as a marker.
	marked: bool,
}

impl Frame {
	fn new(container: Value, retention: Retention) -> Self {
		Self {
			container,
			len: 0,
			retention,
			marked: false,
		}
	}

	fn attach(&mut self, key: Option<PathKey>, value: Value) {
		match (&mut self.container, key) {
			(Value::Object(map), Some(PathKey::Name(name))) => {
				map.insert(name, value);
			}
			(Value::Array(items), _) => items.push(value),
			_ => (),
		}
	}
}

fn number(lexical: &str) -> Result<Number> {
	Number::from_str(lexical).map_err(|_| {
		Error::coded(
			ErrorCode::UnsupportedValueKind,
			format!("unsupported number `{lexical}`"),
		)
	})
}

/// Events of a complete JSON document, in streaming order.
pub fn events_from_value(value: &Value) -> Vec<Event> {
	let mut events = Vec::new();
	collect_events(value, &mut Vec::new(), &mut events);
	events
}

fn collect_events(value: &Value, path: &mut Vec<PathKey>, events: &mut Vec<Event>) {
	match value {
		Value::Object(map) => {
			for (key, item) in map {
				path.push(PathKey::Name(key.clone()));
				collect_events(item, path, events);
				path.pop();
			}
		}
		Value::Array(items) => {
			for (i, item) in items.iter().enumerate() {
				path.push(PathKey::Index(i));
				collect_events(item, path, events);
				path.pop();
			}
		}
		_ => (),
	}

	events.push(Event::Value {
		path: path.clone(),
		value: value.clone(),
	})
}

/// Parses a JSON-LD document.
pub fn parse_str(input: &str, options: Options) -> Result<Vec<Quad>> {
	let mut quads = Vec::new();
	Parser::new(options).read(input.as_bytes(), &mut |q: Quad| quads.push(q))?;
	Ok(quads)
}

/// Converts an in-memory JSON-LD document.
pub fn parse_value(value: &Value, options: Options) -> Result<Vec<Quad>> {
	let mut quads = Vec::new();
	Parser::new(options).push_value(value, &mut |q: Quad| quads.push(q))?;
	Ok(quads)
}
