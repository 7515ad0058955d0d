use iref::IriBuf;
use jsonld_stream::{
	events_from_value, format_term, parse_str, parse_value, Error, ErrorCode, Event, MemoryLoader,
	Options, Parser, PathKey, Quad, RdfDirection,
};
use serde_json::{json, Value};
use std::io::Read;

mod common;

fn convert(parser: &mut Parser, value: &Value) -> Vec<Quad> {
	let mut quads = Vec::new();
	parser
		.push_value(value, &mut |q: Quad| quads.push(q))
		.unwrap();
	quads
}

fn convert_with(options: Options, value: Value) -> Vec<Quad> {
	convert(&mut Parser::new(options), &value)
}

fn read(parser: &mut Parser, input: &str) -> Vec<Quad> {
	let mut quads = Vec::new();
	parser
		.read(input.as_bytes(), &mut |q: Quad| quads.push(q))
		.unwrap();
	quads
}

#[test]
fn event_order() {
	let events = events_from_value(&json!({"a": [1, {"b": null}]}));
	let paths: Vec<Vec<PathKey>> = events
		.into_iter()
		.map(|Event::Value { path, .. }| path)
		.collect();

	let name = |s: &str| PathKey::Name(s.to_owned());
	assert_eq!(
		paths,
		vec![
			vec![name("a"), PathKey::Index(0)],
			vec![name("a"), PathKey::Index(1), name("b")],
			vec![name("a"), PathKey::Index(1)],
			vec![name("a")],
			vec![],
		]
	)
}

#[test]
fn read_matches_push() {
	let input = r#"{
		"@context": {"@vocab": "http://ex.org/"},
		"@id": "http://ex.org/s",
		"knows": [{"name": "A"}, {"@id": "http://ex.org/b", "name": "B"}],
		"tags": {"@list": [1, 2]}
	}"#;

	let streamed: Vec<_> = read(&mut Parser::new(Options::default()), input)
		.iter()
		.map(common::statement)
		.collect();

	let value: Value = serde_json::from_str(input).unwrap();
	let pushed: Vec<_> = convert_with(Options::default(), value)
		.iter()
		.map(common::statement)
		.collect();

	common::assert_isomorphic(&streamed, &pushed);
	assert_eq!(streamed.len(), 9)
}

/// Reader that counts the bytes handed out.
struct Counting<'a> {
	input: &'a [u8],
	consumed: std::rc::Rc<std::cell::Cell<usize>>,
}

impl<'a> Read for Counting<'a> {
	fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
		let n = self.input.len().min(buf.len()).min(64);
		buf[..n].copy_from_slice(&self.input[..n]);
		self.input = &self.input[n..];
		self.consumed.set(self.consumed.get() + n);
		Ok(n)
	}
}

#[test]
fn large_graph_is_streamed() {
	let nodes: Vec<Value> = (0..2000)
		.map(|i| {
			json!({
				"@id": format!("http://ex.org/n{i}"),
				"@type": ["http://ex.org/T", "http://ex.org/U"],
				"http://ex.org/value": {"@value": i, "@type": "http://ex.org/num"},
				"http://ex.org/child": {"http://ex.org/name": "c"}
			})
		})
		.collect();
	let input = json!({"@id": "http://ex.org/g", "@graph": nodes}).to_string();

	let consumed = std::rc::Rc::new(std::cell::Cell::new(0));
	let reader = Counting {
		input: input.as_bytes(),
		consumed: consumed.clone(),
	};

	let mut count = 0;
	let mut first_at = None;
	Parser::new(Options::default())
		.read(reader, &mut |q: Quad| {
			if count == 0 {
				first_at = Some(consumed.get())
			}
			assert_eq!(q.3.as_ref().map(format_term).as_deref(), Some("<http://ex.org/g>"));
			count += 1
		})
		.unwrap();

	assert_eq!(count, 2000 * 5);
	assert!(first_at.unwrap() < input.len() / 10)
}

#[test]
fn quads_are_streamed() {
	let mut parser = Parser::new(Options::default());
	let mut count = 0;
	let mut sink = |_: Quad| count += 1;

	let id = Event::Value {
		path: vec![PathKey::Name("@id".to_owned())],
		value: json!("http://ex.org/s"),
	};
	let name = Event::Value {
		path: vec![PathKey::Name("http://ex.org/name".to_owned())],
		value: json!("x"),
	};

	parser.push(id, &mut sink).unwrap();
	parser.push(name, &mut sink).unwrap();
	assert_eq!(count, 1)
}

#[test]
fn finish_flushes_open_nodes() {
	let mut parser = Parser::new(Options::default());
	let mut quads = Vec::new();

	let name = Event::Value {
		path: vec![PathKey::Name("http://ex.org/name".to_owned())],
		value: json!("x"),
	};

	parser.push(name, &mut |q: Quad| quads.push(q)).unwrap();
	assert!(quads.is_empty());

	parser.finish(&mut |q: Quad| quads.push(q)).unwrap();
	assert_eq!(quads.len(), 1)
}

#[test]
fn halts_after_error() {
	let mut parser = Parser::new(Options::default());
	let mut sink = |_: Quad| ();

	let err = parser.push_value(&json!({"@id": 5}), &mut sink).unwrap_err();
	assert_eq!(err.code(), Some(ErrorCode::InvalidId));

	let err = parser
		.push_value(&json!({"@id": "http://ex.org/s"}), &mut sink)
		.unwrap_err();
	assert!(matches!(err, Error::Halted))
}

#[test]
fn duplicate_id_while_reading() {
	let input = r#"{"@id": "http://ex.org/a", "@id": "http://ex.org/b"}"#;
	let err = Parser::new(Options::default())
		.read(input.as_bytes(), &mut |_: Quad| ())
		.unwrap_err();
	assert_eq!(err.code(), Some(ErrorCode::CollidingKeywords))
}

#[test]
fn invalid_json() {
	let mut parser = Parser::new(Options::default());
	let err = parser
		.read(r#"{"@id": "#.as_bytes(), &mut |_: Quad| ())
		.unwrap_err();
	assert!(matches!(err, Error::Json(_)));

	let err = parser.read("{}".as_bytes(), &mut |_: Quad| ()).unwrap_err();
	assert!(matches!(err, Error::Halted))
}

const XSD_DOUBLE: &str = "<http://www.w3.org/2001/XMLSchema#double>";

fn number_literal(number: &str) -> String {
	let input = format!(r#"{{"@id": "http://ex.org/s", "http://ex.org/p": {number}}}"#);
	let quads = parse_str(&input, Options::default()).unwrap();
	assert_eq!(quads.len(), 1);
	format_term(&quads[0].2)
}

#[test]
fn overflowing_numbers() {
	assert_eq!(number_literal("1e400"), format!(r#""INF"^^{XSD_DOUBLE}"#));
	assert_eq!(number_literal("-1e400"), format!(r#""-INF"^^{XSD_DOUBLE}"#))
}

#[test]
fn large_exponents() {
	assert_eq!(number_literal("2.5e100"), format!(r#""2.5E100"^^{XSD_DOUBLE}"#))
}

#[test]
fn double_precision() {
	assert_eq!(
		number_literal("0.30000000000000004"),
		format!(r#""3.0000000000000004E-1"^^{XSD_DOUBLE}"#)
	);
	assert_eq!(number_literal("5.3"), format!(r#""5.3E0"^^{XSD_DOUBLE}"#))
}

#[test]
fn remote_context_fetched_once() {
	let loader = MemoryLoader::new().with(
		"http://ex.org/ctx",
		json!({"@context": {"@vocab": "http://ex.org/"}}),
	);

	let mut parser = Parser::with_loader(Options::default(), loader);
	let quads = convert(
		&mut parser,
		&json!([
			{"@context": "http://ex.org/ctx", "@id": "http://ex.org/a", "name": "A"},
			{"@context": "http://ex.org/ctx", "@id": "http://ex.org/b", "name": "B"}
		]),
	);

	common::assert_quads(
		&quads,
		r#"
		<http://ex.org/a> <http://ex.org/name> "A" .
		<http://ex.org/b> <http://ex.org/name> "B" .
		"#,
	);
	assert_eq!(parser.fetch_count(), 1)
}

#[test]
fn remote_context_not_found() {
	let err = parse_value(
		&json!({"@context": "http://ex.org/missing", "@id": "http://ex.org/s"}),
		Options::default(),
	)
	.unwrap_err();
	assert_eq!(err.code(), Some(ErrorCode::LoadingRemoteContextFailed))
}

#[test]
fn imported_context() {
	let loader = MemoryLoader::new().with(
		"http://ex.org/base",
		json!({"@context": {"@vocab": "http://ex.org/", "name": "http://ex.org/label"}}),
	);

	let mut parser = Parser::with_loader(Options::default(), loader);
	let quads = read(
		&mut parser,
		r#"{
			"@context": {"@import": "http://ex.org/base", "name": "http://other.org/name"},
			"@id": "http://ex.org/s",
			"name": "N",
			"age": 5
		}"#,
	);

	common::assert_quads(
		&quads,
		r#"
		<http://ex.org/s> <http://other.org/name> "N" .
		<http://ex.org/s> <http://ex.org/age> "5"^^<http://www.w3.org/2001/XMLSchema#integer> .
		"#,
	);
	assert_eq!(parser.fetch_count(), 1)
}

#[test]
fn scoped_contexts_released() {
	let nodes: Vec<Value> = (0..1000)
		.map(|i| {
			json!({
				"@context": {
					"k": {"@id": "http://ex.org/k", "@context": {"@vocab": "http://ex.org/"}}
				},
				"@id": format!("http://ex.org/n{i}"),
				"k": {"name": "x"}
			})
		})
		.collect();
	let input = json!({"@graph": nodes}).to_string();

	let mut parser = Parser::new(Options::default());
	assert_eq!(read(&mut parser, &input).len(), 2000);
	assert!(parser.scoped_context_count() <= 1)
}

#[test]
fn out_of_order_context_allowed() {
	let quads = convert_with(
		Options::default().with_out_of_order_context(true),
		json!({
			"@id": "http://ex.org/s",
			"@context": {"@vocab": "http://ex.org/"},
			"name": "x"
		}),
	);

	common::assert_quads(&quads, r#"<http://ex.org/s> <http://ex.org/name> "x" ."#)
}

#[test]
fn out_of_order_context_keeps_flushed_quads() {
	let input = r#"{
		"@id": "http://ex.org/s",
		"http://ex.org/p": "o",
		"@context": {"@vocab": "http://ex.org/"},
		"name": "x"
	}"#;

	let mut quads = Vec::new();
	let err = Parser::new(Options::default())
		.read(input.as_bytes(), &mut |q: Quad| quads.push(q))
		.unwrap_err();

	assert_eq!(err.code(), Some(ErrorCode::InvalidStreamingKeyOrder));
	assert!(err.to_string().contains("the document root"));
	common::assert_quads(&quads, r#"<http://ex.org/s> <http://ex.org/p> "o" ."#)
}

#[test]
fn out_of_order_nested_context() {
	let err = parse_value(
		&json!({
			"http://ex.org/p": {"@id": "http://ex.org/o", "@context": {}}
		}),
		Options::default(),
	)
	.unwrap_err();

	assert_eq!(err.code(), Some(ErrorCode::InvalidStreamingKeyOrder));
	assert!(err.to_string().contains("/http://ex.org/p"))
}

#[test]
fn base_iri() {
	let options =
		Options::default().with_base_iri(IriBuf::new("http://ex.org/dir/").unwrap());
	let quads = convert_with(options, json!({"@id": "s", "http://ex.org/p": {"@id": "../o"}}));

	common::assert_quads(&quads, "<http://ex.org/dir/s> <http://ex.org/p> <http://ex.org/o> .")
}

#[test]
fn root_context() {
	let options = Options::default().with_context(json!({"@vocab": "http://ex.org/"}));
	let quads = convert_with(options, json!({"@id": "http://ex.org/s", "name": "x"}));

	common::assert_quads(&quads, r#"<http://ex.org/s> <http://ex.org/name> "x" ."#)
}

#[test]
fn invalid_predicates() {
	let doc = json!({"@id": "http://ex.org/s", "name": "x"});

	assert!(convert_with(Options::default(), doc.clone()).is_empty());

	let err = parse_value(&doc, Options::default().with_strict_values(true)).unwrap_err();
	assert_eq!(err.code(), Some(ErrorCode::InvalidPredicate))
}

#[test]
fn i18n_datatype_direction() {
	let quads = convert_with(
		Options::default().with_rdf_direction(RdfDirection::I18nDatatype),
		json!({
			"@id": "http://ex.org/s",
			"http://ex.org/p": {"@value": "x", "@language": "en", "@direction": "rtl"}
		}),
	);

	common::assert_quads(
		&quads,
		r#"<http://ex.org/s> <http://ex.org/p> "x"^^<https://www.w3.org/ns/i18n#en_rtl> ."#,
	)
}

#[test]
fn compound_literal_direction() {
	let quads = convert_with(
		Options::default().with_rdf_direction(RdfDirection::CompoundLiteral),
		json!({
			"@id": "http://ex.org/s",
			"http://ex.org/p": {"@value": "x", "@language": "en", "@direction": "rtl"}
		}),
	);

	common::assert_quads(
		&quads,
		r#"
		<http://ex.org/s> <http://ex.org/p> _:c .
		_:c <http://www.w3.org/1999/02/22-rdf-syntax-ns#value> "x" .
		_:c <http://www.w3.org/1999/02/22-rdf-syntax-ns#language> "en" .
		_:c <http://www.w3.org/1999/02/22-rdf-syntax-ns#direction> "rtl" .
		"#,
	)
}

#[test]
fn direction_dropped_by_default() {
	let quads = convert_with(
		Options::default(),
		json!({
			"@id": "http://ex.org/s",
			"http://ex.org/p": {"@value": "x", "@language": "en", "@direction": "rtl"}
		}),
	);

	common::assert_quads(&quads, r#"<http://ex.org/s> <http://ex.org/p> "x"@en ."#)
}

#[test]
fn language_tag_normalization() {
	let doc = json!({
		"@id": "http://ex.org/s",
		"http://ex.org/p": {"@value": "x", "@language": "EN-us"}
	});

	let normalized = convert_with(
		Options::default().with_language_tag_normalization(true),
		doc.clone(),
	);
	assert_eq!(format_term(&normalized[0].2), r#""x"@en-us"#);

	let kept = convert_with(Options::default(), doc);
	assert_eq!(format_term(&kept[0].2), r#""x"@EN-us"#)
}

#[test]
fn blank_node_prefix() {
	let quads = convert_with(
		Options::default().with_blank_node_prefix("n"),
		json!({"http://ex.org/p": "o"}),
	);

	assert_eq!(quads.len(), 1);
	assert_eq!(format_term(&quads[0].0), "_:n0")
}

#[test]
fn index_validation() {
	let doc = json!({
		"@id": "http://ex.org/s",
		"http://ex.org/p": {"@value": "x", "@index": 1}
	});

	assert_eq!(convert_with(Options::default(), doc.clone()).len(), 1);

	let err = parse_value(&doc, Options::default().with_value_index_validation(true)).unwrap_err();
	assert_eq!(err.code(), Some(ErrorCode::InvalidIndexValue))
}
