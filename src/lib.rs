//! JSON-LD is a JSON-based syntax for RDF. This library converts JSON-LD
//! documents into RDF quads as the JSON input is read, without building the
//! document tree first. Quads are emitted as soon as their subject and graph
//! are known, so memory use depends on the nesting of the document rather
//! than its size.
//!
//! ## Basic usage
//!
//! A [`Parser`] consumes [`Event`]s, one for each completed JSON value, and
//! hands the quads it produces to a [`QuadSink`] (any `FnMut(Quad)`).
//! [`Parser::read`] produces these events from any [`std::io::Read`] input.
//!
//! ```rust
//! use jsonld_stream::{format_quad, Options, Parser, Quad};
//!
//! let input = r#"{
//!   "@context": {"@vocab": "http://example.org/"},
//!   "@id": "http://example.org/alice",
//!   "@type": "Person",
//!   "name": "Alice"
//! }"#;
//!
//! let mut parser = Parser::new(Options::default());
//! parser
//!   .read(input.as_bytes(), &mut |quad: Quad| println!("{}", format_quad(&quad)))
//!   .unwrap();
//! ```
//!
//! Remote contexts are fetched through a [`Loader`]. By default, the parser
//! refuses to load any remote document. Each URL is fetched at most once per
//! parser.
//!
//! Errors carry the [`ErrorCode`] defined by the JSON-LD 1.1 API. Once an
//! error is reported, the parser refuses any further event.
mod container;
pub mod context;
mod context_tree;
mod error;
mod handler;
pub mod keyword;
pub mod loader;
mod options;
mod parser;
mod state;
mod term;
pub mod vocab;

pub use context::Context;
pub use error::{Error, ErrorCode, Result};
pub use keyword::PathKey;
pub use loader::{Loader, MemoryLoader, NoLoader};
pub use options::{Options, ProcessingMode, RdfDirection};
pub use parser::{events_from_value, parse_str, parse_value, Event, Parser, QuadSink};
pub use term::{canonical_json, format_quad, format_term, Literal, Quad, Term};
