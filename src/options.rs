use iref::IriBuf;
use serde_json::Value;
use std::fmt;

/// JSON-LD processing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProcessingMode {
	V1_0,
	V1_1,
}

impl ProcessingMode {
	/// Maps a `@version` number to a processing mode.
	pub fn from_version(version: f64) -> Option<Self> {
		if version == 1.0 {
			Some(Self::V1_0)
		} else if version == 1.1 {
			Some(Self::V1_1)
		} else {
			None
		}
	}
}

impl fmt::Display for ProcessingMode {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::V1_0 => write!(f, "json-ld-1.0"),
			Self::V1_1 => write!(f, "json-ld-1.1"),
		}
	}
}

/// How `@direction` is encoded in RDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RdfDirection {
	/// Datatype IRI in the `https://www.w3.org/ns/i18n#` namespace.
	I18nDatatype,

	/// Blank node with `rdf:value`, `rdf:language` and `rdf:direction`.
	CompoundLiteral,
}

/// Parser options.
#[derive(Debug, Clone)]
pub struct Options {
	/// Document base IRI.
	pub base_iri: Option<IriBuf>,

	/// Context applied to the document root before any `@context` entry.
	pub context: Option<Value>,

	/// Accept `@context` entries after sibling entries were processed.
	pub allow_out_of_order_context: bool,

	/// Allow blank node predicates.
	pub produce_generalized_rdf: bool,

	/// Turn invalid IRIs, unknown keywords and invalid predicates into errors
	/// instead of silently dropping the entry.
	pub strict_values: bool,

	/// Check that `@index` values are strings.
	pub validate_value_indexes: bool,

	/// Lowercase language tags.
	pub normalize_language_tags: bool,

	/// Highest accepted processing mode.
	pub processing_mode: ProcessingMode,

	/// `@direction` encoding. Directions are dropped when `None`.
	pub rdf_direction: Option<RdfDirection>,

	/// Prefix of generated blank node labels.
	pub blank_node_prefix: String,
}

impl Default for Options {
	fn default() -> Self {
		Self {
			base_iri: None,
			context: None,
			allow_out_of_order_context: false,
			produce_generalized_rdf: false,
			strict_values: false,
			validate_value_indexes: false,
			normalize_language_tags: false,
			processing_mode: ProcessingMode::V1_1,
			rdf_direction: None,
			blank_node_prefix: "b".to_owned(),
		}
	}
}

impl Options {
	pub fn with_base_iri(mut self, base_iri: IriBuf) -> Self {
		self.base_iri = Some(base_iri);
		self
	}

	pub fn with_context(mut self, context: Value) -> Self {
		self.context = Some(context);
		self
	}

	pub fn with_out_of_order_context(mut self, allow: bool) -> Self {
		self.allow_out_of_order_context = allow;
		self
	}

	pub fn with_generalized_rdf(mut self, enabled: bool) -> Self {
		self.produce_generalized_rdf = enabled;
		self
	}

	pub fn with_strict_values(mut self, strict: bool) -> Self {
		self.strict_values = strict;
		self
	}

	pub fn with_value_index_validation(mut self, enabled: bool) -> Self {
		self.validate_value_indexes = enabled;
		self
	}

	pub fn with_language_tag_normalization(mut self, enabled: bool) -> Self {
		self.normalize_language_tags = enabled;
		self
	}

	pub fn with_processing_mode(mut self, mode: ProcessingMode) -> Self {
		self.processing_mode = mode;
		self
	}

	pub fn with_rdf_direction(mut self, direction: RdfDirection) -> Self {
		self.rdf_direction = Some(direction);
		self
	}

	pub fn with_blank_node_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.blank_node_prefix = prefix.into();
		self
	}
}
