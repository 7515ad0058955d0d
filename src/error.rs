use std::fmt;

/// JSON-LD error codes.
///
/// The [`fmt::Display`] implementation gives the code name used by the
/// JSON-LD 1.1 Processing Algorithms and API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
	CollidingKeywords,
	ConflictingIndexes,
	ContextOverflow,
	InvalidAnnotation,
	InvalidBaseDirection,
	InvalidBaseIri,
	InvalidContainerMapping,
	InvalidContextEntry,
	InvalidContextNullification,
	InvalidDefaultLanguage,
	InvalidId,
	InvalidIncludedValue,
	InvalidIndexValue,
	InvalidIriMapping,
	InvalidJsonLiteral,
	InvalidKeywordAlias,
	InvalidLanguageMapValue,
	InvalidLanguageTaggedString,
	InvalidLanguageTaggedValue,
	InvalidLocalContext,
	InvalidNestValue,
	InvalidPredicate,
	InvalidPropagateValue,
	InvalidRemoteContext,
	InvalidReverseProperty,
	InvalidReversePropertyMap,
	InvalidReversePropertyValue,
	InvalidReverseValue,
	InvalidSetOrListObject,
	InvalidStreamingKeyOrder,
	InvalidTermDefinition,
	InvalidTypeMapping,
	InvalidTypeValue,
	InvalidTypedValue,
	InvalidValueObject,
	InvalidValueObjectValue,
	InvalidVersionValue,
	InvalidVocabMapping,
	IriConfusedWithPrefix,
	KeywordRedefinition,
	LoadingRemoteContextFailed,
	ProcessingModeConflict,
	ProtectedTermRedefinition,
	UnknownKeyword,
	UnsupportedValueKind,
}

impl ErrorCode {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::CollidingKeywords => "colliding keywords",
			Self::ConflictingIndexes => "conflicting indexes",
			Self::ContextOverflow => "context overflow",
			Self::InvalidAnnotation => "invalid annotation",
			Self::InvalidBaseDirection => "invalid base direction",
			Self::InvalidBaseIri => "invalid base IRI",
			Self::InvalidContainerMapping => "invalid container mapping",
			Self::InvalidContextEntry => "invalid context entry",
			Self::InvalidContextNullification => "invalid context nullification",
			Self::InvalidDefaultLanguage => "invalid default language",
			Self::InvalidId => "invalid @id value",
			Self::InvalidIncludedValue => "invalid @included value",
			Self::InvalidIndexValue => "invalid @index value",
			Self::InvalidIriMapping => "invalid IRI mapping",
			Self::InvalidJsonLiteral => "invalid JSON literal",
			Self::InvalidKeywordAlias => "invalid keyword alias",
			Self::InvalidLanguageMapValue => "invalid language map value",
			Self::InvalidLanguageTaggedString => "invalid language-tagged string",
			Self::InvalidLanguageTaggedValue => "invalid language-tagged value",
			Self::InvalidLocalContext => "invalid local context",
			Self::InvalidNestValue => "invalid @nest value",
			Self::InvalidPredicate => "invalid predicate",
			Self::InvalidPropagateValue => "invalid @propagate value",
			Self::InvalidRemoteContext => "invalid remote context",
			Self::InvalidReverseProperty => "invalid reverse property",
			Self::InvalidReversePropertyMap => "invalid reverse property map",
			Self::InvalidReversePropertyValue => "invalid reverse property value",
			Self::InvalidReverseValue => "invalid @reverse value",
			Self::InvalidSetOrListObject => "invalid set or list object",
			Self::InvalidStreamingKeyOrder => "invalid streaming key order",
			Self::InvalidTermDefinition => "invalid term definition",
			Self::InvalidTypeMapping => "invalid type mapping",
			Self::InvalidTypeValue => "invalid type value",
			Self::InvalidTypedValue => "invalid typed value",
			Self::InvalidValueObject => "invalid value object",
			Self::InvalidValueObjectValue => "invalid value object value",
			Self::InvalidVersionValue => "invalid @version value",
			Self::InvalidVocabMapping => "invalid vocab mapping",
			Self::IriConfusedWithPrefix => "IRI confused with prefix",
			Self::KeywordRedefinition => "keyword redefinition",
			Self::LoadingRemoteContextFailed => "loading remote context failed",
			Self::ProcessingModeConflict => "processing mode conflict",
			Self::ProtectedTermRedefinition => "protected term redefinition",
			Self::UnknownKeyword => "unknown keyword",
			Self::UnsupportedValueKind => "unsupported value kind",
		}
	}
}

impl fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Parsing error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// Violation of a named JSON-LD constraint.
	#[error("{code}: {message}")]
	Coded { code: ErrorCode, message: String },

	/// Malformed JSON input.
	#[error("invalid JSON: {0}")]
	Json(#[from] struson::reader::ReaderError),

	/// The parser already reported a fatal error and refuses further input.
	#[error("parser halted after a previous error")]
	Halted,
}

impl Error {
	pub fn coded(code: ErrorCode, message: impl Into<String>) -> Self {
		Self::Coded {
			code,
			message: message.into(),
		}
	}

	/// Returns the JSON-LD error code, if any.
	pub fn code(&self) -> Option<ErrorCode> {
		match self {
			Self::Coded { code, .. } => Some(*code),
			_ => None,
		}
	}
}

pub type Result<T> = std::result::Result<T, Error>;
