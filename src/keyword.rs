use std::fmt;
use std::str::FromStr;

/// JSON-LD keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
	Annotation,
	Base,
	Container,
	Context,
	Direction,
	Graph,
	Id,
	Import,
	Included,
	Index,
	Json,
	Language,
	List,
	Nest,
	None,
	Prefix,
	Propagate,
	Protected,
	Reverse,
	Set,
	Type,
	Value,
	Version,
	Vocab,
}

#[derive(Debug, Clone)]
pub struct NotAKeyword;

impl FromStr for Keyword {
	type Err = NotAKeyword;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"@annotation" => Ok(Self::Annotation),
			"@base" => Ok(Self::Base),
			"@container" => Ok(Self::Container),
			"@context" => Ok(Self::Context),
			"@direction" => Ok(Self::Direction),
			"@graph" => Ok(Self::Graph),
			"@id" => Ok(Self::Id),
			"@import" => Ok(Self::Import),
			"@included" => Ok(Self::Included),
			"@index" => Ok(Self::Index),
			"@json" => Ok(Self::Json),
			"@language" => Ok(Self::Language),
			"@list" => Ok(Self::List),
			"@nest" => Ok(Self::Nest),
			"@none" => Ok(Self::None),
			"@prefix" => Ok(Self::Prefix),
			"@propagate" => Ok(Self::Propagate),
			"@protected" => Ok(Self::Protected),
			"@reverse" => Ok(Self::Reverse),
			"@set" => Ok(Self::Set),
			"@type" => Ok(Self::Type),
			"@value" => Ok(Self::Value),
			"@version" => Ok(Self::Version),
			"@vocab" => Ok(Self::Vocab),
			_ => Err(NotAKeyword),
		}
	}
}

impl Keyword {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Annotation => "@annotation",
			Self::Base => "@base",
			Self::Container => "@container",
			Self::Context => "@context",
			Self::Direction => "@direction",
			Self::Graph => "@graph",
			Self::Id => "@id",
			Self::Import => "@import",
			Self::Included => "@included",
			Self::Index => "@index",
			Self::Json => "@json",
			Self::Language => "@language",
			Self::List => "@list",
			Self::Nest => "@nest",
			Self::None => "@none",
			Self::Prefix => "@prefix",
			Self::Propagate => "@propagate",
			Self::Protected => "@protected",
			Self::Reverse => "@reverse",
			Self::Set => "@set",
			Self::Type => "@type",
			Self::Value => "@value",
			Self::Version => "@version",
			Self::Vocab => "@vocab",
		}
	}
}

impl fmt::Display for Keyword {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Checks that `s` has the form of a keyword (`@` followed by ASCII letters).
///
/// Such strings are reserved: they are ignored when they are not actual
/// keywords.
pub fn is_keyword_like(s: &str) -> bool {
	s.len() > 1 && s.starts_with('@') && s[1..].bytes().all(|b| b.is_ascii_alphabetic())
}

pub fn is_keyword(s: &str) -> bool {
	Keyword::from_str(s).is_ok()
}

/// Entry of a document path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathKey {
	/// Document root, always at depth 0.
	Root,

	/// Object entry name.
	Name(String),

	/// Array index.
	Index(usize),
}

impl PathKey {
	pub fn as_name(&self) -> Option<&str> {
		match self {
			Self::Name(name) => Some(name),
			_ => None,
		}
	}

	pub fn is_index(&self) -> bool {
		matches!(self, Self::Index(_))
	}
}

impl fmt::Display for PathKey {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::Root => Ok(()),
			Self::Name(name) => f.write_str(name),
			Self::Index(i) => i.fmt(f),
		}
	}
}

impl From<&str> for PathKey {
	fn from(name: &str) -> Self {
		Self::Name(name.to_owned())
	}
}

impl From<String> for PathKey {
	fn from(name: String) -> Self {
		Self::Name(name)
	}
}

impl From<usize> for PathKey {
	fn from(i: usize) -> Self {
		Self::Index(i)
	}
}

/// A path key after keyword un-aliasing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
	Root,
	Index(usize),
	Keyword(Keyword),

	/// Keyword-like entry (`@foo`) that is not a known keyword.
	Reserved(String),

	/// Term, compact IRI or IRI.
	Term(String),
}

impl Key {
	pub fn is_keyword(&self, keyword: Keyword) -> bool {
		matches!(self, Self::Keyword(k) if *k == keyword)
	}
}

impl fmt::Display for Key {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::Root => Ok(()),
			Self::Index(i) => i.fmt(f),
			Self::Keyword(k) => k.fmt(f),
			Self::Reserved(s) | Self::Term(s) => f.write_str(s),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn keyword_like() {
		assert!(is_keyword_like("@foo"));
		assert!(is_keyword_like("@id"));
		assert!(!is_keyword_like("@"));
		assert!(!is_keyword_like("@foo1"));
		assert!(!is_keyword_like("foo"));
	}

	#[test]
	fn keyword_round_trip_names() {
		for name in ["@id", "@type", "@graph", "@nest", "@annotation"] {
			assert_eq!(Keyword::from_str(name).unwrap().as_str(), name)
		}
		assert!(Keyword::from_str("@foo").is_err())
	}
}
