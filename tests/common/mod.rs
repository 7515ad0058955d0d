//! Quad comparison helpers shared by the integration tests.
#![allow(dead_code)]

use jsonld_stream::Quad;
use nquads_syntax::Parse;
use rdf_types::RdfDisplay;
use std::collections::BTreeMap;

/// Quad with every component in N-Quads form.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Statement {
	pub subject: String,
	pub predicate: String,
	pub object: String,
	pub graph: Option<String>,
}

impl Statement {
	fn components(&self) -> impl Iterator<Item = Option<&str>> {
		[
			Some(self.subject.as_str()),
			Some(self.predicate.as_str()),
			Some(self.object.as_str()),
			self.graph.as_deref(),
		]
		.into_iter()
	}
}

impl std::fmt::Display for Statement {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "{} {} {}", self.subject, self.predicate, self.object)?;
		if let Some(graph) = &self.graph {
			write!(f, " {graph}")?;
		}
		write!(f, " .")
	}
}

pub fn statement(quad: &Quad) -> Statement {
	let rdf_types::Quad(s, p, o, g) = quad;
	Statement {
		subject: s.rdf_display().to_string(),
		predicate: p.rdf_display().to_string(),
		object: o.rdf_display().to_string(),
		graph: g.as_ref().map(|g| g.rdf_display().to_string()),
	}
}

/// Parses an N-Quads document.
pub fn parse_nquads(input: &str) -> Vec<Statement> {
	nquads_syntax::Document::parse_str(input, |span| span)
		.unwrap()
		.into_value()
		.into_iter()
		.map(|q| {
			let rdf_types::Quad(s, p, o, g) = q.into_value().strip_all_but_predicate();
			Statement {
				subject: s.rdf_display().to_string(),
				predicate: p.rdf_display().to_string(),
				object: o.rdf_display().to_string(),
				graph: g.map(|g| g.rdf_display().to_string()),
			}
		})
		.collect()
}

fn is_blank(component: &str) -> bool {
	component.starts_with("_:")
}

/// Blank node label bijection being built.
#[derive(Default)]
struct Mapping {
	forward: BTreeMap<String, String>,
	backward: BTreeMap<String, String>,
}

impl Mapping {
	/// Binds the labels of `a` to those of `b`, recording new bindings in
	/// `bound`.
	fn unify(&mut self, a: &Statement, b: &Statement, bound: &mut Vec<String>) -> bool {
		for (x, y) in a.components().zip(b.components()) {
			match (x, y) {
				(None, None) => (),
				(Some(x), Some(y)) if is_blank(x) && is_blank(y) => {
					match (self.forward.get(x), self.backward.get(y)) {
						(Some(target), _) if target != y => return false,
						(Some(_), _) => (),
						(None, Some(_)) => return false,
						(None, None) => {
							self.forward.insert(x.to_owned(), y.to_owned());
							self.backward.insert(y.to_owned(), x.to_owned());
							bound.push(x.to_owned())
						}
					}
				}
				(Some(x), Some(y)) if x == y && !is_blank(x) => (),
				_ => return false,
			}
		}

		true
	}

	fn unbind(&mut self, bound: Vec<String>) {
		for label in bound {
			if let Some(target) = self.forward.remove(&label) {
				self.backward.remove(&target);
			}
		}
	}

	fn search(&mut self, actual: &[Statement], expected: &[Statement], used: &mut [bool]) -> bool {
		let Some((first, rest)) = actual.split_first() else {
			return true;
		};

		for (i, candidate) in expected.iter().enumerate() {
			if used[i] {
				continue;
			}

			let mut bound = Vec::new();
			if self.unify(first, candidate, &mut bound) {
				used[i] = true;
				if self.search(rest, expected, used) {
					return true;
				}
				used[i] = false;
			}
			self.unbind(bound)
		}

		false
	}
}

/// Checks that two datasets are equal up to blank node relabeling.
pub fn isomorphic(actual: &[Statement], expected: &[Statement]) -> bool {
	let mut actual = actual.to_vec();
	actual.sort();
	actual.dedup();
	let mut expected = expected.to_vec();
	expected.sort();
	expected.dedup();

	if actual.len() != expected.len() {
		return false;
	}

	let mut used = vec![false; expected.len()];
	Mapping::default().search(&actual, &expected, &mut used)
}

pub fn assert_isomorphic(actual: &[Statement], expected: &[Statement]) {
	let eq = isomorphic(actual, expected);

	if !eq {
		for s in actual {
			eprintln!("{s}")
		}
	}

	assert!(eq)
}

/// Checks `quads` against an N-Quads document.
pub fn assert_quads(quads: &[Quad], expected: &str) {
	let actual: Vec<_> = quads.iter().map(statement).collect();
	assert_isomorphic(&actual, &parse_nquads(expected))
}
