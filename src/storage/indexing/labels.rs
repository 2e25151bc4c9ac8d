//! Label triples grouped by subject.

use oxigraph::model::{Quad, Term};
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::storage::triple_store::subject_value;

/// Literal label triples per subject IRI, ordered by predicate priority.
#[derive(Debug)]
pub struct LabelIndex {
    priorities: Vec<String>,
    postfixes: Option<Regex>,
    by_subject: HashMap<String, Vec<Quad>>,
}

impl LabelIndex {
    /// `predicates` are known label predicates, most preferred first.
    /// `postfixes` are matched case-insensitively anywhere in a predicate IRI.
    pub fn new(predicates: &[String], postfixes: &[String]) -> Result<Self> {
        let postfixes = if postfixes.is_empty() {
            None
        } else {
            let alternation =
                postfixes.iter().map(|postfix| regex::escape(postfix)).collect::<Vec<_>>().join("|");
            let regex = RegexBuilder::new(&alternation)
                .case_insensitive(true)
                .build()
                .map_err(|e| Error::Config(format!("Invalid label postfix: {}", e)))?;
            Some(regex)
        };
        Ok(Self { priorities: predicates.to_vec(), postfixes, by_subject: HashMap::new() })
    }

    pub fn is_label_predicate(&self, predicate: &str) -> bool {
        self.priorities.iter().any(|known| known == predicate)
    }

    fn has_label_postfix(&self, predicate: &str) -> bool {
        self.postfixes.as_ref().is_some_and(|regex| regex.is_match(predicate))
    }

    /// Unknown predicates rank after every known one.
    fn rank(&self, predicate: &str) -> usize {
        self.priorities.iter().position(|known| known == predicate).unwrap_or(self.priorities.len())
    }

    /// Indexes the label triples among `quads`.
    ///
    /// A predicate counts as a label when it is a known label predicate, or
    /// when it contains a label postfix and the subject has no entry yet.
    /// Every accepted subject gets an entry even if the object is not a
    /// literal; only literal objects are stored.
    pub fn extend<'a>(&mut self, quads: impl IntoIterator<Item = &'a Quad>) {
        for quad in quads {
            let subject = subject_value(quad);
            let predicate = quad.predicate.as_str();
            let accepted = self.is_label_predicate(predicate)
                || (!self.by_subject.contains_key(subject) && self.has_label_postfix(predicate));
            if !accepted {
                continue;
            }
            let rank = self.rank(predicate);
            let priorities_len = self.priorities.len();
            let priorities = &self.priorities;
            let labels = self.by_subject.entry(subject.to_string()).or_default();
            if matches!(quad.object, Term::Literal(_)) {
                labels.push(quad.clone());
                if rank < priorities_len {
                    // stable: equal ranks keep insertion order
                    labels.sort_by_key(|label| {
                        priorities
                            .iter()
                            .position(|known| known == label.predicate.as_str())
                            .unwrap_or(priorities_len)
                    });
                }
            }
        }
    }

    pub fn contains(&self, subject: &str) -> bool {
        self.by_subject.contains_key(subject)
    }

    pub fn get(&self, subject: &str) -> &[Quad] {
        self.by_subject.get(subject).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_subject.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_subject.is_empty()
    }
}
