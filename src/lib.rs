#[macro_use]
extern crate lazy_static;

pub mod normalize;
pub mod parse_grammar;
pub mod permute;
pub mod rank;
pub mod registry;
pub mod rules;
pub mod utils;
pub mod validate;

use crate::registry::ArityRegistry;
use crate::rules::Grammar;
use crate::validate::{Report, Validation};
pub use crate::utils::Err;

impl Grammar {
  /// Check the static semantics; see `validate::validate`.
  pub fn validate(&self) -> Result<Validation, Report> {
    validate::validate(self)
  }

  /// Transform to normal form; the grammar must have validated against
  /// the registry passed in.
  pub fn normalize(self, registry: &mut ArityRegistry) -> Result<Grammar, Err> {
    normalize::normalize(self, registry)
  }

  /// Reduce every rule to at most two body atoms (may raise dimension).
  pub fn reduce_rank_generic(self, registry: &mut ArityRegistry) -> Grammar {
    rank::reduce_rank_generic(self, registry)
  }

  /// Reduce dimension-1 rules to at most two body atoms, keeping
  /// dimension 1; other rules pass through.
  pub fn reduce_rank_dim1(self, registry: &mut ArityRegistry) -> Result<Grammar, Err> {
    rank::reduce_rank_dim1(self, registry)
  }

  /// Rewrite to a non-deleting, non-permuting grammar. Returns the new
  /// grammar and the registry of specialized nonterminals.
  pub fn eliminate_permutation(&self) -> (Grammar, ArityRegistry) {
    permute::eliminate_permutation(self)
  }
}

#[test]
fn test_full_pipeline() {
  let g: Grammar = r#"
    % a 2-MCFG with a permuting rule and a wide rule
    S(X Y) :- D(X, Y).
    D(Y a, X) :- D(X, Y).
    D(a, b).
    S(X Y Z) :- A(X), A(Y), A(Z).
    A(c).
  "#
  .parse()
  .unwrap();

  let validation = g.validate().unwrap();
  assert_eq!(validation.report.warnings(), 1); // the permuting D rule
  let mut registry = validation.registry;

  let g = g.reduce_rank_generic(&mut registry);
  assert!(g.rank() <= 2);

  let (g, mut registry) = g.eliminate_permutation();
  let validation = g.validate().unwrap();
  assert!(validation.is_clean());

  let g = g.normalize(&mut registry).unwrap();
  let validation = g.validate().unwrap();
  assert!(validation.is_clean());
  assert!(g.rank() <= 2);
}
