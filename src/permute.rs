//! Make a grammar non-deleting and non-permuting by specializing every
//! nonterminal per permutation context. Each task (nonterminal, permutation)
//! stands for "this nonterminal, with its output components reordered by
//! this permutation"; the worklist explores the tasks reachable from the
//! start symbol and emits one specialized copy of the defining rules per
//! task. A variable the head drops contributes no permutation entry, so
//! deletion is absorbed into a smaller specialized arity.

use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::registry::ArityRegistry;
use crate::rules::{BodyAtom, Grammar, Head, Rule, START_SYMBOL};

type Perm = Vec<usize>;

fn apply_perm<T: Clone>(xs: &[T], perm: &[usize]) -> Vec<T> {
  perm.iter().map(|&i| xs[i].clone()).collect()
}

fn is_identity(perm: &[usize], arity: usize) -> bool {
  perm.len() == arity && perm.iter().enumerate().all(|(i, &p)| p == i)
}

/// The rules defining `nterm`, with their head arguments reordered.
fn permuted_rules(grammar: &Grammar, nterm: &str, perm: &[usize]) -> Vec<Rule> {
  grammar
    .rules
    .iter()
    .filter(|rule| rule.head.nterm == nterm)
    .map(|rule| {
      Rule::new(
        Head::new(nterm, apply_perm(&rule.head.args, perm)),
        rule.body.clone(),
      )
    })
    .collect()
}

/// For each variable of the head (in head order) that the atom supplies,
/// the position it holds in the atom's own argument list.
fn permutation_of(lvars: &[String], rvars: &[String]) -> Perm {
  lvars
    .iter()
    .filter_map(|x| rvars.iter().position(|v| v == x))
    .collect()
}

/// Rewrite the grammar so that every head lists its body variables in
/// supply order, with no omissions. Returns the new grammar together with
/// the registry of all specialized nonterminals.
pub fn eliminate_permutation(grammar: &Grammar) -> (Grammar, ArityRegistry) {
  let mut registry = ArityRegistry::new();
  registry.register(START_SYMBOL, 1);

  let seed = (START_SYMBOL.to_string(), vec![0usize]);
  let mut done: HashMap<(String, Perm), String> = HashMap::new();
  done.insert(seed.clone(), START_SYMBOL.to_string());
  let mut work: VecDeque<(String, Perm)> = VecDeque::new();
  work.push_back(seed);

  let mut result = Vec::new();
  while let Some((nterm, perm)) = work.pop_front() {
    let target = done[&(nterm.clone(), perm.clone())].clone();
    for rule in permuted_rules(grammar, &nterm, &perm) {
      let lvars = rule.head.vars();
      let mut new_body = Vec::with_capacity(rule.body.len());
      for atom in rule.body.iter() {
        let aperm = permutation_of(&lvars, &atom.args);
        let key = (atom.nterm.clone(), aperm.clone());
        let resolved = match done.get(&key) {
          Some(name) => name.clone(),
          None => {
            // the bare name is reserved for the identity specialization
            let name = if is_identity(&aperm, atom.arity()) {
              registry.mint(&atom.nterm, atom.arity())
            } else {
              registry.mint_suffixed(&atom.nterm, aperm.len())
            };
            if name != atom.nterm {
              debug!("map: {}->{}", atom.nterm, name);
            }
            done.insert(key.clone(), name.clone());
            work.push_back(key);
            name
          }
        };
        new_body.push(BodyAtom::new(resolved, apply_perm(&atom.args, &aperm)));
      }
      result.push(Rule::new(Head::new(target.clone(), rule.head.args), new_body));
    }
  }
  (Grammar::new(result), registry)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::validate::{is_permuting, validate};

  fn run(s: &str) -> (Grammar, ArityRegistry) {
    let g: Grammar = s.parse().unwrap();
    validate(&g).unwrap();
    eliminate_permutation(&g)
  }

  #[test]
  fn specializes_permutation_chain() {
    let (g, reg) = run(
      "S(X Y Z) :- A(Y, Z, X).
       A(X, Y, Z) :- B(Z, Y, X).
       B(q, r, t).",
    );
    let rendered: Vec<String> = g.rules.iter().map(|r| r.to_string()).collect();
    assert_eq!(
      rendered,
      vec![
        "S(X Y Z) :- A0(X, Y, Z).",
        "A0(Z, X, Y) :- B0(Z, X, Y).",
        "B0(q, t, r).",
      ]
    );
    assert_eq!(reg.arity("A0"), Some(3));
    assert_eq!(reg.arity("B0"), Some(3));
  }

  #[test]
  fn output_is_non_permuting() {
    let (g, _) = run(
      "S(X Y Z) :- A(Y, Z, X).
       A(X, Y, Z) :- B(Z, Y, X).
       B(q, r, t).",
    );
    for rule in g.rules.iter() {
      assert!(!is_permuting(rule), "still permuting: {}", rule);
    }
    assert!(validate(&g).unwrap().is_clean());
  }

  #[test]
  fn absorbs_deletion() {
    let (g, reg) = run("S(X) :- A(X, Y). A(a, b).");
    let rendered: Vec<String> = g.rules.iter().map(|r| r.to_string()).collect();
    assert_eq!(rendered, vec!["S(X) :- A0(X).", "A0(a)."]);
    assert_eq!(reg.arity("A0"), Some(1));
    assert!(validate(&g).unwrap().is_clean());
  }

  #[test]
  fn identity_reuses_original_names() {
    let (g, reg) = run("S(X Y) :- A(X, Y). A(a, b). A(X c, Y d) :- A(X, Y).");
    let rendered: Vec<String> = g.rules.iter().map(|r| r.to_string()).collect();
    assert_eq!(
      rendered,
      vec![
        "S(X Y) :- A(X, Y).",
        "A(a, b).",
        "A(X c, Y d) :- A(X, Y).",
      ]
    );
    assert_eq!(reg.arity("A"), Some(2));
  }
}
