use std::collections::HashMap;
use std::fmt;

/// Maps every nonterminal to its fixed arity. This is the one piece of
/// mutable state threaded through the whole pipeline: each stage registers
/// the nonterminals it mints before emitting rules that use them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArityRegistry {
  arities: HashMap<String, usize>,
}

impl ArityRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn contains(&self, nterm: &str) -> bool {
    self.arities.contains_key(nterm)
  }

  pub fn arity(&self, nterm: &str) -> Option<usize> {
    self.arities.get(nterm).copied()
  }

  pub fn register(&mut self, nterm: impl Into<String>, arity: usize) {
    self.arities.insert(nterm.into(), arity);
  }

  pub fn len(&self) -> usize {
    self.arities.len()
  }

  pub fn is_empty(&self) -> bool {
    self.arities.is_empty()
  }

  /// Mint a nonterminal name derived from `base` and register it at `arity`.
  ///
  /// An unregistered `base` is claimed as-is; otherwise trailing digits are
  /// stripped off and the smallest free numbered variant of the stem is
  /// taken. Deterministic given the registry state and call order.
  pub fn mint(&mut self, base: &str, arity: usize) -> String {
    if !self.contains(base) {
      self.register(base, arity);
      return base.to_string();
    }
    self.mint_suffixed(base, arity)
  }

  /// Like `mint`, but never returns the bare `base`: always derives a
  /// numbered variant. The permutation eliminator uses this to keep the
  /// original name reserved for the identity specialization.
  pub fn mint_suffixed(&mut self, base: &str, arity: usize) -> String {
    let stem = base.trim_end_matches(|c: char| c.is_ascii_digit());
    let mut i = 0;
    loop {
      let candidate = format!("{}{}", stem, i);
      if !self.contains(&candidate) {
        self.register(candidate.clone(), arity);
        return candidate;
      }
      i += 1;
    }
  }
}

impl fmt::Display for ArityRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut entries: Vec<_> = self.arities.iter().collect();
    entries.sort();
    for (nterm, arity) in entries {
      writeln!(f, "{}/{}", nterm, arity)?;
    }
    Ok(())
  }
}

#[test]
fn test_mint_unregistered_base() {
  let mut reg = ArityRegistry::new();
  assert_eq!(reg.mint("A", 2), "A");
  assert_eq!(reg.arity("A"), Some(2));
}

#[test]
fn test_mint_strips_digits() {
  let mut reg = ArityRegistry::new();
  reg.register("A12", 1);
  assert_eq!(reg.mint("A12", 3), "A0");
  assert_eq!(reg.arity("A0"), Some(3));
  // the stem search starts over from 0 every time
  assert_eq!(reg.mint("A0", 1), "A1");
}

#[test]
fn test_mint_never_collides() {
  let mut reg = ArityRegistry::new();
  let mut seen = std::collections::HashSet::new();
  seen.insert(reg.mint("B", 1));
  for _ in 0..20 {
    let name = reg.mint("B", 1);
    assert!(seen.insert(name));
  }
}

#[test]
fn test_mint_suffixed_skips_base() {
  let mut reg = ArityRegistry::new();
  assert_eq!(reg.mint_suffixed("A", 2), "A0");
  assert!(!reg.contains("A"));
  assert_eq!(reg.mint("A", 1), "A");
}
