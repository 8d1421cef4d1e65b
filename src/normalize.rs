//! Transformation to normal form: seven stages, each run to a local
//! fixpoint, that together bound the shape of every rule (single-symbol
//! terminal rules, no terminals in multi-body heads, at most two symbols
//! per argument, one non-trivial argument per rule). Dimension, rank and
//! degree of the grammar are left unchanged by the full pass.

use tracing::debug;

use crate::registry::ArityRegistry;
use crate::rules::{BodyAtom, Grammar, Head, Rule, Word, is_var};
use crate::utils::Err;

fn single(sym: &str) -> Word {
  vec![sym.to_string()]
}

/// The first word with a maximal terminal run: `(i, j, k)` such that
/// `args[i][j..k]` is non-empty, all-terminal, and bounded by variables or
/// word edges.
fn find_terminal_segment(args: &[Word]) -> Option<(usize, usize, usize)> {
  for (i, w) in args.iter().enumerate() {
    for j in 0..w.len() {
      if !is_var(&w[j]) {
        for k in j + 1..w.len() {
          if is_var(&w[k]) {
            return Some((i, j, k));
          }
        }
        return Some((i, j, w.len()));
      }
    }
  }
  None
}

/// Locate variable `x` among the body atoms: `(atom index, arg index)`.
pub(crate) fn find_rhs(x: &str, body: &[BodyAtom]) -> Option<(usize, usize)> {
  for (l, atom) in body.iter().enumerate() {
    for (m, arg) in atom.args.iter().enumerate() {
      if arg == x {
        return Some((l, m));
      }
    }
  }
  None
}

/// A head variable with no supplier in the body means the rule never passed
/// validation (or a rewrite went wrong); the transformation stops here.
pub(crate) fn missing_var(x: &str, rule: &Rule) -> Err {
  format!(
    "internal consistency failure: variable {} does not occur in any body atom of {}",
    x, rule
  )
  .into()
}

/// Index of the first argument consisting of terminals only.
fn find_all_terminal(args: &[Word]) -> Option<usize> {
  match find_terminal_segment(args) {
    Some((i, 0, k)) if k == args[i].len() => Some(i),
    _ => None,
  }
}

/// Index of the first argument that is not a bare single variable.
fn find_non_var(args: &[&Word]) -> Option<usize> {
  args.iter().position(|w| !(w.len() == 1 && is_var(&w[0])))
}

fn args_without<'a>(args: &'a [Word], i: usize) -> Vec<&'a Word> {
  args
    .iter()
    .enumerate()
    .filter(|(idx, _)| *idx != i)
    .map(|(_, w)| w)
    .collect()
}

/// An argument longer than `min` containing two variable occurrences:
/// `(arg index, first var position, second var position)`.
fn find_two_vars(args: &[Word], min: usize) -> Option<(usize, usize, usize)> {
  for (i, w) in args.iter().enumerate() {
    if w.len() > min {
      for j in 0..w.len() {
        if is_var(&w[j]) {
          for k in j + 1..w.len() {
            if is_var(&w[k]) {
              return Some((i, j, k));
            }
          }
        }
      }
    }
  }
  None
}

/// First argument longer than two symbols, or of length two with both
/// symbols terminal.
fn find_too_long(args: &[Word]) -> Option<usize> {
  args
    .iter()
    .position(|w| w.len() > 2 || (w.len() == 2 && !is_var(&w[0]) && !is_var(&w[1])))
}

/// `Z0`, `Z1`, ... skipping any name in `avoid`. Freshness is only needed
/// with respect to the rule being rewritten, not across the grammar.
pub(crate) fn fresh_vars(n: usize, avoid: &[String]) -> Vec<String> {
  let mut result = Vec::with_capacity(n);
  let mut i = 0;
  while result.len() < n {
    let candidate = format!("Z{}", i);
    i += 1;
    if !avoid.contains(&candidate) {
      result.push(candidate);
    }
  }
  result
}

fn z_vars(n: usize) -> Vec<String> {
  (0..n).map(|i| format!("Z{}", i)).collect()
}

/// Stage 1: a terminal rule whose head has several arguments loses its
/// first argument to a fresh unary nonterminal.
pub fn step1(rules: Vec<Rule>, registry: &mut ArityRegistry) -> Vec<Rule> {
  let mut result = Vec::with_capacity(rules.len());
  for rule in rules {
    if !rule.body.is_empty() || rule.head.arity() <= 1 {
      result.push(rule);
      continue;
    }
    let a0 = rule.head.nterm.clone();
    let mut args = rule.head.args;
    let w1 = args.remove(0);
    let a1 = registry.mint(&a0, 1);
    debug!("transform step 1: {}->{}", a0, a1);
    result.push(Rule::new(Head::new(a1.clone(), vec![w1]), vec![]));
    let mut head_args = vec![single("X")];
    head_args.extend(args);
    result.push(Rule::new(
      Head::new(a0, head_args),
      vec![BodyAtom::new(a1, vec!["X".to_string()])],
    ));
  }
  result
}

/// Stage 2: a terminal rule with one multi-symbol argument peels off its
/// first symbol.
pub fn step2(rules: Vec<Rule>, registry: &mut ArityRegistry) -> Vec<Rule> {
  let mut result = Vec::with_capacity(rules.len());
  for rule in rules {
    if !rule.body.is_empty() || rule.head.arity() > 1 || rule.head.args[0].len() == 1 {
      result.push(rule);
      continue;
    }
    let a0 = rule.head.nterm.clone();
    let mut w = rule.head.args.into_iter().next().unwrap();
    let first = w.remove(0);
    let a1 = registry.mint(&a0, 1);
    debug!("transform step 2: {}->{}", a0, a1);
    result.push(Rule::new(Head::new(a1.clone(), vec![vec![first]]), vec![]));
    let mut head_word = single("X");
    head_word.extend(w);
    result.push(Rule::new(
      Head::new(a0, vec![head_word]),
      vec![BodyAtom::new(a1, vec!["X".to_string()])],
    ));
  }
  result
}

/// Stage 3: strip maximal terminal segments out of the heads of rules with
/// two or more body atoms. Case (a): the segment is a whole argument, which
/// stays behind while the rest moves to a smaller-arity nonterminal.
/// Cases (b)/(c): the segment is spliced next to its neighbouring variable
/// inside the atom that supplies that variable.
pub fn step3(rules: Vec<Rule>, registry: &mut ArityRegistry) -> Result<Vec<Rule>, Err> {
  let mut result = Vec::with_capacity(rules.len());
  let mut pending = rules;
  while let Some(rule) = pending.pop() {
    if rule.body.len() <= 1 {
      result.push(rule);
      continue;
    }
    let Some((i, j, k)) = find_terminal_segment(&rule.head.args) else {
      result.push(rule);
      continue;
    };
    let a0 = rule.head.nterm.clone();
    let args = rule.head.args.clone();
    let k0 = args.len();
    let si = args[i].clone();
    let w: Word = si[j..k].to_vec();
    if j == 0 && k == si.len() {
      let a1 = registry.mint(&a0, k0 - 1);
      debug!("transform step 3a: {}->{}", a0, a1);
      let x1 = z_vars(k0);
      let mut head1_args: Vec<Word> = x1[..i].iter().map(|z| single(z)).collect();
      head1_args.push(w);
      head1_args.extend(x1[i + 1..].iter().map(|z| single(z)));
      let mut body1_args = x1[..i].to_vec();
      body1_args.extend_from_slice(&x1[i + 1..]);
      result.push(Rule::new(
        Head::new(a0, head1_args),
        vec![BodyAtom::new(a1.clone(), body1_args)],
      ));
      let mut head2_args = args[..i].to_vec();
      head2_args.extend_from_slice(&args[i + 1..]);
      pending.push(Rule::new(Head::new(a1, head2_args), rule.body));
    } else if j == 0 {
      // si = w x s2
      let x = si[k].clone();
      let s2: Word = si[k + 1..].to_vec();
      let (l, m) = find_rhs(&x, &rule.body).ok_or_else(|| missing_var(&x, &rule))?;
      let atom = rule.body[l].clone();
      let al1 = registry.mint(&a0, atom.arity());
      debug!("transform step 3b: {}->{}", a0, al1);
      let mut head1_args: Vec<Word> = atom.args.iter().map(|v| single(v)).collect();
      let mut spliced = w;
      spliced.push(atom.args[m].clone());
      head1_args[m] = spliced;
      result.push(Rule::new(
        Head::new(al1.clone(), head1_args),
        vec![atom.clone()],
      ));
      let mut head2_args = args;
      let mut rest = vec![x];
      rest.extend(s2);
      head2_args[i] = rest;
      let mut body2 = rule.body.clone();
      body2[l] = BodyAtom::new(al1, atom.args);
      pending.push(Rule::new(Head::new(a0, head2_args), body2));
    } else {
      // si = s1 x w s2
      let x = si[j - 1].clone();
      let s1: Word = si[..j - 1].to_vec();
      let s2: Word = si[k..].to_vec();
      let (l, m) = find_rhs(&x, &rule.body).ok_or_else(|| missing_var(&x, &rule))?;
      let atom = rule.body[l].clone();
      let al1 = registry.mint(&a0, atom.arity());
      debug!("transform step 3c: {}->{}", a0, al1);
      let mut head1_args: Vec<Word> = atom.args.iter().map(|v| single(v)).collect();
      let mut spliced = vec![atom.args[m].clone()];
      spliced.extend(w);
      head1_args[m] = spliced;
      result.push(Rule::new(
        Head::new(al1.clone(), head1_args),
        vec![atom.clone()],
      ));
      let mut head2_args = args;
      let mut mid = s1;
      mid.push(x);
      mid.extend(s2);
      head2_args[i] = mid;
      let mut body2 = rule.body.clone();
      body2[l] = BodyAtom::new(al1, atom.args);
      pending.push(Rule::new(Head::new(a0, head2_args), body2));
    }
  }
  Ok(result)
}

/// Stage 4: in a single-body rule, an all-terminal argument next to some
/// other non-trivial argument stays behind in a wrapper rule while the
/// remaining arguments move to a smaller-arity nonterminal.
pub fn step4(rules: Vec<Rule>, registry: &mut ArityRegistry) -> Vec<Rule> {
  let mut result = Vec::with_capacity(rules.len());
  let mut pending = rules;
  while let Some(rule) = pending.pop() {
    if rule.body.len() != 1 {
      result.push(rule);
      continue;
    }
    let args = rule.head.args.clone();
    let k0 = args.len();
    let Some(i) = find_all_terminal(&args) else {
      result.push(rule);
      continue;
    };
    if find_non_var(&args_without(&args, i)).is_none() {
      result.push(rule);
      continue;
    }
    let a0 = rule.head.nterm.clone();
    let a1 = registry.mint(&a0, k0 - 1);
    debug!("transform step 4: {}->{}", a0, a1);
    let x1 = z_vars(k0 - 1);
    let mut head1_args: Vec<Word> = x1[..i].iter().map(|z| single(z)).collect();
    head1_args.push(args[i].clone());
    head1_args.extend(x1[i..].iter().map(|z| single(z)));
    result.push(Rule::new(
      Head::new(a0, head1_args),
      vec![BodyAtom::new(a1.clone(), x1)],
    ));
    let mut head2_args = args[..i].to_vec();
    head2_args.extend_from_slice(&args[i + 1..]);
    pending.push(Rule::new(Head::new(a1, head2_args), rule.body));
  }
  result
}

/// Stage 5: split any argument holding two or more variables at its second
/// variable, widening the rule by one argument slot.
pub fn step5(rules: Vec<Rule>, registry: &mut ArityRegistry) -> Vec<Rule> {
  let mut result = Vec::with_capacity(rules.len());
  let mut pending = rules;
  while let Some(rule) = pending.pop() {
    if rule.body.len() != 1 {
      result.push(rule);
      continue;
    }
    let args = rule.head.args.clone();
    let k0 = args.len();
    let Some((i, _, k)) = find_two_vars(&args, 2) else {
      result.push(rule);
      continue;
    };
    let si = args[i].clone();
    let si1: Word = si[..k].to_vec();
    let si2: Word = si[k..].to_vec();
    let a0 = rule.head.nterm.clone();
    let a1 = registry.mint(&a0, k0 + 1);
    debug!("transform step 5: {}->{}", a0, a1);
    let x1 = z_vars(k0 + 1);
    let mut head1_args: Vec<Word> = x1[..i].iter().map(|z| single(z)).collect();
    head1_args.push(vec![x1[i].clone(), x1[i + 1].clone()]);
    head1_args.extend(x1[i + 2..].iter().map(|z| single(z)));
    result.push(Rule::new(
      Head::new(a0, head1_args),
      vec![BodyAtom::new(a1.clone(), x1)],
    ));
    let mut head2_args = args[..i].to_vec();
    head2_args.push(si1);
    head2_args.push(si2);
    head2_args.extend_from_slice(&args[i + 1..]);
    pending.push(Rule::new(Head::new(a1, head2_args), rule.body));
  }
  result
}

/// Stage 6: bound argument length to two symbols (and forbid two-terminal
/// arguments) by peeling off the first symbol.
pub fn step6(rules: Vec<Rule>, registry: &mut ArityRegistry) -> Vec<Rule> {
  let mut result = Vec::with_capacity(rules.len());
  let mut pending = rules;
  while let Some(rule) = pending.pop() {
    if rule.body.len() != 1 {
      result.push(rule);
      continue;
    }
    let args = rule.head.args.clone();
    let k0 = args.len();
    let Some(i) = find_too_long(&args) else {
      result.push(rule);
      continue;
    };
    let si = args[i].clone();
    let s1 = si[0].clone();
    let s2: Word = si[1..].to_vec();
    let a0 = rule.head.nterm.clone();
    let a1 = registry.mint(&a0, k0);
    let x1 = z_vars(k0);
    if is_var(&s1) {
      // s2 is all terminals: keep them in the wrapper, isolate the variable
      debug!("transform step 6a: {}->{}", a0, a1);
      let mut head1_args: Vec<Word> = x1[..i].iter().map(|z| single(z)).collect();
      let mut merged = single(&x1[i]);
      merged.extend(s2);
      head1_args.push(merged);
      head1_args.extend(x1[i + 1..].iter().map(|z| single(z)));
      result.push(Rule::new(
        Head::new(a0, head1_args),
        vec![BodyAtom::new(a1.clone(), x1)],
      ));
      let mut head2_args = args[..i].to_vec();
      head2_args.push(vec![s1]);
      head2_args.extend_from_slice(&args[i + 1..]);
      // other arguments of the rewritten rule may still be over-long
      pending.push(Rule::new(Head::new(a1, head2_args), rule.body));
    } else {
      debug!("transform step 6b: {}->{}", a0, a1);
      let mut head1_args: Vec<Word> = x1[..i].iter().map(|z| single(z)).collect();
      head1_args.push(vec![s1, x1[i].clone()]);
      head1_args.extend(x1[i + 1..].iter().map(|z| single(z)));
      result.push(Rule::new(
        Head::new(a0, head1_args),
        vec![BodyAtom::new(a1.clone(), x1)],
      ));
      let mut head2_args = args[..i].to_vec();
      head2_args.push(s2);
      head2_args.extend_from_slice(&args[i + 1..]);
      pending.push(Rule::new(Head::new(a1, head2_args), rule.body));
    }
  }
  result
}

/// Stage 7: allow at most one non-trivial argument per rule by pushing all
/// others down to a fresh nonterminal, one at a time. The wrapper keeps the
/// isolated argument; its variables are passed through under names fresh
/// for this rule.
pub fn step7(rules: Vec<Rule>, registry: &mut ArityRegistry) -> Vec<Rule> {
  let mut result = Vec::with_capacity(rules.len());
  let mut pending = rules;
  while let Some(rule) = pending.pop() {
    if rule.body.len() != 1 {
      result.push(rule);
      continue;
    }
    let args = rule.head.args.clone();
    let k0 = args.len();
    let all: Vec<&Word> = args.iter().collect();
    let Some(i) = find_non_var(&all) else {
      result.push(rule);
      continue;
    };
    if find_non_var(&args_without(&args, i)).is_none() {
      result.push(rule);
      continue;
    }
    let si = args[i].clone();
    let xs: Vec<String> = si.iter().filter(|s| is_var(s)).cloned().collect();
    let el = xs.len();
    let a0 = rule.head.nterm.clone();
    let a1 = registry.mint(&a0, k0 + el - 1);
    debug!("transform step 7: {}->{}", a0, a1);
    let x1 = fresh_vars(k0 + el - 1, &xs);
    let mut head1_args: Vec<Word> = x1[..i].iter().map(|z| single(z)).collect();
    head1_args.push(si);
    head1_args.extend(x1[i + el..].iter().map(|z| single(z)));
    let mut body1_args = x1[..i].to_vec();
    body1_args.extend(xs.iter().cloned());
    body1_args.extend_from_slice(&x1[i + el..]);
    result.push(Rule::new(
      Head::new(a0, head1_args),
      vec![BodyAtom::new(a1.clone(), body1_args)],
    ));
    let mut head2_args = args[..i].to_vec();
    head2_args.extend(xs.iter().map(|x| single(x)));
    head2_args.extend_from_slice(&args[i + 1..]);
    pending.push(Rule::new(Head::new(a1, head2_args), rule.body));
  }
  result
}

/// Run all seven stages in order. The registry picks up every minted
/// nonterminal, so a re-validation of the result sees consistent arities.
pub fn normalize(grammar: Grammar, registry: &mut ArityRegistry) -> Result<Grammar, Err> {
  let rules = step1(grammar.rules, registry);
  let rules = step2(rules, registry);
  let rules = step3(rules, registry)?;
  let rules = step4(rules, registry);
  let rules = step5(rules, registry);
  let rules = step6(rules, registry);
  let rules = step7(rules, registry);
  Ok(Grammar::new(rules))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::validate::validate;

  fn setup(s: &str) -> (Grammar, ArityRegistry) {
    let g: Grammar = s.parse().unwrap();
    let registry = validate(&g).unwrap().registry;
    (g, registry)
  }

  #[test]
  fn step1_splits_wide_terminal_rule() {
    let (g, mut reg) = setup("S(X Y) :- A(X, Y). A(a, b).");
    let rules = step1(g.rules, &mut reg);
    assert_eq!(rules.len(), 3);
    assert_eq!(rules[1].to_string(), "A0(a).");
    assert_eq!(rules[2].to_string(), "A(X, b) :- A0(X).");
    assert_eq!(reg.arity("A0"), Some(1));
  }

  #[test]
  fn step2_peels_first_symbol() {
    // scenario: S(a b). becomes a fresh unary rule for (a) plus S rewritten
    let (g, mut reg) = setup("S(a b).");
    let rules = step2(g.rules, &mut reg);
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0].to_string(), "S0(a).");
    assert_eq!(rules[1].to_string(), "S(X b) :- S0(X).");
  }

  #[test]
  fn step3_strips_terminals_from_multi_body_heads() {
    let (g, mut reg) = setup("S(a X b Y c) :- A(X), B(Y). A(d). B(e).");
    let rules = step3(g.rules, &mut reg).unwrap();
    for rule in rules.iter().filter(|r| r.body.len() >= 2) {
      assert!(
        rule.head.args.iter().flatten().all(|s| is_var(s)),
        "terminal left in multi-body head: {}",
        rule
      );
    }
    let g1 = Grammar::new(rules);
    assert!(validate(&g1).unwrap().is_clean());
  }

  #[test]
  fn normalize_preserves_metrics() {
    let (g, mut reg) = setup(
      "S(X Y) :- D(X, Y).
       D(a X c, b Y d) :- D(X, Y).
       D(a, b).
       S(a X b Y) :- A(X), B(Y).
       A(c).
       B(e).",
    );
    let before = (g.dimension(), g.rank(), g.degree());
    let normal = normalize(g, &mut reg).unwrap();
    let after = (normal.dimension(), normal.rank(), normal.degree());
    assert_eq!(before, after);
    assert!(validate(&normal).unwrap().is_clean());
  }

  #[test]
  fn normalize_output_shape() {
    let (g, mut reg) = setup(
      "S(X Y) :- D(X, Y).
       D(a X c e, b Y d) :- D(X, Y).
       D(a f, b).
       S(a X b Y) :- A(X), B(Y).
       A(c).
       B(e).",
    );
    let normal = normalize(g, &mut reg).unwrap();
    for rule in normal.rules.iter() {
      if rule.is_terminal() {
        assert_eq!(rule.head.arity(), 1, "wide terminal rule: {}", rule);
        assert_eq!(rule.head.args[0].len(), 1, "long terminal rule: {}", rule);
      } else if rule.body.len() >= 2 {
        assert!(
          rule.head.args.iter().flatten().all(|s| is_var(s)),
          "terminal in multi-body head: {}",
          rule
        );
      } else {
        for w in rule.head.args.iter() {
          // arguments are short, or a variable trailed by terminal symbols
          // (the shape stage 6 leaves behind when isolating a variable)
          let var_then_terminals = is_var(&w[0]) && w[1..].iter().all(|s| !is_var(s));
          assert!(
            w.len() <= 2 || var_then_terminals,
            "over-long argument in {}",
            rule
          );
          if w.len() == 2 {
            assert!(
              is_var(&w[0]) || is_var(&w[1]),
              "two-terminal argument in {}",
              rule
            );
          }
        }
        let non_trivial = rule
          .head
          .args
          .iter()
          .filter(|w| !(w.len() == 1 && is_var(&w[0])))
          .count();
        assert!(non_trivial <= 1, "several non-trivial arguments in {}", rule);
      }
    }
  }

  #[test]
  fn fresh_vars_avoid_collisions() {
    let avoid = vec!["Z0".to_string(), "Z2".to_string()];
    assert_eq!(fresh_vars(3, &avoid), vec!["Z1", "Z3", "Z4"]);
  }

  #[test]
  fn find_terminal_segment_cases() {
    let args = vec![
      crate::rules::word(&["X"]),
      crate::rules::word(&["Y", "a", "b", "Z"]),
    ];
    assert_eq!(find_terminal_segment(&args), Some((1, 1, 3)));
    let pure = vec![crate::rules::word(&["X", "Y"])];
    assert_eq!(find_terminal_segment(&pure), None);
  }
}
