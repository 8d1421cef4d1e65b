use std::collections::HashSet;
use std::fmt;

use tracing::warn;

use crate::registry::ArityRegistry;
use crate::rules::{Grammar, Head, Rule, START_SYMBOL, is_var};

/// One way a rule (or the whole grammar) can violate the static semantics.
/// `Deleting` and `Permuting` are soft findings; everything else is fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
  HeadArityClash {
    nterm: String,
    old: usize,
    new: usize,
  },
  UndefinedBodyNonterminal {
    nterm: String,
  },
  BodyArityMismatch {
    nterm: String,
    used: usize,
    declared: usize,
  },
  NonVariableInBody {
    symbol: String,
  },
  NonLinearBody,
  FreeHeadVariable {
    var: String,
  },
  NonLinearHead,
  Deleting,
  Permuting,
  MissingStartSymbol,
  StartSymbolArity {
    arity: usize,
  },
}

impl Fault {
  pub fn is_warning(&self) -> bool {
    matches!(self, Self::Deleting | Self::Permuting)
  }
}

impl fmt::Display for Fault {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::HeadArityClash { nterm, old, new } => {
        write!(f, "head {} cannot have dimension {} and {}", nterm, old, new)
      }
      Self::UndefinedBodyNonterminal { nterm } => {
        write!(f, "{} in body has no defining head", nterm)
      }
      Self::BodyArityMismatch {
        nterm,
        used,
        declared,
      } => write!(
        f,
        "{} in body has dimension {}, but the head used {}",
        nterm, used, declared
      ),
      Self::NonVariableInBody { symbol } => write!(
        f,
        "body contains non-variable {} (all variables must be capitalized)",
        symbol
      ),
      Self::NonLinearBody => write!(f, "body is non-linear"),
      Self::FreeHeadVariable { var } => write!(f, "head contains free variable {}", var),
      Self::NonLinearHead => write!(f, "head is non-linear"),
      Self::Deleting => write!(f, "rule is deleting"),
      Self::Permuting => write!(f, "rule is permuting"),
      Self::MissingStartSymbol => {
        write!(f, "There should be a start symbol '{}'", START_SYMBOL)
      }
      Self::StartSymbolArity { arity } => write!(
        f,
        "Start symbol \"{}\" has arity {}, not 1",
        START_SYMBOL, arity
      ),
    }
  }
}

/// A fault attached to the rule it was found in (grammar-level faults such
/// as a missing start symbol carry no rule).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
  pub rule: Option<String>,
  pub fault: Fault,
}

impl fmt::Display for Finding {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.rule {
      Some(rule) => write!(f, "{} <-- {}", rule, self.fault),
      None => write!(f, "{}", self.fault),
    }
  }
}

/// Every finding across the whole grammar; validation is not fail-fast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
  pub findings: Vec<Finding>,
}

impl Report {
  pub fn errors(&self) -> usize {
    self
      .findings
      .iter()
      .filter(|finding| !finding.fault.is_warning())
      .count()
  }

  pub fn warnings(&self) -> usize {
    self
      .findings
      .iter()
      .filter(|finding| finding.fault.is_warning())
      .count()
  }

  fn add(&mut self, rule: Option<&Rule>, fault: Fault) {
    self.findings.push(Finding {
      rule: rule.map(|r| r.to_string()),
      fault,
    });
  }
}

impl fmt::Display for Report {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for finding in self.findings.iter() {
      writeln!(f, "{}", finding)?;
    }
    if self.errors() > 0 {
      write!(f, "Detected {} semantic errors", self.errors())
    } else {
      write!(f, "Detected {} warnings", self.warnings())
    }
  }
}

/// Successful validation: the arity registry built from the rule heads,
/// plus any soft findings.
#[derive(Debug, Clone)]
pub struct Validation {
  pub registry: ArityRegistry,
  pub report: Report,
}

impl Validation {
  pub fn is_clean(&self) -> bool {
    self.report.findings.is_empty()
  }
}

/// Register the head's arity, or fault if the nonterminal was already
/// registered at a different one.
fn check_head(head: &Head, registry: &mut ArityRegistry) -> Result<(), Fault> {
  let arity = head.arity();
  match registry.arity(&head.nterm) {
    Some(old) if old != arity => Err(Fault::HeadArityClash {
      nterm: head.nterm.clone(),
      old,
      new: arity,
    }),
    _ => {
      registry.register(head.nterm.clone(), arity);
      Ok(())
    }
  }
}

/// Every body nonterminal must be defined by some head, at the right arity.
fn check_body(rule: &Rule, registry: &ArityRegistry) -> Result<(), Fault> {
  for atom in rule.body.iter() {
    match registry.arity(&atom.nterm) {
      None => {
        return Err(Fault::UndefinedBodyNonterminal {
          nterm: atom.nterm.clone(),
        });
      }
      Some(declared) if declared != atom.arity() => {
        return Err(Fault::BodyArityMismatch {
          nterm: atom.nterm.clone(),
          used: atom.arity(),
          declared,
        });
      }
      Some(_) => {}
    }
  }
  Ok(())
}

/// Walk the head left-to-right against each atom's declared argument order;
/// the rule is order-preserving iff every atom's variables are consumed as
/// an order-preserving subsequence.
pub fn is_permuting(rule: &Rule) -> bool {
  for atom in rule.body.iter() {
    let mut pending: Vec<&String> = atom.args.iter().collect();
    for w in rule.head.args.iter() {
      for x in w.iter() {
        if pending.first().map(|v| *v == x).unwrap_or(false) {
          pending.remove(0);
        }
      }
    }
    if !pending.is_empty() {
      return true;
    }
  }
  false
}

/// Linearity and closure of the rule's variables. Returns the first fault
/// found: body faults, then head faults, then the soft deleting/permuting
/// findings (deleting pre-empts the order check).
fn check_vars(rule: &Rule) -> Result<(), Fault> {
  let mut body_vars = HashSet::new();
  for atom in rule.body.iter() {
    for arg in atom.args.iter() {
      if !is_var(arg) {
        return Err(Fault::NonVariableInBody {
          symbol: arg.clone(),
        });
      }
      if !body_vars.insert(arg) {
        return Err(Fault::NonLinearBody);
      }
    }
  }

  let mut seen = HashSet::new();
  for w in rule.head.args.iter() {
    for x in w.iter() {
      if is_var(x) {
        if !body_vars.contains(x) {
          return Err(Fault::FreeHeadVariable { var: x.clone() });
        }
        if !seen.insert(x) {
          return Err(Fault::NonLinearHead);
        }
      }
    }
  }

  if body_vars.len() != seen.len() {
    return Err(Fault::Deleting);
  }
  if is_permuting(rule) {
    return Err(Fault::Permuting);
  }
  Ok(())
}

fn check_start(registry: &ArityRegistry) -> Result<(), Fault> {
  match registry.arity(START_SYMBOL) {
    None => Err(Fault::MissingStartSymbol),
    Some(1) => Ok(()),
    Some(arity) => Err(Fault::StartSymbolArity { arity }),
  }
}

/// Check the static semantics of a grammar. On success the registry of all
/// head arities is returned together with any soft findings; on failure the
/// report lists every error found across the whole grammar.
pub fn validate(grammar: &Grammar) -> Result<Validation, Report> {
  let mut registry = ArityRegistry::new();
  let mut report = Report::default();

  // all heads are registered before any body is checked
  for rule in grammar.rules.iter() {
    if let Err(fault) = check_head(&rule.head, &mut registry) {
      report.add(Some(rule), fault);
    }
  }
  for rule in grammar.rules.iter() {
    if let Err(fault) = check_body(rule, &registry) {
      report.add(Some(rule), fault);
    }
    if let Err(fault) = check_vars(rule) {
      if fault.is_warning() {
        warn!("{} <-- {}", rule, fault);
      }
      report.add(Some(rule), fault);
    }
  }
  if let Err(fault) = check_start(&registry) {
    report.add(None, fault);
  }

  if report.errors() > 0 {
    Err(report)
  } else {
    Ok(Validation { registry, report })
  }
}

/// Like `validate`, but soft findings are fatal too. Stages that assume a
/// non-deleting, non-permuting input go through this.
pub fn validate_strict(grammar: &Grammar) -> Result<ArityRegistry, Report> {
  match validate(grammar) {
    Ok(validation) if validation.is_clean() => Ok(validation.registry),
    Ok(validation) => Err(validation.report),
    Err(report) => Err(report),
  }
}

#[cfg(test)]
fn parse(s: &str) -> Grammar {
  s.parse().unwrap()
}

#[test]
fn test_clean_grammar() {
  // scenario A
  let g = parse("S(X) :- S(X). S(a).");
  let validation = validate(&g).unwrap();
  assert!(validation.is_clean());
  assert_eq!(validation.registry.arity("S"), Some(1));
}

#[test]
fn test_undefined_body_nonterminal() {
  // scenario B
  let g = parse("S(X) :- A(X).");
  let report = validate(&g).unwrap_err();
  assert_eq!(report.errors(), 1);
  assert_eq!(
    report.findings[0].fault,
    Fault::UndefinedBodyNonterminal {
      nterm: "A".to_string()
    }
  );
}

#[test]
fn test_non_linear_head() {
  // scenario C
  let g = parse("S(X) :- A(X). A(X, X) :- A(X, Y). A(a, b).");
  let report = validate(&g).unwrap_err();
  assert!(
    report
      .findings
      .iter()
      .any(|finding| finding.fault == Fault::NonLinearHead)
  );
}

#[test]
fn test_head_arity_clash() {
  let g = parse("S(a). S(a, b).");
  let report = validate(&g).unwrap_err();
  assert_eq!(report.errors(), 1);
  assert!(matches!(
    report.findings[0].fault,
    Fault::HeadArityClash { old: 1, new: 2, .. }
  ));
}

#[test]
fn test_body_arity_mismatch() {
  let g = parse("S(X) :- A(X). A(a, b).");
  let report = validate(&g).unwrap_err();
  assert_eq!(
    report.findings[0].fault,
    Fault::BodyArityMismatch {
      nterm: "A".to_string(),
      used: 1,
      declared: 2
    }
  );
}

#[test]
fn test_free_variable_and_start() {
  let g = parse("A(X, Y) :- A(X, Z).");
  let report = validate(&g).unwrap_err();
  // free head variable, deleting would be masked, plus missing start symbol
  assert!(
    report
      .findings
      .iter()
      .any(|finding| finding.fault == Fault::FreeHeadVariable {
        var: "Y".to_string()
      })
  );
  assert!(
    report
      .findings
      .iter()
      .any(|finding| finding.fault == Fault::MissingStartSymbol)
  );
}

#[test]
fn test_start_symbol_arity() {
  let g = parse("S(a, b).");
  let report = validate(&g).unwrap_err();
  assert_eq!(
    report.findings[0].fault,
    Fault::StartSymbolArity { arity: 2 }
  );
}

#[test]
fn test_deleting_warning() {
  let g = parse("S(X) :- A(X, Y). A(a, b).");
  let validation = validate(&g).unwrap();
  assert_eq!(validation.report.errors(), 0);
  assert_eq!(validation.report.warnings(), 1);
  assert_eq!(validation.report.findings[0].fault, Fault::Deleting);
  assert!(validate_strict(&g).is_err());
}

#[test]
fn test_permuting_warning() {
  let g = parse("S(Y X) :- A(X, Y). A(a, b).");
  let validation = validate(&g).unwrap();
  assert_eq!(validation.report.warnings(), 1);
  assert_eq!(validation.report.findings[0].fault, Fault::Permuting);
}

#[test]
fn test_errors_aggregate() {
  let g = parse("S(X) :- A(X). S(X, X) :- B(X).");
  let report = validate(&g).unwrap_err();
  // arity clash, two undefined body nonterminals, non-linear head
  assert!(report.errors() >= 3);
}
