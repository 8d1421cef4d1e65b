use std::fmt;

/// The designated start symbol; must be defined with arity 1.
pub const START_SYMBOL: &str = "S";

/// A symbol is a variable iff it starts with an uppercase Latin letter;
/// everything else is a terminal. Purely lexical, checked on demand.
pub fn is_var(s: &str) -> bool {
  s.chars().next().map(|c| c.is_ascii_uppercase()).unwrap_or(false)
}

/// A non-empty sequence of symbols, mixing terminals and variables.
pub type Word = Vec<String>;

pub fn word(symbols: &[&str]) -> Word {
  symbols.iter().map(|s| s.to_string()).collect()
}

fn fmt_word(w: &Word, f: &mut fmt::Formatter<'_>) -> fmt::Result {
  for (idx, sym) in w.iter().enumerate() {
    if idx > 0 {
      write!(f, " ")?;
    }
    write!(f, "{}", sym)?;
  }
  Ok(())
}

/// Left-hand side of a rule: a nonterminal with one word per dimension slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Head {
  pub nterm: String,
  pub args: Vec<Word>,
}

impl Head {
  pub fn new(nterm: impl Into<String>, args: Vec<Word>) -> Self {
    Self {
      nterm: nterm.into(),
      args,
    }
  }

  pub fn arity(&self) -> usize {
    self.args.len()
  }

  /// All variables of the head, in left-to-right order.
  pub fn vars(&self) -> Vec<String> {
    self
      .args
      .iter()
      .flatten()
      .filter(|s| is_var(s))
      .cloned()
      .collect()
  }
}

impl fmt::Display for Head {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}(", self.nterm)?;
    for (idx, arg) in self.args.iter().enumerate() {
      if idx > 0 {
        write!(f, ", ")?;
      }
      fmt_word(arg, f)?;
    }
    write!(f, ")")
  }
}

/// Right-hand side atom: a nonterminal applied to single-symbol variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyAtom {
  pub nterm: String,
  pub args: Vec<String>,
}

impl BodyAtom {
  pub fn new(nterm: impl Into<String>, args: Vec<String>) -> Self {
    Self {
      nterm: nterm.into(),
      args,
    }
  }

  pub fn arity(&self) -> usize {
    self.args.len()
  }
}

impl fmt::Display for BodyAtom {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}(", self.nterm)?;
    for (idx, arg) in self.args.iter().enumerate() {
      if idx > 0 {
        write!(f, ", ")?;
      }
      write!(f, "{}", arg)?;
    }
    write!(f, ")")
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
  pub head: Head,
  pub body: Vec<BodyAtom>,
}

impl Rule {
  pub fn new(head: Head, body: Vec<BodyAtom>) -> Self {
    Self { head, body }
  }

  /// A rule with an empty body produces only literal words.
  pub fn is_terminal(&self) -> bool {
    self.body.is_empty()
  }

  /// Head arity plus the arities of all body atoms.
  pub fn deg(&self) -> usize {
    self.head.arity() + self.body.iter().map(|atom| atom.arity()).sum::<usize>()
  }
}

impl fmt::Display for Rule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.head)?;
    for (idx, atom) in self.body.iter().enumerate() {
      if idx == 0 {
        write!(f, " :- {}", atom)?;
      } else {
        write!(f, ", {}", atom)?;
      }
    }
    write!(f, ".")
  }
}

/// An ordered list of rules. Order is insignificant to the language but is
/// kept for stable output. Transformations build new grammars, they never
/// edit one in place.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Grammar {
  pub rules: Vec<Rule>,
}

impl Grammar {
  pub fn new(rules: Vec<Rule>) -> Self {
    Self { rules }
  }

  pub fn is_empty(&self) -> bool {
    self.rules.is_empty()
  }

  pub fn len(&self) -> usize {
    self.rules.len()
  }

  /// Maximum head arity over all rules.
  pub fn dimension(&self) -> usize {
    self
      .rules
      .iter()
      .map(|rule| rule.head.arity())
      .max()
      .unwrap_or(0)
  }

  /// Maximum body length over all rules.
  pub fn rank(&self) -> usize {
    self
      .rules
      .iter()
      .map(|rule| rule.body.len())
      .max()
      .unwrap_or(0)
  }

  /// Maximum of `Rule::deg` over all rules.
  pub fn degree(&self) -> usize {
    self.rules.iter().map(|rule| rule.deg()).max().unwrap_or(0)
  }

  /// The summary line printed after a grammar, e.g.
  /// `This is a 2-MCFG(2) of degree 5`.
  pub fn signature(&self) -> String {
    format!(
      "This is a {}-MCFG({}) of degree {}",
      self.dimension(),
      self.rank(),
      self.degree()
    )
  }
}

impl fmt::Display for Grammar {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for rule in self.rules.iter() {
      writeln!(f, "{}", rule)?;
    }
    Ok(())
  }
}

#[test]
fn test_is_var() {
  assert!(is_var("X"));
  assert!(is_var("Abc"));
  assert!(!is_var("a"));
  assert!(!is_var("x1"));
  assert!(!is_var("1X"));
  assert!(!is_var(""));
}

#[test]
fn test_display_rule() {
  let rule = Rule::new(
    Head::new("S", vec![word(&["a", "X", "b"])]),
    vec![BodyAtom::new("A", vec!["X".to_string()])],
  );
  assert_eq!(rule.to_string(), "S(a X b) :- A(X).");

  let term = Rule::new(Head::new("A", vec![word(&["a"]), word(&["b"])]), vec![]);
  assert_eq!(term.to_string(), "A(a, b).");
}

#[test]
fn test_metrics() {
  let g = Grammar::new(vec![
    Rule::new(
      Head::new("S", vec![word(&["X", "Y"])]),
      vec![BodyAtom::new("A", vec!["X".to_string(), "Y".to_string()])],
    ),
    Rule::new(Head::new("A", vec![word(&["a"]), word(&["b"])]), vec![]),
  ]);
  assert_eq!(g.dimension(), 2);
  assert_eq!(g.rank(), 1);
  assert_eq!(g.degree(), 3);
  assert_eq!(Grammar::default().dimension(), 0);
}

#[test]
fn test_head_vars() {
  let head = Head::new("S", vec![word(&["a", "X"]), word(&["Y", "b", "X2"])]);
  assert_eq!(head.vars(), vec!["X", "Y", "X2"]);
}
