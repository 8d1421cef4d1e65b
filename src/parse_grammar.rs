use regex::Regex;
/// Simple recursive-descent parsing of `.mcfg` rule files
use std::str::FromStr;

use crate::rules::{BodyAtom, Grammar, Head, Rule, Word};
use crate::utils::Err;

/// Parses a str into a Grammar.
/// Errors if the text doesn't parse; arity and linearity problems are the
/// validator's job, not the reader's.
impl FromStr for Grammar {
  type Err = Err;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (rules, s) = parse_rules(s)?;
    assert!(s.is_empty());
    Ok(Self::new(rules))
  }
}

impl Grammar {
  pub fn read_from_file(path: &str) -> Result<Self, Err> {
    std::fs::read_to_string(path)?.parse()
  }
}

type Infallible<'a, T> = (T, &'a str);
type ParseResult<'a, T> = Result<(T, &'a str), Err>;

/// helper macro for initializing a regex with lazy_static!
macro_rules! regex_static {
  ($name:ident, $pattern:expr) => {
    lazy_static! {
      static ref $name: Regex = Regex::new($pattern).unwrap();
    }
  };
}

/// Try to consume a regex, returning None if it doesn't match
fn optional_re<'a>(re: &'static Regex, s: &'a str) -> Infallible<'a, Option<&'a str>> {
  if let Some(caps) = re.captures(s) {
    let m = caps.get(0).unwrap();
    if m.start() > 0 {
      return (None, s);
    }
    let (_, rest) = s.split_at(m.end());
    (Some(m.as_str()), rest)
  } else {
    (None, s)
  }
}

/// Try to consume a regex, failing if it doesn't match
fn needed_re<'a>(re: &'static Regex, s: &'a str) -> ParseResult<'a, &'a str> {
  if let (Some(c), rest) = optional_re(re, s) {
    Ok((c, rest))
  } else {
    Err(format!("couldn't match {} at {:.40}", re, s).into())
  }
}

/// Try to consume a char, returning None if it doesn't match
fn optional_char(c: char, s: &str) -> Infallible<'_, Option<char>> {
  let mut iter = s.char_indices().peekable();
  if let Some((_, c1)) = iter.next() {
    if c == c1 {
      let rest = if let Some((idx, _)) = iter.peek() {
        s.split_at(*idx).1
      } else {
        ""
      };
      return (Some(c), rest);
    }
  }
  (None, s)
}

/// Try to consume a char, failing if it doesn't match
fn needed_char(c: char, s: &str) -> ParseResult<'_, char> {
  if let (Some(c), rest) = optional_char(c, s) {
    Ok((c, rest))
  } else {
    Err(format!("couldn't match {} at {:.40}", c, s).into())
  }
}

/// Tries to skip 1 or more whitespace characters and % comments
fn skip_whitespace(s: &str) -> &str {
  regex_static!(WHITESPACE_OR_COMMENT, r"(?:\s+|%[^\n]*)+");
  optional_re(&WHITESPACE_OR_COMMENT, s).1
}

/// Tries to parse a symbol name: any run of characters outside the
/// reserved set `% , . ( ) :` and whitespace
fn parse_name(s: &str) -> ParseResult<'_, &str> {
  regex_static!(NAME, r"[^\s%,.():]+");
  needed_re(&NAME, s).map_err(|err| format!("name: {}", err).into())
}

/// A word: one or more whitespace-separated names, up to a `,` or `)`
fn parse_word(s: &str) -> ParseResult<'_, Word> {
  let (first, s) = parse_name(s)?;
  let mut word = vec![first.to_string()];
  let mut rem = skip_whitespace(s);
  while !rem.starts_with([',', ')']) && !rem.is_empty() {
    let (name, s) = parse_name(rem)?;
    word.push(name.to_string());
    rem = skip_whitespace(s);
  }
  Ok((word, rem))
}

/// A parenthesized, comma-separated list of items
fn parse_list<'a, T>(
  item: fn(&'a str) -> ParseResult<'a, T>,
  s: &'a str,
) -> ParseResult<'a, Vec<T>> {
  let (_, s) = needed_char('(', s)?;
  let mut items = Vec::new();
  let mut rem = skip_whitespace(s);
  loop {
    let (next, s) = item(rem)?;
    items.push(next);
    rem = skip_whitespace(s);
    if let (Some(_), s) = optional_char(',', rem) {
      rem = skip_whitespace(s);
    } else {
      let (_, s) = needed_char(')', rem)?;
      return Ok((items, s));
    }
  }
}

/// A head atom `A(word, ..., word)`
fn parse_head(s: &str) -> ParseResult<'_, Head> {
  let (nterm, s) = parse_name(s).map_err(|e| -> Err { format!("head: {}", e).into() })?;
  let s = skip_whitespace(s);
  let (args, s) = parse_list(parse_word, s)?;
  Ok((Head::new(nterm, args), s))
}

fn parse_var(s: &str) -> ParseResult<'_, String> {
  let (name, s) = parse_name(s)?;
  Ok((name.to_string(), s))
}

/// A body atom `A(name, ..., name)`
fn parse_body_atom(s: &str) -> ParseResult<'_, BodyAtom> {
  let (nterm, s) = parse_name(s).map_err(|e| -> Err { format!("body atom: {}", e).into() })?;
  let s = skip_whitespace(s);
  let (args, s) = parse_list(parse_var, s)?;
  Ok((BodyAtom::new(nterm, args), s))
}

/// A rule `Head.` or `Head :- Body, ..., Body.`
fn parse_rule(s: &str) -> ParseResult<'_, Rule> {
  regex_static!(NECK, r":-");

  let (head, s) = parse_head(s)?;
  let s = skip_whitespace(s);
  if let (Some(_), s) = optional_char('.', s) {
    return Ok((Rule::new(head, vec![]), s));
  }
  let (_, s) = needed_re(&NECK, s).map_err(|e| -> Err { format!("rule neck: {}", e).into() })?;

  let mut body = Vec::new();
  let mut rem = skip_whitespace(s);
  loop {
    let (atom, s) = parse_body_atom(rem)?;
    body.push(atom);
    rem = skip_whitespace(s);
    if let (Some(_), s) = optional_char(',', rem) {
      rem = skip_whitespace(s);
    } else {
      let (_, s) = needed_char('.', rem)?;
      return Ok((Rule::new(head, body), s));
    }
  }
}

fn parse_rules(s: &str) -> ParseResult<'_, Vec<Rule>> {
  let mut rules = Vec::new();
  let mut rem = skip_whitespace(s);
  loop {
    if rem.is_empty() {
      return Ok((rules, rem));
    }
    let (rule, s) = parse_rule(rem)?;
    rules.push(rule);
    rem = skip_whitespace(s);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::rules::word;

  #[test]
  fn parses_terminal_rule() {
    let g: Grammar = "S(a b).".parse().unwrap();
    assert_eq!(g.len(), 1);
    assert_eq!(g.rules[0], Rule::new(Head::new("S", vec![word(&["a", "b"])]), vec![]));
  }

  #[test]
  fn parses_rule_with_body() {
    let g: Grammar = "S(a X, Y) :- A(X), B(Y).".parse().unwrap();
    let rule = &g.rules[0];
    assert_eq!(rule.head, Head::new("S", vec![word(&["a", "X"]), word(&["Y"])]));
    assert_eq!(
      rule.body,
      vec![
        BodyAtom::new("A", vec!["X".to_string()]),
        BodyAtom::new("B", vec!["Y".to_string()]),
      ]
    );
  }

  #[test]
  fn skips_comments_and_whitespace() {
    let g: Grammar = "
      % the copy language
      S(X Y) :- A(X, Y). % both halves
      A(a, a).
    "
    .parse()
    .unwrap();
    assert_eq!(g.len(), 2);
  }

  #[test]
  fn empty_input_is_empty_grammar() {
    let g: Grammar = "  % nothing here\n".parse().unwrap();
    assert!(g.is_empty());
  }

  #[test]
  fn rejects_malformed_rules() {
    assert!("S(a".parse::<Grammar>().is_err());
    assert!("S a b.".parse::<Grammar>().is_err());
    assert!("S(X) : A(X).".parse::<Grammar>().is_err());
    assert!("S().".parse::<Grammar>().is_err());
  }

  #[test]
  fn display_round_trips() {
    let text = "S(a X b, Y) :- A(X), B(Y).\nA(q).\nB(r s).\n";
    let g: Grammar = text.parse().unwrap();
    assert_eq!(g.to_string(), text);
    let again: Grammar = g.to_string().parse().unwrap();
    assert_eq!(again, g);
  }
}
