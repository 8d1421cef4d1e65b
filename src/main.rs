use mcfg::Err;
use mcfg::rules::Grammar;

const GRAMMAR: &str = r#"
    % the copy language { w w | w in {a,b}* }, a proper 2-MCFG
    S(X Y) :- A(X, Y).
    A(a X, a Y) :- A(X, Y).
    A(b X, b Y) :- A(X, Y).
    A(a, a).
    A(b, b).
"#;

fn main() -> Result<(), Err> {
  let g: Grammar = GRAMMAR.parse()?;

  let validation = g.validate().map_err(|report| -> Err {
    format!("invalid grammar:\n{}", report).into()
  })?;
  let mut registry = validation.registry;

  eprintln!("input:  {}", g.signature());
  let normal = g.normalize(&mut registry)?;
  eprintln!("output: {}", normal.signature());

  print!("{}", normal);
  Ok(())
}
