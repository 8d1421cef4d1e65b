use std::env;
use std::fs;
use std::io;
use std::io::{Read, Write};
use std::process;

use tracing_subscriber::EnvFilter;

use mcfg::Err;
use mcfg::registry::ArityRegistry;
use mcfg::rules::Grammar;

fn usage(prog_name: &str) -> String {
  format!(
    r"Transform Multiple Context-Free Grammars

Usage: {} [options] [- | INPUT[.mcfg]] [OUTPUT[.mcfg]]

Options:
  -h, --help     Print this message
  -c, --chomsky  Binarize dimension-1 rules, keeping dimension 1
  -r, --rank     Reduce the grammar to rank at most 2
  -p, --perm     Make the grammar non-deleting and non-permuting
  -n, --norm     Transform the grammar to normal form

Reads from stdin when INPUT is missing or '-'; writes to stdout when
OUTPUT is missing. Transformations run in the order listed above.",
    prog_name
  )
}

struct Args {
  chomsky: bool,
  rank: bool,
  perm: bool,
  norm: bool,
  input: Option<String>,
  output: Option<String>,
}

impl Args {
  fn make_error_message(msg: &str, prog_name: impl AsRef<str>) -> String {
    format!("argument error: {}.\n\n{}", msg, usage(prog_name.as_ref()))
  }

  fn parse(v: Vec<String>) -> Result<Self, String> {
    if v.is_empty() {
      return Err(Self::make_error_message("bad argument vector", "mcfg"));
    }

    let mut iter = v.into_iter();
    let prog_name = iter.next().unwrap();

    let mut args = Self {
      chomsky: false,
      rank: false,
      perm: false,
      norm: false,
      input: None,
      output: None,
    };

    for o in iter {
      if o == "-h" || o == "--help" {
        println!("{}", usage(&prog_name));
        process::exit(0);
      } else if o == "-c" || o == "--chomsky" {
        args.chomsky = true;
      } else if o == "-r" || o == "--rank" {
        args.rank = true;
      } else if o == "-p" || o == "--perm" {
        args.perm = true;
      } else if o == "-n" || o == "--norm" {
        args.norm = true;
      } else if args.input.is_none() {
        args.input = Some(o);
      } else if args.output.is_none() {
        args.output = Some(o);
      } else {
        return Err(Self::make_error_message("too many arguments", prog_name));
      }
    }

    Ok(args)
  }
}

/// Append the conventional extension unless it is already there.
fn mcfg_file_name(name: &str) -> String {
  if name.ends_with(".mcfg") {
    name.to_string()
  } else {
    format!("{}.mcfg", name)
  }
}

fn read_input(input: &Option<String>) -> Result<(String, String), Err> {
  match input.as_deref() {
    None | Some("-") => {
      let mut text = String::new();
      io::stdin().read_to_string(&mut text)?;
      Ok(("stdin".to_string(), text))
    }
    Some(name) => {
      let name = mcfg_file_name(name);
      let text = fs::read_to_string(&name).map_err(|e| -> Err {
        format!("file {}: {}", name, e).into()
      })?;
      Ok((name, text))
    }
  }
}

/// Validate, exiting on errors and warning on soft findings.
fn check_or_exit(grammar: &Grammar) -> ArityRegistry {
  match grammar.validate() {
    Err(report) => {
      eprintln!("{}", report);
      eprintln!("ERROR: MCFG is semantically not valid");
      process::exit(2);
    }
    Ok(validation) => {
      if !validation.is_clean() {
        eprintln!("WARNING: MCFG is deleting or permuting");
      }
      validation.registry
    }
  }
}

fn run(args: &Args) -> Result<(), Err> {
  let (inname, text) = read_input(&args.input)?;
  eprintln!("Reading from {}", inname);

  let mut grammar: Grammar = text
    .parse()
    .map_err(|e| -> Err { format!("{}: {}", inname, e).into() })?;
  let mut registry = check_or_exit(&grammar);

  if args.chomsky {
    eprintln!("=== Binarizing dimension-1 rules ===");
    grammar = grammar.reduce_rank_dim1(&mut registry)?;
    check_or_exit(&grammar);
  }
  if args.rank {
    eprintln!("=== Reducing to rank 2 ===");
    grammar = grammar.reduce_rank_generic(&mut registry);
    check_or_exit(&grammar);
  }
  if args.perm {
    eprintln!("=== Making non-deleting, non-permuting ===");
    let (permuted, specialized) = grammar.eliminate_permutation();
    grammar = permuted;
    registry = specialized;
    check_or_exit(&grammar);
  }
  if args.norm {
    eprintln!("=== Normalizing ===");
    grammar = grammar.normalize(&mut registry)?;
    check_or_exit(&grammar);
  }

  match args.output.as_deref() {
    None => print!("{}", grammar),
    Some(name) => {
      let name = mcfg_file_name(name);
      eprintln!("Writing into {}", name);
      let mut file = fs::File::create(&name)
        .map_err(|e| -> Err { format!("file {}: {}", name, e).into() })?;
      write!(file, "{}", grammar)?;
    }
  }
  eprintln!("{}", grammar.signature());
  Ok(())
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(io::stderr)
    .init();

  let args = match Args::parse(env::args().collect()) {
    Ok(args) => args,
    Err(msg) => {
      eprintln!("{}", msg);
      process::exit(255);
    }
  };

  if let Err(e) = run(&args) {
    eprintln!("{}", e);
    process::exit(2);
  }
}
