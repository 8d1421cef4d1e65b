use criterion::{Criterion, black_box, criterion_group, criterion_main};

use mcfg::rules::Grammar;

const GRAMMAR_SRC: &str = include_str!("./mix.mcfg");

fn full_pipeline(src: &str) -> Grammar {
  let g: Grammar = src.parse().unwrap();
  let mut registry = g.validate().unwrap().registry;
  let g = g.reduce_rank_generic(&mut registry);
  let (g, mut registry) = g.eliminate_permutation();
  g.normalize(&mut registry).unwrap()
}

fn criterion_benchmark(c: &mut Criterion) {
  c.bench_function("validate", |b| {
    let g: Grammar = GRAMMAR_SRC.parse().unwrap();
    b.iter(|| black_box(&g).validate().unwrap())
  });

  c.bench_function("full pipeline", |b| {
    b.iter(|| full_pipeline(black_box(GRAMMAR_SRC)))
  });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
