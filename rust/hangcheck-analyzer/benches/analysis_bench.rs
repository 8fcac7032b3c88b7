//! Criterion benchmarks for the analyzer pipeline.
//!
//! Measures parse, bind and full check throughput over generated sources of
//! increasing size.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hangcheck_analyzer::analysis::bindings::BindingTable;
use hangcheck_analyzer::{check_program, check_source, parse, AnalyzerConfig, Rules};

/// `units` functions, each with one executor and one deferred, half of them
/// missing an else arm.
fn generate(units: usize) -> String {
    let mut src = String::new();
    for i in 0..units {
        let arm = if i % 2 == 0 { "else { reject(err); }" } else { "" };
        src.push_str(&format!(
            "function task{i}(input) {{\n\
             \x20 var d = $.Deferred();\n\
             \x20 var p = new Promise(function (resolve, reject) {{\n\
             \x20   if (input > {i}) {{ resolve(input); }} {arm}\n\
             \x20 }});\n\
             \x20 p.then(function (v) {{ d.resolve(v); }});\n\
             \x20 return d.promise();\n\
             }}\n"
        ));
    }
    src
}

fn bench_stages(c: &mut Criterion) {
    let config = AnalyzerConfig::default();
    let mut group = c.benchmark_group("analysis");
    for units in [10usize, 100, 1000] {
        let src = generate(units);
        group.throughput(Throughput::Bytes(src.len() as u64));

        group.bench_with_input(BenchmarkId::new("parse", units), &src, |b, src| {
            b.iter(|| parse(black_box(src)))
        });

        let program = match parse(&src) {
            Ok(program) => program,
            Err(e) => panic!("generated source failed to parse: {}", e),
        };
        group.bench_with_input(BenchmarkId::new("bind", units), &program, |b, program| {
            b.iter(|| BindingTable::build(black_box(program)))
        });

        let rules = match Rules::from_config(&config) {
            Ok(rules) => rules,
            Err(e) => panic!("default config rejected: {}", e),
        };
        group.bench_with_input(BenchmarkId::new("rules", units), &program, |b, program| {
            b.iter(|| check_program(black_box(program), &src, &rules))
        });

        group.bench_with_input(BenchmarkId::new("check_source", units), &src, |b, src| {
            b.iter(|| check_source(black_box(src), &config))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_stages);
criterion_main!(benches);
