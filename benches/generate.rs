use fodge::{
    diagram::Diagram,
    polygon::{DiagramTable, Fill},
};
use iai_callgrind::{black_box, library_benchmark, library_benchmark_group, main};

#[library_benchmark]
#[bench::leading_eight(2, 8)]
#[bench::nlo_six(4, 6)]
#[bench::nnlo_four(6, 4)]
fn bench_generate(order: usize, n_legs: usize) -> usize {
    let diagrams = Diagram::generate(black_box(order), black_box(n_legs), true, true)
        .map(|d| d.len())
        .unwrap_or_default();
    black_box(diagrams)
}

#[library_benchmark]
#[bench::leading_eight(8, 0)]
#[bench::nlo_six(6, 1)]
#[bench::nnlo_six(6, 2)]
fn bench_table(max_ngons: usize, max_order: usize) -> usize {
    let table = DiagramTable::new(black_box(max_ngons), max_order, true, true, Fill::None);
    let count = table
        .and_then(|mut t| t.count(max_ngons, max_order))
        .map(|c| c.total())
        .unwrap_or_default();
    black_box(count)
}

library_benchmark_group!(
    name = generate_group;
    benchmarks = bench_generate, bench_table
);

main!(library_benchmark_groups = generate_group);
