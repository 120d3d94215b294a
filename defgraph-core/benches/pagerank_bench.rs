//! PageRank throughput over synthetic graphs of increasing size.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use defgraph_core::graph::builder::build_graph;
use defgraph_core::graph::pagerank::{PageRankConfig, compute_pagerank};
use defgraph_extract::{EdgeKind, SymbolEdge};

/// Ring plus deterministic chords — connected, a few dangling-free cycles.
fn synthetic_edges(nodes: usize) -> Vec<SymbolEdge> {
    let names: Vec<String> = (0..nodes).map(|i| format!("N{i}")).collect();
    let mut edges = Vec::with_capacity(nodes * 2);
    for i in 0..nodes {
        edges.push(SymbolEdge::new(
            names[i].clone(),
            names[(i + 1) % nodes].clone(),
            EdgeKind::Calls,
        ));
        if i % 3 == 0 {
            edges.push(SymbolEdge::new(
                names[i].clone(),
                names[(i * 7 + 11) % nodes].clone(),
                EdgeKind::References,
            ));
        }
    }
    edges
}

fn bench_pagerank(c: &mut Criterion) {
    let mut group = c.benchmark_group("pagerank");
    for &size in &[1_000usize, 10_000, 100_000] {
        let build = build_graph(&[], &synthetic_edges(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| compute_pagerank(&build.csr, &build.csc, &PageRankConfig::default()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pagerank);
criterion_main!(benches);
