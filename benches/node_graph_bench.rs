//! Per-frame cost of the node-graph background and typewriter markup.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use folio::animation::node_graph::NodeGraph;
use folio::animation::typewriter::Typewriter;
use folio::options::{NodeGraphOptions, TypewriterOptions};
use glam::Vec2;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn node_graph_frame_benchmark(c: &mut Criterion) {
    let options = NodeGraphOptions::default();
    let mut group = c.benchmark_group("node_graph_frame");

    for count in [20, 50, 100, 200] {
        let mut rng = StdRng::seed_from_u64(7);
        let mut graph =
            NodeGraph::new(count, Vec2::new(1280.0, 720.0), &options, &mut rng);
        group.bench_function(format!("{count}_particles"), |b| {
            b.iter(|| black_box(graph.frame()));
        });
    }
    group.finish();
}

fn typewriter_benchmark(c: &mut Criterion) {
    let typewriter = Typewriter::new(&TypewriterOptions::default());
    c.bench_function("typewriter_all_frames", |b| {
        b.iter(|| black_box(typewriter.frames().count()));
    });
}

criterion_group!(benches, node_graph_frame_benchmark, typewriter_benchmark);
criterion_main!(benches);
