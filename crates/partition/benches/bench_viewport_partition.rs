use std::hint::black_box;
use std::time::Instant;

use cluster_common::{DVec2, Rect};
use cluster_kernel::{GeneratorConfig, generate_system};
use cluster_partition::{PartitionConfig, Site, ViewportPartitioner, compute_cells};
use cluster_persist::{EntityStore, MemoryBackend};

fn make_sites(systems: usize) -> Vec<Site> {
    let config = GeneratorConfig::default();
    let side = (systems as f64).sqrt().ceil() as usize;
    let mut sites = Vec::new();
    for i in 0..systems {
        let sun = DVec2::new((i % side) as f64 * 20_000.0, (i / side) as f64 * 20_000.0);
        let Ok(system) = generate_system(&format!("player{i}"), sun, &config, 0) else {
            continue;
        };
        sites.extend(system.planets.iter().map(|p| Site {
            key: p.key(),
            owner: None,
            position: p.world_position(),
        }));
    }
    sites
}

fn bench_cells(systems: usize, iterations: usize) {
    let sites = make_sites(systems);
    let positions: Vec<DVec2> = sites.iter().map(|s| s.position).collect();
    let Some(bounds) = Rect::bounding(positions.iter().copied()) else {
        return;
    };

    let start = Instant::now();
    for _ in 0..iterations {
        let _ = black_box(compute_cells(black_box(&positions), bounds.expand(9_000.0)));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  cells ({} sites, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}",
        sites.len()
    );
}

fn bench_partition(systems: usize, iterations: usize) {
    let store = EntityStore::open(MemoryBackend::new());
    let config = GeneratorConfig::default();
    let side = (systems as f64).sqrt().ceil() as usize;
    for i in 0..systems {
        let sun = DVec2::new((i % side) as f64 * 20_000.0, (i / side) as f64 * 20_000.0);
        if let Ok(system) = generate_system(&format!("player{i}"), sun, &config, 0) {
            for planet in system.planets {
                let _ = store.save(&planet.into());
            }
        }
    }
    let partitioner = ViewportPartitioner::new(PartitionConfig::default());
    let size = DVec2::new(16_000.0, 9_000.0);

    let start = Instant::now();
    for i in 0..iterations {
        // viewer pans across the map
        let center = DVec2::new((i % 10) as f64 * 2_000.0, 0.0);
        let _ = black_box(partitioner.partition(&store, black_box(center), size));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  partition ({systems} systems, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}"
    );
}

fn main() {
    println!("=== Viewport Partition Benchmarks ===\n");

    println!("Voronoi cells:");
    bench_cells(1, 1000);
    bench_cells(4, 100);
    bench_cells(16, 10);

    println!("\nStore-backed partition:");
    bench_partition(16, 100);
    bench_partition(100, 20);

    println!("\n=== Done ===");
}
