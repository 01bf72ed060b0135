use kurafield::ensemble::{EnsembleConfig, KuramotoEnsemble};
use kurafield::field::{AttentionField, FieldConfig, StimulusSpec};
use kurafield::metrics::RunSummary;
use kurafield::prng::Prng;
use kurafield::topology::{Topology, TopologyKind};

use serde::Serialize;
use tracing::info;

/// What the persistence layer of a frontend would store for one run.
#[derive(Debug, Serialize)]
struct RunRecord {
    config: EnsembleConfig,
    topology: Option<TopologyKind>,
    summary: RunSummary,
}

fn main() {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() >= 2 && (args[1] == "--help" || args[1] == "-h" || args[1] == "help") {
        print_help();
        return;
    }
    if args.len() >= 2 && args[1] == "attention" {
        run_attention_demo();
        return;
    }
    if args.len() >= 2 && args[1] == "small-world" {
        run_small_world_demo();
        return;
    }
    if args.len() >= 2 {
        eprintln!("Unknown command: {}", args[1]);
        print_help();
        std::process::exit(2);
    }

    run_sync_demo();
}

fn print_help() {
    println!("kurafield - coupled phase-oscillator simulation demos");
    println!();
    println!("USAGE:");
    println!("  kurafield              all-to-all synchronization demo");
    println!("  kurafield small-world  synchronization on a rewired ring lattice");
    println!("  kurafield attention    spatial attention field tracking a moving object");
}

/// Supercritical all-to-all ensemble: watch r climb toward 1.
fn run_sync_demo() {
    let cfg = EnsembleConfig {
        n: 50,
        coupling: 3.0,
        seed: Some(7),
        ..EnsembleConfig::default()
    };
    let mut ens = match KuramotoEnsemble::new(cfg) {
        Ok(e) => e,
        Err(err) => {
            eprintln!("config rejected: {err}");
            std::process::exit(1);
        }
    };

    info!("Sync demo: N={}, K={}", cfg.n, cfg.coupling);
    for step in 1..=1500usize {
        ens.step();
        if step % 300 == 0 {
            info!("step {}: r = {:.4}", step, ens.order_parameter());
        }
    }

    let record = RunRecord {
        config: cfg,
        topology: None,
        summary: ens.run_summary(),
    };
    match serde_json::to_string_pretty(&record) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("serialization failed: {err}"),
    }
}

/// Same ensemble on a Watts-Strogatz graph.
fn run_small_world_demo() {
    let cfg = EnsembleConfig {
        n: 60,
        coupling: 4.0,
        seed: Some(11),
        ..EnsembleConfig::default()
    };
    let mut ens = match KuramotoEnsemble::new(cfg) {
        Ok(e) => e,
        Err(err) => {
            eprintln!("config rejected: {err}");
            std::process::exit(1);
        }
    };

    let mut rng = Prng::new(11);
    let graph = Topology::small_world(cfg.n, 6, 0.2, &mut rng);
    let stats = graph.degree_stats();
    info!(
        "Small-world graph: {} edges, avg degree {:.2}",
        graph.edge_count(),
        stats.avg
    );
    let kind = graph.kind();
    if let Err(err) = ens.set_network(graph) {
        eprintln!("{err}");
        std::process::exit(1);
    }

    for step in 1..=2000usize {
        ens.step();
        if step % 400 == 0 {
            info!("step {}: r = {:.4}", step, ens.order_parameter());
        }
    }

    let record = RunRecord {
        config: cfg,
        topology: Some(kind),
        summary: ens.run_summary(),
    };
    match serde_json::to_string_pretty(&record) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("serialization failed: {err}"),
    }
}

/// A moving stimulus crossing the field; reports when it becomes tracked.
fn run_attention_demo() {
    let cfg = FieldConfig {
        grid_size: 24,
        seed: Some(3),
        ..FieldConfig::default()
    };
    let mut field = match AttentionField::new(cfg) {
        Ok(f) => f,
        Err(err) => {
            eprintln!("config rejected: {err}");
            std::process::exit(1);
        }
    };

    field.add_stimulus_object(StimulusSpec {
        x: Some(6.0),
        y: Some(12.0),
        vx: Some(0.2),
        features: Some(vec![1.0, 0.1, 0.1]),
        ..StimulusSpec::default()
    });

    info!("Attention demo: grid {}x{}", cfg.grid_size, cfg.grid_size);
    for step in 1..=400usize {
        field.step();
        if step % 100 == 0 {
            for t in field.tracked_objects() {
                info!(
                    "step {}: object {} at ({:.1}, {:.1}) attention {:.3} tracked={}",
                    step, t.id, t.x, t.y, t.attention, t.tracked
                );
            }
        }
    }

    match serde_json::to_string_pretty(field.tracked_objects()) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("serialization failed: {err}"),
    }
}
