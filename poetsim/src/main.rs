mod affinity;
mod report;

use std::thread;

use clap::Parser;

use poetdht::bench::{self, ScalabilityRow};
use poetdht::sim::{SimulationParams, Simulator};
use poetdht::{CoarseGrained, Dht, FineGrained, LockFree, NUM_SPECIES};
use rmawin::Peer;

#[derive(Parser, Debug, Clone)]
#[command(name = "poetsim")]
#[command(about = "Reaction-diffusion DHT benchmark over one-sided memory windows")]
struct Cli {
    /// Number of peer ranks (threads)
    #[arg(short = 'r', long, default_value = "4")]
    ranks: usize,

    /// Grid width
    #[arg(long, default_value = "500")]
    grid_x: usize,

    /// Grid height
    #[arg(long, default_value = "1500")]
    grid_y: usize,

    /// Simulation steps per strategy
    #[arg(long, default_value = "200")]
    steps: usize,

    /// Benchmark operations per process
    #[arg(long, default_value_t = bench::BASE_OPERATIONS)]
    operations: usize,

    /// Skip the simulation phase, run only the scalability study
    #[arg(long)]
    skip_simulation: bool,

    /// Output CSV file (written by rank 0)
    #[arg(short = 'o', long, default_value = "scalability_results.csv")]
    output: String,
}

fn main() {
    let cli = Cli::parse();

    let params = SimulationParams {
        grid_x: cli.grid_x,
        grid_y: cli.grid_y,
        num_species: NUM_SPECIES,
        dt: 0.1,
        steps: cli.steps,
    };

    eprintln!(
        "poetsim: {} ranks, {}x{} grid, {} steps, {} ops/process",
        cli.ranks, cli.grid_x, cli.grid_y, cli.steps, cli.operations
    );

    let cores = affinity::CoreMap::detect();
    let handles: Vec<_> = rmawin::create_group(cli.ranks)
        .into_iter()
        .map(|peer| {
            let cli = cli.clone();
            let cores = cores.clone();
            thread::spawn(move || run_rank(peer, &cores, params, &cli))
        })
        .collect();

    for h in handles {
        h.join().expect("rank thread panicked");
    }
}

fn run_rank(peer: Peer, cores: &affinity::CoreMap, params: SimulationParams, cli: &Cli) {
    let rank = peer.rank();
    match cores.pin(rank) {
        Ok(core) => eprintln!("rank {} pinned to core {}", rank, core),
        // An unpinned rank still runs; the measurement is just noisier.
        Err(e) => eprintln!("rank {}: {}", rank, e),
    }
    let total_cells = params.total_cells();

    if !cli.skip_simulation {
        if rank == 0 {
            eprintln!("\ntesting lock-free...");
        }
        simulate(LockFree::create(&peer, total_cells), &peer, params);

        if rank == 0 {
            eprintln!("\ntesting coarse-grained locking...");
        }
        simulate(CoarseGrained::create(&peer, total_cells), &peer, params);

        if rank == 0 {
            eprintln!("\ntesting fine-grained locking...");
        }
        simulate(FineGrained::create(&peer, total_cells), &peer, params);
    }

    let row = bench::run_scalability_study(&peer, total_cells, cli.operations);
    if rank == 0 {
        persist(&cli.output, row);
    }
    peer.barrier();
}

fn simulate<D: Dht>(dht: D, peer: &Peer, params: SimulationParams) {
    let mut sim = Simulator::new(dht, params, peer.rank(), peer.size());
    sim.initialize();
    sim.run();
    drop(sim);
    peer.barrier();
}

fn persist(path: &str, row: ScalabilityRow) {
    bench::print_scalability_table(&[row]);
    match report::write_csv(path, &[row]) {
        Ok(()) => eprintln!("results saved to {}", path),
        Err(e) => eprintln!("error writing {}: {}", path, e),
    }
}
