//! The reaction-diffusion stepper driving the DHT.
//!
//! Each rank advances a contiguous block of cells on a toroidal
//! `grid_x x grid_y` grid. Per cell and step: read the cell and its four
//! neighbors through the DHT, advance every species by the discrete
//! Laplacian, apply the second-order reaction `A + B -> C`, and write the
//! cell back. The block assignment is the driver's own; it is deliberately
//! distinct from the round-robin key partition the DHT uses underneath, so
//! most accesses are remote.

use std::ops::Range;
use std::time::{Duration, Instant};

use crate::cell::{GridCell, NUM_SPECIES};
use crate::dht::Dht;

/// Diffusion coefficient applied to every species.
pub const DIFFUSION_COEFF: f64 = 0.1;

/// Rate constant of the `A + B -> C` reaction.
pub const REACTION_RATE: f64 = 0.01;

#[derive(Debug, Clone, Copy)]
pub struct SimulationParams {
    pub grid_x: usize,
    pub grid_y: usize,
    pub num_species: usize,
    pub dt: f64,
    pub steps: usize,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            grid_x: 500,
            grid_y: 1500,
            num_species: NUM_SPECIES,
            dt: 0.1,
            steps: 200,
        }
    }
}

impl SimulationParams {
    /// Total cell count, which is also the DHT keyspace size.
    pub fn total_cells(&self) -> usize {
        self.grid_x * self.grid_y
    }
}

/// Per-rank simulation driver over any DHT strategy.
pub struct Simulator<D: Dht> {
    dht: D,
    params: SimulationParams,
    rank: usize,
    block: Range<usize>,
}

impl<D: Dht> Simulator<D> {
    pub fn new(dht: D, params: SimulationParams, rank: usize, size: usize) -> Self {
        debug_assert_eq!(params.num_species, NUM_SPECIES);
        let block = block_range(params.total_cells(), rank, size);
        Self {
            dht,
            params,
            rank,
            block,
        }
    }

    /// Seed this rank's block with a deterministic concentration gradient
    /// and synchronize, so every run starts from the same global state.
    pub fn initialize(&mut self) {
        let gx = self.params.grid_x;
        let gy = self.params.grid_y;
        for key in self.block.clone() {
            let x = key % gx;
            let y = key / gx;
            let mut concentrations = [0.0; NUM_SPECIES];
            for (s, c) in concentrations.iter_mut().enumerate() {
                *c = x as f64 / gx as f64 + y as f64 / gy as f64 + 0.1 * s as f64;
            }
            self.dht
                .put(key as i32, &GridCell::with_concentrations(concentrations));
        }
        self.dht.sync();
    }

    /// Run all steps; returns the wall time of the loop.
    pub fn run(&mut self) -> Duration {
        let start = Instant::now();
        for step in 0..self.params.steps {
            if self.rank == 0 && step % 100 == 0 {
                eprintln!("step {}", step);
            }
            self.step();
        }
        let elapsed = start.elapsed();
        if self.rank == 0 {
            eprintln!(
                "{} simulation completed in {} ms",
                self.dht.strategy_name(),
                elapsed.as_millis()
            );
        }
        elapsed
    }

    /// Advance this rank's block by one time step, then synchronize.
    fn step(&mut self) {
        let dt = self.params.dt;
        for key in self.block.clone() {
            let mut center = self.dht.get(key as i32);
            let [left, right, up, down] = self.neighbor_keys(key);
            let left = self.dht.get(left as i32);
            let right = self.dht.get(right as i32);
            let up = self.dht.get(up as i32);
            let down = self.dht.get(down as i32);

            for s in 0..NUM_SPECIES {
                let laplacian = left.concentrations[s]
                    + right.concentrations[s]
                    + up.concentrations[s]
                    + down.concentrations[s]
                    - 4.0 * center.concentrations[s];
                center.concentrations[s] += DIFFUSION_COEFF * laplacian * dt;
            }

            // A + B -> C
            let delta =
                REACTION_RATE * center.concentrations[0] * center.concentrations[1] * dt;
            center.concentrations[0] -= delta;
            center.concentrations[1] -= delta;
            center.concentrations[2] += delta;

            self.dht.put(key as i32, &center);
        }
        self.dht.sync();
    }

    /// The four periodic neighbors of `key` on the torus.
    fn neighbor_keys(&self, key: usize) -> [usize; 4] {
        let gx = self.params.grid_x;
        let gy = self.params.grid_y;
        let x = key % gx;
        let y = key / gx;
        [
            y * gx + (x + gx - 1) % gx,
            y * gx + (x + 1) % gx,
            ((y + gy - 1) % gy) * gx + x,
            ((y + 1) % gy) * gx + x,
        ]
    }

    /// Hand the DHT back, for inspection after a run.
    pub fn into_dht(self) -> D {
        self.dht
    }
}

/// Contiguous block of keys advanced by `rank`; the last rank absorbs the
/// remainder.
fn block_range(total: usize, rank: usize, size: usize) -> Range<usize> {
    let chunk = total / size;
    let start = rank * chunk;
    let end = if rank + 1 == size {
        total
    } else {
        start + chunk
    };
    start..end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_tile_the_keyspace() {
        for (total, size) in [(100, 1), (100, 4), (103, 4), (7, 3)] {
            let mut covered = 0;
            for rank in 0..size {
                let block = block_range(total, rank, size);
                assert_eq!(block.start, covered);
                covered = block.end;
            }
            assert_eq!(covered, total);
        }
    }

    #[test]
    fn neighbors_wrap_toroidally() {
        let params = SimulationParams {
            grid_x: 4,
            grid_y: 3,
            ..Default::default()
        };
        let sim = Simulator::new(NullDht, params, 0, 1);
        // Corner cell 0 = (0, 0).
        assert_eq!(sim.neighbor_keys(0), [3, 1, 8, 4]);
        // Interior-row cell 5 = (1, 1).
        assert_eq!(sim.neighbor_keys(5), [4, 6, 1, 9]);
    }

    /// Inert stand-in so grid arithmetic is testable without a peer group.
    struct NullDht;

    impl Dht for NullDht {
        fn put(&mut self, _key: i32, _cell: &GridCell) {}
        fn get(&self, _key: i32) -> GridCell {
            GridCell::default()
        }
        fn sync(&mut self) {}
        fn strategy_name(&self) -> &'static str {
            "null"
        }
    }
}
