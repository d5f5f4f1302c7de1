// Top-level driver: owns the clock, the caches, the bus and the traces,
// and advances them in a fixed per-cycle order so that identical inputs
// always produce identical output.

use log::{debug, info};

use crate::bus::Bus;
use crate::cache::L1Cache;
use crate::commons::{Geometry, MemRef, NUM_CORES};
use crate::stats::{BusStats, CoreStats};

pub struct Simulator {
    geom: Geometry,
    caches: Vec<L1Cache>,
    bus: Bus,
    traces: Vec<Vec<MemRef>>,
    positions: Vec<usize>,
    done: Vec<bool>,
    cycle: u64,
}

impl Simulator {
    /// Builds a simulator over one reference sequence per core.
    ///
    /// # Panics
    ///
    /// Panics when `traces.len() != NUM_CORES`.
    pub fn new(geom: Geometry, traces: Vec<Vec<MemRef>>) -> Self {
        assert_eq!(traces.len(), NUM_CORES, "one trace per core expected");
        Simulator {
            geom,
            caches: (0..NUM_CORES).map(|i| L1Cache::new(i, geom)).collect(),
            bus: Bus::new(geom),
            traces,
            positions: vec![0; NUM_CORES],
            done: vec![false; NUM_CORES],
            cycle: 0,
        }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geom
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn cache(&self, core_id: usize) -> &L1Cache {
        &self.caches[core_id]
    }

    pub fn core_stats(&self, core_id: usize) -> &CoreStats {
        self.caches[core_id].stats()
    }

    pub fn bus_stats(&self) -> &BusStats {
        self.bus.stats()
    }

    /// All traces consumed, no transaction in flight, nothing queued.
    pub fn finished(&self) -> bool {
        self.done.iter().all(|d| *d) && !self.bus.has_work()
    }

    /// Runs to completion.
    pub fn run(&mut self) {
        info!("simulation start: {} cores", NUM_CORES);
        while !self.finished() {
            self.step();
        }
        info!("simulation finished after {} cycles", self.cycle);
    }

    /// Advances one cycle: bus dispatch, bus completion, then the cores in
    /// ascending id order.
    pub fn step(&mut self) {
        let cycle = self.cycle;

        // 1. start the next transaction on an idle bus
        if self.bus.is_idle() {
            self.bus.dispatch(&mut self.caches, cycle);
        }

        // 2. a finishing fill or upgrade retires the originator's pending
        //    reference this cycle
        let retired = self.bus.try_complete(&mut self.caches, cycle);

        // 3. core steps
        for i in 0..NUM_CORES {
            if self.done[i] {
                continue;
            }
            if retired == Some(i) {
                self.retire(i);
                continue;
            }
            if self.caches[i].blocked() {
                self.caches[i].stats_mut().idle_cycles += 1;
                continue;
            }
            if self.positions[i] >= self.traces[i].len() {
                debug!("cycle {cycle}: core {i} done");
                self.done[i] = true;
                continue;
            }

            let mem_ref = self.traces[i][self.positions[i]];
            let (retired_now, requests) = self.caches[i].offer(mem_ref, cycle);
            for req in requests {
                self.bus.enqueue(req);
            }
            if retired_now {
                self.retire(i);
            } else {
                self.caches[i].stats_mut().idle_cycles += 1;
            }
        }

        self.cycle += 1;
    }

    // Charges the execution cycle and advances the trace cursor. Called
    // exactly once per reference, either on an in-cache hit or when the
    // bus completes the transaction the reference was blocked on.
    fn retire(&mut self, core_id: usize) {
        let stats = self.caches[core_id].stats_mut();
        stats.instructions_retired += 1;
        stats.execution_cycles += 1;
        self.positions[core_id] += 1;
    }
}
