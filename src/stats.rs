// Counters reported at end of run. All monotonically non-decreasing.

/// Per-core counters, owned by the core's cache.
///
/// `hits`/`misses` and `reads`/`writes` are bumped once per reference when
/// it is classified; `instructions_retired` and `execution_cycles` once
/// when it retires. The bus-attributable tail (`transactions`,
/// `invalidations`, `data_traffic_bytes`) is bumped at dispatch.
#[derive(Clone, Copy, Default, Debug)]
pub struct CoreStats {
    pub reads: u64,
    pub writes: u64,
    pub instructions_retired: u64,
    pub execution_cycles: u64,
    pub idle_cycles: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub writebacks: u64,
    pub transactions: u64,
    pub invalidations: u64,
    pub data_traffic_bytes: u64,
}

impl CoreStats {
    /// Miss rate as a percentage of retired instructions.
    pub fn miss_rate(&self) -> f64 {
        if self.instructions_retired == 0 {
            0.0
        } else {
            100.0 * self.misses as f64 / self.instructions_retired as f64
        }
    }

    /// Wall-clock cycles this core was live: execution plus stall time.
    pub fn total_cycles(&self) -> u64 {
        self.execution_cycles + self.idle_cycles
    }
}

/// Bus-wide aggregates; always the sum of the per-core bus counters.
#[derive(Clone, Copy, Default, Debug)]
pub struct BusStats {
    pub transactions: u64,
    pub invalidations: u64,
    pub data_traffic_bytes: u64,
}
