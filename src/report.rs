// Results formatting: parameter echo, one block per core, bus summary.
// Field names follow the established report layout so downstream tooling
// keeps parsing.

use std::io::{self, Write};

use crate::commons::NUM_CORES;
use crate::simulator::Simulator;

pub struct Report<'a> {
    sim: &'a Simulator,
    trace_prefix: &'a str,
}

impl<'a> Report<'a> {
    pub fn new(sim: &'a Simulator, trace_prefix: &'a str) -> Self {
        Report { sim, trace_prefix }
    }

    // display name: path components stripped
    fn prefix_base(&self) -> &str {
        match self.trace_prefix.rfind('/') {
            Some(pos) => &self.trace_prefix[pos + 1..],
            None => self.trace_prefix,
        }
    }

    pub fn print(&self) -> io::Result<()> {
        let stdout = io::stdout();
        self.write_text(&mut stdout.lock())
    }

    pub fn write_text(&self, out: &mut impl Write) -> io::Result<()> {
        let geom = self.sim.geometry();
        let block_size = geom.block_bytes();
        let num_sets = geom.num_sets();
        let cache_size_kb = (num_sets as u64 * geom.assoc as u64 * block_size as u64) / 1024;

        writeln!(out, "Simulation Parameters:")?;
        writeln!(out, "Trace Prefix: {}", self.prefix_base())?;
        writeln!(out, "Set Index Bits: {}", geom.set_bits)?;
        writeln!(out, "Associativity: {}", geom.assoc)?;
        writeln!(out, "Block Bits: {}", geom.block_bits)?;
        writeln!(out, "Block Size (Bytes): {block_size}")?;
        writeln!(out, "Number of Sets: {num_sets}")?;
        writeln!(out, "Cache Size (KB per core): {cache_size_kb}")?;
        writeln!(out, "MESI Protocol: Enabled")?;
        writeln!(out, "Write Policy: Write-back, Write-allocate")?;
        writeln!(out, "Replacement Policy: LRU")?;
        writeln!(out, "Bus: Central snooping bus")?;
        writeln!(out)?;

        for i in 0..NUM_CORES {
            let stats = self.sim.core_stats(i);
            writeln!(out, "Core {i} Statistics:")?;
            writeln!(out, "Total Instructions: {}", stats.instructions_retired)?;
            writeln!(out, "Total Reads: {}", stats.reads)?;
            writeln!(out, "Total Writes: {}", stats.writes)?;
            writeln!(out, "Total Execution Cycles: {}", stats.total_cycles())?;
            writeln!(out, "Idle Cycles: {}", stats.idle_cycles)?;
            writeln!(out, "Cache Misses: {}", stats.misses)?;
            writeln!(out, "Cache Miss Rate: {:.2}%", stats.miss_rate())?;
            writeln!(out, "Cache Evictions: {}", stats.evictions)?;
            writeln!(out, "Writebacks: {}", stats.writebacks)?;
            writeln!(out, "Bus Invalidations: {}", stats.invalidations)?;
            writeln!(out, "Data Traffic (Bytes): {}", stats.data_traffic_bytes)?;
            writeln!(out)?;
        }

        let bus = self.sim.bus_stats();
        writeln!(out, "Overall Bus Summary:")?;
        writeln!(out, "Total Bus Transactions: {}", bus.transactions)?;
        writeln!(out, "Total Bus Traffic (Bytes): {}", bus.data_traffic_bytes)?;
        Ok(())
    }

    /// Same fields as the text report, one `name,value` row per line,
    /// blank-line separated core blocks, terminated by the bus summary.
    pub fn write_csv(&self, out: &mut impl Write) -> io::Result<()> {
        for i in 0..NUM_CORES {
            let stats = self.sim.core_stats(i);
            writeln!(out, "Core,{i}")?;
            writeln!(out, "Total Instructions,{}", stats.instructions_retired)?;
            writeln!(out, "Total Reads,{}", stats.reads)?;
            writeln!(out, "Total Writes,{}", stats.writes)?;
            writeln!(out, "Total Execution Cycles,{}", stats.total_cycles())?;
            writeln!(out, "Active Cycles,{}", stats.execution_cycles)?;
            writeln!(out, "Idle Cycles,{}", stats.idle_cycles)?;
            writeln!(out, "Cache Misses,{}", stats.misses)?;
            writeln!(out, "Cache Miss Rate,{:.2}", stats.miss_rate())?;
            writeln!(out, "Cache Evictions,{}", stats.evictions)?;
            writeln!(out, "Writebacks,{}", stats.writebacks)?;
            writeln!(out, "Bus Invalidations,{}", stats.invalidations)?;
            writeln!(out, "Data Traffic (Bytes),{}", stats.data_traffic_bytes)?;
            writeln!(out)?;
        }

        let bus = self.sim.bus_stats();
        writeln!(out, "Bus Summary")?;
        writeln!(out, "Total Bus Transactions,{}", bus.transactions)?;
        writeln!(out, "Total Bus Traffic (Bytes),{}", bus.data_traffic_bytes)?;
        Ok(())
    }
}
