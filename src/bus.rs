// Central snooping bus: fixed-priority arbitration, snoop fan-out,
// transaction timing and completion delivery.
//
// The bus holds at most one transaction at a time. Requests transfer by
// value into the queue; the originator is identified by core id only, so
// no reference into a cache outlives its enqueue.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use log::debug;

use crate::cache::L1Cache;
use crate::commons::{BusOp, BusRequest, Geometry, MesiState};
use crate::stats::BusStats;

// Min-heap entry keyed on (core_id, seq): core 0 has highest priority, and
// a core's Flush dispatches before the fill it enqueued in the same cycle.
struct QueuedRequest {
    seq: u64,
    req: BusRequest,
}

impl QueuedRequest {
    fn key(&self) -> (usize, u64) {
        (self.req.core_id, self.seq)
    }
}

impl PartialEq for QueuedRequest {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for QueuedRequest {}

impl Ord for QueuedRequest {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed for min-heap behaviour on BinaryHeap
        other.key().cmp(&self.key())
    }
}

impl PartialOrd for QueuedRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct InFlight {
    req: BusRequest,
    data_from_cache: bool,
}

pub struct Bus {
    geom: Geometry,
    queue: BinaryHeap<QueuedRequest>,
    next_seq: u64,
    current: Option<InFlight>,
    busy_until: u64,
    stats: BusStats,
}

impl Bus {
    pub fn new(geom: Geometry) -> Self {
        Bus {
            geom,
            queue: BinaryHeap::new(),
            next_seq: 0,
            current: None,
            busy_until: 0,
            stats: BusStats::default(),
        }
    }

    pub fn stats(&self) -> &BusStats {
        &self.stats
    }

    pub fn is_idle(&self) -> bool {
        self.current.is_none()
    }

    /// True while a transaction is in flight or queued.
    pub fn has_work(&self) -> bool {
        self.current.is_some() || !self.queue.is_empty()
    }

    pub fn enqueue(&mut self, req: BusRequest) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(QueuedRequest { seq, req });
    }

    /// Starts the highest-priority queued transaction, if any.
    ///
    /// Snoops every other cache, aggregates their responses, fixes the
    /// transaction duration and attributes the dispatch-time counters to
    /// the bus and the originating core.
    pub fn dispatch(&mut self, caches: &mut [L1Cache], cycle: u64) {
        debug_assert!(self.current.is_none(), "dispatch on a busy bus");
        let Some(entry) = self.queue.pop() else { return };
        let req = entry.req;

        let mut data_from_cache = false;
        let mut transfer_cycles = 0;
        for cache in caches.iter_mut() {
            if cache.core_id() == req.core_id {
                continue;
            }
            let (provides, cycles) = cache.snoop(&req, cycle);
            data_from_cache |= provides;
            transfer_cycles = transfer_cycles.max(cycles);
        }

        let duration = match req.op {
            BusOp::BusRd if data_from_cache => transfer_cycles,
            BusOp::BusRd => self.geom.t_mem_fetch(),
            // write misses always fetch from memory, even when a snooper
            // could have served the block
            BusOp::BusRdX => self.geom.t_mem_fetch(),
            BusOp::BusUpgr => 1,
            BusOp::Flush => self.geom.t_flush(),
        };

        self.stats.transactions += 1;
        let core_stats = caches[req.core_id].stats_mut();
        core_stats.transactions += 1;
        if matches!(req.op, BusOp::BusRdX | BusOp::BusUpgr) {
            self.stats.invalidations += 1;
            core_stats.invalidations += 1;
        }
        if req.op != BusOp::BusUpgr {
            let block = self.geom.block_bytes() as u64;
            self.stats.data_traffic_bytes += block;
            core_stats.data_traffic_bytes += block;
        }

        debug!(
            "cycle {cycle}: bus starts {:?} {:#x} for core {} ({duration} cycles)",
            req.op, req.address, req.core_id
        );

        self.busy_until = cycle + duration;
        self.current = Some(InFlight {
            req,
            // BusRdX data offers are ignored: the fill comes from memory
            data_from_cache: data_from_cache && req.op == BusOp::BusRd,
        });
    }

    /// Finishes the in-flight transaction once its completion cycle has
    /// arrived. Returns the originating core when its pending reference
    /// retires (fills and upgrades; a `Flush` leaves the core blocked on
    /// its fill).
    pub fn try_complete(&mut self, caches: &mut [L1Cache], cycle: u64) -> Option<usize> {
        if self.current.is_none() || cycle != self.busy_until {
            return None;
        }
        let InFlight {
            req,
            data_from_cache,
        } = self.current.take()?;

        debug!(
            "cycle {cycle}: bus completes {:?} {:#x} for core {}",
            req.op, req.address, req.core_id
        );

        let cache = &mut caches[req.core_id];
        match req.op {
            BusOp::Flush => {
                cache.complete_flush(cycle);
                None
            }
            BusOp::BusUpgr => {
                cache.complete(cycle, true, false, MesiState::Modified);
                Some(req.core_id)
            }
            BusOp::BusRd => {
                let new_state = if data_from_cache {
                    MesiState::Shared
                } else {
                    MesiState::Exclusive
                };
                cache.complete(cycle, false, data_from_cache, new_state);
                Some(req.core_id)
            }
            BusOp::BusRdX => {
                cache.complete(cycle, false, false, MesiState::Modified);
                Some(req.core_id)
            }
        }
    }
}
