// Per-core L1 cache: classifies local references, snoops bus traffic from
// the other cores, and installs or upgrades lines when its own bus
// transactions complete.
//
// Local MESI transitions:
//
//   from \ event   read        write              snoop BusRd   snoop BusRdX   snoop BusUpgr
//   Modified       M (hit)     M (hit)            S, supply     I, supply      (violation)
//   Exclusive      E (hit)     M (silent)         S, supply     I, supply      I
//   Shared         S (hit)     BusUpgr, block     S, supply     I, supply      I
//   Invalid        BusRd, block  BusRdX, block    -             -              -

use log::trace;

use crate::commons::{BusOp, BusRequest, Geometry, MemRef, MesiState};
use crate::stats::CoreStats;

#[derive(Clone, Copy, Debug)]
struct CacheLine {
    valid: bool,
    tag: u32,
    state: MesiState,
    last_used: u64,
}

impl CacheLine {
    fn empty() -> Self {
        CacheLine {
            valid: false,
            tag: 0,
            state: MesiState::Invalid,
            last_used: 0,
        }
    }

    fn invalidate(&mut self) {
        self.valid = false;
        self.state = MesiState::Invalid;
    }
}

struct CacheSet {
    lines: Vec<CacheLine>,
    // monotonic recency counter; the line with the smallest stamp is LRU
    use_ctr: u64,
}

impl CacheSet {
    fn new(assoc: usize) -> Self {
        CacheSet {
            lines: vec![CacheLine::empty(); assoc],
            use_ctr: 0,
        }
    }

    fn find(&self, tag: u32) -> Option<usize> {
        self.lines.iter().position(|l| l.valid && l.tag == tag)
    }

    fn touch(&mut self, way: usize) {
        self.use_ctr += 1;
        self.lines[way].last_used = self.use_ctr;
    }

    // Invalid slots are preferred victims; otherwise the least recently
    // promoted line. Ties break on the lowest way index.
    fn victim(&self) -> usize {
        if let Some(way) = self.lines.iter().position(|l| !l.valid) {
            return way;
        }
        self.lines
            .iter()
            .enumerate()
            .min_by_key(|(_, l)| l.last_used)
            .map(|(way, _)| way)
            .unwrap_or(0)
    }
}

/// One core's private L1 cache.
pub struct L1Cache {
    core_id: usize,
    geom: Geometry,
    sets: Vec<CacheSet>,
    stats: CoreStats,
    blocked: bool,
    pending: Option<MemRef>,
}

impl L1Cache {
    pub fn new(core_id: usize, geom: Geometry) -> Self {
        L1Cache {
            core_id,
            geom,
            sets: (0..geom.num_sets()).map(|_| CacheSet::new(geom.assoc)).collect(),
            stats: CoreStats::default(),
            blocked: false,
            pending: None,
        }
    }

    pub fn core_id(&self) -> usize {
        self.core_id
    }

    pub fn blocked(&self) -> bool {
        self.blocked
    }

    pub fn stats(&self) -> &CoreStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut CoreStats {
        &mut self.stats
    }

    /// Current MESI state of the line holding `address`, `Invalid` if absent.
    pub fn line_state(&self, address: u32) -> MesiState {
        let set = &self.sets[self.geom.set_index(address)];
        match set.find(self.geom.tag(address)) {
            Some(way) => set.lines[way].state,
            None => MesiState::Invalid,
        }
    }

    /// Answers one reference from the owning core.
    ///
    /// Returns whether the reference retired this cycle and the bus
    /// requests to enqueue (at most a `Flush` followed by a fill, stamped
    /// with the same issue cycle). A reference that does not retire is held
    /// as `pending` and the cache refuses further references until the bus
    /// completes its transaction.
    pub fn offer(&mut self, mem_ref: MemRef, cycle: u64) -> (bool, Vec<BusRequest>) {
        if self.blocked {
            return (false, Vec::new());
        }

        let address = mem_ref.address;
        if mem_ref.is_write {
            self.stats.writes += 1;
        } else {
            self.stats.reads += 1;
        }

        let set_index = self.geom.set_index(address);
        let tag = self.geom.tag(address);

        if let Some(way) = self.sets[set_index].find(tag) {
            self.stats.hits += 1;
            if mem_ref.is_write {
                match self.sets[set_index].lines[way].state {
                    MesiState::Modified => {}
                    MesiState::Exclusive => {
                        // silent upgrade, no bus traffic
                        self.sets[set_index].lines[way].state = MesiState::Modified;
                    }
                    MesiState::Shared => {
                        // ownership is settled on the bus; the recency
                        // update is deferred to the upgrade completion
                        trace!("core {}: upgrade stall on {address:#x}", self.core_id);
                        self.block_on(mem_ref);
                        return (
                            false,
                            vec![BusRequest {
                                core_id: self.core_id,
                                op: BusOp::BusUpgr,
                                address,
                                issue_cycle: cycle,
                            }],
                        );
                    }
                    MesiState::Invalid => unreachable!("valid line in Invalid state"),
                }
            }
            self.sets[set_index].touch(way);
            return (true, Vec::new());
        }

        // miss
        self.stats.misses += 1;
        let mut requests = Vec::with_capacity(2);

        let way = self.sets[set_index].victim();
        let victim = self.sets[set_index].lines[way];
        if victim.valid {
            self.stats.evictions += 1;
            if victim.state == MesiState::Modified {
                self.stats.writebacks += 1;
                requests.push(BusRequest {
                    core_id: self.core_id,
                    op: BusOp::Flush,
                    address: self.geom.block_addr(victim.tag, set_index),
                    issue_cycle: cycle,
                });
            }
            self.sets[set_index].lines[way].invalidate();
        }

        requests.push(BusRequest {
            core_id: self.core_id,
            op: if mem_ref.is_write {
                BusOp::BusRdX
            } else {
                BusOp::BusRd
            },
            address,
            issue_cycle: cycle,
        });
        self.block_on(mem_ref);
        (false, requests)
    }

    /// Observes a transaction another core placed on the bus.
    ///
    /// Returns whether this cache can serve the block and the
    /// cache-to-cache transfer time if it can. Never touches recency.
    pub fn snoop(&mut self, req: &BusRequest, _cycle: u64) -> (bool, u64) {
        debug_assert_ne!(req.core_id, self.core_id, "cache snooping its own request");

        let set_index = self.geom.set_index(req.address);
        let tag = self.geom.tag(req.address);
        let Some(way) = self.sets[set_index].find(tag) else {
            return (false, 0);
        };
        let transfer = self.geom.t_cache_transfer();
        let line = &mut self.sets[set_index].lines[way];
        match req.op {
            BusOp::BusRd => {
                line.state = MesiState::Shared;
                (true, transfer)
            }
            BusOp::BusRdX => {
                line.invalidate();
                (true, transfer)
            }
            BusOp::BusUpgr => {
                // the issuer holds the line Shared, so no one can hold it
                // Modified; a Modified hit here is a protocol violation
                debug_assert!(
                    line.state != MesiState::Modified,
                    "BusUpgr snooped against a Modified line"
                );
                if matches!(line.state, MesiState::Shared | MesiState::Exclusive) {
                    line.invalidate();
                }
                (false, 0)
            }
            BusOp::Flush => (false, 0),
        }
    }

    /// Finishes the fill or upgrade this cache is blocked on.
    ///
    /// An upgrade rewrites the state of the existing line (when it is still
    /// present; a racing invalidation may have removed it) and performs the
    /// deferred recency update. A fill installs into the previously vacated
    /// slot, or updates in place on tag re-entry, and becomes MRU. Either
    /// way the cache unblocks; retirement bookkeeping is the driver's.
    pub fn complete(
        &mut self,
        _cycle: u64,
        is_upgrade: bool,
        data_from_cache: bool,
        new_state: MesiState,
    ) {
        let Some(pending) = self.pending else { return };
        trace!(
            "core {}: complete {:#x} -> {new_state:?} (from cache: {data_from_cache})",
            self.core_id,
            pending.address
        );

        let set_index = self.geom.set_index(pending.address);
        let tag = self.geom.tag(pending.address);
        if is_upgrade {
            if let Some(way) = self.sets[set_index].find(tag) {
                self.sets[set_index].lines[way].state = new_state;
                self.sets[set_index].touch(way);
            }
        } else {
            let way = match self.sets[set_index].find(tag) {
                Some(way) => way,
                None => self.sets[set_index].victim(),
            };
            let line = &mut self.sets[set_index].lines[way];
            line.valid = true;
            line.tag = tag;
            line.state = new_state;
            self.sets[set_index].touch(way);
        }
        self.blocked = false;
        self.pending = None;
    }

    /// Finishes a writeback this cache issued. The victim slot is already
    /// empty and the paired fill is still outstanding, so the cache stays
    /// blocked.
    pub fn complete_flush(&mut self, _cycle: u64) {
        trace!("core {}: flush complete", self.core_id);
    }

    fn block_on(&mut self, mem_ref: MemRef) {
        self.blocked = true;
        self.pending = Some(mem_ref);
    }
}
