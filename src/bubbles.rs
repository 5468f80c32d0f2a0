use crate::timer::{Millis, TimerId, TimerQueue};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::BTreeMap;
use std::ops::Range;
use tracing::{debug, trace};

pub(crate) const TICK_MS: Millis = 300;
pub(crate) const EXPIRE_GRACE_MS: Millis = 50;
pub(crate) const SWEEP_DELAY_MS: Millis = 400;

const LEFT_PCT: Range<f32> = 10.0..90.0;
const SIZE: Range<f32> = 6.0..24.0;
const DURATION_MS: Range<f32> = 2200.0..3800.0;
const MAX_PER_TICK: u32 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct BubbleId(u64);

/// The randomized visual parameters of one bubble.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct BubbleShape {
    pub(crate) left_pct: f32,
    pub(crate) size: f32,
    pub(crate) duration_ms: f32,
}

impl BubbleShape {
    pub(crate) fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            left_pct: rng.gen_range(LEFT_PCT),
            size: rng.gen_range(SIZE),
            duration_ms: rng.gen_range(DURATION_MS),
        }
    }

    fn expire_after(&self) -> Millis {
        self.duration_ms.ceil() as Millis + EXPIRE_GRACE_MS
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Bubble {
    pub(crate) id: BubbleId,
    pub(crate) shape: BubbleShape,
    pub(crate) born_at: Millis,
    pub(crate) epoch: u64,
}

impl Bubble {
    /// Rise progress 0..=1 at `now_ms`, where 1 is the end of its animation.
    pub(crate) fn progress(&self, now_ms: f32) -> f32 {
        let age = now_ms - self.born_at as f32;
        (age / self.shape.duration_ms.max(1.0)).clamp(0.0, 1.0)
    }
}

/// Work the emitter schedules for itself on the timer queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EmitterTask {
    Tick,
    Expire(BubbleId),
    Sweep { epoch: u64 },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct EmitterStats {
    pub(crate) ticks: u64,
    pub(crate) spawned: u64,
    pub(crate) expired: u64,
    pub(crate) swept: u64,
}

/// Spawns bubbles on a repeating tick while running and cleans them up after.
///
/// Every real `start` opens a new epoch. A sweep scheduled by `stop` remembers
/// the epoch it was scheduled in and leaves newer bubbles alone, so quick
/// leave/enter sequences never wipe bubbles from the resumed run.
pub(crate) struct BubbleEmitter {
    rng: StdRng,
    interval: Option<TimerId>,
    epoch: u64,
    next_id: u64,
    bubbles: BTreeMap<BubbleId, Bubble>,
    stats: EmitterStats,
}

impl BubbleEmitter {
    pub(crate) fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            interval: None,
            epoch: 0,
            next_id: 1,
            bubbles: BTreeMap::new(),
            stats: EmitterStats::default(),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.bubbles.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.bubbles.is_empty()
    }

    pub(crate) fn bubbles(&self) -> impl Iterator<Item = &Bubble> {
        self.bubbles.values()
    }

    pub(crate) fn stats(&self) -> EmitterStats {
        self.stats
    }

    pub(crate) fn start(&mut self, timers: &mut TimerQueue<EmitterTask>) {
        if self.interval.is_some() {
            return;
        }
        self.epoch += 1;
        self.interval = Some(timers.set_interval(TICK_MS, EmitterTask::Tick));
        debug!(epoch = self.epoch, at = timers.now(), "bubble emitter started");
    }

    pub(crate) fn stop(&mut self, timers: &mut TimerQueue<EmitterTask>) {
        if let Some(id) = self.interval.take() {
            timers.clear(id);
            debug!(epoch = self.epoch, at = timers.now(), "bubble emitter stopped");
        }
        timers.set_timeout(SWEEP_DELAY_MS, EmitterTask::Sweep { epoch: self.epoch });
    }

    pub(crate) fn spawn_one(&mut self, timers: &mut TimerQueue<EmitterTask>) {
        let shape = BubbleShape::random(&mut self.rng);
        let id = BubbleId(self.next_id);
        self.next_id += 1;

        self.bubbles.insert(
            id,
            Bubble {
                id,
                shape,
                born_at: timers.now(),
                epoch: self.epoch,
            },
        );
        timers.set_timeout(shape.expire_after(), EmitterTask::Expire(id));
        self.stats.spawned += 1;
        trace!(?id, left = shape.left_pct, size = shape.size, dur = shape.duration_ms, "bubble");
    }

    pub(crate) fn handle(&mut self, task: EmitterTask, timers: &mut TimerQueue<EmitterTask>) {
        match task {
            EmitterTask::Tick => {
                // stale tick from a cleared interval
                if self.interval.is_none() {
                    return;
                }
                self.stats.ticks += 1;
                let n = self.rng.gen_range(1..=MAX_PER_TICK);
                for _ in 0..n {
                    self.spawn_one(timers);
                }
            }
            EmitterTask::Expire(id) => {
                if self.bubbles.remove(&id).is_some() {
                    self.stats.expired += 1;
                }
            }
            EmitterTask::Sweep { epoch } => {
                let before = self.bubbles.len();
                self.bubbles.retain(|_, b| b.epoch > epoch);
                let removed = before - self.bubbles.len();
                self.stats.swept += removed as u64;
                if removed > 0 {
                    debug!(epoch, removed, "swept bubbles");
                }
            }
        }
    }
}
