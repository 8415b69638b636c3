//! 置換表の並列ベンチマーク
//!
//! 探索の代わりに乱数キーで probe → write を繰り返し、
//! 複数スレッドから同時にアクセスしたときのスループットを測る。

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::time::{Duration, Instant};

use ttable_core::TranspositionTable;
use ttable_core::types::{Bound, Move, Value};

/// 既知局面を再訪する割合（置換表ヒットを発生させるため）
const REVISIT_RATE: f64 = 0.25;

pub struct BenchConfig {
    pub threads: usize,
    pub probes_per_thread: u64,
    pub seed: u64,
}

#[derive(Debug, Default)]
pub struct BenchReport {
    pub probes: u64,
    pub hits: u64,
    pub elapsed: Duration,
}

impl BenchReport {
    pub fn probes_per_sec(&self) -> u64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 { (self.probes as f64 / secs) as u64 } else { self.probes }
    }
}

/// 1回の探索エピソードとして世代を進め、全スレッド終了まで待つ
pub fn run_bench(tt: &TranspositionTable, config: &BenchConfig) -> BenchReport {
    tt.new_search();
    let start = Instant::now();

    let hits: u64 = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..config.threads)
            .map(|id| {
                let seed = config.seed.wrapping_add(id as u64);
                let probes = config.probes_per_thread;
                scope.spawn(move || worker(tt, seed, probes))
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap_or(0)).sum()
    });

    let report = BenchReport {
        probes: config.probes_per_thread * config.threads as u64,
        hits,
        elapsed: start.elapsed(),
    };
    log::debug!("bench finished: {report:?}");
    report
}

fn worker(tt: &TranspositionTable, seed: u64, probes: u64) -> u64 {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut recent = [0u64; 64];
    let mut hits = 0;

    for n in 0..probes {
        let key = if n >= recent.len() as u64 && rng.random_bool(REVISIT_RATE) {
            recent[rng.random_range(0..recent.len())]
        } else {
            let key: u64 = rng.random();
            recent[n as usize % recent.len()] = key;
            key
        };

        tt.prefetch(key);
        let probe = tt.probe(key);
        if probe.found {
            hits += 1;
        }

        let depth = rng.random_range(0..32);
        let bound = match rng.random_range(0..3) {
            0 => Bound::Exact,
            1 => Bound::Lower,
            _ => Bound::Upper,
        };
        let mv = if probe.found {
            Move::NONE
        } else {
            Move::from_u16(rng.random_range(1..=u16::MAX))
        };
        probe.write(
            Value::new(rng.random_range(-2000..2000)),
            rng.random_bool(0.1),
            bound,
            depth,
            mv,
            Value::new(rng.random_range(-2000..2000)),
        );
    }

    hits
}
