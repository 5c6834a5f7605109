//! # Engine Benchmark Harness
//!
//! Repeatable throughput driver for the striped engine: deterministic
//! workload, prebuilt key/value buffers, direct calls on the concrete
//! engine so nothing hides behind dispatch.
//!
//! Usage: `bench_engine [keys] [ops] [key_bytes] [value_bytes]`

use std::env;
use std::hint::black_box;
use std::time::Instant;

use skv_engine::KvEngine;

const DEFAULT_KEY_COUNT: usize = 1 << 16;
const DEFAULT_OP_COUNT: usize = 1_000_000;
const DEFAULT_KEY_SIZE: usize = 16;
const DEFAULT_VALUE_SIZE: usize = 128;
const BENCH_STRIPES: usize = 128;

struct BenchConfig {
    key_count: usize,
    key_mask: usize,
    op_count: usize,
    key_size: usize,
    value_size: usize,
}

impl BenchConfig {
    fn from_args() -> Self {
        let mut args = env::args().skip(1);
        let requested_keys = parse_usize(args.next(), DEFAULT_KEY_COUNT);
        let op_count = parse_usize(args.next(), DEFAULT_OP_COUNT);
        let key_size = parse_usize(args.next(), DEFAULT_KEY_SIZE);
        let value_size = parse_usize(args.next(), DEFAULT_VALUE_SIZE);

        // Power-of-two key count so random indices are a mask away.
        let key_count = requested_keys.max(1).next_power_of_two();

        BenchConfig {
            key_count,
            key_mask: key_count - 1,
            op_count,
            key_size,
            value_size,
        }
    }
}

fn parse_usize(value: Option<String>, fallback: usize) -> usize {
    value.and_then(|raw| raw.parse().ok()).unwrap_or(fallback)
}

/// Tiny deterministic PRNG; xorshift keeps the workload reproducible
/// without pulling in a dependency.
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    #[inline]
    fn next_index(&mut self, mask: usize) -> usize {
        (self.next_u64() as usize) & mask
    }
}

fn build_buffers(count: usize, size: usize, seed: u64) -> Vec<Vec<u8>> {
    let mut buffers = Vec::with_capacity(count);
    for i in 0..count {
        let mut buffer = vec![0u8; size];
        let stamp = (seed ^ (i as u64)).to_le_bytes();
        let copy_len = buffer.len().min(stamp.len());
        buffer[..copy_len].copy_from_slice(&stamp[..copy_len]);
        buffers.push(buffer);
    }
    buffers
}

fn report(label: &str, ops: usize, elapsed: std::time::Duration) {
    let secs = elapsed.as_secs_f64();
    let ops_per_sec = (ops as f64) / secs;
    let nanos_per_op = (secs * 1e9) / (ops as f64);
    println!("{label}: {ops} ops in {secs:.3}s ({ops_per_sec:.0} ops/s, {nanos_per_op:.1} ns/op)");
}

fn main() {
    let config = BenchConfig::from_args();
    let engine = KvEngine::with_stripes(BENCH_STRIPES);
    let keys = build_buffers(config.key_count, config.key_size, 0x5eed_0001);
    let values = build_buffers(config.key_count, config.value_size, 0x5eed_0002);

    // Fill: every key once, no TTL.
    let started = Instant::now();
    for i in 0..config.key_count {
        engine.set(keys[i].clone(), values[i].clone(), 0);
    }
    report("fill", config.key_count, started.elapsed());

    // Read: uniform random hits.
    let mut prng = XorShift64::new(0x5eed_0003);
    let mut hits = 0usize;
    let started = Instant::now();
    for _ in 0..config.op_count {
        let idx = prng.next_index(config.key_mask);
        if black_box(engine.get(&keys[idx])).is_some() {
            hits += 1;
        }
    }
    report("get", config.op_count, started.elapsed());

    // Mixed: 8 reads to 1 write to 1 delete.
    let started = Instant::now();
    for op in 0..config.op_count {
        let idx = prng.next_index(config.key_mask);
        match op % 10 {
            8 => engine.set(keys[idx].clone(), values[idx].clone(), 0),
            9 => {
                black_box(engine.delete(&keys[idx]));
            }
            _ => {
                black_box(engine.get(&keys[idx]));
            }
        }
    }
    report("mixed", config.op_count, started.elapsed());

    println!("read hits: {hits}, resident keys: {}", engine.len());
}
