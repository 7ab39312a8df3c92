use crossbeam_utils::thread::scope;
use rand::prelude::*;
use std::cmp::max;
use std::io::{stdout, Write};
use std::path::Path;
use std::sync::{mpsc, Arc, Barrier};
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use typenum::{Unsigned, U1, U4};

use txn_set_benchmark::config::set::{setup, BenchWriter, Config, Perf, TxnsPerCs, DS, OPS};
use txn_set_benchmark::ds_impl::{
    BoostingList, OpType, Operation, TransList, TransactionalSet, TxnStats,
};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let bin = Path::new(file!())
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "txbench".to_string());
    let (config, output) = match setup(bin) {
        Ok(setup) => setup,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    match config.txns_per_cs {
        TxnsPerCs::One => bench::<U1>(&config, output),
        TxnsPerCs::Four => bench::<U4>(&config, output),
    }
}

fn bench<N: Unsigned>(config: &Config, output: BenchWriter) {
    println!("{}", config);
    let perf = match config.ds {
        DS::TransList => {
            let set = TransList::with_stats(Arc::new(TxnStats::new()));
            bench_set::<_, N>(config, &set)
        }
        DS::BoostingList => {
            let set = BoostingList::with_stats(Arc::new(TxnStats::new()))
                .with_lock_timeout(config.lock_timeout);
            bench_set::<_, N>(config, &set)
        }
    };
    if let Err(e) = output.write_record(config, &perf) {
        error!("{}", e);
    }
    println!("{}", perf);
}

/// Inserts keys in a decreasing order, with a single thread, so that every
/// insertion lands at the head of the list.
fn prefill<S: TransactionalSet<usize, usize>>(config: &Config, set: &S) {
    let collector = &crossbeam_ebr::Collector::new();
    let handle = collector.register();
    let rng = &mut rand::thread_rng();
    let mut keys = Vec::with_capacity(config.prefill);
    for _ in 0..config.prefill {
        keys.push(config.key_dist.sample(rng));
    }
    keys.sort_by(|a, b| b.cmp(a));
    for key in keys.drain(..) {
        set.insert(key, key, &handle.pin());
    }
    print!("prefilled... ");
    stdout().flush().ok();
}

fn bench_set<S, N>(config: &Config, set: &S) -> Perf
where
    S: TransactionalSet<usize, usize> + Send + Sync,
    N: Unsigned,
{
    prefill(config, set);
    let prefilled = set.stats();

    let collector = &crossbeam_ebr::Collector::new();

    let barrier = &Arc::new(Barrier::new(config.threads + config.aux_thread));
    let (txns_sender, txns_receiver) = mpsc::channel();
    let (mem_sender, mem_receiver) = mpsc::channel();

    let result = scope(|s| {
        // sampling thread
        if config.aux_thread > 0 {
            let mem_sender = mem_sender.clone();
            s.spawn(move |_| {
                let mut samples = 0usize;
                let mut acc = 0usize;
                let mut peak = 0usize;
                barrier.clone().wait();

                let start = Instant::now();
                let mut next_sampling = start + config.sampling_period;
                while start.elapsed() < config.duration {
                    let now = Instant::now();
                    if now > next_sampling {
                        let allocated = config.mem_sampler.sample();
                        samples += 1;

                        acc += allocated;
                        peak = max(peak, allocated);

                        next_sampling = now + config.sampling_period;
                    }
                    std::thread::sleep(config.aux_thread_period);
                }

                let _ = mem_sender.send((peak, acc / max(samples, 1)));
            });
        } else {
            let _ = mem_sender.send((0, 0));
        }

        for _ in 0..config.threads {
            let txns_sender = txns_sender.clone();
            s.spawn(move |_| {
                let mut txns: u64 = 0;
                let rng = &mut rand::thread_rng();
                let mut ops: Vec<Operation<usize, usize>> = Vec::with_capacity(config.txn_size);
                let handle = collector.register();
                barrier.clone().wait();
                let start = Instant::now();

                let mut guard = handle.pin();
                while start.elapsed() < config.duration {
                    ops.clear();
                    for _ in 0..config.txn_size {
                        let key = config.key_dist.sample(rng);
                        ops.push(match OPS[config.op_dist.sample(rng)] {
                            OpType::Find => Operation::Find(key),
                            OpType::Insert => Operation::Insert(key, key),
                            OpType::Delete => Operation::Delete(key),
                        });
                    }
                    set.execute_ops(&ops, &guard);

                    txns += 1;
                    if txns % N::to_u64() == 0 {
                        drop(guard);
                        guard = handle.pin();
                    }
                }

                let _ = txns_sender.send(txns);
            });
        }
    });
    if result.is_err() {
        error!("a benchmark thread panicked");
        std::process::exit(1);
    }
    println!("end");

    let txns: u64 = txns_receiver.try_iter().sum();
    let txns_per_sec = txns / config.interval;
    let (peak_mem, avg_mem) = mem_receiver.recv().unwrap_or((0, 0));
    let stats = set.stats();
    info!(%stats, "finished");

    if config.print {
        set.print(&collector.register().pin());
    }

    Perf {
        txns_per_sec,
        commits: stats.count_commit - prefilled.count_commit,
        aborts: stats.count_abort - prefilled.count_abort,
        fake_aborts: stats.count_fake_abort - prefilled.count_fake_abort,
        peak_mem,
        avg_mem,
    }
}
