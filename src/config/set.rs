use crate::ds_impl::OpType;
use crate::MemSampler;
use clap::{value_parser, Arg, ArgAction, Command, ValueEnum};
use csv::Writer;
use rand::distributions::{Uniform, WeightedError, WeightedIndex};
use std::fmt;
use std::fs::{create_dir_all, File, OpenOptions};
use std::io;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(PartialEq, Debug, ValueEnum, Clone, Copy)]
pub enum DS {
    TransList,
    BoostingList,
}

pub enum TxnsPerCs {
    One,
    Four,
}

impl fmt::Display for TxnsPerCs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxnsPerCs::One => write!(f, "1"),
            TxnsPerCs::Four => write!(f, "4"),
        }
    }
}

/// Operation kinds in the order of the weights in `Config::op_dist`.
pub const OPS: [OpType; 3] = [OpType::Find, OpType::Insert, OpType::Delete];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot open output: {0}")]
    Io(#[from] io::Error),
    #[error("cannot write output: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid operation mix: {0}")]
    Mix(#[from] WeightedError),
}

pub struct Config {
    pub ds: DS,
    pub threads: usize,

    pub aux_thread: usize,
    pub aux_thread_period: Duration,
    pub sampling_period: Duration,

    pub txn_size: usize,
    pub insert_rate: u32,
    pub delete_rate: u32,
    pub op_dist: WeightedIndex<u32>,
    pub key_dist: Uniform<usize>,
    pub prefill: usize,
    pub key_range: usize,
    pub interval: u64,
    pub duration: Duration,
    pub txns_per_cs: TxnsPerCs,
    pub lock_timeout: Duration,
    pub print: bool,

    pub mem_sampler: MemSampler,
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} threads, {} ops/txn, {} keys, {}% insert, {}% delete, c{}",
            self.ds_name(),
            self.threads,
            self.txn_size,
            self.key_range,
            self.insert_rate,
            self.delete_rate,
            self.txns_per_cs,
        )
    }
}

impl Config {
    pub fn ds_name(&self) -> String {
        self.ds
            .to_possible_value()
            .map(|v| v.get_name().to_string())
            .unwrap_or_default()
    }
}

pub struct BenchWriter {
    output: Option<Writer<File>>,
}

#[derive(Clone)]
pub struct Perf {
    pub txns_per_sec: u64,
    pub commits: u64,
    pub aborts: u64,
    pub fake_aborts: u64,
    pub peak_mem: usize,
    pub avg_mem: usize,
}

impl fmt::Display for Perf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "txns/s: {}, commit: {}, abort (total/fake): {}/{}, peak mem: {}, avg_mem: {}",
            self.txns_per_sec,
            self.commits,
            self.aborts,
            self.fake_aborts,
            readable_bytes(self.peak_mem),
            readable_bytes(self.avg_mem),
        )
    }
}

fn readable_bytes(num: usize) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    for (i, unit) in UNITS.iter().enumerate() {
        if num / 2usize.pow(i as u32 * 10) < 1000 {
            return format!("{:.3} {}", num as f64 / 2f64.powf(i as f64 * 10.0), unit);
        }
    }
    format!(
        "{:.3} {}",
        num as f64 / 2f64.powf((UNITS.len() - 1) as f64 * 10.0),
        UNITS[UNITS.len() - 1]
    )
}

const HEADER: [&str; 13] = [
    "ds",
    "threads",
    "txn_size",
    "key_range",
    "insert_rate",
    "delete_rate",
    "txns_per_cs",
    "throughput",
    "commits",
    "aborts",
    "fake_aborts",
    "peak_mem",
    "avg_mem",
];

impl BenchWriter {
    pub fn write_record(self, config: &Config, perf: &Perf) -> Result<(), ConfigError> {
        if let Some(mut output) = self.output {
            output.write_record(&[
                config.ds_name(),
                config.threads.to_string(),
                config.txn_size.to_string(),
                config.key_range.to_string(),
                config.insert_rate.to_string(),
                config.delete_rate.to_string(),
                config.txns_per_cs.to_string(),
                perf.txns_per_sec.to_string(),
                perf.commits.to_string(),
                perf.aborts.to_string(),
                perf.fake_aborts.to_string(),
                perf.peak_mem.to_string(),
                perf.avg_mem.to_string(),
            ])?;
            output.flush()?;
        }
        Ok(())
    }
}

fn open_output(output_name: &str) -> Result<Writer<File>, ConfigError> {
    let output_path = Path::new(output_name);
    if let Some(dir) = output_path.parent() {
        create_dir_all(dir)?;
    }
    match OpenOptions::new().read(true).append(true).open(output_path) {
        Ok(f) => Ok(csv::Writer::from_writer(f)),
        Err(_) => {
            let f = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(output_path)?;
            let mut output = csv::Writer::from_writer(f);
            // NOTE: keep in sync with `BenchWriter::write_record`
            output.write_record(HEADER)?;
            output.flush()?;
            Ok(output)
        }
    }
}

fn command(bin: String) -> Command {
    Command::new(bin)
        .arg(
            Arg::new("data structure")
                .short('d')
                .value_parser(value_parser!(DS))
                .required(true)
                .ignore_case(true)
                .help("Transactional set implementation"),
        )
        .arg(
            Arg::new("threads")
                .short('t')
                .value_parser(value_parser!(usize))
                .required(true)
                .help("Numbers of threads to run."),
        )
        .arg(
            Arg::new("txn size")
                .short('z')
                .value_parser(value_parser!(usize))
                .help("Operations per transaction")
                .default_value("1"),
        )
        .arg(
            Arg::new("range")
                .short('r')
                .value_parser(value_parser!(usize))
                .help("Key range: [0..RANGE]")
                .default_value("100"),
        )
        .arg(
            Arg::new("insert rate")
                .short('p')
                .value_parser(value_parser!(u32).range(0..=100))
                .help("Percentage of inserts")
                .default_value("50"),
        )
        .arg(
            Arg::new("delete rate")
                .short('x')
                .value_parser(value_parser!(u32).range(0..=100))
                .help("Percentage of deletes. Capped so that inserts and deletes add up to 100 at most.")
                .default_value("50"),
        )
        .arg(
            Arg::new("interval")
                .short('i')
                .value_parser(value_parser!(u64).range(1..))
                .help("Time interval in seconds to run the benchmark")
                .default_value("10"),
        )
        .arg(
            Arg::new("sampling period")
                .short('s')
                .value_parser(value_parser!(u64))
                .help(
                    "The period to query jemalloc stats.allocated (ms). 0 for no sampling. \
                     Only supported on linux.",
                )
                .default_value("1"),
        )
        .arg(
            Arg::new("txns per cs")
                .short('c')
                .value_parser(["1", "4"])
                .help("Transactions per each critical section")
                .default_value("1"),
        )
        .arg(
            Arg::new("lock timeout")
                .short('l')
                .value_parser(value_parser!(u64))
                .help("How long the lock-based set waits for a key lock (ms)")
                .default_value("100"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .help("Output CSV filename. Appends the data if the file already exists."),
        )
        .arg(
            Arg::new("print")
                .long("print")
                .action(ArgAction::SetTrue)
                .help("Dump the list after the run"),
        )
        .arg(
            Arg::new("dry run")
                .long("dry-run")
                .action(ArgAction::SetTrue)
                .help("Check whether the arguments are parsable, without running a benchmark"),
        )
}

pub fn setup(bin: String) -> Result<(Config, BenchWriter), ConfigError> {
    setup_from(bin, std::env::args_os())
}

pub fn setup_from<I, T>(bin: String, args: I) -> Result<(Config, BenchWriter), ConfigError>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let m = command(bin).get_matches_from(args);

    let ds = m.get_one::<DS>("data structure").copied().unwrap();
    let threads = m.get_one::<usize>("threads").copied().unwrap();
    let txn_size = m.get_one::<usize>("txn size").copied().unwrap();
    let key_range = m.get_one::<usize>("range").copied().unwrap();
    let prefill = key_range / 2;
    let key_dist = Uniform::from(0..key_range);
    let insert_rate = m.get_one::<u32>("insert rate").copied().unwrap();
    let delete_rate = m
        .get_one::<u32>("delete rate")
        .copied()
        .unwrap()
        .min(100 - insert_rate);
    let interval = m.get_one::<u64>("interval").copied().unwrap();
    let sampling_period = m.get_one::<u64>("sampling period").copied().unwrap();
    let sampling = sampling_period > 0 && cfg!(target_os = "linux");
    let txns_per_cs = match m.get_one::<String>("txns per cs").unwrap().as_str() {
        "1" => TxnsPerCs::One,
        "4" => TxnsPerCs::Four,
        _ => unreachable!("txns_per_cs should be one or four"),
    };
    let lock_timeout = Duration::from_millis(m.get_one::<u64>("lock timeout").copied().unwrap());
    let duration = Duration::from_secs(interval);

    let op_dist = WeightedIndex::new([100 - insert_rate - delete_rate, insert_rate, delete_rate])?;

    let output = m
        .get_one::<String>("output")
        .map(|name| open_output(name))
        .transpose()?;

    let config = Config {
        ds,
        threads,

        aux_thread: if sampling { 1 } else { 0 },
        aux_thread_period: Duration::from_millis(1),
        sampling_period: Duration::from_millis(sampling_period),

        txn_size,
        insert_rate,
        delete_rate,
        op_dist,
        key_dist,
        prefill,
        key_range,
        interval,
        duration,
        txns_per_cs,
        lock_timeout,
        print: m.get_flag("print"),

        mem_sampler: MemSampler::new(),
    };

    if m.get_flag("dry run") {
        std::process::exit(0);
    }

    Ok((config, BenchWriter { output }))
}

#[cfg(test)]
mod tests {
    use super::{readable_bytes, setup_from, TxnsPerCs, DS, OPS};
    use crate::ds_impl::OpType;
    use rand::distributions::Distribution;

    #[test]
    fn parses_defaults() {
        let (config, _) = setup_from("txbench".into(), ["txbench", "-d", "trans-list", "-t", "4"]).unwrap();
        assert_eq!(config.ds, DS::TransList);
        assert_eq!(config.threads, 4);
        assert_eq!(config.txn_size, 1);
        assert_eq!(config.key_range, 100);
        assert_eq!(config.prefill, 50);
        assert_eq!((config.insert_rate, config.delete_rate), (50, 50));
        assert!(matches!(config.txns_per_cs, TxnsPerCs::One));
        assert!(!config.print);
        assert_eq!(config.to_string(), "trans-list: 4 threads, 1 ops/txn, 100 keys, 50% insert, 50% delete, c1");
    }

    #[test]
    fn caps_delete_rate() {
        let (config, _) = setup_from(
            "txbench".into(),
            ["txbench", "-d", "Boosting-List", "-t", "1", "-p", "70", "-x", "50", "-c", "4"],
        )
        .unwrap();
        assert_eq!(config.ds, DS::BoostingList);
        assert_eq!(config.delete_rate, 30);
        assert!(matches!(config.txns_per_cs, TxnsPerCs::Four));

        // No finds are left in the mix.
        let rng = &mut rand::thread_rng();
        for _ in 0..100 {
            assert_ne!(OPS[config.op_dist.sample(rng)], OpType::Find);
        }
    }

    #[test]
    fn formats_bytes() {
        assert_eq!(readable_bytes(512), "512.000 B");
        assert_eq!(readable_bytes(2048), "2.000 KiB");
        assert_eq!(readable_bytes(3 * 1024 * 1024), "3.000 MiB");
    }
}
