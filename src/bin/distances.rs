use std::io::Write;
use std::time::Instant;
use std::{env, io, process};

use variant_base::{utils, DistanceMetric, DistanceParams, KindFilter, VariantBase};
use variant_base::distance;
use getopts::Options;

//-----------------------------------------------------------------------------

fn main() -> Result<(), String> {
    let start_time = Instant::now();

    // Parse arguments.
    let config = Config::new()?;
    init_logger(config.verbosity);

    // Open the database and determine the samples.
    let database = VariantBase::open(&config.db_file).map_err(|x| x.to_string())?;
    let samples: Vec<String> = if config.samples.is_empty() {
        database.sample_names(&database.samples_with_variants().map_err(|x| x.to_string())?)
            .map_err(|x| x.to_string())?
            .into_iter().map(|(_, name)| name).collect()
    } else {
        config.samples.clone()
    };
    let names: Vec<&str> = samples.iter().map(|x| x.as_str()).collect();

    // Compute and write the distances.
    let matrix = distance::pairwise_distance(&database, &names, &config.params).map_err(|x| x.to_string())?;
    let mut output: Box<dyn Write> = match config.output.as_ref() {
        Some(filename) => utils::create_file(filename).map_err(|x| x.to_string())?,
        None => Box::new(io::stdout()),
    };
    matrix.write_tsv(&mut output).map_err(|x| x.to_string())?;
    output.flush().map_err(|x| x.to_string())?;

    let end_time = Instant::now();
    let seconds = end_time.duration_since(start_time).as_secs_f64();
    eprintln!("Computed {} distances in {:.3} seconds", matrix.len() * matrix.len().saturating_sub(1) / 2, seconds);

    Ok(())
}

//-----------------------------------------------------------------------------

struct Config {
    pub db_file: String,
    pub samples: Vec<String>,
    pub params: DistanceParams,
    pub output: Option<String>,
    pub verbosity: usize,
}

impl Config {
    pub fn new() -> Result<Config, String> {
        let args: Vec<String> = env::args().collect();
        let program = args[0].clone();

        let mut opts = Options::new();
        opts.optflag("h", "help", "print this help");
        opts.optopt("s", "samples", "comma-separated sample names (default: all samples with variants)", "STR");
        opts.optopt("k", "kind", "variant kind: all, snp, mnp, ins, del (default: all)", "STR");
        opts.optopt("", "metric", "distance metric (default: jaccard)", "STR");
        opts.optflag("", "core-only", "ignore variants in the masked regions of either sample");
        opts.optopt("o", "output", "output file (default: stdout)", "FILE");
        opts.optflagmulti("v", "verbose", "print progress information (repeat for debug output)");
        let matches = opts.parse(&args[1..]).map_err(|x| x.to_string())?;

        let header = format!("Usage: {} [options] variants.db", program);
        if matches.opt_present("h") {
            eprint!("{}", opts.usage(&header));
            process::exit(0);
        }
        let db_file = if let Some(s) = matches.free.first() {
            s.clone()
        } else {
            eprint!("{}", opts.usage(&header));
            process::exit(1);
        };

        let mut samples = Vec::new();
        if let Some(s) = matches.opt_str("s") {
            samples = s.split(',').filter(|x| !x.is_empty()).map(String::from).collect();
        }
        let mut params = DistanceParams::default();
        if let Some(s) = matches.opt_str("k") {
            let kind: KindFilter = s.parse().map_err(|x| format!("--kind: {}", x))?;
            params = params.with_kind(kind);
        }
        if let Some(s) = matches.opt_str("metric") {
            let metric: DistanceMetric = s.parse().map_err(|x| format!("--metric: {}", x))?;
            params = params.with_metric(metric);
        }
        params = params.with_core_only(matches.opt_present("core-only"));

        Ok(Config {
            db_file,
            samples,
            params,
            output: matches.opt_str("o"),
            verbosity: matches.opt_count("v"),
        })
    }
}

fn init_logger(verbosity: usize) {
    env_logger::Builder::new()
        .filter_level(match verbosity {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();
}

//-----------------------------------------------------------------------------
