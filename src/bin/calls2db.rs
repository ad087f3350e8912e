use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;
use std::{env, fs, process};

use variant_base::{formats, utils, MaskedRegionSet, VariantBase};
use getopts::Options;
use log::info;

//-----------------------------------------------------------------------------

fn main() -> Result<(), String> {
    let start_time = Instant::now();

    // Parse arguments.
    let config = Config::new()?;
    init_logger(config.verbosity);

    // Check if the database already exists.
    if utils::file_exists(&config.db_file) {
        if config.overwrite {
            info!("Overwriting database {}", config.db_file);
            fs::remove_file(&config.db_file).map_err(|x| x.to_string())?;
        } else if !config.append {
            return Err(format!("Database {} already exists", config.db_file));
        }
    }

    // Create the database.
    if !utils::file_exists(&config.db_file) {
        let reference = formats::read_reference(&config.reference_file).map_err(|x| x.to_string())?;
        let name = config.reference_name();
        VariantBase::create(&config.db_file, &name, &reference).map_err(|x| x.to_string())?;
    }

    // Insert the calls and the masks.
    let calls = formats::read_variant_calls(&config.calls_file).map_err(|x| x.to_string())?;
    let masks = read_masks(&config.mask_dir)?;
    VariantBase::insert(&config.db_file, &calls, &masks).map_err(|x| x.to_string())?;
    if let Some(mlst_file) = config.mlst_file.as_ref() {
        let mlst = formats::read_mlst_calls(mlst_file).map_err(|x| x.to_string())?;
        VariantBase::insert_mlst(&config.db_file, &mlst).map_err(|x| x.to_string())?;
    }

    // Statistics.
    let database = VariantBase::open(&config.db_file).map_err(|x| x.to_string())?;
    eprintln!(
        "The database contains {} samples and {} variants over {} reference sequences ({} bp)",
        database.samples(), database.variants(), database.sequences(), database.reference_length()
    );
    if let Some(size) = database.file_size() {
        eprintln!("Database size: {}", size);
    }

    let end_time = Instant::now();
    let seconds = end_time.duration_since(start_time).as_secs_f64();
    eprintln!("Used {:.3} seconds", seconds);

    Ok(())
}

//-----------------------------------------------------------------------------

struct Config {
    pub db_file: String,
    pub reference_file: String,
    pub reference_name: Option<String>,
    pub calls_file: String,
    pub mask_dir: String,
    pub mlst_file: Option<String>,
    pub overwrite: bool,
    pub append: bool,
    pub verbosity: usize,
}

impl Config {
    pub fn new() -> Result<Config, String> {
        let args: Vec<String> = env::args().collect();
        let program = args[0].clone();

        let mut opts = Options::new();
        opts.optflag("h", "help", "print this help");
        opts.optopt("r", "reference", "reference FASTA file (required for a new database)", "FILE");
        opts.optopt("n", "name", "reference genome name (default: reference file name)", "STR");
        opts.optopt("c", "calls", "variant call table (required)", "FILE");
        opts.optopt("m", "masks", "directory with a BED mask <sample>.bed[.gz] for each sample (required)", "DIR");
        opts.optopt("", "mlst", "MLST allele call table", "FILE");
        opts.optflag("", "overwrite", "overwrite the database file if it exists");
        opts.optflag("", "append", "insert into the database file if it exists");
        opts.optflagmulti("v", "verbose", "print progress information (repeat for debug output)");
        let matches = opts.parse(&args[1..]).map_err(|x| x.to_string())?;

        let header = format!("Usage: {} [options] output.db", program);
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

        let overwrite = matches.opt_present("overwrite");
        let append = matches.opt_present("append");
        if overwrite && append {
            return Err("Options --overwrite and --append are mutually exclusive".to_string());
        }
        let reference_file = matches.opt_str("r").unwrap_or_default();
        if reference_file.is_empty() && !(append && utils::file_exists(&db_file)) {
            return Err("Reference must be provided with --reference".to_string());
        }

        Ok(Config {
            db_file,
            reference_file,
            reference_name: matches.opt_str("n"),
            calls_file: matches.opt_str("c").ok_or("Variant calls must be provided with --calls".to_string())?,
            mask_dir: matches.opt_str("m").ok_or("Mask directory must be provided with --masks".to_string())?,
            mlst_file: matches.opt_str("mlst"),
            overwrite,
            append,
            verbosity: matches.opt_count("v"),
        })
    }

    // Uses the reference file name without FASTA extensions by default.
    pub fn reference_name(&self) -> String {
        if let Some(name) = self.reference_name.as_ref() {
            return name.clone();
        }
        let name = Path::new(&self.reference_file).file_name().map(|x| x.to_string_lossy().to_string()).unwrap_or_default();
        let mut name = name.as_str();
        for suffix in [".gz", ".fasta", ".fa", ".fna"] {
            name = name.strip_suffix(suffix).unwrap_or(name);
        }
        name.to_string()
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

// Reads a mask for every BED file in the directory. The sample name is the file name without the extension.
fn read_masks(mask_dir: &str) -> Result<BTreeMap<String, MaskedRegionSet>, String> {
    let entries = fs::read_dir(mask_dir).map_err(|x| format!("Cannot read mask directory {}: {}", mask_dir, x))?;
    let mut result = BTreeMap::new();
    for entry in entries {
        let path = entry.map_err(|x| x.to_string())?.path();
        let name = path.file_name().map(|x| x.to_string_lossy().to_string()).unwrap_or_default();
        let sample = match name.strip_suffix(".bed.gz").or_else(|| name.strip_suffix(".bed")) {
            Some(sample) => sample.to_string(),
            None => continue,
        };
        let mask = MaskedRegionSet::from_file(&path).map_err(|x| x.to_string())?;
        if result.insert(sample.clone(), mask).is_some() {
            return Err(format!("Multiple masks for sample {}", sample));
        }
    }
    info!("Read masks for {} samples from {}", result.len(), mask_dir);
    Ok(result)
}

//-----------------------------------------------------------------------------
