use std::io::Write;
use std::sync::Arc;
use std::{env, io, process};

use variant_base::{utils, BasicQuery, SampleColumn, SamplesQuery, Table, Tree, VariantBase};
use getopts::Options;
use log::info;

//-----------------------------------------------------------------------------

fn main() -> Result<(), String> {
    // Parse arguments.
    let config = Config::new()?;
    init_logger(config.verbosity);

    // Open the database and apply the predicates on stored features.
    let database = VariantBase::open(&config.db_file).map_err(|x| x.to_string())?;
    let query = BasicQuery::new(Arc::new(database));
    let query = apply_features(query, &config).map_err(|x| x.to_string())?;

    // Join the table, if any.
    if let Some(table_file) = config.table_file.as_ref() {
        let table = Table::from_file(table_file).map_err(|x| x.to_string())?;
        let column = config.sample_column.clone().ok_or("Sample column must be provided with --names or --ids".to_string())?;
        let query = query.join(table, column).map_err(|x| x.to_string())?;
        apply_tree(query, &config)
    } else {
        apply_tree(query, &config)
    }
}

//-----------------------------------------------------------------------------

struct Config {
    pub db_file: String,
    pub samples: Vec<String>,
    pub mutations: Vec<String>,
    pub alleles: Vec<String>,
    pub table_file: Option<String>,
    pub sample_column: Option<SampleColumn>,
    pub tree_file: Option<String>,
    pub alignment_length: Option<usize>,
    pub reference: Option<String>,
    pub within: Option<(f64, String)>,
    pub unit: String,
    pub mrca: Vec<String>,
    pub complement: bool,
    pub output: Option<String>,
    pub verbosity: usize,
}

impl Config {
    pub fn new() -> Result<Config, String> {
        let args: Vec<String> = env::args().collect();
        let program = args[0].clone();

        let mut opts = Options::new();
        opts.optflag("h", "help", "print this help");
        opts.optopt("s", "samples", "comma-separated sample names", "STR");
        opts.optmulti("m", "mutation", "samples with the variant (sequence:position:ref:alt)", "STR");
        opts.optmulti("", "mlst", "samples with the MLST allele (scheme:locus:allele)", "STR");
        opts.optopt("", "table", "join a TSV/CSV table of sample data", "FILE");
        opts.optopt("", "names", "table column with sample names", "STR");
        opts.optopt("", "ids", "table column with sample identifiers", "STR");
        opts.optopt("t", "tree", "phylogenetic tree in the Newick format", "FILE");
        opts.optopt("l", "alignment-length", "alignment length for the tree (required with --tree)", "INT");
        opts.optopt("", "reference", "reference genome name for the tree (default: from the database)", "STR");
        opts.optopt("w", "within", "samples within the distance of the sample in the tree", "DIST:SAMPLE");
        opts.optopt("u", "unit", "distance unit: substitutions, substitutions/site (default: substitutions)", "STR");
        opts.optopt("", "mrca", "samples under the MRCA of the comma-separated samples in the tree", "STR");
        opts.optflag("", "complement", "output the samples that do not match the query");
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

        let sample_column = match (matches.opt_str("names"), matches.opt_str("ids")) {
            (Some(_), Some(_)) => return Err("Options --names and --ids are mutually exclusive".to_string()),
            (Some(s), None) => Some(SampleColumn::Names(s)),
            (None, Some(s)) => Some(SampleColumn::Ids(s)),
            (None, None) => None,
        };
        let mut alignment_length: Option<usize> = None;
        if let Some(s) = matches.opt_str("l") {
            alignment_length = Some(s.parse::<usize>().map_err(|x| format!("--alignment-length: {}", x))?);
        }
        let mut within: Option<(f64, String)> = None;
        if let Some(s) = matches.opt_str("w") {
            let (distance, sample) = s.split_once(':').ok_or(format!("--within: expected DIST:SAMPLE, got {}", s))?;
            let distance = distance.parse::<f64>().map_err(|x| format!("--within: {}", x))?;
            within = Some((distance, sample.to_string()));
        }

        Ok(Config {
            db_file,
            samples: split_list(matches.opt_str("s")),
            mutations: matches.opt_strs("m"),
            alleles: matches.opt_strs("mlst"),
            table_file: matches.opt_str("table"),
            sample_column,
            tree_file: matches.opt_str("t"),
            alignment_length,
            reference: matches.opt_str("reference"),
            within,
            unit: matches.opt_str("u").unwrap_or(String::from("substitutions")),
            mrca: split_list(matches.opt_str("mrca")),
            complement: matches.opt_present("complement"),
            output: matches.opt_str("o"),
            verbosity: matches.opt_count("v"),
        })
    }
}

fn split_list(value: Option<String>) -> Vec<String> {
    value.map(|s| s.split(',').filter(|x| !x.is_empty()).map(String::from).collect()).unwrap_or_default()
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

fn apply_features<Q: SamplesQuery>(mut query: Q, config: &Config) -> variant_base::Result<Q> {
    if !config.samples.is_empty() {
        let names: Vec<&str> = config.samples.iter().map(|x| x.as_str()).collect();
        query = query.isin_samples(&names)?;
    }
    for mutation in config.mutations.iter() {
        query = query.has(mutation, "mutation")?;
    }
    for allele in config.alleles.iter() {
        query = query.has(allele, "mlst")?;
    }
    Ok(query)
}

fn apply_tree<Q: SamplesQuery>(query: Q, config: &Config) -> Result<(), String> {
    let tree_file = match config.tree_file.as_ref() {
        Some(tree_file) => tree_file,
        None => {
            if config.within.is_some() || !config.mrca.is_empty() {
                return Err("Options --within and --mrca require a tree".to_string());
            }
            return write_result(query, config);
        },
    };

    let tree = Tree::from_file(tree_file).map_err(|x| x.to_string())?;
    let alignment_length = config.alignment_length.ok_or("Alignment length must be provided with --alignment-length".to_string())?;
    let reference = config.reference.clone().unwrap_or(query.database().reference_name().to_string());
    let mut query = query.build_tree(Arc::new(tree), alignment_length, &reference).map_err(|x| x.to_string())?;
    if let Some((distance, sample)) = config.within.as_ref() {
        query = query.within(*distance, sample, &config.unit).map_err(|x| x.to_string())?;
    }
    if !config.mrca.is_empty() {
        let names: Vec<&str> = config.mrca.iter().map(|x| x.as_str()).collect();
        query = query.within_mrca(&names).map_err(|x| x.to_string())?;
    }
    write_result(query, config)
}

fn write_result<Q: SamplesQuery>(query: Q, config: &Config) -> Result<(), String> {
    let query = if config.complement { query.complement() } else { query };
    info!("{} samples match {}", query.len().map_err(|x| x.to_string())?, query.query_expression());

    let table = query.to_table().map_err(|x| x.to_string())?;
    let mut output: Box<dyn Write> = match config.output.as_ref() {
        Some(filename) => utils::create_file(filename).map_err(|x| x.to_string())?,
        None => Box::new(io::stdout()),
    };
    table.write_tsv(&mut output).map_err(|x| x.to_string())?;
    output.flush().map_err(|x| x.to_string())?;
    Ok(())
}

//-----------------------------------------------------------------------------
