use clap::{Parser, Subcommand};
use colmap::algo::classifier::ClassifierConfig;
use colmap::algo::dictionary::{self, FieldDictionary};
use colmap::algo::storage::{JobStore, ProfileStore};
use colmap::{config, ops, Result};
use serde_json::{json, Value};
use std::io::{self, Read};
use std::path::Path;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "colmap",
    version,
    about = "Spreadsheet column detection, mapping profiles, and batch script generation"
)]
struct Cli {
    /// Database file for profiles and jobs (default: $COLMAP_DB or the data dir)
    #[arg(long, global = true)]
    db: Option<String>,

    /// Log at debug level regardless of $COLMAP_LOG
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect canonical fields in file columns (stdin: array of {file, columns})
    Analyze {
        /// Path to a dictionary JSON file. If omitted, the default dictionary is resolved
        #[arg(short, long)]
        dictionary: Option<String>,
        /// Use a stored profile's fields as the dictionary
        #[arg(short, long, conflicts_with = "dictionary")]
        profile: Option<String>,
        /// Minimum confidence for a suggestion
        #[arg(long, default_value_t = 0.3)]
        threshold: f64,
        /// Multiplier when inferred and expected types agree
        #[arg(long, default_value_t = 1.2)]
        type_bonus: f64,
        /// Max sample values inspected per column
        #[arg(long)]
        sample_limit: Option<usize>,
    },
    /// Print the field dictionary
    Dictionary {
        /// Print the compiled-in dictionary, ignoring overrides
        #[arg(long)]
        default: bool,
    },
    /// Manage mapping profiles
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Generate a batch processing script
    Script {
        /// Use a saved job instead of explicit arguments
        #[arg(long, conflicts_with_all = ["profile", "source", "output", "prefix"])]
        job: Option<String>,
        /// Profile name
        #[arg(short, long)]
        profile: Option<String>,
        /// Input directory or CSV manifest
        #[arg(short, long)]
        source: Option<String>,
        /// Output folder for processed files
        #[arg(short, long)]
        output: Option<String>,
        /// Output file prefix
        #[arg(long)]
        prefix: Option<String>,
        /// Write the script into this directory
        #[arg(short, long)]
        write: Option<String>,
    },
    /// Manage saved batch jobs
    Job {
        #[command(subcommand)]
        action: JobAction,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Create a profile (stdin: {name, description?, fields})
    Create,
    /// Show one profile
    Get { id: String },
    /// Replace a profile's content (stdin: {name, description?, fields})
    Update { id: String },
    /// Delete a profile
    Delete { id: String },
    /// List all profiles in creation order
    List,
    /// Search names and descriptions
    Search {
        #[arg(default_value = "")]
        query: String,
    },
    /// Store an `analyze` result as a profile (stdin: analysis JSON)
    #[command(name = "from-analysis")]
    FromAnalysis {
        name: String,
        #[arg(short, long)]
        description: Option<String>,
    },
}

#[derive(Subcommand)]
enum JobAction {
    /// Save (or overwrite) a named job
    Save {
        name: String,
        #[arg(short, long)]
        profile: String,
        #[arg(short, long)]
        source: String,
        #[arg(short, long)]
        output: String,
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Show one job
    Get { name: String },
    /// List saved jobs
    List,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("{{\"error\": \"serialization\", \"detail\": \"{e}\"}}");
                std::process::exit(1);
            }
        },
        Err(e) => {
            let body = ops::error_value(&e);
            eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
            std::process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(config::LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn run(cli: Cli) -> Result<Value> {
    let db = config::database_path(cli.db.as_deref());

    match cli.command {
        Commands::Analyze {
            dictionary: dict_path,
            profile,
            threshold,
            type_bonus,
            sample_limit,
        } => {
            let config = ClassifierConfig {
                threshold,
                type_bonus,
                sample_limit,
            };
            let rows = read_stdin_rows()?;
            match profile {
                Some(name) => {
                    ops::op_analyze_with_profile(&ProfileStore::open(&db)?, &rows, &name, &config)
                }
                None => {
                    let dict = resolve_dictionary(dict_path.as_deref())?;
                    ops::op_analyze(&rows, &dict, &config)
                }
            }
        }
        Commands::Dictionary { default } => {
            let dict = if default {
                dictionary::embedded_dictionary()
            } else {
                dictionary::default_dictionary()
            };
            ops::op_dictionary(&dict)
        }
        Commands::Profile { action } => cmd_profile(&ProfileStore::open(&db)?, action),
        Commands::Script {
            job,
            profile,
            source,
            output,
            prefix,
            write,
        } => {
            let store = ProfileStore::open(&db)?;
            let generated = match job {
                Some(name) => ops::op_job_script(&store, &JobStore::open(&db)?, &name)?,
                None => ops::op_generate_script(
                    &store,
                    &json!({
                        "profile_name": profile,
                        "source_path": source,
                        "output_folder": output,
                        "file_prefix": prefix,
                    }),
                )?,
            };
            match write {
                Some(dir) => write_script(generated, Path::new(&dir)),
                None => Ok(generated),
            }
        }
        Commands::Job { action } => cmd_job(&JobStore::open(&db)?, action),
    }
}

fn cmd_profile(store: &ProfileStore, action: ProfileAction) -> Result<Value> {
    match action {
        ProfileAction::Create => ops::op_profile_create(store, &read_stdin_json()?),
        ProfileAction::Get { id } => ops::op_profile_get(store, &id),
        ProfileAction::Update { id } => ops::op_profile_update(store, &id, &read_stdin_json()?),
        ProfileAction::Delete { id } => ops::op_profile_delete(store, &id),
        ProfileAction::List => ops::op_profile_list(store),
        ProfileAction::Search { query } => ops::op_profile_search(store, &query),
        ProfileAction::FromAnalysis { name, description } => ops::op_profile_from_analysis(
            store,
            &read_stdin_json()?,
            &name,
            description.as_deref(),
        ),
    }
}

fn cmd_job(jobs: &JobStore, action: JobAction) -> Result<Value> {
    match action {
        JobAction::Save {
            name,
            profile,
            source,
            output,
            prefix,
        } => ops::op_job_save(
            jobs,
            &name,
            &json!({
                "profile_name": profile,
                "source_path": source,
                "output_folder": output,
                "file_prefix": prefix,
            }),
        ),
        JobAction::Get { name } => ops::op_job_get(jobs, &name),
        JobAction::List => ops::op_job_list(jobs),
    }
}

fn resolve_dictionary(path: Option<&str>) -> Result<FieldDictionary> {
    match path {
        Some(p) => dictionary::load_dictionary(p),
        None => Ok(dictionary::default_dictionary()),
    }
}

/// Write the generated script into `dir` and report where it went.
fn write_script(mut generated: Value, dir: &Path) -> Result<Value> {
    let filename = ops::get_text(&generated, "filename");
    let script = ops::get_text(&generated, "script");
    std::fs::create_dir_all(dir)?;
    let path = dir.join(&filename);
    std::fs::write(&path, script)?;
    tracing::info!(path = %path.display(), "wrote batch script");

    if let Some(obj) = generated.as_object_mut() {
        obj.remove("script");
        obj.insert("path".into(), Value::String(path.display().to_string()));
    }
    Ok(generated)
}

fn read_stdin_json() -> Result<Value> {
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(serde_json::from_str(&buf)?)
}

fn read_stdin_rows() -> Result<Vec<Value>> {
    Ok(match read_stdin_json()? {
        Value::Array(arr) => arr,
        single => vec![single],
    })
}
