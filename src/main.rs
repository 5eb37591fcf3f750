//! Binary entrypoint for the Mushcraft CLI.
//!
//! Commands:
//! - `init` - create a starter `config.toml` and the data directory
//! - `simulate [--hp <n>] [--power <n>] [--interrupt-after <ticks>] [--json] [--save]` -
//!   run one woodcutter against one tree in real time
//! - `status` - summarize the saved object store
//!
//! See the library crate docs for module-level details: `mushcraft::`.
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{info, warn};
use serde::Serialize;

use mushcraft::config::Config;
use mushcraft::tmush::{
    HarvestCoordinator, Notice, ObjectRecord, ObjectStore, TinyMushProcessor, TokioScheduler,
    World,
};

const WOODCUTTER: &str = "woodcutter";
const WATCHER: &str = "watcher";
const TREE: &str = "oak";

#[derive(Parser)]
#[command(name = "mushcraft")]
#[command(about = "Timed harvesting and stackable items for a TinyMUSH world")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,
    /// Chop a tree down in real time and print what everyone saw
    Simulate {
        /// Tree hit points (overrides [tree].max_hp)
        #[arg(long)]
        hp: Option<u32>,
        /// Strike power (overrides [harvest].strike_power)
        #[arg(long)]
        power: Option<u32>,
        /// Length of one time unit in milliseconds (overrides [harvest].time_unit_ms)
        #[arg(long)]
        unit_ms: Option<u64>,
        /// Walk away after this many strikes
        #[arg(long)]
        interrupt_after: Option<u32>,
        /// Print a JSON report instead of plain text
        #[arg(long)]
        json: bool,
        /// Save the resulting world to the object store
        #[arg(long)]
        save: bool,
    },
    /// Show what the object store holds
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let pre_config = match cli.command {
        Commands::Init => None,
        _ => match Config::load(&cli.config).await {
            Ok(config) => Some(config),
            Err(e) => {
                eprintln!("{} (using defaults)", e);
                None
            }
        },
    };
    init_logging(&pre_config, cli.verbose);
    let config = pre_config.unwrap_or_default();

    match cli.command {
        Commands::Init => {
            if std::path::Path::new(&cli.config).exists() {
                warn!("{} already exists, leaving it untouched", cli.config);
            } else {
                Config::create_default(&cli.config).await?;
                println!("Created default configuration at {}", cli.config);
            }
            let config = Config::load(&cli.config).await?;
            tokio::fs::create_dir_all(&config.storage.data_dir).await?;
            println!("Data directory: {}", config.storage.data_dir);
        }
        Commands::Simulate {
            hp,
            power,
            unit_ms,
            interrupt_after,
            json,
            save,
        } => {
            let options = SimulationOptions {
                hp,
                power,
                unit_ms,
                interrupt_after,
            };
            let (world, report) = run_simulation(&config, &options).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
            if save {
                let store = ObjectStore::open(&config.storage.data_dir)?;
                let written = store.save_world(&world)?;
                println!("Saved {} objects to {}", written, config.storage.data_dir);
            }
        }
        Commands::Status => {
            println!("Mushcraft Status");
            println!("================");
            let store = ObjectStore::open(&config.storage.data_dir)?;
            let objects = store.list_objects()?;
            println!("Store: {}", config.storage.data_dir);
            println!("Objects: {}", objects.len());
            for (kind, (records, items)) in tally(&objects) {
                println!("  {:<12} {:>4} objects {:>6} items", kind, records, items);
            }
        }
    }

    Ok(())
}

struct SimulationOptions {
    hp: Option<u32>,
    power: Option<u32>,
    unit_ms: Option<u64>,
    interrupt_after: Option<u32>,
}

#[derive(Serialize)]
struct SimulationReport {
    tree_felled: bool,
    interrupted: bool,
    ticks: u32,
    messages: Vec<Notice>,
    objects: Vec<ObjectRecord>,
}

fn seed_world(config: &Config, hp: Option<u32>) -> World {
    let world = World::with_prototypes(config.prototypes.clone());
    world.insert(ObjectRecord::room("glade", "Glade", "A quiet clearing ringed by oaks."));
    world.insert(ObjectRecord::room("road", "Road", "A muddy road leading away."));
    world.insert(ObjectRecord::character(WOODCUTTER, "Woodcutter", "glade"));
    world.insert(ObjectRecord::character(WATCHER, "Watcher", "glade"));

    let mut tree = config.tree.clone();
    if let Some(hp) = hp {
        tree.max_hp = hp;
    }
    world.insert(ObjectRecord::tree(TREE, "the old oak", tree.target()).at("glade"));
    world
}

async fn run_simulation(
    config: &Config,
    options: &SimulationOptions,
) -> Result<(Arc<World>, SimulationReport)> {
    let unit = options
        .unit_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.harvest.time_unit());
    let mut settings = config.harvest.settings();
    if let Some(power) = options.power {
        settings.strike_power = power;
    }

    let world = Arc::new(seed_world(config, options.hp));
    let scheduler = Arc::new(TokioScheduler::new(tokio::runtime::Handle::current(), unit));
    let coordinator = HarvestCoordinator::new(world.clone(), scheduler.clone(), settings);
    world.watch_moves(&coordinator);
    let processor = TinyMushProcessor::new(world.clone(), coordinator.clone());

    info!("Starting simulation: unit={:?}", unit);
    if let Some(reply) = processor.handle_command(WOODCUTTER, &format!("chop {}", TREE)) {
        anyhow::bail!("could not start chopping: {}", reply);
    }

    let mut ticks = 0;
    let mut interrupted = false;
    loop {
        tokio::select! {
            _ = tokio::time::sleep(unit) => {}
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupted by ctrl-c; stopping {} jobs", coordinator.shutdown());
                interrupted = true;
                break;
            }
        }
        let Some(job) = coordinator.job(WOODCUTTER) else {
            break;
        };
        ticks = job.ticks_elapsed();
        if let Some(limit) = options.interrupt_after {
            if ticks >= limit {
                processor.handle_command(WOODCUTTER, "go road");
                interrupted = true;
                break;
            }
        }
    }

    let tree_felled = !world.contains(TREE);
    if tree_felled {
        // Gather the spawned logs into one carried stack.
        let logs: Vec<String> = world
            .contents("glade")
            .into_iter()
            .filter(|o| o.kind == config.tree.yield_kind)
            .map(|o| o.id)
            .collect();
        for _ in &logs {
            if let Some(reply) =
                processor.handle_command(WOODCUTTER, &format!("get {}", config.tree.yield_kind))
            {
                warn!("pickup failed: {}", reply);
            }
        }
    }

    let report = SimulationReport {
        tree_felled,
        interrupted,
        ticks,
        messages: world.take_messages(),
        objects: world.objects(),
    };
    Ok((world, report))
}

fn print_report(report: &SimulationReport) {
    for notice in &report.messages {
        println!("[{}] {}", notice.recipient, notice.text);
    }
    println!();
    println!(
        "Strikes: {}  Felled: {}  Interrupted: {}",
        report.ticks, report.tree_felled, report.interrupted
    );
    for object in report.objects.iter().filter(|o| o.stack.stackable()) {
        println!(
            "  {} x{} at {}",
            object.name,
            object.stack.count(),
            object.location.as_deref().unwrap_or("nowhere")
        );
    }
}

/// kind -> (object records, total items across their stacks)
fn tally(objects: &[ObjectRecord]) -> BTreeMap<String, (usize, u64)> {
    let mut by_kind: BTreeMap<String, (usize, u64)> = BTreeMap::new();
    for object in objects {
        let entry = by_kind.entry(object.kind.clone()).or_default();
        entry.0 += 1;
        entry.1 += u64::from(object.stack.count());
    }
    by_kind
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .map(|c| c.logging.level_filter())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config
        .as_ref()
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });

    if let Some(f) = log_file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Echo to the console only when someone is watching it
        let is_tty = atty::is(atty::Stream::Stderr);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    let _ = builder.try_init();
}
