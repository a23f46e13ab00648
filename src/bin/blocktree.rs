//! Administrative CLI for blocktree database files.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use blocktree::common::config::{DEFAULT_BLOCK_SIZE, DEFAULT_POOL_SIZE};
use blocktree::index::btree::Superblock;
use blocktree::{
    BTreeConfig, BTreeIndex, BlockCache, BlockId, BlockStore, DiskManager, DisplayFormat, Error,
    Key, Result, Value,
};

#[derive(Parser, Debug)]
#[command(
    name = "blocktree",
    version,
    about = "Inspect and edit a blocktree database file",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE, help = "Block size in bytes")]
    block_size: usize,

    #[arg(long, default_value_t = DEFAULT_POOL_SIZE, help = "Block cache size (frames)")]
    pool_size: usize,

    #[arg(short, long, help = "Log allocations and splits")]
    verbose: bool,

    #[arg(value_name = "DB")]
    db_path: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create and format a new database file.
    Create {
        #[arg(long, help = "Number of blocks, including superblock and root")]
        blocks: u32,
        #[arg(long, default_value_t = 8)]
        key_size: usize,
        #[arg(long, default_value_t = 8)]
        value_size: usize,
    },
    /// Insert a new key.
    Insert { key: String, value: String },
    /// Print the value stored under a key.
    Lookup { key: String },
    /// Overwrite the value of an existing key.
    Update { key: String, value: String },
    /// Remove a key.
    Delete { key: String },
    /// Dump the tree.
    Display {
        #[arg(long, value_enum, default_value_t = FormatArg::Depth)]
        format: FormatArg,
    },
    /// Check the tree structure and print a summary.
    Check,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum FormatArg {
    Flat,
    Depth,
    Dot,
    Sorted,
}

impl From<FormatArg> for DisplayFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Flat => DisplayFormat::Flat,
            FormatArg::Depth => DisplayFormat::Depth,
            FormatArg::Dot => DisplayFormat::DepthDot,
            FormatArg::Sorted => DisplayFormat::SortedKeyValue,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("blocktree=debug")
        } else {
            EnvFilter::new("blocktree=warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

fn run(cli: Cli) -> Result<()> {
    if let Command::Create {
        blocks,
        key_size,
        value_size,
    } = cli.command
    {
        let mut dm = DiskManager::create(&cli.db_path, cli.block_size)?;
        dm.extend(blocks)?;
        let cache = BlockCache::new(cli.pool_size, dm);
        let mut tree = BTreeIndex::new(cache, BTreeConfig::new(key_size, value_size));
        tree.attach(BlockId::SUPERBLOCK, true)?;
        tree.detach()?;
        println!(
            "created {} ({} blocks of {} bytes, key {} / value {} bytes)",
            cli.db_path.display(),
            blocks,
            cli.block_size,
            key_size,
            value_size
        );
        return Ok(());
    }

    let mut tree = open(&cli)?;
    let config = *tree.config();
    let result = execute(&mut tree, &config, cli.command);
    // Persist the superblock even when the command failed partway.
    tree.detach()?;
    result
}

fn open(cli: &Cli) -> Result<BTreeIndex<BlockCache>> {
    let dm = DiskManager::open(&cli.db_path, cli.block_size)?;
    let cache = BlockCache::new(cli.pool_size, dm);
    let superblock = Superblock::decode(&cache.read_block(BlockId::SUPERBLOCK)?)?;
    let config = BTreeConfig::new(superblock.layout.key_size, superblock.layout.value_size);

    let mut tree = BTreeIndex::new(cache, config);
    tree.attach(BlockId::SUPERBLOCK, false)?;
    Ok(tree)
}

fn execute(tree: &mut BTreeIndex<BlockCache>, config: &BTreeConfig, command: Command) -> Result<()> {
    match command {
        Command::Create { .. } => unreachable!("handled before the tree is opened"),
        Command::Insert { key, value } => {
            tree.insert(&key_arg(&key, config)?, &value_arg(&value, config)?)?;
        }
        Command::Lookup { key } => {
            let value = tree.lookup(&key_arg(&key, config)?)?;
            println!("{}", value);
        }
        Command::Update { key, value } => {
            tree.update(&key_arg(&key, config)?, &value_arg(&value, config)?)?;
        }
        Command::Delete { key } => {
            tree.delete(&key_arg(&key, config)?)?;
        }
        Command::Display { format } => {
            print!("{}", tree.display(format.into())?);
        }
        Command::Check => {
            let report = tree.sanity_check()?;
            println!("{}", report);
            println!("{}", tree.store().stats().snapshot());
        }
    }
    Ok(())
}

fn key_arg(text: &str, config: &BTreeConfig) -> Result<Key> {
    fit("key", text, config.key_size).map(|_| Key::padded(text, config.key_size))
}

fn value_arg(text: &str, config: &BTreeConfig) -> Result<Value> {
    fit("value", text, config.value_size).map(|_| Value::padded(text, config.value_size))
}

fn fit(what: &'static str, text: &str, width: usize) -> Result<()> {
    if text.len() > width {
        return Err(Error::SizeMismatch {
            what,
            expected: width,
            actual: text.len(),
        });
    }
    Ok(())
}
