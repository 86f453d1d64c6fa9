//! CLI tool for inspecting, checking and partitioning table chunks.

mod error;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Deserialize;
use snafu::ResultExt;
use table_chunk_core::{
    Chunk, ChunkConfig, ChunkContext, ChunkRecord, PartitionOptions,
    backend::parquet_file::ParquetBackend, partition,
};

use crate::error::{
    ChunkSnafu, CliError, CliResult, ConfigSnafu, EncodeSnafu, RecordsMissingSnafu,
    RecordsParseSnafu,
};

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve files and print one chunk record per line
    Inspect {
        /// Parquet files to describe
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Check recorded chunks against their live files
    Check {
        /// File with chunk records (JSON array or one record/group per line)
        #[arg(long)]
        records: PathBuf,
    },

    /// Split files into groups of equal row count, one JSON group per line
    Partition {
        /// Rows per group
        #[arg(long)]
        size: u64,

        /// Keep only the columns shared by every file
        #[arg(long, default_value_t = false)]
        common_columns: bool,

        /// Parquet files, in scan order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Read recorded chunks and print how many rows each yields
    Read {
        /// File with chunk records (JSON array or one record/group per line)
        #[arg(long)]
        records: PathBuf,
    },
}

#[derive(Debug, Parser)]
#[command(name = "tchunk")]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Table name, overriding the configured default
    #[arg(long, global = true)]
    table: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

fn load_config(path: Option<&Path>, table: Option<String>) -> CliResult<ChunkConfig> {
    let config = match path {
        Some(path) => ChunkConfig::from_json_file(path).context(ConfigSnafu)?,
        None => ChunkConfig::default(),
    };
    let config = match table {
        Some(name) => config.with_default_table_name(name),
        None => config,
    };
    config.validate().context(ConfigSnafu)?;
    Ok(config)
}

/// Records files hold JSON values separated by whitespace: single records
/// (`inspect` output) or arrays of records (`partition` output, or a plain
/// JSON array).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecordsDoc {
    One(ChunkRecord),
    Many(Vec<ChunkRecord>),
}

fn load_records(ctx: &ChunkContext, path: &Path) -> CliResult<Vec<Chunk>> {
    let path_str = path.display().to_string();
    let text = std::fs::read_to_string(path).context(RecordsMissingSnafu {
        path: path_str.clone(),
    })?;

    let mut chunks = Vec::new();
    for doc in serde_json::Deserializer::from_str(&text).into_iter::<RecordsDoc>() {
        let doc = doc.context(RecordsParseSnafu {
            path: path_str.clone(),
        })?;
        match doc {
            RecordsDoc::One(record) => chunks.push(ctx.from_record(record)),
            RecordsDoc::Many(records) => {
                chunks.extend(records.into_iter().map(|record| ctx.from_record(record)))
            }
        }
    }
    Ok(chunks)
}

fn cmd_inspect(ctx: &ChunkContext, files: Vec<PathBuf>) -> CliResult<()> {
    let chunks = ctx.from_paths(files).context(ChunkSnafu)?;
    for chunk in &chunks {
        let line = serde_json::to_string(&chunk.to_record()).context(EncodeSnafu)?;
        println!("{line}");
    }
    Ok(())
}

fn cmd_check(ctx: &ChunkContext, records: &Path) -> CliResult<()> {
    let chunks = load_records(ctx, records)?;
    let mut issues = 0;
    for chunk in &chunks {
        let report = chunk.check_integrity().context(ChunkSnafu)?;
        for issue in &report.issues {
            println!("chunk {chunk}: {issue}");
        }
        issues += report.issues.len();
    }

    println!("Checked {} chunk(s): {issues} issue(s)", chunks.len());
    if issues > 0 {
        return Err(CliError::IntegrityFailed {
            issues,
            chunks: chunks.len(),
        });
    }
    Ok(())
}

fn cmd_partition(
    ctx: &ChunkContext,
    size: u64,
    common_columns: bool,
    files: Vec<PathBuf>,
) -> CliResult<()> {
    let chunks = ctx.from_paths(files).context(ChunkSnafu)?;
    let options = PartitionOptions::new(size).with_common_columns(common_columns);
    let groups = partition(&chunks, options).context(ChunkSnafu)?;

    let total = groups.len();
    for group in groups {
        let records: Vec<ChunkRecord> = group.iter().map(Chunk::to_record).collect();
        let line = serde_json::to_string(&records).context(EncodeSnafu)?;
        println!("{line}");
    }
    eprintln!("Partitioned {} file(s) into {total} group(s)", chunks.len());
    Ok(())
}

fn cmd_read(ctx: &ChunkContext, records: &Path) -> CliResult<()> {
    let config = ctx.config();
    let reader = ParquetBackend::new(config.default_table_name.clone(), config.read_batch_size);
    let chunks = load_records(ctx, records)?;

    let mut total = 0usize;
    for chunk in &chunks {
        let batches = chunk.read_batches(&reader).context(ChunkSnafu)?;
        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        println!("{chunk}: {rows} rows");
        total += rows;
    }
    println!("Read {total} rows from {} chunk(s)", chunks.len());
    Ok(())
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.table)?;
    let ctx = ChunkContext::parquet(config);

    match cli.cmd {
        Command::Inspect { files } => cmd_inspect(&ctx, files),
        Command::Check { records } => cmd_check(&ctx, &records),
        Command::Partition {
            size,
            common_columns,
            files,
        } => cmd_partition(&ctx, size, common_columns, files),
        Command::Read { records } => cmd_read(&ctx, &records),
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
