use agree_lattice::{discover_fds, DelimitedStream, DiscoveryConfig, NullPolicy, Relation};
use clap::Parser;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Lists the minimal functional dependencies of a table.")]
struct Args {
    /// Worker threads for sampling and validation (defaults to the available parallelism).
    #[arg(long)]
    threads: Option<usize>,

    /// Read tab-separated rather than comma-separated input.
    #[arg(long)]
    tsv: bool,

    /// Treat every null as distinct from every other null.
    #[arg(long)]
    nulls_distinct: bool,

    /// Input table with a header row; reads standard input when absent or `-`.
    file: Option<PathBuf>,
}

impl Args {
    fn config(&self) -> DiscoveryConfig {
        let mut config = DiscoveryConfig::default();
        if let Some(threads) = self.threads {
            config = config.with_threads(threads);
        }
        if self.nulls_distinct {
            config = config.with_null_policy(NullPolicy::NullNotEqualsNull);
        }
        config
    }

    fn delimiter(&self) -> u8 {
        if self.tsv {
            b'\t'
        } else {
            b','
        }
    }
}

fn main() -> agree_lattice::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = args.config();
    let delimiter = args.delimiter();

    let mut stream = match args.file.as_deref() {
        Some(path) if path != Path::new("-") => {
            let name = path.display().to_string();
            DelimitedStream::from_reader(&name, File::open(path)?, delimiter, true)?
        }
        _ => DelimitedStream::from_reader("stdin", io::stdin().lock(), delimiter, true)?,
    };
    let relation = Relation::load(&mut stream, config.null_policy)?;
    let fds = discover_fds(&relation, &config)?;

    let names = relation.column_names();
    for fd in &fds {
        println!("{}", fd.display_with(&names));
    }
    println!(
        "{}: {} functional dependencies over {} columns and {} rows",
        relation.relation_name(),
        fds.len(),
        relation.column_count(),
        relation.row_count()
    );
    Ok(())
}
