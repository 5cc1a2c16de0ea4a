//! Command line argument parsing for the pike CLI using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// pike - schema-driven near-real-time indexing and search
#[derive(Parser, Debug, Clone)]
#[command(name = "pike")]
#[command(about = "Schema-driven near-real-time indexing and search")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct PikeArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Directory holding one sub-directory per index
    #[arg(long, env = "PIKE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long, env = "PIKE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl PikeArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1,
                n => n,
            }
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show or replace the schema of an index
    Schema(SchemaArgs),

    /// Write documents into an index
    Index(IndexArgs),

    /// Search one index or a federation of indexes
    Search(SearchArgs),

    /// Show the status of one or every index
    Status(StatusArgs),

    /// Delete documents, or a whole index
    Delete(DeleteArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SchemaArgs {
    /// Index name
    #[arg(value_name = "INDEX")]
    pub index: String,

    /// JSON array of field declarations to install
    #[arg(long, value_name = "FILE")]
    pub fields: Option<PathBuf>,

    /// JSON object of custom analyzer definitions to install
    #[arg(long, value_name = "FILE")]
    pub analyzers: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct IndexArgs {
    /// Index name
    #[arg(value_name = "INDEX")]
    pub index: String,

    /// Documents, as a JSON array or one JSON object per line
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Documents per commit
    #[arg(short, long, default_value = "1000")]
    pub batch_size: usize,

    /// Only update column values of existing documents
    #[arg(long)]
    pub values_only: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// Index name, or comma-separated names searched as a federation
    #[arg(value_name = "INDEX")]
    pub indexes: String,

    /// Query text
    #[arg(value_name = "QUERY")]
    pub query: Option<String>,

    /// Field the query text is matched against
    #[arg(long)]
    pub field: Option<String>,

    /// Require every query term instead of any
    #[arg(long)]
    pub and: bool,

    /// Full query definition as a JSON file; other query options are applied on top
    #[arg(long, value_name = "FILE")]
    pub definition: Option<PathBuf>,

    /// Maximum number of results to return
    #[arg(short, long)]
    pub rows: Option<usize>,

    /// Offset for pagination
    #[arg(short, long, default_value = "0")]
    pub start: usize,

    /// Sort fields, as FIELD[:asc|:desc] or $score (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub sort: Vec<String>,

    /// Facet dimensions to count (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub facets: Vec<String>,
}

impl SearchArgs {
    pub fn index_names(&self) -> Vec<&str> {
        self.indexes
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect()
    }
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    /// Index name; every index when omitted
    #[arg(value_name = "INDEX")]
    pub index: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    /// Index name
    #[arg(value_name = "INDEX")]
    pub index: String,

    /// Identities of the documents to delete
    #[arg(value_name = "ID")]
    pub ids: Vec<String>,

    /// Delete every document
    #[arg(long, conflicts_with = "ids")]
    pub all: bool,

    /// Delete the index itself with its files
    #[arg(long, conflicts_with_all = ["ids", "all"])]
    pub drop: bool,
}

/// Output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_arguments() {
        let args = PikeArgs::try_parse_from([
            "pike", "-vv", "search", "books,films", "red wine", "--field", "title", "--sort",
            "price:desc,$score", "--rows", "5",
        ])
        .unwrap();

        assert_eq!(args.verbosity(), 2);
        match args.command {
            Command::Search(search) => {
                assert_eq!(search.index_names(), vec!["books", "films"]);
                assert_eq!(search.query.as_deref(), Some("red wine"));
                assert_eq!(search.sort, vec!["price:desc", "$score"]);
                assert_eq!(search.rows, Some(5));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_delete_flags_conflict() {
        assert!(PikeArgs::try_parse_from(["pike", "delete", "books", "1", "--all"]).is_err());
        assert!(PikeArgs::try_parse_from(["pike", "-q", "delete", "books", "--drop"]).is_ok());
    }
}
