use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use docsift::{
    SearchType,
    config::DEFAULT_REFRESH_INTERVAL,
    fuzzy::DEFAULT_FUZZY_THRESHOLD,
    query::DEFAULT_LIMIT,
};

#[derive(Debug, Parser)]
#[command(
    name = "docsift",
    about = "Fast keyword and fuzzy search over a local documentation tree"
)]
pub struct Cli {
    /// Documentation root (defaults to $DOCSIFT_ROOT, then the current
    /// directory)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search file contents and names
    Search(SearchArgs),
    /// Rebuild the index from scratch
    Rebuild(OutputArgs),
    /// Show index statistics
    Status(OutputArgs),
    /// Start MCP server for AI agent integration
    Mcp(McpArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// The search query
    pub query: String,

    /// Match against content, file names, or both
    #[arg(short = 't', long = "type", value_enum, default_value_t)]
    pub search_type: SearchType,

    /// Only search files with this extension (repeatable, or comma
    /// separated)
    #[arg(short = 'e', long = "ext")]
    pub extensions: Vec<String>,

    /// Only search below this directory, relative to the root
    #[arg(long)]
    pub path: Option<String>,

    /// Number of results to return
    #[arg(short = 'n', long, default_value_t = DEFAULT_LIMIT)]
    pub limit: usize,

    /// Disable typo-tolerant matching
    #[arg(long)]
    pub no_fuzzy: bool,

    /// Minimum similarity for fuzzy matches
    #[arg(long, default_value_t = DEFAULT_FUZZY_THRESHOLD)]
    pub threshold: f64,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,

    /// Output only file paths (one per line)
    #[arg(long, conflicts_with = "json")]
    pub files: bool,
}

// -- Rebuild / Status --

#[derive(Debug, Parser)]
pub struct OutputArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- MCP --

#[derive(Debug, Parser)]
pub struct McpArgs {
    /// Seconds between background checks for changed files (0 disables)
    #[arg(long, default_value_t = DEFAULT_REFRESH_INTERVAL.as_secs())]
    pub refresh_secs: u64,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "docsift",
            &mut std::io::stdout(),
        );
    }
}
