use std::{sync::Arc, time::Duration};

use clap::Parser;
use docsift::{
    EngineConfig,
    IndexStats,
    Query,
    SearchEngine,
    error,
    mcp::run_mcp,
    search::format_human,
};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command, SearchArgs};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("DOCSIFT_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    init_tracing(cli.verbose, cli.quiet);

    let config = EngineConfig::resolve(cli.root.as_deref())?;

    match cli.command {
        Command::Search(args) => {
            let engine = SearchEngine::new(config)?;
            engine.rebuild_index()?;
            cmd_search(&engine, args)?;
        }
        Command::Rebuild(args) => {
            let engine = SearchEngine::new(config)?;
            let stats = engine.rebuild_index()?;
            print_stats(&stats, args.json)?;
        }
        Command::Status(args) => {
            let engine = SearchEngine::new(config)?;
            engine.rebuild_index()?;
            cmd_status(&engine, args.json)?;
        }
        Command::Mcp(args) => {
            let mut config = config;
            config.refresh_interval = Duration::from_secs(args.refresh_secs);
            let refresh_every = (!config.refresh_interval.is_zero())
                .then_some(config.refresh_interval);
            let engine = Arc::new(SearchEngine::new(config)?);
            run_mcp(engine, refresh_every)?;
        }
        Command::Completions(_) => {}
    }

    Ok(())
}

fn cmd_search(engine: &SearchEngine, args: SearchArgs) -> error::Result<()> {
    let query = Query::new(args.query)
        .search_type(args.search_type)
        .extensions(args.extensions)
        .path_prefix(args.path)
        .limit(args.limit)
        .fuzzy(!args.no_fuzzy)
        .fuzzy_threshold(args.threshold);

    let response = engine.search(&query)?;

    if args.json {
        println!("{}", to_json(&response)?);
    } else if args.files {
        for r in &response.results {
            println!("{}", engine.config().root.join(&r.path).display());
        }
    } else {
        format_human(&response.results, response.took_ms);
    }
    Ok(())
}

fn print_stats(stats: &IndexStats, json: bool) -> error::Result<()> {
    if json {
        println!("{}", to_json(stats)?);
        return Ok(());
    }

    println!(
        "Indexed {} files ({} tokens) in {} ms",
        stats.total_files, stats.total_tokens, stats.elapsed_ms
    );
    println!(
        "  updated: {}, removed: {}, skipped: {}, failed: {}",
        stats.indexed_files,
        stats.removed_files,
        stats.skipped_files,
        stats.failed_files
    );
    Ok(())
}

fn cmd_status(engine: &SearchEngine, json: bool) -> error::Result<()> {
    let status = engine.index_status();
    if json {
        println!("{}", to_json(&status)?);
        return Ok(());
    }

    println!("Root: {}", status.root);
    println!("Files: {}", status.total_files);
    println!("Tokens: {}", status.total_tokens);
    println!("Vocabulary: {}", status.vocabulary_size);
    println!("Generation: {}", status.generation);
    if let Some(built) = status.last_built_at {
        println!("Last built: {built} (unix seconds)");
    }
    Ok(())
}

fn to_json(value: &impl serde::Serialize) -> error::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
