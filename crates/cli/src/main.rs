//! CLI for building and running full-text search queries.
//!
//! Usage:
//!     searchql print --index articles "hello world"
//!     searchql search --index articles --field title "hello world" --limit 10
//!     searchql health

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use searchql_backend_sphinx::{HttpConnection, SphinxConfig};
use searchql_query::SphinxQuery;

#[derive(Parser)]
#[command(name = "searchql")]
#[command(about = "Build and run full-text search queries")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Engine SQL-over-HTTP URL
    #[arg(long, default_value = "http://127.0.0.1:9308")]
    engine_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a query and print the statement text
    Print {
        #[command(flatten)]
        query: QueryArgs,
    },

    /// Execute a query and print the matches
    Search {
        #[command(flatten)]
        query: QueryArgs,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check engine health
    Health,
}

#[derive(Args)]
struct QueryArgs {
    /// Full-text expression. Raw engine syntax unless --field is given.
    query: String,

    /// Source index (repeatable)
    #[arg(short, long, required = true)]
    index: Vec<String>,

    /// Field to match against (repeatable; escapes the expression)
    #[arg(short = 'F', long)]
    field: Vec<String>,

    /// Columns to select (repeatable, defaults to *)
    #[arg(short, long)]
    select: Vec<String>,

    /// Maximum results
    #[arg(short, long, default_value = "20")]
    limit: u64,

    /// Result offset
    #[arg(short, long, default_value = "0")]
    offset: u64,

    /// Engine option as name=value (repeatable)
    #[arg(long)]
    option: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("searchql=debug".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let config = SphinxConfig {
        base_url: cli.engine_url,
        ..Default::default()
    };
    let connection = HttpConnection::new(config);

    match cli.command {
        Commands::Print { query } => {
            run_print(&query)?;
        }
        Commands::Search { query, format } => {
            run_search(&connection, &query, &format).await?;
        }
        Commands::Health => {
            run_health(&connection).await?;
        }
    }

    Ok(())
}

fn build_query(args: &QueryArgs) -> SphinxQuery {
    let mut query = SphinxQuery::new()
        .select(args.select.clone())
        .from(args.index.clone())
        .set_first_result(args.offset)
        .set_max_results(args.limit);

    if args.field.is_empty() {
        query = query.raw_match(args.query.as_str());
    } else {
        query = query.matching(args.field.clone(), args.query.as_str());
    }

    for option in &args.option {
        match option.split_once('=') {
            Some((name, value)) => {
                query = query.add_option(name.trim(), value.trim());
            }
            None => {
                tracing::warn!(option = %option, "ignoring option without '='");
            }
        }
    }

    query
}

fn run_print(args: &QueryArgs) -> Result<()> {
    let mut query = build_query(args);
    println!("{}", query.to_sql()?);
    Ok(())
}

async fn run_search(connection: &HttpConnection, args: &QueryArgs, format: &str) -> Result<()> {
    let mut query = build_query(args);

    let matched = query.execute(connection).await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(query.rows()?)?);
    } else {
        for (i, row) in query.rows()?.iter().enumerate() {
            let rendered: Vec<String> = row
                .iter()
                .map(|(column, value)| format!("{}={}", column, value))
                .collect();
            println!("{}. {}", i + 1, rendered.join("  "));
        }

        println!("---");
        println!(
            "{} returned, {} total, engine time {:.3}s",
            matched,
            query.total_found()?,
            query.query_time()?
        );
    }

    Ok(())
}

async fn run_health(connection: &HttpConnection) -> Result<()> {
    print!("Checking engine... ");

    match connection.health_check().await {
        Ok(()) => {
            println!("OK");
            Ok(())
        }
        Err(e) => {
            println!("FAILED: {}", e);
            std::process::exit(1);
        }
    }
}
