use clap::{Parser, Subcommand};

use archive_query::engine::{
    ContactPeriods, ContactStats, DEFAULT_RECENT_LIMIT, Outcome, RecentConversation,
};
use archive_query::engine_from_env;

#[derive(Parser)]
#[command(
    name = "archive-query-cli",
    about = "Find attachments, summarize conversations and search messages in your archive"
)]
struct Cli {
    /// Output machine-readable JSON (default: human-readable)
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answer a free-text query
    Ask {
        /// The query (positional, collects remaining args)
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// Show the latest message with each contact
    Recent {
        #[arg(long, default_value_t = DEFAULT_RECENT_LIMIT)]
        limit: usize,
        #[arg(long, help = "Only show contacts or messages containing this text")]
        filter: Option<String>,
    },
    /// List the months that can be summarized for a contact
    Periods {
        #[arg(long)]
        contact: String,
    },
    /// Count messages with a contact by year, month and hour of day
    Stats {
        #[arg(long)]
        contact: String,
    },
}

// ============================================================================
// Output Formatting
// ============================================================================

fn print_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::PdfFound { path, .. } => {
            println!("{}", outcome.content());
            println!("  Path: {path}");
        }
        Outcome::SummaryFound {
            contact_name,
            period,
            text,
        } => {
            println!("{contact_name} ({})", period.label());
            println!();
            println!("{text}");
        }
        Outcome::SummaryError { .. } | Outcome::StoreUnavailable { .. } | Outcome::EmptyQuery => {
            eprintln!("{}", outcome.content());
        }
        Outcome::PdfNotFound { .. } | Outcome::MessageSearchResults { .. } => {
            println!("{}", outcome.content());
        }
    }
}

fn print_recent(conversations: &[RecentConversation]) {
    if conversations.is_empty() {
        eprintln!("No conversations found.");
        return;
    }
    for (i, convo) in conversations.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("{} ({})", convo.contact, convo.timestamp.format("%Y-%m-%d %H:%M"));
        println!("  {}: {}", convo.sender, convo.last_message);
    }
}

fn print_periods(listing: &ContactPeriods) {
    if listing.periods.is_empty() {
        eprintln!(
            "No conversations with {} are long enough to summarize.",
            listing.contact_name
        );
        return;
    }
    println!("Conversations with {}:", listing.contact_name);
    for info in &listing.periods {
        println!("  - {} ({} lines)", info.period.label(), info.lines);
    }
}

fn print_stats(listing: &ContactStats) {
    let stats = &listing.stats;
    println!("{}: {} messages", listing.contact_name, stats.total);
    if stats.total == 0 {
        return;
    }

    println!();
    println!("By year:");
    for (year, count) in &stats.yearly {
        println!("  {year}  {count}");
    }

    println!();
    println!("By month:");
    for (month, count) in &stats.monthly {
        println!("  {month}  {count}");
    }

    println!();
    println!("By hour:");
    for (hour, count) in stats.hourly.iter().enumerate().filter(|(_, n)| **n > 0) {
        println!("  {hour:02}:00  {count}");
    }
    if let Some(hour) = stats.busiest_hour() {
        println!();
        println!("Busiest hour: {hour:02}:00");
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let engine = engine_from_env()?;

    match cli.command {
        Command::Ask { query } => {
            let outcome = engine.handle(&query.join(" ")).await;
            if cli.json {
                let mut payload = serde_json::to_value(&outcome)?;
                payload["content"] = serde_json::Value::String(outcome.content());
                payload["timestamp"] = serde_json::Value::String(chrono::Utc::now().to_rfc3339());
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                print_outcome(&outcome);
            }
        }
        Command::Recent { limit, filter } => {
            let conversations = engine.recent_conversations(limit, filter.as_deref()).await?;
            if cli.json {
                let output = serde_json::json!({
                    "contacts": conversations,
                    "count": conversations.len(),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print_recent(&conversations);
            }
        }
        Command::Periods { contact } => {
            let listing = engine.conversation_periods(&contact).await?;
            match (listing, cli.json) {
                (Some(listing), true) => println!("{}", serde_json::to_string_pretty(&listing)?),
                (Some(listing), false) => print_periods(&listing),
                (None, true) => println!("{}", serde_json::json!({ "error": "contact_not_found" })),
                (None, false) => eprintln!("No contact found matching '{contact}'."),
            }
        }
        Command::Stats { contact } => {
            let listing = engine.message_stats(&contact).await?;
            match (listing, cli.json) {
                (Some(listing), true) => println!("{}", serde_json::to_string_pretty(&listing)?),
                (Some(listing), false) => print_stats(&listing),
                (None, true) => println!("{}", serde_json::json!({ "error": "contact_not_found" })),
                (None, false) => eprintln!("No contact found matching '{contact}'."),
            }
        }
    }

    Ok(())
}
