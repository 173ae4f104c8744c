use archive_query::engine_from_env;
use archive_query::mcp::run_mcp_server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // The archive is required; fail early if it is missing.
    let engine = engine_from_env()
        .map_err(|e| format!("{e}. Set ARCHIVE_QUERY_DB to the exported archive database."))?;

    run_mcp_server(engine).await
}
