#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists; it must be read before configuration.
    if let Err(e) = dotenvy::dotenv() {
        // Only warn if the error is NOT "file not found"
        if !e.not_found() {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    vigil::cli::run_cli().await
}
