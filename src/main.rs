#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = examscan_rust::run().await {
        eprintln!("examscan-rust fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
