//! Snapshot one media server into a zip archive
//!
//! Usage: CDS_LOCATION=http://192.168.1.20:8200/rootDesc.xml \
//!        cargo run --example export_server
//!
//! Ctrl+C cancels the export; the partial archive is still closed and readable.

use std::sync::Arc;
use std::time::Instant;

use cds_extract::{
    Config, Event, ExportOutcome, Exporter, MediaServer, archive_file_name, http_client,
    join_with_shutdown,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let location = std::env::var("CDS_LOCATION").expect("Set CDS_LOCATION to a device description URL");
    let output_dir = std::env::var("CDS_OUTPUT_DIR").unwrap_or_else(|_| "exports".to_string());
    let chunk_size: u32 = std::env::var("CDS_CHUNK_SIZE")
        .ok()
        .and_then(|c| c.parse().ok())
        .unwrap_or(10);

    let mut config = Config::default();
    config.export.chunk_size = chunk_size;

    let client = http_client(&config.http)?;
    let server = MediaServer::connect(&client, &location).await?;

    std::fs::create_dir_all(&output_dir)?;
    let archive = std::path::Path::new(&output_dir).join(archive_file_name(server.label()));

    println!("═══════════════════════════════════════════════════════════");
    println!("  Device:  {}", server.label());
    println!("  UDN:     {}", server.udn());
    println!("  Archive: {}", archive.display());
    println!("═══════════════════════════════════════════════════════════");

    let exporter = Exporter::new(config)?;
    let mut events = exporter.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::Progress {
                    visited,
                    discovered,
                } => {
                    print!("\r  {}/{} containers", visited, discovered);
                }
                Event::ContainerFailed {
                    container_id,
                    error,
                } => {
                    println!("\n  ! {}: {}", container_id, error);
                }
                Event::EntrySkipped { path, error } => {
                    println!("\n  ! skipped {}: {}", path, error);
                }
                _ => {}
            }
        }
    });

    let start = Instant::now();
    let handle = exporter.spawn(Arc::new(server), archive)?;
    let report = join_with_shutdown(handle).await?;

    println!();
    println!("═══════════════════════════════════════════════════════════");
    match report.outcome {
        ExportOutcome::Completed => println!("  Completed in {:.1?}", start.elapsed()),
        ExportOutcome::Cancelled => println!("  Cancelled after {:.1?}", start.elapsed()),
    }
    println!(
        "  Containers: {}/{}",
        report.containers_visited, report.containers_discovered
    );
    println!("  Pages:      {}", report.pages_archived);
    println!("  Entries:    {}", report.entries_written);
    println!("  Failures:   {}", report.failures.len());
    println!("═══════════════════════════════════════════════════════════");

    Ok(())
}
