//! Common test utilities for cds-extract integration tests

#[allow(dead_code)]
pub mod assertions;
#[allow(dead_code)]
pub mod fixtures;
#[allow(dead_code)]
pub mod server;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use server::*;

use cds_extract::{Config, Exporter, MediaServer, http_client};

/// Connect to a fake media server the way an application would
pub async fn connect(server: &FakeMediaServer) -> MediaServer {
    let client = http_client(&Config::default().http).unwrap();
    MediaServer::connect(&client, &server.location())
        .await
        .unwrap()
}

/// Exporter with default configuration
pub fn exporter() -> Exporter {
    Exporter::new(Config::default()).unwrap()
}
