//! Connection check command

use crate::catalog::Catalog;
use crate::config::Config;
use crate::db::LinesDb;
use crate::error::Result;
use crate::extract::{ConnectionReport, Extractor};
use std::sync::Arc;
use tracing::info;

pub async fn cmd_check(
    config: &Config,
    db: &LinesDb,
    catalog: Arc<Catalog>,
) -> Result<ConnectionReport> {
    info!("Checking connection to {}", config.base_url);
    Extractor::from_config(config, db.clone(), catalog)?
        .check_connection()
        .await
}

pub fn print_connection(base_url: &str, report: &ConnectionReport) {
    if report.reachable {
        println!("✓ {} is reachable ({} section(s) probed)", base_url, report.probed);
    } else if report.probed == 0 {
        println!("⚠️  No sections in the catalog to probe");
    } else {
        println!("✗ {} is not reachable", base_url);
    }
    for failure in &report.failures {
        println!("  - {}", failure);
    }
}
