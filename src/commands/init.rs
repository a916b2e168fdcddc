//! Init command implementation

use crate::config::Config;
use crate::db::LinesDb;
use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

/// What `init` created
#[derive(Debug, Clone, Serialize)]
pub struct InitOutcome {
    pub config_path: PathBuf,
    pub db_path: PathBuf,
    pub sections_path: PathBuf,
    pub sections_template_written: bool,
}

/// Write the default configuration, create the database and, when missing,
/// an empty section catalog to fill in
pub async fn cmd_init(base_dir: Option<PathBuf>, force: bool) -> Result<InitOutcome> {
    let mut config = Config::default();
    config.init_paths(base_dir);

    if config.paths.config_file.exists() && !force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite.",
            config.paths.config_file.display()
        )));
    }

    config.save()?;

    let db = LinesDb::new(&config.paths.db_file).await?;
    db.close().await;
    info!("Database ready at {:?}", config.paths.db_file);

    let sections_path = config.sections_path();
    let sections_template_written = !sections_path.exists();
    if sections_template_written {
        let template = serde_json::to_string_pretty(&json!({ "sections": [] }))?;
        std::fs::write(&sections_path, template)?;
        info!("Wrote empty section catalog to {:?}", sections_path);
    }

    Ok(InitOutcome {
        config_path: config.paths.config_file,
        db_path: config.paths.db_file,
        sections_path,
        sections_template_written,
    })
}

pub fn print_init(outcome: &InitOutcome) {
    println!("✓ fulllines initialized successfully");
    println!("  Config: {}", outcome.config_path.display());
    println!("  Database: {}", outcome.db_path.display());
    println!("  Sections: {}", outcome.sections_path.display());
    println!("\nNext steps:");
    if outcome.sections_template_written {
        println!("  1. List the sections to extract in the sections file");
    } else {
        println!("  1. Review the sections file");
    }
    println!("  2. Check the remote service: fulllines check");
    println!("  3. Extract: fulllines extract (add --resume to continue a previous run)");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_creates_config_db_and_catalog() {
        let tmp = TempDir::new().unwrap();
        let outcome = cmd_init(Some(tmp.path().to_path_buf()), false)
            .await
            .unwrap();

        assert!(outcome.config_path.exists());
        assert!(outcome.db_path.exists());
        assert!(outcome.sections_template_written);

        let content = std::fs::read_to_string(&outcome.sections_path).unwrap();
        let sections = crate::catalog::Catalog::parse_sections(&content).unwrap();
        assert!(sections.is_empty());

        let config = Config::load(&outcome.config_path).unwrap();
        assert_eq!(config.fetch.max_consecutive_failures, 3);
    }

    #[tokio::test]
    async fn test_init_refuses_to_overwrite_without_force() {
        let tmp = TempDir::new().unwrap();
        let base = Some(tmp.path().to_path_buf());
        cmd_init(base.clone(), false).await.unwrap();

        assert!(matches!(
            cmd_init(base.clone(), false).await,
            Err(Error::Config(_))
        ));

        let outcome = cmd_init(base, true).await.unwrap();
        assert!(!outcome.sections_template_written);
    }
}
