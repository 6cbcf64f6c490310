// src/pipeline/validate.rs

use crate::error::{AppError, Result};
use crate::models::Config;
use crate::services;
use crate::utils::log as oplog;

/// Validate the configuration and every backend definition without
/// connecting to anything.
pub fn run_validate(config: &Config) -> Result<()> {
    oplog::header("Validating configuration");

    if let Err(e) = config.validate() {
        log::error!("Config validation failed: {}", e);
        return Err(e);
    }
    log::info!("Catalog: {}", config.catalog.kind);

    let mut failures = 0;
    for def in &config.crawlers {
        let checked = services::validate_definition(&def.backend)
            .and_then(|_| def.schedule.cadence());
        match checked {
            Ok(cadence) => oplog::sub_item(&format!(
                "✓ {} ({}) every {:?}",
                def.name, def.backend.kind, cadence.period
            )),
            Err(e) => {
                failures += 1;
                oplog::sub_item(&format!("✗ {} ({}): {}", def.name, def.backend.kind, e));
            }
        }
    }

    if failures > 0 {
        return Err(AppError::config(format!(
            "{} of {} crawler definitions are invalid",
            failures,
            config.crawlers.len()
        )));
    }
    log::info!("All validations passed!");
    Ok(())
}
