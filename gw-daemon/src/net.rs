//! Network config loading.

use std::path::{Path, PathBuf};

use gw_core::ConfigPool;
use gw_types::{NetConfig, WireError};

use crate::config::NetConfigPaths;

/// Network config errors.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// Template could not be copied into place.
    #[error("failed to copy template {template} to {path}: {source}")]
    Bootstrap {
        /// Template path.
        template: PathBuf,
        /// Destination path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Config could not be read.
    #[error("failed to read net config {path}: {source}")]
    Read {
        /// Config path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Config is not valid JSON of the expected shape.
    #[error("failed to parse net config {path}: {source}")]
    Parse {
        /// Config path.
        path: PathBuf,
        /// Underlying decode error.
        source: WireError,
    },
}

/// Copy the template into place if the config does not exist yet.
///
/// Returns `true` if a copy was made.
pub fn bootstrap(paths: &NetConfigPaths) -> Result<bool, NetError> {
    let Some(template) = paths.template.as_deref() else {
        return Ok(false);
    };
    if paths.path.exists() || !template.exists() {
        return Ok(false);
    }

    let copy = || -> std::io::Result<()> {
        if let Some(parent) = paths.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(template, &paths.path)?;
        Ok(())
    };
    copy().map_err(|e| NetError::Bootstrap {
        template: template.to_path_buf(),
        path: paths.path.clone(),
        source: e,
    })?;
    Ok(true)
}

/// Read and parse a network config.
pub fn load(path: &Path) -> Result<NetConfig, NetError> {
    let content = std::fs::read_to_string(path).map_err(|e| NetError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    NetConfig::from_json(&content).map_err(|e| NetError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Build the configuration pool, falling back to an empty one.
pub fn load_pool(paths: &NetConfigPaths) -> ConfigPool {
    match bootstrap(paths) {
        Ok(true) => tracing::info!("Net config created from template at {}", paths.path.display()),
        Ok(false) => {}
        Err(e) => tracing::warn!("{}", e),
    }

    match load(&paths.path) {
        Ok(config) => {
            for (key, reason) in &config.rejected_nodes {
                tracing::warn!("Net config node {} skipped: {}", key, reason);
            }
            for (key, entry) in &config.nodes {
                if let Some(profile) = entry.provisioning.as_ref().filter(|p| !p.is_complete()) {
                    tracing::warn!(
                        "Net config node {} has an incomplete provisioning profile (missing {})",
                        key,
                        profile.missing_fields().join(", ")
                    );
                }
            }
            let pool = ConfigPool::from_net_config(&config);
            tracing::info!(
                "Loaded {} pool entries ({} placeholders) from {}",
                pool.len(),
                pool.placeholders_remaining(),
                paths.path.display()
            );
            pool
        }
        Err(e) => {
            tracing::error!("{}; starting with an empty pool", e);
            ConfigPool::default()
        }
    }
}
