use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Registry sets exactly one of `teams` / `file`
/// - Inline registry is not empty
/// - Manifest file name is a bare, non-empty file name
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    match (&config.registry.teams, &config.registry.file) {
        (Some(_), Some(_)) => {
            return Err(ConfigError::ValidationError(
                "registry.teams and registry.file are mutually exclusive".to_string(),
            ))
        }
        (None, None) => {
            return Err(ConfigError::ValidationError(
                "registry.teams or registry.file must be set".to_string(),
            ))
        }
        (Some(teams), None) if teams.is_empty() => {
            return Err(ConfigError::ValidationError(
                "registry.teams cannot be empty".to_string(),
            ))
        }
        _ => {}
    }

    let manifest_file = config.dataset.manifest_file.as_str();
    if manifest_file.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "dataset.manifest_file cannot be empty".to_string(),
        ));
    }
    if manifest_file.trim() != manifest_file {
        return Err(ConfigError::ValidationError(format!(
            "dataset.manifest_file has leading or trailing whitespace: {:?}",
            manifest_file
        )));
    }
    if manifest_file == "." || manifest_file == ".." {
        return Err(ConfigError::ValidationError(format!(
            "dataset.manifest_file must name a file, got {:?}",
            manifest_file
        )));
    }
    if manifest_file.contains('/') || manifest_file.contains('\\') {
        return Err(ConfigError::ValidationError(format!(
            "dataset.manifest_file must be a file name, got {:?}",
            manifest_file
        )));
    }

    Ok(())
}
