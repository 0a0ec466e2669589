use crate::config::ClipCamConfig;
use std::sync::{Arc, RwLock};
use tauri::command;

lazy_static::lazy_static! {
    static ref GLOBAL_CONFIG: Arc<RwLock<ClipCamConfig>> = Arc::new(RwLock::new(ClipCamConfig::load_or_default()));
}

pub(crate) fn current_config() -> Result<ClipCamConfig, String> {
    let config = GLOBAL_CONFIG.read().map_err(|e| e.to_string())?;
    Ok(config.clone())
}

/// Get the current configuration
#[command]
pub async fn get_config() -> Result<ClipCamConfig, String> {
    current_config()
}

/// Update configuration; the next recording picks it up
#[command]
pub async fn update_config(new_config: ClipCamConfig) -> Result<(), String> {
    new_config.validate()?;

    {
        let mut config = GLOBAL_CONFIG.write().map_err(|e| e.to_string())?;
        *config = new_config.clone();
    }

    if let Some(controller) = super::capture::existing_controller().await {
        controller
            .set_config(new_config.clone())
            .map_err(|e| e.to_string())?;
    }

    new_config
        .save_to_file(ClipCamConfig::default_path())
        .map_err(|e| e.to_string())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_config() {
        let config = get_config().await.unwrap();
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_update_rejects_invalid() {
        let mut config = ClipCamConfig::default();
        config.recording.max_duration_secs = 0;
        assert!(update_config(config).await.is_err());
    }
}
