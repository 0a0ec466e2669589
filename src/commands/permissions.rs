use crate::permissions::{PermissionInfo, PermissionProvider, SystemPermissions, REQUIRED_PERMISSIONS};
use tauri::command;

/// Status of every permission a recording needs
#[command]
pub async fn check_capture_permissions() -> Result<Vec<PermissionInfo>, String> {
    let config = super::config::current_config()?;
    let provider = SystemPermissions::new(&config.storage.output_directory);
    let infos: Vec<PermissionInfo> = REQUIRED_PERMISSIONS
        .iter()
        .map(|p| provider.check(*p))
        .collect();
    for info in &infos {
        log::debug!("{}: {} ({})", info.permission, info.status, info.message);
    }
    Ok(infos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reports_all_required() {
        let infos = check_capture_permissions().await.unwrap();
        assert_eq!(infos.len(), REQUIRED_PERMISSIONS.len());
        for (info, expected) in infos.iter().zip(REQUIRED_PERMISSIONS) {
            assert_eq!(info.permission, expected);
        }
    }
}
