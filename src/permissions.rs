use std::path::PathBuf;

/// Access a recording needs from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    WriteStorage,
    RecordAudio,
    Camera,
}

/// All three must be granted before capture proceeds
pub const REQUIRED_PERMISSIONS: [Permission; 3] = [
    Permission::WriteStorage,
    Permission::RecordAudio,
    Permission::Camera,
];

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Permission::WriteStorage => write!(f, "storage"),
            Permission::RecordAudio => write!(f, "microphone"),
            Permission::Camera => write!(f, "camera"),
        }
    }
}

/// Permission status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PermissionStatus {
    /// Permission granted
    Granted,
    /// Permission denied
    Denied,
    /// Permission not determined (user hasn't been asked yet)
    NotDetermined,
    /// Permission restricted (parental controls, etc)
    Restricted,
}

impl std::fmt::Display for PermissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionStatus::Granted => write!(f, "granted"),
            PermissionStatus::Denied => write!(f, "denied"),
            PermissionStatus::NotDetermined => write!(f, "not_determined"),
            PermissionStatus::Restricted => write!(f, "restricted"),
        }
    }
}

/// Detailed permission information
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PermissionInfo {
    pub permission: Permission,
    pub status: PermissionStatus,
    pub message: String,
    pub can_request: bool,
}

/// Source of permission state. The host answers `request` asynchronously by
/// calling `RecordingController::on_permissions_result`.
pub trait PermissionProvider: Send + Sync {
    fn check(&self, permission: Permission) -> PermissionInfo;

    /// Ask the user for `permissions` together
    fn request(&self, permissions: &[Permission]);
}

/// Required permissions that are not currently granted
pub fn missing_permissions(provider: &dyn PermissionProvider) -> Vec<Permission> {
    REQUIRED_PERMISSIONS
        .iter()
        .copied()
        .filter(|p| provider.check(*p).status != PermissionStatus::Granted)
        .collect()
}

/// Permission checks against the local machine
pub struct SystemPermissions {
    output_directory: PathBuf,
}

impl SystemPermissions {
    pub fn new(output_directory: impl Into<PathBuf>) -> Self {
        Self {
            output_directory: output_directory.into(),
        }
    }
}

impl PermissionProvider for SystemPermissions {
    fn check(&self, permission: Permission) -> PermissionInfo {
        match permission {
            Permission::Camera => check_camera(),
            Permission::RecordAudio => check_microphone(),
            Permission::WriteStorage => check_storage(&self.output_directory),
        }
    }

    fn request(&self, permissions: &[Permission]) {
        // Desktop platforms have no runtime prompt; explain what to change instead.
        for p in permissions {
            let info = self.check(*p);
            if info.status != PermissionStatus::Granted {
                log::warn!("{} access not granted: {}", p, info.message);
            }
        }
    }
}

fn check_storage(dir: &std::path::Path) -> PermissionInfo {
    // Walk up to the nearest existing ancestor; that is where a create would happen.
    let existing = dir.ancestors().find(|p| p.exists());
    let (status, message) = match existing.map(std::fs::metadata) {
        Some(Ok(meta)) if meta.is_dir() && !meta.permissions().readonly() => (
            PermissionStatus::Granted,
            format!("{} is writable", dir.display()),
        ),
        Some(Ok(_)) => (
            PermissionStatus::Denied,
            format!("{} is read-only or not a directory", dir.display()),
        ),
        Some(Err(e)) => (
            PermissionStatus::Denied,
            format!("Cannot access {}: {}", dir.display(), e),
        ),
        None => (
            PermissionStatus::NotDetermined,
            format!("No existing ancestor for {}", dir.display()),
        ),
    };
    PermissionInfo {
        permission: Permission::WriteStorage,
        can_request: status != PermissionStatus::Granted,
        status,
        message,
    }
}

#[cfg(target_os = "linux")]
fn check_camera() -> PermissionInfo {
    use std::path::Path;

    let video_devices: Vec<_> = (0..10)
        .map(|i| format!("/dev/video{}", i))
        .filter(|path| Path::new(path).exists())
        .collect();

    let Some(first_device) = video_devices.first() else {
        return PermissionInfo {
            permission: Permission::Camera,
            status: PermissionStatus::NotDetermined,
            message: "No video devices found at /dev/video*".to_string(),
            can_request: false,
        };
    };

    if in_linux_group(&["video", "plugdev"]) {
        PermissionInfo {
            permission: Permission::Camera,
            status: PermissionStatus::Granted,
            message: format!("Camera access granted (user in video group, {} found)", first_device),
            can_request: false,
        }
    } else {
        PermissionInfo {
            permission: Permission::Camera,
            status: PermissionStatus::Denied,
            message: format!(
                "Camera device {} exists but user not in video group - run: sudo usermod -a -G video $USER",
                first_device
            ),
            can_request: true,
        }
    }
}

#[cfg(target_os = "linux")]
fn check_microphone() -> PermissionInfo {
    if !std::path::Path::new("/dev/snd").exists() {
        return PermissionInfo {
            permission: Permission::RecordAudio,
            status: PermissionStatus::NotDetermined,
            message: "No sound devices found at /dev/snd".to_string(),
            can_request: false,
        };
    }

    // PipeWire/PulseAudio sessions grant access through logind; group membership
    // only matters on bare ALSA setups.
    let status = if in_linux_group(&["audio"]) || std::env::var_os("XDG_RUNTIME_DIR").is_some() {
        PermissionStatus::Granted
    } else {
        PermissionStatus::Denied
    };
    PermissionInfo {
        permission: Permission::RecordAudio,
        message: match status {
            PermissionStatus::Granted => "Microphone access available".to_string(),
            _ => "Not in audio group - run: sudo usermod -a -G audio $USER".to_string(),
        },
        can_request: status != PermissionStatus::Granted,
        status,
    }
}

#[cfg(target_os = "linux")]
fn in_linux_group(groups: &[&str]) -> bool {
    use std::process::Command;

    let output = Command::new("groups").output().ok();
    if let Some(output) = output {
        if let Ok(listed) = String::from_utf8(output.stdout) {
            return listed
                .split_whitespace()
                .any(|g| groups.contains(&g));
        }
    }
    false
}

#[cfg(not(target_os = "linux"))]
fn check_camera() -> PermissionInfo {
    // Windows and macOS gate camera access in system privacy settings, which
    // prompt on first open; enumerating devices is the closest proxy.
    use nokhwa::query;

    match query(nokhwa::utils::ApiBackend::Auto) {
        Ok(devices) if !devices.is_empty() => PermissionInfo {
            permission: Permission::Camera,
            status: PermissionStatus::Granted,
            message: "Camera access granted via system privacy settings".to_string(),
            can_request: false,
        },
        Ok(_) => PermissionInfo {
            permission: Permission::Camera,
            status: PermissionStatus::NotDetermined,
            message: "No cameras found - permission may not be granted".to_string(),
            can_request: true,
        },
        Err(e) => PermissionInfo {
            permission: Permission::Camera,
            status: PermissionStatus::Denied,
            message: format!("Camera access denied: {}", e),
            can_request: true,
        },
    }
}

#[cfg(not(target_os = "linux"))]
fn check_microphone() -> PermissionInfo {
    PermissionInfo {
        permission: Permission::RecordAudio,
        status: PermissionStatus::NotDetermined,
        message: "Microphone access is prompted by the OS on first use".to_string(),
        can_request: true,
    }
}
