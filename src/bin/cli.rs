use anyhow::{anyhow, bail, Context};
use clipcam::controller::{RecordingController, UiEvent};
use clipcam::permissions::{PermissionProvider, PermissionStatus, SystemPermissions, REQUIRED_PERMISSIONS};
use clipcam::platform::{CameraBackend, DeviceGuard, NativeCameraBackend};
use clipcam::{select_video_size, ClipCamConfig, Resolution};
use std::env;
use std::io::BufRead;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("clipcam=info")).init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: clipcam-cli <command> [args]");
        eprintln!("Commands: check-permissions, list-sizes <device>, select-size <device> <w> <h>, record [device]");
        std::process::exit(1);
    }

    let json = args.iter().any(|a| a == "--json");
    let positional: Vec<&str> = args[2..]
        .iter()
        .filter(|a| !a.starts_with("--"))
        .map(String::as_str)
        .collect();

    match args[1].as_str() {
        "check-permissions" => cmd_check_permissions(json),
        "list-sizes" => cmd_list_sizes(&positional, json),
        "select-size" => cmd_select_size(&positional, json),
        "record" => cmd_record(&positional, json),
        other => {
            eprintln!("Unknown command: {}", other);
            std::process::exit(1);
        }
    }
}

fn cmd_check_permissions(json: bool) -> anyhow::Result<()> {
    let config = ClipCamConfig::load_or_default();
    let provider = SystemPermissions::new(&config.storage.output_directory);
    let infos: Vec<_> = REQUIRED_PERMISSIONS.iter().map(|p| provider.check(*p)).collect();

    if json {
        println!("{}", serde_json::to_string(&infos)?);
    } else {
        for info in &infos {
            println!("{:<10} {:<14} {}", info.permission, info.status, info.message);
        }
    }

    if infos.iter().any(|i| i.status != PermissionStatus::Granted) {
        std::process::exit(2);
    }
    Ok(())
}

/// Preview and video sizes of `device`
fn query_sizes(device_id: &str) -> anyhow::Result<(Vec<Resolution>, Vec<Resolution>)> {
    let backend: &dyn CameraBackend = &NativeCameraBackend;
    let device = DeviceGuard::open(backend, device_id).with_context(|| format!("opening camera {}", device_id))?;
    let sizes = device.with(|d| -> Result<_, clipcam::CameraError> {
        Ok((d.supported_preview_sizes()?, d.supported_video_sizes()?))
    })?;
    Ok(sizes)
}

fn cmd_list_sizes(args: &[&str], json: bool) -> anyhow::Result<()> {
    let device_id = args.first().ok_or_else(|| anyhow!("Usage: clipcam-cli list-sizes <device>"))?;
    let (preview, video) = query_sizes(device_id)?;

    if json {
        println!("{}", serde_json::json!({ "preview": preview, "video": video }));
    } else {
        println!("Preview sizes:");
        for s in &preview {
            println!("  {}", s);
        }
        println!("Video sizes:");
        for s in &video {
            println!("  {}", s);
        }
    }
    Ok(())
}

fn cmd_select_size(args: &[&str], json: bool) -> anyhow::Result<()> {
    let [device_id, width, height] = args else {
        bail!("Usage: clipcam-cli select-size <device> <width> <height>");
    };
    let width: u32 = width.parse().context("width")?;
    let height: u32 = height.parse().context("height")?;

    let (preview, video) = query_sizes(device_id)?;
    let selected = select_video_size(&video, &preview, width, height);

    if json {
        println!("{}", serde_json::to_string(&selected)?);
    } else {
        match selected {
            Some(size) => println!("{}", size),
            None => println!("No supported sizes"),
        }
    }
    Ok(())
}

fn cmd_record(args: &[&str], json: bool) -> anyhow::Result<()> {
    let mut config = ClipCamConfig::load_or_default();
    if let Some(device_id) = args.first() {
        config.camera.device_id = device_id.to_string();
    }
    config.validate().map_err(|e| anyhow!("Invalid config: {}", e))?;

    let (controller, mut events) = RecordingController::with_system_backends(config);

    let on_interrupt = controller.clone();
    ctrlc::set_handler(move || {
        on_interrupt.on_pause();
        std::process::exit(0);
    })
    .context("installing Ctrl-C handler")?;

    std::thread::Builder::new()
        .name("clipcam-ui".to_string())
        .spawn(move || {
            while let Some(event) = events.blocking_recv() {
                print_event(&event, json);
            }
        })?;

    controller.on_resume();
    if !json {
        println!("Press Enter to start or stop recording, Ctrl-C to quit.");
    }

    for line in std::io::stdin().lock().lines() {
        line?;
        controller.capture_action();
    }

    controller.on_pause();
    if let Some(path) = controller.last_output() {
        if !json {
            println!("Last clip: {}", path.display());
        }
    }
    Ok(())
}

fn print_event(event: &UiEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => log::warn!("Failed to serialize event: {}", e),
        }
        return;
    }
    match event {
        UiEvent::Label(label) => println!("[{}]", label.as_str()),
        UiEvent::Enabled(false) => println!("(working...)"),
        UiEvent::Enabled(true) => {}
        UiEvent::Toast(message) => println!("! {}", message),
    }
}
