pub mod capture;
pub mod console;
pub mod error;
pub mod history;
pub mod models;
pub mod recognition;
pub mod scan;
pub mod settings;
pub mod utils;
pub mod verdict;

use anyhow::Result;
use log::info;

use capture::CameraSource;
use recognition::RecognizerBackend;
use scan::{KioskController, ScanConfig};
use settings::{api_key_from_env, debug_mode_from_env, KioskSettings, SettingsStore};

#[cfg(feature = "desktop")]
pub(crate) struct AppState {
    pub(crate) scanner: KioskController,
    pub(crate) settings: SettingsStore,
}

/// Wires the camera and recognizer named in `settings` to a fresh session.
pub fn build_controller(settings: &KioskSettings) -> Result<KioskController> {
    let frames = CameraSource::from_settings(settings)?;
    let recognizer =
        RecognizerBackend::from_settings(settings, api_key_from_env(), debug_mode_from_env())?;

    info!(
        "Kiosk '{}' reading frames from {} with the {} recognizer",
        settings.device,
        frames.describe(),
        recognizer.name()
    );

    Ok(KioskController::new(
        frames,
        recognizer,
        ScanConfig::from(settings),
    ))
}

fn init_logging() {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}

#[cfg(feature = "desktop")]
pub fn run() {
    use scan::commands::{
        get_kiosk_settings, get_scan_history, get_scan_state, perform_scan, reset_scan,
        update_kiosk_settings,
    };
    use tauri::{Emitter, Manager};

    init_logging();
    info!("KLIN checkpoint starting up...");

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(|app| {
            let result = (|| -> Result<()> {
                let app_data_dir = app
                    .path()
                    .app_data_dir()
                    .map_err(|err| anyhow::anyhow!(err))?;
                std::fs::create_dir_all(&app_data_dir)?;

                let settings_store = SettingsStore::new(app_data_dir.join("settings.json"))?;
                let scanner = build_controller(&settings_store.kiosk())?;

                // Push every state change to the webview.
                let mut updates = scanner.subscribe();
                let app_handle = app.handle().clone();
                tauri::async_runtime::spawn(async move {
                    while updates.changed().await.is_ok() {
                        let snapshot = updates.borrow_and_update().clone();
                        if let Err(err) = app_handle.emit("scan-state-changed", snapshot) {
                            log::warn!("failed to emit scan-state-changed: {err}");
                        }
                    }
                });

                app.manage(AppState {
                    scanner,
                    settings: settings_store,
                });

                Ok(())
            })();

            result.map_err(|err| err.into())
        })
        .invoke_handler(tauri::generate_handler![
            perform_scan,
            reset_scan,
            get_scan_state,
            get_scan_history,
            get_kiosk_settings,
            update_kiosk_settings,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}

/// Headless kiosk: the same controller driven from stdin.
#[cfg(not(feature = "desktop"))]
pub fn run() {
    init_logging();
    info!("KLIN checkpoint starting up (console)...");

    if let Err(err) = run_console_kiosk() {
        log::error!("kiosk stopped: {err:#}");
        std::process::exit(1);
    }
}

#[cfg(not(feature = "desktop"))]
fn run_console_kiosk() -> Result<()> {
    let settings_path = std::env::var_os("KLIN_SETTINGS")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| std::path::PathBuf::from("klin-settings.json"));
    let settings_store = SettingsStore::new(settings_path)?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let scanner = build_controller(&settings_store.kiosk())?;
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        console::run_console(scanner, stdin, tokio::io::stdout()).await
    })
}
