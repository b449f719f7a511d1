use tauri::{AppHandle, Emitter, State};

use crate::{
    models::ScanResult,
    scan::{KioskController, ScanSnapshot},
    settings::KioskSettings,
};

use crate::AppState;

fn controller_from_state(state: &State<'_, AppState>) -> KioskController {
    state.scanner.clone()
}

/// `None` when a scan is already running.
#[tauri::command]
pub async fn perform_scan(state: State<'_, AppState>) -> Result<Option<ScanResult>, String> {
    let controller = controller_from_state(&state);
    Ok(controller.perform_scan().await)
}

#[tauri::command]
pub async fn reset_scan(state: State<'_, AppState>) -> Result<ScanSnapshot, String> {
    let controller = controller_from_state(&state);
    controller.reset().await;
    Ok(controller.snapshot().await)
}

#[tauri::command]
pub async fn get_scan_state(state: State<'_, AppState>) -> Result<ScanSnapshot, String> {
    let controller = controller_from_state(&state);
    Ok(controller.snapshot().await)
}

#[tauri::command]
pub async fn get_scan_history(state: State<'_, AppState>) -> Result<Vec<ScanResult>, String> {
    let controller = controller_from_state(&state);
    Ok(controller.history().await)
}

#[tauri::command]
pub fn get_kiosk_settings(state: State<'_, AppState>) -> Result<KioskSettings, String> {
    Ok(state.settings.kiosk())
}

/// Persists new kiosk settings. The camera and recognizer pick them up on the
/// next launch.
#[tauri::command]
pub fn update_kiosk_settings(
    settings: KioskSettings,
    state: State<'_, AppState>,
    app_handle: AppHandle,
) -> Result<(), String> {
    state
        .settings
        .update(settings.clone())
        .map_err(|e| e.to_string())?;

    app_handle
        .emit("kiosk-settings-updated", &settings)
        .map_err(|e| e.to_string())?;

    Ok(())
}
