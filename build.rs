fn main() {
    // Only the desktop shell needs the Tauri context (tauri.conf.json, icons, capabilities).
    #[cfg(feature = "desktop")]
    tauri_build::build();
}
