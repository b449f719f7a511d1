// Prevents additional console window on Windows in release, DO NOT REMOVE!!
#![cfg_attr(
    all(feature = "desktop", not(debug_assertions)),
    windows_subsystem = "windows"
)]

fn main() {
    klin_checkpoint_lib::run()
}
