//! Line-oriented kiosk shell for headless installs.
//!
//! Each input line is one command; output is plain text sized for a small
//! attendant terminal.

use std::fmt::Write as _;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    capture::FrameSource,
    models::ScanResult,
    recognition::Recognizer,
    scan::{ScanController, ScanSnapshot},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Scan,
    Reset,
    History,
    Json,
    Help,
    Quit,
}

impl ConsoleCommand {
    /// Blank input scans, so the attendant can just press Enter.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "" | "scan" | "s" => Some(Self::Scan),
            "reset" | "r" => Some(Self::Reset),
            "history" | "h" => Some(Self::History),
            "json" | "j" => Some(Self::Json),
            "help" | "?" => Some(Self::Help),
            "quit" | "exit" | "q" => Some(Self::Quit),
            _ => None,
        }
    }
}

const HELP: &str = "commands: [Enter]/scan, reset, history, json, help, quit\n";

pub fn render_result(result: &ScanResult) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<10} {}   ({})",
        result.status.headline(),
        result.pair_label(),
        result.status.as_str()
    );
    let _ = writeln!(
        out,
        "  left {:.2}  right {:.2}  {}ms  {}",
        result.left.confidence, result.right.confidence, result.processing_time_ms, result.device
    );
    if !result.notes.is_empty() {
        let _ = writeln!(out, "  note: {}", result.notes);
    }
    out
}

pub fn render_history(history: &[ScanResult]) -> String {
    if history.is_empty() {
        return "no scans yet\n".to_string();
    }

    let mut out = String::new();
    for result in history {
        let _ = writeln!(
            out,
            "{}  {:<7}  {}",
            result.timestamp.format("%H:%M:%S"),
            result.status.as_str(),
            result.history_label()
        );
    }
    out
}

fn render_state(snapshot: &ScanSnapshot) -> String {
    let mut out = String::new();
    if let Some(banner) = &snapshot.camera_error {
        let _ = writeln!(out, "!! camera error: {banner}");
    }
    match &snapshot.current {
        Some(result) => out.push_str(&render_result(result)),
        None => out.push_str("ready\n"),
    }
    out
}

/// Serves commands from `input` until `quit` or end of input.
pub async fn run_console<F, R, I, O>(
    controller: ScanController<F, R>,
    input: I,
    mut output: O,
) -> Result<()>
where
    F: FrameSource,
    R: Recognizer,
    I: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin,
{
    output.write_all(HELP.as_bytes()).await?;
    output.flush().await?;

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let Some(command) = ConsoleCommand::parse(&line) else {
            output
                .write_all(format!("unknown command: {}\n{HELP}", line.trim()).as_bytes())
                .await?;
            output.flush().await?;
            continue;
        };

        let text = match command {
            ConsoleCommand::Scan => match controller.perform_scan().await {
                Some(_) => render_state(&controller.snapshot().await),
                None => "scan already in progress\n".to_string(),
            },
            ConsoleCommand::Reset => {
                controller.reset().await;
                render_state(&controller.snapshot().await)
            }
            ConsoleCommand::History => render_history(&controller.history().await),
            ConsoleCommand::Json => match controller.latest_json().await {
                Some(json) => format!("{json}\n"),
                None => "no scans yet\n".to_string(),
            },
            ConsoleCommand::Help => HELP.to_string(),
            ConsoleCommand::Quit => break,
        };

        output.write_all(text.as_bytes()).await?;
        output.flush().await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        capture::{png_fixture, FrameLimits, StillFileSource},
        models::ScanStatus,
        recognition::SimulatedRecognizer,
        scan::ScanConfig,
    };
    use chrono::Utc;
    use std::time::Duration;

    #[test]
    fn parses_commands_and_aliases() {
        assert_eq!(ConsoleCommand::parse(""), Some(ConsoleCommand::Scan));
        assert_eq!(ConsoleCommand::parse("  SCAN "), Some(ConsoleCommand::Scan));
        assert_eq!(ConsoleCommand::parse("h"), Some(ConsoleCommand::History));
        assert_eq!(ConsoleCommand::parse("exit"), Some(ConsoleCommand::Quit));
        assert_eq!(ConsoleCommand::parse("launch"), None);
    }

    #[test]
    fn failure_renders_check_pair_with_placeholders() {
        let result = ScanResult::failure("kiosk", "connection or timeout error.", 40, Utc::now());
        let text = render_result(&result);
        assert!(text.starts_with("CHECK PAIR"));
        assert!(text.contains("? | ?"));
        assert!(text.contains("note: connection or timeout error."));
    }

    #[test]
    fn history_uses_dash_for_missing_sides() {
        let result = ScanResult::failure("kiosk", "x", 0, Utc::now());
        assert!(render_history(&[result]).contains("ERROR    - | -"));
        assert_eq!(render_history(&[]), "no scans yet\n");
    }

    #[tokio::test]
    async fn scripted_session_scans_and_lists_history() {
        let path = std::env::temp_dir().join(format!("klin-console-{}.png", std::process::id()));
        std::fs::write(&path, png_fixture(200, 100)).expect("fixture should be written");

        let controller = ScanController::new(
            StillFileSource::new(path.clone(), FrameLimits::default()),
            SimulatedRecognizer::new(Duration::ZERO, 0.0, 0.0, 0.0),
            ScanConfig {
                device: "console-test".into(),
                history_cap: 5,
                recognition_timeout: Duration::from_secs(5),
            },
        );

        let input: &[u8] = b"scan\n\nhistory\njson\nquit\nscan\n";
        let mut output = Vec::new();
        run_console(controller.clone(), input, &mut output)
            .await
            .expect("console should run");

        let text = String::from_utf8(output).expect("utf8 output");
        assert_eq!(text.matches("APPROVED").count(), 2);
        assert_eq!(text.matches(" OK ").count(), 2);
        assert!(text.contains("\"device\": \"console-test\""));

        // Nothing after `quit` is served.
        let history = controller.history().await;
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|r| r.status == ScanStatus::Ok));

        let _ = std::fs::remove_file(path);
    }
}
