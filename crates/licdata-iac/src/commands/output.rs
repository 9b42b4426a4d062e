use colored::Colorize;
use licdata_iac_core::{keys, Event};
use std::io::Write;

/// Emitted events go to stdout as JSON lines, progress goes to stderr
#[derive(Default)]
pub struct Output {
    emitted: usize,
    failures: usize,
}

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, event: &Event) -> anyhow::Result<()> {
        let line = event.to_json_line()?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", line)?;
        stdout.flush()?;

        self.emitted += 1;
        if event.kind().is_failure() {
            self.failures += 1;
            let retry = match event.metadata_value(keys::RETRYABLE) {
                Some("true") => " (retryable)",
                _ => "",
            };
            eprintln!(
                "  {} {}{}: {}",
                "✗".red(),
                event.kind().as_str().red().bold(),
                retry,
                event.metadata_value(keys::ERROR).unwrap_or("unknown error")
            );
        } else {
            eprintln!("  {} {}", "✓".green(), event.kind().as_str().green());
        }
        Ok(())
    }

    pub fn emit_all(&mut self, events: &[Event]) -> anyhow::Result<()> {
        for event in events {
            self.emit(event)?;
        }
        Ok(())
    }

    /// Prints the summary; true when any failure event was emitted
    pub fn finish(&self) -> bool {
        if self.failures > 0 {
            eprintln!(
                "{}",
                format!("{} of {} events report a failure", self.failures, self.emitted)
                    .red()
                    .bold()
            );
            true
        } else {
            eprintln!("{}", format!("{} events emitted", self.emitted).green());
            false
        }
    }
}
