//! Interactive console pieces: line prompts, password entry, progress
//! display. Prompts and progress go to stderr so stdout stays clean.

use std::io::{self, BufRead, Write};

use sheetguard::{PasswordSource, ProgressSink};

/// Ask for one line of input
pub fn prompt_line(label: &str) -> io::Result<String> {
    eprint!("{}: ", label);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(&['\r', '\n'][..]).to_string())
}

/// Password source reading plain lines from stdin.
///
/// Input is echoed; the terminal is not switched out of canonical mode.
pub struct StdinPasswords;

impl PasswordSource for StdinPasswords {
    fn read_password(&mut self, prompt: &str) -> io::Result<String> {
        prompt_line(prompt)
    }

    fn notify_mismatch(&mut self, attempt: usize, max_attempts: usize) {
        eprintln!(
            "Passwords do not match. Please try again. ({}/{})",
            attempt, max_attempts
        );
    }
}

/// Per-cell progress display on stderr, throttled to whole-percent changes
pub struct StderrProgress {
    last_percent: u64,
}

impl StderrProgress {
    pub fn new() -> Self {
        Self {
            last_percent: u64::MAX,
        }
    }
}

impl Default for StderrProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for StderrProgress {
    fn begin(&mut self, total: u64) {
        eprintln!("Unlocking {} cells...", total);
    }

    fn advance(&mut self, done: u64, total: u64) {
        if total == 0 {
            return;
        }
        let percent = done * 100 / total;
        if percent != self.last_percent {
            self.last_percent = percent;
            eprint!("\r{}/{} cells ({}%)", done, total, percent);
            let _ = io::stderr().flush();
        }
    }

    fn finish(&mut self) {
        eprintln!();
    }
}
