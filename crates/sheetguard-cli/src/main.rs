//! sheetguard CLI - unlock an Excel worksheet and re-protect it

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use sheetguard::prelude::*;

mod console;

use console::{prompt_line, StderrProgress, StdinPasswords};

#[derive(Parser)]
#[command(name = "sheetguard")]
#[command(
    author,
    version,
    about = "Unlock all cells and dropdowns in an Excel sheet, then protect it with a password"
)]
struct Cli {
    /// Input Excel file (.xlsx / .xlsm); prompted for when omitted
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output file path; parent directories are created as needed
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Name of the sheet to unlock and protect (exact, case-sensitive)
    #[arg(short, long)]
    sheet: Option<String>,

    /// Protection password; prompted for (with confirmation) when omitted
    #[arg(short, long)]
    password: Option<String>,

    /// Show a per-cell progress indicator during the unlock pass
    #[arg(long)]
    progress: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let input = match cli.input {
        Some(path) => path,
        None => PathBuf::from(prompt_line("Path to the input Excel file")?),
    };
    let output = match cli.output {
        Some(path) => path,
        None => PathBuf::from(prompt_line("Path to the output Excel file")?),
    };
    let sheet = match cli.sheet {
        Some(name) => name,
        None => prompt_line("Name of the sheet to unlock and protect")?,
    };

    let options = UnlockOptions {
        input,
        output,
        sheet,
        password: cli.password,
    };

    eprintln!("Starting process...");

    let mut progress: Box<dyn ProgressSink> = if cli.progress {
        Box::new(StderrProgress::new())
    } else {
        Box::new(NoProgress)
    };

    let report = unlock_workbook(&options, &mut StdinPasswords, progress.as_mut())
        .with_context(|| {
            format!(
                "Failed to unlock sheet '{}' in '{}'",
                options.sheet,
                options.input.display()
            )
        })?;

    if report.validation_rules == 0 {
        eprintln!("No dropdown settings found.");
    } else {
        eprintln!(
            "Dropdown settings modified: {} of {} list rules rewritten.",
            report.dropdowns_rewritten, report.list_rules
        );
    }

    println!(
        "Unlocked {} cells in sheet '{}' and saved to '{}'.",
        report.cells_unlocked,
        options.sheet,
        options.output.display()
    );

    Ok(())
}
