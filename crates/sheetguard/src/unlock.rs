//! The unlock operation: one worksheet unlocked, dropdowns resolved, sheet
//! protection re-applied, written to a fresh output file.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::PathBuf;

use tempfile::TempDir;
use thiserror::Error;

use sheetguard_core::SheetProtection;
use sheetguard_xlsx::{
    apply_protection, apply_unlock, scan, Stylesheet, WorkbookMeta, XlsxError, XlsxPackage,
    STYLES_CONTENT_TYPE, STYLES_PART, STYLES_REL_TYPE,
};

use crate::password::{confirm_password, PasswordSource};
use crate::progress::ProgressSink;

/// Result type alias using [`UnlockError`]
pub type Result<T> = std::result::Result<T, UnlockError>;

/// Errors the unlock operation can surface
#[derive(Debug, Error)]
pub enum UnlockError {
    /// Input file does not exist
    #[error("Input file not found: {0}")]
    NotFound(PathBuf),

    /// Input is not a readable spreadsheet container
    #[error("Not a valid spreadsheet: {0}")]
    InvalidFormat(String),

    /// Requested worksheet is absent from the workbook
    #[error("Sheet not found in workbook: {0}")]
    SheetNotFound(String),

    /// Interactive password confirmation exhausted its retries
    #[error("Password confirmation failed after 3 attempts")]
    PasswordConfirmationFailed,

    /// Output file could not be written due to access rights
    #[error("Permission denied writing {0}")]
    PermissionDenied(PathBuf),

    /// Directory creation, file copy, or other I/O failure
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<XlsxError> for UnlockError {
    fn from(e: XlsxError) -> Self {
        match e {
            XlsxError::Io(err) => UnlockError::Io(err),
            other => UnlockError::InvalidFormat(other.to_string()),
        }
    }
}

/// Inputs of the unlock operation
#[derive(Debug, Clone)]
pub struct UnlockOptions {
    /// Path of the workbook to read (never modified)
    pub input: PathBuf,
    /// Path to write the transformed workbook to
    pub output: PathBuf,
    /// Exact, case-sensitive worksheet name
    pub sheet: String,
    /// Protection password; collected interactively when `None`
    pub password: Option<String>,
}

/// What the operation did
#[derive(Debug, Clone, Default)]
pub struct UnlockReport {
    /// Cells unlocked (existing and materialized) in the used range
    pub cells_unlocked: u64,
    /// List validation formulas resolved to literal range text
    pub dropdowns_rewritten: usize,
    /// List validation rules on the sheet
    pub list_rules: usize,
    /// Data validation rules of any type on the sheet
    pub validation_rules: usize,
    /// Worksheets in the workbook
    pub sheet_count: usize,
}

/// Unlock every cell of one worksheet, resolve defined-name references in
/// its list dropdowns, protect the sheet with a password, and write the
/// result to `options.output`.
///
/// The input file is copied into a scratch directory before anything is
/// loaded; the scratch directory is removed on every exit path. No output is
/// written on failure.
pub fn unlock_workbook(
    options: &UnlockOptions,
    passwords: &mut dyn PasswordSource,
    progress: &mut dyn ProgressSink,
) -> Result<UnlockReport> {
    // Input validation comes before any scratch resource is created.
    if !options.input.is_file() {
        return Err(UnlockError::NotFound(options.input.clone()));
    }

    if let Some(parent) = options.output.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            fs::create_dir_all(parent)?;
        }
    }

    // Work on a scratch copy so the input survives a failure mid-transform.
    let scratch = TempDir::new()?;
    let file_name = options
        .input
        .file_name()
        .unwrap_or_else(|| OsStr::new("workbook.xlsx"));
    let scratch_file = scratch.path().join(file_name);
    fs::copy(&options.input, &scratch_file)?;

    let mut package = XlsxPackage::read_file(&scratch_file)?;
    let meta = WorkbookMeta::parse(&package)?;

    let sheet_part = meta
        .sheet_part(&options.sheet)
        .ok_or_else(|| UnlockError::SheetNotFound(options.sheet.clone()))?
        .to_string();
    let sheet_xml = package
        .part(&sheet_part)
        .ok_or_else(|| XlsxError::MissingPart(sheet_part.clone()))?
        .to_vec();

    let facts = scan(&sheet_xml)?;
    log::debug!(
        "sheet '{}': used range {:?}, {} cell formats, {} validation rules",
        options.sheet,
        facts.used_range.map(|r| r.to_a1_string()),
        facts.style_ids.len(),
        facts.validation_rules
    );

    let mut styles = Stylesheet::parse(package.part(STYLES_PART))?;
    let remap = styles.build_remap(&facts.style_ids);

    let total = facts.used_range.map(|r| r.cell_count()).unwrap_or(0);
    progress.begin(total);
    let (sheet_xml, stats) = apply_unlock(
        &sheet_xml,
        &remap,
        meta.defined_names(),
        facts.used_range,
        &mut |done, total| progress.advance(done, total),
    )?;
    progress.finish();

    if facts.validation_rules == 0 {
        log::info!("no data validation rules on sheet '{}'", options.sheet);
    } else {
        log::info!(
            "rewrote {} of {} list dropdowns on sheet '{}'",
            stats.dropdowns_rewritten,
            facts.list_rules,
            options.sheet
        );
    }

    // Password collection happens after the transform work, matching the
    // interactive flow; failure here aborts with nothing written.
    let password = match &options.password {
        Some(p) => p.clone(),
        None => confirm_password(passwords)?,
    };
    let protection = SheetProtection::with_password(&password);
    let sheet_xml = apply_protection(&sheet_xml, &protection)?;

    package.set_part(sheet_part, sheet_xml);
    if styles.is_dirty() || styles.is_synthesized() {
        package.set_part(STYLES_PART, styles.render()?);
        if styles.is_synthesized() {
            package.ensure_content_types_override("/xl/styles.xml", STYLES_CONTENT_TYPE)?;
            package.ensure_workbook_rels_relationship(STYLES_REL_TYPE, "styles.xml")?;
        }
    }

    package.write_file(&options.output).map_err(|e| match e {
        XlsxError::Io(err) if err.kind() == io::ErrorKind::PermissionDenied => {
            UnlockError::PermissionDenied(options.output.clone())
        }
        other => other.into(),
    })?;

    // Explicit close on success surfaces cleanup errors; Drop covers every
    // failure path above.
    scratch.close()?;

    Ok(UnlockReport {
        cells_unlocked: stats.cells_visited,
        dropdowns_rewritten: stats.dropdowns_rewritten,
        list_rules: facts.list_rules,
        validation_rules: facts.validation_rules,
        sheet_count: meta.sheet_count(),
    })
}
