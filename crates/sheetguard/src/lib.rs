//! # sheetguard
//!
//! Unlock all cells and dropdowns in one worksheet of an Excel workbook and
//! re-apply sheet password protection.
//!
//! The operation works on a scratch copy of the input, rewrites only the
//! target worksheet and the stylesheet inside the container, and writes the
//! result to a new file; every other part (other sheets, macros, themes)
//! round-trips byte-for-byte.
//!
//! ## Example
//!
//! ```no_run
//! use sheetguard::prelude::*;
//!
//! let options = UnlockOptions {
//!     input: "report.xlsx".into(),
//!     output: "out/report-unlocked.xlsx".into(),
//!     sheet: "Data".into(),
//!     password: Some("secret".into()),
//! };
//!
//! let report = unlock_workbook(&options, &mut NeverPrompt, &mut NoProgress).unwrap();
//! println!("unlocked {} cells", report.cells_unlocked);
//! ```

pub mod password;
pub mod progress;
pub mod unlock;

pub mod prelude;

pub use password::{confirm_password, PasswordSource, PASSWORD_ATTEMPTS};
pub use progress::{NoProgress, ProgressSink};
pub use unlock::{unlock_workbook, UnlockError, UnlockOptions, UnlockReport};

// Re-export the pieces callers commonly need from the lower layers
pub use sheetguard_core::{hash_legacy_password, CellAddress, CellRange, SheetProtection};
pub use sheetguard_xlsx::{XlsxError, XlsxPackage, UNLOCKED_STYLE_NAME};

use std::io;

/// Password source for fully non-interactive callers: any prompt is an error.
/// Use it when [`UnlockOptions::password`] is always supplied.
#[derive(Debug, Default)]
pub struct NeverPrompt;

impl PasswordSource for NeverPrompt {
    fn read_password(&mut self, _prompt: &str) -> io::Result<String> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "no interactive password source available",
        ))
    }
}
