//! Convenience re-exports for typical use.
//!
//! ```no_run
//! use sheetguard::prelude::*;
//! ```

pub use crate::password::{PasswordSource, PASSWORD_ATTEMPTS};
pub use crate::progress::{NoProgress, ProgressSink};
pub use crate::unlock::{unlock_workbook, UnlockError, UnlockOptions, UnlockReport};
pub use crate::NeverPrompt;

pub use sheetguard_core::{CellAddress, CellRange, SheetProtection};
