//! # sheetguard-core
//!
//! Core types for the sheetguard workbook unlocker:
//! - [`CellAddress`] and [`CellRange`] - A1-style addressing and used-range math
//! - [`SheetProtection`] - worksheet protection state and the legacy password hash
//!
//! This crate does no I/O; the XLSX container work lives in `sheetguard-xlsx`.

pub mod error;
pub mod protection;
pub mod range;

pub use error::{Error, Result};
pub use protection::{hash_legacy_password, verify_legacy_password, SheetProtection};
pub use range::{CellAddress, CellRange};

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit)
pub const MAX_COLS: u16 = 16_384;
