//! # sheetguard-xlsx
//!
//! Part-preserving XLSX/XLSM container access and patching for sheetguard.
//!
//! The container is held as a part-name -> bytes map ([`XlsxPackage`]); the
//! unlock transformation rewrites only the target worksheet part and
//! `xl/styles.xml`, so everything else (other sheets, macros, themes, pivot
//! caches) round-trips byte-for-byte.

pub mod error;
pub mod package;
pub mod styles;
pub mod workbook;
pub mod worksheet;

mod xml;

pub use error::{XlsxError, XlsxResult};
pub use package::{XlsxPackage, STYLES_PART, WORKBOOK_PART, WORKBOOK_RELS_PART};
pub use styles::{StyleRemap, Stylesheet, STYLES_CONTENT_TYPE, STYLES_REL_TYPE, UNLOCKED_STYLE_NAME};
pub use workbook::{SheetEntry, WorkbookMeta};
pub use worksheet::{
    apply_protection, apply_unlock, resolve_list_formula, scan, SheetScan, UnlockStats,
};
