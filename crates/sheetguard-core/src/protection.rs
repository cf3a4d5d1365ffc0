//! Worksheet protection state and the legacy Excel password hash

/// Worksheet protection settings
///
/// Models the `sheetProtection` element of SpreadsheetML: a protected flag, an
/// optional legacy password hash, and the two selection permissions Excel
/// turns on by default when protecting a sheet. Other permission attributes
/// on a pre-existing element are preserved verbatim by the XLSX patch layer
/// rather than modeled here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetProtection {
    /// Sheet protection is enforced
    pub enabled: bool,
    /// Legacy 16-bit password hash, rendered as 4 hex digits in the file
    pub password_hash: Option<u16>,
    /// Allow selecting locked cells while protected
    pub select_locked_cells: bool,
    /// Allow selecting unlocked cells while protected
    pub select_unlocked_cells: bool,
}

impl Default for SheetProtection {
    fn default() -> Self {
        Self {
            enabled: false,
            password_hash: None,
            select_locked_cells: true,
            select_unlocked_cells: true,
        }
    }
}

impl SheetProtection {
    /// Enabled protection gated by `password`
    pub fn with_password(password: &str) -> Self {
        Self {
            enabled: true,
            password_hash: Some(hash_legacy_password(password)),
            ..Self::default()
        }
    }

    /// The password hash in the 4-hex-digit form stored in the file
    pub fn password_hex(&self) -> Option<String> {
        self.password_hash.map(|h| format!("{:04X}", h))
    }
}

/// Hash a password using Excel's legacy worksheet protection algorithm.
///
/// Produces the 16-bit value stored in `sheetProtection password="...."`.
/// The algorithm is a rotate-and-XOR scheme and is **not** cryptographically
/// secure; it gates UI editing, nothing more.
#[must_use]
pub fn hash_legacy_password(password: &str) -> u16 {
    let mut hash: u16 = 0;
    let mut len: u16 = 0;

    // Excel truncates legacy passwords to 15 characters.
    for (i, ch) in password.encode_utf16().take(15).enumerate() {
        len = len.saturating_add(1);
        let shift = (i + 1) as u32;
        // Rotate within 15 bits.
        let rotated =
            (((ch as u32) << shift) & 0x7FFF) | ((ch as u32) >> (15u32.saturating_sub(shift)));
        hash ^= rotated as u16;
    }

    hash ^= len;
    hash ^= 0xCE4B;
    hash
}

/// Check a password against a stored legacy hash
#[must_use]
pub fn verify_legacy_password(password: &str, hash: u16) -> bool {
    hash_legacy_password(password) == hash
}
