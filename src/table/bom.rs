/// UTF-8 byte-order-mark handling for ledger files.
///
/// The ledger contract is "exactly one leading BOM". Files come back from
/// spreadsheet round-trips with zero or several, so the write path always
/// normalizes instead of blindly prepending.
pub const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Removes every leading BOM.
pub fn strip_boms(mut bytes: &[u8]) -> &[u8] {
    while bytes.starts_with(&UTF8_BOM) {
        bytes = &bytes[UTF8_BOM.len()..];
    }
    bytes
}

/// Returns the content with exactly one leading BOM. Idempotent: applying
/// it N times equals applying it once.
pub fn ensure_single_bom(bytes: &[u8]) -> Vec<u8> {
    let body = strip_boms(bytes);
    let mut out = Vec::with_capacity(UTF8_BOM.len() + body.len());
    out.extend_from_slice(&UTF8_BOM);
    out.extend_from_slice(body);
    out
}

/// True when the content starts with a BOM.
pub fn has_bom(bytes: &[u8]) -> bool {
    bytes.starts_with(&UTF8_BOM)
}
