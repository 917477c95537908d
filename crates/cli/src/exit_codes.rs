//! CLI Exit Code Registry
//!
//! Single source of truth for `sheetmerge` exit codes. Scripts rely on them.
//!
//! | Code | Meaning                                               |
//! |------|-------------------------------------------------------|
//! | 0    | Success                                               |
//! | 1    | General error (unspecified)                           |
//! | 2    | Usage error (bad arguments, missing master/update)    |
//! | 3    | Invalid config (TOML, unknown key or mapped column)   |
//! | 4    | Schema mismatch (no column aligns)                    |
//! | 5    | Cannot read an input document                         |
//! | 6    | Cannot write the merged document or report            |
//! | 7    | Needs review (`--strict` with duplicates, keyless or  |
//! |      | flagged rows); nothing was written                    |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// Config file cannot be parsed, fails validation, or names columns the
/// documents do not have.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// Master and update share no column.
pub const EXIT_SCHEMA_MISMATCH: u8 = 4;

/// An input document cannot be opened or parsed.
pub const EXIT_READ: u8 = 5;

/// An output file cannot be written.
pub const EXIT_WRITE: u8 = 6;

/// `--strict` run found data-quality findings.
pub const EXIT_NEEDS_REVIEW: u8 = 7;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_ERROR,
            EXIT_USAGE,
            EXIT_INVALID_CONFIG,
            EXIT_SCHEMA_MISMATCH,
            EXIT_READ,
            EXIT_WRITE,
            EXIT_NEEDS_REVIEW,
        ];
        let unique: std::collections::HashSet<u8> = codes.iter().copied().collect();
        assert_eq!(unique.len(), codes.len());
    }
}
