//! File names and extensions used inside a location.

/// Lock file holding the owning process id.
pub const TDB_LOCK_FILE: &str = "tdb.lock";

/// Marker used as the directory of in-memory locations.
pub const MEM_LOCATION: &str = "--mem--";

/// Extension of metadata (properties) files.
pub const EXT_META: &str = "info";

/// Extension of B+Tree node files.
pub const EXT_BPT_TREE: &str = "idn";

/// Extension of B+Tree record files.
pub const EXT_BPT_RECORDS: &str = "dat";

/// Extension of node data (object) files.
pub const EXT_NODE_DATA: &str = "dat";

/// Extension of journal files.
pub const EXT_JOURNAL: &str = "jrnl";

/// Base name of the journal in a location.
pub const JOURNAL_FILE: &str = "journal";

/// Suffix of temporary files written before an atomic rename.
pub const EXT_TEMP: &str = "tmp";

/// Returns `basename.ext`, or `basename` if `ext` is empty.
#[must_use]
pub fn with_ext(basename: &str, ext: &str) -> String {
    if ext.is_empty() {
        basename.to_string()
    } else {
        format!("{basename}.{ext}")
    }
}

/// Returns true if the file name is a journal file.
#[must_use]
pub fn is_journal(filename: &str) -> bool {
    filename.ends_with(&format!(".{EXT_JOURNAL}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_with_extensions() {
        assert_eq!(with_ext("SPO", EXT_BPT_TREE), "SPO.idn");
        assert_eq!(with_ext("nodes", ""), "nodes");
        assert!(is_journal(&with_ext(JOURNAL_FILE, EXT_JOURNAL)));
        assert!(!is_journal("nodes.dat"));
    }
}
