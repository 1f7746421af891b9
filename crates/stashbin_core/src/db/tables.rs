//! redb table definitions shared by storage modules.

use redb::TableDefinition;

/// File name for the redb database within the configured DB directory.
pub const REDB_FILE_NAME: &str = "data.redb";

/// Paste rows keyed by paste slug (`PasteRow`, bincode-encoded).
pub const PASTES: TableDefinition<&str, &[u8]> = TableDefinition::new("pastes");
/// File rows keyed by file slug (`File`, bincode-encoded).
pub const FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("files");
/// Removal token -> paste slug.
pub const PASTES_BY_REMOVAL: TableDefinition<&str, &str> =
    TableDefinition::new("pastes_by_removal");
/// Expiry index ordered by expiry millis then paste slug.
pub const PASTES_BY_EXPIRY: TableDefinition<(u64, &str), ()> =
    TableDefinition::new("pastes_by_expiry");
