use crate::prelude::{open_db, DB};
use std::sync::Arc;
use tempfile::TempDir;

/// A handle keeping a temporary DB directory alive; dropping it deletes the directory
pub struct DbLifetime {
    _tempdir: TempDir,
}

/// Creates a DB within a temporary directory, for testing and for staging
/// consensus instances which may be discarded wholesale
pub fn create_temp_db() -> (DbLifetime, Arc<DB>) {
    let tempdir = tempfile::tempdir().unwrap();
    let db = open_db(tempdir.path().to_path_buf(), 1);
    (DbLifetime { _tempdir: tempdir }, db)
}
