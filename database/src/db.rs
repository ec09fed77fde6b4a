use rocksdb::{DBWithThreadMode, MultiThreaded};
use std::path::PathBuf;
use std::sync::Arc;

/// The DB type used for Norn stores
pub type DB = DBWithThreadMode<MultiThreaded>;

/// Opens (and creates if missing) a DB at the given directory
pub fn open_db(db_dir: PathBuf, parallelism: usize) -> Arc<DB> {
    let mut options = rocksdb::Options::default();
    options.create_if_missing(true);
    options.increase_parallelism(parallelism as i32);
    let db = DB::open(&options, db_dir.to_str().unwrap()).unwrap();
    Arc::new(db)
}

/// Deletes an existing DB if it exists
pub fn delete_db(db_dir: PathBuf) {
    if !db_dir.exists() {
        return;
    }
    let options = rocksdb::Options::default();
    let path = db_dir.to_str().unwrap();
    DB::destroy(&options, path).expect("DB is expected to be deletable");
}
