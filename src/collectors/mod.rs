/// Snapshot fetching from the remote data source
pub mod snapshot_fetcher;

pub use snapshot_fetcher::{Fetcher, HttpSnapshotSource, SnapshotSource};
