//! Remote fetch of work-item folders.
//!
//! Each work item is a folder `<base_path>/<identifier>` on the remote
//! share, copied recursively to `<input_dir>/<identifier>`. Fetching is
//! additive: local content is never deleted.

mod fetcher;
mod mounted;
mod share;
mod smbclient;

pub use fetcher::{FetchOutcome, FetchResult, FetchSummary, RemoteFetcher};
pub use mounted::MountedShare;
pub use share::{join_remote, RemoteEntry, RemoteShare, ShareError, ShareResult};
pub use smbclient::SmbClientShare;
