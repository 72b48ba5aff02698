//! Sources of candidate files
//!
//! - [`LocalFileSource`] reads the watched directory on this machine
//! - [`RemoteFileSource`] lists and downloads files through a command
//!   execution proxy on another host

mod local;
mod remote;
mod traits;

pub use local::LocalFileSource;
pub use remote::RemoteFileSource;
pub use traits::FileSource;
