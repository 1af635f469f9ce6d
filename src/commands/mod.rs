//! CLI commands implementation

pub mod books;
pub mod init;
pub mod install;
pub mod read;
pub mod status;
pub mod wipe;

pub use books::*;
pub use init::*;
pub use install::*;
pub use read::*;
pub use status::*;
pub use wipe::*;
