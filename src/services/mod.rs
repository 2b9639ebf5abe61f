pub mod blob;
pub mod host;

pub use blob::*;
pub use host::*;
