pub mod conflicts;
pub mod errors;
pub mod models;
pub mod revision;

pub use conflicts::*;
pub use errors::*;
pub use models::*;
pub use revision::*;
