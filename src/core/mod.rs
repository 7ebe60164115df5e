pub mod analysis;
pub mod command;
pub mod poll;
pub mod sanitize;
pub mod scrape;
pub mod session;
pub mod storage;

pub use analysis::*;
pub use command::*;
pub use poll::*;
pub use scrape::*;
pub use session::*;
pub use storage::*;
