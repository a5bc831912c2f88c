pub mod error;
pub mod logging;
pub mod time;

pub use error::{CoreError, ErrorKind};
pub use time::Clock;
