pub mod request;
pub mod time;
pub mod websoc;

pub use request::*;
pub use time::*;
pub use websoc::*;
