pub mod clock;
pub mod time;

pub use clock::*;
pub use time::*;
