pub mod alignment;
pub mod session;
pub mod unit;

pub use alignment::*;
pub use session::*;
pub use unit::*;
