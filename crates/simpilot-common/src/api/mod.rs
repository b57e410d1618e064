pub mod apps;
pub mod notification;
pub mod simulator;

pub use apps::*;
pub use notification::*;
pub use simulator::*;
