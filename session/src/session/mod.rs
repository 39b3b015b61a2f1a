pub mod manager;
pub mod state;
pub mod validation;

pub use manager::*;
pub use state::*;
