pub mod history;
pub mod response;

pub use history::*;
pub use response::*;
