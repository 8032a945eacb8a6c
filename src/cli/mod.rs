//! CLI command handling

pub mod interactive;
pub mod output;
pub mod prompt;
pub mod session;

pub use interactive::*;
pub use output::*;
pub use prompt::*;
pub use session::*;
