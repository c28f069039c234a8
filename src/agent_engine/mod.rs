pub mod engine;
pub mod history;
pub mod prompt;
pub mod scheduler;
pub mod state;
