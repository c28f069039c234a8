pub mod actions;
pub mod backend;
pub mod dispatcher;
pub mod resolver;
