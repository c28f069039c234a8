pub mod announcer;
pub mod listener;
