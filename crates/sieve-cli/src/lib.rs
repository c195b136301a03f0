pub mod input;
pub mod output;
pub mod pin;
pub mod runner;
