pub mod advisory;
pub mod ids;
pub mod messages;
pub mod questions;
pub mod views;
