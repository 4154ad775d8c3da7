pub mod handler;
pub mod model;

pub use handler::{receive_feedback, receive_message};
