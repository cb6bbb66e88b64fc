//! The request phase: what the client wants, and how the server answers.

pub mod reply;
pub mod request;
