//! Method negotiation: method codes and the first request/reply pair of a session.

pub mod message;
pub mod method;
