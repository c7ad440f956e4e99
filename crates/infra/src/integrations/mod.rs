//! External service integrations

pub mod smartthings;
