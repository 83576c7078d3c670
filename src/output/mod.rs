//! Result reporting: console text and an optional JSON file

pub mod json;
pub mod text;
