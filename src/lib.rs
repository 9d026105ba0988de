//! smhiwx library
//!
//! Incremental JSON stream parsing of SMHI open-data responses, city to
//! station resolution and the front end driving them.

pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod decode;
pub mod extract;
pub mod fold;
pub mod render;
pub mod resolver;
pub mod settings;
pub mod smhi;
pub mod stream;
pub mod transport;
