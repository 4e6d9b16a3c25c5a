// Library exports for Emotify - mood detection and song recommendations

pub mod aggregator;
pub mod camera;
pub mod catalog;
pub mod config;
pub mod emotion;
pub mod error;
pub mod models;
pub mod mood;
pub mod playlist;
pub mod routes;
pub mod session;

#[cfg(test)]
mod testing;
