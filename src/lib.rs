//! Resonograph library - real-time audio spectrum visualization

pub mod audio;
pub mod cli;
pub mod config;
pub mod controls;
pub mod error;
pub mod params;
pub mod rendering;
pub mod visual;
