//! Chesslab engine - drive UCI chess engines and collect multi-PV analysis.

pub mod config;
pub mod display;
pub mod engine;
