//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the viewer:
//! - Math types and camera matrix helpers
//! - Logging: the per-viewer logger fan-out and global `env_logger` setup

pub mod math;
pub mod logging;
