//! Button-triggered still capture for a single V4L2 camera.
//!
//! A press on the GPIO-connected button is debounced, one frame is acquired
//! through the camera's single memory-mapped buffer slot, and the bytes are
//! handed to a background save thread that writes `Image<N>.jpg` into the
//! picture directory.

pub mod capture;
pub mod config;
pub mod control;
pub mod error;
pub mod input;
pub mod persist;
