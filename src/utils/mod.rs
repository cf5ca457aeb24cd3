//! Utility functions for image processing
//!
//! - Grayscale conversion and resampling
//! - Binarization (Otsu)
//! - Geometry (perspective transforms, bilinear sampling, angles)

pub mod binarization;
pub mod geometry;
pub mod grayscale;
