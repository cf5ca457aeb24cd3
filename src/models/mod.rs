pub mod image;
pub mod matrix;
pub mod point;
pub mod region;
pub mod result;
pub mod symbology;

pub use image::{NormalizedImage, SourceRef};
pub use matrix::BitMatrix;
pub use point::Point;
pub use region::{CandidateRegion, Rect, RegionClass};
pub use result::{BarcodeResult, QualityNote, ReconstructionPath};
pub use symbology::{Symbology, UnknownSymbology};
