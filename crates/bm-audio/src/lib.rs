// Recording decode, segmentation, and spectral feature extraction for bulkclass.

pub mod assembler;
pub mod decode;
pub mod error;
pub mod segment;
pub mod spectrum;
