//! 证件照片 OCR 支持
//!
//! - 图像预处理变体（降噪、自适应阈值、Otsu、CLAHE）
//! - Tesseract OCR (CLI)
//! - EasyOCR (CLI)

mod easyocr;
mod engine;
mod error;
pub mod preprocess;
mod registry;
mod tesseract;
mod types;

pub use easyocr::{detect_easyocr_status, EasyOcrEngine};
pub use engine::OcrEngine;
pub use error::OcrError;
pub use preprocess::{generate, generate_all, load_source, ImageVariant, VariantKind};
pub use registry::{build_engine, build_engines, engine_statuses};
pub use tesseract::{detect_tesseract_status, get_tesseract_version, TesseractEngine};
pub use types::*;
