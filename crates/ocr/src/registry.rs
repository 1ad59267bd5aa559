//! 引擎注册：按配置的优先级创建可用的引擎

use crate::easyocr::{detect_easyocr_status, EasyOcrEngine};
use crate::engine::OcrEngine;
use crate::error::OcrError;
use crate::tesseract::{detect_tesseract_status, TesseractEngine};
use crate::types::{EngineKind, EngineStatus, OcrSettings};

/// 创建单个引擎
pub fn build_engine(
    kind: EngineKind,
    settings: &OcrSettings,
) -> Result<Box<dyn OcrEngine>, OcrError> {
    match kind {
        EngineKind::Tesseract => Ok(Box::new(TesseractEngine::new(settings.tesseract.clone())?)),
        EngineKind::EasyOcr => Ok(Box::new(EasyOcrEngine::new(settings.easyocr.clone())?)),
    }
}

/// 按优先级创建全部可用引擎，不可用的引擎记录警告后跳过
///
/// 结果可能为空，由调用方决定如何处理。
pub fn build_engines(settings: &OcrSettings) -> Vec<Box<dyn OcrEngine>> {
    let mut engines: Vec<Box<dyn OcrEngine>> = Vec::new();
    let mut seen = Vec::new();

    for &kind in &settings.engines {
        if seen.contains(&kind) {
            continue;
        }
        seen.push(kind);

        match build_engine(kind, settings) {
            Ok(engine) => engines.push(engine),
            Err(e) => log::warn!("[OCR] 引擎 {} 不可用，已跳过: {}", kind, e),
        }
    }

    log::info!(
        "[OCR] 可用引擎: [{}]",
        engines
            .iter()
            .map(|e| e.kind().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );

    engines
}

/// 查询配置中各引擎的安装状态
pub fn engine_statuses(settings: &OcrSettings) -> Vec<EngineStatus> {
    EngineKind::DEFAULT_ORDER
        .iter()
        .map(|kind| match kind {
            EngineKind::Tesseract => detect_tesseract_status(&settings.tesseract),
            EngineKind::EasyOcr => detect_easyocr_status(&settings.easyocr),
        })
        .collect()
}
