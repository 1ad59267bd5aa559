//! OCR 引擎 trait 定义

use image::DynamicImage;
use std::path::Path;

use crate::error::OcrError;
use crate::types::{EngineInput, EngineKind, Language, OcrAuditInfo, RecognitionConfig, RecognizedText};

/// OCR 引擎统一 trait
pub trait OcrEngine: Send {
    /// 引擎类型
    fn kind(&self) -> EngineKind;

    /// 引擎接受的输入，默认接受预处理变体
    fn input(&self) -> EngineInput {
        EngineInput::Variants
    }

    /// 按尝试顺序排列的识别配置，至少一项
    fn configurations(&self) -> Vec<RecognitionConfig>;

    /// 识别内存中的图像
    fn recognize_image(
        &mut self,
        img: &DynamicImage,
        languages: &[Language],
        config: &RecognitionConfig,
    ) -> Result<RecognizedText, OcrError>;

    /// 识别图片文件
    fn recognize_file(
        &mut self,
        image_path: &Path,
        languages: &[Language],
        config: &RecognitionConfig,
    ) -> Result<RecognizedText, OcrError> {
        let img = image::open(image_path)
            .map_err(|e| OcrError::ImageRead(format!("{}: {}", image_path.display(), e)))?;
        self.recognize_image(&img, languages, config)
    }

    /// 获取审计信息
    fn audit_info(&self) -> OcrAuditInfo;
}
