//! OCR 错误类型

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("图像读取失败: {0}")]
    ImageRead(String),

    #[error("OCR 引擎不可用: {0}")]
    EngineUnavailable(String),

    #[error("识别失败: {0}")]
    Engine(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}
