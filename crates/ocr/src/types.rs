//! OCR 共享类型定义

use serde::{Deserialize, Serialize};

/// OCR 引擎类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Tesseract OCR (CLI)
    Tesseract,
    /// EasyOCR (CLI)
    #[serde(rename = "easyocr")]
    EasyOcr,
}

impl EngineKind {
    /// 默认优先级：速度快的引擎在前
    pub const DEFAULT_ORDER: [EngineKind; 2] = [EngineKind::Tesseract, EngineKind::EasyOcr];
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::Tesseract => write!(f, "tesseract"),
            EngineKind::EasyOcr => write!(f, "easyocr"),
        }
    }
}

impl std::str::FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tesseract" => Ok(EngineKind::Tesseract),
            "easyocr" => Ok(EngineKind::EasyOcr),
            other => Err(format!("未知的 OCR 引擎: {}", other)),
        }
    }
}

/// 引擎接受的输入
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EngineInput {
    /// 接受内存中的预处理图像
    Variants,
    /// 只处理原始图片文件
    SourceOnly,
}

/// 识别语言提示，由各引擎映射为自己的语言代码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Language {
    SimplifiedChinese,
    English,
}

impl Language {
    pub const DEFAULT_HINTS: [Language; 2] = [Language::SimplifiedChinese, Language::English];
}

/// 单次识别的配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionConfig {
    /// 配置名称，用于日志和结果来源
    pub label: String,
    /// 页面分割模式
    pub psm: Option<u8>,
    /// 字符白名单
    pub whitelist: Option<String>,
}

impl RecognitionConfig {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            psm: None,
            whitelist: None,
        }
    }

    pub fn with_psm(mut self, psm: u8) -> Self {
        self.psm = Some(psm);
        self
    }

    pub fn with_whitelist(mut self, whitelist: &str) -> Self {
        self.whitelist = Some(whitelist.to_string());
        self
    }
}

/// 身份证号码可能出现的字符
pub const ID_WHITELIST: &str = "0123456789X";

/// 像素坐标边界框
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelBox {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// 带置信度的文字片段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    /// 0-1，引擎不提供时为空
    pub confidence: Option<f32>,
    pub bbox: Option<PixelBox>,
}

/// 一次识别的文本结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecognizedText {
    pub text: String,
    pub fragments: Vec<TextFragment>,
}

impl RecognizedText {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            fragments: Vec::new(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Tesseract 配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct TesseractConfig {
    /// Tesseract 可执行文件路径
    pub binary_path: Option<String>,
    /// tessdata 目录路径
    pub tessdata_path: Option<String>,
    /// OCR 引擎模式 (0-3)
    pub oem: Option<u8>,
}

impl TesseractConfig {
    pub fn binary_or_default(&self) -> &str {
        self.binary_path.as_deref().unwrap_or("tesseract")
    }

    pub fn oem_or_default(&self) -> u8 {
        self.oem.unwrap_or(3)
    }
}

/// EasyOCR 配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct EasyOcrConfig {
    /// easyocr 可执行文件路径
    pub binary_path: Option<String>,
    /// 是否使用 GPU
    pub gpu: bool,
}

impl EasyOcrConfig {
    pub fn binary_or_default(&self) -> &str {
        self.binary_path.as_deref().unwrap_or("easyocr")
    }
}

/// 引擎注册配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OcrSettings {
    /// 按优先级排列的引擎
    pub engines: Vec<EngineKind>,
    pub tesseract: TesseractConfig,
    pub easyocr: EasyOcrConfig,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            engines: EngineKind::DEFAULT_ORDER.to_vec(),
            tesseract: TesseractConfig::default(),
            easyocr: EasyOcrConfig::default(),
        }
    }
}

/// 引擎可用状态
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub engine_type: EngineKind,
    pub installed: bool,
    pub version: Option<String>,
    pub binary_path: Option<String>,
    pub error: Option<String>,
}

/// OCR 审计信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrAuditInfo {
    /// 使用的引擎类型
    pub engine_type: EngineKind,
    /// 引擎版本
    pub engine_version: Option<String>,
    /// 引擎参数（JSON）
    pub engine_params: Option<String>,
}
