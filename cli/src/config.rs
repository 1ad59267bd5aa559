use idcheck_core::StopPolicy;
use idcheck_ocr::{
    EasyOcrConfig, EngineKind, Language, OcrSettings, TesseractConfig, VariantKind,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::VerifyArgs;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    // ============ OCR 引擎 ============
    /// 按优先级排列的引擎
    pub engines: Vec<EngineKind>,
    /// Tesseract 配置
    pub tesseract: TesseractConfig,
    /// EasyOCR 配置
    pub easyocr: EasyOcrConfig,

    // ============ 搜索策略 ============
    /// 预处理方式及顺序
    pub variants: Vec<VariantKind>,
    /// 语言提示
    pub languages: Vec<Language>,
    pub stop_policy: StopPolicy,

    // ============ 输出 ============
    /// CSV 结果文件
    pub results_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engines: EngineKind::DEFAULT_ORDER.to_vec(),
            tesseract: TesseractConfig::default(),
            easyocr: EasyOcrConfig::default(),
            variants: VariantKind::DEFAULT_ORDER.to_vec(),
            languages: Language::DEFAULT_HINTS.to_vec(),
            stop_policy: StopPolicy::default(),
            results_path: PathBuf::from("results.csv"),
        }
    }
}

impl AppConfig {
    pub fn ocr_settings(&self) -> OcrSettings {
        OcrSettings {
            engines: self.engines.clone(),
            tesseract: self.tesseract.clone(),
            easyocr: self.easyocr.clone(),
        }
    }

    /// 命令行参数覆盖配置文件
    pub fn apply_verify_args(&mut self, args: &VerifyArgs) {
        if !args.engines.is_empty() {
            self.engines = args.engines.clone();
        }
        if !args.variants.is_empty() {
            self.variants = args.variants.clone();
        }
        if args.stop_on_valid {
            self.stop_policy = StopPolicy::FirstValid;
        }
        if let Some(results) = &args.results {
            self.results_path = results.clone();
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("idcheck").join("config.json"))
}

/// 读取配置；未指定路径且默认配置文件不存在时使用默认值
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(AppConfig::default()),
        },
    };

    log::debug!("[Config] 读取配置: {}", path.display());
    let raw = fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.engines, vec![EngineKind::Tesseract, EngineKind::EasyOcr]);
        assert_eq!(config.variants, VariantKind::DEFAULT_ORDER.to_vec());
        assert_eq!(config.stop_policy, StopPolicy::FirstCandidate);
        assert_eq!(config.results_path, PathBuf::from("results.csv"));
    }

    #[test]
    fn test_camel_case_fields() {
        let raw = r#"{
            "engines": ["easyocr"],
            "tesseract": { "binaryPath": "/opt/tesseract", "oem": 1 },
            "variants": ["contrast-enhanced"],
            "stopPolicy": "firstValid",
            "resultsPath": "out/ids.csv"
        }"#;
        let config: AppConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.engines, vec![EngineKind::EasyOcr]);
        assert_eq!(config.tesseract.binary_or_default(), "/opt/tesseract");
        assert_eq!(config.tesseract.oem_or_default(), 1);
        assert_eq!(config.variants, vec![VariantKind::ContrastEnhanced]);
        assert_eq!(config.stop_policy, StopPolicy::FirstValid);
        assert_eq!(config.results_path, PathBuf::from("out/ids.csv"));
    }

    #[test]
    fn test_round_trip() {
        let mut config = AppConfig::default();
        config.easyocr.gpu = true;
        let raw = serde_json::to_string_pretty(&config).unwrap();
        assert!(raw.contains("\"resultsPath\""));
        let back: AppConfig = serde_json::from_str(&raw).unwrap();
        assert!(back.easyocr.gpu);
        assert_eq!(back.engines, config.engines);
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "languages": ["english"] }"#).unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.languages, vec![Language::English]);

        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_config(Some(&path)), Err(ConfigError::Json(_))));

        let missing = dir.path().join("missing.json");
        assert!(matches!(load_config(Some(&missing)), Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_verify_args_override() {
        let mut config = AppConfig::default();
        config.apply_verify_args(&VerifyArgs {
            engines: vec![EngineKind::EasyOcr],
            stop_on_valid: true,
            results: Some(PathBuf::from("batch.csv")),
            ..Default::default()
        });
        assert_eq!(config.engines, vec![EngineKind::EasyOcr]);
        assert_eq!(config.variants, VariantKind::DEFAULT_ORDER.to_vec());
        assert_eq!(config.stop_policy, StopPolicy::FirstValid);
        assert_eq!(config.results_path, PathBuf::from("batch.csv"));
    }
}
