//! EasyOCR 引擎实现（CLI 包装）
//!
//! EasyOCR 自带检测与预处理，只把原始图片文件交给它。

use image::{DynamicImage, ImageFormat};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use crate::engine::OcrEngine;
use crate::error::OcrError;
use crate::types::{
    EasyOcrConfig, EngineInput, EngineKind, EngineStatus, Language, OcrAuditInfo,
    RecognitionConfig, RecognizedText, ID_WHITELIST,
};

/// EasyOCR 引擎
pub struct EasyOcrEngine {
    config: EasyOcrConfig,
    binary: PathBuf,
}

impl EasyOcrEngine {
    /// 创建 EasyOCR 引擎，找不到可执行文件时返回不可用
    pub fn new(config: EasyOcrConfig) -> Result<Self, OcrError> {
        let binary = which::which(config.binary_or_default()).map_err(|e| {
            OcrError::EngineUnavailable(format!(
                "找不到 easyocr ({}): {}",
                config.binary_or_default(),
                e
            ))
        })?;

        log::info!("[EasyOCR] 初始化成功: {}", binary.display());

        Ok(Self { config, binary })
    }

    fn build_args(
        &self,
        image_path: &Path,
        languages: &[Language],
        config: &RecognitionConfig,
    ) -> Vec<String> {
        let mut args = vec!["-l".to_string()];
        args.extend(lang_codes(languages).into_iter().map(String::from));
        args.push("-f".to_string());
        args.push(image_path.to_string_lossy().to_string());
        args.push("--detail".to_string());
        args.push("0".to_string());
        args.push("--gpu".to_string());
        args.push(if self.config.gpu { "True" } else { "False" }.to_string());
        if let Some(allowlist) = &config.whitelist {
            args.push("--allowlist".to_string());
            args.push(allowlist.clone());
        }
        args
    }
}

impl OcrEngine for EasyOcrEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::EasyOcr
    }

    fn input(&self) -> EngineInput {
        EngineInput::SourceOnly
    }

    fn configurations(&self) -> Vec<RecognitionConfig> {
        vec![
            RecognitionConfig::new("general"),
            RecognitionConfig::new("digits").with_whitelist(ID_WHITELIST),
        ]
    }

    fn recognize_image(
        &mut self,
        img: &DynamicImage,
        languages: &[Language],
        config: &RecognitionConfig,
    ) -> Result<RecognizedText, OcrError> {
        let temp_input = tempfile::Builder::new()
            .prefix("easyocr_input_")
            .suffix(".png")
            .tempfile()?;

        img.save_with_format(temp_input.path(), ImageFormat::Png)
            .map_err(|e| OcrError::Engine(format!("保存临时图片失败: {}", e)))?;

        self.recognize_file(temp_input.path(), languages, config)
    }

    fn recognize_file(
        &mut self,
        image_path: &Path,
        languages: &[Language],
        config: &RecognitionConfig,
    ) -> Result<RecognizedText, OcrError> {
        let start = Instant::now();

        let args = self.build_args(image_path, languages, config);
        log::debug!("[EasyOCR] 执行: {} {}", self.binary.display(), args.join(" "));

        let output = Command::new(&self.binary)
            .args(&args)
            .output()
            .map_err(|e| OcrError::Engine(format!("执行 easyocr 失败: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Engine(format!(
                "EasyOCR 执行失败: {}",
                stderr.trim()
            )));
        }

        let result = parse_easyocr_output(&String::from_utf8_lossy(&output.stdout));

        log::info!(
            "[EasyOCR] 识别完成 ({})，耗时: {} ms，字符数: {}",
            config.label,
            start.elapsed().as_millis(),
            result.text.chars().count()
        );

        Ok(result)
    }

    fn audit_info(&self) -> OcrAuditInfo {
        let params = serde_json::json!({
            "lang": lang_codes(&Language::DEFAULT_HINTS),
            "gpu": self.config.gpu,
            "binary": self.binary.to_string_lossy(),
        });

        OcrAuditInfo {
            engine_type: EngineKind::EasyOcr,
            engine_version: None,
            engine_params: Some(params.to_string()),
        }
    }
}

fn lang_codes(languages: &[Language]) -> Vec<&'static str> {
    let languages = if languages.is_empty() {
        &Language::DEFAULT_HINTS[..]
    } else {
        languages
    };
    languages
        .iter()
        .map(|lang| match lang {
            Language::SimplifiedChinese => "ch_sim",
            Language::English => "en",
        })
        .collect()
}

/// `--detail 0` 时每行一个识别出的字符串，拼接时用空格分隔；没有位置和置信度
fn parse_easyocr_output(stdout: &str) -> RecognizedText {
    let text = stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    RecognizedText::plain(text)
}

/// 检测 EasyOCR 安装状态
pub fn detect_easyocr_status(config: &EasyOcrConfig) -> EngineStatus {
    match which::which(config.binary_or_default()) {
        Ok(path) => EngineStatus {
            engine_type: EngineKind::EasyOcr,
            installed: true,
            version: None,
            binary_path: Some(path.to_string_lossy().to_string()),
            error: None,
        },
        Err(e) => EngineStatus {
            engine_type: EngineKind::EasyOcr,
            installed: false,
            version: None,
            binary_path: None,
            error: Some(format!("找不到 easyocr: {}", e)),
        },
    }
}
