//! Tesseract OCR 引擎实现（CLI 包装）

use image::{DynamicImage, ImageFormat};
use std::path::Path;
use std::process::Command;
use std::time::Instant;

use crate::engine::OcrEngine;
use crate::error::OcrError;
use crate::types::{
    EngineKind, EngineStatus, Language, OcrAuditInfo, PixelBox, RecognitionConfig,
    RecognizedText, TesseractConfig, TextFragment, ID_WHITELIST,
};

/// Tesseract OCR 引擎
pub struct TesseractEngine {
    config: TesseractConfig,
    version: Option<String>,
}

impl TesseractEngine {
    /// 创建 Tesseract 引擎
    pub fn new(config: TesseractConfig) -> Result<Self, OcrError> {
        // 验证 binary 是否可用
        let version = get_tesseract_version(config.binary_or_default())?;

        log::info!("[Tesseract] 初始化成功，版本: {}", version);

        Ok(Self {
            config,
            version: Some(version),
        })
    }

    fn binary_path(&self) -> &str {
        self.config.binary_or_default()
    }

    fn build_args(
        &self,
        image_path: &Path,
        languages: &[Language],
        config: &RecognitionConfig,
    ) -> Vec<String> {
        let mut args = vec![
            image_path.to_string_lossy().to_string(),
            "stdout".to_string(),
            "-l".to_string(),
            lang_code(languages),
        ];
        if let Some(psm) = config.psm {
            args.push("--psm".to_string());
            args.push(psm.to_string());
        }
        args.push("--oem".to_string());
        args.push(self.config.oem_or_default().to_string());
        if let Some(whitelist) = &config.whitelist {
            args.push("-c".to_string());
            args.push(format!("tessedit_char_whitelist={}", whitelist));
        }
        args.push("tsv".to_string());
        args
    }
}

impl OcrEngine for TesseractEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Tesseract
    }

    fn configurations(&self) -> Vec<RecognitionConfig> {
        vec![
            RecognitionConfig::new("block").with_psm(6),
            RecognitionConfig::new("sparse").with_psm(11),
            RecognitionConfig::new("sparse-osd").with_psm(12),
            RecognitionConfig::new("digits")
                .with_psm(6)
                .with_whitelist(ID_WHITELIST),
            RecognitionConfig::new("single-line")
                .with_psm(7)
                .with_whitelist(ID_WHITELIST),
        ]
    }

    fn recognize_image(
        &mut self,
        img: &DynamicImage,
        languages: &[Language],
        config: &RecognitionConfig,
    ) -> Result<RecognizedText, OcrError> {
        // 临时文件在离开作用域时删除
        let temp_input = tempfile::Builder::new()
            .prefix("tesseract_input_")
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
        let mut cmd = Command::new(self.binary_path());
        cmd.args(&args);

        // 设置 tessdata 路径
        if let Some(tessdata_path) = &self.config.tessdata_path {
            cmd.env("TESSDATA_PREFIX", tessdata_path);
        }

        log::debug!("[Tesseract] 执行: {} {}", self.binary_path(), args.join(" "));

        let output = cmd
            .output()
            .map_err(|e| OcrError::Engine(format!("执行 tesseract 失败: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Engine(format!(
                "Tesseract 执行失败: {}",
                stderr.trim()
            )));
        }

        let tsv_output = String::from_utf8_lossy(&output.stdout);
        let result = parse_tesseract_tsv(&tsv_output);

        log::info!(
            "[Tesseract] 识别完成 ({})，耗时: {} ms，片段数: {}",
            config.label,
            start.elapsed().as_millis(),
            result.fragments.len()
        );

        Ok(result)
    }

    fn audit_info(&self) -> OcrAuditInfo {
        let params = serde_json::json!({
            "lang": lang_code(&Language::DEFAULT_HINTS),
            "oem": self.config.oem_or_default(),
            "configs": self.configurations().iter().map(|c| c.label.clone()).collect::<Vec<_>>(),
        });

        OcrAuditInfo {
            engine_type: EngineKind::Tesseract,
            engine_version: self.version.clone(),
            engine_params: Some(params.to_string()),
        }
    }
}

/// 语言提示映射为 Tesseract 语言代码
fn lang_code(languages: &[Language]) -> String {
    let languages = if languages.is_empty() {
        &Language::DEFAULT_HINTS[..]
    } else {
        languages
    };
    languages
        .iter()
        .map(|lang| match lang {
            Language::SimplifiedChinese => "chi_sim",
            Language::English => "eng",
        })
        .collect::<Vec<_>>()
        .join("+")
}

/// 解析 Tesseract TSV 输出
///
/// TSV 格式：
/// level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
///
/// 单词按 (block, par, line) 归并成行，行之间用换行连接
fn parse_tesseract_tsv(tsv: &str) -> RecognizedText {
    let mut fragments = Vec::new();
    let mut lines: Vec<((u32, u32, u32), Vec<String>)> = Vec::new();

    // 跳过表头
    for line in tsv.lines().skip(1) {
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 12 {
            continue;
        }

        let level: i32 = cols[0].parse().unwrap_or(-1);
        let conf: f32 = cols[10].parse().unwrap_or(-1.0);
        let text = cols[11].trim();

        // 只处理 word 级别 (level=5)，跳过空文本
        if level != 5 || text.is_empty() || conf < 0.0 {
            continue;
        }

        let num = |i: usize| cols[i].parse::<u32>().unwrap_or(0);
        let key = (num(2), num(3), num(4));
        match lines.last_mut() {
            Some((last_key, words)) if *last_key == key => words.push(text.to_string()),
            Some(_) | None => lines.push((key, vec![text.to_string()])),
        }

        fragments.push(TextFragment {
            text: text.to_string(),
            confidence: Some(conf / 100.0), // Tesseract 置信度是 0-100
            bbox: Some(PixelBox {
                left: num(6),
                top: num(7),
                width: num(8),
                height: num(9),
            }),
        });
    }

    let text = lines
        .iter()
        .map(|(_, words)| words.join(" "))
        .collect::<Vec<_>>()
        .join("\n");

    RecognizedText { text, fragments }
}

/// 获取 Tesseract 版本
pub fn get_tesseract_version(binary_path: &str) -> Result<String, OcrError> {
    let output = Command::new(binary_path)
        .arg("--version")
        .output()
        .map_err(|e| OcrError::EngineUnavailable(format!("无法执行 tesseract: {}", e)))?;

    if !output.status.success() {
        return Err(OcrError::EngineUnavailable(
            "tesseract --version 执行失败".to_string(),
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let combined = format!("{}{}", stdout, stderr);

    Ok(parse_version(&combined))
}

fn parse_version(output: &str) -> String {
    // 格式通常是 "tesseract 5.3.0" 或 "tesseract v5.3.0"
    for line in output.lines() {
        if line.contains("tesseract") {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 2 {
                return parts[1].trim_start_matches('v').to_string();
            }
        }
    }
    "unknown".to_string()
}

/// 检测 Tesseract 安装状态
pub fn detect_tesseract_status(config: &TesseractConfig) -> EngineStatus {
    let binary = config.binary_or_default();
    let binary_path = which::which(binary)
        .ok()
        .map(|p| p.to_string_lossy().to_string());

    match get_tesseract_version(binary) {
        Ok(version) => EngineStatus {
            engine_type: EngineKind::Tesseract,
            installed: true,
            version: Some(version),
            binary_path,
            error: None,
        },
        Err(e) => EngineStatus {
            engine_type: EngineKind::Tesseract,
            installed: false,
            version: None,
            binary_path,
            error: Some(e.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> TesseractEngine {
        TesseractEngine {
            config: TesseractConfig::default(),
            version: None,
        }
    }

    #[test]
    fn test_parse_tsv_groups_lines() {
        let tsv = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t1000\t1000\t-1\t
5\t1\t1\t1\t1\t1\t100\t200\t50\t20\t95.5\t公民身份号码
5\t1\t1\t1\t1\t2\t160\t200\t260\t20\t92.3\t11010519491231002X
5\t1\t1\t1\t2\t1\t100\t250\t100\t20\t88.0\t有效期
";
        let result = parse_tesseract_tsv(tsv);
        assert_eq!(result.text, "公民身份号码 11010519491231002X\n有效期");
        assert_eq!(result.fragments.len(), 3);
        assert_eq!(result.fragments[1].text, "11010519491231002X");

        let conf = result.fragments[0].confidence.unwrap();
        assert!((conf - 0.955).abs() < 0.001);
        assert_eq!(
            result.fragments[0].bbox,
            Some(PixelBox { left: 100, top: 200, width: 50, height: 20 })
        );
    }

    #[test]
    fn test_parse_tsv_empty_output() {
        let result = parse_tesseract_tsv("level\tpage_num\n");
        assert!(result.is_blank());
        assert!(result.fragments.is_empty());
    }

    #[test]
    fn test_configurations_order() {
        let configs = engine().configurations();
        let psms: Vec<Option<u8>> = configs.iter().map(|c| c.psm).collect();
        assert_eq!(psms, vec![Some(6), Some(11), Some(12), Some(6), Some(7)]);
        assert!(configs[0].whitelist.is_none());
        assert_eq!(configs[3].whitelist.as_deref(), Some("0123456789X"));
    }

    #[test]
    fn test_build_args() {
        let config = RecognitionConfig::new("digits")
            .with_psm(6)
            .with_whitelist(ID_WHITELIST);
        let args = engine().build_args(Path::new("card.png"), &Language::DEFAULT_HINTS, &config);
        assert_eq!(
            args,
            vec![
                "card.png",
                "stdout",
                "-l",
                "chi_sim+eng",
                "--psm",
                "6",
                "--oem",
                "3",
                "-c",
                "tessedit_char_whitelist=0123456789X",
                "tsv",
            ]
        );
    }

    #[test]
    fn test_lang_code() {
        assert_eq!(lang_code(&[Language::English]), "eng");
        assert_eq!(lang_code(&[]), "chi_sim+eng");
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("tesseract 5.3.0\n leptonica-1.82.0"), "5.3.0");
        assert_eq!(parse_version("tesseract v4.1.1"), "4.1.1");
        assert_eq!(parse_version("garbage"), "unknown");
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let config = TesseractConfig {
            binary_path: Some("/nonexistent/tesseract-idcheck".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            TesseractEngine::new(config.clone()),
            Err(OcrError::EngineUnavailable(_))
        ));
        let status = detect_tesseract_status(&config);
        assert!(!status.installed);
        assert!(status.error.is_some());
    }

    #[test]
    fn test_audit_info_params() {
        let e = TesseractEngine {
            config: TesseractConfig::default(),
            version: Some("5.3.0".to_string()),
        };
        let audit = e.audit_info();
        assert_eq!(audit.engine_type, EngineKind::Tesseract);
        assert_eq!(audit.engine_version.as_deref(), Some("5.3.0"));

        let params: serde_json::Value =
            serde_json::from_str(audit.engine_params.as_deref().unwrap()).unwrap();
        assert_eq!(params["lang"], "chi_sim+eng");
        assert_eq!(params["configs"].as_array().unwrap().len(), 5);
        assert_eq!(params["configs"][3], "digits");
    }
}
