//! 识别校验流水线：图片 -> 候选号码 -> 校验结论

use idcheck_ocr::OcrAuditInfo;
use idcheck_verify::{DiagnosticCode, IdFields, IdVerifier, Verdict};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;

use crate::orchestrator::{AttemptFailure, AttemptOrigin, AttemptText, Orchestrator, SearchOutcome};
use crate::source::SourceImage;
use crate::Result;

/// 一张图片的处理报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineReport {
    pub candidate: Option<String>,
    pub valid: bool,
    pub diagnostic_code: DiagnosticCode,
    pub diagnostic_message: String,
    pub fields: Option<IdFields>,
    pub partial_matches: Vec<String>,
    pub found_by: Option<AttemptOrigin>,
    pub recognized_text: Vec<AttemptText>,
    pub attempts: usize,
    pub engine_failures: Vec<AttemptFailure>,
    /// 参与搜索的引擎，按优先级排列
    pub engines: Vec<OcrAuditInfo>,
}

impl PipelineReport {
    fn new(verdict: Verdict, outcome: SearchOutcome, engines: Vec<OcrAuditInfo>) -> Self {
        Self {
            candidate: outcome.candidate.as_ref().map(|c| c.as_str().to_string()),
            valid: verdict.valid,
            diagnostic_code: verdict.code(),
            diagnostic_message: verdict.message(),
            fields: outcome.candidate.as_ref().map(|c| c.fields()),
            partial_matches: outcome.partial_matches,
            found_by: outcome.found_by,
            recognized_text: outcome.texts,
            attempts: outcome.attempts,
            engine_failures: outcome.failures,
            engines,
        }
    }
}

/// 识别校验流水线
pub struct Pipeline {
    orchestrator: Orchestrator,
    verifier: IdVerifier,
}

impl Pipeline {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            verifier: IdVerifier::new(),
        }
    }

    /// 搜索与最终校验使用同一个校验器
    pub fn with_verifier(self, verifier: IdVerifier) -> Self {
        Self {
            orchestrator: self.orchestrator.with_verifier(verifier),
            verifier,
        }
    }

    /// 处理一张已解码的图片
    pub fn run(&mut self, source: &SourceImage) -> PipelineReport {
        let start = Instant::now();
        let outcome = self.orchestrator.search(source);

        let verdict = if outcome.no_text() {
            Verdict::no_text()
        } else {
            self.verifier.verify_candidate(outcome.candidate.as_ref())
        };

        log::info!(
            "[Pipeline] {}: {} ({})，耗时: {} ms",
            source.file_name().as_deref().unwrap_or("<memory>"),
            verdict.code(),
            verdict.message(),
            start.elapsed().as_millis()
        );

        PipelineReport::new(verdict, outcome, self.orchestrator.audit_info())
    }

    /// 读取并处理图片文件；只有图片无法读取时返回错误
    pub fn run_path(&mut self, path: &Path) -> Result<PipelineReport> {
        let source = SourceImage::open(path)?;
        Ok(self.run(&source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::tests::{source, FakeEngine};
    use crate::CoreError;
    use idcheck_ocr::{EngineInput, EngineKind, OcrEngine};
    use image::{DynamicImage, GrayImage, Luma};

    fn pipeline(engines: Vec<Box<dyn OcrEngine>>) -> Pipeline {
        Pipeline::new(Orchestrator::new(engines)).with_verifier(IdVerifier::with_current_year(2026))
    }

    fn scripted(script: Vec<Option<&'static str>>) -> Box<dyn OcrEngine> {
        let (engine, _) = FakeEngine::new(EngineKind::EasyOcr, EngineInput::SourceOnly, 2, script);
        Box::new(engine)
    }

    #[test]
    fn test_valid_number_report() {
        let report = pipeline(vec![scripted(vec![Some("公民身份号码 11010519491231002X")])])
            .run(&source());

        assert!(report.valid);
        assert_eq!(report.diagnostic_code, DiagnosticCode::Valid);
        assert_eq!(report.diagnostic_message, "身份证号码格式有效");
        assert_eq!(report.candidate.as_deref(), Some("11010519491231002X"));
        let fields = report.fields.unwrap();
        assert_eq!(fields.address_code, "110105");
        assert_eq!(fields.birth_date, "19491231");
        assert_eq!(report.attempts, 1);
    }

    #[test]
    fn test_no_engines_reports_no_text() {
        let report = pipeline(Vec::new()).run(&source());
        assert!(!report.valid);
        assert_eq!(report.diagnostic_code, DiagnosticCode::NoTextExtracted);
        assert!(report.candidate.is_none());
    }

    #[test]
    fn test_text_without_number_is_not_found() {
        let report = pipeline(vec![scripted(vec![Some("姓名 张三"), Some("号码 1101051949")])])
            .run(&source());
        assert_eq!(report.diagnostic_code, DiagnosticCode::NotFound);
        assert_eq!(report.partial_matches, vec!["1101051949"]);
        assert_eq!(report.recognized_text.len(), 2);
    }

    #[test]
    fn test_invalid_checksum_keeps_candidate() {
        let report = pipeline(vec![scripted(vec![Some("110105194912310021")])]).run(&source());
        assert!(!report.valid);
        assert_eq!(report.diagnostic_code, DiagnosticCode::ChecksumInvalid);
        assert_eq!(report.diagnostic_message, "校验码无效：应为 X，实际为 1");
        assert_eq!(report.candidate.as_deref(), Some("110105194912310021"));
        assert_eq!(report.fields.unwrap().check_char, '1');
    }

    #[test]
    fn test_failures_are_reported() {
        let report = pipeline(vec![scripted(vec![None, Some("440524198001010013")])])
            .run(&source());
        assert!(report.valid);
        assert_eq!(report.engine_failures.len(), 1);
        assert_eq!(report.attempts, 2);
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let report = pipeline(Vec::new()).run(&source());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["diagnosticCode"], "NO_TEXT_EXTRACTED");
        assert!(json.get("engineFailures").is_some());
        assert!(json.get("partialMatches").is_some());
        assert_eq!(json["engines"], serde_json::json!([]));
    }

    #[test]
    fn test_report_lists_engines() {
        let report = pipeline(vec![
            scripted(vec![Some("身份证号 440524198001010013")]),
        ])
        .run(&source());
        assert_eq!(report.engines.len(), 1);
        assert_eq!(report.engines[0].engine_type, EngineKind::EasyOcr);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["engines"][0]["engineType"], "easyocr");
    }

    #[test]
    fn test_run_path_unreadable_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("card.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();

        let result = pipeline(Vec::new()).run_path(&path);
        assert!(matches!(result, Err(CoreError::ImageRead(_))));

        let missing = pipeline(Vec::new()).run_path(&dir.path().join("missing.png"));
        assert!(matches!(missing, Err(CoreError::ImageRead(_))));
    }

    #[test]
    fn test_run_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("card.png");
        DynamicImage::ImageLuma8(GrayImage::from_pixel(6, 4, Luma([200])))
            .save(&path)
            .unwrap();

        let report = pipeline(Vec::new()).run_path(&path).unwrap();
        assert_eq!(report.diagnostic_code, DiagnosticCode::NoTextExtracted);
    }
}
