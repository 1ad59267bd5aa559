//! 多引擎回退搜索
//!
//! 按引擎优先级依次尝试 预处理变体 × 识别配置 的组合，
//! 每得到一段文本就立即提取候选号码，按停止策略决定是否提前结束。

use idcheck_ocr::{
    generate, EngineInput, EngineKind, Language, OcrAuditInfo, OcrEngine, RecognitionConfig,
    VariantKind,
};
use idcheck_verify::{extract, extract_candidate, CandidateNumber, IdVerifier};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

use crate::source::SourceImage;

/// 何时停止搜索
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StopPolicy {
    /// 第一个形状正确的候选即停止
    #[default]
    FirstCandidate,
    /// 只有通过校验的候选才停止；都不通过时返回第一个候选
    FirstValid,
}

/// 一次尝试的输入
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptInput {
    /// 第 n 个预处理变体
    Variant(usize),
    /// 未处理的原图
    Source,
}

/// 一次尝试：引擎、输入、配置的下标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    pub engine: usize,
    pub input: AttemptInput,
    pub config: usize,
}

/// 尝试顺序
///
/// 引擎按优先级排列；接受变体的引擎对每个变体依次尝试全部配置，
/// 只接受原图的引擎对原图依次尝试全部配置。
#[derive(Debug, Clone)]
pub struct AttemptPlan {
    engines: Vec<(EngineInput, usize)>,
    variant_count: usize,
    engine: usize,
    step: usize,
}

impl AttemptPlan {
    /// `engines` 为每个引擎的输入方式和配置数量
    pub fn new(engines: Vec<(EngineInput, usize)>, variant_count: usize) -> Self {
        Self {
            engines,
            variant_count,
            engine: 0,
            step: 0,
        }
    }
}

impl Iterator for AttemptPlan {
    type Item = Attempt;

    fn next(&mut self) -> Option<Attempt> {
        while let Some(&(input, configs)) = self.engines.get(self.engine) {
            let inputs = match input {
                EngineInput::Variants => self.variant_count,
                EngineInput::SourceOnly => 1,
            };

            if self.step < inputs * configs {
                let step = self.step;
                self.step += 1;
                let (input, config) = match input {
                    EngineInput::Variants => (AttemptInput::Variant(step / configs), step % configs),
                    EngineInput::SourceOnly => (AttemptInput::Source, step),
                };
                return Some(Attempt {
                    engine: self.engine,
                    input,
                    config,
                });
            }

            self.engine += 1;
            self.step = 0;
        }
        None
    }
}

/// 文本或候选的来源
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptOrigin {
    /// 合并文本时为空
    pub engine: Option<EngineKind>,
    /// 变体名称，或 `source`
    pub input: String,
    /// 配置名称
    pub config: String,
}

impl AttemptOrigin {
    const COMBINED: &'static str = "combined";

    fn combined() -> Self {
        Self {
            engine: None,
            input: Self::COMBINED.to_string(),
            config: Self::COMBINED.to_string(),
        }
    }

    pub fn is_combined(&self) -> bool {
        self.engine.is_none()
    }
}

impl fmt::Display for AttemptOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.engine {
            Some(engine) => write!(f, "{}/{}/{}", engine, self.input, self.config),
            None => f.write_str(Self::COMBINED),
        }
    }
}

/// 一次成功识别得到的非空文本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptText {
    pub origin: AttemptOrigin,
    pub text: String,
}

/// 一次失败的识别
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptFailure {
    pub origin: AttemptOrigin,
    pub error: String,
}

/// 搜索结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    pub candidate: Option<CandidateNumber>,
    pub found_by: Option<AttemptOrigin>,
    pub texts: Vec<AttemptText>,
    /// 没有候选时，合并文本中的长数字串
    pub partial_matches: Vec<String>,
    /// 实际调用引擎的次数
    pub attempts: usize,
    pub failures: Vec<AttemptFailure>,
}

impl SearchOutcome {
    /// 没有任何一次识别得到非空文本（包括没有可用引擎）
    pub fn no_text(&self) -> bool {
        self.texts.is_empty()
    }
}

/// 多引擎回退搜索
pub struct Orchestrator {
    engines: Vec<Box<dyn OcrEngine>>,
    variants: Vec<VariantKind>,
    languages: Vec<Language>,
    policy: StopPolicy,
    verifier: IdVerifier,
}

impl Orchestrator {
    pub fn new(engines: Vec<Box<dyn OcrEngine>>) -> Self {
        Self {
            engines,
            variants: VariantKind::DEFAULT_ORDER.to_vec(),
            languages: Language::DEFAULT_HINTS.to_vec(),
            policy: StopPolicy::default(),
            verifier: IdVerifier::new(),
        }
    }

    pub fn with_variants(mut self, variants: Vec<VariantKind>) -> Self {
        self.variants = variants;
        self
    }

    pub fn with_languages(mut self, languages: Vec<Language>) -> Self {
        self.languages = languages;
        self
    }

    pub fn with_stop_policy(mut self, policy: StopPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_verifier(mut self, verifier: IdVerifier) -> Self {
        self.verifier = verifier;
        self
    }

    /// 按优先级列出参与搜索的引擎及其参数
    pub fn audit_info(&self) -> Vec<OcrAuditInfo> {
        self.engines.iter().map(|e| e.audit_info()).collect()
    }

    /// 在一张图片上搜索身份证号码
    pub fn search(&mut self, source: &SourceImage) -> SearchOutcome {
        let start = Instant::now();
        let mut outcome = SearchOutcome::default();

        if self.engines.is_empty() {
            log::warn!("[Search] 没有可用的 OCR 引擎");
            return outcome;
        }

        let configs: Vec<Vec<RecognitionConfig>> =
            self.engines.iter().map(|e| e.configurations()).collect();

        // 只有存在接受变体的引擎时才做预处理
        let needs_variants = self
            .engines
            .iter()
            .any(|e| e.input() == EngineInput::Variants);
        let variants = if needs_variants {
            generate(source.image(), &self.variants)
        } else {
            Vec::new()
        };
        let variant_images: Vec<DynamicImage> = variants.iter().map(|v| v.to_dynamic()).collect();

        let plan = AttemptPlan::new(
            self.engines
                .iter()
                .zip(&configs)
                .map(|(e, c)| (e.input(), c.len()))
                .collect(),
            variants.len(),
        );

        let mut fallback: Option<(CandidateNumber, AttemptOrigin)> = None;

        for attempt in plan {
            let config = &configs[attempt.engine][attempt.config];
            let engine = &mut self.engines[attempt.engine];
            let origin = AttemptOrigin {
                engine: Some(engine.kind()),
                input: match attempt.input {
                    AttemptInput::Variant(i) => variants[i].name().to_string(),
                    AttemptInput::Source => "source".to_string(),
                },
                config: config.label.clone(),
            };

            outcome.attempts += 1;
            let result = match (attempt.input, source.path()) {
                (AttemptInput::Variant(i), _) => {
                    engine.recognize_image(&variant_images[i], &self.languages, config)
                }
                (AttemptInput::Source, Some(path)) => {
                    engine.recognize_file(path, &self.languages, config)
                }
                (AttemptInput::Source, None) => {
                    engine.recognize_image(source.image(), &self.languages, config)
                }
            };

            let recognized = match result {
                Ok(recognized) => recognized,
                Err(e) => {
                    log::warn!("[Search] {} 识别失败，继续尝试: {}", origin, e);
                    outcome.failures.push(AttemptFailure {
                        origin,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            if recognized.is_blank() {
                log::debug!("[Search] {} 无文本", origin);
                continue;
            }

            let candidate = extract_candidate(&recognized.text);
            outcome.texts.push(AttemptText {
                origin: origin.clone(),
                text: recognized.text,
            });

            let Some(candidate) = candidate else {
                log::debug!("[Search] {} 未找到候选号码", origin);
                continue;
            };

            match self.policy {
                StopPolicy::FirstCandidate => {
                    log::info!("[Search] {} 找到候选: {}", origin, candidate);
                    outcome.candidate = Some(candidate);
                    outcome.found_by = Some(origin);
                    break;
                }
                StopPolicy::FirstValid => {
                    if self.verifier.verify_candidate(Some(&candidate)).valid {
                        log::info!("[Search] {} 找到有效号码: {}", origin, candidate);
                        outcome.candidate = Some(candidate);
                        outcome.found_by = Some(origin);
                        break;
                    }
                    log::debug!("[Search] {} 候选 {} 未通过校验", origin, candidate);
                    if fallback.is_none() {
                        fallback = Some((candidate, origin));
                    }
                }
            }
        }

        if outcome.candidate.is_none() {
            if let Some((candidate, origin)) = fallback {
                outcome.candidate = Some(candidate);
                outcome.found_by = Some(origin);
            }
        }

        if outcome.candidate.is_none() && !outcome.texts.is_empty() {
            let combined = outcome
                .texts
                .iter()
                .map(|t| t.text.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            let extraction = extract(&combined);
            match extraction.candidate {
                Some(candidate) => {
                    outcome.candidate = Some(candidate);
                    outcome.found_by = Some(AttemptOrigin::combined());
                }
                None => outcome.partial_matches = extraction.partial_matches,
            }
        }

        log::info!(
            "[Search] 完成，尝试 {} 次，失败 {} 次，耗时: {} ms",
            outcome.attempts,
            outcome.failures.len(),
            start.elapsed().as_millis()
        );

        outcome
    }
}
