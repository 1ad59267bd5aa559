use anyhow::{bail, Context, Result};
use chrono::Local;
use idcheck_core::{Orchestrator, Pipeline, PipelineReport};
use idcheck_ocr::{build_engines, engine_statuses, EngineStatus, OcrAuditInfo};
use idcheck_verify::{extract, Extraction, IdVerifier, Verdict};
use serde_json::json;
use std::fs;
use std::path::Path;

use crate::cli::{Cli, Commands, VerifyArgs};
use crate::config::{load_config, AppConfig};
use crate::records::{ResultLog, ResultRecord};

/// 执行子命令；返回值决定退出码（true 为 0）
pub fn run(cli: &Cli) -> Result<bool> {
    let config = load_config(cli.config.as_deref()).context("读取配置失败")?;

    match &cli.command {
        Commands::Verify(args) => verify_images(config, args, cli.json),
        Commands::Check { numbers } => check_numbers(numbers, cli.json),
        Commands::Extract { text, file } => extract_text(text.as_deref(), file.as_deref(), cli.json),
        Commands::Engines => list_engines(&config, cli.json),
    }
}

fn verify_images(mut config: AppConfig, args: &VerifyArgs, json: bool) -> Result<bool> {
    config.apply_verify_args(args);

    let engines = build_engines(&config.ocr_settings());
    if engines.is_empty() {
        log::warn!("[OCR] 没有可用的 OCR 引擎，请检查 tesseract / easyocr 是否已安装");
    }

    let orchestrator = Orchestrator::new(engines)
        .with_variants(config.variants.clone())
        .with_languages(config.languages.clone())
        .with_stop_policy(config.stop_policy);
    let mut pipeline = Pipeline::new(orchestrator);
    let results = args.save.then(|| ResultLog::new(config.results_path.clone()));

    let mut all_valid = true;
    let mut outputs = Vec::new();

    for image in &args.images {
        match pipeline.run_path(image) {
            Ok(report) => {
                all_valid &= report.valid;
                if let Some(results) = &results {
                    results.append(&ResultRecord::from_report(image, &report, Local::now()))?;
                }
                if json {
                    outputs.push(json!({ "image": image, "report": report }));
                } else {
                    println!("{}", format_report(image, &report));
                }
            }
            Err(e) => {
                all_valid = false;
                log::error!("[Pipeline] {}: {}", image.display(), e);
                if json {
                    outputs.push(json!({ "image": image, "error": e.to_string() }));
                } else {
                    println!("文件: {}\n  错误: {}\n", image.display(), e);
                }
            }
        }
    }

    if let Some(results) = &results {
        log::info!("[Records] 结果已保存到 {}", results.path().display());
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&outputs)?);
    }

    Ok(all_valid)
}

fn check_numbers(numbers: &[String], json: bool) -> Result<bool> {
    let verifier = IdVerifier::new();
    let verdicts: Vec<(&String, Verdict)> = numbers
        .iter()
        .map(|number| (number, verifier.verify(number.trim())))
        .collect();

    if json {
        let outputs: Vec<_> = verdicts
            .iter()
            .map(|(number, verdict)| {
                json!({
                    "input": number,
                    "valid": verdict.valid,
                    "diagnosticCode": verdict.code(),
                    "diagnosticMessage": verdict.message(),
                    "fields": verdict.candidate.as_ref().map(|c| c.fields()),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&outputs)?);
    } else {
        for (number, verdict) in &verdicts {
            println!("{}", format_verdict(number, verdict));
        }
    }

    Ok(verdicts.iter().all(|(_, verdict)| verdict.valid))
}

fn extract_text(text: Option<&str>, file: Option<&Path>, json: bool) -> Result<bool> {
    let text = read_extract_input(text, file)?;
    let extraction = extract(&text);

    if json {
        println!("{}", serde_json::to_string_pretty(&extraction)?);
    } else {
        println!("{}", format_extraction(&extraction));
    }

    Ok(extraction.candidate.is_some())
}

fn read_extract_input(text: Option<&str>, file: Option<&Path>) -> Result<String> {
    match (text, file) {
        (Some(text), _) => Ok(text.to_string()),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("读取文本文件失败: {}", path.display())),
        (None, None) => bail!("请提供文本或 --file <path>"),
    }
}

fn list_engines(config: &AppConfig, json: bool) -> Result<bool> {
    let statuses = engine_statuses(&config.ocr_settings());

    if json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
    } else {
        for status in &statuses {
            let enabled = config.engines.contains(&status.engine_type);
            println!("{}", format_engine_status(status, enabled));
        }
    }

    Ok(statuses
        .iter()
        .any(|s| s.installed && config.engines.contains(&s.engine_type)))
}

fn status_label(valid: bool) -> &'static str {
    if valid {
        "有效"
    } else {
        "无效"
    }
}

fn format_report(image: &Path, report: &PipelineReport) -> String {
    let mut lines = vec![format!("文件: {}", image.display())];
    lines.push(format!(
        "  身份证号码: {}",
        report.candidate.as_deref().unwrap_or("未找到")
    ));
    lines.push(format!(
        "  结果: {} ({})",
        status_label(report.valid),
        report.diagnostic_message
    ));
    if let Some(fields) = &report.fields {
        lines.push(format!(
            "  地址码: {}  出生日期: {}  顺序码: {}  校验码: {}",
            fields.address_code, fields.birth_date, fields.sequence_code, fields.check_char
        ));
    }
    if !report.partial_matches.is_empty() {
        lines.push(format!("  部分匹配: {}", report.partial_matches.join(", ")));
    }
    if let Some(found_by) = &report.found_by {
        lines.push(format!("  来源: {}", found_by));
    }
    if !report.engines.is_empty() {
        let engines: Vec<String> = report.engines.iter().map(format_engine_audit).collect();
        lines.push(format!("  引擎: {}", engines.join(", ")));
    }
    lines.push(format!(
        "  尝试次数: {}，失败: {}",
        report.attempts,
        report.engine_failures.len()
    ));
    lines.join("\n") + "\n"
}

fn format_engine_audit(audit: &OcrAuditInfo) -> String {
    match &audit.engine_version {
        Some(version) => format!("{} {}", audit.engine_type, version),
        None => audit.engine_type.to_string(),
    }
}

fn format_verdict(number: &str, verdict: &Verdict) -> String {
    format!("{}: {} ({})", number, status_label(verdict.valid), verdict.message())
}

fn format_extraction(extraction: &Extraction) -> String {
    match &extraction.candidate {
        Some(candidate) => format!("候选号码: {}", candidate),
        None if extraction.partial_matches.is_empty() => "未找到身份证号码".to_string(),
        None => format!(
            "未找到身份证号码，部分匹配: {}",
            extraction.partial_matches.join(", ")
        ),
    }
}

fn format_engine_status(status: &EngineStatus, enabled: bool) -> String {
    let state = if status.installed { "可用" } else { "不可用" };
    let mut line = format!(
        "{:<10} {}{}",
        status.engine_type.to_string(),
        state,
        if enabled { "" } else { "（未启用）" }
    );
    if let Some(version) = &status.version {
        line.push_str(&format!("  版本: {}", version));
    }
    if let Some(path) = &status.binary_path {
        line.push_str(&format!("  路径: {}", path));
    }
    if let Some(error) = &status.error {
        line.push_str(&format!("  {}", error));
    }
    line
}
