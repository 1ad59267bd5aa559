//! 校验结论与诊断信息

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::candidate::CandidateNumber;

/// 诊断码（对外输出用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    Valid,
    NotFound,
    NoTextExtracted,
    LengthInvalid,
    AddressInvalid,
    DateInvalid,
    SequenceInvalid,
    ChecksumInvalid,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::Valid => "VALID",
            DiagnosticCode::NotFound => "NOT_FOUND",
            DiagnosticCode::NoTextExtracted => "NO_TEXT_EXTRACTED",
            DiagnosticCode::LengthInvalid => "LENGTH_INVALID",
            DiagnosticCode::AddressInvalid => "ADDRESS_INVALID",
            DiagnosticCode::DateInvalid => "DATE_INVALID",
            DiagnosticCode::SequenceInvalid => "SEQUENCE_INVALID",
            DiagnosticCode::ChecksumInvalid => "CHECKSUM_INVALID",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 出生日期不合法的具体原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DateFault {
    NonDigit,
    YearOutOfRange { year: u32 },
    MonthOutOfRange { month: u32 },
    DayOutOfRange { day: u32 },
    NotACalendarDate,
}

impl fmt::Display for DateFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateFault::NonDigit => write!(f, "包含非数字字符"),
            DateFault::YearOutOfRange { year } => write!(f, "年份 {} 超出范围", year),
            DateFault::MonthOutOfRange { month } => write!(f, "月份 {} 超出范围", month),
            DateFault::DayOutOfRange { day } => write!(f, "日 {} 超出范围", day),
            DateFault::NotACalendarDate => write!(f, "不是有效的日历日期"),
        }
    }
}

/// 诊断信息，携带用于提示的观测值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Diagnostic {
    Valid,
    NotFound,
    NoTextExtracted,
    LengthInvalid { length: usize },
    AddressInvalid { value: String },
    DateInvalid { value: String, fault: DateFault },
    SequenceInvalid { value: String },
    ChecksumInvalid { expected: char, actual: char },
}

impl Diagnostic {
    pub fn code(&self) -> DiagnosticCode {
        match self {
            Diagnostic::Valid => DiagnosticCode::Valid,
            Diagnostic::NotFound => DiagnosticCode::NotFound,
            Diagnostic::NoTextExtracted => DiagnosticCode::NoTextExtracted,
            Diagnostic::LengthInvalid { .. } => DiagnosticCode::LengthInvalid,
            Diagnostic::AddressInvalid { .. } => DiagnosticCode::AddressInvalid,
            Diagnostic::DateInvalid { .. } => DiagnosticCode::DateInvalid,
            Diagnostic::SequenceInvalid { .. } => DiagnosticCode::SequenceInvalid,
            Diagnostic::ChecksumInvalid { .. } => DiagnosticCode::ChecksumInvalid,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Valid => write!(f, "身份证号码格式有效"),
            Diagnostic::NotFound => write!(f, "未找到身份证号码"),
            Diagnostic::NoTextExtracted => write!(f, "没有可用的OCR引擎或文本提取失败"),
            Diagnostic::LengthInvalid { length } => {
                write!(f, "长度无效：{}位（应为18位）", length)
            }
            Diagnostic::AddressInvalid { value } => write!(f, "地址码无效（前6位）：{}", value),
            Diagnostic::DateInvalid { value, fault } => {
                write!(f, "出生日期无效：{}（{}）", value, fault)
            }
            Diagnostic::SequenceInvalid { value } => write!(f, "顺序码无效：{}", value),
            Diagnostic::ChecksumInvalid { expected, actual } => {
                write!(f, "校验码无效：应为 {}，实际为 {}", expected, actual)
            }
        }
    }
}

/// 一次校验的结论
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub valid: bool,
    pub diagnostic: Diagnostic,
    pub candidate: Option<CandidateNumber>,
}

impl Verdict {
    pub(crate) fn valid(candidate: CandidateNumber) -> Self {
        Self {
            valid: true,
            diagnostic: Diagnostic::Valid,
            candidate: Some(candidate),
        }
    }

    pub(crate) fn invalid(diagnostic: Diagnostic, candidate: Option<CandidateNumber>) -> Self {
        Self {
            valid: false,
            diagnostic,
            candidate,
        }
    }

    /// 未找到任何文本时的结论
    pub fn no_text() -> Self {
        Self::invalid(Diagnostic::NoTextExtracted, None)
    }

    pub fn code(&self) -> DiagnosticCode {
        self.diagnostic.code()
    }

    pub fn message(&self) -> String {
        self.diagnostic.to_string()
    }
}
