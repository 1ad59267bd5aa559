//! 身份证号码提取与校验
//!
//! 从 OCR 文本中提取 18 位居民身份证号码候选，并按地址码、出生日期、
//! 顺序码、校验码的顺序逐项校验。

mod candidate;
mod diagnostic;
pub mod extract;
mod verifier;

pub use candidate::{CandidateError, CandidateNumber, IdFields, ID_LENGTH};
pub use diagnostic::{DateFault, Diagnostic, DiagnosticCode, Verdict};
pub use extract::{extract, extract_candidate, Extraction};
pub use verifier::{check_char, IdVerifier, CHECKSUM_MAP, WEIGHTS};
