//! 身份证号码结构与校验码验证
//!
//! 依次检查长度、地址码、出生日期、顺序码和校验码，遇到第一个失败项即返回。
//! 地址码只检查是否为数字，不查询行政区划表。

use chrono::{Datelike, Local, NaiveDate};

use crate::candidate::{CandidateNumber, ID_LENGTH};
use crate::diagnostic::{DateFault, Diagnostic, Verdict};

/// 前 17 位的加权因子
pub const WEIGHTS: [u32; 17] = [7, 9, 10, 5, 8, 4, 2, 1, 6, 3, 7, 9, 10, 5, 8, 4, 2];

/// 加权和模 11 到校验码的映射
pub const CHECKSUM_MAP: [char; 11] = ['1', '0', 'X', '9', '8', '7', '6', '5', '4', '3', '2'];

const MIN_BIRTH_YEAR: u32 = 1900;

/// 根据前 17 位数字计算校验码
pub fn check_char(body: &[u8; 17]) -> char {
    let sum: u32 = body
        .iter()
        .zip(WEIGHTS.iter())
        .map(|(&digit, &weight)| digit as u32 * weight)
        .sum();
    CHECKSUM_MAP[(sum % 11) as usize]
}

/// 身份证号码校验器
#[derive(Debug, Clone, Copy)]
pub struct IdVerifier {
    current_year: u32,
}

impl Default for IdVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl IdVerifier {
    /// 以本地时钟的当前年份作为出生年份上限
    pub fn new() -> Self {
        Self::with_current_year(Local::now().year().max(0) as u32)
    }

    pub fn with_current_year(current_year: u32) -> Self {
        Self { current_year }
    }

    /// 校验提取到的候选号码；`None` 表示没有找到候选
    pub fn verify_candidate(&self, candidate: Option<&CandidateNumber>) -> Verdict {
        match candidate {
            Some(candidate) => self.verify(candidate.as_str()),
            None => Verdict::invalid(Diagnostic::NotFound, None),
        }
    }

    /// 校验任意字符串
    pub fn verify(&self, id_number: &str) -> Verdict {
        if id_number.is_empty() {
            return Verdict::invalid(Diagnostic::NotFound, None);
        }

        let chars: Vec<char> = id_number.chars().collect();
        if chars.len() != ID_LENGTH {
            return Verdict::invalid(Diagnostic::LengthInvalid { length: chars.len() }, None);
        }

        let candidate = CandidateNumber::parse(id_number).ok();

        let address: String = chars[0..6].iter().collect();
        if !all_digits(&address) {
            return Verdict::invalid(Diagnostic::AddressInvalid { value: address }, candidate);
        }

        let birth: String = chars[6..14].iter().collect();
        if let Err(fault) = self.check_birth_date(&birth) {
            return Verdict::invalid(Diagnostic::DateInvalid { value: birth, fault }, candidate);
        }

        let sequence: String = chars[14..17].iter().collect();
        if !all_digits(&sequence) {
            return Verdict::invalid(Diagnostic::SequenceInvalid { value: sequence }, candidate);
        }

        // 前 17 位此时都是数字
        let mut body = [0u8; 17];
        for (slot, c) in body.iter_mut().zip(chars.iter()) {
            *slot = c.to_digit(10).unwrap_or(0) as u8;
        }
        let expected = check_char(&body);
        let actual = chars[17].to_ascii_uppercase();
        if actual != expected {
            return Verdict::invalid(Diagnostic::ChecksumInvalid { expected, actual }, candidate);
        }

        match candidate {
            Some(candidate) => Verdict::valid(candidate),
            // 校验码匹配意味着形状一定合法
            None => Verdict::invalid(Diagnostic::ChecksumInvalid { expected, actual }, None),
        }
    }

    /// YYYYMMDD：先做粗略范围检查，再由日历构造做最终判定
    fn check_birth_date(&self, value: &str) -> Result<NaiveDate, DateFault> {
        if !all_digits(value) {
            return Err(DateFault::NonDigit);
        }

        let year: u32 = value[0..4].parse().map_err(|_| DateFault::NonDigit)?;
        let month: u32 = value[4..6].parse().map_err(|_| DateFault::NonDigit)?;
        let day: u32 = value[6..8].parse().map_err(|_| DateFault::NonDigit)?;

        if year < MIN_BIRTH_YEAR || year > self.current_year {
            return Err(DateFault::YearOutOfRange { year });
        }
        if !(1..=12).contains(&month) {
            return Err(DateFault::MonthOutOfRange { month });
        }
        if !(1..=31).contains(&day) {
            return Err(DateFault::DayOutOfRange { day });
        }

        NaiveDate::from_ymd_opt(year as i32, month, day).ok_or(DateFault::NotACalendarDate)
    }
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}
