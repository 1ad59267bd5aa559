//! 身份证号码候选

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 身份证号码长度
pub const ID_LENGTH: usize = 18;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CandidateError {
    #[error("长度无效：{0}位（应为18位）")]
    Length(usize),

    #[error("第{position}位字符无效: {found:?}")]
    Character { position: usize, found: char },
}

/// 形状合法的身份证号码候选：17 位数字 + 1 位数字或 `X`
///
/// 末位统一为大写，只能通过 [`CandidateNumber::parse`] 构造。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CandidateNumber(String);

impl CandidateNumber {
    pub fn parse(raw: &str) -> Result<Self, CandidateError> {
        let length = raw.chars().count();
        if length != ID_LENGTH {
            return Err(CandidateError::Length(length));
        }

        let mut normalized = String::with_capacity(ID_LENGTH);
        for (position, c) in raw.chars().enumerate() {
            let ok = if position < ID_LENGTH - 1 {
                c.is_ascii_digit()
            } else {
                c.is_ascii_digit() || c == 'X' || c == 'x'
            };
            if !ok {
                return Err(CandidateError::Character { position, found: c });
            }
            normalized.push(c.to_ascii_uppercase());
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 前 17 位数字的数值
    pub fn body_digits(&self) -> [u8; 17] {
        let mut digits = [0u8; 17];
        for (slot, b) in digits.iter_mut().zip(self.0.bytes()) {
            *slot = b - b'0';
        }
        digits
    }

    pub fn check_char(&self) -> char {
        self.0.as_bytes()[ID_LENGTH - 1] as char
    }

    /// 按字段拆分，用于结果展示
    pub fn fields(&self) -> IdFields {
        IdFields {
            address_code: self.0[0..6].to_string(),
            birth_date: self.0[6..14].to_string(),
            sequence_code: self.0[14..17].to_string(),
            check_char: self.check_char(),
        }
    }
}

impl fmt::Display for CandidateNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CandidateNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CandidateNumber {
    type Error = CandidateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CandidateNumber> for String {
    fn from(value: CandidateNumber) -> Self {
        value.0
    }
}

/// 号码字段拆分
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdFields {
    /// 地址码（第 1-6 位）
    pub address_code: String,
    /// 出生日期 YYYYMMDD（第 7-14 位）
    pub birth_date: String,
    /// 顺序码（第 15-17 位）
    pub sequence_code: String,
    /// 校验码（第 18 位）
    pub check_char: char,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uppercases_check_char() {
        let candidate = CandidateNumber::parse("11010519491231002x").unwrap();
        assert_eq!(candidate.as_str(), "11010519491231002X");
        assert_eq!(candidate.check_char(), 'X');
    }

    #[test]
    fn test_parse_rejects_bad_shapes() {
        assert_eq!(
            CandidateNumber::parse("12345678901234567"),
            Err(CandidateError::Length(17))
        );
        assert_eq!(
            CandidateNumber::parse("1101051949123100XX"),
            Err(CandidateError::Character { position: 16, found: 'X' })
        );
        assert!(CandidateNumber::parse("11010519491231002Y").is_err());
        // 全角数字不算 ASCII 数字
        assert!(CandidateNumber::parse("１1010519491231002X").is_err());
    }

    #[test]
    fn test_fields() {
        let fields = CandidateNumber::parse("440524198001010013").unwrap().fields();
        assert_eq!(fields.address_code, "440524");
        assert_eq!(fields.birth_date, "19800101");
        assert_eq!(fields.sequence_code, "001");
        assert_eq!(fields.check_char, '3');
    }

    #[test]
    fn test_serde_validates_on_deserialize() {
        let ok: CandidateNumber = serde_json::from_str("\"11010519491231002x\"").unwrap();
        assert_eq!(ok.as_str(), "11010519491231002X");
        assert!(serde_json::from_str::<CandidateNumber>("\"1234\"").is_err());
    }
}
