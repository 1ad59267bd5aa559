//! 候选号码提取
//!
//! OCR 文本中的号码常被其他文字包围，这里用正则找出符合形状的子串。

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::candidate::CandidateNumber;

// 17 位数字 + 数字或 X，两侧为单词边界
static FULL_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[0-9]{17}[0-9Xx]\b").expect("身份证号码正则无效")
});

// 10 位及以上的连续数字，仅用于诊断展示
static DIGIT_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]{10,}").expect("数字串正则无效"));

/// 提取结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extraction {
    /// 第一个（最左侧）完整匹配
    pub candidate: Option<CandidateNumber>,
    /// 无完整匹配时找到的长数字串，不作为候选号码
    pub partial_matches: Vec<String>,
}

/// 从文本中提取身份证号码候选
pub fn extract(text: &str) -> Extraction {
    let candidate = FULL_ID
        .find_iter(text)
        .find_map(|m| CandidateNumber::parse(m.as_str()).ok());

    if candidate.is_some() {
        return Extraction {
            candidate,
            partial_matches: Vec::new(),
        };
    }

    let partial_matches = DIGIT_RUN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect();

    Extraction {
        candidate: None,
        partial_matches,
    }
}

/// 只取候选号码
pub fn extract_candidate(text: &str) -> Option<CandidateNumber> {
    extract(text).candidate
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extracted(text: &str) -> Option<String> {
        extract_candidate(text).map(|c| c.as_str().to_string())
    }

    #[test]
    fn test_extract_from_labelled_text() {
        assert_eq!(
            extracted("姓名：张三 身份证号：11010519491231002X").as_deref(),
            Some("11010519491231002X")
        );
        assert_eq!(
            extracted("ID: 440524188001010014").as_deref(),
            Some("440524188001010014")
        );
        assert_eq!(
            extracted("身份证 51010219890101001X 有效期").as_deref(),
            Some("51010219890101001X")
        );
    }

    #[test]
    fn test_extract_ignores_surrounding_punctuation() {
        for text in [
            "...11010519491231002X...",
            "(11010519491231002X)",
            "\n11010519491231002X\n",
            "#11010519491231002X#",
        ] {
            assert_eq!(extracted(text).as_deref(), Some("11010519491231002X"), "{}", text);
        }
    }

    #[test]
    fn test_extract_uppercases_trailing_x() {
        assert_eq!(
            extracted("号码 11010519491231002x").as_deref(),
            Some("11010519491231002X")
        );
    }

    #[test]
    fn test_extract_rejects_wrong_lengths() {
        assert_eq!(extracted("Short number: 12345678901234567"), None);
        assert_eq!(extracted("Long number: 1234567890123456789"), None);
        assert_eq!(extracted("No ID number here"), None);
        // 字母紧贴时没有单词边界
        assert_eq!(extracted("A11010519491231002X"), None);
    }

    #[test]
    fn test_extract_picks_leftmost() {
        let text = "440524198001010013 和 11010519491231002X";
        assert_eq!(extracted(text).as_deref(), Some("440524198001010013"));
    }

    #[test]
    fn test_partial_matches_only_without_full_match() {
        let result = extract("公民身份号码 1101051949 1231002X 电话 13812345678");
        assert!(result.candidate.is_none());
        assert_eq!(result.partial_matches, vec!["1101051949", "13812345678"]);

        let result = extract("11010519491231002X 13812345678");
        assert!(result.candidate.is_some());
        assert!(result.partial_matches.is_empty());
    }

    #[test]
    fn test_partial_matches_include_overlong_runs() {
        let result = extract("1234567890123456789");
        assert!(result.candidate.is_none());
        assert_eq!(result.partial_matches, vec!["1234567890123456789"]);
    }
}
