//! PII pattern registry.
//!
//! 规则以有序列表保存，列表顺序即优先级：同一段文本只归属于第一个命中的规则。
//! 注册表在启动时构建一次，之后只读共享给所有文档。

use regex::Regex;
use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, RulesError>;

#[derive(Debug, thiserror::Error)]
pub enum RulesError {
    #[error("invalid pattern for rule {label}: {source}")]
    InvalidPattern {
        label: String,
        #[source]
        source: regex::Error,
    },
    #[error("rule label must not be empty")]
    EmptyLabel,
}

/// 未指定字段时默认启用的规则
pub const DEFAULT_FIELDS: &[&str] = &["AADHAAR", "PAN", "PHONE", "EMAIL", "DATE"];

/// 内置规则（印度地区 PII）
///
/// ADDRESS 与 NAME 只是近似表达式，可通过配置文件中的同名规则替换。
const BUILTIN_PATTERNS: &[(&str, &str)] = &[
    ("AADHAAR", r"\b(?:\d[\s-]?){12}\b"),
    ("PAN", r"\b[A-Z]{5}\d{4}[A-Z]\b"),
    ("PHONE", r"\b(?:\+?91[\s-]?)?[6-9]\d{9}\b"),
    ("EMAIL", r"[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9.-]+"),
    (
        "DATE",
        r"\b(?:0?[1-9]|[12][0-9]|3[01])[-/](?:0?[1-9]|1[0-2])[-/](?:19|20)\d\d\b",
    ),
    ("ADDRESS", r"\b(?:[A-Za-z0-9]{3,},?\s?)+\b"),
    ("NAME", r"\b[A-Z][a-z]+(?: [A-Z][a-z]+)+\b"),
];

/// 规则定义（来自配置文件）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub label: String,
    pub pattern: String,
}

/// 已编译的规则
#[derive(Debug, Clone)]
pub struct Rule {
    label: String,
    pattern: Regex,
}

impl Rule {
    /// 编译规则，标签统一转为大写
    pub fn new(label: &str, pattern: &str) -> Result<Self> {
        let label = label.trim().to_uppercase();
        if label.is_empty() {
            return Err(RulesError::EmptyLabel);
        }
        let pattern = Regex::new(pattern).map_err(|source| RulesError::InvalidPattern {
            label: label.clone(),
            source,
        })?;
        Ok(Self { label, pattern })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// 文本中任意位置命中即算匹配
    pub fn is_match(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

/// 规则注册表
///
/// 保存所有可用的具名规则，按字段列表解析出本次任务启用的 [`RuleSet`]。
#[derive(Debug, Clone, Default)]
pub struct Registry {
    rules: Vec<Rule>,
}

impl Registry {
    /// 内置规则注册表
    pub fn builtin() -> Result<Self> {
        let rules = BUILTIN_PATTERNS
            .iter()
            .map(|(label, pattern)| Rule::new(label, pattern))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// 从规则定义构建注册表
    pub fn from_specs(specs: &[RuleSpec]) -> Result<Self> {
        Self::default().with_overrides(specs)
    }

    /// 合并自定义规则
    ///
    /// 与已有规则同名时原位替换（保持优先级不变），否则追加到末尾。
    pub fn with_overrides(mut self, specs: &[RuleSpec]) -> Result<Self> {
        for spec in specs {
            let rule = Rule::new(&spec.label, &spec.pattern)?;
            match self.rules.iter_mut().find(|r| r.label == rule.label) {
                Some(existing) => {
                    log::info!("[Rules] 覆盖内置规则: {}", rule.label);
                    *existing = rule;
                }
                None => {
                    log::info!("[Rules] 新增规则: {}", rule.label);
                    self.rules.push(rule);
                }
            }
        }
        Ok(self)
    }

    /// 按标签查找（不区分大小写）
    pub fn get(&self, label: &str) -> Option<&Rule> {
        let label = label.trim();
        self.rules
            .iter()
            .find(|r| r.label.eq_ignore_ascii_case(label))
    }

    pub fn labels(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.label()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 解析启用的规则
    ///
    /// 结果顺序与 `selected` 一致；未知标签直接忽略，重复标签只保留第一次。
    pub fn resolve<S: AsRef<str>>(&self, selected: &[S]) -> RuleSet {
        let mut rules: Vec<Rule> = Vec::with_capacity(selected.len());
        for label in selected {
            let label = label.as_ref();
            match self.get(label) {
                Some(rule) if rules.iter().any(|r| r.label == rule.label) => {}
                Some(rule) => rules.push(rule.clone()),
                None => log::debug!("[Rules] 忽略未知字段: {}", label),
            }
        }
        RuleSet { rules }
    }
}

/// 有序规则集合
///
/// 匹配语义为"第一个命中的规则胜出"。
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// 返回第一个命中 `text` 的规则
    pub fn first_match(&self, text: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.is_match(text))
    }

    pub fn labels(&self) -> Vec<String> {
        self.rules.iter().map(|r| r.label.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// 解析逗号分隔的字段列表（不区分大小写，去除空项）
pub fn parse_field_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builtin() -> Registry {
        Registry::builtin().unwrap()
    }

    #[test]
    fn test_builtin_order() {
        assert_eq!(
            builtin().labels(),
            vec!["AADHAAR", "PAN", "PHONE", "EMAIL", "DATE", "ADDRESS", "NAME"]
        );
    }

    #[test]
    fn test_resolve_keeps_input_order_and_drops_unknown() {
        let set = builtin().resolve(&["email", "BOGUS", "PAN", "Email"]);
        assert_eq!(set.labels(), vec!["EMAIL".to_string(), "PAN".to_string()]);
    }

    #[test]
    fn test_resolve_empty_selection() {
        let set = builtin().resolve::<&str>(&[]);
        assert!(set.is_empty());
        assert!(set.first_match("ABCDE1234F").is_none());
    }

    #[test]
    fn test_builtin_patterns() {
        let reg = builtin();
        let cases = [
            ("AADHAAR", "1234 5678 9012", true),
            ("AADHAAR", "1234-5678-9012", true),
            ("AADHAAR", "12345", false),
            ("PAN", "ABCDE1234F", true),
            ("PAN", "abcde1234f", false),
            ("PHONE", "+91 9876543210", true),
            ("PHONE", "9876543210", true),
            ("PHONE", "1234567890", false),
            ("EMAIL", "user@example.com", true),
            ("EMAIL", "user.example.com", false),
            ("DATE", "15/08/1947", true),
            ("DATE", "1-1-2020", true),
            ("DATE", "32/01/2020", false),
            ("NAME", "Ravi Kumar", true),
            ("NAME", "Ravi", false),
        ];
        for (label, text, expected) in cases {
            let rule = reg.get(label).unwrap();
            assert_eq!(rule.is_match(text), expected, "{} vs {:?}", label, text);
        }
    }

    #[test]
    fn test_first_match_wins() {
        // 12 位数字同时满足 AADHAAR 与（带 91 前缀的）PHONE
        let reg = builtin();
        let set = reg.resolve(&["AADHAAR", "PHONE"]);
        assert_eq!(set.first_match("919876543210").unwrap().label(), "AADHAAR");

        let set = reg.resolve(&["PHONE", "AADHAAR"]);
        assert_eq!(set.first_match("919876543210").unwrap().label(), "PHONE");
    }

    #[test]
    fn test_override_replaces_in_place() {
        let reg = builtin()
            .with_overrides(&[
                RuleSpec {
                    label: "name".into(),
                    pattern: r"\bShri [A-Z][a-z]+\b".into(),
                },
                RuleSpec {
                    label: "VOTER_ID".into(),
                    pattern: r"\b[A-Z]{3}\d{7}\b".into(),
                },
            ])
            .unwrap();

        assert_eq!(reg.len(), 8);
        assert_eq!(reg.labels()[6], "NAME");
        assert_eq!(reg.labels()[7], "VOTER_ID");
        assert!(!reg.get("NAME").unwrap().is_match("Ravi Kumar"));
        assert!(reg.get("NAME").unwrap().is_match("Shri Ravi"));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = Registry::from_specs(&[RuleSpec {
            label: "BROKEN".into(),
            pattern: "([a-z".into(),
        }])
        .unwrap_err();
        assert!(matches!(err, RulesError::InvalidPattern { ref label, .. } if label == "BROKEN"));
    }

    #[test]
    fn test_rule_spec_json() {
        let specs: Vec<RuleSpec> =
            serde_json::from_str(r#"[{"label": "ZIP", "pattern": "\\b\\d{6}\\b"}]"#).unwrap();
        let reg = Registry::from_specs(&specs).unwrap();
        assert!(reg.get("zip").unwrap().is_match("PIN 560001"));
    }

    #[test]
    fn test_parse_field_list() {
        assert_eq!(
            parse_field_list(" aadhaar, Pan ,,email "),
            vec!["AADHAAR", "PAN", "EMAIL"]
        );
        assert!(parse_field_list("").is_empty());
    }
}
