//! 从 OCR 单词到脱敏区域
//!
//! 两个粒度：单词级（[`match_tokens`]）与行级（[`aggregate_lines`]），
//! 结果与二维码区域一起由 [`resolve_regions`] 合并。

use std::collections::HashMap;

use pii_ocr::Token;
use pii_rules::RuleSet;

use crate::region::{DetectionRecord, Region};

/// 行分组的纵向带高（像素）
pub const LINE_BAND: f64 = 10.0;

/// 单词级匹配
///
/// 置信度低于 `min_confidence` 的单词直接跳过；其余单词按规则顺序测试，
/// 命中第一条规则后即停止，区域等于该单词的外框。
pub fn match_tokens(
    tokens: &[Token],
    rules: &RuleSet,
    min_confidence: f32,
) -> (Vec<Region>, Vec<DetectionRecord>) {
    let mut regions = Vec::new();
    let mut records = Vec::new();

    for token in tokens {
        if token.confidence < min_confidence {
            continue;
        }
        let Some(rule) = rules.first_match(&token.text) else {
            continue;
        };

        let region = Region::new(
            (token.left, token.top, token.right(), token.bottom()),
            rule.label(),
            token.text.as_str(),
            token.confidence,
        );
        log::debug!(
            "[Detect] 单词命中 {} @ ({}, {}, {}, {})",
            region.label,
            region.x0,
            region.y0,
            region.x1,
            region.y1
        );
        records.push(region.record());
        regions.push(region);
    }

    (regions, records)
}

/// 行号：top / 带高，四舍六入五成双
fn line_key(top: i32) -> i64 {
    (top as f64 / LINE_BAND).round_ties_even() as i64
}

/// 按纵向带分组，保持各行首次出现的顺序
fn group_lines(tokens: &[Token]) -> Vec<Vec<&Token>> {
    let mut index: HashMap<i64, usize> = HashMap::new();
    let mut lines: Vec<Vec<&Token>> = Vec::new();

    for token in tokens {
        let slot = *index.entry(line_key(token.top)).or_insert_with(|| {
            lines.push(Vec::new());
            lines.len() - 1
        });
        lines[slot].push(token);
    }

    for line in &mut lines {
        line.sort_by_key(|t| t.left);
    }
    lines
}

/// 行级匹配
///
/// 同一行的单词按从左到右用单个空格拼接后测试规则。命中时区域为整行单词外框的并集，
/// 置信度取行内最大值。这里不做置信度过滤：低置信度单词拼成的行仍可能是真实的 PII。
pub fn aggregate_lines(tokens: &[Token], rules: &RuleSet) -> (Vec<Region>, Vec<DetectionRecord>) {
    let mut regions = Vec::new();
    let mut records = Vec::new();

    for line in group_lines(tokens) {
        let text = line
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let Some(rule) = rules.first_match(&text) else {
            continue;
        };

        let x0 = line.iter().map(|t| t.left).min().unwrap_or(0);
        let y0 = line.iter().map(|t| t.top).min().unwrap_or(0);
        let x1 = line.iter().map(|t| t.right()).max().unwrap_or(0);
        let y1 = line.iter().map(|t| t.bottom()).max().unwrap_or(0);
        let confidence = line
            .iter()
            .map(|t| t.confidence)
            .fold(f32::NEG_INFINITY, f32::max);

        let region = Region::new((x0, y0, x1, y1), rule.label(), text, confidence);
        log::debug!(
            "[Detect] 行命中 {} @ ({}, {}, {}, {})，{} 个单词",
            region.label,
            x0,
            y0,
            x1,
            y1,
            line.len()
        );
        records.push(region.record());
        regions.push(region);
    }

    (regions, records)
}

/// 合并三类区域：直接拼接，不去重也不合并重叠
pub fn resolve_regions(
    token_regions: Vec<Region>,
    line_regions: Vec<Region>,
    qr_regions: Vec<Region>,
) -> Vec<Region> {
    let mut all = token_regions;
    all.extend(line_regions);
    all.extend(qr_regions);
    all
}

#[cfg(test)]
mod tests {
    use super::*;
    use pii_render::PixelRect;
    use pii_rules::Registry;

    fn rules(labels: &[&str]) -> RuleSet {
        Registry::builtin().unwrap().resolve(labels)
    }

    /// 以 (x0, y0, x1, y1) 构造单词
    fn token(text: &str, conf: f32, x0: i32, y0: i32, x1: i32, y1: i32) -> Token {
        Token::new(text, conf, x0, y0, x1 - x0, y1 - y0)
    }

    #[test]
    fn test_email_token_region() {
        let tokens = vec![token("user@example.com", 90.0, 10, 10, 120, 30)];
        let (regions, records) = match_tokens(&tokens, &rules(&["EMAIL"]), 60.0);

        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].bounds(), PixelRect::new(10, 10, 120, 30));
        assert_eq!(regions[0].label, "EMAIL");
        assert_eq!(records[0].text, "user@example.com");
    }

    #[test]
    fn test_low_confidence_token_skipped() {
        let tokens = vec![
            token("user@example.com", 59.9, 10, 10, 120, 30),
            token("ABCDE1234F", Token::UNKNOWN_CONFIDENCE, 10, 40, 120, 60),
        ];
        let (regions, records) = match_tokens(&tokens, &rules(&["EMAIL", "PAN"]), 60.0);
        assert!(regions.is_empty());
        assert!(records.is_empty());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let tokens = vec![token("ABCDE1234F", 60.0, 0, 0, 50, 10)];
        let (regions, _) = match_tokens(&tokens, &rules(&["PAN"]), 60.0);
        assert_eq!(regions.len(), 1);
    }

    #[test]
    fn test_first_rule_wins_per_token() {
        // 带 91 前缀的手机号同时也是 12 位数字
        let tokens = vec![token("919876543210", 95.0, 0, 0, 100, 20)];

        let (regions, _) = match_tokens(&tokens, &rules(&["AADHAAR", "PHONE"]), 60.0);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].label, "AADHAAR");

        let (regions, _) = match_tokens(&tokens, &rules(&["PHONE", "AADHAAR"]), 60.0);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].label, "PHONE");

        let (regions, _) = match_tokens(&tokens, &rules(&["EMAIL", "AADHAAR"]), 60.0);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].label, "AADHAAR");
    }

    #[test]
    fn test_name_line_union() {
        let tokens = vec![
            token("Kumar", 80.0, 45, 5, 90, 20),
            token("Ravi", 85.0, 5, 5, 40, 20),
        ];
        let (regions, records) = aggregate_lines(&tokens, &rules(&["NAME"]));

        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].bounds(), PixelRect::new(5, 5, 90, 20));
        assert_eq!(regions[0].label, "NAME");
        assert_eq!(records[0].text, "Ravi Kumar");
        assert_eq!(records[0].conf, 85.0);
    }

    #[test]
    fn test_low_confidence_tokens_still_form_lines() {
        let tokens = vec![
            token("Ravi", Token::UNKNOWN_CONFIDENCE, 5, 5, 40, 20),
            token("Kumar", 30.0, 45, 5, 90, 20),
        ];
        let rules = rules(&["NAME"]);

        let (token_regions, _) = match_tokens(&tokens, &rules, 60.0);
        assert!(token_regions.is_empty());

        let (line_regions, records) = aggregate_lines(&tokens, &rules);
        assert_eq!(line_regions.len(), 1);
        assert_eq!(records[0].conf, 30.0);
    }

    #[test]
    fn test_line_band_grouping() {
        // 14/10=1.4 -> 1，16/10=1.6 -> 2
        assert_eq!(line_key(14), 1);
        assert_eq!(line_key(16), 2);
        // 正好落在半带上时取偶数
        assert_eq!(line_key(25), 2);
        assert_eq!(line_key(35), 4);

        let tokens = vec![
            token("Ravi", 90.0, 5, 12, 40, 30),
            token("Kumar", 90.0, 45, 14, 90, 32),
            token("Sharma", 90.0, 95, 40, 150, 58),
        ];
        let lines = group_lines(&tokens);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), 2);
        assert_eq!(lines[1][0].text, "Sharma");
    }

    #[test]
    fn test_lines_keep_first_seen_order() {
        let tokens = vec![
            token("Lower", 90.0, 0, 100, 40, 120),
            token("Upper", 90.0, 0, 10, 40, 30),
            token("Line", 90.0, 50, 100, 80, 120),
        ];
        let lines = group_lines(&tokens);
        assert_eq!(lines[0][0].text, "Lower");
        assert_eq!(lines[0][1].text, "Line");
        assert_eq!(lines[1][0].text, "Upper");
    }

    #[test]
    fn test_split_aadhaar_caught_on_line() {
        let tokens = vec![
            token("1234", 92.0, 10, 50, 60, 70),
            token("5678", 91.0, 70, 51, 120, 71),
            token("9012", 93.0, 130, 49, 180, 69),
        ];
        let rules = rules(&["AADHAAR"]);
        let (token_regions, _) = match_tokens(&tokens, &rules, 60.0);
        assert!(token_regions.is_empty());

        let (line_regions, records) = aggregate_lines(&tokens, &rules);
        assert_eq!(line_regions.len(), 1);
        assert_eq!(line_regions[0].bounds(), PixelRect::new(10, 49, 180, 71));
        assert_eq!(records[0].text, "1234 5678 9012");
        assert_eq!(records[0].conf, 93.0);
    }

    #[test]
    fn test_resolve_keeps_overlaps() {
        let a = Region::new((10, 10, 120, 30), "EMAIL", "user@example.com", 90.0);
        let b = Region::new((10, 10, 120, 30), "EMAIL", "user@example.com", 90.0);
        let qr = Region::qr(&PixelRect::new(0, 0, 40, 40));

        let all = resolve_regions(vec![a.clone()], vec![b], vec![qr.clone()]);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0], a);
        assert_eq!(all[2], qr);
    }

    #[test]
    fn test_no_rules_no_regions() {
        let tokens = vec![token("user@example.com", 90.0, 10, 10, 120, 30)];
        let empty = rules(&["UNKNOWN"]);
        assert!(match_tokens(&tokens, &empty, 0.0).0.is_empty());
        assert!(aggregate_lines(&tokens, &empty).0.is_empty());
    }
}
