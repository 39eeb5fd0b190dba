//! Lexical scanner for PromQL expressions as they appear in dashboard panels.
//!
//! Not a parser: it splits an expression into lexemes and
//! tags every identifier as a metric candidate, a function name, or other
//! syntax (keywords, label names, literals). Everything downstream works on the
//! candidate list plus the raw expression text.

use std::collections::HashSet;

use thiserror::Error;

/// Aggregation operators. Never metric names, with or without a call paren.
const AGGREGATIONS: &[&str] = &[
    "sum",
    "min",
    "max",
    "avg",
    "group",
    "stddev",
    "stdvar",
    "count",
    "count_values",
    "bottomk",
    "topk",
    "quantile",
    "limitk",
    "limit_ratio",
];

/// Modifiers and set operators.
const KEYWORDS: &[&str] = &[
    "by",
    "without",
    "on",
    "ignoring",
    "group_left",
    "group_right",
    "bool",
    "offset",
    "and",
    "or",
    "unless",
    "atan2",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    MetricCandidate,
    FunctionName,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub text: &'a str,
    pub kind: TokenKind,
    /// Byte offset of `text` in the scanned expression.
    pub start: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LexError {
    #[error("unterminated string literal starting at offset {offset}")]
    UnterminatedString { offset: usize },
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },
    #[error("unbalanced '{ch}' at offset {offset}")]
    Unbalanced { ch: char, offset: usize },
}

/// True for aggregation operators, including the `sumby` / `countwithout`
/// fusions that appear once whitespace has been stripped from a query.
pub fn is_builtin_aggregation(ident: &str) -> bool {
    AGGREGATIONS.iter().any(|agg| match ident.strip_prefix(agg) {
        Some(rest) => rest.is_empty() || rest == "by" || rest == "without",
        None => false,
    })
}

/// Scan `expr` into lexemes, left to right. Whitespace and `#` comments are
/// dropped; every other lexeme becomes a token.
pub fn tokenize(expr: &str) -> Result<Vec<Token<'_>>, LexError> {
    Lexer::new(expr).run()
}

/// Distinct metric-candidate identifiers of `expr` in first-seen order.
pub fn metric_candidates(expr: &str) -> Result<Vec<&str>, LexError> {
    let mut seen = HashSet::new();
    Ok(tokenize(expr)?
        .into_iter()
        .filter(|t| t.kind == TokenKind::MetricCandidate)
        .map(|t| t.text)
        .filter(|text| !text.is_empty() && !is_builtin_aggregation(text))
        .filter(|text| seen.insert(*text))
        .collect())
}

/// Progress through a `__name__="..."` matcher inside a label set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameMatcher {
    Idle,
    Label,
    Equals,
}

struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    nesting: Vec<u8>,
    name_matcher: NameMatcher,
    tokens: Vec<Token<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            nesting: Vec::new(),
            name_matcher: NameMatcher::Idle,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token<'a>>, LexError> {
        while let Some(b) = self.peek() {
            let start = self.pos;
            match b {
                b' ' | b'\t' | b'\n' | b'\r' => self.pos += 1,
                b'#' => self.skip_comment(),
                b'"' | b'\'' | b'`' => self.string(start)?,
                b'$' => self.variable(start),
                b'0'..=b'9' => self.number(start),
                b'.' if self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) => self.number(start),
                b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.identifier(start),
                b'(' | b'{' | b'[' => {
                    self.pos += 1;
                    self.push(start, TokenKind::Other);
                    self.nesting.push(b);
                }
                b')' | b'}' | b']' => self.close(b, start)?,
                b'+' | b'-' | b'*' | b'/' | b'%' | b'^' | b'=' | b'!' | b'<' | b'>' | b'~'
                | b',' | b':' | b'@' => self.operator(b, start),
                _ => self.other_char(start)?,
            }
        }
        Ok(self.tokens)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    /// First byte at or after the cursor that is not ASCII whitespace.
    fn next_significant(&self) -> Option<u8> {
        self.bytes[self.pos..]
            .iter()
            .copied()
            .find(|b| !b.is_ascii_whitespace())
    }

    fn push(&mut self, start: usize, kind: TokenKind) {
        self.push_slice(start, self.pos, kind);
    }

    fn push_slice(&mut self, start: usize, end: usize, kind: TokenKind) {
        self.tokens.push(Token {
            text: &self.src[start..end],
            kind,
            start,
        });
        self.name_matcher = NameMatcher::Idle;
    }

    fn skip_comment(&mut self) {
        while let Some(b) = self.peek() {
            if b == b'\n' {
                break;
            }
            self.pos += 1;
        }
    }

    fn string(&mut self, start: usize) -> Result<(), LexError> {
        let quote = self.bytes[start];
        self.pos += 1;
        loop {
            match self.peek() {
                None => return Err(LexError::UnterminatedString { offset: start }),
                Some(b'\\') if quote != b'`' => {
                    self.pos = (self.pos + 2).min(self.bytes.len());
                }
                Some(b) if b == quote => {
                    self.pos += 1;
                    break;
                }
                Some(_) => self.pos += 1,
            }
        }

        // {__name__="metric"} names a metric through its value.
        if self.name_matcher == NameMatcher::Equals && self.pos - start > 2 {
            self.push_slice(start + 1, self.pos - 1, TokenKind::MetricCandidate);
        } else {
            self.push(start, TokenKind::Other);
        }
        Ok(())
    }

    /// Grafana template variables: `$var`, `$__interval`, `${var:csv}`.
    fn variable(&mut self, start: usize) {
        self.pos += 1;
        if self.peek() == Some(b'{') {
            while let Some(b) = self.peek() {
                self.pos += 1;
                if b == b'}' {
                    break;
                }
            }
        } else {
            while self.peek().is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_') {
                self.pos += 1;
            }
        }
        self.push(start, TokenKind::Other);
    }

    /// Numbers, durations (`5m`, `1h30m`) and hex/exponent forms.
    fn number(&mut self, start: usize) {
        while let Some(b) = self.peek() {
            let exponent_sign = matches!(b, b'+' | b'-')
                && matches!(self.bytes[self.pos - 1], b'e' | b'E')
                && self.peek_at(1).is_some_and(|n| n.is_ascii_digit());
            if b.is_ascii_alphanumeric() || b == b'.' || b == b'_' || exponent_sign {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.push(start, TokenKind::Other);
    }

    fn identifier(&mut self, start: usize) {
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b':')
        {
            self.pos += 1;
        }
        let text = &self.src[start..self.pos];
        let kind = self.classify(text);
        self.push(start, kind);

        if text == "__name__" && self.nesting.last() == Some(&b'{') {
            self.name_matcher = NameMatcher::Label;
        }
    }

    fn classify(&self, text: &str) -> TokenKind {
        // Label names and range/subquery internals are never metrics.
        if matches!(self.nesting.last(), Some(b'{') | Some(b'[')) {
            return TokenKind::Other;
        }
        if KEYWORDS.contains(&text) || is_number_literal(text) {
            TokenKind::Other
        } else if self.next_significant() == Some(b'(') || is_builtin_aggregation(text) {
            TokenKind::FunctionName
        } else {
            TokenKind::MetricCandidate
        }
    }

    fn close(&mut self, b: u8, start: usize) -> Result<(), LexError> {
        let opener = match b {
            b')' => b'(',
            b'}' => b'{',
            _ => b'[',
        };
        if self.nesting.pop() != Some(opener) {
            return Err(LexError::Unbalanced {
                ch: b as char,
                offset: start,
            });
        }
        self.pos += 1;
        self.push(start, TokenKind::Other);
        Ok(())
    }

    fn operator(&mut self, b: u8, start: usize) {
        let equals_name =
            b == b'=' && self.name_matcher == NameMatcher::Label && self.peek_at(1) != Some(b'~');
        self.pos += 1;
        self.push(start, TokenKind::Other);
        if equals_name {
            self.name_matcher = NameMatcher::Equals;
        }
    }

    fn other_char(&mut self, start: usize) -> Result<(), LexError> {
        let ch = self.src[start..].chars().next().unwrap_or(char::REPLACEMENT_CHARACTER);
        if ch.is_whitespace() {
            self.pos += ch.len_utf8();
            return Ok(());
        }
        Err(LexError::UnexpectedChar { ch, offset: start })
    }
}

fn is_number_literal(text: &str) -> bool {
    text.eq_ignore_ascii_case("inf") || text.eq_ignore_ascii_case("nan")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(expr: &str) -> Vec<(&str, TokenKind)> {
        tokenize(expr)
            .unwrap()
            .into_iter()
            .filter(|t| t.kind != TokenKind::Other || t.text.chars().all(|c| c.is_alphanumeric() || c == '_'))
            .map(|t| (t.text, t.kind))
            .collect()
    }

    #[test]
    fn classifies_aggregation_and_grouping() {
        let tokens = kinds("sum(rate(http_requests_total[5m])) by (status)");
        assert_eq!(
            tokens,
            vec![
                ("sum", TokenKind::FunctionName),
                ("rate", TokenKind::FunctionName),
                ("http_requests_total", TokenKind::MetricCandidate),
                ("5m", TokenKind::Other),
                ("by", TokenKind::Other),
                ("status", TokenKind::MetricCandidate),
            ]
        );
    }

    #[test]
    fn label_names_are_not_candidates() {
        let candidates =
            metric_candidates(r#"node_cpu_seconds_total{mode!="idle", instance=~"$node"}"#).unwrap();
        assert_eq!(candidates, vec!["node_cpu_seconds_total"]);
    }

    #[test]
    fn name_matcher_value_is_a_candidate() {
        let candidates = metric_candidates(r#"{__name__="up", job="api"}"#).unwrap();
        assert_eq!(candidates, vec!["up"]);

        let regex = metric_candidates(r#"{__name__=~"up|down"}"#).unwrap();
        assert!(regex.is_empty());
    }

    #[test]
    fn fused_aggregations_are_dropped() {
        assert!(is_builtin_aggregation("sumby"));
        assert!(is_builtin_aggregation("countwithout"));
        assert!(is_builtin_aggregation("max"));
        assert!(!is_builtin_aggregation("summary_total"));

        let candidates = metric_candidates("sumby(job)(up)").unwrap();
        assert_eq!(candidates, vec!["job", "up"]);
    }

    #[test]
    fn grafana_variables_and_literals_are_other() {
        let candidates = metric_candidates(
            r#"rate(container_cpu_usage_seconds_total{pod=~"$pod"}[$__rate_interval]) * 100 > bool 0.5e-3"#,
        )
        .unwrap();
        assert_eq!(candidates, vec!["container_cpu_usage_seconds_total"]);
    }

    #[test]
    fn candidates_are_deduplicated_in_order() {
        let candidates = metric_candidates("b_total / a_total + b_total").unwrap();
        assert_eq!(candidates, vec!["b_total", "a_total"]);
    }

    #[test]
    fn namespaced_identifiers_stay_whole() {
        let candidates = metric_candidates("namespace:cpu_usage:rate5m").unwrap();
        assert_eq!(candidates, vec!["namespace:cpu_usage:rate5m"]);
    }

    #[test]
    fn offsets_point_into_the_raw_expression() {
        let expr = "sum  by (job) (up)";
        let tokens = tokenize(expr).unwrap();
        let up = tokens.iter().find(|t| t.text == "up").unwrap();
        assert_eq!(up.start, expr.find("up").unwrap());
        let job = tokens.iter().find(|t| t.text == "job").unwrap();
        assert_eq!(&expr[job.start..job.start + 3], "job");
    }

    #[test]
    fn escaped_quotes_do_not_end_strings() {
        let candidates = metric_candidates(r#"up{path="a\"b"} + down"#).unwrap();
        assert_eq!(candidates, vec!["up", "down"]);
    }

    #[test]
    fn comments_are_skipped() {
        let candidates = metric_candidates("up # trailing note with words\n + down").unwrap();
        assert_eq!(candidates, vec!["up", "down"]);
    }

    #[test]
    fn unterminated_string_fails() {
        let err = tokenize(r#"up{job="api}"#).unwrap_err();
        assert_eq!(err, LexError::UnterminatedString { offset: 7 });
    }

    #[test]
    fn unexpected_character_fails() {
        let err = tokenize("up; down").unwrap_err();
        assert_eq!(err, LexError::UnexpectedChar { ch: ';', offset: 2 });
    }

    #[test]
    fn stray_closer_fails_but_unclosed_is_tolerated() {
        assert!(matches!(
            tokenize("up)").unwrap_err(),
            LexError::Unbalanced { ch: ')', offset: 2 }
        ));
        assert_eq!(metric_candidates("sum(rate(up[5m]").unwrap(), vec!["up"]);
    }
}
