use regex::{Regex, RegexBuilder};

use crate::errors::{SearchError, SearchResult};
use crate::query::{SearchMode, MIN_MULTI_TERMS};

/// Character classes accepted inside bracket expressions (`[[:alpha:]]`)
const POSIX_CLASSES: &[&str] = &[
    "alnum", "alpha", "blank", "cntrl", "digit", "graph", "lower", "print", "punct", "space",
    "upper", "xdigit",
];

/// Strategy for pattern matching
#[derive(Debug, Clone)]
enum MatchStrategy {
    /// One compiled expression: literal, regex, or an alternation of literals
    Single(Regex),
    /// Every expression must match; checked in order, stopping at the first miss
    AllOf(Vec<Regex>),
}

/// Case-insensitive predicate for one of the five search modes.
///
/// Regex modes are compiled with multi-line anchors, so `^` and `$` bind to line
/// boundaries and `.` never crosses a newline. Matching a whole file at once is then
/// equivalent to testing it line by line.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    mode: SearchMode,
    strategy: MatchStrategy,
}

impl PatternMatcher {
    /// Compiles the terms for the given mode.
    ///
    /// Single-pattern modes use the first term. Or/And need at least two terms.
    pub fn new(mode: SearchMode, terms: &[String]) -> SearchResult<Self> {
        let first = terms.first().ok_or(SearchError::EmptyQuery)?;
        if mode.is_multi_term() && terms.len() < MIN_MULTI_TERMS {
            return Err(SearchError::too_few_terms(mode, terms.len()));
        }

        let strategy = match mode {
            SearchMode::Literal => MatchStrategy::Single(compile(&regex::escape(first))?),
            SearchMode::BasicRegex => {
                MatchStrategy::Single(compile(&translate(first, Flavor::Basic)?)?)
            }
            SearchMode::ExtendedRegex => {
                MatchStrategy::Single(compile(&translate(first, Flavor::Extended)?)?)
            }
            SearchMode::Or => {
                let alternation = terms
                    .iter()
                    .map(|t| regex::escape(t))
                    .collect::<Vec<_>>()
                    .join("|");
                MatchStrategy::Single(compile(&alternation)?)
            }
            SearchMode::And => MatchStrategy::AllOf(
                terms
                    .iter()
                    .map(|t| compile(&regex::escape(t)))
                    .collect::<SearchResult<_>>()?,
            ),
        };

        Ok(Self { mode, strategy })
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    /// Whether the text satisfies the pattern anywhere
    pub fn is_match(&self, haystack: &str) -> bool {
        match &self.strategy {
            MatchStrategy::Single(regex) => regex.is_match(haystack),
            MatchStrategy::AllOf(regexes) => regexes.iter().all(|r| r.is_match(haystack)),
        }
    }
}

/// Case-insensitive substring test used by the name phase.
/// `needle_lower` must already be lowercased.
pub fn name_contains(name: &str, needle_lower: &str) -> bool {
    name.to_lowercase().contains(needle_lower)
}

fn compile(pattern: &str) -> SearchResult<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .multi_line(true)
        .crlf(true)
        .build()
        .map_err(|e| SearchError::invalid_pattern(e.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Basic,
    Extended,
}

/// Rewrites a POSIX basic or extended regular expression in `regex` crate syntax.
///
/// In the basic flavor `+`, `?`, `|`, `(`, `)`, `{` and `}` are literal, while the
/// backslashed forms `\(`, `\)`, `\{`, `\}`, `\|`, `\+` and `\?` are operators (GNU
/// behaviour). A `*` at the start of an expression or group is literal in both
/// flavors. Back-references have no equivalent and are rejected.
fn translate(pattern: &str, flavor: Flavor) -> SearchResult<String> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut i = 0;
    // True where a `^` is an anchor and a repetition operator has nothing to repeat
    let mut at_start = true;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                let next = *chars
                    .get(i + 1)
                    .ok_or_else(|| SearchError::invalid_pattern("trailing backslash"))?;
                i += 2;
                match (flavor, next) {
                    (_, '1'..='9') => {
                        return Err(SearchError::invalid_pattern(format!(
                            "back-reference \\{} is not supported",
                            next
                        )));
                    }
                    (_, '<' | '>') => {
                        out.push_str(r"\b");
                        continue;
                    }
                    (_, 'b' | 'B' | 'w' | 'W' | 's' | 'S') => {
                        out.push('\\');
                        out.push(next);
                    }
                    (Flavor::Basic, '(') => {
                        out.push('(');
                        at_start = true;
                        continue;
                    }
                    (Flavor::Basic, ')') => out.push(')'),
                    (Flavor::Basic, '|') => {
                        out.push('|');
                        at_start = true;
                        continue;
                    }
                    (Flavor::Basic, '+' | '?') if !at_start => out.push(next),
                    (Flavor::Basic, '{') if !at_start => {
                        let (interval, end) = parse_interval(&chars, i, flavor).ok_or_else(
                            || SearchError::invalid_pattern("malformed \\{ \\} interval"),
                        )?;
                        out.push_str(&interval);
                        i = end;
                    }
                    _ => push_literal(&mut out, next),
                }
                at_start = false;
            }
            '[' => {
                let (class, end) = translate_bracket(&chars, i + 1)?;
                out.push_str(&class);
                i = end;
                at_start = false;
            }
            '.' => {
                out.push('.');
                i += 1;
                at_start = false;
            }
            '*' => {
                if at_start {
                    out.push_str(r"\*");
                } else {
                    out.push('*');
                }
                i += 1;
                at_start = false;
            }
            '^' => {
                if at_start {
                    out.push('^');
                } else {
                    out.push_str(r"\^");
                }
                i += 1;
            }
            '$' => {
                let anchors = match flavor {
                    Flavor::Extended => true,
                    Flavor::Basic => {
                        i + 1 == chars.len()
                            || matches!(
                                (chars.get(i + 1), chars.get(i + 2)),
                                (Some('\\'), Some(')' | '|'))
                            )
                    }
                };
                if anchors {
                    out.push('$');
                } else {
                    out.push_str(r"\$");
                }
                i += 1;
                at_start = false;
            }
            '(' if flavor == Flavor::Extended => {
                out.push('(');
                i += 1;
                at_start = true;
            }
            ')' if flavor == Flavor::Extended => {
                out.push(')');
                i += 1;
                at_start = false;
            }
            '|' if flavor == Flavor::Extended => {
                out.push('|');
                i += 1;
                at_start = true;
            }
            '+' | '?' if flavor == Flavor::Extended && !at_start => {
                out.push(c);
                i += 1;
            }
            '{' if flavor == Flavor::Extended && !at_start => {
                match parse_interval(&chars, i + 1, flavor) {
                    Some((interval, end)) => {
                        out.push_str(&interval);
                        i = end;
                    }
                    None => {
                        push_literal(&mut out, '{');
                        i += 1;
                    }
                }
                at_start = false;
            }
            _ => {
                push_literal(&mut out, c);
                i += 1;
                at_start = false;
            }
        }
    }

    Ok(out)
}

fn push_literal(out: &mut String, c: char) {
    let mut buf = [0u8; 4];
    out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
}

/// Parses `m}`, `m,}`, `,n}` or `m,n}` starting just after the opening brace.
/// The basic flavor expects `\}` as the closing token. Returns the normalized
/// interval and the index after the closing token.
fn parse_interval(chars: &[char], start: usize, flavor: Flavor) -> Option<(String, usize)> {
    let mut i = start;
    let mut min = String::new();
    let mut max = String::new();
    let mut seen_comma = false;

    loop {
        let c = *chars.get(i)?;
        match c {
            '0'..='9' if seen_comma => max.push(c),
            '0'..='9' => min.push(c),
            ',' if !seen_comma => seen_comma = true,
            '\\' if flavor == Flavor::Basic && chars.get(i + 1) == Some(&'}') => {
                i += 2;
                break;
            }
            '}' if flavor == Flavor::Extended => {
                i += 1;
                break;
            }
            _ => return None,
        }
        i += 1;
    }

    if min.is_empty() && max.is_empty() {
        return None;
    }
    let min = if min.is_empty() { "0".to_string() } else { min };
    let interval = match (seen_comma, max.is_empty()) {
        (false, _) => format!("{{{}}}", min),
        (true, true) => format!("{{{},}}", min),
        (true, false) => {
            if min.parse::<u32>().ok()? > max.parse::<u32>().ok()? {
                return None;
            }
            format!("{{{},{}}}", min, max)
        }
    };
    Some((interval, i))
}

#[derive(Debug)]
enum BracketItem {
    Char(char),
    Range(char, char),
    Class(String),
}

/// Translates a bracket expression whose body starts at `start` (just after `[`).
/// Backslash is an ordinary character inside brackets, as POSIX specifies.
fn translate_bracket(chars: &[char], start: usize) -> SearchResult<(String, usize)> {
    let unterminated = || SearchError::invalid_pattern("unterminated bracket expression");
    let mut i = start;
    let mut out = String::from("[");

    if chars.get(i) == Some(&'^') {
        out.push('^');
        i += 1;
    }

    let mut items = Vec::new();
    let mut first = true;
    loop {
        let c = *chars.get(i).ok_or_else(unterminated)?;
        if c == ']' && !first {
            i += 1;
            break;
        }
        first = false;

        let (item, next) = bracket_atom(chars, i)?;
        i = next;

        let is_range = chars.get(i) == Some(&'-') && chars.get(i + 1).is_some_and(|&n| n != ']');
        match (item, is_range) {
            (BracketItem::Char(low), true) => {
                let (end, next) = bracket_atom(chars, i + 1)?;
                let BracketItem::Char(high) = end else {
                    return Err(SearchError::invalid_pattern("invalid range endpoint"));
                };
                if low > high {
                    return Err(SearchError::invalid_pattern(format!(
                        "invalid range {}-{}",
                        low, high
                    )));
                }
                items.push(BracketItem::Range(low, high));
                i = next;
            }
            (item, _) => items.push(item),
        }
    }

    for item in items {
        match item {
            BracketItem::Char(c) => push_class_char(&mut out, c),
            BracketItem::Range(low, high) => {
                push_class_char(&mut out, low);
                out.push('-');
                push_class_char(&mut out, high);
            }
            BracketItem::Class(name) => {
                out.push_str("[:");
                out.push_str(&name);
                out.push_str(":]");
            }
        }
    }
    out.push(']');
    Ok((out, i))
}

fn bracket_atom(chars: &[char], i: usize) -> SearchResult<(BracketItem, usize)> {
    let c = *chars
        .get(i)
        .ok_or_else(|| SearchError::invalid_pattern("unterminated bracket expression"))?;

    if c == '[' {
        if let Some(&kind @ (':' | '=' | '.')) = chars.get(i + 1) {
            let body_start = i + 2;
            let close = (body_start..chars.len().saturating_sub(1))
                .find(|&j| chars[j] == kind && chars[j + 1] == ']')
                .ok_or_else(|| SearchError::invalid_pattern("unterminated [: :] expression"))?;
            let body: String = chars[body_start..close].iter().collect();

            let item = if kind == ':' {
                if !POSIX_CLASSES.contains(&body.as_str()) {
                    return Err(SearchError::invalid_pattern(format!(
                        "unknown character class [:{}:]",
                        body
                    )));
                }
                BracketItem::Class(body)
            } else {
                let mut body_chars = body.chars();
                match (body_chars.next(), body_chars.next()) {
                    (Some(single), None) => BracketItem::Char(single),
                    _ => {
                        return Err(SearchError::invalid_pattern(format!(
                            "unsupported collating element [{}{}{}]",
                            kind, body, kind
                        )));
                    }
                }
            };
            return Ok((item, close + 2));
        }
    }

    Ok((BracketItem::Char(c), i + 1))
}

fn push_class_char(out: &mut String, c: char) {
    if matches!(c, '\\' | ']' | '[' | '^' | '-' | '&' | '~') {
        out.push('\\');
    }
    out.push(c);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(mode: SearchMode, terms: &[&str]) -> PatternMatcher {
        let terms: Vec<String> = terms.iter().map(|s| s.to_string()).collect();
        PatternMatcher::new(mode, &terms).unwrap()
    }

    fn bre(pattern: &str) -> PatternMatcher {
        matcher(SearchMode::BasicRegex, &[pattern])
    }

    fn ere(pattern: &str) -> PatternMatcher {
        matcher(SearchMode::ExtendedRegex, &[pattern])
    }

    #[test]
    fn test_literal_is_case_insensitive_substring() {
        let m = matcher(SearchMode::Literal, &["Hello"]);
        assert!(m.is_match("oh, hello world"));
        assert!(m.is_match("HELLO"));
        assert!(!m.is_match("help"));
    }

    #[test]
    fn test_literal_ignores_metacharacters() {
        let m = matcher(SearchMode::Literal, &["a.b*(c)"]);
        assert!(m.is_match("x a.b*(c) y"));
        assert!(!m.is_match("axbbc"));
    }

    #[test]
    fn test_basic_regex_operators() {
        assert!(bre("ab*c").is_match("ac"));
        assert!(bre("ab*c").is_match("ABBBC"));
        assert!(bre("h.llo").is_match("hallo"));
        assert!(bre(r"\(ab\)\{2\}").is_match("xxababxx"));
        assert!(bre(r"[[:digit:]]\{3\}").is_match("id 123"));
        assert!(!bre(r"[[:digit:]]\{3\}").is_match("id 12"));
        assert!(bre(r"cat\|dog").is_match("hotdog"));
    }

    #[test]
    fn test_basic_regex_literal_characters() {
        assert!(bre("a+").is_match("a+"));
        assert!(!bre("a+").is_match("aa"));
        assert!(bre("colou?r").is_match("colou?r"));
        assert!(!bre("colou?r").is_match("color"));
        assert!(bre("cat|dog").is_match("cat|dog"));
        assert!(!bre("cat|dog").is_match("dog"));
        assert!(bre("f(x)").is_match("f(x)"));
        assert!(bre("*star").is_match("a *star"));
        assert!(bre("a^b$c").is_match("a^b$c"));
    }

    #[test]
    fn test_anchors_bind_to_lines() {
        let text = "first line\nsecond line\n";
        assert!(bre("^second").is_match(text));
        assert!(bre("first line$").is_match(text));
        assert!(!bre("^line").is_match(text));
        assert!(ere("^second line$").is_match("first\r\nsecond line\r\n"));
    }

    #[test]
    fn test_dot_does_not_cross_lines() {
        assert!(!bre("first.second").is_match("first\nsecond"));
    }

    #[test]
    fn test_extended_regex_operators() {
        assert!(ere("colou?r").is_match("COLOR"));
        assert!(ere("cat|dog").is_match("hotdog"));
        assert!(ere("(ab){2}").is_match("abab"));
        assert!(!ere("^(ab){3}$").is_match("abab"));
        assert!(ere("a{,2}b").is_match("b"));
        assert!(ere("go+gle").is_match("gooogle"));
    }

    #[test]
    fn test_extended_regex_literal_brace() {
        assert!(ere("a{b").is_match("a{b"));
        assert!(ere(r"\(x\)").is_match("(x)"));
        assert!(ere(r"1\+1").is_match("1+1"));
    }

    #[test]
    fn test_bracket_expressions() {
        assert!(bre("[]a]").is_match("]"));
        assert!(bre(r"[a\]").is_match(r"\"));
        assert!(bre("[^0-9]").is_match("5x"));
        assert!(!bre("^[^0-9]*$").is_match("12"));
        assert!(bre("[a-]").is_match("-"));
        assert!(ere("[&~]").is_match("~"));
        assert!(bre("[[:upper:]]").is_match("x"));
        assert!(bre("[[.-.]]").is_match("-"));
    }

    #[test]
    fn test_invalid_patterns() {
        let terms = |p: &str| vec![p.to_string()];
        for (mode, pattern) in [
            (SearchMode::BasicRegex, r"\(a\)\1"),
            (SearchMode::ExtendedRegex, r"(a)\1"),
            (SearchMode::BasicRegex, "[abc"),
            (SearchMode::BasicRegex, "[[:nope:]]"),
            (SearchMode::BasicRegex, "[z-a]"),
            (SearchMode::BasicRegex, r"a\{x\}"),
            (SearchMode::ExtendedRegex, "abc\\"),
            (SearchMode::ExtendedRegex, "(open"),
        ] {
            let result = PatternMatcher::new(mode, &terms(pattern));
            assert!(
                matches!(result, Err(SearchError::InvalidPattern(_))),
                "expected {:?} to be rejected in {} mode",
                pattern,
                mode
            );
        }
    }

    #[test]
    fn test_or_mode() {
        let m = matcher(SearchMode::Or, &["foo", "bar"]);
        assert!(m.is_match("only BAR here"));
        assert!(m.is_match("foo"));
        assert!(!m.is_match("neither"));

        let m = matcher(SearchMode::Or, &["a.b", "c|d"]);
        assert!(!m.is_match("axb c"));
        assert!(m.is_match("c|d"));
    }

    #[test]
    fn test_and_mode() {
        let m = matcher(SearchMode::And, &["foo", "bar"]);
        assert!(!m.is_match("only foo"));
        assert!(m.is_match("Bar\n...\nfoo"));
    }

    #[test]
    fn test_multi_term_requires_two_terms() {
        for mode in [SearchMode::Or, SearchMode::And] {
            let err = PatternMatcher::new(mode, &["foo".to_string()]).unwrap_err();
            assert!(matches!(err, SearchError::TooFewTerms { found: 1, .. }));
        }
        assert!(matches!(
            PatternMatcher::new(SearchMode::Literal, &[]),
            Err(SearchError::EmptyQuery)
        ));
    }

    #[test]
    fn test_name_contains() {
        assert!(name_contains("Report.TXT", "report"));
        assert!(!name_contains("notes.md", "report"));
    }
}
