//! Fragment detection inside mixed-format text.
//!
//! The detector walks the buffer once. At every position it tries the
//! rules in [`RULES`] order and takes the first one that matches; each rule
//! consumes the longest span it can. Positions no rule claims accumulate
//! into a [`FragmentPayload::RawText`] fragment, so the output always
//! covers the whole buffer with no gaps or overlaps.
//!
//! | Rule | Starts at | Span |
//! |------|-----------|------|
//! | JSON | `{` or `[` | balanced brackets that parse (tolerantly) |
//! | HTML table | `<table` | through the matching `</table>` |
//! | CSV | line start | ≥ N lines with equal delimiter counts |
//! | Key-value | line start | ≥ N consecutive `key: value` / `key=value` lines |
//!
//! JSON must win ties: a JSON blob full of `key: value` pairs would
//! otherwise be claimed by the key-value rule.
//!
//! Bracket and `<table>` pairs are matched once up front with a stack, so a
//! failed opener costs a map lookup rather than a rescan of the tail.
//! Quotes only open a string inside an open bracket. A string still open at
//! a newline or at the end of the buffer was a stray quote.

use std::collections::HashMap;

use crate::models::{Fragment, FragmentPayload, Span, Table, Warning, WarningKind};

/// Detector rules in tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Json,
    HtmlTable,
    Csv,
    KeyValue,
}

/// The fixed priority order. Do not reorder.
pub const RULES: [Rule; 4] = [Rule::Json, Rule::HtmlTable, Rule::Csv, Rule::KeyValue];

/// Longest key accepted in a key-value line.
const MAX_KEY_LEN: usize = 64;

/// Tuning knobs for the line-based rules.
#[derive(Debug, Clone)]
pub struct DetectOptions {
    /// Minimum consecutive lines for CSV and key-value blocks.
    pub min_block_lines: usize,
    /// Candidate CSV delimiters; earlier entries win ties.
    pub csv_delimiters: Vec<char>,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            min_block_lines: 2,
            csv_delimiters: vec![',', ';', '\t'],
        }
    }
}

/// Detector output: ordered fragments plus non-fatal warnings.
#[derive(Debug, Clone, Default)]
pub struct Detection {
    pub fragments: Vec<Fragment>,
    pub warnings: Vec<Warning>,
}

/// Segment `text` with the default options.
pub fn detect(text: &str) -> Detection {
    detect_with(text, &DetectOptions::default())
}

/// Segment `text` into typed fragments.
pub fn detect_with(text: &str, options: &DetectOptions) -> Detection {
    let mut scanner = Scanner {
        text,
        options,
        warnings: Vec::new(),
        quiet_until: 0,
        json_ends: bracket_matches(text),
        table_ends: table_matches(text.as_bytes()),
    };
    let mut fragments = Vec::new();
    let mut raw_start: Option<usize> = None;
    let mut pos = 0;

    while pos < text.len() {
        match scanner.match_at(pos) {
            Some((end, payload)) => {
                if let Some(start) = raw_start.take() {
                    fragments.push(raw_fragment(start, pos));
                }
                fragments.push(Fragment {
                    span: Span::new(pos, end),
                    payload,
                });
                pos = end;
            }
            None => {
                raw_start.get_or_insert(pos);
                pos += text[pos..].chars().next().map(char::len_utf8).unwrap_or(1);
            }
        }
    }
    if let Some(start) = raw_start {
        fragments.push(raw_fragment(start, text.len()));
    }

    absorb_whitespace(text, &mut fragments);

    Detection {
        fragments,
        warnings: scanner.warnings,
    }
}

fn raw_fragment(start: usize, end: usize) -> Fragment {
    Fragment {
        span: Span::new(start, end),
        payload: FragmentPayload::RawText,
    }
}

/// Fold whitespace-only raw residue (blank lines, the newline after a JSON
/// blob) into the neighbouring fragment. Spans stay contiguous.
fn absorb_whitespace(text: &str, fragments: &mut Vec<Fragment>) {
    let mut i = 0;
    while i < fragments.len() {
        let f = &fragments[i];
        let blank = matches!(f.payload, FragmentPayload::RawText)
            && f.text(text).trim().is_empty()
            && fragments.len() > 1;
        if !blank {
            i += 1;
            continue;
        }
        let span = f.span;
        if i > 0 {
            fragments[i - 1].span.end = span.end;
        } else {
            fragments[i + 1].span.start = span.start;
        }
        fragments.remove(i);
    }
}

struct Scanner<'a> {
    text: &'a str,
    options: &'a DetectOptions,
    warnings: Vec<Warning>,
    /// Suppress repeat warnings for positions inside an already-reported region.
    quiet_until: usize,
    /// Opener offset to the offset just past its closing bracket.
    json_ends: HashMap<usize, usize>,
    /// `<table` offset to the offset just past its matching `</table>`.
    table_ends: HashMap<usize, usize>,
}

impl<'a> Scanner<'a> {
    fn match_at(&mut self, pos: usize) -> Option<(usize, FragmentPayload)> {
        let at_line_start = pos == 0 || self.text.as_bytes()[pos - 1] == b'\n';
        for rule in RULES {
            let found = match rule {
                Rule::Json => self.json_at(pos),
                Rule::HtmlTable => self.table_at(pos),
                Rule::Csv if at_line_start => self.csv_at(pos),
                Rule::KeyValue if at_line_start => self.kv_at(pos),
                _ => None,
            };
            if found.is_some() {
                return found;
            }
        }
        None
    }

    fn warn(&mut self, start: usize, end: usize, message: String) {
        if start < self.quiet_until {
            return;
        }
        self.quiet_until = end;
        tracing::debug!(start, end, "{}", message);
        self.warnings
            .push(Warning::new(WarningKind::Detection, message).at(Span::new(start, end)));
    }

    // ── JSON ────────────────────────────────────────────────────────────

    fn json_at(&mut self, pos: usize) -> Option<(usize, FragmentPayload)> {
        let opener = self.text.as_bytes()[pos];
        if opener != b'{' && opener != b'[' {
            return None;
        }
        let Some(&end) = self.json_ends.get(&pos) else {
            if opener == b'{' {
                self.warn(
                    pos,
                    self.text.len(),
                    format!("unbalanced '{{' at offset {}; kept as text", pos),
                );
            }
            return None;
        };
        match parse_tolerant(&self.text[pos..end]) {
            Some(value) if is_record_shaped(&value) => Some((end, FragmentPayload::Json(value))),
            _ => {
                if opener == b'{' {
                    self.warn(
                        pos,
                        end,
                        format!("region {}..{} looks like JSON but does not parse", pos, end),
                    );
                }
                None
            }
        }
    }

    // ── HTML tables ─────────────────────────────────────────────────────

    fn table_at(&mut self, pos: usize) -> Option<(usize, FragmentPayload)> {
        let text = self.text;
        let bytes = text.as_bytes();
        if !starts_with_ci(&bytes[pos..], b"<table") {
            return None;
        }
        match bytes.get(pos + 6) {
            Some(b) if b.is_ascii_whitespace() || *b == b'>' => {}
            _ => return None,
        }
        let Some(&end) = self.table_ends.get(&pos) else {
            self.warn(
                pos,
                self.text.len(),
                format!("<table> at offset {} is never closed; kept as text", pos),
            );
            return None;
        };
        match parse_html_table(&text[pos..end]) {
            Ok(table) => Some((end, FragmentPayload::HtmlTable(table))),
            Err(e) => {
                self.warn(
                    pos,
                    end,
                    format!("table {}..{} could not be parsed: {}", pos, end, e),
                );
                None
            }
        }
    }

    // ── CSV ─────────────────────────────────────────────────────────────

    fn csv_at(&self, pos: usize) -> Option<(usize, FragmentPayload)> {
        let mut best: Option<(char, usize, usize)> = None; // (delimiter, lines, end)
        for &delimiter in &self.options.csv_delimiters {
            let (count, end) = self.csv_run(pos, delimiter);
            if count >= self.options.min_block_lines
                && best.map(|(_, n, _)| count > n).unwrap_or(true)
            {
                best = Some((delimiter, count, end));
            }
        }
        let (delimiter, _, end) = best?;
        let lines = lines_in(self.text, pos, end)
            .map(|line| split_delimited(line, delimiter))
            .collect();
        Some((end, FragmentPayload::Csv { delimiter, lines }))
    }

    /// Number of consecutive lines from `pos` sharing the first line's
    /// non-zero delimiter count, and the offset just past the last one.
    fn csv_run(&self, pos: usize, delimiter: char) -> (usize, usize) {
        let mut expected = None;
        let mut count = 0;
        let mut end = pos;
        let mut cursor = pos;
        while cursor < self.text.len() {
            let (content_end, next) = line_bounds(self.text, cursor);
            let line = &self.text[cursor..content_end];
            if is_blank_or_structured(line) {
                break;
            }
            let n = count_outside_quotes(line, delimiter);
            match expected {
                None if n == 0 => break,
                None => expected = Some(n),
                Some(e) if e != n => break,
                Some(_) => {}
            }
            count += 1;
            end = next;
            cursor = next;
        }
        (count, end)
    }

    // ── Key-value ───────────────────────────────────────────────────────

    fn kv_at(&self, pos: usize) -> Option<(usize, FragmentPayload)> {
        let mut pairs = Vec::new();
        let mut end = pos;
        let mut cursor = pos;
        while cursor < self.text.len() {
            let (content_end, next) = line_bounds(self.text, cursor);
            match parse_kv_line(&self.text[cursor..content_end]) {
                Some(pair) => pairs.push(pair),
                None => break,
            }
            end = next;
            cursor = next;
        }
        if pairs.len() < self.options.min_block_lines {
            return None;
        }
        Some((end, FragmentPayload::KeyValue(pairs)))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// JSON helpers
// ═══════════════════════════════════════════════════════════════════════

/// Match every `{`/`[` to the bracket that closes it in one pass.
///
/// Double-quoted strings and escapes are honoured inside brackets. JSON
/// strings cannot hold a raw newline, so when a line or the buffer ends
/// inside one, the quote that opened it is skipped and the pass resumes just
/// after it. The stack never changes inside a string, so nothing needs
/// undoing.
fn bracket_matches(text: &str) -> HashMap<usize, usize> {
    let bytes = text.as_bytes();
    let mut matches = HashMap::new();
    let mut stack: Vec<usize> = Vec::new();
    let mut string_start: Option<usize> = None;
    let mut escaped = false;
    let mut i = 0;
    loop {
        let at_end = i >= bytes.len();
        if at_end || (string_start.is_some() && bytes[i] == b'\n') {
            match string_start.take() {
                Some(quote) => {
                    escaped = false;
                    i = quote + 1;
                    continue;
                }
                None => break,
            }
        }
        let b = bytes[i];
        i += 1;
        if string_start.is_some() {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => string_start = None,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' if !stack.is_empty() => string_start = Some(i - 1),
            b'{' | b'[' => stack.push(i - 1),
            b'}' | b']' => {
                if let Some(open) = stack.pop() {
                    matches.insert(open, i);
                }
            }
            _ => {}
        }
    }
    matches
}

/// A top-level JSON value that yields records: an object, or a non-empty
/// array of objects. Bare scalars and scalar arrays stay as text.
fn is_record_shaped(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Object(_) => true,
        serde_json::Value::Array(items) => !items.is_empty() && items.iter().all(|v| v.is_object()),
        _ => false,
    }
}

/// Parse JSON, accepting trailing commas and unquoted identifier keys.
/// Values must still be valid JSON (no bareword values).
pub fn parse_tolerant(src: &str) -> Option<serde_json::Value> {
    if let Ok(value) = serde_json::from_str(src) {
        return Some(value);
    }
    serde_json::from_str(&repair_json(src)).ok()
}

fn repair_json(src: &str) -> String {
    let chars: Vec<char> = src.chars().collect();
    let mut out = String::with_capacity(src.len() + 16);
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            i += 1;
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
                i += 1;
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
                i += 1;
            }
            c if (c.is_ascii_alphabetic() || c == '_') && expects_key(&out) => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || matches!(chars[i], '_' | '-' | '$'))
                {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                let next = chars[i..].iter().find(|c| !c.is_whitespace());
                if next == Some(&':') {
                    out.push('"');
                    out.push_str(&ident);
                    out.push('"');
                } else {
                    out.push_str(&ident);
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

fn expects_key(out: &str) -> bool {
    matches!(out.trim_end().chars().last(), Some('{') | Some(','))
}

// ═══════════════════════════════════════════════════════════════════════
// HTML helpers
// ═══════════════════════════════════════════════════════════════════════

fn starts_with_ci(hay: &[u8], needle: &[u8]) -> bool {
    hay.len() >= needle.len() && hay[..needle.len()].eq_ignore_ascii_case(needle)
}

/// Match every `<table` to the `</table>` that closes it in one pass.
fn table_matches(bytes: &[u8]) -> HashMap<usize, usize> {
    let mut matches = HashMap::new();
    let mut stack: Vec<usize> = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'<' {
            i += 1;
            continue;
        }
        let rest = &bytes[i..];
        if starts_with_ci(rest, b"</table") {
            let Some(gt) = rest.iter().position(|&b| b == b'>') else {
                break;
            };
            if let Some(open) = stack.pop() {
                matches.insert(open, i + gt + 1);
            }
            i += gt + 1;
        } else if starts_with_ci(rest, b"<table") {
            stack.push(i);
            i += 6;
        } else {
            i += 1;
        }
    }
    matches
}

fn tag_is(name: &[u8], tag: &[u8]) -> bool {
    name.eq_ignore_ascii_case(tag)
}

/// Parse a `<table>…</table>` span into a header row plus body rows.
///
/// The header is the first row made entirely of `<th>` cells, or the first
/// row when the table has no `<th>`.
fn parse_html_table(html: &str) -> Result<Table, String> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_str(html);
    let config = reader.config_mut();
    config.trim_text(true);
    config.check_end_names = false;

    let mut rows: Vec<(Vec<String>, bool)> = Vec::new();
    let mut row: Option<(Vec<String>, bool)> = None;
    let mut cell: Option<(String, bool)> = None;

    fn finish_cell(cell: &mut Option<(String, bool)>, row: &mut Option<(Vec<String>, bool)>) {
        if let Some((text, is_header)) = cell.take() {
            let r = row.get_or_insert_with(|| (Vec::new(), true));
            r.0.push(text.trim().to_string());
            r.1 &= is_header;
        }
    }

    fn finish_row(
        cell: &mut Option<(String, bool)>,
        row: &mut Option<(Vec<String>, bool)>,
        rows: &mut Vec<(Vec<String>, bool)>,
    ) {
        finish_cell(cell, row);
        if let Some(r) = row.take() {
            if !r.0.is_empty() {
                rows.push(r);
            }
        }
    }

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                if tag_is(name.as_ref(), b"tr") {
                    finish_row(&mut cell, &mut row, &mut rows);
                    row = Some((Vec::new(), true));
                } else if tag_is(name.as_ref(), b"td") || tag_is(name.as_ref(), b"th") {
                    finish_cell(&mut cell, &mut row);
                    cell = Some((String::new(), tag_is(name.as_ref(), b"th")));
                } else if tag_is(name.as_ref(), b"br") {
                    if let Some((text, _)) = cell.as_mut() {
                        text.push(' ');
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                let name = e.local_name();
                if tag_is(name.as_ref(), b"td") || tag_is(name.as_ref(), b"th") {
                    finish_cell(&mut cell, &mut row);
                    cell = Some((String::new(), tag_is(name.as_ref(), b"th")));
                    finish_cell(&mut cell, &mut row);
                } else if tag_is(name.as_ref(), b"br") {
                    if let Some((text, _)) = cell.as_mut() {
                        text.push(' ');
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if let Some((text, _)) = cell.as_mut() {
                    let decoded = t
                        .unescape()
                        .map(|s| s.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
                    if !text.is_empty() && !text.ends_with(' ') {
                        text.push(' ');
                    }
                    text.push_str(&decoded);
                }
            }
            Ok(Event::CData(t)) => {
                if let Some((text, _)) = cell.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Ok(Event::End(e)) => {
                let name = e.local_name();
                if tag_is(name.as_ref(), b"td") || tag_is(name.as_ref(), b"th") {
                    finish_cell(&mut cell, &mut row);
                } else if tag_is(name.as_ref(), b"tr") || tag_is(name.as_ref(), b"table") {
                    finish_row(&mut cell, &mut row, &mut rows);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
    }
    finish_row(&mut cell, &mut row, &mut rows);

    if rows.is_empty() {
        return Err("table has no rows".to_string());
    }
    let header_idx = rows.iter().position(|(_, all_th)| *all_th).unwrap_or(0);
    let mut rows = rows.split_off(header_idx).into_iter().map(|(cells, _)| cells);
    let header = rows.next().unwrap_or_default();
    Ok(Table {
        header,
        rows: rows.collect(),
    })
}

// ═══════════════════════════════════════════════════════════════════════
// Line helpers
// ═══════════════════════════════════════════════════════════════════════

/// `(content_end, next_line_start)` for the line beginning at `start`.
/// `content_end` excludes `\n` and a preceding `\r`.
fn line_bounds(text: &str, start: usize) -> (usize, usize) {
    match text[start..].find('\n') {
        Some(rel) => {
            let nl = start + rel;
            let content_end = if nl > start && text.as_bytes()[nl - 1] == b'\r' {
                nl - 1
            } else {
                nl
            };
            (content_end, nl + 1)
        }
        None => (text.len(), text.len()),
    }
}

/// Line contents (without terminators) between `start` and `end`.
fn lines_in(text: &str, start: usize, end: usize) -> impl Iterator<Item = &str> {
    let mut cursor = start;
    std::iter::from_fn(move || {
        if cursor >= end {
            return None;
        }
        let (content_end, next) = line_bounds(text, cursor);
        let line = &text[cursor..content_end];
        cursor = next;
        Some(line)
    })
}

/// Blank lines and lines that open a JSON or markup region end line-based blocks.
fn is_blank_or_structured(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.is_empty() || trimmed.starts_with(['{', '[', '<'])
}

fn count_outside_quotes(line: &str, delimiter: char) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for c in line.chars() {
        if c == '"' {
            in_quotes = !in_quotes;
        } else if c == delimiter && !in_quotes {
            count += 1;
        }
    }
    count
}

/// Split one delimited line into trimmed cells. Double-quoted cells may
/// contain the delimiter; `""` inside quotes is an escaped quote.
pub fn split_delimited(line: &str, delimiter: char) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            c if c == delimiter && !in_quotes => {
                cells.push(current.trim().to_string());
                current.clear();
            }
            c => current.push(c),
        }
    }
    cells.push(current.trim().to_string());
    cells
}

/// Parse a `key: value` or `key=value` line. The separator is whichever of
/// `:` / `=` comes first.
fn parse_kv_line(line: &str) -> Option<(String, String)> {
    if is_blank_or_structured(line) {
        return None;
    }
    let idx = line.find([':', '='])?;
    let key = line[..idx].trim();
    let value = line[idx + 1..].trim();
    if key.is_empty() || key.len() > MAX_KEY_LEN || value.starts_with("//") {
        return None;
    }
    let mut chars = key.chars();
    let first = chars.next()?;
    if !(first.is_alphabetic() || first == '_') {
        return None;
    }
    if !key
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ' '))
    {
        return None;
    }
    Some((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FragmentKind;

    fn kinds(d: &Detection) -> Vec<FragmentKind> {
        d.fragments.iter().map(|f| f.kind()).collect()
    }

    fn assert_covers(text: &str, d: &Detection) {
        let rebuilt: String = d.fragments.iter().map(|f| f.text(text)).collect();
        assert_eq!(rebuilt, text);
        for pair in d.fragments.windows(2) {
            assert_eq!(pair[0].span.end, pair[1].span.start);
        }
    }

    #[test]
    fn empty_buffer_has_no_fragments() {
        let d = detect("");
        assert!(d.fragments.is_empty());
        assert!(d.warnings.is_empty());
    }

    #[test]
    fn plain_prose_is_one_raw_fragment() {
        let text = "Quarterly notes\n\nNothing structured lives here.\n";
        let d = detect(text);
        assert_eq!(kinds(&d), vec![FragmentKind::RawText]);
        assert_eq!(d.fragments[0].span, Span::new(0, text.len()));
    }

    #[test]
    fn json_then_key_value() {
        let text = "{\"a\":1,\"b\":\"x\"}\nname: bob\nage: 30";
        let d = detect(text);
        assert_eq!(kinds(&d), vec![FragmentKind::Json, FragmentKind::KeyValue]);
        assert_covers(text, &d);
        let FragmentPayload::KeyValue(pairs) = &d.fragments[1].payload else {
            panic!("expected key-value payload");
        };
        assert_eq!(pairs[0], ("name".to_string(), "bob".to_string()));
        assert_eq!(pairs[1], ("age".to_string(), "30".to_string()));
    }

    #[test]
    fn json_with_colons_is_not_key_value() {
        let text = "{\"url\": \"http://x\",\n \"time\": \"10:30\"}\n";
        let d = detect(text);
        assert_eq!(kinds(&d), vec![FragmentKind::Json]);
    }

    #[test]
    fn tolerant_json_accepts_trailing_commas_and_bare_keys() {
        let text = "{name: \"widget\", qty: 2, tags: [\"a\", \"b\",],}";
        let d = detect(text);
        assert_eq!(kinds(&d), vec![FragmentKind::Json]);
        let FragmentPayload::Json(value) = &d.fragments[0].payload else {
            panic!("expected json");
        };
        assert_eq!(value["qty"], 2);
        assert_eq!(value["tags"][1], "b");
    }

    #[test]
    fn bareword_values_are_rejected() {
        assert!(parse_tolerant("{a: hello}").is_none());
    }

    #[test]
    fn malformed_json_falls_through() {
        let text = "{\"a\": 1\nkey: v\nother: w\n";
        let d = detect(text);
        assert_eq!(kinds(&d), vec![FragmentKind::RawText, FragmentKind::KeyValue]);
        assert_covers(text, &d);
        assert_eq!(d.warnings.len(), 1);
        assert_eq!(d.warnings[0].kind, WarningKind::Detection);
    }

    #[test]
    fn bracketed_prose_stays_raw() {
        let text = "see [1] and [note] for details";
        let d = detect(text);
        assert_eq!(kinds(&d), vec![FragmentKind::RawText]);
        assert!(d.warnings.is_empty());
    }

    #[test]
    fn html_table_with_header() {
        let text = "Intro\n<table>\n<tr><th>name</th><th>price</th><th>qty</th></tr>\n\
                    <tr><td>apple</td><td>1.5</td><td>3</td></tr>\n\
                    <tr><td>pear</td><td>2</td><td>1</td></tr>\n</table>\nOutro\n";
        let d = detect(text);
        assert_eq!(
            kinds(&d),
            vec![FragmentKind::RawText, FragmentKind::HtmlTable, FragmentKind::RawText]
        );
        assert_covers(text, &d);
        let FragmentPayload::HtmlTable(table) = &d.fragments[1].payload else {
            panic!("expected table");
        };
        assert_eq!(table.header, vec!["name", "price", "qty"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1], vec!["pear", "2", "1"]);
    }

    #[test]
    fn html_table_tolerates_unclosed_cells_and_entities() {
        let text = "<TABLE border=1><tr><td>a &amp; b<td>c</tr><tr><td>1<td>2</tr></TABLE>";
        let d = detect(text);
        assert_eq!(kinds(&d), vec![FragmentKind::HtmlTable]);
        let FragmentPayload::HtmlTable(table) = &d.fragments[0].payload else {
            panic!("expected table");
        };
        assert_eq!(table.header, vec!["a & b", "c"]);
        assert_eq!(table.rows, vec![vec!["1".to_string(), "2".to_string()]]);
    }

    #[test]
    fn csv_block_picks_consistent_delimiter() {
        let text = "sku;price;qty\nA1;19.99;2\nB2;5;10\n\ntrailing words";
        let d = detect(text);
        assert_eq!(kinds(&d), vec![FragmentKind::Csv, FragmentKind::RawText]);
        assert_covers(text, &d);
        let FragmentPayload::Csv { delimiter, lines } = &d.fragments[0].payload else {
            panic!("expected csv");
        };
        assert_eq!(*delimiter, ';');
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], vec!["A1", "19.99", "2"]);
    }

    #[test]
    fn csv_quoted_cells_keep_delimiters() {
        assert_eq!(
            split_delimited("\"Smith, J\",42,\"say \"\"hi\"\"\"", ','),
            vec!["Smith, J", "42", "say \"hi\""]
        );
    }

    #[test]
    fn single_kv_line_is_not_a_block() {
        let d = detect("title: only one\n\nsomething else");
        assert_eq!(kinds(&d), vec![FragmentKind::RawText]);
    }

    #[test]
    fn csv_outranks_key_value_at_same_offset() {
        let text = "a: 1, b: 2\nc: 3, d: 4\n";
        let d = detect(text);
        assert_eq!(kinds(&d), vec![FragmentKind::Csv]);
    }

    #[test]
    fn spans_cover_mixed_document() {
        let text = "Report\r\n```json\n[{\"id\": 1}, {\"id\": 2}]\n```\n\
                    id,name\n1,a\n2,b\n\nowner = ops\nregion = eu\n\
                    <table><tr><th>x</th></tr><tr><td>1</td></tr></table>\nend é";
        let d = detect(text);
        assert_covers(text, &d);
        assert_eq!(
            kinds(&d),
            vec![
                FragmentKind::RawText,
                FragmentKind::Json,
                FragmentKind::RawText,
                FragmentKind::Csv,
                FragmentKind::KeyValue,
                FragmentKind::HtmlTable,
                FragmentKind::RawText,
            ]
        );
    }

    #[test]
    fn unbalanced_openers_scan_in_linear_time() {
        let text = format!("{}{}", "x { ".repeat(50_000), "<table ".repeat(20_000));
        let started = std::time::Instant::now();
        let d = detect(&text);
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
        assert_eq!(kinds(&d), vec![FragmentKind::RawText]);
        assert_eq!(d.warnings.len(), 1);
    }

    #[test]
    fn stray_quote_does_not_hide_later_json() {
        let text = "{ he said \"hi\n{\"id\": 1}\n";
        let d = detect(text);
        assert_covers(text, &d);
        assert_eq!(kinds(&d), vec![FragmentKind::RawText, FragmentKind::Json]);
    }

    #[test]
    fn nested_tables_match_outermost_close() {
        let text = "<table><tr><td>a</td></tr><table></table></table> tail <table>";
        let matches = table_matches(text.as_bytes());
        assert_eq!(matches.get(&0), Some(&49));
        assert_eq!(matches.get(&26), Some(&41));
        assert!(!matches.contains_key(&55));
    }

    #[test]
    fn whitespace_only_buffer_is_raw() {
        let d = detect("  \n\n ");
        assert_eq!(kinds(&d), vec![FragmentKind::RawText]);
    }
}
