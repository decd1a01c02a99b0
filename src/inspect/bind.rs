use serde::{Deserialize, Serialize};

/// One bound parameter value as reported by the host's query-execution hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BindValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl From<&str> for BindValue {
    fn from(v: &str) -> Self {
        BindValue::Text(v.to_string())
    }
}

impl From<String> for BindValue {
    fn from(v: String) -> Self {
        BindValue::Text(v)
    }
}

impl From<i64> for BindValue {
    fn from(v: i64) -> Self {
        BindValue::Int(v)
    }
}

impl From<i32> for BindValue {
    fn from(v: i32) -> Self {
        BindValue::Int(v.into())
    }
}

impl From<u64> for BindValue {
    fn from(v: u64) -> Self {
        BindValue::UInt(v)
    }
}

impl From<f64> for BindValue {
    fn from(v: f64) -> Self {
        BindValue::Float(v)
    }
}

impl From<bool> for BindValue {
    fn from(v: bool) -> Self {
        BindValue::Bool(v)
    }
}

impl<T: Into<BindValue>> From<Option<T>> for BindValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(BindValue::Null)
    }
}

/// Parameter bindings in the order the driver received them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Bindings {
    #[default]
    None,
    /// `?` placeholders, substituted left to right.
    Positional(Vec<BindValue>),
    /// `:name` placeholders, each name substituted once in binding order.
    Named(Vec<(String, BindValue)>),
}

/// Driver-specific string literal quoting.
pub trait Quoter {
    fn quote(&self, value: &str) -> String;

    fn quote_bytes(&self, value: &[u8]) -> String {
        self.quote(&String::from_utf8_lossy(value))
    }
}

/// Quoting rules of the MySQL client library (`mysql_real_escape_string` + surrounding quotes).
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlQuoter;

impl Quoter for MySqlQuoter {
    fn quote(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len() + 2);
        out.push('\'');
        for c in value.chars() {
            match c {
                '\0' => out.push_str("\\0"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\\' => out.push_str("\\\\"),
                '\'' => out.push_str("\\'"),
                '"' => out.push_str("\\\""),
                '\x1a' => out.push_str("\\Z"),
                other => out.push(other),
            }
        }
        out.push('\'');
        out
    }
}

/// Render a binding as the SQL literal that replaces its placeholder.
pub fn render_literal(value: &BindValue, quoter: &impl Quoter) -> String {
    match value {
        BindValue::Null => "null".to_string(),
        BindValue::Bool(b) => (if *b { "1" } else { "0" }).to_string(),
        BindValue::Int(n) => n.to_string(),
        BindValue::UInt(n) => n.to_string(),
        // MySQL has no literal for NaN or infinity.
        BindValue::Float(f) if !f.is_finite() => "null".to_string(),
        BindValue::Float(f) => f.to_string(),
        BindValue::Text(s) => quoter.quote(s),
        BindValue::Bytes(b) => quoter.quote_bytes(b),
    }
}

/// Substitute placeholders in `raw_sql` with literal binding values.
///
/// Placeholders inside single-quoted string literals are never touched. Each binding
/// replaces exactly one placeholder; surplus placeholders are left unresolved and
/// surplus bindings are ignored.
pub fn bind_parameters(raw_sql: &str, bindings: &Bindings, quoter: &impl Quoter) -> String {
    match bindings {
        Bindings::None => raw_sql.to_string(),
        Bindings::Positional(values) => bind_positional(raw_sql, values, quoter),
        Bindings::Named(pairs) => pairs.iter().fold(raw_sql.to_string(), |sql, (name, value)| {
            bind_named_once(&sql, name, &render_literal(value, quoter))
        }),
    }
}

fn bind_positional(raw_sql: &str, values: &[BindValue], quoter: &impl Quoter) -> String {
    let mut out = String::with_capacity(raw_sql.len() + values.len() * 4);
    let mut next = values.iter();
    for (c, in_literal) in LiteralScanner::new(raw_sql) {
        if c == '?' && !in_literal {
            match next.next() {
                Some(value) => out.push_str(&render_literal(value, quoter)),
                None => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn bind_named_once(sql: &str, name: &str, literal: &str) -> String {
    let name = name.trim_start_matches(':');
    let chars: Vec<(usize, char, bool)> = LiteralScanner::new(sql)
        .scan(0usize, |offset, (c, lit)| {
            let at = *offset;
            *offset += c.len_utf8();
            Some((at, c, lit))
        })
        .collect();

    for (i, &(at, c, in_literal)) in chars.iter().enumerate() {
        if c != ':' || in_literal {
            continue;
        }
        // `::` casts and `a:b` inside identifiers are not placeholders.
        if i > 0 && (is_ident_char(chars[i - 1].1) || chars[i - 1].1 == ':') {
            continue;
        }
        let start = at + 1;
        if !sql[start..].starts_with(name) {
            continue;
        }
        let end = start + name.len();
        if sql[end..].chars().next().is_some_and(is_ident_char) {
            continue;
        }
        let mut out = String::with_capacity(sql.len() + literal.len());
        out.push_str(&sql[..at]);
        out.push_str(literal);
        out.push_str(&sql[end..]);
        return out;
    }
    sql.to_string()
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Yields each character with a flag telling whether it sits inside a single-quoted literal.
/// The opening and closing quotes themselves are reported as inside.
struct LiteralScanner<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    in_literal: bool,
    escaped: bool,
}

impl<'a> LiteralScanner<'a> {
    fn new(sql: &'a str) -> Self {
        Self {
            chars: sql.chars().peekable(),
            in_literal: false,
            escaped: false,
        }
    }
}

impl Iterator for LiteralScanner<'_> {
    type Item = (char, bool);

    fn next(&mut self) -> Option<Self::Item> {
        let c = self.chars.next()?;
        if !self.in_literal {
            if c == '\'' {
                self.in_literal = true;
            }
            return Some((c, self.in_literal));
        }
        if self.escaped {
            self.escaped = false;
        } else if c == '\\' {
            self.escaped = true;
        } else if c == '\'' {
            // '' inside a literal is an escaped quote, not the end.
            if self.chars.peek() == Some(&'\'') {
                self.escaped = true;
            } else {
                self.in_literal = false;
            }
        }
        Some((c, true))
    }
}
