//! Query requests submitted to a scheduler.

use std::collections::BTreeMap;

use crate::value::Value;

/// A single query to run on a worker.
///
/// Either raw SQL text, or prepared text with named placeholders and the
/// values bound to them. A request is cloned when it is dispatched, so the
/// copy a worker executes never changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRequest {
    sql: String,
    params: BTreeMap<String, Value>,
    prepared: bool,
}

impl QueryRequest {
    /// A raw request. The text is executed as-is, without binding.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: BTreeMap::new(),
            prepared: false,
        }
    }

    /// A prepared request with no values bound yet.
    pub fn prepared(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: BTreeMap::new(),
            prepared: true,
        }
    }

    /// Bind a value to a named placeholder, replacing any earlier value.
    ///
    /// `name` may be given with or without its `:` sigil.
    pub fn bind(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.bind_value(name, value);
        self
    }

    /// In-place variant of [`bind`](Self::bind).
    pub fn bind_value(&mut self, name: &str, value: impl Into<Value>) {
        self.params.insert(placeholder_key(name), value.into());
    }

    /// Replace the text, dropping every bound value.
    pub(crate) fn reset(&mut self, sql: String) {
        self.sql = sql;
        self.params.clear();
    }

    pub(crate) fn set_prepared(&mut self, prepared: bool) {
        self.prepared = prepared;
    }

    /// The SQL text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Bound values, keyed by placeholder name including its sigil.
    pub fn params(&self) -> &BTreeMap<String, Value> {
        &self.params
    }

    /// Returns true if values must be bound before execution.
    pub fn is_prepared(&self) -> bool {
        self.prepared
    }
}

impl From<&str> for QueryRequest {
    fn from(sql: &str) -> Self {
        Self::raw(sql)
    }
}

impl From<String> for QueryRequest {
    fn from(sql: String) -> Self {
        Self::raw(sql)
    }
}

/// Normalize a placeholder name so `price` and `:price` bind the same slot.
fn placeholder_key(name: &str) -> String {
    if name.starts_with([':', '@', '$']) {
        name.to_string()
    } else {
        format!(":{}", name)
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Rewrite `:name` placeholders into positional `$1`, `$2`, ... form.
///
/// Returns the rewritten text and, for each position, the placeholder name
/// that must be bound there. A name used twice maps to one position. Quoted
/// literals, quoted identifiers, comments and `::` casts are left untouched.
pub fn rewrite_named_placeholders(sql: &str) -> (String, Vec<String>) {
    let mut out = String::with_capacity(sql.len());
    let mut names: Vec<String> = Vec::new();
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                out.push(c);
                // Doubled quotes stay inside the literal.
                while let Some(q) = chars.next() {
                    out.push(q);
                    if q == c {
                        if chars.peek().copied() == Some(c) {
                            if let Some(n) = chars.next() {
                                out.push(n);
                            }
                        } else {
                            break;
                        }
                    }
                }
            }
            '-' if chars.peek().copied() == Some('-') => {
                out.push(c);
                for n in chars.by_ref() {
                    out.push(n);
                    if n == '\n' {
                        break;
                    }
                }
            }
            ':' => match chars.peek().copied() {
                Some(':') => {
                    out.push_str("::");
                    chars.next();
                }
                Some(n) if n.is_ascii_alphabetic() || n == '_' => {
                    let mut name = String::from(":");
                    while let Some(&n) = chars.peek() {
                        if !is_ident_char(n) {
                            break;
                        }
                        name.push(n);
                        chars.next();
                    }
                    let position = match names.iter().position(|existing| *existing == name) {
                        Some(i) => i + 1,
                        None => {
                            names.push(name);
                            names.len()
                        }
                    };
                    out.push('$');
                    out.push_str(&position.to_string());
                }
                _ => out.push(c),
            },
            _ => out.push(c),
        }
    }

    (out, names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_normalizes_names() {
        let req = QueryRequest::prepared("SELECT * FROM products WHERE price < :price")
            .bind("price", 10)
            .bind(":price", 20);
        assert_eq!(req.params().len(), 1);
        assert_eq!(req.params().get(":price"), Some(&Value::Int(20)));
        assert!(req.is_prepared());
    }

    #[test]
    fn test_raw_from_str() {
        let req: QueryRequest = "SELECT 1".into();
        assert!(!req.is_prepared());
        assert_eq!(req.sql(), "SELECT 1");
    }

    #[test]
    fn test_rewrite_basic() {
        let (sql, names) =
            rewrite_named_placeholders("SELECT * FROM t WHERE a = :a AND b > :b OR a2 = :a");
        assert_eq!(sql, "SELECT * FROM t WHERE a = $1 AND b > $2 OR a2 = $1");
        assert_eq!(names, vec![":a".to_string(), ":b".to_string()]);
    }

    #[test]
    fn test_rewrite_skips_casts_and_literals() {
        let (sql, names) = rewrite_named_placeholders(
            "SELECT ':nope', \"col:x\", amount::numeric FROM t WHERE id = :id -- :comment\n",
        );
        assert_eq!(
            sql,
            "SELECT ':nope', \"col:x\", amount::numeric FROM t WHERE id = $1 -- :comment\n"
        );
        assert_eq!(names, vec![":id".to_string()]);
    }

    #[test]
    fn test_rewrite_escaped_quote() {
        let (sql, names) = rewrite_named_placeholders("SELECT 'it''s :x' WHERE y = :y");
        assert_eq!(sql, "SELECT 'it''s :x' WHERE y = $1");
        assert_eq!(names, vec![":y".to_string()]);
    }
}
