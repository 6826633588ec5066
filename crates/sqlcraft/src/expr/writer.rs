//! Accumulates SQL text and the ordered parameter list while expressions render.

use crate::error::{DbError, DbResult};
use crate::ident::{self, Ident};
use crate::style::ParamStyle;
use crate::value::Value;
use std::collections::{HashMap, HashSet};

/// How column references are written in the clause being rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Clause {
    /// SELECT list and join conditions: always `owner.column`.
    Qualified,
    /// WHERE / GROUP BY / HAVING / ORDER BY / SET: bare unless the name is ambiguous.
    Filter,
}

#[derive(Debug)]
struct NamedSlot {
    name: String,
    index: usize,
    node: usize,
}

/// Output of a finished render.
#[derive(Debug)]
pub(crate) struct Rendered {
    pub sql: String,
    pub params: Vec<Value>,
    /// Parameter name -> 0-based slots bound to it.
    pub named: HashMap<String, Vec<usize>>,
}

#[derive(Debug)]
pub(crate) struct SqlWriter {
    sql: String,
    params: Vec<Value>,
    named: Vec<NamedSlot>,
    style: ParamStyle,
    clause: Clause,
    ambiguous: HashSet<String>,
}

impl SqlWriter {
    pub fn new(style: ParamStyle) -> Self {
        Self {
            sql: String::new(),
            params: Vec::new(),
            named: Vec::new(),
            style,
            clause: Clause::Filter,
            ambiguous: HashSet::new(),
        }
    }

    pub fn push(&mut self, s: &str) {
        self.sql.push_str(s);
    }

    /// Push text that may contain `%`, doubling it for `%s`-style drivers.
    fn push_escaped(&mut self, text: &str) {
        if self.style.escapes_percent() {
            self.sql.push_str(&text.replace('%', "%%"));
        } else {
            self.sql.push_str(text);
        }
    }

    pub fn push_operator(&mut self, op: &str) {
        self.push_escaped(op);
    }

    /// Quoted identifiers may contain `%`.
    pub fn push_ident(&mut self, ident: &Ident) {
        let mut out = String::new();
        ident.write_sql(&mut out);
        self.push_escaped(&out);
    }

    pub fn push_name(&mut self, name: &str) {
        let mut out = String::new();
        ident::write_name(name, &mut out);
        self.push_escaped(&out);
    }

    /// Write one placeholder and record its bound value.
    pub fn push_param(&mut self, value: Value, name: Option<&str>, node: usize) {
        self.params.push(value);
        let index = self.params.len();
        self.style.write_placeholder(index, &mut self.sql);
        if let Some(name) = name {
            self.named.push(NamedSlot {
                name: name.to_string(),
                index: index - 1,
                node,
            });
        }
    }

    pub fn push_list<T>(&mut self, items: &[T], sep: &str, mut f: impl FnMut(&mut Self, &T)) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(sep);
            }
            f(self, item);
        }
    }

    pub fn clause(&self) -> Clause {
        self.clause
    }

    pub fn is_ambiguous(&self, name: &str) -> bool {
        self.ambiguous.contains(name)
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn with_clause<R>(&mut self, clause: Clause, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved = std::mem::replace(&mut self.clause, clause);
        let out = f(self);
        self.clause = saved;
        out
    }

    /// Render a nested query with its own ambiguity set, restoring ours afterwards.
    pub fn nested<R>(&mut self, ambiguous: &HashSet<String>, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved_set = std::mem::replace(&mut self.ambiguous, ambiguous.clone());
        let saved_clause = self.clause;
        let out = f(self);
        self.ambiguous = saved_set;
        self.clause = saved_clause;
        out
    }

    pub fn set_ambiguous(&mut self, ambiguous: &HashSet<String>) {
        self.ambiguous = ambiguous.clone();
    }

    /// Replace the values of slots `start..` with `values` (a nested query's current bindings).
    pub fn overwrite_params(&mut self, start: usize, values: &[Value]) {
        for (slot, value) in self.params.iter_mut().skip(start).zip(values) {
            *slot = value.clone();
        }
    }

    /// SQL and parameters without the named-slot check.
    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.params)
    }

    /// Finish rendering. Fails when one name is carried by two different value nodes.
    pub fn finish(self) -> DbResult<Rendered> {
        let mut named: HashMap<String, Vec<usize>> = HashMap::new();
        let mut owners: HashMap<&str, usize> = HashMap::new();
        for slot in &self.named {
            match owners.get(slot.name.as_str()) {
                Some(&node) if node != slot.node => {
                    return Err(DbError::build(format!(
                        "parameter name '{}' is used by more than one value",
                        slot.name
                    )));
                }
                Some(_) => {}
                None => {
                    owners.insert(&slot.name, slot.node);
                }
            }
            named.entry(slot.name.clone()).or_default().push(slot.index);
        }
        Ok(Rendered {
            sql: self.sql,
            params: self.params,
            named,
        })
    }
}

/// Rebind every slot of a named parameter.
pub(crate) fn rebind(
    named: &HashMap<String, Vec<usize>>,
    params: &mut [Value],
    name: &str,
    value: Value,
) -> DbResult<()> {
    let slots = named
        .get(name)
        .ok_or_else(|| DbError::UnknownParam(name.to_string()))?;
    for &slot in slots {
        if let Some(param) = params.get_mut(slot) {
            *param = value.clone();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_placeholders_follow_push_order() {
        let mut w = SqlWriter::new(ParamStyle::Numeric);
        w.push("a = ");
        w.push_param(Value::Int(1), None, 1);
        w.push(" AND b = ");
        w.push_param(Value::Int(2), Some("b"), 2);
        let out = w.finish().unwrap();
        assert_eq!(out.sql, "a = $1 AND b = $2");
        assert_eq!(out.params, vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(out.named["b"], vec![1]);
    }

    #[test]
    fn same_node_may_bind_twice() {
        let mut w = SqlWriter::new(ParamStyle::Qmark);
        w.push_param(Value::Int(1), Some("x"), 7);
        w.push_param(Value::Int(1), Some("x"), 7);
        let out = w.finish().unwrap();
        assert_eq!(out.named["x"], vec![0, 1]);
    }

    #[test]
    fn distinct_nodes_sharing_a_name_fail() {
        let mut w = SqlWriter::new(ParamStyle::Qmark);
        w.push_param(Value::Int(1), Some("x"), 7);
        w.push_param(Value::Int(2), Some("x"), 8);
        assert!(w.finish().unwrap_err().is_build());
    }

    #[test]
    fn percent_is_doubled_for_format_styles() {
        let mut w = SqlWriter::new(ParamStyle::Format);
        w.push_operator(" % ");
        assert_eq!(w.finish().unwrap().sql, " %% ");
    }

    #[test]
    fn percent_in_identifiers_is_doubled_for_format_styles() {
        let club = Ident::parse(r#""100% Club""#).unwrap();

        let mut w = SqlWriter::new(ParamStyle::Pyformat);
        w.push_ident(&club);
        w.push(".");
        w.push_name("Win %");
        assert_eq!(w.finish().unwrap().sql, r#""100%% Club"."Win %%""#);

        let mut w = SqlWriter::new(ParamStyle::Numeric);
        w.push_ident(&club);
        assert_eq!(w.finish().unwrap().sql, r#""100% Club""#);
    }

    #[test]
    fn rebind_unknown_name_fails() {
        let named = HashMap::new();
        let mut params = vec![Value::Int(1)];
        let err = rebind(&named, &mut params, "missing", Value::Int(2)).unwrap_err();
        assert!(matches!(err, DbError::UnknownParam(name) if name == "missing"));
    }
}
