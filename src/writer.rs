//! Rendering values back to source text: `write` (machine-readable, strings
//! quoted) and `display` (human-readable, strings and characters raw).
//!
//! Both walk the same recursive structure; the only difference is how
//! strings and characters are rendered, threaded through as a flag rather
//! than duplicating the traversal.

use std::fmt::Write as _;

use crate::value::Value;

pub fn write_string(v: Value) -> String {
    let mut out = String::new();
    render(&mut out, v, true);
    out
}

pub fn display_string(v: Value) -> String {
    let mut out = String::new();
    render(&mut out, v, false);
    out
}

fn render(out: &mut String, v: Value, write_mode: bool) {
    match v {
        Value::Nil => out.push_str("()"),
        Value::Bool(true) => out.push_str("#t"),
        Value::Bool(false) => out.push_str("#f"),
        Value::Int(n) => {
            let _ = write!(out, "{n}");
        }
        Value::Char(c) => render_char(out, c, write_mode),
        Value::Str(s) => render_string(out, &s.as_string(), write_mode),
        Value::Symbol(s) => out.push_str(&s.name),
        Value::Pair(_) => render_list(out, v, write_mode),
        Value::Lambda(l) => {
            out.push_str("(lambda ");
            render(out, l.params, write_mode);
            render_body(out, l.body, write_mode);
            out.push(')');
        }
        Value::Port(p) => render_opaque(out, "port", p.opaque_id()),
        Value::Scope(p) => render_opaque(out, "scope", p.opaque_id()),
        Value::Thunk(p) => render_opaque(out, "thunk", p.opaque_id()),
        Value::Native(p) => render_opaque(out, "procedure", p.opaque_id()),
        Value::Syntax(p) => render_opaque(out, "syntax", p.opaque_id()),
        Value::Macro(p) => render_opaque(out, "macro", p.opaque_id()),
    }
}

fn render_char(out: &mut String, c: char, write_mode: bool) {
    if !write_mode {
        out.push(c);
        return;
    }
    match c {
        '\n' => out.push_str("#\\newline"),
        ' ' => out.push_str("#\\space"),
        other => {
            out.push_str("#\\");
            out.push(other);
        }
    }
}

fn render_string(out: &mut String, s: &str, write_mode: bool) {
    if !write_mode {
        out.push_str(s);
        return;
    }
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out.push('"');
}

/// Renders the `(e1 e2 … en)` / `(e1 … en . tail)` forms, sharing the
/// traversal between a lambda's body and an ordinary list value.
fn render_list(out: &mut String, mut list: Value, write_mode: bool) {
    out.push('(');
    let mut first = true;
    loop {
        match list {
            Value::Pair(p) => {
                if !first {
                    out.push(' ');
                }
                first = false;
                render(out, p.car(), write_mode);
                list = p.cdr();
            }
            Value::Nil => break,
            other => {
                out.push_str(" . ");
                render(out, other, write_mode);
                break;
            }
        }
    }
    out.push(')');
}

fn render_body(out: &mut String, mut body: Value, write_mode: bool) {
    loop {
        match body {
            Value::Pair(p) => {
                out.push(' ');
                render(out, p.car(), write_mode);
                body = p.cdr();
            }
            _ => break,
        }
    }
}

fn render_opaque(out: &mut String, type_name: &str, id: usize) {
    let _ = write!(out, "[{type_name}@{id:#x}]");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::Heap;
    use crate::value::{list_to_vec, vec_to_list};

    #[test]
    fn writes_scalars() {
        assert_eq!(write_string(Value::Nil), "()");
        assert_eq!(write_string(Value::Bool(true)), "#t");
        assert_eq!(write_string(Value::Bool(false)), "#f");
        assert_eq!(write_string(Value::Int(-42)), "-42");
        assert_eq!(write_string(Value::Char(' ')), "#\\space");
        assert_eq!(write_string(Value::Char('\n')), "#\\newline");
        assert_eq!(write_string(Value::Char('x')), "#\\x");
    }

    #[test]
    fn write_quotes_strings_display_does_not() {
        let mut heap = Heap::new();
        let s = Value::new_string(&mut heap, "hi\n\"there\"");
        assert_eq!(write_string(s), "\"hi\\n\\\"there\\\"\"");
        assert_eq!(display_string(s), "hi\n\"there\"");
    }

    #[test]
    fn writes_proper_and_dotted_lists() {
        let mut heap = Heap::new();
        let list = vec_to_list(&mut heap, &[Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(write_string(list), "(1 2 3)");

        let dotted = Value::new_pair(&mut heap, Value::Int(1), Value::Int(2));
        assert_eq!(write_string(dotted), "(1 . 2)");

        assert_eq!(list_to_vec(list).unwrap().len(), 3);
    }
}
