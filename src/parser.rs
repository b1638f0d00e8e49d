//! Tokenizer and recursive-descent reader.
//!
//! `Parser` holds a single-character-lookahead stream over the source text
//! and a `&mut Heap` to intern symbols and allocate pairs/strings as it
//! reads -- the object graph it builds is exactly what the evaluator
//! consumes, so there is no separate AST.

use std::iter::Peekable;
use std::str::Chars;

use crate::error::{InterpError, SchemeResult};
use crate::heap::{Heap, Rooted};
use crate::value::Value;

/// Any single string or atom token longer than this is a fatal parse error.
/// The spec requires at least 10 KiB; this implementation uses exactly that.
pub const MAX_TOKEN_LEN: usize = 10 * 1024;

pub struct Parser<'a, 'h> {
    chars: Peekable<Chars<'a>>,
    heap: &'h mut Heap,
}

impl<'a, 'h> Parser<'a, 'h> {
    pub fn new(source: &'a str, heap: &'h mut Heap) -> Parser<'a, 'h> {
        Parser {
            chars: source.chars().peekable(),
            heap,
        }
    }

    /// Read every top-level object in the source. Each object is rooted as
    /// soon as it is read: reading a later one can allocate enough to
    /// trigger a collection, and an earlier object sitting only in this
    /// `Vec` would otherwise be unreachable from any root until returned.
    pub fn parse_all(source: &'a str, heap: &'h mut Heap) -> SchemeResult<Vec<Value>> {
        let mut parser = Parser::new(source, heap);
        let mut objects: Vec<Rooted<Value>> = Vec::new();
        while let Some(v) = parser.read_object()? {
            objects.push(Rooted::new(parser.heap, v));
        }
        Ok(objects.iter().map(|r| **r).collect())
    }

    /// Read exactly one top-level object, or `None` at end-of-input. Used
    /// by the REPL to read one form per prompt.
    pub fn read_object(&mut self) -> SchemeResult<Option<Value>> {
        self.skip_atmosphere();
        match self.chars.peek() {
            None => Ok(None),
            Some('(') => {
                self.chars.next();
                self.read_list().map(Some)
            }
            Some(')') => Err(InterpError::Parse("unmatched close paren".to_string())),
            Some('\'') => {
                self.chars.next();
                self.read_quote().map(Some)
            }
            Some('"') => self.read_string().map(Some),
            Some(_) => self.read_atom().map(Some),
        }
    }

    fn skip_atmosphere(&mut self) {
        loop {
            match self.chars.peek() {
                Some(c) if c.is_whitespace() => {
                    self.chars.next();
                }
                Some(';') => {
                    while let Some(&c) = self.chars.peek() {
                        self.chars.next();
                        if c == '\n' {
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
    }

    /// Called just after consuming the opening `(`. Accumulates objects
    /// until the matching `)`, then collapses a trailing `. <obj>` into a
    /// dotted pair.
    fn read_list(&mut self) -> SchemeResult<Value> {
        let mut items: Vec<Rooted<Value>> = Vec::new();
        let mut tail = Value::Nil;
        loop {
            self.skip_atmosphere();
            match self.chars.peek() {
                None => {
                    return Err(InterpError::Parse(
                        "premature end-of-input inside list".to_string(),
                    ))
                }
                Some(')') => {
                    self.chars.next();
                    break;
                }
                Some('.') if self.dot_is_delimiter() => {
                    self.chars.next();
                    let obj = self
                        .read_object()?
                        .ok_or_else(|| InterpError::Parse("expected object after `.`".to_string()))?;
                    tail = obj;
                    self.skip_atmosphere();
                    match self.chars.next() {
                        Some(')') => break,
                        _ => {
                            return Err(InterpError::Parse(
                                "expected `)` after dotted tail".to_string(),
                            ))
                        }
                    }
                }
                _ => {
                    let obj = self.read_object()?.ok_or_else(|| {
                        InterpError::Parse("premature end-of-input inside list".to_string())
                    })?;
                    items.push(Rooted::new(self.heap, obj));
                }
            }
        }
        let mut result = Rooted::new(self.heap, tail);
        for v in items.into_iter().rev() {
            let next = Value::new_pair(self.heap, *v, *result);
            result = Rooted::new(self.heap, next);
        }
        Ok(*result)
    }

    /// A `.` only collapses the list if it is a standalone token (followed
    /// by whitespace or a closing paren), so `.5` and `foo.bar` still read
    /// as atoms/symbols.
    fn dot_is_delimiter(&mut self) -> bool {
        let mut lookahead = self.chars.clone();
        lookahead.next();
        match lookahead.peek() {
            None => true,
            Some(')') => true,
            Some(c) => c.is_whitespace(),
        }
    }

    fn read_quote(&mut self) -> SchemeResult<Value> {
        let obj = self
            .read_object()?
            .ok_or_else(|| InterpError::Parse("expected object after `'`".to_string()))?;
        let obj = Rooted::new(self.heap, obj);
        let quote_sym = self.heap.wrap_symbol_value("quote");
        let inner_pair = Value::new_pair(self.heap, *obj, Value::Nil);
        let inner = Rooted::new(self.heap, inner_pair);
        Ok(Value::new_pair(self.heap, quote_sym, *inner))
    }

    fn read_string(&mut self) -> SchemeResult<Value> {
        self.chars.next(); // consume opening quote
        let mut buf = String::new();
        loop {
            match self.chars.next() {
                None => {
                    return Err(InterpError::Parse(
                        "premature end-of-input inside string".to_string(),
                    ))
                }
                Some('"') => break,
                Some('\\') => match self.chars.next() {
                    Some('n') => buf.push('\n'),
                    Some('\\') => buf.push('\\'),
                    Some('"') => buf.push('"'),
                    Some(other) => buf.push(other),
                    None => {
                        return Err(InterpError::Parse(
                            "premature end-of-input inside string".to_string(),
                        ))
                    }
                },
                Some(c) => buf.push(c),
            }
            if buf.len() > MAX_TOKEN_LEN {
                return Err(InterpError::Parse(format!(
                    "string literal exceeds {MAX_TOKEN_LEN} bytes"
                )));
            }
        }
        Ok(Value::new_string(self.heap, &buf))
    }

    fn read_atom(&mut self) -> SchemeResult<Value> {
        let mut buf = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() || c == '(' || c == ')' || c == '\'' || c == '"' || c == ';' {
                break;
            }
            buf.push(c);
            self.chars.next();
            if buf.len() > MAX_TOKEN_LEN {
                return Err(InterpError::Parse(format!(
                    "atom exceeds {MAX_TOKEN_LEN} bytes"
                )));
            }
        }
        classify_atom(&buf, self.heap)
    }
}

fn classify_atom(text: &str, heap: &mut Heap) -> SchemeResult<Value> {
    match text {
        "#t" => return Ok(Value::Bool(true)),
        "#f" => return Ok(Value::Bool(false)),
        _ => {}
    }
    if let Some(name) = text.strip_prefix("#\\") {
        return classify_char(name);
    }
    if is_integer_literal(text) {
        let n: i64 = text
            .parse()
            .map_err(|_| InterpError::Parse(format!("malformed integer literal `{text}`")))?;
        return Ok(Value::Int(n));
    }
    Ok(heap.wrap_symbol_value(text))
}

fn classify_char(name: &str) -> SchemeResult<Value> {
    match name {
        "newline" => Ok(Value::Char('\n')),
        "space" => Ok(Value::Char(' ')),
        "" => Err(InterpError::Parse(
            "malformed character literal `#\\`".to_string(),
        )),
        _ if name.chars().count() == 1 => Ok(Value::Char(name.chars().next().unwrap())),
        other => Err(InterpError::Parse(format!(
            "malformed character literal `#\\{other}`"
        ))),
    }
}

fn is_integer_literal(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::list_to_vec;

    fn parse(src: &str) -> Vec<Value> {
        let mut heap = Heap::new();
        Parser::parse_all(src, &mut heap).unwrap()
    }

    #[test]
    fn parses_scalars() {
        let mut heap = Heap::new();
        let objs = Parser::parse_all("42 -7 #t #f #\\a #\\space #\\newline", &mut heap).unwrap();
        assert_eq!(objs[0], Value::Int(42));
        assert_eq!(objs[1], Value::Int(-7));
        assert_eq!(objs[2], Value::Bool(true));
        assert_eq!(objs[3], Value::Bool(false));
        assert_eq!(objs[4], Value::Char('a'));
        assert_eq!(objs[5], Value::Char(' '));
        assert_eq!(objs[6], Value::Char('\n'));
    }

    #[test]
    fn parses_proper_list() {
        let objs = parse("(1 2 3)");
        assert_eq!(objs.len(), 1);
        let items = list_to_vec(objs[0]).unwrap();
        assert_eq!(items, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn parses_dotted_pair() {
        let objs = parse("(1 . 2)");
        assert_eq!(objs[0].car(), Some(Value::Int(1)));
        assert_eq!(objs[0].cdr(), Some(Value::Int(2)));
    }

    #[test]
    fn quote_desugars() {
        let mut heap = Heap::new();
        let objs = Parser::parse_all("'foo", &mut heap).unwrap();
        let items = list_to_vec(objs[0]).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(heap.symbol_name(items[0].as_symbol().unwrap()), "quote");
        assert_eq!(heap.symbol_name(items[1].as_symbol().unwrap()), "foo");
    }

    #[test]
    fn comments_are_skipped() {
        let objs = parse("; a comment\n42 ; trailing\n");
        assert_eq!(objs, vec![Value::Int(42)]);
    }

    #[test]
    fn unmatched_close_paren_is_fatal() {
        let mut heap = Heap::new();
        assert!(Parser::parse_all(")", &mut heap).is_err());
    }

    #[test]
    fn symbols_with_embedded_dot_are_not_misread() {
        let objs = parse("foo.bar");
        assert_eq!(objs.len(), 1);
        assert!(objs[0].as_symbol().is_some());
    }
}
