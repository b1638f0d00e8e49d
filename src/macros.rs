//! `syntax-rules` pattern matching and template substitution.
//!
//! A macro's patterns are tried in the order they were written. Matching
//! walks the pattern and the call site's operand list in parallel; a plain
//! symbol in the pattern binds to whatever sits in the corresponding
//! position, a literal keyword must appear verbatim, and a symbol
//! immediately followed by `...` captures every remaining operand as a
//! list. Expansion walks the template the same way, splicing a captured
//! list back in wherever its binding is followed by `...`.

use std::collections::HashMap;

use crate::error::{InterpError, SchemeResult};
use crate::heap::Heap;
use crate::value::{equal, Macro, SymbolPtr, Value};

enum PatternBinding {
    Single(Value),
    Multi(Vec<Value>),
}

type Bindings = HashMap<SymbolPtr, PatternBinding>;

fn is_ellipsis(v: Value) -> bool {
    matches!(v, Value::Symbol(s) if s.name == "...")
}

fn is_literal(sym: SymbolPtr, literals: &[SymbolPtr]) -> bool {
    literals.iter().any(|lit| lit.name == sym.name)
}

/// Expand a macro call: `call_tail` is the combination's operand list (the
/// macro keyword itself already consumed by the evaluator). Tries each rule
/// in order and returns the first successful substitution.
pub fn expand_macro(heap: &mut Heap, mac: &Macro, call_tail: Value) -> SchemeResult<Value> {
    for (pattern, template) in &mac.rules {
        let pattern_args = pattern.cdr().unwrap_or(Value::Nil);
        let mut bindings = Bindings::new();
        if match_pattern(pattern_args, call_tail, &mac.literals, &mut bindings) {
            return substitute(heap, *template, &bindings);
        }
    }
    let name = mac
        .label
        .clone()
        .unwrap_or_else(|| "syntax-rules".to_string());
    Err(InterpError::MacroNoMatch(name))
}

fn match_pattern(pattern: Value, input: Value, literals: &[SymbolPtr], bindings: &mut Bindings) -> bool {
    match pattern {
        Value::Nil => matches!(input, Value::Nil),
        Value::Pair(p) => {
            let car = p.car();
            let cdr = p.cdr();
            if let Value::Pair(next) = cdr {
                if is_ellipsis(next.car()) {
                    let sym = match car {
                        Value::Symbol(s) => s,
                        _ => return false,
                    };
                    let rest_pattern = next.cdr();
                    let captured = collect_list(input);
                    bindings.insert(sym, PatternBinding::Multi(captured));
                    return matches!(rest_pattern, Value::Nil);
                }
            }
            match input {
                Value::Pair(ip) => {
                    match_pattern(car, ip.car(), literals, bindings)
                        && match_pattern(cdr, ip.cdr(), literals, bindings)
                }
                _ => false,
            }
        }
        Value::Symbol(sym) => {
            if is_literal(sym, literals) {
                matches!(input, Value::Symbol(i) if i.name == sym.name)
            } else {
                bindings.insert(sym, PatternBinding::Single(input));
                true
            }
        }
        scalar => equal(scalar, input),
    }
}

/// Collects a (possibly improper) list's elements into a `Vec`, stopping at
/// the first non-pair. Used only for ellipsis capture, where the pattern
/// requires the remainder to be a proper list.
fn collect_list(mut v: Value) -> Vec<Value> {
    let mut out = Vec::new();
    while let Value::Pair(p) = v {
        out.push(p.car());
        v = p.cdr();
    }
    out
}

fn substitute(heap: &mut Heap, template: Value, bindings: &Bindings) -> SchemeResult<Value> {
    match template {
        Value::Symbol(sym) => match bindings.get(&sym) {
            Some(PatternBinding::Single(v)) => Ok(*v),
            Some(PatternBinding::Multi(_)) => Ok(template),
            None => Ok(template),
        },
        Value::Pair(p) => {
            let car = p.car();
            let cdr = p.cdr();
            if let Value::Pair(next) = cdr {
                if is_ellipsis(next.car()) {
                    let values = match car {
                        Value::Symbol(sym) => match bindings.get(&sym) {
                            Some(PatternBinding::Multi(vals)) => vals.clone(),
                            _ => {
                                return Err(InterpError::syntax(
                                    "syntax-rules",
                                    "`...` used after a non-ellipsis pattern variable",
                                ))
                            }
                        },
                        _ => {
                            return Err(InterpError::syntax(
                                "syntax-rules",
                                "`...` must follow a pattern variable",
                            ))
                        }
                    };
                    let rest = substitute(heap, next.cdr(), bindings)?;
                    let mut result = crate::heap::Rooted::new(heap, rest);
                    for v in values.into_iter().rev() {
                        let next_pair = Value::new_pair(heap, v, *result);
                        result = crate::heap::Rooted::new(heap, next_pair);
                    }
                    return Ok(*result);
                }
            }
            let new_car_value = substitute(heap, car, bindings)?;
            let new_car = crate::heap::Rooted::new(heap, new_car_value);
            let new_cdr = substitute(heap, cdr, bindings)?;
            Ok(Value::new_pair(heap, *new_car, new_cdr))
        }
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::writer::write_string;

    fn parse_one(heap: &mut Heap, src: &str) -> Value {
        Parser::parse_all(src, heap).unwrap().remove(0)
    }

    #[test]
    fn expands_when_macro() {
        let mut heap = Heap::new();
        let pattern = parse_one(&mut heap, "(when t body ...)");
        let template = parse_one(&mut heap, "(if t (begin body ...) (quote ()))");
        let mac = Macro {
            literals: vec![],
            rules: vec![(pattern, template)],
            label: Some("when".to_string()),
        };
        let call_tail = if let Value::Pair(p) = parse_one(&mut heap, "(#t (display 1) (display 2))") {
            p.cdr()
        } else {
            Value::Nil
        };
        let expansion = expand_macro(&mut heap, &mac, call_tail).unwrap();
        assert_eq!(
            write_string(expansion),
            "(if #t (begin (display 1) (display 2)) (quote ()))"
        );
    }

    #[test]
    fn no_matching_rule_is_an_error() {
        let mut heap = Heap::new();
        let pattern = parse_one(&mut heap, "(m a b)");
        let template = parse_one(&mut heap, "(list a b)");
        let mac = Macro {
            literals: vec![],
            rules: vec![(pattern, template)],
            label: Some("m".to_string()),
        };
        let call_tail = if let Value::Pair(p) = parse_one(&mut heap, "(m 1)") {
            p.cdr()
        } else {
            Value::Nil
        };
        assert!(expand_macro(&mut heap, &mac, call_tail).is_err());
    }
}
