//! Built-in special-form handlers: `quote`, `if`, `define`, `set!`,
//! `lambda`, the `let` family, `cond`, `and`/`or`, `begin`, and the
//! `define-syntax`/`syntax-rules` macro subsystem.
//!
//! Every handler has the shape `fn(&mut Heap, ScopePtr, Value) ->
//! SchemeResult<Value>`: it receives its operand list unevaluated and is
//! free to decide what, if anything, to evaluate and in which scope.

use log::trace;

use crate::error::{InterpError, SchemeResult};
use crate::eval::{eval_eager, eval_block, eval_lazy};
use crate::heap::{Heap, Rooted};
use crate::value::{list_to_vec, ScopePtr, Value};

type Operands = Value;

fn syntax_err(form: &str, message: &str) -> InterpError {
    InterpError::syntax(form, message.to_string())
}

/// `(quote x)` -- returns `x` unevaluated.
fn quote(_heap: &mut Heap, _scope: ScopePtr, body: Operands) -> SchemeResult<Value> {
    body.car().ok_or_else(|| syntax_err("quote", "expected one operand"))
}

/// `(if t c)` / `(if t c a)`.
fn if_form(heap: &mut Heap, scope: ScopePtr, body: Operands) -> SchemeResult<Value> {
    let test = body.car().ok_or_else(|| syntax_err("if", "missing test"))?;
    let rest = body.cdr().ok_or_else(|| syntax_err("if", "missing consequent"))?;
    let conseq = rest.car().ok_or_else(|| syntax_err("if", "missing consequent"))?;
    let alt = rest.cdr().unwrap_or(Value::Nil);

    if eval_eager(heap, scope, test)?.is_truthy() {
        eval_lazy(heap, scope, conseq)
    } else {
        match alt {
            Value::Nil => Ok(Value::Nil),
            Value::Pair(p) => eval_lazy(heap, scope, p.car()),
            other => Err(syntax_err("if", &format!("malformed alternative `{}`", other.type_name()))),
        }
    }
}

/// Builds a `Value::Lambda` capturing `scope`.
fn make_lambda(heap: &mut Heap, scope: ScopePtr, params: Value, body: Value) -> Value {
    let mut l = heap.allocate_lambda();
    l.params = params;
    l.body = body;
    l.scope = Some(scope);
    Value::Lambda(*l)
}

/// `(lambda params body…)`.
fn lambda(heap: &mut Heap, scope: ScopePtr, body: Operands) -> SchemeResult<Value> {
    let params = body.car().ok_or_else(|| syntax_err("lambda", "missing parameter list"))?;
    let rest = body.cdr().unwrap_or(Value::Nil);
    Ok(make_lambda(heap, scope, params, rest))
}

/// `(define name expr)` and `(define (name . params) body…)`.
fn define(heap: &mut Heap, scope: ScopePtr, body: Operands) -> SchemeResult<Value> {
    let head = body.car().ok_or_else(|| syntax_err("define", "missing name"))?;
    let mut scope = scope;
    match head {
        Value::Symbol(name) => {
            let expr = body
                .cdr()
                .and_then(|r| r.car())
                .ok_or_else(|| syntax_err("define", "missing value expression"))?;
            let value = eval_eager(heap, scope, expr)?;
            scope.define(name, value, &name.name)?;
            Ok(Value::Symbol(name))
        }
        Value::Pair(p) => {
            let name = p
                .car()
                .as_symbol()
                .ok_or_else(|| syntax_err("define", "procedure name must be a symbol"))?;
            let params = p.cdr();
            let proc_body = body.cdr().unwrap_or(Value::Nil);
            let value = make_lambda(heap, scope, params, proc_body);
            scope.define(name, value, &name.name)?;
            Ok(Value::Symbol(name))
        }
        other => Err(syntax_err("define", &format!("cannot define a `{}`", other.type_name()))),
    }
}

/// `(set! name expr)`.
fn set_bang(heap: &mut Heap, scope: ScopePtr, body: Operands) -> SchemeResult<Value> {
    let name = body
        .car()
        .and_then(|v| v.as_symbol())
        .ok_or_else(|| syntax_err("set!", "missing or non-symbol name"))?;
    let expr = body
        .cdr()
        .and_then(|r| r.car())
        .ok_or_else(|| syntax_err("set!", "missing value expression"))?;
    let value = eval_eager(heap, scope, expr)?;
    let mut scope = scope;
    scope.assign(name, value, &name.name)?;
    Ok(Value::Nil)
}

/// Shared by `let`/`let*`/`letrec`: splits `((k e)…) body…` into the raw
/// binding-clause list and the body list.
fn split_let(body: Operands, form: &str) -> SchemeResult<(Value, Value)> {
    let bindings = body.car().ok_or_else(|| syntax_err(form, "missing binding list"))?;
    let rest = body.cdr().unwrap_or(Value::Nil);
    Ok((bindings, rest))
}

fn binding_clauses(bindings: Value) -> SchemeResult<Vec<(crate::value::SymbolPtr, Value)>> {
    list_to_vec(bindings)?
        .into_iter()
        .map(|clause| {
            let k = clause
                .car()
                .and_then(|v| v.as_symbol())
                .ok_or_else(|| syntax_err("let", "binding name must be a symbol"))?;
            let e = clause
                .cdr()
                .and_then(|r| r.car())
                .ok_or_else(|| syntax_err("let", "missing binding expression"))?;
            Ok((k, e))
        })
        .collect()
}

/// `(let ((k e)…) body…)` -- each `e` is evaluated in the outer scope.
fn let_form(heap: &mut Heap, scope: ScopePtr, body: Operands) -> SchemeResult<Value> {
    let (bindings, rest) = split_let(body, "let")?;
    let clauses = binding_clauses(bindings)?;
    let scope_ptr = heap.allocate_scope();
    let mut child = Rooted::new(heap, scope_ptr);
    child.set_parent(Some(scope));
    for (k, e) in clauses {
        let v = eval_eager(heap, scope, e)?;
        child.bind(k, v);
    }
    eval_block(heap, *child, rest)
}

/// `(let* ((k e)…) body…)` -- each `e` sees the bindings before it.
fn let_star(heap: &mut Heap, scope: ScopePtr, body: Operands) -> SchemeResult<Value> {
    let (bindings, rest) = split_let(body, "let*")?;
    let clauses = binding_clauses(bindings)?;
    let scope_ptr = heap.allocate_scope();
    let mut child = Rooted::new(heap, scope_ptr);
    child.set_parent(Some(scope));
    for (k, e) in clauses {
        let v = eval_eager(heap, *child, e)?;
        child.bind(k, v);
    }
    eval_block(heap, *child, rest)
}

/// `(letrec ((k e)…) body…)` -- all names bound (to an unspecified
/// placeholder) before any `e` is evaluated, so mutually recursive
/// `lambda`s can close over each other.
fn letrec(heap: &mut Heap, scope: ScopePtr, body: Operands) -> SchemeResult<Value> {
    let (bindings, rest) = split_let(body, "letrec")?;
    let clauses = binding_clauses(bindings)?;
    let scope_ptr = heap.allocate_scope();
    let mut child = Rooted::new(heap, scope_ptr);
    child.set_parent(Some(scope));
    for (k, _) in &clauses {
        child.bind(*k, Value::Nil);
    }
    for (k, e) in clauses {
        let v = eval_eager(heap, *child, e)?;
        child.bind(k, v);
    }
    eval_block(heap, *child, rest)
}

/// `(cond (test body…)… (else body…))`.
fn cond(heap: &mut Heap, scope: ScopePtr, body: Operands) -> SchemeResult<Value> {
    let mut cur = body;
    while let Value::Pair(p) = cur {
        let clause = p.car();
        let test = clause.car().ok_or_else(|| syntax_err("cond", "empty clause"))?;
        let clause_body = clause.cdr().unwrap_or(Value::Nil);

        let is_else = matches!(test, Value::Symbol(s) if s.name == "else");
        if is_else {
            return eval_block(heap, scope, clause_body);
        }

        let t = eval_eager(heap, scope, test)?;
        if t.is_truthy() {
            return match clause_body {
                Value::Nil => Ok(t),
                _ => eval_block(heap, scope, clause_body),
            };
        }
        cur = p.cdr();
    }
    Ok(Value::Nil)
}

/// `(and …)` -- short-circuiting conjunction; the last operand is in tail
/// position.
fn and_form(heap: &mut Heap, scope: ScopePtr, body: Operands) -> SchemeResult<Value> {
    match body {
        Value::Nil => Ok(Value::Bool(true)),
        Value::Pair(p) => {
            if matches!(p.cdr(), Value::Nil) {
                eval_lazy(heap, scope, p.car())
            } else {
                let v = eval_eager(heap, scope, p.car())?;
                if !v.is_truthy() {
                    Ok(v)
                } else {
                    and_form(heap, scope, p.cdr())
                }
            }
        }
        other => Err(syntax_err("and", &format!("improper operand list `{}`", other.type_name()))),
    }
}

/// `(or …)` -- short-circuiting disjunction; the last operand is in tail
/// position.
fn or_form(heap: &mut Heap, scope: ScopePtr, body: Operands) -> SchemeResult<Value> {
    match body {
        Value::Nil => Ok(Value::Bool(false)),
        Value::Pair(p) => {
            if matches!(p.cdr(), Value::Nil) {
                eval_lazy(heap, scope, p.car())
            } else {
                let v = eval_eager(heap, scope, p.car())?;
                if v.is_truthy() {
                    Ok(v)
                } else {
                    or_form(heap, scope, p.cdr())
                }
            }
        }
        other => Err(syntax_err("or", &format!("improper operand list `{}`", other.type_name()))),
    }
}

/// `(begin body…)` -- plain sequencing, reusing `eval_block` directly.
fn begin(heap: &mut Heap, scope: ScopePtr, body: Operands) -> SchemeResult<Value> {
    eval_block(heap, scope, body)
}

/// `(syntax-rules (literals…) (pattern template)…)` -- builds a `Macro`
/// object; does not evaluate anything.
fn syntax_rules(heap: &mut Heap, _scope: ScopePtr, body: Operands) -> SchemeResult<Value> {
    let literals_list = body.car().ok_or_else(|| syntax_err("syntax-rules", "missing literals list"))?;
    let literals = list_to_vec(literals_list)?
        .into_iter()
        .map(|v| {
            v.as_symbol()
                .ok_or_else(|| syntax_err("syntax-rules", "literal must be a symbol"))
        })
        .collect::<SchemeResult<Vec<_>>>()?;

    let mut rules = Vec::new();
    let mut cur = body.cdr().unwrap_or(Value::Nil);
    while let Value::Pair(p) = cur {
        let rule = p.car();
        let pattern = rule
            .car()
            .ok_or_else(|| syntax_err("syntax-rules", "rule missing pattern"))?;
        let template = rule
            .cdr()
            .and_then(|r| r.car())
            .ok_or_else(|| syntax_err("syntax-rules", "rule missing template"))?;
        rules.push((pattern, template));
        cur = p.cdr();
    }

    let mut m = heap.allocate_macro();
    m.literals = literals;
    m.rules = rules;
    m.label = None;
    Ok(Value::Macro(*m))
}

/// `(define-syntax name (syntax-rules …))`.
fn define_syntax(heap: &mut Heap, scope: ScopePtr, body: Operands) -> SchemeResult<Value> {
    let name = body
        .car()
        .and_then(|v| v.as_symbol())
        .ok_or_else(|| syntax_err("define-syntax", "missing or non-symbol name"))?;
    let rules_expr = body
        .cdr()
        .and_then(|r| r.car())
        .ok_or_else(|| syntax_err("define-syntax", "missing syntax-rules expression"))?;
    let macro_val = eval_eager(heap, scope, rules_expr)?;
    if let Value::Macro(mut mp) = macro_val {
        mp.label = Some(name.name.clone());
    } else {
        return Err(InterpError::type_error(
            "define-syntax",
            "macro",
            macro_val.type_name(),
            1,
        ));
    }
    let mut scope = scope;
    scope.define(name, macro_val, &name.name)?;
    Ok(Value::Symbol(name))
}

fn register(heap: &mut Heap, scope: ScopePtr, name: &str, f: crate::value::SyntaxFn) {
    let mut s = heap.allocate_syntax();
    s.name = name.to_string();
    s.func = Some(f);
    let sym = heap.wrap_symbol(name);
    let mut scope = scope;
    scope.bind(sym, Value::Syntax(*s));
    trace!("registered special form `{name}`");
}

/// Binds every built-in special form into `scope` (ordinarily the root
/// scope, at interpreter startup).
pub fn install(heap: &mut Heap, scope: ScopePtr) {
    register(heap, scope, "quote", quote);
    register(heap, scope, "if", if_form);
    register(heap, scope, "define", define);
    register(heap, scope, "set!", set_bang);
    register(heap, scope, "lambda", lambda);
    register(heap, scope, "let", let_form);
    register(heap, scope, "let*", let_star);
    register(heap, scope, "letrec", letrec);
    register(heap, scope, "cond", cond);
    register(heap, scope, "and", and_form);
    register(heap, scope, "or", or_form);
    register(heap, scope, "begin", begin);
    register(heap, scope, "syntax-rules", syntax_rules);
    register(heap, scope, "define-syntax", define_syntax);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn run(src: &str) -> Value {
        let mut heap = Heap::new();
        let root = heap.root_scope();
        install(&mut heap, root);
        crate::primitives::install(&mut heap, root);
        let mut result = Value::Nil;
        for expr in Parser::parse_all(src, &mut heap).unwrap() {
            result = eval_eager(&mut heap, root, expr).unwrap();
        }
        result
    }

    #[test]
    fn if_picks_branch() {
        assert_eq!(run("(if #t 1 2)"), Value::Int(1));
        assert_eq!(run("(if #f 1 2)"), Value::Int(2));
        assert_eq!(run("(if #f 1)"), Value::Nil);
    }

    #[test]
    fn define_and_lookup() {
        assert_eq!(run("(define x 5) x"), Value::Int(5));
    }

    #[test]
    fn let_forms_scope_correctly() {
        assert_eq!(run("(let ((x 1) (y 2)) (+ x y))"), Value::Int(3));
        assert_eq!(run("(let* ((x 1) (y (+ x 1))) y)"), Value::Int(2));
    }

    #[test]
    fn letrec_supports_mutual_recursion() {
        let src = "
            (letrec ((even? (lambda (n) (if (= n 0) #t (odd? (- n 1)))))
                     (odd?  (lambda (n) (if (= n 0) #f (even? (- n 1))))))
              (even? 10))";
        assert_eq!(run(src), Value::Bool(true));
    }

    #[test]
    fn cond_and_logical_forms() {
        assert_eq!(run("(cond (#f 1) (#t 2) (else 3))"), Value::Int(2));
        assert_eq!(run("(and 1 2 3)"), Value::Int(3));
        assert_eq!(run("(and 1 #f 3)"), Value::Bool(false));
        assert_eq!(run("(or #f #f 7)"), Value::Int(7));
    }

    #[test]
    fn closures_capture_their_defining_scope() {
        let src = "(define (make-adder k) (lambda (x) (+ x k))) (define add3 (make-adder 3)) (add3 10)";
        assert_eq!(run(src), Value::Int(13));
    }

    #[test]
    fn macros_expand_and_evaluate() {
        let src = "(define-syntax when (syntax-rules () ((when t body ...) (if t (begin body ...) (quote ())))))
                   (when #t 42)";
        assert_eq!(run(src), Value::Int(42));
    }

    #[test]
    fn tail_recursion_does_not_overflow_the_host_stack() {
        let src = "(define (loop n) (if (= n 0) 'done (loop (- n 1)))) (loop 200000)";
        let mut heap = Heap::new();
        let root = heap.root_scope();
        install(&mut heap, root);
        crate::primitives::install(&mut heap, root);
        let mut result = Value::Nil;
        for expr in Parser::parse_all(src, &mut heap).unwrap() {
            result = eval_eager(&mut heap, root, expr).unwrap();
        }
        assert_eq!(heap.symbol_name(result.as_symbol().unwrap()), "done");
    }
}
