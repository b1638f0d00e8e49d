//! Lazy/eager evaluation, combination dispatch, and the tail-call trampoline.
//!
//! `eval_lazy` returns either a final value or a `Value::Thunk` -- a
//! deferred call the caller may choose to force immediately (`eval_eager`)
//! or propagate upward (tail position). `force` is the trampoline: it loops
//! invoking a thunk's lambda until a non-thunk value emerges, which is what
//! keeps tail recursion from consuming host stack frames.

use crate::error::{InterpError, SchemeResult};
use crate::heap::{Heap, Rooted};
use crate::value::{vec_to_list, LambdaPtr, ScopePtr, ThunkPtr, Value};

/// An argument vector longer than this is a fatal error rather than an
/// unbounded allocation. The spec requires only that some bound exist; this
/// implementation picks a generous one no realistic call site approaches.
pub const MAX_ARGS: usize = 4096;

/// Evaluate `expr` in `scope`, returning either a final value or a thunk
/// representing a deferred tail call.
pub fn eval_lazy(heap: &mut Heap, scope: ScopePtr, expr: Value) -> SchemeResult<Value> {
    match expr {
        Value::Symbol(sym) => scope
            .lookup(sym)
            .ok_or_else(|| InterpError::UnboundVariable(sym.name.clone())),
        Value::Pair(p) => eval_combination(heap, scope, p.car(), p.cdr()),
        other => Ok(other),
    }
}

/// Evaluate `expr` and drive any resulting thunk to completion.
pub fn eval_eager(heap: &mut Heap, scope: ScopePtr, expr: Value) -> SchemeResult<Value> {
    let lazy = eval_lazy(heap, scope, expr)?;
    force(heap, lazy)
}

/// The trampoline: while the current value is a thunk, invoke its lambda
/// and replace it with the result, keeping the in-flight value rooted the
/// whole time so a GC cycle triggered by the call cannot reclaim it.
pub fn force(heap: &mut Heap, v: Value) -> SchemeResult<Value> {
    let mut current = Rooted::new(heap, v);
    loop {
        match *current {
            Value::Thunk(t) => {
                let next = apply_thunk(heap, t)?;
                current = Rooted::new(heap, next);
            }
            other => return Ok(other),
        }
    }
}

fn apply_thunk(heap: &mut Heap, thunk: ThunkPtr) -> SchemeResult<Value> {
    let lambda = thunk
        .lambda
        .ok_or_else(|| InterpError::Internal("forced a thunk with no lambda".to_string()))?;
    call_lambda(heap, lambda, &thunk.args)
}

/// Apply `lambda` to `args`, returning a lazy result: a fresh child scope is
/// allocated (parented to the lambda's captured scope), the formals are
/// bound into it, and the body is evaluated there with `eval_block`, whose
/// final expression is returned lazily so tail calls keep trampolining.
pub fn call_lambda(heap: &mut Heap, lambda: LambdaPtr, args: &[Value]) -> SchemeResult<Value> {
    let params = lambda.params;
    let body = lambda.body;
    let parent = lambda.scope;

    let scope_ptr = heap.allocate_scope();
    let mut child = Rooted::new(heap, scope_ptr);
    child.set_parent(parent);
    bind_params(heap, *child, params, args)?;
    eval_block(heap, *child, body)
}

/// Bind `params` (a proper list of symbols, a single variadic symbol, or a
/// dotted list of fixed-then-rest symbols) to `args` inside `scope`.
fn bind_params(heap: &mut Heap, mut scope: ScopePtr, params: Value, args: &[Value]) -> SchemeResult<()> {
    match params {
        Value::Nil => {
            if args.is_empty() {
                Ok(())
            } else {
                Err(InterpError::arity("lambda", "0", args.len()))
            }
        }
        Value::Symbol(rest_name) => {
            let list = vec_to_list(heap, args);
            scope.bind(rest_name, list);
            Ok(())
        }
        Value::Pair(p) => {
            let first = p
                .car()
                .as_symbol()
                .ok_or_else(|| InterpError::type_error("lambda", "symbol", p.car().type_name(), 0))?;
            if args.is_empty() {
                return Err(InterpError::arity("lambda", "at least 1", 0));
            }
            scope.bind(first, args[0]);
            bind_params(heap, scope, p.cdr(), &args[1..])
        }
        other => Err(InterpError::type_error(
            "lambda",
            "parameter list",
            other.type_name(),
            0,
        )),
    }
}

/// Evaluate each expression of `body` in order, forcing and discarding every
/// intermediate result; the final expression is returned lazily.
pub fn eval_block(heap: &mut Heap, scope: ScopePtr, body: Value) -> SchemeResult<Value> {
    let mut cur = body;
    loop {
        match cur {
            Value::Nil => return Ok(Value::Nil),
            Value::Pair(p) => {
                let rest = p.cdr();
                if matches!(rest, Value::Nil) {
                    return eval_lazy(heap, scope, p.car());
                }
                eval_eager(heap, scope, p.car())?;
                cur = rest;
            }
            other => return Err(InterpError::syntax("body", format!("improper body tail `{}`", other.type_name()))),
        }
    }
}

/// Evaluate a combination `(head . tail)`: `head` is always evaluated
/// eagerly; what it evaluates to determines whether `tail` is handled as
/// special-form operands, a macro call, or an ordinary argument list.
fn eval_combination(heap: &mut Heap, scope: ScopePtr, head_expr: Value, tail: Value) -> SchemeResult<Value> {
    let head_value = eval_eager(heap, scope, head_expr)?;
    let head = Rooted::new(heap, head_value);
    match *head {
        Value::Syntax(s) => {
            let f = s
                .func
                .ok_or_else(|| InterpError::Internal("syntax object with no handler".to_string()))?;
            f(heap, scope, tail)
        }
        Value::Macro(m) => {
            let expansion = crate::macros::expand_macro(heap, &m, tail)?;
            eval_lazy(heap, scope, expansion)
        }
        Value::Native(n) => {
            let args = eval_args(heap, scope, tail)?;
            let plain: Vec<Value> = args.iter().map(|r| **r).collect();
            let f = n
                .func
                .ok_or_else(|| InterpError::Internal("native object with no function".to_string()))?;
            f(heap, &plain)
        }
        Value::Lambda(l) => {
            let args = eval_args(heap, scope, tail)?;
            let mut thunk = heap.allocate_thunk();
            thunk.lambda = Some(l);
            thunk.args = args.iter().map(|r| **r).collect();
            Ok(Value::Thunk(*thunk))
        }
        other => Err(InterpError::type_error(
            "combination",
            "callable, syntax, or macro",
            other.type_name(),
            0,
        )),
    }
}

/// Apply a first-class procedure value (`Native` or `Lambda`) to an already
/// evaluated argument vector, forcing the result. Used by primitives such as
/// `fold` that take a procedure argument and must call back into it.
pub fn apply_procedure(heap: &mut Heap, proc: Value, args: &[Value]) -> SchemeResult<Value> {
    match proc {
        Value::Native(n) => {
            let f = n
                .func
                .ok_or_else(|| InterpError::Internal("native object with no function".to_string()))?;
            f(heap, args)
        }
        Value::Lambda(l) => {
            let lazy = call_lambda(heap, l, args)?;
            force(heap, lazy)
        }
        other => Err(InterpError::type_error("apply", "procedure", other.type_name(), 0)),
    }
}

/// Evaluate every element of `tail` left-to-right into an argument vector,
/// rooting each as it is produced so an allocation triggered by evaluating a
/// later argument -- or by whatever the caller does with the whole vector
/// next -- cannot reclaim an earlier one. Callers must keep the returned
/// guards alive for as long as the values are still in use.
fn eval_args(heap: &mut Heap, scope: ScopePtr, tail: Value) -> SchemeResult<Vec<Rooted<Value>>> {
    let mut rooted = Vec::new();
    let mut cur = tail;
    loop {
        match cur {
            Value::Nil => break,
            Value::Pair(p) => {
                if rooted.len() >= MAX_ARGS {
                    return Err(InterpError::Resource(format!(
                        "argument vector exceeds {MAX_ARGS} elements"
                    )));
                }
                let v = eval_eager(heap, scope, p.car())?;
                rooted.push(Rooted::new(heap, v));
                cur = p.cdr();
            }
            other => {
                return Err(InterpError::syntax(
                    "argument list",
                    format!("improper argument list tail `{}`", other.type_name()),
                ))
            }
        }
    }
    Ok(rooted)
}
