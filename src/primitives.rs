//! Host-implemented (`Native`) procedures: pairs, arithmetic, equality,
//! strings/characters, port I/O, and display/write.
//!
//! Every primitive validates its arity and argument variants up front and
//! fails with [`InterpError::Arity`] or [`InterpError::Type`], naming the
//! procedure and (for type errors) the offending argument position, exactly
//! as the built-in special forms do.

use std::io::{self, Read, Write as _};

use log::trace;

use crate::error::{InterpError, SchemeResult};
use crate::eval::apply_procedure;
use crate::heap::Heap;
use crate::value::{equal, list_len, list_to_vec, vec_to_list, PortKind, ScopePtr, Value};

fn arity(name: &str, expected: usize, args: &[Value]) -> SchemeResult<()> {
    if args.len() != expected {
        Err(InterpError::arity(name, expected.to_string(), args.len()))
    } else {
        Ok(())
    }
}

fn type_err(op: &str, expected: &str, got: Value, position: usize) -> InterpError {
    InterpError::type_error(op, expected, got.type_name(), position)
}

/// # Pairs and lists

fn car(_heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    arity("car", 1, args)?;
    args[0].car().ok_or_else(|| type_err("car", "pair", args[0], 0))
}

fn cdr(_heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    arity("cdr", 1, args)?;
    args[0].cdr().ok_or_else(|| type_err("cdr", "pair", args[0], 0))
}

fn cons(heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    arity("cons", 2, args)?;
    Ok(Value::new_pair(heap, args[0], args[1]))
}

fn set_cdr_bang(_heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    arity("set-cdr!", 2, args)?;
    match args[0] {
        Value::Pair(mut p) => {
            p.set_cdr(args[1]);
            Ok(Value::Nil)
        }
        other => Err(type_err("set-cdr!", "pair", other, 0)),
    }
}

fn pair_p(_heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    arity("pair?", 1, args)?;
    Ok(Value::Bool(args[0].is_pair()))
}

fn null_p(_heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    arity("null?", 1, args)?;
    Ok(Value::Bool(args[0].is_nil()))
}

fn symbol_p(_heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    arity("symbol?", 1, args)?;
    Ok(Value::Bool(matches!(args[0], Value::Symbol(_))))
}

fn boolean_p(_heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    arity("boolean?", 1, args)?;
    Ok(Value::Bool(matches!(args[0], Value::Bool(_))))
}

fn procedure_p(_heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    arity("procedure?", 1, args)?;
    Ok(Value::Bool(args[0].is_callable()))
}

fn string_p(_heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    arity("string?", 1, args)?;
    Ok(Value::Bool(matches!(args[0], Value::Str(_))))
}

fn integer_p(_heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    arity("integer?", 1, args)?;
    Ok(Value::Bool(matches!(args[0], Value::Int(_))))
}

fn char_p(_heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    arity("char?", 1, args)?;
    Ok(Value::Bool(matches!(args[0], Value::Char(_))))
}

fn list(heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    Ok(vec_to_list(heap, args))
}

fn length(_heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    arity("length", 1, args)?;
    list_len(args[0])
        .map(|n| Value::Int(n as i64))
        .ok_or_else(|| type_err("length", "proper list", args[0], 0))
}

fn reverse(heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    arity("reverse", 1, args)?;
    let mut items = list_to_vec(args[0]).map_err(|_| type_err("reverse", "proper list", args[0], 0))?;
    items.reverse();
    Ok(vec_to_list(heap, &items))
}

fn append(heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    if args.is_empty() {
        return Ok(Value::Nil);
    }
    let (last, init) = args.split_last().unwrap();
    let mut result = crate::heap::Rooted::new(heap, *last);
    for v in init.iter().rev() {
        let items = list_to_vec(*v).map_err(|_| type_err("append", "proper list", *v, 0))?;
        for item in items.into_iter().rev() {
            let next = Value::new_pair(heap, item, *result);
            result = crate::heap::Rooted::new(heap, next);
        }
    }
    Ok(*result)
}

fn fold(heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    arity("fold", 3, args)?;
    let proc = args[0];
    let items = list_to_vec(args[2]).map_err(|_| type_err("fold", "proper list", args[2], 2))?;
    // Each intermediate accumulator is freshly allocated by `proc` and
    // otherwise unreferenced, so it must stay rooted across the next
    // callback's allocations until it is either replaced or returned.
    let mut acc = crate::heap::Rooted::new(heap, args[1]);
    for elt in items {
        let next = apply_procedure(heap, proc, &[elt, *acc])?;
        acc = crate::heap::Rooted::new(heap, next);
    }
    Ok(*acc)
}

/// # Equality

fn eq_p(_heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    arity("eq?", 2, args)?;
    Ok(Value::Bool(args[0] == args[1]))
}

fn equal_p(_heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    arity("equal?", 2, args)?;
    Ok(Value::Bool(equal(args[0], args[1])))
}

fn not(_heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    arity("not", 1, args)?;
    Ok(Value::Bool(!args[0].is_truthy()))
}

/// # Arithmetic

fn as_int(op: &str, v: Value, position: usize) -> SchemeResult<i64> {
    v.as_int().ok_or_else(|| type_err(op, "integer", v, position))
}

fn plus(_heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    let mut sum: i64 = 0;
    for (i, &a) in args.iter().enumerate() {
        sum += as_int("+", a, i)?;
    }
    Ok(Value::Int(sum))
}

fn minus(_heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    arity("-", 2, args)?;
    Ok(Value::Int(as_int("-", args[0], 0)? - as_int("-", args[1], 1)?))
}

fn times(_heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    arity("*", 2, args)?;
    Ok(Value::Int(as_int("*", args[0], 0)? * as_int("*", args[1], 1)?))
}

fn divide(_heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    arity("/", 2, args)?;
    let a = as_int("/", args[0], 0)?;
    let b = as_int("/", args[1], 1)?;
    if b == 0 {
        return Err(InterpError::Type {
            op: "/".to_string(),
            expected: "nonzero divisor".to_string(),
            got: "0".to_string(),
            position: 1,
        });
    }
    Ok(Value::Int(a / b))
}

fn num_eq(_heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    arity("=", 2, args)?;
    Ok(Value::Bool(as_int("=", args[0], 0)? == as_int("=", args[1], 1)?))
}

fn num_lt(_heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    arity("<", 2, args)?;
    Ok(Value::Bool(as_int("<", args[0], 0)? < as_int("<", args[1], 1)?))
}

fn modulo(_heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    arity("modulo", 2, args)?;
    let a = as_int("modulo", args[0], 0)?;
    let b = as_int("modulo", args[1], 1)?;
    if b == 0 {
        return Err(InterpError::Type {
            op: "modulo".to_string(),
            expected: "nonzero divisor".to_string(),
            got: "0".to_string(),
            position: 1,
        });
    }
    let r = a % b;
    Ok(Value::Int(if r != 0 && (r < 0) != (b < 0) { r + b } else { r }))
}

/// # Strings and characters

fn as_str_ptr(op: &str, v: Value, position: usize) -> SchemeResult<crate::value::StringPtr> {
    match v {
        Value::Str(p) => Ok(p),
        other => Err(type_err(op, "string", other, position)),
    }
}

fn string_length(_heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    arity("string-length", 1, args)?;
    let s = as_str_ptr("string-length", args[0], 0)?;
    Ok(Value::Int(s.chars.len() as i64))
}

fn string_ref(_heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    arity("string-ref", 2, args)?;
    let s = as_str_ptr("string-ref", args[0], 0)?;
    let i = as_int("string-ref", args[1], 1)?;
    let idx = usize::try_from(i).map_err(|_| type_err("string-ref", "non-negative index", args[1], 1))?;
    s.chars
        .get(idx)
        .map(|c| Value::Char(*c))
        .ok_or_else(|| type_err("string-ref", "in-bounds index", args[1], 1))
}

fn string_set_bang(_heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    arity("string-set!", 3, args)?;
    let mut s = as_str_ptr("string-set!", args[0], 0)?;
    let i = as_int("string-set!", args[1], 1)?;
    let idx = usize::try_from(i).map_err(|_| type_err("string-set!", "non-negative index", args[1], 1))?;
    let c = match args[2] {
        Value::Char(c) => c,
        other => return Err(type_err("string-set!", "character", other, 2)),
    };
    let slot = s
        .chars
        .get_mut(idx)
        .ok_or_else(|| type_err("string-set!", "in-bounds index", args[1], 1))?;
    *slot = c;
    Ok(Value::Nil)
}

fn string_copy(heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    arity("string-copy", 1, args)?;
    let s = as_str_ptr("string-copy", args[0], 0)?;
    Ok(Value::new_string(heap, &s.as_string()))
}

fn string_append(heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    let mut out = String::new();
    for (i, &a) in args.iter().enumerate() {
        let s = as_str_ptr("string-append", a, i)?;
        out.push_str(&s.as_string());
    }
    Ok(Value::new_string(heap, &out))
}

fn substring(heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    arity("substring", 3, args)?;
    let s = as_str_ptr("substring", args[0], 0)?;
    let start = usize::try_from(as_int("substring", args[1], 1)?)
        .map_err(|_| type_err("substring", "non-negative index", args[1], 1))?;
    let end = usize::try_from(as_int("substring", args[2], 2)?)
        .map_err(|_| type_err("substring", "non-negative index", args[2], 2))?;
    if start > end || end > s.chars.len() {
        return Err(type_err("substring", "valid index range", args[2], 2));
    }
    let slice: String = s.chars[start..end].iter().collect();
    Ok(Value::new_string(heap, &slice))
}

fn string_eq_p(_heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    arity("string=?", 2, args)?;
    let a = as_str_ptr("string=?", args[0], 0)?;
    let b = as_str_ptr("string=?", args[1], 1)?;
    Ok(Value::Bool(a.chars == b.chars))
}

fn string_to_list(heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    arity("string->list", 1, args)?;
    let s = as_str_ptr("string->list", args[0], 0)?;
    let chars: Vec<Value> = s.chars.iter().map(|&c| Value::Char(c)).collect();
    Ok(vec_to_list(heap, &chars))
}

fn list_to_string(heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    arity("list->string", 1, args)?;
    let items = list_to_vec(args[0]).map_err(|_| type_err("list->string", "proper list", args[0], 0))?;
    let mut s = String::with_capacity(items.len());
    for (i, v) in items.into_iter().enumerate() {
        match v {
            Value::Char(c) => s.push(c),
            other => return Err(type_err("list->string", "character", other, i)),
        }
    }
    Ok(Value::new_string(heap, &s))
}

/// # Ports and I/O

fn write_to_port(op: &str, port_arg: Option<Value>, text: &str) -> SchemeResult<()> {
    match port_arg {
        None => {
            print!("{text}");
            let _ = io::stdout().flush();
            Ok(())
        }
        Some(Value::Port(p)) => match &p.kind {
            PortKind::Stdout => {
                print!("{text}");
                let _ = io::stdout().flush();
                Ok(())
            }
            _ => Err(type_err(op, "output port", Value::Port(p), 1)),
        },
        Some(other) => Err(type_err(op, "port", other, 1)),
    }
}

fn write(_heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    if args.is_empty() || args.len() > 2 {
        return Err(InterpError::arity("write", "1 or 2", args.len()));
    }
    write_to_port("write", args.get(1).copied(), &crate::writer::write_string(args[0]))?;
    Ok(Value::Nil)
}

fn display(_heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    if args.is_empty() || args.len() > 2 {
        return Err(InterpError::arity("display", "1 or 2", args.len()));
    }
    write_to_port("display", args.get(1).copied(), &crate::writer::display_string(args[0]))?;
    Ok(Value::Nil)
}

fn newline(_heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    if args.len() > 1 {
        return Err(InterpError::arity("newline", "0 or 1", args.len()));
    }
    write_to_port("newline", args.first().copied(), "\n")?;
    Ok(Value::Nil)
}

fn read_one_char<R: Read>(reader: &mut R) -> SchemeResult<Value> {
    let mut buf = [0u8; 1];
    match reader.read(&mut buf) {
        Ok(0) => Ok(Value::Bool(false)),
        Ok(_) => Ok(Value::Char(buf[0] as char)),
        Err(e) => Err(InterpError::Resource(e.to_string())),
    }
}

fn read_char(_heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    if args.len() > 1 {
        return Err(InterpError::arity("read-char", "0 or 1", args.len()));
    }
    match args.first().copied() {
        None => read_one_char(&mut io::stdin()),
        Some(Value::Port(mut p)) => match &mut p.kind {
            PortKind::Stdin => read_one_char(&mut io::stdin()),
            PortKind::Input(reader) => read_one_char(reader),
            PortKind::Closed => Err(InterpError::Resource("read-char: port is closed".to_string())),
            PortKind::Stdout => Err(type_err("read-char", "input port", Value::Port(p), 0)),
        },
        Some(other) => Err(type_err("read-char", "port", other, 0)),
    }
}

fn open_input_file(heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
    arity("open-input-file", 1, args)?;
    let path = match args[0] {
        Value::Str(s) => s.as_string(),
        other => return Err(type_err("open-input-file", "string", other, 0)),
    };
    let file = std::fs::File::open(&path)
        .map_err(|e| InterpError::Resource(format!("open-input-file: {path}: {e}")))?;
    let mut port = heap.allocate_port();
    port.kind = PortKind::Input(io::BufReader::new(file));
    port.path = Some(path);
    Ok(Value::Port(*port))
}

fn register(heap: &mut Heap, scope: ScopePtr, name: &str, f: crate::value::NativeFn) {
    let mut n = heap.allocate_native();
    n.name = name.to_string();
    n.func = Some(f);
    let sym = heap.wrap_symbol(name);
    let mut scope = scope;
    scope.bind(sym, Value::Native(*n));
    trace!("registered primitive `{name}`");
}

macro_rules! car_cdr_accessor {
    ($fn_name:ident, $name:literal, [$($is_car:expr),+]) => {
        fn $fn_name(_heap: &mut Heap, args: &[Value]) -> SchemeResult<Value> {
            arity($name, 1, args)?;
            let mut v = args[0];
            let ops: &[bool] = &[$($is_car),+];
            for &is_car in ops.iter().rev() {
                v = if is_car {
                    v.car().ok_or_else(|| type_err($name, "pair", v, 0))?
                } else {
                    v.cdr().ok_or_else(|| type_err($name, "pair", v, 0))?
                };
            }
            Ok(v)
        }
    };
}

car_cdr_accessor!(cadr, "cadr", [true, false]);
car_cdr_accessor!(caddr, "caddr", [true, false, false]);
car_cdr_accessor!(cadddr, "cadddr", [true, false, false, false]);
car_cdr_accessor!(cddr, "cddr", [false, false]);
car_cdr_accessor!(cdddr, "cdddr", [false, false, false]);

/// Binds every built-in procedure into `scope` (ordinarily the root scope,
/// at interpreter startup).
pub fn install(heap: &mut Heap, scope: ScopePtr) {
    register(heap, scope, "car", car);
    register(heap, scope, "cdr", cdr);
    register(heap, scope, "cons", cons);
    register(heap, scope, "set-cdr!", set_cdr_bang);
    register(heap, scope, "pair?", pair_p);
    register(heap, scope, "null?", null_p);
    register(heap, scope, "symbol?", symbol_p);
    register(heap, scope, "boolean?", boolean_p);
    register(heap, scope, "procedure?", procedure_p);
    register(heap, scope, "string?", string_p);
    register(heap, scope, "integer?", integer_p);
    register(heap, scope, "char?", char_p);
    register(heap, scope, "list", list);
    register(heap, scope, "length", length);
    register(heap, scope, "reverse", reverse);
    register(heap, scope, "append", append);
    register(heap, scope, "fold", fold);
    register(heap, scope, "cadr", cadr);
    register(heap, scope, "caddr", caddr);
    register(heap, scope, "cadddr", cadddr);
    register(heap, scope, "cddr", cddr);
    register(heap, scope, "cdddr", cdddr);

    register(heap, scope, "eq?", eq_p);
    register(heap, scope, "equal?", equal_p);
    register(heap, scope, "not", not);

    register(heap, scope, "+", plus);
    register(heap, scope, "-", minus);
    register(heap, scope, "*", times);
    register(heap, scope, "/", divide);
    register(heap, scope, "=", num_eq);
    register(heap, scope, "<", num_lt);
    register(heap, scope, "modulo", modulo);

    register(heap, scope, "string-length", string_length);
    register(heap, scope, "string-ref", string_ref);
    register(heap, scope, "string-set!", string_set_bang);
    register(heap, scope, "string-copy", string_copy);
    register(heap, scope, "string-append", string_append);
    register(heap, scope, "substring", substring);
    register(heap, scope, "string=?", string_eq_p);
    register(heap, scope, "string->list", string_to_list);
    register(heap, scope, "list->string", list_to_string);

    register(heap, scope, "write", write);
    register(heap, scope, "display", display);
    register(heap, scope, "newline", newline);
    register(heap, scope, "read-char", read_char);
    register(heap, scope, "open-input-file", open_input_file);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn run(src: &str) -> Value {
        let mut heap = Heap::new();
        let root = heap.root_scope();
        crate::special_forms::install(&mut heap, root);
        install(&mut heap, root);
        let mut result = Value::Nil;
        for expr in Parser::parse_all(src, &mut heap).unwrap() {
            result = crate::eval::eval_eager(&mut heap, root, expr).unwrap();
        }
        result
    }

    #[test]
    fn arithmetic_is_pure() {
        assert_eq!(run("(+ 2 3)"), Value::Int(5));
        assert_eq!(run("(+)"), Value::Int(0));
        assert_eq!(run("(* 6 7)"), Value::Int(42));
        assert_eq!(run("(- 10 3)"), Value::Int(7));
        assert_eq!(run("(/ 10 3)"), Value::Int(3));
        assert_eq!(run("(modulo -7 3)"), Value::Int(2));
    }

    #[test]
    fn divide_by_zero_is_a_type_error() {
        let mut heap = Heap::new();
        let root = heap.root_scope();
        crate::special_forms::install(&mut heap, root);
        install(&mut heap, root);
        let expr = Parser::parse_all("(/ 1 0)", &mut heap).unwrap().remove(0);
        assert!(crate::eval::eval_eager(&mut heap, root, expr).is_err());
    }

    #[test]
    fn list_ops() {
        assert_eq!(run("(length (list 1 2 3))"), Value::Int(3));
        assert_eq!(run("(car (cons 1 2))"), Value::Int(1));
        assert_eq!(run("(cdr (cons 1 2))"), Value::Int(2));
        assert_eq!(run("(cadr (list 1 2 3))"), Value::Int(2));
        assert_eq!(run("(caddr (list 1 2 3))"), Value::Int(3));
    }

    #[test]
    fn fact_via_recursion() {
        let src = "(define (fact n) (if (= n 0) 1 (* n (fact (- n 1))))) (fact 6)";
        assert_eq!(run(src), Value::Int(720));
    }

    #[test]
    fn last_via_cond_recursion() {
        let src = "(define (last xs) (cond ((null? (cdr xs)) xs) (else (last (cdr xs)))))
                   (car (last (list 1 2 3 4)))";
        assert_eq!(run(src), Value::Int(4));
    }

    #[test]
    fn string_ops() {
        assert_eq!(run("(string-length (string-append \"foo\" \"bar\"))"), Value::Int(6));
        assert_eq!(run("(string=? \"abc\" \"abc\")"), Value::Bool(true));
    }

    #[test]
    fn string_list_round_trip() {
        assert_eq!(run("(string=? (list->string (string->list \"hi\")) \"hi\")"), Value::Bool(true));
    }

    #[test]
    fn fold_applies_a_lambda() {
        assert_eq!(run("(fold + 0 (list 1 2 3 4))"), Value::Int(10));
    }

    #[test]
    fn reverse_twice_is_identity() {
        assert_eq!(
            run("(equal? (reverse (reverse (list 1 2 3))) (list 1 2 3))"),
            Value::Bool(true)
        );
    }
}
