use std::{
    cell::RefCell,
    cmp::Ordering,
    hash::{Hash, Hasher},
    rc::Rc,
};

use ahash::AHashSet;

use crate::{
    builtins::Builtins,
    bytecode::CodeUnit,
    exceptions::{ExcType, RunResult, SimpleException},
    for_iterator::ForIterator,
    function::Function,
    types::{
        BoundMethod, Dict, List, Method, Range, Set, SimpleNamespace, Slice, Type, dict::mapping_pairs, list,
        list::Selected, str as string,
    },
};

/// Primary value type representing Python objects at runtime.
///
/// Immutable scalars are stored inline. Mutable containers are shared through
/// `Rc<RefCell<..>>`, so cloning a `Value` copies a reference, never the data:
/// in-place mutation through one alias is visible through every other.
#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(List),
    Tuple(Rc<[Value]>),
    Dict(Rc<RefCell<Dict>>),
    Set(Rc<RefCell<Set>>),
    Range(Range),
    Slice(Rc<Slice>),
    Iterator(Rc<RefCell<ForIterator>>),
    Function(Rc<Function>),
    Builtin(Builtins),
    BoundMethod(Rc<BoundMethod>),
    Exception(Rc<SimpleException>),
    Namespace(Rc<RefCell<SimpleNamespace>>),
    Code(Rc<CodeUnit>),
    /// Placeholder `LOAD_METHOD` leaves when the receiver has no such attribute.
    /// `CALL_METHOD` consumes it; running code never sees it.
    Undefined,
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.into())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v.into())
    }
}

impl From<Rc<str>> for Value {
    fn from(v: Rc<str>) -> Self {
        Self::Str(v)
    }
}

/// Binary operators shared by the `BINARY_*` and `INPLACE_*` opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mult,
    Div,
    FloorDiv,
    Mod,
    Pow,
    MatMul,
    LShift,
    RShift,
    And,
    Or,
    Xor,
}

impl BinaryOp {
    /// Operator symbol as it appears in CPython's `TypeError` messages.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mult => "*",
            Self::Div => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
            Self::Pow => "** or pow()",
            Self::MatMul => "@",
            Self::LShift => "<<",
            Self::RShift => ">>",
            Self::And => "&",
            Self::Or => "|",
            Self::Xor => "^",
        }
    }

    #[must_use]
    pub fn inplace_symbol(self) -> &'static str {
        match self {
            Self::Add => "+=",
            Self::Sub => "-=",
            Self::Mult => "*=",
            Self::Div => "/=",
            Self::FloorDiv => "//=",
            Self::Mod => "%=",
            Self::Pow => "**=",
            Self::MatMul => "@=",
            Self::LShift => "<<=",
            Self::RShift => ">>=",
            Self::And => "&=",
            Self::Or => "|=",
            Self::Xor => "^=",
        }
    }
}

/// Numeric view of a value, bools count as ints.
#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn to_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }
}

fn int_overflow() -> crate::exceptions::RunError {
    ExcType::overflow_error("integer overflow")
}

impl Value {
    // ============================================================================
    // Construction
    // ============================================================================

    #[must_use]
    pub fn new_list(items: Vec<Value>) -> Self {
        Self::List(Rc::new(RefCell::new(items)))
    }

    #[must_use]
    pub fn new_tuple(items: Vec<Value>) -> Self {
        Self::Tuple(items.into())
    }

    #[must_use]
    pub fn new_dict(dict: Dict) -> Self {
        Self::Dict(Rc::new(RefCell::new(dict)))
    }

    #[must_use]
    pub fn new_set(set: Set) -> Self {
        Self::Set(Rc::new(RefCell::new(set)))
    }

    #[must_use]
    pub fn new_slice(start: Value, stop: Value, step: Value) -> Self {
        Self::Slice(Rc::new(Slice::new(start, stop, step)))
    }

    #[must_use]
    pub fn new_namespace(namespace: SimpleNamespace) -> Self {
        Self::Namespace(Rc::new(RefCell::new(namespace)))
    }

    #[must_use]
    pub fn new_exception(exc: SimpleException) -> Self {
        Self::Exception(Rc::new(exc))
    }

    // ============================================================================
    // Introspection
    // ============================================================================

    #[must_use]
    pub fn py_type(&self) -> Type {
        match self {
            Self::None => Type::NoneType,
            Self::Bool(_) => Type::Bool,
            Self::Int(_) => Type::Int,
            Self::Float(_) => Type::Float,
            Self::Str(_) => Type::Str,
            Self::List(_) => Type::List,
            Self::Tuple(_) => Type::Tuple,
            Self::Dict(_) => Type::Dict,
            Self::Set(_) => Type::Set,
            Self::Range(_) => Type::Range,
            Self::Slice(_) => Type::Slice,
            Self::Iterator(_) => Type::Iterator,
            Self::Function(_) => Type::Function,
            Self::Builtin(builtin) => builtin.py_type(),
            Self::BoundMethod(_) => Type::BuiltinFunction,
            Self::Exception(exc) => Type::Exception(exc.exc_type()),
            Self::Namespace(_) => Type::Namespace,
            Self::Code(_) => Type::Code,
            Self::Undefined => Type::NoneType,
        }
    }

    /// Python truthiness.
    #[must_use]
    pub fn py_bool(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::List(l) => !l.borrow().is_empty(),
            Self::Tuple(t) => !t.is_empty(),
            Self::Dict(d) => !d.borrow().is_empty(),
            Self::Set(s) => !s.borrow().is_empty(),
            Self::Range(r) => !r.is_empty(),
            _ => true,
        }
    }

    /// `len(value)`, `None` when the type has no length.
    #[must_use]
    pub fn py_len(&self) -> Option<usize> {
        match self {
            Self::Str(s) => Some(s.chars().count()),
            Self::List(l) => Some(l.borrow().len()),
            Self::Tuple(t) => Some(t.len()),
            Self::Dict(d) => Some(d.borrow().len()),
            Self::Set(s) => Some(s.borrow().len()),
            Self::Range(r) => Some(r.len()),
            _ => None,
        }
    }

    /// Integer view of ints and bools.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    fn as_num(&self) -> Option<Num> {
        match self {
            Self::Int(i) => Some(Num::Int(*i)),
            Self::Bool(b) => Some(Num::Int(i64::from(*b))),
            Self::Float(f) => Some(Num::Float(*f)),
            _ => None,
        }
    }

    // ============================================================================
    // Identity, equality, ordering and hashing
    // ============================================================================

    /// Identity comparison (`is`).
    ///
    /// Heap-backed values compare by pointer; None, bools and ints by value; floats bitwise.
    #[must_use]
    pub fn py_is(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Str(a), Self::Str(b)) => Rc::ptr_eq(a, b),
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b),
            (Self::Tuple(a), Self::Tuple(b)) => Rc::ptr_eq(a, b),
            (Self::Dict(a), Self::Dict(b)) => Rc::ptr_eq(a, b),
            (Self::Set(a), Self::Set(b)) => Rc::ptr_eq(a, b),
            (Self::Range(a), Self::Range(b)) => a == b,
            (Self::Slice(a), Self::Slice(b)) => Rc::ptr_eq(a, b),
            (Self::Iterator(a), Self::Iterator(b)) => Rc::ptr_eq(a, b),
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(a, b),
            (Self::Builtin(a), Self::Builtin(b)) => a == b,
            (Self::BoundMethod(a), Self::BoundMethod(b)) => Rc::ptr_eq(a, b),
            (Self::Exception(a), Self::Exception(b)) => Rc::ptr_eq(a, b),
            (Self::Namespace(a), Self::Namespace(b)) => Rc::ptr_eq(a, b),
            (Self::Code(a), Self::Code(b)) => Rc::ptr_eq(a, b),
            (Self::Undefined, Self::Undefined) => true,
            _ => false,
        }
    }

    /// Python `==`.
    #[must_use]
    pub fn py_eq(&self, other: &Self) -> bool {
        if let (Some(a), Some(b)) = (self.as_num(), other.as_num()) {
            return num_cmp(a, b) == Some(Ordering::Equal);
        }
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b) || seq_eq(&a.borrow(), &b.borrow()),
            (Self::Tuple(a), Self::Tuple(b)) => seq_eq(a, b),
            (Self::Dict(a), Self::Dict(b)) => Rc::ptr_eq(a, b) || a.borrow().py_eq(&b.borrow()),
            (Self::Set(a), Self::Set(b)) => Rc::ptr_eq(a, b) || a.borrow().py_eq(&b.borrow()),
            (Self::Range(a), Self::Range(b)) => a.py_eq(b),
            (Self::Slice(a), Self::Slice(b)) => {
                a.start.py_eq(&b.start) && a.stop.py_eq(&b.stop) && a.step.py_eq(&b.step)
            }
            (Self::Namespace(a), Self::Namespace(b)) => Rc::ptr_eq(a, b) || a.borrow().py_eq(&b.borrow()),
            _ => self.py_is(other),
        }
    }

    /// Python ordering, `None` when the two values cannot be ordered
    /// (including comparisons involving NaN).
    #[must_use]
    pub fn py_cmp(&self, other: &Self) -> Option<Ordering> {
        if let (Some(a), Some(b)) = (self.as_num(), other.as_num()) {
            return num_cmp(a, b);
        }
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => Some(a.cmp(b)),
            (Self::List(a), Self::List(b)) => seq_cmp(&a.borrow(), &b.borrow()),
            (Self::Tuple(a), Self::Tuple(b)) => seq_cmp(a, b),
            _ => None,
        }
    }

    /// Python's `self < other`, the comparison sorting is built on.
    ///
    /// Unordered values of orderable types, such as NaN, are not less.
    pub fn py_lt(&self, other: &Self) -> RunResult<bool> {
        match self.py_cmp(other) {
            Some(ordering) => Ok(ordering == Ordering::Less),
            None if self.is_orderable_with(other) => Ok(false),
            None => Err(ExcType::compare_type_error("<", self.py_type(), other.py_type())),
        }
    }

    /// Whether the two types support ordering at all, even if these particular values are unordered.
    pub(crate) fn is_orderable_with(&self, other: &Self) -> bool {
        match (self, other) {
            (a, b) if a.as_num().is_some() && b.as_num().is_some() => true,
            (Self::Str(_), Self::Str(_)) | (Self::List(_), Self::List(_)) | (Self::Tuple(_), Self::Tuple(_)) => true,
            _ => false,
        }
    }

    /// Whether the value can be used as a dict key or set element.
    #[must_use]
    pub fn is_hashable(&self) -> bool {
        match self {
            Self::List(_) | Self::Dict(_) | Self::Set(_) | Self::Slice(_) | Self::Namespace(_) => false,
            Self::Tuple(items) => items.iter().all(Self::is_hashable),
            _ => true,
        }
    }

    /// Feeds the Python hash of a hashable value into `state`.
    ///
    /// Numbers that compare equal hash equally, so `1`, `1.0` and `True` collide.
    pub(crate) fn hash_value<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::None => 0u8.hash(state),
            Self::Bool(b) => hash_int(i64::from(*b), state),
            Self::Int(i) => hash_int(*i, state),
            Self::Float(f) => {
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 {
                    hash_int(*f as i64, state);
                } else {
                    2u8.hash(state);
                    f.to_bits().hash(state);
                }
            }
            Self::Str(s) => {
                3u8.hash(state);
                s.hash(state);
            }
            Self::Tuple(items) => {
                4u8.hash(state);
                items.len().hash(state);
                for item in items.iter() {
                    item.hash_value(state);
                }
            }
            Self::Range(range) => {
                5u8.hash(state);
                range.hash(state);
            }
            Self::Builtin(builtin) => {
                6u8.hash(state);
                builtin.hash(state);
            }
            other => {
                7u8.hash(state);
                other.identity().hash(state);
            }
        }
    }

    /// Address used for identity hashing and cycle detection of heap-backed values.
    fn identity(&self) -> usize {
        match self {
            Self::Str(rc) => Rc::as_ptr(rc).cast::<()>() as usize,
            Self::List(rc) => Rc::as_ptr(rc).cast::<()>() as usize,
            Self::Tuple(rc) => Rc::as_ptr(rc).cast::<()>() as usize,
            Self::Dict(rc) => Rc::as_ptr(rc).cast::<()>() as usize,
            Self::Set(rc) => Rc::as_ptr(rc).cast::<()>() as usize,
            Self::Slice(rc) => Rc::as_ptr(rc).cast::<()>() as usize,
            Self::Iterator(rc) => Rc::as_ptr(rc).cast::<()>() as usize,
            Self::Function(rc) => Rc::as_ptr(rc).cast::<()>() as usize,
            Self::BoundMethod(rc) => Rc::as_ptr(rc).cast::<()>() as usize,
            Self::Exception(rc) => Rc::as_ptr(rc).cast::<()>() as usize,
            Self::Namespace(rc) => Rc::as_ptr(rc).cast::<()>() as usize,
            Self::Code(rc) => Rc::as_ptr(rc).cast::<()>() as usize,
            _ => 0,
        }
    }

    // ============================================================================
    // String conversion
    // ============================================================================

    /// Python `repr()`.
    #[must_use]
    pub fn py_repr(&self) -> String {
        let mut out = String::new();
        self.repr_into(&mut out, &mut AHashSet::new());
        out
    }

    /// Python `str()`.
    #[must_use]
    pub fn py_str(&self) -> String {
        match self {
            Self::Str(s) => s.to_string(),
            Self::Exception(exc) => exc.py_str(),
            other => other.py_repr(),
        }
    }

    /// Python `ascii()`: the repr with every non-ASCII character escaped.
    #[must_use]
    pub fn py_ascii(&self) -> String {
        string::ascii_escape(&self.py_repr())
    }

    /// Writes the repr into `out`; `seen` holds containers currently being printed so that
    /// self-referencing containers print as `[...]` instead of recursing forever.
    fn repr_into(&self, out: &mut String, seen: &mut AHashSet<usize>) {
        match self {
            Self::None => out.push_str("None"),
            Self::Bool(true) => out.push_str("True"),
            Self::Bool(false) => out.push_str("False"),
            Self::Int(i) => out.push_str(&i.to_string()),
            Self::Float(f) => out.push_str(&float_repr(*f)),
            Self::Str(s) => out.push_str(&string::string_repr(s)),
            Self::List(items) => {
                let id = self.identity();
                if !seen.insert(id) {
                    out.push_str("[...]");
                    return;
                }
                out.push('[');
                repr_items(&items.borrow(), out, seen);
                out.push(']');
                seen.remove(&id);
            }
            Self::Tuple(items) => {
                out.push('(');
                repr_items(items, out, seen);
                if items.len() == 1 {
                    out.push(',');
                }
                out.push(')');
            }
            Self::Dict(dict) => {
                let id = self.identity();
                if !seen.insert(id) {
                    out.push_str("{...}");
                    return;
                }
                out.push('{');
                for (index, (key, value)) in dict.borrow().iter().enumerate() {
                    if index > 0 {
                        out.push_str(", ");
                    }
                    key.repr_into(out, seen);
                    out.push_str(": ");
                    value.repr_into(out, seen);
                }
                out.push('}');
                seen.remove(&id);
            }
            Self::Set(set) => {
                let set = set.borrow();
                if set.is_empty() {
                    out.push_str("set()");
                    return;
                }
                out.push('{');
                for (index, item) in set.iter().enumerate() {
                    if index > 0 {
                        out.push_str(", ");
                    }
                    item.repr_into(out, seen);
                }
                out.push('}');
            }
            Self::Range(range) => out.push_str(&range.py_repr()),
            Self::Slice(slice) => out.push_str(&slice.py_repr()),
            Self::Iterator(iter) => {
                out.push('<');
                out.push_str(iter.borrow().kind());
                out.push_str(" object>");
            }
            Self::Function(function) => {
                out.push_str("<function ");
                out.push_str(function.name());
                out.push('>');
            }
            Self::Builtin(builtin) => out.push_str(&builtin.py_repr()),
            Self::BoundMethod(method) => out.push_str(&method.py_repr()),
            Self::Exception(exc) => out.push_str(&exc.py_repr()),
            Self::Namespace(namespace) => {
                let id = self.identity();
                if !seen.insert(id) {
                    out.push_str("namespace(...)");
                    return;
                }
                out.push_str("namespace(");
                for (index, (name, value)) in namespace.borrow().iter().enumerate() {
                    if index > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(name);
                    out.push('=');
                    value.repr_into(out, seen);
                }
                out.push(')');
                seen.remove(&id);
            }
            Self::Code(code) => {
                out.push_str("<code object ");
                out.push_str(&code.name);
                out.push('>');
            }
            Self::Undefined => out.push_str("<undefined>"),
        }
    }

    // ============================================================================
    // Arithmetic
    // ============================================================================

    /// Applies a binary operator, `Ok(None)` when the operand types do not support it.
    pub fn py_binary(&self, op: BinaryOp, other: &Self) -> RunResult<Option<Self>> {
        match op {
            BinaryOp::Add => self.py_add(other),
            BinaryOp::Sub => self.py_sub(other),
            BinaryOp::Mult => self.py_mult(other),
            BinaryOp::Div => self.arith(other, int_div, float_div),
            BinaryOp::FloorDiv => self.arith(other, int_floordiv, float_floordiv),
            BinaryOp::Mod => self.arith(other, int_mod, float_mod),
            BinaryOp::Pow => self.arith(other, int_pow, float_pow),
            BinaryOp::MatMul => Ok(None),
            BinaryOp::LShift | BinaryOp::RShift => self.py_shift(op, other),
            BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => self.py_bitwise(op, other),
        }
    }

    fn arith(
        &self,
        other: &Self,
        int_op: fn(i64, i64) -> RunResult<Self>,
        float_op: fn(f64, f64) -> RunResult<Self>,
    ) -> RunResult<Option<Self>> {
        match (self.as_num(), other.as_num()) {
            (Some(Num::Int(a)), Some(Num::Int(b))) => int_op(a, b).map(Some),
            (Some(a), Some(b)) => float_op(a.to_f64(), b.to_f64()).map(Some),
            _ => Ok(None),
        }
    }

    fn py_add(&self, other: &Self) -> RunResult<Option<Self>> {
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => Ok(Some(Self::from(format!("{a}{b}")))),
            (Self::List(a), Self::List(b)) => {
                let mut items = a.borrow().clone();
                items.extend(b.borrow().iter().cloned());
                Ok(Some(Self::new_list(items)))
            }
            (Self::Tuple(a), Self::Tuple(b)) => Ok(Some(Self::new_tuple(a.iter().chain(b.iter()).cloned().collect()))),
            _ => self.arith(
                other,
                |a, b| a.checked_add(b).map(Self::Int).ok_or_else(int_overflow),
                |a, b| Ok(Self::Float(a + b)),
            ),
        }
    }

    fn py_sub(&self, other: &Self) -> RunResult<Option<Self>> {
        match (self, other) {
            (Self::Set(a), Self::Set(b)) => Ok(Some(Self::new_set(a.borrow().difference(&b.borrow())))),
            _ => self.arith(
                other,
                |a, b| a.checked_sub(b).map(Self::Int).ok_or_else(int_overflow),
                |a, b| Ok(Self::Float(a - b)),
            ),
        }
    }

    fn py_mult(&self, other: &Self) -> RunResult<Option<Self>> {
        let sequence_count = |value: &Self| value.as_int().map(|n| usize::try_from(n).unwrap_or(0));
        match (self, other) {
            (Self::Str(s), n) | (n, Self::Str(s)) if n.as_int().is_some() => {
                let count = sequence_count(n).unwrap_or(0);
                Ok(Some(Self::from(s.repeat(count))))
            }
            (Self::List(items), n) | (n, Self::List(items)) if n.as_int().is_some() => {
                let count = sequence_count(n).unwrap_or(0);
                Ok(Some(Self::new_list(repeat_values(&items.borrow(), count))))
            }
            (Self::Tuple(items), n) | (n, Self::Tuple(items)) if n.as_int().is_some() => {
                let count = sequence_count(n).unwrap_or(0);
                Ok(Some(Self::new_tuple(repeat_values(items, count))))
            }
            _ => self.arith(
                other,
                |a, b| a.checked_mul(b).map(Self::Int).ok_or_else(int_overflow),
                |a, b| Ok(Self::Float(a * b)),
            ),
        }
    }

    fn py_shift(&self, op: BinaryOp, other: &Self) -> RunResult<Option<Self>> {
        let (Some(a), Some(n)) = (self.as_int(), other.as_int()) else {
            return Ok(None);
        };
        if n < 0 {
            return Err(ExcType::value_error("negative shift count"));
        }
        let result = if op == BinaryOp::LShift {
            if a == 0 {
                0
            } else {
                let shifted = u32::try_from(n)
                    .ok()
                    .filter(|n| *n < 64)
                    .map(|n| i128::from(a) << n)
                    .ok_or_else(int_overflow)?;
                i64::try_from(shifted).map_err(|_| int_overflow())?
            }
        } else if n >= 64 {
            if a < 0 { -1 } else { 0 }
        } else {
            a >> n
        };
        Ok(Some(Self::Int(result)))
    }

    fn py_bitwise(&self, op: BinaryOp, other: &Self) -> RunResult<Option<Self>> {
        let result = match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => Self::Bool(match op {
                BinaryOp::And => a & b,
                BinaryOp::Or => a | b,
                _ => a ^ b,
            }),
            (Self::Set(a), Self::Set(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                Self::new_set(match op {
                    BinaryOp::And => a.intersection(&b),
                    BinaryOp::Or => a.union(&b),
                    _ => a.symmetric_difference(&b),
                })
            }
            (Self::Dict(a), Self::Dict(b)) if op == BinaryOp::Or => {
                let mut merged = a.borrow().clone();
                for (key, value) in b.borrow().items() {
                    merged.set(key, value)?;
                }
                Self::new_dict(merged)
            }
            _ => match (self.as_int(), other.as_int()) {
                (Some(a), Some(b)) => Self::Int(match op {
                    BinaryOp::And => a & b,
                    BinaryOp::Or => a | b,
                    _ => a ^ b,
                }),
                _ => return Ok(None),
            },
        };
        Ok(Some(result))
    }

    /// Applies the mutating form of an in-place operator.
    ///
    /// Returns `false` when the left operand has no mutating form for `op`, in which
    /// case the caller falls back to the plain binary operator.
    pub fn py_inplace(&self, op: BinaryOp, other: &Self) -> RunResult<bool> {
        match (self, op) {
            (Self::List(list), BinaryOp::Add) => {
                // collect before borrowing mutably, `l += l` is legal
                let items = other.collect_values()?;
                list.borrow_mut().extend(items);
                Ok(true)
            }
            (Self::List(list), BinaryOp::Mult) => {
                let Some(n) = other.as_int() else {
                    return Ok(false);
                };
                let count = usize::try_from(n).unwrap_or(0);
                let mut items = list.borrow_mut();
                let repeated = repeat_values(&items, count);
                *items = repeated;
                Ok(true)
            }
            (Self::Set(set), BinaryOp::Or | BinaryOp::And | BinaryOp::Xor | BinaryOp::Sub) => {
                let Self::Set(other) = other else {
                    return Ok(false);
                };
                // clone first, `s |= s` is legal
                let other = other.borrow().clone();
                let mut set = set.borrow_mut();
                *set = match op {
                    BinaryOp::Or => set.union(&other),
                    BinaryOp::And => set.intersection(&other),
                    BinaryOp::Xor => set.symmetric_difference(&other),
                    _ => set.difference(&other),
                };
                Ok(true)
            }
            (Self::Dict(dict), BinaryOp::Or) => {
                let pairs = mapping_pairs(other)?;
                let mut dict = dict.borrow_mut();
                for (key, value) in pairs {
                    dict.set(key, value)?;
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub fn py_neg(&self) -> RunResult<Option<Self>> {
        Ok(match self.as_num() {
            Some(Num::Int(i)) => Some(Self::Int(i.checked_neg().ok_or_else(int_overflow)?)),
            Some(Num::Float(f)) => Some(Self::Float(-f)),
            None => None,
        })
    }

    #[must_use]
    pub fn py_pos(&self) -> Option<Self> {
        match self.as_num() {
            Some(Num::Int(i)) => Some(Self::Int(i)),
            Some(Num::Float(f)) => Some(Self::Float(f)),
            None => None,
        }
    }

    #[must_use]
    pub fn py_invert(&self) -> Option<Self> {
        self.as_int().map(|i| Self::Int(!i))
    }

    // ============================================================================
    // Subscripts and membership
    // ============================================================================

    pub fn py_getitem(&self, key: &Self) -> RunResult<Self> {
        match self {
            Self::List(items) => Ok(match list::getitem(&items.borrow(), key, Type::List)? {
                Selected::One(item) => item,
                Selected::Many(items) => Self::new_list(items),
            }),
            Self::Tuple(items) => Ok(match list::getitem(items, key, Type::Tuple)? {
                Selected::One(item) => item,
                Selected::Many(items) => Self::new_tuple(items),
            }),
            Self::Str(s) => string::getitem(s, key),
            Self::Range(range) => range.py_getitem(key),
            Self::Dict(dict) => dict
                .borrow()
                .get(key)?
                .ok_or_else(|| ExcType::key_error(key.py_repr())),
            other => Err(ExcType::type_error_not_sub(other.py_type())),
        }
    }

    pub fn py_setitem(&self, key: Self, value: Self) -> RunResult<()> {
        match self {
            Self::List(items) => list::setitem(items, &key, value),
            Self::Dict(dict) => dict.borrow_mut().set(key, value),
            other => Err(ExcType::type_error_not_sub_assignment(other.py_type())),
        }
    }

    pub fn py_delitem(&self, key: &Self) -> RunResult<()> {
        match self {
            Self::List(items) => list::delitem(items, key),
            Self::Dict(dict) => match dict.borrow_mut().remove(key)? {
                Some(_) => Ok(()),
                None => Err(ExcType::key_error(key.py_repr())),
            },
            other => Err(ExcType::type_error_not_sub_deletion(other.py_type())),
        }
    }

    /// Membership test `item in self`.
    pub fn py_contains(&self, item: &Self) -> RunResult<bool> {
        match self {
            Self::List(items) => Ok(items.borrow().iter().any(|v| v.py_is(item) || v.py_eq(item))),
            Self::Tuple(items) => Ok(items.iter().any(|v| v.py_is(item) || v.py_eq(item))),
            Self::Str(s) => match item {
                Self::Str(sub) => Ok(s.contains(sub.as_ref())),
                other => Err(ExcType::type_error(format!(
                    "'in <string>' requires string as left operand, not {}",
                    other.py_type()
                ))),
            },
            Self::Dict(dict) => dict.borrow().contains_key(item),
            Self::Set(set) => set.borrow().contains(item),
            Self::Range(range) => Ok(match item {
                Self::Float(f) => f.fract() == 0.0 && range.contains(*f as i64),
                other => other.as_int().is_some_and(|i| range.contains(i)),
            }),
            other => Err(ExcType::type_error(format!(
                "argument of type '{}' is not iterable",
                other.py_type()
            ))),
        }
    }

    // ============================================================================
    // Attributes
    // ============================================================================

    /// Attribute lookup, `Ok(None)` when the attribute does not exist.
    pub fn py_getattr(&self, name: &str) -> RunResult<Option<Self>> {
        if let Some(method) = Method::lookup(self, name) {
            return Ok(Some(Self::BoundMethod(Rc::new(BoundMethod::new(self.clone(), method)))));
        }
        Ok(match (self, name) {
            (Self::Namespace(namespace), _) => namespace.borrow().get(name),
            (Self::Slice(slice), "start") => Some(slice.start.clone()),
            (Self::Slice(slice), "stop") => Some(slice.stop.clone()),
            (Self::Slice(slice), "step") => Some(slice.step.clone()),
            (Self::Range(range), "start") => Some(Self::Int(range.start)),
            (Self::Range(range), "stop") => Some(Self::Int(range.stop)),
            (Self::Range(range), "step") => Some(Self::Int(range.step)),
            (Self::Exception(exc), "args") => Some(Self::new_tuple(
                exc.arg().map(|arg| vec![Self::from(arg)]).unwrap_or_default(),
            )),
            (Self::Function(function), "__name__") => Some(Self::from(function.name())),
            (Self::Code(code), "co_name") => Some(Self::from(code.name.as_str())),
            _ => None,
        })
    }

    pub fn py_setattr(&self, name: &str, value: Self) -> RunResult<()> {
        match self {
            Self::Namespace(namespace) => {
                namespace.borrow_mut().set(name.into(), value);
                Ok(())
            }
            other => Err(ExcType::attribute_error(other.py_type(), name)),
        }
    }

    pub fn py_delattr(&self, name: &str) -> RunResult<()> {
        let removed = match self {
            Self::Namespace(namespace) => namespace.borrow_mut().remove(name),
            _ => None,
        };
        removed
            .map(|_| ())
            .ok_or_else(|| ExcType::attribute_error(self.py_type(), name))
    }

    // ============================================================================
    // Iteration
    // ============================================================================

    /// `iter(value)`: an iterator returns itself, other iterables get a fresh iterator.
    pub fn py_iter(&self) -> RunResult<Self> {
        match self {
            Self::Iterator(_) => Ok(self.clone()),
            other => Ok(Self::Iterator(Rc::new(RefCell::new(ForIterator::new(other)?)))),
        }
    }

    /// `next(value)`, `Ok(None)` on exhaustion.
    pub fn py_next(&self) -> RunResult<Option<Self>> {
        match self {
            Self::Iterator(iter) => iter.borrow_mut().for_next(),
            other => Err(ExcType::type_error(format!(
                "'{}' object is not an iterator",
                other.py_type()
            ))),
        }
    }

    /// Materialises every element of an iterable.
    pub fn collect_values(&self) -> RunResult<Vec<Self>> {
        match self {
            Self::List(items) => Ok(items.borrow().clone()),
            Self::Tuple(items) => Ok(items.to_vec()),
            Self::Iterator(iter) => iter.borrow_mut().collect(),
            other => ForIterator::new(other)?.collect(),
        }
    }
}

fn hash_int<H: Hasher>(i: i64, state: &mut H) {
    1u8.hash(state);
    i.hash(state);
}

fn num_cmp(a: Num, b: Num) -> Option<Ordering> {
    match (a, b) {
        (Num::Int(a), Num::Int(b)) => Some(a.cmp(&b)),
        (Num::Int(i), Num::Float(f)) => int_float_cmp(i, f),
        (Num::Float(f), Num::Int(i)) => int_float_cmp(i, f).map(Ordering::reverse),
        (Num::Float(a), Num::Float(b)) => a.partial_cmp(&b),
    }
}

/// Compares an int with a float exactly, without rounding the int through f64.
fn int_float_cmp(i: i64, f: f64) -> Option<Ordering> {
    if f.is_nan() {
        return None;
    }
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        return Some(i.cmp(&(f as i64)));
    }
    (i as f64).partial_cmp(&f)
}

fn seq_eq(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.py_is(y) || x.py_eq(y))
}

fn seq_cmp(a: &[Value], b: &[Value]) -> Option<Ordering> {
    for (x, y) in a.iter().zip(b) {
        if !(x.py_is(y) || x.py_eq(y)) {
            return x.py_cmp(y);
        }
    }
    Some(a.len().cmp(&b.len()))
}

fn repeat_values(items: &[Value], count: usize) -> Vec<Value> {
    let mut out = Vec::with_capacity(items.len().saturating_mul(count));
    for _ in 0..count {
        out.extend_from_slice(items);
    }
    out
}

fn repr_items(items: &[Value], out: &mut String, seen: &mut AHashSet<usize>) {
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            out.push_str(", ");
        }
        item.repr_into(out, seen);
    }
}

/// Formats a float the way Python's `repr()` does: shortest round-trip digits,
/// always with a decimal point or exponent, exponent form outside `1e-4 <= |f| < 1e16`.
#[must_use]
pub fn float_repr(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_owned();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_owned();
    }
    let abs = f.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        let formatted = format!("{f:e}");
        return match formatted.split_once('e') {
            Some((mantissa, exponent)) => {
                let (sign, digits) = match exponent.strip_prefix('-') {
                    Some(digits) => ('-', digits),
                    None => ('+', exponent),
                };
                format!("{mantissa}e{sign}{digits:0>2}")
            }
            None => formatted,
        };
    }
    let formatted = f.to_string();
    if formatted.contains('.') {
        formatted
    } else {
        format!("{formatted}.0")
    }
}

fn int_div(a: i64, b: i64) -> RunResult<Value> {
    if b == 0 {
        return Err(ExcType::zero_division("division by zero"));
    }
    Ok(Value::Float(a as f64 / b as f64))
}

fn float_div(a: f64, b: f64) -> RunResult<Value> {
    if b == 0.0 {
        return Err(ExcType::zero_division("float division by zero"));
    }
    Ok(Value::Float(a / b))
}

fn int_floordiv(a: i64, b: i64) -> RunResult<Value> {
    if b == 0 {
        return Err(ExcType::zero_division("integer division or modulo by zero"));
    }
    let d = a.checked_div(b).ok_or_else(int_overflow)?;
    // Python floor division rounds toward negative infinity
    let result = if a % b != 0 && (a < 0) != (b < 0) { d - 1 } else { d };
    Ok(Value::Int(result))
}

fn float_floordiv(a: f64, b: f64) -> RunResult<Value> {
    if b == 0.0 {
        return Err(ExcType::zero_division("float floor division by zero"));
    }
    Ok(Value::Float((a / b).floor()))
}

fn int_mod(a: i64, b: i64) -> RunResult<Value> {
    if b == 0 {
        return Err(ExcType::zero_division("integer division or modulo by zero"));
    }
    let r = a.wrapping_rem(b);
    // the result takes the sign of the divisor
    Ok(Value::Int(if r != 0 && (r < 0) != (b < 0) { r + b } else { r }))
}

fn float_mod(a: f64, b: f64) -> RunResult<Value> {
    if b == 0.0 {
        return Err(ExcType::zero_division("float modulo"));
    }
    let r = a % b;
    Ok(Value::Float(if r != 0.0 && (r < 0.0) != (b < 0.0) { r + b } else { r }))
}

fn int_pow(base: i64, exp: i64) -> RunResult<Value> {
    if exp < 0 {
        return float_pow(base as f64, exp as f64);
    }
    u32::try_from(exp)
        .ok()
        .and_then(|exp| base.checked_pow(exp))
        .map(Value::Int)
        .ok_or_else(int_overflow)
}

fn float_pow(base: f64, exp: f64) -> RunResult<Value> {
    if base == 0.0 && exp < 0.0 {
        return Err(ExcType::zero_division("0.0 cannot be raised to a negative power"));
    }
    if base < 0.0 && exp.fract() != 0.0 {
        return Err(ExcType::value_error("negative number cannot be raised to a fractional power"));
    }
    let result = base.powf(exp);
    if result.is_infinite() && base.is_finite() && exp.is_finite() {
        return Err(ExcType::overflow_error("(34, 'Numerical result out of range')"));
    }
    Ok(Value::Float(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary(lhs: Value, op: BinaryOp, rhs: Value) -> RunResult<Option<Value>> {
        lhs.py_binary(op, &rhs)
    }

    fn repr_of(result: RunResult<Option<Value>>) -> String {
        result.unwrap().unwrap().py_repr()
    }

    #[test]
    fn float_repr_matches_python() {
        assert_eq!(float_repr(1.0), "1.0");
        assert_eq!(float_repr(0.1), "0.1");
        assert_eq!(float_repr(-0.0), "-0.0");
        assert_eq!(float_repr(1e16), "1e+16");
        assert_eq!(float_repr(1.5e-5), "1.5e-05");
        assert_eq!(float_repr(123456.789), "123456.789");
        assert_eq!(float_repr(f64::INFINITY), "inf");
    }

    #[test]
    fn floor_division_and_modulo_round_toward_negative_infinity() {
        assert_eq!(repr_of(binary(Value::Int(-7), BinaryOp::FloorDiv, Value::Int(2))), "-4");
        assert_eq!(repr_of(binary(Value::Int(-7), BinaryOp::Mod, Value::Int(2))), "1");
        assert_eq!(repr_of(binary(Value::Int(7), BinaryOp::Mod, Value::Int(-2))), "-1");
        assert_eq!(repr_of(binary(Value::Float(-7.0), BinaryOp::Mod, Value::Int(2))), "1.0");
    }

    #[test]
    fn division_by_zero() {
        let err = binary(Value::Int(1), BinaryOp::Div, Value::Int(0)).unwrap_err();
        assert_eq!(err.to_string(), "ZeroDivisionError: division by zero");
        let err = binary(Value::Int(1), BinaryOp::Mod, Value::Bool(false)).unwrap_err();
        assert_eq!(err.exc_type(), Some(ExcType::ZeroDivisionError));
    }

    #[test]
    fn integer_overflow_is_reported() {
        let err = binary(Value::Int(i64::MAX), BinaryOp::Add, Value::Int(1)).unwrap_err();
        assert_eq!(err.exc_type(), Some(ExcType::OverflowError));
        let err = binary(Value::Int(2), BinaryOp::Pow, Value::Int(64)).unwrap_err();
        assert_eq!(err.exc_type(), Some(ExcType::OverflowError));
    }

    #[test]
    fn mixed_numeric_arithmetic() {
        assert_eq!(repr_of(binary(Value::Int(1), BinaryOp::Add, Value::Float(0.5))), "1.5");
        assert_eq!(repr_of(binary(Value::Bool(true), BinaryOp::Add, Value::Int(1))), "2");
        assert_eq!(repr_of(binary(Value::Int(2), BinaryOp::Pow, Value::Int(-1))), "0.5");
        assert_eq!(repr_of(binary(Value::Int(1), BinaryOp::LShift, Value::Int(10))), "1024");
    }

    #[test]
    fn sequence_arithmetic() {
        assert_eq!(repr_of(binary(Value::from("ab"), BinaryOp::Mult, Value::Int(3))), "'ababab'");
        assert_eq!(repr_of(binary(Value::Int(2), BinaryOp::Mult, Value::new_tuple(vec![Value::Int(1)]))), "(1, 1)");
        assert_eq!(repr_of(binary(Value::new_list(vec![Value::Int(1)]), BinaryOp::Mult, Value::Int(-1))), "[]");
    }

    #[test]
    fn unsupported_operands_return_none() {
        assert!(binary(Value::from("a"), BinaryOp::Add, Value::Int(1)).unwrap().is_none());
        assert!(binary(Value::Int(1), BinaryOp::MatMul, Value::Int(1)).unwrap().is_none());
    }

    #[test]
    fn inplace_add_mutates_shared_list() {
        let list = Value::new_list(vec![Value::Int(1)]);
        let alias = list.clone();
        assert!(list.py_inplace(BinaryOp::Add, &Value::new_tuple(vec![Value::Int(2)])).unwrap());
        assert_eq!(alias.py_repr(), "[1, 2]");
        assert!(!Value::Int(1).py_inplace(BinaryOp::Add, &Value::Int(1)).unwrap());
    }

    #[test]
    fn equality_across_numeric_types() {
        assert!(Value::Int(1).py_eq(&Value::Float(1.0)));
        assert!(Value::Bool(true).py_eq(&Value::Int(1)));
        assert!(!Value::Float(f64::NAN).py_eq(&Value::Float(f64::NAN)));
        assert!(!Value::Int(1).py_eq(&Value::from("1")));
        assert!(Value::Int(i64::MAX).py_cmp(&Value::Float(9.3e18)) == Some(Ordering::Less));
    }

    #[test]
    fn identity_is_pointer_identity_for_containers() {
        let list = Value::new_list(vec![]);
        assert!(list.py_is(&list.clone()));
        assert!(!list.py_is(&Value::new_list(vec![])));
        assert!(list.py_eq(&Value::new_list(vec![])));
        assert!(Value::None.py_is(&Value::None));
    }

    #[test]
    fn sequences_compare_lexicographically() {
        let a = Value::new_tuple(vec![Value::Int(1), Value::Int(2)]);
        let b = Value::new_tuple(vec![Value::Int(1), Value::Int(3)]);
        assert_eq!(a.py_cmp(&b), Some(Ordering::Less));
        assert_eq!(Value::from("b").py_cmp(&Value::from("a")), Some(Ordering::Greater));
        assert_eq!(Value::from("b").py_cmp(&Value::Int(1)), None);
    }

    #[test]
    fn self_referencing_list_repr() {
        let list = Value::new_list(vec![Value::Int(1)]);
        if let Value::List(items) = &list {
            items.borrow_mut().push(list.clone());
        }
        assert_eq!(list.py_repr(), "[1, [...]]");
        if let Value::List(items) = &list {
            // break the cycle so the test does not leak
            items.borrow_mut().clear();
        }
    }

    #[test]
    fn container_reprs() {
        let tuple = Value::new_tuple(vec![Value::Int(1)]);
        assert_eq!(tuple.py_repr(), "(1,)");
        assert_eq!(Value::new_set(Set::new()).py_repr(), "set()");
        let dict = Dict::from_pairs([(Value::from("a"), Value::Float(1.5))]).unwrap();
        assert_eq!(Value::new_dict(dict).py_repr(), "{'a': 1.5}");
        assert_eq!(Value::from("é").py_ascii(), "'\\xe9'");
    }

    #[test]
    fn getitem_errors() {
        let list = Value::new_list(vec![Value::Int(1)]);
        let err = list.py_getitem(&Value::Int(5)).unwrap_err();
        assert_eq!(err.to_string(), "IndexError: list index out of range");
        let err = list.py_getitem(&Value::from("x")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: list indices must be integers or slices, not str"
        );
        let err = Value::Int(1).py_getitem(&Value::Int(0)).unwrap_err();
        assert_eq!(err.to_string(), "TypeError: 'int' object is not subscriptable");
    }

    #[test]
    fn contains_checks() {
        let range = Value::Range(Range::new(0, 10, 2).unwrap());
        assert!(range.py_contains(&Value::Int(4)).unwrap());
        assert!(!range.py_contains(&Value::Int(5)).unwrap());
        assert!(Value::from("hello").py_contains(&Value::from("ell")).unwrap());
        let err = Value::from("hello").py_contains(&Value::Int(1)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: 'in <string>' requires string as left operand, not int"
        );
    }

    #[test]
    fn namespace_attributes() {
        let namespace = Value::new_namespace(SimpleNamespace::new());
        namespace.py_setattr("x", Value::Int(1)).unwrap();
        assert_eq!(namespace.py_getattr("x").unwrap().unwrap().py_repr(), "1");
        namespace.py_delattr("x").unwrap();
        assert!(namespace.py_getattr("x").unwrap().is_none());
        let err = namespace.py_delattr("x").unwrap_err();
        assert_eq!(
            err.to_string(),
            "AttributeError: 'types.SimpleNamespace' object has no attribute 'x'"
        );
    }

    #[test]
    fn methods_are_bound_on_lookup() {
        let list = Value::new_list(vec![]);
        let Some(Value::BoundMethod(append)) = list.py_getattr("append").unwrap() else {
            panic!("expected a bound method");
        };
        append.call(crate::args::ArgValues::One(Value::Int(7))).unwrap();
        assert_eq!(list.py_repr(), "[7]");
        assert!(list.py_getattr("nope").unwrap().is_none());
    }
}
