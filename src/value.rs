//! The dynamic values a promise can carry.
//!
//! Primitives (`Undefined` through `String`) are never adopted. Every other
//! variant is an object and is probed for a callable `then` member when it is
//! used to resolve a promise.
use crate::{Promise, SettlementError};
use std::{cell::RefCell, collections::BTreeMap, fmt, rc::Rc};

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Error(Rc<SettlementError>),
    Function(Function),
    Record(Record),
    Promise(Promise),
}

/// Outcome of looking up a `then` member on a value.
#[derive(Debug, Clone)]
pub enum ThenProbe {
    /// A callable member. A promise's `then` is bound to that promise; a
    /// record's `then` is called without its record.
    Callable(Function),
    Absent,
    /// Reading the member raised.
    Failed(Value),
}

impl Value {
    pub fn is_object(&self) -> bool {
        !matches!(
            self,
            Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)
        )
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(function) => Some(function),
            _ => None,
        }
    }

    pub fn as_promise(&self) -> Option<&Promise> {
        match self {
            Value::Promise(promise) => Some(promise),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(string) => Some(&**string),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&SettlementError> {
        match self {
            Value::Error(error) => Some(&**error),
            _ => None,
        }
    }

    /// Calls the value if it is a function, raising otherwise.
    pub fn call(&self, args: &[Value]) -> Result<Value, Value> {
        match self {
            Value::Function(function) => function.call(args),
            _ => Err(SettlementError::NotCallable.into()),
        }
    }

    /// Looks for a callable `then` member without invoking it.
    pub fn probe_then(&self) -> ThenProbe {
        match self {
            Value::Promise(promise) => ThenProbe::Callable(promise.then_function()),
            Value::Record(record) => match record.get("then") {
                Ok(Value::Function(then)) => ThenProbe::Callable(then),
                Ok(_) => ThenProbe::Absent,
                Err(raised) => ThenProbe::Failed(raised),
            },
            _ => ThenProbe::Absent,
        }
    }
}

impl PartialEq for Value {
    /// Primitives compare by value, objects by identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Record(a), Value::Record(b)) => a.ptr_eq(b),
            (Value::Promise(a), Value::Promise(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Error(e) => write!(f, "Error({e})"),
            Value::Function(function) => fmt::Debug::fmt(function, f),
            Value::Record(record) => fmt::Debug::fmt(record, f),
            Value::Promise(promise) => fmt::Debug::fmt(promise, f),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(value.into())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value.into())
    }
}

impl From<SettlementError> for Value {
    fn from(value: SettlementError) -> Self {
        Value::Error(Rc::new(value))
    }
}

impl From<Function> for Value {
    fn from(value: Function) -> Self {
        Value::Function(value)
    }
}

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        Value::Record(value)
    }
}

impl From<Promise> for Value {
    fn from(value: Promise) -> Self {
        Value::Promise(value)
    }
}

type Callable = dyn Fn(&[Value]) -> Result<Value, Value>;

/// A callable value. `Err` carries a raised value.
#[derive(Clone)]
pub struct Function(Rc<Callable>);

impl Function {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, Value> + 'static,
    {
        Function(Rc::new(f))
    }

    /// A function of one argument; a missing argument reads as `Undefined`.
    pub fn unary<F>(f: F) -> Self
    where
        F: Fn(Value) -> Result<Value, Value> + 'static,
    {
        Function::new(move |args| f(args.first().cloned().unwrap_or_default()))
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, Value> {
        (self.0)(args)
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

#[derive(Debug, Clone)]
enum Member {
    Data(Value),
    /// Invoked with no arguments on every read.
    Accessor(Function),
}

/// A plain object with named members.
#[derive(Clone, Default)]
pub struct Record(Rc<RefCell<BTreeMap<String, Member>>>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// An object whose `then` member is `then`.
    pub fn thenable<F>(then: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, Value> + 'static,
    {
        Record::new().with("then", Function::new(then))
    }

    pub fn with(self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn with_accessor(self, key: &str, getter: Function) -> Self {
        self.0
            .borrow_mut()
            .insert(key.to_owned(), Member::Accessor(getter));
        self
    }

    pub fn set(&self, key: &str, value: impl Into<Value>) {
        self.0
            .borrow_mut()
            .insert(key.to_owned(), Member::Data(value.into()));
    }

    /// Reads a member, running its accessor if it has one.
    pub fn get(&self, key: &str) -> Result<Value, Value> {
        let member = self.0.borrow().get(key).cloned();
        match member {
            None => Ok(Value::Undefined),
            Some(Member::Data(value)) => Ok(value),
            Some(Member::Accessor(getter)) => getter.call(&[]),
        }
    }

    pub fn ptr_eq(&self, other: &Record) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(members) => f.debug_map().entries(members.iter()).finish(),
            Err(_) => f.write_str("Record(<borrowed>)"),
        }
    }
}
