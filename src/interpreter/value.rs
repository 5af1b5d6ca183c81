use std::collections::HashMap;
use std::fmt;

use crate::parser::Statement;

/// QuillScript runtime value types.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<Value>),
    /// Reference to a user function or a `module.member` host callable.
    FunctionRef(String),
    Instance(Instance),
    /// The "not found" value; unknown variable reads yield this.
    Absent,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{}", s),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::Bool(b) => write!(f, "{}", b),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::FunctionRef(name) => write!(f, "<function {}>", name),
            Value::Instance(inst) => write!(f, "<instance of {}>", inst.class_name),
            Value::Absent => Ok(()),
        }
    }
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Absent => false,
            Value::Int(n) => *n != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            _ => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::List(_) => "list",
            Value::FunctionRef(_) => "function",
            Value::Instance(_) => "instance",
            Value::Absent => "absent",
        }
    }

    /// Coerce to a number where one is expected. Numeric-looking
    /// strings coerce; everything else refuses.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(x) => Some(*x),
            Value::Bool(true) => Some(1.0),
            Value::Bool(false) => Some(0.0),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Integer coercion for counts and indexes. Floats truncate;
    /// strings must parse as whole integers.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Float(x) => Some(*x as i64),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// True when this value keeps integer arithmetic integral.
    pub fn is_integral(&self) -> bool {
        match self {
            Value::Int(_) => true,
            Value::Str(s) => s.trim().parse::<i64>().is_ok(),
            _ => false,
        }
    }

    /// Loose equality: numeric values compare numerically across the
    /// Int/Float divide, everything else compares structurally.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }
}

/// A user-defined function: positional parameters and a statement body.
/// Registered at definition time; redefinition overwrites.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Statement>,
}

/// A class definition: attribute defaults and a method table.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub name: String,
    pub attributes: HashMap<String, Value>,
    pub methods: HashMap<String, FunctionDef>,
}

/// A class instance: the owning class name plus its own copy of the
/// attribute defaults, taken at construction time.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub class_name: String,
    pub attrs: HashMap<String, Value>,
}
