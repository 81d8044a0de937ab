//! Constraint builder
//!
//! Predicates are built from logical field names through the record schema,
//! so application code never spells wire attribute names:
//!
//! ```ignore
//! let age = attribute::<Person>("age")?;
//! store.put(&ctx, &person, Some(&age.lt(65)))?;
//! ```
//!
//! A predicate compiles into three pieces: a condition fragment with
//! placeholders (`#__age__ < :__age__`), a name alias (`#__age__ -> age`) and
//! a value literal (`:__age__ -> 65`). Table adapters merge them into the
//! backend's expression-with-placeholders request; backends without native
//! predicates evaluate them client-side with [`Predicate::matches`].
//!
//! ## Write guards
//!
//! Writes take at most one predicate (`Option<&Predicate>`). Conjunctions of
//! several guards on one write are not supported.

use crate::codec::Thing;
use crate::error::Error;
use crate::error::Result;
use crate::schema::{schema_of, Schema};
use crate::types::Key;
use crate::value::{Item, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Literal that [`Attribute::is`] reads as "attribute must be absent"
pub const UNSET: &str = "_";

/// Existence operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `attribute_exists(attr)`
    Exists,
    /// `attribute_not_exists(attr)`
    NotExists,
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DyadicOp {
    /// `attr = :v`
    Eq,
    /// `attr <> :v`
    Ne,
    /// `attr < :v`
    Lt,
    /// `attr <= :v`
    Le,
    /// `attr > :v`
    Gt,
    /// `attr >= :v`
    Ge,
}

impl DyadicOp {
    /// Operator token of the expression grammar
    pub fn symbol(self) -> &'static str {
        match self {
            DyadicOp::Eq => "=",
            DyadicOp::Ne => "<>",
            DyadicOp::Lt => "<",
            DyadicOp::Le => "<=",
            DyadicOp::Gt => ">",
            DyadicOp::Ge => ">=",
        }
    }

    /// Evaluate `left op right`
    ///
    /// A missing left operand satisfies only `<>`. Ordering operators need
    /// both operands of the same scalar type.
    pub fn apply(self, left: Option<&Value>, right: &Value) -> bool {
        let Some(left) = left else {
            return self == DyadicOp::Ne;
        };
        match self {
            DyadicOp::Eq => left == right,
            DyadicOp::Ne => left != right,
            DyadicOp::Lt => left.compare(right) == Some(Ordering::Less),
            DyadicOp::Le => matches!(
                left.compare(right),
                Some(Ordering::Less | Ordering::Equal)
            ),
            DyadicOp::Gt => left.compare(right) == Some(Ordering::Greater),
            DyadicOp::Ge => matches!(
                left.compare(right),
                Some(Ordering::Greater | Ordering::Equal)
            ),
        }
    }
}

/// Typed condition over one wire attribute
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Existence check
    Unary {
        /// Operator
        op: UnaryOp,
        /// Wire attribute name
        attr: String,
    },
    /// Comparison against a literal
    Dyadic {
        /// Operator
        op: DyadicOp,
        /// Wire attribute name
        attr: String,
        /// Literal operand
        value: Value,
    },
}

impl Predicate {
    /// Wire attribute the predicate reads
    pub fn attr(&self) -> &str {
        match self {
            Predicate::Unary { attr, .. } | Predicate::Dyadic { attr, .. } => attr,
        }
    }

    /// Compile into condition fragment, name alias and value literal
    pub fn compile(&self) -> Expression {
        let token = alias_token(self.attr());
        let name = format!("#{}", token);
        let mut expr = Expression::default();
        expr.names.insert(name.clone(), self.attr().to_string());

        match self {
            Predicate::Unary {
                op: UnaryOp::Exists,
                ..
            } => {
                expr.condition = format!("attribute_exists({})", name);
            }
            Predicate::Unary {
                op: UnaryOp::NotExists,
                ..
            } => {
                expr.condition = format!("attribute_not_exists({})", name);
            }
            Predicate::Dyadic { op, value, .. } => {
                let literal = format!(":{}", token);
                expr.condition = format!("{} {} {}", name, op.symbol(), literal);
                expr.values.insert(literal, value.clone());
            }
        }
        expr
    }

    /// Evaluate against a record, `None` meaning the record does not exist
    pub fn matches(&self, item: Option<&Item>) -> bool {
        let current = item.and_then(|item| item.get(self.attr()));
        match self {
            Predicate::Unary {
                op: UnaryOp::Exists,
                ..
            } => current.is_some(),
            Predicate::Unary {
                op: UnaryOp::NotExists,
                ..
            } => current.is_none(),
            Predicate::Dyadic { op, value, .. } => op.apply(current, value),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Unary {
                op: UnaryOp::Exists,
                attr,
            } => write!(f, "attribute_exists({})", attr),
            Predicate::Unary {
                op: UnaryOp::NotExists,
                attr,
            } => write!(f, "attribute_not_exists({})", attr),
            Predicate::Dyadic { op, attr, value } => {
                write!(f, "{} {} {:?}", attr, op.symbol(), value)
            }
        }
    }
}

/// Alias token of a wire name: `__<name>__` with non-word characters
/// replaced by `_`
fn alias_token(wire: &str) -> String {
    let sanitized: String = wire
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    format!("__{}__", sanitized)
}

/// Compiled expression: condition text plus placeholder tables
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expression {
    /// Condition text with `#name` and `:value` placeholders
    pub condition: String,
    /// `#alias -> wire name`
    pub names: BTreeMap<String, String>,
    /// `:alias -> literal`
    pub values: BTreeMap<String, Value>,
}

impl Expression {
    /// Whether there is no condition
    pub fn is_empty(&self) -> bool {
        self.condition.is_empty()
    }

    /// Conjoin another expression into this one
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if both bind the same placeholder to
    /// different names or values.
    pub fn and(mut self, other: Expression) -> Result<Expression> {
        merge_table(&mut self.names, other.names)?;
        merge_table(&mut self.values, other.values)?;
        self.condition = match (self.condition.is_empty(), other.condition.is_empty()) {
            (true, _) => other.condition,
            (false, true) => self.condition,
            (false, false) => format!("({}) AND ({})", self.condition, other.condition),
        };
        Ok(self)
    }
}

fn merge_table<V: PartialEq + fmt::Debug>(
    into: &mut BTreeMap<String, V>,
    from: BTreeMap<String, V>,
) -> Result<()> {
    for (alias, bound) in from {
        match into.get(&alias) {
            Some(existing) if *existing != bound => {
                return Err(Error::invalid_operation(format!(
                    "placeholder {} bound to both {:?} and {:?}",
                    alias, existing, bound
                )));
            }
            Some(_) => {}
            None => {
                into.insert(alias, bound);
            }
        }
    }
    Ok(())
}

/// Handle on one wire attribute of a record type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    wire: String,
}

/// Attribute handle of a logical field of `T`
///
/// # Errors
///
/// Returns `Error::Schema` if the field is unknown or has no wire name.
pub fn attribute<T: Thing>(name: &str) -> Result<Attribute> {
    let schema = schema_of::<T>()?;
    Attribute::from_schema(&schema, name)
}

impl Attribute {
    /// Attribute handle of a logical field in a schema
    ///
    /// # Errors
    ///
    /// Returns `Error::Schema` if the field is unknown or has no wire name.
    pub fn from_schema(schema: &Schema, name: &str) -> Result<Self> {
        Ok(Self {
            wire: schema.wire_name(name)?.to_string(),
        })
    }

    /// Handle on a key attribute, named by configuration rather than schema
    pub fn key(wire: impl Into<String>) -> Self {
        Self { wire: wire.into() }
    }

    /// Wire attribute name
    pub fn wire(&self) -> &str {
        &self.wire
    }

    fn dyadic(&self, op: DyadicOp, value: impl Into<Value>) -> Predicate {
        Predicate::Dyadic {
            op,
            attr: self.wire.clone(),
            value: value.into(),
        }
    }

    /// `attr = value`
    pub fn eq(&self, value: impl Into<Value>) -> Predicate {
        self.dyadic(DyadicOp::Eq, value)
    }

    /// `attr <> value`
    pub fn ne(&self, value: impl Into<Value>) -> Predicate {
        self.dyadic(DyadicOp::Ne, value)
    }

    /// `attr < value`
    pub fn lt(&self, value: impl Into<Value>) -> Predicate {
        self.dyadic(DyadicOp::Lt, value)
    }

    /// `attr <= value`
    pub fn le(&self, value: impl Into<Value>) -> Predicate {
        self.dyadic(DyadicOp::Le, value)
    }

    /// `attr > value`
    pub fn gt(&self, value: impl Into<Value>) -> Predicate {
        self.dyadic(DyadicOp::Gt, value)
    }

    /// `attr >= value`
    pub fn ge(&self, value: impl Into<Value>) -> Predicate {
        self.dyadic(DyadicOp::Ge, value)
    }

    /// `attribute_exists(attr)`
    pub fn exists(&self) -> Predicate {
        Predicate::Unary {
            op: UnaryOp::Exists,
            attr: self.wire.clone(),
        }
    }

    /// `attribute_not_exists(attr)`
    pub fn not_exists(&self) -> Predicate {
        Predicate::Unary {
            op: UnaryOp::NotExists,
            attr: self.wire.clone(),
        }
    }

    /// `not_exists()` for the [`UNSET`] literal, `eq(value)` otherwise
    pub fn is(&self, value: impl Into<Value>) -> Predicate {
        let value = value.into();
        if value.as_str() == Some(UNSET) {
            self.not_exists()
        } else {
            self.dyadic(DyadicOp::Eq, value)
        }
    }
}

/// Projection over every attribute of a schema plus the key attributes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    /// Comma separated `#alias` list
    pub expression: String,
    /// `#alias -> wire name`
    pub names: BTreeMap<String, String>,
}

impl Projection {
    /// Project the key attributes and every mapped field
    pub fn of(schema: &Schema, key_attrs: [&str; 2]) -> Self {
        let mut projection = Projection::default();
        let mut aliases = Vec::new();
        let mut wires: Vec<&str> = key_attrs.to_vec();
        for wire in schema.wire_names() {
            wires.push(wire);
        }

        for wire in wires {
            let mut alias = format!("#{}", alias_token(wire));
            let mut n = 1;
            while projection.names.contains_key(&alias) {
                alias = format!("#{}{}", alias_token(wire), n);
                n += 1;
            }
            projection.names.insert(alias.clone(), wire.to_string());
            aliases.push(alias);
        }
        projection.expression = aliases.join(", ");
        projection
    }

    /// Wire names the projection selects
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.names.values().map(String::as_str)
    }
}

/// Write operations that accept a guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    /// Create or overwrite
    Put,
    /// Modify in place
    Update,
    /// Delete
    Remove,
}

impl WriteOp {
    /// Operation name used in error context and logs
    pub fn name(self) -> &'static str {
        match self {
            WriteOp::Put => "put",
            WriteOp::Update => "update",
            WriteOp::Remove => "remove",
        }
    }
}

/// Error for a guard the backend rejected
///
/// Guards on `Put` protect against clobbering a record (conflict), except
/// `Exists`, which requires a prior record (gone). Guards on `Update` and
/// `Remove` always require a prior record state (gone).
pub fn guard_failure(op: WriteOp, key: &Key, guard: Option<&Predicate>) -> Error {
    let requires_prior = matches!(
        guard,
        Some(Predicate::Unary {
            op: UnaryOp::Exists,
            ..
        })
    );
    let (conflict, gone) = match (op, guard) {
        (_, None) => (false, false),
        (WriteOp::Put, Some(_)) => (!requires_prior, requires_prior),
        (WriteOp::Update | WriteOp::Remove, Some(_)) => (false, true),
    };
    Error::PreConditionFailed {
        key: key.to_string(),
        conflict,
        gone,
    }
}
