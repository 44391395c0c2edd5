//! Row predicates and their boolean reduction into entry/exit signals.
//!
//! Predicates are tri-state: `Some(true)`, `Some(false)` or `None` (an operand
//! was undefined). Conjunctions evaluate every operand on every row, then:
//! - any `Some(false)` → `Some(false)`
//! - otherwise any `None` → `None`
//! - otherwise → `Some(true)`
//!
//! A signal row is set only when some conjunction is `Some(true)`.

use std::fmt;
use std::sync::Arc;

use crate::components::frame::{CandleFrame, Row};

type Eval = Arc<dyn Fn(&Row<'_>) -> Option<bool> + Send + Sync>;

/// A named condition over one frame row.
#[derive(Clone)]
pub struct Predicate {
    name: String,
    eval: Eval,
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate").field("name", &self.name).finish()
    }
}

impl Predicate {
    pub fn new(
        name: impl Into<String>,
        eval: impl Fn(&Row<'_>) -> Option<bool> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            eval: Arc::new(eval),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn evaluate(&self, row: &Row<'_>) -> Option<bool> {
        (self.eval)(row)
    }
}

/// Tri-state AND over already-evaluated operands.
pub fn all_of(values: impl IntoIterator<Item = Option<bool>>) -> Option<bool> {
    let mut undefined = false;
    let mut any = false;
    for v in values {
        any = true;
        match v {
            Some(false) => return Some(false),
            None => undefined = true,
            Some(true) => {}
        }
    }
    if !any {
        return Some(false);
    }
    if undefined {
        None
    } else {
        Some(true)
    }
}

/// Tri-state OR over already-evaluated operands.
pub fn any_of(values: impl IntoIterator<Item = Option<bool>>) -> Option<bool> {
    let mut undefined = false;
    for v in values {
        match v {
            Some(true) => return Some(true),
            None => undefined = true,
            Some(false) => {}
        }
    }
    if undefined {
        None
    } else {
        Some(false)
    }
}

// ─── Builders ───

fn threshold(
    column: &str,
    x: f64,
    symbol: &str,
    op: fn(f64, f64) -> bool,
) -> Predicate {
    let col = column.to_string();
    Predicate::new(format!("{column} {symbol} {x}"), move |row| {
        row.value(&col).map(|v| op(v, x))
    })
}

fn columns(a: &str, b: &str, symbol: &str, op: fn(f64, f64) -> bool) -> Predicate {
    let (ca, cb) = (a.to_string(), b.to_string());
    Predicate::new(format!("{a} {symbol} {b}"), move |row| {
        Some(op(row.value(&ca)?, row.value(&cb)?))
    })
}

/// `column > x`
pub fn above(column: &str, x: f64) -> Predicate {
    threshold(column, x, ">", |v, x| v > x)
}

/// `column < x`
pub fn below(column: &str, x: f64) -> Predicate {
    threshold(column, x, "<", |v, x| v < x)
}

/// `column >= x`
pub fn at_least(column: &str, x: f64) -> Predicate {
    threshold(column, x, ">=", |v, x| v >= x)
}

/// `column <= x`
pub fn at_most(column: &str, x: f64) -> Predicate {
    threshold(column, x, "<=", |v, x| v <= x)
}

/// `a > b` between two columns.
pub fn gt(a: &str, b: &str) -> Predicate {
    columns(a, b, ">", |x, y| x > y)
}

/// `a < b` between two columns.
pub fn lt(a: &str, b: &str) -> Predicate {
    columns(a, b, "<", |x, y| x < y)
}

/// A precomputed flag column.
pub fn flag(column: &str) -> Predicate {
    let col = column.to_string();
    Predicate::new(column, move |row| row.flag(&col))
}

/// `a` crosses above `b` on this row.
pub fn crossed_above(a: &str, b: &str) -> Predicate {
    crossing(a, b, "crossed above", |x, y| x > y)
}

/// `a` crosses below `b` on this row.
pub fn crossed_below(a: &str, b: &str) -> Predicate {
    crossing(a, b, "crossed below", |x, y| x < y)
}

fn crossing(a: &str, b: &str, label: &str, holds: fn(f64, f64) -> bool) -> Predicate {
    let (ca, cb) = (a.to_string(), b.to_string());
    Predicate::new(format!("{a} {label} {b}"), move |row| {
        let now = holds(row.value(&ca)?, row.value(&cb)?);
        let before = holds(row.shifted(&ca, 1)?, row.shifted(&cb, 1)?);
        Some(now && !before)
    })
}

/// `column` strictly greater than on the previous row.
pub fn rising(column: &str) -> Predicate {
    let col = column.to_string();
    Predicate::new(format!("{column} rising"), move |row| {
        Some(row.value(&col)? > row.shifted(&col, 1)?)
    })
}

/// `column` strictly less than on the previous row.
pub fn falling(column: &str) -> Predicate {
    let col = column.to_string();
    Predicate::new(format!("{column} falling"), move |row| {
        Some(row.value(&col)? < row.shifted(&col, 1)?)
    })
}

/// Inline AND used as a single operand.
pub fn all(name: impl Into<String>, predicates: Vec<Predicate>) -> Predicate {
    Predicate::new(name, move |row| {
        let values: Vec<_> = predicates.iter().map(|p| p.evaluate(row)).collect();
        all_of(values)
    })
}

/// Inline OR used as a single operand.
pub fn any(name: impl Into<String>, predicates: Vec<Predicate>) -> Predicate {
    Predicate::new(name, move |row| {
        let values: Vec<_> = predicates.iter().map(|p| p.evaluate(row)).collect();
        any_of(values)
    })
}

/// Arbitrary row condition.
pub fn custom(
    name: impl Into<String>,
    eval: impl Fn(&Row<'_>) -> Option<bool> + Send + Sync + 'static,
) -> Predicate {
    Predicate::new(name, eval)
}

// ─── Conjunctions and rules ───

/// Named AND of predicates.
#[derive(Debug, Clone)]
pub struct Conjunction {
    name: String,
    predicates: Vec<Predicate>,
}

impl Conjunction {
    pub fn new(name: impl Into<String>, predicates: Vec<Predicate>) -> Self {
        Self {
            name: name.into(),
            predicates,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Evaluates every predicate, then reduces. An empty conjunction never holds.
    pub fn evaluate(&self, row: &Row<'_>) -> Option<bool> {
        let values: Vec<_> = self.predicates.iter().map(|p| p.evaluate(row)).collect();
        all_of(values)
    }
}

/// A primary conjunction OR'd with ordered alternatives.
#[derive(Debug, Clone)]
pub struct SignalRule {
    primary: Conjunction,
    alternatives: Vec<Conjunction>,
}

impl SignalRule {
    pub fn new(primary: Conjunction) -> Self {
        Self {
            primary,
            alternatives: Vec::new(),
        }
    }

    pub fn or(mut self, alternative: Conjunction) -> Self {
        self.alternatives.push(alternative);
        self
    }

    pub fn primary(&self) -> &Conjunction {
        &self.primary
    }

    pub fn alternatives(&self) -> &[Conjunction] {
        &self.alternatives
    }

    fn conjunctions(&self) -> impl Iterator<Item = &Conjunction> {
        std::iter::once(&self.primary).chain(&self.alternatives)
    }

    /// Name of the first conjunction that holds on `row`, if any.
    pub fn evaluate_row(&self, row: &Row<'_>) -> Option<&str> {
        let verdicts: Vec<_> = self
            .conjunctions()
            .map(|c| (c.name(), c.evaluate(row)))
            .collect();
        verdicts
            .into_iter()
            .find(|(_, v)| *v == Some(true))
            .map(|(name, _)| name)
    }

    /// Signal flag and tag for every row of `frame`.
    pub fn apply(&self, frame: &CandleFrame) -> (Vec<bool>, Vec<Option<String>>) {
        frame
            .rows()
            .map(|row| match self.evaluate_row(&row) {
                Some(name) => (true, Some(name.to_string())),
                None => (false, None),
            })
            .unzip()
    }
}
