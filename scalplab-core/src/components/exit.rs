//! Custom early-exit reasoner: ordered `(label, condition)` rules, first match wins.

use std::fmt;
use std::sync::Arc;

use chrono::Duration;

use crate::components::frame::Row;
use crate::domain::{CallbackContext, TradeView};

/// Everything an exit rule may look at: the latest closed row, the trade and
/// the live callback context.
#[derive(Debug, Clone, Copy)]
pub struct ExitSnapshot<'a> {
    pub row: Row<'a>,
    pub trade: &'a TradeView,
    pub ctx: &'a CallbackContext,
}

impl ExitSnapshot<'_> {
    pub fn profit(&self) -> f64 {
        self.ctx.current_profit
    }

    pub fn held_for(&self) -> Duration {
        self.trade.held_for(self.ctx.current_time)
    }

    /// Row value; undefined reads as `None`.
    pub fn value(&self, column: &str) -> Option<f64> {
        self.row.value(column)
    }

    pub fn flag(&self, column: &str) -> bool {
        self.row.flag(column) == Some(true)
    }
}

type Check = Arc<dyn Fn(&ExitSnapshot<'_>) -> bool + Send + Sync>;

#[derive(Clone)]
struct ExitRule {
    label: String,
    check: Check,
}

/// Ordered exit rules.
#[derive(Clone, Default)]
pub struct ExitReasoner {
    rules: Vec<ExitRule>,
}

impl fmt::Debug for ExitReasoner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|r| &r.label))
            .finish()
    }
}

impl ExitReasoner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule. Rules are checked in the order they were added.
    pub fn rule(
        mut self,
        label: impl Into<String>,
        check: impl Fn(&ExitSnapshot<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.rules.push(ExitRule {
            label: label.into(),
            check: Arc::new(check),
        });
        self
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.label.as_str())
    }

    pub fn evaluate(&self, snapshot: &ExitSnapshot<'_>) -> Option<&str> {
        self.rules
            .iter()
            .find(|r| (r.check)(snapshot))
            .map(|r| r.label.as_str())
    }
}
