//! Filter expressions understood by the search index.
//!
//! Grammar: `field op value` terms joined by ` AND `, with `op` one of `=`, `>=`, `<=`.

use rust_decimal::Decimal;
use std::fmt;

use crate::catalog::ProductFilter;

pub const CATEGORY_FIELD: &str = "category_id";
pub const BRAND_FIELD: &str = "brand_id";
pub const PRICE_FIELD: &str = "price";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gte,
    Lte,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Gte => ">=",
            FilterOp::Lte => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Int(i64),
    Decimal(Decimal),
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Int(value) => write!(f, "{}", value),
            // 20.00 renders as `20`, 19.90 as `19.9`
            FilterValue::Decimal(value) => write!(f, "{}", value.normalize()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterTerm {
    pub field: &'static str,
    pub op: FilterOp,
    pub value: FilterValue,
}

impl FilterTerm {
    pub fn new(field: &'static str, op: FilterOp, value: FilterValue) -> Self {
        Self { field, op, value }
    }
}

impl fmt::Display for FilterTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.op.as_str(), self.value)
    }
}

/// Conjunction of filter terms
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterExpression {
    terms: Vec<FilterTerm>,
}

impl FilterExpression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, term: FilterTerm) -> Self {
        self.terms.push(term);
        self
    }

    /// Builds the expression for the structured constraints of a product filter.
    /// The free-text part of the filter is not a filter term and is ignored here.
    pub fn from_filter(filter: &ProductFilter) -> Self {
        let mut expression = Self::new();

        if let Some(category_id) = filter.category_id {
            expression = expression.and(FilterTerm::new(
                CATEGORY_FIELD,
                FilterOp::Eq,
                FilterValue::Int(category_id.into()),
            ));
        }
        if let Some(brand_id) = filter.brand_id {
            expression = expression.and(FilterTerm::new(
                BRAND_FIELD,
                FilterOp::Eq,
                FilterValue::Int(brand_id.into()),
            ));
        }
        if let Some(min_price) = filter.min_price {
            expression = expression.and(FilterTerm::new(
                PRICE_FIELD,
                FilterOp::Gte,
                FilterValue::Decimal(min_price),
            ));
        }
        if let Some(max_price) = filter.max_price {
            expression = expression.and(FilterTerm::new(
                PRICE_FIELD,
                FilterOp::Lte,
                FilterValue::Decimal(max_price),
            ));
        }

        expression
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> &[FilterTerm] {
        &self.terms
    }

    /// Rendered expression, or `None` when there is nothing to filter on.
    pub fn to_expression(&self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(self.to_string())
        }
    }
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                f.write_str(" AND ")?;
            }
            write!(f, "{}", term)?;
        }
        Ok(())
    }
}
