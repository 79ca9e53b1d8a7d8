//! Filtering, ordering, and pagination primitives for [`super::Repository`]
//!
//! These are the bespoke types the repository trait's `find_all`/`count`
//! signatures are written against — deliberately not tied to any SQL dialect
//! so a `Repository` impl can translate them into `WHERE`/`ORDER BY`/`LIMIT`
//! clauses however it likes.

use serde::{Deserialize, Serialize};

/// Comparison operator for a [`FilterCondition`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    In,
    IsNull,
    IsNotNull,
}

/// A typed value used on the right-hand side of a [`FilterCondition`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    StringList(Vec<String>),
    Null,
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// A single `column OP value` condition, ANDed together with its siblings
/// by the repository implementation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub field: String,
    pub operator: FilterOperator,
    pub value: FilterValue,
}

impl FilterCondition {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: impl Into<FilterValue>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::Eq, value)
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator: FilterOperator::IsNull,
            value: FilterValue::Null,
        }
    }

    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator: FilterOperator::IsNotNull,
            value: FilterValue::Null,
        }
    }
}

/// Sort direction for a `find_all` `order_by` clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Offset/limit pagination window for a `find_all` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u64,
}

impl Pagination {
    #[must_use]
    pub fn new(limit: u32, offset: u64) -> Self {
        Self { limit, offset }
    }

    /// Build a [`Pagination`] from the handler-layer `ListQuery` values
    #[must_use]
    pub fn from_page(page_number: u32, items_per_page: u32) -> Self {
        let offset = u64::from(page_number.saturating_sub(1).max(0)) * u64::from(items_per_page);
        Self {
            limit: items_per_page,
            offset,
        }
    }
}

impl From<crate::handlers::ListQuery> for Pagination {
    fn from(query: crate::handlers::ListQuery) -> Self {
        Self::from_page(query.page_number(), query.items_per_page())
    }
}
