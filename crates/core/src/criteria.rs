//! Declarative query description
//!
//! A [`Criteria`] is built once with consuming builder methods and then
//! passed by reference into the searcher, reader and aggregator, none of
//! which mutate it.
//!
//! ```ignore
//! let criteria = Criteria::new()
//!     .filter(Filter::equals("active", true))
//!     .filter(Filter::range("stock", Range::new().gte(1)))
//!     .sort(Sort::desc("price"))
//!     .limit(10)
//!     .aggregation(Aggregation::sum("stock_total", "stock"));
//! ```

use crate::value::Value;
use serde::{Deserialize, Serialize};

// ============================================================================
// Filters
// ============================================================================

/// Bounds of a range filter; absent bounds are open
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Range {
    /// Exclusive lower bound
    pub gt: Option<Value>,
    /// Inclusive lower bound
    pub gte: Option<Value>,
    /// Exclusive upper bound
    pub lt: Option<Value>,
    /// Inclusive upper bound
    pub lte: Option<Value>,
}

impl Range {
    /// Open range
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: exclusive lower bound
    pub fn gt(mut self, v: impl Into<Value>) -> Self {
        self.gt = Some(v.into());
        self
    }

    /// Builder: inclusive lower bound
    pub fn gte(mut self, v: impl Into<Value>) -> Self {
        self.gte = Some(v.into());
        self
    }

    /// Builder: exclusive upper bound
    pub fn lt(mut self, v: impl Into<Value>) -> Self {
        self.lt = Some(v.into());
        self
    }

    /// Builder: inclusive upper bound
    pub fn lte(mut self, v: impl Into<Value>) -> Self {
        self.lte = Some(v.into());
        self
    }
}

/// Comparison applied by a term filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterOperator {
    /// Field equals the value
    Equals(Value),
    /// Field differs from the value
    NotEquals(Value),
    /// Field equals any of the values
    EqualsAny(Vec<Value>),
    /// Text field contains the substring
    Contains(String),
    /// Text field starts with the prefix
    Prefix(String),
    /// Field lies within the range
    Range(Range),
}

/// Boolean connective of a filter group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MultiOperator {
    /// Every filter must match
    And,
    /// At least one filter must match
    Or,
}

/// A filter predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    /// `(field, operator)` predicate; `field` may be an association path
    Term {
        /// Field path (`"stock"`, `"manufacturer.name"`, `"prices.amount"`)
        field: String,
        /// Comparison
        operator: FilterOperator,
    },
    /// Group of filters joined by a connective
    Multi {
        /// Connective
        operator: MultiOperator,
        /// Nested filters
        filters: Vec<Filter>,
    },
    /// Negation
    Not(Box<Filter>),
}

impl Filter {
    fn term(field: impl Into<String>, operator: FilterOperator) -> Self {
        Filter::Term {
            field: field.into(),
            operator,
        }
    }

    /// `field == value`
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::term(field, FilterOperator::Equals(value.into()))
    }

    /// `field != value`
    pub fn not_equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::term(field, FilterOperator::NotEquals(value.into()))
    }

    /// `field IN values`
    pub fn equals_any(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::term(field, FilterOperator::EqualsAny(values))
    }

    /// Substring match on a text field
    pub fn contains(field: impl Into<String>, needle: impl Into<String>) -> Self {
        Self::term(field, FilterOperator::Contains(needle.into()))
    }

    /// Prefix match on a text field
    pub fn prefix(field: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self::term(field, FilterOperator::Prefix(prefix.into()))
    }

    /// Range match
    pub fn range(field: impl Into<String>, range: Range) -> Self {
        Self::term(field, FilterOperator::Range(range))
    }

    /// All filters must match
    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::Multi {
            operator: MultiOperator::And,
            filters,
        }
    }

    /// Any filter must match
    pub fn or(filters: Vec<Filter>) -> Self {
        Filter::Multi {
            operator: MultiOperator::Or,
            filters,
        }
    }

    /// Negate a filter
    #[allow(clippy::should_implement_trait)]
    pub fn not(filter: Filter) -> Self {
        Filter::Not(Box::new(filter))
    }

    /// Every field path referenced by this filter, depth first
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Filter::Term { field, .. } => out.push(field),
            Filter::Multi { filters, .. } => {
                for f in filters {
                    f.collect_fields(out);
                }
            }
            Filter::Not(inner) => inner.collect_fields(out),
        }
    }
}

// ============================================================================
// Sorting
// ============================================================================

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    /// Smallest first
    #[default]
    Ascending,
    /// Largest first
    Descending,
}

/// One sort key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    /// Field path (must resolve to a single value)
    pub field: String,
    /// Direction
    pub direction: SortDirection,
}

impl Sort {
    /// Ascending sort on `field`
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    /// Descending sort on `field`
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

// ============================================================================
// Aggregations
// ============================================================================

/// What an aggregation computes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregationKind {
    /// Number of matching entities
    Count,
    /// Sum of a numeric field
    Sum(String),
    /// Average of a numeric field
    Avg(String),
    /// Smallest value of a field
    Min(String),
    /// Largest value of a field
    Max(String),
    /// Distinct values of a field, ascending
    Values(String),
    /// One bucket per distinct value of a field with its entity count
    Terms(String),
    /// One bucket per distinct value of `group` with the sum of `field`
    TermsSum {
        /// Grouping field
        group: String,
        /// Summed field
        field: String,
    },
}

impl AggregationKind {
    /// Short name used in error messages
    pub fn name(&self) -> &'static str {
        match self {
            AggregationKind::Count => "count",
            AggregationKind::Sum(_) => "sum",
            AggregationKind::Avg(_) => "avg",
            AggregationKind::Min(_) => "min",
            AggregationKind::Max(_) => "max",
            AggregationKind::Values(_) => "values",
            AggregationKind::Terms(_) => "terms",
            AggregationKind::TermsSum { .. } => "terms_sum",
        }
    }

    /// Field paths the aggregation reads
    pub fn fields(&self) -> Vec<&str> {
        match self {
            AggregationKind::Count => Vec::new(),
            AggregationKind::Sum(f)
            | AggregationKind::Avg(f)
            | AggregationKind::Min(f)
            | AggregationKind::Max(f)
            | AggregationKind::Values(f)
            | AggregationKind::Terms(f) => vec![f.as_str()],
            AggregationKind::TermsSum { group, field } => vec![group.as_str(), field.as_str()],
        }
    }
}

/// A named aggregation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregation {
    /// Name the result is reported under
    pub name: String,
    /// What to compute
    pub kind: AggregationKind,
}

impl Aggregation {
    /// Create a named aggregation
    pub fn new(name: impl Into<String>, kind: AggregationKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// `count(*)`
    pub fn count(name: impl Into<String>) -> Self {
        Self::new(name, AggregationKind::Count)
    }

    /// `sum(field)`
    pub fn sum(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(name, AggregationKind::Sum(field.into()))
    }

    /// `avg(field)`
    pub fn avg(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(name, AggregationKind::Avg(field.into()))
    }

    /// `min(field)`
    pub fn min(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(name, AggregationKind::Min(field.into()))
    }

    /// `max(field)`
    pub fn max(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(name, AggregationKind::Max(field.into()))
    }

    /// Distinct values of `field`
    pub fn values(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(name, AggregationKind::Values(field.into()))
    }

    /// Count buckets grouped by `field`
    pub fn terms(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(name, AggregationKind::Terms(field.into()))
    }

    /// Sum of `field` grouped by `group`
    pub fn terms_sum(
        name: impl Into<String>,
        group: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            AggregationKind::TermsSum {
                group: group.into(),
                field: field.into(),
            },
        )
    }
}

// ============================================================================
// Criteria
// ============================================================================

/// Declarative, serializable query description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Criteria {
    filters: Vec<Filter>,
    sorts: Vec<Sort>,
    offset: usize,
    limit: Option<usize>,
    aggregations: Vec<Aggregation>,
    associations: Vec<String>,
}

impl Criteria {
    /// Empty criteria: every entity, id order, no aggregations
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add a filter (filters are AND-combined)
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Builder: add a sort key (applied in insertion order)
    pub fn sort(mut self, sort: Sort) -> Self {
        self.sorts.push(sort);
        self
    }

    /// Builder: skip the first `offset` matches
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Builder: return at most `limit` ids
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Builder: request an aggregation
    pub fn aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregations.push(aggregation);
        self
    }

    /// Builder: request an association path for detail reads
    pub fn association(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        if !self.associations.contains(&path) {
            self.associations.push(path);
        }
        self
    }

    /// Filters, AND-combined
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Sort keys in priority order
    pub fn sorts(&self) -> &[Sort] {
        &self.sorts
    }

    /// Number of leading matches to skip
    pub fn get_offset(&self) -> usize {
        self.offset
    }

    /// Maximum number of ids to return
    pub fn get_limit(&self) -> Option<usize> {
        self.limit
    }

    /// Requested aggregations
    pub fn aggregations(&self) -> &[Aggregation] {
        &self.aggregations
    }

    /// Requested association paths
    pub fn associations(&self) -> &[String] {
        &self.associations
    }

    /// Whether any aggregation was requested
    pub fn has_aggregations(&self) -> bool {
        !self.aggregations.is_empty()
    }
}
