//! EntityAggregator: aggregations over the filtered row set
//!
//! Filters apply, pagination does not. Every aggregation is computed
//! independently over the values its path reaches; to-many paths
//! contribute every reached value. `Null` values are ignored by every
//! aggregation except `Count`, which counts entities.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::debug;
use trellis_core::{
    Aggregation, AggregationKind, AggregationValue, AggregatorResult, Bucket, Criteria,
    EntitySchema, SchemaRegistry, ShopContext, TrellisError, TrellisResult, Value,
};
use trellis_storage::VisibleRow;

use crate::engine::EngineInner;
use crate::path::FieldPath;
use crate::query::{compare_values, CompiledCriteria};
use crate::scope::ReadScope;

/// Stateless aggregation handle over the engine
#[derive(Clone)]
pub struct EntityAggregator {
    inner: Arc<EngineInner>,
}

impl EntityAggregator {
    pub(crate) fn new(inner: Arc<EngineInner>) -> Self {
        Self { inner }
    }

    /// Compute every aggregation of `criteria` over the matching rows
    ///
    /// # Errors
    ///
    /// `InvalidCriteria` for unknown paths; `UnsupportedAggregation` when
    /// the field type cannot carry the aggregation.
    pub fn aggregate(
        &self,
        schema: &EntitySchema,
        criteria: &Criteria,
        context: &ShopContext,
    ) -> TrellisResult<AggregatorResult> {
        self.inner.check_registered(schema)?;
        let registry = &self.inner.registry;
        let compiled = CompiledCriteria::compile(registry, schema, criteria)?;
        let aggregations = criteria
            .aggregations()
            .iter()
            .map(|a| CompiledAggregation::compile(registry, schema, a))
            .collect::<TrellisResult<Vec<_>>>()?;

        let mut result = AggregatorResult::empty(context.clone());
        if aggregations.is_empty() {
            return Ok(result);
        }

        let view = self.inner.store.view();
        let scope = self.inner.scope(&view, context);
        let rows = compiled.matching(&scope);

        for aggregation in &aggregations {
            let value = aggregation.evaluate(&scope, &rows);
            result
                .aggregations
                .insert(aggregation.name.to_string(), value);
        }

        debug!(
            target: "trellis::aggregate",
            entity = %schema.entity,
            version = %context.version_id,
            rows = rows.len(),
            aggregations = aggregations.len(),
            "aggregate"
        );
        Ok(result)
    }
}

// ============================================================================
// Compiled aggregations
// ============================================================================

enum Computation<'r> {
    Count,
    Sum(FieldPath<'r>),
    Avg(FieldPath<'r>),
    Min(FieldPath<'r>),
    Max(FieldPath<'r>),
    Values(FieldPath<'r>),
    Terms(FieldPath<'r>),
    TermsSum {
        group: FieldPath<'r>,
        field: FieldPath<'r>,
    },
}

struct CompiledAggregation<'r> {
    name: &'r str,
    computation: Computation<'r>,
}

impl<'r> CompiledAggregation<'r> {
    fn compile(
        registry: &'r SchemaRegistry,
        schema: &'r EntitySchema,
        aggregation: &'r Aggregation,
    ) -> TrellisResult<Self> {
        let kind = &aggregation.kind;
        let resolve = |path: &String| FieldPath::resolve(registry, schema, path);
        let unsupported = |path: &FieldPath<'_>, reason: &str| {
            TrellisError::unsupported_aggregation(
                &schema.entity,
                kind.name(),
                &path.raw,
                format!("{} ({} field)", reason, path.type_name()),
            )
        };
        let numeric = |path: FieldPath<'r>| {
            if path.target.is_numeric() {
                Ok(path)
            } else {
                Err(unsupported(&path, "requires a numeric field"))
            }
        };
        let comparable = |path: FieldPath<'r>| {
            if path.target.is_json() {
                Err(unsupported(&path, "json values cannot be compared"))
            } else {
                Ok(path)
            }
        };

        let computation = match kind {
            AggregationKind::Count => Computation::Count,
            AggregationKind::Sum(f) => Computation::Sum(numeric(resolve(f)?)?),
            AggregationKind::Avg(f) => Computation::Avg(numeric(resolve(f)?)?),
            AggregationKind::Min(f) => Computation::Min(comparable(resolve(f)?)?),
            AggregationKind::Max(f) => Computation::Max(comparable(resolve(f)?)?),
            AggregationKind::Values(f) => Computation::Values(comparable(resolve(f)?)?),
            AggregationKind::Terms(f) => Computation::Terms(comparable(resolve(f)?)?),
            AggregationKind::TermsSum { group, field } => Computation::TermsSum {
                group: comparable(resolve(group)?)?,
                field: numeric(resolve(field)?)?,
            },
        };
        Ok(Self {
            name: &aggregation.name,
            computation,
        })
    }

    fn evaluate<'a>(&self, scope: &ReadScope<'a>, rows: &[VisibleRow<'a>]) -> AggregationValue {
        let collect = |path: &FieldPath<'_>| -> Vec<Value> {
            rows.iter()
                .flat_map(|row| path.values(scope, row))
                .filter(|v| !v.is_null())
                .collect()
        };

        match &self.computation {
            Computation::Count => AggregationValue::Count(rows.len() as u64),
            Computation::Sum(path) => {
                AggregationValue::Scalar(sum(&collect(path), path.target.is_int()))
            }
            Computation::Avg(path) => {
                let values = collect(path);
                if values.is_empty() {
                    return AggregationValue::Scalar(Value::Null);
                }
                let total: f64 = values.iter().filter_map(Value::as_f64).sum();
                AggregationValue::Scalar(Value::Float(total / values.len() as f64))
            }
            Computation::Min(path) => AggregationValue::Scalar(
                collect(path)
                    .into_iter()
                    .min_by(compare_values)
                    .unwrap_or(Value::Null),
            ),
            Computation::Max(path) => AggregationValue::Scalar(
                collect(path)
                    .into_iter()
                    .max_by(compare_values)
                    .unwrap_or(Value::Null),
            ),
            Computation::Values(path) => {
                let mut values = collect(path);
                values.sort_by(compare_values);
                values.dedup_by(|a, b| compare_values(a, b) == Ordering::Equal);
                AggregationValue::Values(values)
            }
            Computation::Terms(path) => {
                let entries = rows
                    .iter()
                    .flat_map(|row| distinct_keys(path, scope, row).into_iter().map(|k| (k, ())))
                    .collect();
                AggregationValue::Buckets(
                    group_sorted(entries)
                        .into_iter()
                        .map(|(key, members)| Bucket {
                            key,
                            count: members.len() as u64,
                            sum: None,
                        })
                        .collect(),
                )
            }
            Computation::TermsSum { group, field } => {
                let entries = rows
                    .iter()
                    .flat_map(|row| {
                        let values: Vec<Value> = field
                            .values(scope, row)
                            .into_iter()
                            .filter(|v| !v.is_null())
                            .collect();
                        distinct_keys(group, scope, row)
                            .into_iter()
                            .map(move |k| (k, values.clone()))
                    })
                    .collect();
                let int = field.target.is_int();
                AggregationValue::Buckets(
                    group_sorted(entries)
                        .into_iter()
                        .map(|(key, members)| {
                            let count = members.len() as u64;
                            let values: Vec<Value> = members.into_iter().flatten().collect();
                            Bucket {
                                key,
                                count,
                                sum: Some(sum(&values, int)),
                            }
                        })
                        .collect(),
                )
            }
        }
    }
}

/// Non-null values a row reaches through `path`, each once
fn distinct_keys<'a>(
    path: &FieldPath<'_>,
    scope: &ReadScope<'a>,
    row: &VisibleRow<'a>,
) -> Vec<Value> {
    let mut keys: Vec<Value> = path
        .values(scope, row)
        .into_iter()
        .filter(|v| !v.is_null())
        .collect();
    keys.sort_by(compare_values);
    keys.dedup_by(|a, b| compare_values(a, b) == Ordering::Equal);
    keys
}

/// Group `(key, member)` entries by key, keys ascending
fn group_sorted<T>(mut entries: Vec<(Value, T)>) -> Vec<(Value, Vec<T>)> {
    entries.sort_by(|(a, _), (b, _)| compare_values(a, b));
    let mut groups: Vec<(Value, Vec<T>)> = Vec::new();
    for (key, member) in entries {
        match groups.last_mut() {
            Some((last, members)) if compare_values(last, &key) == Ordering::Equal => {
                members.push(member)
            }
            _ => groups.push((key, vec![member])),
        }
    }
    groups
}

/// Sum of numeric values: an integer for integer fields unless it
/// overflows, a float otherwise
fn sum(values: &[Value], int: bool) -> Value {
    if int {
        let exact = values
            .iter()
            .try_fold(0i64, |acc, v| v.as_int().and_then(|i| acc.checked_add(i)));
        if let Some(total) = exact {
            return Value::Int(total);
        }
    }
    Value::Float(values.iter().filter_map(Value::as_f64).sum())
}
