//! Schema derivation from dataset columns

use super::{Domain, FieldConfig, FieldSpec, KindHint, Schema, SchemaConfig};
use crate::dataset::Dataset;
use crate::error::SchemaWarning;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Range used when a column yields no usable values: `(min, max, median)`
pub const FALLBACK_RANGE: (f64, f64, f64) = (0.0, 1.0, 0.5);

/// Schema plus the non-fatal conditions met while deriving it
#[derive(Debug, Clone)]
pub struct SchemaBuild {
    pub schema: Schema,
    pub warnings: Vec<SchemaWarning>,
}

/// Derive field specs for every configured column
///
/// Never fails: a missing or unusable column falls back to
/// [`FALLBACK_RANGE`] and is reported as [`SchemaWarning::LowSignal`].
pub fn build_schema(dataset: &Dataset, config: &SchemaConfig) -> SchemaBuild {
    let mut fields = Vec::with_capacity(config.fields.len());
    let mut warnings = Vec::new();

    for field in &config.fields {
        let (spec, warning) = derive_field(dataset, field, config.continuous_threshold);
        if let Some(w) = warning {
            warn!(field = %field.column, warning = %w, "Schema field degraded");
            warnings.push(w);
        }
        debug!(field = %spec.name, kind = ?spec.kind(), "Schema field derived");
        fields.push(spec);
    }

    SchemaBuild {
        schema: Schema::new(fields),
        warnings,
    }
}

fn derive_field(
    dataset: &Dataset,
    field: &FieldConfig,
    threshold: f64,
) -> (FieldSpec, Option<SchemaWarning>) {
    let column = dataset.column(&field.column);
    let present: Vec<&str> = column
        .unwrap_or(&[])
        .iter()
        .filter_map(|v| v.as_deref())
        .collect();

    let numeric: Vec<f64> = present.iter().filter_map(|v| coerce_numeric(v)).collect();

    let domain = match field.kind {
        KindHint::Continuous => continuous_domain(&numeric),
        KindHint::Categorical => categorical_domain(&present),
        KindHint::Auto => {
            let rate = if present.is_empty() {
                0.0
            } else {
                numeric.len() as f64 / present.len() as f64
            };
            if !numeric.is_empty() && rate >= threshold {
                continuous_domain(&numeric)
            } else {
                categorical_domain(&present)
            }
        }
    };

    match domain {
        Some(domain) => (
            FieldSpec {
                name: field.column.clone(),
                label: field.label.clone(),
                domain,
                degraded: false,
            },
            None,
        ),
        None => {
            let reason = match column {
                None => "column not present in dataset".to_string(),
                Some(_) if present.is_empty() => "column has no non-null values".to_string(),
                Some(_) => format!("none of {} values could be used", present.len()),
            };
            let (min, max, median) = FALLBACK_RANGE;
            (
                FieldSpec {
                    name: field.column.clone(),
                    label: field.label.clone(),
                    domain: Domain::Continuous { min, max, median },
                    degraded: true,
                },
                Some(SchemaWarning::LowSignal {
                    field: field.column.clone(),
                    reason,
                }),
            )
        }
    }
}

/// Parse a cell as a finite number
pub(crate) fn coerce_numeric(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn continuous_domain(values: &[f64]) -> Option<Domain> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some(Domain::Continuous {
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        median: median(&sorted),
    })
}

fn categorical_domain(values: &[&str]) -> Option<Domain> {
    let unique: BTreeSet<&str> = values.iter().copied().collect();
    if unique.is_empty() {
        return None;
    }
    Some(Domain::Categorical {
        values: unique.into_iter().map(str::to_string).collect(),
    })
}

/// Median of sorted values; the mean of the two middle values for even counts
fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}
