//! Health reporting for the stability pipeline
//!
//! Component health is derived from schema degradation and the load state of
//! each registered model.

use crate::error::SchemaWarning;
use crate::predictor::{BackendState, BackendStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component is functioning normally
    Healthy,
    /// Component is experiencing issues but still operational
    Degraded,
    /// Component has failed
    Unhealthy,
}

impl ComponentStatus {
    /// Returns true if the component is at least partially operational
    pub fn is_operational(&self) -> bool {
        matches!(self, ComponentStatus::Healthy | ComponentStatus::Degraded)
    }
}

impl std::fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ComponentStatus::Healthy => "healthy",
            ComponentStatus::Degraded => "degraded",
            ComponentStatus::Unhealthy => "unhealthy",
        };
        write!(f, "{}", s)
    }
}

/// Information about a component's health
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }

    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Component names for health tracking
pub mod components {
    pub const SCHEMA: &str = "schema";
    pub const MODEL_PREFIX: &str = "model:";
}

/// Overall pipeline health
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineHealth {
    pub status: ComponentStatus,
    pub components: BTreeMap<String, ComponentHealth>,
}

impl PipelineHealth {
    pub fn from_parts(warnings: &[SchemaWarning], models: &[BackendStatus]) -> Self {
        let mut parts = BTreeMap::new();

        let schema = if warnings.is_empty() {
            ComponentHealth::healthy()
        } else {
            let fields: Vec<&str> = warnings.iter().map(|w| w.field()).collect();
            ComponentHealth::degraded(format!("fallback domains for {}", fields.join(", ")))
        };
        parts.insert(components::SCHEMA.to_string(), schema);

        for model in models {
            let health = match &model.state {
                BackendState::Ready { .. } => ComponentHealth::healthy(),
                BackendState::NotLoaded => ComponentHealth {
                    message: Some("not loaded yet".to_string()),
                    ..ComponentHealth::healthy()
                },
                BackendState::Unavailable { cause, .. } => ComponentHealth::unhealthy(cause.clone()),
            };
            parts.insert(format!("{}{}", components::MODEL_PREFIX, model.model_id), health);
        }

        Self {
            status: Self::compute_status(&parts),
            components: parts,
        }
    }

    /// Worst status across components
    pub fn compute_status(components: &BTreeMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|c| c.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy)
    }

    pub fn component(&self, name: &str) -> Option<&ComponentHealth> {
        self.components.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::BackendKind;
    use chrono::Utc;

    fn status(id: &str, state: BackendState) -> BackendStatus {
        BackendStatus {
            model_id: id.to_string(),
            backend_kind: BackendKind::Tabular,
            state,
        }
    }

    #[test]
    fn test_all_healthy() {
        let health = PipelineHealth::from_parts(
            &[],
            &[
                status("rf", BackendState::NotLoaded),
                status(
                    "xgb",
                    BackendState::Ready {
                        checksum: None,
                        loaded_at: Utc::now(),
                    },
                ),
            ],
        );
        assert_eq!(health.status, ComponentStatus::Healthy);
        assert_eq!(health.components.len(), 3);
        assert!(health.component("model:rf").unwrap().message.is_some());
    }

    #[test]
    fn test_degraded_schema() {
        let warnings = vec![SchemaWarning::LowSignal {
            field: "Stability_light_intensity".into(),
            reason: "column missing".into(),
        }];
        let health = PipelineHealth::from_parts(&warnings, &[status("rf", BackendState::NotLoaded)]);
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert!(health.status.is_operational());
        let schema = health.component(components::SCHEMA).unwrap();
        assert!(schema.message.as_deref().unwrap().contains("Stability_light_intensity"));
    }

    #[test]
    fn test_unavailable_model_is_worst() {
        let warnings = vec![SchemaWarning::LowSignal {
            field: "f".into(),
            reason: "r".into(),
        }];
        let health = PipelineHealth::from_parts(
            &warnings,
            &[status(
                "cnn",
                BackendState::Unavailable {
                    cause: "missing artifact".into(),
                    failed_at: Utc::now(),
                },
            )],
        );
        assert_eq!(health.status, ComponentStatus::Unhealthy);
        assert!(!health.status.is_operational());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&ComponentStatus::Degraded).unwrap();
        assert_eq!(json, "\"degraded\"");
    }
}
