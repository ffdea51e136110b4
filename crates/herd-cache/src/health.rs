//! Health check for the shared cache backend.

use crate::metrics::CacheMetricsSnapshot;

/// Health status of the cache backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Reachable, no degraded calls recorded.
    Healthy,
    /// Reachable, but earlier calls were degraded.
    Degraded { reason: String },
    /// Unreachable; the core runs uncoordinated.
    Unhealthy { reason: String },
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    /// Healthy or degraded.
    pub fn is_operational(&self) -> bool {
        matches!(self, HealthStatus::Healthy | HealthStatus::Degraded { .. })
    }
}

/// Health check result with details.
#[derive(Debug, Clone)]
pub struct HealthCheck {
    pub status: HealthStatus,
    pub reachable: bool,
    pub backend_errors: u64,
    pub hits: u64,
    pub misses: u64,
}

impl HealthCheck {
    pub fn from_probe(snapshot: &CacheMetricsSnapshot, probe: Result<(), String>) -> Self {
        let reachable = probe.is_ok();
        let status = match probe {
            Err(reason) => HealthStatus::Unhealthy { reason },
            Ok(()) if snapshot.backend_errors > 0 => HealthStatus::Degraded {
                reason: format!("{} backend errors recorded", snapshot.backend_errors),
            },
            Ok(()) => HealthStatus::Healthy,
        };

        Self {
            status,
            reachable,
            backend_errors: snapshot.backend_errors,
            hits: snapshot.hits,
            misses: snapshot.misses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_probe() {
        let clean = CacheMetricsSnapshot::default();
        assert!(HealthCheck::from_probe(&clean, Ok(())).status.is_healthy());

        let noisy = CacheMetricsSnapshot {
            backend_errors: 2,
            ..Default::default()
        };
        let check = HealthCheck::from_probe(&noisy, Ok(()));
        assert!(!check.status.is_healthy());
        assert!(check.status.is_operational());

        let down = HealthCheck::from_probe(&clean, Err("refused".into()));
        assert!(!down.status.is_operational());
        assert!(!down.reachable);
    }
}
