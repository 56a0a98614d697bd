//! Derivation of the number of cores to saturate

use crate::cluster::ClusterClient;
use crate::error::{ChaosError, Result};
use crate::models::TargetNode;
use tracing::info;

/// Cores to hog: the configured value, or the node's whole allocatable cores when it is zero
pub async fn effective_cpu_cores(
    client: &dyn ClusterClient,
    node: &TargetNode,
    configured: u32,
) -> Result<u32> {
    if configured != 0 {
        return Ok(configured);
    }

    let lookup_failed = |reason: String| ChaosError::CapacityLookupFailed {
        node: node.name().to_string(),
        reason,
    };

    let descriptor = client
        .get_node(node.name())
        .await
        .map_err(|e| lookup_failed(format!("{:#}", e)))?;

    let cores = parse_cpu_cores(&descriptor.cpu_allocatable).ok_or_else(|| {
        lookup_failed(format!("unparseable allocatable cpu {:?}", descriptor.cpu_allocatable))
    })?;

    info!(node = %node, cores, allocatable = %descriptor.cpu_allocatable, "Derived cpu cores from node allocatable");
    Ok(cores)
}

/// Parse a CPU quantity into whole cores, truncating toward zero
///
/// Accepts plain integers ("4"), decimals ("2.5") and millicores ("3500m").
pub fn parse_cpu_cores(quantity: &str) -> Option<u32> {
    let quantity = quantity.trim();
    if quantity.is_empty() {
        return None;
    }

    if let Some(millis) = quantity.strip_suffix('m') {
        let millis: u64 = millis.parse().ok()?;
        return u32::try_from(millis / 1000).ok();
    }

    if let Ok(cores) = quantity.parse::<u32>() {
        return Some(cores);
    }

    let cores: f64 = quantity.parse().ok()?;
    if !cores.is_finite() || cores < 0.0 || cores > u32::MAX as f64 {
        return None;
    }
    Some(cores.trunc() as u32)
}
