//! Target node selection
//!
//! Picks one running application instance uniformly at random and attacks
//! the node it is scheduled on. Selection is over instances, so a node
//! hosting several replicas is proportionally more likely to be chosen.

use crate::cluster::ClusterClient;
use crate::error::{ChaosError, Result};
use crate::models::{Instance, TargetNode};
use rand::Rng;
use tracing::{debug, info};

/// Resolve the node to attack from the application's running instances
pub async fn resolve_target<R: Rng + Send + ?Sized>(
    client: &dyn ClusterClient,
    namespace: &str,
    label_selector: &str,
    rng: &mut R,
) -> Result<TargetNode> {
    let no_target = |reason: String| ChaosError::NoTargetFound {
        namespace: namespace.to_string(),
        label: label_selector.to_string(),
        reason,
    };

    let instances = client
        .list_instances(namespace, label_selector)
        .await
        .map_err(|e| no_target(format!("{:#}", e)))?;

    debug!(count = instances.len(), namespace = %namespace, "Listed application instances");

    let instance =
        pick_instance(&instances, rng).ok_or_else(|| no_target("no instances".to_string()))?;

    if instance.node_name.is_empty() {
        return Err(no_target(format!("instance {} is not scheduled", instance.name)));
    }

    info!(
        instance = %instance.name,
        node = %instance.node_name,
        "Selected target node"
    );
    Ok(TargetNode::new(instance.node_name.clone()))
}

/// Uniformly sample one instance
pub fn pick_instance<'a, R: Rng + ?Sized>(
    instances: &'a [Instance],
    rng: &mut R,
) -> Option<&'a Instance> {
    if instances.is_empty() {
        return None;
    }
    instances.get(rng.gen_range(0..instances.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::tests::{instance, FakeCluster};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn seed_selecting(index: usize, len: usize) -> u64 {
        (0..)
            .find(|seed| StdRng::seed_from_u64(*seed).gen_range(0..len) == index)
            .unwrap()
    }

    #[tokio::test]
    async fn test_seeded_selection_returns_instance_node() {
        let cluster = FakeCluster::new().with_instances(vec![
            instance("web-0", "node-a"),
            instance("web-1", "node-a"),
            instance("web-2", "node-b"),
        ]);

        let mut rng = StdRng::seed_from_u64(seed_selecting(2, 3));
        let node = resolve_target(&cluster, "default", "app=web", &mut rng)
            .await
            .unwrap();

        assert_eq!(node.name(), "node-b");
    }

    #[tokio::test]
    async fn test_selection_always_comes_from_the_list() {
        let instances = vec![
            instance("web-0", "node-a"),
            instance("web-1", "node-b"),
            instance("web-2", "node-c"),
            instance("web-3", "node-a"),
        ];
        let cluster = FakeCluster::new().with_instances(instances.clone());

        for seed in 0..64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let node = resolve_target(&cluster, "default", "app=web", &mut rng)
                .await
                .unwrap();
            assert!(instances.iter().any(|i| i.node_name == node.name()));
        }
    }

    #[tokio::test]
    async fn test_empty_list_is_no_target() {
        let cluster = FakeCluster::new();
        let mut rng = StdRng::seed_from_u64(0);

        let err = resolve_target(&cluster, "default", "app=web", &mut rng)
            .await
            .unwrap_err();
        assert!(matches!(err, ChaosError::NoTargetFound { .. }));
    }

    #[tokio::test]
    async fn test_listing_error_is_no_target() {
        let cluster = FakeCluster::new().failing_list();
        let mut rng = StdRng::seed_from_u64(0);

        let err = resolve_target(&cluster, "default", "app=web", &mut rng)
            .await
            .unwrap_err();
        assert!(matches!(err, ChaosError::NoTargetFound { .. }));
    }

    #[test]
    fn test_pick_instance_empty() {
        let mut rng = StdRng::seed_from_u64(3);
        assert!(pick_instance(&[], &mut rng).is_none());
    }
}
