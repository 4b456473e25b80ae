//! Container name matching

use crate::adapters::pod_lister::ContainerIdentity;

/// Select the containers whose name contains `pattern`
///
/// Matching is plain substring containment, not a glob or regex. Discovery
/// order is kept and an empty pattern selects everything.
pub fn match_containers(
    identities: &[ContainerIdentity],
    pattern: &str,
) -> Vec<ContainerIdentity> {
    identities
        .iter()
        .filter(|identity| identity.container_name.contains(pattern))
        .cloned()
        .collect()
}
