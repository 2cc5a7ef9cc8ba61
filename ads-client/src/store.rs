//! The client's local view of clusters and their endpoint assignments.
//!
//! The receive loop is the only writer. Queries can come from any thread at
//! any time; a single reader/writer lock over the whole map makes every call
//! atomic with respect to the others.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use crate::resource::ClusterLoadAssignment;

/// Thread-safe registry of cluster name -> latest endpoint assignment.
///
/// A cluster present with no assignment is known to exist but has not been
/// resolved through EDS yet. Entries are never removed.
#[derive(Debug, Default)]
pub struct ResourceStore {
    clusters: RwLock<HashMap<String, Option<Arc<ClusterLoadAssignment>>>>,
}

impl ResourceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure `name` is known. An existing assignment is left untouched.
    ///
    /// Returns true if the cluster was not known before.
    pub fn record_cluster_seen(&self, name: &str) -> bool {
        let mut clusters = self.clusters.write().unwrap_or_else(PoisonError::into_inner);
        if clusters.contains_key(name) {
            return false;
        }
        clusters.insert(name.to_string(), None);
        true
    }

    /// Store `assignment` for its cluster, replacing any previous assignment.
    ///
    /// An assignment without endpoints only records that the cluster exists:
    /// it never erases endpoints already stored for it.
    pub fn record_assignment(&self, assignment: ClusterLoadAssignment) {
        if assignment.is_empty() {
            self.record_cluster_seen(&assignment.cluster_name);
            return;
        }
        let name = assignment.cluster_name.clone();
        self.clusters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, Some(Arc::new(assignment)));
    }

    /// Snapshot of every known cluster name, sorted.
    pub fn list_cluster_names(&self) -> Vec<String> {
        let clusters = self.clusters.read().unwrap_or_else(PoisonError::into_inner);
        clusters
            .keys()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// The latest assignment for `name`, or `None` if the cluster is unknown
    /// or has not been assigned endpoints yet.
    pub fn lookup_assignment(&self, name: &str) -> Option<Arc<ClusterLoadAssignment>> {
        self.clusters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .and_then(Clone::clone)
    }

    /// Returns true if `name` is a known cluster, resolved or not.
    pub fn contains_cluster(&self, name: &str) -> bool {
        self.clusters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Number of known clusters.
    pub fn len(&self) -> usize {
        self.clusters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if no cluster is known.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{EndpointAddress, LbEndpoint, LocalityEndpoints};
    use std::thread;

    fn assignment(cluster: &str, addrs: &[&str]) -> ClusterLoadAssignment {
        ClusterLoadAssignment {
            cluster_name: cluster.to_string(),
            localities: vec![LocalityEndpoints {
                locality: None,
                priority: 0,
                weight: None,
                endpoints: addrs
                    .iter()
                    .map(|a| LbEndpoint {
                        address: EndpointAddress::from(a.parse::<std::net::SocketAddr>().unwrap()),
                        weight: None,
                    })
                    .collect(),
            }],
        }
    }

    #[test]
    fn seen_cluster_has_no_assignment() {
        let store = ResourceStore::new();
        assert!(store.record_cluster_seen("a"));
        assert!(!store.record_cluster_seen("a"));
        assert!(store.contains_cluster("a"));
        assert_eq!(store.lookup_assignment("a"), None);
        assert_eq!(store.list_cluster_names(), vec!["a"]);
    }

    #[test]
    fn unknown_cluster_lookup_is_none() {
        let store = ResourceStore::new();
        assert_eq!(store.lookup_assignment("missing"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn discovery_does_not_erase_assignment() {
        let store = ResourceStore::new();
        store.record_cluster_seen("a");
        store.record_assignment(assignment("a", &["1.2.3.4:80"]));
        assert!(!store.record_cluster_seen("a"));

        let cla = store.lookup_assignment("a").unwrap();
        assert_eq!(cla.len(), 1);
    }

    #[test]
    fn empty_assignment_keeps_stored_endpoints() {
        let store = ResourceStore::new();
        store.record_assignment(assignment("a", &["1.2.3.4:80"]));
        store.record_assignment(assignment("a", &[]));

        let cla = store.lookup_assignment("a").unwrap();
        let addrs: Vec<String> = cla.addresses().map(ToString::to_string).collect();
        assert_eq!(addrs, vec!["1.2.3.4:80"]);
    }

    #[test]
    fn empty_assignment_for_new_cluster_records_it() {
        let store = ResourceStore::new();
        store.record_assignment(assignment("a", &[]));
        assert_eq!(store.list_cluster_names(), vec!["a"]);
        assert_eq!(store.lookup_assignment("a"), None);
    }

    #[test]
    fn assignment_creates_cluster() {
        let store = ResourceStore::new();
        store.record_assignment(assignment("b", &["10.0.0.1:53"]));
        assert_eq!(store.list_cluster_names(), vec!["b"]);
    }

    #[test]
    fn newer_assignment_replaces_older() {
        let store = ResourceStore::new();
        store.record_assignment(assignment("a", &["1.2.3.4:80"]));
        store.record_assignment(assignment("a", &["5.6.7.8:80", "5.6.7.9:80"]));
        let cla = store.lookup_assignment("a").unwrap();
        let addrs: Vec<String> = cla.addresses().map(ToString::to_string).collect();
        assert_eq!(addrs, vec!["5.6.7.8:80", "5.6.7.9:80"]);
    }

    #[test]
    fn record_assignment_is_idempotent() {
        let once = ResourceStore::new();
        once.record_assignment(assignment("a", &["1.2.3.4:80"]));

        let twice = ResourceStore::new();
        twice.record_assignment(assignment("a", &["1.2.3.4:80"]));
        twice.record_assignment(assignment("a", &["1.2.3.4:80"]));

        assert_eq!(once.list_cluster_names(), twice.list_cluster_names());
        assert_eq!(once.lookup_assignment("a"), twice.lookup_assignment("a"));
    }

    #[test]
    fn names_are_union_of_all_seen() {
        let store = ResourceStore::new();
        for batch in [&["c", "a"][..], &["a", "b"][..], &["b"][..]] {
            for name in batch {
                store.record_cluster_seen(name);
            }
        }
        assert_eq!(store.list_cluster_names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn readers_never_see_partial_assignment() {
        let store = Arc::new(ResourceStore::new());
        let even = assignment("a", &["1.1.1.1:1", "1.1.1.2:1"]);
        let odd = assignment("a", &["2.2.2.1:2", "2.2.2.2:2", "2.2.2.3:2"]);
        store.record_assignment(even.clone());

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                let (even, odd) = (even.clone(), odd.clone());
                thread::spawn(move || {
                    for _ in 0..1_000 {
                        let seen = store.lookup_assignment("a").unwrap();
                        assert!(*seen == even || *seen == odd);
                        assert_eq!(store.list_cluster_names(), vec!["a"]);
                    }
                })
            })
            .collect();

        for i in 0..1_000 {
            let next = if i % 2 == 0 { odd.clone() } else { even.clone() };
            store.record_assignment(next);
        }

        for reader in readers {
            reader.join().unwrap();
        }
    }
}
