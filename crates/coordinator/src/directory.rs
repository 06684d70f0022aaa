//! The coordinator's fixed agent directory (spec §4.6 "owns exactly one
//! agent of each of the seven types").

use std::collections::BTreeMap;
use std::sync::Arc;

use folio_agent::{Agent, AgentType};

/// Exactly one `Agent` per `AgentType`.
pub struct AgentDirectory {
    agents: BTreeMap<AgentType, Arc<Agent>>,
}

impl AgentDirectory {
    /// Builds a directory from a complete set of seven agents.
    ///
    /// # Panics
    /// Panics if `agents` does not contain exactly one entry per `AgentType`
    /// variant; a `Coordinator` with a partial roster cannot run any of the
    /// three fixed DAGs.
    #[must_use]
    pub fn new(agents: Vec<Arc<Agent>>) -> Self {
        const ALL: [AgentType; 7] = [
            AgentType::Research,
            AgentType::Submission,
            AgentType::Editorial,
            AgentType::Review,
            AgentType::Quality,
            AgentType::Production,
            AgentType::Analytics,
        ];
        let mut map = BTreeMap::new();
        for agent in agents {
            map.insert(agent.agent_type(), agent);
        }
        for kind in ALL {
            assert!(map.contains_key(&kind), "agent directory missing a '{}' agent", kind.label());
        }
        assert_eq!(map.len(), ALL.len(), "agent directory must carry exactly one agent per type");
        Self { agents: map }
    }

    /// Looks up the sole agent of `kind`.
    #[must_use]
    pub fn get(&self, kind: AgentType) -> Option<&Arc<Agent>> {
        self.agents.get(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_agent::EchoProcessor;
    use folio_store::{Backend, Environment, NoopCache, PersistentStore, StoreConfig};

    async fn store() -> Arc<PersistentStore> {
        let backend = Backend::connect(&StoreConfig::in_memory()).await.unwrap();
        Arc::new(PersistentStore::from_parts(backend, Arc::new(NoopCache)))
    }

    #[tokio::test]
    #[should_panic(expected = "missing a")]
    async fn rejects_a_partial_roster() {
        let store = store().await;
        let agent = Arc::new(Agent::new(
            "ag1",
            AgentType::Research,
            std::collections::BTreeSet::new(),
            store,
            Environment::Development,
            Arc::new(EchoProcessor),
        ));
        AgentDirectory::new(vec![agent]);
    }
}
