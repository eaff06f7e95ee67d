//! C8 — the command manager: a per-process registry of compiled grammars,
//! keyed by a `CommandId` arena rather than Python's weak-reference map (see
//! `DESIGN.md`'s note on the weak-reference Open Question), enforcing
//! `max_count` and memoizing recent parses via `moka::sync::Cache`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use moka::sync::Cache;
use uuid::Uuid;

use crate::argv::Segment;
use crate::config::ManagerConfig;
use crate::core::Alconna;
use crate::error::{AlconnaError, ParseSignal};
use crate::result::Arparma;

/// Opaque handle into the manager's command arena. Dropping the manager's
/// last reference to a name frees the slot; the id itself is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandId(Uuid);

struct Entry {
    id: CommandId,
    command: Arc<Alconna>,
}

pub struct CommandManager {
    namespace: String,
    config: ManagerConfig,
    by_name: RwLock<HashMap<String, Entry>>,
    memo: Option<Cache<u64, Arc<Arparma>>>,
}

impl CommandManager {
    pub fn new(namespace: impl Into<String>, config: ManagerConfig) -> Self {
        let memo = config.memoize_parses.then(|| {
            Cache::builder()
                .max_capacity(config.lru_capacity)
                .time_to_live(std::time::Duration::from_secs(config.lru_ttl_secs))
                .build()
        });
        Self {
            namespace: namespace.into(),
            config,
            by_name: RwLock::new(HashMap::new()),
            memo,
        }
    }

    /// Register `command` under `name`, replacing any prior registration.
    /// Enforces `max_count` only when `name` is new.
    pub fn register(&self, name: &str, command: Alconna) -> Result<CommandId, AlconnaError> {
        let mut table = self.by_name.write().expect("manager lock poisoned");
        if !table.contains_key(name) && table.len() >= self.config.max_count {
            return Err(AlconnaError::ExceedMaxCount(self.config.max_count));
        }
        let id = CommandId(Uuid::new_v4());
        table.insert(
            name.to_string(),
            Entry {
                id,
                command: Arc::new(command),
            },
        );
        tracing::info!(namespace = %self.namespace, %name, "registered command");
        Ok(id)
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.by_name.write().expect("manager lock poisoned").remove(name).is_some()
    }

    /// Returns the compiled grammar registered under `name`.
    pub fn require(&self, name: &str) -> Option<Arc<Alconna>> {
        self.by_name
            .read()
            .expect("manager lock poisoned")
            .get(name)
            .map(|e| e.command.clone())
    }

    pub fn resolve_id(&self, name: &str) -> Option<CommandId> {
        self.by_name.read().expect("manager lock poisoned").get(name).map(|e| e.id)
    }

    pub fn len(&self) -> usize {
        self.by_name.read().expect("manager lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Parse `segments` against the command registered under `name`,
    /// memoizing on a hash of the rendered input when enabled.
    pub fn parse(&self, name: &str, segments: &[Segment]) -> Result<Arc<Arparma>, ParseSignal> {
        let command = self.require(name).ok_or_else(|| {
            ParseSignal::Failure(crate::error::ParseFailure::new(
                None,
                format!("no command registered under `{name}`"),
                Vec::new(),
            ))
        })?;

        let cache_key = self.memo.as_ref().map(|_| hash_segments(name, segments));
        if let (Some(cache), Some(key)) = (&self.memo, cache_key) {
            if let Some(hit) = cache.get(&key) {
                tracing::trace!(%name, "memoized parse hit");
                return Ok(hit);
            }
        }

        let result = Arc::new(command.parse(segments)?);
        if let (Some(cache), Some(key)) = (&self.memo, cache_key) {
            cache.insert(key, result.clone());
        }
        Ok(result)
    }

    /// Dispatch `segments` against every command in this namespace,
    /// collecting only the ones that matched.
    pub fn broadcast(&self, segments: &[Segment]) -> Vec<(String, Arc<Arparma>)> {
        let names: Vec<String> = self.by_name.read().expect("manager lock poisoned").keys().cloned().collect();
        names
            .into_iter()
            .filter_map(|name| match self.parse(&name, segments) {
                Ok(result) if result.matched => Some((name, result)),
                _ => None,
            })
            .collect()
    }

    /// `true` if at least one command in this namespace matches `segments`.
    pub fn test(&self, segments: &[Segment]) -> bool {
        !self.broadcast(segments).is_empty()
    }
}

fn hash_segments(name: &str, segments: &[Segment]) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    name.hash(&mut hasher);
    for segment in segments {
        match segment {
            Segment::Text(t) => t.hash(&mut hasher),
            Segment::Opaque(o) => o.label.hash(&mut hasher),
        }
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::{Arg, Args};
    use crate::header::HeaderCommand;
    use crate::pattern::AnyStr;

    fn seg(s: &str) -> Vec<Segment> {
        vec![Segment::Text(s.to_string())]
    }

    fn sample() -> Alconna {
        Alconna::new(HeaderCommand::Literal("echo".into()), vec![])
            .unwrap()
            .with_main_args(Args::new().add(Arg::new("msg", Arc::new(AnyStr))))
    }

    #[test]
    fn register_then_parse_round_trips() {
        let manager = CommandManager::new("default", ManagerConfig::default());
        manager.register("echo", sample()).unwrap();
        let result = manager.parse("echo", &seg("echo hi")).unwrap();
        assert!(result.matched);
    }

    #[test]
    fn exceeding_max_count_is_rejected() {
        let manager = CommandManager::new(
            "default",
            ManagerConfig {
                max_count: 1,
                ..ManagerConfig::default()
            },
        );
        manager.register("echo", sample()).unwrap();
        let second = Alconna::new(HeaderCommand::Literal("add".into()), vec![]).unwrap();
        assert!(manager.register("add", second).is_err());
    }

    #[test]
    fn unregistering_frees_the_slot() {
        let manager = CommandManager::new("default", ManagerConfig::default());
        manager.register("echo", sample()).unwrap();
        assert!(manager.unregister("echo"));
        assert!(manager.require("echo").is_none());
    }

    #[test]
    fn broadcast_collects_only_matching_commands() {
        let manager = CommandManager::new("default", ManagerConfig::default());
        manager.register("echo", sample()).unwrap();
        manager
            .register("add", Alconna::new(HeaderCommand::Literal("add".into()), vec![]).unwrap())
            .unwrap();
        let matches = manager.broadcast(&seg("echo hi"));
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].0, "echo");
    }
}
