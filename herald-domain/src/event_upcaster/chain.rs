use super::upcaster::EventUpcaster;
use super::version::compare_versions;
use crate::domain_event::Event;
use crate::error::{DomainError, DomainResult};
use dashmap::DashMap;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// 路径中的一步
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpcastStep {
    pub from_version: String,
    pub to_version: String,
}

/// 一次上抬的结果
#[derive(Debug, Clone)]
pub struct UpcastResult {
    pub event: Event,
    pub path: Vec<UpcastStep>,
    pub was_upcasted: bool,
    pub original_version: String,
    pub target_version: String,
}

/// 事件升级链
///
/// 按事件类型维护一张有向图：节点为版本号，边为已注册的升级器。
/// 上抬时以广度优先搜索求出跳数最少的路径，再依次应用每条边；同跳数的
/// 多条路径中优先选择注册更早的边，结果确定。注册与查询可并发进行。
#[derive(Default)]
pub struct EventUpcasterChain {
    graph: DashMap<String, Vec<Arc<dyn EventUpcaster>>>,
}

impl EventUpcasterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一条边；相同 (类型, from, to) 的旧边会被替换
    pub fn register(&self, upcaster: Arc<dyn EventUpcaster>) {
        let event_type = upcaster.event_type().to_string();
        let mut edges = self.graph.entry(event_type.clone()).or_default();

        match edges.iter().position(|e| {
            e.from_version() == upcaster.from_version() && e.to_version() == upcaster.to_version()
        }) {
            Some(idx) => {
                tracing::debug!(
                    event_type = %event_type,
                    from = upcaster.from_version(),
                    to = upcaster.to_version(),
                    "replacing upcaster"
                );
                edges[idx] = upcaster;
            }
            None => {
                tracing::debug!(
                    event_type = %event_type,
                    from = upcaster.from_version(),
                    to = upcaster.to_version(),
                    "registered upcaster"
                );
                edges.push(upcaster);
            }
        }
    }

    pub fn register_all<I: IntoIterator<Item = Arc<dyn EventUpcaster>>>(&self, iter: I) {
        for upcaster in iter {
            self.register(upcaster);
        }
    }

    /// 已注册的边数
    pub fn upcaster_count(&self) -> usize {
        self.graph.iter().map(|entry| entry.value().len()).sum()
    }

    /// 某事件类型已知的全部版本（语义顺序）
    pub fn versions(&self, event_type: &str) -> Vec<String> {
        let Some(edges) = self.graph.get(event_type) else {
            return Vec::new();
        };

        let mut versions: Vec<String> = edges
            .iter()
            .flat_map(|e| [e.from_version().to_string(), e.to_version().to_string()])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        versions.sort_by(|a, b| compare_versions(a, b));
        versions
    }

    pub fn latest_version(&self, event_type: &str) -> Option<String> {
        self.versions(event_type).pop()
    }

    pub fn has_path(&self, event_type: &str, from_version: &str, to_version: &str) -> bool {
        from_version == to_version || self.find_path(event_type, from_version, to_version).is_some()
    }

    /// 广度优先搜索最短路径，返回沿途的边
    pub fn find_path(
        &self,
        event_type: &str,
        from_version: &str,
        to_version: &str,
    ) -> Option<Vec<Arc<dyn EventUpcaster>>> {
        // 复制一份边的快照，避免在搜索期间持有分片锁
        let edges: Vec<Arc<dyn EventUpcaster>> = self.graph.get(event_type)?.value().clone();

        let mut visited: HashSet<&str> = HashSet::from([from_version]);
        let mut came_from: HashMap<&str, usize> = HashMap::new();
        let mut queue: VecDeque<&str> = VecDeque::from([from_version]);

        while let Some(current) = queue.pop_front() {
            if current == to_version {
                let mut path = Vec::new();
                let mut node = current;
                while let Some(&idx) = came_from.get(node) {
                    path.push(edges[idx].clone());
                    node = edges[idx].from_version();
                }
                path.reverse();
                return Some(path);
            }

            for (idx, edge) in edges.iter().enumerate() {
                if edge.from_version() == current && visited.insert(edge.to_version()) {
                    came_from.insert(edge.to_version(), idx);
                    queue.push_back(edge.to_version());
                }
            }
        }

        None
    }

    /// 将事件上抬到 `target_version`
    pub fn upcast(&self, event: Event, target_version: &str) -> DomainResult<UpcastResult> {
        let original_version = event.version().to_string();

        if original_version == target_version {
            return Ok(UpcastResult {
                event,
                path: Vec::new(),
                was_upcasted: false,
                original_version,
                target_version: target_version.to_string(),
            });
        }

        let edges = self
            .find_path(event.event_type(), &original_version, target_version)
            .ok_or_else(|| DomainError::UpcastPathNotFound {
                event_type: event.event_type().to_string(),
                from_version: original_version.clone(),
                to_version: target_version.to_string(),
            })?;

        tracing::debug!(
            event_type = event.event_type(),
            from = %original_version,
            to = target_version,
            hops = edges.len(),
            "upcasting event"
        );

        let mut path = Vec::with_capacity(edges.len());
        let mut current = event;
        for edge in &edges {
            current = edge.upcast(current)?;
            path.push(UpcastStep {
                from_version: edge.from_version().to_string(),
                to_version: edge.to_version().to_string(),
            });
        }

        Ok(UpcastResult {
            event: current,
            path,
            was_upcasted: true,
            original_version,
            target_version: target_version.to_string(),
        })
    }

    /// 上抬到该事件类型已知的最新版本；未注册任何升级器时原样返回
    pub fn upcast_to_latest(&self, event: Event) -> DomainResult<UpcastResult> {
        match self.latest_version(event.event_type()) {
            Some(latest) => self.upcast(event, &latest),
            None => {
                let version = event.version().to_string();
                self.upcast(event, &version)
            }
        }
    }

    /// 批量上抬，遇到首个错误即返回
    pub fn upcast_all(&self, events: Vec<Event>, target_version: &str) -> DomainResult<Vec<Event>> {
        events
            .into_iter()
            .map(|event| self.upcast(event, target_version).map(|r| r.event))
            .collect()
    }
}

impl FromIterator<Arc<dyn EventUpcaster>> for EventUpcasterChain {
    fn from_iter<I: IntoIterator<Item = Arc<dyn EventUpcaster>>>(iter: I) -> Self {
        let chain = Self::new();
        chain.register_all(iter);
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_event::EventMetadata;
    use crate::event_upcaster::FnUpcaster;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn event(version: &str) -> Event {
        Event::builder()
            .event_type("task.created")
            .aggregate_id("t-1")
            .aggregate_type("task")
            .payload(json!({"trail": []}))
            .metadata(EventMetadata::builder().version(version).build())
            .build()
            .unwrap()
    }

    /// 在载荷的 `trail` 中记录经过的边
    fn edge(from: &'static str, to: &'static str) -> Arc<dyn EventUpcaster> {
        Arc::new(FnUpcaster::new(
            "task.created",
            from,
            to,
            move |mut payload: Value| {
                if let Some(trail) = payload.get_mut("trail").and_then(|t| t.as_array_mut()) {
                    trail.push(json!(format!("{from}->{to}")));
                }
                Ok(payload)
            },
        ))
    }

    fn trail(event: &Event) -> Vec<String> {
        serde_json::from_value(event.payload()["trail"].clone()).unwrap()
    }

    #[test]
    fn same_version_is_returned_unchanged() {
        let chain = EventUpcasterChain::new();
        let result = chain.upcast(event("1.0"), "1.0").unwrap();
        assert!(!result.was_upcasted);
        assert!(result.path.is_empty());
        assert_eq!(result.original_version, "1.0");
        assert_eq!(result.target_version, "1.0");
    }

    #[test]
    fn traverses_multi_hop_path() {
        let chain: EventUpcasterChain = [edge("1.0", "1.1"), edge("1.1", "2.0")]
            .into_iter()
            .collect();

        let result = chain.upcast(event("1.0"), "2.0").unwrap();
        assert!(result.was_upcasted);
        assert_eq!(result.event.version(), "2.0");
        assert_eq!(result.path.len(), 2);
        assert_eq!(trail(&result.event), vec!["1.0->1.1", "1.1->2.0"]);
    }

    #[test]
    fn prefers_direct_edge_over_longer_route() {
        let chain: EventUpcasterChain = [edge("1.0", "1.1"), edge("1.1", "2.0"), edge("1.0", "2.0")]
            .into_iter()
            .collect();

        let result = chain.upcast(event("1.0"), "2.0").unwrap();
        assert_eq!(
            result.path,
            vec![UpcastStep {
                from_version: "1.0".into(),
                to_version: "2.0".into()
            }]
        );
        assert_eq!(trail(&result.event), vec!["1.0->2.0"]);
    }

    #[test]
    fn missing_path_is_named_error() {
        let chain: EventUpcasterChain = [edge("1.0", "1.1")].into_iter().collect();

        match chain.upcast(event("1.0"), "3.0").unwrap_err() {
            DomainError::UpcastPathNotFound {
                event_type,
                from_version,
                to_version,
            } => {
                assert_eq!(event_type, "task.created");
                assert_eq!(from_version, "1.0");
                assert_eq!(to_version, "3.0");
            }
            other => panic!("unexpected {other:?}"),
        }

        // 未知事件类型同样报告无路径
        let other = Event::builder()
            .event_type("user.created")
            .aggregate_id("u-1")
            .aggregate_type("user")
            .build()
            .unwrap();
        assert!(matches!(
            chain.upcast(other, "2.0"),
            Err(DomainError::UpcastPathNotFound { .. })
        ));
    }

    #[test]
    fn latest_version_is_stable_with_mixed_segments() {
        for targets in [["1.10", "1.2a", "1.3"], ["1.3", "1.10", "1.2a"], ["1.2a", "1.3", "1.10"]] {
            let chain: EventUpcasterChain =
                targets.into_iter().map(|to| edge("1.0", to)).collect();
            assert_eq!(chain.versions("task.created"), vec!["1.0", "1.2a", "1.3", "1.10"]);
            assert_eq!(chain.latest_version("task.created").as_deref(), Some("1.10"));

            let result = chain.upcast_to_latest(event("1.0")).unwrap();
            assert_eq!(result.event.version(), "1.10");
        }
    }

    #[test]
    fn edges_are_directed() {
        let chain: EventUpcasterChain = [edge("1.0", "2.0")].into_iter().collect();
        assert!(chain.has_path("task.created", "1.0", "2.0"));
        assert!(!chain.has_path("task.created", "2.0", "1.0"));
    }

    #[test]
    fn cycles_do_not_loop_forever() {
        let chain: EventUpcasterChain = [edge("1.0", "1.1"), edge("1.1", "1.0")]
            .into_iter()
            .collect();
        assert!(chain.find_path("task.created", "1.0", "2.0").is_none());
    }

    #[test]
    fn re_registration_replaces_edge() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let chain = EventUpcasterChain::new();
        chain.register(edge("1.0", "2.0"));
        chain.register(Arc::new(FnUpcaster::new(
            "task.created",
            "1.0",
            "2.0",
            move |payload: Value| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(payload)
            },
        )));

        assert_eq!(chain.upcaster_count(), 1);
        let result = chain.upcast(event("1.0"), "2.0").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(trail(&result.event).is_empty());
    }

    #[test]
    fn versions_are_semantically_ordered() {
        let chain: EventUpcasterChain = [edge("1.10", "2.0"), edge("1.2", "1.10"), edge("1.0", "1.2")]
            .into_iter()
            .collect();

        assert_eq!(chain.versions("task.created"), vec!["1.0", "1.2", "1.10", "2.0"]);
        assert_eq!(chain.latest_version("task.created").as_deref(), Some("2.0"));
        assert!(chain.versions("user.created").is_empty());
        assert!(chain.latest_version("user.created").is_none());

        let latest = chain.upcast_to_latest(event("1.0")).unwrap();
        assert_eq!(latest.event.version(), "2.0");
        assert_eq!(latest.path.len(), 3);
    }

    #[test]
    fn failing_transform_aborts_the_chain() {
        let chain: EventUpcasterChain = [
            edge("1.0", "1.1"),
            Arc::new(FnUpcaster::new("task.created", "1.1", "2.0", |_| {
                Err(DomainError::validation("cannot migrate"))
            })) as Arc<dyn EventUpcaster>,
        ]
        .into_iter()
        .collect();

        assert!(matches!(
            chain.upcast(event("1.0"), "2.0"),
            Err(DomainError::Validation { .. })
        ));
    }

    #[test]
    fn upcast_all_migrates_every_event() {
        let chain: EventUpcasterChain = [edge("1.0", "2.0")].into_iter().collect();
        let out = chain
            .upcast_all(vec![event("1.0"), event("2.0"), event("1.0")], "2.0")
            .unwrap();
        assert!(out.iter().all(|e| e.version() == "2.0"));
    }
}
