//! Plugin Events - 이벤트 버스 (발행/구독)
//!
//! 이벤트 타입 문자열 -> 핸들러 목록 매핑입니다.
//! `emit`은 핸들러마다 독립된 태스크를 띄우고 결과를 기다리지 않습니다.
//! 핸들러 에러는 로그만 남기고 버립니다. 전달 보장/순서 보장은 없습니다.

use super::traits::PluginContext;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use parking_lot::RwLock;
use plugrt_foundation::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

// ============================================================================
// 이벤트 이름
// ============================================================================

/// 전체 구독 (모든 이벤트 타입)
pub const WILDCARD: &str = "*";

/// 매니저 발신자 이름
pub const MANAGER_SOURCE: &str = "plugin_manager";

pub const PLUGIN_LOADED: &str = "plugin.loaded";
pub const PLUGIN_UNLOADED: &str = "plugin.unloaded";
pub const PLUGIN_ERROR: &str = "plugin.error";
pub const PLUGIN_CONFIGURED: &str = "plugin.configured";
pub const PLUGIN_UPDATE_AVAILABLE: &str = "plugin.update_available";

// ============================================================================
// PluginEvent
// ============================================================================

/// 플러그인 이벤트 (영속화되지 않음)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginEvent {
    /// 이벤트 이름 (예: "plugin.loaded")
    #[serde(rename = "type")]
    pub event_type: String,

    /// 발신자 (플러그인 id 또는 "plugin_manager")
    pub source: String,

    /// 수신 대상 ("*"는 브로드캐스트)
    pub target: String,

    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub data: HashMap<String, Value>,
}

impl PluginEvent {
    /// 새 브로드캐스트 이벤트
    pub fn new(event_type: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            source: source.into(),
            target: WILDCARD.to_string(),
            timestamp: Utc::now(),
            data: HashMap::new(),
        }
    }

    /// 매니저가 발행하는 플러그인 이벤트 (data.pluginId 포함)
    pub fn lifecycle(event_type: &str, plugin_id: &str) -> Self {
        Self::new(event_type, MANAGER_SOURCE).with_data("pluginId", Value::from(plugin_id))
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn plugin_id(&self) -> Option<&str> {
        self.data.get("pluginId").and_then(Value::as_str)
    }

    /// 특정 수신자에게 전달 대상인지
    pub fn is_for(&self, id: &str) -> bool {
        self.target == WILDCARD || self.target == id
    }
}

// ============================================================================
// Handler
// ============================================================================

/// 이벤트 핸들러 클로저
pub type EventHandler =
    Arc<dyn Fn(PluginContext, PluginEvent) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// async 클로저를 `EventHandler`로 변환
pub fn event_handler<F, Fut>(f: F) -> EventHandler
where
    F: Fn(PluginContext, PluginEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |ctx, event| Box::pin(f(ctx, event)))
}

/// 핸들러 ID (구독 해제용)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

impl std::fmt::Display for HandlerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "handler-{}", self.0)
    }
}

// ============================================================================
// EventBus
// ============================================================================

/// 이벤트 버스 설정
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// 브로드캐스트 채널 용량
    pub channel_capacity: usize,

    /// 이벤트 히스토리 보관 개수
    pub history_size: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
            history_size: 100,
        }
    }
}

/// 이벤트 버스
pub struct EventBus {
    /// 이벤트 타입 -> (핸들러 ID, 핸들러) 목록 (등록 순서 유지)
    handlers: RwLock<HashMap<String, Vec<(HandlerId, EventHandler)>>>,

    /// ID 카운터
    next_id: AtomicU64,

    /// UI 이벤트 피드
    sender: broadcast::Sender<PluginEvent>,

    /// 최근 이벤트
    history: RwLock<VecDeque<PluginEvent>>,

    config: EventBusConfig,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    pub fn with_config(config: EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            handlers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            sender,
            history: RwLock::new(VecDeque::with_capacity(config.history_size)),
            config,
        }
    }

    /// 구독 ("*"는 모든 이벤트)
    pub fn subscribe(&self, event_type: impl Into<String>, handler: EventHandler) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let event_type = event_type.into();
        debug!("Subscribed {} to '{}'", id, event_type);
        self.handlers
            .write()
            .entry(event_type)
            .or_default()
            .push((id, handler));
        id
    }

    /// 해당 핸들러만 구독 해제
    pub fn unsubscribe(&self, event_type: &str, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write();
        let Some(list) = handlers.get_mut(event_type) else {
            return false;
        };

        let before = list.len();
        list.retain(|(handler_id, _)| *handler_id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            handlers.remove(event_type);
        }
        if removed {
            debug!("Unsubscribed {} from '{}'", id, event_type);
        }
        removed
    }

    /// 이벤트 타입의 핸들러 수 (와일드카드 제외)
    pub fn handler_count(&self, event_type: &str) -> usize {
        self.handlers
            .read()
            .get(event_type)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// 이벤트 발행 (fire-and-forget)
    ///
    /// 핸들러 목록은 읽기 락 아래에서 복사한 뒤, 락 밖에서 핸들러마다 태스크를 띄웁니다.
    pub fn emit(&self, ctx: &PluginContext, event: PluginEvent) {
        trace!("Emitting event: {} from {}", event.event_type, event.source);

        self.record(&event);

        let targets: Vec<EventHandler> = {
            let handlers = self.handlers.read();
            let exact = handlers.get(&event.event_type).into_iter().flatten();
            let wildcard = if event.event_type == WILDCARD {
                None
            } else {
                handlers.get(WILDCARD)
            };
            exact
                .chain(wildcard.into_iter().flatten())
                .map(|(_, handler)| handler.clone())
                .collect()
        };

        if targets.is_empty() {
            return;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(
                    "No async runtime; dropping event '{}' for {} handlers",
                    event.event_type,
                    targets.len()
                );
                return;
            }
        };

        for handler in targets {
            let ctx = ctx.clone();
            let event = event.clone();
            runtime.spawn(async move {
                let event_type = event.event_type.clone();
                if let Err(e) = handler(ctx, event).await {
                    warn!("Event handler for '{}' failed: {}", event_type, e);
                }
            });
        }
    }

    /// UI 이벤트 피드 구독
    pub fn stream(&self) -> broadcast::Receiver<PluginEvent> {
        self.sender.subscribe()
    }

    /// 최근 이벤트 (오래된 것부터)
    pub fn history(&self) -> Vec<PluginEvent> {
        self.history.read().iter().cloned().collect()
    }

    fn record(&self, event: &PluginEvent) {
        if self.config.history_size > 0 {
            let mut history = self.history.write();
            if history.len() >= self.config.history_size {
                history.pop_front();
            }
            history.push_back(event.clone());
        }
        // 수신자가 없으면 Err - 무시
        let _ = self.sender.send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn counting_handler(counter: Arc<AtomicUsize>) -> EventHandler {
        event_handler(move |_ctx, _event| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    async fn wait_for(counter: &AtomicUsize, expected: usize) {
        for _ in 0..50 {
            if counter.load(Ordering::SeqCst) >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_emit_reaches_subscribers() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));

        bus.subscribe(PLUGIN_LOADED, counting_handler(counter.clone()));
        bus.subscribe(WILDCARD, counting_handler(counter.clone()));
        bus.subscribe(PLUGIN_UNLOADED, counting_handler(counter.clone()));

        bus.emit(
            &PluginContext::new(),
            PluginEvent::lifecycle(PLUGIN_LOADED, "example.validator"),
        );

        wait_for(&counter, 2).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_only_that_handler() {
        let bus = EventBus::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let id = bus.subscribe(PLUGIN_LOADED, counting_handler(first.clone()));
        bus.subscribe(PLUGIN_LOADED, counting_handler(second.clone()));

        assert!(bus.unsubscribe(PLUGIN_LOADED, id));
        assert!(!bus.unsubscribe(PLUGIN_LOADED, id));
        assert_eq!(bus.handler_count(PLUGIN_LOADED), 1);

        bus.emit(&PluginContext::new(), PluginEvent::lifecycle(PLUGIN_LOADED, "a"));
        wait_for(&second, 1).await;

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handler_error_is_swallowed() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));

        bus.subscribe(
            PLUGIN_ERROR,
            event_handler(|_ctx, _event| async { Err("handler failed".into()) }),
        );
        bus.subscribe(PLUGIN_ERROR, counting_handler(counter.clone()));

        bus.emit(&PluginContext::new(), PluginEvent::lifecycle(PLUGIN_ERROR, "a"));
        wait_for(&counter, 1).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stream_and_history() {
        let bus = EventBus::with_config(EventBusConfig {
            channel_capacity: 8,
            history_size: 2,
        });
        let mut stream = bus.stream();
        let ctx = PluginContext::new();

        bus.emit(&ctx, PluginEvent::lifecycle(PLUGIN_LOADED, "a"));
        bus.emit(&ctx, PluginEvent::lifecycle(PLUGIN_CONFIGURED, "a"));
        bus.emit(&ctx, PluginEvent::lifecycle(PLUGIN_UNLOADED, "a"));

        let first = stream.recv().await.unwrap();
        assert_eq!(first.event_type, PLUGIN_LOADED);
        assert_eq!(first.plugin_id(), Some("a"));

        let history = bus.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].event_type, PLUGIN_CONFIGURED);
    }

    #[test]
    fn test_emit_without_runtime_does_not_panic() {
        let bus = EventBus::new();
        bus.subscribe(WILDCARD, counting_handler(Arc::new(AtomicUsize::new(0))));
        bus.emit(&PluginContext::new(), PluginEvent::new("custom", "test"));
        assert_eq!(bus.history().len(), 1);
    }

    #[test]
    fn test_event_target() {
        let event = PluginEvent::new("custom", "a").with_target("b");
        assert!(event.is_for("b"));
        assert!(!event.is_for("c"));
        assert!(PluginEvent::new("custom", "a").is_for("c"));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "custom");
        assert_eq!(json["target"], "b");
    }
}
