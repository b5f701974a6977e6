//! Plugin runtime end-to-end scenarios
//!
//! 공개 API만 사용해 매니저/이벤트/테스트 프레임워크/마켓플레이스를 함께 검증

use async_trait::async_trait;
use plugrt_core::plugin::builtin::{builtin_loader, MISSING_TITLE, TEMPLATE_PROCESSOR_ID, VALIDATOR_ID};
use plugrt_core::plugin::{
    capability_case, event_handler, to_plugin_info_api, Capability, MarketplaceClient, Middleware,
    Plugin, PluginContext, PluginInfo, PluginLoader, PluginManager, PluginManagerConfig,
    PluginStatus, PluginTestFramework, TestStatus, PLUGIN_LOADED, PLUGIN_UPDATE_AVAILABLE,
};
use plugrt_core::Error;
use plugrt_foundation::TestingSettings;
use serde_json::{json, Value};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

fn manager() -> PluginManager {
    PluginManager::new(PluginManagerConfig::default())
        .with_loader(PluginLoader::new().with_backend(Arc::new(builtin_loader())))
}

fn builtin(id: &str) -> String {
    format!("builtin:{}", id)
}

fn data(name: &str) -> HashMap<String, Value> {
    HashMap::from([("name".to_string(), json!(name))])
}

// ============================================================================
// Template processor
// ============================================================================

#[tokio::test]
async fn test_template_processor_with_custom_prefix() {
    let manager = manager();
    let id = manager.load_plugin(&builtin(TEMPLATE_PROCESSOR_ID)).await.unwrap();

    manager
        .configure_plugin(&id, r#"{"prefix": "Custom"}"#)
        .await
        .unwrap();

    let output = manager
        .execute_template_processor(&id, "{{name}}", &data("World"))
        .await
        .unwrap();
    assert_eq!(output, "// Custom by Example Template Processor\nWorld");

    let instance = manager.get_plugin(&id).await.unwrap();
    assert_eq!(instance.stats.call_count, 1);
}

#[tokio::test]
async fn test_configure_rollback_keeps_previous_config() {
    let manager = manager();
    let id = manager.load_plugin(&builtin(TEMPLATE_PROCESSOR_ID)).await.unwrap();
    manager
        .configure_plugin(&id, r#"{"prefix": "Stable"}"#)
        .await
        .unwrap();

    let err = manager
        .configure_plugin(&id, r#"{"prefix": 42}"#)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));

    let instance = manager.get_plugin(&id).await.unwrap();
    assert_eq!(instance.status, PluginStatus::Active);
    assert_eq!(instance.config, Some(json!({"prefix": "Stable"})));

    let output = manager
        .execute_template_processor(&id, "{{name}}", &data("x"))
        .await
        .unwrap();
    assert!(output.starts_with("// Stable by"));
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_disable_then_enable() {
    let manager = manager();
    let id = manager.load_plugin(&builtin(VALIDATOR_ID)).await.unwrap();
    let api = plugrt_core::plugin::ParsedApi::new(json!({"info": {"title": "t", "version": "1"}, "paths": {"/a": {}}}));

    manager.disable_plugin(&id).await.unwrap();
    assert_eq!(manager.get_plugin(&id).await.unwrap().status, PluginStatus::Disabled);
    assert!(manager.get_plugins_by_capability(Capability::Validator).await.is_empty());
    assert!(manager.execute_validator(&id, &api).await.is_err());

    manager.enable_plugin(&id).await.unwrap();
    assert_eq!(manager.get_plugin(&id).await.unwrap().status, PluginStatus::Active);
    assert!(manager.execute_validator(&id, &api).await.unwrap().valid);
}

#[tokio::test]
async fn test_loaded_event_reaches_subscriber() {
    let manager = manager();
    let (tx, mut rx) = mpsc::unbounded_channel();
    manager.subscribe(
        PLUGIN_LOADED,
        event_handler(move |_ctx, event| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(event);
                Ok(())
            }
        }),
    );

    manager.load_plugin(&builtin(VALIDATOR_ID)).await.unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.event_type, PLUGIN_LOADED);
    assert_eq!(event.plugin_id(), Some(VALIDATOR_ID));
}

// ============================================================================
// Middleware
// ============================================================================

struct TagMiddleware {
    id: &'static str,
    priority: i32,
}

#[async_trait]
impl Plugin for TagMiddleware {
    fn info(&self) -> PluginInfo {
        PluginInfo::new(self.id, self.id, "1.0.0")
    }

    fn capabilities(&self) -> Vec<Capability> {
        vec![Capability::Middleware]
    }

    async fn initialize(&self, _ctx: &PluginContext, _config: Option<&Value>) -> plugrt_core::Result<()> {
        Ok(())
    }

    fn as_middleware(&self) -> Option<&dyn Middleware> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[async_trait]
impl Middleware for TagMiddleware {
    async fn process(&self, _ctx: &PluginContext, mut payload: Value) -> plugrt_core::Result<Value> {
        if let Some(seen) = payload.get_mut("seen").and_then(Value::as_array_mut) {
            seen.push(json!(self.id));
        }
        Ok(payload)
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

#[tokio::test]
async fn test_middleware_chain_runs_in_priority_order() {
    let modules = builtin_loader();
    modules.register("late", || Arc::new(TagMiddleware { id: "late", priority: 10 }) as Arc<dyn Plugin>);
    modules.register("early", || Arc::new(TagMiddleware { id: "early", priority: -5 }) as Arc<dyn Plugin>);
    modules.register("middle", || Arc::new(TagMiddleware { id: "middle", priority: 0 }) as Arc<dyn Plugin>);

    let manager = PluginManager::new(PluginManagerConfig::default())
        .with_loader(PluginLoader::new().with_backend(Arc::new(modules)));
    for id in ["late", "early", "middle"] {
        manager.load_plugin(&builtin(id)).await.unwrap();
    }

    let output = manager.run_middleware_chain(json!({"seen": []})).await.unwrap();
    assert_eq!(output["seen"], json!(["early", "middle", "late"]));

    manager.disable_plugin("middle").await.unwrap();
    let output = manager.run_middleware_chain(json!({"seen": []})).await.unwrap();
    assert_eq!(output["seen"], json!(["early", "late"]));
}

// ============================================================================
// Test framework
// ============================================================================

#[tokio::test]
async fn test_framework_reports_missing_title() {
    let loader = Arc::new(PluginLoader::new().with_backend(Arc::new(builtin_loader())));
    let framework = PluginTestFramework::new(loader, TestingSettings::default());

    let result = framework
        .test_plugin(&PluginContext::new(), &builtin(VALIDATOR_ID))
        .await
        .unwrap();

    assert!(result.passed);
    let case = result.case(&capability_case(Capability::Validator)).unwrap();
    assert_eq!(case.status, TestStatus::Passed);
    let output = case.output.as_ref().unwrap();
    assert_eq!(output["warnings"][0]["code"], MISSING_TITLE);
}

// ============================================================================
// API shapes
// ============================================================================

#[tokio::test]
async fn test_plugin_info_api_roundtrip() {
    let manager = manager();
    let id = manager.load_plugin(&builtin(TEMPLATE_PROCESSOR_ID)).await.unwrap();
    let info = manager.get_plugin(&id).await.unwrap().info;

    let api = to_plugin_info_api(&info);
    let json = serde_json::to_string(&api).unwrap();
    let restored: plugrt_core::plugin::PluginInfoApi = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.into_plugin_info().unwrap(), info);
}

// ============================================================================
// Updates
// ============================================================================

/// 모든 요청에 같은 JSON 본문으로 응답하는 서버
async fn serve_json(body: String) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let body = body.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{}", addr)
}

#[tokio::test]
async fn test_check_for_updates_emits_event() {
    let base_url = serve_json(
        json!({
            "id": VALIDATOR_ID,
            "name": "Example Validator",
            "version": "1.1.0",
            "downloadUrl": "/downloads/validator.bin"
        })
        .to_string(),
    )
    .await;

    let marketplace = Arc::new(MarketplaceClient::with_base_url(base_url).unwrap());
    let manager = manager().with_marketplace(marketplace);
    let mut feed = manager.event_bus().stream();
    manager.load_plugin(&builtin(VALIDATOR_ID)).await.unwrap();

    let updates = manager.check_for_updates().await.unwrap();
    let update = &updates[VALIDATOR_ID];
    assert_eq!(update.current_version, "1.0.0");
    assert_eq!(update.latest_version, "1.1.0");
    assert!(manager.available_updates().contains_key(VALIDATOR_ID));

    let event = loop {
        let event = tokio::time::timeout(Duration::from_secs(5), feed.recv())
            .await
            .unwrap()
            .unwrap();
        if event.event_type == PLUGIN_UPDATE_AVAILABLE {
            break event;
        }
    };
    assert_eq!(event.data["currentVersion"], "1.0.0");
    assert_eq!(event.data["latestVersion"], "1.1.0");
}
