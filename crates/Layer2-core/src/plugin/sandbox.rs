//! Sandbox - 라이프사이클 호출에 샌드박스 속성을 주입하는 래퍼
//!
//! 권고용 메타데이터일 뿐 격리를 강제하지 않습니다. 플러그인은 이를 무시할 수 있습니다.

use super::capability::{
    EventListener, Generator, Integration, Middleware, OutputConverter, Parser, TemplateProcessor,
    TestingPlugin, UiComponent, Validator,
};
use super::info::PluginInfo;
use super::traits::{
    Capability, Plugin, PluginContext, ATTR_SANDBOX_ALLOWED_HOSTS, ATTR_SANDBOX_ENABLED,
    ATTR_SANDBOX_TEMP_DIR,
};
use async_trait::async_trait;
use plugrt_foundation::{Result, SandboxSettings};
use serde_json::Value;
use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// 샌드박스 정책
#[derive(Debug, Clone)]
pub struct SandboxPolicy {
    /// 허용된 네트워크 호스트
    pub allowed_hosts: Vec<String>,

    /// 제한된 임시 디렉토리
    pub temp_dir: PathBuf,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self::from_settings(&SandboxSettings::default())
    }
}

impl SandboxPolicy {
    pub fn from_settings(settings: &SandboxSettings) -> Self {
        Self {
            allowed_hosts: settings.allowed_hosts.clone(),
            temp_dir: settings.temp_dir.clone(),
        }
    }

    pub fn with_allowed_host(mut self, host: impl Into<String>) -> Self {
        self.allowed_hosts.push(host.into());
        self
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// 컨텍스트에 샌드박스 속성 주입
    pub fn apply(&self, ctx: &PluginContext) -> PluginContext {
        ctx.clone()
            .with_attribute(ATTR_SANDBOX_ENABLED, Value::Bool(true))
            .with_attribute(
                ATTR_SANDBOX_ALLOWED_HOSTS,
                Value::from(self.allowed_hosts.clone()),
            )
            .with_attribute(
                ATTR_SANDBOX_TEMP_DIR,
                Value::from(self.temp_dir.to_string_lossy().to_string()),
            )
    }
}

/// 샌드박스 데코레이터
pub struct SandboxedPlugin {
    inner: Arc<dyn Plugin>,
    policy: SandboxPolicy,
}

impl SandboxedPlugin {
    pub fn new(inner: Arc<dyn Plugin>, policy: SandboxPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &SandboxPolicy {
        &self.policy
    }

    pub fn inner(&self) -> &Arc<dyn Plugin> {
        &self.inner
    }
}

#[async_trait]
impl Plugin for SandboxedPlugin {
    fn info(&self) -> PluginInfo {
        self.inner.info()
    }

    fn capabilities(&self) -> Vec<Capability> {
        self.inner.capabilities()
    }

    async fn initialize(&self, ctx: &PluginContext, config: Option<&Value>) -> Result<()> {
        if let Err(e) = tokio::fs::create_dir_all(&self.policy.temp_dir).await {
            warn!(
                "Failed to create sandbox temp dir {:?}: {}",
                self.policy.temp_dir, e
            );
        }
        let ctx = self.policy.apply(ctx);
        self.inner.initialize(&ctx, config).await
    }

    async fn shutdown(&self, ctx: &PluginContext) -> Result<()> {
        let ctx = self.policy.apply(ctx);
        self.inner.shutdown(&ctx).await
    }

    fn as_template_processor(&self) -> Option<&dyn TemplateProcessor> {
        self.inner.as_template_processor()
    }

    fn as_validator(&self) -> Option<&dyn Validator> {
        self.inner.as_validator()
    }

    fn as_output_converter(&self) -> Option<&dyn OutputConverter> {
        self.inner.as_output_converter()
    }

    fn as_ui_component(&self) -> Option<&dyn UiComponent> {
        self.inner.as_ui_component()
    }

    fn as_integration(&self) -> Option<&dyn Integration> {
        self.inner.as_integration()
    }

    fn as_testing(&self) -> Option<&dyn TestingPlugin> {
        self.inner.as_testing()
    }

    fn as_parser(&self) -> Option<&dyn Parser> {
        self.inner.as_parser()
    }

    fn as_generator(&self) -> Option<&dyn Generator> {
        self.inner.as_generator()
    }

    fn as_middleware(&self) -> Option<&dyn Middleware> {
        self.inner.as_middleware()
    }

    fn as_event_listener(&self) -> Option<&dyn EventListener> {
        self.inner.as_event_listener()
    }

    fn as_any(&self) -> &dyn Any {
        self.inner.as_any()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<PluginContext>>,
    }

    #[async_trait]
    impl Plugin for Recorder {
        fn info(&self) -> PluginInfo {
            PluginInfo::new("test.recorder", "Recorder", "1.0.0")
        }

        fn capabilities(&self) -> Vec<Capability> {
            vec![Capability::Integration]
        }

        async fn initialize(&self, ctx: &PluginContext, _config: Option<&Value>) -> Result<()> {
            self.seen.lock().push(ctx.clone());
            Ok(())
        }

        async fn shutdown(&self, ctx: &PluginContext) -> Result<()> {
            self.seen.lock().push(ctx.clone());
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[tokio::test]
    async fn test_lifecycle_calls_receive_sandbox_attributes() {
        let temp = TempDir::new().unwrap();
        let policy = SandboxPolicy::default()
            .with_allowed_host("api.example.com")
            .with_temp_dir(temp.path().join("sandbox"));

        let inner = Arc::new(Recorder::default());
        let sandboxed = SandboxedPlugin::new(inner.clone(), policy);

        let ctx = PluginContext::new();
        sandboxed.initialize(&ctx, None).await.unwrap();
        sandboxed.shutdown(&ctx).await.unwrap();

        let seen = inner.seen.lock();
        assert_eq!(seen.len(), 2);
        for ctx in seen.iter() {
            assert!(ctx.is_sandboxed());
            assert_eq!(ctx.sandbox_allowed_hosts(), vec!["api.example.com"]);
            assert_eq!(ctx.sandbox_temp_dir(), Some(temp.path().join("sandbox")));
        }
        assert!(temp.path().join("sandbox").is_dir());
        assert!(!PluginContext::new().is_sandboxed());
    }
}
