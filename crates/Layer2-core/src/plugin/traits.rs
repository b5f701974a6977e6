//! Plugin traits - 핵심 플러그인 인터페이스

use super::capability::{
    EventListener, Generator, Integration, Middleware, OutputConverter, Parser, TemplateProcessor,
    TestingPlugin, UiComponent, Validator,
};
use super::info::PluginInfo;
use async_trait::async_trait;
use plugrt_foundation::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Capability - 플러그인 기능 열거
// ============================================================================

/// 플러그인이 구현할 수 있는 확장 지점
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    /// 템플릿 렌더링
    TemplateProcessor,

    /// API 문서 검증
    Validator,

    /// 생성 결과 포맷 변환
    OutputConverter,

    /// UI 컴포넌트 제공
    UiComponent,

    /// 외부 서비스 연동
    Integration,

    /// 생성 결과 테스트
    Testing,

    /// 입력 포맷 파서
    Parser,

    /// 코드 생성기
    Generator,

    /// 처리 파이프라인 미들웨어
    Middleware,

    /// 이벤트 수신
    EventListener,
}

impl Capability {
    /// 알려진 모든 기능 (커버리지 계산 기준)
    pub const ALL: [Capability; 10] = [
        Capability::TemplateProcessor,
        Capability::Validator,
        Capability::OutputConverter,
        Capability::UiComponent,
        Capability::Integration,
        Capability::Testing,
        Capability::Parser,
        Capability::Generator,
        Capability::Middleware,
        Capability::EventListener,
    ];

    /// 안정적인 kebab-case 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TemplateProcessor => "template-processor",
            Self::Validator => "validator",
            Self::OutputConverter => "output-converter",
            Self::UiComponent => "ui-component",
            Self::Integration => "integration",
            Self::Testing => "testing",
            Self::Parser => "parser",
            Self::Generator => "generator",
            Self::Middleware => "middleware",
            Self::EventListener => "event-listener",
        }
    }

    /// 에러 메시지용 이름 ("plugin X is not a template processor")
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::TemplateProcessor => "template processor",
            Self::Validator => "validator",
            Self::OutputConverter => "output converter",
            Self::UiComponent => "UI component",
            Self::Integration => "integration",
            Self::Testing => "testing plugin",
            Self::Parser => "parser",
            Self::Generator => "generator",
            Self::Middleware => "middleware",
            Self::EventListener => "event listener",
        }
    }

    /// 플러그인이 해당 기능 인터페이스를 실제로 구현하는지 확인
    pub fn is_satisfied_by(&self, plugin: &dyn Plugin) -> bool {
        match self {
            Self::TemplateProcessor => plugin.as_template_processor().is_some(),
            Self::Validator => plugin.as_validator().is_some(),
            Self::OutputConverter => plugin.as_output_converter().is_some(),
            Self::UiComponent => plugin.as_ui_component().is_some(),
            Self::Integration => plugin.as_integration().is_some(),
            Self::Testing => plugin.as_testing().is_some(),
            Self::Parser => plugin.as_parser().is_some(),
            Self::Generator => plugin.as_generator().is_some(),
            Self::Middleware => plugin.as_middleware().is_some(),
            Self::EventListener => plugin.as_event_listener().is_some(),
        }
    }

    /// 기능 불일치 에러
    pub fn mismatch(&self, plugin_id: &str) -> Error {
        Error::capability_mismatch(plugin_id, self.display_name())
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Capability {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Capability::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown capability: {}", s)))
    }
}

// ============================================================================
// PluginContext - 플러그인 호출 컨텍스트
// ============================================================================

/// 샌드박스 속성 키
pub const ATTR_SANDBOX_ENABLED: &str = "sandbox.enabled";
pub const ATTR_SANDBOX_ALLOWED_HOSTS: &str = "sandbox.allowedHosts";
pub const ATTR_SANDBOX_TEMP_DIR: &str = "sandbox.tempDir";

/// 플러그인 호출 컨텍스트
///
/// 호출마다 복제되어 전달되는 값입니다. 속성 맵과 취소 토큰을 담습니다.
#[derive(Debug, Clone, Default)]
pub struct PluginContext {
    /// 속성 (예: 샌드박스 메타데이터)
    attributes: HashMap<String, Value>,

    /// 취소 토큰 (매니저 수명 토큰의 자식)
    cancel: CancellationToken,
}

impl PluginContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 지정한 토큰으로 생성
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self {
            attributes: HashMap::new(),
            cancel,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: Value) {
        self.attributes.insert(key.into(), value);
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn attributes(&self) -> &HashMap<String, Value> {
        &self.attributes
    }

    /// 자식 컨텍스트 (속성 복사 + 자식 취소 토큰)
    pub fn child(&self) -> Self {
        Self {
            attributes: self.attributes.clone(),
            cancel: self.cancel.child_token(),
        }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// 취소되었으면 에러
    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    // ========================================================================
    // 샌드박스 속성
    // ========================================================================

    pub fn is_sandboxed(&self) -> bool {
        self.attribute(ATTR_SANDBOX_ENABLED)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn sandbox_allowed_hosts(&self) -> Vec<String> {
        self.attribute(ATTR_SANDBOX_ALLOWED_HOSTS)
            .and_then(Value::as_array)
            .map(|hosts| {
                hosts
                    .iter()
                    .filter_map(|h| h.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn sandbox_temp_dir(&self) -> Option<PathBuf> {
        self.attribute(ATTR_SANDBOX_TEMP_DIR)
            .and_then(Value::as_str)
            .map(PathBuf::from)
    }
}

// ============================================================================
// Plugin Trait - 모든 플러그인이 구현해야 하는 인터페이스
// ============================================================================

/// 플러그인 트레이트
///
/// 모든 plugrt 플러그인은 이 트레이트를 구현해야 합니다.
/// 기능 인터페이스는 `as_*` 접근자로 노출하며, 기본 구현은 `None`입니다.
/// 매니저는 `capabilities()` 선언과 `as_*` 결과가 모두 일치하는 기능만 등록합니다.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// 플러그인 정보
    fn info(&self) -> PluginInfo;

    /// 선언된 기능 목록
    fn capabilities(&self) -> Vec<Capability>;

    /// 초기화 (설정은 없을 수 있음)
    async fn initialize(&self, ctx: &PluginContext, config: Option<&Value>) -> Result<()>;

    /// 종료
    async fn shutdown(&self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }

    // ========================================================================
    // 기능 접근자
    // ========================================================================

    fn as_template_processor(&self) -> Option<&dyn TemplateProcessor> {
        None
    }

    fn as_validator(&self) -> Option<&dyn Validator> {
        None
    }

    fn as_output_converter(&self) -> Option<&dyn OutputConverter> {
        None
    }

    fn as_ui_component(&self) -> Option<&dyn UiComponent> {
        None
    }

    fn as_integration(&self) -> Option<&dyn Integration> {
        None
    }

    fn as_testing(&self) -> Option<&dyn TestingPlugin> {
        None
    }

    fn as_parser(&self) -> Option<&dyn Parser> {
        None
    }

    fn as_generator(&self) -> Option<&dyn Generator> {
        None
    }

    fn as_middleware(&self) -> Option<&dyn Middleware> {
        None
    }

    fn as_event_listener(&self) -> Option<&dyn EventListener> {
        None
    }

    /// 타입 캐스팅을 위한 헬퍼 (다운캐스팅 지원)
    fn as_any(&self) -> &dyn Any;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::types::ParsedApi;
    use crate::plugin::types::ValidationResult;
    use serde_json::json;

    struct HalfPlugin;

    #[async_trait]
    impl Validator for HalfPlugin {
        async fn validate(&self, _ctx: &PluginContext, _api: &ParsedApi) -> Result<ValidationResult> {
            Ok(ValidationResult::new())
        }
    }

    #[async_trait]
    impl Plugin for HalfPlugin {
        fn info(&self) -> PluginInfo {
            PluginInfo::new("test.half", "Half", "0.1.0")
        }

        fn capabilities(&self) -> Vec<Capability> {
            vec![Capability::Validator, Capability::Generator]
        }

        async fn initialize(&self, _ctx: &PluginContext, _config: Option<&Value>) -> Result<()> {
            Ok(())
        }

        fn as_validator(&self) -> Option<&dyn Validator> {
            Some(self)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_capability_names() {
        assert_eq!(Capability::TemplateProcessor.to_string(), "template-processor");
        assert_eq!(
            "event-listener".parse::<Capability>().unwrap(),
            Capability::EventListener
        );
        assert!("linter".parse::<Capability>().is_err());
        assert_eq!(
            serde_json::to_value(Capability::OutputConverter).unwrap(),
            json!("output-converter")
        );
    }

    #[test]
    fn test_structural_satisfaction() {
        let plugin = HalfPlugin;
        assert!(Capability::Validator.is_satisfied_by(&plugin));
        assert!(!Capability::Generator.is_satisfied_by(&plugin));
    }

    #[test]
    fn test_mismatch_message() {
        let err = Capability::TemplateProcessor.mismatch("test.half");
        assert_eq!(err.to_string(), "plugin test.half is not a template processor");
    }

    #[test]
    fn test_context_attributes_and_child() {
        let ctx = PluginContext::new()
            .with_attribute(ATTR_SANDBOX_ENABLED, json!(true))
            .with_attribute(ATTR_SANDBOX_ALLOWED_HOSTS, json!(["api.example.com"]));

        assert!(ctx.is_sandboxed());
        assert_eq!(ctx.sandbox_allowed_hosts(), vec!["api.example.com"]);
        assert!(ctx.sandbox_temp_dir().is_none());

        let child = ctx.child();
        ctx.cancellation().cancel();
        assert!(child.is_cancelled());
        assert!(matches!(child.check_cancelled(), Err(Error::Cancelled)));
    }
}
