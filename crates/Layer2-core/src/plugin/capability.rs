//! Capability traits - 기능별 플러그인 인터페이스
//!
//! 각 인터페이스는 `Plugin::as_*` 접근자를 통해 노출됩니다.

use super::events::PluginEvent;
use super::traits::PluginContext;
use super::types::{
    ConvertedOutput, GenerateOptions, GeneratedFiles, ParsedApi, TestResult,
    UiComponentDefinition, ValidationResult, ValidationRule,
};
use async_trait::async_trait;
use plugrt_foundation::Result;
use serde_json::Value;
use std::collections::HashMap;

/// 템플릿 처리기
#[async_trait]
pub trait TemplateProcessor: Send + Sync {
    /// 템플릿 렌더링
    async fn process_template(
        &self,
        ctx: &PluginContext,
        template: &str,
        data: &HashMap<String, Value>,
    ) -> Result<String>;

    /// 지원하는 템플릿 포맷
    fn supported_formats(&self) -> Vec<String> {
        Vec::new()
    }
}

/// API 문서 검증기
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, ctx: &PluginContext, api: &ParsedApi) -> Result<ValidationResult>;

    /// 검증 규칙 목록
    fn rules(&self) -> Vec<ValidationRule> {
        Vec::new()
    }
}

/// 출력 변환기
#[async_trait]
pub trait OutputConverter: Send + Sync {
    async fn convert(
        &self,
        ctx: &PluginContext,
        files: &GeneratedFiles,
        format: &str,
    ) -> Result<ConvertedOutput>;

    fn supported_formats(&self) -> Vec<String> {
        Vec::new()
    }
}

/// UI 컴포넌트
#[async_trait]
pub trait UiComponent: Send + Sync {
    /// 컴포넌트 정의
    fn component(&self) -> UiComponentDefinition;

    /// props로 렌더링 (셸이 해석하는 JSON 반환)
    async fn render(&self, ctx: &PluginContext, props: &Value) -> Result<Value>;
}

/// 외부 서비스 연동
#[async_trait]
pub trait Integration: Send + Sync {
    async fn execute(&self, ctx: &PluginContext, action: &str, params: &Value) -> Result<Value>;

    fn supported_actions(&self) -> Vec<String> {
        Vec::new()
    }
}

/// 생성 결과 테스트
#[async_trait]
pub trait TestingPlugin: Send + Sync {
    async fn run_tests(&self, ctx: &PluginContext, api: &ParsedApi) -> Result<TestResult>;
}

/// 입력 포맷 파서
#[async_trait]
pub trait Parser: Send + Sync {
    async fn parse(&self, ctx: &PluginContext, input: &[u8], format: &str) -> Result<ParsedApi>;

    fn supported_formats(&self) -> Vec<String> {
        Vec::new()
    }
}

/// 코드 생성기
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        ctx: &PluginContext,
        api: &ParsedApi,
        options: &GenerateOptions,
    ) -> Result<GeneratedFiles>;

    /// 지원하는 대상 (언어/프레임워크)
    fn targets(&self) -> Vec<String> {
        Vec::new()
    }
}

/// 처리 파이프라인 미들웨어
///
/// 우선순위가 낮은 것부터 실행됩니다.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn process(&self, ctx: &PluginContext, payload: Value) -> Result<Value>;

    fn priority(&self) -> i32 {
        0
    }
}

/// 이벤트 수신자
#[async_trait]
pub trait EventListener: Send + Sync {
    /// 구독할 이벤트 타입 ("*"는 전체)
    fn event_types(&self) -> Vec<String>;

    async fn handle_event(&self, ctx: &PluginContext, event: &PluginEvent) -> Result<()>;
}
