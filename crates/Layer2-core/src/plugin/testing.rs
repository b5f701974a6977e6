//! Plugin Test Framework - 플러그인 적합성 테스트
//!
//! 매니저 상태를 건드리지 않도록 별도 인스턴스를 로드해서 고정 스크립트를 실행합니다.
//! 1. 플러그인 정보 검사
//! 2. 설정 없이 초기화
//! 3. 선언된 기능별 스모크 테스트
//! 4. 보안 스모크 테스트 (info() 패닉 여부, 권한 정책)
//! 5. (선택) 벤치마크 - 임계값 초과 시 warning
//! 6. 종료 (결과와 무관하게 항상 실행)

use super::events::PluginEvent;
use super::loader::PluginLoader;
use super::security::SecurityManager;
use super::traits::{Capability, Plugin, PluginContext};
use super::types::{
    CoverageSummary, GenerateOptions, GeneratedFiles, ParsedApi, PerformanceSummary, TestCase,
    TestResult, TestStatus,
};
use futures::FutureExt;
use plugrt_foundation::{Result, TestingSettings};
use serde_json::{json, Value};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

// ============================================================================
// 테스트 케이스 이름
// ============================================================================

pub const CASE_INFO: &str = "plugin_info";
pub const CASE_INITIALIZE: &str = "initialize";
pub const CASE_SECURITY: &str = "security";
pub const CASE_BENCHMARK: &str = "benchmark";
pub const CASE_SHUTDOWN: &str = "shutdown";

/// 기능 스모크 테스트 이름 (예: "capability:validator")
pub fn capability_case(capability: Capability) -> String {
    format!("capability:{}", capability.as_str())
}

/// 템플릿 스모크 입력/기대값
const TEMPLATE_INPUT: &str = "Hello {{.name}}!";
const TEMPLATE_EXPECTED: &str = "Hello World!";

fn sample_api() -> ParsedApi {
    ParsedApi::new(json!({
        "openapi": "3.0.0",
        "info": { "version": "1.0.0" },
        "paths": {}
    }))
}

// ============================================================================
// PluginTestFramework
// ============================================================================

/// 플러그인 테스트 프레임워크
pub struct PluginTestFramework {
    loader: Arc<PluginLoader>,
    settings: TestingSettings,
    security: Option<Arc<SecurityManager>>,
}

impl PluginTestFramework {
    pub fn new(loader: Arc<PluginLoader>, settings: TestingSettings) -> Self {
        Self {
            loader,
            settings,
            security: None,
        }
    }

    /// 보안 스모크 테스트에 권한 정책 검사 포함
    pub fn with_security(mut self, security: Arc<SecurityManager>) -> Self {
        self.security = Some(security);
        self
    }

    pub fn settings(&self) -> &TestingSettings {
        &self.settings
    }

    /// 경로의 플러그인을 새로 로드해서 테스트
    ///
    /// 로드 실패만 에러로 반환하고, 이후 단계의 실패는 결과의 케이스로 기록됩니다.
    pub async fn test_plugin(&self, ctx: &PluginContext, path: &str) -> Result<TestResult> {
        info!("Testing plugin at {}", path);
        let plugin = self.loader.load(path)?;
        Ok(self.run_suite(ctx, plugin.as_ref()).await)
    }

    /// 이미 생성된 플러그인 값에 대해 스크립트 실행
    pub async fn run_suite(&self, ctx: &PluginContext, plugin: &dyn Plugin) -> TestResult {
        let started = Instant::now();
        let mut result = TestResult::default();

        // 1. info
        let info_started = Instant::now();
        let info = match guard_sync(|| plugin.info()) {
            Ok(info) => {
                match info.validate_identity() {
                    Ok(()) => result.push(TestCase::passed(CASE_INFO, info_started.elapsed())),
                    Err(e) => result.push(TestCase::failed(CASE_INFO, info_started.elapsed(), e.to_string())),
                }
                Some(info)
            }
            Err(panic) => {
                result.push(TestCase::failed(CASE_INFO, info_started.elapsed(), panic));
                None
            }
        };
        let plugin_id = info.as_ref().map(|i| i.id.clone()).unwrap_or_default();

        // 2. initialize(None)
        let init_started = Instant::now();
        let initialized = match guard(plugin.initialize(ctx, None)).await {
            Ok(()) => {
                result.push(TestCase::passed(CASE_INITIALIZE, init_started.elapsed()));
                true
            }
            Err(e) => {
                result.push(TestCase::failed(CASE_INITIALIZE, init_started.elapsed(), e));
                false
            }
        };

        // 3. 기능별 스모크 테스트
        let mut declared = guard_sync(|| plugin.capabilities()).unwrap_or_default();
        declared.sort();
        declared.dedup();

        let mut exercised = 0;
        for capability in &declared {
            let name = capability_case(*capability);
            if !initialized {
                result.push(TestCase::skipped(name, "initialize failed"));
                continue;
            }
            if !capability.is_satisfied_by(plugin) {
                result.push(
                    TestCase::new(name, TestStatus::Warning, Duration::ZERO)
                        .with_message(format!("declares {} but does not implement it", capability)),
                );
                continue;
            }

            let case = self.smoke_test(ctx, plugin, *capability).await;
            if matches!(case.status, TestStatus::Passed | TestStatus::Failed) {
                exercised += 1;
            }
            result.push(case);
        }

        // 4. 보안
        result.push(self.security_test(plugin, info.as_ref()));

        // 5. 벤치마크
        if self.settings.benchmark && initialized {
            let (case, performance) = self.benchmark(ctx, plugin).await;
            result.push(case);
            result.performance = Some(performance);
        }

        // 6. shutdown (항상)
        let shutdown_started = Instant::now();
        match guard(plugin.shutdown(ctx)).await {
            Ok(()) => result.push(TestCase::passed(CASE_SHUTDOWN, shutdown_started.elapsed())),
            Err(e) => {
                warn!("Plugin {} failed to shut down after tests: {}", plugin_id, e);
                result.push(TestCase::failed(CASE_SHUTDOWN, shutdown_started.elapsed(), e));
            }
        }

        result.coverage = Some(CoverageSummary::new(exercised, Capability::ALL.len()));
        result.duration = started.elapsed();

        info!(
            "Tested plugin {}: passed={} ({} cases, {} failed)",
            plugin_id,
            result.passed,
            result.test_cases.len(),
            result.count(TestStatus::Failed)
        );
        result
    }

    // ========================================================================
    // 기능 스모크 테스트
    // ========================================================================

    async fn smoke_test(&self, ctx: &PluginContext, plugin: &dyn Plugin, capability: Capability) -> TestCase {
        let name = capability_case(capability);
        let started = Instant::now();
        debug!("Running {} smoke test", name);

        let outcome: std::result::Result<Option<Value>, String> = match capability {
            Capability::TemplateProcessor => match plugin.as_template_processor() {
                Some(processor) => {
                    let data = HashMap::from([("name".to_string(), json!("World"))]);
                    match guard(processor.process_template(ctx, TEMPLATE_INPUT, &data)).await {
                        Ok(output) if output.contains(TEMPLATE_EXPECTED) => Ok(Some(Value::String(output))),
                        Ok(output) => Err(format!(
                            "expected output containing {:?}, got {:?}",
                            TEMPLATE_EXPECTED, output
                        )),
                        Err(e) => Err(e),
                    }
                }
                None => return unimplemented_case(name),
            },

            Capability::Validator => match plugin.as_validator() {
                Some(validator) => guard(validator.validate(ctx, &sample_api()))
                    .await
                    .and_then(|r| serde_json::to_value(r).map(Some).map_err(|e| e.to_string())),
                None => return unimplemented_case(name),
            },

            Capability::OutputConverter => match plugin.as_output_converter() {
                Some(converter) => {
                    let Some(format) = converter.supported_formats().into_iter().next() else {
                        return TestCase::skipped(name, "no supported formats declared");
                    };
                    let files = GeneratedFiles::new().with_file("README.md", "# Smoke test\n");
                    guard(converter.convert(ctx, &files, &format))
                        .await
                        .and_then(|o| serde_json::to_value(o).map(Some).map_err(|e| e.to_string()))
                }
                None => return unimplemented_case(name),
            },

            Capability::UiComponent => match plugin.as_ui_component() {
                Some(component) => {
                    let definition = component.component();
                    if definition.name.trim().is_empty() {
                        Err("component definition has an empty name".to_string())
                    } else {
                        guard(component.render(ctx, &json!({}))).await.map(Some)
                    }
                }
                None => return unimplemented_case(name),
            },

            // 외부 서비스 호출은 하지 않고 선언만 확인
            Capability::Integration => match plugin.as_integration() {
                Some(integration) => {
                    let actions = integration.supported_actions();
                    if actions.is_empty() {
                        return TestCase::skipped(name, "no actions declared");
                    }
                    Ok(Some(json!({ "actions": actions })))
                }
                None => return unimplemented_case(name),
            },

            Capability::Testing => match plugin.as_testing() {
                Some(testing) => guard(testing.run_tests(ctx, &sample_api()))
                    .await
                    .and_then(|r| serde_json::to_value(r).map(Some).map_err(|e| e.to_string())),
                None => return unimplemented_case(name),
            },

            Capability::Parser => match plugin.as_parser() {
                Some(parser) => {
                    if !parser.supported_formats().iter().any(|f| f == "json") {
                        return TestCase::skipped(name, "json input not supported");
                    }
                    let input = serde_json::to_vec(sample_api().document()).unwrap_or_default();
                    guard(parser.parse(ctx, &input, "json"))
                        .await
                        .map(|api| Some(api.document().clone()))
                }
                None => return unimplemented_case(name),
            },

            Capability::Generator => match plugin.as_generator() {
                Some(generator) => {
                    let Some(target) = generator.targets().into_iter().next() else {
                        return TestCase::skipped(name, "no targets declared");
                    };
                    let options = GenerateOptions {
                        target,
                        package_name: None,
                        options: HashMap::new(),
                    };
                    guard(generator.generate(ctx, &sample_api(), &options))
                        .await
                        .map(|files| Some(json!({ "files": files.len() })))
                }
                None => return unimplemented_case(name),
            },

            Capability::Middleware => match plugin.as_middleware() {
                Some(middleware) => guard(middleware.process(ctx, json!({ "smokeTest": true })))
                    .await
                    .map(Some),
                None => return unimplemented_case(name),
            },

            Capability::EventListener => match plugin.as_event_listener() {
                Some(listener) => {
                    let Some(event_type) = listener.event_types().into_iter().next() else {
                        return TestCase::new(name, TestStatus::Warning, started.elapsed())
                            .with_message("listener subscribes to no event types");
                    };
                    let event = PluginEvent::new(event_type, "plugin_test_framework");
                    guard(listener.handle_event(ctx, &event)).await.map(|()| None)
                }
                None => return unimplemented_case(name),
            },
        };

        match outcome {
            Ok(Some(output)) => TestCase::passed(name, started.elapsed()).with_output(output),
            Ok(None) => TestCase::passed(name, started.elapsed()),
            Err(e) => TestCase::failed(name, started.elapsed(), e),
        }
    }

    // ========================================================================
    // 보안 / 벤치마크
    // ========================================================================

    fn security_test(&self, plugin: &dyn Plugin, info: Option<&super::info::PluginInfo>) -> TestCase {
        let started = Instant::now();

        if let Err(panic) = guard_sync(|| plugin.info()) {
            return TestCase::failed(CASE_SECURITY, started.elapsed(), format!("info() panicked: {}", panic));
        }

        if let (Some(security), Some(info)) = (&self.security, info) {
            if let Err(e) = security.validate_permissions(&info.permissions) {
                return TestCase::failed(CASE_SECURITY, started.elapsed(), e.to_string());
            }
        }

        TestCase::passed(CASE_SECURITY, started.elapsed())
    }

    /// 대표 기능 하나를 N회 호출해서 평균 지연 측정
    async fn benchmark(&self, ctx: &PluginContext, plugin: &dyn Plugin) -> (TestCase, PerformanceSummary) {
        let iterations = self.settings.benchmark_iterations.max(1);
        let threshold = Duration::from_millis(self.settings.benchmark_threshold_ms);

        let mut samples = Vec::with_capacity(iterations);
        let mut failures = 0;
        for _ in 0..iterations {
            let started = Instant::now();
            if bench_once(ctx, plugin).await.is_err() {
                failures += 1;
            }
            samples.push(started.elapsed());
        }

        let total: Duration = samples.iter().sum();
        let average = total / iterations as u32;
        let performance = PerformanceSummary {
            iterations,
            average,
            min: samples.iter().min().copied().unwrap_or_default(),
            max: samples.iter().max().copied().unwrap_or_default(),
            threshold,
        };

        let case = if failures > 0 {
            TestCase::failed(
                CASE_BENCHMARK,
                total,
                format!("{} of {} iterations failed", failures, iterations),
            )
        } else if average > threshold {
            TestCase::new(CASE_BENCHMARK, TestStatus::Warning, total).with_message(format!(
                "average {:?} exceeds threshold {:?}",
                average, threshold
            ))
        } else {
            TestCase::passed(CASE_BENCHMARK, total)
                .with_message(format!("average {:?} over {} iterations", average, iterations))
        };

        (case, performance)
    }
}

/// 벤치마크 대상 호출 (템플릿 -> 검증 -> 미들웨어 -> info 순으로 선택)
async fn bench_once(ctx: &PluginContext, plugin: &dyn Plugin) -> std::result::Result<(), String> {
    if let Some(processor) = plugin.as_template_processor() {
        let data = HashMap::from([("name".to_string(), json!("World"))]);
        return guard(processor.process_template(ctx, TEMPLATE_INPUT, &data)).await.map(|_| ());
    }
    if let Some(validator) = plugin.as_validator() {
        return guard(validator.validate(ctx, &sample_api())).await.map(|_| ());
    }
    if let Some(middleware) = plugin.as_middleware() {
        return guard(middleware.process(ctx, json!({}))).await.map(|_| ());
    }
    guard_sync(|| plugin.info()).map(|_| ())
}

fn unimplemented_case(name: String) -> TestCase {
    TestCase::failed(name, Duration::ZERO, "capability accessor returned nothing")
}

// ============================================================================
// 패닉 가드
// ============================================================================

/// 플러그인 호출의 에러/패닉을 메시지로 변환
async fn guard<T, F>(future: F) -> std::result::Result<T, String>
where
    F: Future<Output = Result<T>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(panic) => Err(format!("panicked: {}", panic_message(panic.as_ref()))),
    }
}

fn guard_sync<T>(f: impl FnOnce() -> T) -> std::result::Result<T, String> {
    std::panic::catch_unwind(AssertUnwindSafe(f)).map_err(|panic| panic_message(panic.as_ref()))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::builtin::{builtin_loader, TEMPLATE_PROCESSOR_ID, VALIDATOR_ID};
    use crate::plugin::capability::Middleware;
    use crate::plugin::info::{Permission, PluginInfo};
    use crate::plugin::loader::StaticModuleLoader;
    use async_trait::async_trait;
    use plugrt_foundation::Error;

    fn framework(settings: TestingSettings) -> PluginTestFramework {
        let loader = PluginLoader::empty().with_backend(Arc::new(builtin_loader()));
        PluginTestFramework::new(Arc::new(loader), settings)
    }

    #[tokio::test]
    async fn test_template_processor_suite() {
        let result = framework(TestingSettings::default())
            .test_plugin(
                &PluginContext::new(),
                &StaticModuleLoader::path_for(TEMPLATE_PROCESSOR_ID),
            )
            .await
            .unwrap();

        assert!(result.passed);
        let case = result
            .case(&capability_case(Capability::TemplateProcessor))
            .unwrap();
        assert_eq!(case.status, TestStatus::Passed);
        assert_eq!(
            case.output,
            Some(json!("// Generated by Example Template Processor\nHello World!"))
        );
        assert_eq!(result.case(CASE_SHUTDOWN).unwrap().status, TestStatus::Passed);

        let coverage = result.coverage.unwrap();
        assert_eq!(coverage.exercised, 1);
        assert_eq!(coverage.total, 10);
        assert!(result.performance.is_none());
    }

    #[tokio::test]
    async fn test_validator_suite_reports_findings() {
        let result = framework(TestingSettings::default())
            .test_plugin(&PluginContext::new(), &StaticModuleLoader::path_for(VALIDATOR_ID))
            .await
            .unwrap();

        let output = result
            .case(&capability_case(Capability::Validator))
            .and_then(|c| c.output.clone())
            .unwrap();
        assert_eq!(output["valid"], true);
        assert_eq!(output["warnings"].as_array().unwrap().len(), 1);
        assert_eq!(output["warnings"][0]["code"], "MISSING_TITLE");
    }

    #[tokio::test]
    async fn test_load_failure_is_error() {
        let err = framework(TestingSettings::default())
            .test_plugin(&PluginContext::new(), "builtin:missing")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PluginLoad(_)));
    }

    /// 느리고 초기화에 실패할 수 있는 미들웨어
    struct SlowMiddleware {
        fail_init: bool,
        permissions: Vec<Permission>,
    }

    #[async_trait]
    impl Middleware for SlowMiddleware {
        async fn process(&self, _ctx: &PluginContext, payload: Value) -> Result<Value> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(payload)
        }
    }

    #[async_trait]
    impl Plugin for SlowMiddleware {
        fn info(&self) -> PluginInfo {
            let mut info = PluginInfo::new("test.slow", "Slow", "0.1.0");
            for permission in &self.permissions {
                info = info.with_permission(*permission);
            }
            info
        }

        fn capabilities(&self) -> Vec<Capability> {
            vec![Capability::Middleware, Capability::Generator]
        }

        async fn initialize(&self, _ctx: &PluginContext, _config: Option<&Value>) -> Result<()> {
            if self.fail_init {
                return Err(Error::Plugin("no config".into()));
            }
            Ok(())
        }

        fn as_middleware(&self) -> Option<&dyn Middleware> {
            Some(self)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[tokio::test]
    async fn test_benchmark_over_threshold_is_warning() {
        let settings = TestingSettings {
            benchmark: true,
            benchmark_iterations: 3,
            benchmark_threshold_ms: 1,
        };
        let plugin = SlowMiddleware {
            fail_init: false,
            permissions: Vec::new(),
        };
        let result = framework(settings).run_suite(&PluginContext::new(), &plugin).await;

        let bench = result.case(CASE_BENCHMARK).unwrap();
        assert_eq!(bench.status, TestStatus::Warning);
        assert!(result.passed);
        assert_eq!(result.performance.as_ref().unwrap().iterations, 3);

        // Generator는 선언만 하고 구현하지 않음
        assert_eq!(
            result.case(&capability_case(Capability::Generator)).unwrap().status,
            TestStatus::Warning
        );
    }

    #[tokio::test]
    async fn test_init_failure_skips_capabilities_but_shuts_down() {
        let plugin = SlowMiddleware {
            fail_init: true,
            permissions: Vec::new(),
        };
        let result = framework(TestingSettings::default())
            .run_suite(&PluginContext::new(), &plugin)
            .await;

        assert!(!result.passed);
        assert_eq!(result.case(CASE_INITIALIZE).unwrap().status, TestStatus::Failed);
        assert_eq!(
            result.case(&capability_case(Capability::Middleware)).unwrap().status,
            TestStatus::Skipped
        );
        assert_eq!(result.case(CASE_SHUTDOWN).unwrap().status, TestStatus::Passed);
        assert_eq!(result.coverage.unwrap().exercised, 0);
    }

    #[tokio::test]
    async fn test_security_checks_permission_policy() {
        let plugin = SlowMiddleware {
            fail_init: false,
            permissions: vec![Permission::Execute],
        };
        let security = SecurityManager::new().with_allowed_permissions(vec![Permission::Network]);
        let result = framework(TestingSettings::default())
            .with_security(Arc::new(security))
            .run_suite(&PluginContext::new(), &plugin)
            .await;

        assert_eq!(result.case(CASE_SECURITY).unwrap().status, TestStatus::Failed);
    }

    struct PanickingPlugin;

    #[async_trait]
    impl Plugin for PanickingPlugin {
        fn info(&self) -> PluginInfo {
            panic!("info exploded")
        }

        fn capabilities(&self) -> Vec<Capability> {
            vec![Capability::Integration]
        }

        async fn initialize(&self, _ctx: &PluginContext, _config: Option<&Value>) -> Result<()> {
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[tokio::test]
    async fn test_panicking_info_is_reported() {
        let result = framework(TestingSettings::default())
            .run_suite(&PluginContext::new(), &PanickingPlugin)
            .await;

        assert!(!result.passed);
        let security = result.case(CASE_SECURITY).unwrap();
        assert_eq!(security.status, TestStatus::Failed);
        assert!(security.error.as_deref().unwrap().contains("info exploded"));
    }
}
