//! Example Validator - OpenAPI 문서 기본 검사

use crate::plugin::capability::Validator;
use crate::plugin::info::{PluginConfig, PluginInfo};
use crate::plugin::traits::{Capability, Plugin, PluginContext};
use crate::plugin::types::{ParsedApi, Severity, ValidationFinding, ValidationResult, ValidationRule};
use async_trait::async_trait;
use plugrt_foundation::{Error, Result};
use serde_json::{json, Value};
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};

pub const VALIDATOR_ID: &str = "example.validator";

pub const MISSING_TITLE: &str = "MISSING_TITLE";
pub const MISSING_VERSION: &str = "MISSING_VERSION";
pub const MISSING_PATHS: &str = "MISSING_PATHS";
pub const EMPTY_PATHS: &str = "EMPTY_PATHS";

/// 예제 검증기
///
/// `strict`가 true면 제목 누락을 에러로 취급합니다.
#[derive(Default)]
pub struct ExampleValidator {
    strict: AtomicBool,
}

impl ExampleValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_strict(&self) -> bool {
        self.strict.load(Ordering::SeqCst)
    }

    fn check(&self, document: &Value) -> ValidationResult {
        let mut result = ValidationResult::new();

        let title = document.pointer("/info/title").and_then(Value::as_str);
        if title.map_or(true, |t| t.trim().is_empty()) {
            let message = "API title is missing";
            let finding = if self.is_strict() {
                ValidationFinding::error(MISSING_TITLE, message)
            } else {
                ValidationFinding::warning(MISSING_TITLE, message)
            };
            result.push(
                finding
                    .with_path("info.title")
                    .with_suggestion("Add a title under info.title"),
            );
        }

        if document.pointer("/info/version").and_then(Value::as_str).is_none() {
            result.push(
                ValidationFinding::warning(MISSING_VERSION, "API version is missing")
                    .with_path("info.version"),
            );
        }

        match document.get("paths") {
            Some(Value::Object(paths)) if paths.is_empty() => {
                result.push(ValidationFinding::info(EMPTY_PATHS, "API defines no paths").with_path("paths"));
            }
            Some(Value::Object(_)) => {}
            _ => {
                result.push(
                    ValidationFinding::info(MISSING_PATHS, "API has no paths object")
                        .with_path("paths"),
                );
            }
        }

        result
    }
}

#[async_trait]
impl Plugin for ExampleValidator {
    fn info(&self) -> PluginInfo {
        PluginInfo::new(VALIDATOR_ID, "Example Validator", "1.0.0")
            .with_description("Checks an API document for title, version and paths")
            .with_author("plugrt")
            .with_license("MIT")
            .with_tag("validation")
            .with_tag("example")
            .with_config(
                PluginConfig::new(json!({
                    "type": "object",
                    "properties": {
                        "strict": { "type": "boolean" }
                    }
                }))
                .with_default(json!({ "strict": false })),
            )
    }

    fn capabilities(&self) -> Vec<Capability> {
        vec![Capability::Validator]
    }

    async fn initialize(&self, _ctx: &PluginContext, config: Option<&Value>) -> Result<()> {
        let strict = match config.and_then(|c| c.get("strict")) {
            None | Some(Value::Null) => false,
            Some(Value::Bool(strict)) => *strict,
            Some(other) => {
                return Err(Error::Config(format!(
                    "strict must be a boolean, got {}",
                    other
                )))
            }
        };
        self.strict.store(strict, Ordering::SeqCst);
        Ok(())
    }

    fn as_validator(&self) -> Option<&dyn Validator> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[async_trait]
impl Validator for ExampleValidator {
    async fn validate(&self, ctx: &PluginContext, api: &ParsedApi) -> Result<ValidationResult> {
        ctx.check_cancelled()?;
        Ok(self.check(api.document()))
    }

    fn rules(&self) -> Vec<ValidationRule> {
        let title_severity = if self.is_strict() {
            Severity::High
        } else {
            Severity::Medium
        };
        vec![
            ValidationRule {
                code: MISSING_TITLE.to_string(),
                description: "info.title must be present".to_string(),
                severity: title_severity,
            },
            ValidationRule {
                code: MISSING_VERSION.to_string(),
                description: "info.version must be present".to_string(),
                severity: Severity::Medium,
            },
            ValidationRule {
                code: MISSING_PATHS.to_string(),
                description: "paths should be an object".to_string(),
                severity: Severity::Low,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(document: Value) -> ParsedApi {
        ParsedApi::new(document)
    }

    #[tokio::test]
    async fn test_missing_title_is_warning() {
        let validator = ExampleValidator::new();
        let ctx = PluginContext::new();
        validator.initialize(&ctx, None).await.unwrap();

        let result = validator
            .validate(
                &ctx,
                &api(json!({"openapi": "3.0.0", "info": {"version": "1.0.0"}, "paths": {}})),
            )
            .await
            .unwrap();

        assert!(result.valid);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].code, MISSING_TITLE);
        assert!(result.has_code(EMPTY_PATHS));
    }

    #[tokio::test]
    async fn test_strict_mode_fails() {
        let validator = ExampleValidator::new();
        let ctx = PluginContext::new();
        validator
            .initialize(&ctx, Some(&json!({"strict": true})))
            .await
            .unwrap();

        let result = validator
            .validate(&ctx, &api(json!({"info": {"version": "1.0.0"}})))
            .await
            .unwrap();

        assert!(!result.valid);
        assert_eq!(result.errors[0].code, MISSING_TITLE);
        assert!(result.has_code(MISSING_PATHS));
    }

    #[tokio::test]
    async fn test_complete_document() {
        let validator = ExampleValidator::new();
        let result = validator
            .validate(
                &PluginContext::new(),
                &api(json!({
                    "info": {"title": "Pets", "version": "1.0.0"},
                    "paths": {"/pets": {}}
                })),
            )
            .await
            .unwrap();

        assert!(result.valid);
        assert_eq!(result.findings().count(), 0);
    }

    #[tokio::test]
    async fn test_rejects_bad_strict_value() {
        let validator = ExampleValidator::new();
        assert!(validator
            .initialize(&PluginContext::new(), Some(&json!({"strict": "yes"})))
            .await
            .is_err());
    }
}
