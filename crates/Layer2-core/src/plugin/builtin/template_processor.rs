//! Example Template Processor - `{{name}}` / `{{.name}}` 치환 + 헤더 주석

use crate::plugin::capability::TemplateProcessor;
use crate::plugin::info::{PluginConfig, PluginInfo};
use crate::plugin::traits::{Capability, Plugin, PluginContext};
use async_trait::async_trait;
use parking_lot::RwLock;
use plugrt_foundation::{Error, Result};
use regex::{Captures, Regex};
use serde_json::{json, Value};
use std::any::Any;
use std::collections::HashMap;
use std::sync::OnceLock;

pub const TEMPLATE_PROCESSOR_ID: &str = "example.template-processor";

const DEFAULT_PREFIX: &str = "Generated";

fn placeholder() -> Option<&'static Regex> {
    static PLACEHOLDER: OnceLock<Option<Regex>> = OnceLock::new();
    PLACEHOLDER
        .get_or_init(|| Regex::new(r"\{\{\s*\.?([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").ok())
        .as_ref()
}

/// 예제 템플릿 처리기
///
/// 출력 첫 줄에 `// {prefix} by {name}` 헤더를 붙입니다.
pub struct ExampleTemplateProcessor {
    prefix: RwLock<String>,
}

impl Default for ExampleTemplateProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ExampleTemplateProcessor {
    pub fn new() -> Self {
        Self {
            prefix: RwLock::new(DEFAULT_PREFIX.to_string()),
        }
    }

    pub fn prefix(&self) -> String {
        self.prefix.read().clone()
    }

    /// 플레이스홀더 치환 (없는 키는 빈 문자열)
    pub fn render(template: &str, data: &HashMap<String, Value>) -> String {
        let Some(placeholder) = placeholder() else {
            return template.to_string();
        };
        placeholder
            .replace_all(template, |caps: &Captures<'_>| match data.get(&caps[1]) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            })
            .into_owned()
    }
}

#[async_trait]
impl Plugin for ExampleTemplateProcessor {
    fn info(&self) -> PluginInfo {
        PluginInfo::new(TEMPLATE_PROCESSOR_ID, "Example Template Processor", "1.0.0")
            .with_description("Renders {{name}} placeholders and stamps a header comment")
            .with_author("plugrt")
            .with_license("MIT")
            .with_tag("template")
            .with_tag("example")
            .with_config(
                PluginConfig::new(json!({
                    "type": "object",
                    "properties": {
                        "prefix": { "type": "string" }
                    }
                }))
                .with_default(json!({ "prefix": DEFAULT_PREFIX }))
                .with_example(json!({ "prefix": "Custom" })),
            )
    }

    fn capabilities(&self) -> Vec<Capability> {
        vec![Capability::TemplateProcessor]
    }

    async fn initialize(&self, _ctx: &PluginContext, config: Option<&Value>) -> Result<()> {
        let prefix = match config.and_then(|c| c.get("prefix")) {
            None | Some(Value::Null) => DEFAULT_PREFIX.to_string(),
            Some(Value::String(prefix)) => prefix.clone(),
            Some(other) => {
                return Err(Error::Config(format!(
                    "prefix must be a string, got {}",
                    other
                )))
            }
        };
        *self.prefix.write() = prefix;
        Ok(())
    }

    fn as_template_processor(&self) -> Option<&dyn TemplateProcessor> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[async_trait]
impl TemplateProcessor for ExampleTemplateProcessor {
    async fn process_template(
        &self,
        ctx: &PluginContext,
        template: &str,
        data: &HashMap<String, Value>,
    ) -> Result<String> {
        ctx.check_cancelled()?;
        Ok(format!(
            "// {} by Example Template Processor\n{}",
            self.prefix(),
            Self::render(template, data)
        ))
    }

    fn supported_formats(&self) -> Vec<String> {
        vec!["mustache".to_string()]
    }
}
