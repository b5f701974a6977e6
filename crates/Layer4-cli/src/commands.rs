//! Subcommand handlers
//!
//! 모든 명령은 `PluginService`를 거쳐 실행됩니다.

use crate::Command;
use anyhow::Context;
use plugrt_core::plugin::marketplace::MarketplacePlugin;
use plugrt_core::plugin::{PluginInstanceView, PluginService, TestResult, TestStatus, BUILTIN_PREFIX};
use plugrt_foundation::{Error, RuntimeConfig};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// 출력 형식
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
}

impl Output {
    fn emit<T: Serialize>(&self, value: &T, summary: impl FnOnce(&T)) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            summary(value);
        }
        Ok(())
    }
}

pub async fn run(command: Command, config: &RuntimeConfig, output: Output) -> anyhow::Result<()> {
    let service = PluginService::from_config(config).context("failed to build plugin service")?;

    let result = dispatch(&service, command, output).await;
    if let Err(e) = service.shutdown().await {
        tracing::warn!("Shutdown failed: {}", e);
    }
    result
}

async fn dispatch(service: &PluginService, command: Command, output: Output) -> anyhow::Result<()> {
    match command {
        Command::List => {
            service.initialize().await?;
            let plugins = service.list_plugins().await;
            output.emit(&plugins, |plugins| {
                if plugins.is_empty() {
                    println!("No plugins found.");
                }
                for plugin in plugins {
                    print_instance(plugin);
                }
            })
        }

        Command::Load { path } => {
            let view = service.load_plugin(&path).await?;
            output.emit(&view, print_instance)
        }

        Command::Test { path } => {
            let result = service.test_plugin(&path).await?;
            output.emit(&result, print_test_result)?;
            if !result.passed {
                anyhow::bail!("plugin failed conformance tests");
            }
            Ok(())
        }

        Command::Validate { id, file } => {
            ensure_loaded(service, &id).await?;
            let document = read_json(&file)?;
            let result = service.execute_validator(&id, &document).await?;
            output.emit(&result, |result| {
                println!("valid: {}", result.valid);
                for finding in result.findings() {
                    println!(
                        "  [{:?}] {} {}{}",
                        finding.kind,
                        finding.code,
                        finding.message,
                        finding
                            .path
                            .as_deref()
                            .map(|p| format!(" ({})", p))
                            .unwrap_or_default()
                    );
                }
            })?;
            if !result.valid {
                anyhow::bail!("validation failed");
            }
            Ok(())
        }

        Command::Render { id, template, vars } => {
            ensure_loaded(service, &id).await?;
            let data = parse_vars(&vars)?;
            let rendered = service
                .execute_template_processor(&id, &template, &data)
                .await?;
            output.emit(&rendered, |rendered| println!("{}", rendered))
        }

        Command::Search {
            query,
            category,
            tags,
            limit,
        } => {
            let response = service
                .search_plugins(&query, category.as_deref(), tags, limit)
                .await?;
            output.emit(&response, |response| {
                println!("{} result(s)", response.total);
                for plugin in &response.plugins {
                    print_listing(plugin);
                }
            })
        }

        Command::Info { id } => {
            let plugin = service.get_marketplace_plugin(&id).await?;
            output.emit(&plugin, |plugin| {
                print_listing(plugin);
                if !plugin.info.description.is_empty() {
                    println!("  {}", plugin.info.description);
                }
                if !plugin.download_url.is_empty() {
                    println!("  download: {}", plugin.download_url);
                }
            })
        }

        Command::Featured { limit } => {
            let plugins = service.get_featured_plugins(limit).await?;
            output.emit(&plugins, |plugins| {
                for plugin in plugins {
                    print_listing(plugin);
                }
            })
        }

        Command::Categories => {
            let categories = service.get_categories().await?;
            output.emit(&categories, |categories| {
                for category in categories {
                    println!("{:<20} {:>5}  {}", category.id, category.plugin_count, category.name);
                }
            })
        }

        Command::Install { id } => {
            let view = service.install_plugin(&id).await?;
            output.emit(&view, |view| {
                println!("✓ Installed");
                print_instance(view);
            })
        }

        Command::Updates => {
            service.initialize().await?;
            let updates = service.check_for_updates().await?;
            output.emit(&updates, |updates| {
                if updates.is_empty() {
                    println!("All plugins are up to date.");
                }
                let mut ids: Vec<_> = updates.keys().collect();
                ids.sort();
                for id in ids {
                    let update = &updates[id];
                    println!("{}: {} -> {}", id, update.current_version, update.latest_version);
                }
            })
        }
    }
}

/// 로드되지 않았으면 플러그인 디렉토리 -> 내장 모듈 순으로 찾음
async fn ensure_loaded(service: &PluginService, id: &str) -> anyhow::Result<()> {
    if service.get_plugin(id).await.is_ok() {
        return Ok(());
    }
    service.initialize().await?;
    match service.get_plugin(id).await {
        Ok(_) => Ok(()),
        Err(Error::NotFound(_)) => {
            service
                .load_plugin(&format!("{}{}", BUILTIN_PREFIX, id))
                .await
                .with_context(|| format!("plugin {} is not installed", id))?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("{} is not valid JSON", path.display()))
}

/// `key=value` 목록 -> 템플릿 데이터 (값이 JSON이면 JSON으로 해석)
fn parse_vars(vars: &[String]) -> anyhow::Result<HashMap<String, Value>> {
    vars.iter()
        .map(|pair| -> anyhow::Result<(String, Value)> {
            let (key, raw) = pair
                .split_once('=')
                .with_context(|| format!("expected key=value, got {:?}", pair))?;
            let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
            Ok((key.trim().to_string(), value))
        })
        .collect()
}

fn print_instance(view: &PluginInstanceView) {
    let capabilities: Vec<_> = view.capabilities.iter().map(|c| c.to_string()).collect();
    println!(
        "{} v{} [{}] {}",
        view.info.id,
        view.info.version,
        view.status,
        capabilities.join(", ")
    );
    if let Some(error) = &view.last_error {
        println!("  error: {}", error);
    }
}

fn print_listing(plugin: &MarketplacePlugin) {
    let badge = if plugin.verified { " ✓" } else { "" };
    println!(
        "{} v{}{}  {} ({:.1}★, {} downloads)",
        plugin.id(),
        plugin.info.version,
        badge,
        plugin.info.name,
        plugin.stats.rating,
        plugin.stats.downloads
    );
}

fn print_test_result(result: &TestResult) {
    for case in &result.test_cases {
        let mark = match case.status {
            TestStatus::Passed => "✓",
            TestStatus::Failed => "✗",
            TestStatus::Skipped => "-",
            TestStatus::Warning => "!",
        };
        let detail = case
            .error
            .as_deref()
            .or(case.message.as_deref())
            .map(|d| format!(": {}", d))
            .unwrap_or_default();
        println!("{} {} ({} ms){}", mark, case.name, case.duration.as_millis(), detail);
    }
    if let Some(coverage) = &result.coverage {
        println!("coverage: {}/{} capabilities", coverage.exercised, coverage.total);
    }
    println!(
        "{} in {} ms",
        if result.passed { "PASSED" } else { "FAILED" },
        result.duration.as_millis()
    );
}
