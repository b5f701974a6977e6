//! Plugin Info - 플러그인 식별 정보 및 메타데이터 정의

use plugrt_foundation::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

// ============================================================================
// Permission - 선언적 권한
// ============================================================================

/// 플러그인이 선언하는 권한
///
/// 선언적 메타데이터일 뿐 실제 격리를 강제하지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "filesystem:read")]
    FileSystemRead,

    #[serde(rename = "filesystem:write")]
    FileSystemWrite,

    #[serde(rename = "network")]
    Network,

    #[serde(rename = "execute")]
    Execute,

    #[serde(rename = "environment")]
    Environment,

    #[serde(rename = "ui")]
    UserInterface,
}

impl Permission {
    /// 알려진 모든 권한
    pub const ALL: [Permission; 6] = [
        Permission::FileSystemRead,
        Permission::FileSystemWrite,
        Permission::Network,
        Permission::Execute,
        Permission::Environment,
        Permission::UserInterface,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileSystemRead => "filesystem:read",
            Self::FileSystemWrite => "filesystem:write",
            Self::Network => "network",
            Self::Execute => "execute",
            Self::Environment => "environment",
            Self::UserInterface => "ui",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Permission::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| Error::Validation(format!("unknown permission: {}", s)))
    }
}

// ============================================================================
// PluginDependency
// ============================================================================

/// 플러그인 의존성
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDependency {
    /// 의존하는 플러그인 ID
    pub id: String,

    /// 버전 요구사항 (semver requirement, 예: ">=1.0.0")
    #[serde(default = "default_version_req")]
    pub version: String,

    /// 선택적 의존성 여부
    #[serde(default)]
    pub optional: bool,
}

fn default_version_req() -> String {
    "*".to_string()
}

impl PluginDependency {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            optional: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// 설치된 버전이 요구사항을 만족하는지 확인
    pub fn is_satisfied_by(&self, version: &str) -> bool {
        match (
            semver::VersionReq::parse(&self.version),
            semver::Version::parse(version),
        ) {
            (Ok(req), Ok(v)) => req.matches(&v),
            // semver가 아니면 문자열 비교로 대체
            _ => self.version == "*" || self.version == version,
        }
    }
}

// ============================================================================
// PluginConfig - 설정 스키마
// ============================================================================

/// 플러그인 설정 선언 (JSON 스키마 + 기본값)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginConfig {
    /// JSON 스키마
    #[serde(default)]
    pub schema: Value,

    /// 기본 설정
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// 필수 필드
    #[serde(default)]
    pub required: Vec<String>,

    /// 설정 예시
    #[serde(default)]
    pub examples: Vec<Value>,
}

impl PluginConfig {
    pub fn new(schema: Value) -> Self {
        Self {
            schema,
            ..Default::default()
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_required(mut self, field: impl Into<String>) -> Self {
        self.required.push(field.into());
        self
    }

    pub fn with_example(mut self, example: Value) -> Self {
        self.examples.push(example);
        self
    }

    /// 설정 값 검증 (필수 필드 + 프로퍼티 기본 타입)
    ///
    /// 완전한 JSON Schema 검증기는 아닙니다. `required`와 `properties.*.type`만 확인합니다.
    pub fn validate(&self, config: &Value) -> Result<()> {
        let object = match config {
            Value::Object(map) => map,
            Value::Null => {
                return match self.all_required().first() {
                    Some(field) => Err(Error::Config(format!(
                        "missing required config field: {}",
                        field
                    ))),
                    None => Ok(()),
                };
            }
            other => {
                return Err(Error::Config(format!(
                    "config must be a JSON object, got {}",
                    json_type_name(other)
                )))
            }
        };

        for field in self.all_required() {
            if !object.contains_key(&field) {
                return Err(Error::Config(format!(
                    "missing required config field: {}",
                    field
                )));
            }
        }

        if let Some(properties) = self.schema.get("properties").and_then(Value::as_object) {
            for (name, property) in properties {
                let Some(value) = object.get(name) else {
                    continue;
                };
                let Some(expected) = property.get("type") else {
                    continue;
                };
                if !type_matches(expected, value) {
                    return Err(Error::Config(format!(
                        "config field '{}' must be {}, got {}",
                        name,
                        expected,
                        json_type_name(value)
                    )));
                }
            }
        }

        Ok(())
    }

    /// `required` + `schema.required` 합집합
    fn all_required(&self) -> Vec<String> {
        let mut fields = self.required.clone();
        if let Some(schema_required) = self.schema.get("required").and_then(Value::as_array) {
            for field in schema_required.iter().filter_map(Value::as_str) {
                if !fields.iter().any(|f| f == field) {
                    fields.push(field.to_string());
                }
            }
        }
        fields
    }
}

fn type_matches(expected: &Value, value: &Value) -> bool {
    match expected {
        Value::String(name) => single_type_matches(name, value),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .any(|name| single_type_matches(name, value)),
        _ => true,
    }
}

fn single_type_matches(name: &str, value: &Value) -> bool {
    match name {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// PluginInfo - 플러그인 식별/메타데이터
// ============================================================================

/// 플러그인 정보
///
/// 플러그인 작성자가 소유하며, 로드된 이후에는 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginInfo {
    /// 고유 플러그인 ID (예: "example.validator")
    pub id: String,

    /// 표시 이름
    pub name: String,

    /// 버전 (semver 문자열)
    pub version: String,

    /// 설명
    #[serde(default)]
    pub description: String,

    /// 작성자
    #[serde(default)]
    pub author: String,

    /// 라이선스
    #[serde(default)]
    pub license: String,

    /// 태그
    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// 최소 호환 호스트 버전
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_host_version: Option<String>,

    /// 최대 호환 호스트 버전
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_host_version: Option<String>,

    /// 선언된 권한
    #[serde(default)]
    pub permissions: BTreeSet<Permission>,

    /// 의존성 목록
    #[serde(default)]
    pub dependencies: Vec<PluginDependency>,

    /// 추가 메타데이터
    #[serde(default)]
    pub metadata: HashMap<String, Value>,

    /// 설정 스키마
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<PluginConfig>,
}

impl PluginInfo {
    /// 새 정보 생성
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            description: String::new(),
            author: String::new(),
            license: String::new(),
            tags: BTreeSet::new(),
            min_host_version: None,
            max_host_version: None,
            permissions: BTreeSet::new(),
            dependencies: Vec::new(),
            metadata: HashMap::new(),
            config: None,
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_license(mut self, license: impl Into<String>) -> Self {
        self.license = license.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.insert(permission);
        self
    }

    pub fn with_dependency(mut self, dep: PluginDependency) -> Self {
        self.dependencies.push(dep);
        self
    }

    pub fn with_host_range(mut self, min: Option<&str>, max: Option<&str>) -> Self {
        self.min_host_version = min.map(String::from);
        self.max_host_version = max.map(String::from);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_config(mut self, config: PluginConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// id/name/version이 비어있지 않은지 확인
    pub fn validate_identity(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::Validation("plugin id must not be empty".into()));
        }
        if self.name.trim().is_empty() {
            return Err(Error::Validation(format!(
                "plugin {} has an empty name",
                self.id
            )));
        }
        if self.version.trim().is_empty() {
            return Err(Error::Validation(format!(
                "plugin {} has an empty version",
                self.id
            )));
        }
        Ok(())
    }

    /// 호스트 버전 호환성 확인
    pub fn is_compatible_with_host(&self, host_version: &str) -> Result<bool> {
        let host = semver::Version::parse(host_version)
            .map_err(|e| Error::Internal(format!("invalid host version {}: {}", host_version, e)))?;

        if let Some(min) = &self.min_host_version {
            let min = semver::Version::parse(min).map_err(|e| {
                Error::Validation(format!("invalid minHostVersion {}: {}", min, e))
            })?;
            if host < min {
                return Ok(false);
            }
        }

        if let Some(max) = &self.max_host_version {
            let max = semver::Version::parse(max).map_err(|e| {
                Error::Validation(format!("invalid maxHostVersion {}: {}", max, e))
            })?;
            if host > max {
                return Ok(false);
            }
        }

        Ok(true)
    }
}
