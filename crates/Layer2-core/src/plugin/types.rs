//! Plugin value types - 기능 인터페이스가 주고받는 값 타입
//!
//! 생성 파이프라인의 불투명 값(`ParsedApi`, `GeneratedFiles`)과
//! 검증/테스트 결과 같은 순수 값 타입을 정의합니다.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

// ============================================================================
// 생성 파이프라인 경계 값
// ============================================================================

/// 파싱된 API 문서 (불투명 값)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParsedApi(pub Value);

impl ParsedApi {
    pub fn new(document: Value) -> Self {
        Self(document)
    }

    pub fn document(&self) -> &Value {
        &self.0
    }

    /// JSON 포인터로 값 조회 (예: "/info/title")
    pub fn pointer(&self, pointer: &str) -> Option<&Value> {
        self.0.pointer(pointer)
    }
}

impl From<Value> for ParsedApi {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// 생성된 파일 집합 (경로 -> 내용)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeneratedFiles(pub BTreeMap<String, String>);

impl GeneratedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.0.insert(path.into(), content.into());
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.0.insert(path.into(), content.into());
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.0.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }
}

/// 생성기 옵션
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateOptions {
    /// 대상 언어/프레임워크
    #[serde(default)]
    pub target: String,

    /// 패키지/모듈 이름
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,

    /// 추가 옵션
    #[serde(default)]
    pub options: HashMap<String, Value>,
}

/// 출력 변환 결과
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertedOutput {
    /// 변환된 포맷
    pub format: String,

    /// 변환된 파일
    pub files: GeneratedFiles,

    /// 변환 메타데이터
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

/// UI 컴포넌트 정의
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiComponentDefinition {
    /// 컴포넌트 이름
    pub name: String,

    /// 배치 위치 (예: "sidebar", "toolbar")
    #[serde(default)]
    pub placement: String,

    /// props 스키마
    #[serde(default)]
    pub props_schema: Value,
}

// ============================================================================
// ValidationResult
// ============================================================================

/// 검증 항목 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    Error,
    Warning,
    Info,
}

/// 심각도
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// 검증 항목
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationFinding {
    /// 항목 종류
    #[serde(rename = "type")]
    pub kind: FindingKind,

    /// 메시지
    pub message: String,

    /// 문서 내 경로 (예: "info.title")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,

    /// 심각도
    pub severity: Severity,

    /// 기계 판독용 코드 (예: "MISSING_TITLE")
    pub code: String,

    /// 수정 제안
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,

    /// 추가 컨텍스트
    #[serde(default)]
    pub context: HashMap<String, Value>,
}

impl ValidationFinding {
    pub fn new(kind: FindingKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        let severity = match kind {
            FindingKind::Error => Severity::High,
            FindingKind::Warning => Severity::Medium,
            FindingKind::Info => Severity::Low,
        };
        Self {
            kind,
            message: message.into(),
            path: None,
            line: None,
            column: None,
            severity,
            code: code.into(),
            suggestion: None,
            context: HashMap::new(),
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FindingKind::Error, code, message)
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FindingKind::Warning, code, message)
    }

    pub fn info(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FindingKind::Info, code, message)
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_position(mut self, line: u32, column: u32) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }
}

/// 검증 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// 최종 판정
    pub valid: bool,

    #[serde(default)]
    pub errors: Vec<ValidationFinding>,

    #[serde(default)]
    pub warnings: Vec<ValidationFinding>,

    #[serde(default)]
    pub info: Vec<ValidationFinding>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            info: Vec::new(),
        }
    }

    /// 항목 추가 (error가 추가되면 valid = false)
    pub fn push(&mut self, finding: ValidationFinding) {
        match finding.kind {
            FindingKind::Error => {
                self.valid = false;
                self.errors.push(finding);
            }
            FindingKind::Warning => self.warnings.push(finding),
            FindingKind::Info => self.info.push(finding),
        }
    }

    /// 모든 항목 (errors -> warnings -> info 순)
    pub fn findings(&self) -> impl Iterator<Item = &ValidationFinding> {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .chain(self.info.iter())
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.findings().any(|f| f.code == code)
    }
}

/// 검증 규칙 설명
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    pub code: String,
    pub description: String,
    pub severity: Severity,
}

// ============================================================================
// TestResult
// ============================================================================

/// 테스트 케이스 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
    Warning,
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// 테스트 케이스
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub name: String,

    pub status: TestStatus,

    /// 소요 시간
    #[serde(with = "duration_millis")]
    pub duration: Duration,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// 테스트가 관찰한 출력 (예: 검증 결과)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

impl TestCase {
    pub fn new(name: impl Into<String>, status: TestStatus, duration: Duration) -> Self {
        Self {
            name: name.into(),
            status,
            duration,
            message: None,
            error: None,
            output: None,
        }
    }

    pub fn passed(name: impl Into<String>, duration: Duration) -> Self {
        Self::new(name, TestStatus::Passed, duration)
    }

    pub fn failed(name: impl Into<String>, duration: Duration, error: impl Into<String>) -> Self {
        let mut case = Self::new(name, TestStatus::Failed, duration);
        case.error = Some(error.into());
        case
    }

    pub fn skipped(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, TestStatus::Skipped, Duration::ZERO).with_message(message)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_output(mut self, output: Value) -> Self {
        self.output = Some(output);
        self
    }
}

/// 커버리지 요약 (근사치)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageSummary {
    pub exercised: usize,
    pub total: usize,
    pub ratio: f64,
}

impl CoverageSummary {
    pub fn new(exercised: usize, total: usize) -> Self {
        let ratio = if total == 0 {
            0.0
        } else {
            exercised as f64 / total as f64
        };
        Self {
            exercised,
            total,
            ratio,
        }
    }
}

/// 성능 요약
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSummary {
    pub iterations: usize,

    #[serde(with = "duration_millis")]
    pub average: Duration,

    #[serde(with = "duration_millis")]
    pub min: Duration,

    #[serde(with = "duration_millis")]
    pub max: Duration,

    #[serde(with = "duration_millis")]
    pub threshold: Duration,
}

/// 테스트 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// 최종 판정 (failed 케이스가 없으면 true)
    pub passed: bool,

    pub test_cases: Vec<TestCase>,

    #[serde(with = "duration_millis")]
    pub duration: Duration,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoverageSummary>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<PerformanceSummary>,
}

impl Default for TestResult {
    fn default() -> Self {
        Self {
            passed: true,
            test_cases: Vec::new(),
            duration: Duration::ZERO,
            coverage: None,
            performance: None,
        }
    }
}

impl TestResult {
    pub fn push(&mut self, case: TestCase) {
        if case.status == TestStatus::Failed {
            self.passed = false;
        }
        self.test_cases.push(case);
    }

    pub fn case(&self, name: &str) -> Option<&TestCase> {
        self.test_cases.iter().find(|c| c.name == name)
    }

    pub fn count(&self, status: TestStatus) -> usize {
        self.test_cases.iter().filter(|c| c.status == status).count()
    }
}

/// `Duration` <-> 밀리초(f64) 직렬화
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(millis.max(0.0) / 1000.0))
    }
}
