use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A load test definition owned by the user in `created_by`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressTest {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub test_type: String,
    pub status: String,
    pub scenarios: Vec<StressTestScenario>,
    pub configuration: StressTestConfig,
    pub concurrent_users: i32,
    pub duration_seconds: i32,
    pub ramp_up_time: i32,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl StressTest {
    /// Pending test with a single user and no scenarios
    pub fn new(name: impl Into<String>, test_type: impl Into<String>, created_by: i64) -> Self {
        Self {
            id: 0,
            name: name.into(),
            description: None,
            test_type: test_type.into(),
            status: "pending".to_string(),
            scenarios: Vec::new(),
            configuration: StressTestConfig::default(),
            concurrent_users: 1,
            duration_seconds: 60,
            ramp_up_time: 0,
            created_by,
            created_at: DateTime::<Utc>::default(),
            started_at: None,
            completed_at: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StressTestScenario {
    pub name: String,
    pub description: String,
    pub actions: Vec<StressTestAction>,
    pub url: String,
    pub method: String,
    pub weight: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StressTestAction {
    #[serde(rename = "type")]
    pub action_type: String,
    pub target: String,
    pub params: HashMap<String, Value>,
    pub delay: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StressTestConfig {
    pub timeout: i32,
    pub retry_count: i32,
    pub enable_metrics: bool,
    pub enable_logging: bool,
}

/// One run of a stress test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressTestExecution {
    pub id: i64,
    pub stress_test_id: i64,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub results: StressTestExecutionResults,
    pub metrics: HashMap<String, Value>,
    pub error_message: Option<String>,
}

impl StressTestExecution {
    /// Running execution started now
    pub fn start(stress_test_id: i64) -> Self {
        Self {
            id: 0,
            stress_test_id,
            status: "running".to_string(),
            started_at: Utc::now(),
            completed_at: None,
            results: StressTestExecutionResults::default(),
            metrics: HashMap::new(),
            error_message: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StressTestExecutionResults {
    pub total_requests: i64,
    pub successful_requests: i64,
    pub failed_requests: i64,
    pub average_response_time: f64,
    pub min_response_time: f64,
    pub max_response_time: f64,
    pub error_rate: f64,
    pub throughput: f64,
    pub metrics: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressTestStatistics {
    pub total_tests: i64,
    pub total_executions: i64,
    pub tests_by_status: HashMap<String, i64>,
    /// Seconds, averaged over finished executions
    pub avg_execution_duration: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_tolerates_missing_fields() {
        let scenario: StressTestScenario =
            serde_json::from_str(r#"{"name":"browse","url":"/api/media","weight":3}"#).unwrap();
        assert_eq!(scenario.name, "browse");
        assert_eq!(scenario.weight, 3);
        assert!(scenario.actions.is_empty());
        assert!(scenario.request_body.is_none());
    }

    #[test]
    fn action_type_uses_wire_name() {
        let action = StressTestAction {
            action_type: "http".to_string(),
            target: "/health".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "http");
    }
}
