use prodgap_adapters::AdaptersConfig;
use prodgap_common::types::{
    ConnectionType, EquipmentDetails, EquipmentStatus, EquipmentType, NetworkType, Severity,
    ThresholdScope,
};
use prodgap_common::types::{Asset, Facility, Hub, Well};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Allowed CORS origins; empty allows any origin.
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
    #[serde(default)]
    pub flow_trace: FlowTraceConfig,
    #[serde(default)]
    pub evaluator: EvaluatorConfig,
    #[serde(default)]
    pub adapters: AdaptersConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            data_dir: default_data_dir(),
            cors_allowed_origins: Vec::new(),
            flow_trace: FlowTraceConfig::default(),
            evaluator: EvaluatorConfig::default(),
            adapters: AdaptersConfig::default(),
        }
    }
}

fn default_http_port() -> u16 {
    8000
}

fn default_data_dir() -> String {
    "data".to_string()
}

/// `[flow_trace]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowTraceConfig {
    /// Depth used when a request does not give one.
    #[serde(default = "default_trace_depth")]
    pub default_depth: i64,
    /// Requests asking for more are rejected.
    #[serde(default = "default_trace_depth_limit")]
    pub depth_limit: i64,
}

impl Default for FlowTraceConfig {
    fn default() -> Self {
        Self {
            default_depth: default_trace_depth(),
            depth_limit: default_trace_depth_limit(),
        }
    }
}

fn default_trace_depth() -> i64 {
    10
}

fn default_trace_depth_limit() -> i64 {
    50
}

/// `[evaluator]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    /// Resolve the open alert when its threshold clears.
    #[serde(default = "default_auto_resolve")]
    pub auto_resolve: bool,
    /// Recorded as `resolved_by` on automatically resolved alerts.
    #[serde(default = "default_resolver")]
    pub resolver: String,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            auto_resolve: default_auto_resolve(),
            resolver: default_resolver(),
        }
    }
}

fn default_auto_resolve() -> bool {
    true
}

fn default_resolver() -> String {
    "system".to_string()
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.flow_trace.default_depth < 0 || self.flow_trace.depth_limit < 0 {
            anyhow::bail!("flow_trace depths must not be negative");
        }
        if self.flow_trace.default_depth > self.flow_trace.depth_limit {
            anyhow::bail!(
                "flow_trace.default_depth ({}) exceeds flow_trace.depth_limit ({})",
                self.flow_trace.default_depth,
                self.flow_trace.depth_limit
            );
        }
        Ok(())
    }
}

// ---- Seed file types (used by `init-network` CLI subcommand) ----

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkSeedFile {
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub hubs: Vec<Hub>,
    #[serde(default)]
    pub facilities: Vec<Facility>,
    #[serde(default)]
    pub wells: Vec<Well>,
    #[serde(default)]
    pub equipment: Vec<SeedEquipment>,
    #[serde(default)]
    pub connections: Vec<SeedConnection>,
    #[serde(default)]
    pub thresholds: Vec<SeedThreshold>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedEquipment {
    pub id: String,
    pub name: String,
    pub equipment_type: EquipmentType,
    #[serde(default)]
    pub facility_id: Option<String>,
    #[serde(default)]
    pub tag_number: Option<String>,
    #[serde(default = "default_seed_status")]
    pub status: EquipmentStatus,
    #[serde(default)]
    pub is_critical: bool,
    #[serde(default)]
    pub design_capacity: Option<f64>,
    #[serde(default)]
    pub capacity_unit: Option<String>,
    #[serde(default)]
    pub location_description: Option<String>,
    #[serde(default)]
    pub details: Option<EquipmentDetails>,
}

fn default_seed_status() -> EquipmentStatus {
    EquipmentStatus::Online
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedConnection {
    /// Generated when omitted.
    #[serde(default)]
    pub id: Option<String>,
    pub source: String,
    pub target: String,
    pub network_type: NetworkType,
    #[serde(default = "default_seed_connection_type")]
    pub connection_type: ConnectionType,
    #[serde(default = "default_seed_enabled")]
    pub is_active: bool,
    #[serde(default)]
    pub max_capacity: Option<f64>,
    #[serde(default)]
    pub current_flow: Option<f64>,
    #[serde(default)]
    pub capacity_unit: Option<String>,
}

fn default_seed_connection_type() -> ConnectionType {
    ConnectionType::Physical
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedThreshold {
    #[serde(default)]
    pub id: Option<String>,
    pub threshold_name: String,
    pub scope: ThresholdScope,
    pub kpi_name: String,
    #[serde(default)]
    pub measurement_unit: Option<String>,
    #[serde(default)]
    pub upper_limit: Option<f64>,
    #[serde(default)]
    pub lower_limit: Option<f64>,
    #[serde(default)]
    pub target_value: Option<f64>,
    #[serde(default = "default_seed_severity")]
    pub alert_severity: Severity,
    #[serde(default)]
    pub hysteresis_percentage: Option<f64>,
    #[serde(default)]
    pub minimum_duration_minutes: Option<i64>,
    #[serde(default = "default_seed_enabled")]
    pub is_active: bool,
}

fn default_seed_severity() -> Severity {
    Severity::Warning
}

fn default_seed_enabled() -> bool {
    true
}
