use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, ParseEnumError};

/// Declares a fieldless enum whose wire form is a fixed string per variant,
/// with matching `Display` and case-insensitive `FromStr`.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                $(
                    if s.eq_ignore_ascii_case($text) {
                        return Ok($name::$variant);
                    }
                )+
                Err(ParseEnumError {
                    kind: stringify!($name),
                    value: s.to_string(),
                })
            }
        }
    };
}

// ---- Asset hierarchy ----

string_enum! {
    pub enum FacilityType {
        Flowstation => "flowstation",
        CompressorStation => "compressor_station",
        GasPlant => "gas_plant",
        Terminal => "terminal",
    }
}

string_enum! {
    pub enum WellStatus {
        Active => "Active",
        ShutIn => "Shut-In",
        Maintenance => "Maintenance",
        Unknown => "Unknown",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hub {
    pub id: String,
    pub asset_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub id: String,
    pub hub_id: String,
    pub facility_type: FacilityType,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Well {
    pub id: String,
    pub facility_id: String,
    pub name: String,
    pub status: WellStatus,
    pub priority: Option<i32>,
}

// ---- Equipment ----

string_enum! {
    pub enum EquipmentType {
        Well => "well",
        Flowline => "flowline",
        Manifold => "manifold",
        Separator => "separator",
        Pump => "pump",
        Compressor => "compressor",
        Meter => "meter",
        Pipeline => "pipeline",
        StorageTank => "storage_tank",
        GasPlant => "gas_plant",
        DehydrationUnit => "dehydration_unit",
    }
}

string_enum! {
    pub enum EquipmentStatus {
        Online => "online",
        Offline => "offline",
        Maintenance => "maintenance",
        Startup => "startup",
        Shutdown => "shutdown",
        Bypassed => "bypassed",
    }
}

string_enum! {
    pub enum ConnectionType {
        Physical => "physical",
        Logical => "logical",
        Control => "control",
        Bypass => "bypass",
    }
}

string_enum! {
    /// Fluid stream carried by a connection.
    pub enum NetworkType {
        Oil => "oil",
        DomesticGas => "domestic_gas",
        ExportGas => "export_gas",
        FlaredGas => "flared_gas",
        Water => "water",
        Mixed => "mixed",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowlineDetails {
    pub length_km: Option<f64>,
    pub diameter_inches: Option<f64>,
    pub material: Option<String>,
    pub inlet_pressure: Option<f64>,
    pub outlet_pressure: Option<f64>,
    pub max_operating_pressure: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifoldDetails {
    pub header_pressure: Option<f64>,
    pub header_temperature: Option<f64>,
    pub number_of_inlets: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeparatorDetails {
    pub operating_pressure: Option<f64>,
    pub operating_temperature: Option<f64>,
    /// Liquid level as a percentage of vessel height.
    pub liquid_level: Option<f64>,
    pub vessel_volume: Option<f64>,
    pub oil_recovery_efficiency: Option<f64>,
    pub gas_recovery_efficiency: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PumpDetails {
    pub discharge_pressure: Option<f64>,
    pub suction_pressure: Option<f64>,
    pub flow_rate: Option<f64>,
    pub vibration_level: Option<f64>,
    pub bearing_temperature: Option<f64>,
    pub motor_current: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompressorDetails {
    pub suction_pressure: Option<f64>,
    pub discharge_pressure: Option<f64>,
    pub compression_ratio: Option<f64>,
    pub gas_flow_rate: Option<f64>,
    pub power_consumption: Option<f64>,
    pub compressor_efficiency: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineDetails {
    pub length_km: Option<f64>,
    pub diameter_inches: Option<f64>,
    pub material: Option<String>,
    pub inlet_pressure: Option<f64>,
    pub outlet_pressure: Option<f64>,
    pub flow_rate: Option<f64>,
    pub leak_detection_status: Option<String>,
    pub cathodic_protection_status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageTankDetails {
    pub total_capacity: Option<f64>,
    pub current_volume: Option<f64>,
    pub usable_capacity: Option<f64>,
    pub api_gravity: Option<f64>,
    pub bsw_content: Option<f64>,
    pub temperature: Option<f64>,
    pub filling_rate: Option<f64>,
    pub emptying_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeterDetails {
    /// orifice, turbine, ultrasonic, ...
    pub meter_type: Option<String>,
    pub accuracy_percentage: Option<f64>,
    pub calibration_date: Option<DateTime<Utc>>,
    pub instantaneous_flow: Option<f64>,
    pub totalizer_reading: Option<f64>,
    pub data_quality: Option<String>,
}

/// Type-specific payload of an [`Equipment`] record.
///
/// The variant must agree with the record's [`EquipmentType`]; types without
/// extra attributes (well, gas plant, dehydration unit) carry no details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EquipmentDetails {
    Flowline(FlowlineDetails),
    Manifold(ManifoldDetails),
    Separator(SeparatorDetails),
    Pump(PumpDetails),
    Compressor(CompressorDetails),
    Pipeline(PipelineDetails),
    StorageTank(StorageTankDetails),
    Meter(MeterDetails),
}

impl EquipmentDetails {
    pub fn equipment_type(&self) -> EquipmentType {
        match self {
            Self::Flowline(_) => EquipmentType::Flowline,
            Self::Manifold(_) => EquipmentType::Manifold,
            Self::Separator(_) => EquipmentType::Separator,
            Self::Pump(_) => EquipmentType::Pump,
            Self::Compressor(_) => EquipmentType::Compressor,
            Self::Pipeline(_) => EquipmentType::Pipeline,
            Self::StorageTank(_) => EquipmentType::StorageTank,
            Self::Meter(_) => EquipmentType::Meter,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    pub id: String,
    pub facility_id: Option<String>,
    pub equipment_type: EquipmentType,
    pub name: String,
    pub tag_number: Option<String>,
    pub status: EquipmentStatus,
    pub is_critical: bool,
    pub design_capacity: Option<f64>,
    pub current_throughput: Option<f64>,
    /// Percentage.
    pub efficiency: Option<f64>,
    pub capacity_unit: Option<String>,
    pub location_description: Option<String>,
    pub elevation: Option<f64>,
    pub last_maintenance_date: Option<DateTime<Utc>>,
    pub next_maintenance_date: Option<DateTime<Utc>>,
    pub commissioned_date: Option<DateTime<Utc>>,
    pub details: Option<EquipmentDetails>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Equipment {
    /// A minimal record with every optional attribute unset.
    pub fn new(id: impl Into<String>, name: impl Into<String>, equipment_type: EquipmentType) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            facility_id: None,
            equipment_type,
            name: name.into(),
            tag_number: None,
            status: EquipmentStatus::Offline,
            is_critical: false,
            design_capacity: None,
            current_throughput: None,
            efficiency: None,
            capacity_unit: None,
            location_description: None,
            elevation: None,
            last_maintenance_date: None,
            next_maintenance_date: None,
            commissioned_date: None,
            details: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.id.trim().is_empty() {
            return Err(CoreError::validation("equipment id must not be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(CoreError::validation("equipment name must not be empty"));
        }
        if let Some(details) = &self.details {
            if details.equipment_type() != self.equipment_type {
                return Err(CoreError::Validation(format!(
                    "details of kind {} do not match equipment type {}",
                    details.equipment_type(),
                    self.equipment_type
                )));
            }
        }
        Ok(())
    }
}

/// Directed, typed edge between two pieces of equipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: String,
    pub source_equipment_id: String,
    pub target_equipment_id: String,
    pub connection_type: ConnectionType,
    pub network_type: NetworkType,
    pub is_active: bool,
    pub max_capacity: Option<f64>,
    pub current_flow: Option<f64>,
    pub capacity_unit: Option<String>,
    pub connection_point_source: Option<String>,
    pub connection_point_target: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Connection {
    /// An active physical connection with no flow measurements.
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        network_type: NetworkType,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            source_equipment_id: source.into(),
            target_equipment_id: target.into(),
            connection_type: ConnectionType::Physical,
            network_type,
            is_active: true,
            max_capacity: None,
            current_flow: None,
            capacity_unit: None,
            connection_point_source: None,
            connection_point_target: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Time-stamped measurement snapshot for one piece of equipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub id: String,
    pub equipment_id: String,
    pub timestamp: DateTime<Utc>,
    pub throughput: Option<f64>,
    pub efficiency: Option<f64>,
    pub availability: Option<f64>,
    pub pressure: Option<f64>,
    pub temperature: Option<f64>,
    pub flow_rate: Option<f64>,
    /// good, suspect, bad
    pub data_quality: Option<String>,
    pub measurement_source: Option<String>,
    pub throughput_unit: Option<String>,
    pub pressure_unit: Option<String>,
    pub temperature_unit: Option<String>,
    pub flow_unit: Option<String>,
}

impl PerformanceSample {
    /// KPI names a sample can feed into threshold evaluation.
    pub const KPI_NAMES: [&'static str; 6] = [
        "throughput",
        "efficiency",
        "availability",
        "pressure",
        "temperature",
        "flow_rate",
    ];

    /// Populated measurements as `(kpi_name, value)` pairs.
    pub fn kpi_values(&self) -> Vec<(&'static str, f64)> {
        let fields = [
            self.throughput,
            self.efficiency,
            self.availability,
            self.pressure,
            self.temperature,
            self.flow_rate,
        ];
        Self::KPI_NAMES
            .iter()
            .zip(fields)
            .filter_map(|(name, value)| value.map(|v| (*name, v)))
            .collect()
    }
}

// ---- Thresholds & alerts ----

string_enum! {
    /// Alert severity, ordered from lowest to highest.
    #[derive(PartialOrd, Ord)]
    pub enum Severity {
        Info => "info",
        Warning => "warning",
        Critical => "critical",
        Emergency => "emergency",
    }
}

impl Severity {
    /// Default 1..=10 priority assigned to generated alerts.
    pub fn default_priority(&self) -> i32 {
        match self {
            Severity::Info => 3,
            Severity::Warning => 5,
            Severity::Critical => 8,
            Severity::Emergency => 10,
        }
    }
}

string_enum! {
    pub enum AlertStatus {
        New => "new",
        Acknowledged => "acknowledged",
        Investigating => "investigating",
        Resolved => "resolved",
        Closed => "closed",
        FalseAlarm => "false_alarm",
    }
}

impl AlertStatus {
    /// Whether the alert still awaits resolution.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            AlertStatus::New | AlertStatus::Acknowledged | AlertStatus::Investigating
        )
    }
}

string_enum! {
    pub enum AlertType {
        ProductionDeviance => "production_deviance",
        EquipmentFailure => "equipment_failure",
        ThresholdBreach => "threshold_breach",
        StatusChange => "status_change",
        MaintenanceDue => "maintenance_due",
        SafetyViolation => "safety_violation",
        ProcessUpset => "process_upset",
        ConstraintDetected => "constraint_detected",
    }
}

/// The entity a threshold applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ThresholdScope {
    Equipment(String),
    Facility(String),
    Well(String),
}

impl ThresholdScope {
    pub fn entity_id(&self) -> &str {
        match self {
            Self::Equipment(id) | Self::Facility(id) | Self::Well(id) => id,
        }
    }

    /// Singular name of the scoped entity kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Equipment(_) => "equipment",
            Self::Facility(_) => "facility",
            Self::Well(_) => "well",
        }
    }

    pub fn equipment_id(&self) -> Option<&str> {
        match self {
            Self::Equipment(id) => Some(id),
            _ => None,
        }
    }

    pub fn facility_id(&self) -> Option<&str> {
        match self {
            Self::Facility(id) => Some(id),
            _ => None,
        }
    }

    pub fn well_id(&self) -> Option<&str> {
        match self {
            Self::Well(id) => Some(id),
            _ => None,
        }
    }
}

/// Configured operating limit for one KPI of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiThreshold {
    pub id: String,
    pub threshold_name: String,
    pub scope: ThresholdScope,
    /// e.g. `flow_rate`, `pressure`, `efficiency`
    pub kpi_name: String,
    pub kpi_description: Option<String>,
    pub measurement_unit: Option<String>,
    pub upper_limit: Option<f64>,
    pub lower_limit: Option<f64>,
    pub target_value: Option<f64>,
    pub alert_severity: Severity,
    /// Buffer, as a percentage of the limit's magnitude, the value must clear
    /// before an alert is considered recovered.
    pub hysteresis_percentage: Option<f64>,
    /// The breach must persist this long before an alert is raised.
    pub minimum_duration_minutes: Option<i64>,
    pub is_active: bool,
    pub effective_from: DateTime<Utc>,
    pub effective_to: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub approved_by: Option<String>,
    pub comments: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KpiThreshold {
    pub fn has_limits(&self) -> bool {
        self.upper_limit.is_some() || self.lower_limit.is_some()
    }

    /// Active and inside `[effective_from, effective_to]` at `at`.
    pub fn is_effective_at(&self, at: DateTime<Utc>) -> bool {
        self.is_active
            && self.effective_from <= at
            && self.effective_to.map_or(true, |to| at <= to)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceAlert {
    pub id: String,
    pub equipment_id: Option<String>,
    pub facility_id: Option<String>,
    pub well_id: Option<String>,
    pub alert_type: AlertType,
    pub severity: Severity,
    /// 1..=10, higher is more urgent.
    pub priority: i32,
    pub title: String,
    pub description: String,
    pub recommendation: Option<String>,
    pub status: AlertStatus,
    pub alert_timestamp: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub threshold_id: Option<String>,
    pub measured_value: Option<f64>,
    pub threshold_value: Option<f64>,
    pub measurement_unit: Option<String>,
    pub production_impact_bpd: Option<f64>,
    pub estimated_downtime_hours: Option<f64>,
    pub safety_critical: bool,
    pub acknowledged_by: Option<String>,
    pub resolved_by: Option<String>,
    pub resolution_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---- Downtime ----

string_enum! {
    pub enum DowntimeReason {
        PlannedMaintenance => "planned_maintenance",
        UnplannedTrip => "unplanned_trip",
        EquipmentFailure => "equipment_failure",
        ProcessUpset => "process_upset",
        SafetyShutdown => "safety_shutdown",
        ExternalConstraint => "external_constraint",
        PowerOutage => "power_outage",
        OperatorAction => "operator_action",
    }
}

/// Root cause, response and work-order metadata of a downtime event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DowntimeAnalysis {
    pub primary_cause: Option<String>,
    pub secondary_cause: Option<String>,
    pub root_cause_description: Option<String>,
    pub contributing_factors: Option<String>,
    /// alarm, operator, inspection
    pub detection_method: Option<String>,
    pub response_time_minutes: Option<f64>,
    pub repair_time_hours: Option<f64>,
    pub corrective_actions: Option<String>,
    pub preventive_actions: Option<String>,
    pub reported_by: Option<String>,
    pub investigated_by: Option<String>,
    pub approved_by: Option<String>,
    pub work_order_number: Option<String>,
    pub maintenance_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DowntimeEvent {
    pub id: String,
    pub equipment_id: String,
    pub start_time: DateTime<Utc>,
    /// `None` while the equipment is still down.
    pub end_time: Option<DateTime<Utc>>,
    pub duration_hours: Option<f64>,
    pub downtime_reason: DowntimeReason,
    pub planned: bool,
    pub safety_related: bool,
    pub production_loss_bpd: Option<f64>,
    pub production_loss_mscfd: Option<f64>,
    pub financial_impact_usd: Option<f64>,
    #[serde(default)]
    pub analysis: DowntimeAnalysis,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DowntimeEvent {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Recorded duration, or the elapsed time up to `now` for open events.
    pub fn duration_hours_at(&self, now: DateTime<Utc>) -> f64 {
        if let Some(hours) = self.duration_hours {
            return hours;
        }
        let end = self.end_time.unwrap_or(now);
        (end - self.start_time).num_seconds().max(0) as f64 / 3600.0
    }
}
