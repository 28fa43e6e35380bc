use crate::store::{AlertFilter, DowntimeFilter, EquipmentFilter, ProductionStore, ThresholdFilter};
use crate::StorageError;
use chrono::{DateTime, Duration, Utc};
use prodgap_common::types::*;
use tempfile::TempDir;

fn setup() -> (TempDir, ProductionStore) {
    prodgap_common::id::init(1, 1);
    let dir = TempDir::new().unwrap();
    let store = ProductionStore::new(dir.path()).unwrap();
    (dir, store)
}

fn make_alert(id: &str, equipment: &str, priority: i32, ts: DateTime<Utc>) -> PerformanceAlert {
    PerformanceAlert {
        id: id.to_string(),
        equipment_id: Some(equipment.to_string()),
        facility_id: Some("FS-1".to_string()),
        well_id: None,
        alert_type: AlertType::ThresholdBreach,
        severity: Severity::Warning,
        priority,
        title: format!("Alert {id}"),
        description: "pressure high".to_string(),
        recommendation: None,
        status: AlertStatus::New,
        alert_timestamp: ts,
        acknowledged_at: None,
        resolved_at: None,
        threshold_id: None,
        measured_value: Some(85.0),
        threshold_value: Some(80.0),
        measurement_unit: Some("bar".to_string()),
        production_impact_bpd: None,
        estimated_downtime_hours: None,
        safety_critical: false,
        acknowledged_by: None,
        resolved_by: None,
        resolution_notes: None,
        created_at: ts,
        updated_at: ts,
    }
}

fn make_threshold(id: &str, scope: ThresholdScope) -> KpiThreshold {
    let now = Utc::now();
    KpiThreshold {
        id: id.to_string(),
        threshold_name: format!("Threshold {id}"),
        scope,
        kpi_name: "pressure".to_string(),
        kpi_description: Some("Separator pressure".to_string()),
        measurement_unit: Some("bar".to_string()),
        upper_limit: Some(80.0),
        lower_limit: Some(10.0),
        target_value: Some(60.0),
        alert_severity: Severity::Critical,
        hysteresis_percentage: Some(5.0),
        minimum_duration_minutes: Some(10),
        is_active: true,
        effective_from: now - Duration::days(1),
        effective_to: None,
        created_by: Some("engineer".to_string()),
        approved_by: None,
        comments: None,
        created_at: now,
        updated_at: now,
    }
}

fn make_downtime(id: &str, equipment: &str, hours_ago: i64, planned: bool) -> DowntimeEvent {
    let start = Utc::now() - Duration::hours(hours_ago);
    DowntimeEvent {
        id: id.to_string(),
        equipment_id: equipment.to_string(),
        start_time: start,
        end_time: Some(start + Duration::hours(2)),
        duration_hours: Some(2.0),
        downtime_reason: if planned {
            DowntimeReason::PlannedMaintenance
        } else {
            DowntimeReason::UnplannedTrip
        },
        planned,
        safety_related: false,
        production_loss_bpd: Some(300.0),
        production_loss_mscfd: None,
        financial_impact_usd: None,
        analysis: DowntimeAnalysis {
            primary_cause: Some("Seal failure".to_string()),
            work_order_number: Some("WO-1001".to_string()),
            ..Default::default()
        },
        created_at: start,
        updated_at: start,
    }
}

#[test]
fn equipment_round_trips_with_details() {
    let (_dir, store) = setup();
    let mut sep = Equipment::new("SEP-01", "Test separator", EquipmentType::Separator);
    sep.facility_id = Some("FS-1".to_string());
    sep.is_critical = true;
    sep.details = Some(EquipmentDetails::Separator(SeparatorDetails {
        operating_pressure: Some(35.0),
        liquid_level: Some(48.0),
        ..Default::default()
    }));
    store.upsert_equipment(&sep).unwrap();

    let loaded = store.get_equipment("SEP-01").unwrap().unwrap();
    assert_eq!(loaded.details, sep.details);
    assert!(loaded.is_critical);
    assert_eq!(loaded.created_at.timestamp_millis(), sep.created_at.timestamp_millis());
    assert!(store.get_equipment("nope").unwrap().is_none());
}

#[test]
fn list_equipment_filters_and_counts() {
    let (_dir, store) = setup();
    for i in 0..5 {
        let mut pump = Equipment::new(format!("P-{i}"), format!("Pump {i}"), EquipmentType::Pump);
        pump.is_critical = i % 2 == 0;
        store.upsert_equipment(&pump).unwrap();
    }
    store
        .upsert_equipment(&Equipment::new("M-1", "Meter", EquipmentType::Meter))
        .unwrap();

    let filter = EquipmentFilter {
        equipment_type: Some(EquipmentType::Pump),
        is_critical: Some(true),
        ..Default::default()
    };
    assert_eq!(store.count_equipment(&filter).unwrap(), 3);
    let page = store.list_equipment(&filter, 2, 0).unwrap();
    assert_eq!(
        page.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(),
        vec!["P-0", "P-2"]
    );
    assert_eq!(store.all_equipment().unwrap().len(), 6);
}

#[test]
fn update_equipment_status_only_touches_given_fields() {
    let (_dir, store) = setup();
    let mut pump = Equipment::new("P-1", "Pump", EquipmentType::Pump);
    pump.efficiency = Some(80.0);
    store.upsert_equipment(&pump).unwrap();

    let updated = store
        .update_equipment_status("P-1", Some(EquipmentStatus::Online), Some(1200.0), None)
        .unwrap();
    assert_eq!(updated.status, EquipmentStatus::Online);
    assert_eq!(updated.current_throughput, Some(1200.0));
    assert_eq!(updated.efficiency, Some(80.0));

    let err = store
        .update_equipment_status("missing", None, None, None)
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
}

#[test]
fn delete_equipment_cascades() {
    let (_dir, store) = setup();
    for id in ["A", "B"] {
        store
            .upsert_equipment(&Equipment::new(id, id, EquipmentType::Manifold))
            .unwrap();
    }
    store
        .upsert_connection(&Connection::new("c1", "A", "B", NetworkType::Oil))
        .unwrap();
    store
        .upsert_threshold(&make_threshold("t1", ThresholdScope::Equipment("A".into())))
        .unwrap();
    store
        .insert_alert(&make_alert("a1", "A", 5, Utc::now()))
        .unwrap();
    store
        .upsert_downtime_event(&make_downtime("d1", "A", 1, false))
        .unwrap();

    assert!(store.delete_equipment("A").unwrap());
    assert!(store.get_equipment("A").unwrap().is_none());
    assert!(store.all_connections().unwrap().is_empty());
    assert!(store.get_threshold("t1").unwrap().is_none());
    assert!(store.get_alert("a1").unwrap().is_none());
    assert!(store.get_downtime_event("d1").unwrap().is_none());
    assert!(store.get_equipment("B").unwrap().is_some());
    assert!(!store.delete_equipment("A").unwrap());
}

#[test]
fn connections_by_direction() {
    let (_dir, store) = setup();
    for id in ["A", "B", "C"] {
        store
            .upsert_equipment(&Equipment::new(id, id, EquipmentType::Pipeline))
            .unwrap();
    }
    let mut closed = Connection::new("c2", "A", "C", NetworkType::ExportGas);
    closed.is_active = false;
    store.upsert_connection(&closed).unwrap();
    store
        .upsert_connection(&Connection::new("c1", "A", "B", NetworkType::Oil))
        .unwrap();

    let out = store.connections_from("A").unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].id, "c1");
    assert!(!out[1].is_active);
    assert_eq!(out[1].network_type, NetworkType::ExportGas);
    assert_eq!(store.connections_to("B").unwrap().len(), 1);
}

#[test]
fn list_alerts_paginates_by_priority_then_time() {
    let (_dir, store) = setup();
    let now = Utc::now();
    // 25 alerts: priorities 1..=5, timestamps spread over the last few hours.
    for i in 0..25 {
        let priority = 5 - (i / 5);
        let ts = now - Duration::minutes(i as i64 * 3);
        store
            .insert_alert(&make_alert(&format!("a{i:02}"), "SEP-01", priority, ts))
            .unwrap();
    }

    let filter = AlertFilter {
        since: Some(now - Duration::hours(24)),
        ..Default::default()
    };
    assert_eq!(store.count_alerts(&filter).unwrap(), 25);

    let all = store.list_alerts(&filter, 100, 0).unwrap();
    let page = store.list_alerts(&filter, 10, 10).unwrap();
    assert_eq!(page.len(), 10);
    assert_eq!(page, all[10..20].to_vec());
    for pair in all.windows(2) {
        assert!(
            pair[0].priority > pair[1].priority
                || (pair[0].priority == pair[1].priority
                    && pair[0].alert_timestamp >= pair[1].alert_timestamp)
        );
    }
}

#[test]
fn list_alerts_applies_filters_and_time_window() {
    let (_dir, store) = setup();
    let now = Utc::now();
    let mut critical = make_alert("a1", "SEP-01", 8, now);
    critical.severity = Severity::Critical;
    critical.safety_critical = true;
    store.insert_alert(&critical).unwrap();
    store.insert_alert(&make_alert("a2", "P-01", 5, now)).unwrap();
    store
        .insert_alert(&make_alert("a3", "SEP-01", 5, now - Duration::hours(48)))
        .unwrap();

    let recent = AlertFilter {
        since: Some(now - Duration::hours(24)),
        ..Default::default()
    };
    assert_eq!(store.count_alerts(&recent).unwrap(), 2);

    let by_equipment = AlertFilter {
        equipment_id: Some("SEP-01".into()),
        ..recent.clone()
    };
    assert_eq!(store.list_alerts(&by_equipment, 10, 0).unwrap().len(), 1);

    let safety = AlertFilter {
        safety_critical: Some(true),
        severity: Some(Severity::Critical),
        ..recent
    };
    let found = store.list_alerts(&safety, 10, 0).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, "a1");
}

#[test]
fn acknowledge_and_resolve_alert() {
    let (_dir, store) = setup();
    let now = Utc::now();
    store.insert_alert(&make_alert("a1", "SEP-01", 5, now)).unwrap();

    let acked = store.acknowledge_alert("a1", Some("operator"), now).unwrap();
    assert_eq!(acked.status, AlertStatus::Acknowledged);
    assert_eq!(acked.acknowledged_by.as_deref(), Some("operator"));

    let resolved = store
        .resolve_alert("a1", Some("engineer"), Some("valve reset"), now)
        .unwrap();
    assert_eq!(resolved.status, AlertStatus::Resolved);
    assert_eq!(resolved.resolution_notes.as_deref(), Some("valve reset"));
    assert!(resolved.resolved_at.is_some());

    // Already resolved: unchanged.
    let again = store.acknowledge_alert("a1", Some("someone"), now).unwrap();
    assert_eq!(again.status, AlertStatus::Resolved);

    assert!(matches!(
        store.resolve_alert("missing", None, None, now),
        Err(StorageError::NotFound { .. })
    ));
}

#[test]
fn open_threshold_alerts_skips_closed_and_manual() {
    let (_dir, store) = setup();
    let now = Utc::now();
    let mut from_threshold = make_alert("a1", "SEP-01", 5, now);
    from_threshold.threshold_id = Some("t1".into());
    store.insert_alert(&from_threshold).unwrap();
    let mut resolved = make_alert("a2", "SEP-01", 5, now);
    resolved.threshold_id = Some("t1".into());
    resolved.status = AlertStatus::Resolved;
    store.insert_alert(&resolved).unwrap();
    store.insert_alert(&make_alert("a3", "SEP-01", 5, now)).unwrap();

    let open = store.open_threshold_alerts().unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, "a1");
}

#[test]
fn alert_dashboard_aggregates() {
    let (_dir, store) = setup();
    let now = Utc::now();
    for i in 0..3 {
        let mut a = make_alert(&format!("s{i}"), "SEP-01", 5, now);
        a.production_impact_bpd = Some(100.0);
        store.insert_alert(&a).unwrap();
    }
    let mut emergency = make_alert("p0", "P-01", 10, now);
    emergency.severity = Severity::Emergency;
    emergency.safety_critical = true;
    emergency.estimated_downtime_hours = Some(4.0);
    emergency.status = AlertStatus::Acknowledged;
    store.insert_alert(&emergency).unwrap();
    store
        .insert_alert(&make_alert("old", "P-02", 5, now - Duration::days(3)))
        .unwrap();

    let dashboard = store.alert_dashboard(now - Duration::hours(24)).unwrap();
    assert_eq!(dashboard.total_alerts, 4);
    assert_eq!(dashboard.severity_distribution["warning"], 3);
    assert_eq!(dashboard.severity_distribution["emergency"], 1);
    assert_eq!(dashboard.severity_distribution["info"], 0);
    assert_eq!(dashboard.status_distribution["new"], 3);
    assert_eq!(dashboard.status_distribution["acknowledged"], 1);
    assert_eq!(dashboard.safety_critical_alerts, 1);
    assert_eq!(dashboard.top_equipment_alerts[0].equipment_id, "SEP-01");
    assert_eq!(dashboard.top_equipment_alerts[0].alert_count, 3);
    assert_eq!(dashboard.top_equipment_alerts.len(), 2);
    assert_eq!(dashboard.production_impact.total_production_impact_bpd, 300.0);
    assert_eq!(dashboard.production_impact.total_estimated_downtime_hours, 4.0);
    assert_eq!(dashboard.production_impact.alerts_with_impact, 4);
}

#[test]
fn empty_dashboard_has_zero_impact() {
    let (_dir, store) = setup();
    let dashboard = store.alert_dashboard(Utc::now() - Duration::hours(24)).unwrap();
    assert_eq!(dashboard.total_alerts, 0);
    assert_eq!(dashboard.production_impact.total_production_impact_bpd, 0.0);
    assert!(dashboard.top_equipment_alerts.is_empty());
}

#[test]
fn thresholds_filter_by_scope_and_effective_window() {
    let (_dir, store) = setup();
    let now = Utc::now();
    store
        .upsert_threshold(&make_threshold("t1", ThresholdScope::Equipment("SEP-01".into())))
        .unwrap();
    store
        .upsert_threshold(&make_threshold("t2", ThresholdScope::Facility("FS-1".into())))
        .unwrap();
    let mut expired = make_threshold("t3", ThresholdScope::Equipment("SEP-01".into()));
    expired.effective_to = Some(now - Duration::hours(1));
    store.upsert_threshold(&expired).unwrap();
    let mut inactive = make_threshold("t4", ThresholdScope::Well("W-1".into()));
    inactive.is_active = false;
    store.upsert_threshold(&inactive).unwrap();

    let current = ThresholdFilter {
        is_active: Some(true),
        effective_at: Some(now),
        ..Default::default()
    };
    assert_eq!(store.count_thresholds(&current).unwrap(), 2);

    let for_sep = ThresholdFilter {
        equipment_id: Some("SEP-01".into()),
        ..Default::default()
    };
    assert_eq!(store.count_thresholds(&for_sep).unwrap(), 2);

    let loaded = store.get_threshold("t4").unwrap().unwrap();
    assert_eq!(loaded.scope, ThresholdScope::Well("W-1".into()));
    assert!(!loaded.is_active);
    assert_eq!(store.all_thresholds().unwrap().len(), 4);
    assert!(store.delete_threshold("t4").unwrap());
}

#[test]
fn downtime_events_filter_and_order() {
    let (_dir, store) = setup();
    store
        .upsert_downtime_event(&make_downtime("d1", "P-01", 5, false))
        .unwrap();
    store
        .upsert_downtime_event(&make_downtime("d2", "P-01", 1, true))
        .unwrap();
    store
        .upsert_downtime_event(&make_downtime("d3", "P-02", 24 * 10, false))
        .unwrap();

    let week = DowntimeFilter {
        since: Some(Utc::now() - Duration::days(7)),
        ..Default::default()
    };
    let events = store.list_downtime_events(&week, 50, 0).unwrap();
    assert_eq!(
        events.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(),
        vec!["d2", "d1"]
    );

    let unplanned = DowntimeFilter {
        planned: Some(false),
        downtime_reason: Some(DowntimeReason::UnplannedTrip),
        ..week
    };
    assert_eq!(store.count_downtime_events(&unplanned).unwrap(), 1);

    let detail = store.get_downtime_event("d1").unwrap().unwrap();
    assert_eq!(detail.analysis.work_order_number.as_deref(), Some("WO-1001"));
}

#[test]
fn hierarchy_listings() {
    let (_dir, store) = setup();
    store
        .upsert_asset(&Asset {
            id: "AS-1".into(),
            name: "Eastern Asset".into(),
        })
        .unwrap();
    store
        .upsert_hub(&Hub {
            id: "HUB-1".into(),
            asset_id: "AS-1".into(),
            name: "Coastal Hub".into(),
        })
        .unwrap();
    store
        .upsert_facility(&Facility {
            id: "FS-1".into(),
            hub_id: "HUB-1".into(),
            facility_type: FacilityType::Flowstation,
            name: "Flowstation 1".into(),
        })
        .unwrap();
    for (id, priority) in [("W-2", Some(2)), ("W-1", Some(1)), ("W-3", None)] {
        store
            .upsert_well(&Well {
                id: id.into(),
                facility_id: "FS-1".into(),
                name: id.into(),
                status: WellStatus::ShutIn,
                priority,
            })
            .unwrap();
    }

    assert_eq!(store.list_assets().unwrap().len(), 1);
    assert_eq!(store.list_hubs(Some("AS-1")).unwrap().len(), 1);
    assert!(store.list_hubs(Some("AS-9")).unwrap().is_empty());
    assert_eq!(store.list_facilities(None).unwrap()[0].facility_type, FacilityType::Flowstation);
    assert_eq!(store.get_facility("FS-1").unwrap().unwrap().name, "Flowstation 1");
    let wells = store.list_wells(Some("FS-1")).unwrap();
    assert_eq!(
        wells.iter().map(|w| w.id.as_str()).collect::<Vec<_>>(),
        vec!["W-1", "W-2", "W-3"]
    );
    assert_eq!(wells[0].status, WellStatus::ShutIn);
    assert_eq!(store.get_well("W-3").unwrap().unwrap().priority, None);
    assert!(store.get_well("W-9").unwrap().is_none());
}

#[test]
fn samples_are_returned_newest_first() {
    let (_dir, store) = setup();
    let now = Utc::now();
    for i in 0..5 {
        store
            .insert_sample(&PerformanceSample {
                id: format!("s{i}"),
                equipment_id: "P-01".into(),
                timestamp: now - Duration::minutes(i),
                throughput: Some(1000.0 + i as f64),
                efficiency: None,
                availability: None,
                pressure: None,
                temperature: None,
                flow_rate: None,
                data_quality: Some("good".into()),
                measurement_source: Some("scada".into()),
                throughput_unit: Some("bpd".into()),
                pressure_unit: None,
                temperature_unit: None,
                flow_unit: None,
            })
            .unwrap();
    }
    let recent = store.recent_samples("P-01", 3).unwrap();
    assert_eq!(
        recent.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
        vec!["s0", "s1", "s2"]
    );
    let window = store
        .samples_between("P-01", now - Duration::minutes(2), now)
        .unwrap();
    assert_eq!(window.first().map(|s| s.id.as_str()), Some("s2"));
    assert_eq!(window.len(), 3);
}
