use aerodata::{
    Aggregation, Aircraft, Backend, BackendErrorKind, Engine, Filter, FlightData, Material,
    OrmError, Record, SqliteBackend,
};
use chrono::{TimeZone, Utc};

fn seed_fleet(backend: &SqliteBackend) -> Result<Vec<i64>, Box<dyn std::error::Error>> {
    let mut ids = Vec::new();
    for (model, manufacturer, speed) in [
        ("737-800", "Boeing", 600.0),
        ("757-200", "Boeing", 450.0),
        ("787-9", "Boeing", 700.0),
        ("A320neo", "Airbus", 540.0),
    ] {
        let mut aircraft = Aircraft {
            max_altitude: 41_000.0,
            wingspan: 120.0,
            length: 130.0,
            mtow: 180_000.0,
            ..Aircraft::new(model, manufacturer, speed)
        };
        aircraft.save(backend)?;
        ids.push(aircraft.id().expect("saved"));
    }
    Ok(ids)
}

#[test]
fn test_boeing_query_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let backend = SqliteBackend::open(&dir.path().join("fleet.db"));
    backend.connect()?;
    seed_fleet(&backend)?;

    let fast_boeings = Aircraft::query(&backend)
        .filter_by("manufacturer", "Boeing")
        .filter_by("max_speed__gt", 500)
        .order_by(["-max_speed"])
        .limit(10)
        .all()?;
    let models: Vec<&str> = fast_boeings.iter().map(|a| a.model.as_str()).collect();
    assert_eq!(models, vec!["787-9", "737-800"]);

    assert_eq!(Aircraft::query(&backend).filter_by("manufacturer", "Boeing").count()?, 3);
    assert!(!Aircraft::query(&backend).filter_by("manufacturer", "Embraer").exists()?);

    // Offset is applied before limit
    let page = Aircraft::query(&backend)
        .order_by(["max_speed"])
        .offset(1)
        .limit(2)
        .all()?;
    let speeds: Vec<f64> = page.iter().map(|a| a.max_speed).collect();
    assert_eq!(speeds, vec![540.0, 600.0]);

    let tail = Aircraft::query(&backend).order_by(["max_speed"]).offset(3).all()?;
    assert_eq!(tail.len(), 1);
    assert_eq!(tail[0].model, "787-9");

    backend.disconnect()?;
    Ok(())
}

#[test]
fn test_lookup_operators() -> Result<(), Box<dyn std::error::Error>> {
    let backend = SqliteBackend::in_memory();
    backend.connect()?;
    let ids = seed_fleet(&backend)?;

    let count = |lookup: &str, value: serde_json::Value| -> Result<u64, OrmError> {
        Aircraft::query(&backend).filter_by(lookup, value).count()
    };

    assert_eq!(count("manufacturer__ne", "Boeing".into())?, 1);
    assert_eq!(count("max_speed__gte", 600.into())?, 2);
    assert_eq!(count("max_speed__lte", 540.into())?, 2);
    assert_eq!(count("model__contains", "7".into())?, 3);
    assert_eq!(count("id__in", serde_json::json!([ids[0], ids[3], 9999]))?, 2);
    assert_eq!(count("manufacturer__not_in", serde_json::json!(["Boeing"]))?, 1);
    assert_eq!(count("range__is_null", true.into())?, 4);
    assert_eq!(count("range__is_not_null", true.into())?, 0);
    assert_eq!(count("id__in", serde_json::json!([]))?, 0);

    // Mixed types never compare
    assert_eq!(count("manufacturer__gt", 5.into())?, 0);
    Ok(())
}

#[test]
fn test_update_and_delete_lifecycle() -> Result<(), Box<dyn std::error::Error>> {
    let backend = SqliteBackend::in_memory();
    backend.connect()?;

    let mut engine = Engine {
        weight: 5_216.0,
        ..Engine::new("CFM56-7B", "CFM International", "turbofan", 27_300.0)
    };
    engine.save(&backend)?;
    let id = engine.id().expect("saved");
    let created_at = engine.meta.created_at;

    engine.bypass_ratio = Some(5.1);
    engine.save(&backend)?;

    let stored = Engine::get_by_id(&backend, id)?.expect("engine stored");
    assert_eq!(stored.bypass_ratio, Some(5.1));
    assert_eq!(stored.meta.created_at, created_at);
    assert_eq!(stored, engine);

    stored.delete(&backend)?;
    assert!(Engine::get_by_id(&backend, id)?.is_none());

    // Updating a record that no longer exists is reported
    let err = engine.save(&backend).unwrap_err();
    assert_eq!(err.backend_kind(), Some(BackendErrorKind::NotFoundOnWrite));
    Ok(())
}

#[test]
fn test_eager_loading_relations() -> Result<(), Box<dyn std::error::Error>> {
    let backend = SqliteBackend::in_memory();
    backend.connect()?;

    let mut alloy = Material {
        tensile_strength: 572.0,
        yield_strength: 503.0,
        elastic_modulus: 71.7,
        ..Material::new("Aluminum 7075-T6", 2.81)
    };
    alloy.save(&backend)?;

    let mut leap = Engine {
        weight: 6_592.0,
        material_ids: vec![alloy.id().expect("saved")],
        ..Engine::new("LEAP-1B", "CFM International", "turbofan", 29_300.0)
    };
    leap.save(&backend)?;
    let mut cfm = Engine::new("CFM56-7B", "CFM International", "turbofan", 27_300.0);
    cfm.save(&backend)?;

    let mut max8 = Aircraft {
        engine_ids: vec![cfm.id().expect("saved"), leap.id().expect("saved")],
        ..Aircraft::new("737 MAX 8", "Boeing", 521.0)
    };
    max8.save(&backend)?;
    let aircraft_id = max8.id().expect("saved");

    let departure = Utc.with_ymd_and_hms(2026, 5, 1, 6, 0, 0).unwrap();
    for number in ["WN100", "WN200"] {
        FlightData::new(number, aircraft_id, "KDAL", "KHOU", departure).save(&backend)?;
    }

    // References keep list order
    let loaded = Aircraft::query(&backend).with_engines().with_flights().first()?.expect("aircraft");
    let engines: Vec<&str> = loaded.engines.iter().map(|e| e.model.as_str()).collect();
    assert_eq!(engines, vec!["CFM56-7B", "LEAP-1B"]);
    assert_eq!(loaded.flights.len(), 2);

    // Eager-loaded relations are not written back
    loaded.clone().save(&backend)?;
    let plain = Aircraft::get_by_id(&backend, aircraft_id)?.expect("aircraft");
    assert!(plain.engines.is_empty());
    assert_eq!(plain.engine_ids, loaded.engine_ids);

    // BelongsTo, plus an unregistered relation that is skipped
    let flights = FlightData::query(&backend).with_aircraft().with_route().all()?;
    assert_eq!(flights.len(), 2);
    for flight in &flights {
        let owner = flight.aircraft.as_ref().expect("aircraft loaded");
        assert_eq!(owner.model, "737 MAX 8");
    }

    let engines = Engine::query(&backend)
        .filter_by("model", "LEAP-1B")
        .with_materials()
        .all()?;
    assert_eq!(engines[0].materials.len(), 1);
    assert_eq!(engines[0].materials[0].name, "Aluminum 7075-T6");
    Ok(())
}

#[test]
fn test_data_survives_reconnect() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("nested").join("aero.db");

    let backend = SqliteBackend::new(&format!("sqlite://{}", db_path.display()))?;
    backend.connect()?;
    seed_fleet(&backend)?;
    backend.disconnect()?;

    let reopened = SqliteBackend::open(&db_path);
    reopened.connect()?;
    assert_eq!(Aircraft::query(&reopened).count()?, 4);
    Ok(())
}

#[test]
fn test_aggregate_extension() -> Result<(), Box<dyn std::error::Error>> {
    let backend = SqliteBackend::in_memory();
    backend.connect()?;
    seed_fleet(&backend)?;

    let boeing = vec![Filter::eq("manufacturer", "Boeing")?];
    let max = backend.aggregate("aircraft", &boeing, &Aggregation::max("max_speed"))?;
    assert_eq!(max.as_f64(), Some(700.0));
    let avg = backend.aggregate("aircraft", &boeing, &Aggregation::avg("max_speed"))?;
    assert!((avg.as_f64().expect("number") - 583.333).abs() < 1e-3);
    let count = backend.aggregate("aircraft", &[], &Aggregation::count(Some("range")))?;
    assert_eq!(count, serde_json::json!(0));
    Ok(())
}

#[test]
fn test_operations_before_connect_fail() {
    let backend = SqliteBackend::in_memory();
    let err = Aircraft::query(&backend).all().unwrap_err();
    assert_eq!(err.backend_kind(), Some(BackendErrorKind::Connection));
}
