use colmap::algo::classifier::ClassifierConfig;
use colmap::algo::dictionary::{embedded_dictionary, parse_dictionary, FieldDictionary};
use colmap::algo::storage::{JobStore, ProfileStore};
use colmap::ops;
use serde_json::{json, Value};

fn nombre_dictionary() -> FieldDictionary {
    parse_dictionary(
        r#"{"name": "test", "version": "1",
            "fields": [{"name": "nombre", "keywords": ["nombre", "name"], "data_type": "text"}]}"#,
    )
    .unwrap()
}

fn sample_files() -> Vec<Value> {
    vec![
        json!({"file": "a.xlsx", "columns": [
            {"name": "Nombre Completo", "values": ["Ana Gómez", "Luis Pérez"]}
        ]}),
        json!({"file": "b.xlsx", "columns": [
            {"name": "nombre_completo", "values": ["Marta Ruiz"]}
        ]}),
    ]
}

fn export_files() -> Vec<Value> {
    vec![
        json!({"file": "enero.xlsx", "columns": [
            {"name": "Cédula", "values": ["0912345678", "0923456789"]},
            {"name": "Nombre", "values": ["Ana", "Luis"]},
            {"name": "Correo", "values": ["ana@example.com", null]},
            {"name": "Monto Total", "values": [12.5, 100]},
            {"name": "Notas internas", "values": ["x", "y"]}
        ]}),
        json!({"file": "febrero.csv", "columns": [
            {"name": "CEDULA", "values": ["0934567890"]},
            {"name": "monto_total", "values": ["8"]}
        ]}),
    ]
}

fn stores() -> (ProfileStore, JobStore) {
    (
        ProfileStore::open_in_memory().unwrap(),
        JobStore::open_in_memory().unwrap(),
    )
}

#[test]
fn ops_analyze_end_to_end() {
    let result =
        ops::op_analyze(&sample_files(), &nombre_dictionary(), &ClassifierConfig::default())
            .unwrap();
    assert_eq!(result["column_frequency"], json!({"nombre completo": 2}));
    assert_eq!(result["statistics"]["unique_columns"], 1);
    assert_eq!(result["statistics"]["total_columns"], 2);
    assert_eq!(result["statistics"]["total_files"], 2);

    let detected = result["detected_fields"].as_array().unwrap();
    assert_eq!(detected.len(), 1);
    assert_eq!(detected[0]["suggested_field"], "nombre");
    assert_eq!(detected[0]["data_type"], "text");
    assert!(detected[0]["confidence"].as_f64().unwrap() > 0.0);
    assert_eq!(result["dictionary_version"], "1");
}

#[test]
fn ops_analyze_counts_are_consistent() {
    let result =
        ops::op_analyze(&export_files(), &embedded_dictionary(), &ClassifierConfig::default())
            .unwrap();
    let freq = result["column_frequency"].as_object().unwrap();
    let sum: u64 = freq.values().map(|v| v.as_u64().unwrap()).sum();
    assert_eq!(sum, result["statistics"]["total_columns"].as_u64().unwrap());
    assert_eq!(
        freq.len() as u64,
        result["statistics"]["unique_columns"].as_u64().unwrap()
    );
    assert_eq!(freq["cedula"], 2);
    assert_eq!(freq["monto total"], 2);
}

#[test]
fn ops_analyze_rejects_nameless_column() {
    let files = vec![json!({"file": "x.xlsx", "columns": [{"values": ["1"]}]})];
    let err = ops::op_analyze(&files, &embedded_dictionary(), &ClassifierConfig::default())
        .unwrap_err();
    assert_eq!(err.kind(), "validation");
}

#[test]
fn ops_analyze_empty_input() {
    let result =
        ops::op_analyze(&[], &embedded_dictionary(), &ClassifierConfig::default()).unwrap();
    assert_eq!(result["detected_fields"], json!([]));
    assert_eq!(result["statistics"]["total_files"], 0);
}

#[test]
fn ops_dictionary_lists_fields() {
    let v = ops::op_dictionary(&embedded_dictionary()).unwrap();
    assert_eq!(v["name"], "default");
    assert_eq!(v["fields"].as_array().unwrap().len(), 10);
}

#[test]
fn ops_profile_created_twice_is_duplicate() {
    let (store, _) = stores();
    let payload = json!({"name": "clientes", "fields": [
        {"name": "cedula", "keywords": ["cedula"], "data_type": "identifier", "required": true}
    ]});
    let first = ops::op_profile_create(&store, &payload).unwrap();
    assert!(!first["id"].as_str().unwrap().is_empty());

    let err = ops::op_profile_create(&store, &payload).unwrap_err();
    assert_eq!(err.kind(), "duplicate_name");
    assert_eq!(ops::error_value(&err)["error"], "duplicate_name");
}

#[test]
fn ops_profile_crud() {
    let (store, _) = stores();
    let created = ops::op_profile_create(
        &store,
        &json!({"name": "ventas", "description": "Reporte mensual", "fields": [
            {"name": "monto", "keywords": ["monto", "valor"], "data_type": "numero"}
        ]}),
    )
    .unwrap();
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["fields"][0]["data_type"], "number");

    let got = ops::op_profile_get(&store, &id).unwrap();
    assert_eq!(got, created);

    let updated = ops::op_profile_update(
        &store,
        &id,
        &json!({"name": "ventas-2024", "fields": []}),
    )
    .unwrap();
    assert_eq!(updated["id"], created["id"]);
    assert_eq!(updated["created_at"], created["created_at"]);
    assert_eq!(updated["description"], Value::Null);

    let found = ops::op_profile_search(&store, "2024").unwrap();
    assert_eq!(found.as_array().unwrap().len(), 1);

    ops::op_profile_delete(&store, &id).unwrap();
    assert_eq!(ops::op_profile_get(&store, &id).unwrap_err().kind(), "not_found");
    assert_eq!(ops::op_profile_delete(&store, &id).unwrap_err().kind(), "not_found");
    assert_eq!(ops::op_profile_list(&store).unwrap(), json!([]));
}

#[test]
fn ops_profile_missing_name_is_validation() {
    let (store, _) = stores();
    let err = ops::op_profile_create(&store, &json!({"fields": []})).unwrap_err();
    assert_eq!(err.kind(), "validation");
}

#[test]
fn ops_profile_from_analysis_then_script() {
    let (store, _) = stores();
    let analysis =
        ops::op_analyze(&export_files(), &embedded_dictionary(), &ClassifierConfig::default())
            .unwrap();
    let profile =
        ops::op_profile_from_analysis(&store, &analysis, "clientes", Some("exportes")).unwrap();

    let names: Vec<&str> = profile["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["cedula", "nombre", "email", "monto"]);
    assert_eq!(profile["fields"][0]["required"], true);

    let generated = ops::op_generate_script(
        &store,
        &json!({"profile_name": "clientes", "source_path": "/in", "output_folder": "/out"}),
    )
    .unwrap();
    assert_eq!(generated["filename"], "batch_processor_clientes.py");
    let script = generated["script"].as_str().unwrap();
    assert!(script.contains(r#"FILE_PREFIX = "procesado""#));
    assert!(script.contains("def process_batch():"));
}

#[test]
fn ops_script_unknown_profile() {
    let (store, _) = stores();
    let err = ops::op_generate_script(
        &store,
        &json!({"profile_name": "nadie", "source_path": "/in", "output_folder": "/out"}),
    )
    .unwrap_err();
    assert!(err.is_profile_not_found());
}

#[test]
fn ops_script_missing_output_folder() {
    let (store, _) = stores();
    let err = ops::op_generate_script(
        &store,
        &json!({"profile_name": "clientes", "csv_path": "/in.csv"}),
    )
    .unwrap_err();
    assert_eq!(err.kind(), "invalid_config");
}

#[test]
fn ops_script_is_deterministic() {
    let (store, _) = stores();
    ops::op_profile_create(
        &store,
        &json!({"name": "clientes", "fields": [{"name": "nombre", "keywords": ["nombre"]}]}),
    )
    .unwrap();
    let cfg = json!({"profile_name": "clientes", "source_path": "/in", "output_folder": "/out",
                     "file_prefix": "limpio"});
    let a = ops::op_generate_script(&store, &cfg).unwrap();
    let b = ops::op_generate_script(&store, &cfg).unwrap();
    assert_eq!(a, b);
}

#[test]
fn ops_jobs_roundtrip_and_regenerate() {
    let (store, jobs) = stores();
    ops::op_profile_create(
        &store,
        &json!({"name": "clientes", "fields": [{"name": "nombre", "keywords": ["nombre"]}]}),
    )
    .unwrap();
    let cfg = json!({"profile_name": "clientes", "source_path": "/in", "output_folder": "/out"});
    ops::op_job_save(&jobs, "diario", &cfg).unwrap();

    let job = ops::op_job_get(&jobs, "diario").unwrap();
    assert_eq!(job["config"]["profile_name"], "clientes");
    assert_eq!(ops::op_job_list(&jobs).unwrap().as_array().unwrap().len(), 1);

    let from_job = ops::op_job_script(&store, &jobs, "diario").unwrap();
    let direct = ops::op_generate_script(&store, &cfg).unwrap();
    assert_eq!(from_job, direct);

    let err = ops::op_job_get(&jobs, "semanal").unwrap_err();
    assert_eq!(err.kind(), "not_found");
}

#[test]
fn ops_analyze_with_stored_profile() {
    let (store, _) = stores();
    ops::op_profile_create(
        &store,
        &json!({"name": "facturas", "fields": [
            {"name": "ruc", "keywords": ["ruc", "documento"], "data_type": "identifier"}
        ]}),
    )
    .unwrap();
    let files = vec![json!({"file": "f.xlsx", "columns": [
        {"name": "RUC", "values": ["0990001234001"]},
        {"name": "Nombre", "values": ["ACME"]}
    ]})];

    let result =
        ops::op_analyze_with_profile(&store, &files, "facturas", &ClassifierConfig::default())
            .unwrap();
    assert_eq!(result["detected_fields"][0]["suggested_field"], "ruc");
    assert_eq!(result["detected_fields"][1]["suggested_field"], Value::Null);

    let err = ops::op_analyze_with_profile(&store, &files, "otro", &ClassifierConfig::default())
        .unwrap_err();
    assert!(err.is_profile_not_found());
}
