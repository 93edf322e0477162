//! Integration tests for the UCML CLI commands.
//!
//! Each test works against its own temporary state file.

use clap::Parser;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use ucml::cli::{Cli, Context, execute, export_system, import_system, load_system};
use ucml_core::{TypeId, TypeSystemError};

fn state_path(dir: &TempDir) -> PathBuf {
    dir.path().join("ucml.state")
}

fn run(state: &Path, args: &[&str]) -> Result<(), TypeSystemError> {
    let state = state.to_str().expect("utf-8 path");
    let mut argv = vec!["ucml", "--quiet", "--state", state];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv).expect("parse arguments");
    execute(cli)
}

fn context(state: &Path) -> Context {
    Context {
        state: state.to_path_buf(),
        profile: None,
        json_mode: false,
    }
}

fn total_types(state: &Path) -> usize {
    load_system(&context(state))
        .expect("load state")
        .status()
        .total_types
}

// =============================================================================
// INIT / STATUS
// =============================================================================

#[test]
fn test_init_creates_state() {
    let dir = TempDir::new().expect("tempdir");
    let state = state_path(&dir);

    run(&state, &["init"]).expect("init");
    assert!(state.exists());
    assert_eq!(total_types(&state), 21);
}

#[test]
fn test_init_refuses_overwrite_without_force() {
    let dir = TempDir::new().expect("tempdir");
    let state = state_path(&dir);

    run(&state, &["init"]).expect("init");
    assert!(run(&state, &["init"]).is_err());
    run(&state, &["init", "--force"]).expect("forced init");
}

#[test]
fn test_status_without_state_bootstraps() {
    let dir = TempDir::new().expect("tempdir");
    let state = state_path(&dir);

    run(&state, &["status"]).expect("status");
    run(&state, &["--json-mode", "status"]).expect("json status");
    assert!(!state.exists());
}

#[test]
fn test_custom_profile_bootstrap() {
    let dir = TempDir::new().expect("tempdir");
    let state = state_path(&dir);
    let profile = dir.path().join("profile.toml");
    std::fs::write(
        &profile,
        r#"
version = 1
default_rule = "any"

[[types]]
name = "bool"
category = "primitive"

[[rules]]
name = "any"
operations = ["compose"]
result = "generic_composite"
"#,
    )
    .expect("write profile");

    run(
        &state,
        &["--profile", profile.to_str().expect("path"), "init"],
    )
    .expect("init");
    assert_eq!(total_types(&state), 1);
}

// =============================================================================
// REGISTER / SHOW
// =============================================================================

#[test]
fn test_register_from_flags() {
    let dir = TempDir::new().expect("tempdir");
    let state = state_path(&dir);

    run(
        &state,
        &[
            "register",
            "--name",
            "sensor",
            "--category",
            "system",
            "--id",
            "custom_sensor",
            "--size",
            "16",
            "--method",
            "read",
            "--depends-on",
            "type_float32",
            "--constraint",
            "access=read-only",
            "--constraint",
            "channels=4",
        ],
    )
    .expect("register");

    let system = load_system(&context(&state)).expect("load");
    let ty = system
        .get_type(&TypeId::new("custom_sensor"))
        .expect("registered");
    assert_eq!(ty.size(), 16);
    assert_eq!(
        ty.constraint("access").and_then(|v| v.as_str()),
        Some("read-only")
    );
    assert_eq!(ty.constraint("channels").and_then(|v| v.as_u64()), Some(4));

    run(&state, &["show", "custom_sensor"]).expect("show");
}

#[test]
fn test_register_unknown_category_fails() {
    let dir = TempDir::new().expect("tempdir");
    let state = state_path(&dir);

    let result = run(
        &state,
        &["register", "--name", "x", "--category", "nonsense"],
    );
    assert!(matches!(result, Err(TypeSystemError::InvalidDefinition(_))));
}

#[test]
fn test_register_requires_file_or_name() {
    let dir = TempDir::new().expect("tempdir");
    let state = state_path(&dir);
    let state = state.to_str().expect("path");

    assert!(Cli::try_parse_from(["ucml", "--state", state, "register"]).is_err());
    assert!(
        Cli::try_parse_from([
            "ucml", "--state", state, "register", "--file", "defs.json", "--name", "x"
        ])
        .is_err()
    );
}

#[test]
fn test_show_unknown_type_fails() {
    let dir = TempDir::new().expect("tempdir");
    let state = state_path(&dir);

    let result = run(&state, &["show", "type_missing"]);
    assert!(matches!(result, Err(TypeSystemError::NotFound(_))));
}

// =============================================================================
// INFER / CHECK
// =============================================================================

#[test]
fn test_infer_sequence_persists_type() {
    let dir = TempDir::new().expect("tempdir");
    let state = state_path(&dir);

    run(&state, &["infer", "[1, 2, 3]"]).expect("infer");
    assert_eq!(total_types(&state), 22);

    let system = load_system(&context(&state)).expect("load");
    assert!(system.registry().find_by_name("array_int8").is_some());
}

#[test]
fn test_infer_scalar_does_not_write_state() {
    let dir = TempDir::new().expect("tempdir");
    let state = state_path(&dir);

    run(&state, &["infer", "42"]).expect("infer");
    assert!(!state.exists());
}

#[test]
fn test_infer_rejects_bad_json() {
    let dir = TempDir::new().expect("tempdir");
    let state = state_path(&dir);

    let result = run(&state, &["infer", "{not json"]);
    assert!(matches!(result, Err(TypeSystemError::SerializationError(_))));
}

#[test]
fn test_check_compatibility() {
    let dir = TempDir::new().expect("tempdir");
    let state = state_path(&dir);

    run(&state, &["check", "type_int8", "type_int8"]).expect("check");
    run(
        &state,
        &["check", "type_tensor", "type_optimizer", "-o", "pipeline"],
    )
    .expect("check");
    assert!(run(&state, &["check", "type_int8", "type_missing"]).is_err());
}

// =============================================================================
// COMPOSE
// =============================================================================

#[test]
fn test_compose_and_adopt() {
    let dir = TempDir::new().expect("tempdir");
    let state = state_path(&dir);

    run(
        &state,
        &[
            "compose",
            "type_int32",
            "type_float64",
            "--rule",
            "numeric_operations",
            "--adopt",
        ],
    )
    .expect("compose");

    let system = load_system(&context(&state)).expect("load");
    assert_eq!(system.status().total_types, 22);
    let adopted = system
        .registry()
        .find_by_name("composed_float64")
        .expect("adopted output");
    assert_eq!(adopted.size(), 12);
}

#[test]
fn test_compose_ids_continue_across_runs() {
    let dir = TempDir::new().expect("tempdir");
    let state = state_path(&dir);

    for _ in 0..2 {
        run(
            &state,
            &["compose", "type_bool", "type_bool", "--adopt"],
        )
        .expect("compose");
    }

    let system = load_system(&context(&state)).expect("load");
    assert_eq!(system.status().total_types, 23);
}

#[test]
fn test_rejected_composition_is_not_an_error() {
    let dir = TempDir::new().expect("tempdir");
    let state = state_path(&dir);

    run(
        &state,
        &[
            "compose",
            "type_qubit",
            "type_int32",
            "--rule",
            "numeric_operations",
            "--adopt",
        ],
    )
    .expect("rejected composition still succeeds");
    assert_eq!(total_types(&state), 21);
}

#[test]
fn test_compose_cycle_group_from_file() {
    let dir = TempDir::new().expect("tempdir");
    let state = state_path(&dir);
    let defs = dir.path().join("cycle.json");
    std::fs::write(
        &defs,
        r#"[
            {"id": "custom_a", "name": "A", "category": "function", "dependencies": ["custom_b"]},
            {"id": "custom_b", "name": "B", "category": "function", "dependencies": ["custom_a"]}
        ]"#,
    )
    .expect("write definitions");

    run(&state, &["register", "--file", defs.to_str().expect("path")]).expect("register");
    assert_eq!(total_types(&state), 23);

    run(
        &state,
        &["--json-mode", "compose", "custom_a", "custom_b", "-r", "generic_composition"],
    )
    .expect("compose");
}

#[test]
fn test_compose_adopt_skips_taken_output_id() {
    let dir = TempDir::new().expect("tempdir");
    let state = state_path(&dir);

    run(
        &state,
        &["register", "-n", "mine", "-c", "agent", "--id", "composed_1"],
    )
    .expect("register");
    run(&state, &["compose", "type_int8", "--adopt"]).expect("compose");

    let system = load_system(&context(&state)).expect("load");
    assert_eq!(system.status().total_types, 23);
    assert_eq!(
        system
            .get_type(&TypeId::new("composed_1"))
            .expect("explicit")
            .name(),
        "mine"
    );
    assert_eq!(
        system
            .get_type(&TypeId::new("composed_2"))
            .expect("adopted")
            .name(),
        "composed_int8"
    );
}

#[test]
fn test_compose_unknown_input_fails() {
    let dir = TempDir::new().expect("tempdir");
    let state = state_path(&dir);

    let result = run(&state, &["compose", "type_int32", "type_missing"]);
    assert!(matches!(result, Err(TypeSystemError::NotFound(_))));
}

// =============================================================================
// EXPAND / CATALOGS
// =============================================================================

#[test]
fn test_expand_reports_without_failing() {
    let dir = TempDir::new().expect("tempdir");
    let state = state_path(&dir);

    run(&state, &["expand", "tier1", "-c", "5", "-s", "512"]).expect("valid");
    run(&state, &["expand", "tier1", "-c", "15", "-s", "512"]).expect("invalid");
    run(&state, &["expand", "metaglyph", "-c", "1", "-s", "1", "-d", "9"]).expect("depth");
    run(&state, &["expand", "tier9", "-c", "1", "-s", "1"]).expect("unknown tier");
}

#[test]
fn test_catalog_listings() {
    let dir = TempDir::new().expect("tempdir");
    let state = state_path(&dir);

    for command in ["rules", "tiers", "patterns", "types"] {
        run(&state, &[command]).expect(command);
        run(&state, &["--json-mode", command]).expect(command);
    }
    run(&state, &["types", "--category", "quantum"]).expect("filtered");
}

// =============================================================================
// EXPORT / IMPORT
// =============================================================================

#[test]
fn test_export_import_round_trip() {
    let dir = TempDir::new().expect("tempdir");
    let state = state_path(&dir);
    let export = dir.path().join("export.ucml");

    run(&state, &["infer", "[[true]]"]).expect("infer");
    run(
        &state,
        &["export", "-o", export.to_str().expect("path")],
    )
    .expect("export");

    let other = dir.path().join("other.state");
    run(&other, &["import", "-i", export.to_str().expect("path")]).expect("import");

    let original = load_system(&context(&state)).expect("original").snapshot();
    let imported = load_system(&context(&other)).expect("imported").snapshot();
    assert_eq!(original, imported);
}

#[test]
fn test_export_json() {
    let dir = TempDir::new().expect("tempdir");
    let state = state_path(&dir);
    let export = dir.path().join("export.json");

    run(
        &state,
        &["export", "-o", export.to_str().expect("path"), "-t", "json"],
    )
    .expect("export");

    let text = std::fs::read_to_string(&export).expect("read export");
    let value: serde_json::Value = serde_json::from_str(&text).expect("valid json");
    assert_eq!(value["types"].as_array().map(Vec::len), Some(21));
}

#[test]
fn test_export_import_reports() {
    let dir = TempDir::new().expect("tempdir");
    let state = state_path(&dir);
    let canonical = dir.path().join("export.ucml");
    let json = dir.path().join("export.json");

    let report = export_system(&context(&state), &canonical, "canonical").expect("export");
    assert_eq!(report.format, "canonical");
    assert!(report.checksum.is_some());
    let written = std::fs::metadata(&canonical).expect("metadata").len();
    assert_eq!(report.bytes as u64, written);

    let report = export_system(&context(&state), &json, "json").expect("export");
    assert_eq!(report.checksum, None);

    let other = dir.path().join("other.state");
    let report = import_system(&context(&other), &canonical).expect("import");
    assert_eq!(report.types, 21);
    assert!(other.exists());

    let canonical = canonical.to_str().expect("path");
    run(&state, &["--json-mode", "export", "-o", canonical]).expect("json export");
    run(&other, &["--json-mode", "import", "-i", canonical]).expect("json import");
}

#[test]
fn test_export_unknown_format_fails() {
    let dir = TempDir::new().expect("tempdir");
    let state = state_path(&dir);
    let export = dir.path().join("export.bin");

    let result = run(
        &state,
        &["export", "-o", export.to_str().expect("path"), "-t", "xml"],
    );
    assert!(result.is_err());
}

#[test]
fn test_import_rejects_garbage() {
    let dir = TempDir::new().expect("tempdir");
    let state = state_path(&dir);
    let garbage = dir.path().join("garbage.bin");
    std::fs::write(&garbage, b"not a snapshot").expect("write");

    assert!(run(&state, &["import", "-i", garbage.to_str().expect("path")]).is_err());
    assert!(!state.exists());
}
