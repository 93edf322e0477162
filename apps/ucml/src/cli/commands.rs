//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//!
//! Every command loads the type system from the state file (or bootstraps it
//! from the profile when no state exists yet). Commands that register types
//! or issue ids write the state back.

use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use ucml_core::{
    Datum, Profile, ResultPolicy, Type, TypeCategory, TypeDefinition, TypeId, TypeSystem,
    TypeSystemError, TypeSystemStatus, canonical_checksum, export_canonical, import_canonical,
};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of a state or import file (500 MB).
const MAX_STATE_FILE_SIZE: u64 = 500 * 1024 * 1024;

/// Maximum size of a definition or profile file (10 MB).
const MAX_INPUT_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), TypeSystemError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| TypeSystemError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(TypeSystemError::SerializationError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve an input path and make sure it is a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, TypeSystemError> {
    let canonical = path.canonicalize().map_err(|e| {
        TypeSystemError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(TypeSystemError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Resolve the parent of an output path; the file itself may not exist yet.
fn validate_output_path(path: &Path) -> Result<PathBuf, TypeSystemError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        TypeSystemError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(TypeSystemError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| TypeSystemError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

fn read_checked(path: &Path, max_size: u64) -> Result<Vec<u8>, TypeSystemError> {
    let validated = validate_file_path(path)?;
    validate_file_size(&validated, max_size)?;
    std::fs::read(&validated)
        .map_err(|e| TypeSystemError::IoError(format!("Read {}: {}", path.display(), e)))
}

// =============================================================================
// CONTEXT
// =============================================================================

/// Global options shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub state: PathBuf,
    pub profile: Option<PathBuf>,
    pub json_mode: bool,
}

/// Load the type system from the state file, or bootstrap it.
pub fn load_system(ctx: &Context) -> Result<TypeSystem, TypeSystemError> {
    if ctx.state.exists() {
        let data = read_checked(&ctx.state, MAX_STATE_FILE_SIZE)?;
        let snapshot = import_canonical(&data)?;
        tracing::debug!(state = %ctx.state.display(), "loaded state");
        return TypeSystem::from_snapshot(snapshot);
    }
    bootstrap_system(ctx)
}

/// Build a fresh type system from `--profile` or the embedded default.
pub fn bootstrap_system(ctx: &Context) -> Result<TypeSystem, TypeSystemError> {
    match &ctx.profile {
        Some(path) => {
            let data = read_checked(path, MAX_INPUT_FILE_SIZE)?;
            let source = String::from_utf8(data).map_err(|e| {
                TypeSystemError::SerializationError(format!("Profile is not UTF-8: {}", e))
            })?;
            let profile = Profile::from_toml_str(&source)?;
            tracing::info!(profile = %path.display(), "bootstrapping from profile");
            TypeSystem::from_profile(&profile)
        }
        None => TypeSystem::with_default_profile(),
    }
}

/// Write the type system to the state file in canonical format.
pub fn save_system(ctx: &Context, system: &TypeSystem) -> Result<(), TypeSystemError> {
    let data = export_canonical(&system.snapshot())?;
    std::fs::write(&ctx.state, &data)
        .map_err(|e| TypeSystemError::IoError(format!("Write state: {}", e)))?;
    tracing::debug!(bytes = data.len(), state = %ctx.state.display(), "saved state");
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), TypeSystemError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| TypeSystemError::SerializationError(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

fn print_type(ty: &Type) {
    println!("{}", ty);
    if !ty.description().is_empty() {
        println!("  Description:  {}", ty.description());
    }
    println!("  Size:         {}", ty.size());
    println!("  Complexity:   {}", ty.complexity());
    if !ty.methods().is_empty() {
        let methods: Vec<&str> = ty.methods().iter().map(String::as_str).collect();
        println!("  Methods:      {}", methods.join(", "));
    }
    if !ty.dependencies().is_empty() {
        let deps: Vec<&str> = ty.dependencies().iter().map(TypeId::as_str).collect();
        println!("  Dependencies: {}", deps.join(", "));
    }
    for (key, value) in ty.constraints() {
        println!("  {} = {}", key, value);
    }
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Write a fresh state file.
pub fn cmd_init(ctx: &Context, force: bool) -> Result<(), TypeSystemError> {
    if ctx.state.exists() && !force {
        return Err(TypeSystemError::IoError(
            "State file already exists. Use --force to overwrite.".to_string(),
        ));
    }

    let system = bootstrap_system(ctx)?;
    save_system(ctx, &system)?;

    if ctx.json_mode {
        return print_json(&system.status());
    }
    println!(
        "Initialized {:?} with {} types",
        ctx.state,
        system.status().total_types
    );
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

#[derive(Serialize)]
struct StatusReport<'a> {
    state: String,
    persisted: bool,
    #[serde(flatten)]
    status: &'a TypeSystemStatus,
}

/// Show type system summary.
pub fn cmd_status(ctx: &Context) -> Result<(), TypeSystemError> {
    let system = load_system(ctx)?;
    let status = system.status();

    if ctx.json_mode {
        return print_json(&StatusReport {
            state: ctx.state.to_string_lossy().into_owned(),
            persisted: ctx.state.exists(),
            status: &status,
        });
    }

    println!("UCML Type System Status");
    println!("=======================");
    println!("State:   {:?}", ctx.state);
    println!("Profile: v{}", status.profile_version);
    println!();
    println!("Types:             {}", status.total_types);
    for (category, count) in &status.categories {
        println!("  {:<16} {}", category.as_str(), count);
    }
    println!("Composition Rules: {}", status.composition_rules);
    println!("Selection Entries: {}", status.selection_entries);
    println!("Paradox Patterns:  {}", status.paradox_patterns);
    println!("Fractal Tiers:     {}", status.fractal_tiers);
    println!("Complexity Budget: {}", status.complexity_budget);

    Ok(())
}

// =============================================================================
// TYPE COMMANDS
// =============================================================================

/// List registered types, optionally filtered by category.
pub fn cmd_types(ctx: &Context, category: Option<&str>) -> Result<(), TypeSystemError> {
    let system = load_system(ctx)?;
    let filter = category.map(str::parse::<TypeCategory>).transpose()?;

    let types: Vec<&Type> = match filter {
        Some(category) => system.list_by_category(category).collect(),
        None => system.registry().iter().collect(),
    };

    if ctx.json_mode {
        return print_json(&types);
    }

    for ty in &types {
        println!(
            "{:<32} {:<24} {:<10} size={} complexity={}",
            ty.id(),
            ty.name(),
            ty.category(),
            ty.size(),
            ty.complexity()
        );
    }
    println!("{} types", types.len());
    Ok(())
}

/// Show one type.
pub fn cmd_show(ctx: &Context, id: &str) -> Result<(), TypeSystemError> {
    let system = load_system(ctx)?;
    let ty = system.get_type(&TypeId::new(id))?;

    if ctx.json_mode {
        return print_json(ty);
    }
    print_type(ty);
    Ok(())
}

/// Definition assembled from `register` flags.
#[derive(Debug, Clone)]
pub struct FlagDefinition {
    pub name: String,
    pub category: String,
    pub id: Option<String>,
    pub description: Option<String>,
    pub size: u64,
    pub complexity: u64,
    pub methods: Vec<String>,
    pub depends_on: Vec<String>,
    pub constraints: Vec<String>,
}

impl FlagDefinition {
    fn into_definition(self) -> Result<TypeDefinition, TypeSystemError> {
        let category: TypeCategory = self.category.parse()?;
        let mut def = TypeDefinition::new(self.name, category)
            .size(self.size)
            .complexity(self.complexity)
            .methods(self.methods);
        if let Some(id) = self.id {
            def = def.with_id(TypeId::new(id));
        }
        if let Some(description) = self.description {
            def = def.description(description);
        }
        for dep in self.depends_on {
            def = def.depends_on(TypeId::new(dep));
        }
        for pair in &self.constraints {
            let (key, raw) = parse_constraint(pair)?;
            def = def.constraint(key, raw);
        }
        Ok(def)
    }
}

/// Parse `key=value`; the value is JSON when it parses, a string otherwise.
fn parse_constraint(pair: &str) -> Result<(String, Value), TypeSystemError> {
    let (key, raw) = pair.split_once('=').ok_or_else(|| {
        TypeSystemError::InvalidDefinition(format!("Constraint '{}' is not key=value", pair))
    })?;
    let key = key.trim();
    if key.is_empty() {
        return Err(TypeSystemError::InvalidDefinition(format!(
            "Constraint '{}' has an empty key",
            pair
        )));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

/// Where `register` takes its definitions from.
#[derive(Debug, Clone)]
pub enum RegisterSource {
    /// JSON file holding one definition or an array of them.
    File(PathBuf),
    Flags(FlagDefinition),
}

/// Register types. A file with an array registers the whole group atomically.
pub fn cmd_register(ctx: &Context, source: RegisterSource) -> Result<(), TypeSystemError> {
    let mut system = load_system(ctx)?;

    let registered = match source {
        RegisterSource::File(path) => {
            let data = read_checked(&path, MAX_INPUT_FILE_SIZE)?;
            let value: Value = serde_json::from_slice(&data)
                .map_err(|e| TypeSystemError::SerializationError(e.to_string()))?;
            if value.is_array() {
                let defs: Vec<TypeDefinition> = serde_json::from_value(value)
                    .map_err(|e| TypeSystemError::SerializationError(e.to_string()))?;
                system.register_types(defs)?
            } else {
                let def: TypeDefinition = serde_json::from_value(value)
                    .map_err(|e| TypeSystemError::SerializationError(e.to_string()))?;
                vec![system.register_type(def)?]
            }
        }
        RegisterSource::Flags(flags) => vec![system.register_type(flags.into_definition()?)?],
    };

    save_system(ctx, &system)?;

    if ctx.json_mode {
        return print_json(&registered);
    }
    for ty in &registered {
        println!("Registered {}", ty);
    }
    Ok(())
}

/// Infer the type of a JSON value. Sequence types are registered and saved.
pub fn cmd_infer(ctx: &Context, value: &str) -> Result<(), TypeSystemError> {
    let value: Value = serde_json::from_str(value)
        .map_err(|e| TypeSystemError::SerializationError(format!("Invalid JSON: {}", e)))?;

    let mut system = load_system(ctx)?;
    let before = system.status().total_types;
    let ty = system.infer_type(&Datum::from(value))?;
    if system.status().total_types != before {
        save_system(ctx, &system)?;
    }

    if ctx.json_mode {
        return print_json(&ty);
    }
    print_type(&ty);
    Ok(())
}

/// Grade compatibility of two types.
pub fn cmd_check(ctx: &Context, a: &str, b: &str, operation: &str) -> Result<(), TypeSystemError> {
    let system = load_system(ctx)?;
    let level = system.check_compatibility(&TypeId::new(a), &TypeId::new(b), operation)?;

    if ctx.json_mode {
        return print_json(&serde_json::json!({
            "a": a,
            "b": b,
            "operation": operation,
            "level": level,
        }));
    }
    println!("{} + {} ({}): {}", a, b, operation, level);
    Ok(())
}

// =============================================================================
// COMPOSE COMMAND
// =============================================================================

/// Compose types under a rule.
///
/// A rejected composition is printed like any other result; only unknown
/// ids or a bad input count fail the command. The state is saved because
/// composing issues ids.
pub fn cmd_compose(
    ctx: &Context,
    ids: &[String],
    rule: &str,
    adopt: bool,
) -> Result<(), TypeSystemError> {
    let mut system = load_system(ctx)?;
    let inputs: Vec<TypeId> = ids.iter().map(|id| TypeId::new(id.as_str())).collect();
    let comp = system.compose(&inputs, rule)?;

    let adopted = if adopt && comp.validation_passed {
        Some(system.adopt_type(comp.output.clone())?)
    } else {
        if adopt {
            tracing::warn!(composition = %comp.id, "composition rejected, output not adopted");
        }
        None
    };
    save_system(ctx, &system)?;

    if ctx.json_mode {
        return print_json(&comp);
    }

    println!("Composition {} using {}", comp.id, comp.rule);
    match comp.result() {
        Ok(_) => println!("  Valid:      yes"),
        Err(reason) => println!("  Valid:      no ({})", reason),
    }
    println!("  Score:      {:.2}", comp.complexity_score);
    let stages: Vec<String> = comp.stages.iter().map(ToString::to_string).collect();
    println!("  Stages:     {}", stages.join(" -> "));
    if comp.has_paradoxes() {
        println!("  Paradoxes:  {}", comp.paradoxes.len());
    }
    for paradox in &comp.paradoxes {
        println!(
            "  Paradox {} [{}] {} (confidence {:.2})",
            paradox.id, paradox.severity, paradox.description, paradox.confidence
        );
    }
    println!();
    print_type(&comp.output);
    if let Some(id) = adopted {
        println!();
        println!("Adopted as {}", id);
    }
    Ok(())
}

// =============================================================================
// EXPAND COMMAND
// =============================================================================

/// Validate a fractal expansion. An invalid verdict is a result, not an error.
pub fn cmd_expand(
    ctx: &Context,
    tier: &str,
    complexity: u64,
    size: u64,
    depth: Option<u32>,
) -> Result<(), TypeSystemError> {
    let system = load_system(ctx)?;
    let verdict = match depth {
        Some(depth) => system.validate_nested_expansion(tier, complexity, size, depth),
        None => system.validate_fractal_expansion(tier, complexity, size),
    };
    let overflow = system.fractal_overflow_report(&verdict);

    if ctx.json_mode {
        return print_json(&serde_json::json!({
            "verdict": verdict,
            "paradox": overflow,
        }));
    }

    let label = if verdict.valid { "VALID" } else { "INVALID" };
    println!("{} [{}]: {}", verdict.tier, label, verdict.reason);
    if let Some(report) = overflow {
        println!(
            "  Paradox {} [{}] resolution: {}",
            report.id, report.severity, report.resolution
        );
    }
    Ok(())
}

// =============================================================================
// CATALOG COMMANDS
// =============================================================================

/// List composition rules.
pub fn cmd_rules(ctx: &Context) -> Result<(), TypeSystemError> {
    let system = load_system(ctx)?;
    let rules = system.list_composition_rules();

    if ctx.json_mode {
        return print_json(rules);
    }

    for rule in rules {
        let result = match &rule.result {
            ResultPolicy::AutoInfer => "auto_infer".to_string(),
            ResultPolicy::FixedName(name) => format!("fixed({})", name),
            ResultPolicy::GenericComposite => "generic_composite".to_string(),
        };
        println!("{} (x{}) -> {}", rule.name, rule.complexity_multiplier, result);
        if !rule.description.is_empty() {
            println!("  {}", rule.description);
        }
        if !rule.allowed_categories.is_empty() {
            let cats: Vec<&str> = rule.allowed_categories.iter().map(|c| c.as_str()).collect();
            println!("  Categories: {}", cats.join(", "));
        }
        if !rule.allowed_types.is_empty() {
            println!("  Types:      {}", rule.allowed_types.join(", "));
        }
        let ops: Vec<&str> = rule.operations.iter().map(String::as_str).collect();
        println!("  Operations: {}", ops.join(", "));
    }
    Ok(())
}

/// List fractal tiers.
pub fn cmd_tiers(ctx: &Context) -> Result<(), TypeSystemError> {
    let system = load_system(ctx)?;
    let tiers = system.list_fractal_tiers();

    if ctx.json_mode {
        return print_json(tiers);
    }

    for tier in tiers {
        println!(
            "{} ({}): size<={} complexity<={} depth<={} memory<={}",
            tier.name,
            tier.label,
            tier.max_expansion,
            tier.complexity_limit,
            tier.depth_limit,
            tier.memory_ceiling
        );
    }
    Ok(())
}

/// List the paradox catalog.
pub fn cmd_patterns(ctx: &Context) -> Result<(), TypeSystemError> {
    let system = load_system(ctx)?;
    let patterns = system.paradox_patterns();

    if ctx.json_mode {
        return print_json(&patterns);
    }

    for pattern in &patterns {
        println!(
            "{} [{}] confidence {:.2}",
            pattern.kind, pattern.severity, pattern.confidence
        );
        println!("  {}", pattern.description);
        println!("  Resolution: {}", pattern.resolution);
    }
    Ok(())
}

// =============================================================================
// EXPORT / IMPORT COMMANDS
// =============================================================================

/// What `export` wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    pub path: String,
    pub format: String,
    pub bytes: usize,
    /// Only for the canonical format.
    pub checksum: Option<u64>,
}

/// What `import` loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub state: String,
    pub types: usize,
}

/// Write the type system to `output` in `format`.
pub fn export_system(
    ctx: &Context,
    output: &Path,
    format: &str,
) -> Result<ExportReport, TypeSystemError> {
    let validated_output = validate_output_path(output)?;
    let system = load_system(ctx)?;
    let snapshot = system.snapshot();

    let (data, checksum) = match format {
        "canonical" => (
            export_canonical(&snapshot)?,
            Some(canonical_checksum(&snapshot)?),
        ),
        "json" => (
            serde_json::to_vec_pretty(&snapshot)
                .map_err(|e| TypeSystemError::SerializationError(e.to_string()))?,
            None,
        ),
        _ => {
            return Err(TypeSystemError::SerializationError(format!(
                "Unknown format: {}. Use: canonical, json",
                format
            )));
        }
    };

    std::fs::write(&validated_output, &data)
        .map_err(|e| TypeSystemError::IoError(format!("Write file: {}", e)))?;

    Ok(ExportReport {
        path: validated_output.to_string_lossy().into_owned(),
        format: format.to_string(),
        bytes: data.len(),
        checksum,
    })
}

/// Replace the state with the canonical export at `input`.
pub fn import_system(ctx: &Context, input: &Path) -> Result<ImportReport, TypeSystemError> {
    let data = read_checked(input, MAX_STATE_FILE_SIZE)?;
    let system = TypeSystem::from_snapshot(import_canonical(&data)?)?;
    save_system(ctx, &system)?;

    Ok(ImportReport {
        state: ctx.state.to_string_lossy().into_owned(),
        types: system.status().total_types,
    })
}

/// Export the type system.
pub fn cmd_export(ctx: &Context, output: &Path, format: &str) -> Result<(), TypeSystemError> {
    let report = export_system(ctx, output, format)?;

    if ctx.json_mode {
        return print_json(&report);
    }
    if let Some(checksum) = report.checksum {
        println!("Checksum: {}", checksum);
    }
    println!("Exported {} bytes to {}", report.bytes, report.path);
    Ok(())
}

/// Replace the state with a canonical export.
pub fn cmd_import(ctx: &Context, input: &Path) -> Result<(), TypeSystemError> {
    let report = import_system(ctx, input)?;

    if ctx.json_mode {
        return print_json(&report);
    }
    println!("Imported {} types", report.types);
    Ok(())
}
