//! # UCML CLI Module
//!
//! This module implements the CLI interface for UCML.
//!
//! ## Available Commands
//!
//! - `init` - Write a fresh state file from the profile
//! - `status` - Show type system summary
//! - `types` - List registered types
//! - `show` - Show one type
//! - `register` - Register types from flags or a JSON file
//! - `infer` - Infer the type of a JSON value
//! - `check` - Grade compatibility of two types
//! - `compose` - Compose types under a rule
//! - `expand` - Validate a fractal expansion
//! - `rules` / `tiers` / `patterns` - List configuration
//! - `export` / `import` - Canonical or JSON snapshots

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use ucml_core::TypeSystemError;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// UCML - Semantic Type System
///
/// Registers, infers, checks and composes the types of UCML symbolic units.
/// State persists between invocations in a canonical snapshot file.
#[derive(Parser, Debug)]
#[command(name = "ucml")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the state file
    #[arg(short = 'S', long, global = true, default_value = "ucml.state")]
    pub state: PathBuf,

    /// TOML profile used when no state file exists (embedded default otherwise)
    #[arg(short = 'P', long, global = true)]
    pub profile: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a fresh state file from the profile
    Init {
        /// Overwrite an existing state file
        #[arg(short, long)]
        force: bool,
    },

    /// Show type system summary
    Status,

    /// List registered types
    Types {
        /// Only list this category
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Show a single type
    Show {
        /// Type id
        id: String,
    },

    /// Register types
    Register {
        /// JSON file with one definition or an array of definitions
        #[arg(short, long, conflicts_with_all = ["name", "category"])]
        file: Option<PathBuf>,

        /// Type name
        #[arg(short, long, required_unless_present = "file")]
        name: Option<String>,

        /// Type category
        #[arg(short, long, required_unless_present = "file")]
        category: Option<String>,

        /// Explicit id (generated when absent)
        #[arg(long)]
        id: Option<String>,

        /// Human-readable description
        #[arg(long)]
        description: Option<String>,

        /// Size in bytes
        #[arg(long, default_value = "0")]
        size: u64,

        /// Complexity score
        #[arg(long, default_value = "1")]
        complexity: u64,

        /// Method name (repeatable)
        #[arg(short, long = "method")]
        methods: Vec<String>,

        /// Dependency type id (repeatable)
        #[arg(short, long = "depends-on")]
        depends_on: Vec<String>,

        /// Constraint as key=value, value parsed as JSON when possible (repeatable)
        #[arg(long = "constraint")]
        constraints: Vec<String>,
    },

    /// Infer the type of a JSON value
    Infer {
        /// JSON text, e.g. '[1, 2, 3]'
        value: String,
    },

    /// Grade compatibility of two types
    Check {
        /// First type id
        a: String,

        /// Second type id
        b: String,

        /// Operation name
        #[arg(short, long, default_value = "compose")]
        operation: String,
    },

    /// Compose types under a rule
    Compose {
        /// Input type ids
        #[arg(required = true, num_args = 1..)]
        ids: Vec<String>,

        /// Rule name, or "auto"
        #[arg(short, long, default_value = "auto")]
        rule: String,

        /// Register the output type after a valid composition
        #[arg(short, long)]
        adopt: bool,
    },

    /// Validate a fractal expansion against a tier
    Expand {
        /// Tier name or label
        tier: String,

        /// Expansion complexity
        #[arg(short, long)]
        complexity: u64,

        /// Estimated size in bytes
        #[arg(short, long)]
        size: u64,

        /// Nesting depth
        #[arg(short, long)]
        depth: Option<u32>,
    },

    /// List composition rules
    Rules,

    /// List fractal tiers
    Tiers,

    /// List the paradox catalog
    Patterns,

    /// Export the type system
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Export format (canonical, json)
        #[arg(short = 't', long, default_value = "canonical")]
        format: String,
    },

    /// Replace the state with a canonical export
    Import {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), TypeSystemError> {
    let ctx = Context {
        state: cli.state,
        profile: cli.profile,
        json_mode: cli.json_mode,
    };

    match cli.command {
        Some(Commands::Init { force }) => cmd_init(&ctx, force),
        Some(Commands::Status) => cmd_status(&ctx),
        Some(Commands::Types { category }) => cmd_types(&ctx, category.as_deref()),
        Some(Commands::Show { id }) => cmd_show(&ctx, &id),
        Some(Commands::Register {
            file,
            name,
            category,
            id,
            description,
            size,
            complexity,
            methods,
            depends_on,
            constraints,
        }) => {
            let source = match (file, name, category) {
                (Some(file), _, _) => RegisterSource::File(file),
                (None, Some(name), Some(category)) => RegisterSource::Flags(FlagDefinition {
                    name,
                    category,
                    id,
                    description,
                    size,
                    complexity,
                    methods,
                    depends_on,
                    constraints,
                }),
                _ => {
                    return Err(TypeSystemError::InvalidDefinition(
                        "register needs --file or both --name and --category".to_string(),
                    ));
                }
            };
            cmd_register(&ctx, source)
        }
        Some(Commands::Infer { value }) => cmd_infer(&ctx, &value),
        Some(Commands::Check { a, b, operation }) => cmd_check(&ctx, &a, &b, &operation),
        Some(Commands::Compose { ids, rule, adopt }) => cmd_compose(&ctx, &ids, &rule, adopt),
        Some(Commands::Expand {
            tier,
            complexity,
            size,
            depth,
        }) => cmd_expand(&ctx, &tier, complexity, size, depth),
        Some(Commands::Rules) => cmd_rules(&ctx),
        Some(Commands::Tiers) => cmd_tiers(&ctx),
        Some(Commands::Patterns) => cmd_patterns(&ctx),
        Some(Commands::Export { output, format }) => cmd_export(&ctx, &output, &format),
        Some(Commands::Import { input }) => cmd_import(&ctx, &input),
        None => {
            // No subcommand - show status by default
            cmd_status(&ctx)
        }
    }
}
