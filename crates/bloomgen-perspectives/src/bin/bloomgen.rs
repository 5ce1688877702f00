use anyhow::{bail, Context, Result};
use bloomgen_ai::LLMProviderFactory;
use bloomgen_core::config_manager::{BloomgenConfig, ConfigManager, GenerationStrategy, LoggingConfig};
use bloomgen_core::{
    missing_required_fields, ExampleCorpus, PerspectiveWriter, SchemaCache, SchemaSnapshot,
    SchemaVariant,
};
use bloomgen_graph::Neo4jSchemaFetcher;
use bloomgen_perspectives::{
    LlmPerspectiveGenerator, PerspectiveDeclaration, ProgrammaticGenerator, PromptPolicy,
};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, Registry};

#[derive(Parser)]
#[command(
    name = "bloomgen",
    version,
    author,
    about = "Generate Neo4j Bloom perspectives from a live graph schema",
    long_about = "bloomgen reads the schema of a Neo4j database and produces importable Bloom \
                  perspective files, either drafted by a language model from example \
                  perspectives or built directly from a declaration file."
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    verbose: bool,

    #[arg(long, global = true, help = "Configuration file path")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Fetch or inspect the cached database schema")]
    Schema {
        #[command(subcommand)]
        action: SchemaAction,
    },

    #[command(about = "Generate perspective files")]
    Generate {
        #[command(subcommand)]
        mode: GenerateMode,
    },

    #[command(about = "Report required Bloom fields missing from perspective files")]
    Check {
        #[arg(required = true, help = "Perspective JSON files to check")]
        files: Vec<PathBuf>,
    },

    #[command(about = "Manage bloomgen configuration")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum SchemaAction {
    #[command(about = "Load the schema from cache, or fetch it from the database")]
    Fetch {
        #[arg(long, help = "Include constraints and indexes")]
        full: bool,

        #[arg(long, help = "Ignore the cache and query the database")]
        refresh: bool,
    },

    #[command(about = "Print the cached schema")]
    Show {
        #[arg(long, help = "Show the full variant")]
        full: bool,
    },
}

#[derive(Subcommand)]
enum GenerateMode {
    #[command(about = "Draft perspectives with the configured language model")]
    Llm {
        #[arg(short, long, help = "Number of perspectives to request")]
        count: Option<usize>,

        #[arg(long, help = "Request strategy: batch or per-perspective")]
        strategy: Option<GenerationStrategy>,

        #[arg(short, long, help = "Output directory")]
        output: Option<PathBuf>,
    },

    #[command(about = "Build a perspective from a TOML or JSON declaration")]
    Declared {
        #[arg(help = "Declaration file (.toml or .json)")]
        file: PathBuf,

        #[arg(long, help = "Declare every label of the cached schema")]
        schema: bool,

        #[arg(long, help = "Hide schema relationship types the declaration does not use")]
        hide_unused: bool,

        #[arg(short, long, help = "Output directory")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    #[command(about = "Write a default configuration file")]
    Init {
        #[arg(help = "Target path (default: ~/.bloomgen/config.toml)")]
        path: Option<PathBuf>,

        #[arg(short, long, help = "Overwrite an existing file")]
        force: bool,
    },

    #[command(about = "Show the effective configuration")]
    Show {
        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Writing a fresh config must work even when the current one does not load
    if let Commands::Config {
        action: ConfigAction::Init { path, force },
    } = &cli.command
    {
        return handle_config_init(path.clone(), *force);
    }

    let config_mgr =
        ConfigManager::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config_mgr.config().logging, cli.verbose);
    if let Some(path) = config_mgr.config_path() {
        info!("Using configuration file {}", path.display());
    }
    let config = config_mgr.config();

    match cli.command {
        Commands::Schema { action } => match action {
            SchemaAction::Fetch { full, refresh } => handle_schema_fetch(config, full, refresh).await?,
            SchemaAction::Show { full } => handle_schema_show(config, full)?,
        },
        Commands::Generate { mode } => match mode {
            GenerateMode::Llm {
                count,
                strategy,
                output,
            } => handle_generate_llm(config, count, strategy, output).await?,
            GenerateMode::Declared {
                file,
                schema,
                hide_unused,
                output,
            } => handle_generate_declared(config, &file, schema, hide_unused, output).await?,
        },
        Commands::Check { files } => handle_check(&files)?,
        Commands::Config { action } => match action {
            ConfigAction::Show { json } => handle_config_show(&config_mgr, json)?,
            ConfigAction::Init { path, force } => handle_config_init(path, force)?,
        },
    }

    Ok(())
}

fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
    };

    match logging.format.as_str() {
        "json" => {
            let subscriber = Registry::default().with(env_filter).with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            );
            tracing::subscriber::set_global_default(subscriber).ok();
        }
        "compact" => {
            let subscriber = Registry::default().with(env_filter).with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr),
            );
            tracing::subscriber::set_global_default(subscriber).ok();
        }
        _ => {
            let subscriber = Registry::default().with(env_filter).with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr),
            );
            tracing::subscriber::set_global_default(subscriber).ok();
        }
    }
}

fn variant_for(full: bool) -> SchemaVariant {
    if full {
        SchemaVariant::Full
    } else {
        SchemaVariant::Simple
    }
}

fn schema_cache(config: &BloomgenConfig) -> SchemaCache {
    SchemaCache::new(&config.cache.schema_path, &config.cache.full_schema_path)
}

/// Cached snapshot when allowed; database credentials are only required for a live fetch
async fn load_schema(
    config: &BloomgenConfig,
    variant: SchemaVariant,
    use_cache: bool,
) -> Result<SchemaSnapshot> {
    let cache = schema_cache(config);
    if use_cache {
        if let Some(snapshot) = cache.read(variant) {
            return Ok(snapshot);
        }
    }

    let credentials = config.neo4j.credentials()?;
    let fetcher = Neo4jSchemaFetcher::new(credentials);
    let snapshot = cache
        .load_or_fetch(&fetcher, variant, false)
        .await
        .context("Failed to fetch the database schema")?;
    Ok(snapshot)
}

fn print_schema_summary(snapshot: &SchemaSnapshot) {
    println!("{}", format!("Schema ({})", snapshot.variant).blue().bold());
    println!("  Labels: {}", snapshot.labels.len().to_string().yellow());
    for (label, properties) in &snapshot.labels {
        println!("    {} ({} properties)", label.green(), properties.len());
    }
    println!(
        "  Relationship types: {}",
        snapshot.relationship_types.len().to_string().yellow()
    );
    for pattern in &snapshot.relationships {
        println!(
            "    (:{})-[:{}]->(:{})",
            pattern.start,
            pattern.rel_type.cyan(),
            pattern.end
        );
    }
    if snapshot.variant == SchemaVariant::Full {
        println!("  Constraints: {}", snapshot.constraints.len());
        println!("  Indexes: {}", snapshot.indexes.len());
    }
}

async fn handle_schema_fetch(config: &BloomgenConfig, full: bool, refresh: bool) -> Result<()> {
    let variant = variant_for(full);
    let snapshot = load_schema(config, variant, !refresh).await?;
    print_schema_summary(&snapshot);
    println!(
        "\n{} {}",
        "Schema cache:".cyan(),
        schema_cache(config).path(variant).display()
    );
    Ok(())
}

fn handle_schema_show(config: &BloomgenConfig, full: bool) -> Result<()> {
    let variant = variant_for(full);
    let cache = schema_cache(config);
    let Some(snapshot) = cache.read(variant) else {
        bail!(
            "No cached {} schema at {}; run `bloomgen schema fetch{}` first",
            variant,
            cache.path(variant).display(),
            if full { " --full" } else { "" }
        );
    };
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

async fn handle_generate_llm(
    config: &BloomgenConfig,
    count: Option<usize>,
    strategy: Option<GenerationStrategy>,
    output: Option<PathBuf>,
) -> Result<()> {
    let settings = &config.generation;
    let strategy = strategy.unwrap_or(settings.strategy);

    let mut policy = PromptPolicy::from_settings(settings);
    if let Some(count) = count {
        if count == 0 {
            bail!("--count must be at least 1");
        }
        policy = policy.exactly(count);
    }

    let schema = load_schema(config, SchemaVariant::Simple, true).await?;
    let corpus = ExampleCorpus::load(&settings.examples_dir)
        .with_context(|| format!("Failed to load examples from {}", settings.examples_dir.display()))?;
    info!("Loaded {} example perspective(s)", corpus.len());

    let provider = LLMProviderFactory::create_from_config(&config.llm)?;
    let generator = LlmPerspectiveGenerator::new(provider, strategy)
        .with_llm_config(&config.llm)
        .with_policy(policy);

    let output_dir = output.unwrap_or_else(|| settings.output_dir.clone());
    let mut writer = PerspectiveWriter::new(&output_dir).pretty(settings.pretty_output);

    println!("{}", "Generating perspectives...".green().bold());
    let report = generator.generate(&schema, &corpus, &mut writer).await?;

    for (name, path) in report.names.iter().zip(&report.written) {
        println!("  {} {} -> {}", "✓".green(), name, path.display());
    }
    for failure in &report.failures {
        println!("  {} {}: {}", "✗".red(), failure.slot, failure.error);
    }
    println!(
        "\n{} written, {} failed (output: {})",
        report.written.len().to_string().green(),
        report.failures.len().to_string().red(),
        output_dir.display()
    );

    if report.written.is_empty() {
        bail!("No perspective was generated");
    }
    Ok(())
}

async fn handle_generate_declared(
    config: &BloomgenConfig,
    file: &Path,
    with_schema: bool,
    hide_unused: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let declaration = PerspectiveDeclaration::load(file)?;

    let schema = if with_schema || hide_unused {
        Some(load_schema(config, SchemaVariant::Simple, true).await?)
    } else {
        None
    };

    let mut generator = ProgrammaticGenerator::new();
    if let Some(schema) = &schema {
        generator = generator.with_schema(schema, hide_unused);
    }

    let output_dir = output.unwrap_or_else(|| config.generation.output_dir.clone());
    let mut writer = PerspectiveWriter::new(&output_dir).pretty(config.generation.pretty_output);
    let path = generator.generate(&declaration, &mut writer)?;

    println!(
        "{} Created perspective '{}': {}",
        "✓".green(),
        declaration.name,
        path.display()
    );
    Ok(())
}

fn handle_check(files: &[PathBuf]) -> Result<()> {
    let mut incomplete = 0;

    for file in files {
        let report = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))
            .and_then(|content| {
                serde_json::from_str::<serde_json::Value>(&content)
                    .with_context(|| format!("{} is not valid JSON", file.display()))
            });

        match report {
            Ok(doc) => {
                let missing = missing_required_fields(&doc);
                if missing.is_empty() {
                    println!("{} {}", "✓".green(), file.display());
                } else {
                    incomplete += 1;
                    println!("{} {}", "✗".red(), file.display());
                    for field in missing {
                        println!("    missing {}", field.yellow());
                    }
                }
            }
            Err(e) => {
                incomplete += 1;
                println!("{} {}: {:#}", "✗".red(), file.display(), e);
            }
        }
    }

    if incomplete > 0 {
        bail!("{} of {} file(s) are not importable", incomplete, files.len());
    }
    Ok(())
}

fn handle_config_init(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?
            .join(".bloomgen")
            .join("config.toml"),
    };

    if path.exists() && !force {
        println!("⚠️  Configuration file already exists: {}", path.display());
        println!("   Use --force to overwrite");
        return Ok(());
    }

    ConfigManager::create_default_config(&path).context("Failed to create config.toml")?;
    println!("{} Created config file: {}", "✓".green(), path.display());
    println!("{}", "Next steps:".yellow().bold());
    println!("  1. Set NEO4J_URI, NEO4J_USERNAME and NEO4J_PASSWORD (or edit [neo4j])");
    println!("  2. Set GEMINI_API_KEY, or choose another provider under [llm]");
    println!("  3. Run `bloomgen schema fetch`");
    Ok(())
}

fn handle_config_show(config_mgr: &ConfigManager, json: bool) -> Result<()> {
    let config = config_mgr.config();

    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    let set_or_missing = |value: &Option<String>| {
        if value.as_deref().is_some_and(|v| !v.is_empty()) {
            "set".green()
        } else {
            "not set".red()
        }
    };

    println!("{}", "Current Configuration:".blue().bold());
    match config_mgr.config_path() {
        Some(path) => println!("  File: {}", path.display()),
        None => println!("  File: {}", "(defaults and environment only)".yellow()),
    }

    println!("\n  {}", "Neo4j:".green().bold());
    println!(
        "    URI: {}",
        config.neo4j.uri.as_deref().unwrap_or("(not set)").yellow()
    );
    println!(
        "    Username: {}",
        config.neo4j.username.as_deref().unwrap_or("(not set)")
    );
    println!("    Password: {}", set_or_missing(&config.neo4j.password));
    if let Some(database) = config.neo4j.database.as_deref() {
        println!("    Database: {}", database);
    }

    println!("\n  {}", "LLM Settings:".green().bold());
    println!("    Provider: {}", config.llm.provider.yellow());
    if let Some(model) = config.llm.model.as_deref() {
        println!("    Model: {}", model.yellow());
    }
    if let Some(base_url) = config.llm.base_url.as_deref() {
        println!("    Base URL: {}", base_url);
    }
    println!("    API key: {}", set_or_missing(&config.llm.api_key));
    println!("    Temperature: {}", config.llm.temperature);

    println!("\n  {}", "Generation:".green().bold());
    println!("    Strategy: {}", config.generation.strategy);
    println!(
        "    Perspectives: {}-{}",
        config.generation.min_perspectives, config.generation.max_perspectives
    );
    println!("    Examples: {}", config.generation.examples_dir.display());
    println!("    Output: {}", config.generation.output_dir.display());

    println!("\n  {}", "Schema cache:".green().bold());
    println!("    Simple: {}", config.cache.schema_path.display());
    println!("    Full: {}", config.cache.full_schema_path.display());
    Ok(())
}
