use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use siteseed_core::blueprint::SiteBlueprint;
use siteseed_core::bootstrap::{BootstrapOutcome, BootstrapReport, EnsureAction, run_bootstrap};
use siteseed_core::config::load_config;
use siteseed_core::migrate::{latest_version, run_migrations, unix_timestamp};
use siteseed_core::runtime::{
    InitOptions, MIGRATIONS_POLICY_MESSAGE, PathOverrides, ResolutionContext, ResolvedPaths,
    ensure_runtime_ready_for_bootstrap, init_layout, inspect_runtime, normalize_for_display,
    resolve_paths,
};
use siteseed_core::site::SiteStore;
use siteseed_core::sqlite_store::{SiteStats, SqliteSiteStore};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Parser)]
#[command(
    name = "siteseed",
    version,
    about = "Provision a storefront site's pages, navigation and theme settings exactly once"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    project_root: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH")]
    data_dir: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Print resolved runtime diagnostics")]
    diagnostics: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone)]
struct RuntimeOptions {
    project_root: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    config: Option<PathBuf>,
    diagnostics: bool,
}

impl RuntimeOptions {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            project_root: cli.project_root.clone(),
            data_dir: cli.data_dir.clone(),
            config: cli.config.clone(),
            diagnostics: cli.diagnostics,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    Init(InitArgs),
    #[command(about = "Run the one-time storefront bootstrap")]
    Bootstrap(BootstrapArgs),
    #[command(about = "Show runtime and bootstrap state without writing")]
    Status,
    Extension(ExtensionArgs),
    Db(DbArgs),
}

#[derive(Debug, Args)]
struct InitArgs {
    #[arg(long, help = "Overwrite an existing config.toml")]
    force: bool,
    #[arg(long, help = "Skip writing .siteseed/config.toml")]
    no_config: bool,
}

#[derive(Debug, Args)]
struct BootstrapArgs {
    #[arg(long, help = "Print the bootstrap report as JSON")]
    json: bool,
}

#[derive(Debug, Args)]
struct ExtensionArgs {
    #[command(subcommand)]
    command: ExtensionSubcommand,
}

#[derive(Debug, Subcommand)]
enum ExtensionSubcommand {
    List,
    Activate { name: String },
    Deactivate { name: String },
}

#[derive(Debug, Args)]
struct DbArgs {
    #[command(subcommand)]
    command: DbSubcommand,
}

#[derive(Debug, Subcommand)]
enum DbSubcommand {
    Migrate,
    Stats,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let runtime = RuntimeOptions::from_cli(&cli);

    match cli.command {
        Some(Commands::Init(args)) => run_init(&runtime, args),
        Some(Commands::Bootstrap(args)) => run_bootstrap_command(&runtime, args),
        Some(Commands::Status) => run_status(&runtime),
        Some(Commands::Extension(ExtensionArgs { command })) => match command {
            ExtensionSubcommand::List => run_extension_list(&runtime),
            ExtensionSubcommand::Activate { name } => run_extension_set(&runtime, &name, true),
            ExtensionSubcommand::Deactivate { name } => run_extension_set(&runtime, &name, false),
        },
        Some(Commands::Db(DbArgs { command })) => match command {
            DbSubcommand::Migrate => run_db_migrate(&runtime),
            DbSubcommand::Stats => run_db_stats(&runtime),
        },
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    if env_bool("SITESEED_LOG_JSON", false) {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .init();
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn run_init(runtime: &RuntimeOptions, args: InitArgs) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let report = init_layout(
        &paths,
        &InitOptions {
            materialize_config: !args.no_config,
            force: args.force,
        },
    )?;
    let migrations = run_migrations(&paths)?;

    println!("Initialized siteseed runtime layout");
    println!("project_root: {}", normalize_for_display(&paths.project_root));
    println!("state_dir: {}", normalize_for_display(&paths.state_dir));
    println!("data_dir: {}", normalize_for_display(&paths.data_dir));
    println!("db_path: {}", normalize_for_display(&paths.db_path));
    println!("config_path: {}", normalize_for_display(&paths.config_path));
    println!("created_dirs: {}", report.created_dirs.len());
    println!("wrote_config: {}", report.wrote_config);
    println!("migrations.applied: {}", migrations.applied.len());
    println!("schema_version: {}", migrations.current_version);
    if runtime.diagnostics {
        println!("\n[diagnostics]\n{}", paths.diagnostics());
    }

    Ok(())
}

fn run_bootstrap_command(runtime: &RuntimeOptions, args: BootstrapArgs) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let status = inspect_runtime(&paths)?;
    ensure_runtime_ready_for_bootstrap(&paths, &status)?;
    let config = load_config(&paths.config_path)?;
    let blueprint = SiteBlueprint::from_config(&config);

    let mut store = SqliteSiteStore::open(&paths)?;
    let report = run_bootstrap(&mut store, &blueprint, unix_timestamp()?)?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to serialize report")?
        );
    } else {
        print_bootstrap_report(&report, &config.site_url());
    }
    if runtime.diagnostics {
        println!("\n[diagnostics]\n{}", paths.diagnostics());
    }

    Ok(())
}

fn print_bootstrap_report(report: &BootstrapReport, site_url: &str) {
    println!("site bootstrap");
    println!("theme.target: {}", report.theme.target);
    println!(
        "theme.previous: {}",
        report.theme.previous.as_deref().unwrap_or("<none>")
    );
    println!("theme.switched: {}", format_flag(report.theme.switched));

    match &report.outcome {
        BootstrapOutcome::AlreadyImported { marker_value } => {
            println!("outcome: already imported");
            println!("marker.option: {}", report.marker_option);
            println!("marker.value: {marker_value}");
            return;
        }
        BootstrapOutcome::Completed { marker_written_at } => {
            println!("outcome: completed");
            println!("marker.option: {}", report.marker_option);
            println!("marker.value: {marker_written_at}");
        }
    }

    for page in &report.pages {
        println!(
            "page.{}: {} (id {})",
            page.slug,
            format_action(page.action),
            page.page_id
        );
    }
    println!(
        "front_page: {}",
        report
            .front_page_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "<unchanged>".to_string())
    );
    if let Some(menu) = &report.menu {
        println!(
            "menu: {} {} (id {})",
            menu.name,
            format_action(menu.action),
            menu.menu_id
        );
        for item in &menu.items {
            println!(
                "menu.item.{}: {} -> page {}",
                item.position, item.title, item.page_id
            );
        }
        for slug in &menu.missing_pages {
            println!("menu.skipped: {slug} (page not found)");
        }
        if let Some(location) = &menu.bound_location {
            println!("menu.location: {location}");
        }
    }
    if let Some(option) = &report.theme_settings_option {
        println!("theme_settings: {option}");
    }

    println!("next steps:");
    println!("  1. Visit {site_url}/wp-admin");
    println!("  2. Go to Appearance > Starter Templates");
    println!("  3. Search for \"Brandstore\" and import the template");
}

fn run_status(runtime: &RuntimeOptions) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let status = inspect_runtime(&paths)?;
    let config = load_config(&paths.config_path)?;

    println!("runtime status");
    println!("project_root: {}", normalize_for_display(&paths.project_root));
    println!(
        "project_root_exists: {}",
        format_flag(status.project_root_exists)
    );
    println!("state_dir_exists: {}", format_flag(status.state_dir_exists));
    println!("data_dir_exists: {}", format_flag(status.data_dir_exists));
    println!("db_exists: {}", format_flag(status.db_exists));
    println!(
        "db_size_bytes: {}",
        status
            .db_size_bytes
            .map(|size| size.to_string())
            .unwrap_or_else(|| "n/a".to_string())
    );
    println!("config_exists: {}", format_flag(status.config_exists));
    println!("pending_migrations: {}", status.pending_migrations);
    println!("site_url: {}", config.site_url());

    if status.db_exists && status.pending_migrations == 0 {
        let mut store = SqliteSiteStore::open_read_only(&paths)?;
        println!("schema_version: {}", store.schema_version()?);
        let marker = store.get_option(config.marker_option())?;
        println!("marker.option: {}", config.marker_option());
        println!(
            "marker.value: {}",
            marker
                .map(|value| value.to_string())
                .unwrap_or_else(|| "<unset>".to_string())
        );
        println!(
            "theme.active: {}",
            store.active_theme()?.as_deref().unwrap_or("<none>")
        );
        print_site_stats("site", &store.site_stats()?);

        let blueprint = SiteBlueprint::from_config(&config);
        for page in &blueprint.pages {
            match store.find_page_by_slug(&page.slug)? {
                Some(found) => println!("page.{}: {} (id {})", page.slug, found.title, found.id),
                None => println!("page.{}: <missing>", page.slug),
            }
        }
        match store.find_menu_by_name(&blueprint.menu.name)? {
            Some(menu) => {
                let items = store.menu_items(menu.id)?;
                println!("menu: {} (id {}, {} items)", menu.name, menu.id, items.len());
                for item in &items {
                    println!(
                        "menu.item.{}: {} -> page {}",
                        item.position, item.title, item.target_page_id
                    );
                }
            }
            None => println!("menu: {} <missing>", blueprint.menu.name),
        }
    } else {
        println!("site.storage: <not ready> (run `siteseed init`)");
    }

    if !status.warnings.is_empty() {
        println!("warnings:");
        for warning in &status.warnings {
            println!("  - {warning}");
        }
    }
    if runtime.diagnostics {
        println!("\n[diagnostics]\n{}", paths.diagnostics());
    }

    Ok(())
}

fn run_extension_list(runtime: &RuntimeOptions) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let store = SqliteSiteStore::open_read_only(&paths)?;
    let extensions = store.list_extensions()?;

    println!("extensions");
    if extensions.is_empty() {
        println!("extensions: <none>");
    }
    for extension in &extensions {
        println!(
            "extension.{}: {}",
            extension.name,
            if extension.active {
                "active"
            } else {
                "inactive"
            }
        );
    }
    if runtime.diagnostics {
        println!("\n[diagnostics]\n{}", paths.diagnostics());
    }

    Ok(())
}

fn run_extension_set(runtime: &RuntimeOptions, name: &str, active: bool) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let mut store = SqliteSiteStore::open(&paths)?;
    store.set_extension_active(name, active)?;

    println!(
        "extension.{}: {}",
        name.trim(),
        if active { "active" } else { "inactive" }
    );
    if runtime.diagnostics {
        println!("\n[diagnostics]\n{}", paths.diagnostics());
    }

    Ok(())
}

fn run_db_migrate(runtime: &RuntimeOptions) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let report = run_migrations(&paths)?;

    println!("db migrate");
    println!("db_path: {}", normalize_for_display(&paths.db_path));
    if report.applied.is_empty() {
        println!("migrations.applied: <none>");
    }
    for migration in &report.applied {
        println!(
            "migrations.applied: v{:03}_{}",
            migration.version, migration.name
        );
    }
    println!("schema_version: {}", report.current_version);
    println!("latest_version: {}", latest_version());
    if runtime.diagnostics {
        println!("\n[diagnostics]\n{}", paths.diagnostics());
    }

    Ok(())
}

fn run_db_stats(runtime: &RuntimeOptions) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let status = inspect_runtime(&paths)?;

    println!("db stats");
    println!("db_path: {}", normalize_for_display(&paths.db_path));
    println!("data_dir: {}", normalize_for_display(&paths.data_dir));
    println!("db_exists: {}", format_flag(status.db_exists));
    println!(
        "db_size_bytes: {}",
        status
            .db_size_bytes
            .map(|size| size.to_string())
            .unwrap_or_else(|| "n/a".to_string())
    );
    println!("pending_migrations: {}", status.pending_migrations);
    if status.db_exists && status.pending_migrations == 0 {
        let store = SqliteSiteStore::open_read_only(&paths)?;
        print_site_stats("site", &store.site_stats()?);
    } else {
        println!("site.storage: <not ready>");
        println!("policy: {MIGRATIONS_POLICY_MESSAGE}");
    }
    if runtime.diagnostics {
        println!("\n[diagnostics]\n{}", paths.diagnostics());
    }

    Ok(())
}

fn print_site_stats(prefix: &str, stats: &SiteStats) {
    println!("{prefix}.pages: {}", stats.pages);
    println!("{prefix}.options: {}", stats.options);
    println!("{prefix}.menus: {}", stats.menus);
    println!("{prefix}.menu_items: {}", stats.menu_items);
    println!("{prefix}.active_extensions: {}", stats.active_extensions);
}

fn resolve_runtime_paths(runtime: &RuntimeOptions) -> Result<ResolvedPaths> {
    let context = ResolutionContext::from_process()?;
    let overrides = PathOverrides {
        project_root: runtime.project_root.clone(),
        data_dir: runtime.data_dir.clone(),
        config: runtime.config.clone(),
    };

    let initial = resolve_paths(&context, &overrides)?;
    let project_env = initial.project_root.join(".env");
    if project_env.exists() {
        let _ = dotenvy::from_path_override(&project_env);
    }

    resolve_paths(&context, &overrides)
}

fn format_flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn format_action(action: EnsureAction) -> &'static str {
    match action {
        EnsureAction::Created => "created",
        EnsureAction::AlreadyPresent => "already present",
    }
}
