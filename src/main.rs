use anyhow::Context;
use clap::Parser;
use roster_import::config::parse_resolutions;
use roster_import::core::ImportApi;
use roster_import::domain::model::{ExecuteResult, PreviewResult};
use roster_import::domain::ports::Storage;
use roster_import::utils::error::ErrorSeverity;
use roster_import::utils::logger::{self, LogFormat};
use roster_import::utils::validation::Validate;
use roster_import::{
    BatchImportService, CliConfig, Command, ImportConfig, ImportError, ImportWizard,
    InMemoryDirectory, LocalStorage, RestApiClient, RosterFile, StepKind,
};
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    logger::init_logger(LogFormat::from_json_flag(cli.json_logs), cli.verbose);
    tracing::debug!("CLI config: {:?}", cli);

    if let Err(e) = cli.validate() {
        tracing::error!("❌ Argument validation failed: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let config = load_config(&cli)?;

    if let Err(e) = run(&cli, config.as_ref()).await {
        tracing::error!(
            "❌ Import failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());

        // 根據錯誤嚴重程度決定退出碼
        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

/// A config file is required unless the command never talks to the API.
fn load_config(cli: &CliConfig) -> anyhow::Result<Option<ImportConfig>> {
    let offline = matches!(cli.command, Command::Run { dry_run: true, .. });

    if !cli.config.exists() {
        if offline || matches!(cli.command, Command::Preview { .. }) {
            tracing::warn!(
                "⚠️ {} not found; existing volunteers will not be checked",
                cli.config.display()
            );
            return Ok(None);
        }
        return Err(ImportError::MissingConfigError {
            field: format!("api ({} not found)", cli.config.display()),
        })
        .context("a config file is required unless --dry-run is given");
    }

    let config = ImportConfig::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    config.validate().context("validating configuration")?;
    Ok(Some(config))
}

fn build_api(config: Option<&ImportConfig>, dry_run: bool) -> roster_import::Result<Box<dyn ImportApi>> {
    match config {
        Some(config) if !dry_run => {
            let client = Arc::new(RestApiClient::from_config(&config.api)?);
            tracing::info!("🌐 Using scheduling API at {}", config.base_url());
            Ok(Box::new(BatchImportService::with_session_ttl(
                client.clone(),
                client,
                config.session_ttl_minutes(),
            )))
        }
        _ => {
            tracing::info!("🧪 Using an in-memory directory (dry run or no API configured)");
            let backend = Arc::new(InMemoryDirectory::new());
            Ok(Box::new(BatchImportService::new(backend.clone(), backend)))
        }
    }
}

async fn run(cli: &CliConfig, config: Option<&ImportConfig>) -> roster_import::Result<()> {
    let storage = LocalStorage::new(".");
    let report_dir = config
        .map(|c| c.report_path().to_string())
        .unwrap_or_else(|| "./output".to_string());

    let roster_path = cli.command.roster_file();
    let file = RosterFile::new(
        roster_path.to_string_lossy(),
        storage.read_file(&roster_path.to_string_lossy()).await?,
    );

    match &cli.command {
        Command::Preview { .. } => {
            let api = build_api(config, false)?;
            let preview = api.preview(&file).await?;
            print_preview(&preview);
            write_report(&storage, &report_dir, "preview", &preview).await?;
        }
        Command::Run {
            resolutions,
            dry_run,
            ..
        } => {
            let api = build_api(config, *dry_run)?;
            let resolutions = match resolutions {
                Some(path) => {
                    let name = path.to_string_lossy();
                    parse_resolutions(&name, &storage.read_file(&name).await?)?
                }
                None => Vec::new(),
            };

            let mut wizard = ImportWizard::new();
            wizard.upload(api.as_ref(), &file).await?;
            if let Some(preview) = wizard.step().preview() {
                print_preview(preview);
                if preview.has_validation_errors() {
                    return Err(ImportError::InvalidFormat {
                        message: format!(
                            "{} has {} validation errors",
                            file.file_name,
                            preview.validation_errors.len()
                        ),
                    });
                }
            }

            if wizard.step().kind() == StepKind::Conflicts {
                for resolution in resolutions {
                    wizard.set_resolution(resolution)?;
                }
                wizard.go_to_preview()?;
            } else if !resolutions.is_empty() {
                tracing::warn!("⚠️ No conflicts found; ignoring {} resolutions", resolutions.len());
            }

            let result = wizard.execute(api.as_ref()).await?;
            print_result(&result);
            write_report(&storage, &report_dir, "execute", &result).await?;
        }
    }

    Ok(())
}

fn print_preview(preview: &PreviewResult) {
    if preview.has_validation_errors() {
        println!("❌ {} validation errors:", preview.validation_errors.len());
        for error in &preview.validation_errors {
            println!("   - [{:?}] {}", error.error_type, error.message);
        }
        return;
    }

    println!(
        "📋 {} departments, {} volunteers",
        preview.total_departments, preview.total_volunteers
    );
    for department in &preview.departments {
        println!(
            "   {} (head: {}, {} members)",
            department.department_name,
            department.head_name,
            department.members.len()
        );
    }
    if preview.has_conflicts() {
        println!("⚠️ {} conflicts:", preview.conflicts.len());
        for conflict in &preview.conflicts {
            let places: Vec<_> = conflict
                .occurrences
                .iter()
                .map(|o| o.department_name.as_str())
                .collect();
            println!(
                "   - {} [{:?}] in {}",
                conflict.volunteer_name,
                conflict.conflict_type,
                places.join(", ")
            );
        }
    }
    if let Some(session_id) = &preview.session_id {
        println!("🔑 Session: {}", session_id);
    }
}

fn print_result(result: &ExecuteResult) {
    println!("✅ Import completed successfully!");
    println!(
        "   {} departments created, {} volunteers created, {} reused",
        result.departments_created, result.volunteers_created, result.volunteers_reused
    );
}

async fn write_report<T: serde::Serialize>(
    storage: &LocalStorage,
    report_dir: &str,
    kind: &str,
    report: &T,
) -> roster_import::Result<()> {
    let file_name = format!(
        "{}-{}.json",
        kind,
        chrono::Utc::now().format("%Y%m%dT%H%M%S")
    );
    let path = Path::new(report_dir).join(file_name);
    let data = serde_json::to_vec_pretty(report)?;
    storage.write_file(&path.to_string_lossy(), &data).await?;

    tracing::info!("📁 Report saved to: {}", path.display());
    println!("📁 Report saved to: {}", path.display());
    Ok(())
}
