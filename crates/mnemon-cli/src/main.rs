//! mnemon - operational CLI for the memory triage engine.

use clap::{Parser, Subcommand};
use mnemon_core::{
    AuditLog, EngineConfig, LedgerStore, MemoryOrchestrator, MnemonResult, PromotionRefs,
    ScoredResult, SensePayload, StoreConfig,
};
use mnemon_stores::{FsWaveStore, SqliteLedgerStore, SqliteReportStore};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "mnemon", about = "Memory triage and dual-store persistence engine")]
#[command(version)]
struct Cli {
    /// Directory holding rules.json / user_heuristics.json / self_heuristics.json
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Data directory (ledger db, wave snapshots, audit log). Defaults to ~/.mnemon
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify one piece of content and print the OUT verdict
    Run {
        #[arg(long)]
        context: String,
        #[arg(long)]
        sense: String,
        /// Set the novelty_hint meta flag
        #[arg(long)]
        novelty: bool,
        /// Promote to durable storage on a bifurcated PASS
        #[arg(long)]
        promote: bool,
        /// Force a durable save regardless of verdict
        #[arg(long = "override")]
        force: bool,
    },

    /// Classify and promote on a bifurcated PASS
    Promote {
        #[arg(long)]
        context: String,
        #[arg(long)]
        sense: String,
    },

    /// Classify and force a durable save regardless of verdict
    Override {
        #[arg(long)]
        context: String,
        #[arg(long)]
        sense: String,
        #[arg(long, default_value = "cli override")]
        reason: String,
    },

    /// List the verification queue, or confirm one report
    Verify {
        /// Mark the given report as verified by a reviewer
        #[arg(long)]
        confirm: Option<String>,
    },

    /// Purge resolved reports and recompute the verification queue
    Maintain,

    /// Copy the ledger, wave snapshots, and audit log to a directory
    Backup {
        #[arg(short, long, default_value = "mnemon-backup")]
        output: PathBuf,
    },

    /// Export all ledger rows as JSON Lines
    Export {
        #[arg(short, long, default_value = "memories.jsonl")]
        output: PathBuf,
    },
}

struct Engine {
    orchestrator: MemoryOrchestrator,
    ledger: Arc<SqliteLedgerStore>,
    stores: StoreConfig,
}

async fn build_engine(cli: &Cli) -> MnemonResult<Engine> {
    let config = match &cli.config_dir {
        Some(dir) => EngineConfig::load_dir(dir)?,
        None => EngineConfig::default(),
    };
    let stores = match &cli.data_dir {
        Some(dir) => StoreConfig::under(dir),
        None => StoreConfig::default(),
    };

    let ledger = Arc::new(SqliteLedgerStore::new(&stores.ledger_db_path)?);
    let wave = Arc::new(FsWaveStore::new(&stores.wave_dir));
    let reports = Arc::new(SqliteReportStore::new(&stores.ledger_db_path)?);
    let audit = AuditLog::new(&stores.audit_log_path);

    let orchestrator = MemoryOrchestrator::new(&config, ledger.clone(), wave, audit)?
        .with_allow_user_force_save(stores.allow_user_force_save)
        .with_report_store(reports);
    orchestrator.load_persisted_reports().await?;

    Ok(Engine {
        orchestrator,
        ledger,
        stores,
    })
}

fn out_json(out: &ScoredResult) -> serde_json::Value {
    serde_json::json!({
        "verdict": out.verdict,
        "w_total": out.w_total(),
        "gamma": out.gamma,
        "bifurcation": out.bifurcation,
        "weights": out.weights,
    })
}

fn refs_json(refs: &Option<PromotionRefs>) -> serde_json::Value {
    match refs {
        Some(refs) => serde_json::json!({
            "memorise_id": refs.memorise_id,
            "tsm_ref": refs.tsm_ref,
            "wpm_ref": refs.wpm_ref,
        }),
        None => serde_json::Value::Null,
    }
}

async fn classify(
    engine: &Engine,
    context: &str,
    sense: &str,
    novelty: bool,
) -> MnemonResult<(mnemon_core::DataVector, ScoredResult)> {
    let meta = if novelty {
        let mut meta = HashMap::new();
        meta.insert("novelty_hint".to_string(), serde_json::json!(true));
        Some(meta)
    } else {
        None
    };
    let mut vector =
        engine
            .orchestrator
            .capture(context, SensePayload::text(sense), None, None, meta);
    let out = engine.orchestrator.run_tmp(&mut vector).await?;
    Ok((vector, out))
}

async fn run(cli: Cli) -> MnemonResult<()> {
    let engine = build_engine(&cli).await?;

    match cli.command {
        Commands::Run {
            context,
            sense,
            novelty,
            promote,
            force,
        } => {
            let (vector, out) = classify(&engine, &context, &sense, novelty).await?;
            let mut output = serde_json::json!({
                "data_vector_id": vector.id,
                "out": out_json(&out),
            });

            if promote {
                let refs = engine
                    .orchestrator
                    .promote_if_bifurcated(&vector, &out, None, None)
                    .await?;
                output["promoted"] = refs_json(&refs);
            }
            if force {
                let refs = engine
                    .orchestrator
                    .user_force_save(&vector, &out, "cli override", None, None)
                    .await?;
                output["overridden"] = refs_json(&refs);
            }
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Commands::Promote { context, sense } => {
            let (vector, out) = classify(&engine, &context, &sense, false).await?;
            let refs = engine
                .orchestrator
                .promote_if_bifurcated(&vector, &out, None, None)
                .await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "out": out_json(&out),
                    "promoted": refs_json(&refs),
                }))?
            );
        }

        Commands::Override {
            context,
            sense,
            reason,
        } => {
            let (vector, out) = classify(&engine, &context, &sense, false).await?;
            let refs = engine
                .orchestrator
                .user_force_save(&vector, &out, &reason, None, None)
                .await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "out": out_json(&out),
                    "saved": refs_json(&refs),
                }))?
            );
        }

        Commands::Verify { confirm } => {
            if let Some(report_id) = confirm {
                let confirmed = engine.orchestrator.mark_verified(&report_id).await?;
                println!(
                    "{}",
                    serde_json::json!({ "report_id": report_id, "confirmed": confirmed })
                );
            } else {
                let queue = engine.orchestrator.verification_queue();
                // An empty queue is a success, not an error.
                println!("{}", serde_json::to_string_pretty(&queue)?);
            }
        }

        Commands::Maintain => {
            let summary = engine.orchestrator.daily_maintenance().await;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Commands::Backup { output } => {
            tokio::fs::create_dir_all(&output).await?;
            let mut copied = Vec::new();
            for path in [&engine.stores.ledger_db_path, &engine.stores.audit_log_path] {
                if path.exists() {
                    let dest = output.join(path.file_name().unwrap_or_default());
                    tokio::fs::copy(path, &dest).await?;
                    copied.push(dest);
                }
            }
            if engine.stores.wave_dir.exists() {
                let dest_root = output.join("waves");
                tokio::fs::create_dir_all(&dest_root).await?;
                let mut entries = tokio::fs::read_dir(&engine.stores.wave_dir).await?;
                while let Some(entry) = entries.next_entry().await? {
                    if entry.file_type().await?.is_file() {
                        let dest = dest_root.join(entry.file_name());
                        tokio::fs::copy(entry.path(), &dest).await?;
                        copied.push(dest);
                    }
                }
            }
            println!(
                "{}",
                serde_json::json!({ "backed_up": copied.len(), "output": output })
            );
        }

        Commands::Export { output } => {
            let records = engine.ledger.list(None).await?;
            let mut lines = String::new();
            for record in &records {
                lines.push_str(&serde_json::to_string(record)?);
                lines.push('\n');
            }
            tokio::fs::write(&output, lines).await?;
            println!(
                "{}",
                serde_json::json!({ "exported": records.len(), "output": output })
            );
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        let code = e.exit_code();
        eprintln!("error: {}", e);
        std::process::exit(code);
    }
}
