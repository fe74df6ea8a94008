mod audit;
mod cli;
mod config;
mod error;
mod input;
mod records;
mod registry;
mod rules;
mod session;
mod storage;

use anyhow::Result;
use clap::Parser;
use std::cell::RefCell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "vfarm",
    about = "Applicant and vertical-farm site registry"
)]
pub struct Args {
    #[arg(long, env = "VFARM_DATA_DIR", help = "Directory holding the JSON data files")]
    pub data_dir: Option<PathBuf>,

    #[arg(long, help = "Config file path")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Audit log directory")]
    pub audit_dir: Option<PathBuf>,

    #[arg(long, help = "Do not write an audit log")]
    pub no_audit: bool,

    #[arg(long, help = "Print the effective configuration and exit")]
    pub show_config: bool,

    #[arg(long, help = "Debug output (print settings and error details)")]
    pub debug: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut cfg = if let Some(config_path) = &args.config {
        config::Config::load_from(config_path)?
    } else {
        config::Config::load().unwrap_or_else(|e| {
            eprintln!("Warning: failed to load config, using defaults: {}", e);
            config::Config::default()
        })
    };

    // CLI overrides
    if let Some(dir) = &args.data_dir {
        cfg.storage.data_dir = Some(dir.clone());
    }
    if let Some(dir) = &args.audit_dir {
        cfg.audit.dir = Some(dir.clone());
    }
    if args.no_audit {
        cfg.audit.enabled = false;
    }

    if let Err(errors) = cfg.validate() {
        for error in &errors {
            eprintln!("Config error {}", error);
        }
        return Err(anyhow::anyhow!(
            "Invalid configuration ({} errors)",
            errors.len()
        ));
    }

    let root = std::env::current_dir()?;
    let data_dir = cfg.storage.resolve_data_dir(&root);

    if args.show_config {
        println!("Storage:");
        println!("  data_dir: {}", data_dir.display());
        println!("  users_file: {}", cfg.storage.users_file);
        println!("  sites_file: {}", cfg.storage.sites_file);
        println!("Admin:");
        println!("  username: {}", cfg.admin.username);
        println!("  password: <hidden>");
        println!("Audit:");
        println!("  enabled: {}", cfg.audit.enabled);
        if let Some(dir) = &cfg.audit.dir {
            println!("  dir: {}", dir.display());
        }
        return Ok(());
    }

    if args.debug {
        eprintln!("[DEBUG] Data dir: {}", data_dir.display());
        eprintln!(
            "[DEBUG] Files: {}, {}",
            cfg.storage.users_file, cfg.storage.sites_file
        );
        eprintln!("[DEBUG] Audit enabled: {}", cfg.audit.enabled);
    }

    let storage = storage::Storage::new(&data_dir, &cfg.storage.users_file, &cfg.storage.sites_file);
    let (registry, warnings) = registry::Registry::open(storage, cfg.admin.clone());

    let session_id = uuid::Uuid::new_v4().to_string();
    let audit = if cfg.audit.enabled {
        let audit_dir = cfg
            .audit
            .dir
            .clone()
            .unwrap_or_else(|| root.join(".vfarm").join("audit"));
        std::fs::create_dir_all(&audit_dir)?;
        let audit_path = audit_dir.join(format!("{}.jsonl", session_id));
        audit::AuditLog::new(&audit_path, &session_id)?
    } else {
        audit::AuditLog::disabled(&session_id)
    };

    let ctx = cli::Context {
        args,
        root,
        registry: RefCell::new(registry),
        audit: RefCell::new(audit),
    };

    for warning in &warnings {
        cli::warn_load(&ctx, warning);
    }
    {
        let registry = ctx.registry.borrow();
        if let Err(e) = ctx.audit.borrow_mut().session_start(
            &data_dir,
            registry.user_count(),
            registry.site_count(),
        ) {
            eprintln!("Warning: failed to write audit log: {}", e);
        }
    }

    cli::run_repl(ctx)
}
