//! 记录规则引擎命令行入口

mod cli;

use anyhow::Result;
use clap::Parser;
use rules_shared::config::AppConfig;
use rules_shared::observability;

use crate::cli::{Cli, CommandRunner, Commands};

const SERVICE_NAME: &str = "rule-engine";

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // 配置加载失败时使用默认配置继续执行
    let loaded = match &cli.config_dir {
        Some(dir) => AppConfig::load_from(dir, SERVICE_NAME),
        None => AppConfig::load(SERVICE_NAME),
    };
    let mut config = loaded.unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig {
            service_name: SERVICE_NAME.to_string(),
            ..Default::default()
        }
    });

    if let Some(level) = &cli.log_level {
        config.observability.log_level = level.clone();
    }
    observability::init(&config.service_name, &config.observability)?;

    let runner = CommandRunner::new(config);

    let output = match cli.command {
        Commands::Apply { data, rules } => runner.run_apply(&data, rules.as_deref())?,
        Commands::FirstMatch { data, group, order } => {
            runner.run_first_match(&data, &group, order.as_deref())?
        }
        Commands::Filter { rows, expr, record } => {
            runner.run_filter(&rows, &expr, record.as_deref())?
        }
    };

    println!("{}", output);
    Ok(())
}
