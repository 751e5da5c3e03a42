//! CLI 命令定义

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// 记录规则引擎命令行工具
#[derive(Parser, Debug)]
#[command(name = "rule-engine")]
#[command(version, about = "记录规则引擎")]
#[command(propagate_version = true)]
pub struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)，覆盖配置文件
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// 配置目录，默认读取 CONFIG_DIR 或 ./config
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 对记录依次应用规则列表
    ///
    /// 输出每条规则的结果（未匹配为 null），遇到拒绝时输出拒绝内容。
    Apply {
        /// 记录文件（JSON）
        #[arg(short, long)]
        data: PathBuf,

        /// 规则列表文件（JSON 数组），缺省时使用配置中的 engine.rules_file
        #[arg(short, long)]
        rules: Option<PathBuf>,
    },

    /// 按优先级应用规则组
    FirstMatch {
        /// 记录文件（JSON）
        #[arg(short, long)]
        data: PathBuf,

        /// 规则组文件（JSON）
        #[arg(short, long)]
        group: PathBuf,

        /// 评估顺序：highest 或 lowest，缺省时使用规则组文件或配置中的设置
        #[arg(short, long)]
        order: Option<String>,
    },

    /// 用过滤表达式筛选数据行
    Filter {
        /// 数据行文件（JSON 数组）
        #[arg(long)]
        rows: PathBuf,

        /// 过滤表达式
        #[arg(short, long)]
        expr: String,

        /// 供 `[data.<path>]` 引用的目标记录文件
        #[arg(long)]
        record: Option<PathBuf>,
    },
}
