//! CLI 模块
//!
//! 提供命令行接口，支持以下功能：
//!
//! - `apply` - 对记录依次应用规则列表
//! - `first-match` - 按优先级应用规则组，输出首个命中结果
//! - `filter` - 用查找过滤表达式筛选数据行
//!
//! # 使用示例
//!
//! ```bash
//! rule-engine apply --data record.json --rules rules.json
//! rule-engine first-match --data record.json --group group.json --order highest
//! rule-engine filter --rows codes.json --expr "status == 'active'" --record record.json
//! ```

pub mod commands;
pub mod runner;

pub use commands::{Cli, Commands};
pub use runner::CommandRunner;
