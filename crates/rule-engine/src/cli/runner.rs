//! 命令执行器
//!
//! 将命令行参数转化为规则引擎调用，返回要输出的文本。

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use tracing::{debug, info};

use rule_engine::{Bridge, EvalContext, Expression, PriorityGroup, PriorityGroupDef, PriorityOrder};
use rules_shared::config::AppConfig;

pub struct CommandRunner {
    config: AppConfig,
    bridge: Bridge,
}

impl CommandRunner {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            bridge: Bridge::new(),
        }
    }

    /// 执行 apply 命令
    pub fn run_apply(&self, data: &Path, rules: Option<&Path>) -> Result<String> {
        let rules_path = match rules {
            Some(path) => path.to_path_buf(),
            None => self
                .config
                .engine
                .rules_file
                .as_ref()
                .map(PathBuf::from)
                .ok_or_else(|| anyhow!("未指定规则文件：使用 --rules 或配置 engine.rules_file"))?,
        };

        let record = read_file(data)?;
        let rules = read_file(&rules_path)?;
        info!(rules = %rules_path.display(), "应用规则列表");

        Ok(self.bridge.apply_json_to_string(&record, &rules))
    }

    /// 执行 first-match 命令
    ///
    /// 顺序优先级：命令行参数 > 规则组文件 > 配置。
    pub fn run_first_match(&self, data: &Path, group: &Path, order: Option<&str>) -> Result<String> {
        let record: Value = serde_json::from_str(&read_file(data)?)
            .with_context(|| format!("解析记录失败: {}", data.display()))?;
        let def_json = read_file(group)?;
        let def_value: Value = serde_json::from_str(&def_json)
            .with_context(|| format!("解析规则组失败: {}", group.display()))?;
        let has_order = def_value.get("order").is_some();
        let def: PriorityGroupDef = serde_json::from_value(def_value)
            .with_context(|| format!("解析规则组失败: {}", group.display()))?;

        let order = match order {
            Some(order) => order.parse::<PriorityOrder>()?,
            None if has_order => def.order,
            None => self.config.engine.priority_order.parse::<PriorityOrder>()?,
        };

        let group = PriorityGroup::from_def(def);
        info!(group = %group.key(), %order, rules = group.len(), "应用规则组");

        let output = match group.apply_in(EvalContext::shared_default(), &record, order) {
            Ok(Some(result)) => serde_json::to_string_pretty(&result)?,
            Ok(None) => Value::Null.to_string(),
            Err(rejection) => rejection.to_string(),
        };
        Ok(output)
    }

    /// 执行 filter 命令
    pub fn run_filter(&self, rows: &Path, expr: &str, record: Option<&Path>) -> Result<String> {
        let expression = Expression::parse(expr).context("过滤表达式无效")?;
        let rows: Value = serde_json::from_str(&read_file(rows)?)
            .with_context(|| format!("解析数据行失败: {}", rows.display()))?;
        let record: Value = match record {
            Some(path) => serde_json::from_str(&read_file(path)?)
                .with_context(|| format!("解析记录失败: {}", path.display()))?,
            None => Value::Object(Default::default()),
        };

        let rows = rows
            .as_array()
            .ok_or_else(|| anyhow!("数据行文件必须是 JSON 数组"))?;

        let ctx = EvalContext::shared_default();
        let scope = ctx.scope(&record);
        let mut kept = Vec::new();
        for row in rows {
            match expression.eval(row, &scope) {
                Ok(true) => kept.push(row.clone()),
                Ok(false) => {}
                Err(e) => debug!(error = %e, "行求值失败，跳过"),
            }
        }

        info!(total = rows.len(), kept = kept.len(), "过滤完成");
        Ok(serde_json::to_string_pretty(&Value::Array(kept))?)
    }
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("读取文件失败: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fixture {
        dir: PathBuf,
    }

    impl Fixture {
        fn new(name: &str) -> Self {
            let dir = std::env::temp_dir().join(format!("rule-engine-cli-{}-{}", name, std::process::id()));
            fs::create_dir_all(&dir).unwrap();
            Self { dir }
        }

        fn write(&self, name: &str, value: &Value) -> PathBuf {
            let path = self.dir.join(name);
            fs::write(&path, value.to_string()).unwrap();
            path
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.dir);
        }
    }

    fn adult_rule(id: &str) -> Value {
        json!({"id": id, "conditions": [
            {"operator": "AND", "condition": [{"field": "age", "operator": "gte", "value": 18}]}
        ]})
    }

    #[test]
    fn test_run_apply() {
        let fx = Fixture::new("apply");
        let data = fx.write("record.json", &json!({"age": 30}));
        let rules = fx.write("rules.json", &json!([adult_rule("r1")]));

        let runner = CommandRunner::new(AppConfig::default());
        let output = runner.run_apply(&data, Some(&rules)).unwrap();
        assert_eq!(output, r#"[{"age":30}]"#);
    }

    #[test]
    fn test_run_apply_requires_rules() {
        let fx = Fixture::new("apply-missing");
        let data = fx.write("record.json", &json!({"age": 30}));
        let runner = CommandRunner::new(AppConfig::default());
        assert!(runner.run_apply(&data, None).is_err());
    }

    #[test]
    fn test_run_first_match_order_override() {
        let fx = Fixture::new("first-match");
        let data = fx.write("record.json", &json!({"age": 30}));
        let group = fx.write(
            "group.json",
            &json!({"key": "g", "order": "lowest", "rules": [
                {"priority": 1, "rule": {"id": "low", "error_msg": "low", "error_action": "warning",
                    "conditions": [{"operator": "AND", "condition": [{"field": "age", "operator": "lt", "value": 18}]}]}},
                {"priority": 9, "rule": adult_rule("high")}
            ]}),
        );

        let runner = CommandRunner::new(AppConfig::default());
        let lowest = runner.run_first_match(&data, &group, None).unwrap();
        assert_eq!(lowest, r#"{"error_msg":"low","error_action":"warning"}"#);

        let highest = runner.run_first_match(&data, &group, Some("highest")).unwrap();
        let parsed: Value = serde_json::from_str(&highest).unwrap();
        assert_eq!(parsed, json!({"age": 30}));
    }

    #[test]
    fn test_run_filter() {
        let fx = Fixture::new("filter");
        let rows = fx.write(
            "rows.json",
            &json!([{"code": "A", "region": "north"}, {"code": "B", "region": "south"}]),
        );
        let record = fx.write("record.json", &json!({"region": "south"}));

        let runner = CommandRunner::new(AppConfig::default());
        let output = runner
            .run_filter(&rows, "region == [data.region]", Some(&record))
            .unwrap();
        let parsed: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed, json!([{"code": "B", "region": "south"}]));

        assert!(runner.run_filter(&rows, "region ==", None).is_err());
    }
}
