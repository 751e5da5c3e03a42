use serde_json::Value;

/// 比较操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
}

/// 过滤表达式语法树
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// 字面量：字符串、数字、布尔、null
    Literal(Value),
    /// 当前行上的字段
    Field(String),
    /// `[data.<path>]`：在求值时从目标记录读取
    Record(String),
    List(Vec<Expr>),
    Call { name: String, args: Vec<Expr> },
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// 收集表达式引用的目标记录路径（去重，保持首次出现顺序）
    pub fn record_paths(&self) -> Vec<&str> {
        let mut paths = Vec::new();
        self.collect_record_paths(&mut paths);
        paths
    }

    fn collect_record_paths<'a>(&'a self, paths: &mut Vec<&'a str>) {
        match self {
            Self::Record(path) => {
                if !paths.contains(&path.as_str()) {
                    paths.push(path);
                }
            }
            Self::List(items) | Self::Call { args: items, .. } => {
                for item in items {
                    item.collect_record_paths(paths);
                }
            }
            Self::Compare { left, right, .. } | Self::And(left, right) | Self::Or(left, right) => {
                left.collect_record_paths(paths);
                right.collect_record_paths(paths);
            }
            Self::Not(inner) => inner.collect_record_paths(paths),
            Self::Literal(_) | Self::Field(_) => {}
        }
    }
}
