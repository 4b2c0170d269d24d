/// 参数化 SELECT 构造器。
///
/// 过滤条件一律以 `?` 占位，由 `clickhouse::query::Query::bind` 按出现顺序绑定，
/// 因此调用方绑定参数的顺序必须与条件添加的顺序一致。
#[derive(Clone, Debug, Default)]
pub struct ClickHouseQueryBuilder
{
    select_clause: String,
    from_clause: String,
    conditions: Vec<String>,
    order_by_clause: Option<String>,
    placeholders: usize,
}

impl ClickHouseQueryBuilder
{
    pub fn new() -> Self
    {
        Self::default()
    }

    // 设置SELECT子句
    pub fn select(mut self, fields: &str) -> Self
    {
        self.select_clause = format!("SELECT {}", fields);
        self
    }

    // 设置FROM子句
    pub fn from(mut self, table: &str) -> Self
    {
        self.from_clause = format!("FROM {}", table);
        self
    }

    /// 追加 `column = ?` 条件，与已有条件以 AND 连接。
    pub fn where_eq(mut self, column: &str) -> Self
    {
        self.conditions.push(format!("{} = ?", column));
        self.placeholders += 1;
        self
    }

    /// 依次追加多个 `column = ?` 条件。
    pub fn where_eq_all(self, columns: &[&str]) -> Self
    {
        columns.iter().fold(self, |builder, column| builder.where_eq(column))
    }

    /// 追加 `column = (subquery)` 条件；子查询的占位符计入本查询。
    pub fn where_eq_subquery(mut self, column: &str, subquery: ClickHouseQueryBuilder) -> Self
    {
        self.placeholders += subquery.placeholders;
        self.conditions.push(format!("{} = ({})", column, subquery.build()));
        self
    }

    // 添加ORDER BY子句
    pub fn order_by(mut self, fields: &str) -> Self
    {
        self.order_by_clause = Some(format!("ORDER BY {}", fields));
        self
    }

    /// 需要绑定的参数个数。
    pub fn placeholders(&self) -> usize
    {
        self.placeholders
    }

    // 构建最终的查询
    pub fn build(&self) -> String
    {
        let mut query = format!("{} {}", self.select_clause, self.from_clause);

        if !self.conditions.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&self.conditions.join(" AND "));
        }

        if let Some(order_by_clause) = &self.order_by_clause {
            query.push_str(&format!(" {}", order_by_clause));
        }

        query
    }
}
