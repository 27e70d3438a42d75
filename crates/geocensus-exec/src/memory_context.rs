//! In-memory execution context.
//!
//! Interprets the statement model against in-memory tables, including
//! polygon-valued geometry columns. Writes are staged per handle and applied
//! on `commit`; `rollback` discards them. Handles made with
//! [`MemoryContext::session`] share one database but keep separate
//! transactions, so concurrent partitions can commit and roll back
//! independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::trace;

use geocensus_core::geo::{QualifiedName, Resolution, Year};
use geocensus_core::id::TableId;
use geocensus_core::schema::DataType;
use geocensus_core::types::{Row, Scalar};
use geocensus_geo::{apportion, round_places, GeometryTable, Polygon, INTERPOLATION_PLACES};
use geocensus_plan::{ColumnDef, ColumnRef, Expr, Select, Statement};

use crate::context::{output_table_name, ExecutionContext};
use crate::error::ContextError;

#[derive(Debug, Clone)]
enum Value {
    Scalar(Scalar),
    Geometry(Arc<Polygon>),
}

impl Value {
    fn is_null(&self) -> bool {
        matches!(self, Value::Scalar(Scalar::Null))
    }

    fn to_scalar(&self) -> Scalar {
        match self {
            Value::Scalar(s) => s.clone(),
            Value::Geometry(p) => Scalar::Str(wkt(p)),
        }
    }

    /// Equality key for joins; `None` for NULL, which never matches.
    fn join_key(&self) -> Option<String> {
        match self {
            Value::Scalar(Scalar::Null) => None,
            Value::Scalar(Scalar::Str(s)) => Some(s.clone()),
            Value::Scalar(Scalar::I64(v)) => Some(v.to_string()),
            Value::Scalar(Scalar::F64(v)) => Some(v.to_string()),
            Value::Geometry(p) => Some(wkt(p)),
        }
    }
}

fn wkt(p: &Polygon) -> String {
    let ring = |pts: &[[f64; 2]]| {
        let mut parts: Vec<String> = pts.iter().map(|[x, y]| format!("{x} {y}")).collect();
        if let Some(first) = parts.first().cloned() {
            if parts.last() != Some(&first) {
                parts.push(first);
            }
        }
        format!("({})", parts.join(", "))
    };
    let mut rings = vec![ring(p.exterior())];
    rings.extend(p.holes().iter().map(|h| ring(h)));
    format!("POLYGON({})", rings.join(", "))
}

#[derive(Debug, Clone)]
struct MemTable {
    columns: Vec<ColumnDef>,
    rows: Vec<Vec<Value>>,
}

impl MemTable {
    fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

#[derive(Debug, Default)]
struct Database {
    tables: HashMap<QualifiedName, MemTable>,
    failures: HashMap<QualifiedName, String>,
    log: Vec<String>,
}

#[derive(Debug, Clone)]
enum Write {
    Drop(QualifiedName),
    Create(QualifiedName, Vec<ColumnDef>),
    Insert(QualifiedName, Vec<Vec<Value>>),
}

#[derive(Debug, Clone)]
pub struct MemoryContext {
    db: Arc<Mutex<Database>>,
    pending: Vec<Write>,
    schema: String,
}

impl Default for MemoryContext {
    fn default() -> Self {
        Self::new("observatory")
    }
}

impl MemoryContext {
    pub fn new(output_schema: impl Into<String>) -> Self {
        Self {
            db: Arc::new(Mutex::new(Database::default())),
            pending: Vec::new(),
            schema: output_schema.into(),
        }
    }

    /// Another handle on the same database with its own transaction.
    pub fn session(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            pending: Vec::new(),
            schema: self.schema.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create (or replace) a committed table with scalar rows.
    pub fn load_table(&self, name: QualifiedName, columns: Vec<ColumnDef>, rows: Vec<Row>) -> Result<(), ContextError> {
        let width = columns.len();
        let mut values = Vec::with_capacity(rows.len());
        for row in rows {
            if row.len() != width {
                return Err(ContextError::Evaluation(format!(
                    "row of width {} loaded into {name} with {width} columns",
                    row.len()
                )));
            }
            values.push(row.into_iter().map(Value::Scalar).collect());
        }
        self.lock().tables.insert(name, MemTable { columns, rows: values });
        Ok(())
    }

    /// Create (or replace) a committed geometry table.
    ///
    /// Rows are `(geom_id, parent_id, polygon)`; `parent_id` is stored only if
    /// the table declares a parent column.
    pub fn load_geometry(&self, table: &GeometryTable, rows: Vec<(String, Option<String>, Polygon)>) {
        let mut columns = vec![
            ColumnDef {
                name: table.geom_id.clone(),
                data_type: DataType::Text,
            },
            ColumnDef {
                name: table.geometry.clone(),
                data_type: DataType::Geometry,
            },
        ];
        if let Some(parent) = &table.parent_id {
            columns.push(ColumnDef {
                name: parent.clone(),
                data_type: DataType::Text,
            });
        }
        let has_parent = table.parent_id.is_some();
        let rows = rows
            .into_iter()
            .map(|(id, parent, poly)| {
                let mut row = vec![Value::Scalar(Scalar::Str(id)), Value::Geometry(Arc::new(poly))];
                if has_parent {
                    row.push(Value::Scalar(parent.map(Scalar::Str).unwrap_or(Scalar::Null)));
                }
                row
            })
            .collect();
        self.lock()
            .tables
            .insert(table.relation.clone(), MemTable { columns, rows });
    }

    /// Make every statement that reads `relation` fail.
    pub fn fail_reads_from(&self, relation: QualifiedName, reason: impl Into<String>) {
        self.lock().failures.insert(relation, reason.into());
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    pub fn has_table(&self, name: &QualifiedName) -> bool {
        self.lock().tables.contains_key(name)
    }

    pub fn column_names(&self, name: &QualifiedName) -> Option<Vec<String>> {
        self.lock()
            .tables
            .get(name)
            .map(|t| t.columns.iter().map(|c| c.name.clone()).collect())
    }

    /// Committed rows of `name`; geometry cells are returned as WKT text.
    pub fn rows(&self, name: &QualifiedName) -> Option<Vec<Row>> {
        self.lock().tables.get(name).map(|t| {
            t.rows
                .iter()
                .map(|r| r.iter().map(Value::to_scalar).collect())
                .collect()
        })
    }

    /// Every statement executed by any handle, rendered as SQL.
    pub fn executed(&self) -> Vec<String> {
        self.lock().log.clone()
    }

    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    /// Columns of `name` as this handle sees them: its own staged DDL first,
    /// then committed state.
    fn visible_columns(&self, db: &Database, name: &QualifiedName) -> Option<Vec<ColumnDef>> {
        for w in self.pending.iter().rev() {
            match w {
                Write::Create(n, cols) if n == name => return Some(cols.clone()),
                Write::Drop(n) if n == name => return None,
                _ => {}
            }
        }
        db.tables.get(name).map(|t| t.columns.clone())
    }

    fn insert_select(
        &self,
        db: &Database,
        target: &QualifiedName,
        columns: &[String],
        select: &Select,
    ) -> Result<Vec<Vec<Value>>, ContextError> {
        let target_cols = self
            .visible_columns(db, target)
            .ok_or_else(|| ContextError::UnknownTable(target.to_string()))?;

        let mut slots = Vec::with_capacity(columns.len());
        for c in columns {
            let pos = target_cols
                .iter()
                .position(|d| &d.name == c)
                .ok_or_else(|| ContextError::UnknownColumn {
                    relation: target.to_string(),
                    column: c.clone(),
                })?;
            slots.push(pos);
        }

        let produced = evaluate_select(db, select)?;

        let mut out = Vec::with_capacity(produced.len());
        for row in produced {
            let mut full = vec![Value::Scalar(Scalar::Null); target_cols.len()];
            for (value, &slot) in row.into_iter().zip(&slots) {
                let def = &target_cols[slot];
                full[slot] = coerce(value, def)?;
            }
            out.push(full);
        }
        Ok(out)
    }
}

fn coerce(value: Value, def: &ColumnDef) -> Result<Value, ContextError> {
    match (value, def.data_type) {
        (Value::Geometry(p), DataType::Geometry) => Ok(Value::Geometry(p)),
        (Value::Geometry(_), _) => Err(ContextError::Cast {
            column: def.name.clone(),
            reason: format!("cannot store geometry in {}", def.data_type.sql_name()),
        }),
        (Value::Scalar(s), to) => s.cast(to).map(Value::Scalar).map_err(|reason| ContextError::Cast {
            column: def.name.clone(),
            reason,
        }),
    }
}

/// Expression with column references bound to (table binding, column) slots.
enum Bound {
    Column(usize, usize),
    Cast(Box<Bound>, DataType),
    Mul(Box<Bound>, Box<Bound>),
    Div(Box<Bound>, Box<Bound>),
    Area(Box<Bound>),
    Round(Box<Bound>, u32),
    /// `round(value × area(child) / area(parent), 2)`, evaluated by [`apportion`].
    Apportion {
        value: Box<Bound>,
        child: Box<Bound>,
        parent: Box<Bound>,
    },
}

/// Split `value × area(child) / area(parent)` into its three operands.
fn apportioned(e: &Expr) -> Option<(&Expr, &Expr, &Expr)> {
    let Expr::Mul(value, ratio) = e else {
        return None;
    };
    let Expr::Div(child, parent) = ratio.as_ref() else {
        return None;
    };
    match (child.as_ref(), parent.as_ref()) {
        (Expr::Area(c), Expr::Area(p)) => Some((value.as_ref(), c.as_ref(), p.as_ref())),
        _ => None,
    }
}

struct Scope<'a> {
    bindings: Vec<(&'a str, &'a QualifiedName, &'a MemTable)>,
}

impl<'a> Scope<'a> {
    fn resolve(&self, c: &ColumnRef) -> Result<(usize, usize), ContextError> {
        match &c.qualifier {
            Some(q) => {
                let (b, (_, rel, table)) = self
                    .bindings
                    .iter()
                    .enumerate()
                    .find(|(_, (name, _, _))| *name == q.as_str())
                    .ok_or_else(|| ContextError::UnknownTable(q.clone()))?;
                let col = table.position(&c.name).ok_or_else(|| ContextError::UnknownColumn {
                    relation: rel.to_string(),
                    column: c.name.clone(),
                })?;
                Ok((b, col))
            }
            None => {
                let mut hits = self
                    .bindings
                    .iter()
                    .enumerate()
                    .filter_map(|(b, (_, _, t))| t.position(&c.name).map(|col| (b, col)));
                let first = hits.next().ok_or_else(|| ContextError::UnknownColumn {
                    relation: self
                        .bindings
                        .first()
                        .map(|(_, r, _)| r.to_string())
                        .unwrap_or_default(),
                    column: c.name.clone(),
                })?;
                if hits.next().is_some() {
                    return Err(ContextError::AmbiguousColumn(c.name.clone()));
                }
                Ok(first)
            }
        }
    }

    fn bind(&self, e: &Expr) -> Result<Bound, ContextError> {
        Ok(match e {
            Expr::Column(c) => {
                let (b, col) = self.resolve(c)?;
                Bound::Column(b, col)
            }
            Expr::Cast { expr, to } => Bound::Cast(Box::new(self.bind(expr)?), *to),
            Expr::Mul(a, b) => Bound::Mul(Box::new(self.bind(a)?), Box::new(self.bind(b)?)),
            Expr::Div(a, b) => Bound::Div(Box::new(self.bind(a)?), Box::new(self.bind(b)?)),
            Expr::Area(g) => Bound::Area(Box::new(self.bind(g)?)),
            Expr::Round { expr, places } => match apportioned(expr) {
                Some((value, child, parent)) if *places == INTERPOLATION_PLACES => Bound::Apportion {
                    value: Box::new(self.bind(value)?),
                    child: Box::new(self.bind(child)?),
                    parent: Box::new(self.bind(parent)?),
                },
                _ => Bound::Round(Box::new(self.bind(expr)?), *places),
            },
        })
    }
}

fn numeric(v: &Value, what: &str) -> Result<Option<f64>, ContextError> {
    match v {
        Value::Scalar(Scalar::Null) => Ok(None),
        Value::Scalar(s) => s
            .as_f64()
            .map(Some)
            .ok_or_else(|| ContextError::Evaluation(format!("{what}: non-numeric operand {s:?}"))),
        Value::Geometry(_) => Err(ContextError::Evaluation(format!("{what}: geometry operand"))),
    }
}

fn area(v: &Value) -> Result<Option<f64>, ContextError> {
    match v {
        Value::Geometry(p) => Ok(Some(p.area())),
        v if v.is_null() => Ok(None),
        _ => Err(ContextError::Evaluation("ST_Area of a non-geometry value".into())),
    }
}

fn eval(e: &Bound, row: &[&[Value]]) -> Result<Value, ContextError> {
    match e {
        Bound::Column(b, c) => Ok(row[*b][*c].clone()),
        Bound::Cast(inner, to) => {
            let v = eval(inner, row)?;
            match (v, to) {
                (Value::Geometry(p), DataType::Geometry) => Ok(Value::Geometry(p)),
                (Value::Geometry(_), _) => Err(ContextError::Evaluation("cannot cast geometry".into())),
                (Value::Scalar(s), to) => s.cast(*to).map(Value::Scalar).map_err(ContextError::Evaluation),
            }
        }
        Bound::Mul(a, b) => {
            let (x, y) = (numeric(&eval(a, row)?, "*")?, numeric(&eval(b, row)?, "*")?);
            Ok(Value::Scalar(match (x, y) {
                (Some(x), Some(y)) => Scalar::F64(x * y),
                _ => Scalar::Null,
            }))
        }
        Bound::Div(a, b) => {
            let (x, y) = (numeric(&eval(a, row)?, "/")?, numeric(&eval(b, row)?, "/")?);
            Ok(Value::Scalar(match (x, y) {
                (Some(_), Some(y)) if y == 0.0 => {
                    return Err(ContextError::Evaluation("division by zero".into()))
                }
                (Some(x), Some(y)) => Scalar::F64(x / y),
                _ => Scalar::Null,
            }))
        }
        Bound::Area(g) => Ok(Value::Scalar(match area(&eval(g, row)?)? {
            Some(a) => Scalar::F64(a),
            None => Scalar::Null,
        })),
        Bound::Round(inner, places) => {
            let v = numeric(&eval(inner, row)?, "round")?;
            Ok(Value::Scalar(match v {
                Some(x) if x.is_finite() => Scalar::F64(round_places(x, *places)),
                Some(_) => return Err(ContextError::Evaluation("non-finite value".into())),
                None => Scalar::Null,
            }))
        }
        Bound::Apportion { value, child, parent } => {
            let v = numeric(&eval(value, row)?, "apportion")?;
            let c = area(&eval(child, row)?)?;
            let p = area(&eval(parent, row)?)?;
            Ok(Value::Scalar(match (v, c, p) {
                (Some(v), Some(c), Some(p)) => {
                    Scalar::F64(apportion(v, c, p).map_err(|e| ContextError::Evaluation(e.to_string()))?)
                }
                _ => Scalar::Null,
            }))
        }
    }
}

fn lookup<'a>(db: &'a Database, name: &'a QualifiedName) -> Result<&'a MemTable, ContextError> {
    if let Some(reason) = db.failures.get(name) {
        return Err(ContextError::Injected {
            relation: name.to_string(),
            reason: reason.clone(),
        });
    }
    db.tables
        .get(name)
        .ok_or_else(|| ContextError::UnknownTable(name.to_string()))
}

/// Evaluate a SELECT against committed tables: nested inner hash joins, then
/// projection.
fn evaluate_select(db: &Database, select: &Select) -> Result<Vec<Vec<Value>>, ContextError> {
    let mut scope = Scope {
        bindings: vec![(
            select.from.binding(),
            &select.from.relation,
            lookup(db, &select.from.relation)?,
        )],
    };

    let mut joined: Vec<Vec<&[Value]>> = scope.bindings[0].2.rows.iter().map(|r| vec![r.as_slice()]).collect();

    for join in &select.joins {
        let right_table = lookup(db, &join.table.relation)?;
        scope
            .bindings
            .push((join.table.binding(), &join.table.relation, right_table));
        let right_idx = scope.bindings.len() - 1;

        let (lb, lc) = scope.resolve(&join.left)?;
        let (rb, rc) = scope.resolve(&join.right)?;
        if rb != right_idx || lb >= right_idx {
            return Err(ContextError::Evaluation(format!(
                "join condition {} = {} must compare an earlier table with {}",
                join.left, join.right, join.table.relation
            )));
        }

        let mut index: HashMap<String, Vec<&[Value]>> = HashMap::new();
        for r in &right_table.rows {
            if let Some(k) = r[rc].join_key() {
                index.entry(k).or_default().push(r.as_slice());
            }
        }

        let mut next = Vec::new();
        for combo in joined {
            let Some(k) = combo[lb][lc].join_key() else {
                continue;
            };
            if let Some(matches) = index.get(&k) {
                for m in matches {
                    let mut c = combo.clone();
                    c.push(*m);
                    next.push(c);
                }
            }
        }
        joined = next;
    }

    let items: Vec<Bound> = select
        .items
        .iter()
        .map(|p| scope.bind(&p.expr()))
        .collect::<Result<_, _>>()?;

    joined
        .iter()
        .map(|combo| items.iter().map(|e| eval(e, combo)).collect())
        .collect()
}

impl ExecutionContext for MemoryContext {
    fn execute(&mut self, statement: &Statement) -> Result<Vec<Row>, ContextError> {
        let sql = statement.to_string();
        trace!(%sql, "memory context execute");
        let write = {
            let mut db = self.lock();
            db.log.push(sql);
            match statement {
                Statement::DropTable { name } => Write::Drop(name.clone()),
                Statement::CreateTable { name, columns } => {
                    if self.visible_columns(&db, name).is_some() {
                        return Err(ContextError::TableExists(name.to_string()));
                    }
                    Write::Create(name.clone(), columns.clone())
                }
                Statement::InsertSelect {
                    target,
                    columns,
                    select,
                } => Write::Insert(target.clone(), self.insert_select(&db, target, columns, select)?),
            }
        };
        self.pending.push(write);
        Ok(Vec::new())
    }

    fn commit(&mut self) -> Result<(), ContextError> {
        let writes = std::mem::take(&mut self.pending);
        let mut db = self.lock();

        // Validate against a scratch view first so a failing commit applies nothing.
        let mut exists: HashMap<&QualifiedName, bool> = HashMap::new();
        for w in &writes {
            match w {
                Write::Drop(n) => {
                    exists.insert(n, false);
                }
                Write::Create(n, _) => {
                    exists.insert(n, true);
                }
                Write::Insert(n, _) => {
                    let present = exists.get(n).copied().unwrap_or_else(|| db.tables.contains_key(n));
                    if !present {
                        return Err(ContextError::UnknownTable(n.to_string()));
                    }
                }
            }
        }

        for w in writes {
            match w {
                Write::Drop(n) => {
                    db.tables.remove(&n);
                }
                Write::Create(n, columns) => {
                    db.tables.insert(n, MemTable { columns, rows: Vec::new() });
                }
                Write::Insert(n, rows) => {
                    if let Some(t) = db.tables.get_mut(&n) {
                        t.rows.extend(rows);
                    }
                }
            }
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), ContextError> {
        self.pending.clear();
        Ok(())
    }

    fn output_table(&self, year: Year, resolution: &Resolution, table: &TableId) -> QualifiedName {
        output_table_name(&self.schema, year, resolution, table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geocensus_plan::{Join, Projection, TableRef};

    fn col(name: &str, data_type: DataType) -> ColumnDef {
        ColumnDef {
            name: name.into(),
            data_type,
        }
    }

    fn item(source: Expr, alias: &str) -> Projection {
        Projection {
            column_id: None,
            source,
            target_type: None,
            alias: alias.into(),
        }
    }

    fn source(ctx: &MemoryContext) -> QualifiedName {
        let name = QualifiedName::new("raw", "src");
        ctx.load_table(
            name.clone(),
            vec![col("id", DataType::Text), col("v", DataType::Text)],
            vec![
                vec![Scalar::Str("a".into()), Scalar::Str("1.5".into())],
                vec![Scalar::Str("b".into()), Scalar::Str("2".into())],
            ],
        )
        .unwrap();
        name
    }

    fn create(ctx: &mut MemoryContext, name: &QualifiedName) {
        ctx.execute(&Statement::CreateTable {
            name: name.clone(),
            columns: vec![col("region_id", DataType::Text), col("v", DataType::Numeric)],
        })
        .unwrap();
    }

    fn copy(from: &QualifiedName, to: &QualifiedName) -> Statement {
        Statement::insert_select(
            to.clone(),
            vec!["region_id".into(), "v".into()],
            Select {
                items: vec![
                    item(Expr::column(ColumnRef::bare("id")), "region_id"),
                    item(Expr::column(ColumnRef::bare("v")).cast(DataType::Numeric), "v"),
                ],
                from: TableRef::new(from.clone()),
                joins: vec![],
            },
        )
        .unwrap()
    }

    #[test]
    fn writes_are_invisible_until_commit() {
        let mut ctx = MemoryContext::default();
        let src = source(&ctx);
        let out = QualifiedName::new("observatory", "out");
        create(&mut ctx, &out);
        ctx.execute(&copy(&src, &out)).unwrap();
        assert!(!ctx.has_table(&out));
        ctx.commit().unwrap();
        let rows = ctx.rows(&out).unwrap();
        assert_eq!(rows[0], vec![Scalar::Str("a".into()), Scalar::F64(1.5)]);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn rollback_discards_only_this_session() {
        let mut a = MemoryContext::default();
        let src = source(&a);
        let out = QualifiedName::new("observatory", "out");
        create(&mut a, &out);
        a.commit().unwrap();

        let mut b = a.session();
        a.execute(&copy(&src, &out)).unwrap();
        b.execute(&copy(&src, &out)).unwrap();
        a.rollback().unwrap();
        b.commit().unwrap();
        assert_eq!(a.rows(&out).unwrap().len(), 2);
    }

    #[test]
    fn bad_cast_fails_the_statement() {
        let mut ctx = MemoryContext::default();
        let src = QualifiedName::bare("src");
        ctx.load_table(
            src.clone(),
            vec![col("id", DataType::Text), col("v", DataType::Text)],
            vec![vec![Scalar::Str("a".into()), Scalar::Str("..".into())]],
        )
        .unwrap();
        let out = QualifiedName::bare("out");
        create(&mut ctx, &out);
        assert!(matches!(ctx.execute(&copy(&src, &out)), Err(ContextError::Evaluation(_))));
    }

    #[test]
    fn injected_failure_and_missing_table() {
        let mut ctx = MemoryContext::default();
        let src = source(&ctx);
        let out = QualifiedName::bare("out");
        create(&mut ctx, &out);
        ctx.fail_reads_from(src.clone(), "disk on fire");
        assert!(matches!(ctx.execute(&copy(&src, &out)), Err(ContextError::Injected { .. })));
        ctx.clear_failures();
        assert!(matches!(
            ctx.execute(&copy(&QualifiedName::bare("nope"), &out)),
            Err(ContextError::UnknownTable(_))
        ));
    }

    #[test]
    fn joins_and_area_evaluate() {
        let mut ctx = MemoryContext::default();
        let child = GeometryTable::new(Resolution::new("MB"), 2016, QualifiedName::bare("mb")).with_parent("parent_id");
        let parent = GeometryTable::new(Resolution::new("SA1"), 2016, QualifiedName::bare("sa1"));
        ctx.load_geometry(
            &child,
            vec![
                ("m1".into(), Some("p1".into()), Polygon::rect(0.0, 0.0, 1.0, 1.0).unwrap()),
                ("m2".into(), Some("p1".into()), Polygon::rect(1.0, 0.0, 3.0, 1.0).unwrap()),
                ("m3".into(), None, Polygon::rect(0.0, 0.0, 1.0, 1.0).unwrap()),
            ],
        );
        ctx.load_geometry(&parent, vec![("p1".into(), None, Polygon::rect(0.0, 0.0, 3.0, 1.0).unwrap())]);

        let out = QualifiedName::bare("out");
        create(&mut ctx, &out);
        let ratio = Expr::column(ColumnRef::qualified("c", "the_geom"))
            .area()
            .div(Expr::column(ColumnRef::qualified("p", "the_geom")).area());
        let stmt = Statement::insert_select(
            out.clone(),
            vec!["region_id".into(), "v".into()],
            Select {
                items: vec![
                    item(Expr::column(ColumnRef::qualified("c", "geom_id")), "region_id"),
                    item(ratio.round(2), "v"),
                ],
                from: TableRef::aliased(QualifiedName::bare("mb"), "c"),
                joins: vec![Join {
                    table: TableRef::aliased(QualifiedName::bare("sa1"), "p"),
                    left: ColumnRef::qualified("c", "parent_id"),
                    right: ColumnRef::qualified("p", "geom_id"),
                }],
            },
        )
        .unwrap();
        ctx.execute(&stmt).unwrap();
        ctx.commit().unwrap();
        let rows = ctx.rows(&out).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][1], Scalar::F64(0.33));
        assert_eq!(rows[1][1], Scalar::F64(0.67));
    }

    #[test]
    fn interpolated_values_evaluate_through_apportion() {
        let mut ctx = MemoryContext::default();
        let child = GeometryTable::new(Resolution::new("MB"), 2016, QualifiedName::bare("mb")).with_parent("parent_id");
        let parent = GeometryTable::new(Resolution::new("SA1"), 2016, QualifiedName::bare("sa1"));
        ctx.load_geometry(&child, vec![("m1".into(), Some("p1".into()), Polygon::rect(0.0, 0.0, 1.0, 1.0).unwrap())]);
        ctx.load_geometry(&parent, vec![("p1".into(), None, Polygon::rect(0.0, 0.0, 3.0, 1.0).unwrap())]);
        let data = QualifiedName::bare("sa1_data");
        ctx.load_table(
            data.clone(),
            vec![col("region_id", DataType::Text), col("v", DataType::Numeric)],
            vec![vec![Scalar::Str("p1".into()), Scalar::F64(1234.5678)]],
        )
        .unwrap();

        let ratio = Expr::column(ColumnRef::qualified("c", "the_geom"))
            .area()
            .div(Expr::column(ColumnRef::qualified("p", "the_geom")).area());
        let source = Expr::column(ColumnRef::qualified("d", "v"))
            .mul(ratio.clone())
            .round(INTERPOLATION_PLACES);
        let Expr::Round { expr, .. } = &source else {
            panic!("expected round");
        };
        assert!(apportioned(expr).is_some());
        assert!(apportioned(&ratio).is_none());

        let out = QualifiedName::bare("out");
        create(&mut ctx, &out);
        let stmt = Statement::insert_select(
            out.clone(),
            vec!["region_id".into(), "v".into()],
            Select {
                items: vec![
                    item(Expr::column(ColumnRef::qualified("c", "geom_id")), "region_id"),
                    item(source, "v"),
                ],
                from: TableRef::aliased(QualifiedName::bare("mb"), "c"),
                joins: vec![
                    Join {
                        table: TableRef::aliased(QualifiedName::bare("sa1"), "p"),
                        left: ColumnRef::qualified("c", "parent_id"),
                        right: ColumnRef::qualified("p", "geom_id"),
                    },
                    Join {
                        table: TableRef::aliased(data, "d"),
                        left: ColumnRef::qualified("c", "parent_id"),
                        right: ColumnRef::qualified("d", "region_id"),
                    },
                ],
            },
        )
        .unwrap();
        ctx.execute(&stmt).unwrap();
        ctx.commit().unwrap();

        let expected = apportion(1234.5678, 1.0, 3.0).unwrap();
        assert_eq!(expected, 411.52);
        assert_eq!(ctx.rows(&out).unwrap()[0][1], Scalar::F64(expected));
    }

    #[test]
    fn geometry_rows_render_as_wkt() {
        let ctx = MemoryContext::default();
        let t = GeometryTable::new(Resolution::new("SA1"), 2016, QualifiedName::bare("g"));
        ctx.load_geometry(&t, vec![("p".into(), None, Polygon::rect(0.0, 0.0, 1.0, 1.0).unwrap())]);
        let rows = ctx.rows(&QualifiedName::bare("g")).unwrap();
        assert_eq!(rows[0][1], Scalar::Str("POLYGON((0 0, 1 0, 1 1, 0 1, 0 0))".into()));
    }
}
