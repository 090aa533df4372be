//! Row materialization on top of a decoded [`StatementResult`].

use std::collections::HashMap;

use crate::{Column, Result, StatementResult, Value};

/// Shape of a row returned by [`Rows::fetch`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FetchMode {
    /// Column name → value. Unnamed columns are keyed by their position.
    #[default]
    Assoc,
    /// Values in column order.
    Num,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FetchedRow {
    Assoc(HashMap<String, Value>),
    Num(Vec<Value>),
}

impl FetchedRow {
    /// Value by column name (`Assoc`) or decimal position (`Num`).
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Assoc(map) => map.get(key),
            Self::Num(values) => key.parse::<usize>().ok().and_then(|index| values.get(index)),
        }
    }
}

/// Builds a value from one row.
pub trait FromRow: Sized {
    fn from_row(row: RowRef<'_>) -> Result<Self>;
}

/// Borrowed view of one row with name-based access helpers.
#[derive(Clone, Copy, Debug)]
pub struct RowRef<'a> {
    /// Columns aligned with `values`.
    pub cols: &'a [Column],
    /// Row values aligned with `cols`.
    pub values: &'a [Value],
}

impl<'a> RowRef<'a> {
    /// Returns a value by case-insensitive column name.
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        let idx = self.cols.iter().position(|col| {
            col.name
                .as_deref()
                .is_some_and(|candidate| candidate.eq_ignore_ascii_case(name))
        })?;
        self.values.get(idx)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name)?.as_i64()
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name)?.as_f64()
    }

    pub fn get_text(&self, name: &str) -> Option<&'a str> {
        self.get(name)?.as_str()
    }

    pub fn get_blob(&self, name: &str) -> Option<&'a [u8]> {
        self.get(name)?.as_blob()
    }

    /// Column names; unnamed columns yield `None`.
    pub fn column_names(&self) -> impl Iterator<Item = Option<&'a str>> + 'a {
        self.cols.iter().map(|col| col.name.as_deref())
    }
}

/// Cursor over the rows of one statement result.
#[derive(Clone, Debug, PartialEq)]
pub struct Rows {
    result: StatementResult,
    fetch_mode: FetchMode,
    cursor: usize,
}

impl Rows {
    pub fn new(result: StatementResult, fetch_mode: FetchMode) -> Self {
        Self {
            result,
            fetch_mode,
            cursor: 0,
        }
    }

    pub fn fetch_mode(&self) -> FetchMode {
        self.fetch_mode
    }

    pub fn set_fetch_mode(&mut self, fetch_mode: FetchMode) {
        self.fetch_mode = fetch_mode;
    }

    /// Next row in the default shape, or `None` once exhausted.
    pub fn fetch(&mut self) -> Option<FetchedRow> {
        self.fetch_as(self.fetch_mode)
    }

    pub fn fetch_as(&mut self, mode: FetchMode) -> Option<FetchedRow> {
        let row = self.advance()?;
        Some(shape_row(row, mode))
    }

    /// Remaining rows in the default shape.
    pub fn fetch_all(&mut self) -> Vec<FetchedRow> {
        self.fetch_all_as(self.fetch_mode)
    }

    pub fn fetch_all_as(&mut self, mode: FetchMode) -> Vec<FetchedRow> {
        std::iter::from_fn(|| self.fetch_as(mode)).collect()
    }

    /// Passes the next row to `f`.
    pub fn fetch_with<T, F>(&mut self, f: F) -> Option<T>
    where
        F: FnOnce(RowRef<'_>) -> T,
    {
        self.advance().map(f)
    }

    pub fn fetch_all_with<T, F>(&mut self, mut f: F) -> Vec<T>
    where
        F: FnMut(RowRef<'_>) -> T,
    {
        std::iter::from_fn(|| self.advance().map(&mut f)).collect()
    }

    pub fn fetch_into<T: FromRow>(&mut self) -> Result<Option<T>> {
        self.advance().map(T::from_row).transpose()
    }

    pub fn fetch_all_into<T: FromRow>(&mut self) -> Result<Vec<T>> {
        let mut out = Vec::with_capacity(self.remaining());
        while let Some(row) = self.advance() {
            out.push(T::from_row(row)?);
        }
        Ok(out)
    }

    /// Moves the cursor back to the first row.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    pub fn column_count(&self) -> usize {
        self.result.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.result.rows.len()
    }

    pub fn affected_row_count(&self) -> u64 {
        self.result.affected_row_count
    }

    pub fn last_insert_rowid(&self) -> Option<&str> {
        self.result.last_insert_rowid.as_deref()
    }

    pub fn columns(&self) -> &[Column] {
        &self.result.columns
    }

    pub fn result(&self) -> &StatementResult {
        &self.result
    }

    pub fn into_result(self) -> StatementResult {
        self.result
    }

    fn remaining(&self) -> usize {
        self.row_count().saturating_sub(self.cursor)
    }

    fn advance(&mut self) -> Option<RowRef<'_>> {
        let values = self.result.rows.get(self.cursor)?;
        self.cursor += 1;
        Some(RowRef {
            cols: &self.result.columns,
            values,
        })
    }
}

impl Iterator for Rows {
    type Item = FetchedRow;

    fn next(&mut self) -> Option<Self::Item> {
        self.fetch()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

fn shape_row(row: RowRef<'_>, mode: FetchMode) -> FetchedRow {
    match mode {
        FetchMode::Num => FetchedRow::Num(row.values.to_vec()),
        FetchMode::Assoc => FetchedRow::Assoc(
            row.cols
                .iter()
                .zip(row.values)
                .enumerate()
                .map(|(index, (col, value))| {
                    let key = col.name.clone().unwrap_or_else(|| index.to_string());
                    (key, value.clone())
                })
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::{FetchMode, FetchedRow, FromRow, RowRef, Rows};
    use crate::{Column, HranaError, Result, StatementResult, Value};

    fn col(name: Option<&str>) -> Column {
        Column {
            name: name.map(str::to_owned),
            decltype: None,
        }
    }

    fn sample() -> Rows {
        Rows::new(
            StatementResult {
                columns: vec![col(Some("id")), col(Some("Name")), col(None)],
                rows: vec![
                    vec![Value::integer(1), Value::text("kit"), Value::float(1.5)],
                    vec![Value::integer(2), Value::text("bo"), Value::Null],
                ],
                affected_row_count: 0,
                last_insert_rowid: None,
            },
            FetchMode::Assoc,
        )
    }

    #[derive(Debug, PartialEq)]
    struct User {
        id: i64,
        name: String,
    }

    impl FromRow for User {
        fn from_row(row: RowRef<'_>) -> Result<Self> {
            Ok(Self {
                id: row
                    .get_i64("id")
                    .ok_or_else(|| HranaError::Decode("missing id".to_owned()))?,
                name: row.get_text("name").unwrap_or_default().to_owned(),
            })
        }
    }

    #[test]
    fn assoc_rows_key_unnamed_columns_by_position() {
        let mut rows = sample();
        let Some(FetchedRow::Assoc(first)) = rows.fetch() else {
            panic!("expected assoc row");
        };
        assert_eq!(first.get("id"), Some(&Value::integer(1)));
        assert_eq!(first.get("Name"), Some(&Value::text("kit")));
        assert_eq!(first.get("2"), Some(&Value::float(1.5)));
    }

    #[test]
    fn num_rows_keep_column_order() {
        let mut rows = sample();
        assert_eq!(
            rows.fetch_as(FetchMode::Num),
            Some(FetchedRow::Num(vec![
                Value::integer(1),
                Value::text("kit"),
                Value::float(1.5)
            ]))
        );
        let rest = rows.fetch_all_as(FetchMode::Num);
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].get("1"), Some(&Value::text("bo")));
        assert_eq!(rows.fetch(), None);
    }

    #[test]
    fn rewind_restarts_cursor() {
        let mut rows = sample();
        assert_eq!(rows.fetch_all().len(), 2);
        assert!(rows.fetch().is_none());
        rows.rewind();
        assert_eq!(rows.by_ref().count(), 2);
    }

    #[test]
    fn custom_constructor_and_callback() {
        let mut rows = sample();
        let users = rows.fetch_all_into::<User>().expect("rows map");
        assert_eq!(
            users,
            vec![
                User {
                    id: 1,
                    name: "kit".to_owned()
                },
                User {
                    id: 2,
                    name: "bo".to_owned()
                },
            ]
        );

        rows.rewind();
        let names = rows.fetch_all_with(|row| {
            row.column_names()
                .map(|name| name.unwrap_or("?").to_owned())
                .collect::<Vec<_>>()
                .join(",")
        });
        assert_eq!(names, vec!["id,Name,?".to_owned(), "id,Name,?".to_owned()]);
    }

    #[test]
    fn metadata_accessors() {
        let rows = sample();
        assert_eq!(rows.column_count(), 3);
        assert_eq!(rows.row_count(), 2);
        assert_eq!(rows.affected_row_count(), 0);
        assert_eq!(rows.last_insert_rowid(), None);
        assert_eq!(rows.columns()[1].name.as_deref(), Some("Name"));
    }

    #[test]
    fn row_ref_lookup_is_case_insensitive() {
        let cols = [col(Some("Payload")), col(None)];
        let values = [Value::blob(vec![0xffu8, 0x00]), Value::text("x")];
        let row = RowRef {
            cols: &cols,
            values: &values,
        };
        assert_eq!(row.get_blob("payload"), Some(&[0xffu8, 0x00][..]));
        assert_eq!(row.get_text("payload"), None);
        assert_eq!(row.get("missing"), None);
    }
}
