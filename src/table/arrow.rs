// src/table/arrow.rs

use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, Int64Array, StringArray},
    datatypes::{DataType, Field as ArrowField, Schema as ArrowSchema},
    record_batch::RecordBatch,
};
use std::sync::Arc;

use super::{Cell, Table};

/// Pick an Arrow type for one column of cells.
///
/// - only `Int` / `Empty`  → Int64
/// - anything with `Text`  → Utf8 (ints rendered as text)
pub fn infer_column_type<'a>(cells: impl IntoIterator<Item = &'a Cell>) -> DataType {
    if cells.into_iter().any(|c| matches!(c, Cell::Text(_))) {
        DataType::Utf8
    } else {
        DataType::Int64
    }
}

/// Build an Arrow schema (all fields nullable) for `table`.
pub fn build_arrow_schema(table: &Table) -> Arc<ArrowSchema> {
    let fields: Vec<ArrowField> = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let dt = infer_column_type(table.rows.iter().map(|r| &r[i]));
            ArrowField::new(name, dt, true)
        })
        .collect();
    Arc::new(ArrowSchema::new(fields))
}

impl Table {
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let schema = build_arrow_schema(self);
        let arrays: Vec<ArrayRef> = schema
            .fields()
            .iter()
            .enumerate()
            .map(|(i, field)| -> ArrayRef {
                match field.data_type() {
                    DataType::Int64 => Arc::new(Int64Array::from_iter(
                        self.rows.iter().map(|r| r[i].as_int()),
                    )),
                    _ => Arc::new(StringArray::from_iter(self.rows.iter().map(|r| {
                        match &r[i] {
                            Cell::Empty => None,
                            other => Some(other.to_string()),
                        }
                    }))),
                }
            })
            .collect();
        RecordBatch::try_new(schema, arrays).context("building record batch from table")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;

    #[test]
    fn mixed_columns_fall_back_to_utf8() -> Result<()> {
        let mut t = Table::new(["Country", "Year", "Code"]);
        t.push_row(vec!["Chile".into(), 2015.into(), 7.into()])?;
        t.push_row(vec!["Peru".into(), Cell::Empty, "x".into()])?;

        let batch = t.to_record_batch()?;
        let schema = batch.schema();
        assert_eq!(schema.field(0).data_type(), &DataType::Utf8);
        assert_eq!(schema.field(1).data_type(), &DataType::Int64);
        assert_eq!(schema.field(2).data_type(), &DataType::Utf8);

        let years = batch
            .column(1)
            .as_any()
            .downcast_ref::<Int64Array>()
            .expect("int column");
        assert_eq!(years.value(0), 2015);
        assert!(years.is_null(1));

        let codes = batch
            .column(2)
            .as_any()
            .downcast_ref::<StringArray>()
            .expect("string column");
        assert_eq!(codes.value(0), "7");
        Ok(())
    }
}
