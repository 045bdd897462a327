//! Columnar tables of samples: `RawSamples` as read from the sensor
//! files (millisecond timestamps, possibly sparse and with
//! duplicates), and `Series` as produced by alignment (time in
//! seconds, one row per tick, all declared columns present).
//!
//! Missing cells are represented as NaN.

use kstring::KString;

/// The name of the time column in sensor files and of the time field
/// of every dataset.
pub const TIME: &str = "time";

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: KString,
    pub values: Vec<f64>,
}

impl Column {
    pub fn new(name: &str, values: Vec<f64>) -> Self {
        Self {
            name: KString::from_ref(name),
            values,
        }
    }
}

/// Rows of `(timestamp in ms, named values)` in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSamples {
    pub time: Vec<i64>,
    pub columns: Vec<Column>,
}

impl RawSamples {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Drop every row for which any column is NaN.
    pub fn drop_incomplete_rows(&mut self) {
        let keep: Vec<bool> = (0..self.time.len())
            .map(|i| self.columns.iter().all(|c| !c.values[i].is_nan()))
            .collect();
        retain_by_mask(&mut self.time, &keep);
        for column in &mut self.columns {
            retain_by_mask(&mut column.values, &keep);
        }
    }
}

/// A time-indexed table. After alignment the `time` values are
/// contiguous ticks converted to seconds; filtering (validity bounds)
/// may later remove rows, leaving gaps but keeping the order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    time: Vec<f64>,
    columns: Vec<Column>,
}

impl Series {
    /// Panics if a column length differs from the time length, that
    /// would be a bug in the caller.
    pub fn new(time: Vec<f64>, columns: Vec<Column>) -> Self {
        for column in &columns {
            assert_eq!(
                column.values.len(),
                time.len(),
                "column {:?} length",
                column.name
            );
        }
        Self { time, columns }
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Time in seconds.
    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name.as_str() == name)
            .map(|c| c.values.as_slice())
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Vec<f64>> {
        self.columns
            .iter_mut()
            .find(|c| c.name.as_str() == name)
            .map(|c| &mut c.values)
    }

    /// `time` or any column.
    pub fn field(&self, name: &str) -> Option<&[f64]> {
        if name == TIME {
            Some(&self.time)
        } else {
            self.column(name)
        }
    }

    /// Adds the column, or replaces the values if a column with that
    /// name exists already. Panics on length mismatch.
    pub fn set_column(&mut self, name: &str, values: Vec<f64>) {
        assert_eq!(values.len(), self.time.len(), "column {name:?} length");
        if let Some(existing) = self.column_mut(name) {
            *existing = values;
        } else {
            self.columns.push(Column::new(name, values));
        }
    }

    /// Keep the rows for which `keep(row_index)` is true.
    pub fn retain_rows(&mut self, keep: impl Fn(usize) -> bool) {
        let mask: Vec<bool> = (0..self.time.len()).map(keep).collect();
        retain_by_mask(&mut self.time, &mask);
        for column in &mut self.columns {
            retain_by_mask(&mut column.values, &mask);
        }
    }

    /// Index range of the rows with `start <= time < end`; relies on
    /// time being sorted, which alignment guarantees and filtering
    /// preserves.
    pub fn time_range(&self, start: f64, end: f64) -> std::ops::Range<usize> {
        let from = self.time.partition_point(|t| *t < start);
        let to = self.time.partition_point(|t| *t < end);
        from..to.max(from)
    }
}

fn retain_by_mask<T>(values: &mut Vec<T>, mask: &[bool]) {
    let mut i = 0;
    values.retain(|_| {
        let keep = mask[i];
        i += 1;
        keep
    });
}
