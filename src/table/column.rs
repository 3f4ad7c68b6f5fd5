use serde::{Deserialize, Serialize};

/// Cell storage for one column. A missing cell is `None`.
///
/// Numeric columns start out as `Float64` and are narrowed to the smallest
/// width that reproduces every value (see [`ColumnData::narrow`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    Float64(Vec<Option<f64>>),
    Float32(Vec<Option<f32>>),
    Int32(Vec<Option<i32>>),
    Int16(Vec<Option<i16>>),
    Int8(Vec<Option<i8>>),
    /// Packed metric strings ("name:value | name:value").
    Text(Vec<Option<String>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Float64(v) => v.len(),
            ColumnData::Float32(v) => v.len(),
            ColumnData::Int32(v) => v.len(),
            ColumnData::Int16(v) => v.len(),
            ColumnData::Int8(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, ColumnData::Text(_))
    }

    /// Numeric value at row `i`, widened to f64. Text columns have none.
    pub fn value(&self, i: usize) -> Option<f64> {
        match self {
            ColumnData::Float64(v) => v.get(i).copied().flatten(),
            ColumnData::Float32(v) => v.get(i).copied().flatten().map(f64::from),
            ColumnData::Int32(v) => v.get(i).copied().flatten().map(f64::from),
            ColumnData::Int16(v) => v.get(i).copied().flatten().map(f64::from),
            ColumnData::Int8(v) => v.get(i).copied().flatten().map(f64::from),
            ColumnData::Text(_) => None,
        }
    }

    pub fn text(&self, i: usize) -> Option<&str> {
        match self {
            ColumnData::Text(v) => v.get(i).and_then(|c| c.as_deref()),
            _ => None,
        }
    }

    pub fn is_missing(&self, i: usize) -> bool {
        match self {
            ColumnData::Text(v) => v.get(i).is_none_or(Option::is_none),
            _ => self.value(i).is_none(),
        }
    }

    /// All cells widened to f64 (text cells become `None`).
    pub fn to_f64s(&self) -> Vec<Option<f64>> {
        (0..self.len()).map(|i| self.value(i)).collect()
    }

    /// Cell rendered for text output; `None` for a missing cell.
    pub fn display(&self, i: usize) -> Option<String> {
        match self {
            ColumnData::Float64(v) => v.get(i).copied().flatten().map(|x| x.to_string()),
            ColumnData::Float32(v) => v.get(i).copied().flatten().map(|x| x.to_string()),
            ColumnData::Int32(v) => v.get(i).copied().flatten().map(|x| x.to_string()),
            ColumnData::Int16(v) => v.get(i).copied().flatten().map(|x| x.to_string()),
            ColumnData::Int8(v) => v.get(i).copied().flatten().map(|x| x.to_string()),
            ColumnData::Text(v) => v.get(i).cloned().flatten(),
        }
    }

    /// Build a column by looking up each output row in `self`.
    /// `None` (or an out-of-range index) yields a missing cell.
    pub fn gather(&self, idx: &[Option<usize>]) -> ColumnData {
        match self {
            ColumnData::Float64(v) => ColumnData::Float64(pick(v, idx)),
            ColumnData::Float32(v) => ColumnData::Float32(pick(v, idx)),
            ColumnData::Int32(v) => ColumnData::Int32(pick(v, idx)),
            ColumnData::Int16(v) => ColumnData::Int16(pick(v, idx)),
            ColumnData::Int8(v) => ColumnData::Int8(pick(v, idx)),
            ColumnData::Text(v) => ColumnData::Text(pick(v, idx)),
        }
    }

    pub fn take(&self, idx: &[usize]) -> ColumnData {
        let idx: Vec<Option<usize>> = idx.iter().copied().map(Some).collect();
        self.gather(&idx)
    }

    /// A column of the same kind with `len` missing cells.
    pub fn empty_like(&self, len: usize) -> ColumnData {
        self.gather(&vec![None; len])
    }

    /// Concatenate two columns. Mismatched numeric widths are widened to
    /// f64; mixing text with numbers renders the numbers as text.
    pub fn append(self, other: ColumnData) -> ColumnData {
        match (self, other) {
            (ColumnData::Float64(mut a), ColumnData::Float64(b)) => {
                a.extend(b);
                ColumnData::Float64(a)
            }
            (ColumnData::Float32(mut a), ColumnData::Float32(b)) => {
                a.extend(b);
                ColumnData::Float32(a)
            }
            (ColumnData::Int32(mut a), ColumnData::Int32(b)) => {
                a.extend(b);
                ColumnData::Int32(a)
            }
            (ColumnData::Int16(mut a), ColumnData::Int16(b)) => {
                a.extend(b);
                ColumnData::Int16(a)
            }
            (ColumnData::Int8(mut a), ColumnData::Int8(b)) => {
                a.extend(b);
                ColumnData::Int8(a)
            }
            (ColumnData::Text(mut a), ColumnData::Text(b)) => {
                a.extend(b);
                ColumnData::Text(a)
            }
            (a, b) if a.is_numeric() && b.is_numeric() => {
                let mut values = a.to_f64s();
                values.extend(b.to_f64s());
                ColumnData::Float64(values)
            }
            (a, b) => {
                let mut cells: Vec<Option<String>> = (0..a.len()).map(|i| a.display(i)).collect();
                cells.extend((0..b.len()).map(|i| b.display(i)));
                ColumnData::Text(cells)
            }
        }
    }

    /// Downcast to the smallest width that keeps every value.
    ///
    /// Integral columns go to i8/i16/i32 when they fit. Other columns go to
    /// f32 when every value is in range. Integral values beyond i32 stay f64
    /// so large byte counters keep their exact value.
    pub fn narrow(self) -> ColumnData {
        if !self.is_numeric() {
            return self;
        }
        let values = self.to_f64s();
        let present: Vec<f64> = values.iter().flatten().copied().collect();
        if present.is_empty() {
            return ColumnData::Float32(vec![None; values.len()]);
        }

        let lo = present.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        if present.iter().all(|v| v.fract() == 0.0) {
            if lo >= f64::from(i8::MIN) && hi <= f64::from(i8::MAX) {
                return ColumnData::Int8(values.iter().map(|v| v.map(|x| x as i8)).collect());
            }
            if lo >= f64::from(i16::MIN) && hi <= f64::from(i16::MAX) {
                return ColumnData::Int16(values.iter().map(|v| v.map(|x| x as i16)).collect());
            }
            if lo >= f64::from(i32::MIN) && hi <= f64::from(i32::MAX) {
                return ColumnData::Int32(values.iter().map(|v| v.map(|x| x as i32)).collect());
            }
            return ColumnData::Float64(values);
        }

        if lo >= f64::from(f32::MIN) && hi <= f64::from(f32::MAX) {
            return ColumnData::Float32(values.iter().map(|v| v.map(|x| x as f32)).collect());
        }
        ColumnData::Float64(values)
    }
}

fn pick<T: Clone>(values: &[Option<T>], idx: &[Option<usize>]) -> Vec<Option<T>> {
    idx.iter()
        .map(|i| i.and_then(|i| values.get(i).cloned().flatten()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn narrows_integral_columns_to_smallest_int() {
        let small = ColumnData::Float64(vec![Some(1.0), None, Some(-7.0)]).narrow();
        assert_eq!(small, ColumnData::Int8(vec![Some(1), None, Some(-7)]));

        let medium = ColumnData::Float64(vec![Some(300.0), Some(0.0)]).narrow();
        assert_eq!(medium, ColumnData::Int16(vec![Some(300), Some(0)]));

        let huge = ColumnData::Float64(vec![Some(17_179_869_184.0)]).narrow();
        assert_eq!(huge.value(0), Some(17_179_869_184.0));
    }

    #[test]
    fn narrowing_fractional_values_stays_within_tolerance() {
        let original = vec![Some(12.345_678_9), Some(98_765.432_1), None];
        let narrowed = ColumnData::Float64(original.clone()).narrow();
        assert!(matches!(narrowed, ColumnData::Float32(_)));
        for (i, v) in original.iter().enumerate() {
            match (v, narrowed.value(i)) {
                (Some(a), Some(b)) => assert!(((a - b) / a).abs() < 1e-6),
                (None, None) => {}
                other => panic!("cell {} changed presence: {:?}", i, other),
            }
        }
    }

    #[test]
    fn append_widens_mismatched_numeric_kinds() {
        let a = ColumnData::Int8(vec![Some(1)]);
        let b = ColumnData::Float32(vec![Some(2.5)]);
        assert_eq!(a.append(b), ColumnData::Float64(vec![Some(1.0), Some(2.5)]));
    }

    #[test]
    fn gather_fills_unmatched_rows_with_missing() {
        let col = ColumnData::Text(vec![Some("a".into()), Some("b".into())]);
        let out = col.gather(&[Some(1), None, Some(0), Some(9)]);
        assert_eq!(
            out,
            ColumnData::Text(vec![Some("b".into()), None, Some("a".into()), None])
        );
    }
}
