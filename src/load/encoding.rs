//! CSV serialization shared by the local and cloud sinks.
//!
//! Header is `date` followed by one column per station. Dates are ISO
//! `YYYY-MM-DD`; missing values are empty fields.

use crate::model::TimeSeriesTable;

pub const CONTENT_TYPE: &str = "text/csv";
pub const INDEX_COLUMN: &str = "date";

pub fn to_csv_bytes(table: &TimeSeriesTable) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = Vec::with_capacity(table.columns().len() + 1);
    header.push(INDEX_COLUMN);
    header.extend(table.columns().iter().map(String::as_str));
    writer.write_record(&header)?;

    for row in table.rows() {
        let mut record = Vec::with_capacity(row.values.len() + 1);
        record.push(row.date.format("%Y-%m-%d").to_string());
        record.extend(
            row.values
                .iter()
                .map(|v| v.map(|x| x.to_string()).unwrap_or_default()),
        );
        writer.write_record(&record)?;
    }

    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Row;
    use chrono::NaiveDate;

    #[test]
    fn test_header_dates_and_missing_values() {
        let table = TimeSeriesTable::new(
            vec!["66945000".to_string(), "66941000".to_string()],
            vec![
                Row {
                    date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                    values: vec![Some(120.5), None],
                },
                Row {
                    date: NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(),
                    values: vec![Some(98.0), Some(0.25)],
                },
            ],
        )
        .unwrap();

        let text = String::from_utf8(to_csv_bytes(&table).unwrap()).unwrap();
        assert_eq!(
            text,
            "date,66945000,66941000\n2020-01-01,120.5,\n2020-01-02,98,0.25\n"
        );
    }

    #[test]
    fn test_empty_table_is_header_only() {
        let table = TimeSeriesTable::new(vec!["1954002".to_string()], Vec::new()).unwrap();
        assert_eq!(to_csv_bytes(&table).unwrap(), b"date,1954002\n");
    }
}
