use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::StringRecord;
use tracing::debug;

use crate::error::{DashboardError, Result};
use crate::models::{TicketRecord, TicketTable, REQUIRED_COLUMNS};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"];

/// Positions of the required columns in the CSV header, in `REQUIRED_COLUMNS` order.
struct ColumnMap {
    required: [usize; 11],
    extra: Vec<(usize, String)>,
}

impl ColumnMap {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let names: Vec<&str> = headers.iter().collect();
        let mut required = [0usize; 11];
        let mut missing = Vec::new();

        for (slot, column) in REQUIRED_COLUMNS.iter().enumerate() {
            match names.iter().position(|name| name == column) {
                Some(idx) => required[slot] = idx,
                None => missing.push(column.to_string()),
            }
        }

        if !missing.is_empty() {
            return Err(DashboardError::MissingField { field: missing });
        }

        let extra = names
            .iter()
            .enumerate()
            .filter(|(_, name)| !REQUIRED_COLUMNS.contains(*name))
            .map(|(idx, name)| (idx, name.to_string()))
            .collect();

        Ok(Self { required, extra })
    }
}

pub fn load_csv(path: &Path) -> Result<TicketTable> {
    let file = std::fs::File::open(path)?;
    load_reader(std::io::BufReader::new(file))
}

/// Parses ticket records from any reader. Fails on the first bad row.
pub fn load_reader<R: Read>(reader: R) -> Result<TicketTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(DashboardError::EmptyFile);
    }
    let columns = ColumnMap::from_headers(&headers)?;

    let mut rows = Vec::new();
    for (row_idx, result) in rdr.records().enumerate() {
        let record = result?;
        // +2: one for the header row, one for 1-based numbering
        rows.push(parse_record(&columns, &record, row_idx + 2)?);
    }

    if rows.is_empty() {
        return Err(DashboardError::EmptyFile);
    }

    debug!(rows = rows.len(), extra_columns = columns.extra.len(), "loaded ticket CSV");

    Ok(TicketTable {
        extra_columns: columns.extra.iter().map(|(_, name)| name.clone()).collect(),
        rows,
    })
}

fn parse_record(columns: &ColumnMap, record: &StringRecord, line: usize) -> Result<TicketRecord> {
    let field = |slot: usize| record.get(columns.required[slot]).unwrap_or("").trim();
    let number = |slot: usize| parse_number(field(slot), REQUIRED_COLUMNS[slot], line);

    let date_raw = field(0);
    let date = parse_date(date_raw).ok_or_else(|| DashboardError::TypeMismatch {
        line,
        field: "Date".to_string(),
        value: date_raw.to_string(),
    })?;

    Ok(TicketRecord {
        date,
        closed_tickets: number(1)?,
        total_tickets: number(2)?,
        total_time_taken: number(3)?,
        time_acknowledged: number(4)?,
        sla_response_time: number(5)?,
        ongoing_tickets: number(6)?,
        tickets_handled: number(7)?,
        agent_shift: number(8)?,
        open_tickets: number(9)?,
        severity: field(10).to_string(),
        extra: columns
            .extra
            .iter()
            .map(|(idx, _)| record.get(*idx).unwrap_or("").to_string())
            .collect(),
    })
}

/// Empty cells are missing values and become NaN.
fn parse_number(raw: &str, field: &str, line: usize) -> Result<f64> {
    if raw.is_empty() {
        return Ok(f64::NAN);
    }
    raw.parse::<f64>().map_err(|_| DashboardError::TypeMismatch {
        line,
        field: field.to_string(),
        value: raw.to_string(),
    })
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(datetime.date());
        }
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|datetime| datetime.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Date,Closed_Tickets,Total_Tickets,Total_Time_Taken,Time_Acknowledged,SLA_Response_Time,Ongoing_Tickets,Tickets_Handled,Agent_Shift,Open_Tickets,Severity";

    fn csv_with(rows: &[&str]) -> String {
        let mut out = String::from(HEADER);
        for row in rows {
            out.push('\n');
            out.push_str(row);
        }
        out
    }

    #[test]
    fn loads_required_columns() {
        let data = csv_with(&["2024-01-01,80,100,400,30,60,10,50,8,10,High"]);
        let table = load_reader(data.as_bytes()).unwrap();

        assert_eq!(table.rows.len(), 1);
        let row = &table.rows[0];
        assert_eq!(row.date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(row.closed_tickets, 80.0);
        assert_eq!(row.total_tickets, 100.0);
        assert_eq!(row.agent_shift, 8.0);
        assert_eq!(row.severity, "High");
        assert!(table.extra_columns.is_empty());
    }

    #[test]
    fn keeps_extra_columns_in_header_order() {
        let data = "Team,Date,Closed_Tickets,Total_Tickets,Total_Time_Taken,Time_Acknowledged,SLA_Response_Time,Ongoing_Tickets,Tickets_Handled,Agent_Shift,Open_Tickets,Severity,Region\n\
                    Ops,2024-01-01,80,100,400,30,60,10,50,8,10,Low,EU";
        let table = load_reader(data.as_bytes()).unwrap();

        assert_eq!(table.extra_columns, vec!["Team", "Region"]);
        assert_eq!(table.rows[0].extra, vec!["Ops", "EU"]);
        assert_eq!(table.rows[0].severity, "Low");
    }

    #[test]
    fn reports_every_missing_column() {
        let data = "Date,Closed_Tickets,Severity\n2024-01-01,80,High";
        let err = load_reader(data.as_bytes()).unwrap_err();

        match err {
            DashboardError::MissingField { field } => {
                assert!(field.contains(&"Total_Tickets".to_string()));
                assert!(field.contains(&"Agent_Shift".to_string()));
                assert!(!field.contains(&"Date".to_string()));
                assert_eq!(field.len(), 8);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_non_numeric_values_with_line() {
        let data = csv_with(&[
            "2024-01-01,80,100,400,30,60,10,50,8,10,High",
            "2024-01-02,eighty,100,400,30,60,10,50,8,10,High",
        ]);
        let err = load_reader(data.as_bytes()).unwrap_err();

        match err {
            DashboardError::TypeMismatch { line, field, value } => {
                assert_eq!(line, 3);
                assert_eq!(field, "Closed_Tickets");
                assert_eq!(value, "eighty");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_unparseable_dates() {
        let data = csv_with(&["yesterday,80,100,400,30,60,10,50,8,10,High"]);
        let err = load_reader(data.as_bytes()).unwrap_err();
        assert!(matches!(err, DashboardError::TypeMismatch { ref field, .. } if field == "Date"));
    }

    #[test]
    fn empty_numeric_cells_are_missing_values() {
        let data = csv_with(&["2024-01-01,80,100,,30,60,10,50,8,10,High"]);
        let table = load_reader(data.as_bytes()).unwrap();
        assert!(table.rows[0].total_time_taken.is_nan());
    }

    #[test]
    fn header_only_file_is_empty() {
        let err = load_reader(HEADER.as_bytes()).unwrap_err();
        assert!(matches!(err, DashboardError::EmptyFile));
    }

    #[test]
    fn accepts_common_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(parse_date("2024-03-05"), Some(expected));
        assert_eq!(parse_date("2024/03/05"), Some(expected));
        assert_eq!(parse_date("03/05/2024"), Some(expected));
        assert_eq!(parse_date("2024-03-05 14:30:00"), Some(expected));
        assert_eq!(parse_date("2024-03-05T14:30:00Z"), Some(expected));
        assert_eq!(parse_date(""), None);
    }
}
