use chrono::NaiveDate;
use serde::Deserialize;

/// Columns every uploaded ticket CSV must carry.
pub const REQUIRED_COLUMNS: &[&str] = &[
    "Date",
    "Closed_Tickets",
    "Total_Tickets",
    "Total_Time_Taken",
    "Time_Acknowledged",
    "SLA_Response_Time",
    "Ongoing_Tickets",
    "Tickets_Handled",
    "Agent_Shift",
    "Open_Tickets",
    "Severity",
];

pub const DERIVED_COLUMNS: &[&str] = &[
    "Ticket_Resolution_Rate",
    "Average_Resolution_Time",
    "Response_Time_Efficiency",
    "Pending_Ticket_Impact",
    "Agent_Productivity",
    "Backlog_Rate",
];

#[derive(Debug, Clone, PartialEq)]
pub struct TicketRecord {
    pub date: NaiveDate,
    pub closed_tickets: f64,
    pub total_tickets: f64,
    pub total_time_taken: f64,
    pub time_acknowledged: f64,
    pub sla_response_time: f64,
    pub ongoing_tickets: f64,
    pub tickets_handled: f64,
    pub agent_shift: f64,
    pub open_tickets: f64,
    pub severity: String,
    /// Values of non-required columns, aligned with `TicketTable::extra_columns`.
    pub extra: Vec<String>,
}

impl TicketRecord {
    /// Numeric fields in `REQUIRED_COLUMNS[1..10]` order.
    pub fn numbers(&self) -> [f64; 9] {
        [
            self.closed_tickets,
            self.total_tickets,
            self.total_time_taken,
            self.time_acknowledged,
            self.sla_response_time,
            self.ongoing_tickets,
            self.tickets_handled,
            self.agent_shift,
            self.open_tickets,
        ]
    }
}

#[derive(Debug, Clone)]
pub struct TicketTable {
    pub extra_columns: Vec<String>,
    pub rows: Vec<TicketRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedMetrics {
    pub ticket_resolution_rate: f64,
    pub average_resolution_time: f64,
    pub response_time_efficiency: f64,
    pub pending_ticket_impact: f64,
    pub agent_productivity: f64,
    pub backlog_rate: f64,
}

impl DerivedMetrics {
    pub fn values(&self) -> [f64; 6] {
        [
            self.ticket_resolution_rate,
            self.average_resolution_time,
            self.response_time_efficiency,
            self.pending_ticket_impact,
            self.agent_productivity,
            self.backlog_rate,
        ]
    }

    pub fn is_finite(&self) -> bool {
        self.values().iter().all(|value| value.is_finite())
    }
}

#[derive(Debug, Clone)]
pub struct MetricsRow {
    pub record: TicketRecord,
    pub metrics: DerivedMetrics,
}

#[derive(Debug, Clone)]
pub struct MetricsTable {
    pub extra_columns: Vec<String>,
    pub rows: Vec<MetricsRow>,
    /// Rows with at least one non-finite derived metric.
    pub undefined_rows: usize,
}

#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub row_count: usize,
    pub undefined_rows: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    /// Mean of each derived column over finite values, in `DERIVED_COLUMNS` order.
    pub means: [Option<f64>; 6],
}

/// One `(ds, y)` observation in the forecaster's input schema.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastInput {
    pub ds: NaiveDate,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastPoint {
    pub ds: NaiveDate,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
    /// False for in-sample rows covering the history.
    pub is_future: bool,
}

#[derive(Debug, Clone)]
pub struct Forecast {
    pub points: Vec<ForecastPoint>,
    pub model_info: String,
    pub mae: f64,
    pub history_length: usize,
}

impl Forecast {
    pub fn future(&self) -> impl Iterator<Item = &ForecastPoint> {
        self.points.iter().filter(|point| point.is_future)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

/// Ranked labels, highest score first.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub sequence: String,
    pub labels: Vec<LabelScore>,
}

impl Classification {
    pub fn top(&self) -> Option<&LabelScore> {
        self.labels.first()
    }
}
