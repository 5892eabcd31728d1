use tracing::warn;

use crate::models::{
    DerivedMetrics, MetricsRow, MetricsSummary, MetricsTable, TicketRecord, TicketTable,
};

/// Ratio metrics for one row. Zero denominators yield IEEE infinities or NaN.
pub fn derive(record: &TicketRecord) -> DerivedMetrics {
    DerivedMetrics {
        ticket_resolution_rate: record.closed_tickets / record.total_tickets * 100.0,
        average_resolution_time: record.total_time_taken / record.closed_tickets,
        response_time_efficiency: record.time_acknowledged / record.sla_response_time,
        pending_ticket_impact: record.ongoing_tickets / record.total_tickets * 100.0,
        agent_productivity: record.tickets_handled / record.agent_shift,
        backlog_rate: record.open_tickets / record.total_tickets * 100.0,
    }
}

pub fn derive_table(table: TicketTable) -> MetricsTable {
    let rows: Vec<MetricsRow> = table
        .rows
        .into_iter()
        .map(|record| {
            let metrics = derive(&record);
            MetricsRow { record, metrics }
        })
        .collect();

    let undefined_rows = rows.iter().filter(|row| !row.metrics.is_finite()).count();
    if undefined_rows > 0 {
        warn!(undefined_rows, "rows with zero or missing denominators produce undefined metrics");
    }

    MetricsTable {
        extra_columns: table.extra_columns,
        rows,
        undefined_rows,
    }
}

pub fn summarize(table: &MetricsTable) -> MetricsSummary {
    let mut sums = [0.0f64; 6];
    let mut counts = [0usize; 6];

    for row in table.rows.iter() {
        for (idx, value) in row.metrics.values().iter().enumerate() {
            if value.is_finite() {
                sums[idx] += value;
                counts[idx] += 1;
            }
        }
    }

    let mut means = [None; 6];
    for idx in 0..6 {
        if counts[idx] > 0 {
            means[idx] = Some(sums[idx] / counts[idx] as f64);
        }
    }

    MetricsSummary {
        row_count: table.rows.len(),
        undefined_rows: table.undefined_rows,
        first_date: table.rows.iter().map(|row| row.record.date).min(),
        last_date: table.rows.iter().map(|row| row.record.date).max(),
        means,
    }
}
