use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::builder::RangedU64ValueParser;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod chart;
mod classify;
mod config;
mod error;
mod forecast;
mod ingest;
mod metrics;
mod models;
mod report;

use classify::HuggingFaceClassifier;
use config::ClassifierConfig;
use forecast::{Forecaster, HoltForecaster};
use models::MetricsTable;

#[derive(Parser)]
#[command(name = "rca-dashboard")]
#[command(about = "Ticket RCA metrics, forecasting and incident classification", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ClassifierArgs {
    /// Inference API base URL
    #[arg(long, default_value = config::DEFAULT_ENDPOINT)]
    endpoint: String,
    /// Zero-shot model identifier
    #[arg(long, default_value = config::DEFAULT_MODEL)]
    model: String,
    /// Candidate labels, comma separated
    #[arg(long, value_delimiter = ',', default_value = "critical,high,medium,low")]
    labels: Vec<String>,
    #[arg(long, default_value_t = config::DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,
}

impl ClassifierArgs {
    /// Loads credentials and builds the process-wide classifier.
    fn init(self) -> error::Result<HuggingFaceClassifier> {
        let config =
            ClassifierConfig::from_env(self.endpoint, self.model, self.labels, self.timeout_secs)?;
        HuggingFaceClassifier::new(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the processed metrics table and summary
    Metrics {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Emit every row as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Forecast the ticket resolution rate
    Forecast {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, default_value_t = forecast::DEFAULT_PERIODS, value_parser = periods_parser())]
        periods: usize,
        /// Also write the forecast chart as SVG
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Write the trend, severity and forecast charts as SVG files
    Charts {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        #[arg(long, default_value_t = forecast::DEFAULT_PERIODS, value_parser = periods_parser())]
        periods: usize,
    },
    /// Classify an incident description
    Analyze {
        #[arg(long, default_value = "")]
        text: String,
        #[command(flatten)]
        classifier: ClassifierArgs,
    },
    /// Render the full HTML dashboard
    Dashboard {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, default_value = "dashboard.html")]
        out: PathBuf,
        #[arg(long, default_value_t = forecast::DEFAULT_PERIODS, value_parser = periods_parser())]
        periods: usize,
        /// Incident description to classify into the page
        #[arg(long)]
        incident: Option<String>,
        #[command(flatten)]
        classifier: ClassifierArgs,
    },
}

fn periods_parser() -> RangedU64ValueParser<usize> {
    RangedU64ValueParser::new().range(1..=forecast::MAX_PERIODS as u64)
}

fn load_metrics(path: &Path) -> anyhow::Result<MetricsTable> {
    let table = ingest::load_csv(path)
        .with_context(|| format!("failed to load ticket data from {}", path.display()))?;
    info!(rows = table.rows.len(), "computing derived metrics");
    Ok(metrics::derive_table(table))
}

fn write_file(path: &Path, contents: &str) -> anyhow::Result<()> {
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Metrics { csv, limit, json } => {
            print!("{}", run_metrics(&csv, limit, json)?);
        }
        Commands::Forecast { csv, periods, out } => {
            print!("{}", run_forecast(&csv, periods, out.as_deref())?);
            if let Some(out) = out {
                println!("Forecast chart written to {}.", out.display());
            }
        }
        Commands::Charts {
            csv,
            out_dir,
            periods,
        } => {
            run_charts(&csv, &out_dir, periods)?;
            println!("Charts written to {}.", out_dir.display());
        }
        Commands::Analyze { text, classifier } => {
            let text = classify::validate_incident(&text)?;
            let classifier = classifier
                .init()
                .context("failed to initialise incident classifier")?;
            let result = classify::analyze_incident(&classifier, text).await?;
            print!("{}", report::render_classification(&result));
        }
        Commands::Dashboard {
            csv,
            out,
            periods,
            incident,
            classifier,
        } => {
            run_dashboard(&csv, &out, periods, incident.as_deref(), classifier).await?;
            println!("Dashboard written to {}.", out.display());
        }
    }

    Ok(())
}

fn run_metrics(csv: &Path, limit: usize, json: bool) -> anyhow::Result<String> {
    let table = load_metrics(csv)?;
    if json {
        let mut text = report::render_json(&table)?;
        text.push('\n');
        return Ok(text);
    }

    let mut text = String::from("Processed RCA Metrics\n");
    text.push_str(&report::render_table(&table, limit));
    text.push('\n');
    text.push_str(&report::render_summary(&metrics::summarize(&table)));
    Ok(text)
}

fn run_forecast(csv: &Path, periods: usize, out: Option<&Path>) -> anyhow::Result<String> {
    let table = load_metrics(csv)?;
    let result = HoltForecaster.forecast(&forecast::to_forecast_input(&table), periods)?;

    let mut text = format!("{} (MAE {:.2})\n", result.model_info, result.mae);
    text.push_str("ds          yhat     yhat_lower  yhat_upper\n");
    for point in result.future() {
        text.push_str(&format!(
            "{}  {:>7.2}  {:>10.2}  {:>10.2}\n",
            point.ds, point.yhat, point.yhat_lower, point.yhat_upper
        ));
    }
    if let Some(out) = out {
        write_file(out, &chart::forecast_trend(&result, periods))?;
    }
    Ok(text)
}

fn run_charts(csv: &Path, out_dir: &Path, periods: usize) -> anyhow::Result<()> {
    let table = load_metrics(csv)?;
    let result = HoltForecaster.forecast(&forecast::to_forecast_input(&table), periods)?;

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    let charts = [
        ("resolution_rate.svg", chart::resolution_trend(&table)),
        ("severity_impact.svg", chart::severity_scatter(&table)),
        ("forecast.svg", chart::forecast_trend(&result, periods)),
    ];
    for (name, svg) in charts.iter() {
        write_file(&out_dir.join(name), svg)?;
    }
    Ok(())
}

/// Runs the whole pipeline; nothing is written unless every step succeeds.
async fn run_dashboard(
    csv: &Path,
    out: &Path,
    periods: usize,
    incident: Option<&str>,
    classifier: ClassifierArgs,
) -> anyhow::Result<()> {
    let table = load_metrics(csv)?;
    let result = HoltForecaster
        .forecast(&forecast::to_forecast_input(&table), periods)
        .context("failed to forecast ticket resolution rate")?;

    let analysis = match incident {
        Some(text) => Some(classify_for_page(classifier, text).await),
        None => None,
    };

    let page = report::build_dashboard(&table, &result, periods, analysis.as_ref());
    write_file(out, &page)
}

/// Classification errors are shown on the page rather than aborting the render.
async fn classify_for_page(
    args: ClassifierArgs,
    text: &str,
) -> error::Result<models::Classification> {
    let text = classify::validate_incident(text)?;
    let classifier = args.init()?;

    let outcome = classify::analyze_incident(&classifier, text).await;
    if let Err(err) = &outcome {
        warn!(error = %err, "incident classification failed");
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Date,Closed_Tickets,Total_Tickets,Total_Time_Taken,Time_Acknowledged,SLA_Response_Time,Ongoing_Tickets,Tickets_Handled,Agent_Shift,Open_Tickets,Severity";

    fn classifier_args() -> ClassifierArgs {
        ClassifierArgs {
            endpoint: config::DEFAULT_ENDPOINT.to_string(),
            model: config::DEFAULT_MODEL.to_string(),
            labels: vec!["critical".to_string()],
            timeout_secs: 1,
        }
    }

    fn write_csv(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("tickets.csv");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    fn three_day_csv(dir: &Path) -> PathBuf {
        write_csv(
            dir,
            &format!(
                "Team,{HEADER}\n\
                 Ops,2024-01-01,80,100,400,30,60,10,48,8,10,High\n\
                 Desk,2024-01-02,82,100,380,25,60,8,50,8,9,Low\n\
                 Ops,2024-01-03,85,100,360,20,60,7,52,8,8,Medium\n"
            ),
        )
    }

    #[test]
    fn periods_are_bounded_on_the_command_line() {
        let parse = |periods: &str| {
            Cli::try_parse_from(["rca-dashboard", "forecast", "--csv", "t.csv", "--periods", periods])
        };
        assert!(parse("30").is_ok());
        assert!(parse("3650").is_ok());
        assert!(parse("0").is_err());
        assert!(parse("100000000").is_err());

        let charts = Cli::try_parse_from([
            "rca-dashboard", "charts", "--csv", "t.csv", "--periods", "3651",
        ]);
        assert!(charts.is_err());
        let dashboard = Cli::try_parse_from([
            "rca-dashboard", "dashboard", "--csv", "t.csv", "--periods", "3651",
        ]);
        assert!(dashboard.is_err());
    }

    #[test]
    fn metrics_json_includes_extra_columns() {
        let dir = tempfile::tempdir().unwrap();
        let csv = three_day_csv(dir.path());

        let text = run_metrics(&csv, 20, true).unwrap();
        let rows: Vec<serde_json::Value> = serde_json::from_str(&text).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["Team"], "Ops");
        assert_eq!(rows[1]["Team"], "Desk");
        assert_eq!(rows[0]["Ticket_Resolution_Rate"], 80.0);
    }

    #[test]
    fn metrics_table_lists_rows_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let csv = three_day_csv(dir.path());

        let text = run_metrics(&csv, 2, false).unwrap();

        assert!(text.starts_with("Processed RCA Metrics\n"));
        assert!(text.contains("Team"));
        assert!(text.contains("... 1 more rows"));
        assert!(text.contains("3 rows covering 2024-01-01 to 2024-01-03"));
    }

    #[test]
    fn forecast_prints_future_rows_and_writes_chart() {
        let dir = tempfile::tempdir().unwrap();
        let csv = three_day_csv(dir.path());
        let out = dir.path().join("forecast.svg");

        let text = run_forecast(&csv, 5, Some(&out)).unwrap();

        assert!(text.starts_with("Holt linear trend"));
        assert!(text.contains("2024-01-04"));
        assert!(text.contains("2024-01-08"));
        assert!(!text.contains("2024-01-09"));
        let svg = std::fs::read_to_string(&out).unwrap();
        assert!(svg.contains("Predicted Ticket Resolution Rate for Next 5 Days"));
    }

    #[test]
    fn forecast_rejects_oversized_horizon() {
        let dir = tempfile::tempdir().unwrap();
        let csv = three_day_csv(dir.path());

        let err = run_forecast(&csv, 100_000_000, None).unwrap_err();
        let root = err.downcast_ref::<error::DashboardError>().unwrap();
        assert!(matches!(root, error::DashboardError::ForecastHorizon { .. }));
    }

    #[test]
    fn charts_writes_three_svg_files() {
        let dir = tempfile::tempdir().unwrap();
        let csv = three_day_csv(dir.path());
        let out_dir = dir.path().join("charts");

        run_charts(&csv, &out_dir, 30).unwrap();

        for name in ["resolution_rate.svg", "severity_impact.svg", "forecast.svg"] {
            let svg = std::fs::read_to_string(out_dir.join(name)).unwrap();
            assert!(svg.starts_with("<svg"), "{name} is not an SVG");
        }
    }

    #[tokio::test]
    async fn dashboard_renders_every_section() {
        let dir = tempfile::tempdir().unwrap();
        let csv = write_csv(
            dir.path(),
            &format!(
                "{HEADER}\n\
                 2024-01-01,80,100,400,30,60,10,48,8,10,High\n\
                 2024-01-02,82,100,380,25,60,8,50,8,9,Low\n\
                 2024-01-03,85,100,360,20,60,7,52,8,8,Medium\n"
            ),
        );
        let out = dir.path().join("dashboard.html");

        run_dashboard(&csv, &out, 30, None, classifier_args())
            .await
            .unwrap();

        let html = std::fs::read_to_string(&out).unwrap();
        assert!(html.contains("Processed RCA Metrics"));
        assert_eq!(html.matches("<svg").count(), 3);
        assert!(html.contains("Predicted Ticket Resolution Rate for Next 30 Days"));
    }

    #[tokio::test]
    async fn missing_column_fails_before_any_chart_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let csv = write_csv(
            dir.path(),
            "Date,Closed_Tickets,Severity\n2024-01-01,80,High\n",
        );
        let out = dir.path().join("dashboard.html");

        let err = run_dashboard(&csv, &out, 30, None, classifier_args())
            .await
            .unwrap_err();

        let root = err.downcast_ref::<error::DashboardError>().unwrap();
        assert!(matches!(root, error::DashboardError::MissingField { .. }));
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn blank_incident_is_reported_on_the_page() {
        let dir = tempfile::tempdir().unwrap();
        let csv = write_csv(
            dir.path(),
            &format!(
                "{HEADER}\n\
                 2024-01-01,80,100,400,30,60,10,48,8,10,High\n\
                 2024-01-02,82,100,380,25,60,8,50,8,9,Low\n"
            ),
        );
        let out = dir.path().join("dashboard.html");

        run_dashboard(&csv, &out, 7, Some("   "), classifier_args())
            .await
            .unwrap();

        let html = std::fs::read_to_string(&out).unwrap();
        assert!(html.contains("Please enter an incident description."));
    }
}
