//! QueryLens CLI
//!
//! Command-line interface for the QueryLens analytics and quality engine.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use querylens::clock::{window_start, SystemClock};
use querylens::db::FileStore;
use querylens::models::{
    Feedback, Insight, PerformanceReport, QueryMetric, QueryMetricInput, QueryPattern,
    QueryResponse, SuiteEvent, TestResult, TestSuiteResult,
};
use querylens::quality::{export, AnswerProvider, HttpAnswerProvider};
use querylens::{Config, QueryAnalytics};

/// QueryLens - Query analytics and quality evaluation for legal RAG
#[derive(Parser)]
#[command(name = "querylens")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "QUERYLENS_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum FeedbackArg {
    Positive,
    Negative,
    Neutral,
}

impl From<FeedbackArg> for Feedback {
    fn from(arg: FeedbackArg) -> Self {
        match arg {
            FeedbackArg::Positive => Feedback::Positive,
            FeedbackArg::Negative => Feedback::Negative,
            FeedbackArg::Neutral => Feedback::Neutral,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Record a query metric from a JSON file or stdin
    Record {
        /// JSON file with the metric (stdin if not specified)
        file: Option<PathBuf>,
    },

    /// Attach user feedback to a recorded query
    Feedback {
        /// Metric ID
        id: String,

        /// Feedback value
        #[arg(value_enum)]
        value: FeedbackArg,
    },

    /// Show the most recent query metrics
    Recent {
        /// Maximum number of results
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Show a performance report
    Report {
        /// Time range (e.g., "1h", "24h", "7d")
        #[arg(long, default_value = "24h")]
        last: String,
    },

    /// Show recurring query templates
    Patterns {
        /// Time range
        #[arg(long, default_value = "7d")]
        last: String,
    },

    /// Show recommendations for the configured insight window
    Insights,

    /// Export metrics as JSON
    ExportMetrics {
        /// Only metrics within this time range
        #[arg(long)]
        last: Option<String>,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete recorded metrics
    Clear {
        /// Only delete metrics older than this age
        #[arg(long)]
        older_than: Option<String>,

        /// Skip confirmation when deleting everything
        #[arg(long)]
        force: bool,
    },

    /// List the quality test catalog
    Catalog,

    /// Run quality tests
    Run {
        /// Run a single test by ID
        #[arg(long, conflicts_with = "category")]
        test: Option<String>,

        /// Run one or more categories
        #[arg(long)]
        category: Vec<String>,
    },

    /// Show stored suite results
    Results {
        /// Maximum number of suites
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Export a stored suite result as markdown (or JSON with --format json)
    ExportSuite {
        /// Suite position, 0 is the most recent
        #[arg(long, default_value = "0")]
        index: usize,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Provider used when no answer endpoint is configured
struct UnconfiguredProvider;

#[async_trait::async_trait]
impl AnswerProvider for UnconfiguredProvider {
    async fn answer(&self, _query: &str) -> anyhow::Result<QueryResponse> {
        bail!("no answer endpoint configured (set quality.answer_endpoint)")
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        generate_completions(shell);
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config, cli.verbose);

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(config: &Config, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    let format = cli.format;
    let service = build_service(&config)?;

    match cli.command {
        Commands::Record { file } => run_record(&service, file, format),
        Commands::Feedback { id, value } => {
            if !service.update_feedback(&id, value.into()) {
                bail!("no metric with id {id}");
            }
            println!("Feedback recorded for {id}");
            Ok(())
        }
        Commands::Recent { limit } => print_metrics(&service.get_recent(limit), format),
        Commands::Report { last } => {
            let window = parse_window(&last)?;
            print_report(&service.build_recent_report(window), format)
        }
        Commands::Patterns { last } => {
            let since = window_start(Utc::now(), parse_window(&last)?);
            print_patterns(&service.analyze_patterns(since), format)
        }
        Commands::Insights => print_insights(&service.generate_insights(), format),
        Commands::ExportMetrics { last, output } => {
            let start = last
                .as_deref()
                .map(parse_window)
                .transpose()?
                .map(|w| window_start(Utc::now(), w));
            let document = service.export_metrics(start, None)?;
            write_output(output, &serde_json::to_string_pretty(&document)?)
        }
        Commands::Clear { older_than, force } => {
            let cutoff = older_than
                .as_deref()
                .map(parse_window)
                .transpose()?
                .map(|w| window_start(Utc::now(), w));
            if cutoff.is_none() && !force {
                println!("WARNING: This will delete all recorded metrics!");
                println!("Use --force to confirm.");
                return Ok(());
            }
            let removed = service.clear_metrics(cutoff);
            println!("Removed {removed} metric(s)");
            Ok(())
        }
        Commands::Catalog => run_catalog(&service, format),
        Commands::Run { test, category } => {
            if config.quality.answer_endpoint.is_none() {
                bail!("quality.answer_endpoint must be set to run quality tests");
            }
            run_quality(&service, test, category, format).await
        }
        Commands::Results { limit } => {
            let suites: Vec<TestSuiteResult> = service
                .get_stored_suite_results()
                .into_iter()
                .take(limit)
                .collect();
            print_suites(&suites, format)
        }
        Commands::ExportSuite { index, output } => {
            let suite = service
                .get_stored_suite_results()
                .into_iter()
                .nth(index)
                .with_context(|| format!("no stored suite result at index {index}"))?;
            let rendered = match format {
                OutputFormat::Text => service.export_suite(&suite),
                OutputFormat::Json => export::to_json(&suite)?,
            };
            write_output(output, &rendered)
        }
        Commands::Completions { shell } => {
            generate_completions(shell);
            Ok(())
        }
    }
}

fn build_service(config: &Config) -> anyhow::Result<QueryAnalytics> {
    let data_dir = config.storage.resolve_data_dir();
    debug!(data_dir = %data_dir.display(), "Opening file store");
    let store = FileStore::open(&data_dir)
        .with_context(|| format!("opening data directory {}", data_dir.display()))?;

    let provider: Arc<dyn AnswerProvider> = match &config.quality.answer_endpoint {
        Some(endpoint) => Arc::new(HttpAnswerProvider::new(
            endpoint.clone(),
            config.quality.request_timeout,
        )?),
        None => Arc::new(UnconfiguredProvider),
    };

    Ok(QueryAnalytics::new(
        config,
        Arc::new(store),
        Arc::new(SystemClock),
        provider,
    )?)
}

fn parse_window(raw: &str) -> anyhow::Result<chrono::Duration> {
    let duration =
        humantime::parse_duration(raw).with_context(|| format!("invalid duration: {raw}"))?;
    chrono::Duration::from_std(duration).with_context(|| format!("duration out of range: {raw}"))
}

fn write_output(output: Option<PathBuf>, content: &str) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(&path, content)
                .with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "Wrote export");
        }
        None => println!("{content}"),
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_record(
    service: &QueryAnalytics,
    file: Option<PathBuf>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let raw = match file {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let input: QueryMetricInput =
        serde_json::from_str(&raw).context("parsing query metric JSON")?;
    let metric = service.record(input);

    match format {
        OutputFormat::Json => print_json(&metric),
        OutputFormat::Text => {
            println!("Recorded {} ({}ms)", metric.id, metric.latency_ms);
            Ok(())
        }
    }
}

fn print_metrics(metrics: &[QueryMetric], format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        return print_json(metrics);
    }
    if metrics.is_empty() {
        println!("No metrics recorded");
        return Ok(());
    }
    for m in metrics {
        println!(
            "{}  {}  {:>6}ms  {}  rel {:.2}  {}",
            m.timestamp.format("%Y-%m-%d %H:%M:%S"),
            m.id,
            m.latency_ms,
            if m.success { "ok " } else { "ERR" },
            m.relevance_score,
            truncate(&m.query, 60)
        );
    }
    Ok(())
}

fn print_report(report: &PerformanceReport, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        return print_json(report);
    }
    println!(
        "Performance report {} .. {}",
        fmt_time(report.period_start),
        fmt_time(report.period_end)
    );
    if report.is_empty() {
        println!("  No queries in this period");
        return Ok(());
    }
    println!(
        "  Queries:      {} ({} ok, {} failed)",
        report.total_queries, report.successful_queries, report.failed_queries
    );
    println!(
        "  Latency:      avg {:.0}ms  median {:.0}ms  p95 {:.0}ms",
        report.average_latency_ms, report.median_latency_ms, report.p95_latency_ms
    );
    println!("  Cache hits:   {:.1}%", report.cache_hit_rate);
    println!("  Error rate:   {:.1}%", report.error_rate);
    println!(
        "  Relevance:    {:.2}  confidence {:.2}  docs {:.1}",
        report.average_relevance, report.average_confidence, report.average_document_count
    );
    println!("  Satisfaction: {:.1}%", report.user_satisfaction_rate);

    if !report.popular_queries.is_empty() {
        println!();
        println!("  Popular queries:");
        for q in &report.popular_queries {
            println!(
                "    {:>4}x  {:>6.0}ms  {:>5.1}%  {}",
                q.count,
                q.average_latency_ms,
                q.success_rate,
                truncate(&q.query, 60)
            );
        }
    }
    if !report.error_distribution.is_empty() {
        println!();
        println!("  Errors:");
        for (kind, count) in &report.error_distribution {
            println!("    {count:>4}  {kind}");
        }
    }
    Ok(())
}

fn print_patterns(patterns: &[QueryPattern], format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        return print_json(patterns);
    }
    if patterns.is_empty() {
        println!("No recurring query patterns");
        return Ok(());
    }
    for p in patterns {
        println!(
            "{:>4}x  rel {:.2}  {:>6.0}ms  {:>5.1}%  {}",
            p.occurrences, p.average_relevance, p.average_latency_ms, p.success_rate, p.template
        );
    }
    Ok(())
}

fn print_insights(insights: &[Insight], format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        return print_json(insights);
    }
    if insights.is_empty() {
        println!("No insights for this period");
        return Ok(());
    }
    for insight in insights {
        println!("[{:?}] {}", insight.kind, insight.title);
        println!("  {}", insight.description);
        if let Some(recommendation) = &insight.recommendation {
            println!("  -> {recommendation}");
        }
    }
    Ok(())
}

fn run_catalog(service: &QueryAnalytics, format: OutputFormat) -> anyhow::Result<()> {
    let catalog = service.list_catalog();
    if format == OutputFormat::Json {
        return print_json(catalog);
    }
    for test in catalog {
        println!(
            "{:<28} {:<16} {} ({} expectation(s))",
            test.id,
            test.category.as_str(),
            test.name,
            test.expectations.len()
        );
    }
    Ok(())
}

async fn run_quality(
    service: &QueryAnalytics,
    test: Option<String>,
    categories: Vec<String>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    if let Some(id) = test {
        let result = service.run_test(&id).await?;
        return print_results(std::slice::from_ref(&result), format);
    }

    if categories.len() > 1 {
        let names: Vec<&str> = categories.iter().map(String::as_str).collect();
        let suites = service.run_categories(&names).await;
        return print_suites(&suites, format);
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if format == OutputFormat::Text {
                print_event(&event);
            }
        }
    });

    let suite = match categories.first() {
        Some(category) => {
            service
                .run_tests_by_category_with_progress(category, tx)
                .await
        }
        None => service.run_all_tests_with_progress(tx).await,
    };
    printer.await?;

    print_suites(std::slice::from_ref(&suite), format)
}

fn print_event(event: &SuiteEvent) {
    match event {
        SuiteEvent::Started {
            suite_name,
            total_tests,
        } => println!("Running {suite_name} ({total_tests} tests)"),
        SuiteEvent::TestStarted { test_id, index } => println!("  [{}] {test_id} ...", index + 1),
        SuiteEvent::TestFinished {
            test_id,
            status,
            score,
            ..
        } => println!("      {test_id}: {status:?} (score {score:.2})"),
        SuiteEvent::Completed {
            passed_tests,
            total_tests,
            ..
        } => println!("Done: {passed_tests}/{total_tests} passed"),
    }
}

fn print_results(results: &[TestResult], format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        return print_json(results);
    }
    for result in results {
        println!(
            "{} {} [{:?}] score {:.2} in {}ms",
            if result.passed { "PASS" } else { "FAIL" },
            result.test_id,
            result.status,
            result.score,
            result.duration_ms
        );
        if let Some(error) = &result.error {
            println!("  error: {error}");
        }
        for detail in &result.details {
            println!(
                "  {} {}: {}",
                if detail.passed { "+" } else { "-" },
                detail.description,
                detail.message
            );
        }
    }
    Ok(())
}

fn print_suites(suites: &[TestSuiteResult], format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        return print_json(suites);
    }
    if suites.is_empty() {
        println!("No stored suite results");
        return Ok(());
    }
    for suite in suites {
        println!(
            "{}  {:<20} {:>3}/{:<3} passed  avg score {:.2}  {}ms",
            fmt_time(suite.timestamp),
            suite.suite_name,
            suite.passed_tests,
            suite.total_tests,
            suite.average_score,
            suite.total_duration_ms
        );
    }
    Ok(())
}

fn fmt_time(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max).collect();
        out.push_str("...");
        out
    }
}

fn generate_completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "querylens", &mut io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_takes_file_or_stdin() {
        let cli = Cli::try_parse_from(["querylens", "record", "metric.json"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Record { file: Some(ref path) } if path == &PathBuf::from("metric.json")
        ));

        let cli = Cli::try_parse_from(["querylens", "record"]).unwrap();
        assert!(matches!(cli.command, Commands::Record { file: None }));

        assert!(Cli::try_parse_from(["querylens", "record", "q", "--latency", "850"]).is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
