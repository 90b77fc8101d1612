use anyhow::{Context, Result};
use billing_ingest::ingestor_from_settings;
use clap::{Parser, ValueEnum};
use models::{GroupKey, Period, ServiceCodeSelector, ALL_SERVICES};
use report_engine::{open_session, write_report_json, ReportOutput, ReportRequest};
use settings_loader::DEFAULT_SETTINGS_FILE;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GroupBy {
    ServiceCode,
    ServiceName,
}

impl From<GroupBy> for GroupKey {
    fn from(g: GroupBy) -> Self {
        match g {
            GroupBy::ServiceCode => GroupKey::ServiceCode,
            GroupBy::ServiceName => GroupKey::ServiceName,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "generate-report", about = "Generate the billing trend and service ranking report.")]
struct Args {
    /// Path to the report settings JSON
    #[arg(long, env = "BILLING_REPORT_SETTINGS", default_value = DEFAULT_SETTINGS_FILE)]
    settings: PathBuf,

    #[arg(short, long, env = "BILLING_REPORT_USER")]
    user: String,

    #[arg(short, long, env = "BILLING_REPORT_PASSWORD", hide_env_values = true)]
    password: String,

    /// Service code to chart, or ALL
    #[arg(long, default_value = ALL_SERVICES)]
    service: String,

    /// Status to include; repeat for several. Defaults to every status in the data
    #[arg(long = "status")]
    statuses: Vec<String>,

    /// First month (YYYY-MM), defaults to the oldest month in the data
    #[arg(long)]
    from: Option<Period>,

    /// Last month (YYYY-MM), defaults to the newest month in the data
    #[arg(long)]
    to: Option<Period>,

    #[arg(long, value_enum)]
    group_by: Option<GroupBy>,

    /// Number of services in the ranking
    #[arg(long)]
    top: Option<usize>,

    #[arg(short, long, default_value = "report/report.json")]
    out: PathBuf,

    #[arg(long)]
    pretty: bool,

    /// Print the available filter values and exit
    #[arg(long)]
    list_options: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "report_engine=info,billing_ingest=info".into()),
        )
        .init();

    let args = Args::parse();
    let settings = settings_loader::load_settings(&args.settings)?;

    let mut session = open_session(&settings, &args.user, &args.password)?;
    if let Some(n) = args.top {
        session = session.with_top_n(n);
    }
    if let Some(g) = args.group_by {
        session = session.with_group_key(g.into());
    }

    let request = ReportRequest {
        service: ServiceCodeSelector::from(args.service.as_str()),
        statuses: args.statuses.clone(),
        from: args.from,
        to: args.to,
    };
    let ingestor = ingestor_from_settings(&settings.source, request.pushdown_range())
        .context("opening billing data source")?;
    session
        .load(ingestor.as_ref())
        .with_context(|| format!("loading {}", ingestor.describe()))?;

    let options = session.options();
    if options.is_none() {
        println!(
            "Warning: no billing rows with a valid period in {}",
            ingestor.describe()
        );
    }

    if args.list_options {
        let listed = options.unwrap_or_default();
        println!("{}", serde_json::to_string_pretty(&listed)?);
        return Ok(());
    }

    let criteria = request.resolve(options.as_ref());
    let report = session.run(&criteria).context("building report")?;
    for w in &report.warnings {
        println!("Warning: {}", w);
    }

    let output = ReportOutput::new(&session, report);
    write_report_json(&output, &args.out, args.pretty).context("write report.json")?;

    println!(
        "Done. {} trend rows, {} ranked services, written to {} at {}",
        output.trend.len(),
        output.ranking.len(),
        args.out.display(),
        output.metadata.generated_at
    );
    Ok(())
}
