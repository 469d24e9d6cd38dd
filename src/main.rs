use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use crm_priority::config::AppConfig;
use crm_priority::error::AppError;
use crm_priority::telemetry;
use crm_priority::workflows::ledger::{load_contact_log, LedgerImporter};
use crm_priority::workflows::outreach::{
    ActionReport, AnniversaryWindow, BusinessConfig, OutreachPipeline, RunOptions,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "crm-priority",
    about = "Rank customers for outreach from order ledgers",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score every customer and print the ranked action list
    Run(RunArgs),
    /// Work with the business configuration document
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate the configuration and print the resolved values
    Check(ConfigCheckArgs),
}

#[derive(Args, Debug)]
struct ConfigCheckArgs {
    /// Configuration document (defaults to CRM_CONFIG_PATH)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Order ledger CSV export
    #[arg(long)]
    orders: PathBuf,
    /// Configuration document (defaults to CRM_CONFIG_PATH)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Contact log CSV used for cooldown suppression
    #[arg(long)]
    contacts: Option<PathBuf>,
    /// Evaluation date (YYYY-MM-DD, defaults to today)
    #[arg(long, value_parser = parse_date)]
    run_date: Option<NaiveDate>,
    /// Days after a contact during which a customer is not contacted again
    #[arg(long)]
    cooldown_days: Option<u32>,
    /// Multiplier applied to repurchase cycles for churn thresholds
    #[arg(long, value_parser = parse_positive)]
    churn_multiplier: Option<f64>,
    /// Skip customers who ordered within this many days (0 disables)
    #[arg(long)]
    exclude_recent_days: Option<u32>,
    /// Keep customers who returned every order
    #[arg(long)]
    allow_high_return: bool,
    /// Cap on the ranked action list
    #[arg(long)]
    max_action_count: Option<usize>,
    /// Restrict to first-order anniversaries, e.g. 11:10-20 (repeatable)
    #[arg(long = "anniversary")]
    anniversary_windows: Vec<AnniversaryWindow>,
    /// Write the full JSON report here (defaults to CRM_OUTPUT_DIR when set)
    #[arg(long)]
    output: Option<PathBuf>,
    /// Number of action rows printed to the console
    #[arg(long, default_value_t = 20)]
    list: usize,
}

fn main() {
    if let Err(err) = run_cli() {
        eprintln!("application error: {err}");
        std::process::exit(err.exit_code());
    }
}

fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry, config.environment)?;

    match cli.command {
        Command::Run(args) => run_outreach(args, &config),
        Command::Config {
            command: ConfigCommand::Check(args),
        } => check_config(args, &config),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

fn parse_positive(raw: &str) -> Result<f64, String> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value > 0.0 && value.is_finite() => Ok(value),
        _ => Err(format!("'{raw}' is not a positive number")),
    }
}

fn run_outreach(args: RunArgs, app: &AppConfig) -> Result<(), AppError> {
    let run_date = args.run_date.unwrap_or_else(|| Local::now().date_naive());
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| app.paths.business_config.clone());
    let business = BusinessConfig::load(&config_path)?;
    info!(path = %config_path.display(), categories = business.categories.len(), "configuration loaded");

    let ledger = LedgerImporter::new(run_date)
        .with_max_rejected_fraction(business.integrity.max_rejected_fraction)
        .import_path(&args.orders)?;
    let cooldown = load_contact_log(args.contacts.as_deref(), run_date);

    let options = run_options(&args, &business, run_date);
    let outcome = OutreachPipeline::new(&business).run(&ledger.orders, &cooldown, &options);
    let report = ActionReport::from_outcome(&outcome);

    let output = args
        .output
        .clone()
        .or_else(|| app.paths.output_file(&format!("outreach-{run_date}.json")));
    if let Some(path) = output {
        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut writer, &report)?;
        writer.flush()?;
        info!(path = %path.display(), "report written");
    }

    render_report(&report, ledger.rejected.len(), args.list);
    Ok(())
}

fn run_options(args: &RunArgs, business: &BusinessConfig, run_date: NaiveDate) -> RunOptions {
    let mut options = RunOptions::from_config(business, run_date);
    if let Some(days) = args.cooldown_days {
        options.cooldown_days = days;
    }
    if let Some(multiplier) = args.churn_multiplier {
        options.churn_multiplier = multiplier;
    }
    if let Some(days) = args.exclude_recent_days {
        options.exclude_recent_days = days;
    }
    if args.allow_high_return {
        options.allow_high_return = true;
    }
    if args.max_action_count.is_some() {
        options.max_action_count = args.max_action_count;
    }
    options.anniversary_windows = args.anniversary_windows.clone();
    options
}

fn render_report(report: &ActionReport, rejected_rows: usize, list: usize) {
    let summary = &report.summary;
    println!("Customer outreach priorities for {}", summary.run_date);
    println!(
        "Orders: {} read, {} rejected, {} without identity, {} sample/drop-ship",
        summary.order_count, rejected_rows, summary.orders_without_identity, summary.excluded_item_orders
    );
    println!(
        "Customers: {} in overview, {} in action list{}",
        summary.customer_count,
        summary.action_count,
        if summary.truncated > 0 {
            format!(" ({} more over the cap)", summary.truncated)
        } else {
            String::new()
        }
    );
    if !summary.cooldown_applied {
        println!("Cooldown: not applied (contact log unavailable)");
    }

    println!("\nPriority buckets");
    for bucket in &summary.buckets {
        println!("- {}: {}", bucket.bucket_label, bucket.customers);
    }

    println!("\nValue tiers");
    for tier in &summary.value_tiers {
        println!("- {}: {}", tier.tier_label, tier.customers);
    }

    if !summary.tags.is_empty() {
        println!("\nTags");
        for tag in &summary.tags {
            println!("- {}: {}", tag.tag_label, tag.customers);
        }
    }

    if !summary.exclusions.is_empty() {
        println!("\nExcluded from action list");
        for exclusion in &summary.exclusions {
            println!("- {}: {}", exclusion.reason, exclusion.customers);
        }
    }

    if !report.monthly.months.is_empty() {
        println!("\nMonthly sales");
        for month in &report.monthly.months {
            println!(
                "- {}: {:.2} over {} orders, AOV {:.2}, returns {:.1}%{}",
                month.month,
                month.revenue,
                month.orders,
                month.average_order_value,
                month.return_rate * 100.0,
                month
                    .revenue_growth
                    .map(|growth| format!(", revenue {:+.1}%", growth * 100.0))
                    .unwrap_or_default()
            );
        }
    }

    if report.actions.is_empty() {
        println!("\nAction list: empty");
        return;
    }

    println!("\nAction list");
    for view in report.actions.iter().take(list) {
        let tags: Vec<&str> = view.tags.iter().map(|tag| tag.label).collect();
        println!(
            "{:>3}. {} | {} | score {:.1} ({}) | {} orders | last {} | {}",
            view.rank.unwrap_or_default(),
            view.name.as_deref().unwrap_or("-"),
            view.key,
            view.priority_score,
            view.bucket_label,
            view.valid_orders,
            view.last_order
                .map(|date| date.to_string())
                .unwrap_or_else(|| "-".to_string()),
            if tags.is_empty() {
                "-".to_string()
            } else {
                tags.join(", ")
            }
        );
    }
    if report.actions.len() > list {
        println!("... {} more", report.actions.len() - list);
    }
}

fn check_config(args: ConfigCheckArgs, app: &AppConfig) -> Result<(), AppError> {
    let path = args
        .config
        .unwrap_or_else(|| app.paths.business_config.clone());
    let business = BusinessConfig::load(&path)?;

    println!("Configuration OK: {}", path.display());
    let defaults = &business.defaults;
    println!(
        "Defaults: margin {:.2}, cycle {} days, return rate {:.2}, touch cost {:.2}",
        defaults.gross_margin,
        defaults.category_cycle_days,
        defaults.expected_return_rate,
        defaults.touch_cost
    );

    println!("\nCategories (matched in this order)");
    if business.categories.is_empty() {
        println!("- none");
    }
    for rule in &business.categories {
        println!("- {}: {}", rule.name, rule.aliases.join(", "));
    }

    if !business.platform_touch_cost.is_empty() {
        println!("\nPlatform touch costs");
        for (platform, cost) in &business.platform_touch_cost {
            println!("- {platform}: {cost:.2}");
        }
    }

    let filters = &business.filters;
    println!(
        "\nFilters: cooldown {} days, churn x{}, recent {} days, min score {}, min orders {}",
        filters.cooldown_days,
        filters.churn_multiplier,
        filters.exclude_recent_days,
        filters.min_priority_score,
        filters.min_orders
    );

    println!("\nPriority boosts");
    for boost in &business.priority_boosts {
        println!("- {}: {:+}", boost.name, boost.points);
    }
    Ok(())
}
