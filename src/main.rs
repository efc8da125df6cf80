//! CLI for the ICP Intelligence client engine.
//!
//! Thin dispatch over the library: each subcommand loads config, calls the
//! relevant engine surface, and renders the result as text.

use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;

use icp_intel::activation::activate_accounts;
use icp_intel::error::EngineError;
use icp_intel::export;
use icp_intel::filters::{filter_accounts, AccountFilter};
use icp_intel::scheduler::{next_run, Scheduler};
use icp_intel::search::{SearchController, SearchEvent, SearchPhase};
use icp_intel::state::AppState;
use icp_intel::store::{AutomationSchedule, Cadence, StopCondition, StoreClient};
use icp_intel::types::Config;

const USAGE: &str = "\
Usage: icp-intel <command>

Commands:
  search <query>                 Run a company search, streaming progress
  accounts list [--min-fit N]    List qualified accounts
  accounts delete <id>           Delete an account (and its enrichment row)
  accounts export [--min-fit N]  Export qualified accounts to CSV
  accounts activate [--min-fit N] Forward the filtered set to the webhook
  prospects list [domain]        List decision makers
  icp list                       List ICP models
  icp set-primary <id>           Make a model the primary
  schedules list                 List automation schedules (with next run)
  schedules add <query> --cadence <daily|weekly|monthly> --time HH:MM
                --start YYYY-MM-DD (--stop-after-runs N | --stop-after-results N)
                [--count N] [--auto-save] [--notify]
                                 Create a recurring search
  schedules run <id>             Execute one schedule immediately
  schedules daemon               Run the scheduler loop
  events export                  Export company events to CSV
";

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("hint: {}", e.recovery_suggestion());
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Vec<String>) -> Result<(), EngineError> {
    let state = AppState::shared();

    match args.first().map(String::as_str) {
        Some("search") => {
            let query = args[1..].join(" ");
            if query.is_empty() {
                return Err(EngineError::Config("search requires a query".into()));
            }
            search(&state, &query).await
        }
        Some("accounts") => accounts(&state, &args[1..]).await,
        Some("prospects") => prospects(&state, &args[1..]).await,
        Some("icp") => icp(&state, &args[1..]).await,
        Some("schedules") => schedules(&state, &args[1..]).await,
        Some("events") => events(&state, &args[1..]).await,
        _ => {
            eprint!("{USAGE}");
            Ok(())
        }
    }
}

fn config(state: &AppState) -> Result<Config, EngineError> {
    state.require_config().map_err(EngineError::Config)
}

fn store_client(state: &AppState, config: &Config) -> StoreClient {
    StoreClient::new(state.http.clone(), &config.store_url, &config.store_api_key)
}

// ----------------------------------------------------------------------
// search
// ----------------------------------------------------------------------

async fn search(state: &Arc<AppState>, query: &str) -> Result<(), EngineError> {
    let config = config(state)?;
    let (tx, mut rx) = mpsc::channel::<SearchEvent>(64);

    let renderer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                SearchEvent::Phase(SearchPhase::Reconnecting) => {
                    println!("… stream dropped, reconnecting");
                }
                SearchEvent::Phase(_) => {}
                SearchEvent::Started { message } => println!("▸ {message}"),
                SearchEvent::Status {
                    status,
                    message,
                    progress,
                } => match progress {
                    Some(pct) => println!("[{status}] {message} ({pct:.0}%)"),
                    None => println!("[{status}] {message}"),
                },
                SearchEvent::Raw(text) => println!("{text}"),
                SearchEvent::Results(companies) => {
                    for company in &companies {
                        println!(
                            "  • {} ({}){}",
                            company.name,
                            company.domain,
                            company
                                .fit_score
                                .map(|s| format!(" fit {s:.0}"))
                                .unwrap_or_default()
                        );
                    }
                }
                SearchEvent::Failed(message) => eprintln!("✗ {message}"),
            }
        }
    });

    let mut controller = SearchController::new(&config.workflow_url, tx);
    let result = controller.run(query).await;
    // Close the channel so the renderer drains and exits.
    drop(controller);
    let _ = renderer.await;
    let companies = result?;

    println!("Search complete: {} companies", companies.len());
    Ok(())
}

// ----------------------------------------------------------------------
// accounts
// ----------------------------------------------------------------------

fn parse_min_fit(args: &[String]) -> Result<AccountFilter, EngineError> {
    let mut filter = AccountFilter::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--min-fit" {
            let raw = iter
                .next()
                .ok_or_else(|| EngineError::Config("--min-fit requires a value".into()))?;
            let value = raw.parse().map_err(|_| {
                EngineError::Config(format!("--min-fit expects a number 0-100, got '{raw}'"))
            })?;
            filter.min_fit_score = Some(value);
        }
    }
    Ok(filter)
}

async fn accounts(state: &Arc<AppState>, args: &[String]) -> Result<(), EngineError> {
    let config = config(state)?;
    let store = store_client(state, &config);

    match args.first().map(String::as_str) {
        Some("list") => {
            let all = store.list_accounts().await?;
            let filter = parse_min_fit(&args[1..])?;
            for account in filter_accounts(&all, &filter) {
                println!(
                    "{:<30} {:<20} tier {}  fit {:>3}  intent {:>3} ({:+})",
                    account.name,
                    account.domain,
                    account.tier.map(|t| t.as_str()).unwrap_or("-"),
                    account.fit_score,
                    account.intent_score,
                    account.intent_delta_14d,
                );
            }
            Ok(())
        }
        Some("delete") => {
            let id = args
                .get(1)
                .ok_or_else(|| EngineError::Config("accounts delete requires an id".into()))?;
            store.delete_account(id).await?;
            // Refetch so nothing downstream can reference the stale id.
            let remaining = store.list_accounts().await?;
            println!("Deleted {id}; {} accounts remain", remaining.len());
            Ok(())
        }
        Some("export") => {
            let all = store.list_accounts().await?;
            let filter = parse_min_fit(&args[1..])?;
            let kept = filter_accounts(&all, &filter);
            let csv = export::accounts_to_csv(&kept);
            let filename = export::dated_filename("qualified-accounts", Utc::now().date_naive());
            tokio::fs::write(&filename, csv).await?;
            println!("Wrote {} accounts to {filename}", kept.len());
            Ok(())
        }
        Some("activate") => {
            let all = store.list_accounts().await?;
            let filter = parse_min_fit(&args[1..])?;
            let kept: Vec<_> = filter_accounts(&all, &filter)
                .into_iter()
                .cloned()
                .collect();
            let message =
                activate_accounts(&state.http, &store, &config.activation_url, &kept)
                    .await
                    .map_err(|e| EngineError::Activation(e.to_string()))?;
            println!("Activated {} accounts: {message}", kept.len());
            Ok(())
        }
        _ => Err(EngineError::Config(
            "accounts: expected list | delete | export | activate".into(),
        )),
    }
}

// ----------------------------------------------------------------------
// prospects
// ----------------------------------------------------------------------

async fn prospects(state: &Arc<AppState>, args: &[String]) -> Result<(), EngineError> {
    let config = config(state)?;
    let store = store_client(state, &config);

    match args.first().map(String::as_str) {
        Some("list") => {
            let domain = args.get(1).map(String::as_str);
            let list = store.list_prospects(domain).await?;
            for prospect in &list {
                println!(
                    "{:<25} {:<35} {} / {}",
                    prospect.full_name(),
                    prospect.title.as_deref().unwrap_or("-"),
                    prospect.department.as_deref().unwrap_or("-"),
                    prospect.seniority.as_deref().unwrap_or("-"),
                );
            }
            Ok(())
        }
        _ => Err(EngineError::Config("prospects: expected list".into())),
    }
}

// ----------------------------------------------------------------------
// icp
// ----------------------------------------------------------------------

async fn icp(state: &Arc<AppState>, args: &[String]) -> Result<(), EngineError> {
    let config = config(state)?;
    let store = store_client(state, &config);

    match args.first().map(String::as_str) {
        Some("list") => {
            for model in store.list_icp_models().await? {
                println!(
                    "{}{:<30} weights f{}/t{}/i{}/b{}",
                    if model.is_primary { "* " } else { "  " },
                    model.name,
                    model.weights.firmographic,
                    model.weights.technographic,
                    model.weights.intent,
                    model.weights.behavioral,
                );
            }
            Ok(())
        }
        Some("set-primary") => {
            let id = args
                .get(1)
                .ok_or_else(|| EngineError::Config("icp set-primary requires an id".into()))?;
            store.set_primary_icp_model(id).await?;
            println!("Model {id} is now primary");
            Ok(())
        }
        _ => Err(EngineError::Config("icp: expected list | set-primary".into())),
    }
}

// ----------------------------------------------------------------------
// schedules
// ----------------------------------------------------------------------

async fn schedules(state: &Arc<AppState>, args: &[String]) -> Result<(), EngineError> {
    let config = config(state)?;
    let store = store_client(state, &config);
    let tz: chrono_tz::Tz = config
        .timezone
        .parse()
        .map_err(|_| EngineError::Config(format!("Invalid timezone: {}", config.timezone)))?;

    match args.first().map(String::as_str) {
        Some("list") => {
            let now = Utc::now().with_timezone(&tz);
            for schedule in store.list_schedules().await? {
                let next = next_run(schedule.cadence, &schedule.time_of_day, now.clone())
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|e| format!("invalid: {e}"));
                println!(
                    "{} [{}] '{}' next run {}",
                    schedule.id.as_deref().unwrap_or("-"),
                    if schedule.enabled { "on" } else { "paused" },
                    schedule.query,
                    next,
                );
            }
            Ok(())
        }
        Some("add") => {
            let schedule = parse_schedule_args(&args[1..])?;
            let stored = store.create_schedule(&schedule).await?;
            println!(
                "Created schedule {} ('{}')",
                stored.id.as_deref().unwrap_or("-"),
                stored.query,
            );
            Ok(())
        }
        Some("run") => {
            let id = args
                .get(1)
                .ok_or_else(|| EngineError::Config("schedules run requires an id".into()))?;
            let schedule = store
                .list_schedules()
                .await?
                .into_iter()
                .find(|s| s.id.as_deref() == Some(id.as_str()))
                .ok_or_else(|| EngineError::Scheduler(format!("No schedule with id {id}")))?;
            let scheduler = Scheduler::new(store.clone(), &config.workflow_url, tz);
            scheduler.execute(&schedule, id).await?;
            println!("Schedule {id} executed");
            Ok(())
        }
        Some("daemon") => {
            log::info!("Starting scheduler loop ({tz})");
            let mut scheduler = Scheduler::new(store, &config.workflow_url, tz);
            scheduler.run().await;
            Ok(())
        }
        _ => Err(EngineError::Config(
            "schedules: expected list | add | run | daemon".into(),
        )),
    }
}

fn flag_value<'a>(
    iter: &mut std::slice::Iter<'a, String>,
    flag: &str,
) -> Result<&'a str, EngineError> {
    iter.next()
        .map(String::as_str)
        .ok_or_else(|| EngineError::Config(format!("{flag} requires a value")))
}

fn parse_count(raw: &str, flag: &str) -> Result<u32, EngineError> {
    raw.parse()
        .map_err(|_| EngineError::Config(format!("{flag} expects a number, got '{raw}'")))
}

/// Build a schedule from `schedules add` arguments. The first bare
/// argument is the query; cadence, time, start date, and a stop
/// condition are required.
fn parse_schedule_args(args: &[String]) -> Result<AutomationSchedule, EngineError> {
    let mut query: Option<String> = None;
    let mut cadence: Option<Cadence> = None;
    let mut time_of_day: Option<String> = None;
    let mut start_date: Option<String> = None;
    let mut stop: Option<StopCondition> = None;
    let mut desired_count = 10u32;
    let mut auto_save = false;
    let mut notify = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--cadence" => {
                cadence = Some(match flag_value(&mut iter, "--cadence")? {
                    "daily" => Cadence::Daily,
                    "weekly" => Cadence::Weekly,
                    "monthly" => Cadence::Monthly,
                    other => {
                        return Err(EngineError::Config(format!(
                            "--cadence expects daily|weekly|monthly, got '{other}'"
                        )))
                    }
                });
            }
            "--time" => {
                let raw = flag_value(&mut iter, "--time")?;
                chrono::NaiveTime::parse_from_str(raw, "%H:%M").map_err(|_| {
                    EngineError::Config(format!("--time expects HH:MM, got '{raw}'"))
                })?;
                time_of_day = Some(raw.to_string());
            }
            "--start" => {
                let raw = flag_value(&mut iter, "--start")?;
                chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                    EngineError::Config(format!("--start expects YYYY-MM-DD, got '{raw}'"))
                })?;
                start_date = Some(raw.to_string());
            }
            "--count" => {
                desired_count = parse_count(flag_value(&mut iter, "--count")?, "--count")?;
            }
            "--stop-after-runs" => {
                stop = Some(StopCondition::ByAttempts(parse_count(
                    flag_value(&mut iter, "--stop-after-runs")?,
                    "--stop-after-runs",
                )?));
            }
            "--stop-after-results" => {
                stop = Some(StopCondition::ByResults(parse_count(
                    flag_value(&mut iter, "--stop-after-results")?,
                    "--stop-after-results",
                )?));
            }
            "--auto-save" => auto_save = true,
            "--notify" => notify = true,
            bare if !bare.starts_with("--") && query.is_none() => {
                query = Some(bare.to_string());
            }
            other => {
                return Err(EngineError::Config(format!(
                    "schedules add: unknown argument '{other}'"
                )))
            }
        }
    }

    let missing = |what: &str| EngineError::Config(format!("schedules add requires {what}"));
    Ok(AutomationSchedule {
        id: None,
        query: query.ok_or_else(|| missing("a query"))?,
        desired_count,
        cadence: cadence.ok_or_else(|| missing("--cadence"))?,
        time_of_day: time_of_day.ok_or_else(|| missing("--time"))?,
        start_date: start_date.ok_or_else(|| missing("--start"))?,
        enabled: true,
        auto_save,
        notify,
        stop: stop.ok_or_else(|| missing("--stop-after-runs or --stop-after-results"))?,
        created_at: None,
    })
}

// ----------------------------------------------------------------------
// events
// ----------------------------------------------------------------------

async fn events(state: &Arc<AppState>, args: &[String]) -> Result<(), EngineError> {
    let config = config(state)?;
    let store = store_client(state, &config);

    match args.first().map(String::as_str) {
        Some("export") => {
            let all = store.list_company_events().await?;
            let filter = icp_intel::filters::EventFilter {
                event_name: args.get(1).cloned(),
                ..Default::default()
            };
            let refs = icp_intel::filters::filter_events(&all, &filter);
            let csv = export::events_to_csv(&refs);
            let filename = match args.get(1) {
                Some(event_name) => export::event_filename(event_name),
                None => export::dated_filename("company-events", Utc::now().date_naive()),
            };
            tokio::fs::write(&filename, csv).await?;
            println!("Wrote {} events to {filename}", refs.len());
            Ok(())
        }
        _ => Err(EngineError::Config("events: expected export".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn min_fit_parses_a_number() {
        let filter = parse_min_fit(&strings(&["--min-fit", "40"])).unwrap();
        assert_eq!(filter.min_fit_score, Some(40));
    }

    #[test]
    fn min_fit_rejects_non_numeric_values() {
        assert!(parse_min_fit(&strings(&["--min-fit", "high"])).is_err());
        assert!(parse_min_fit(&strings(&["--min-fit"])).is_err());
    }

    #[test]
    fn schedule_args_build_a_full_schedule() {
        let schedule = parse_schedule_args(&strings(&[
            "series B fintech",
            "--cadence",
            "weekly",
            "--time",
            "14:00",
            "--start",
            "2026-09-02",
            "--stop-after-runs",
            "10",
            "--count",
            "25",
            "--auto-save",
        ]))
        .unwrap();

        assert_eq!(schedule.query, "series B fintech");
        assert_eq!(schedule.cadence, Cadence::Weekly);
        assert_eq!(schedule.time_of_day, "14:00");
        assert_eq!(schedule.start_date, "2026-09-02");
        assert_eq!(schedule.stop, StopCondition::ByAttempts(10));
        assert_eq!(schedule.desired_count, 25);
        assert!(schedule.auto_save);
        assert!(!schedule.notify);
        assert!(schedule.enabled);
    }

    #[test]
    fn schedule_args_require_cadence_time_start_and_stop() {
        let base = ["q", "--cadence", "daily", "--time", "09:00", "--start", "2026-09-02"];

        assert!(parse_schedule_args(&strings(&base[..5])).is_err());
        assert!(parse_schedule_args(&strings(&base)).is_err());

        let mut full: Vec<&str> = base.to_vec();
        full.extend(["--stop-after-results", "50"]);
        let schedule = parse_schedule_args(&strings(&full)).unwrap();
        assert_eq!(schedule.stop, StopCondition::ByResults(50));
    }

    #[test]
    fn schedule_args_reject_malformed_values() {
        assert!(parse_schedule_args(&strings(&["q", "--cadence", "hourly"])).is_err());
        assert!(parse_schedule_args(&strings(&["q", "--time", "2pm"])).is_err());
        assert!(parse_schedule_args(&strings(&["q", "--start", "Sept 2"])).is_err());
        assert!(parse_schedule_args(&strings(&["q", "--unknown"])).is_err());
    }
}
