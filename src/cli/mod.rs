use crate::{
    parse_start_date, BudgetLevel, PlannerConfig, SessionManager, TripPreferences, WalkingTolerance,
};
use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

const QUIT_COMMAND: &str = ":q";

fn command() -> Command {
    Command::new("wanderplan")
        .version("0.1.0")
        .about("Plan a family trip with a generative model, then refine it conversationally")
        .arg(
            Arg::new("destination")
                .short('d')
                .long("destination")
                .value_name("PLACE")
                .help("Where the trip goes, e.g. \"Kyoto, Japan\"")
                .required(true),
        )
        .arg(
            Arg::new("start-date")
                .short('s')
                .long("start-date")
                .value_name("YYYY-MM-DD")
                .help("First day of the trip (defaults to today)"),
        )
        .arg(
            Arg::new("duration")
                .short('n')
                .long("duration")
                .value_name("DAYS")
                .help("Trip length in days (1-14)")
                .default_value("3"),
        )
        .arg(
            Arg::new("budget")
                .short('b')
                .long("budget")
                .value_name("LEVEL")
                .help("budget, moderate or luxury")
                .default_value("moderate"),
        )
        .arg(
            Arg::new("walking")
                .short('w')
                .long("walking")
                .value_name("LEVEL")
                .help("Walking tolerance: low, medium or high")
                .default_value("medium"),
        )
        .arg(
            Arg::new("interest")
                .short('i')
                .long("interest")
                .value_name("TAG")
                .help("Interest tag; repeat for several")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("travelers")
                .long("travelers")
                .value_name("TEXT")
                .help("Who is travelling, e.g. \"2 adults, 2 kids (ages 5 and 8)\"")
                .default_value("2 Adults, 1 Child"),
        )
        .arg(
            Arg::new("model")
                .short('m')
                .long("model")
                .value_name("MODEL")
                .help("Model id (or set WANDERPLAN_MODEL)"),
        )
        .arg(
            Arg::new("api-key")
                .short('k')
                .long("api-key")
                .value_name("KEY")
                .help("API key (or set OPENAI_API_KEY env var)"),
        )
        .arg(
            Arg::new("base-url")
                .short('u')
                .long("base-url")
                .value_name("URL")
                .help("Endpoint base URL (or set OPENAI_BASE_URL / OPENROUTER_BASE_URL)"),
        )
        .arg(
            Arg::new("timeout")
                .short('t')
                .long("timeout")
                .value_name("SECONDS")
                .help("Request timeout in seconds"),
        )
        .arg(
            Arg::new("allow-length-change")
                .long("allow-length-change")
                .help("Accept refinements that add or remove days")
                .action(ArgAction::SetTrue),
        )
}

/// CLI entry point for the wanderplan tool
pub async fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let matches = command().get_matches();
    let config = build_config(&matches)?;
    let prefs = build_preferences(&matches)?;

    info!("Using model: {}", config.model);
    info!("Base URL: {}", config.base_url);

    let planner = SessionManager::from_config(&config);

    match planner.start_session(prefs).await {
        Ok(itinerary) => println!("{}", serde_json::to_string_pretty(&itinerary)?),
        Err(err) => {
            error!("Trip generation failed: {}", err);
            return Err(err.into());
        }
    }

    eprintln!("\nType feedback to refine the itinerary ({QUIT_COMMAND} to quit):");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let feedback = line.trim();
        if feedback == QUIT_COMMAND {
            break;
        }
        if feedback.is_empty() {
            continue;
        }

        match planner.refine(feedback).await {
            Ok(itinerary) => println!("{}", serde_json::to_string_pretty(&itinerary)?),
            Err(err) => {
                error!("Refinement failed: {}", err);
                eprintln!("{}", serde_json::to_string_pretty(&err.to_error_payload())?);
            }
        }
    }

    if let Some(session) = planner.session() {
        info!("\n{}", session.replay());
    }

    Ok(())
}

fn build_config(matches: &ArgMatches) -> Result<PlannerConfig> {
    let mut config = match matches.get_one::<String>("api-key") {
        Some(key) => PlannerConfig::from_env_with_key(key.clone())?,
        None => PlannerConfig::from_env().context(
            "API key is required. Set OPENAI_API_KEY environment variable or use --api-key",
        )?,
    };

    if let Some(model) = matches.get_one::<String>("model") {
        config = config.with_model(model.clone());
    }
    if let Some(base_url) = matches.get_one::<String>("base-url") {
        config = config.with_base_url(base_url.clone());
    }
    if let Some(timeout) = matches.get_one::<String>("timeout") {
        let secs: u64 = timeout
            .parse()
            .with_context(|| format!("invalid --timeout `{timeout}`"))?;
        config = config.with_timeout(Duration::from_secs(secs));
    }
    if matches.get_flag("allow-length-change") {
        config = config.with_day_count_lock(false);
    }

    Ok(config)
}

fn build_preferences(matches: &ArgMatches) -> Result<TripPreferences> {
    let destination = required(matches, "destination")?;
    let start_date = match matches.get_one::<String>("start-date") {
        Some(text) => parse_start_date(text)?,
        None => chrono::Local::now().date_naive(),
    };
    let duration: u32 = required(matches, "duration")?
        .parse()
        .context("--duration must be a whole number of days")?;
    let budget: BudgetLevel = required(matches, "budget")?.parse()?;
    let walking: WalkingTolerance = required(matches, "walking")?.parse()?;
    let interests = matches
        .get_many::<String>("interest")
        .map(|values| values.cloned().collect::<Vec<_>>())
        .unwrap_or_default();

    Ok(TripPreferences::builder(destination, start_date)
        .duration(duration)
        .budget(budget)
        .walking(walking)
        .interests(interests)
        .travelers(required(matches, "travelers")?)
        .build()?)
}

fn required<'a>(matches: &'a ArgMatches, id: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .with_context(|| format!("missing --{id}"))
}
