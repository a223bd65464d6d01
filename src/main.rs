use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use clap::{Parser, Subcommand};
use itertools::Itertools;
use log::{info, warn};
use paddock::{
    AppConfig, ComparisonBuilder, LapMetric, PaddockError, SelectionStore, StoreOptions,
    api::{
        Driver, DriverNumber, HttpResourceClient, Lap, MeetingKey, ResourceClient, SessionDetails,
        SessionKey,
    },
    comparison::available_years,
    export::{load_laps_jsonl, write_laps_jsonl},
    stats::{
        LapSummary, PerformanceSort, driver_performance, filter_laps, format_date, format_lap_time,
        format_seconds, team_summaries,
    },
    store::filter_meetings,
};

const MAX_LISTED_LAPS: usize = 100;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    /// Timing API base URL, overrides the config file
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Config file to use instead of the one in the user config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List meetings
    Meetings {
        #[arg(short, long)]
        year: Option<i32>,

        #[arg(short, long)]
        search: Option<String>,
    },
    /// Meeting overview with its sessions and race winner
    Meeting {
        #[arg(short, long)]
        id: u64,
    },
    /// Driver performance table of a session
    Session {
        #[arg(short, long)]
        meeting: u64,

        /// Defaults to the race, or the first session of the meeting
        #[arg(short, long)]
        session: Option<u64>,

        #[arg(long, default_value_t = PerformanceSort::Fastest)]
        sort: PerformanceSort,

        #[arg(long)]
        search: Option<String>,

        /// Also print the official classification and fastest laps
        #[arg(long)]
        classification: bool,
    },
    /// Valid laps of a session, fastest first
    Laps {
        #[arg(short, long)]
        meeting: u64,

        #[arg(short, long)]
        session: Option<u64>,

        #[arg(short, long)]
        driver: Option<u64>,
    },
    /// Compare drivers across sessions
    Compare {
        /// DRIVER:SESSION, up to four times
        #[arg(short, long = "column", required = true)]
        columns: Vec<String>,

        #[arg(long, default_value = "lap_time")]
        metric: LapMetric,
    },
    /// Season records
    Records {
        #[arg(short, long)]
        year: i32,
    },
    /// Career counters of one driver
    DriverStats { number: u64 },
    /// Seasons with data
    Years,
    /// Probe the API
    Status {
        /// Keep probing on the configured interval
        #[arg(short, long)]
        watch: bool,
    },
    /// Write the laps of a session to a JSON lines file
    Export {
        #[arg(short, long)]
        meeting: u64,

        #[arg(short, long)]
        session: Option<u64>,

        #[arg(short, long)]
        output: PathBuf,
    },
    /// Statistics over a previously exported lap file
    Analyze {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        driver: Option<u64>,
    },
    /// Write the effective configuration to the config file
    Config,
}

/// Select a meeting and optionally a session, then wait for the cascade to
/// load. The default session is only opened when no session is requested.
async fn open_session(
    client: Arc<dyn ResourceClient>,
    config: &AppConfig,
    meeting: u64,
    session: Option<u64>,
) -> SelectionStore {
    let options = StoreOptions {
        auto_select_session: session.is_none(),
        ..StoreOptions::from(config)
    };
    let mut store = SelectionStore::with_options(client, options);
    store.select_meeting(Some(MeetingKey(meeting)));
    store.settle().await;
    if let Some(session) = session {
        store.select_session(Some(SessionKey(session)));
        store.settle().await;
    }
    store
}

fn print_session_header(store: &SelectionStore) {
    let sessions = store
        .sessions()
        .iter()
        .map(|session| {
            let marker = if Some(session.key) == store.selected_session_key() {
                "*"
            } else {
                " "
            };
            format!("{}{} {}", marker, session.key, session.session_name)
        })
        .join("  ");
    println!("Sessions: {}", sessions);
}

async fn meetings(
    client: Arc<dyn ResourceClient>,
    year: Option<i32>,
    search: Option<String>,
) -> Result<(), PaddockError> {
    let meetings = client.meetings().await.unwrap_or_default();
    for meeting in filter_meetings(&meetings, search.as_deref(), year) {
        let date = meeting.date_start.as_deref().map(format_date).unwrap_or_default();
        println!(
            "{:>6}  {:<32} {:<20} {}",
            meeting.key, meeting.meeting_name, meeting.location, date
        );
    }
    Ok(())
}

async fn meeting(client: Arc<dyn ResourceClient>, id: u64) -> Result<(), PaddockError> {
    let Some(details) = client.meeting_details(MeetingKey(id)).await else {
        println!("No meeting {}", id);
        return Ok(());
    };
    let meeting = &details.meeting;
    println!(
        "{} ({}), {}",
        meeting.meeting_name,
        meeting.location,
        meeting.date_start.as_deref().map(format_date).unwrap_or_default()
    );
    for session in &details.sessions {
        println!(
            "{:>6}  {:<20} {}",
            session.key,
            session.session_name,
            session.date_start.as_deref().map(format_date).unwrap_or_default()
        );
    }
    match &details.winner {
        Some(winner) => println!("Winner: {} ({})", winner.full_name, winner.team_name),
        None => println!("Winner: not classified"),
    }
    Ok(())
}

fn print_classification(details: &SessionDetails) {
    println!("Classification");
    for position in &details.positions {
        let place = match position.position {
            Some(place) if !position.dnf => place.to_string(),
            _ => "DNF".to_string(),
        };
        println!(
            "{:>4} {:>4} {:<24} {:<20} {:>4} laps",
            place,
            position.driver_number,
            position.full_name,
            position.team_name,
            position.laps_completed
        );
    }
    println!("Fastest laps");
    for lap in &details.fastest_laps {
        println!(
            "{:>4} {:<24} lap {:>3}  {}",
            lap.driver_number,
            lap.full_name,
            lap.lap_number,
            format_lap_time(lap.lap_duration)
        );
    }
}

async fn session(
    client: Arc<dyn ResourceClient>,
    config: &AppConfig,
    meeting: u64,
    session: Option<u64>,
    sort: PerformanceSort,
    search: Option<String>,
    classification: bool,
) -> Result<(), PaddockError> {
    let store = open_session(client, config, meeting, session).await;
    print_session_header(&store);

    let table = driver_performance(store.drivers(), store.laps(), sort, search.as_deref());
    println!(
        "{:<4} {:<24} {:<20} {:>5} {:>9} {:>9} {:>7} {:>4}  {:>7} {:>7} {:>7}",
        "No", "Driver", "Team", "Laps", "Fastest", "Average", "StdDev", "Pit", "S1", "S2", "S3"
    );
    for row in &table {
        println!(
            "{:<4} {:<24} {:<20} {:>5} {:>9} {:>9} {:>7} {:>4}  {:>7} {:>7} {:>7}",
            row.driver.number,
            row.driver.display_name(),
            row.driver.team_name,
            row.valid_laps(),
            format_lap_time(row.stats.fastest_lap),
            format_lap_time(row.stats.average_lap),
            row.stats
                .consistency
                .map(|c| format!("{:.3}", c))
                .unwrap_or_else(|| "--".to_string()),
            row.pit_stops,
            format_seconds(row.sector_bests.sector_1),
            format_seconds(row.sector_bests.sector_2),
            format_seconds(row.sector_bests.sector_3),
        );
    }

    println!();
    for team in team_summaries(&table) {
        println!(
            "{:<20} {:>4} laps  best {}",
            team.team_name,
            team.total_laps,
            format_lap_time(team.best_lap.map(|(_, time)| time))
        );
    }

    if classification {
        let details = match store.selected_session_key() {
            Some(key) => store.client().session_details(key).await,
            None => None,
        };
        match details {
            Some(details) => {
                println!();
                print_classification(&details);
            }
            None => println!("No classification available"),
        }
    }
    Ok(())
}

async fn laps(
    client: Arc<dyn ResourceClient>,
    config: &AppConfig,
    meeting: u64,
    session: Option<u64>,
    driver: Option<u64>,
) -> Result<(), PaddockError> {
    let store = open_session(client, config, meeting, session).await;
    print_session_header(&store);

    let filtered = filter_laps(store.laps(), driver.map(DriverNumber));
    let Some(summary) = LapSummary::from_filtered(&filtered) else {
        println!("No laps found");
        return Ok(());
    };
    println!(
        "Fastest {}  Average {}  Laps {}  Pit out {}",
        format_lap_time(summary.fastest_lap.and_then(|lap| lap.lap_duration)),
        format_lap_time(summary.average_lap),
        summary.total_laps,
        summary.pit_out_laps
    );
    print_laps(&filtered);
    Ok(())
}

fn print_laps(laps: &[&Lap]) {
    for lap in laps.iter().take(MAX_LISTED_LAPS) {
        println!(
            "{:>4} {:<24} lap {:>3}  {}  {:>7} {:>7} {:>7} {}",
            lap.driver_number,
            lap.full_name,
            lap.lap_number,
            format_lap_time(lap.lap_duration),
            format_seconds(lap.sector_1_time),
            format_seconds(lap.sector_2_time),
            format_seconds(lap.sector_3_time),
            if lap.is_pit_out_lap { "pit out" } else { "" }
        );
    }
    if laps.len() > MAX_LISTED_LAPS {
        println!("Showing first {} of {} laps", MAX_LISTED_LAPS, laps.len());
    }
}

fn parse_column(raw: &str) -> Result<(DriverNumber, SessionKey), PaddockError> {
    let invalid = || PaddockError::InvalidUserInput {
        field: "column".to_string(),
        reason: format!("'{}' is not DRIVER:SESSION", raw),
    };
    let (driver, session) = raw.split_once(':').ok_or_else(invalid)?;
    let driver = driver.trim().parse::<u64>().map_err(|_| invalid())?;
    let session = session.trim().parse::<u64>().map_err(|_| invalid())?;
    Ok((DriverNumber(driver), SessionKey(session)))
}

async fn compare(
    client: Arc<dyn ResourceClient>,
    columns: &[String],
    metric: LapMetric,
) -> Result<(), PaddockError> {
    let specs = columns
        .iter()
        .map(|raw| parse_column(raw))
        .collect::<Result<Vec<_>, _>>()?;
    let roster: HashMap<DriverNumber, Driver> = client
        .all_drivers()
        .await
        .unwrap_or_default()
        .into_iter()
        .map(|driver| (driver.number, driver))
        .collect();

    let mut builder = ComparisonBuilder::new(client);
    for (index, (driver, session)) in specs.iter().enumerate() {
        let column_id = if index == 0 {
            builder.columns()[0].id.clone()
        } else {
            builder.add_column()?
        };
        let driver = roster
            .get(driver)
            .cloned()
            .unwrap_or_else(|| Driver::with_number(*driver));
        builder.set_driver(&column_id, Some(driver))?;
        builder.set_session(&column_id, Some(*session))?;
    }

    builder.run_comparison();
    builder.settle().await;

    for result in builder.results() {
        let name = builder
            .column(&result.column_id)
            .and_then(|column| column.driver.as_ref())
            .map(Driver::display_name)
            .unwrap_or_default();
        println!(
            "{:<24} session {:>6}  fastest {}  average {}  std dev {}  sectors {} {} {}",
            name,
            result.session_key,
            format_lap_time(result.stats.fastest_lap),
            format_lap_time(result.stats.average_lap),
            result
                .stats
                .consistency
                .map(|c| format!("{:.3}", c))
                .unwrap_or_else(|| "--".to_string()),
            format_seconds(result.sector_bests.sector_1),
            format_seconds(result.sector_bests.sector_2),
            format_seconds(result.sector_bests.sector_3),
        );
    }
    println!(
        "Fastest overall {}  Most consistent {}",
        format_lap_time(builder.fastest_overall()),
        format_seconds(builder.most_consistent())
    );

    let series = builder.lap_series(metric);
    for (index, label) in series.labels.iter().enumerate() {
        let values = series
            .lines
            .iter()
            .map(|line| format!("{:>9}", format_seconds(line.values[index])))
            .join(" ");
        println!("{:>4} {}", label, values);
    }
    Ok(())
}

async fn records(client: Arc<dyn ResourceClient>, year: i32) -> Result<(), PaddockError> {
    let Some(records) = client.records(year).await else {
        println!("No records for {}", year);
        return Ok(());
    };
    if let Some(champion) = records.season_champion {
        println!(
            "Champion        {} ({} pts)",
            champion.driver_info.display_name(),
            champion.total_points
        );
    }
    if let Some(most_wins) = records.most_wins {
        println!(
            "Most wins       {} ({})",
            most_wins.driver_info.display_name(),
            most_wins.wins
        );
    }
    if let Some(fastest) = records.fastest_lap {
        println!(
            "Fastest lap     {} {} at {}",
            fastest.driver_info.display_name(),
            format_lap_time(Some(fastest.lap_duration)),
            fastest.meeting_info.meeting_name
        );
    }
    Ok(())
}

async fn status(
    client: Arc<dyn ResourceClient>,
    config: &AppConfig,
    watch: bool,
) -> Result<(), PaddockError> {
    let mut store = SelectionStore::with_options(client, StoreOptions::from(config));
    println!("API is {}", store.check_status().await);
    if !watch {
        return Ok(());
    }

    let _poller =
        store.start_status_polling(Duration::from_secs(config.status_poll_interval_s.max(1)));
    let mut last = store.api_status();
    loop {
        store.next_event().await;
        if store.api_status() != last {
            last = store.api_status();
            println!("API is {}", last);
        }
    }
}

async fn export(
    client: Arc<dyn ResourceClient>,
    config: &AppConfig,
    meeting: u64,
    session: Option<u64>,
    output: &Path,
) -> Result<(), PaddockError> {
    let store = open_session(client, config, meeting, session).await;
    if store.laps().is_empty() {
        warn!("Session has no laps, writing an empty export");
    }
    write_laps_jsonl(output, store.selected_session(), store.laps())
}

fn analyze(input: &Path, driver: Option<u64>) -> Result<(), PaddockError> {
    if !input.exists() {
        return Err(PaddockError::InvalidUserInput {
            field: "input".to_string(),
            reason: format!("{:?} does not exist", input),
        });
    }
    for exported in load_laps_jsonl(input)? {
        match &exported.session {
            Some(session) => println!("Session {} {}", session.key, session.session_name),
            None => println!("Session unknown"),
        }

        // exports carry no roster, so drivers are rebuilt from the laps
        let drivers: Vec<Driver> = exported
            .laps
            .iter()
            .unique_by(|lap| lap.driver_number)
            .filter(|lap| driver.is_none_or(|number| lap.driver_number == DriverNumber(number)))
            .map(|lap| Driver {
                full_name: lap.full_name.clone(),
                team_name: lap.team_name.clone(),
                team_colour: lap.team_color.clone(),
                ..Driver::with_number(lap.driver_number)
            })
            .collect();
        for row in driver_performance(&drivers, &exported.laps, PerformanceSort::Fastest, None) {
            println!(
                "{:<4} {:<24} {:>5} laps  fastest {}  average {}",
                row.driver.number,
                row.driver.display_name(),
                row.valid_laps(),
                format_lap_time(row.stats.fastest_lap),
                format_lap_time(row.stats.average_lap),
            );
        }
    }
    Ok(())
}

fn run(args: Args) -> Result<(), PaddockError> {
    let Args {
        base_url,
        config: config_path,
        command,
    } = args;
    let mut config = match &config_path {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::from_local_file()?,
    }
    .unwrap_or_default();
    if let Some(base_url) = base_url {
        config.base_url = base_url;
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| PaddockError::RuntimeError { source: e })?;
    let client: Arc<dyn ResourceClient> = Arc::new(HttpResourceClient::new(&config.base_url)?);
    info!("Using timing API at {}", config.base_url);

    runtime.block_on(async {
        match command {
            Commands::Meetings { year, search } => meetings(client, year, search).await,
            Commands::Meeting { id } => meeting(client, id).await,
            Commands::Session {
                meeting,
                session: session_key,
                sort,
                search,
                classification,
            } => {
                session(
                    client,
                    &config,
                    meeting,
                    session_key,
                    sort,
                    search,
                    classification,
                )
                .await
            }
            Commands::Laps {
                meeting,
                session,
                driver,
            } => laps(client, &config, meeting, session, driver).await,
            Commands::Compare { columns, metric } => compare(client, &columns, metric).await,
            Commands::Records { year } => records(client, year).await,
            Commands::DriverStats { number } => {
                match client.driver_stats(DriverNumber(number)).await {
                    Some(stats) => println!(
                        "Driver {}: {} grand prix victories, {} championships",
                        stats.driver_number, stats.grand_prix_victories, stats.championships_won
                    ),
                    None => println!("No stats for driver {}", number),
                }
                Ok(())
            }
            Commands::Years => {
                let years = match client.available_years().await {
                    Some(years) => years,
                    None => available_years(&client.meetings().await.unwrap_or_default()),
                };
                println!("{}", years.iter().join(" "));
                Ok(())
            }
            Commands::Status { watch } => status(client, &config, watch).await,
            Commands::Export {
                meeting,
                session,
                output,
            } => export(client, &config, meeting, session, &output).await,
            Commands::Analyze { input, driver } => analyze(&input, driver),
            Commands::Config => {
                let path = match config_path {
                    Some(path) => path,
                    None => AppConfig::default_path()?,
                };
                config.save_to(&path)?;
                println!("Wrote {}", path.display());
                Ok(())
            }
        }
    })
}

fn main() {
    #[cfg(debug_assertions)]
    colog::init();

    let cli = Args::parse();
    ctrlc::set_handler(move || {
        println!("Exiting...");
        std::process::exit(0);
    })
    .expect("Could not set Ctrl-C handler");

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
