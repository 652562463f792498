use std::env;

use anyhow::{anyhow, Context, Result};
use dotenv::dotenv;
use log::{error, info, warn};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

use gradespeed::gpa::{unweighted_gpa, weighted_gpa};
use gradespeed::{district, GradeRetriever, LoginOutcome, ReqwestTransport};

// Entry point for the async main function, powered by tokio runtime.
#[tokio::main]
async fn main() {
    // Loads environment variables from a `.env` file, if present.
    dotenv().ok();

    let level = env::var("GRADESPEED_LOG")
        .ok()
        .and_then(|level| level.parse().ok())
        .unwrap_or(LevelFilter::Info);
    if let Err(e) = TermLogger::init(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto) {
        eprintln!("Could not initialise logging: {}", e);
    }

    if let Err(e) = run().await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

// Logs in with the configured credentials and prints every course as JSON.
async fn run() -> Result<()> {
    let district_id = env::var("GRADESPEED_DISTRICT").context("GRADESPEED_DISTRICT environment variable not found")?;
    let username = env::var("GRADESPEED_USERNAME").context("GRADESPEED_USERNAME environment variable not found")?;
    let password = env::var("GRADESPEED_PASSWORD").context("GRADESPEED_PASSWORD environment variable not found")?;

    let district = district::by_id(&district_id).ok_or_else(|| anyhow!("Unknown district {:?}", district_id))?;
    let boost = district.weighted_gpa_boost();
    let transport = ReqwestTransport::new().context("Failed to build the client")?;
    let mut retriever = GradeRetriever::new(transport, district);

    match retriever.login(&username, &password).await.context("Login failed")? {
        LoginOutcome::Authenticated => info!("Logged in"),
        LoginOutcome::NeedsDisambiguation(choices) => {
            // Picks the configured student, or the first one on the account.
            let wanted = env::var("GRADESPEED_STUDENT").ok();
            let choice = match &wanted {
                Some(id) => choices.iter().find(|c| &c.student_id == id || &c.id == id),
                None => choices.first(),
            }
            .ok_or_else(|| anyhow!("No matching student among {} choices", choices.len()))?;

            info!("Selecting student {}", choice.name);
            retriever
                .choose_student(&choice.student_id)
                .await
                .context("Failed to select the student")?;
        }
    }

    let courses = retriever.fetch_averages().await.context("Failed to fetch averages")?;
    info!("Grades retrieved successfully");

    // Comma-separated course titles that count as honors for the weighted GPA.
    let honors: Vec<String> = env::var("GRADESPEED_HONORS")
        .map(|titles| titles.split(',').map(|t| t.trim().to_string()).filter(|t| !t.is_empty()).collect())
        .unwrap_or_default();
    match (unweighted_gpa(&courses), weighted_gpa(&courses, &honors, boost)) {
        (Some(unweighted), Some(weighted)) => info!("Unweighted GPA {:.4}, weighted {:.4}", unweighted, weighted),
        _ => warn!("No semester averages to compute a GPA from"),
    }

    // Attendance is informational; a district page that fails to parse does not stop the run
    match retriever.fetch_attendance().await {
        Ok(events) => info!("{} absences or tardies on record", events.len()),
        Err(e) => warn!("Could not read attendance: {:#}", e),
    }

    println!("{}", serde_json::to_string_pretty(&courses).context("Failed to serialise courses")?);
    Ok(())
}
