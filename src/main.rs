use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use hunter::linkcheck::{LinkChecker, LinkVerdict};
use hunter::models::SearchCriteria;
use hunter::pipeline::{self, HuntRequest, Hunter};
use hunter::session::{HuntSession, LogLevel, MemoryLog};

#[derive(Parser)]
#[command(name = "hunter")]
#[command(about = "Tiered job search - fetch, filter, rank and score job postings")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full hunt
    Hunt {
        /// Desired job title (repeat for multiple)
        #[arg(short, long = "title", required = true)]
        titles: Vec<String>,

        /// Target location (repeat for multiple)
        #[arg(short, long = "location")]
        locations: Vec<String>,

        /// Minimum acceptable salary in INR/year
        #[arg(long)]
        salary_min: Option<i64>,

        /// Maximum salary in INR/year
        #[arg(long)]
        salary_max: Option<i64>,

        /// Path to a plain-text resume
        #[arg(short, long)]
        resume: Option<PathBuf>,

        /// User id for config caching
        #[arg(short, long, default_value = "local")]
        user: String,

        /// Check apply links before finalizing (slower)
        #[arg(long)]
        validate_links: bool,

        /// Print the raw JSON payload instead of a table
        #[arg(long)]
        json: bool,

        /// Print the session log after the results
        #[arg(long)]
        verbose: bool,
    },

    /// Check whether a job link is still alive
    Check {
        /// URL to probe
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Hunt {
            titles,
            locations,
            salary_min,
            salary_max,
            resume,
            user,
            validate_links,
            json,
            verbose,
        } => {
            let resume_text = match resume {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read resume at {}", path.display()))?,
                None => String::new(),
            };

            let request = HuntRequest {
                session_id: format!("cli-{}", chrono::Utc::now().timestamp()),
                user_id: user,
                criteria: SearchCriteria {
                    job_titles: titles,
                    locations,
                    salary_min,
                    salary_max,
                    employment_types: Vec::new(),
                },
                resume_text,
                validate_links,
            };

            let sink = Arc::new(MemoryLog::new());
            let session = HuntSession::new(&request.session_id, &request.user_id, sink.clone());

            // A bad configuration still produces a structured result and
            // a failed session rather than a bare process error.
            let result = match Hunter::from_env() {
                Ok(hunter) => hunter.run(&session, &request).await,
                Err(e) => pipeline::fail(&session, e),
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_results(&result);
            }

            if verbose {
                println!("\nSession log:");
                for entry in sink.entries() {
                    let level = match entry.level {
                        LogLevel::Info => "info",
                        LogLevel::Success => "ok",
                        LogLevel::Warning => "warn",
                        LogLevel::Error => "error",
                    };
                    println!("  [{level:<5}] {}", entry.message);
                }
            }
        }

        Commands::Check { url } => {
            let checker = LinkChecker::new()?;
            match checker.check(&url).await {
                LinkVerdict::Alive => println!("Alive: {url}"),
                LinkVerdict::Dead(reason) => println!("Dead ({reason}): {url}"),
            }
        }
    }

    Ok(())
}

fn print_results(result: &hunter::models::HuntResult) {
    if let Some(error) = &result.error {
        println!("Hunt failed: {error}");
        return;
    }
    if result.jobs.is_empty() {
        println!("No matching jobs found.");
        return;
    }

    println!(
        "Found {} jobs (tiers: {})\n",
        result.total_jobs,
        result.tier_used.join(", ")
    );
    println!(
        "{:<5} {:<6} {:<32} {:<22} {:<6} {:>12}",
        "RANK", "SCORE", "TITLE", "COMPANY", "TIER", "SALARY"
    );
    println!("{}", "-".repeat(88));
    for job in &result.jobs {
        println!(
            "{:<5} {:<6} {:<32} {:<22} {:<6} {:>12}",
            job.rank,
            format!("{}%", job.match_score),
            truncate(&job.title, 30),
            truncate(&job.company, 20),
            job.tier,
            job.salary
        );
        if !job.badges.is_empty() {
            println!("      {}", job.badges.join("  "));
        }
        if job.gap_analysis != "Good match" {
            println!("      {}", job.gap_analysis);
        }
        println!("      {}", job.apply_link);
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() > max_len {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{truncated}...")
    } else {
        s.to_string()
    }
}
