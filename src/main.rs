use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};

use hotel_scraper::cms::{CmsPipeline, HttpCmsClient, PushOptions};
use hotel_scraper::config::Settings;
use hotel_scraper::fetch::HttpFetcher;
use hotel_scraper::scrape::ScrapePipeline;
use hotel_scraper::sites::{adapter_for, Company};
use hotel_scraper::store::{RecordStore, Stage};

#[derive(Parser)]
#[command(name = "hotel_scraper", about = "Scrape holiday listings and load them into the CMS")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape every URL in the company's seed list into a fresh run file
    Scrape {
        /// Source company (inghams, tui or crystal_ski)
        #[arg(short, long)]
        company: Company,
        /// Run name (default: remembered or <company>-<today>)
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Push a run's scraped records into the CMS
    Push {
        /// Source company (inghams, tui or crystal_ski)
        #[arg(short, long)]
        company: Company,
        /// Run name (default: remembered or <company>-<today>)
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Report whether a run has failure ledgers
    Check {
        #[arg(short, long)]
        company: Company,
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Record counts for a run's files
    Stats {
        #[arg(short, long)]
        company: Company,
        #[arg(short, long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;

    let result = match cli.command {
        Commands::Scrape { company, name } => {
            let store = open_store(&settings, company, name.as_deref());
            let urls = store.url_list()?;
            if urls.is_empty() {
                println!("No seed URLs for {company}. Add them to urls.csv first.");
                return Ok(());
            }
            println!("Scraping {} listings from {company}...", urls.len());

            let fetcher = HttpFetcher::new();
            let adapter = adapter_for(company);
            let outcome = ScrapePipeline::new(&fetcher, adapter.as_ref())
                .run(&store, &urls)
                .await?;

            println!(
                "Done: {} stored, {} failed of {}.",
                outcome.stored, outcome.failed, outcome.total
            );
            if outcome.had_failures {
                println!("Some listings failed to scrape; see the -SCRAPE-FAILS file.");
            }
            Ok(())
        }
        Commands::Push { company, name } => {
            let store = open_store(&settings, company, name.as_deref());
            let mut client = HttpCmsClient::new(
                &settings.cms.base_url,
                &settings.cms.username,
                &settings.cms.password,
            )?;
            client.log_in().await?;

            let options = PushOptions {
                settle: Duration::from_secs(settings.cms.settle_secs),
                push_timeout: Duration::from_secs(settings.cms.push_timeout_secs),
                refresh_every: Some(settings.cms.refresh_every).filter(|n| *n > 0),
            };
            let outcome = CmsPipeline::new(client, options).run(&store).await?;

            println!(
                "Done: {} pushed, {} failed of {}.",
                outcome.pushed, outcome.failed, outcome.total
            );
            if outcome.had_failures {
                println!("Some listings failed to be recorded in {company} data.");
            }
            println!("Complete! Please check site listings to ensure data is correct.");
            Ok(())
        }
        Commands::Check { company, name } => {
            let store = open_store(&settings, company, name.as_deref());
            let scrape_fails = store.has_failures(Stage::ScrapeFails)?;
            let cms_fails = store.has_failures(Stage::CmsFails)?;
            println!(
                "Scrape failures: {}",
                if scrape_fails { "yes" } else { "no" }
            );
            println!("CMS failures:    {}", if cms_fails { "yes" } else { "no" });
            Ok(())
        }
        Commands::Stats { company, name } => {
            let store = open_store(&settings, company, name.as_deref());
            println!("Records:         {}", stage_count(&store, Stage::Records)?);
            println!("Scrape failures: {}", stage_count(&store, Stage::ScrapeFails)?);
            println!("CMS failures:    {}", stage_count(&store, Stage::CmsFails)?);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }

    result
}

fn open_store(settings: &Settings, company: Company, label: Option<&str>) -> RecordStore {
    let run_name = settings.run_name(company, label);
    RecordStore::new(&settings.data_dir, company.as_str(), &run_name)
}

fn stage_count(store: &RecordStore, stage: Stage) -> anyhow::Result<usize> {
    use hotel_scraper::store::StoreError;
    match store.read_all::<serde_json::Value>(stage) {
        Ok(items) => Ok(items.len()),
        Err(StoreError::NotFound(_)) => Ok(0),
        Err(e) => Err(e.into()),
    }
}
