//! CLI interface for hotel-scanner

use anyhow::Result;
use clap::{Parser, Subcommand};
use hotel_scanner::config::Config;
use hotel_scanner::provider::build_http_client;
use hotel_scanner::suggest::SuggestClient;
use hotel_scanner::{SearchOutcome, SearchPipeline, SearchQuery};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hotel-scanner")]
#[command(about = "Compare hotel prices across providers")]
#[command(version)]
pub struct Cli {
    /// TOML config file (environment variables still apply on top)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search hotels across every configured provider
    Search {
        /// Destination name or city (e.g. Tokyo, 서울)
        #[arg(short, long)]
        destination: String,
        /// Check-in date (YYYY-MM-DD)
        #[arg(long)]
        check_in: String,
        /// Check-out date (YYYY-MM-DD)
        #[arg(long)]
        check_out: String,
        /// Number of guests
        #[arg(short, long, default_value = "2")]
        guests: String,
        /// Output file for JSON results
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Suggest destinations for a partial name
    Suggest {
        /// Partial destination name
        q: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Search {
            destination,
            check_in,
            check_out,
            guests,
            output,
        } => {
            let query = SearchQuery::from_params(
                Some(destination.as_str()),
                Some(check_in.as_str()),
                Some(check_out.as_str()),
                Some(guests.as_str()),
            )?;
            let pipeline = SearchPipeline::from_config(&config)?;

            eprintln!("Searching hotels in {} for {} night(s)...", query.destination, query.nights());
            let outcome = pipeline.search(&query).await;
            let json = match &outcome {
                SearchOutcome::Offers(body) => serde_json::to_string_pretty(body)?,
                SearchOutcome::NoOffers(body) => serde_json::to_string_pretty(body)?,
            };

            if let Some(output_file) = output {
                fs::write(&output_file, &json)?;
                eprintln!("Results saved to {}", output_file);
            } else {
                println!("{}", json);
            }

            eprintln!("\nSummary:");
            for status in outcome.providers() {
                eprintln!("  {}: {} ({} hotels)", status.provider, status.reason, status.count);
            }
            match &outcome {
                SearchOutcome::Offers(body) => {
                    eprintln!("Found {} hotels", body.hotels.len());
                    let cheapest = body
                        .hotels
                        .iter()
                        .flat_map(|h| h.channels.iter().map(move |c| (h, c)))
                        .min_by(|a, b| a.1.nightly_price.total_cmp(&b.1.nightly_price));
                    if let Some((hotel, channel)) = cheapest {
                        eprintln!("Cheapest: {} via {} - {:.2}/night", hotel.name, channel.source, channel.nightly_price);
                    }
                }
                SearchOutcome::NoOffers(_) => {
                    eprintln!("No live offers");
                    std::process::exit(1);
                }
            }
        }
        Commands::Suggest { q } => {
            let client = SuggestClient::new(build_http_client(&config.http)?, &config.suggest)?;
            let response = client.suggest(&q).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from([
            "hotel-scanner",
            "search",
            "--destination",
            "Tokyo",
            "--check-in",
            "2025-06-01",
            "--check-out",
            "2025-06-03",
        ]);

        assert!(cli.is_ok());

        if let Ok(Cli {
            command: Commands::Search {
                destination, guests, ..
            },
            ..
        }) = cli
        {
            assert_eq!(destination, "Tokyo");
            assert_eq!(guests, "2");
        }
    }

    #[test]
    fn test_suggest_parsing() {
        let cli = Cli::try_parse_from(["hotel-scanner", "--config", "scanner.toml", "suggest", "tok"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("scanner.toml")));
        assert!(matches!(cli.command, Commands::Suggest { q } if q == "tok"));
    }
}
