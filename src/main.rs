use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use log::{error, info};
use reqwest::Client;

mod cache;
mod config;
mod datasources;
mod error;
mod ratio;
mod refresh;
mod report;

use cache::{FileCache, MemoryCache, PriceCache};
use config::Cli;
use datasources::{CoingeckoDataSource, FallbackChain, NbpGoldDataSource, YahooGoldDataSource};
use error::RefreshError;
use refresh::{refresh, RefreshRequest};

struct State {
    cli: Cli,
    request: RefreshRequest,
    gold_chain: FallbackChain,
    crypto_chain: FallbackChain,
}

impl State {
    fn new(cli: Cli) -> Result<State> {
        // Reject bad input before any client or cache is touched.
        let request = RefreshRequest::new(cli.days, cli.mode)?;

        let client = Arc::new(
            Client::builder()
                .user_agent(concat!("Goldbit ", env!("CARGO_PKG_VERSION")))
                .timeout(cli.timeout())
                .build()?,
        );
        let connector = Arc::new(yahoo_finance_api::YahooConnector::new()?);

        let cache: Arc<dyn PriceCache> = if cli.no_disk_cache {
            Arc::new(MemoryCache::new(cli.cache_ttl()))
        } else {
            let file_cache = FileCache::new(cli.cache_path.clone(), cli.cache_ttl());
            info!("Using cache file {}", file_cache.path().display());
            Arc::new(file_cache)
        };

        let gold_chain = FallbackChain::new(vec![
            Box::new(NbpGoldDataSource::new(client.clone(), cli.pln_usd_rate)),
            Box::new(YahooGoldDataSource::new(
                connector,
                cli.gold_proxy_ticker.clone(),
                cli.gold_proxy_factor,
            )),
        ])
        .with_cache(cache);
        let crypto_chain =
            FallbackChain::new(vec![Box::new(CoingeckoDataSource::new(client, cli.coin.clone()))]);

        Ok(State {
            cli,
            request,
            gold_chain,
            crypto_chain,
        })
    }

    async fn run_once(&self) -> Result<()> {
        match refresh(&self.request, &self.gold_chain, &self.crypto_chain).await {
            Ok(report) => {
                println!("{}", report::render_table(&report));
                println!("{}", report::render_statuses(&report.statuses));
                if let Some(export) = &self.cli.export {
                    let path = export
                        .clone()
                        .unwrap_or_else(|| report::default_export_name(report.days, report.refreshed_at));
                    report::export_csv(&report, &path)?;
                    println!("Data exported successfully to: {}", path.display());
                }
                Ok(())
            }
            Err(RefreshError::NoData { statuses }) => {
                println!("Error fetching data. Please try again.");
                println!("{}", report::render_statuses(&statuses));
                Err(RefreshError::NoData { statuses }.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    cli.validate()?;
    let watch = cli.watch.map(Duration::from_secs);
    let state = State::new(cli)?;

    let period = match watch {
        None => return state.run_once().await,
        Some(period) => period,
    };
    let state = &state;
    watch_loop(period, move || state.run_once(), async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Cannot listen for Ctrl-C: {}", e);
            futures::future::pending::<()>().await;
        }
    })
    .await;
    Ok(())
}

/// Runs `cycle` every `period` until `shutdown` resolves. Shutdown is honoured
/// both during a cycle and during the pause between cycles.
async fn watch_loop<F, Fut>(period: Duration, mut cycle: F, shutdown: impl Future<Output = ()>)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            res = cycle() => {
                if let Err(e) = res {
                    error!("{}", e);
                }
            }
            _ = &mut shutdown => break,
        }
        tokio::select! {
            _ = tokio::time::sleep(period) => {}
            _ = &mut shutdown => break,
        }
    }
    info!("Interrupted, exiting");
}
