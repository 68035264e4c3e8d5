use crate::config::{Config, SyncConfig};
use crate::error::Result;
use crate::models::Period;
use crate::poster::PosterClient;
use crate::privatbank::PrivatBankClient;
use crate::sink::{BoxedSink, CsvSink, LogSink, deliver_all, deliver_failure_all};
use crate::sync::{SyncEngine, SyncReport};
use crate::telegram::TelegramNotifier;
use chrono::Utc;
use clap::Args;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Report to the log and CSV only, never to Telegram
    #[arg(long)]
    pub dry_run: bool,

    /// Also write the report to this CSV file
    #[arg(long, value_name = "PATH")]
    pub csv: Option<PathBuf>,

    /// Override `sync.lookback_days` for this run
    #[arg(long, value_name = "DAYS")]
    pub lookback_days: Option<u32>,

    /// Override `sync.time_window_minutes` for this run
    #[arg(long, value_name = "MINUTES")]
    pub time_window_minutes: Option<u32>,
}

impl SyncArgs {
    pub async fn execute(&self) -> Result<()> {
        let mut config = Config::load()?;
        self.apply_overrides(&mut config.sync);

        let period = Period::lookback(
            Utc::now(),
            config.sync.lookback_days,
            config.sync.utc_offset()?,
        )?;
        let sinks = self.sinks(&config)?;

        match reconcile(&config, &period).await {
            Ok(report) => {
                deliver_all(&sinks, &report).await?;
                info!("Sync completed");
                Ok(())
            }
            Err(e) => {
                if let Err(notify) = deliver_failure_all(&sinks, &period, &e.to_string()).await {
                    warn!(error = %notify, "Failure notice not delivered everywhere");
                }
                Err(e)
            }
        }
    }

    fn apply_overrides(&self, sync: &mut SyncConfig) {
        if let Some(days) = self.lookback_days {
            sync.lookback_days = days;
        }
        if let Some(minutes) = self.time_window_minutes {
            sync.time_window_minutes = minutes;
        }
    }

    fn sinks(&self, config: &Config) -> Result<Vec<BoxedSink>> {
        let mut sinks: Vec<BoxedSink> = vec![Box::new(LogSink)];

        if let Some(path) = &self.csv {
            sinks.push(Box::new(CsvSink::new(path.clone())));
        }

        match &config.telegram {
            Some(_) if self.dry_run => info!("Dry run, Telegram notification skipped"),
            Some(telegram) => sinks.push(Box::new(TelegramNotifier::new(telegram, &config.sync)?)),
            None => info!("Telegram not configured"),
        }

        Ok(sinks)
    }
}

async fn reconcile(config: &Config, period: &Period) -> Result<SyncReport> {
    let bank = PrivatBankClient::new(&config.privatbank, &config.sync)?;
    let pos = PosterClient::new(&config.poster, &config.sync)?;

    let engine = SyncEngine::new(
        bank,
        pos,
        config.sync.time_tolerance(),
        config.sync.balance_tolerance,
    );
    engine.run(period).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_helpers::mock_config;
    use crate::config::{ChatId, TelegramConfig};

    fn args() -> SyncArgs {
        SyncArgs {
            dry_run: false,
            csv: None,
            lookback_days: None,
            time_window_minutes: None,
        }
    }

    fn with_telegram() -> Config {
        let mut config = mock_config();
        config.telegram = Some(TelegramConfig {
            token: "bot-token".to_string(),
            chat_id: ChatId::Id(42),
            base_url: None,
        });
        config
    }

    #[test]
    fn test_overrides_replace_config_values() {
        let mut sync = SyncConfig::default();
        let args = SyncArgs {
            lookback_days: Some(7),
            time_window_minutes: Some(2),
            ..args()
        };

        args.apply_overrides(&mut sync);

        assert_eq!(sync.lookback_days, 7);
        assert_eq!(sync.time_window_minutes, 2);
        assert_eq!(sync.balance_tolerance, SyncConfig::default().balance_tolerance);
    }

    #[test]
    fn test_no_overrides_keep_config_values() {
        let mut sync = SyncConfig::default();

        args().apply_overrides(&mut sync);

        assert_eq!(sync, SyncConfig::default());
    }

    #[test]
    fn test_sinks() {
        let names = |sinks: Vec<BoxedSink>| sinks.iter().map(|s| s.name()).collect::<Vec<_>>();

        assert_eq!(names(args().sinks(&mock_config()).unwrap()), vec!["log"]);
        assert_eq!(
            names(args().sinks(&with_telegram()).unwrap()),
            vec!["log", "telegram"]
        );

        let dry_run = SyncArgs {
            dry_run: true,
            csv: Some(PathBuf::from("out.csv")),
            ..args()
        };
        assert_eq!(
            names(dry_run.sinks(&with_telegram()).unwrap()),
            vec!["log", "csv"]
        );
    }
}
