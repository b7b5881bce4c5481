use clap::Parser;
use std::time::Duration;

#[derive(Parser, Clone, Debug)]
pub struct Config {
    #[clap(flatten)]
    pub offers: OffersConfig,
    #[clap(flatten)]
    pub scheduler: SchedulerConfig,
}

#[derive(Parser, Clone, Debug)]
pub struct OffersConfig {
    #[clap(env = "OFFER_SEARCH_PAGE_SIZE_DEFAULT", default_value = "20")]
    pub page_size_default: i64,
    #[clap(env = "OFFER_SEARCH_PAGE_SIZE_MAX", default_value = "100")]
    pub page_size_max: i64,
    /// Upper limit of sessions consolidated by one merge
    #[clap(env = "MERGE_MAX_SESSIONS", default_value = "20")]
    pub merge_max_sessions: usize,
}

#[derive(Parser, Clone, Debug)]
pub struct SchedulerConfig {
    /// Interval in which auctions and listings past their deadline are rescanned
    #[clap(env = "SCHEDULER_POLL_INTERVAL", value_parser = humantime::parse_duration, default_value = "5m")]
    pub poll_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Config, clap::Error> {
        // Empty command line arguments, because we want to use ENV fallback
        // or default values if ENV variables are not set.
        Config::try_parse_from([""])
    }
}

#[cfg(test)]
mod test {
    use super::Config;

    #[test]
    fn test_default_clap_offers() {
        let c = Config::from_env().unwrap();
        assert_eq!(20, c.offers.page_size_default);
        assert_eq!(100, c.offers.page_size_max);
        assert_eq!(20, c.offers.merge_max_sessions);
    }

    #[test]
    fn test_default_clap_scheduler() {
        let c = Config::from_env().unwrap();
        assert_eq!(300, c.scheduler.poll_interval.as_secs());
    }
}
