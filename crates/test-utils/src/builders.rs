#![allow(dead_code)]

use contract_watch::config::WatcherConfig;
use contract_watch::contract::Contract;

/// Builder for `Contract` rows.
pub struct ContractBuilder {
    contract: Contract,
}

impl ContractBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            contract: Contract::new(id),
        }
    }

    /// Contract with both identifying fields and no code: needs work.
    pub fn eligible(id: &str, solicitation: &str, stock: &str) -> Self {
        Self::new(id).solicitation(solicitation).stock(stock)
    }

    pub fn solicitation(mut self, value: &str) -> Self {
        self.contract.solicitation_number = Some(value.to_string());
        self
    }

    pub fn stock(mut self, value: &str) -> Self {
        self.contract.stock_number = Some(value.to_string());
        self
    }

    pub fn derived_code(mut self, value: &str) -> Self {
        self.contract.derived_code = Some(value.to_string());
        self
    }

    pub fn closed(mut self, value: bool) -> Self {
        self.contract.closed = Some(value);
        self
    }

    pub fn build(self) -> Contract {
        self.contract
    }
}

/// Builder for `WatcherConfig`. Starts from the defaults with
/// `auto_start = false`, so tests decide when polling begins.
pub struct WatcherConfigBuilder {
    config: WatcherConfig,
}

impl WatcherConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: WatcherConfig {
                auto_start: false,
                ..WatcherConfig::default()
            },
        }
    }

    pub fn enabled(mut self, val: bool) -> Self {
        self.config.enabled = val;
        self
    }

    pub fn auto_start(mut self, val: bool) -> Self {
        self.config.auto_start = val;
        self
    }

    pub fn poll_interval_ms(mut self, val: u64) -> Self {
        self.config.poll_interval_ms = val;
        self
    }

    pub fn max_concurrent(mut self, val: usize) -> Self {
        self.config.max_concurrent = val;
        self
    }

    pub fn retention_ms(mut self, val: u64) -> Self {
        self.config.retention_ms = val;
        self
    }

    pub fn follow_up_delay_ms(mut self, val: u64) -> Self {
        self.config.follow_up_delay_ms = val;
        self
    }

    pub fn dispatch_timeout_ms(mut self, val: u64) -> Self {
        self.config.dispatch_timeout_ms = Some(val);
        self
    }

    pub fn skip_closed(mut self, val: bool) -> Self {
        self.config.skip_closed = val;
        self
    }

    pub fn build(self) -> WatcherConfig {
        self.config
    }
}

impl Default for WatcherConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
