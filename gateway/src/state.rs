//! Shared application state and engine wiring

use crate::clients::{ChainVerifier, RateProvider};
use crate::config::Config;
use card_ledger::{
    CardLedger, CardStore, Clock, ProfileStore, TransactionEvent, TransactionStore,
};
use commission_engine::{CommissionConfig, CommissionEngine, ReferralStore};
use escrow_market::{ListingStore, MarketConfig, Marketplace};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

/// Everything the handlers need
pub struct AppState {
    /// Card ledger
    pub ledger: Arc<CardLedger>,

    /// Escrow marketplace
    pub market: Arc<Marketplace>,

    /// Commission engine
    pub commission: Arc<CommissionEngine>,

    /// Exchange-rate provider
    pub rates: Arc<RateProvider>,

    /// Blockchain verifier
    pub verifier: Arc<ChainVerifier>,

    /// Shared clock
    pub clock: Arc<dyn Clock>,

    /// Gateway configuration
    pub config: Config,
}

impl AppState {
    /// Wire the engines over one authoritative set of stores.
    ///
    /// Returns the receiving end of the completed-transaction event channel;
    /// the caller spawns the commission engine's event loop on it.
    pub fn build(
        config: Config,
        clock: Arc<dyn Clock>,
    ) -> (Self, UnboundedReceiver<TransactionEvent>) {
        let cards = Arc::new(CardStore::new());
        let transactions = Arc::new(TransactionStore::new());
        let profiles = Arc::new(ProfileStore::new());

        let ledger = Arc::new(CardLedger::new(
            cards,
            transactions.clone(),
            profiles.clone(),
            clock.clone(),
        ));

        let (event_tx, event_rx) = tokio::sync::mpsc::unbounded_channel();
        let market = Arc::new(
            Marketplace::new(
                Arc::new(ListingStore::new()),
                ledger.clone(),
                clock.clone(),
                MarketConfig::default(),
            )
            .with_events(event_tx),
        );

        let commission = Arc::new(CommissionEngine::new(
            Arc::new(ReferralStore::new()),
            profiles,
            transactions,
            clock.clone(),
            CommissionConfig::default(),
        ));

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.providers.request_timeout_secs))
            .build()
            .expect("failed to build HTTP client");

        let rates = Arc::new(RateProvider::new(
            http.clone(),
            config.providers.coingecko_url.clone(),
            config.cache.ttl_secs,
            clock.clone(),
        ));
        let verifier = Arc::new(ChainVerifier::new(
            http,
            config.providers.solana_rpc_url.clone(),
            config.providers.ethereum_rpc_url.clone(),
            config.providers.polygon_rpc_url.clone(),
            config.cache.ttl_secs,
            clock.clone(),
        ));

        (
            Self {
                ledger,
                market,
                commission,
                rates,
                verifier,
                clock,
                config,
            },
            event_rx,
        )
    }
}
