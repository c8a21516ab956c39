//! Tests for the batch controller and history backfill.
//!
//! Every test runs against in-memory stores and mock providers. A stored
//! seven-day calendar keeps results independent of the weekday the tests run on.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{Duration as ChronoDuration, NaiveDate, Utc, Weekday};
    use rust_decimal_macros::dec;

    use quotewarden_market_data::FailureKind;

    use crate::budget::ExecutionBudget;
    use crate::calendar::{CalendarService, TradingCalendar};
    use crate::context::{EngineContext, EngineSettings};
    use crate::errors::Error;
    use crate::prices::{PersistenceWriter, PriceStore};
    use crate::refresh::{
        BackfillRequest, BatchController, BatchSettings, BatchStatus, ErrorKind, HistoryBackfill,
        OutcomeStatus, RefreshRequest,
    };
    use crate::test_support::{
        Behavior, MockConfigStore, MockCredentials, MockFactory, MockPriceStore, MockProvider,
        MockWatchList,
    };

    struct Harness {
        controller: BatchController,
        backfill: HistoryBackfill,
        prices: MockPriceStore,
        providers: Vec<Arc<MockProvider>>,
    }

    async fn harness(
        providers: Vec<MockProvider>,
        symbols: &[&str],
        settings: BatchSettings,
        trading_weekdays: Vec<Weekday>,
    ) -> Harness {
        let providers: Vec<Arc<MockProvider>> = providers.into_iter().map(Arc::new).collect();
        let mut factory = MockFactory::default();
        let mut order = Vec::new();
        for provider in &providers {
            factory = factory.with_provider(provider.clone()).keyless(provider_id(provider));
            order.push(provider_id(provider).to_string());
        }

        let context = Arc::new(EngineContext::with_factory(
            EngineSettings {
                provider_order: order,
                ..EngineSettings::default()
            },
            Arc::new(MockCredentials::default()),
            Arc::new(factory),
        ));

        let config = MockConfigStore::new();
        let calendar = Arc::new(CalendarService::new(Arc::new(config), "US"));
        let mut cal = TradingCalendar::weekdays("US");
        cal.trading_weekdays = trading_weekdays;
        calendar.store(&cal, ChronoDuration::days(1)).await.unwrap();

        let prices = MockPriceStore::new();
        let watch_list = Arc::new(MockWatchList::with_symbols(symbols));
        let controller = BatchController::new(
            context.clone(),
            Arc::new(prices.clone()),
            watch_list.clone(),
            calendar,
            settings,
        );
        let backfill = HistoryBackfill::new(
            context,
            watch_list,
            PersistenceWriter::new(Arc::new(prices.clone())),
        );

        Harness {
            controller,
            backfill,
            prices,
            providers,
        }
    }

    fn provider_id(provider: &MockProvider) -> &'static str {
        use quotewarden_market_data::MarketDataProvider;
        provider.id()
    }

    fn every_day() -> Vec<Weekday> {
        vec![
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ]
    }

    fn roomy_budget() -> ExecutionBudget {
        ExecutionBudget::from_secs(900.0, 60.0)
    }

    #[tokio::test]
    async fn test_invalid_price_falls_back_and_persists() {
        let h = harness(
            vec![
                MockProvider::new("A", Behavior::Price(dec!(0))),
                MockProvider::new("B", Behavior::Price(dec!(187.32))),
                MockProvider::new("C", Behavior::Price(dec!(999))),
            ],
            &["AAPL"],
            BatchSettings::default(),
            every_day(),
        )
        .await;

        let summary = h
            .controller
            .run(&RefreshRequest::default(), &roomy_budget())
            .await
            .unwrap();

        assert_eq!(summary.status, BatchStatus::AllFetched);
        assert_eq!(summary.http_status, 200);
        let outcome = summary.outcome("AAPL").unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Fetched);
        assert_eq!(outcome.source_used.as_deref(), Some("B"));
        assert_eq!(
            outcome.attempts.as_deref(),
            Some("A: MALFORMED -> B: SUCCESS")
        );

        let current = h.prices.get_current("AAPL").unwrap().unwrap();
        assert_eq!(current.price, dec!(187.32));
        assert_eq!(h.prices.history().len(), 1);
        assert_eq!(h.providers[2].calls(), 0);
    }

    #[tokio::test]
    async fn test_all_rate_limited_is_partial_failure() {
        let h = harness(
            vec![
                MockProvider::new("A", Behavior::Fail(FailureKind::RateLimited)),
                MockProvider::new("B", Behavior::Fail(FailureKind::RateLimited)),
            ],
            &["MSFT"],
            BatchSettings::default(),
            every_day(),
        )
        .await;

        let summary = h
            .controller
            .run(&RefreshRequest::default(), &roomy_budget())
            .await
            .unwrap();

        let outcome = summary.outcome("MSFT").unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.error_kind, Some(ErrorKind::RateLimited));
        assert_eq!(summary.status, BatchStatus::PartialFailures);
        assert_eq!(summary.http_status, 207);
        assert!(h.prices.get_current("MSFT").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_short_budget_drains_everything() {
        let h = harness(
            vec![MockProvider::new("A", Behavior::Price(dec!(10)))],
            &["AAPL", "MSFT", "GOOG"],
            BatchSettings::default(),
            every_day(),
        )
        .await;

        let budget = ExecutionBudget::from_secs(5.0, 60.0);
        assert!(budget.should_stop());
        let summary = h
            .controller
            .run(&RefreshRequest::default(), &budget)
            .await
            .unwrap();

        assert_eq!(summary.skipped, summary.total_considered);
        assert_eq!(summary.total_considered, 3);
        assert_eq!(summary.unattempted, vec!["AAPL", "MSFT", "GOOG"]);
        assert_eq!(summary.status, BatchStatus::PartialTimeout);
        assert_eq!(summary.http_status, 206);
        assert_eq!(h.providers[0].calls(), 0);
        assert!(summary.is_complete());
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_expiring_mid_run_keeps_counts_complete() {
        let h = harness(
            vec![MockProvider::new(
                "A",
                Behavior::Slow(Duration::from_secs(3), dec!(10)),
            )],
            &["S1", "S2", "S3", "S4", "S5", "S6", "S7", "S8", "S9", "S10"],
            BatchSettings::default(),
            every_day(),
        )
        .await;

        let budget = ExecutionBudget::from_secs(70.0, 60.0);
        let summary = h
            .controller
            .run(&RefreshRequest::default(), &budget)
            .await
            .unwrap();

        assert!(summary.fetched >= 1);
        assert!(!summary.unattempted.is_empty());
        assert_eq!(summary.http_status, 206);
        assert_eq!(summary.total_considered, 10);
        assert!(summary.is_complete());
    }

    #[tokio::test]
    async fn test_staleness_filter_and_force_refresh() {
        let h = harness(
            vec![MockProvider::new("A", Behavior::Price(dec!(50)))],
            &["AAPL"],
            BatchSettings {
                staleness: ChronoDuration::minutes(15),
                ..BatchSettings::default()
            },
            every_day(),
        )
        .await;
        h.prices
            .mark_fetched("AAPL", dec!(49), Utc::now() - ChronoDuration::minutes(5));

        let summary = h
            .controller
            .run(&RefreshRequest::default(), &roomy_budget())
            .await
            .unwrap();
        assert_eq!(
            summary.outcome("AAPL").unwrap().status,
            OutcomeStatus::SkippedStale
        );
        assert_eq!(summary.status, BatchStatus::NoWorkNeeded);
        assert_eq!(h.providers[0].calls(), 0);

        let forced = RefreshRequest {
            force_refresh: true,
            ..RefreshRequest::default()
        };
        let summary = h.controller.run(&forced, &roomy_budget()).await.unwrap();
        assert_eq!(
            summary.outcome("AAPL").unwrap().status,
            OutcomeStatus::Fetched
        );
        assert_eq!(h.providers[0].calls(), 1);
    }

    #[tokio::test]
    async fn test_stale_symbol_is_refetched() {
        let h = harness(
            vec![MockProvider::new("A", Behavior::Price(dec!(50)))],
            &["AAPL"],
            BatchSettings::default(),
            every_day(),
        )
        .await;
        h.prices
            .mark_fetched("AAPL", dec!(49), Utc::now() - ChronoDuration::minutes(30));

        let summary = h
            .controller
            .run(&RefreshRequest::default(), &roomy_budget())
            .await
            .unwrap();
        assert_eq!(summary.fetched, 1);
    }

    #[tokio::test]
    async fn test_non_trading_day_needs_no_work() {
        let h = harness(
            vec![MockProvider::new("A", Behavior::Price(dec!(50)))],
            &["AAPL", "MSFT"],
            BatchSettings::default(),
            Vec::new(),
        )
        .await;

        let summary = h
            .controller
            .run(&RefreshRequest::default(), &roomy_budget())
            .await
            .unwrap();
        assert_eq!(summary.status, BatchStatus::NoWorkNeeded);
        assert_eq!(summary.http_status, 200);
        assert_eq!(summary.skipped, 2);
        assert!(summary
            .outcomes
            .iter()
            .all(|o| o.status == OutcomeStatus::SkippedStale));

        let forced = RefreshRequest {
            force_refresh: true,
            ..RefreshRequest::default()
        };
        let summary = h.controller.run(&forced, &roomy_budget()).await.unwrap();
        assert_eq!(summary.fetched, 2);
    }

    #[tokio::test]
    async fn test_per_run_cap_defers_symbols() {
        let h = harness(
            vec![MockProvider::new("A", Behavior::Price(dec!(1)))],
            &["AAPL", "MSFT", "GOOG"],
            BatchSettings {
                max_symbols_per_run: 2,
                ..BatchSettings::default()
            },
            every_day(),
        )
        .await;

        let summary = h
            .controller
            .run(&RefreshRequest::default(), &roomy_budget())
            .await
            .unwrap();
        assert_eq!(summary.total_considered, 2);
        assert_eq!(summary.deferred, vec!["GOOG".to_string()]);
        assert_eq!(summary.status, BatchStatus::AllFetched);
        assert!(summary.is_complete());
    }

    #[tokio::test]
    async fn test_persistence_failure_becomes_outcome() {
        let h = harness(
            vec![MockProvider::new("A", Behavior::Price(dec!(1)))],
            &["AAPL", "MSFT"],
            BatchSettings::default(),
            every_day(),
        )
        .await;
        h.prices.set_fail_on_write(true);

        let summary = h
            .controller
            .run(&RefreshRequest::default(), &roomy_budget())
            .await
            .unwrap();
        assert_eq!(summary.failed, 2);
        assert!(summary
            .outcomes
            .iter()
            .all(|o| o.error_kind == Some(ErrorKind::PersistenceError)));
        assert_eq!(summary.http_status, 207);
    }

    #[tokio::test]
    async fn test_no_usable_provider_is_fatal() {
        let h = harness(Vec::new(), &["AAPL"], BatchSettings::default(), every_day()).await;

        let err = h
            .controller
            .run(&RefreshRequest::default(), &roomy_budget())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EngineFatal(_)));
    }

    #[tokio::test]
    async fn test_explicit_source_and_symbols() {
        let h = harness(
            vec![
                MockProvider::new("A", Behavior::Price(dec!(1))),
                MockProvider::new("B", Behavior::Price(dec!(2))),
            ],
            &["IGNORED"],
            BatchSettings::default(),
            every_day(),
        )
        .await;

        let request = RefreshRequest {
            symbols: Some(vec!["aapl".into(), " AAPL ".into(), "".into()]),
            source: Some("B".into()),
            ..RefreshRequest::default()
        };
        let summary = h.controller.run(&request, &roomy_budget()).await.unwrap();
        assert_eq!(summary.total_considered, 1);
        let outcome = summary.outcome("AAPL").unwrap();
        assert_eq!(outcome.source_used.as_deref(), Some("B"));
        assert_eq!(h.providers[0].calls(), 0);

        let unknown = RefreshRequest {
            source: Some("NOPE".into()),
            ..RefreshRequest::default()
        };
        let err = h.controller.run(&unknown, &roomy_budget()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_unauthorized_provider_called_once_per_run() {
        let h = harness(
            vec![
                MockProvider::new("A", Behavior::Fail(FailureKind::Unauthorized)),
                MockProvider::new("B", Behavior::Price(dec!(3))),
            ],
            &["AAPL", "MSFT", "GOOG"],
            BatchSettings::default(),
            every_day(),
        )
        .await;

        let summary = h
            .controller
            .run(&RefreshRequest::default(), &roomy_budget())
            .await
            .unwrap();
        assert_eq!(summary.fetched, 3);
        assert_eq!(h.providers[0].calls(), 1);
        assert_eq!(h.providers[1].calls(), 3);
    }

    #[tokio::test]
    async fn test_worker_pool_resolves_all_symbols() {
        let symbols: Vec<String> = (0..12).map(|i| format!("SYM{}", i)).collect();
        let refs: Vec<&str> = symbols.iter().map(String::as_str).collect();
        let h = harness(
            vec![
                MockProvider::new("A", Behavior::Price(dec!(5)))
                    .with_symbol("SYM3", Behavior::Fail(FailureKind::NotFound)),
                MockProvider::new("B", Behavior::Fail(FailureKind::Transient)),
            ],
            &refs,
            BatchSettings {
                workers: 4,
                ..BatchSettings::default()
            },
            every_day(),
        )
        .await;

        let summary = h
            .controller
            .run(&RefreshRequest::default(), &roomy_budget())
            .await
            .unwrap();
        assert_eq!(summary.total_considered, 12);
        assert_eq!(summary.fetched, 11);
        assert_eq!(
            summary.outcome("SYM3").unwrap().error_kind,
            Some(ErrorKind::NotFound)
        );
        assert!(summary.is_complete());
        // Outcomes keep watch-list order.
        assert_eq!(summary.outcomes[0].symbol, "SYM0");
        assert_eq!(summary.outcomes[11].symbol, "SYM11");
    }

    #[tokio::test]
    async fn test_backfill_writes_history() {
        let h = harness(
            vec![MockProvider::new("A", Behavior::Price(dec!(588)))],
            &["SPY", "QQQ"],
            BatchSettings::default(),
            every_day(),
        )
        .await;

        let request = BackfillRequest {
            symbols: None,
            start: NaiveDate::from_ymd_opt(2026, 2, 9).unwrap(),
            end: Some(NaiveDate::from_ymd_opt(2026, 2, 13).unwrap()),
            hard_limit_seconds: None,
            source: None,
        };
        let summary = h.backfill.run(&request, &roomy_budget()).await.unwrap();

        assert_eq!(summary.completed, vec!["SPY", "QQQ"]);
        assert_eq!(summary.points_written, 10);
        assert!(!summary.budget_expired);
        assert!(summary.remaining.is_empty());
        let spy = h
            .prices
            .history_range("SPY", request.start, request.end.unwrap())
            .unwrap();
        assert_eq!(spy.len(), 5);
    }

    #[tokio::test]
    async fn test_backfill_budget_expired_returns_partial_summary() {
        let h = harness(
            vec![MockProvider::new("A", Behavior::Price(dec!(588)))],
            &["SPY", "QQQ"],
            BatchSettings::default(),
            every_day(),
        )
        .await;

        let request = BackfillRequest {
            symbols: None,
            start: NaiveDate::from_ymd_opt(2026, 2, 9).unwrap(),
            end: Some(NaiveDate::from_ymd_opt(2026, 2, 13).unwrap()),
            hard_limit_seconds: None,
            source: None,
        };
        let budget = ExecutionBudget::from_secs(5.0, 60.0);
        let summary = h.backfill.run(&request, &budget).await.unwrap();

        assert!(summary.budget_expired);
        assert_eq!(summary.remaining, vec!["SPY", "QQQ"]);
        assert_eq!(summary.points_written, 0);
        assert_eq!(h.providers[0].calls(), 0);
    }

    #[tokio::test]
    async fn test_backfill_rejects_inverted_range() {
        let h = harness(
            vec![MockProvider::new("A", Behavior::Price(dec!(1)))],
            &["SPY"],
            BatchSettings::default(),
            every_day(),
        )
        .await;

        let request = BackfillRequest {
            symbols: None,
            start: NaiveDate::from_ymd_opt(2026, 2, 13).unwrap(),
            end: Some(NaiveDate::from_ymd_opt(2026, 2, 9).unwrap()),
            hard_limit_seconds: None,
            source: None,
        };
        let err = h.backfill.run(&request, &roomy_budget()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }
}
