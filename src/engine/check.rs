use crate::address::CanonicalAddress;
use crate::balances::Category;
use crate::error::CheckFailure;
use crate::sources::BalanceSource;

/// Fetch `category` from both sides and require that `actual` reproduces
/// everything `expected` reports. The reference side is fetched first.
pub async fn run_balance_check(
    category: Category,
    address: &CanonicalAddress,
    expected: &dyn BalanceSource,
    actual: &dyn BalanceSource,
) -> Result<(), CheckFailure> {
    let expected_balances = expected
        .fetch(category, address)
        .await
        .map_err(CheckFailure::Expected)?;

    let actual_balances = actual
        .fetch(category, address)
        .await
        .map_err(CheckFailure::Actual)?;

    expected_balances.contains(&actual_balances)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::reconciler::testing::StaticSource;
    use crate::error::{FetchError, SourceError};

    fn address() -> CanonicalAddress {
        CanonicalAddress::from_hex("aabbcc").unwrap()
    }

    #[tokio::test]
    async fn test_agreeing_sources_pass() {
        let node = StaticSource::new("node").with(Category::Spendable, &[("uatom", "100")]);
        let api = StaticSource::new("aggregator")
            .with(Category::Spendable, &[("uatom", "100"), ("uosmo", "3")]);

        let result = run_balance_check(Category::Spendable, &address(), &node, &api).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_missing_on_aggregator_is_mismatch() {
        let node = StaticSource::new("node").with(Category::Staking, &[("val", "5")]);
        let api = StaticSource::new("aggregator");

        let failure = run_balance_check(Category::Staking, &address(), &node, &api)
            .await
            .unwrap_err();
        match failure {
            CheckFailure::Mismatch(m) => {
                assert_eq!(m.key, "val");
                assert_eq!(m.actual, None);
            }
            other => panic!("expected mismatch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_expected_fetch_error_short_circuits() {
        let node = StaticSource::new("node").failing(Category::Unbonding, || {
            SourceError::Fetch(FetchError::UnexpectedStatus {
                url: "http://lcd".to_string(),
                status: 500,
            })
        });
        let api = StaticSource::new("aggregator");

        let failure = run_balance_check(Category::Unbonding, &address(), &node, &api)
            .await
            .unwrap_err();
        assert!(matches!(failure, CheckFailure::Expected(_)));
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn test_actual_fetch_error_is_tagged() {
        let node = StaticSource::new("node");
        let api = StaticSource::new("aggregator").failing(Category::Spendable, || {
            SourceError::UnrecognizedAmount {
                denom: "uatom".to_string(),
                amount: "garbage".to_string(),
            }
        });

        let failure = run_balance_check(Category::Spendable, &address(), &node, &api)
            .await
            .unwrap_err();
        assert!(matches!(failure, CheckFailure::Actual(_)));
    }
}
