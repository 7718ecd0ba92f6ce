use rust_decimal::Decimal;
use serde::Serialize;
use watcard_repo::transaction_repo::{CategoryTotal, Filter, TransactionRepo, TransactionRepoError};
use watcard_repo::user_repo::UserId;

#[derive(Serialize, Debug, PartialEq)]
pub struct CategoryShare {
    #[serde(flatten)]
    pub total: CategoryTotal,
    /// Percentage of the overall total, to two decimal places.
    pub percent: Decimal,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct SpendingSummary {
    pub user_id: UserId,
    pub total: Decimal,
    pub transaction_count: i64,
    pub categories: Vec<CategoryShare>,
}

#[::tracing::instrument(skip(transaction_repo))]
pub async fn summarize(
    transaction_repo: &dyn TransactionRepo,
    user: UserId,
    filter: Filter,
) -> Result<SpendingSummary, TransactionRepoError> {
    let totals = transaction_repo.get_category_totals(user, filter).await?;

    let total: Decimal = totals.iter().map(|t| t.total).sum();
    let transaction_count = totals.iter().map(|t| t.count).sum();
    let categories = totals
        .into_iter()
        .map(|t| {
            let percent = if total.is_zero() {
                Decimal::ZERO
            } else {
                (t.total * Decimal::ONE_HUNDRED / total).round_dp(2)
            };
            CategoryShare { total: t, percent }
        })
        .collect();

    Ok(SpendingSummary {
        user_id: user,
        total,
        transaction_count,
        categories,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rstest::rstest;
    use std::str::FromStr;
    use watcard_repo::transaction_repo::{Category, NewTransaction};
    use watcard_repo::user_repo::NewUser;

    fn purchase(day: u32, amount: &str, category: Category) -> NewTransaction {
        NewTransaction::new(
            NaiveDate::from_ymd_opt(2025, 11, day).unwrap(),
            Decimal::from_str(amount).unwrap(),
            "Test Vendor".to_string(),
            category,
        )
    }

    #[rstest]
    #[actix_rt::test]
    async fn summarize_spending() {
        let (user_repo, transaction_repo, _) = watcard_repo::mem_repo::create_repos();
        let user = user_repo
            .create_user(NewUser::new(
                "student@uwaterloo.ca".to_string(),
                "google-1".to_string(),
            ))
            .await
            .unwrap();
        for new_transaction in [
            purchase(1, "30.00", Category::ResHalls),
            purchase(2, "5.00", Category::Cafe),
            purchase(3, "5.00", Category::Cafe),
        ] {
            transaction_repo
                .create_new_transaction(user.id, new_transaction)
                .await
                .unwrap();
        }

        let summary = summarize(transaction_repo.as_ref(), user.id, Filter::NONE)
            .await
            .unwrap();
        assert_eq!(summary.total, Decimal::from_str("40.00").unwrap());
        assert_eq!(summary.transaction_count, 3);
        assert_eq!(summary.categories.len(), 2);
        assert_eq!(summary.categories[0].total.category, Category::ResHalls);
        assert_eq!(summary.categories[0].percent, Decimal::from(75));
        assert_eq!(summary.categories[1].percent, Decimal::from(25));
    }

    #[rstest]
    #[actix_rt::test]
    async fn summarize_without_spending() {
        let (_, transaction_repo, _) = watcard_repo::mem_repo::create_repos();

        let summary = summarize(transaction_repo.as_ref(), 42, Filter::NONE)
            .await
            .unwrap();
        assert_eq!(summary.total, Decimal::ZERO);
        assert!(summary.categories.is_empty());
    }
}
