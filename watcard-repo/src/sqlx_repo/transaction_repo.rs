use crate::sqlx_repo::SQLxRepo;
use crate::transaction_repo::TransactionRepoError::{
    DuplicateTransaction, TransactionNotFound, UserNotFound,
};
use crate::transaction_repo::{
    Category, CategoryTotal, Filter, NewTransaction, PageOptions, Transaction, TransactionRepo,
    TransactionRepoError,
};
use crate::user_repo::UserId;
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::mysql::MySqlQueryResult;
use sqlx::{query, query_as, Executor, MySql, QueryBuilder};
use std::str::FromStr;
use tracing::instrument;

const TRANSACTION_COLUMNS: &str = "transaction_id, user_id, date, time, amount, vendor, location, \
                                   category, description, is_manual, watcard_transaction_id, created_at";

#[derive(sqlx::FromRow)]
struct TransactionEntry {
    transaction_id: i32,
    user_id: i32,
    date: NaiveDate,
    time: Option<NaiveTime>,
    amount: Decimal,
    vendor: String,
    location: Option<String>,
    category: String,
    description: Option<String>,
    is_manual: bool,
    watcard_transaction_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransactionEntry> for Transaction {
    type Error = anyhow::Error;

    fn try_from(value: TransactionEntry) -> Result<Self, Self::Error> {
        let category = Category::from_str(&value.category)?;
        Ok(Transaction {
            id: value.transaction_id,
            user_id: value.user_id,
            date: value.date,
            time: value.time,
            amount: value.amount,
            vendor: value.vendor,
            location: value.location,
            category,
            description: value.description,
            is_manual: value.is_manual,
            watcard_transaction_id: value.watcard_transaction_id,
            created_at: value.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CategoryTotalResult {
    category: String,
    total: Option<Decimal>,
    count: i64,
}

fn push_filter(query_builder: &mut QueryBuilder<MySql>, filter: Filter) {
    if let Some(from) = filter.from {
        query_builder.push(" AND date >= ").push_bind(from);
    }
    if let Some(until) = filter.until {
        query_builder.push(" AND date <= ").push_bind(until);
    }
    if let Some(category) = filter.category {
        query_builder
            .push(" AND category = ")
            .push_bind(category.as_str());
    }
}

/// Translates constraint violations on insert/update into repository errors.
fn write_error(
    err: sqlx::Error,
    user: UserId,
    transaction: &NewTransaction,
    action: &str,
) -> TransactionRepoError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_foreign_key_violation() {
            return UserNotFound(user);
        }
        if db_err.is_unique_violation() {
            return DuplicateTransaction(
                transaction
                    .watcard_transaction_id
                    .clone()
                    .unwrap_or_default(),
            );
        }
        if db_err.is_check_violation() {
            return TransactionRepoError::InvalidAmount(transaction.amount);
        }
    }
    anyhow::Error::new(err)
        .context(format!("Unable to {} transaction", action))
        .into()
}

impl SQLxRepo {
    #[instrument(skip(db_executor))]
    async fn get_transaction_entry<'e, E>(
        db_executor: E,
        user: UserId,
        transaction_id: i32,
    ) -> Result<Option<TransactionEntry>, TransactionRepoError>
    where
        E: Executor<'e, Database = MySql>,
    {
        let transaction_entry = query_as::<_, TransactionEntry>(&format!(
            "SELECT {} FROM transactions WHERE transaction_id = ? AND user_id = ?",
            TRANSACTION_COLUMNS
        ))
        .bind(transaction_id)
        .bind(user)
        .fetch_optional(db_executor)
        .await
        .with_context(|| format!("Unable to get transaction {}", transaction_id))?;
        Ok(transaction_entry)
    }

    #[instrument(skip(self))]
    async fn get_transaction_entries(
        &self,
        user: UserId,
        filter: Filter,
        page_options: Option<PageOptions>,
    ) -> Result<Vec<TransactionEntry>, TransactionRepoError> {
        let mut query_builder: QueryBuilder<MySql> = QueryBuilder::new(format!(
            "SELECT {} FROM transactions WHERE user_id = ",
            TRANSACTION_COLUMNS
        ));
        query_builder.push_bind(user);
        push_filter(&mut query_builder, filter);
        query_builder.push(" ORDER BY date DESC, time DESC, transaction_id DESC");
        if let Some(po) = page_options {
            query_builder
                .push(" LIMIT ")
                .push_bind(po.limit)
                .push(" OFFSET ")
                .push_bind(po.offset);
        }
        let transaction_entries: Vec<TransactionEntry> = query_builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Unable to get transactions for user {}", user))?;
        Ok(transaction_entries)
    }

    #[instrument(skip(db_executor, new_transaction))]
    async fn insert_transaction_entry<'e, E>(
        db_executor: E,
        user: UserId,
        new_transaction: &NewTransaction,
    ) -> Result<i32, TransactionRepoError>
    where
        E: Executor<'e, Database = MySql>,
    {
        let result: MySqlQueryResult = query(
            "INSERT INTO transactions (user_id, date, time, amount, vendor, location, category, \
             description, is_manual, watcard_transaction_id) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user)
        .bind(new_transaction.date)
        .bind(new_transaction.time)
        .bind(new_transaction.amount)
        .bind(new_transaction.vendor.as_str())
        .bind(new_transaction.location.as_deref())
        .bind(new_transaction.category.as_str())
        .bind(new_transaction.description.as_deref())
        .bind(new_transaction.is_manual)
        .bind(new_transaction.watcard_transaction_id.as_deref())
        .execute(db_executor)
        .await
        .map_err(|e| write_error(e, user, new_transaction, "insert"))?;

        let id = i32::try_from(result.last_insert_id()).context("Transaction id out of range")?;
        Ok(id)
    }

    #[instrument(skip(db_executor, updated_transaction))]
    async fn update_transaction_entry<'e, E>(
        db_executor: E,
        user: UserId,
        transaction_id: i32,
        updated_transaction: &NewTransaction,
    ) -> Result<(), TransactionRepoError>
    where
        E: Executor<'e, Database = MySql>,
    {
        query(
            "UPDATE transactions SET date = ?, time = ?, amount = ?, vendor = ?, location = ?, \
             category = ?, description = ?, is_manual = ?, watcard_transaction_id = ? \
             WHERE user_id = ? AND transaction_id = ?",
        )
        .bind(updated_transaction.date)
        .bind(updated_transaction.time)
        .bind(updated_transaction.amount)
        .bind(updated_transaction.vendor.as_str())
        .bind(updated_transaction.location.as_deref())
        .bind(updated_transaction.category.as_str())
        .bind(updated_transaction.description.as_deref())
        .bind(updated_transaction.is_manual)
        .bind(updated_transaction.watcard_transaction_id.as_deref())
        .bind(user)
        .bind(transaction_id)
        .execute(db_executor)
        .await
        .map_err(|e| write_error(e, user, updated_transaction, "update"))?;
        Ok(())
    }
}

#[async_trait]
impl TransactionRepo for SQLxRepo {
    #[instrument(skip(self))]
    async fn get_transaction(
        &self,
        user: UserId,
        transaction_id: i32,
    ) -> Result<Transaction, TransactionRepoError> {
        let transaction_entry = Self::get_transaction_entry(&self.pool, user, transaction_id)
            .await?
            .ok_or(TransactionNotFound(transaction_id))?;
        Ok(transaction_entry.try_into()?)
    }

    #[instrument(skip(self))]
    async fn get_all_transactions(
        &self,
        user: UserId,
        filter: Filter,
        page_options: Option<PageOptions>,
    ) -> Result<Vec<Transaction>, TransactionRepoError> {
        let transactions = self
            .get_transaction_entries(user, filter, page_options)
            .await?
            .into_iter()
            .map(Transaction::try_from)
            .collect::<Result<Vec<Transaction>, anyhow::Error>>()?;

        Ok(transactions)
    }

    #[instrument(skip(self, new_transaction))]
    async fn create_new_transaction(
        &self,
        user: UserId,
        new_transaction: NewTransaction,
    ) -> Result<Transaction, TransactionRepoError> {
        new_transaction.validate()?;

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Unable to start transaction")?;
        let id = Self::insert_transaction_entry(&mut *tx, user, &new_transaction).await?;
        let transaction_entry = Self::get_transaction_entry(&mut *tx, user, id)
            .await?
            .ok_or_else(|| anyhow!("Inserted transaction {} disappeared", id))?;
        tx.commit()
            .await
            .context("Unable to commit new transaction")?;

        Ok(transaction_entry.try_into()?)
    }

    #[instrument(skip(self, updated_transaction))]
    async fn update_transaction(
        &self,
        user: UserId,
        transaction_id: i32,
        updated_transaction: NewTransaction,
    ) -> Result<Transaction, TransactionRepoError> {
        updated_transaction.validate()?;

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Unable to start transaction")?;
        if Self::get_transaction_entry(&mut *tx, user, transaction_id)
            .await?
            .is_none()
        {
            return Err(TransactionNotFound(transaction_id));
        }
        Self::update_transaction_entry(&mut *tx, user, transaction_id, &updated_transaction)
            .await?;
        let transaction_entry = Self::get_transaction_entry(&mut *tx, user, transaction_id)
            .await?
            .ok_or(TransactionNotFound(transaction_id))?;
        tx.commit()
            .await
            .with_context(|| format!("Unable to commit update of transaction {}", transaction_id))?;

        Ok(transaction_entry.try_into()?)
    }

    #[instrument(skip(self))]
    async fn delete_transaction(
        &self,
        user: UserId,
        transaction_id: i32,
    ) -> Result<Transaction, TransactionRepoError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Unable to start transaction")?;
        let transaction_entry = Self::get_transaction_entry(&mut *tx, user, transaction_id)
            .await?
            .ok_or(TransactionNotFound(transaction_id))?;
        query("DELETE FROM transactions WHERE user_id = ? AND transaction_id = ?")
            .bind(user)
            .bind(transaction_id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Unable to delete transaction {}", transaction_id))?;
        tx.commit()
            .await
            .with_context(|| format!("Unable to commit delete of transaction {}", transaction_id))?;

        Ok(transaction_entry.try_into()?)
    }

    #[instrument(skip(self))]
    async fn get_category_totals(
        &self,
        user: UserId,
        filter: Filter,
    ) -> Result<Vec<CategoryTotal>, TransactionRepoError> {
        let mut query_builder: QueryBuilder<MySql> = QueryBuilder::new(
            "SELECT category, SUM(amount) AS total, COUNT(*) AS count \
             FROM transactions WHERE user_id = ",
        );
        query_builder.push_bind(user);
        push_filter(&mut query_builder, filter);
        query_builder.push(" GROUP BY category ORDER BY total DESC, category ASC");

        let results: Vec<CategoryTotalResult> = query_builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Unable to get category totals for user {}", user))?;

        let totals = results
            .into_iter()
            .map(|result| {
                Ok(CategoryTotal {
                    category: Category::from_str(&result.category)?,
                    total: result.total.unwrap_or(Decimal::ZERO),
                    count: result.count,
                })
            })
            .collect::<Result<Vec<CategoryTotal>, anyhow::Error>>()?;
        Ok(totals)
    }
}
