use crate::user_repo::UserId;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug)]
pub struct PageOptions {
    pub offset: i64,
    pub limit: i64,
}

#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub from: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
    pub category: Option<Category>,
}

impl Filter {
    pub const NONE: Filter = Filter {
        from: None,
        until: None,
        category: None,
    };

    pub fn matches(&self, transaction: &Transaction) -> bool {
        self.from.map_or(true, |from| transaction.date >= from)
            && self.until.map_or(true, |until| transaction.date <= until)
            && self
                .category
                .map_or(true, |category| transaction.category == category)
    }
}

#[async_trait]
pub trait TransactionRepo: Sync + Send {
    async fn get_transaction(
        &self,
        user: UserId,
        transaction_id: i32,
    ) -> Result<Transaction, TransactionRepoError>;

    /// Newest first.
    async fn get_all_transactions(
        &self,
        user: UserId,
        filter: Filter,
        page_options: Option<PageOptions>,
    ) -> Result<Vec<Transaction>, TransactionRepoError>;

    async fn create_new_transaction(
        &self,
        user: UserId,
        new_transaction: NewTransaction,
    ) -> Result<Transaction, TransactionRepoError>;

    async fn update_transaction(
        &self,
        user: UserId,
        transaction_id: i32,
        updated_transaction: NewTransaction,
    ) -> Result<Transaction, TransactionRepoError>;

    async fn delete_transaction(
        &self,
        user: UserId,
        transaction_id: i32,
    ) -> Result<Transaction, TransactionRepoError>;

    /// Spending per category, largest total first.
    async fn get_category_totals(
        &self,
        user: UserId,
        filter: Filter,
    ) -> Result<Vec<CategoryTotal>, TransactionRepoError>;
}

#[derive(Error, Debug)]
pub enum TransactionRepoError {
    #[error("Transaction with id {0} not found")]
    TransactionNotFound(i32),
    #[error("User {0} not found")]
    UserNotFound(UserId),
    #[error("Transaction amount {0} must be positive, at most 99999999.99, with at most two decimal places")]
    InvalidAmount(Decimal),
    #[error("WatCard transaction {0} has already been recorded")]
    DuplicateTransaction(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub enum Category {
    #[serde(rename = "Café")]
    Cafe,
    ResHalls,
    Laundry,
    #[serde(rename = "W Store")]
    WStore,
    Restaurants,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Cafe,
        Category::ResHalls,
        Category::Laundry,
        Category::WStore,
        Category::Restaurants,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Cafe => "Café",
            Category::ResHalls => "ResHalls",
            Category::Laundry => "Laundry",
            Category::WStore => "W Store",
            Category::Restaurants => "Restaurants",
            Category::Other => "Other",
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Unknown category: {0}")]
pub struct UnknownCategory(String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownCategory(s.to_owned()))
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Transaction {
    pub id: i32,
    pub user_id: UserId,
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub amount: Decimal,
    pub vendor: String,
    pub location: Option<String>,
    pub category: Category,
    pub description: Option<String>,
    pub is_manual: bool,
    pub watcard_transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Orders newest first: by date, then time, then id.
    pub fn newest_first(a: &Transaction, b: &Transaction) -> Ordering {
        b.date
            .cmp(&a.date)
            .then_with(|| b.time.cmp(&a.time))
            .then_with(|| b.id.cmp(&a.id))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub amount: Decimal,
    pub vendor: String,
    pub location: Option<String>,
    pub category: Category,
    pub description: Option<String>,
    pub is_manual: bool,
    pub watcard_transaction_id: Option<String>,
}

impl NewTransaction {
    pub fn new(
        date: NaiveDate,
        amount: Decimal,
        vendor: String,
        category: Category,
    ) -> NewTransaction {
        NewTransaction {
            date,
            time: None,
            amount,
            vendor,
            location: None,
            category,
            description: None,
            is_manual: true,
            watcard_transaction_id: None,
        }
    }

    /// Amounts must fit `DECIMAL(10, 2)` exactly, so neither store rounds them.
    pub fn validate(&self) -> Result<(), TransactionRepoError> {
        let max_amount = Decimal::new(99_999_999_99, 2);
        if self.amount <= Decimal::ZERO
            || self.amount > max_amount
            || self.amount.normalize().scale() > 2
        {
            return Err(TransactionRepoError::InvalidAmount(self.amount));
        }
        Ok(())
    }

    pub fn to_transaction(self, id: i32, user_id: UserId, created_at: DateTime<Utc>) -> Transaction {
        Transaction {
            id,
            user_id,
            date: self.date,
            time: self.time,
            amount: self.amount,
            vendor: self.vendor,
            location: self.location,
            category: self.category,
            description: self.description,
            is_manual: self.is_manual,
            watcard_transaction_id: self.watcard_transaction_id,
            created_at,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct CategoryTotal {
    pub category: Category,
    pub total: Decimal,
    pub count: i64,
}
