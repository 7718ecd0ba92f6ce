use super::{FinanceState, SharedState};
use crate::transaction_repo::TransactionRepoError::{
    DuplicateTransaction, TransactionNotFound, UserNotFound,
};
use crate::transaction_repo::{
    CategoryTotal, Filter, NewTransaction, PageOptions, Transaction, TransactionRepo,
    TransactionRepoError,
};
use crate::user_repo::UserId;
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;

pub struct MemTransactionRepo {
    state: SharedState,
}

impl MemTransactionRepo {
    pub(super) fn new(state: SharedState) -> MemTransactionRepo {
        MemTransactionRepo { state }
    }
}

fn owned_transactions<'a>(
    state: &'a FinanceState,
    user: UserId,
    filter: &'a Filter,
) -> impl Iterator<Item = &'a Transaction> {
    state
        .transactions
        .values()
        .filter(move |t| t.user_id == user && filter.matches(t))
}

/// Rejects a WatCard id the user already has on another transaction.
fn check_watcard_id(
    state: &FinanceState,
    user: UserId,
    transaction_id: Option<i32>,
    new_transaction: &NewTransaction,
) -> Result<(), TransactionRepoError> {
    let Some(watcard_id) = &new_transaction.watcard_transaction_id else {
        return Ok(());
    };
    let taken = owned_transactions(state, user, &Filter::NONE).any(|t| {
        Some(t.id) != transaction_id && t.watcard_transaction_id.as_ref() == Some(watcard_id)
    });
    if taken {
        Err(DuplicateTransaction(watcard_id.clone()))
    } else {
        Ok(())
    }
}

#[async_trait]
impl TransactionRepo for MemTransactionRepo {
    async fn get_transaction(
        &self,
        user: UserId,
        transaction_id: i32,
    ) -> Result<Transaction, TransactionRepoError> {
        let read_guard = self.state.read_lock()?;

        read_guard
            .transactions
            .get(&transaction_id)
            .filter(|t| t.user_id == user)
            .cloned()
            .ok_or(TransactionNotFound(transaction_id))
    }

    async fn get_all_transactions(
        &self,
        user: UserId,
        filter: Filter,
        page_options: Option<PageOptions>,
    ) -> Result<Vec<Transaction>, TransactionRepoError> {
        let read_guard = self.state.read_lock()?;

        let mut transactions: Vec<Transaction> = owned_transactions(&read_guard, user, &filter)
            .cloned()
            .collect();
        transactions.sort_by(Transaction::newest_first);

        if let Some(page_options) = page_options {
            transactions = transactions
                .into_iter()
                .skip(page_options.offset as usize)
                .take(page_options.limit as usize)
                .collect();
        }

        Ok(transactions)
    }

    async fn create_new_transaction(
        &self,
        user: UserId,
        new_transaction: NewTransaction,
    ) -> Result<Transaction, TransactionRepoError> {
        new_transaction.validate()?;
        let mut write_guard = self.state.write_lock()?;

        if !write_guard.users.contains_key(&user) {
            return Err(UserNotFound(user));
        }
        check_watcard_id(&write_guard, user, None, &new_transaction)?;

        let id = write_guard.allocate_transaction_id();
        let transaction = new_transaction.to_transaction(id, user, Utc::now());
        write_guard.transactions.insert(id, transaction.clone());

        Ok(transaction)
    }

    async fn update_transaction(
        &self,
        user: UserId,
        transaction_id: i32,
        updated_transaction: NewTransaction,
    ) -> Result<Transaction, TransactionRepoError> {
        updated_transaction.validate()?;
        let mut write_guard = self.state.write_lock()?;

        let created_at = match write_guard.transactions.get(&transaction_id) {
            Some(t) if t.user_id == user => t.created_at,
            _ => return Err(TransactionNotFound(transaction_id)),
        };
        check_watcard_id(&write_guard, user, Some(transaction_id), &updated_transaction)?;

        let transaction = updated_transaction.to_transaction(transaction_id, user, created_at);
        write_guard
            .transactions
            .insert(transaction_id, transaction.clone());
        Ok(transaction)
    }

    async fn delete_transaction(
        &self,
        user: UserId,
        transaction_id: i32,
    ) -> Result<Transaction, TransactionRepoError> {
        let mut write_guard = self.state.write_lock()?;

        match write_guard.transactions.get(&transaction_id) {
            Some(t) if t.user_id == user => {}
            _ => return Err(TransactionNotFound(transaction_id)),
        }
        write_guard
            .transactions
            .remove(&transaction_id)
            .ok_or(TransactionNotFound(transaction_id))
    }

    async fn get_category_totals(
        &self,
        user: UserId,
        filter: Filter,
    ) -> Result<Vec<CategoryTotal>, TransactionRepoError> {
        let read_guard = self.state.read_lock()?;

        let mut totals = HashMap::new();
        for t in owned_transactions(&read_guard, user, &filter) {
            let entry = totals.entry(t.category).or_insert_with(|| CategoryTotal {
                category: t.category,
                total: Decimal::ZERO,
                count: 0,
            });
            entry.total += t.amount;
            entry.count += 1;
        }

        let mut totals: Vec<CategoryTotal> = totals.into_values().collect();
        totals.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.category.cmp(&b.category)));
        Ok(totals)
    }
}
