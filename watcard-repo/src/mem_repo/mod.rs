use crate::task_repo::TaskRepo;
use crate::transaction_repo::{Transaction, TransactionRepo};
use crate::user_repo::{User, UserId, UserRepo};
use anyhow::anyhow;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

mod task_repo;
mod transaction_repo;
mod user_repo;

pub fn create_repos() -> (Arc<dyn UserRepo>, Arc<dyn TransactionRepo>, Arc<dyn TaskRepo>) {
    let finance = SharedState::default();
    let user_repo = user_repo::MemUserRepo::new(finance.clone());
    let transaction_repo = transaction_repo::MemTransactionRepo::new(finance);
    let task_repo = task_repo::MemTaskRepo::new();

    (
        Arc::new(user_repo),
        Arc::new(transaction_repo),
        Arc::new(task_repo),
    )
}

/// Users and transactions live together so that the foreign key and the
/// cascading delete can be enforced under one lock.
#[derive(Default)]
struct FinanceState {
    users: HashMap<UserId, User>,
    transactions: HashMap<i32, Transaction>,
    next_user_id: UserId,
    next_transaction_id: i32,
}

impl FinanceState {
    fn allocate_user_id(&mut self) -> UserId {
        self.next_user_id += 1;
        self.next_user_id
    }

    fn allocate_transaction_id(&mut self) -> i32 {
        self.next_transaction_id += 1;
        self.next_transaction_id
    }
}

#[derive(Clone, Default)]
struct SharedState {
    state: Arc<RwLock<FinanceState>>,
}

impl SharedState {
    fn read_lock(&self) -> Result<RwLockReadGuard<FinanceState>, anyhow::Error> {
        self.state
            .read()
            .map_err(|_| anyhow!("Unable to acquire lock"))
    }

    fn write_lock(&self) -> Result<RwLockWriteGuard<FinanceState>, anyhow::Error> {
        self.state
            .write()
            .map_err(|_| anyhow!("Unable to acquire lock"))
    }
}
