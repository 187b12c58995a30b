//! Property tests: the ledger must reconcile with every account balance no
//! matter which operations run, succeed, or get rejected.

use proptest::prelude::*;
use quest_engine::engine::Engine;
use quest_engine::state::{TaskMeta, TaskPatch};

const USERS: [&str; 3] = ["alice", "bob", "carol"];

#[derive(Debug, Clone)]
enum Op {
    Deposit { user: usize, amount: u64 },
    CreateTask { user: usize, coins: u64 },
    AssignLatest { user: usize, assignee: usize },
    CompleteLatest { caller: usize },
    Restake { user: usize, coins: u64 },
    DeleteLatest { user: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..3usize, 1..500u64).prop_map(|(user, amount)| Op::Deposit { user, amount }),
        (0..3usize, 1..200u64).prop_map(|(user, coins)| Op::CreateTask { user, coins }),
        (0..3usize, 0..3usize).prop_map(|(user, assignee)| Op::AssignLatest { user, assignee }),
        (0..3usize).prop_map(|caller| Op::CompleteLatest { caller }),
        (0..3usize, 1..300u64).prop_map(|(user, coins)| Op::Restake { user, coins }),
        (0..3usize).prop_map(|user| Op::DeleteLatest { user }),
    ]
}

proptest! {
    /// Run an arbitrary operation sequence; rejected operations are fine,
    /// but after every step each user's balance must replay from the ledger.
    #[test]
    fn ledger_always_reconciles(ops in proptest::collection::vec(op_strategy(), 1..40)) {
        let engine = Engine::without_events();
        let mut latest_task = None;

        for op in ops {
            match op {
                Op::Deposit { user, amount } => {
                    let _ = engine.deposit(USERS[user], amount, "prop deposit");
                }
                Op::CreateTask { user, coins } => {
                    if let Ok(task) =
                        engine.create_task(USERS[user], coins, TaskMeta::default(), None)
                    {
                        latest_task = Some(task.id);
                    }
                }
                Op::AssignLatest { user, assignee } => {
                    if let Some(id) = latest_task {
                        let _ = engine.assign_task(id, USERS[user], USERS[assignee]);
                    }
                }
                Op::CompleteLatest { caller } => {
                    if let Some(id) = latest_task {
                        let _ = engine.complete_task(id, USERS[caller]);
                    }
                }
                Op::Restake { user, coins } => {
                    if let Some(id) = latest_task {
                        let patch = TaskPatch { coins: Some(coins), ..TaskPatch::default() };
                        let _ = engine.update_task(id, USERS[user], patch);
                    }
                }
                Op::DeleteLatest { user } => {
                    if let Some(id) = latest_task {
                        let _ = engine.delete_task(id, USERS[user]);
                    }
                }
            }

            for user in USERS {
                prop_assert!(
                    engine.reconcile(user),
                    "ledger diverged from balance for {}",
                    user
                );
            }
        }
    }

    /// Balances never go negative: the sum of all balances equals total
    /// deposits minus coins still locked in open escrow.
    #[test]
    fn escrow_conserves_coins(deposits in proptest::collection::vec((0..3usize, 1..500u64), 1..10),
                              stakes in proptest::collection::vec((0..3usize, 1..100u64), 0..10)) {
        let engine = Engine::without_events();
        let mut total_in = 0u64;
        for (user, amount) in deposits {
            engine.deposit(USERS[user], amount, "prop deposit").unwrap();
            total_in += amount;
        }

        let mut locked = 0u64;
        for (user, coins) in stakes {
            if engine.create_task(USERS[user], coins, TaskMeta::default(), None).is_ok() {
                locked += coins;
            }
        }

        let held: u64 = USERS
            .iter()
            .filter_map(|u| engine.account(u).ok())
            .map(|a| a.balance())
            .sum();
        prop_assert_eq!(held + locked, total_in);
    }
}
