use clap::{Parser, Subcommand};
use quest_engine::config::Config;
use quest_engine::engine::Engine;
use quest_engine::error::{Error, Result};
use quest_engine::events::NoOpSink;
use quest_engine::state::{DuelKind, TaskMeta, TaskPatch, TaskStatus};
use quest_engine::storage::{FileStorage, Storage};
use std::fs;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "quest-engine")]
#[command(about = "Quest Engine CLI - Task escrow and duel state machine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: "human" or "json"
    #[arg(short, long, default_value = "human")]
    pub format: String,

    /// Data directory path
    #[arg(short, long)]
    pub data_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the data directory
    Init,

    /// Credit an account from a verified external payment
    Deposit {
        /// User id
        user: String,
        /// Coin amount
        amount: u64,
        /// Ledger description
        #[arg(short, long, default_value = "external deposit")]
        description: String,
    },

    /// Create a task, locking the reward in escrow
    CreateTask {
        /// Creator user id
        creator: String,
        /// Escrowed reward in coins
        coins: u64,
        #[arg(short, long, default_value = "")]
        title: String,
        #[arg(short, long, default_value = "")]
        category: String,
        #[arg(long, default_value = "")]
        description: String,
    },

    /// Apply to fulfill an open task
    Apply {
        task: String,
        user: String,
    },

    /// Assign a task to a fulfiller (creator only)
    Assign {
        task: String,
        creator: String,
        assignee: String,
    },

    /// Complete a task, releasing escrow and granting rewards
    Complete {
        task: String,
        caller: String,
    },

    /// Update a task (creator only); a coin change adjusts the stake
    UpdateTask {
        task: String,
        creator: String,
        #[arg(long)]
        coins: Option<u64>,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long)]
        category: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },

    /// Delete an open task, refunding the escrow
    DeleteTask {
        task: String,
        creator: String,
    },

    /// Challenge another user to a duel (or start a shadow duel)
    Challenge {
        challenger: String,
        /// Opponent user id (ignored for shadow duels)
        #[arg(default_value = "")]
        opponent: String,
        /// Duel kind: task-sprint, habit-streak, or study-duel
        #[arg(short, long, default_value = "task-sprint")]
        kind: String,
        /// Progress target to race toward
        #[arg(short, long)]
        target: u64,
        /// Race against your own historical baseline
        #[arg(long)]
        shadow: bool,
        /// Recorded baseline for shadow duels
        #[arg(long)]
        baseline: Option<u64>,
    },

    /// Accept or reject a pending duel (opponent only)
    Respond {
        duel: String,
        opponent: String,
        /// "accept" or "reject"
        action: String,
    },

    /// Withdraw a pending challenge (challenger only)
    CancelDuel {
        duel: String,
        challenger: String,
    },

    /// Report absolute duel progress
    Progress {
        duel: String,
        user: String,
        value: u64,
    },

    /// Show account information
    Account {
        user: String,
    },

    /// Show a user's ledger entries
    Ledger {
        user: String,
    },

    /// List tasks created by a user
    Tasks {
        user: String,
    },

    /// List duels involving a user
    Duels {
        user: String,
    },
}

fn parse_id(s: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Validation(format!("Invalid {} id {}: {}", what, s, e)))
}

fn parse_kind(s: &str) -> Result<DuelKind> {
    match s {
        "task-sprint" => Ok(DuelKind::TaskSprint),
        "habit-streak" => Ok(DuelKind::HabitStreak),
        "study-duel" => Ok(DuelKind::StudyDuel),
        other => Err(Error::Validation(format!(
            "Unknown duel kind {} (expected task-sprint, habit-streak, or study-duel)",
            other
        ))),
    }
}

/// Format output based on format type
fn format_output<T: serde::Serialize + std::fmt::Debug>(data: &T, format: &str) -> Result<String> {
    match format {
        "json" => serde_json::to_string_pretty(data)
            .map_err(|e| Error::Storage(format!("Failed to serialize JSON: {}", e))),
        _ => Ok(format!("{:#?}", data)),
    }
}

fn load_engine(storage: &FileStorage) -> Result<Engine> {
    let state = storage.load_state()?.unwrap_or_default();
    Ok(Engine::with_state(state, Arc::new(NoOpSink)))
}

fn persist(storage: &mut FileStorage, engine: &Engine) -> Result<()> {
    storage.persist_state(&engine.snapshot())
}

pub fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env();
    if let Some(dir) = cli.data_dir {
        config.set_data_dir(std::path::PathBuf::from(dir));
    }
    if cli.format == "json" {
        config.set_output_format("json".to_string());
    }

    let mut storage = FileStorage::new(&config);

    match cli.command {
        Commands::Init => {
            fs::create_dir_all(config.get_data_dir())
                .map_err(|e| Error::Storage(format!("Failed to create data directory: {}", e)))?;
            println!("Initialized data directory at: {}", config.get_data_dir().display());
            Ok(())
        }

        Commands::Deposit { user, amount, description } => {
            let engine = load_engine(&storage)?;
            let balance = engine.deposit(&user, amount, &description)?;
            persist(&mut storage, &engine)?;
            println!("✓ Deposited {} coins to {} (balance: {})", amount, user, balance);
            Ok(())
        }

        Commands::CreateTask { creator, coins, title, category, description } => {
            let engine = load_engine(&storage)?;
            let meta = TaskMeta { title, category, description, attachments: Vec::new() };
            let task = engine.create_task(&creator, coins, meta, None)?;
            persist(&mut storage, &engine)?;
            println!("✓ Task {} created with {} coins in escrow", task.id, task.coins);
            Ok(())
        }

        Commands::Apply { task, user } => {
            let engine = load_engine(&storage)?;
            let task = engine.apply_for_task(parse_id(&task, "task")?, &user)?;
            persist(&mut storage, &engine)?;
            println!("✓ {} applied to task {} ({} applicants)", user, task.id, task.applicants.len());
            Ok(())
        }

        Commands::Assign { task, creator, assignee } => {
            let engine = load_engine(&storage)?;
            let task = engine.assign_task(parse_id(&task, "task")?, &creator, &assignee)?;
            persist(&mut storage, &engine)?;
            println!("✓ Task {} assigned to {}", task.id, assignee);
            Ok(())
        }

        Commands::Complete { task, caller } => {
            let engine = load_engine(&storage)?;
            let task = engine.complete_task(parse_id(&task, "task")?, &caller)?;
            persist(&mut storage, &engine)?;
            println!("✓ Task {} completed, {} coins released", task.id, task.coins);
            Ok(())
        }

        Commands::UpdateTask { task, creator, coins, title, category, description } => {
            let engine = load_engine(&storage)?;
            let patch = TaskPatch {
                coins,
                title,
                category,
                description,
                attachments: None,
                deadline: None,
            };
            let task = engine.update_task(parse_id(&task, "task")?, &creator, patch)?;
            persist(&mut storage, &engine)?;
            println!("✓ Task {} updated (stake: {} coins)", task.id, task.coins);
            Ok(())
        }

        Commands::DeleteTask { task, creator } => {
            let engine = load_engine(&storage)?;
            let task = engine.delete_task(parse_id(&task, "task")?, &creator)?;
            persist(&mut storage, &engine)?;
            println!("✓ Task {} deleted, {} coins refunded", task.id, task.coins);
            Ok(())
        }

        Commands::Challenge { challenger, opponent, kind, target, shadow, baseline } => {
            let engine = load_engine(&storage)?;
            let duel = engine.create_duel(
                &challenger,
                &opponent,
                parse_kind(&kind)?,
                target,
                shadow,
                baseline,
            )?;
            persist(&mut storage, &engine)?;
            if shadow {
                println!("✓ Shadow duel {} started (target: {})", duel.id, duel.target);
            } else {
                println!("✓ Duel {} challenged: {} vs {} (target: {})", duel.id, challenger, opponent, duel.target);
            }
            Ok(())
        }

        Commands::Respond { duel, opponent, action } => {
            let accept = match action.as_str() {
                "accept" => true,
                "reject" => false,
                other => {
                    return Err(Error::Validation(format!(
                        "Unknown action {} (expected accept or reject)",
                        other
                    )))
                }
            };
            let engine = load_engine(&storage)?;
            let duel = engine.respond_to_duel(parse_id(&duel, "duel")?, &opponent, accept)?;
            persist(&mut storage, &engine)?;
            println!("✓ Duel {} is now {:?}", duel.id, duel.status);
            Ok(())
        }

        Commands::CancelDuel { duel, challenger } => {
            let engine = load_engine(&storage)?;
            let duel = engine.cancel_duel(parse_id(&duel, "duel")?, &challenger)?;
            persist(&mut storage, &engine)?;
            println!("✓ Duel {} cancelled", duel.id);
            Ok(())
        }

        Commands::Progress { duel, user, value } => {
            let engine = load_engine(&storage)?;
            let duel = engine.update_progress(parse_id(&duel, "duel")?, &user, value)?;
            persist(&mut storage, &engine)?;
            match &duel.winner {
                Some(winner) => println!("✓ Duel {} completed, winner: {}", duel.id, winner),
                None => println!(
                    "✓ Duel {} progress: {} / {} (target {})",
                    duel.id, duel.challenger_progress, duel.opponent_progress, duel.target
                ),
            }
            Ok(())
        }

        Commands::Account { user } => {
            let engine = load_engine(&storage)?;
            let account = engine.account(&user)?;
            let output = AccountOutput {
                user,
                coin_balance: account.coin_balance,
                xp: account.xp,
                focus: account.essences.focus,
                creativity: account.essences.creativity,
                discipline: account.essences.discipline,
            };
            println!("{}", format_output(&output, &cli.format)?);
            Ok(())
        }

        Commands::Ledger { user } => {
            let engine = load_engine(&storage)?;
            let entries: Vec<LedgerOutput> = engine
                .ledger_for(&user)
                .iter()
                .map(|t| LedgerOutput {
                    id: t.id.to_string(),
                    kind: format!("{:?}", t.kind),
                    amount: t.amount,
                    task_ref: t.task_ref.map(|id| id.to_string()),
                    timestamp: t.timestamp.to_rfc3339(),
                    description: t.description.clone(),
                })
                .collect();
            let output = LedgerListOutput {
                user: user.clone(),
                reconciled: engine.reconcile(&user),
                entries,
            };
            println!("{}", format_output(&output, &cli.format)?);
            Ok(())
        }

        Commands::Tasks { user } => {
            let tasks: Vec<TaskOutput> = load_engine(&storage)?
                .tasks_by(&user)
                .iter()
                .map(|t| TaskOutput {
                    id: t.id.to_string(),
                    title: t.meta.title.clone(),
                    coins: t.coins,
                    status: t.status,
                    assigned_to: t.assigned_to.clone(),
                    applicants: t.applicants.len(),
                })
                .collect();
            println!("{}", format_output(&tasks, &cli.format)?);
            Ok(())
        }

        Commands::Duels { user } => {
            let duels: Vec<DuelOutput> = load_engine(&storage)?
                .duels_of(&user)
                .iter()
                .map(|d| DuelOutput {
                    id: d.id.to_string(),
                    challenger: d.challenger.clone(),
                    opponent: d.opponent.clone(),
                    status: format!("{:?}", d.status),
                    progress: format!("{} / {}", d.challenger_progress, d.opponent_progress),
                    target: d.target,
                    winner: d.winner.clone(),
                })
                .collect();
            println!("{}", format_output(&duels, &cli.format)?);
            Ok(())
        }
    }
}

#[derive(Debug, serde::Serialize)]
struct AccountOutput {
    user: String,
    coin_balance: u64,
    xp: u64,
    focus: u64,
    creativity: u64,
    discipline: u64,
}

#[derive(Debug, serde::Serialize)]
struct LedgerOutput {
    id: String,
    kind: String,
    amount: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_ref: Option<String>,
    timestamp: String,
    description: String,
}

#[derive(Debug, serde::Serialize)]
struct LedgerListOutput {
    user: String,
    reconciled: bool,
    entries: Vec<LedgerOutput>,
}

#[derive(Debug, serde::Serialize)]
struct TaskOutput {
    id: String,
    title: String,
    coins: u64,
    status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    assigned_to: Option<String>,
    applicants: usize,
}

#[derive(Debug, serde::Serialize)]
struct DuelOutput {
    id: String,
    challenger: String,
    opponent: String,
    status: String,
    progress: String,
    target: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    winner: Option<String>,
}
