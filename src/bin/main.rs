// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use branch_ledger::config::DEFAULT_MIN_BALANCE;
use branch_ledger::{
    AccountNumber, AccountType, FileStore, FlushPolicy, Ledger, LedgerConfig, LedgerError,
    MalformedLinePolicy, statement,
};
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

/// Branch Ledger - Single-branch retail banking from the command line
///
/// Every invocation loads `accounts.dat` and `transactions.dat` from the data
/// directory, performs one operation and writes the result back.
#[derive(Parser, Debug)]
#[command(name = "branch-ledger")]
#[command(about = "A single-branch retail banking ledger", long_about = None)]
struct Args {
    /// Directory holding accounts.dat and transactions.dat
    #[arg(long, value_name = "DIR", default_value = ".", global = true)]
    data_dir: PathBuf,

    /// Balance every active account must keep
    #[arg(long, default_value_t = DEFAULT_MIN_BALANCE, global = true)]
    min_balance: Decimal,

    /// When changes are written to disk
    #[arg(long, value_enum, default_value = "every-mutation", global = true)]
    flush: FlushArg,

    /// Abort on the first malformed line instead of skipping it
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open a new account
    Open {
        /// Account holder name
        #[arg(long)]
        name: String,
        #[arg(long)]
        password: String,
        #[arg(long = "type", value_enum, default_value = "savings")]
        account_type: AccountTypeArg,
        /// Opening deposit, at least the minimum balance
        #[arg(long)]
        deposit: Decimal,
    },

    /// Deposit money into an account
    Deposit {
        account: AccountNumber,
        amount: Decimal,
        #[arg(long)]
        password: String,
    },

    /// Withdraw money from an account
    Withdraw {
        account: AccountNumber,
        amount: Decimal,
        #[arg(long)]
        password: String,
    },

    /// Show the current balance
    Balance {
        account: AccountNumber,
        #[arg(long)]
        password: String,
    },

    /// Show account details
    Details {
        account: AccountNumber,
        #[arg(long)]
        password: String,
    },

    /// Transfer money to another account
    Transfer {
        /// Source account, authenticated with --password
        from: AccountNumber,
        to: AccountNumber,
        amount: Decimal,
        #[arg(long)]
        password: String,
    },

    /// List every transaction of an account
    History {
        account: AccountNumber,
        #[arg(long)]
        password: String,
    },

    /// Export a statement to statement_<ACCOUNT>.txt
    Statement {
        account: AccountNumber,
        #[arg(long)]
        password: String,
        /// Write somewhere other than the conventional file name
        #[arg(long, short, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Permanently deactivate an account
    Deactivate {
        account: AccountNumber,
        #[arg(long)]
        password: String,
        /// Confirm the deactivation; it cannot be undone
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AccountTypeArg {
    Savings,
    Current,
}

impl From<AccountTypeArg> for AccountType {
    fn from(arg: AccountTypeArg) -> Self {
        match arg {
            AccountTypeArg::Savings => AccountType::Savings,
            AccountTypeArg::Current => AccountType::Current,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum FlushArg {
    /// Write after every change
    EveryMutation,
    /// Write once, when the command finishes
    OnExit,
}

impl From<FlushArg> for FlushPolicy {
    fn from(arg: FlushArg) -> Self {
        match arg {
            FlushArg::EveryMutation => FlushPolicy::EveryMutation,
            FlushArg::OnExit => FlushPolicy::OnShutdown,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("authentication failed for account {0}")]
    Authentication(AccountNumber),
    #[error("deactivating {0} cannot be undone; pass --yes to confirm")]
    Unconfirmed(AccountNumber),
    #[error("failed to write statement to '{path}': {source}")]
    Statement { path: String, source: io::Error },
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

fn main() {
    init_tracing();
    let args = Args::parse();

    let config = LedgerConfig::default()
        .with_min_balance(args.min_balance)
        .with_flush_policy(args.flush.into())
        .with_malformed_lines(if args.strict {
            MalformedLinePolicy::Strict
        } else {
            MalformedLinePolicy::Skip
        });

    let ledger = match Ledger::builder()
        .config(config)
        .store(FileStore::in_dir(&args.data_dir))
        .build()
    {
        Ok(ledger) => ledger,
        Err(e) => {
            eprintln!("Error opening ledger in '{}': {}", args.data_dir.display(), e);
            process::exit(1);
        }
    };

    let mut stdout = io::stdout().lock();
    if let Err(e) = run(&ledger, args.command, &mut stdout) {
        eprintln!("Error: {e}");
        process::exit(1);
    }

    if args.flush == FlushArg::OnExit {
        if let Err(e) = ledger.save() {
            eprintln!("Error saving ledger: {e}");
            process::exit(1);
        }
    }
}

/// Logs go to stderr, filtered by `RUST_LOG` (default `warn`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn authenticate(ledger: &Ledger, account: &AccountNumber, password: &str) -> Result<(), CliError> {
    if ledger.authenticate(account, password) {
        Ok(())
    } else {
        Err(CliError::Authentication(account.clone()))
    }
}

/// Executes one command, writing its human-readable result to `out`.
fn run<W: Write>(ledger: &Ledger, command: Command, out: &mut W) -> Result<(), CliError> {
    match command {
        Command::Open {
            name,
            password,
            account_type,
            deposit,
        } => {
            let number = ledger.create_account(&name, &password, account_type.into(), deposit)?;
            writeln!(out, "Account created successfully.")?;
            writeln!(out, "Your account number: {number}")?;
        }
        Command::Deposit {
            account,
            amount,
            password,
        } => {
            authenticate(ledger, &account, &password)?;
            let balance = ledger.deposit(&account, amount)?;
            writeln!(out, "Deposit successful. New balance: {balance:.2}")?;
        }
        Command::Withdraw {
            account,
            amount,
            password,
        } => {
            authenticate(ledger, &account, &password)?;
            let balance = ledger.withdraw(&account, amount)?;
            writeln!(out, "Withdrawal successful. New balance: {balance:.2}")?;
        }
        Command::Balance { account, password } => {
            authenticate(ledger, &account, &password)?;
            let details = ledger.details_of(&account)?;
            writeln!(out, "Account Number: {}", details.number)?;
            writeln!(out, "Account Holder: {}", details.holder_name)?;
            writeln!(out, "Current Balance: {:.2}", details.balance)?;
            writeln!(out, "Account Type: {}", details.account_type)?;
        }
        Command::Details { account, password } => {
            authenticate(ledger, &account, &password)?;
            let details = ledger.details_of(&account)?;
            writeln!(out, "Account Number: {}", details.number)?;
            writeln!(out, "Account Holder: {}", details.holder_name)?;
            writeln!(out, "Account Type: {}", details.account_type)?;
            writeln!(out, "Current Balance: {:.2}", details.balance)?;
            writeln!(out, "Account Created: {}", details.created_at)?;
            writeln!(
                out,
                "Status: {}",
                if details.active { "Active" } else { "Inactive" }
            )?;
        }
        Command::Transfer {
            from,
            to,
            amount,
            password,
        } => {
            authenticate(ledger, &from, &password)?;
            let (from_balance, _) = ledger.transfer(&from, &to, amount)?;
            writeln!(out, "Transferred {amount:.2} to {to}.")?;
            writeln!(out, "Your new balance: {from_balance:.2}")?;
        }
        Command::History { account, password } => {
            authenticate(ledger, &account, &password)?;
            let history = ledger.history_of(&account);
            if history.is_empty() {
                writeln!(out, "No transactions found.")?;
            }
            for record in history {
                writeln!(
                    out,
                    "{} | {} | {:.2} | Balance: {:.2}",
                    record.timestamp, record.kind, record.amount, record.balance_after
                )?;
            }
        }
        Command::Statement {
            account,
            password,
            output,
        } => {
            authenticate(ledger, &account, &password)?;
            let text = ledger.generate_statement(&account)?;
            let path = output.unwrap_or_else(|| PathBuf::from(statement::file_name(&account)));
            fs::write(&path, text).map_err(|source| CliError::Statement {
                path: path.display().to_string(),
                source,
            })?;
            writeln!(out, "Statement saved as {}", path.display())?;
        }
        Command::Deactivate {
            account,
            password,
            yes,
        } => {
            authenticate(ledger, &account, &password)?;
            if !yes {
                return Err(CliError::Unconfirmed(account));
            }
            let balance = ledger.balance_of(&account)?;
            ledger.deactivate(&account)?;
            writeln!(out, "Account {account} deactivated.")?;
            writeln!(out, "Remaining balance of {balance:.2} can be collected at the branch.")?;
        }
    }
    Ok(())
}
