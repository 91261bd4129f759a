use balance_allocator::adjustment::{PaymentMethod, PriceChange, PricePolicy};
use balance_allocator::api::http::HttpBackend;
use balance_allocator::config::Config;
use balance_allocator::desk::PaymentDesk;
use balance_allocator::error::Result;
use balance_allocator::ledger::Purpose;
use balance_allocator::money::Amount;
use balance_allocator::run::run;
use balance_allocator::settlement::SettlementTarget;

use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io;
use std::process::ExitCode;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum PurposeArg {
    Balance,
    Reservation,
    Invoice,
}

impl From<PurposeArg> for Purpose {
    fn from(arg: PurposeArg) -> Self {
        match arg {
            PurposeArg::Balance => Purpose::BalanceApplication,
            PurposeArg::Reservation => Purpose::Reservation,
            PurposeArg::Invoice => Purpose::Invoice,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "balance_allocator", version, about = "Pay with agent credit balances")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Allocate an amount against a CSV export of balances, oldest first, and
    /// print the settlement lines. Nothing is sent.
    Allocate {
        /// CSV file with the agent's balances
        input: String,

        #[arg(long)]
        owner: String,

        #[arg(long)]
        amount: Amount,

        #[arg(long, value_enum, default_value = "balance")]
        purpose: PurposeArg,

        /// Output file (stdout by default)
        #[arg(short = 'o', long = "output")]
        output: Option<String>,
    },

    /// Pay an amount with the agent's balances, oldest first.
    Pay {
        #[arg(long)]
        owner: String,

        #[arg(long)]
        amount: Amount,

        /// Pay a reservation
        #[arg(long, conflicts_with = "invoice")]
        reservation: Option<String>,

        /// Pay an invoice
        #[arg(long)]
        invoice: Option<String>,
    },

    /// Settle a reservation price change.
    Adjust {
        #[arg(long)]
        reservation: String,

        #[arg(long)]
        owner: String,

        #[arg(long)]
        previous: Amount,

        #[arg(long)]
        updated: Amount,

        #[arg(long)]
        nights: u32,

        /// How the reservation was paid, e.g. "credito" or "saldo"
        #[arg(long = "payment-method")]
        payment_method: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "balance_allocator=info".into()),
        )
        .with_writer(io::stderr)
        .init();

    match execute(Cli::parse().command).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}

async fn execute(command: Command) -> Result<ExitCode> {
    match command {
        Command::Allocate {
            input,
            owner,
            amount,
            purpose,
            output,
        } => {
            let input = File::open(input)?;
            let session = match output {
                Some(path) => run(input, File::create(path)?, &owner, purpose.into(), amount)?,
                None => run(input, io::stdout(), &owner, purpose.into(), amount)?,
            };

            if !session.is_complete() {
                tracing::warn!(
                    uncovered = %session.remaining_to_cover(),
                    "the balances don't cover the amount"
                );
                return Ok(ExitCode::from(2));
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Pay {
            owner,
            amount,
            reservation,
            invoice,
        } => {
            let target = match (reservation, invoice) {
                (Some(reservation_id), _) => SettlementTarget::Reservation { reservation_id },
                (None, Some(invoice_id)) => SettlementTarget::Invoice { invoice_id },
                (None, None) => SettlementTarget::BalanceApplication,
            };

            let desk = desk()?;
            let receipt = desk.pay_with_balances(&owner, amount, target).await?;
            println!("{}", receipt.message.unwrap_or_else(|| "paid".to_string()));
            Ok(ExitCode::SUCCESS)
        }

        Command::Adjust {
            reservation,
            owner,
            previous,
            updated,
            nights,
            payment_method,
        } => {
            let change = PriceChange {
                reservation_id: reservation,
                owner_id: owner,
                previous_total: previous,
                updated_total: updated,
                nights,
                payment_method: PaymentMethod::parse(&payment_method),
            };

            let desk = desk()?;
            let outcome = desk.apply_price_change(&change).await?;
            println!(
                "{:?} ({})",
                outcome.path,
                outcome
                    .receipt
                    .and_then(|r| r.message)
                    .unwrap_or_else(|| "total updated".to_string())
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn desk() -> Result<PaymentDesk<HttpBackend>> {
    let config = Config::from_env()?;
    let policy = PricePolicy {
        minimum_nightly_price: config.minimum_nightly_price,
    };

    Ok(PaymentDesk::new(HttpBackend::new(&config)?, policy))
}
