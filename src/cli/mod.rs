use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::application::{PlatformConfig, RentalService, Withdrawal};
use crate::domain::{Car, CarMetadata, CarStatus, FeePolicy, RentalRules, SystemClock, User};

/// carledger - Car Rental Ledger
#[derive(Parser)]
#[command(name = "carledger")]
#[command(about = "Track users, cars, rentals, balances and debt of a car-rental platform")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "carledger.db")]
    pub database: String,

    /// Account acting on the ledger
    #[arg(long = "as", env = "CARLEDGER_CALLER", global = true)]
    pub caller: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimum rental duration before check-in, in seconds
    #[arg(long, default_value_t = 5, global = true)]
    pub min_rental_secs: u64,

    /// Rent charging rule: flat, per-minute
    #[arg(long, default_value = "flat", global = true)]
    pub fee_policy: String,

    /// Allow check-out while the user still has unpaid debt
    #[arg(long, global = true)]
    pub allow_debt_checkout: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new ledger database
    Init {
        /// Owner account (manages cars, collects payments)
        #[arg(long)]
        owner: String,
    },

    /// User commands
    #[command(subcommand)]
    User(UserCommands),

    /// Car management commands
    #[command(subcommand)]
    Car(CarCommands),

    /// Rent a car
    Checkout {
        /// Car ID
        car_id: i64,
    },

    /// Return the rented car
    Checkin,

    /// Deposit tokens into your balance
    Deposit {
        /// Amount of tokens
        amount: i64,
    },

    /// Pay your debt from your balance
    Pay,

    /// Withdraw tokens (the owner withdraws collected payments)
    Withdraw {
        /// Amount of tokens
        amount: i64,
    },

    /// Show total collected payments (owner only)
    Payments,

    /// Verify ledger integrity (owner only)
    Check,

    /// Export data to CSV or JSON
    Export {
        /// What to export: users, cars, full
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Format: csv, json (default: csv for users/cars, json for full)
        #[arg(short, long)]
        format: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Register yourself as a user
    Add {
        /// First name
        name: String,

        /// Surname
        surname: String,
    },

    /// Show a user (yourself if omitted)
    Show {
        /// User account ID
        id: Option<String>,
    },

    /// Show a user's balance (yourself if omitted)
    Balance {
        /// User account ID
        id: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum CarCommands {
    /// Add a new car (owner only)
    Add {
        /// Car name
        name: String,

        /// Image URL
        #[arg(long, default_value = "")]
        img_url: String,

        /// Rent fee in tokens
        #[arg(long)]
        rent_fee: i64,

        /// Sale fee in tokens
        #[arg(long, default_value_t = 0)]
        sale_fee: i64,
    },

    /// Show car details
    Show {
        /// Car ID
        id: i64,
    },

    /// List cars
    List {
        /// Only cars with this status: available, rented, unavailable (or 0-2)
        #[arg(long)]
        status: Option<String>,
    },

    /// Overwrite a car's metadata (owner only)
    Edit {
        /// Car ID
        id: i64,

        /// Car name
        name: String,

        /// Image URL
        #[arg(long)]
        img_url: String,

        /// Rent fee in tokens
        #[arg(long)]
        rent_fee: i64,

        /// Sale fee in tokens
        #[arg(long)]
        sale_fee: i64,
    },

    /// Set a car's status (owner only): available, unavailable (or 0, 2)
    Status {
        /// Car ID
        id: i64,

        /// New status
        status: String,
    },
}

/// Install the stderr log subscriber. `RUST_LOG` wins over `--verbose`.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

impl Cli {
    fn rules(&self) -> Result<RentalRules> {
        let fee_policy = FeePolicy::from_name(&self.fee_policy).ok_or_else(|| {
            anyhow::anyhow!(
                "Invalid fee policy '{}'. Valid policies: flat, per-minute",
                self.fee_policy
            )
        })?;
        Ok(RentalRules::default()
            .with_min_rental(Duration::from_secs(self.min_rental_secs))
            .with_fee_policy(fee_policy)
            .with_require_settled_debt(!self.allow_debt_checkout))
    }

    fn caller(&self) -> Result<String> {
        self.caller
            .clone()
            .context("No caller given. Use --as <account> or set CARLEDGER_CALLER")
    }

    async fn connect(&self) -> Result<RentalService> {
        let service =
            RentalService::connect(&self.database, self.rules()?, Arc::new(SystemClock::new()))
                .await?;
        Ok(service)
    }

    pub async fn run(self) -> Result<()> {
        match &self.command {
            Commands::Init { owner } => {
                let config = PlatformConfig::new(owner.clone()).with_rules(self.rules()?);
                RentalService::init(&self.database, config).await?;
                println!("Ledger initialized: {} (owner {})", self.database, owner);
            }

            Commands::User(user_cmd) => {
                let service = self.connect().await?;
                run_user_command(&service, self.caller.as_deref(), user_cmd).await?;
            }

            Commands::Car(car_cmd) => {
                let service = self.connect().await?;
                run_car_command(&service, self.caller.as_deref(), car_cmd).await?;
            }

            Commands::Checkout { car_id } => {
                let service = self.connect().await?;
                let rental = service.check_out(&self.caller()?, *car_id).await?;
                println!(
                    "Checked out car {} ({}) to {}",
                    rental.car.id, rental.car.name, rental.user.id
                );
            }

            Commands::Checkin => {
                let service = self.connect().await?;
                let receipt = service.check_in(&self.caller()?).await?;
                println!(
                    "Checked in car {} after {}s: charged {}, debt now {}",
                    receipt.car.id,
                    receipt.elapsed.as_secs(),
                    receipt.charged,
                    receipt.user.debt
                );
            }

            Commands::Deposit { amount } => {
                let service = self.connect().await?;
                let user = service.deposit(&self.caller()?, *amount).await?;
                println!("Deposited {}. Balance: {}", amount, user.balance);
            }

            Commands::Pay => {
                let service = self.connect().await?;
                let receipt = service.make_payment(&self.caller()?).await?;
                println!(
                    "Paid {}. Balance: {}, debt: {}",
                    receipt.paid, receipt.user.balance, receipt.user.debt
                );
            }

            Commands::Withdraw { amount } => {
                let service = self.connect().await?;
                match service.withdraw_balance(&self.caller()?, *amount).await? {
                    Withdrawal::User(user) => {
                        println!("Withdrew {}. Balance: {}", amount, user.balance)
                    }
                    Withdrawal::Owner {
                        withdrawn,
                        remaining,
                    } => println!(
                        "Withdrew {} of collected payments. Remaining: {}",
                        withdrawn, remaining
                    ),
                }
            }

            Commands::Payments => {
                let service = self.connect().await?;
                let total = service.get_total_payments(&self.caller()?).await?;
                println!("Total payments: {}", total);
            }

            Commands::Check => {
                let service = self.connect().await?;
                run_check_command(&service, &self.caller()?).await?;
            }

            Commands::Export {
                export_type,
                output,
                format,
            } => {
                let service = self.connect().await?;
                run_export_command(
                    &service,
                    self.caller.as_deref(),
                    export_type,
                    output.as_deref(),
                    format.as_deref(),
                )
                .await?;
            }
        }

        Ok(())
    }
}

fn require_caller(caller: Option<&str>) -> Result<&str> {
    caller.context("No caller given. Use --as <account> or set CARLEDGER_CALLER")
}

fn print_user(user: &User) {
    println!("User: {} {}", user.name, user.surname);
    println!("  ID:         {}", user.id);
    match user.rented_car() {
        Some(car_id) => println!("  Renting:    car {}", car_id),
        None => println!("  Renting:    -"),
    }
    if let Some(started) = user.rental_started_at {
        println!("  Since:      {}", started.format("%Y-%m-%d %H:%M:%S"));
    }
    println!("  Balance:    {}", user.balance);
    println!("  Debt:       {}", user.debt);
}

fn print_car(car: &Car) {
    println!("Car {}: {}", car.id, car.name);
    println!("  Image:      {}", car.img_url);
    println!("  Rent fee:   {}", car.rent_fee);
    println!("  Sale fee:   {}", car.sale_fee);
    println!("  Status:     {} ({})", car.status, car.status.code());
    if let Some(renter) = &car.renter_id {
        println!("  Renter:     {}", renter);
    }
}

async fn run_user_command(
    service: &RentalService,
    caller: Option<&str>,
    cmd: &UserCommands,
) -> Result<()> {
    match cmd {
        UserCommands::Add { name, surname } => {
            let user = service
                .add_user(require_caller(caller)?, name.clone(), surname.clone())
                .await?;
            println!("Registered user: {} {} ({})", user.name, user.surname, user.id);
        }

        UserCommands::Show { id } => {
            let id = match id.as_deref() {
                Some(id) => id,
                None => require_caller(caller)?,
            };
            let user = service.get_user(id).await?;
            print_user(&user);
        }

        UserCommands::Balance { id } => {
            let id = match id.as_deref() {
                Some(id) => id,
                None => require_caller(caller)?,
            };
            let balance = service.user_balance(id).await?;
            println!("{}", balance);
        }
    }
    Ok(())
}

async fn run_car_command(
    service: &RentalService,
    caller: Option<&str>,
    cmd: &CarCommands,
) -> Result<()> {
    match cmd {
        CarCommands::Add {
            name,
            img_url,
            rent_fee,
            sale_fee,
        } => {
            let metadata = CarMetadata::new(name, img_url, *rent_fee, *sale_fee);
            let car = service.add_car(require_caller(caller)?, metadata).await?;
            println!("Added car {}: {} (rent fee {})", car.id, car.name, car.rent_fee);
        }

        CarCommands::Show { id } => {
            let car = service.get_car(*id).await?;
            print_car(&car);
        }

        CarCommands::List { status } => {
            let cars = match status {
                Some(s) => {
                    let status: CarStatus = s.parse()?;
                    service.cars_by_status(status).await
                }
                None => service.list_cars().await,
            };

            if cars.is_empty() {
                println!("No cars found.");
            } else {
                println!(
                    "{:<6} {:<24} {:>10} {:>10} {:<12}",
                    "ID", "NAME", "RENT FEE", "SALE FEE", "STATUS"
                );
                println!("{}", "-".repeat(66));
                for car in cars {
                    println!(
                        "{:<6} {:<24} {:>10} {:>10} {:<12}",
                        car.id, car.name, car.rent_fee, car.sale_fee, car.status
                    );
                }
            }
        }

        CarCommands::Edit {
            id,
            name,
            img_url,
            rent_fee,
            sale_fee,
        } => {
            let metadata = CarMetadata::new(name, img_url, *rent_fee, *sale_fee);
            let car = service
                .edit_car_metadata(require_caller(caller)?, *id, metadata)
                .await?;
            println!("Updated car {}", car.id);
            print_car(&car);
        }

        CarCommands::Status { id, status } => {
            let status: CarStatus = status.parse()?;
            let car = service
                .edit_car_status(require_caller(caller)?, *id, status)
                .await?;
            println!("Car {} is now {}", car.id, car.status);
        }
    }
    Ok(())
}

async fn run_check_command(service: &RentalService, caller: &str) -> Result<()> {
    println!("Checking ledger integrity...");
    println!();

    let report = service.check_integrity(caller).await?;
    println!("Owner:            {}", service.owner());
    println!(
        "Created:          {}",
        service.created_at().format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("Users:            {}", report.user_count);
    println!("Cars:             {}", report.car_count);
    println!("Active rentals:   {}", report.active_rentals);
    println!("Total payments:   {}", report.total_payments);
    println!();

    if report.is_ok() {
        println!("\u{2713} Ledger is consistent");
        Ok(())
    } else {
        for issue in &report.issues {
            println!("\u{2717} {}", issue);
        }
        anyhow::bail!("{} integrity issue(s) found", report.issues.len())
    }
}

async fn run_export_command(
    service: &RentalService,
    caller: Option<&str>,
    export_type: &str,
    output: Option<&str>,
    format: Option<&str>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{Write, stdout};

    let mut writer: Box<dyn Write> = match output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("Failed to create file: {}", path))?,
        ),
        None => Box::new(stdout()),
    };

    let exporter = Exporter::new(service);
    let default_format = if export_type == "full" { "json" } else { "csv" };
    let format = format.unwrap_or(default_format);

    let count = match (export_type, format) {
        ("users", "csv") => exporter.export_users_csv(&mut writer).await?,
        ("cars", "csv") => exporter.export_cars_csv(&mut writer).await?,
        ("full", "json") => {
            let snapshot = exporter
                .export_full_json(require_caller(caller)?, &mut writer)
                .await?;
            snapshot.users.len() + snapshot.cars.len()
        }
        (t, f) => anyhow::bail!(
            "Unsupported export '{}' as '{}'. Use: users/cars as csv, full as json",
            t,
            f
        ),
    };

    if let Some(path) = output {
        eprintln!("Exported {} record(s) to {}", count, path);
    }
    Ok(())
}
