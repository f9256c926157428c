use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use vehicle_registry::{NewUser, Registry, RegistryConfig, VehicleId};

#[derive(Parser)]
#[command(name = "vehicle-registry")]
#[command(about = "Vehicle registry: owners, plates, vehicles and transfer history", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database file and schema if missing
    Init,

    /// Register an acting user (transfers are attributed by email)
    AddUser {
        #[arg(long)]
        names: String,

        #[arg(long)]
        email: String,

        #[arg(long, default_value = "STAFF")]
        role: String,
    },

    /// Print a vehicle with its current owner and plate
    ShowVehicle {
        /// Vehicle id
        id: i64,
    },

    /// Print the ownership history of a vehicle, newest first
    History {
        /// Vehicle id
        vehicle_id: i64,

        /// Write CSV to stdout instead of a table
        #[arg(long, default_value_t = false)]
        csv: bool,
    },

    /// Audit plate / vehicle / owner consistency across the whole store
    Check,
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let config = RegistryConfig::from_env()?;

    match cli.cmd {
        Commands::Init => run_init(&config),
        Commands::AddUser { names, email, role } => run_add_user(&config, &names, &email, &role),
        Commands::ShowVehicle { id } => run_show_vehicle(&config, VehicleId(id)),
        Commands::History { vehicle_id, csv } => run_history(&config, VehicleId(vehicle_id), csv),
        Commands::Check => run_check(&config),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn open(config: &RegistryConfig) -> Result<Registry> {
    Registry::open(config)
        .with_context(|| format!("failed to open registry at {}", config.database_path.display()))
}

fn run_init(config: &RegistryConfig) -> Result<()> {
    println!("🗄️  Vehicle Registry - database setup");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let registry = open(config)?;
    let owners = registry.list_owners()?;

    println!("✓ Database ready at {}", config.database_path.display());
    println!("✓ {} owners registered", owners.len());
    Ok(())
}

fn run_add_user(config: &RegistryConfig, names: &str, email: &str, role: &str) -> Result<()> {
    let mut registry = open(config)?;
    let user = registry
        .register_user(&NewUser::new(names, email, role))
        .context("failed to register user")?;

    println!("✓ User {} <{}> registered with id {}", user.names, user.email, user.id);
    Ok(())
}

fn run_show_vehicle(config: &RegistryConfig, id: VehicleId) -> Result<()> {
    let registry = open(config)?;
    let vehicle = registry.get_vehicle_by_id(id)?;

    println!("🚗 {} {} ({})", vehicle.manufacture_company, vehicle.model_name, vehicle.manufacture_year);
    println!("   Chassis:    {}", vehicle.chassis_number);
    println!(
        "   Plate:      {} [{}]",
        vehicle.current_plate_number.plate_number, vehicle.current_plate_number.status
    );
    println!(
        "   Owner:      {} (national id {})",
        vehicle.current_owner.names, vehicle.current_owner.national_id
    );
    println!("   Price:      {:.2}", vehicle.current_price);
    println!("   Registered: {}", vehicle.registration_date.format("%Y-%m-%d"));
    Ok(())
}

fn run_history(config: &RegistryConfig, id: VehicleId, as_csv: bool) -> Result<()> {
    let registry = open(config)?;
    let entries = registry.get_ownership_history(id)?;

    if as_csv {
        let mut writer = csv::Writer::from_writer(std::io::stdout());
        for entry in &entries {
            writer.serialize(entry).context("failed to write CSV row")?;
        }
        writer.flush()?;
        return Ok(());
    }

    println!("📜 Ownership history of vehicle {} ({} transfers)", id, entries.len());
    for entry in &entries {
        println!(
            "   {}  {:<30} {} → {}  plate {} → {}  price {:.2}  by {}",
            entry.transfer_date.format("%Y-%m-%d %H:%M"),
            entry.transfer_type,
            entry.previous_owner,
            entry.new_owner,
            entry.previous_plate_number,
            entry.new_plate_number,
            entry.transfer_price,
            entry.transferred_by,
        );
    }
    Ok(())
}

fn run_check(config: &RegistryConfig) -> Result<()> {
    println!("🔍 Auditing registry invariants...");

    let registry = open(config)?;
    let report = registry.audit_integrity()?;

    println!("{}", report.summary());
    if report.is_clean() {
        println!("✅ No breaches found");
        return Ok(());
    }

    for breach in &report.breaches {
        eprintln!("❌ {:?}: {}", breach.kind, breach.message);
    }
    std::process::exit(1);
}
