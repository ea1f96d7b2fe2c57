use clap::{Parser, Subcommand};
use scansphere_client::{ApiClient, ApiResponse, Registration};

#[derive(Parser)]
#[command(name = "scansphere-cli")]
#[command(about = "Command-line client for the ScanSphere API", long_about = None)]
struct Cli {
    #[arg(short, long, env = "SCANSPHERE_URL", default_value = "http://localhost:5001")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show database health
    Health,
    /// List registered users
    Users,
    /// Register a new user
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Check credentials
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Request a password reset
    ForgotPassword {
        #[arg(long)]
        email: String,
    },
    /// Create a throwaway user (development only)
    TestUser,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = ApiClient::new(&cli.url);

    let res = match cli.command {
        Commands::Health => client.health().await?,
        Commands::Users => client.list_users().await?,
        Commands::Register {
            username,
            email,
            password,
        } => {
            client
                .register(&Registration {
                    username,
                    email,
                    password,
                })
                .await?
        }
        Commands::Login { email, password } => client.login(&email, &password).await?,
        Commands::ForgotPassword { email } => client.forgot_password(&email).await?,
        Commands::TestUser => client.create_test_user().await?,
    };

    print_response(&res)?;
    if !res.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_response(res: &ApiResponse) -> Result<(), serde_json::Error> {
    if !res.is_success() {
        eprintln!("Error: API returned status {}", res.status);
    }
    println!("{}", serde_json::to_string_pretty(&res.body)?);
    Ok(())
}
