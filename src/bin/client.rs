use clap::{Parser, Subcommand};
use grpc_auth::proto::auth_client::AuthClient;
use grpc_auth::proto::{DeleteAppRequest, LoginRequest, RegisterAppRequest, RegisterRequest};
use tonic::Request;

#[derive(Parser)]
#[command(name = "client")]
#[command(about = "Command-line client for the auth server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:44044")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a user
    Register {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },

    /// Log in and print the issued token
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,

        #[arg(short, long)]
        app_id: String,
    },

    /// Register a calling application
    RegisterApp {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        secret: String,

        #[arg(long, env = "AUTH_ADMIN_KEY", hide_env_values = true)]
        admin_key: String,
    },

    /// Delete a registered application
    DeleteApp {
        #[arg(short, long)]
        app_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut client = AuthClient::connect(cli.server.clone()).await?;

    let outcome = match cli.command {
        Commands::Register { email, password } => {
            println!("Registering user '{email}'...");
            client
                .register(Request::new(RegisterRequest { email, password }))
                .await
                .map(|response| format!("User id: {}", response.into_inner().user_id))
        }

        Commands::Login {
            email,
            password,
            app_id,
        } => {
            println!("Logging in '{email}' for app {app_id}...");
            client
                .login(Request::new(LoginRequest {
                    email,
                    password,
                    app_id,
                }))
                .await
                .map(|response| format!("Token: {}", response.into_inner().token))
        }

        Commands::RegisterApp {
            name,
            secret,
            admin_key,
        } => {
            println!("Registering app '{name}'...");
            client
                .register_app(Request::new(RegisterAppRequest {
                    name,
                    secret,
                    admin_key,
                }))
                .await
                .map(|response| format!("App id: {}", response.into_inner().app_id))
        }

        Commands::DeleteApp { app_id } => {
            println!("Deleting app {app_id}...");
            client
                .delete_app(Request::new(DeleteAppRequest { app_id }))
                .await
                .map(|_| "App deleted".to_string())
        }
    };

    match outcome {
        Ok(message) => {
            println!("Success: {message}");
            Ok(())
        }
        Err(status) => {
            eprintln!("Failed ({:?}): {}", status.code(), status.message());
            std::process::exit(1);
        }
    }
}
