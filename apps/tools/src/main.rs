use anyhow::Result;
use clap::{Parser, Subcommand};
use shared::domain::TextField;
use storage::Storage;

/// Operator maintenance against the server database, bypassing the API.
#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, env = "PRESSKIT_DATABASE_URL", default_value = "sqlite://./data/presskit.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    ShowAdmin,
    /// Empties the admin slot so the next signed-in visitor claims it.
    ClearAdmin,
    SetText {
        field: TextField,
        value: String,
    },
    PasswordStatus,
    /// Turns press kit password protection off.
    ClearPassword,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::ShowAdmin => match storage.admin_slot().await? {
            Some(slot) => println!(
                "admin principal={} claimed_at={}",
                slot.principal,
                slot.claimed_at.to_rfc3339()
            ),
            None => println!("no admin claimed"),
        },
        Command::ClearAdmin => match storage.clear_admin().await? {
            Some(previous) => println!("cleared admin principal={previous}"),
            None => println!("admin slot already empty"),
        },
        Command::SetText { field, value } => {
            storage.set_text_field(field, &value).await?;
            println!("updated {field}");
        }
        Command::PasswordStatus => {
            let enabled = storage.password_credential().await?.is_some();
            println!("password protection enabled={enabled}");
        }
        Command::ClearPassword => {
            let removed = storage.clear_password_credential().await?;
            println!("password protection cleared={removed}");
        }
    }

    Ok(())
}
