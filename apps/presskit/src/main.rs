use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    bootstrap::{login_error_message, AdminTokens},
    editor::{FieldEditor, SaveError, SaveOutcome},
    pages::{
        DashboardSection, DashboardShell, EntryValue, LandingPage, PressKitPage, PressKitView,
        SettingsPage, GRAYSCALE_SWATCHES, HEADER_PRINCIPAL_LEN, MEDIA_ARCHIVE_PATH, SCREENSHOTS,
    },
    theme::ThemeStore,
    AdminBootstrap, AdminScreen, ContentAccessor, EditMode, HttpBackend, HttpIdentityProvider,
    IdentityProvider, PressKitBackend, UnavailableBackend,
};
use secrecy::SecretString;
use shared::domain::ContentField;
use tracing::info;
use url::Url;

const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8787";

#[derive(Parser, Debug)]
#[command(name = "presskit", about = "Press kit site client")]
struct Args {
    /// Base URL of the press kit server. Without it every read fails.
    #[arg(long, env = "PRESSKIT_SERVER_URL")]
    server_url: Option<Url>,
    /// Username presented to the development identity route.
    #[arg(long, env = "PRESSKIT_USERNAME")]
    username: Option<String>,
    /// Overrides the default theme preference file.
    #[arg(long)]
    theme_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Title, tagline and blurb shown on the landing page.
    Landing,
    /// The full press kit, unlocking it first when protected.
    PressKit {
        #[arg(long)]
        password: Option<String>,
        /// Render as the admin sees it while editing.
        #[arg(long)]
        edit: bool,
    },
    /// Sign in and run the admin bootstrap.
    Admin {
        #[arg(long, env = "PRESSKIT_ADMIN_TOKEN", default_value = "")]
        admin_token: String,
        #[arg(long, default_value = "")]
        user_token: String,
        /// Dashboard section to show once signed in as admin.
        #[arg(long, default_value = "content")]
        section: DashboardSection,
    },
    /// Clear the admin slot and claim it again.
    ResetAdmin {
        #[arg(long, env = "PRESSKIT_RECOVERY_TOKEN")]
        recovery_token: Option<String>,
    },
    /// Replace one text field or game detail.
    Edit { field: String, value: String },
    /// Show the features list, or replace it when items are given.
    Features { items: Vec<String> },
    #[command(subcommand)]
    Password(PasswordCommand),
    /// Show the body text color, or set it from a swatch name or hex value.
    Color { choice: Option<String> },
    /// Show the stored theme, or flip it.
    Theme {
        #[arg(long)]
        toggle: bool,
    },
    /// Show the caller's profile, or save a display name.
    Profile {
        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum PasswordCommand {
    Status,
    Enable { password: String, confirm: String },
    Disable,
    Update { password: String },
}

struct Session {
    identity: Arc<HttpIdentityProvider>,
    accessor: Arc<ContentAccessor>,
}

impl Session {
    fn connect(args: &Args) -> Result<Self> {
        let base_url = match &args.server_url {
            Some(url) => url.clone(),
            None => Url::parse(DEFAULT_SERVER_URL)?,
        };
        let identity = Arc::new(HttpIdentityProvider::new(
            base_url.clone(),
            args.username.clone(),
        ));
        let backend: Arc<dyn PressKitBackend> = match &args.server_url {
            Some(url) => Arc::new(HttpBackend::new(url.clone(), identity.clone())),
            None => Arc::new(UnavailableBackend),
        };
        Ok(Self {
            identity,
            accessor: Arc::new(ContentAccessor::new(backend)),
        })
    }

    async fn sign_in(&self) -> Result<()> {
        match self.identity.login().await {
            Ok(identity) => {
                info!(principal = %identity.principal, "presskit: signed in");
                Ok(())
            }
            Err(error) => {
                let message = login_error_message(&error);
                Err(anyhow::Error::new(error).context(message))
            }
        }
    }

    async fn require_admin(&self) -> Result<()> {
        self.sign_in().await?;
        if !self.accessor.is_caller_admin().await? {
            bail!("Access denied. Only the admin can edit content.");
        }
        Ok(())
    }
}

fn print_admin_screen(screen: &AdminScreen) {
    match screen {
        AdminScreen::Checking(reason) => println!("{}", reason.message()),
        AdminScreen::SignIn { login_error, .. } => {
            println!("Sign in to manage the press kit.");
            if let Some(error) = login_error {
                println!("{error}");
            }
        }
        AdminScreen::Unavailable { message } => println!("Admin unavailable: {message}"),
        AdminScreen::ClaimFailed { message, notice } => {
            println!("Admin setup failed: {message}");
            if let Some(notice) = notice {
                println!("{notice}");
            }
            println!("Run `presskit reset-admin` to reset admin access.");
        }
        AdminScreen::Denied { notice } => {
            println!("{}", client_core::bootstrap::ACCESS_DENIED_MESSAGE);
            if let Some(notice) = notice {
                println!("{notice}");
            }
            println!("Run `presskit reset-admin` to reset admin access.");
        }
        AdminScreen::Dashboard { principal } => {
            println!("Admin dashboard ({})", principal.abbreviated(HEADER_PRINCIPAL_LEN));
        }
    }
}

async fn print_dashboard(shell: &DashboardShell, accessor: &ContentAccessor) -> Result<()> {
    for section in DashboardSection::ALL {
        let marker = if section == shell.active { '>' } else { ' ' };
        println!("{marker} {section}");
    }
    println!();
    let entries = shell.load_section(accessor).await?;
    if entries.is_empty() {
        println!("Screenshots: {}", SCREENSHOTS.join(", "));
        println!("Media archive: {MEDIA_ARCHIVE_PATH}");
    }
    for entry in entries {
        match entry.value {
            EntryValue::Text(value) => println!("{}: {value}", entry.field.label()),
            EntryValue::List(items) => {
                println!("{}:", entry.field.label());
                for item in items {
                    println!("  * {item}");
                }
            }
        }
    }
    Ok(())
}

fn print_save(result: Result<SaveOutcome, SaveError>) -> Result<()> {
    match result {
        Ok(SaveOutcome::Saved) => {
            println!("Saved.");
            Ok(())
        }
        Ok(SaveOutcome::Unchanged) => {
            println!("No changes to save.");
            Ok(())
        }
        Err(error) => Err(error.into()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let session = Session::connect(&args)?;
    let theme_store = match &args.theme_file {
        Some(path) => ThemeStore::new(path.clone()),
        None => ThemeStore::default_location()
            .context("no config directory for the theme preference; pass --theme-file")?,
    };

    match args.command {
        Command::Landing => {
            let page = LandingPage::load(&session.accessor).await?;
            println!("{}", page.title);
            if !page.tagline.is_empty() {
                println!("{}", page.tagline);
            }
            println!();
            println!("{}", page.blurb);
        }
        Command::PressKit { password, edit } => {
            let edit_mode = EditMode::new();
            if edit {
                session.sign_in().await?;
                edit_mode.toggle(session.accessor.is_caller_admin().await?)?;
            }
            let page = PressKitPage::new(session.accessor.clone(), edit_mode);
            let theme = theme_store.load();
            let view = match password {
                Some(password) => page.unlock(&SecretString::from(password), theme).await?,
                None => page.view(theme).await?,
            };
            match view {
                PressKitView::Locked { error } => {
                    println!("This press kit is password protected. Pass --password.");
                    if let Some(error) = error {
                        println!("{error}");
                    }
                }
                PressKitView::Content(content) => {
                    println!("{}", content.title);
                    if !content.tagline.is_empty() {
                        println!("{}", content.tagline);
                    }
                    println!();
                    println!("{}", content.about);
                    println!();
                    for feature in &content.features {
                        println!("* {feature}");
                    }
                    println!("{}", serde_json::to_string_pretty(&content.details)?);
                    if content.show_social {
                        println!("Instagram: {}", content.instagram_link);
                        println!("Developer: {}", content.developer_link);
                        println!("Press: {}", content.press_email);
                    }
                    println!("Trailer: {}", client_core::pages::trailer_embed_url());
                    println!("Screenshots: {}", SCREENSHOTS.join(", "));
                    println!("Media archive: {MEDIA_ARCHIVE_PATH}");
                    if let Some(color) = content.body_text_color {
                        println!("Body text color: {color}");
                    }
                }
            }
        }
        Command::Admin {
            admin_token,
            user_token,
            section,
        } => {
            let bootstrap = AdminBootstrap::with_tokens(
                session.accessor.clone(),
                session.identity.clone(),
                AdminTokens {
                    admin_token,
                    user_provided_token: user_token,
                },
            );
            let screen = match bootstrap.refresh().await {
                AdminScreen::SignIn { .. } => bootstrap.sign_in().await,
                screen => screen,
            };
            print_admin_screen(&screen);
            if let AdminScreen::Dashboard { principal } = screen {
                let mut shell = DashboardShell::new(principal);
                shell.select(section);
                print_dashboard(&shell, &session.accessor).await?;
            }
        }
        Command::ResetAdmin { recovery_token } => {
            session.sign_in().await?;
            let bootstrap = AdminBootstrap::new(session.accessor.clone(), session.identity.clone());
            bootstrap.refresh().await;
            let screen = bootstrap
                .reset_and_reclaim(recovery_token.as_deref())
                .await?;
            print_admin_screen(&screen);
        }
        Command::Edit { field, value } => {
            session.require_admin().await?;
            let page = PressKitPage::new(session.accessor.clone(), EditMode::new());
            match field.parse::<ContentField>()? {
                ContentField::Text(field) => {
                    let mut editor: FieldEditor = page.text_editor(field).await?;
                    editor.set_value(value);
                    print_save(page.save_text(field, &mut editor).await)?;
                }
                ContentField::Detail(field) => {
                    let mut editor = page.detail_editor(field).await?;
                    editor.set_value(value);
                    print_save(page.save_detail(field, &mut editor).await)?;
                }
                ContentField::Features => {
                    bail!("use `presskit features <items>...` to edit the features list")
                }
            }
        }
        Command::Features { items } => {
            if items.is_empty() {
                for feature in session.accessor.features().await? {
                    println!("* {feature}");
                }
            } else {
                session.require_admin().await?;
                let page = PressKitPage::new(session.accessor.clone(), EditMode::new());
                let mut editor = page.features_editor().await?;
                while editor.items().len() > items.len() {
                    editor.remove(editor.items().len() - 1);
                }
                for (index, item) in items.into_iter().enumerate() {
                    if index >= editor.items().len() && !editor.add() {
                        bail!("a press kit lists at most {} features", shared::domain::MAX_FEATURES);
                    }
                    editor.change(index, item);
                }
                print_save(page.save_features(&mut editor).await)?;
            }
        }
        Command::Password(command) => {
            session.sign_in().await?;
            let settings = SettingsPage::new(session.accessor.clone());
            match command {
                PasswordCommand::Status => {
                    let enabled = settings.protection_enabled().await?;
                    println!(
                        "Password protection is {}.",
                        if enabled { "enabled" } else { "disabled" }
                    );
                }
                PasswordCommand::Enable { password, confirm } => {
                    settings
                        .enable_protection(
                            &SecretString::from(password),
                            &SecretString::from(confirm),
                        )
                        .await?;
                    println!("Password protection enabled.");
                }
                PasswordCommand::Disable => {
                    settings.disable_protection().await?;
                    println!("Password protection disabled.");
                }
                PasswordCommand::Update { password } => {
                    settings
                        .update_password(&SecretString::from(password))
                        .await?;
                    println!("Password updated.");
                }
            }
        }
        Command::Color { choice } => {
            let settings = SettingsPage::new(session.accessor.clone());
            match choice {
                None => {
                    println!("{}", settings.body_text_color().await?);
                    for swatch in GRAYSCALE_SWATCHES {
                        println!("  {:<12} {}", swatch.name, swatch.hex);
                    }
                }
                Some(choice) => {
                    session.sign_in().await?;
                    let hex = settings.set_body_text_color(&choice).await?;
                    println!("Body text color set to {hex}.");
                }
            }
        }
        Command::Theme { toggle } => {
            let theme = if toggle {
                theme_store.toggle()?
            } else {
                theme_store.load()
            };
            println!("{}", theme.as_str());
        }
        Command::Profile { name } => {
            session.sign_in().await?;
            match name {
                Some(name) => {
                    session
                        .accessor
                        .save_caller_user_profile(&name)
                        .await
                        .map_err(client_core::ClientError::from_backend)?;
                    println!("Profile saved.");
                }
                None => match session.accessor.caller_profile().await? {
                    Some(profile) => println!("{}", profile.name),
                    None => println!("No profile saved yet."),
                },
            }
        }
    }

    Ok(())
}
