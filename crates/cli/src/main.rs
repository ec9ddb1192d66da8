use std::path::PathBuf;

use anyhow::{bail, Context};
use bookstore_app::modules::books::{files, models::NewBook, store};
use bookstore_authz::users::{
    self, validate_optional_email, validate_username, NewUser, USERNAME_MAX_LEN,
};
use bookstore_kernel::settings::Settings;
use clap::{Parser, Subcommand};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use validator::Validate;

/// Administrative tasks for the bookstore service
#[derive(Debug, Parser)]
#[command(name = "bookstore-cli", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending database migrations
    Migrate,

    /// Create a user account
    CreateUser {
        #[arg(long)]
        username: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, env = "BOOKSTORE_CLI_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Add a book to the catalog, optionally with an uploaded file
    AddBook {
        #[arg(long)]
        title: String,
        #[arg(long)]
        author: String,
        #[arg(long, default_value = "")]
        description: String,
        /// RFC 3339 timestamp; defaults to now
        #[arg(long)]
        publish_date: Option<String>,
        /// Local file copied into the media directory
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Print the catalog with review counts
    ListBooks,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Migrate => "migrate",
            Command::CreateUser { .. } => "create-user",
            Command::AddBook { .. } => "add-book",
            Command::ListBooks => "list-books",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().context("failed to load bookstore settings")?;
    bookstore_telemetry::init(&settings.telemetry);

    let prepared = bookstore_app::prepare(settings).await?;
    let state = &prepared.state;

    let command = cli.command.name();
    tracing::info!(command, "running admin command");

    match cli.command {
        Command::Migrate => {
            println!("database is up to date");
        }
        Command::CreateUser {
            username,
            email,
            password,
        } => {
            if username.is_empty() || username.chars().count() > USERNAME_MAX_LEN {
                bail!("username must be between 1 and {USERNAME_MAX_LEN} characters");
            }
            validate_username(&username).map_err(|err| anyhow::anyhow!("{err}"))?;
            validate_optional_email(&email).map_err(|err| anyhow::anyhow!("{err}"))?;
            if password.is_empty() {
                bail!("password may not be blank");
            }

            let user = users::create_user(
                &state.db,
                NewUser {
                    username,
                    email,
                    password,
                },
            )
            .await?;
            println!("created user {} ({})", user.id, user.username);
        }
        Command::AddBook {
            title,
            author,
            description,
            publish_date,
            file,
        } => {
            let publish_date = match publish_date {
                Some(raw) => OffsetDateTime::parse(&raw, &Rfc3339)
                    .with_context(|| format!("invalid publish date '{raw}'"))?,
                None => OffsetDateTime::now_utc(),
            };

            let mut new_book = NewBook {
                title,
                author,
                description,
                file: None,
                publish_date,
            };
            new_book.validate().context("invalid book")?;

            if let Some(path) = file {
                let stored =
                    files::store_book_file(&path, &state.settings.books, &state.settings.media)
                        .await?;
                new_book.file = Some(stored);
            }

            let book = store::create_book(&state.db, &new_book).await?;
            println!("created book {} ({})", book.id, book.title);
        }
        Command::ListBooks => {
            let mut reviews = store::reviews_by_book(&state.db).await?;
            for book in store::list_books(&state.db).await? {
                let count = reviews.remove(&book.id).map_or(0, |r| r.len());
                println!(
                    "{}\t{}\t{}\t{} review(s)",
                    book.id, book.title, book.author, count
                );
            }
        }
    }

    state.db.close().await;
    tracing::info!(command, "admin command finished");
    Ok(())
}
