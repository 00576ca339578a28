use clap::Parser;
use maildex::config::AppConfig;
use std::path::PathBuf;

/// Email archive server: ingests raw messages on first launch, threads them,
/// and serves hybrid lexical and semantic search over the committed corpus.
#[derive(Parser, Debug)]
#[command(name = "maildex", version, about)]
struct Args {
    /// Directory of .eml files to ingest when the store is absent.
    #[arg(long)]
    mail_dir: Option<PathBuf>,

    /// Path of the SQLite store file.
    #[arg(long)]
    db_path: Option<PathBuf>,
}

#[rocket::main]
async fn main() -> Result<(), rocket::Error> {
    let args = Args::parse();

    let mut config = AppConfig::from_env();
    if let Some(mail_dir) = args.mail_dir {
        config.mail_dir = mail_dir;
    }
    if let Some(db_path) = args.db_path {
        config.db_path = db_path;
    }

    let _ = maildex::rocket(config).launch().await?;
    Ok(())
}
