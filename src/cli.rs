use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "reelshelf",
    about = "Index a folder of videos and serve it with metadata and thumbnails",
    long_about = None,
    version = env!("REELSHELF_VERSION"),
)]
pub struct Args {
    /// Library directory to index (overrides `library.path` in the config file)
    pub library: Option<PathBuf>,

    /// Display name of the library [default: Media Library]
    #[arg(short, long)]
    pub name: Option<String>,

    /// HTTP port to listen on [default: 6540]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind [default: 0.0.0.0]
    #[arg(long)]
    pub host: Option<String>,

    /// Path to TOML config file (overrides default search: ./reelshelf.toml, ~/.config/reelshelf/config.toml)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory for the database and thumbnails [default: data]
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Keep the library in memory instead of SQLite; nothing survives a restart
    #[arg(long)]
    pub in_memory: bool,

    /// Do not run the background metadata/thumbnail sweep after scanning
    #[arg(long)]
    pub no_background: bool,
}
