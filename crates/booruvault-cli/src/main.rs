//! Booruvault command line client.

mod ipc;

use anyhow::{Context, Result};
use base64::Engine;
use booruvault_common::{Post, Rating, Request, Response, ROOT_KEY};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "booruvault")]
#[command(about = "Query and edit the local booru cache", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Daemon socket, defaults to the runtime directory
    #[arg(long, global = true)]
    socket: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Cached posts
    #[command(subcommand)]
    Post(PostCommand),

    /// Cached tags
    #[command(subcommand)]
    Tag(TagCommand),

    /// Search the remote booru and cache the results
    Search {
        tags: Vec<String>,
        #[arg(short, long)]
        page: Option<u32>,
        #[arg(short, long)]
        limit: Option<u32>,
        #[arg(short, long)]
        rating: Option<Rating>,
    },

    /// Saved searches
    #[command(subcommand)]
    Saved(SavedCommand),

    /// Favorites directories
    #[command(subcommand)]
    Fav(FavCommand),

    /// Persisted settings
    #[command(subcommand)]
    Setting(SettingCommand),

    /// Most searched tags
    History {
        #[arg(short, long)]
        limit: Option<u32>,
    },

    /// Show daemon status
    Status,

    /// Check that the daemon is alive
    Ping,
}

#[derive(Subcommand, Debug)]
enum PostCommand {
    /// Show a cached post
    Get { id: i64 },
    /// Merge posts from a JSON file (one post or an array)
    Import { file: PathBuf },
    /// List favorite posts
    Favorites,
    /// List blacklisted posts
    Blacklisted,
    /// List downloaded posts
    Downloaded,
    /// List posts with a rating
    Rating { rating: Rating },
    /// Downloaded posts carrying all the given tags
    Tagged {
        #[arg(required = true)]
        tags: Vec<String>,
    },
    /// Count posts carrying a tag
    Count { tag: String },
    /// Mark or unmark a favorite
    Favorite {
        id: i64,
        #[arg(long)]
        off: bool,
    },
    /// Mark or unmark as blacklisted
    Blacklist {
        id: i64,
        #[arg(long)]
        off: bool,
    },
    /// Mark or unmark as downloaded
    Download {
        id: i64,
        #[arg(long)]
        off: bool,
    },
    /// Record a view
    View { id: i64 },
    /// Flag counts among posts carrying a tag
    Stats { tag: String },
    /// Fetch the post's tags that are not cached yet
    SyncTags { id: i64 },
}

#[derive(Subcommand, Debug)]
enum TagCommand {
    /// List cached tags
    List {
        pattern: Option<String>,
        #[arg(short, long)]
        limit: Option<u32>,
        #[arg(short, long)]
        offset: Option<u32>,
    },
    /// Check whether a tag is cached
    Exists { tag: String },
    /// Look tags up remotely (`%` is the wildcard) and cache them
    Refresh { pattern: String },
}

#[derive(Subcommand, Debug)]
enum SavedCommand {
    /// Save a search
    Create {
        #[arg(required = true)]
        tags: Vec<String>,
        #[arg(short = 'x', long = "exclude")]
        excluded: Vec<String>,
        #[arg(short, long)]
        rating: Option<Rating>,
    },
    /// List saved searches
    List,
    /// Show a saved search
    Get { id: i64 },
    /// Mark a saved search as searched now
    Touch { id: i64 },
    /// Delete a saved search
    Delete { id: i64 },
    /// Attach a preview thumbnail from an image file
    AddPreview { id: i64, file: PathBuf },
    /// Remove a preview thumbnail
    RemovePreview { id: i64, preview_id: i64 },
}

#[derive(Subcommand, Debug)]
enum FavCommand {
    /// Show the whole tree
    Tree,
    /// Show one directory
    Get { key: String },
    /// List the children of a directory
    Children {
        #[arg(default_value = ROOT_KEY)]
        key: String,
    },
    /// Create a directory
    Mkdir {
        title: String,
        #[arg(short, long, default_value = ROOT_KEY)]
        parent: String,
    },
    /// Delete a directory and everything below it
    Rmdir { key: String },
    /// Move a directory under a new parent
    Mv { key: String, new_parent: String },
    /// Add posts to a directory
    Add {
        key: String,
        #[arg(required = true)]
        post_ids: Vec<i64>,
    },
    /// Remove a post from a directory
    Remove { key: String, post_id: i64 },
    /// Move a post between directories
    MovePost {
        from: String,
        to: String,
        post_id: i64,
    },
    /// All directory keys
    Keys,
    /// All favorited post ids
    Ids,
    /// Tag counts across favorited posts
    Tags,
}

#[derive(Subcommand, Debug)]
enum SettingCommand {
    /// Show one setting, or all of them
    Get { key: Option<String> },
    /// Set a setting; values that are not JSON are stored as strings
    Set { key: String, value: String },
    /// Delete a setting
    Delete { key: String },
}

fn flag_value(off: bool) -> bool {
    !off
}

fn read_posts(file: &PathBuf) -> Result<Vec<Post>> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", file.display()))?;
    let posts = if value.is_array() {
        serde_json::from_value(value)?
    } else {
        vec![serde_json::from_value(value)?]
    };
    Ok(posts)
}

fn parse_setting_value(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

impl Commands {
    /// The request this command sends to the daemon.
    fn into_request(self) -> Result<Request> {
        let request = match self {
            Commands::Post(command) => match command {
                PostCommand::Get { id } => Request::GetPost { id },
                PostCommand::Import { file } => Request::UpsertPosts {
                    posts: read_posts(&file)?,
                },
                PostCommand::Favorites => Request::GetFavoritePosts,
                PostCommand::Blacklisted => Request::GetBlacklistedPosts,
                PostCommand::Downloaded => Request::GetDownloadedPosts,
                PostCommand::Rating { rating } => Request::GetPostsByRating { rating },
                PostCommand::Tagged { tags } => Request::GetPostsByTags { tags },
                PostCommand::Count { tag } => Request::CountPostsByTag { tag },
                PostCommand::Favorite { id, off } => Request::SetFavorite {
                    id,
                    value: flag_value(off),
                },
                PostCommand::Blacklist { id, off } => Request::SetBlacklisted {
                    id,
                    value: flag_value(off),
                },
                PostCommand::Download { id, off } => Request::SetDownloaded {
                    id,
                    value: flag_value(off),
                },
                PostCommand::View { id } => Request::IncrementViewCount { id },
                PostCommand::Stats { tag } => Request::GetTagStatistics { tag },
                PostCommand::SyncTags { id } => Request::SyncPostTags { id },
            },

            Commands::Tag(command) => match command {
                TagCommand::List {
                    pattern,
                    limit,
                    offset,
                } => Request::GetTags {
                    pattern,
                    limit,
                    offset,
                },
                TagCommand::Exists { tag } => Request::TagExists { tag },
                TagCommand::Refresh { pattern } => Request::RefreshTags { pattern },
            },

            Commands::Search {
                tags,
                page,
                limit,
                rating,
            } => Request::SearchRemote {
                tags,
                page,
                limit,
                rating,
            },

            Commands::Saved(command) => match command {
                SavedCommand::Create {
                    tags,
                    excluded,
                    rating,
                } => Request::CreateSavedSearch {
                    tags,
                    excluded_tags: excluded,
                    rating,
                },
                SavedCommand::List => Request::GetSavedSearches,
                SavedCommand::Get { id } => Request::GetSavedSearch { id },
                SavedCommand::Touch { id } => Request::TouchSavedSearch { id },
                SavedCommand::Delete { id } => Request::DeleteSavedSearch { id },
                SavedCommand::AddPreview { id, file } => {
                    let bytes = std::fs::read(&file)
                        .with_context(|| format!("Failed to read {}", file.display()))?;
                    Request::AddSavedSearchPreview {
                        id,
                        thumbnail: base64::engine::general_purpose::STANDARD.encode(bytes),
                    }
                }
                SavedCommand::RemovePreview { id, preview_id } => {
                    Request::RemoveSavedSearchPreview { id, preview_id }
                }
            },

            Commands::Fav(command) => match command {
                FavCommand::Tree => Request::GetFavoritesTree,
                FavCommand::Get { key } => Request::GetFavoritesNode { key },
                FavCommand::Children { key } => Request::GetFavoritesChildren { key },
                FavCommand::Mkdir { title, parent } => Request::AddFavoritesNode {
                    parent_key: parent,
                    title,
                },
                FavCommand::Rmdir { key } => Request::DeleteFavoritesNode { key },
                FavCommand::Mv { key, new_parent } => Request::MoveFavoritesNode {
                    key,
                    new_parent_key: new_parent,
                },
                FavCommand::Add { key, mut post_ids } => {
                    if post_ids.len() == 1 {
                        Request::AddPostToNode {
                            key,
                            post_id: post_ids.remove(0),
                        }
                    } else {
                        Request::AddPostsToNode { key, post_ids }
                    }
                }
                FavCommand::Remove { key, post_id } => Request::RemovePostFromNode { key, post_id },
                FavCommand::MovePost { from, to, post_id } => Request::MovePost {
                    from_key: from,
                    to_key: to,
                    post_id,
                },
                FavCommand::Keys => Request::GetFavoritesKeys,
                FavCommand::Ids => Request::GetFavoritePostIds,
                FavCommand::Tags => Request::GetFavoriteTags,
            },

            Commands::Setting(command) => match command {
                SettingCommand::Get { key: Some(key) } => Request::GetSetting { key },
                SettingCommand::Get { key: None } => Request::GetSettings,
                SettingCommand::Set { key, value } => Request::SetSetting {
                    key,
                    value: parse_setting_value(&value),
                },
                SettingCommand::Delete { key } => Request::DeleteSetting { key },
            },

            Commands::History { limit } => Request::GetMostSearchedTags { limit },
            Commands::Status => Request::GetStatus,
            Commands::Ping => Request::Ping,
        };
        Ok(request)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("booruvault=warn".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut client = match &cli.socket {
        Some(path) => ipc::IpcClient::connect_to(path)?,
        None => ipc::IpcClient::connect()?,
    };

    if matches!(cli.command, Commands::Ping) {
        client.ping()?;
        println!("pong");
        return Ok(());
    }

    let request = cli.command.into_request()?;
    match client.call(&request)? {
        Response::Ok => println!("ok"),
        response => println!("{}", serde_json::to_string_pretty(&response)?),
    }

    Ok(())
}
