use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "pixlink")]
#[command(about = "Share, tag, discuss and generate images from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Local database file (local mode only)
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Directory for stored objects (local mode only)
    #[arg(long, global = true, value_name = "PATH")]
    pub storage_dir: Option<PathBuf>,

    /// CLI profile name
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign up, sign in and manage the stored session
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Browse the ranked gallery
    Gallery {
        /// Filter by title, description or tag (a leading # is ignored)
        #[arg(short, long)]
        search: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Keep running and reprint when images change
        #[arg(long)]
        watch: bool,
    },
    /// Work with a single image
    Image {
        #[command(subcommand)]
        command: ImageCommands,
    },
    /// Upload an image file with tags
    Upload {
        /// Image file
        file: PathBuf,
        /// Tag to attach; repeat for more
        #[arg(short, long = "tag", value_name = "TAG", required = true)]
        tags: Vec<String>,
    },
    /// Generate an image from a prompt
    Generate {
        /// Prompt text
        prompt: Vec<String>,
        /// Publish the result to the gallery
        #[arg(long)]
        publish: bool,
        /// Save the result into this directory
        #[arg(long, value_name = "DIR")]
        save: Option<PathBuf>,
    },
    /// Direct messages
    Chat {
        #[command(subcommand)]
        command: ChatCommands,
    },
    /// Show or edit your profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Show or choose the interface language
    Language {
        #[command(subcommand)]
        command: LanguageCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Create an account
    SignUp {
        #[arg(long, value_name = "EMAIL")]
        email: String,
        #[arg(long, value_name = "PASSWORD")]
        password: String,
        #[arg(long, value_name = "NAME")]
        username: String,
        #[arg(long, value_name = "NAME", default_value = "")]
        full_name: String,
    },
    /// Sign in with email and password
    Login {
        #[arg(long, value_name = "EMAIL")]
        email: String,
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Print the URL that starts a provider sign-in
    Oauth {
        /// google or github
        provider: String,
        /// Where the provider sends the browser afterwards
        #[arg(long, value_name = "URL")]
        redirect_to: Option<String>,
    },
    /// Finish a provider sign-in from the redirect URL
    Complete {
        /// Full URL the browser was redirected to
        redirect_url: String,
    },
    /// Show who is signed in
    Status,
    /// Exchange the refresh token for a new session
    Refresh,
    /// Sign out and clear the stored session
    Logout,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update a profile
    Init {
        /// Supabase project URL
        #[arg(long, value_name = "URL")]
        supabase_url: Option<String>,
        /// Supabase anon/public key
        #[arg(long, value_name = "KEY")]
        supabase_anon_key: Option<String>,
        /// Storage bucket for images and avatars
        #[arg(long, value_name = "NAME")]
        image_bucket: Option<String>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Print the resolved configuration
    Show,
}

#[derive(Subcommand)]
pub enum ImageCommands {
    /// Show likes, tags and optionally comments
    Show {
        id: String,
        /// Include comments
        #[arg(long)]
        comments: bool,
        /// Keep running and reprint on like or comment changes
        #[arg(long)]
        watch: bool,
    },
    /// Like or unlike
    Like { id: String },
    /// Post a comment
    Comment { id: String, text: Vec<String> },
    /// Delete one of your comments
    Uncomment { id: String, comment_id: String },
    /// Delete one of your images
    Delete { id: String },
    /// Save the image file locally
    Download {
        id: String,
        /// Target directory (current directory when omitted)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ChatCommands {
    /// List conversations
    List {
        /// Filter by partner name
        #[arg(short, long)]
        search: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start or reopen a conversation with a user id
    Start { user_id: String },
    /// Print a conversation
    Open {
        chat_id: String,
        /// Keep running and print new messages
        #[arg(long)]
        watch: bool,
    },
    /// Send a message
    Send { chat_id: String, text: Vec<String> },
}

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// Show your profile, creating it on first use
    Show,
    /// Change username and full name
    Edit {
        #[arg(long)]
        username: String,
        #[arg(long, default_value = "")]
        full_name: String,
    },
    /// Upload a new avatar
    Avatar { file: PathBuf },
}

#[derive(Subcommand)]
pub enum LanguageCommands {
    /// Print the active language
    Show,
    /// Save a language preference (uz, ru or en)
    Set { code: String },
}
