use anyhow::Result;
use bitclone::areas::repository::Repository;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "bitclone",
    version,
    author = "Sami Barbut-Dica",
    about = "A git object store and smart HTTP clone client",
    long_about = "This is a small implementation of git, written in Rust. \
    It stores and reads loose objects, snapshots directories as trees, writes commits \
    and clones repositories over the smart HTTP protocol.",
    help_template = r"
{name} {version} - {about}

USAGE:
    {usage}

OPTIONS:
    {all-args}
",
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(
        name = "init",
        about = "Initialize a new repository",
        long_about = "This command initializes a new repository in the current directory or at the specified path."
    )]
    Init {
        #[arg(index = 1, help = "The path to the repository")]
        path: Option<PathBuf>,
    },
    #[command(
        name = "cat-file",
        about = "Print the content of an object",
        long_about = "This command prints the payload of an object in the repository. \
        It requires the SHA of the object to be specified."
    )]
    CatFile {
        #[arg(short = 'p', long, help = "The object SHA to print")]
        sha: String,
    },
    #[command(
        name = "hash-object",
        about = "Hash a file as a blob and optionally write it to the object database",
        long_about = "This command hashes a file as a blob object and can write it to the object database. \
        It requires the path to the file to be specified."
    )]
    HashObject {
        #[arg(short, long, required = false, help = "Write the object to the object database")]
        write: bool,
        #[arg(index = 1)]
        file: String,
    },
    #[command(
        name = "ls-tree",
        about = "List the contents of a tree object",
        long_about = "This command lists the entries of a tree object, or of the root tree of a commit."
    )]
    LsTree {
        #[arg(long, help = "List only the entry names")]
        name_only: bool,
        #[arg(index = 1, help = "The tree or commit SHA, or HEAD")]
        sha: String,
    },
    #[command(
        name = "write-tree",
        about = "Write the working directory as a tree object",
        long_about = "This command snapshots the working directory (without .git) into tree and blob objects \
        and prints the SHA of the root tree."
    )]
    WriteTree,
    #[command(
        name = "commit-tree",
        about = "Create a commit object from a tree",
        long_about = "This command writes a commit pointing at the given tree, with an optional parent, \
        and prints its SHA. The identity is read from GIT_AUTHOR_* and GIT_COMMITTER_*."
    )]
    CommitTree {
        #[arg(index = 1, help = "The tree SHA")]
        tree: String,
        #[arg(short, long, help = "The parent commit SHA")]
        parent: Option<String>,
        #[arg(short, long, help = "The commit message")]
        message: String,
    },
    #[command(
        name = "clone",
        about = "Clone a repository over smart HTTP",
        long_about = "This command fetches the default branch of a remote repository over the smart HTTP \
        protocol and checks it out into a new directory."
    )]
    Clone {
        #[arg(index = 1, help = "The URL of the remote repository")]
        url: String,
        #[arg(index = 2, help = "The directory to clone into")]
        directory: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bitclone=warn")),
        )
        .init();

    let cli = Cli::parse();
    let pwd = std::env::current_dir()?;

    match &cli.command {
        Commands::Init { path } => {
            let repository = open(path.as_deref().unwrap_or(&pwd))?;
            repository.init()?
        }
        Commands::CatFile { sha } => open(&pwd)?.cat_file(sha)?,
        Commands::HashObject { write, file } => open(&pwd)?.hash_object(file, *write)?,
        Commands::LsTree { name_only, sha } => open(&pwd)?.ls_tree(sha, *name_only)?,
        Commands::WriteTree => open(&pwd)?.write_tree()?,
        Commands::CommitTree {
            tree,
            parent,
            message,
        } => open(&pwd)?.commit_tree(tree, parent.as_deref(), message)?,
        Commands::Clone { url, directory } => {
            let destination = match directory {
                Some(directory) => pwd.join(directory),
                None => pwd.join(directory_from_url(url)?),
            };
            let repository = open(&destination)?;
            repository.clone(url).await?
        }
    }

    Ok(())
}

fn open(path: &Path) -> Result<Repository> {
    Ok(Repository::new(path, Box::new(std::io::stdout()))?)
}

/// `https://host/owner/name.git/` clones into `name`
fn directory_from_url(url: &str) -> Result<String> {
    let name = url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .map(|segment| segment.trim_end_matches(".git"))
        .filter(|segment| !matches!(*segment, "" | "." | "..") && !segment.contains(':'))
        .ok_or_else(|| anyhow::anyhow!("Cannot derive a directory name from {url}"))?;

    Ok(name.to_string())
}
