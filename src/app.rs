use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail, ensure};
use bytesize::ByteSize;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::level_filters::LevelFilter;

use crate::batch::{Batch, Job, Summary};
use crate::config::{APP_NAME, DEFAULT_CHUNK_SIZE, DEFAULT_JOBS, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE, PASSWORD_ENV, PASSWORD_MIN_LENGTH};
use crate::container::{ContainerError, ContainerReader, DecryptRequest, EncryptRequest, decrypt_file};
use crate::file;
use crate::retry::{RetryFlow, RetryOutcome};
use crate::secret::Password;
use crate::types::{ProcessorMode, VariantChoice};
use crate::ui::display;
use crate::ui::progress;
use crate::ui::prompt::{Prompt, TerminalSource};

#[derive(Args)]
pub struct EncryptArgs {
    /// Files, directories or glob patterns to encrypt.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Descend into subdirectories.
    #[arg(short, long)]
    recursive: bool,

    /// Password (prompted with confirmation when absent).
    #[arg(short, long, env = PASSWORD_ENV, hide_env_values = true)]
    password: Option<String>,

    /// Unencrypted reminder stored in the header.
    #[arg(long)]
    hint: Option<String>,

    /// Plaintext bytes per chunk, e.g. 64KiB or 4MiB.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE, value_parser = parse_chunk_size)]
    chunk_size: u32,

    /// Container variant.
    #[arg(long, value_enum, default_value_t = VariantChoice::Auto)]
    variant: VariantChoice,

    /// Give containers random names; the original name is kept inside.
    #[arg(long)]
    obscure_names: bool,

    /// Files processed at the same time.
    #[arg(short, long, default_value_t = DEFAULT_JOBS)]
    jobs: usize,

    /// Destination path (single input only).
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
pub struct DecryptArgs {
    /// Containers, directories or glob patterns to decrypt.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Descend into subdirectories.
    #[arg(short, long)]
    recursive: bool,

    /// Password (prompted when absent).
    #[arg(short, long, env = PASSWORD_ENV, hide_env_values = true)]
    password: Option<String>,

    /// Do not offer another attempt for containers that fail authentication.
    #[arg(long)]
    no_retry: bool,

    /// Files processed at the same time.
    #[arg(short, long, default_value_t = DEFAULT_JOBS)]
    jobs: usize,

    /// Destination path (single input only).
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Encrypt files into containers.
    Encrypt(EncryptArgs),

    /// Decrypt containers back into files.
    Decrypt(DecryptArgs),

    /// Show a container header without decrypting it.
    Inspect {
        /// Container to inspect.
        input: PathBuf,
    },
}

#[derive(Parser)]
#[command(name = "lockbox", version, about = "Chunked, tamper-evident AES-256-GCM file containers with optional password hints.")]
pub struct App {
    #[command(subcommand)]
    command: Commands,

    /// More log output (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

impl App {
    pub fn init() -> Result<Self> {
        let app = Self::parse();

        let level = match app.verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        };

        let subscriber = tracing_subscriber::fmt().with_file(true).with_line_number(true).with_max_level(level).with_writer(std::io::stderr).finish();
        tracing::subscriber::set_global_default(subscriber)?;

        Ok(app)
    }

    pub async fn execute(self) -> Result<()> {
        let prompt = Prompt::new(PASSWORD_MIN_LENGTH);

        match self.command {
            Commands::Encrypt(args) => Self::encrypt(args, &prompt).await,
            Commands::Decrypt(args) => Self::decrypt(args, &prompt).await,
            Commands::Inspect { input } => Self::inspect(&input),
        }
    }

    async fn encrypt(args: EncryptArgs, prompt: &Prompt) -> Result<()> {
        let files = file::resolve(&args.inputs, args.recursive, ProcessorMode::Encrypt)?;
        ensure!(args.output.is_none() || files.len() == 1, "--output needs exactly one input, got {}", files.len());

        let (password, hint) = match args.password {
            Some(password) => (Password::from_string(password), args.hint),
            None => {
                let password = prompt.encryption_password()?;
                let hint = match args.hint {
                    Some(hint) => Some(hint),
                    None => prompt.hint()?,
                };
                (password, hint)
            }
        };
        ensure!(!password.is_empty(), "password cannot be empty");

        let jobs = files
            .into_iter()
            .map(|file| {
                Job::Encrypt(EncryptRequest {
                    input: file.into_path(),
                    output: args.output.clone(),
                    variant: args.variant,
                    chunk_size: args.chunk_size,
                    hint: hint.clone(),
                    obscure_name: args.obscure_names,
                })
            })
            .collect();

        let summary = Self::run_batch(ProcessorMode::Encrypt, password, jobs, args.jobs).await?;
        Self::finish(ProcessorMode::Encrypt, &summary)
    }

    async fn decrypt(args: DecryptArgs, prompt: &Prompt) -> Result<()> {
        let files = file::resolve(&args.inputs, args.recursive, ProcessorMode::Decrypt)?;
        ensure!(args.output.is_none() || files.len() == 1, "--output needs exactly one input, got {}", files.len());

        let password = match args.password {
            Some(password) => Password::from_string(password),
            None => match prompt.decryption_password("Decryption password:")? {
                Some(password) => password,
                None => bail!("operation cancelled"),
            },
        };
        ensure!(!password.is_empty(), "password cannot be empty");

        let jobs = files.into_iter().map(|file| Job::Decrypt(DecryptRequest { input: file.into_path(), output: args.output.clone() })).collect();

        let mut summary = Self::run_batch(ProcessorMode::Decrypt, password, jobs, args.jobs).await?;

        if !args.no_retry && console::user_attended() {
            let output = args.output.clone();
            tokio::task::block_in_place(|| Self::retry_failed(&mut summary, output.as_deref(), prompt))?;
        }

        Self::finish(ProcessorMode::Decrypt, &summary)
    }

    fn inspect(input: &Path) -> Result<()> {
        let handle = fs::File::open(input).with_context(|| format!("failed to open {}", input.display()))?;
        let reader = ContainerReader::open(BufReader::new(handle)).with_context(|| format!("not a valid container: {}", input.display()))?;

        display::show_header(input, reader.header());
        Ok(())
    }

    async fn run_batch(mode: ProcessorMode, password: Password, jobs: Vec<Job>, workers: usize) -> Result<Summary> {
        let (tx, rx) = flume::unbounded();
        let renderer = tokio::spawn(progress::render(rx, mode));

        let summary = Batch::new(Arc::new(password), workers).run(jobs, Some(tx)).await;
        renderer.await.context("progress renderer stopped")?;

        Ok(summary)
    }

    /// Offers the retry flow to every item that failed authentication.
    fn retry_failed(summary: &mut Summary, output: Option<&Path>, prompt: &Prompt) -> Result<()> {
        let candidates: Vec<(usize, PathBuf)> =
            summary.failed.iter().filter(|failure| matches!(failure.error, ContainerError::AuthenticationFailed)).map(|failure| (failure.index, failure.input.clone())).collect();

        for (index, input) in candidates {
            let mut source = TerminalSource::new(prompt, &input);
            let request = DecryptRequest { input: input.clone(), output: output.map(Path::to_path_buf) };

            match RetryFlow::new(&input).resume(&mut source, |password| decrypt_file(&request, password, None))? {
                RetryOutcome::Succeeded(completed) => {
                    eprintln!("{}", display::success_line(ProcessorMode::Decrypt, &completed));
                    summary.recover(index, completed);
                }
                RetryOutcome::Fatal(err) => {
                    eprintln!("{}", display::failure_line(&input, &err.to_string()));
                    if let Some(failure) = summary.failed.iter_mut().find(|failure| failure.index == index) {
                        failure.error = err;
                    }
                }
                RetryOutcome::Cancelled | RetryOutcome::Exhausted => {}
            }
        }

        Ok(())
    }

    fn finish(mode: ProcessorMode, summary: &Summary) -> Result<()> {
        display::show_summary(mode, summary);

        if !summary.is_success() {
            bail!("{APP_NAME}: {} of {} item(s) failed", summary.failed.len(), summary.total());
        }

        Ok(())
    }
}

fn parse_chunk_size(value: &str) -> Result<u32, String> {
    let size = value.trim().parse::<ByteSize>()?.as_u64();

    if size < u64::from(MIN_CHUNK_SIZE) || size > u64::from(MAX_CHUNK_SIZE) {
        return Err(format!("chunk size must be between {} and {}", ByteSize(u64::from(MIN_CHUNK_SIZE)), ByteSize(u64::from(MAX_CHUNK_SIZE))));
    }

    u32::try_from(size).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_is_consistent() {
        App::command().debug_assert();
    }

    #[test]
    fn test_parse_chunk_size() {
        assert_eq!(parse_chunk_size("1MiB"), Ok(1024 * 1024));
        assert_eq!(parse_chunk_size("64KiB"), Ok(64 * 1024));
        assert_eq!(parse_chunk_size("4096"), Ok(4096));
        assert!(parse_chunk_size("1KiB").is_err());
        assert!(parse_chunk_size("1GiB").is_err());
        assert!(parse_chunk_size("lots").is_err());
    }

    #[test]
    fn test_encrypt_flags() {
        let app = App::try_parse_from(["lockbox", "encrypt", "a.txt", "b.txt", "--chunk-size", "2MiB", "--variant", "video", "-j", "4", "--hint", "usual"]).unwrap();

        let Commands::Encrypt(args) = app.command else { panic!("expected encrypt") };
        assert_eq!(args.inputs, vec!["a.txt", "b.txt"]);
        assert_eq!(args.chunk_size, 2 * 1024 * 1024);
        assert_eq!(args.variant, VariantChoice::Video);
        assert_eq!(args.jobs, 4);
        assert_eq!(args.hint.as_deref(), Some("usual"));
    }

    #[test]
    fn test_defaults() {
        let app = App::try_parse_from(["lockbox", "-vv", "decrypt", "x.lbx"]).unwrap();

        assert_eq!(app.verbose, 2);
        let Commands::Decrypt(args) = app.command else { panic!("expected decrypt") };
        assert_eq!(args.jobs, DEFAULT_JOBS);
        assert!(!args.no_retry);
        assert!(args.output.is_none());
    }
}
