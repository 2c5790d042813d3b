use std::fs;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::container::{ContainerError, ContainerReader, ContainerWriter, EncryptOptions};
use crate::file::{self, Staged};
use crate::header::Header;
use crate::secret::Password;
use crate::types::{Progress, Variant, VariantChoice};

/// One file to encrypt.
#[derive(Debug, Clone)]
pub struct EncryptRequest {
    pub input: PathBuf,
    /// Explicit destination; computed from the input when absent.
    pub output: Option<PathBuf>,
    pub variant: VariantChoice,
    pub chunk_size: u32,
    pub hint: Option<String>,
    /// Give the container a random name. The original name is kept inside
    /// the header, which forces the generic-file variant.
    pub obscure_name: bool,
}

/// One container to decrypt.
#[derive(Debug, Clone)]
pub struct DecryptRequest {
    pub input: PathBuf,
    /// Explicit destination; otherwise the stored name or the container name
    /// without its extension.
    pub output: Option<PathBuf>,
}

/// Result of a successful file-level operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completed {
    pub input: PathBuf,
    pub output: PathBuf,
    pub variant: Variant,
    /// Plaintext bytes processed.
    pub bytes: u64,
}

/// Encrypts one file into a new container next to it (or at the requested
/// destination).
///
/// The container is staged in a temporary file in the destination directory
/// and only renamed into place, without replacing anything, after it has been
/// fully written and synced.
///
/// # Errors
/// [`ContainerError::DestinationExists`] if the destination is taken, plus
/// any parameter or I/O failure. The existing file is never touched.
pub fn encrypt_file(request: &EncryptRequest, password: &Password, progress: Option<&dyn Progress>) -> Result<Completed, ContainerError> {
    let variant = match (request.obscure_name, request.variant) {
        (true, VariantChoice::Video) => return Err(ContainerError::InvalidParameter("obscured names need the generic-file variant".into())),
        (true, _) => Variant::File,
        (false, choice) => choice.resolve(&request.input),
    };

    let metadata = fs::metadata(&request.input)?;
    if !metadata.is_file() {
        return Err(ContainerError::InvalidParameter(format!("not a regular file: {}", request.input.display())));
    }

    let destination = match &request.output {
        Some(output) => output.clone(),
        None => file::encrypted_path(&request.input, variant, request.obscure_name),
    };
    ensure_vacant(&destination)?;

    let original_name = request.input.file_name().map(|name| name.to_string_lossy().into_owned());
    let options = EncryptOptions { chunk_size: request.chunk_size, variant, original_name: original_name.as_deref(), hint: request.hint.as_deref() };

    // Unbuffered: chunk plaintext only ever lives in `Protected` buffers.
    let mut input = fs::File::open(&request.input)?;
    let mut staged = Staged::create(&destination)?;

    let header = ContainerWriter::new(password, options).encrypt(&mut input, staged.file_mut(), progress)?;
    staged.file_mut().flush()?;

    let output = staged.commit()?;
    info!(input = %request.input.display(), output = %output.display(), variant = %variant, "encrypted");

    Ok(Completed { input: request.input.clone(), output, variant, bytes: header.original_length() })
}

/// Decrypts one container into a new plaintext file.
///
/// Nothing is left at the destination unless every chunk verified.
///
/// # Errors
/// [`ContainerError::AuthenticationFailed`] for a wrong password or corrupted
/// data, [`ContainerError::Malformed`] for a structurally invalid container,
/// [`ContainerError::DestinationExists`] if the destination is taken.
pub fn decrypt_file(request: &DecryptRequest, password: &Password, progress: Option<&dyn Progress>) -> Result<Completed, ContainerError> {
    let mut reader = ContainerReader::open(fs::File::open(&request.input)?)?;

    let destination = match &request.output {
        Some(output) => output.clone(),
        None => file::decrypted_path(&request.input, reader.header().original_name()),
    };
    ensure_vacant(&destination)?;

    let mut staged = Staged::create(&destination)?;

    reader.decrypt_to(staged.file_mut(), password, progress)?;
    staged.file_mut().flush()?;

    let output = staged.commit()?;
    let header = reader.header();
    info!(input = %request.input.display(), output = %output.display(), variant = %header.variant(), "decrypted");

    Ok(Completed { input: request.input.clone(), output, variant: header.variant(), bytes: header.original_length() })
}

/// Reads the stored hint without a password.
///
/// Returns `None` when the container carries no hint. Only the header is
/// read, so this works on containers whose body is damaged.
pub fn try_read_hint(path: &Path) -> Result<Option<String>, ContainerError> {
    let header = read_header(path)?;
    debug!(path = %path.display(), present = header.raw_hint().is_some(), "read hint");
    Ok(header.hint())
}

/// Parses just the header of a container file.
pub fn read_header(path: &Path) -> Result<Header, ContainerError> {
    let mut input = BufReader::new(fs::File::open(path)?);
    Header::read_from(&mut input)
}

fn ensure_vacant(destination: &Path) -> Result<(), ContainerError> {
    if destination.try_exists()? {
        return Err(ContainerError::DestinationExists(destination.to_path_buf()));
    }
    Ok(())
}
