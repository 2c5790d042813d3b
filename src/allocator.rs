//! Global allocator for the binary.

use mimalloc::MiMalloc;

/// Chunk buffers are allocated and freed at a high rate during batches.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;
