mod bif_writer;
mod cpu_monitor;
mod gpu_monitor;
mod media_probe;
mod path_resolver;
mod path_validator;

pub use bif_writer::{
    BIF_HEADER_SIZE, BIF_MAGIC, BIF_RECORD_SIZE, BIF_SENTINEL, BIF_VERSION, BifEntry, BifIndex,
    BifSummary, FRAME_EXTENSION, list_frames, write_bif,
};
pub use cpu_monitor::CpuMonitor;
pub use gpu_monitor::{DecodeMode, GpuProbe, NvidiaSmiProbe, select_decode_mode};
pub use media_probe::{MediaInfoProbe, MediaProbe, VideoTrackInfo, is_hdr_format};
pub use path_resolver::PathResolver;
pub use path_validator::{
    ensure_directory_exists, ensure_executable_available, remove_directories, reset_directory,
    validate_directory_exists,
};
