use confsift::engine::config::ScanConfig;
use std::path::PathBuf;

pub struct AppConfig {
    pub input_path: PathBuf,
    pub output_base: PathBuf,
    pub prior_path: Option<PathBuf>,
    pub restart_paths: Vec<PathBuf>,
    pub stop_file: Option<PathBuf>,
    pub core_config: ScanConfig,
}
