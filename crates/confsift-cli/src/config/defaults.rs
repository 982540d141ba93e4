use confsift::engine::config::{DEFAULT_LOOSE_MULTIPLIERS, DEFAULT_TIGHT_MULTIPLIER};

pub struct DefaultsConfig {
    pub rmsd_threshold: String,
    pub threads: usize,
    pub strategy: String,
    pub cost_metric: String,
    pub loose_mask: u8,
    pub tight_mask: u8,
    pub loose_multipliers: Vec<f64>,
    pub tight_multiplier: f64,
    pub loose_mode: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            rmsd_threshold: "auto".to_string(),
            threads: std::thread::available_parallelism().map_or(1, |n| n.get()),
            strategy: "free".to_string(),
            cost_metric: "1".to_string(),
            loose_mask: 7,
            tight_mask: 3,
            loose_multipliers: DEFAULT_LOOSE_MULTIPLIERS.to_vec(),
            tight_multiplier: DEFAULT_TIGHT_MULTIPLIER,
            loose_mode: "mapped".to_string(),
        }
    }
}
