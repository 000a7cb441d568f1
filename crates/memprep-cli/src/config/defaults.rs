use memprep::core::fetch::DEFAULT_OPM_BASE_URL;

pub struct DefaultsConfig {
    pub base_url: String,
    pub local_dir: String,
    pub timeout_secs: u64,
    pub max_concurrent: usize,
    pub selection: String,
    pub jobs: usize,
    pub report_format: String,
    pub continue_on_error: bool,
    pub verbose: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OPM_BASE_URL.to_string(),
            local_dir: "structures".to_string(),
            timeout_secs: 60,
            max_concurrent: 1,
            selection: "protein".to_string(),
            jobs: 1,
            report_format: "xlsx".to_string(),
            continue_on_error: false,
            verbose: true,
        }
    }
}
