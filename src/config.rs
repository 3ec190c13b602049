//! Option structs shared by the binary and the library.

#[derive(Debug, Clone)]
pub struct BoltConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub use_ssl: bool,
}

impl Default for BoltConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 7687,
            username: String::new(),
            password: String::new(),
            use_ssl: false,
        }
    }
}

impl BoltConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn uri(&self) -> String {
        format!("bolt://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    Serial,
    BatchedParallel,
    Parser,
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Queries per sealed vertex/edge batch.
    pub batch_size: usize,
    /// Concurrency cap for the parallel executor; also the number of
    /// long-lived sessions.
    pub workers: usize,
    /// Upper bound on batches per lane in one window. Set from the same
    /// knob as `workers`.
    pub max_batches: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            workers: 32,
            max_batches: 32,
        }
    }
}

impl ImportOptions {
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            max_batches: workers,
            ..Self::default()
        }
    }

    /// Maximum number of queries consumed from the source per window.
    pub fn window_capacity(&self) -> usize {
        self.batch_size * self.max_batches
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Tabular,
    Csv,
}

#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub format: OutputFormat,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Tabular,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub delimiter: char,
    pub escapechar: Option<char>,
    /// When true, a quote inside a field is doubled; when false it is
    /// prefixed with `escapechar`, which must then be set.
    pub doublequote: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            escapechar: None,
            doublequote: true,
        }
    }
}

impl CsvOptions {
    pub fn validate(&self) -> bool {
        self.doublequote || self.escapechar.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_capacity_follows_both_knobs() {
        let opts = ImportOptions {
            batch_size: 100,
            workers: 4,
            max_batches: 4,
        };
        assert_eq!(opts.window_capacity(), 400);
    }

    #[test]
    fn csv_options_require_escapechar_without_doublequote() {
        let mut opts = CsvOptions::default();
        assert!(opts.validate());
        opts.doublequote = false;
        assert!(!opts.validate());
        opts.escapechar = Some('\\');
        assert!(opts.validate());
    }
}
