//! Logging hooks for the trajectory pipeline.
//!
//! Library code only emits through the `log` facade. A binary (or a test that
//! wants to see output) installs a logger once with `init_logging`. The
//! `log_metric!` macro emits a single structured key/value line at debug level,
//! which is how per-sample progress and pool sizing decisions are reported.

use log::LevelFilter;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Once;

use crate::error::CoffeeError;

/// Logs a structured key-value metric line at `debug` level.
///
/// # Example
/// ```
/// use coffeematon::log_metric;
/// let step = 40;
/// log_metric!("event"="sample", "step"=&step);
/// ```
#[macro_export]
macro_rules! log_metric {
    ($($key:literal = $value:expr),+ $(,)?) => {
        if log::log_enabled!(log::Level::Debug) {
            let mut parts = Vec::new();
            $(
                parts.push(format!("\"{}\": \"{}\"", $key, $value));
            )+
            log::debug!("COFFEE_METRIC: {{ {} }}", parts.join(", "));
        }
    };
}

static INIT_LOGGER: Once = Once::new();

/// Installs the process-wide logger. Later calls are no-ops.
///
/// Records are written as `[LEVEL] message`, to stderr or appended to
/// `log_file` when one is given.
pub fn init_logging(level: LevelFilter, log_file: Option<&Path>) -> Result<(), CoffeeError> {
    let target = match log_file {
        Some(path) => Some(OpenOptions::new().append(true).create(true).open(path)?),
        None => None,
    };

    INIT_LOGGER.call_once(|| {
        let mut builder = env_logger::Builder::new();
        builder.is_test(false);
        builder.filter_level(level);

        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(buf, "[{}] {}", record.level(), record.args())?;
            buf.flush()?;
            Ok(())
        });

        if let Some(file) = target {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }

        let _ = builder.try_init();
    });
    Ok(())
}
