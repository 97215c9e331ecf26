use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// 終端機用的精簡輸出
    Compact,
    /// JSON 格式，方便匯入紀錄交給日誌系統收集
    Json,
}

impl LogFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            LogFormat::Json
        } else {
            LogFormat::Compact
        }
    }
}

/// Directive used when `RUST_LOG` is not set.
fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "roster_import=debug,info"
    } else {
        "roster_import=info"
    }
}

pub fn init_logger(format: LogFormat, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    macro_rules! fmt {
        () => {
            tracing_subscriber::fmt::layer()
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
        };
    }
    let (compact, json) = match format {
        LogFormat::Compact => (Some(fmt!().with_target(false).compact()), None),
        LogFormat::Json => (None, Some(fmt!().with_target(true).json())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(compact)
        .with(json)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_raises_crate_level() {
        assert_eq!(default_directive(false), "roster_import=info");
        assert_eq!(default_directive(true), "roster_import=debug,info");
        assert!(default_directive(true).parse::<EnvFilter>().is_ok());
    }

    #[test]
    fn test_format_from_flag() {
        assert_eq!(LogFormat::from_json_flag(true), LogFormat::Json);
        assert_eq!(LogFormat::from_json_flag(false), LogFormat::Compact);
    }
}
