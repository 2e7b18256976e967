pub mod device;
pub mod midi;
pub mod monitor;

/// Default locations stored in `~/.midimon`
///
/// .
/// └── log
///    └── midimon.log
///
pub mod locations {
    use std::path::PathBuf;

    pub fn midimon() -> Option<PathBuf> {
        Some(dirs::home_dir()?.join(".midimon"))
    }

    pub fn log() -> Option<PathBuf> {
        Some(midimon()?.join("log"))
    }

    pub fn log_file(name: &str) -> Option<PathBuf> {
        Some(log()?.join(format!("{name}.log")))
    }
}

/// File logger, installed once per process.
pub mod logger {
    use std::{
        path::Path,
        sync::{
            atomic::{AtomicBool, Ordering},
            Once,
        },
        time::SystemTime,
    };

    static INIT: Once = Once::new();
    static IS_INITIALIZED: AtomicBool = AtomicBool::new(false);

    pub fn is_active() -> bool {
        IS_INITIALIZED.load(Ordering::SeqCst)
    }

    /// Log to `file`, creating its directory if needed.
    pub fn start(id: &str, file: impl AsRef<Path>, verbose: bool) -> anyhow::Result<()> {
        if is_active() {
            anyhow::bail!("attempted to setup logger more than once");
        }

        let file = file.as_ref();
        if let Some(dir) = file.parent() {
            std::fs::create_dir_all(dir)?;
        }

        dispatch(id, verbose)
            .chain(fern::log_file(file)?)
            .apply()?;

        log::trace!("started");

        INIT.call_once(|| IS_INITIALIZED.store(true, Ordering::SeqCst));
        Ok(())
    }

    fn dispatch(id: &str, verbose: bool) -> fern::Dispatch {
        let level = if verbose {
            log::LevelFilter::Trace
        } else {
            log::LevelFilter::Debug
        };

        let id = format!("{id}:{}", std::process::id());

        fern::Dispatch::new()
            .format(move |out, msg, record| {
                let time = humantime::format_rfc3339_seconds(SystemTime::now());

                if cfg!(debug_assertions) {
                    out.finish(format_args!(
                        "[ {id} ] : [ {time} ] : [ {} {} ] : {msg}",
                        record.target(),
                        record.level(),
                    ))
                } else {
                    out.finish(format_args!("[ {id} ] : [ {time} ] : {msg}"))
                }
            })
            .level(level)
            .level_for("midir", log::LevelFilter::Warn)
    }

}
