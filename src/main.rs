use std::env;
use std::io;
use std::path::Path;

use anyhow::Context;
use markitup::batch::OutputLayout;
use markitup::config::SETTINGS;
use markitup::interactive::{self, Session};
use markitup::MarkItUp;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    ctrlc::set_handler(|| {
        let _ = interactive::farewell(&mut io::stdout());
        std::process::exit(0);
    })
    .context("failed to install the Ctrl-C handler")?;

    let exe_name = env::args()
        .next()
        .and_then(|arg| {
            Path::new(&arg)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "markitup".to_string());

    let base_dir = env::current_dir().context("cannot determine the working directory")?;
    log::debug!("writing output under {}", base_dir.display());

    let layout = OutputLayout::new(base_dir, &SETTINGS);
    let session = Session::new(MarkItUp::new(SETTINGS.clone()), layout);

    // Not locked for the session: the Ctrl-C handler writes to stdout from its own thread.
    let mut out = io::stdout();
    interactive::print_welcome(&mut out, &exe_name)?;
    session.run(io::stdin().lock(), &mut out)?;
    Ok(())
}
